//! User-facing storage notices.
//!
//! The store reports degraded-mode conditions through a collaborator trait.
//! Notices are best-effort: the collaborator may be absent, and nothing the
//! collaborator does can affect store control flow.

/// A notice the store wants surfaced to the user.
///
/// Closed enum - only store code constructs these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreNotice {
    /// Every durable tier failed its probe; data lives in process memory
    /// and will be lost when the process exits.
    DegradedMode,
}

impl StoreNotice {
    #[must_use]
    pub fn message(self) -> &'static str {
        match self {
            StoreNotice::DegradedMode => {
                "Durable storage is unavailable or disabled. Agent configuration \
                 and chat history may be lost when this session ends."
            }
        }
    }
}

/// Receives notices from the store.
///
/// Implementations must not panic; the store treats delivery as
/// fire-and-forget.
pub trait StoreNotifier {
    fn notify(&self, notice: StoreNotice);
}
