/// Engine health as seen by consumers. Subscription failures surface
/// here instead of unwinding past the subscription boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineStatus {
    Starting,
    Live { groups: usize },
    /// A subscription failed. The affected state was discarded rather
    /// than served stale.
    Degraded { message: String },
}

impl EngineStatus {
    pub(crate) fn degraded(message: impl Into<String>) -> Self {
        Self::Degraded {
            message: message.into(),
        }
    }
}
