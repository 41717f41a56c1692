use tokio_util::sync::CancellationToken;

/// Operator requested shutdown, shared between the signal listener and the stream loop
///
/// Starts unset. Clones observe the same flag; once requested it stays set.
#[derive(Clone, Debug, Default)]
pub struct InterruptFlag {
    token: CancellationToken,
}

impl InterruptFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the flag (called from the signal listener)
    pub fn request(&self) {
        self.token.cancel();
    }

    pub fn is_requested(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once the flag is set, immediately if it already is
    pub async fn requested(&self) {
        self.token.cancelled().await;
    }
}
