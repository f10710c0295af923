use waldo_core::types::CompletionResult;

/// Running tallies over completed commands.
#[derive(Debug, Clone, Default)]
pub struct CommandStats {
    /// Commands that reached a terminal state.
    pub commands_run: u32,
    pub succeeded: u32,
    pub failed: u32,
    /// Total fixed steps executed across all commands.
    pub steps_run: u64,
    /// Error message of the most recent failure.
    pub last_error: Option<String>,
}

impl CommandStats {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one terminal result into the tallies.
    pub fn record(&mut self, result: &CompletionResult) {
        self.commands_run += 1;
        if result.success {
            self.succeeded += 1;
        } else {
            self.failed += 1;
            self.last_error = Some(result.error_message.clone());
        }
    }

    pub fn record_step(&mut self) {
        self.steps_run += 1;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
