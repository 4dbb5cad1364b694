use crate::serial::Level;

/// Tunables for the storage stack. Everything has a compile-time default;
/// the kernel overrides fields through the `with_*` builders before calling
/// [`crate::init`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageConfig {
    /// Upper bound on status-register reads in any single busy-wait.
    pub poll_limit: u32,
    /// Maximum level printed by the `log_*!` macros.
    pub log_level: Level,
}

impl StorageConfig {
    pub const DEFAULT_POLL_LIMIT: u32 = 100_000;

    pub const DEFAULT: StorageConfig = StorageConfig {
        poll_limit: Self::DEFAULT_POLL_LIMIT,
        log_level: Level::Info,
    };

    pub const fn with_poll_limit(mut self, poll_limit: u32) -> Self {
        // Zero would make every wait fail before the first status read.
        self.poll_limit = if poll_limit == 0 { 1 } else { poll_limit };
        self
    }

    pub const fn with_log_level(mut self, log_level: Level) -> Self {
        self.log_level = log_level;
        self
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}
