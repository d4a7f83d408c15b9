//! Engine options.

/// Options for opening an [`Engine`](crate::Engine).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineOptions {
    /// Whether to create the database file if it doesn't exist.
    pub create_if_missing: bool,

    /// Whether to sync the log on every commit (safer but slower).
    pub sync_on_commit: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            sync_on_commit: true,
        }
    }
}

impl EngineOptions {
    /// Creates options with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to create the database if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets whether to sync the log on every commit.
    #[must_use]
    pub const fn sync_on_commit(mut self, value: bool) -> Self {
        self.sync_on_commit = value;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_durable() {
        let options = EngineOptions::default();
        assert!(options.create_if_missing);
        assert!(options.sync_on_commit);
    }

    #[test]
    fn builder_pattern() {
        let options = EngineOptions::new()
            .create_if_missing(false)
            .sync_on_commit(false);
        assert!(!options.create_if_missing);
        assert!(!options.sync_on_commit);
    }
}
