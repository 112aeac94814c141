//! Engine configuration.

/// Which path drives secondary-index maintenance.
///
/// Exactly one path is active per [`crate::Database`]. Running both would
/// apply every index write twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TriggerMode {
    /// Maintain indexes in-process right after the base record is written.
    #[default]
    Synchronous,
    /// Publish mutations on the change feed; indexes are maintained when the
    /// feed is processed.
    ChangeFeed,
}

/// What a query does when its `start_from` id no longer exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingCursorPolicy {
    /// Fail the page request with `CursorNotFound`.
    #[default]
    Fail,
    /// Resume from the beginning of the scanned range.
    Restart,
}

/// How index field values containing the key separator are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SeparatorPolicy {
    /// Reject the value with a validation error.
    #[default]
    Reject,
    /// Concatenate as-is; composite ordering may be ambiguous.
    Allow,
}

/// Configuration for a database.
#[derive(Debug, Clone)]
pub struct Config {
    /// Index maintenance trigger.
    pub trigger_mode: TriggerMode,

    /// Page size used when a query asks for 0 documents.
    pub default_page_size: usize,

    /// Upper bound on the page size of a single query.
    pub max_page_size: usize,

    /// Behavior for dangling pagination cursors.
    pub missing_cursor: MissingCursorPolicy,

    /// Behavior for separators inside indexed values.
    pub separator: SeparatorPolicy,

    /// Number of handled change events retained for polling. Events the
    /// processor has not handled are kept past this limit.
    pub feed_history: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            trigger_mode: TriggerMode::Synchronous,
            default_page_size: 20,
            max_page_size: 1000,
            missing_cursor: MissingCursorPolicy::Fail,
            separator: SeparatorPolicy::Reject,
            feed_history: 10_000,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the index maintenance trigger.
    #[must_use]
    pub const fn trigger_mode(mut self, mode: TriggerMode) -> Self {
        self.trigger_mode = mode;
        self
    }

    /// Sets the default page size.
    #[must_use]
    pub const fn default_page_size(mut self, size: usize) -> Self {
        self.default_page_size = size;
        self
    }

    /// Sets the maximum page size.
    #[must_use]
    pub const fn max_page_size(mut self, size: usize) -> Self {
        self.max_page_size = size;
        self
    }

    /// Sets the dangling cursor policy.
    #[must_use]
    pub const fn missing_cursor(mut self, policy: MissingCursorPolicy) -> Self {
        self.missing_cursor = policy;
        self
    }

    /// Sets the separator policy.
    #[must_use]
    pub const fn separator(mut self, policy: SeparatorPolicy) -> Self {
        self.separator = policy;
        self
    }

    /// Sets the change feed history size.
    #[must_use]
    pub const fn feed_history(mut self, events: usize) -> Self {
        self.feed_history = events;
        self
    }

    /// Resolves a requested page size against the configured bounds.
    #[must_use]
    pub fn page_size(&self, requested: usize) -> usize {
        let size = if requested == 0 {
            self.default_page_size
        } else {
            requested
        };
        size.clamp(1, self.max_page_size.max(1))
    }
}
