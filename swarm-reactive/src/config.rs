//! Runtime Configuration
//!
//! Limits and policies for one reactive runtime. Configuration states the
//! constraints; the runtime enforces them.

/// What happens when a callback asks for a recalculation while a pass is
/// still dispatching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NestedPolicy {
    /// Queue the request and run it as a follow-up pass once the current
    /// pass has finished dispatching.
    #[default]
    Queue,

    /// Fail the request with [`crate::Error::NestedPropagation`].
    Reject,
}

/// Runtime configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Highest identifier the allocator may hand out.
    pub id_limit: u16,

    /// Policy for recalculations requested from inside a callback.
    pub nested_policy: NestedPolicy,

    /// Maximum follow-up passes run for a single top-level recalculation.
    pub max_deferred_passes: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            id_limit: u16::MAX,
            nested_policy: NestedPolicy::Queue,
            max_deferred_passes: 1024,
        }
    }
}

impl RuntimeConfig {
    /// Create a configuration with default limits.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cap the identifier space. A limit of zero is raised to one.
    pub fn with_id_limit(mut self, limit: u16) -> Self {
        self.id_limit = limit.max(1);
        self
    }

    pub fn with_nested_policy(mut self, policy: NestedPolicy) -> Self {
        self.nested_policy = policy;
        self
    }

    pub fn with_max_deferred_passes(mut self, passes: usize) -> Self {
        self.max_deferred_passes = passes;
        self
    }
}
