use serde::{Deserialize, Serialize};

/// What a notification pass does when one binding's update fails.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorPolicy {
    /// Propagate the first error; remaining bindings of the pass do not run.
    #[default]
    Abort,
    /// Log the error and keep running the remaining bindings.
    LogAndContinue,
}

/// Runtime settings.
///
/// ```rust
/// use weft_core::{Config, ErrorPolicy};
///
/// let config = Config::default()
///     .max_update_depth(16)
///     .error_policy(ErrorPolicy::LogAndContinue);
/// assert_eq!(config.max_update_depth, 16);
/// ```
///
/// Also loadable from JSON; missing fields keep their defaults.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Maximum nesting of notifications triggered from inside update callbacks.
    pub max_update_depth: usize,
    pub error_policy: ErrorPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_update_depth: 64,
            error_policy: ErrorPolicy::Abort,
        }
    }
}

impl Config {
    pub fn max_update_depth(mut self, depth: usize) -> Self {
        self.max_update_depth = depth;
        self
    }

    pub fn error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.error_policy = policy;
        self
    }
}
