// crates/core/src/config.rs
//! Runner configuration, sourced from `TOOLHOST_*` environment variables.

use std::path::PathBuf;
use std::time::Duration;

/// Default wall-clock timeout for a job (seconds).
const DEFAULT_TIMEOUT_SECS: u64 = 300;
/// Default admission cap.
const DEFAULT_MAX_CONCURRENT: usize = 2;
/// Default per-stream capture cap (chars).
const DEFAULT_MAX_TEXT_OUTPUT: usize = 20_000;
/// Default preview cap for raw-text derived results and report previews (chars).
const DEFAULT_MAX_ARTIFACT_PREVIEW: usize = 4_000;
/// Default retained-job cap; terminal jobs beyond this are evicted oldest-first.
const DEFAULT_MAX_HISTORY: usize = 256;

/// Configuration for a [`JobRunner`](crate::JobRunner).
///
/// `output_dir = None` disables artifact persistence entirely; the
/// in-memory registry itself is never persisted.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub output_dir: Option<PathBuf>,
    pub default_timeout: Duration,
    pub max_concurrent: usize,
    pub max_text_output: usize,
    pub max_artifact_preview: usize,
    pub max_history: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            output_dir: None,
            default_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            max_text_output: DEFAULT_MAX_TEXT_OUTPUT,
            max_artifact_preview: DEFAULT_MAX_ARTIFACT_PREVIEW,
            max_history: DEFAULT_MAX_HISTORY,
        }
    }
}

impl RunnerConfig {
    /// Read configuration from the environment, falling back to defaults
    /// for anything unset or unparsable.
    pub fn from_env() -> Self {
        Self {
            output_dir: std::env::var("TOOLHOST_OUTPUT_DIR").ok().map(PathBuf::from),
            default_timeout: Duration::from_secs(env_parse(
                "TOOLHOST_DEFAULT_TIMEOUT",
                DEFAULT_TIMEOUT_SECS,
            )),
            max_concurrent: env_parse("TOOLHOST_MAX_CONCURRENT", DEFAULT_MAX_CONCURRENT).max(1),
            max_text_output: env_parse("TOOLHOST_MAX_TEXT_OUTPUT", DEFAULT_MAX_TEXT_OUTPUT),
            max_artifact_preview: env_parse(
                "TOOLHOST_MAX_ARTIFACT_PREVIEW",
                DEFAULT_MAX_ARTIFACT_PREVIEW,
            ),
            max_history: env_parse("TOOLHOST_MAX_HISTORY", DEFAULT_MAX_HISTORY),
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let cfg = RunnerConfig::default();
        assert_eq!(cfg.max_concurrent, 2);
        assert_eq!(cfg.default_timeout, Duration::from_secs(300));
        assert_eq!(cfg.max_text_output, 20_000);
        assert!(cfg.output_dir.is_none());
    }

    #[test]
    fn test_env_parse_falls_back_on_garbage() {
        std::env::set_var("TOOLHOST_TEST_GARBAGE_VALUE", "not-a-number");
        assert_eq!(env_parse("TOOLHOST_TEST_GARBAGE_VALUE", 7usize), 7);
        std::env::remove_var("TOOLHOST_TEST_GARBAGE_VALUE");
    }

    #[test]
    fn test_env_parse_reads_value() {
        std::env::set_var("TOOLHOST_TEST_PARSE_VALUE", "42");
        assert_eq!(env_parse("TOOLHOST_TEST_PARSE_VALUE", 7usize), 42);
        std::env::remove_var("TOOLHOST_TEST_PARSE_VALUE");
    }
}
