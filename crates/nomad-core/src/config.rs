use std::time::Duration;

use crate::error::AppError;

/// Settings for one orchestrator run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeConfig {
    /// Targets processed in parallel per chunk.
    pub max_concurrent: usize,
    /// Pause between consecutive chunks. The only rate limit applied.
    pub inter_batch_delay: Duration,
    /// Timeout for a single HTTP request.
    pub request_timeout: Duration,
    /// Hard ceiling on one target's adapter call, across all its requests.
    pub target_timeout: Duration,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 5,
            inter_batch_delay: Duration::from_secs(2),
            request_timeout: Duration::from_secs(30),
            target_timeout: Duration::from_secs(90),
        }
    }
}

impl ScrapeConfig {
    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    pub fn with_inter_batch_delay(mut self, delay: Duration) -> Self {
        self.inter_batch_delay = delay;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_target_timeout(mut self, timeout: Duration) -> Self {
        self.target_timeout = timeout;
        self
    }

    /// Read configuration from environment variables.
    ///
    /// - `NOMAD_MAX_CONCURRENT` (default 5, must be at least 1)
    /// - `NOMAD_BATCH_DELAY_MS` (default 2000)
    /// - `NOMAD_REQUEST_TIMEOUT_SECS` (default 30)
    /// - `NOMAD_TARGET_TIMEOUT_SECS` (default 90)
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let defaults = Self::default();

        let max_concurrent = match parse_var::<usize>(&lookup, "NOMAD_MAX_CONCURRENT")? {
            None => defaults.max_concurrent,
            Some(0) => {
                return Err(AppError::ConfigError(
                    "NOMAD_MAX_CONCURRENT must be at least 1".into(),
                ));
            }
            Some(n) => n,
        };

        let inter_batch_delay = parse_var::<u64>(&lookup, "NOMAD_BATCH_DELAY_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.inter_batch_delay);
        let request_timeout = parse_var::<u64>(&lookup, "NOMAD_REQUEST_TIMEOUT_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.request_timeout);
        let target_timeout = parse_var::<u64>(&lookup, "NOMAD_TARGET_TIMEOUT_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.target_timeout);

        Ok(Self {
            max_concurrent,
            inter_batch_delay,
            request_timeout,
            target_timeout,
        })
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>, AppError> {
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|_| {
            AppError::ConfigError(format!(
                "Invalid {key} '{raw}': must be a non-negative integer"
            ))
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = ScrapeConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config, ScrapeConfig::default());
    }

    #[test]
    fn reads_overrides() {
        let config = ScrapeConfig::from_lookup(lookup_from(&[
            ("NOMAD_MAX_CONCURRENT", "8"),
            ("NOMAD_BATCH_DELAY_MS", "250"),
            ("NOMAD_REQUEST_TIMEOUT_SECS", " 10 "),
            ("NOMAD_TARGET_TIMEOUT_SECS", "40"),
        ]))
        .unwrap();
        assert_eq!(config.max_concurrent, 8);
        assert_eq!(config.inter_batch_delay, Duration::from_millis(250));
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert_eq!(config.target_timeout, Duration::from_secs(40));
    }

    #[test]
    fn rejects_zero_concurrency() {
        let err = ScrapeConfig::from_lookup(lookup_from(&[("NOMAD_MAX_CONCURRENT", "0")]))
            .unwrap_err();
        assert!(matches!(err, AppError::ConfigError(_)));
    }

    #[test]
    fn rejects_garbage() {
        let err = ScrapeConfig::from_lookup(lookup_from(&[("NOMAD_BATCH_DELAY_MS", "soon")]))
            .unwrap_err();
        assert!(err.to_string().contains("NOMAD_BATCH_DELAY_MS"));
    }

    #[test]
    fn builder_clamps_concurrency() {
        assert_eq!(ScrapeConfig::default().with_max_concurrent(0).max_concurrent, 1);
    }
}
