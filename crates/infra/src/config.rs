//! Configuration loading and representation.

use std::time::Duration;

/// Bounds for the optimistic unit-of-work loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerConfig {
    /// Commit attempts per unit of work before giving up with `Contention`.
    pub max_attempts: u32,
    /// Wall-clock budget for a single unit of work, across all attempts.
    pub contention_timeout: Duration,
    /// Base backoff between attempts; attempt `n` waits `n * retry_backoff`.
    pub retry_backoff: Duration,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            max_attempts: 8,
            contention_timeout: Duration::from_millis(2000),
            retry_backoff: Duration::from_millis(2),
        }
    }
}

impl LedgerConfig {
    pub const MAX_ATTEMPTS_VAR: &'static str = "LEDGER_MAX_ATTEMPTS";
    pub const CONTENTION_TIMEOUT_VAR: &'static str = "LEDGER_CONTENTION_TIMEOUT_MS";
    pub const RETRY_BACKOFF_VAR: &'static str = "LEDGER_RETRY_BACKOFF_MS";

    /// Read overrides from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read overrides through `lookup`; unset or unparsable keys keep defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let max_attempts = parse_or(&lookup, Self::MAX_ATTEMPTS_VAR, defaults.max_attempts)
            .max(1);
        let timeout_ms = parse_or(
            &lookup,
            Self::CONTENTION_TIMEOUT_VAR,
            defaults.contention_timeout.as_millis() as u64,
        );
        let backoff_ms = parse_or(
            &lookup,
            Self::RETRY_BACKOFF_VAR,
            defaults.retry_backoff.as_millis() as u64,
        );
        Self {
            max_attempts,
            contention_timeout: Duration::from_millis(timeout_ms),
            retry_backoff: Duration::from_millis(backoff_ms),
        }
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy + std::fmt::Display,
{
    match lookup(key) {
        None => default,
        Some(raw) => match raw.trim().parse() {
            Ok(v) => v,
            Err(_) => {
                tracing::warn!(key, value = %raw, %default, "ignoring unparsable ledger setting");
                default
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        assert_eq!(LedgerConfig::from_lookup(lookup(&[])), LedgerConfig::default());
    }

    #[test]
    fn reads_overrides() {
        let cfg = LedgerConfig::from_lookup(lookup(&[
            ("LEDGER_MAX_ATTEMPTS", "3"),
            ("LEDGER_CONTENTION_TIMEOUT_MS", "150"),
            ("LEDGER_RETRY_BACKOFF_MS", "0"),
        ]));
        assert_eq!(cfg.max_attempts, 3);
        assert_eq!(cfg.contention_timeout, Duration::from_millis(150));
        assert_eq!(cfg.retry_backoff, Duration::ZERO);
    }

    #[test]
    fn garbage_falls_back_and_zero_attempts_is_clamped() {
        let cfg = LedgerConfig::from_lookup(lookup(&[
            ("LEDGER_MAX_ATTEMPTS", "0"),
            ("LEDGER_CONTENTION_TIMEOUT_MS", "soon"),
        ]));
        assert_eq!(cfg.max_attempts, 1);
        assert_eq!(cfg.contention_timeout, Duration::from_millis(2000));
    }
}
