// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use anyhow::{bail, Result};
use std::env;

/// Which signal is written into the pod template to force a rolling restart.
/// One strategy is active process-wide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadStrategy {
    /// Inject a synthetic env var carrying the change fingerprint
    EnvVars,
    /// Stamp a single pod-template annotation with the change fingerprint
    Annotations,
}

/// Operator configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub reload_strategy: ReloadStrategy,
    /// Reload every workload in the namespace on any change, without
    /// requiring per-workload annotations
    pub auto_reload_all: bool,
    /// Restrict watching to a single namespace; watches all when unset
    pub watch_namespace: Option<String>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let reload_strategy = match get("RELOAD_STRATEGY").as_deref().unwrap_or("env-vars") {
            "env-vars" => ReloadStrategy::EnvVars,
            "annotations" => ReloadStrategy::Annotations,
            other => bail!("RELOAD_STRATEGY must be 'env-vars' or 'annotations', got '{}'", other),
        };

        let auto_reload_all = match get("AUTO_RELOAD_ALL").as_deref() {
            None | Some("false") => false,
            Some("true") => true,
            Some(other) => bail!("AUTO_RELOAD_ALL must be 'true' or 'false', got '{}'", other),
        };

        let watch_namespace = get("WATCH_NAMESPACE").filter(|ns| !ns.is_empty());

        Ok(Config {
            reload_strategy,
            auto_reload_all,
            watch_namespace,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup<'a>(pairs: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |key| {
            pairs
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn test_default_strategy_is_env_vars() {
        let config = Config::from_lookup(|_| None).unwrap();
        assert_eq!(config.reload_strategy, ReloadStrategy::EnvVars);
        assert!(!config.auto_reload_all);
        assert!(config.watch_namespace.is_none());
    }

    #[test]
    fn test_explicit_values() {
        let config = Config::from_lookup(lookup(&[
            ("RELOAD_STRATEGY", "annotations"),
            ("AUTO_RELOAD_ALL", "true"),
            ("WATCH_NAMESPACE", "prod"),
        ]))
        .unwrap();
        assert_eq!(config.reload_strategy, ReloadStrategy::Annotations);
        assert!(config.auto_reload_all);
        assert_eq!(config.watch_namespace.as_deref(), Some("prod"));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(Config::from_lookup(lookup(&[("RELOAD_STRATEGY", "bogus")])).is_err());
        assert!(Config::from_lookup(lookup(&[("AUTO_RELOAD_ALL", "yes")])).is_err());
    }
}
