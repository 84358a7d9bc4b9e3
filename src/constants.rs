// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

/// Kubernetes annotation keys consumed and produced by the reloader
pub mod annotations {
    /// When set to "true" on a workload, any ConfigMap/Secret change in the
    /// namespace triggers a reload of that workload
    pub const RELOAD_ALL: &str = "reloader.stakater.com/auto";
    /// Typed variant of the auto annotation, ConfigMap changes only
    pub const CONFIGMAP_AUTO: &str = "configmap.reloader.stakater.com/auto";
    /// Typed variant of the auto annotation, Secret changes only
    pub const SECRET_AUTO: &str = "secret.reloader.stakater.com/auto";
    /// Comma-separated list of ConfigMap names the workload reloads on
    pub const CONFIGMAP_RELOAD: &str = "configmap.reloader.stakater.com/reload";
    /// Comma-separated list of Secret names the workload reloads on
    pub const SECRET_RELOAD: &str = "secret.reloader.stakater.com/reload";
    /// On a ConfigMap/Secret: opt into search/match triggering
    pub const SEARCH: &str = "reloader.stakater.com/search";
    /// On a workload: matched by search-annotated resources
    pub const MATCH: &str = "reloader.stakater.com/match";
    /// When set to "true" on a workload, the reloader never touches it
    pub const IGNORE: &str = "reloader.stakater.com/ignore";
    /// Pod-template annotation holding the fingerprint of the last reload
    pub const LAST_RELOADED_FROM: &str = "reloader.stakater.com/last-reloaded-from";
    /// On a Deployment: pause the rollout for this duration after a reload
    pub const PAUSE_PERIOD: &str = "deployment.reloader.stakater.com/pause-period";
    /// Set by the reloader when it pauses a Deployment (RFC3339 timestamp)
    pub const PAUSED_AT: &str = "deployment.reloader.stakater.com/paused-at";
    /// On a Rollout: "restart" makes the Rollout patchable
    pub const ROLLOUT_STRATEGY: &str = "reloader.stakater.com/rollout-strategy";
}

/// Prefix of the synthetic env var carrying the change fingerprint
pub const ENV_VAR_PREFIX: &str = "STAKATER_";

/// The operator name used as field manager on patches
pub const OPERATOR_NAME: &str = "reloader";
