// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Per-event rolling-upgrade driver.
//!
//! For each change event this walks every supported workload kind in the
//! namespace, asks the trigger resolver whether the workload reacts, finds
//! the target container and applies the active reload strategy. One
//! workload's failure never aborts the remaining workloads.

pub mod strategy;

use crate::config::{Config, ReloadStrategy};
use crate::constants::annotations;
use crate::containers;
use crate::error::{ReloaderError, Result};
use crate::metrics;
use crate::pause::{self, PauseTimerRegistry};
use crate::triggers::{self, ReloadTrigger};
use crate::workload::{api, Workload, WorkloadKind};
use kube::api::Patch;
use kube::Client;
use std::collections::BTreeMap;
use std::sync::Arc;
use strategy::UpgradeResult;
use tracing::{debug, error, info, instrument, warn};

/// The kind of watched resource a change event refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    ConfigMap,
    Secret,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::ConfigMap => "ConfigMap",
            ResourceKind::Secret => "Secret",
        }
    }

    pub fn env_suffix(&self) -> &'static str {
        match self {
            ResourceKind::ConfigMap => "CONFIGMAP",
            ResourceKind::Secret => "SECRET",
        }
    }
}

/// One ConfigMap/Secret change, built once per event by the watch layer and
/// passed read-only through the pipeline
#[derive(Debug, Clone)]
pub struct ResourceChange {
    pub namespace: String,
    pub name: String,
    pub kind: ResourceKind,
    /// Fingerprint of the resource's current data; the empty-data
    /// fingerprint for deletions
    pub sha_value: String,
    /// Fingerprint of the previous version, when known
    pub old_sha_value: Option<String>,
    /// The resource's own annotations, as delivered with the event
    pub annotations: BTreeMap<String, String>,
    pub deleted: bool,
}

/// Process one change event against every workload in its namespace
#[instrument(skip(client, change, config, timers), fields(resource = %format!("{}/{}/{}", change.kind.as_str(), change.namespace, change.name)))]
pub async fn handle_change(
    client: &Client,
    change: &ResourceChange,
    config: &Config,
    timers: &Arc<PauseTimerRegistry>,
) -> Result<()> {
    for kind in WorkloadKind::ALL {
        let workloads = match api::list_workloads(client, &change.namespace, kind).await {
            Ok(w) => w,
            Err(e) => {
                warn!(
                    "Failed to list {}s in {}: {}",
                    kind.as_str(),
                    change.namespace,
                    e
                );
                continue;
            }
        };

        for workload in workloads {
            let trigger = triggers::resolve(workload.annotations(), change, config);
            if trigger == ReloadTrigger::NotTriggered {
                continue;
            }

            let name = workload.name();
            match upgrade_workload(client, workload, change, config, trigger, timers).await {
                Ok(UpgradeResult::Updated) => {
                    info!(
                        "Reloaded {} {}/{} for {} {}",
                        kind.as_str(),
                        change.namespace,
                        name,
                        change.kind.as_str(),
                        change.name
                    );
                    metrics::record_reload(&change.namespace, true);
                }
                Ok(UpgradeResult::NotUpdated) => {
                    debug!(
                        "{} {}/{} already carries the current fingerprint",
                        kind.as_str(),
                        change.namespace,
                        name
                    );
                }
                Ok(UpgradeResult::NoContainerFound) => {
                    debug!(
                        "No container in {} {}/{} references {} {}",
                        kind.as_str(),
                        change.namespace,
                        name,
                        change.kind.as_str(),
                        change.name
                    );
                }
                Err(e) => {
                    error!(
                        "Failed to reload {} {}/{}: {}",
                        kind.as_str(),
                        change.namespace,
                        name,
                        e
                    );
                    metrics::record_reload(&change.namespace, false);
                }
            }
        }
    }
    Ok(())
}

/// Apply the active strategy to one workload and persist the mutation
async fn upgrade_workload(
    client: &Client,
    mut workload: Workload,
    change: &ResourceChange,
    config: &Config,
    trigger: ReloadTrigger,
    timers: &Arc<PauseTimerRegistry>,
) -> Result<UpgradeResult> {
    let mut template = workload.pod_template();

    // Named triggers keep the legacy first-container fallback; auto
    // triggers never guess
    let fallback = trigger == ReloadTrigger::Named;
    let Some(target) =
        containers::find_target_container(&template, &change.name, change.kind, fallback)
    else {
        return Ok(UpgradeResult::NoContainerFound);
    };

    let env_name = strategy::env_var_name(&change.name, change.kind);
    let (result, removed_env_index) = match (config.reload_strategy, change.deleted) {
        (ReloadStrategy::EnvVars, false) => (
            strategy::apply_env_var(&mut template.containers[target], &env_name, &change.sha_value),
            None,
        ),
        (ReloadStrategy::EnvVars, true) => {
            strategy::remove_env_var(&mut template.containers[target], &env_name)
        }
        (ReloadStrategy::Annotations, _) => (
            strategy::apply_annotation(&mut template.annotations, &change.sha_value),
            None,
        ),
    };
    if result != UpgradeResult::Updated {
        return Ok(result);
    }

    let container_name = template.containers[target].name.clone();
    workload.set_pod_template(&template)?;

    let patch: Option<Patch<serde_json::Value>> = if !workload.supports_patch() {
        None
    } else {
        match (config.reload_strategy, change.deleted, removed_env_index) {
            (ReloadStrategy::Annotations, _, _) => Some(Patch::Strategic(
                strategy::annotation_patch(&change.sha_value),
            )),
            (ReloadStrategy::EnvVars, true, Some(env_index)) => Some(Patch::Json(
                strategy::env_var_remove_patch(target, env_index)?,
            )),
            // Rollouts receive strategic patches as merge patches, and a
            // merge patch replaces the whole containers array; the scoped
            // env-var patch would wipe every other container
            (ReloadStrategy::EnvVars, _, _) if matches!(workload, Workload::Rollout(_)) => None,
            (ReloadStrategy::EnvVars, _, _) => Some(Patch::Strategic(strategy::env_var_patch(
                &container_name,
                &env_name,
                &change.sha_value,
            ))),
        }
    };

    match patch {
        Some(patch) => match api::patch_workload(client, &workload, &patch).await {
            Ok(()) => {}
            Err(ReloaderError::PatchNotSupported(_)) => {
                api::update_workload(client, &workload).await?;
            }
            Err(e) => return Err(e),
        },
        None => api::update_workload(client, &workload).await?,
    }

    maybe_pause_after_reload(client, &workload, timers).await;

    Ok(UpgradeResult::Updated)
}

/// Deployments that request a pause period are paused right after a reload
async fn maybe_pause_after_reload(
    client: &Client,
    workload: &Workload,
    timers: &Arc<PauseTimerRegistry>,
) {
    let Workload::Deployment(deployment) = workload else {
        return;
    };
    let Some(period) = workload.annotations().get(annotations::PAUSE_PERIOD) else {
        return;
    };

    match pause::parse_pause_duration(period) {
        Ok(duration) => {
            if let Err(e) = pause::pause_deployment(client, timers, deployment, duration).await {
                warn!(
                    "Failed to pause deployment {}/{} after reload: {}",
                    workload.namespace(),
                    workload.name(),
                    e
                );
            }
        }
        Err(e) => {
            warn!(
                "Ignoring invalid pause period on deployment {}/{}: {}",
                workload.namespace(),
                workload.name(),
                e
            );
        }
    }
}
