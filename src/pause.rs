// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Pausing a Deployment's rollout for a bounded duration, with guaranteed
//! resume across process restarts.
//!
//! No timer state is persisted: the paused-at annotation on the Deployment
//! itself is the source of truth, and [`handle_missing_timer`] rebuilds the
//! in-process timer from it after a restart or leadership change.

use crate::constants::annotations;
use crate::error::{ReloaderError, Result};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::chrono::{DateTime, SecondsFormat, Utc};
use kube::api::{Patch, PatchParams, PostParams};
use kube::{Api, Client, ResourceExt};
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Process-local registry of pending resume timers, keyed by
/// `namespace/name`. At most one timer per key; the first one wins.
/// Deliberately lost on restart.
pub struct PauseTimerRegistry {
    timers: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl PauseTimerRegistry {
    pub fn new() -> Self {
        Self {
            timers: Mutex::new(HashMap::new()),
        }
    }

    pub fn contains(&self, namespace: &str, name: &str) -> bool {
        self.timers
            .lock()
            .unwrap()
            .contains_key(&key(namespace, name))
    }

    /// Stop and forget the pending timer, if any. Used on early resume so
    /// the stopped timer cannot fire a duplicate resume.
    fn cancel(&self, namespace: &str, name: &str) {
        if let Some(handle) = self.timers.lock().unwrap().remove(&key(namespace, name)) {
            handle.abort();
        }
    }

    /// Drop the entry without aborting. Called by a timer for itself right
    /// before it runs the resume, so the resume path cannot abort it mid-flight.
    fn forget(&self, namespace: &str, name: &str) {
        self.timers.lock().unwrap().remove(&key(namespace, name));
    }

    /// Schedule a one-shot resume after `delay`. A no-op when a timer for
    /// this Deployment already exists.
    pub fn schedule(self: &Arc<Self>, client: Client, namespace: &str, name: &str, delay: Duration) {
        let mut timers = self.timers.lock().unwrap();
        let timer_key = key(namespace, name);
        if timers.contains_key(&timer_key) {
            debug!("Resume timer for {} already scheduled", timer_key);
            return;
        }

        let registry = Arc::clone(self);
        let (ns, n) = (namespace.to_string(), name.to_string());
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            registry.forget(&ns, &n);
            if let Err(e) = resume_deployment(&client, &registry, &ns, &n).await {
                error!("Failed to resume deployment {}/{}: {}", ns, n, e);
            }
        });
        timers.insert(timer_key, handle);
    }
}

impl Default for PauseTimerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn key(namespace: &str, name: &str) -> String {
    format!("{}/{}", namespace, name)
}

/// Paused by this engine, as opposed to a user or another controller
pub fn paused_by_reloader(deployment: &Deployment) -> bool {
    let paused = deployment
        .spec
        .as_ref()
        .and_then(|s| s.paused)
        .unwrap_or(false);
    paused && deployment.annotations().contains_key(annotations::PAUSED_AT)
}

/// Parse a Go-style duration string such as `"5m"`, `"300s"` or `"1h30m"`
pub fn parse_pause_duration(input: &str) -> Result<Duration> {
    let s = input.trim();
    if s.is_empty() {
        return Err(ReloaderError::InvalidDuration(input.to_string()));
    }

    let mut total = Duration::ZERO;
    let mut digits = String::new();
    let mut saw_component = false;
    for c in s.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
        } else {
            if digits.is_empty() {
                return Err(ReloaderError::InvalidDuration(input.to_string()));
            }
            let value: u64 = digits
                .parse()
                .map_err(|_| ReloaderError::InvalidDuration(input.to_string()))?;
            let unit = match c {
                's' => 1,
                'm' => 60,
                'h' => 3600,
                'd' => 86400,
                _ => return Err(ReloaderError::InvalidDuration(input.to_string())),
            };
            total += Duration::from_secs(value * unit);
            digits.clear();
            saw_component = true;
        }
    }
    if !digits.is_empty() || !saw_component {
        return Err(ReloaderError::InvalidDuration(input.to_string()));
    }
    Ok(total)
}

/// Pause `deployment`'s rollout for `duration`. Idempotent: a Deployment
/// that is already paused, by anyone, is left alone.
pub async fn pause_deployment(
    client: &Client,
    registry: &Arc<PauseTimerRegistry>,
    deployment: &Deployment,
    duration: Duration,
) -> Result<()> {
    let namespace = deployment.namespace().unwrap_or_default();
    let name = deployment.name_any();

    if deployment
        .spec
        .as_ref()
        .and_then(|s| s.paused)
        .unwrap_or(false)
    {
        debug!("Deployment {}/{} is already paused, not touching it", namespace, name);
        return Ok(());
    }

    let paused_at = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
    let patch = json!({
        "metadata": {
            "annotations": { annotations::PAUSED_AT: paused_at }
        },
        "spec": { "paused": true }
    });

    let api: Api<Deployment> = Api::namespaced(client.clone(), &namespace);
    if let Err(e) = api
        .patch(&name, &PatchParams::default(), &Patch::Strategic(patch))
        .await
    {
        warn!(
            "Patch failed while pausing {}/{}, falling back to update: {}",
            namespace, name, e
        );
        let mut updated = deployment.clone();
        updated.spec.get_or_insert_with(Default::default).paused = Some(true);
        updated
            .metadata
            .annotations
            .get_or_insert_with(Default::default)
            .insert(annotations::PAUSED_AT.to_string(), paused_at);
        api.replace(&name, &PostParams::default(), &updated).await?;
    }

    info!(
        "Paused deployment {}/{} for {:?}",
        namespace, name, duration
    );
    registry.schedule(client.clone(), &namespace, &name, duration);
    Ok(())
}

/// Resume a Deployment previously paused by this engine. Re-fetches the
/// object and backs off when it is not ours to resume.
pub async fn resume_deployment(
    client: &Client,
    registry: &PauseTimerRegistry,
    namespace: &str,
    name: &str,
) -> Result<()> {
    registry.cancel(namespace, name);

    let api: Api<Deployment> = Api::namespaced(client.clone(), namespace);
    let deployment = api.get(name).await?;

    if !paused_by_reloader(&deployment) {
        debug!(
            "Deployment {}/{} is not paused by the reloader, leaving it alone",
            namespace, name
        );
        return Ok(());
    }

    let patch = json!({
        "metadata": {
            "annotations": { annotations::PAUSED_AT: null }
        },
        "spec": { "paused": false }
    });
    if let Err(e) = api
        .patch(name, &PatchParams::default(), &Patch::Strategic(patch))
        .await
    {
        warn!(
            "Patch failed while resuming {}/{}, falling back to update: {}",
            namespace, name, e
        );
        let mut updated = deployment.clone();
        updated.spec.get_or_insert_with(Default::default).paused = Some(false);
        if let Some(annotations_map) = updated.metadata.annotations.as_mut() {
            annotations_map.remove(annotations::PAUSED_AT);
        }
        api.replace(name, &PostParams::default(), &updated).await?;
    }

    info!("Resumed deployment {}/{}", namespace, name);
    Ok(())
}

/// Reconcile a paused-by-reloader Deployment that has no in-process timer,
/// typically right after process start or a leadership handover.
///
/// Resumes immediately when the configured duration has already elapsed or
/// cannot be parsed (a malformed duration must not pause forever), and
/// otherwise schedules a timer for the remaining duration.
pub async fn handle_missing_timer(
    client: &Client,
    registry: &Arc<PauseTimerRegistry>,
    deployment: &Deployment,
    configured_duration: &str,
) -> Result<()> {
    let namespace = deployment.namespace().unwrap_or_default();
    let name = deployment.name_any();

    if !paused_by_reloader(deployment) || registry.contains(&namespace, &name) {
        return Ok(());
    }

    let duration = match parse_pause_duration(configured_duration) {
        Ok(d) => d,
        Err(e) => {
            warn!(
                "Unparsable pause duration on {}/{} ({}), resuming immediately",
                namespace, name, e
            );
            return resume_deployment(client, registry, &namespace, &name).await;
        }
    };

    let paused_at = deployment
        .annotations()
        .get(annotations::PAUSED_AT)
        .and_then(|v| DateTime::parse_from_rfc3339(v).ok());
    let Some(paused_at) = paused_at else {
        warn!(
            "Unparsable paused-at timestamp on {}/{}, resuming immediately",
            namespace, name
        );
        return resume_deployment(client, registry, &namespace, &name).await;
    };

    let elapsed = (Utc::now() - paused_at.with_timezone(&Utc))
        .to_std()
        .unwrap_or(Duration::ZERO);
    if elapsed >= duration {
        info!(
            "Pause on {}/{} expired while no timer was running, resuming",
            namespace, name
        );
        return resume_deployment(client, registry, &namespace, &name).await;
    }

    let remaining = duration - elapsed;
    debug!(
        "Rescheduling resume of {}/{} in {:?}",
        namespace, name, remaining
    );
    registry.schedule(client.clone(), &namespace, &name, remaining);
    Ok(())
}

/// Startup pass: rebuild timers for every paused-by-reloader Deployment that
/// requests a pause period.
pub async fn reconcile_paused_deployments(
    client: &Client,
    registry: &Arc<PauseTimerRegistry>,
) -> Result<()> {
    let api: Api<Deployment> = Api::all(client.clone());
    let deployments = api.list(&kube::api::ListParams::default()).await?;

    for deployment in deployments.items {
        if !paused_by_reloader(&deployment) {
            continue;
        }
        let namespace = deployment.namespace().unwrap_or_default();
        let name = deployment.name_any();

        // A pause period removed after the pause began must not leave the
        // Deployment paused forever
        let Some(period) = deployment.annotations().get(annotations::PAUSE_PERIOD).cloned() else {
            warn!(
                "Paused deployment {}/{} no longer requests a pause period, resuming",
                namespace, name
            );
            if let Err(e) = resume_deployment(client, registry, &namespace, &name).await {
                error!("Failed to resume deployment {}/{}: {}", namespace, name, e);
            }
            continue;
        };
        if let Err(e) = handle_missing_timer(client, registry, &deployment, &period).await {
            error!(
                "Failed to reconcile paused deployment {}/{}: {}",
                namespace, name, e
            );
        }
    }
    Ok(())
}
