// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! ConfigMap watcher - turns watch events into change events for the
//! upgrade engine.

use crate::config::Config;
use crate::hash;
use crate::pause::PauseTimerRegistry;
use crate::reconcilers::FingerprintCache;
use crate::upgrade::{self, ResourceChange, ResourceKind};
use futures::StreamExt;
use k8s_openapi::api::core::v1::ConfigMap;
use kube::{Api, Client, ResourceExt};
use kube_runtime::watcher::{watcher, Config as WatcherConfig, Event};
use std::sync::Arc;
use tracing::{debug, error, warn};

pub struct ConfigMapReconciler {
    client: Client,
    config: Arc<Config>,
    timers: Arc<PauseTimerRegistry>,
    cache: FingerprintCache,
}

impl ConfigMapReconciler {
    pub fn new(
        client: Client,
        config: Arc<Config>,
        timers: Arc<PauseTimerRegistry>,
        cache: FingerprintCache,
    ) -> Self {
        Self {
            client,
            config,
            timers,
            cache,
        }
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let configmaps: Api<ConfigMap> = match &self.config.watch_namespace {
            Some(ns) => Api::namespaced(self.client.clone(), ns),
            None => Api::all(self.client.clone()),
        };

        let mut stream = watcher(configmaps, WatcherConfig::default()).boxed();
        while let Some(event) = stream.next().await {
            match event {
                Ok(Event::Init) | Ok(Event::InitDone) => {}
                // Pre-existing resources only seed the cache; a restart of
                // the operator must not reload every workload
                Ok(Event::InitApply(cm)) => self.prime(&cm),
                Ok(Event::Apply(cm)) => self.handle_apply(&cm).await,
                Ok(Event::Delete(cm)) => self.handle_delete(&cm).await,
                Err(e) => warn!("ConfigMap watch error: {}", e),
            }
        }

        Ok(())
    }

    fn cache_key(cm: &ConfigMap) -> String {
        format!(
            "ConfigMap/{}/{}",
            cm.namespace().unwrap_or_default(),
            cm.name_any()
        )
    }

    fn prime(&self, cm: &ConfigMap) {
        let sha = hash::configmap_fingerprint(cm);
        self.cache.lock().unwrap().insert(Self::cache_key(cm), sha);
    }

    async fn handle_apply(&self, cm: &ConfigMap) {
        let name = cm.name_any();
        let namespace = cm.namespace().unwrap_or_default();
        let sha = hash::configmap_fingerprint(cm);

        let old_sha = self
            .cache
            .lock()
            .unwrap()
            .insert(Self::cache_key(cm), sha.clone());
        if old_sha.as_deref() == Some(sha.as_str()) {
            debug!("ConfigMap {}/{} data unchanged, skipping", namespace, name);
            return;
        }

        let change = ResourceChange {
            namespace,
            name,
            kind: ResourceKind::ConfigMap,
            sha_value: sha,
            old_sha_value: old_sha,
            annotations: cm.annotations().clone(),
            deleted: false,
        };
        self.dispatch(change).await;
    }

    async fn handle_delete(&self, cm: &ConfigMap) {
        let old_sha = self.cache.lock().unwrap().remove(&Self::cache_key(cm));

        let change = ResourceChange {
            namespace: cm.namespace().unwrap_or_default(),
            name: cm.name_any(),
            kind: ResourceKind::ConfigMap,
            sha_value: hash::empty_fingerprint(),
            old_sha_value: old_sha,
            annotations: cm.annotations().clone(),
            deleted: true,
        };
        self.dispatch(change).await;
    }

    async fn dispatch(&self, change: ResourceChange) {
        if let Err(e) =
            upgrade::handle_change(&self.client, &change, &self.config, &self.timers).await
        {
            error!(
                "Failed to process ConfigMap {}/{}: {}",
                change.namespace, change.name, e
            );
        }
    }
}
