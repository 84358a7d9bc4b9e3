// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Secret watcher - turns watch events into change events for the
//! upgrade engine.

use crate::config::Config;
use crate::hash;
use crate::pause::PauseTimerRegistry;
use crate::reconcilers::FingerprintCache;
use crate::upgrade::{self, ResourceChange, ResourceKind};
use futures::StreamExt;
use k8s_openapi::api::core::v1::Secret;
use kube::{Api, Client, ResourceExt};
use kube_runtime::watcher::{watcher, Config as WatcherConfig, Event};
use std::sync::Arc;
use tracing::{debug, error, warn};

pub struct SecretReconciler {
    client: Client,
    config: Arc<Config>,
    timers: Arc<PauseTimerRegistry>,
    cache: FingerprintCache,
}

impl SecretReconciler {
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
        let secrets: Api<Secret> = match &self.config.watch_namespace {
            Some(ns) => Api::namespaced(self.client.clone(), ns),
            None => Api::all(self.client.clone()),
        };

        let mut stream = watcher(secrets, WatcherConfig::default()).boxed();
        while let Some(event) = stream.next().await {
            match event {
                Ok(Event::Init) | Ok(Event::InitDone) => {}
                Ok(Event::InitApply(secret)) => self.prime(&secret),
                Ok(Event::Apply(secret)) => self.handle_apply(&secret).await,
                Ok(Event::Delete(secret)) => self.handle_delete(&secret).await,
                Err(e) => warn!("Secret watch error: {}", e),
            }
        }

        Ok(())
    }

    fn cache_key(secret: &Secret) -> String {
        format!(
            "Secret/{}/{}",
            secret.namespace().unwrap_or_default(),
            secret.name_any()
        )
    }

    fn prime(&self, secret: &Secret) {
        let sha = hash::secret_fingerprint(secret);
        self.cache
            .lock()
            .unwrap()
            .insert(Self::cache_key(secret), sha);
    }

    async fn handle_apply(&self, secret: &Secret) {
        let name = secret.name_any();
        let namespace = secret.namespace().unwrap_or_default();
        let sha = hash::secret_fingerprint(secret);

        let old_sha = self
            .cache
            .lock()
            .unwrap()
            .insert(Self::cache_key(secret), sha.clone());
        if old_sha.as_deref() == Some(sha.as_str()) {
            debug!("Secret {}/{} data unchanged, skipping", namespace, name);
            return;
        }

        let change = ResourceChange {
            namespace,
            name,
            kind: ResourceKind::Secret,
            sha_value: sha,
            old_sha_value: old_sha,
            annotations: secret.annotations().clone(),
            deleted: false,
        };
        self.dispatch(change).await;
    }

    async fn handle_delete(&self, secret: &Secret) {
        let old_sha = self.cache.lock().unwrap().remove(&Self::cache_key(secret));

        let change = ResourceChange {
            namespace: secret.namespace().unwrap_or_default(),
            name: secret.name_any(),
            kind: ResourceKind::Secret,
            sha_value: hash::empty_fingerprint(),
            old_sha_value: old_sha,
            annotations: secret.annotations().clone(),
            deleted: true,
        };
        self.dispatch(change).await;
    }

    async fn dispatch(&self, change: ResourceChange) {
        if let Err(e) =
            upgrade::handle_change(&self.client, &change, &self.config, &self.timers).await
        {
            error!(
                "Failed to process Secret {}/{}: {}",
                change.namespace, change.name, e
            );
        }
    }
}
