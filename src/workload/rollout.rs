// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::constants::annotations;
use k8s_openapi::api::core::v1::PodTemplateSpec;
use kube::{CustomResource, ResourceExt};
use serde::{Deserialize, Serialize};

/// The subset of the Argo Rollout schema the reloader needs: the pod
/// template it stamps, and nothing else. Unknown fields round-trip through
/// the API server untouched because updates go through patches whenever the
/// restart strategy is selected.
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, schemars::JsonSchema)]
#[kube(group = "argoproj.io", version = "v1alpha1", kind = "Rollout")]
#[kube(namespaced)]
#[serde(rename_all = "camelCase")]
pub struct RolloutSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<PodTemplateSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,
}

impl Rollout {
    /// Rollouts are only patched when the user opted into the restart
    /// strategy; the default rollout strategy goes through a full update.
    pub fn uses_restart_strategy(&self) -> bool {
        self.annotations()
            .get(annotations::ROLLOUT_STRATEGY)
            .is_some_and(|v| v == "restart")
    }
}
