// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! The two reload strategies and their patch payloads.
//!
//! EnvVars injects a synthetic env var named after the changed resource into
//! the selected container; Annotations stamps a single pod-template
//! annotation. Both are idempotent: re-applying the same fingerprint is a
//! NotUpdated no-op.

use crate::constants::{annotations, ENV_VAR_PREFIX};
use crate::upgrade::ResourceKind;
use k8s_openapi::api::core::v1::{Container, EnvVar};
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// Outcome of applying a strategy to one workload. Only `Updated` leads to
/// a persist; the others are expected control results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpgradeResult {
    Updated,
    NotUpdated,
    NoContainerFound,
}

/// `STAKATER_<UPPER_SNAKE(resource)>_<CONFIGMAP|SECRET>`
pub fn env_var_name(resource_name: &str, kind: ResourceKind) -> String {
    format!(
        "{}{}_{}",
        ENV_VAR_PREFIX,
        to_upper_snake(resource_name),
        kind.env_suffix()
    )
}

/// Any run of non-alphanumeric characters collapses to a single `_`,
/// e.g. `www.stakater.com` becomes `WWW_STAKATER_COM`
fn to_upper_snake(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut last_was_separator = false;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            out.extend(c.to_uppercase());
            last_was_separator = false;
        } else if !last_was_separator && !out.is_empty() {
            out.push('_');
            last_was_separator = true;
        }
    }
    if out.ends_with('_') {
        out.pop();
    }
    out
}

/// Upsert the signal env var on `container`
pub fn apply_env_var(container: &mut Container, name: &str, value: &str) -> UpgradeResult {
    let envs = container.env.get_or_insert_with(Vec::new);
    match envs.iter_mut().find(|e| e.name == name) {
        Some(existing) if existing.value.as_deref() == Some(value) => UpgradeResult::NotUpdated,
        Some(existing) => {
            existing.value = Some(value.to_string());
            existing.value_from = None;
            UpgradeResult::Updated
        }
        None => {
            envs.push(EnvVar {
                name: name.to_string(),
                value: Some(value.to_string()),
                ..Default::default()
            });
            UpgradeResult::Updated
        }
    }
}

/// Remove the signal env var from `container`, returning the index it held
/// so patch-capable callers can address it in a JSON-patch remove op
pub fn remove_env_var(container: &mut Container, name: &str) -> (UpgradeResult, Option<usize>) {
    let Some(envs) = container.env.as_mut() else {
        return (UpgradeResult::NotUpdated, None);
    };
    match envs.iter().position(|e| e.name == name) {
        Some(idx) => {
            envs.remove(idx);
            (UpgradeResult::Updated, Some(idx))
        }
        None => (UpgradeResult::NotUpdated, None),
    }
}

/// Overwrite the single last-reloaded-from pod-template annotation,
/// regardless of which resource triggered the reload
pub fn apply_annotation(
    template_annotations: &mut BTreeMap<String, String>,
    fingerprint: &str,
) -> UpgradeResult {
    if template_annotations.get(annotations::LAST_RELOADED_FROM).map(String::as_str)
        == Some(fingerprint)
    {
        return UpgradeResult::NotUpdated;
    }
    template_annotations.insert(
        annotations::LAST_RELOADED_FROM.to_string(),
        fingerprint.to_string(),
    );
    UpgradeResult::Updated
}

/// Strategic-merge-patch scoped to a single env var of a single container
pub fn env_var_patch(container_name: &str, env_name: &str, value: &str) -> Value {
    json!({
        "spec": {
            "template": {
                "spec": {
                    "containers": [{
                        "name": container_name,
                        "env": [{
                            "name": env_name,
                            "value": value,
                        }]
                    }]
                }
            }
        }
    })
}

/// Strategic-merge-patch carrying only the last-reloaded-from annotation
pub fn annotation_patch(fingerprint: &str) -> Value {
    json!({
        "spec": {
            "template": {
                "metadata": {
                    "annotations": {
                        annotations::LAST_RELOADED_FROM: fingerprint,
                    }
                }
            }
        }
    })
}

/// RFC 6902 remove of one env var, addressed by container and env index
pub fn env_var_remove_patch(
    container_index: usize,
    env_index: usize,
) -> serde_json::Result<json_patch::Patch> {
    serde_json::from_value(json!([{
        "op": "remove",
        "path": format!("/spec/template/spec/containers/{}/env/{}", container_index, env_index),
    }]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_container() -> Container {
        Container {
            name: "main".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_env_var_name_upper_snake() {
        assert_eq!(
            env_var_name("www.stakater.com", ResourceKind::ConfigMap),
            "STAKATER_WWW_STAKATER_COM_CONFIGMAP"
        );
        assert_eq!(
            env_var_name("cm1", ResourceKind::ConfigMap),
            "STAKATER_CM1_CONFIGMAP"
        );
        assert_eq!(env_var_name("db-creds", ResourceKind::Secret), "STAKATER_DB_CREDS_SECRET");
    }

    #[test]
    fn test_to_upper_snake_collapses_separator_runs() {
        assert_eq!(to_upper_snake("a..b--c"), "A_B_C");
        assert_eq!(to_upper_snake("-leading.and.trailing-"), "LEADING_AND_TRAILING");
    }

    #[test]
    fn test_apply_env_var_is_idempotent() {
        let mut container = make_container();

        assert_eq!(
            apply_env_var(&mut container, "STAKATER_CM1_CONFIGMAP", "sha1"),
            UpgradeResult::Updated
        );
        assert_eq!(
            apply_env_var(&mut container, "STAKATER_CM1_CONFIGMAP", "sha1"),
            UpgradeResult::NotUpdated
        );
        // Never a second copy of the same variable
        assert_eq!(container.env.as_ref().unwrap().len(), 1);
    }

    #[test]
    fn test_apply_env_var_updates_in_place() {
        let mut container = make_container();
        apply_env_var(&mut container, "STAKATER_CM1_CONFIGMAP", "sha1");

        assert_eq!(
            apply_env_var(&mut container, "STAKATER_CM1_CONFIGMAP", "sha2"),
            UpgradeResult::Updated
        );
        let envs = container.env.as_ref().unwrap();
        assert_eq!(envs.len(), 1);
        assert_eq!(envs[0].value.as_deref(), Some("sha2"));
    }

    #[test]
    fn test_remove_env_var_idempotent() {
        let mut container = make_container();
        apply_env_var(&mut container, "STAKATER_CM1_CONFIGMAP", "sha1");

        let (result, idx) = remove_env_var(&mut container, "STAKATER_CM1_CONFIGMAP");
        assert_eq!(result, UpgradeResult::Updated);
        assert_eq!(idx, Some(0));

        let (result, idx) = remove_env_var(&mut container, "STAKATER_CM1_CONFIGMAP");
        assert_eq!(result, UpgradeResult::NotUpdated);
        assert_eq!(idx, None);
    }

    #[test]
    fn test_apply_annotation_overwrites_previous_resource() {
        let mut template_annotations = BTreeMap::new();

        assert_eq!(
            apply_annotation(&mut template_annotations, "sha-from-cm1"),
            UpgradeResult::Updated
        );
        assert_eq!(
            apply_annotation(&mut template_annotations, "sha-from-secret2"),
            UpgradeResult::Updated
        );
        assert_eq!(
            apply_annotation(&mut template_annotations, "sha-from-secret2"),
            UpgradeResult::NotUpdated
        );
        // A single annotation, not one per resource
        assert_eq!(template_annotations.len(), 1);
    }

    #[test]
    fn test_env_var_patch_shape() {
        let patch = env_var_patch("main", "STAKATER_CM1_CONFIGMAP", "sha1");
        assert_eq!(
            patch["spec"]["template"]["spec"]["containers"][0]["name"],
            "main"
        );
        assert_eq!(
            patch["spec"]["template"]["spec"]["containers"][0]["env"][0]["value"],
            "sha1"
        );
    }

    #[test]
    fn test_env_var_remove_patch_addresses_indices() {
        let patch = env_var_remove_patch(2, 5).unwrap();
        let value = serde_json::to_value(&patch).unwrap();
        assert_eq!(value[0]["op"], "remove");
        assert_eq!(value[0]["path"], "/spec/template/spec/containers/2/env/5");
    }
}
