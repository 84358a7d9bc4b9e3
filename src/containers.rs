// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Finds the container inside a pod template that references a changed
//! ConfigMap/Secret.
//!
//! Volume mounts win over env references. Main containers win over init
//! containers; a reference found only in an init container redirects the
//! signal to the first main container, because init containers restart with
//! the pod anyway and carry no independent signal.

use crate::upgrade::ResourceKind;
use crate::workload::PodTemplate;
use k8s_openapi::api::core::v1::{Container, Volume};

/// Index into `template.containers` of the container that should carry the
/// reload signal, or `None` when the resource is not referenced.
/// `fallback_to_first` is the legacy behavior for named (non-auto) triggers.
pub fn find_target_container(
    template: &PodTemplate,
    resource_name: &str,
    kind: ResourceKind,
    fallback_to_first: bool,
) -> Option<usize> {
    if let Some(volume_name) = referencing_volume(&template.volumes, resource_name, kind) {
        if let Some(idx) = mounting_container(&template.containers, &volume_name) {
            return Some(idx);
        }
        if mounting_container(&template.init_containers, &volume_name).is_some() {
            return first_container(template);
        }
    }

    if let Some(idx) = env_referencing_container(&template.containers, resource_name, kind) {
        return Some(idx);
    }
    if env_referencing_container(&template.init_containers, resource_name, kind).is_some() {
        return first_container(template);
    }

    if fallback_to_first {
        return first_container(template);
    }
    None
}

fn first_container(template: &PodTemplate) -> Option<usize> {
    if template.containers.is_empty() {
        None
    } else {
        Some(0)
    }
}

/// Name of a volume sourced from the resource, plain or projected
fn referencing_volume(volumes: &[Volume], resource_name: &str, kind: ResourceKind) -> Option<String> {
    volumes
        .iter()
        .find(|v| match kind {
            ResourceKind::ConfigMap => {
                v.config_map
                    .as_ref()
                    .is_some_and(|s| s.name == resource_name)
                    || projected_references(v, |p| {
                        p.config_map.as_ref().is_some_and(|s| s.name == resource_name)
                    })
            }
            ResourceKind::Secret => {
                v.secret
                    .as_ref()
                    .is_some_and(|s| s.secret_name.as_deref() == Some(resource_name))
                    || projected_references(v, |p| {
                        p.secret.as_ref().is_some_and(|s| s.name == resource_name)
                    })
            }
        })
        .map(|v| v.name.clone())
}

fn projected_references(
    volume: &Volume,
    predicate: impl Fn(&k8s_openapi::api::core::v1::VolumeProjection) -> bool,
) -> bool {
    volume
        .projected
        .as_ref()
        .and_then(|p| p.sources.as_ref())
        .is_some_and(|sources| sources.iter().any(predicate))
}

fn mounting_container(containers: &[Container], volume_name: &str) -> Option<usize> {
    containers.iter().position(|c| {
        c.volume_mounts
            .as_ref()
            .is_some_and(|mounts| mounts.iter().any(|m| m.name == volume_name))
    })
}

fn env_referencing_container(
    containers: &[Container],
    resource_name: &str,
    kind: ResourceKind,
) -> Option<usize> {
    containers.iter().position(|c| {
        let env_hit = c.env.as_ref().is_some_and(|envs| {
            envs.iter().any(|e| {
                e.value_from.as_ref().is_some_and(|vf| match kind {
                    ResourceKind::ConfigMap => vf
                        .config_map_key_ref
                        .as_ref()
                        .is_some_and(|r| r.name == resource_name),
                    ResourceKind::Secret => vf
                        .secret_key_ref
                        .as_ref()
                        .is_some_and(|r| r.name == resource_name),
                })
            })
        });
        let env_from_hit = c.env_from.as_ref().is_some_and(|sources| {
            sources.iter().any(|s| match kind {
                ResourceKind::ConfigMap => s
                    .config_map_ref
                    .as_ref()
                    .is_some_and(|r| r.name == resource_name),
                ResourceKind::Secret => s
                    .secret_ref
                    .as_ref()
                    .is_some_and(|r| r.name == resource_name),
            })
        });
        env_hit || env_from_hit
    })
}
