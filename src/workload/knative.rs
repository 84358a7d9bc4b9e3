// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Accessors for Knative Services, which the reloader manipulates as
//! unstructured objects because their schema is not statically linked.
//!
//! All getters tolerate missing fields and return empty defaults; setters
//! create the intermediate objects they need.

use crate::workload::PodTemplate;
use k8s_openapi::api::core::v1::{Container, Volume};
use kube::api::{ApiResource, DynamicObject, GroupVersionKind};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// The Knative serving Service kind
pub fn api_resource() -> ApiResource {
    ApiResource::from_gvk(&GroupVersionKind::gvk("serving.knative.dev", "v1", "Service"))
}

/// Walk `path` through nested objects, returning None on any missing step
fn get_path<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    let mut current = value;
    for segment in path {
        current = current.get(segment)?;
    }
    Some(current)
}

/// Walk `path` through nested objects, creating empty objects along the way
fn ensure_path<'a>(value: &'a mut Value, path: &[&str]) -> &'a mut Value {
    let mut current = value;
    for segment in path {
        if !current.is_object() {
            *current = Value::Object(Map::new());
        }
        current = current
            .as_object_mut()
            .expect("just ensured an object")
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    current
}

fn typed_list<T: serde::de::DeserializeOwned>(value: Option<&Value>) -> Vec<T> {
    value
        .cloned()
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or_default()
}

/// Extract the pod template parts from `spec.template` of a Knative Service
pub fn pod_template(service: &DynamicObject) -> PodTemplate {
    let mut template = PodTemplate::default();

    let data = &service.data;
    if let Some(meta_annotations) =
        get_path(data, &["spec", "template", "metadata", "annotations"])
    {
        if let Ok(map) = serde_json::from_value::<BTreeMap<String, String>>(meta_annotations.clone())
        {
            template.annotations = map;
        }
    }

    let pod_spec = get_path(data, &["spec", "template", "spec"]);
    template.containers = typed_list::<Container>(pod_spec.and_then(|s| s.get("containers")));
    template.init_containers = typed_list::<Container>(pod_spec.and_then(|s| s.get("initContainers")));
    template.volumes = typed_list::<Volume>(pod_spec.and_then(|s| s.get("volumes")));

    template
}

/// Write mutated pod template parts back under `spec.template`
pub fn set_pod_template(
    service: &mut DynamicObject,
    template: &PodTemplate,
) -> serde_json::Result<()> {
    let meta = ensure_path(&mut service.data, &["spec", "template", "metadata"]);
    meta.as_object_mut()
        .expect("ensure_path yields an object")
        .insert(
            "annotations".to_string(),
            serde_json::to_value(&template.annotations)?,
        );

    let pod_spec = ensure_path(&mut service.data, &["spec", "template", "spec"]);
    let spec_map = pod_spec.as_object_mut().expect("ensure_path yields an object");
    spec_map.insert(
        "containers".to_string(),
        serde_json::to_value(&template.containers)?,
    );
    if !template.init_containers.is_empty() {
        spec_map.insert(
            "initContainers".to_string(),
            serde_json::to_value(&template.init_containers)?,
        );
    }
    if !template.volumes.is_empty() {
        spec_map.insert("volumes".to_string(), serde_json::to_value(&template.volumes)?);
    }

    Ok(())
}

/// Build an otherwise empty Knative Service from raw JSON data
pub fn service_from_data(name: &str, namespace: &str, data: Value) -> DynamicObject {
    let mut service = DynamicObject::new(name, &api_resource()).within(namespace);
    service.data = data;
    service
}
