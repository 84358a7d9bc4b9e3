// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Kubernetes API operations per workload kind.
//!
//! Jobs are immutable after creation, so a changed Job is deleted and an
//! equivalent one recreated under a generated name. CronJobs are never
//! touched themselves; a reload spawns a manually-instantiated Job from the
//! (already mutated) job template.

use crate::constants::OPERATOR_NAME;
use crate::error::{ReloaderError, Result};
use crate::workload::knative;
use crate::workload::rollout::Rollout;
use crate::workload::{Workload, WorkloadKind};
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, StatefulSet};
use k8s_openapi::api::batch::v1::{CronJob, Job};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::api::{DeleteParams, DynamicObject, ListParams, ObjectMeta, Patch, PostParams};
use kube::{Api, Client, ResourceExt};
use serde_json::Value;
use tracing::{debug, info};

/// Labels the Job controller stamps onto Jobs and their pod templates.
/// They pin the old pod selector and must not survive recreation.
const JOB_SYSTEM_LABELS: [&str; 4] = [
    "controller-uid",
    "job-name",
    "batch.kubernetes.io/controller-uid",
    "batch.kubernetes.io/job-name",
];

fn knative_api(client: &Client, namespace: &str) -> Api<DynamicObject> {
    Api::namespaced_with(client.clone(), namespace, &knative::api_resource())
}

/// List every instance of `kind` in `namespace`. A 404 means the kind's CRD
/// is not installed (or the list is empty for the core kinds) and yields an
/// empty list rather than an error.
pub async fn list_workloads(
    client: &Client,
    namespace: &str,
    kind: WorkloadKind,
) -> Result<Vec<Workload>> {
    let lp = ListParams::default();
    let items = match kind {
        WorkloadKind::Deployment => {
            let api: Api<Deployment> = Api::namespaced(client.clone(), namespace);
            collect(api.list(&lp).await, Workload::Deployment)?
        }
        WorkloadKind::DaemonSet => {
            let api: Api<DaemonSet> = Api::namespaced(client.clone(), namespace);
            collect(api.list(&lp).await, Workload::DaemonSet)?
        }
        WorkloadKind::StatefulSet => {
            let api: Api<StatefulSet> = Api::namespaced(client.clone(), namespace);
            collect(api.list(&lp).await, Workload::StatefulSet)?
        }
        WorkloadKind::Job => {
            let api: Api<Job> = Api::namespaced(client.clone(), namespace);
            collect(api.list(&lp).await, Workload::Job)?
        }
        WorkloadKind::CronJob => {
            let api: Api<CronJob> = Api::namespaced(client.clone(), namespace);
            collect(api.list(&lp).await, Workload::CronJob)?
        }
        WorkloadKind::Rollout => {
            let api: Api<Rollout> = Api::namespaced(client.clone(), namespace);
            collect(api.list(&lp).await, Workload::Rollout)?
        }
        WorkloadKind::KnativeService => {
            collect(knative_api(client, namespace).list(&lp).await, Workload::KnativeService)?
        }
    };
    Ok(items)
}

fn collect<K>(
    result: kube::Result<kube::core::ObjectList<K>>,
    wrap: fn(K) -> Workload,
) -> Result<Vec<Workload>>
where
    K: Clone,
{
    match result {
        Ok(list) => Ok(list.items.into_iter().map(wrap).collect()),
        Err(kube::Error::Api(err)) if err.code == 404 => Ok(Vec::new()),
        Err(e) => Err(e.into()),
    }
}

/// Persist a mutated workload with a full object update
pub async fn update_workload(client: &Client, workload: &Workload) -> Result<()> {
    let namespace = workload.namespace();
    let name = workload.name();
    let pp = PostParams::default();

    match workload {
        Workload::Deployment(d) => {
            let api: Api<Deployment> = Api::namespaced(client.clone(), &namespace);
            api.replace(&name, &pp, d).await?;
        }
        Workload::DaemonSet(d) => {
            let api: Api<DaemonSet> = Api::namespaced(client.clone(), &namespace);
            api.replace(&name, &pp, d).await?;
        }
        Workload::StatefulSet(s) => {
            let api: Api<StatefulSet> = Api::namespaced(client.clone(), &namespace);
            api.replace(&name, &pp, s).await?;
        }
        Workload::Job(j) => recreate_job(client, &namespace, j).await?,
        Workload::CronJob(c) => spawn_job_from_cronjob(client, &namespace, c).await?,
        Workload::Rollout(r) => {
            let api: Api<Rollout> = Api::namespaced(client.clone(), &namespace);
            api.replace(&name, &pp, r).await?;
        }
        Workload::KnativeService(s) => {
            knative_api(client, &namespace).replace(&name, &pp, s).await?;
        }
    }
    Ok(())
}

/// Persist a partial patch. Only valid for kinds where
/// [`Workload::supports_patch`] holds; the others return a typed
/// "not supported" error the caller falls back from.
pub async fn patch_workload(
    client: &Client,
    workload: &Workload,
    patch: &Patch<Value>,
) -> Result<()> {
    let namespace = workload.namespace();
    let name = workload.name();
    let pp = kube::api::PatchParams {
        field_manager: Some(OPERATOR_NAME.to_string()),
        ..Default::default()
    };

    match workload {
        Workload::Deployment(_) => {
            let api: Api<Deployment> = Api::namespaced(client.clone(), &namespace);
            api.patch(&name, &pp, patch).await?;
        }
        Workload::DaemonSet(_) => {
            let api: Api<DaemonSet> = Api::namespaced(client.clone(), &namespace);
            api.patch(&name, &pp, patch).await?;
        }
        Workload::StatefulSet(_) => {
            let api: Api<StatefulSet> = Api::namespaced(client.clone(), &namespace);
            api.patch(&name, &pp, patch).await?;
        }
        Workload::Rollout(r) if r.uses_restart_strategy() => {
            // The API server rejects strategic merge on custom resources,
            // a plain merge patch carries the same annotation payload
            let api: Api<Rollout> = Api::namespaced(client.clone(), &namespace);
            match patch {
                Patch::Strategic(value) => {
                    api.patch(&name, &pp, &Patch::Merge(value.clone())).await?;
                }
                other => {
                    api.patch(&name, &pp, other).await?;
                }
            }
        }
        Workload::Job(_) => return Err(ReloaderError::PatchNotSupported("Job")),
        Workload::CronJob(_) => return Err(ReloaderError::PatchNotSupported("CronJob")),
        Workload::Rollout(_) => return Err(ReloaderError::PatchNotSupported("Rollout")),
        Workload::KnativeService(_) => return Err(ReloaderError::PatchNotSupported("Service")),
    }
    Ok(())
}

/// Delete `job` with background propagation and recreate an equivalent Job
/// under a generated name, stripped of immutable and system-assigned fields
async fn recreate_job(client: &Client, namespace: &str, job: &Job) -> Result<()> {
    let api: Api<Job> = Api::namespaced(client.clone(), namespace);
    let name = job.name_any();

    info!("Recreating job {}/{}", namespace, name);
    match api.delete(&name, &DeleteParams::background()).await {
        Ok(_) => {}
        Err(kube::Error::Api(err)) if err.code == 404 => {
            debug!("Job {}/{} already gone before recreation", namespace, name);
        }
        Err(e) => return Err(e.into()),
    }

    api.create(&PostParams::default(), &replacement_job(namespace, job))
        .await?;
    Ok(())
}

/// The recreated Job: same spec under a generated name, with the selector
/// and system-assigned labels stripped
fn replacement_job(namespace: &str, job: &Job) -> Job {
    let mut replacement = Job {
        metadata: ObjectMeta {
            generate_name: Some(format!("{}-", job.name_any())),
            namespace: Some(namespace.to_string()),
            labels: strip_job_labels(job.labels()),
            annotations: job.metadata.annotations.clone(),
            ..Default::default()
        },
        spec: job.spec.clone(),
        ..Default::default()
    };
    if let Some(spec) = replacement.spec.as_mut() {
        // The selector and its matching template labels are system-assigned
        spec.selector = None;
        if let Some(meta) = spec.template.metadata.as_mut() {
            if let Some(labels) = meta.labels.take() {
                meta.labels = strip_job_labels(&labels);
            }
        }
    }
    replacement
}

fn strip_job_labels(
    labels: &std::collections::BTreeMap<String, String>,
) -> Option<std::collections::BTreeMap<String, String>> {
    let stripped: std::collections::BTreeMap<String, String> = labels
        .iter()
        .filter(|(k, _)| !JOB_SYSTEM_LABELS.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    if stripped.is_empty() {
        None
    } else {
        Some(stripped)
    }
}

/// Create a manually-instantiated Job from a CronJob's (mutated) job
/// template, owned by the CronJob. The CronJob object itself is untouched.
async fn spawn_job_from_cronjob(client: &Client, namespace: &str, cronjob: &CronJob) -> Result<()> {
    let job = manual_job(namespace, cronjob)?;

    info!(
        "Spawning manual job for cronjob {}/{}",
        namespace,
        cronjob.name_any()
    );
    let api: Api<Job> = Api::namespaced(client.clone(), namespace);
    api.create(&PostParams::default(), &job).await?;
    Ok(())
}

/// The manual Job spawned for a reloaded CronJob, marked the way
/// `kubectl create job --from=cronjob/...` marks it and owned by the CronJob
fn manual_job(namespace: &str, cronjob: &CronJob) -> Result<Job> {
    let name = cronjob.name_any();
    let Some(job_spec) = cronjob.spec.as_ref().and_then(|s| s.job_template.spec.clone()) else {
        return Err(ReloaderError::MissingMetadata(format!(
            "CronJob {}/{} has no job template",
            namespace, name
        )));
    };

    let owner = cronjob.metadata.uid.as_ref().map(|uid| OwnerReference {
        api_version: "batch/v1".to_string(),
        kind: "CronJob".to_string(),
        name: name.clone(),
        uid: uid.clone(),
        controller: Some(true),
        ..Default::default()
    });

    Ok(Job {
        metadata: ObjectMeta {
            generate_name: Some(format!("{}-", name)),
            namespace: Some(namespace.to_string()),
            annotations: Some(
                [(
                    "cronjob.kubernetes.io/instantiate".to_string(),
                    "manual".to_string(),
                )]
                .into_iter()
                .collect(),
            ),
            owner_references: owner.map(|o| vec![o]),
            ..Default::default()
        },
        spec: Some(job_spec),
        ..Default::default()
    })
}
