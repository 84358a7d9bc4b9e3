// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Kind-agnostic view over the seven supported workload kinds.
//!
//! The rest of the engine only ever sees [`Workload`] and [`PodTemplate`];
//! everything kind-specific lives behind the accessors here and the API
//! operations in [`api`].

pub mod api;
pub mod knative;
pub mod rollout;

use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, StatefulSet};
use k8s_openapi::api::batch::v1::{CronJob, Job};
use k8s_openapi::api::core::v1::{Container, PodTemplateSpec, Volume};
use kube::api::DynamicObject;
use kube::ResourceExt;
use rollout::Rollout;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkloadKind {
    Deployment,
    DaemonSet,
    StatefulSet,
    Job,
    CronJob,
    Rollout,
    KnativeService,
}

impl WorkloadKind {
    pub const ALL: [WorkloadKind; 7] = [
        WorkloadKind::Deployment,
        WorkloadKind::DaemonSet,
        WorkloadKind::StatefulSet,
        WorkloadKind::Job,
        WorkloadKind::CronJob,
        WorkloadKind::Rollout,
        WorkloadKind::KnativeService,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkloadKind::Deployment => "Deployment",
            WorkloadKind::DaemonSet => "DaemonSet",
            WorkloadKind::StatefulSet => "StatefulSet",
            WorkloadKind::Job => "Job",
            WorkloadKind::CronJob => "CronJob",
            WorkloadKind::Rollout => "Rollout",
            WorkloadKind::KnativeService => "Service",
        }
    }
}

/// The pieces of a pod template the reload engine reads and mutates.
/// Extracted with [`Workload::pod_template`], written back with
/// [`Workload::set_pod_template`].
#[derive(Debug, Clone, Default)]
pub struct PodTemplate {
    pub annotations: BTreeMap<String, String>,
    pub volumes: Vec<Volume>,
    pub containers: Vec<Container>,
    pub init_containers: Vec<Container>,
}

impl PodTemplate {
    fn from_spec(spec: Option<&PodTemplateSpec>) -> Self {
        let Some(spec) = spec else {
            return Self::default();
        };
        let pod_spec = spec.spec.as_ref();
        PodTemplate {
            annotations: spec
                .metadata
                .as_ref()
                .and_then(|m| m.annotations.clone())
                .unwrap_or_default(),
            volumes: pod_spec.and_then(|s| s.volumes.clone()).unwrap_or_default(),
            containers: pod_spec.map(|s| s.containers.clone()).unwrap_or_default(),
            init_containers: pod_spec
                .and_then(|s| s.init_containers.clone())
                .unwrap_or_default(),
        }
    }

    fn write_to_spec(&self, spec: &mut PodTemplateSpec) {
        spec.metadata
            .get_or_insert_with(Default::default)
            .annotations = Some(self.annotations.clone());
        let pod_spec = spec.spec.get_or_insert_with(Default::default);
        pod_spec.containers = self.containers.clone();
        if !self.init_containers.is_empty() {
            pod_spec.init_containers = Some(self.init_containers.clone());
        }
        if !self.volumes.is_empty() {
            pod_spec.volumes = Some(self.volumes.clone());
        }
    }
}

/// One instance of a supported workload kind
#[derive(Debug, Clone)]
pub enum Workload {
    Deployment(Deployment),
    DaemonSet(DaemonSet),
    StatefulSet(StatefulSet),
    Job(Job),
    CronJob(CronJob),
    Rollout(Rollout),
    KnativeService(DynamicObject),
}

impl Workload {
    pub fn kind(&self) -> WorkloadKind {
        match self {
            Workload::Deployment(_) => WorkloadKind::Deployment,
            Workload::DaemonSet(_) => WorkloadKind::DaemonSet,
            Workload::StatefulSet(_) => WorkloadKind::StatefulSet,
            Workload::Job(_) => WorkloadKind::Job,
            Workload::CronJob(_) => WorkloadKind::CronJob,
            Workload::Rollout(_) => WorkloadKind::Rollout,
            Workload::KnativeService(_) => WorkloadKind::KnativeService,
        }
    }

    pub fn name(&self) -> String {
        match self {
            Workload::Deployment(d) => d.name_any(),
            Workload::DaemonSet(d) => d.name_any(),
            Workload::StatefulSet(s) => s.name_any(),
            Workload::Job(j) => j.name_any(),
            Workload::CronJob(c) => c.name_any(),
            Workload::Rollout(r) => r.name_any(),
            Workload::KnativeService(s) => s.name_any(),
        }
    }

    pub fn namespace(&self) -> String {
        match self {
            Workload::Deployment(d) => d.namespace(),
            Workload::DaemonSet(d) => d.namespace(),
            Workload::StatefulSet(s) => s.namespace(),
            Workload::Job(j) => j.namespace(),
            Workload::CronJob(c) => c.namespace(),
            Workload::Rollout(r) => r.namespace(),
            Workload::KnativeService(s) => s.namespace(),
        }
        .unwrap_or_default()
    }

    /// Workload-level annotations, the ones trigger matching reads
    pub fn annotations(&self) -> &BTreeMap<String, String> {
        match self {
            Workload::Deployment(d) => d.annotations(),
            Workload::DaemonSet(d) => d.annotations(),
            Workload::StatefulSet(s) => s.annotations(),
            Workload::Job(j) => j.annotations(),
            Workload::CronJob(c) => c.annotations(),
            Workload::Rollout(r) => r.annotations(),
            Workload::KnativeService(s) => s.annotations(),
        }
    }

    /// Extract the pod template parts, with empty defaults for anything
    /// the object does not carry
    pub fn pod_template(&self) -> PodTemplate {
        match self {
            Workload::Deployment(d) => {
                PodTemplate::from_spec(d.spec.as_ref().map(|s| &s.template))
            }
            Workload::DaemonSet(d) => {
                PodTemplate::from_spec(d.spec.as_ref().map(|s| &s.template))
            }
            Workload::StatefulSet(s) => {
                PodTemplate::from_spec(s.spec.as_ref().map(|s| &s.template))
            }
            Workload::Job(j) => PodTemplate::from_spec(j.spec.as_ref().map(|s| &s.template)),
            Workload::CronJob(c) => PodTemplate::from_spec(
                c.spec
                    .as_ref()
                    .and_then(|s| s.job_template.spec.as_ref())
                    .map(|s| &s.template),
            ),
            Workload::Rollout(r) => PodTemplate::from_spec(r.spec.template.as_ref()),
            Workload::KnativeService(s) => knative::pod_template(s),
        }
    }

    /// Write mutated pod template parts back into the object, creating any
    /// absent intermediate structs/maps
    pub fn set_pod_template(&mut self, template: &PodTemplate) -> crate::error::Result<()> {
        match self {
            Workload::Deployment(d) => {
                template.write_to_spec(&mut d.spec.get_or_insert_with(Default::default).template)
            }
            Workload::DaemonSet(d) => {
                template.write_to_spec(&mut d.spec.get_or_insert_with(Default::default).template)
            }
            Workload::StatefulSet(s) => {
                template.write_to_spec(&mut s.spec.get_or_insert_with(Default::default).template)
            }
            Workload::Job(j) => {
                template.write_to_spec(&mut j.spec.get_or_insert_with(Default::default).template)
            }
            Workload::CronJob(c) => template.write_to_spec(
                &mut c
                    .spec
                    .get_or_insert_with(Default::default)
                    .job_template
                    .spec
                    .get_or_insert_with(Default::default)
                    .template,
            ),
            Workload::Rollout(r) => {
                template.write_to_spec(r.spec.template.get_or_insert_with(Default::default))
            }
            Workload::KnativeService(s) => knative::set_pod_template(s, template)?,
        }
        Ok(())
    }

    /// Whether this object can be mutated through a partial patch.
    /// Job/CronJob are immutable or recreated, Knative Services go through a
    /// full update, Rollouts only patch under the restart strategy.
    pub fn supports_patch(&self) -> bool {
        match self {
            Workload::Deployment(_) | Workload::DaemonSet(_) | Workload::StatefulSet(_) => true,
            Workload::Rollout(r) => r.uses_restart_strategy(),
            Workload::Job(_) | Workload::CronJob(_) | Workload::KnativeService(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::annotations;
    use k8s_openapi::api::apps::v1::DeploymentSpec;
    use k8s_openapi::api::batch::v1::{CronJobSpec, JobSpec, JobTemplateSpec};
    use k8s_openapi::api::core::v1::PodSpec;
    use kube::api::ObjectMeta;
    use serde_json::json;

    fn make_deployment(
        name: &str,
        annotations: Option<BTreeMap<String, String>>,
        containers: Vec<Container>,
    ) -> Deployment {
        Deployment {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some("default".to_string()),
                annotations,
                ..Default::default()
            },
            spec: Some(DeploymentSpec {
                template: PodTemplateSpec {
                    metadata: None,
                    spec: Some(PodSpec {
                        containers,
                        ..Default::default()
                    }),
                },
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn make_container(name: &str) -> Container {
        Container {
            name: name.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_deployment_pod_template_roundtrip() {
        let deployment = make_deployment("web", None, vec![make_container("main")]);
        let mut workload = Workload::Deployment(deployment);

        let mut template = workload.pod_template();
        assert_eq!(template.containers.len(), 1);
        assert!(template.annotations.is_empty());

        template
            .annotations
            .insert("stamp".to_string(), "abc".to_string());
        workload.set_pod_template(&template).unwrap();

        let reread = workload.pod_template();
        assert_eq!(reread.annotations.get("stamp").unwrap(), "abc");
    }

    #[test]
    fn test_cronjob_pod_template_goes_through_job_template() {
        let cronjob = CronJob {
            metadata: ObjectMeta {
                name: Some("nightly".to_string()),
                namespace: Some("default".to_string()),
                ..Default::default()
            },
            spec: Some(CronJobSpec {
                job_template: JobTemplateSpec {
                    spec: Some(JobSpec {
                        template: PodTemplateSpec {
                            metadata: None,
                            spec: Some(PodSpec {
                                containers: vec![make_container("task")],
                                ..Default::default()
                            }),
                        },
                        ..Default::default()
                    }),
                    ..Default::default()
                },
                ..Default::default()
            }),
            ..Default::default()
        };

        let workload = Workload::CronJob(cronjob);
        let template = workload.pod_template();
        assert_eq!(template.containers[0].name, "task");
    }

    #[test]
    fn test_empty_workload_yields_empty_template() {
        let workload = Workload::Deployment(Deployment::default());
        let template = workload.pod_template();
        assert!(template.containers.is_empty());
        assert!(template.volumes.is_empty());
    }

    #[test]
    fn test_supports_patch_matrix() {
        assert!(Workload::Deployment(Deployment::default()).supports_patch());
        assert!(Workload::DaemonSet(DaemonSet::default()).supports_patch());
        assert!(Workload::StatefulSet(StatefulSet::default()).supports_patch());
        assert!(!Workload::Job(Job::default()).supports_patch());
        assert!(!Workload::CronJob(CronJob::default()).supports_patch());

        let service = knative::service_from_data("svc", "default", json!({}));
        assert!(!Workload::KnativeService(service).supports_patch());
    }

    #[test]
    fn test_rollout_supports_patch_only_with_restart_strategy() {
        let mut rollout = rollout::Rollout {
            metadata: ObjectMeta::default(),
            spec: rollout::RolloutSpec {
                template: None,
                replicas: None,
            },
        };
        assert!(!Workload::Rollout(rollout.clone()).supports_patch());

        rollout.metadata.annotations = Some(BTreeMap::from([(
            annotations::ROLLOUT_STRATEGY.to_string(),
            "restart".to_string(),
        )]));
        assert!(Workload::Rollout(rollout).supports_patch());
    }
}
