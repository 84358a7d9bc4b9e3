// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReloaderError {
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    // Expected for Job/CronJob and non-restart Rollouts; callers fall back
    // to a full update.
    #[error("not supported patching: {0}")]
    PatchNotSupported(&'static str),

    #[error("Failed to serialize workload: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Invalid pause duration: {0}")]
    InvalidDuration(String),

    #[error("Workload is missing required metadata: {0}")]
    MissingMetadata(String),
}

pub type Result<T> = std::result::Result<T, ReloaderError>;
