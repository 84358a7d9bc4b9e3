// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Watchers that react to ConfigMap/Secret events.

pub mod configmap;
pub mod secret;

pub use configmap::ConfigMapReconciler;
pub use secret::SecretReconciler;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Last-seen fingerprint per watched resource, keyed by `Kind/namespace/name`.
/// Lets update events carry the previous fingerprint and drops events whose
/// data did not actually change.
pub type FingerprintCache = Arc<Mutex<HashMap<String, String>>>;

pub fn new_fingerprint_cache() -> FingerprintCache {
    Arc::new(Mutex::new(HashMap::new()))
}
