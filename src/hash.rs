// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Deterministic fingerprinting of ConfigMap/Secret data.
//!
//! The fingerprint is only ever compared for equality, never stored as
//! canonical state, so the exact digest algorithm is an internal detail.

use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Hash a set of key/value pairs into a stable hex digest.
///
/// Entries are rendered as `key=value`, sorted lexicographically and joined
/// with `;` before hashing, so the result is independent of the caller's
/// iteration order.
pub fn fingerprint<I, V>(pairs: I) -> String
where
    I: IntoIterator<Item = (String, V)>,
    V: AsRef<[u8]>,
{
    let mut entries: Vec<String> = pairs
        .into_iter()
        .map(|(k, v)| format!("{}={}", k, String::from_utf8_lossy(v.as_ref())))
        .collect();
    entries.sort();

    let mut hasher = Sha256::new();
    hasher.update(entries.join(";").as_bytes());
    format!("{:x}", hasher.finalize())
}

/// The fingerprint of a resource with no data at all. Used by the
/// delete-reversal path, which treats a deleted resource as empty.
pub fn empty_fingerprint() -> String {
    fingerprint(std::iter::empty::<(String, Vec<u8>)>())
}

/// Fingerprint a ConfigMap's `data` and `binaryData`. Labels and
/// annotations never participate.
pub fn configmap_fingerprint(cm: &ConfigMap) -> String {
    let mut merged: BTreeMap<String, Vec<u8>> = BTreeMap::new();
    if let Some(data) = &cm.data {
        for (k, v) in data {
            merged.insert(k.clone(), v.clone().into_bytes());
        }
    }
    if let Some(binary) = &cm.binary_data {
        for (k, v) in binary {
            merged.insert(k.clone(), v.0.clone());
        }
    }
    fingerprint(merged)
}

/// Fingerprint a Secret's `data` and `stringData`. `stringData` overrides
/// `data` on key collision, mirroring how the API server merges them.
pub fn secret_fingerprint(secret: &Secret) -> String {
    let mut merged: BTreeMap<String, Vec<u8>> = BTreeMap::new();
    if let Some(data) = &secret.data {
        for (k, v) in data {
            merged.insert(k.clone(), v.0.clone());
        }
    }
    if let Some(string_data) = &secret.string_data {
        for (k, v) in string_data {
            merged.insert(k.clone(), v.clone().into_bytes());
        }
    }
    fingerprint(merged)
}
