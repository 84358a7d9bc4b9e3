// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Decides whether a workload reacts to a ConfigMap/Secret change.

use crate::config::Config;
use crate::constants::annotations;
use crate::upgrade::{ResourceChange, ResourceKind};
use std::collections::BTreeMap;

/// How a workload was matched to a change. Auto triggers never guess a
/// container; Named triggers fall back to the first container for users who
/// only set the coarse annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadTrigger {
    Auto,
    Named,
    NotTriggered,
}

/// First match wins: ignore, auto (annotation or global flag), typed auto,
/// named list, search/match. Anything else is NotTriggered, which is an
/// expected outcome and not an error.
pub fn resolve(
    workload_annotations: &BTreeMap<String, String>,
    change: &ResourceChange,
    config: &Config,
) -> ReloadTrigger {
    let get = |key: &str| workload_annotations.get(key).map(String::as_str);

    if get(annotations::IGNORE) == Some("true") {
        return ReloadTrigger::NotTriggered;
    }

    // An explicit "false" opts the workload out of auto-reload-all but
    // leaves the named list and search paths open
    match get(annotations::RELOAD_ALL) {
        Some("true") => return ReloadTrigger::Auto,
        Some(_) => {}
        None if config.auto_reload_all => return ReloadTrigger::Auto,
        None => {}
    }

    let typed_auto = match change.kind {
        ResourceKind::ConfigMap => annotations::CONFIGMAP_AUTO,
        ResourceKind::Secret => annotations::SECRET_AUTO,
    };
    if get(typed_auto) == Some("true") {
        return ReloadTrigger::Auto;
    }

    let named = match change.kind {
        ResourceKind::ConfigMap => annotations::CONFIGMAP_RELOAD,
        ResourceKind::Secret => annotations::SECRET_RELOAD,
    };
    if let Some(list) = get(named) {
        if list.split(',').any(|name| name.trim() == change.name) {
            return ReloadTrigger::Named;
        }
    }

    // Search mode: the changed resource opts in, the workload matches.
    // Evaluated against the resource's annotations as delivered with the
    // event, i.e. the new version.
    let search_requested = change
        .annotations
        .get(annotations::SEARCH)
        .is_some_and(|v| v == "true");
    if search_requested && get(annotations::MATCH) == Some("true") {
        return ReloadTrigger::Auto;
    }

    ReloadTrigger::NotTriggered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReloadStrategy;
    use crate::hash;

    fn make_config(auto_reload_all: bool) -> Config {
        Config {
            reload_strategy: ReloadStrategy::EnvVars,
            auto_reload_all,
            watch_namespace: None,
        }
    }

    fn make_change(name: &str, kind: ResourceKind) -> ResourceChange {
        ResourceChange {
            namespace: "default".to_string(),
            name: name.to_string(),
            kind,
            sha_value: hash::fingerprint(vec![("url".to_string(), "a".to_string())]),
            old_sha_value: None,
            annotations: BTreeMap::new(),
            deleted: false,
        }
    }

    fn annotations_of(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_auto_annotation_triggers() {
        let workload = annotations_of(&[(annotations::RELOAD_ALL, "true")]);
        let change = make_change("cm1", ResourceKind::ConfigMap);
        assert_eq!(
            resolve(&workload, &change, &make_config(false)),
            ReloadTrigger::Auto
        );
    }

    #[test]
    fn test_global_auto_reload_all_triggers_unannotated_workload() {
        let change = make_change("cm1", ResourceKind::ConfigMap);
        assert_eq!(
            resolve(&BTreeMap::new(), &change, &make_config(true)),
            ReloadTrigger::Auto
        );
    }

    #[test]
    fn test_explicit_false_opts_out_of_auto_reload_all() {
        let workload = annotations_of(&[(annotations::RELOAD_ALL, "false")]);
        let change = make_change("cm1", ResourceKind::ConfigMap);
        assert_eq!(
            resolve(&workload, &change, &make_config(true)),
            ReloadTrigger::NotTriggered
        );
    }

    #[test]
    fn test_typed_auto_matches_resource_kind() {
        let workload = annotations_of(&[(annotations::SECRET_AUTO, "true")]);

        let secret_change = make_change("s1", ResourceKind::Secret);
        assert_eq!(
            resolve(&workload, &secret_change, &make_config(false)),
            ReloadTrigger::Auto
        );

        let cm_change = make_change("cm1", ResourceKind::ConfigMap);
        assert_eq!(
            resolve(&workload, &cm_change, &make_config(false)),
            ReloadTrigger::NotTriggered
        );
    }

    #[test]
    fn test_named_list_membership() {
        let workload = annotations_of(&[(annotations::CONFIGMAP_RELOAD, "cm1, cm2")]);

        assert_eq!(
            resolve(
                &workload,
                &make_change("cm2", ResourceKind::ConfigMap),
                &make_config(false)
            ),
            ReloadTrigger::Named
        );
        assert_eq!(
            resolve(
                &workload,
                &make_change("cm3", ResourceKind::ConfigMap),
                &make_config(false)
            ),
            ReloadTrigger::NotTriggered
        );
    }

    #[test]
    fn test_named_list_does_not_match_other_kind() {
        let workload = annotations_of(&[(annotations::CONFIGMAP_RELOAD, "cm1")]);
        let change = make_change("cm1", ResourceKind::Secret);
        assert_eq!(
            resolve(&workload, &change, &make_config(false)),
            ReloadTrigger::NotTriggered
        );
    }

    #[test]
    fn test_search_and_match() {
        let workload = annotations_of(&[(annotations::MATCH, "true")]);
        let mut change = make_change("cm1", ResourceKind::ConfigMap);
        change
            .annotations
            .insert(annotations::SEARCH.to_string(), "true".to_string());

        assert_eq!(
            resolve(&workload, &change, &make_config(false)),
            ReloadTrigger::Auto
        );

        // Without the search opt-in on the resource nothing happens
        let plain_change = make_change("cm1", ResourceKind::ConfigMap);
        assert_eq!(
            resolve(&workload, &plain_change, &make_config(false)),
            ReloadTrigger::NotTriggered
        );
    }

    #[test]
    fn test_ignore_beats_everything() {
        let workload = annotations_of(&[
            (annotations::IGNORE, "true"),
            (annotations::RELOAD_ALL, "true"),
            (annotations::CONFIGMAP_RELOAD, "cm1"),
        ]);
        let change = make_change("cm1", ResourceKind::ConfigMap);
        assert_eq!(
            resolve(&workload, &change, &make_config(true)),
            ReloadTrigger::NotTriggered
        );
    }
}
