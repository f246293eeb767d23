//! Drift detection between observed and desired managed resources
//!
//! The API server and admission webhooks add fields the operator never sets
//! (defaults, injected env, extra volumes). Comparing whole objects would make
//! the operator fight them forever, so every kind compares only the fields the
//! operator owns.
//!
//! Each function returns `None` when the observed object is in sync, or a copy
//! of the *observed* object with only the divergent fields overwritten.

use std::collections::{BTreeMap, BTreeSet};

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Container, PodSpec, Secret, ServiceAccount, Volume};
use k8s_openapi::api::rbac::v1::{ClusterRole, ClusterRoleBinding, PolicyRule};

use crate::resources::{CREDENTIALS_VOLUME_NAME, PROVIDER_ENV_VARS};

/// ClusterRole drift: rules compared as a set of order-insensitive rules
pub fn cluster_role_drift(current: &ClusterRole, desired: &ClusterRole) -> Option<ClusterRole> {
    if canonical_rules(current.rules.as_deref()) == canonical_rules(desired.rules.as_deref()) {
        return None;
    }
    let mut updated = current.clone();
    updated.rules = desired.rules.clone();
    Some(updated)
}

/// A rule with every list collapsed into a sorted set
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
struct CanonicalRule<'a> {
    api_groups: BTreeSet<&'a str>,
    resources: BTreeSet<&'a str>,
    verbs: BTreeSet<&'a str>,
    resource_names: BTreeSet<&'a str>,
    non_resource_urls: BTreeSet<&'a str>,
}

impl<'a> CanonicalRule<'a> {
    fn new(rule: &'a PolicyRule) -> Self {
        Self {
            api_groups: str_set(rule.api_groups.as_deref()),
            resources: str_set(rule.resources.as_deref()),
            verbs: str_set(Some(rule.verbs.as_slice())),
            resource_names: str_set(rule.resource_names.as_deref()),
            non_resource_urls: str_set(rule.non_resource_urls.as_deref()),
        }
    }
}

fn canonical_rules(rules: Option<&[PolicyRule]>) -> BTreeSet<CanonicalRule<'_>> {
    rules.unwrap_or_default().iter().map(CanonicalRule::new).collect()
}

fn str_set(values: Option<&[String]>) -> BTreeSet<&str> {
    values.unwrap_or_default().iter().map(String::as_str).collect()
}

/// ClusterRoleBinding drift: roleRef and subjects are replaced independently
pub fn cluster_role_binding_drift(
    current: &ClusterRoleBinding,
    desired: &ClusterRoleBinding,
) -> Option<ClusterRoleBinding> {
    let mut updated = current.clone();
    let mut changed = false;

    if current.role_ref != desired.role_ref {
        updated.role_ref = desired.role_ref.clone();
        changed = true;
    }
    if current.subjects.as_deref().unwrap_or_default()
        != desired.subjects.as_deref().unwrap_or_default()
    {
        updated.subjects = desired.subjects.clone();
        changed = true;
    }

    changed.then_some(updated)
}

/// ServiceAccount drift: only the owner references are owned by the operator
///
/// Missing desired owners are appended; owners added by others are kept.
pub fn service_account_drift(
    current: &ServiceAccount,
    desired: &ServiceAccount,
) -> Option<ServiceAccount> {
    let existing = current.metadata.owner_references.as_deref().unwrap_or_default();
    let missing: Vec<_> = desired
        .metadata
        .owner_references
        .as_deref()
        .unwrap_or_default()
        .iter()
        .filter(|want| !existing.iter().any(|have| have.uid == want.uid))
        .cloned()
        .collect();

    if missing.is_empty() {
        return None;
    }
    let mut updated = current.clone();
    updated
        .metadata
        .owner_references
        .get_or_insert_with(Vec::new)
        .extend(missing);
    Some(updated)
}

/// Deployment drift over containers and the credentials volume
pub fn deployment_drift(current: &Deployment, desired: &Deployment) -> Option<Deployment> {
    let desired_pod = pod_spec(desired)?;
    let mut updated = current.clone();

    let changed = match updated
        .spec
        .as_mut()
        .and_then(|s| s.template.spec.as_mut())
    {
        Some(pod) => {
            let containers = sync_containers(&mut pod.containers, &desired_pod.containers);
            let volumes = sync_volumes(&mut pod.volumes, desired_pod.volumes.as_deref());
            containers || volumes
        }
        None => {
            updated.spec = desired.spec.clone();
            true
        }
    };

    changed.then_some(updated)
}

fn pod_spec(deployment: &Deployment) -> Option<&PodSpec> {
    deployment.spec.as_ref()?.template.spec.as_ref()
}

/// Brings `current` containers in line with `desired`, reporting whether
/// anything changed
///
/// Containers are paired positionally when the names line up in order, or by
/// name when both lists hold the same unique names. Paired containers only get
/// their differing fields overwritten. Anything else (a different count, other
/// names, duplicate names out of order) resets the whole list.
fn sync_containers(current: &mut Vec<Container>, desired: &[Container]) -> bool {
    let same_order = current.len() == desired.len()
        && current.iter().zip(desired).all(|(have, want)| have.name == want.name);

    let pairs = if same_order {
        desired.iter().enumerate().collect()
    } else {
        match pair_by_name(current, desired) {
            Some(pairs) => pairs,
            None => {
                *current = desired.to_vec();
                return true;
            }
        }
    };

    let mut changed = false;
    for (index, want) in pairs {
        changed |= sync_container(&mut current[index], want);
    }
    changed
}

/// Index into `current` for each desired container, when both lists carry the
/// same set of unique names
fn pair_by_name<'a>(
    current: &[Container],
    desired: &'a [Container],
) -> Option<Vec<(usize, &'a Container)>> {
    let by_name: BTreeMap<&str, usize> = current
        .iter()
        .enumerate()
        .map(|(i, c)| (c.name.as_str(), i))
        .collect();
    let desired_names: BTreeSet<&str> = desired.iter().map(|c| c.name.as_str()).collect();

    let unique = by_name.len() == current.len() && desired_names.len() == desired.len();
    if !unique || by_name.keys().copied().collect::<BTreeSet<_>>() != desired_names {
        return None;
    }
    desired
        .iter()
        .map(|want| by_name.get(want.name.as_str()).map(|&i| (i, want)))
        .collect()
}

fn sync_container(have: &mut Container, want: &Container) -> bool {
    let mut changed = false;

    if have.image != want.image {
        have.image = want.image.clone();
        changed = true;
    }

    if str_set(have.args.as_deref()) != str_set(want.args.as_deref()) {
        have.args = want.args.clone();
        changed = true;
    }

    changed |= sync_owned_subset(
        &mut have.env,
        want.env.as_deref(),
        |h, w| h == w,
        |e| PROVIDER_ENV_VARS.contains(&e.name.as_str()),
        |a, b| a.name == b.name,
    );

    changed |= sync_owned_subset(
        &mut have.volume_mounts,
        want.volume_mounts.as_deref(),
        |h, w| h.name == w.name && h.mount_path == w.mount_path && h.read_only == w.read_only,
        |m| m.name == CREDENTIALS_VOLUME_NAME,
        |a, b| a.name == b.name,
    );

    changed
}

/// Desired volumes must be present by name with the same secret; injected
/// volumes are tolerated, a credentials volume no longer desired is dropped
fn sync_volumes(current: &mut Option<Vec<Volume>>, desired: Option<&[Volume]>) -> bool {
    sync_owned_subset(
        current,
        desired,
        |h, w| {
            h.name == w.name
                && h.secret.as_ref().map(|s| &s.secret_name)
                    == w.secret.as_ref().map(|s| &s.secret_name)
        },
        |v| v.name == CREDENTIALS_VOLUME_NAME,
        |a, b| a.name == b.name,
    )
}

/// Subset sync for lists other writers also append to
///
/// Every desired entry must match some current entry (`matches`), otherwise
/// the list is replaced by the desired one. Entries the operator owns
/// (`owned`) that have no desired counterpart by key (`same_key`) are removed;
/// everything else is left alone.
fn sync_owned_subset<T: Clone>(
    current: &mut Option<Vec<T>>,
    desired: Option<&[T]>,
    matches: impl Fn(&T, &T) -> bool,
    owned: impl Fn(&T) -> bool,
    same_key: impl Fn(&T, &T) -> bool,
) -> bool {
    let desired = desired.unwrap_or_default();
    let have = current.as_deref().unwrap_or_default();

    if !desired.iter().all(|w| have.iter().any(|h| matches(h, w))) {
        *current = (!desired.is_empty()).then(|| desired.to_vec());
        return true;
    }

    let stale = |h: &T| owned(h) && !desired.iter().any(|w| same_key(h, w));
    if !have.iter().any(stale) {
        return false;
    }
    let kept: Vec<T> = have.iter().filter(|h| !stale(h)).cloned().collect();
    *current = (!kept.is_empty()).then_some(kept);
    true
}

/// Credentials copy drift: data and type follow the source secret
pub fn credentials_secret_drift(current: &Secret, desired: &Secret) -> Option<Secret> {
    let data_differs = current.data.as_ref().filter(|d| !d.is_empty())
        != desired.data.as_ref().filter(|d| !d.is_empty());
    let type_differs = desired.type_.is_some() && current.type_ != desired.type_;
    if !data_differs && !type_differs {
        return None;
    }
    let mut updated = current.clone();
    updated.data = desired.data.clone();
    updated.string_data = None;
    if type_differs {
        updated.type_ = desired.type_.clone();
    }
    Some(updated)
}
