use k8s_openapi::api::rbac::v1::{ClusterRole, PolicyRule};
use kube::api::ObjectMeta;

use crate::EXTERNAL_DNS_BASE_NAME;

/// Name of the ClusterRole shared by every instance
pub const CLUSTER_ROLE_NAME: &str = EXTERNAL_DNS_BASE_NAME;

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

/// Read access to everything ExternalDNS derives records from
///
/// Shared between instances, so it carries no owner reference and outlives
/// any single instance.
pub fn desired_cluster_role() -> ClusterRole {
    ClusterRole {
        metadata: ObjectMeta {
            name: Some(CLUSTER_ROLE_NAME.to_string()),
            ..Default::default()
        },
        rules: Some(vec![
            PolicyRule {
                api_groups: Some(strings(&["extensions", "networking.k8s.io"])),
                resources: Some(strings(&["ingresses"])),
                verbs: strings(&["get", "list", "watch"]),
                ..Default::default()
            },
            PolicyRule {
                api_groups: Some(strings(&[""])),
                resources: Some(strings(&["endpoints", "services", "pods", "nodes"])),
                verbs: strings(&["get", "list", "watch"]),
                ..Default::default()
            },
        ]),
        ..Default::default()
    }
}
