use k8s_openapi::api::rbac::v1::{ClusterRoleBinding, RoleRef, Subject};
use kube::api::ObjectMeta;

use super::{owner_reference, CLUSTER_ROLE_NAME};
use crate::crd::ExternalDNS;
use crate::names::resource_name;
use crate::Result;

/// Binds the instance's ServiceAccount to the shared ClusterRole
pub fn desired_cluster_role_binding(
    instance: &ExternalDNS,
    namespace: &str,
) -> Result<ClusterRoleBinding> {
    let name = resource_name(instance)?;
    Ok(ClusterRoleBinding {
        metadata: ObjectMeta {
            name: Some(name.clone()),
            owner_references: Some(vec![owner_reference(instance)?]),
            ..Default::default()
        },
        role_ref: RoleRef {
            api_group: "rbac.authorization.k8s.io".to_string(),
            kind: "ClusterRole".to_string(),
            name: CLUSTER_ROLE_NAME.to_string(),
        },
        subjects: Some(vec![Subject {
            kind: "ServiceAccount".to_string(),
            name,
            namespace: Some(namespace.to_string()),
            ..Default::default()
        }]),
    })
}
