use k8s_openapi::api::core::v1::ServiceAccount;
use kube::api::ObjectMeta;

use super::owner_reference;
use crate::crd::ExternalDNS;
use crate::names::resource_name;
use crate::Result;

/// ServiceAccount the operand pods run as
pub fn desired_service_account(instance: &ExternalDNS, namespace: &str) -> Result<ServiceAccount> {
    Ok(ServiceAccount {
        metadata: ObjectMeta {
            name: Some(resource_name(instance)?),
            namespace: Some(namespace.to_string()),
            owner_references: Some(vec![owner_reference(instance)?]),
            ..Default::default()
        },
        ..Default::default()
    })
}
