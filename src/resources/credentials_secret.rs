use k8s_openapi::api::core::v1::Secret;
use kube::api::ObjectMeta;

use super::owner_reference;
use crate::crd::ExternalDNS;
use crate::names::{app_labels, dest_credentials_secret_name};
use crate::Result;

/// Copy of the referenced credentials secret placed next to the operand
///
/// Data and type follow `source`; name, labels and owner are the instance's.
pub fn desired_credentials_secret(
    instance: &ExternalDNS,
    namespace: &str,
    source: &Secret,
) -> Result<Secret> {
    Ok(Secret {
        metadata: ObjectMeta {
            name: Some(dest_credentials_secret_name(instance)?),
            namespace: Some(namespace.to_string()),
            labels: Some(app_labels(instance)?),
            owner_references: Some(vec![owner_reference(instance)?]),
            ..Default::default()
        },
        data: source.data.clone(),
        type_: source.type_.clone(),
        ..Default::default()
    })
}
