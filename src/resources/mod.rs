//! Desired state of the resources an ExternalDNS instance is deployed with
//!
//! Every builder is a pure function of the instance and the small amount of
//! cluster context it needs (operand namespace, image, credentials secret).
//! Builders never talk to the API server.

mod cluster_role;
mod cluster_role_binding;
mod credentials_secret;
mod deployment;
mod service_account;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::{Resource, ResourceExt};

use crate::crd::ExternalDNS;
use crate::{Error, Result};

pub use cluster_role::{desired_cluster_role, CLUSTER_ROLE_NAME};
pub use cluster_role_binding::desired_cluster_role_binding;
pub use credentials_secret::desired_credentials_secret;
pub use deployment::{
    desired_deployment, provider_arg, source_arg, DeploymentInputs, CREDENTIALS_MOUNT_PATH,
    CREDENTIALS_VOLUME_NAME, PROVIDER_ENV_VARS,
};
pub use service_account::desired_service_account;

/// Controller owner reference pointing at `instance`
///
/// Managed objects carry it so the garbage collector removes them with the
/// instance and so their events requeue it.
pub fn owner_reference(instance: &ExternalDNS) -> Result<OwnerReference> {
    let mut owner = instance.controller_owner_ref(&()).ok_or_else(|| {
        Error::validation(instance.name_any(), "instance has no uid and cannot own resources")
    })?;
    owner.block_owner_deletion = Some(true);
    Ok(owner)
}
