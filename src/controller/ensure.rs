//! Create-or-update state machine shared by every managed kind
//!
//! ```text
//! fetch ──▶ absent ──▶ create ──▶ re-fetch
//!   │
//!   └────▶ present ──▶ drift? ──no──▶ done (no write)
//!                         │
//!                        yes ──▶ update ──▶ re-fetch
//! ```
//!
//! Objects are always re-read after a write so callers see what the API server
//! and admission webhooks actually stored.

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Secret, ServiceAccount};
use k8s_openapi::api::rbac::v1::{ClusterRole, ClusterRoleBinding};
use kube::{Resource, ResourceExt};
use tracing::{debug, info};

use super::KubeClient;
use crate::drift;
use crate::Error;

/// Outcome of ensuring one managed object
#[derive(Clone, Debug, PartialEq)]
pub struct Ensured<K> {
    /// The object was already present before this call
    pub existed: bool,
    /// This call wrote to the API server
    pub changed: bool,
    /// The object as stored after this call
    pub object: K,
}

/// A Kubernetes kind the operator creates and keeps in sync
#[async_trait]
pub trait Managed: Resource + Clone + Send + Sync + Sized + 'static {
    /// Kind name used in logs and failure reports
    const KIND: &'static str;

    /// Read the stored object; `namespace` is ignored for cluster-scoped kinds
    async fn fetch(
        client: &dyn KubeClient,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Self>, Error>;

    /// Create the object
    async fn create(client: &dyn KubeClient, obj: &Self) -> Result<(), Error>;

    /// Replace the stored object
    async fn update(client: &dyn KubeClient, obj: &Self) -> Result<(), Error>;

    /// Compare stored against desired; see [`crate::drift`]
    fn drift(current: &Self, desired: &Self) -> Option<Self>;
}

#[async_trait]
impl Managed for ClusterRole {
    const KIND: &'static str = "ClusterRole";

    async fn fetch(client: &dyn KubeClient, _: &str, name: &str) -> Result<Option<Self>, Error> {
        client.get_cluster_role(name).await
    }

    async fn create(client: &dyn KubeClient, obj: &Self) -> Result<(), Error> {
        client.create_cluster_role(obj).await
    }

    async fn update(client: &dyn KubeClient, obj: &Self) -> Result<(), Error> {
        client.update_cluster_role(obj).await
    }

    fn drift(current: &Self, desired: &Self) -> Option<Self> {
        drift::cluster_role_drift(current, desired)
    }
}

#[async_trait]
impl Managed for ClusterRoleBinding {
    const KIND: &'static str = "ClusterRoleBinding";

    async fn fetch(client: &dyn KubeClient, _: &str, name: &str) -> Result<Option<Self>, Error> {
        client.get_cluster_role_binding(name).await
    }

    async fn create(client: &dyn KubeClient, obj: &Self) -> Result<(), Error> {
        client.create_cluster_role_binding(obj).await
    }

    async fn update(client: &dyn KubeClient, obj: &Self) -> Result<(), Error> {
        client.update_cluster_role_binding(obj).await
    }

    fn drift(current: &Self, desired: &Self) -> Option<Self> {
        drift::cluster_role_binding_drift(current, desired)
    }
}

#[async_trait]
impl Managed for Secret {
    const KIND: &'static str = "Secret";

    async fn fetch(
        client: &dyn KubeClient,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Self>, Error> {
        client.get_secret(namespace, name).await
    }

    async fn create(client: &dyn KubeClient, obj: &Self) -> Result<(), Error> {
        client.create_secret(obj).await
    }

    async fn update(client: &dyn KubeClient, obj: &Self) -> Result<(), Error> {
        client.update_secret(obj).await
    }

    fn drift(current: &Self, desired: &Self) -> Option<Self> {
        drift::credentials_secret_drift(current, desired)
    }
}

#[async_trait]
impl Managed for ServiceAccount {
    const KIND: &'static str = "ServiceAccount";

    async fn fetch(
        client: &dyn KubeClient,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Self>, Error> {
        client.get_service_account(namespace, name).await
    }

    async fn create(client: &dyn KubeClient, obj: &Self) -> Result<(), Error> {
        client.create_service_account(obj).await
    }

    async fn update(client: &dyn KubeClient, obj: &Self) -> Result<(), Error> {
        client.update_service_account(obj).await
    }

    fn drift(current: &Self, desired: &Self) -> Option<Self> {
        drift::service_account_drift(current, desired)
    }
}

#[async_trait]
impl Managed for Deployment {
    const KIND: &'static str = "Deployment";

    async fn fetch(
        client: &dyn KubeClient,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Self>, Error> {
        client.get_deployment(namespace, name).await
    }

    async fn create(client: &dyn KubeClient, obj: &Self) -> Result<(), Error> {
        client.create_deployment(obj).await
    }

    async fn update(client: &dyn KubeClient, obj: &Self) -> Result<(), Error> {
        client.update_deployment(obj).await
    }

    fn drift(current: &Self, desired: &Self) -> Option<Self> {
        drift::deployment_drift(current, desired)
    }
}

/// Converge the stored object towards `desired`
///
/// A create that loses a race with another writer is treated as success and
/// followed by the usual re-fetch. Any other API error is returned as-is; there
/// is no retry here, the controller requeues instead.
pub async fn ensure<K: Managed>(client: &dyn KubeClient, desired: &K) -> Result<Ensured<K>, Error> {
    let name = desired.name_any();
    let namespace = desired.namespace().unwrap_or_default();

    let Some(current) = K::fetch(client, &namespace, &name).await? else {
        match K::create(client, desired).await {
            Ok(()) => info!(kind = K::KIND, %name, %namespace, "created"),
            Err(e) if e.is_already_exists() => {
                debug!(kind = K::KIND, %name, "created concurrently by another writer")
            }
            Err(e) => return Err(e),
        }
        let object = refetch::<K>(client, &namespace, &name).await?;
        return Ok(Ensured {
            existed: false,
            changed: true,
            object,
        });
    };

    let Some(updated) = K::drift(&current, desired) else {
        debug!(kind = K::KIND, %name, "in sync");
        return Ok(Ensured {
            existed: true,
            changed: false,
            object: current,
        });
    };

    K::update(client, &updated).await?;
    info!(kind = K::KIND, %name, %namespace, "updated");

    let object = refetch::<K>(client, &namespace, &name).await?;
    Ok(Ensured {
        existed: true,
        changed: true,
        object,
    })
}

async fn refetch<K: Managed>(client: &dyn KubeClient, namespace: &str, name: &str) -> Result<K, Error> {
    K::fetch(client, namespace, name)
        .await?
        .ok_or_else(|| Error::internal(format!("{} {name} not found right after write", K::KIND)))
}
