//! Kubernetes client seam for the ExternalDNS controller

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Namespace, Secret, ServiceAccount};
use k8s_openapi::api::rbac::v1::{ClusterRole, ClusterRoleBinding};
use kube::api::{Api, ObjectMeta, Patch, PatchParams, PostParams};
use kube::{Client, ResourceExt};

#[cfg(test)]
use mockall::automock;

use crate::crd::{ExternalDNS, ExternalDNSStatus};
use crate::{Error, FIELD_MANAGER};

/// Trait abstracting the Kubernetes calls the reconciler makes
///
/// Reads return `Ok(None)` for objects that do not exist. Writes surface API
/// errors unmodified; callers decide which ones are benign.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait KubeClient: Send + Sync {
    /// Create the namespace if it does not exist yet
    async fn ensure_namespace(&self, name: &str) -> Result<(), Error>;

    /// Get a Secret
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>, Error>;

    /// Create a Secret
    async fn create_secret(&self, secret: &Secret) -> Result<(), Error>;

    /// Replace a Secret
    async fn update_secret(&self, secret: &Secret) -> Result<(), Error>;

    /// Get a ClusterRole
    async fn get_cluster_role(&self, name: &str) -> Result<Option<ClusterRole>, Error>;

    /// Create a ClusterRole
    async fn create_cluster_role(&self, role: &ClusterRole) -> Result<(), Error>;

    /// Replace a ClusterRole
    async fn update_cluster_role(&self, role: &ClusterRole) -> Result<(), Error>;

    /// Get a ClusterRoleBinding
    async fn get_cluster_role_binding(
        &self,
        name: &str,
    ) -> Result<Option<ClusterRoleBinding>, Error>;

    /// Create a ClusterRoleBinding
    async fn create_cluster_role_binding(&self, binding: &ClusterRoleBinding)
        -> Result<(), Error>;

    /// Replace a ClusterRoleBinding
    async fn update_cluster_role_binding(&self, binding: &ClusterRoleBinding)
        -> Result<(), Error>;

    /// Get a ServiceAccount
    async fn get_service_account(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ServiceAccount>, Error>;

    /// Create a ServiceAccount
    async fn create_service_account(&self, account: &ServiceAccount) -> Result<(), Error>;

    /// Replace a ServiceAccount
    async fn update_service_account(&self, account: &ServiceAccount) -> Result<(), Error>;

    /// Get a Deployment
    async fn get_deployment(&self, namespace: &str, name: &str)
        -> Result<Option<Deployment>, Error>;

    /// Create a Deployment
    async fn create_deployment(&self, deployment: &Deployment) -> Result<(), Error>;

    /// Replace a Deployment
    async fn update_deployment(&self, deployment: &Deployment) -> Result<(), Error>;

    /// Patch the status subresource of an ExternalDNS instance
    async fn patch_status(&self, name: &str, status: &ExternalDNSStatus) -> Result<(), Error>;
}

/// Real Kubernetes client implementation
pub struct KubeClientImpl {
    client: Client,
}

impl KubeClientImpl {
    /// Create a new KubeClientImpl wrapping the given kube Client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn namespaced<K>(&self, obj: &K) -> Api<K>
    where
        K: kube::Resource<Scope = k8s_openapi::NamespaceResourceScope>,
        K::DynamicType: Default,
    {
        Api::namespaced(self.client.clone(), &obj.namespace().unwrap_or_default())
    }
}

fn post_params() -> PostParams {
    PostParams {
        field_manager: Some(FIELD_MANAGER.to_string()),
        ..Default::default()
    }
}

#[async_trait]
impl KubeClient for KubeClientImpl {
    async fn ensure_namespace(&self, name: &str) -> Result<(), Error> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        let ns = Namespace {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        api.patch(name, &PatchParams::apply(FIELD_MANAGER), &Patch::Apply(&ns))
            .await?;
        Ok(())
    }

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>, Error> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn create_secret(&self, secret: &Secret) -> Result<(), Error> {
        self.namespaced(secret).create(&post_params(), secret).await?;
        Ok(())
    }

    async fn update_secret(&self, secret: &Secret) -> Result<(), Error> {
        self.namespaced(secret)
            .replace(&secret.name_any(), &post_params(), secret)
            .await?;
        Ok(())
    }

    async fn get_cluster_role(&self, name: &str) -> Result<Option<ClusterRole>, Error> {
        let api: Api<ClusterRole> = Api::all(self.client.clone());
        Ok(api.get_opt(name).await?)
    }

    async fn create_cluster_role(&self, role: &ClusterRole) -> Result<(), Error> {
        let api: Api<ClusterRole> = Api::all(self.client.clone());
        api.create(&post_params(), role).await?;
        Ok(())
    }

    async fn update_cluster_role(&self, role: &ClusterRole) -> Result<(), Error> {
        let api: Api<ClusterRole> = Api::all(self.client.clone());
        api.replace(&role.name_any(), &post_params(), role).await?;
        Ok(())
    }

    async fn get_cluster_role_binding(
        &self,
        name: &str,
    ) -> Result<Option<ClusterRoleBinding>, Error> {
        let api: Api<ClusterRoleBinding> = Api::all(self.client.clone());
        Ok(api.get_opt(name).await?)
    }

    async fn create_cluster_role_binding(
        &self,
        binding: &ClusterRoleBinding,
    ) -> Result<(), Error> {
        let api: Api<ClusterRoleBinding> = Api::all(self.client.clone());
        api.create(&post_params(), binding).await?;
        Ok(())
    }

    async fn update_cluster_role_binding(
        &self,
        binding: &ClusterRoleBinding,
    ) -> Result<(), Error> {
        let api: Api<ClusterRoleBinding> = Api::all(self.client.clone());
        api.replace(&binding.name_any(), &post_params(), binding)
            .await?;
        Ok(())
    }

    async fn get_service_account(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ServiceAccount>, Error> {
        let api: Api<ServiceAccount> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn create_service_account(&self, account: &ServiceAccount) -> Result<(), Error> {
        self.namespaced(account)
            .create(&post_params(), account)
            .await?;
        Ok(())
    }

    async fn update_service_account(&self, account: &ServiceAccount) -> Result<(), Error> {
        self.namespaced(account)
            .replace(&account.name_any(), &post_params(), account)
            .await?;
        Ok(())
    }

    async fn get_deployment(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Deployment>, Error> {
        let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn create_deployment(&self, deployment: &Deployment) -> Result<(), Error> {
        self.namespaced(deployment)
            .create(&post_params(), deployment)
            .await?;
        Ok(())
    }

    async fn update_deployment(&self, deployment: &Deployment) -> Result<(), Error> {
        self.namespaced(deployment)
            .replace(&deployment.name_any(), &post_params(), deployment)
            .await?;
        Ok(())
    }

    async fn patch_status(&self, name: &str, status: &ExternalDNSStatus) -> Result<(), Error> {
        let api: Api<ExternalDNS> = Api::all(self.client.clone());

        let status_patch = serde_json::json!({
            "status": status
        });

        api.patch_status(
            name,
            &PatchParams::apply(FIELD_MANAGER),
            &Patch::Merge(&status_patch),
        )
        .await?;

        Ok(())
    }
}
