//! In-memory KubeClient used by reconciler tests
//!
//! Stores objects by kind and key, stamps a uid and resource version on every
//! write, and can be told to fail reads of a given kind.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{Deployment, DeploymentStatus};
use k8s_openapi::api::core::v1::{Secret, ServiceAccount};
use k8s_openapi::api::rbac::v1::{ClusterRole, ClusterRoleBinding};
use kube::error::ErrorResponse;
use kube::{Resource, ResourceExt};

use super::KubeClient;
use crate::crd::ExternalDNSStatus;
use crate::Error;

#[derive(Default)]
struct Store {
    namespaces: BTreeSet<String>,
    secrets: BTreeMap<(String, String), Secret>,
    cluster_roles: BTreeMap<String, ClusterRole>,
    bindings: BTreeMap<String, ClusterRoleBinding>,
    accounts: BTreeMap<(String, String), ServiceAccount>,
    deployments: BTreeMap<(String, String), Deployment>,
    statuses: BTreeMap<String, Vec<ExternalDNSStatus>>,
    failing: BTreeSet<&'static str>,
    writes: usize,
    next_version: u64,
}

impl Store {
    fn check(&self, kind: &'static str) -> Result<(), Error> {
        if self.failing.contains(kind) {
            return Err(Error::from(kube::Error::Api(ErrorResponse {
                status: "Failure".to_string(),
                message: format!("injected failure for {kind}"),
                reason: "InternalError".to_string(),
                code: 500,
            })));
        }
        Ok(())
    }

    fn stamp<K: Resource>(&mut self, obj: &mut K) {
        self.next_version += 1;
        self.writes += 1;
        let meta = obj.meta_mut();
        meta.resource_version = Some(self.next_version.to_string());
        if meta.uid.is_none() {
            meta.uid = Some(format!("uid-{}", self.next_version));
        }
    }
}

fn already_exists(name: &str) -> Error {
    Error::from(kube::Error::Api(ErrorResponse {
        status: "Failure".to_string(),
        message: format!("{name} already exists"),
        reason: "AlreadyExists".to_string(),
        code: 409,
    }))
}

fn not_found(name: &str) -> Error {
    Error::from(kube::Error::Api(ErrorResponse {
        status: "Failure".to_string(),
        message: format!("{name} not found"),
        reason: "NotFound".to_string(),
        code: 404,
    }))
}

fn key<K: Resource>(obj: &K) -> (String, String) {
    (obj.namespace().unwrap_or_default(), obj.name_any())
}

/// API-server stand-in backed by maps
#[derive(Default)]
pub struct FakeKube {
    store: Mutex<Store>,
}

impl FakeKube {
    fn with<R>(&self, f: impl FnOnce(&mut Store) -> R) -> R {
        let mut store = self.store.lock().unwrap();
        f(&mut store)
    }

    pub fn insert_secret(&self, secret: Secret) {
        self.with(|s| s.secrets.insert(key(&secret), secret));
    }

    /// Make every read of `kind` fail with a 500; "ExternalDNSStatus" fails
    /// status patches instead
    pub fn fail_reads_of(&self, kind: &'static str) {
        self.with(|s| s.failing.insert(kind));
    }

    pub fn secret(&self, namespace: &str, name: &str) -> Option<Secret> {
        self.with(|s| {
            s.secrets
                .get(&(namespace.to_string(), name.to_string()))
                .cloned()
        })
    }

    pub fn has_namespace(&self, name: &str) -> bool {
        self.with(|s| s.namespaces.contains(name))
    }

    pub fn cluster_role(&self, name: &str) -> Option<ClusterRole> {
        self.with(|s| s.cluster_roles.get(name).cloned())
    }

    pub fn cluster_role_binding(&self, name: &str) -> Option<ClusterRoleBinding> {
        self.with(|s| s.bindings.get(name).cloned())
    }

    pub fn service_account(&self, namespace: &str, name: &str) -> Option<ServiceAccount> {
        self.with(|s| {
            s.accounts
                .get(&(namespace.to_string(), name.to_string()))
                .cloned()
        })
    }

    pub fn deployment(&self, namespace: &str, name: &str) -> Option<Deployment> {
        self.with(|s| {
            s.deployments
                .get(&(namespace.to_string(), name.to_string()))
                .cloned()
        })
    }

    /// Mutate a stored Deployment as another writer would
    pub fn edit_deployment(&self, namespace: &str, name: &str, edit: impl FnOnce(&mut Deployment)) {
        self.with(|s| {
            if let Some(d) = s
                .deployments
                .get_mut(&(namespace.to_string(), name.to_string()))
            {
                edit(d);
            }
        });
    }

    /// Report one available replica, as the deployment controller would
    pub fn mark_deployment_available(&self, namespace: &str, name: &str) {
        self.edit_deployment(namespace, name, |d| {
            d.status = Some(DeploymentStatus {
                available_replicas: Some(1),
                ready_replicas: Some(1),
                replicas: Some(1),
                ..Default::default()
            });
        });
    }

    pub fn last_status(&self, name: &str) -> Option<ExternalDNSStatus> {
        self.with(|s| s.statuses.get(name).and_then(|v| v.last().cloned()))
    }

    /// Creates and updates of managed objects so far
    pub fn write_count(&self) -> usize {
        self.with(|s| s.writes)
    }

    pub fn status_patch_count(&self) -> usize {
        self.with(|s| s.statuses.values().map(Vec::len).sum())
    }
}

#[async_trait]
impl KubeClient for FakeKube {
    async fn ensure_namespace(&self, name: &str) -> Result<(), Error> {
        self.with(|s| {
            s.check("Namespace")?;
            s.namespaces.insert(name.to_string());
            Ok(())
        })
    }

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>, Error> {
        self.with(|s| {
            s.check("Secret")?;
            Ok(s.secrets
                .get(&(namespace.to_string(), name.to_string()))
                .cloned())
        })
    }

    async fn create_secret(&self, secret: &Secret) -> Result<(), Error> {
        self.with(|s| {
            let k = key(secret);
            if s.secrets.contains_key(&k) {
                return Err(already_exists(&k.1));
            }
            let mut secret = secret.clone();
            s.stamp(&mut secret);
            s.secrets.insert(k, secret);
            Ok(())
        })
    }

    async fn update_secret(&self, secret: &Secret) -> Result<(), Error> {
        self.with(|s| {
            let k = key(secret);
            if !s.secrets.contains_key(&k) {
                return Err(not_found(&k.1));
            }
            let mut secret = secret.clone();
            s.stamp(&mut secret);
            s.secrets.insert(k, secret);
            Ok(())
        })
    }

    async fn get_cluster_role(&self, name: &str) -> Result<Option<ClusterRole>, Error> {
        self.with(|s| {
            s.check("ClusterRole")?;
            Ok(s.cluster_roles.get(name).cloned())
        })
    }

    async fn create_cluster_role(&self, role: &ClusterRole) -> Result<(), Error> {
        self.with(|s| {
            let name = role.name_any();
            if s.cluster_roles.contains_key(&name) {
                return Err(already_exists(&name));
            }
            let mut role = role.clone();
            s.stamp(&mut role);
            s.cluster_roles.insert(name, role);
            Ok(())
        })
    }

    async fn update_cluster_role(&self, role: &ClusterRole) -> Result<(), Error> {
        self.with(|s| {
            let name = role.name_any();
            if !s.cluster_roles.contains_key(&name) {
                return Err(not_found(&name));
            }
            let mut role = role.clone();
            s.stamp(&mut role);
            s.cluster_roles.insert(name, role);
            Ok(())
        })
    }

    async fn get_cluster_role_binding(
        &self,
        name: &str,
    ) -> Result<Option<ClusterRoleBinding>, Error> {
        self.with(|s| {
            s.check("ClusterRoleBinding")?;
            Ok(s.bindings.get(name).cloned())
        })
    }

    async fn create_cluster_role_binding(&self, binding: &ClusterRoleBinding) -> Result<(), Error> {
        self.with(|s| {
            let name = binding.name_any();
            if s.bindings.contains_key(&name) {
                return Err(already_exists(&name));
            }
            let mut binding = binding.clone();
            s.stamp(&mut binding);
            s.bindings.insert(name, binding);
            Ok(())
        })
    }

    async fn update_cluster_role_binding(&self, binding: &ClusterRoleBinding) -> Result<(), Error> {
        self.with(|s| {
            let name = binding.name_any();
            if !s.bindings.contains_key(&name) {
                return Err(not_found(&name));
            }
            let mut binding = binding.clone();
            s.stamp(&mut binding);
            s.bindings.insert(name, binding);
            Ok(())
        })
    }

    async fn get_service_account(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ServiceAccount>, Error> {
        self.with(|s| {
            s.check("ServiceAccount")?;
            Ok(s.accounts
                .get(&(namespace.to_string(), name.to_string()))
                .cloned())
        })
    }

    async fn create_service_account(&self, account: &ServiceAccount) -> Result<(), Error> {
        self.with(|s| {
            let k = key(account);
            if s.accounts.contains_key(&k) {
                return Err(already_exists(&k.1));
            }
            let mut account = account.clone();
            s.stamp(&mut account);
            s.accounts.insert(k, account);
            Ok(())
        })
    }

    async fn update_service_account(&self, account: &ServiceAccount) -> Result<(), Error> {
        self.with(|s| {
            let k = key(account);
            if !s.accounts.contains_key(&k) {
                return Err(not_found(&k.1));
            }
            let mut account = account.clone();
            s.stamp(&mut account);
            s.accounts.insert(k, account);
            Ok(())
        })
    }

    async fn get_deployment(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Deployment>, Error> {
        self.with(|s| {
            s.check("Deployment")?;
            Ok(s.deployments
                .get(&(namespace.to_string(), name.to_string()))
                .cloned())
        })
    }

    async fn create_deployment(&self, deployment: &Deployment) -> Result<(), Error> {
        self.with(|s| {
            let k = key(deployment);
            if s.deployments.contains_key(&k) {
                return Err(already_exists(&k.1));
            }
            let mut deployment = deployment.clone();
            s.stamp(&mut deployment);
            s.deployments.insert(k, deployment);
            Ok(())
        })
    }

    async fn update_deployment(&self, deployment: &Deployment) -> Result<(), Error> {
        self.with(|s| {
            let k = key(deployment);
            let Some(stored) = s.deployments.get(&k) else {
                return Err(not_found(&k.1));
            };
            // replace never touches the status subresource
            let status = stored.status.clone();
            let mut deployment = deployment.clone();
            deployment.status = status;
            s.stamp(&mut deployment);
            s.deployments.insert(k, deployment);
            Ok(())
        })
    }

    async fn patch_status(&self, name: &str, status: &ExternalDNSStatus) -> Result<(), Error> {
        self.with(|s| {
            s.check("ExternalDNSStatus")?;
            s.statuses
                .entry(name.to_string())
                .or_default()
                .push(status.clone());
            Ok(())
        })
    }
}
