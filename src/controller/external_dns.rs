//! ExternalDNS controller implementation
//!
//! A reconciliation pass ensures, in order: the operand namespace, the shared
//! ClusterRole, the instance's ServiceAccount, its ClusterRoleBinding, the
//! operand-namespace copy of its credentials secret, and finally its
//! Deployment. Every step runs even when an earlier one failed so a single
//! broken kind does not block the others from converging. The Deployment is
//! the exception: it waits for a valid provider and source and for the
//! credentials copy. The outcome of the pass is written to the instance status.

use std::sync::Arc;
use std::time::Duration;

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Secret, ServiceAccount};
use k8s_openapi::api::rbac::v1::{ClusterRole, ClusterRoleBinding};
use kube::runtime::controller::Action;
use kube::runtime::reflector::ObjectRef;
use kube::{Client, Resource, ResourceExt};
use tracing::{debug, error, info, instrument, warn};

use super::ensure::{ensure, Ensured, Managed};
use super::{KubeClient, KubeClientImpl};
use crate::config::OperatorConfig;
use crate::crd::{
    Condition, ConditionStatus, ExternalDNS, ExternalDNSPhase, ExternalDNSStatus,
};
use crate::error::KindFailure;
use crate::names::credentials_secret_ref;
use crate::resources::{
    desired_cluster_role, desired_cluster_role_binding, desired_credentials_secret,
    desired_deployment, desired_service_account, provider_arg, source_arg, DeploymentInputs,
};
use crate::{
    Error, Result, DEFAULT_OPERAND_IMAGE, DEFAULT_OPERAND_NAMESPACE, DEFAULT_OPERATOR_NAMESPACE,
};

/// Requeue delay after a failure that may clear on its own
pub const RETRY_INTERVAL: Duration = Duration::from_secs(5);

/// Requeue delay after a failure that needs someone to change the instance
pub const PERMANENT_FAILURE_INTERVAL: Duration = Duration::from_secs(300);

/// Default resync interval for converged instances
pub const DEFAULT_RESYNC_INTERVAL: Duration = Duration::from_secs(600);

const NAMESPACE_KIND: &str = "Namespace";
const STATUS_KIND: &str = "ExternalDNSStatus";
const CONDITION_AVAILABLE: &str = "Available";
const CONDITION_DEGRADED: &str = "Degraded";

/// Controller context shared by every reconciliation
pub struct Context {
    /// Kubernetes client for API operations (trait object for testability)
    pub kube: Arc<dyn KubeClient>,
    /// Namespace the operands run in
    pub operand_namespace: String,
    /// Namespace credentials secrets are read from when a reference leaves
    /// its namespace empty
    pub credentials_namespace: String,
    /// ExternalDNS image the operands run
    pub operand_image: String,
    /// Requeue interval for instances that converged
    pub resync_interval: Duration,
}

impl Context {
    /// Create a builder for constructing a Context
    pub fn builder(client: Client) -> ContextBuilder {
        ContextBuilder::new(client)
    }

    /// Create a context from the operator configuration
    pub fn from_config(client: Client, config: &OperatorConfig) -> Self {
        Self::builder(client)
            .operand_namespace(&config.operand_namespace)
            .credentials_namespace(&config.operator_namespace)
            .operand_image(&config.operand_image)
            .resync_interval(config.resync_interval())
            .build()
    }

    /// Create a context for testing with a custom client
    #[cfg(test)]
    pub fn for_testing(kube: Arc<dyn KubeClient>) -> Self {
        Self {
            kube,
            operand_namespace: crate::resources::fixtures::NAMESPACE.to_string(),
            credentials_namespace: crate::resources::fixtures::OPERATOR_NAMESPACE.to_string(),
            operand_image: crate::resources::fixtures::IMAGE.to_string(),
            resync_interval: DEFAULT_RESYNC_INTERVAL,
        }
    }
}

/// Builder for [`Context`]
pub struct ContextBuilder {
    client: Client,
    kube: Option<Arc<dyn KubeClient>>,
    operand_namespace: String,
    credentials_namespace: String,
    operand_image: String,
    resync_interval: Duration,
}

impl ContextBuilder {
    fn new(client: Client) -> Self {
        Self {
            client,
            kube: None,
            operand_namespace: DEFAULT_OPERAND_NAMESPACE.to_string(),
            credentials_namespace: DEFAULT_OPERATOR_NAMESPACE.to_string(),
            operand_image: DEFAULT_OPERAND_IMAGE.to_string(),
            resync_interval: DEFAULT_RESYNC_INTERVAL,
        }
    }

    /// Set the operand namespace
    pub fn operand_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.operand_namespace = namespace.into();
        self
    }

    /// Set the namespace credentials secrets are read from by default
    pub fn credentials_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.credentials_namespace = namespace.into();
        self
    }

    /// Set the operand image
    pub fn operand_image(mut self, image: impl Into<String>) -> Self {
        self.operand_image = image.into();
        self
    }

    /// Set the resync interval for converged instances
    pub fn resync_interval(mut self, interval: Duration) -> Self {
        self.resync_interval = interval;
        self
    }

    /// Override the Kubernetes client (primarily for testing)
    pub fn kube_client(mut self, kube: Arc<dyn KubeClient>) -> Self {
        self.kube = Some(kube);
        self
    }

    /// Build the context
    pub fn build(self) -> Context {
        Context {
            kube: self
                .kube
                .unwrap_or_else(|| Arc::new(KubeClientImpl::new(self.client))),
            operand_namespace: self.operand_namespace,
            credentials_namespace: self.credentials_namespace,
            operand_image: self.operand_image,
            resync_interval: self.resync_interval,
        }
    }
}

/// Per-kind results of one reconciliation pass
#[derive(Debug, Default)]
pub struct PassReport {
    /// Kinds written during the pass
    pub changed: Vec<&'static str>,
    /// Kinds that failed, in ensure order
    pub failures: Vec<KindFailure>,
    /// Deployment as stored after the pass, when it could be ensured
    pub deployment: Option<Deployment>,
}

impl PassReport {
    fn record<K: Managed>(&mut self, result: Result<Ensured<K>>) -> Option<K> {
        match result {
            Ok(ensured) => {
                if ensured.changed {
                    self.changed.push(K::KIND);
                }
                Some(ensured.object)
            }
            Err(error) => {
                self.fail(K::KIND, error);
                None
            }
        }
    }

    fn fail(&mut self, kind: &'static str, error: Error) {
        warn!(kind, %error, "ensure failed");
        self.failures.push(KindFailure { kind, error });
    }

    /// True when the Deployment reports at least one available replica
    pub fn deployment_available(&self) -> bool {
        self.deployment
            .as_ref()
            .and_then(|d| d.status.as_ref())
            .and_then(|s| s.available_replicas)
            .unwrap_or(0)
            > 0
    }

    /// Status to record for `instance` after this pass
    ///
    /// Transition times of conditions whose status did not change are carried
    /// over, so an unchanged pass yields a status equal to the stored one.
    pub fn status(&self, instance: &ExternalDNS) -> ExternalDNSStatus {
        let previous = instance
            .status
            .as_ref()
            .map(|s| s.conditions.as_slice())
            .unwrap_or_default();
        let available = self.deployment_available();

        let (phase, message) = if !self.failures.is_empty() {
            let kinds: Vec<_> = self.failures.iter().map(|f| f.kind).collect();
            (
                ExternalDNSPhase::Degraded,
                format!("failed to ensure {}", kinds.join(", ")),
            )
        } else if !available {
            (
                ExternalDNSPhase::Degraded,
                "waiting for the operand deployment to become available".to_string(),
            )
        } else {
            (
                ExternalDNSPhase::Ready,
                "all managed resources converged".to_string(),
            )
        };

        let available_condition = if available {
            Condition::new(
                CONDITION_AVAILABLE,
                ConditionStatus::True,
                "DeploymentAvailable",
                "operand deployment has available replicas",
            )
        } else {
            Condition::new(
                CONDITION_AVAILABLE,
                ConditionStatus::False,
                "DeploymentUnavailable",
                "operand deployment has no available replicas",
            )
        };

        let degraded_condition = if self.failures.is_empty() {
            Condition::new(CONDITION_DEGRADED, ConditionStatus::False, "AsExpected", "")
        } else {
            let detail = self
                .failures
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ");
            Condition::new(CONDITION_DEGRADED, ConditionStatus::True, "EnsureFailed", detail)
        };

        ExternalDNSStatus::default()
            .phase(phase)
            .message(message)
            .condition(available_condition.carry_transition_time(previous))
            .condition(degraded_condition.carry_transition_time(previous))
            .observed_generation(instance.metadata.generation)
            .zones(instance.spec.zones.clone())
    }
}

/// Reconcile an ExternalDNS instance
///
/// Returns `Action::requeue` on the resync interval when every managed kind
/// converged, or `Error::Reconcile` listing each kind that failed.
#[instrument(skip(instance, ctx), fields(instance = %instance.name_any()))]
pub async fn reconcile(instance: Arc<ExternalDNS>, ctx: Arc<Context>) -> Result<Action> {
    let name = instance.name_any();
    debug!("reconciling ExternalDNS");

    let mut report = run_pass(&instance, &ctx).await;

    let status = report.status(&instance);
    if instance.status.as_ref() != Some(&status) {
        if let Err(error) = ctx.kube.patch_status(&name, &status).await {
            report.fail(STATUS_KIND, error);
        }
    }

    if !report.failures.is_empty() {
        return Err(Error::Reconcile {
            instance: name,
            failures: report.failures,
        });
    }

    if report.changed.is_empty() {
        debug!("all managed resources in sync");
    } else {
        info!(changed = ?report.changed, "managed resources converged");
    }
    Ok(Action::requeue(ctx.resync_interval))
}

/// Ensure every managed kind once, collecting per-kind results
pub async fn run_pass(instance: &ExternalDNS, ctx: &Context) -> PassReport {
    let kube = ctx.kube.as_ref();
    let namespace = ctx.operand_namespace.as_str();
    let mut report = PassReport::default();

    if let Err(error) = kube.ensure_namespace(namespace).await {
        report.fail(NAMESPACE_KIND, error);
    }

    report.record::<ClusterRole>(ensure(kube, &desired_cluster_role()).await);
    report.record::<ServiceAccount>(
        ensure_built(kube, desired_service_account(instance, namespace)).await,
    );
    report.record::<ClusterRoleBinding>(
        ensure_built(kube, desired_cluster_role_binding(instance, namespace)).await,
    );

    // the credentials copy and the Deployment need a buildable provider and source
    if let Err(error) = provider_arg(instance).and_then(|_| source_arg(instance)) {
        report.fail(Deployment::KIND, error);
        return report;
    }

    let credentials = match copy_credentials(instance, ctx).await.transpose() {
        None => None,
        Some(result) => match report.record::<Secret>(result) {
            Some(copy) => Some(copy),
            None => return report,
        },
    };

    report.deployment = report
        .record::<Deployment>(ensure_deployment(instance, ctx, credentials.as_ref()).await);

    report
}

async fn ensure_built<K: Managed>(kube: &dyn KubeClient, desired: Result<K>) -> Result<Ensured<K>> {
    ensure(kube, &desired?).await
}

async fn ensure_deployment(
    instance: &ExternalDNS,
    ctx: &Context,
    credentials: Option<&Secret>,
) -> Result<Ensured<Deployment>> {
    let desired = desired_deployment(
        instance,
        &DeploymentInputs {
            namespace: &ctx.operand_namespace,
            image: &ctx.operand_image,
            credentials,
        },
    )?;
    ensure(ctx.kube.as_ref(), &desired).await
}

/// Copy the credentials secret the instance references into the operand
/// namespace
///
/// Pods can only mount secrets from their own namespace. An empty reference
/// namespace means the context's credentials namespace.
async fn copy_credentials(instance: &ExternalDNS, ctx: &Context) -> Result<Option<Ensured<Secret>>> {
    let Some(secret_ref) = credentials_secret_ref(instance)? else {
        return Ok(None);
    };

    let namespace = if secret_ref.namespace.is_empty() {
        ctx.credentials_namespace.as_str()
    } else {
        secret_ref.namespace.as_str()
    };

    let Some(source) = ctx.kube.get_secret(namespace, &secret_ref.name).await? else {
        return Err(Error::missing_credentials(
            instance.name_any(),
            namespace,
            secret_ref.name,
        ));
    };

    let desired = desired_credentials_secret(instance, &ctx.operand_namespace, &source)?;
    ensure(ctx.kube.as_ref(), &desired).await.map(Some)
}

/// Map an owned object to the ExternalDNS instance controlling it
///
/// Owned objects live in the operand namespace while instances are
/// cluster-scoped, so the reference drops the child's namespace.
pub fn owning_instance<K: Resource>(obj: &K) -> Option<ObjectRef<ExternalDNS>> {
    obj.owner_references()
        .iter()
        .find(|owner| owner.controller == Some(true) && owner.kind == ExternalDNS::kind(&()))
        .map(|owner| ObjectRef::new(&owner.name))
}

/// Error policy for the controller
///
/// Errors that can clear on their own are retried quickly; instances the
/// operator cannot build resources for are retried slowly.
pub fn error_policy(instance: Arc<ExternalDNS>, error: &Error, _ctx: Arc<Context>) -> Action {
    let retryable = error.is_retryable();
    error!(
        ?error,
        instance = %instance.name_any(),
        retryable,
        "reconciliation failed"
    );

    if retryable {
        Action::requeue(RETRY_INTERVAL)
    } else {
        Action::requeue(PERMANENT_FAILURE_INTERVAL)
    }
}
