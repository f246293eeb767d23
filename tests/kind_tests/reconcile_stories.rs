//! Integration tests for reconciliation passes
//!
//! Each story drives `reconcile` in-process against the kind API server, the
//! same way the controller runtime would, and inspects what was stored.

use std::sync::Arc;

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Secret, ServiceAccount};
use k8s_openapi::api::rbac::v1::{ClusterRole, ClusterRoleBinding};
use kube::api::{Api, Patch, PatchParams, PostParams};
use kube::Client;

use external_dns_operator::controller::{reconcile, Context, KubeClient};
use external_dns_operator::crd::{ExternalDNS, ExternalDNSPhase, ProviderType};
use external_dns_operator::Error;

use super::helpers::{
    apply_aws_secret, aws_instance, cleanup_instance, ensure_test_cluster, TEST_NAMESPACE,
};

fn context(client: &Client) -> Arc<Context> {
    Arc::new(
        Context::builder(client.clone())
            .operand_namespace(TEST_NAMESPACE)
            .build(),
    )
}

/// Create the instance and return it as stored, with its uid
async fn create_instance(client: &Client, instance: &ExternalDNS) -> ExternalDNS {
    let api: Api<ExternalDNS> = Api::all(client.clone());
    api.create(&PostParams::default(), instance)
        .await
        .expect("failed to create instance")
}

// =============================================================================
// Converging Stories
// =============================================================================

/// Story: A new AWS instance gets its complete operand
///
/// Expected behavior:
/// - The shared ClusterRole exists
/// - ServiceAccount, ClusterRoleBinding and Deployment are named after the
///   instance and owned by it
/// - The Deployment runs one container per zone with the provider flags
/// - The credentials secret is copied next to the operand and owned by the
///   instance
#[tokio::test]
#[ignore = "requires kind cluster - run with: cargo test --test kind -- --ignored"]
async fn story_new_instance_gets_its_operand() {
    let client = ensure_test_cluster()
        .await
        .expect("failed to setup cluster");
    let name = "test-reconcile-create";
    cleanup_instance(&client, name).await;

    let ctx = context(&client);
    ctx.kube
        .ensure_namespace(TEST_NAMESPACE)
        .await
        .expect("failed to create namespace");
    apply_aws_secret(&client)
        .await
        .expect("failed to create secret");

    let instance = create_instance(&client, &aws_instance(name, &["zone-a", "zone-b"])).await;
    reconcile(Arc::new(instance.clone()), ctx.clone())
        .await
        .expect("reconcile should succeed");

    let roles: Api<ClusterRole> = Api::all(client.clone());
    assert!(roles.get("external-dns").await.is_ok());

    let resource = format!("external-dns-{name}");
    let accounts: Api<ServiceAccount> = Api::namespaced(client.clone(), TEST_NAMESPACE);
    let account = accounts.get(&resource).await.expect("service account");
    assert_eq!(
        account.metadata.owner_references.unwrap()[0].uid,
        instance.metadata.uid.clone().unwrap()
    );

    let bindings: Api<ClusterRoleBinding> = Api::all(client.clone());
    let binding = bindings.get(&resource).await.expect("binding");
    assert_eq!(binding.role_ref.name, "external-dns");

    let deployments: Api<Deployment> = Api::namespaced(client.clone(), TEST_NAMESPACE);
    let deployment = deployments.get(&resource).await.expect("deployment");
    let containers = deployment.spec.unwrap().template.spec.unwrap().containers;
    assert_eq!(containers.len(), 2);
    assert!(containers[0]
        .args
        .as_ref()
        .unwrap()
        .contains(&"--provider=aws".to_string()));

    let secrets: Api<Secret> = Api::namespaced(client.clone(), TEST_NAMESPACE);
    let copy = secrets
        .get(&format!("external-dns-credentials-{name}"))
        .await
        .expect("credentials copy");
    assert_eq!(
        copy.metadata.owner_references.unwrap()[0].uid,
        instance.metadata.uid.clone().unwrap()
    );

    cleanup_instance(&client, name).await;
}

/// Story: Someone edits the operand image by hand and the operator reverts it
///
/// Expected behavior:
/// - The next pass restores the operand image
#[tokio::test]
#[ignore = "requires kind cluster - run with: cargo test --test kind -- --ignored"]
async fn story_manual_image_change_is_reverted() {
    let client = ensure_test_cluster()
        .await
        .expect("failed to setup cluster");
    let name = "test-reconcile-drift";
    cleanup_instance(&client, name).await;

    let ctx = context(&client);
    ctx.kube
        .ensure_namespace(TEST_NAMESPACE)
        .await
        .expect("failed to create namespace");
    apply_aws_secret(&client)
        .await
        .expect("failed to create secret");

    let instance = create_instance(&client, &aws_instance(name, &["zone-a"])).await;
    reconcile(Arc::new(instance.clone()), ctx.clone())
        .await
        .expect("first pass");

    let resource = format!("external-dns-{name}");
    let deployments: Api<Deployment> = Api::namespaced(client.clone(), TEST_NAMESPACE);
    let mut edited = deployments.get(&resource).await.expect("deployment");
    if let Some(pod) = edited.spec.as_mut().and_then(|s| s.template.spec.as_mut()) {
        pod.containers[0].image = Some("busybox:latest".to_string());
    }
    deployments
        .patch(
            &resource,
            &PatchParams::default(),
            &Patch::Merge(&serde_json::json!({ "spec": edited.spec })),
        )
        .await
        .expect("manual edit");

    reconcile(Arc::new(instance), ctx.clone())
        .await
        .expect("second pass");

    let restored = deployments.get(&resource).await.expect("deployment");
    let image = restored.spec.unwrap().template.spec.unwrap().containers[0]
        .image
        .clone();
    assert_eq!(image.as_deref(), Some(ctx.operand_image.as_str()));

    cleanup_instance(&client, name).await;
}

// =============================================================================
// Failure Stories
// =============================================================================

/// Story: An instance naming an unknown provider is reported as degraded
///
/// Expected behavior:
/// - The pass fails with a non-retryable error
/// - No Deployment is created
/// - The status phase is Degraded
#[tokio::test]
#[ignore = "requires kind cluster - run with: cargo test --test kind -- --ignored"]
async fn story_unknown_provider_is_degraded() {
    let client = ensure_test_cluster()
        .await
        .expect("failed to setup cluster");
    let name = "test-reconcile-unknown";
    cleanup_instance(&client, name).await;

    let mut instance = aws_instance(name, &["z"]);
    instance.spec.provider.type_ = ProviderType::Unsupported("Route66".to_string());
    let instance = create_instance(&client, &instance).await;

    let err = reconcile(Arc::new(instance), context(&client))
        .await
        .expect_err("unknown provider must fail");
    assert!(matches!(err, Error::Reconcile { .. }));
    assert!(!err.is_retryable());

    let deployments: Api<Deployment> = Api::namespaced(client.clone(), TEST_NAMESPACE);
    assert!(deployments
        .get_opt(&format!("external-dns-{name}"))
        .await
        .expect("get deployment")
        .is_none());

    let api: Api<ExternalDNS> = Api::all(client.clone());
    let stored = api.get(name).await.expect("instance");
    assert_eq!(
        stored.status.map(|s| s.phase),
        Some(ExternalDNSPhase::Degraded)
    );

    cleanup_instance(&client, name).await;
}
