//! Integration tests for CRD operations
//!
//! These tests tell the story of how administrators create ExternalDNS
//! resources through the Kubernetes API.

use kube::api::{Api, PostParams};

use external_dns_operator::crd::{ExternalDNS, ProviderType, SourceType};

use super::helpers::{aws_instance, cleanup_instance, ensure_test_cluster};

// =============================================================================
// Instance Creation Stories
// =============================================================================

/// Story: Administrator creates an ExternalDNS instance for one zone
///
/// Expected behavior:
/// - The instance is stored cluster-wide
/// - Provider, source and zones round-trip through the API server
#[tokio::test]
#[ignore = "requires kind cluster - run with: cargo test --test kind -- --ignored"]
async fn story_admin_creates_instance() {
    let client = ensure_test_cluster()
        .await
        .expect("failed to setup cluster");
    let api: Api<ExternalDNS> = Api::all(client.clone());
    let name = "test-crd-create";
    cleanup_instance(&client, name).await;

    let created = api
        .create(&PostParams::default(), &aws_instance(name, &["public-zone"]))
        .await
        .expect("failed to create instance");

    assert_eq!(created.metadata.name.as_deref(), Some(name));
    assert!(created.metadata.uid.is_some());

    let fetched = api.get(name).await.expect("failed to get instance");
    assert_eq!(fetched.spec.provider.type_, ProviderType::Aws);
    assert_eq!(fetched.spec.source.type_, SourceType::Service);
    assert_eq!(fetched.spec.zones, vec!["public-zone".to_string()]);

    cleanup_instance(&client, name).await;
}

/// Story: The API server accepts a provider this operator does not know yet
///
/// The schema does not restrict provider names, so the value reaches the
/// reconciler, which reports it as unsupported.
///
/// Expected behavior:
/// - The instance is stored with its raw provider value
#[tokio::test]
#[ignore = "requires kind cluster - run with: cargo test --test kind -- --ignored"]
async fn story_unknown_provider_is_stored_verbatim() {
    let client = ensure_test_cluster()
        .await
        .expect("failed to setup cluster");
    let api: Api<ExternalDNS> = Api::all(client.clone());
    let name = "test-crd-unknown-provider";
    cleanup_instance(&client, name).await;

    let mut instance = aws_instance(name, &["z"]);
    instance.spec.provider.type_ = ProviderType::Unsupported("Route66".to_string());
    api.create(&PostParams::default(), &instance)
        .await
        .expect("failed to create instance");

    let fetched = api.get(name).await.expect("failed to get instance");
    assert_eq!(
        fetched.spec.provider.type_,
        ProviderType::Unsupported("Route66".to_string())
    );

    cleanup_instance(&client, name).await;
}
