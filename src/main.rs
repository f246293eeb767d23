//! ExternalDNS operator - deploys and reconciles ExternalDNS operands

use std::sync::Arc;

use clap::{Parser, Subcommand};
use futures::StreamExt;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Secret, ServiceAccount};
use k8s_openapi::api::rbac::v1::ClusterRoleBinding;
use kube::runtime::watcher::Config as WatcherConfig;
use kube::runtime::Controller;
use kube::{Api, Client, CustomResourceExt};

use external_dns_operator::config::OperatorConfig;
use external_dns_operator::controller::{error_policy, owning_instance, reconcile, Context};
use external_dns_operator::crd::ExternalDNS;
use external_dns_operator::telemetry::{init_telemetry, TelemetryConfig};
use external_dns_operator::FIELD_MANAGER;

/// Kubernetes operator that deploys ExternalDNS instances
#[derive(Parser, Debug)]
#[command(name = "external-dns-operator", version, about, long_about = None)]
struct Cli {
    /// Generate CRD manifests and exit
    #[arg(long)]
    crd: bool,

    #[command(flatten)]
    config: OperatorConfig,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run as controller (default mode)
    ///
    /// Watches ExternalDNS instances cluster-wide and keeps each one's
    /// ServiceAccount, ClusterRoleBinding, credentials copy and Deployment
    /// in the operand namespace in sync with it.
    Controller,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // The kube client's TLS stack needs a process-wide crypto provider
    if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
        eprintln!(
            "CRITICAL: Failed to install crypto provider: {:?}. \
             The Kubernetes client cannot establish TLS connections without it.",
            e
        );
        std::process::exit(1);
    }

    let cli = Cli::parse();

    if cli.crd {
        let crd = serde_yaml::to_string(&ExternalDNS::crd())
            .map_err(|e| anyhow::anyhow!("Failed to serialize CRD: {}", e))?;
        println!("{crd}");
        return Ok(());
    }

    init_telemetry(TelemetryConfig {
        json: cli.config.json_logs,
    })?;

    match cli.command {
        Some(Commands::Controller) | None => run_controller(cli.config).await,
    }
}

/// Ensure the ExternalDNS CRD is installed
///
/// The operator installs its own CRD on startup using server-side apply so the
/// served schema always matches the operator version.
async fn ensure_crds_installed(client: &Client) -> anyhow::Result<()> {
    use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
    use kube::api::{Patch, PatchParams};
    use kube::ResourceExt;

    let crds: Api<CustomResourceDefinition> = Api::all(client.clone());
    let params = PatchParams::apply(FIELD_MANAGER).force();

    let crd = ExternalDNS::crd();
    let name = crd.name_any();
    tracing::info!(crd = %name, "Installing ExternalDNS CRD...");
    crds.patch(&name, &params, &Patch::Apply(&crd))
        .await
        .map_err(|e| anyhow::anyhow!("Failed to install ExternalDNS CRD: {}", e))?;

    tracing::info!("ExternalDNS CRD installed/updated");
    Ok(())
}

/// Run the ExternalDNS controller until a shutdown signal arrives
async fn run_controller(config: OperatorConfig) -> anyhow::Result<()> {
    tracing::info!(
        operand_namespace = %config.operand_namespace,
        operator_namespace = %config.operator_namespace,
        operand_image = %config.operand_image,
        resync_secs = config.resync_secs,
        "Starting ExternalDNS operator"
    );

    let client = Client::try_default()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create Kubernetes client: {}", e))?;

    ensure_crds_installed(&client).await?;

    let instances: Api<ExternalDNS> = Api::all(client.clone());
    let deployments: Api<Deployment> = Api::namespaced(client.clone(), &config.operand_namespace);
    let accounts: Api<ServiceAccount> =
        Api::namespaced(client.clone(), &config.operand_namespace);
    let bindings: Api<ClusterRoleBinding> = Api::all(client.clone());
    let secrets: Api<Secret> = Api::namespaced(client.clone(), &config.operand_namespace);

    let ctx = Arc::new(Context::from_config(client, &config));

    Controller::new(instances, WatcherConfig::default())
        .watches(deployments, WatcherConfig::default(), |d| owning_instance(&d))
        .watches(accounts, WatcherConfig::default(), |sa| owning_instance(&sa))
        .watches(bindings, WatcherConfig::default(), |crb| owning_instance(&crb))
        .watches(secrets, WatcherConfig::default(), |s| owning_instance(&s))
        .shutdown_on_signal()
        .run(reconcile, error_policy, ctx)
        .for_each(|result| async move {
            match result {
                Ok(action) => {
                    tracing::debug!(?action, "ExternalDNS reconciliation completed");
                }
                Err(e) => {
                    tracing::error!(error = ?e, "ExternalDNS reconciliation error");
                }
            }
        })
        .await;

    tracing::info!("ExternalDNS controller stopped");
    Ok(())
}
