//! Operand Deployment: one pod, one ExternalDNS container per zone

use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    Container, EnvVar, EnvVarSource, PodSpec, PodTemplateSpec, Secret, SecretKeySelector,
    SecretVolumeSource, Toleration, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use kube::api::ObjectMeta;
use kube::ResourceExt;

use super::owner_reference;
use crate::crd::{ExternalDNS, HostnameAnnotationPolicy, ProviderType, ServiceType, SourceType};
use crate::names::{app_labels, container_name, resource_name};
use crate::{Error, Result, EXTERNAL_DNS_BASE_NAME, METRICS_START_PORT};

/// Name of the pod volume holding the credentials secret
pub const CREDENTIALS_VOLUME_NAME: &str = "credentials";

/// Where the credentials secret is mounted in every container
pub const CREDENTIALS_MOUNT_PATH: &str = "/etc/kubernetes";

const OS_LABEL: &str = "kubernetes.io/os";
const LINUX_OS: &str = "linux";
const MASTER_NODE_ROLE_LABEL: &str = "node-role.kubernetes.io/master";
const CONTROL_PLANE_TAINTS: [&str; 2] = [
    "node-role.kubernetes.io/master",
    "node-role.kubernetes.io/control-plane",
];

const AWS_CREDENTIALS_ENV: &str = "AWS_SHARED_CREDENTIALS_FILE";
const AWS_CREDENTIALS_FILE: &str = "aws-credentials";
const GCP_CREDENTIALS_ENV: &str = "GOOGLE_APPLICATION_CREDENTIALS";
const GCP_CREDENTIALS_FILE: &str = "gcp-credentials.json";
const AZURE_CONFIG_FILE: &str = "azure.json";
const BLUECAT_CONFIG_FILE: &str = "bluecat.json";
const INFOBLOX_USERNAME_ENV: &str = "EXTERNAL_DNS_INFOBLOX_WAPI_USERNAME";
const INFOBLOX_PASSWORD_ENV: &str = "EXTERNAL_DNS_INFOBLOX_WAPI_PASSWORD";

/// Env vars the operator sets for provider credentials
pub const PROVIDER_ENV_VARS: [&str; 4] = [
    AWS_CREDENTIALS_ENV,
    GCP_CREDENTIALS_ENV,
    INFOBLOX_USERNAME_ENV,
    INFOBLOX_PASSWORD_ENV,
];

/// Cluster context the Deployment is built from
#[derive(Clone, Copy, Debug)]
pub struct DeploymentInputs<'a> {
    /// Namespace the operand runs in
    pub namespace: &'a str,
    /// ExternalDNS image
    pub image: &'a str,
    /// Credentials secret in the operand namespace, when the instance references one
    pub credentials: Option<&'a Secret>,
}

/// `--provider` value ExternalDNS expects for the instance's provider
pub fn provider_arg(instance: &ExternalDNS) -> Result<&'static str> {
    match &instance.spec.provider.type_ {
        ProviderType::Aws => Ok("aws"),
        ProviderType::Gcp => Ok("google"),
        ProviderType::Azure => Ok("azure"),
        ProviderType::BlueCat => Ok("bluecat"),
        ProviderType::Infoblox => Ok("infoblox"),
        ProviderType::Unsupported(raw) => {
            Err(Error::unsupported_provider(instance.name_any(), raw.clone()))
        }
    }
}

/// `--source` value ExternalDNS expects for the instance's source
pub fn source_arg(instance: &ExternalDNS) -> Result<&'static str> {
    match &instance.spec.source.type_ {
        SourceType::OpenShiftRoute => Ok("openshift-route"),
        SourceType::Service => Ok("service"),
        SourceType::Unsupported(raw) => {
            Err(Error::unsupported_source(instance.name_any(), raw.clone()))
        }
    }
}

/// Desired operand Deployment
///
/// Fails as a whole on the first unsupported provider or source; a partial
/// Deployment is never returned.
pub fn desired_deployment(instance: &ExternalDNS, inputs: &DeploymentInputs<'_>) -> Result<Deployment> {
    let provider = provider_arg(instance)?;
    let source = source_arg(instance)?;
    let name = resource_name(instance)?;
    let labels = app_labels(instance)?;

    let wiring = CredentialWiring::for_instance(instance, inputs.credentials);
    let common_args = common_args(instance, provider, source, &wiring);

    let containers = instance
        .spec
        .zones
        .iter()
        .enumerate()
        .map(|(index, zone)| {
            zone_container(instance, inputs.image, index, zone, &common_args, &wiring)
        })
        .collect();

    Ok(Deployment {
        metadata: ObjectMeta {
            name: Some(name.clone()),
            namespace: Some(inputs.namespace.to_string()),
            owner_references: Some(vec![owner_reference(instance)?]),
            ..Default::default()
        },
        spec: Some(DeploymentSpec {
            replicas: Some(1),
            selector: LabelSelector {
                match_labels: Some(labels.clone()),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    service_account_name: Some(name),
                    node_selector: Some(BTreeMap::from([
                        (OS_LABEL.to_string(), LINUX_OS.to_string()),
                        (MASTER_NODE_ROLE_LABEL.to_string(), String::new()),
                    ])),
                    tolerations: Some(control_plane_tolerations()),
                    containers,
                    volumes: wiring.volume.map(|v| vec![v]),
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    })
}

fn control_plane_tolerations() -> Vec<Toleration> {
    CONTROL_PLANE_TAINTS
        .iter()
        .map(|key| Toleration {
            key: Some(key.to_string()),
            operator: Some("Exists".to_string()),
            effect: Some("NoSchedule".to_string()),
            ..Default::default()
        })
        .collect()
}

/// Args shared by every zone container
fn common_args(
    instance: &ExternalDNS,
    provider: &str,
    source: &str,
    wiring: &CredentialWiring,
) -> Vec<String> {
    let spec = &instance.spec.source;
    let mut args = vec![
        format!("--txt-owner-id={}-{}", EXTERNAL_DNS_BASE_NAME, instance.name_any()),
        format!("--provider={provider}"),
        format!("--source={source}"),
        "--policy=sync".to_string(),
        "--registry=txt".to_string(),
        "--log-level=debug".to_string(),
    ];

    if let Some(ns) = &spec.namespace {
        args.push(format!("--namespace={ns}"));
    }

    if !spec.annotation_filter.is_empty() {
        let filter = spec
            .annotation_filter
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(",");
        args.push(format!("--annotation-filter={filter}"));
    }

    if !spec.service_type.is_empty() {
        let types = spec
            .service_type
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");
        args.push(format!("--service-type-filter={types}"));
        if spec.service_type.contains(&ServiceType::ClusterIP) {
            args.push("--publish-internal-services".to_string());
        }
    }

    if spec.hostname_annotation == HostnameAnnotationPolicy::Ignore {
        args.push("--ignore-hostname-annotation".to_string());
    }

    if !spec.fqdn_template.is_empty() {
        args.push(format!("--fqdn-template={}", spec.fqdn_template.join(",")));
    }

    args.extend(wiring.args.iter().cloned());
    args
}

fn zone_container(
    instance: &ExternalDNS,
    image: &str,
    index: usize,
    zone: &str,
    common_args: &[String],
    wiring: &CredentialWiring,
) -> Container {
    let metrics_port = u64::from(METRICS_START_PORT) + index as u64;
    let mut args = Vec::with_capacity(common_args.len() + 2);
    args.push(format!("--metrics-address=127.0.0.1:{metrics_port}"));
    args.push(format!("--zone-id-filter={zone}"));
    args.extend(common_args.iter().cloned());

    tracing::trace!(instance = %instance.name_any(), zone, index, "building zone container");

    Container {
        name: container_name(zone),
        image: Some(image.to_string()),
        args: Some(args),
        env: (!wiring.env.is_empty()).then(|| wiring.env.clone()),
        volume_mounts: wiring.volume.as_ref().map(|v| {
            vec![VolumeMount {
                name: v.name.clone(),
                mount_path: CREDENTIALS_MOUNT_PATH.to_string(),
                read_only: Some(true),
                ..Default::default()
            }]
        }),
        ..Default::default()
    }
}

/// Provider-specific flags, env and volume derived from the credentials secret
#[derive(Default)]
struct CredentialWiring {
    args: Vec<String>,
    env: Vec<EnvVar>,
    volume: Option<Volume>,
}

impl CredentialWiring {
    fn for_instance(instance: &ExternalDNS, secret: Option<&Secret>) -> Self {
        let provider = &instance.spec.provider;
        let secret_name = secret.map(|s| s.name_any());
        let mut wiring = Self::default();

        match &provider.type_ {
            ProviderType::Aws => {
                if let Some(name) = &secret_name {
                    wiring.env.push(file_env(AWS_CREDENTIALS_ENV, AWS_CREDENTIALS_FILE));
                    wiring.mount(name);
                }
            }
            ProviderType::Gcp => {
                if let Some(project) = provider.gcp.as_ref().and_then(|g| g.project.as_ref()) {
                    wiring.args.push(format!("--google-project={project}"));
                }
                if let Some(name) = &secret_name {
                    wiring.env.push(file_env(GCP_CREDENTIALS_ENV, GCP_CREDENTIALS_FILE));
                    wiring.mount(name);
                }
            }
            ProviderType::Azure => {
                if let Some(name) = &secret_name {
                    wiring.args.push(format!(
                        "--azure-config-file={CREDENTIALS_MOUNT_PATH}/{AZURE_CONFIG_FILE}"
                    ));
                    wiring.mount(name);
                }
            }
            ProviderType::BlueCat => {
                if let Some(name) = &secret_name {
                    wiring.args.push(format!(
                        "--bluecat-config-file={CREDENTIALS_MOUNT_PATH}/{BLUECAT_CONFIG_FILE}"
                    ));
                    wiring.mount(name);
                }
            }
            ProviderType::Infoblox => {
                if let Some(opts) = &provider.infoblox {
                    wiring.args.extend([
                        format!("--infoblox-grid-host={}", opts.grid_host),
                        format!("--infoblox-wapi-port={}", opts.wapi_port),
                        format!("--infoblox-wapi-version={}", opts.wapi_version),
                    ]);
                }
                if let Some(name) = &secret_name {
                    wiring.env.push(secret_env(INFOBLOX_USERNAME_ENV, name));
                    wiring.env.push(secret_env(INFOBLOX_PASSWORD_ENV, name));
                }
            }
            // rejected by provider_arg before wiring is built
            ProviderType::Unsupported(_) => {}
        }
        wiring
    }

    fn mount(&mut self, secret_name: &str) {
        self.volume = Some(Volume {
            name: CREDENTIALS_VOLUME_NAME.to_string(),
            secret: Some(SecretVolumeSource {
                secret_name: Some(secret_name.to_string()),
                ..Default::default()
            }),
            ..Default::default()
        });
    }
}

fn file_env(name: &str, file: &str) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value: Some(format!("{CREDENTIALS_MOUNT_PATH}/{file}")),
        ..Default::default()
    }
}

/// Env var read from the secret key of the same name
fn secret_env(name: &str, secret_name: &str) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value_from: Some(EnvVarSource {
            secret_key_ref: Some(SecretKeySelector {
                name: secret_name.to_string(),
                key: name.to_string(),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}
