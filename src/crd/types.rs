//! Supporting types for the ExternalDNS CRD

use std::fmt;

use chrono::{DateTime, Utc};
use schemars::gen::SchemaGenerator;
use schemars::schema::{InstanceType, Schema, SchemaObject};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// DNS provider backing an ExternalDNS instance
///
/// Values outside the known table deserialize into [`ProviderType::Unsupported`]
/// so the raw value can be reported when the operand is built.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(from = "String", into = "String")]
pub enum ProviderType {
    /// Amazon Route 53
    Aws,
    /// Google Cloud DNS
    Gcp,
    /// Azure DNS
    Azure,
    /// BlueCat Address Manager
    BlueCat,
    /// Infoblox NIOS
    Infoblox,
    /// Any value the operator does not know how to deploy
    Unsupported(String),
}

impl ProviderType {
    /// Every provider the operator can deploy, in API order
    pub const KNOWN: [ProviderType; 5] = [
        ProviderType::Aws,
        ProviderType::Gcp,
        ProviderType::Azure,
        ProviderType::BlueCat,
        ProviderType::Infoblox,
    ];

    /// API spelling of this provider
    pub fn as_str(&self) -> &str {
        match self {
            Self::Aws => "AWS",
            Self::Gcp => "GCP",
            Self::Azure => "Azure",
            Self::BlueCat => "BlueCat",
            Self::Infoblox => "Infoblox",
            Self::Unsupported(raw) => raw,
        }
    }
}

impl From<String> for ProviderType {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "AWS" => Self::Aws,
            "GCP" => Self::Gcp,
            "Azure" => Self::Azure,
            "BlueCat" => Self::BlueCat,
            "Infoblox" => Self::Infoblox,
            _ => Self::Unsupported(raw),
        }
    }
}

impl From<ProviderType> for String {
    fn from(provider: ProviderType) -> Self {
        match provider {
            ProviderType::Unsupported(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for ProviderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl JsonSchema for ProviderType {
    fn schema_name() -> String {
        "ProviderType".to_string()
    }

    fn json_schema(_gen: &mut SchemaGenerator) -> Schema {
        string_enum_schema(Self::KNOWN.iter().map(|p| p.as_str()))
    }
}

/// Kind of cluster object ExternalDNS derives records from
#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(from = "String", into = "String")]
pub enum SourceType {
    /// OpenShift Routes
    OpenShiftRoute,
    /// Kubernetes Services
    Service,
    /// Any value the operator does not know how to deploy
    Unsupported(String),
}

impl SourceType {
    /// Every source the operator can deploy, in API order
    pub const KNOWN: [SourceType; 2] = [SourceType::OpenShiftRoute, SourceType::Service];

    /// API spelling of this source
    pub fn as_str(&self) -> &str {
        match self {
            Self::OpenShiftRoute => "OpenShiftRoute",
            Self::Service => "Service",
            Self::Unsupported(raw) => raw,
        }
    }
}

impl From<String> for SourceType {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "OpenShiftRoute" => Self::OpenShiftRoute,
            "Service" => Self::Service,
            _ => Self::Unsupported(raw),
        }
    }
}

impl From<SourceType> for String {
    fn from(source: SourceType) -> Self {
        match source {
            SourceType::Unsupported(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl JsonSchema for SourceType {
    fn schema_name() -> String {
        "SourceType".to_string()
    }

    fn json_schema(_gen: &mut SchemaGenerator) -> Schema {
        string_enum_schema(Self::KNOWN.iter().map(|s| s.as_str()))
    }
}

fn string_enum_schema<'a>(values: impl Iterator<Item = &'a str>) -> Schema {
    SchemaObject {
        instance_type: Some(InstanceType::String.into()),
        enum_values: Some(values.map(serde_json::Value::from).collect()),
        ..Default::default()
    }
    .into()
}

/// Kubernetes Service types accepted by the service-type filter
#[derive(Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq, Hash)]
pub enum ServiceType {
    /// Cluster-internal virtual IP
    ClusterIP,
    /// Port exposed on every node
    NodePort,
    /// Cloud load balancer
    LoadBalancer,
    /// CNAME to an external name
    ExternalName,
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClusterIP => write!(f, "ClusterIP"),
            Self::NodePort => write!(f, "NodePort"),
            Self::LoadBalancer => write!(f, "LoadBalancer"),
            Self::ExternalName => write!(f, "ExternalName"),
        }
    }
}

/// Whether ExternalDNS honours the hostname annotation on source objects
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum HostnameAnnotationPolicy {
    /// Use the `external-dns.alpha.kubernetes.io/hostname` annotation
    #[default]
    Allow,
    /// Ignore the annotation; hostnames come from the FQDN template
    Ignore,
}

/// Reference to a Secret holding provider credentials
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct SecretRef {
    /// Secret name
    pub name: String,
    /// Secret namespace; empty means the operator's credentials namespace
    #[serde(default)]
    pub namespace: String,
}

impl fmt::Display for SecretRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Lifecycle phase reported in the ExternalDNS status
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum ExternalDNSPhase {
    /// Not reconciled yet
    #[default]
    Pending,
    /// Every managed resource converged and the operand is available
    Ready,
    /// A managed resource failed to converge or the operand is unavailable
    Degraded,
}

impl fmt::Display for ExternalDNSPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "Pending"),
            Self::Ready => write!(f, "Ready"),
            Self::Degraded => write!(f, "Degraded"),
        }
    }
}

/// Condition status values
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum ConditionStatus {
    /// Condition is true
    True,
    /// Condition is false
    False,
    /// Condition status is unknown
    #[default]
    Unknown,
}

impl fmt::Display for ConditionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::True => write!(f, "True"),
            Self::False => write!(f, "False"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Kubernetes-style condition for status reporting
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition (e.g. Available, Degraded)
    #[serde(rename = "type")]
    pub type_: String,

    /// Status of the condition
    pub status: ConditionStatus,

    /// Machine-readable reason
    pub reason: String,

    /// Human-readable message
    pub message: String,

    /// Last time the condition transitioned
    pub last_transition_time: DateTime<Utc>,
}

impl Condition {
    /// Create a new condition stamped with the current time
    pub fn new(
        type_: impl Into<String>,
        status: ConditionStatus,
        reason: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            type_: type_.into(),
            status,
            reason: reason.into(),
            message: message.into(),
            last_transition_time: Utc::now(),
        }
    }

    /// Keep the previous transition time when the status did not flip
    pub fn carry_transition_time(mut self, previous: &[Condition]) -> Self {
        if let Some(prev) = previous
            .iter()
            .find(|c| c.type_ == self.type_ && c.status == self.status)
        {
            self.last_transition_time = prev.last_transition_time;
        }
        self
    }
}
