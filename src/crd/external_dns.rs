//! ExternalDNS Custom Resource Definition
//!
//! An ExternalDNS instance asks the operator to run one ExternalDNS operand
//! per instance, with one container per DNS zone.

use std::collections::BTreeMap;

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::{
    Condition, ExternalDNSPhase, HostnameAnnotationPolicy, ProviderType, SecretRef, ServiceType,
    SourceType,
};

/// Specification for an ExternalDNS instance
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "externaldns.olm.openshift.io",
    version = "v1alpha1",
    kind = "ExternalDNS",
    plural = "externaldnses",
    shortname = "edns",
    status = "ExternalDNSStatus",
    namespaced = false,
    printcolumn = r#"{"name":"Phase","type":"string","jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Provider","type":"string","jsonPath":".spec.provider.type"}"#,
    printcolumn = r#"{"name":"Source","type":"string","jsonPath":".spec.source.type"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ExternalDNSSpec {
    /// DNS provider and its credentials
    pub provider: ExternalDNSProvider,

    /// Cluster objects records are derived from
    pub source: ExternalDNSSource,

    /// Provider zone identifiers; each zone gets its own container
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub zones: Vec<String>,
}

/// Provider selection
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExternalDNSProvider {
    /// Provider type
    #[serde(rename = "type")]
    pub type_: ProviderType,

    /// Route 53 options
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aws: Option<AwsProviderOptions>,

    /// Cloud DNS options
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gcp: Option<GcpProviderOptions>,

    /// Azure DNS options
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub azure: Option<AzureProviderOptions>,

    /// BlueCat options
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blue_cat: Option<BlueCatProviderOptions>,

    /// Infoblox options
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub infoblox: Option<InfobloxProviderOptions>,
}

/// Route 53 options
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AwsProviderOptions {
    /// Secret holding an `aws-credentials` shared credentials file
    pub credentials: SecretRef,
}

/// Cloud DNS options
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GcpProviderOptions {
    /// Secret holding a `gcp-credentials.json` service account key
    pub credentials: SecretRef,

    /// GCP project owning the zones
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
}

/// Azure DNS options
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AzureProviderOptions {
    /// Secret holding an `azure.json` config file
    pub config_file: SecretRef,
}

/// BlueCat options
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BlueCatProviderOptions {
    /// Secret holding a `bluecat.json` config file
    pub config_file: SecretRef,
}

/// Infoblox options
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InfobloxProviderOptions {
    /// Secret holding the WAPI username and password
    pub credentials: SecretRef,

    /// Grid master host
    pub grid_host: String,

    /// WAPI port
    pub wapi_port: u16,

    /// WAPI version (e.g. 2.3.1)
    pub wapi_version: String,
}

/// Source selection and filters
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExternalDNSSource {
    /// Source type
    #[serde(rename = "type")]
    pub type_: SourceType,

    /// Restrict the source to a single namespace
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// Only objects carrying all of these annotations are considered
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotation_filter: BTreeMap<String, String>,

    /// Service types to consider (Service source only)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub service_type: Vec<ServiceType>,

    /// Hostname annotation handling
    #[serde(default)]
    pub hostname_annotation: HostnameAnnotationPolicy,

    /// Go templates used to build hostnames
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fqdn_template: Vec<String>,
}

/// Status for an ExternalDNS instance
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExternalDNSStatus {
    /// Current phase
    #[serde(default)]
    pub phase: ExternalDNSPhase,

    /// Human-readable message about current state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Conditions representing the operand state
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,

    /// Generation of the spec the status was computed from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    /// Zones the operand is currently configured for
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub zones: Vec<String>,
}

impl ExternalDNSStatus {
    /// Set the phase and return self for chaining
    pub fn phase(mut self, phase: ExternalDNSPhase) -> Self {
        self.phase = phase;
        self
    }

    /// Set the message and return self for chaining
    pub fn message(mut self, msg: impl Into<String>) -> Self {
        self.message = Some(msg.into());
        self
    }

    /// Add a condition and return self for chaining
    pub fn condition(mut self, condition: Condition) -> Self {
        // Remove existing condition of the same type
        self.conditions.retain(|c| c.type_ != condition.type_);
        self.conditions.push(condition);
        self
    }

    /// Set the observed generation and return self for chaining
    pub fn observed_generation(mut self, generation: Option<i64>) -> Self {
        self.observed_generation = generation;
        self
    }

    /// Set the configured zones and return self for chaining
    pub fn zones(mut self, zones: Vec<String>) -> Self {
        self.zones = zones;
        self
    }
}
