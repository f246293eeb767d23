//! ExternalDNS operator - deploys and reconciles ExternalDNS operands
//!
//! Each `ExternalDNS` custom resource describes one ExternalDNS deployment:
//! which DNS provider to talk to, which cluster objects to read hostnames
//! from, and which zones to manage. The operator keeps four resources in line
//! with it: a shared ClusterRole, and a ServiceAccount, ClusterRoleBinding and
//! Deployment owned by the instance.
//!
//! # Modules
//!
//! - [`crd`] - The `ExternalDNS` Custom Resource Definition
//! - [`names`] - Deterministic names for managed resources and containers
//! - [`resources`] - Builders for the desired managed resources
//! - [`drift`] - Field-level comparison of observed against desired resources
//! - [`controller`] - Reconciliation loop and Kubernetes client seam
//! - [`config`] - Operator configuration
//! - [`telemetry`] - Tracing subscriber setup
//! - [`error`] - Error types for the operator

#![deny(missing_docs)]

pub mod config;
pub mod controller;
pub mod crd;
pub mod drift;
pub mod error;
pub mod names;
pub mod resources;
pub mod telemetry;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

// =============================================================================
// Operand Constants
// =============================================================================

/// Base name shared by every ExternalDNS resource the operator manages
pub const EXTERNAL_DNS_BASE_NAME: &str = "external-dns";

/// Default namespace the operands run in
pub const DEFAULT_OPERAND_NAMESPACE: &str = "external-dns";

/// Default namespace the operator runs in and reads credentials secrets from
pub const DEFAULT_OPERATOR_NAMESPACE: &str = "external-dns-operator";

/// Default operand image when none is configured
pub const DEFAULT_OPERAND_IMAGE: &str = "registry.k8s.io/external-dns/external-dns:v0.14.2";

/// Metrics port of the first zone container; later containers count up from it
pub const METRICS_START_PORT: u16 = 7979;

/// Label carrying the application name
pub const APP_NAME_LABEL: &str = "app.kubernetes.io/name";

/// Label carrying the owning instance name
pub const APP_INSTANCE_LABEL: &str = "app.kubernetes.io/instance";

/// Field manager used for server-side apply
pub const FIELD_MANAGER: &str = "external-dns-operator";
