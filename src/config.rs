//! Operator configuration from flags and environment

use std::time::Duration;

use clap::Args;

use crate::{DEFAULT_OPERAND_IMAGE, DEFAULT_OPERAND_NAMESPACE, DEFAULT_OPERATOR_NAMESPACE};

/// Settings for the controller process
#[derive(Args, Clone, Debug, PartialEq, Eq)]
pub struct OperatorConfig {
    /// Namespace the ExternalDNS operands are deployed to
    #[arg(
        long,
        env = "EXTERNAL_DNS_OPERAND_NAMESPACE",
        default_value = DEFAULT_OPERAND_NAMESPACE
    )]
    pub operand_namespace: String,

    /// Namespace the operator runs in; credentials secrets referenced without
    /// a namespace are read from here
    #[arg(
        long,
        env = "EXTERNAL_DNS_OPERATOR_NAMESPACE",
        default_value = DEFAULT_OPERATOR_NAMESPACE
    )]
    pub operator_namespace: String,

    /// ExternalDNS image run by the operands
    #[arg(
        long,
        env = "RELATED_IMAGE_EXTERNAL_DNS",
        default_value = DEFAULT_OPERAND_IMAGE
    )]
    pub operand_image: String,

    /// Emit logs as JSON lines instead of human-readable text
    #[arg(long, env = "EXTERNAL_DNS_OPERATOR_JSON_LOGS")]
    pub json_logs: bool,

    /// Seconds between resyncs of an instance that converged
    #[arg(long, env = "EXTERNAL_DNS_OPERATOR_RESYNC_SECS", default_value_t = 600)]
    pub resync_secs: u64,
}

impl OperatorConfig {
    /// Resync interval as a duration
    pub fn resync_interval(&self) -> Duration {
        Duration::from_secs(self.resync_secs)
    }
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            operand_namespace: DEFAULT_OPERAND_NAMESPACE.to_string(),
            operator_namespace: DEFAULT_OPERATOR_NAMESPACE.to_string(),
            operand_image: DEFAULT_OPERAND_IMAGE.to_string(),
            json_logs: false,
            resync_secs: 600,
        }
    }
}
