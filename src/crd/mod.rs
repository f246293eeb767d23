//! Custom Resource Definitions for the ExternalDNS operator

mod external_dns;
mod types;

pub use external_dns::{
    AwsProviderOptions, AzureProviderOptions, BlueCatProviderOptions, ExternalDNS,
    ExternalDNSProvider, ExternalDNSSource, ExternalDNSSpec, ExternalDNSStatus,
    GcpProviderOptions, InfobloxProviderOptions,
};
pub use types::{
    Condition, ConditionStatus, ExternalDNSPhase, HostnameAnnotationPolicy, ProviderType,
    SecretRef, ServiceType, SourceType,
};
