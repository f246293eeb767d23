//! Error types for the ExternalDNS operator

use std::fmt;

use thiserror::Error;

/// Main error type for operator operations
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Kubernetes API error, surfaced verbatim
    #[error("kubernetes error: {source}")]
    Kube {
        /// Underlying client error
        #[from]
        source: kube::Error,
    },

    /// Provider type outside the supported table
    #[error("unsupported provider {value:?} for ExternalDNS {instance}")]
    UnsupportedProvider {
        /// Instance name
        instance: String,
        /// Raw provider value
        value: String,
    },

    /// Source type outside the supported table
    #[error("unsupported source type {value:?} for ExternalDNS {instance}")]
    UnsupportedSource {
        /// Instance name
        instance: String,
        /// Raw source value
        value: String,
    },

    /// Derived name exceeds a Kubernetes length limit
    #[error("name {name:?} is longer than {max} characters")]
    NameTooLong {
        /// Offending name
        name: String,
        /// Limit it was checked against
        max: usize,
    },

    /// Referenced credentials secret does not exist
    #[error("credentials secret {namespace}/{name} for ExternalDNS {instance} not found")]
    MissingCredentials {
        /// Instance name
        instance: String,
        /// Secret namespace
        namespace: String,
        /// Secret name
        name: String,
    },

    /// Instance cannot be turned into managed resources
    #[error("validation error for ExternalDNS {instance}: {message}")]
    Validation {
        /// Instance name
        instance: String,
        /// What is wrong
        message: String,
    },

    /// Internal invariant broken (e.g. object vanished right after a write)
    #[error("internal error: {message}")]
    Internal {
        /// What went wrong
        message: String,
    },

    /// One or more managed kinds failed during a reconciliation pass
    #[error("reconciliation of ExternalDNS {instance} failed: {}", summarize(.failures))]
    Reconcile {
        /// Instance name
        instance: String,
        /// Every failure of the pass, in ensure order
        failures: Vec<KindFailure>,
    },
}

/// A failed ensure for one managed kind
#[derive(Debug)]
pub struct KindFailure {
    /// Kubernetes kind that failed (e.g. Deployment)
    pub kind: &'static str,
    /// Why it failed
    pub error: Error,
}

impl fmt::Display for KindFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.error)
    }
}

fn summarize(failures: &[KindFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl Error {
    /// Create an unsupported provider error
    pub fn unsupported_provider(instance: impl Into<String>, value: impl Into<String>) -> Self {
        Self::UnsupportedProvider {
            instance: instance.into(),
            value: value.into(),
        }
    }

    /// Create an unsupported source error
    pub fn unsupported_source(instance: impl Into<String>, value: impl Into<String>) -> Self {
        Self::UnsupportedSource {
            instance: instance.into(),
            value: value.into(),
        }
    }

    /// Create a name-too-long error
    pub fn name_too_long(name: impl Into<String>, max: usize) -> Self {
        Self::NameTooLong {
            name: name.into(),
            max,
        }
    }

    /// Create a missing credentials error
    pub fn missing_credentials(
        instance: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self::MissingCredentials {
            instance: instance.into(),
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Create a validation error for an instance
    pub fn validation(instance: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            instance: instance.into(),
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// True when the API server rejected a create because the object exists
    pub fn is_already_exists(&self) -> bool {
        matches!(
            self,
            Self::Kube { source: kube::Error::Api(ae) } if ae.code == 409 && ae.reason == "AlreadyExists"
        )
    }

    /// Whether requeueing soon can plausibly fix this error
    ///
    /// Client errors (4xx) other than conflicts and throttling will not
    /// resolve without someone changing the cluster, as will instances the
    /// operator cannot build resources for. A missing credentials secret may
    /// be created at any time.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Kube {
                source: kube::Error::Api(ae),
            } => !(400..500).contains(&ae.code) || ae.code == 409 || ae.code == 429,
            Self::Kube { .. } => true,
            Self::UnsupportedProvider { .. }
            | Self::UnsupportedSource { .. }
            | Self::NameTooLong { .. }
            | Self::Validation { .. } => false,
            Self::MissingCredentials { .. } | Self::Internal { .. } => true,
            Self::Reconcile { failures, .. } => failures.iter().any(|f| f.error.is_retryable()),
        }
    }
}
