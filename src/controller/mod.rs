//! Controller for the ExternalDNS custom resource
//!
//! Each instance is reconciled into a ServiceAccount, a ClusterRoleBinding to
//! the shared ClusterRole, and a Deployment running one ExternalDNS container
//! per zone. Reconciliation follows the observe-diff-act loop: desired objects
//! are built from the instance, compared with what is stored, and only the
//! drifted fields are written back.

mod client;
mod ensure;
mod external_dns;
#[cfg(test)]
mod fake;

#[cfg(test)]
pub use client::MockKubeClient;
pub use client::{KubeClient, KubeClientImpl};
pub use ensure::{ensure, Ensured, Managed};
pub use external_dns::{
    error_policy, owning_instance, reconcile, run_pass, Context, ContextBuilder, PassReport,
    DEFAULT_RESYNC_INTERVAL, PERMANENT_FAILURE_INTERVAL, RETRY_INTERVAL,
};
