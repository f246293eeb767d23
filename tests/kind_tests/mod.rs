//! Integration tests for the ExternalDNS operator
//!
//! These tests require a Kubernetes cluster (kind) to run and tell the story
//! of how cluster administrators interact with ExternalDNS instances.
//!
//! # Test Organization
//!
//! - `crd_operations`: Stories about creating and reading ExternalDNS
//!   resources through the Kubernetes API
//!
//! - `reconcile_stories`: Stories about a reconciliation pass run against a
//!   real API server, from an empty cluster to converged operands
//!
//! # Running These Tests
//!
//! ```bash
//! cargo test --test kind -- --ignored --test-threads=1
//! ```

mod crd_operations;
mod reconcile_stories;
