//! Mock Kubernetes API server for testing.
//!
//! Provides an HTTP server that can be used with kubeconfig-based connections.
//! Besides serving objects it can simulate a degraded discovery surface
//! (group-versions whose resource lists fail to load) and reject applies of
//! selected objects, so callers can exercise their error paths.

pub mod discovery;
mod helpers;
pub mod http;

pub use discovery::{DiscoveryMode, MockApiResource, MockDiscovery};
pub use http::{HttpMockK8sServer, RecordedPatch, RunningHttpMockK8sServer};
