//! Managed etcd for a hosted control plane.
//!
//! [`EtcdParams`] is derived from a `HostedControlPlane` and the release
//! image map; [`manifests`] turns the parameters into workload objects.

mod manifests;
mod params;

pub use manifests::{manifests, CLIENT_SERVICE, DISCOVERY_SERVICE, STATEFUL_SET};
pub use params::{pod_selector, resolve_storage, EtcdParams, EtcdStorage, ETCD_CONTAINER, ETCD_PRIORITY_CLASS};
