//! Hosted control plane API objects.
//!
//! Typed views of the `hypershift.openshift.io/v1alpha1` resources that
//! hcpctl reads and produces, plus the well-known labels and defaults shared
//! between the CLI and the control plane components.

use kube::core::GroupVersion;

pub mod etcd;
pub mod hosted_cluster;
pub mod hosted_control_plane;
pub mod node_pool;
pub mod types;

pub use etcd::{
	EtcdManagementType, EtcdSpec, EtcdStorageType, ManagedEtcdSpec, ManagedEtcdStorageSpec,
	PersistentVolumeEtcdStorageSpec,
};
pub use hosted_cluster::{HostedCluster, HostedClusterSpec};
pub use hosted_control_plane::{HostedControlPlane, HostedControlPlaneSpec};
pub use node_pool::{NodePool, NodePoolSpec};
pub use types::*;

/// API group of all hosted control plane resources.
pub const GROUP: &str = "hypershift.openshift.io";

/// API version of all hosted control plane resources.
pub const VERSION: &str = "v1alpha1";

/// Label identifying which control plane component produced an object.
pub const CONTROL_PLANE_COMPONENT_LABEL: &str = "hypershift.openshift.io/control-plane-component";

/// Label (and taint key) marking nodes dedicated to hosted control planes.
pub const CONTROL_PLANE_NODE_LABEL: &str = "hypershift.openshift.io/control-plane";

/// Label (and taint key) marking nodes dedicated to a single hosted cluster.
pub const CLUSTER_NODE_LABEL: &str = "hypershift.openshift.io/cluster";

/// Label shared by every pod of one hosted control plane, used to co-locate them.
pub const HOSTED_CONTROL_PLANE_LABEL: &str = "hypershift.openshift.io/hosted-control-plane";

/// Group-version of the OpenShift route API.
pub fn route_group_version() -> GroupVersion {
	GroupVersion::gv("route.openshift.io", "v1")
}

/// Group-version of the hosted control plane API.
pub fn group_version() -> GroupVersion {
	GroupVersion::gv(GROUP, VERSION)
}
