//! `HostedControlPlane`: the control plane namespace's view of a hosted cluster.
//!
//! Control plane components derive their parameters from this object and
//! point their owner references at it.

use kube::CustomResource;
use serde::{Deserialize, Serialize};

use crate::{
	etcd::EtcdSpec,
	types::{AvailabilityPolicy, PlatformSpec, Release},
};

#[derive(CustomResource, Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[kube(
	group = "hypershift.openshift.io",
	version = "v1alpha1",
	kind = "HostedControlPlane",
	namespaced,
	schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct HostedControlPlaneSpec {
	#[serde(default)]
	pub release: Release,
	#[serde(rename = "infraID", default)]
	pub infra_id: String,
	#[serde(default)]
	pub platform: PlatformSpec,
	#[serde(default)]
	pub controller_availability_policy: AvailabilityPolicy,
	#[serde(default)]
	pub etcd: EtcdSpec,
}
