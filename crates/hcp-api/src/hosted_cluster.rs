//! `HostedCluster`: the user-facing declaration of a hosted cluster.

use kube::CustomResource;
use serde::{Deserialize, Serialize};

use crate::{
	etcd::EtcdSpec,
	types::{
		AvailabilityPolicy, ClusterNetworking, DnsSpec, LocalObjectReference, PlatformSpec, Release,
		SecretEncryptionSpec, ServicePublishingStrategyMapping,
	},
};

#[derive(CustomResource, Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[kube(
	group = "hypershift.openshift.io",
	version = "v1alpha1",
	kind = "HostedCluster",
	namespaced,
	schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct HostedClusterSpec {
	pub release: Release,
	pub pull_secret: LocalObjectReference,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub ssh_key: Option<LocalObjectReference>,
	pub networking: ClusterNetworking,
	#[serde(default)]
	pub services: Vec<ServicePublishingStrategyMapping>,
	#[serde(rename = "infraID")]
	pub infra_id: String,
	pub dns: DnsSpec,
	pub platform: PlatformSpec,
	#[serde(default)]
	pub controller_availability_policy: AvailabilityPolicy,
	pub etcd: EtcdSpec,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub secret_encryption: Option<SecretEncryptionSpec>,
}
