//! Value types shared by the hosted cluster, node pool and control plane specs.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error returned when parsing one of the enumerated API values from a string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported {field} `{value}`, expected one of: {expected}")]
pub struct ParseValueError {
	pub field: &'static str,
	pub value: String,
	pub expected: &'static str,
}

/// Replication tier for control plane components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AvailabilityPolicy {
	/// Every component runs a single replica.
	#[default]
	SingleReplica,
	/// Components run enough replicas to survive the loss of one.
	HighlyAvailable,
}

impl fmt::Display for AvailabilityPolicy {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			AvailabilityPolicy::SingleReplica => write!(f, "SingleReplica"),
			AvailabilityPolicy::HighlyAvailable => write!(f, "HighlyAvailable"),
		}
	}
}

impl FromStr for AvailabilityPolicy {
	type Err = ParseValueError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"SingleReplica" => Ok(AvailabilityPolicy::SingleReplica),
			"HighlyAvailable" => Ok(AvailabilityPolicy::HighlyAvailable),
			_ => Err(ParseValueError {
				field: "availability policy",
				value: s.to_string(),
				expected: "SingleReplica, HighlyAvailable",
			}),
		}
	}
}

/// Cluster network provider installed into the hosted cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum NetworkType {
	#[default]
	OpenShiftSDN,
	Calico,
	OVNKubernetes,
}

impl fmt::Display for NetworkType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			NetworkType::OpenShiftSDN => write!(f, "OpenShiftSDN"),
			NetworkType::Calico => write!(f, "Calico"),
			NetworkType::OVNKubernetes => write!(f, "OVNKubernetes"),
		}
	}
}

impl FromStr for NetworkType {
	type Err = ParseValueError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"OpenShiftSDN" => Ok(NetworkType::OpenShiftSDN),
			"Calico" => Ok(NetworkType::Calico),
			"OVNKubernetes" => Ok(NetworkType::OVNKubernetes),
			_ => Err(ParseValueError {
				field: "network type",
				value: s.to_string(),
				expected: "OpenShiftSDN, Calico, OVNKubernetes",
			}),
		}
	}
}

/// Reference to an object in the same namespace.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LocalObjectReference {
	pub name: String,
}

impl LocalObjectReference {
	pub fn new(name: impl Into<String>) -> Self {
		Self { name: name.into() }
	}
}

/// Release payload the cluster runs.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Release {
	pub image: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterNetworking {
	#[serde(rename = "serviceCIDR")]
	pub service_cidr: String,
	#[serde(rename = "podCIDR")]
	pub pod_cidr: String,
	#[serde(rename = "machineCIDR")]
	pub machine_cidr: String,
	pub network_type: NetworkType,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DnsSpec {
	pub base_domain: String,
}

/// Control plane endpoint exposed to the hosted cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ServiceType {
	#[serde(rename = "APIServer")]
	ApiServer,
	OAuthServer,
	Konnectivity,
	Ignition,
}

/// How a control plane endpoint is published outside the management cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PublishingStrategyType {
	LoadBalancer,
	NodePort,
	Route,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServicePublishingStrategy {
	#[serde(rename = "type")]
	pub type_: PublishingStrategyType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServicePublishingStrategyMapping {
	pub service: ServiceType,
	pub service_publishing_strategy: ServicePublishingStrategy,
}

impl ServicePublishingStrategyMapping {
	pub fn new(service: ServiceType, type_: PublishingStrategyType) -> Self {
		Self {
			service,
			service_publishing_strategy: ServicePublishingStrategy { type_ },
		}
	}
}

/// Infrastructure provider of the hosted cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PlatformType {
	#[default]
	None,
	#[serde(rename = "AWS")]
	Aws,
	KubeVirt,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformSpec {
	#[serde(rename = "type")]
	pub type_: PlatformType,
}

/// Node pool machine template for KubeVirt virtual machines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KubevirtNodePoolPlatform {
	pub memory: String,
	pub cores: u32,
	pub containerdisk: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodePoolPlatform {
	#[serde(rename = "type")]
	pub type_: PlatformType,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub kubevirt: Option<KubevirtNodePoolPlatform>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SecretEncryptionType {
	#[default]
	#[serde(rename = "aescbc")]
	AesCbc,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AesCbcSpec {
	pub active_key: LocalObjectReference,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretEncryptionSpec {
	#[serde(rename = "type")]
	pub type_: SecretEncryptionType,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub aescbc: Option<AesCbcSpec>,
}

#[cfg(test)]
mod tests {
	use rstest::rstest;

	use super::*;

	#[rstest]
	#[case::single("SingleReplica", AvailabilityPolicy::SingleReplica)]
	#[case::ha("HighlyAvailable", AvailabilityPolicy::HighlyAvailable)]
	fn test_availability_policy_from_str(#[case] input: &str, #[case] expected: AvailabilityPolicy) {
		assert_eq!(input.parse::<AvailabilityPolicy>().unwrap(), expected);
		assert_eq!(expected.to_string(), input);
	}

	#[test]
	fn test_availability_policy_rejects_unknown() {
		let err = "Quorum".parse::<AvailabilityPolicy>().unwrap_err();
		assert_eq!(err.value, "Quorum");
		assert_eq!(err.field, "availability policy");
	}

	#[test]
	fn test_networking_serializes_cidr_keys() {
		let networking = ClusterNetworking {
			service_cidr: "172.31.0.0/16".to_string(),
			pod_cidr: "10.132.0.0/14".to_string(),
			machine_cidr: "10.0.0.0/16".to_string(),
			network_type: NetworkType::OVNKubernetes,
		};
		let value = serde_json::to_value(&networking).unwrap();
		assert_eq!(
			value,
			serde_json::json!({
				"serviceCIDR": "172.31.0.0/16",
				"podCIDR": "10.132.0.0/14",
				"machineCIDR": "10.0.0.0/16",
				"networkType": "OVNKubernetes",
			})
		);
	}

	#[test]
	fn test_service_publishing_mapping_shape() {
		let mapping =
			ServicePublishingStrategyMapping::new(ServiceType::ApiServer, PublishingStrategyType::LoadBalancer);
		assert_eq!(
			serde_json::to_value(&mapping).unwrap(),
			serde_json::json!({
				"service": "APIServer",
				"servicePublishingStrategy": { "type": "LoadBalancer" },
			})
		);
	}
}
