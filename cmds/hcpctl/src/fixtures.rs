//! Desired state of a minimal hosted cluster.
//!
//! Everything here is pure: the same options and capabilities always produce
//! the same objects, in the same order.

use std::collections::BTreeMap;

use bon::Builder;
use hcp_api::{
	AesCbcSpec, AvailabilityPolicy, ClusterNetworking, DnsSpec, EtcdSpec, HostedCluster,
	HostedClusterSpec, KubevirtNodePoolPlatform, LocalObjectReference, NetworkType, NodePool,
	NodePoolPlatform, NodePoolSpec, PlatformSpec, PlatformType, PublishingStrategyType, Release,
	SecretEncryptionSpec, SecretEncryptionType, ServicePublishingStrategyMapping, ServiceType,
};
use k8s_openapi::{
	api::core::v1::{Namespace, Secret},
	apimachinery::pkg::apis::meta::v1::ObjectMeta,
	ByteString,
};
use kube::api::DynamicObject;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::{capabilities::ManagementClusterCapabilities, k8s::to_dynamic_object};

const SERVICE_CIDR: &str = "172.31.0.0/16";
const POD_CIDR: &str = "10.132.0.0/14";
const MACHINE_CIDR: &str = "10.0.0.0/16";

const PULL_SECRET_KEY: &str = ".dockerconfigjson";
const SSH_PUBLIC_KEY_KEY: &str = "id_rsa.pub";
const ETCD_ENCRYPTION_KEY_KEY: &str = "key";

#[derive(Debug, Error)]
pub enum BuildError {
	#[error("{0} must not be empty")]
	Missing(&'static str),

	#[error("etcd encryption key must be 16, 24 or 32 bytes, got {0}")]
	EncryptionKeyLength(usize),

	#[error("converting {kind} {name}")]
	Convert {
		kind: &'static str,
		name: String,
		#[source]
		source: serde_json::Error,
	},
}

/// Worker machine template for KubeVirt node pools.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KubevirtOptions {
	pub memory: String,
	pub cores: u32,
	pub image: String,
}

impl Default for KubevirtOptions {
	fn default() -> Self {
		Self {
			memory: "4Gi".to_string(),
			cores: 2,
			image: "quay.io/containerdisks/rhcos:4.7".to_string(),
		}
	}
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ExamplePlatform {
	#[default]
	None,
	KubeVirt(KubevirtOptions),
}

impl ExamplePlatform {
	fn platform_type(&self) -> PlatformType {
		match self {
			ExamplePlatform::None => PlatformType::None,
			ExamplePlatform::KubeVirt(_) => PlatformType::KubeVirt,
		}
	}
}

/// Inputs of the desired-state builder.
#[derive(Debug, Clone, Builder)]
pub struct ExampleOptions {
	#[builder(into)]
	pub namespace: String,
	#[builder(into)]
	pub name: String,
	#[builder(into)]
	pub release_image: String,
	#[builder(into)]
	pub pull_secret: Vec<u8>,
	#[builder(into)]
	pub ssh_public_key: Option<String>,
	/// Negative means no node pool.
	#[builder(default = 2)]
	pub node_pool_replicas: i32,
	#[builder(default)]
	pub network_type: NetworkType,
	#[builder(default)]
	pub availability_policy: AvailabilityPolicy,
	/// Defaults to the cluster name.
	#[builder(into)]
	pub infra_id: Option<String>,
	#[builder(into, default = String::from("example.com"))]
	pub base_domain: String,
	#[builder(default)]
	pub platform: ExamplePlatform,
	/// Derived from the other options when unset.
	#[builder(into)]
	pub etcd_encryption_key: Option<Vec<u8>>,
}

impl ExampleOptions {
	fn infra_id(&self) -> &str {
		self.infra_id.as_deref().unwrap_or(&self.name)
	}

	fn validate(&self) -> Result<(), BuildError> {
		if self.name.is_empty() {
			return Err(BuildError::Missing("name"));
		}
		if self.namespace.is_empty() {
			return Err(BuildError::Missing("namespace"));
		}
		if self.release_image.is_empty() {
			return Err(BuildError::Missing("release image"));
		}
		if self.pull_secret.is_empty() {
			return Err(BuildError::Missing("pull secret"));
		}
		if let Some(key) = &self.etcd_encryption_key {
			if !matches!(key.len(), 16 | 24 | 32) {
				return Err(BuildError::EncryptionKeyLength(key.len()));
			}
		}
		Ok(())
	}

	/// A 32 byte AES key, stable for a given cluster identity and pull secret.
	fn derived_encryption_key(&self) -> Vec<u8> {
		let mut hasher = Sha256::new();
		for part in [
			self.namespace.as_bytes(),
			self.name.as_bytes(),
			self.infra_id().as_bytes(),
			self.pull_secret.as_slice(),
		] {
			hasher.update((part.len() as u64).to_be_bytes());
			hasher.update(part);
		}
		hasher.finalize().to_vec()
	}
}

/// Typed desired state, before flattening into apply order.
#[derive(Debug, Clone)]
pub struct ExampleResources {
	pub namespace: Namespace,
	pub pull_secret: Secret,
	pub ssh_key: Option<Secret>,
	pub etcd_encryption_key: Secret,
	pub cluster: HostedCluster,
	pub node_pool: Option<NodePool>,
}

impl ExampleResources {
	pub fn new(
		opts: &ExampleOptions,
		capabilities: &ManagementClusterCapabilities,
	) -> Result<Self, BuildError> {
		opts.validate()?;

		let namespace = Namespace {
			metadata: ObjectMeta {
				name: Some(opts.namespace.clone()),
				..Default::default()
			},
			..Default::default()
		};

		let pull_secret = secret(
			opts,
			format!("{}-pull-secret", opts.name),
			Some("kubernetes.io/dockerconfigjson"),
			PULL_SECRET_KEY,
			opts.pull_secret.clone(),
		);

		let ssh_key = opts.ssh_public_key.as_ref().map(|key| {
			secret(
				opts,
				format!("{}-ssh-key", opts.name),
				None,
				SSH_PUBLIC_KEY_KEY,
				key.clone().into_bytes(),
			)
		});

		let etcd_encryption_key = secret(
			opts,
			format!("{}-etcd-encryption-key", opts.name),
			Some("Opaque"),
			ETCD_ENCRYPTION_KEY_KEY,
			opts.etcd_encryption_key
				.clone()
				.unwrap_or_else(|| opts.derived_encryption_key()),
		);

		let mut cluster = HostedCluster::new(
			&opts.name,
			HostedClusterSpec {
				release: Release {
					image: opts.release_image.clone(),
				},
				pull_secret: LocalObjectReference::new(name_of(&pull_secret)),
				ssh_key: ssh_key.as_ref().map(|s| LocalObjectReference::new(name_of(s))),
				networking: ClusterNetworking {
					service_cidr: SERVICE_CIDR.to_string(),
					pod_cidr: POD_CIDR.to_string(),
					machine_cidr: MACHINE_CIDR.to_string(),
					network_type: opts.network_type,
				},
				services: service_publishing(capabilities),
				infra_id: opts.infra_id().to_string(),
				dns: DnsSpec {
					base_domain: opts.base_domain.clone(),
				},
				platform: PlatformSpec {
					type_: opts.platform.platform_type(),
				},
				controller_availability_policy: opts.availability_policy,
				etcd: EtcdSpec::managed_persistent_volume(),
				secret_encryption: Some(SecretEncryptionSpec {
					type_: SecretEncryptionType::AesCbc,
					aescbc: Some(AesCbcSpec {
						active_key: LocalObjectReference::new(name_of(&etcd_encryption_key)),
					}),
				}),
			},
		);
		cluster.metadata.namespace = Some(opts.namespace.clone());

		let node_pool = (opts.node_pool_replicas >= 0).then(|| {
			let mut pool = NodePool::new(
				&opts.name,
				NodePoolSpec {
					cluster_name: opts.name.clone(),
					node_count: Some(opts.node_pool_replicas),
					release: Release {
						image: opts.release_image.clone(),
					},
					platform: NodePoolPlatform {
						type_: opts.platform.platform_type(),
						kubevirt: match &opts.platform {
							ExamplePlatform::KubeVirt(kv) => Some(KubevirtNodePoolPlatform {
								memory: kv.memory.clone(),
								cores: kv.cores,
								containerdisk: kv.image.clone(),
							}),
							ExamplePlatform::None => None,
						},
					},
				},
			);
			pool.metadata.namespace = Some(opts.namespace.clone());
			pool
		});

		Ok(Self {
			namespace,
			pull_secret,
			ssh_key,
			etcd_encryption_key,
			cluster,
			node_pool,
		})
	}

	/// Objects in apply order.
	pub fn as_objects(&self) -> Result<Vec<DynamicObject>, BuildError> {
		let mut objects = vec![
			convert("Namespace", &self.namespace.metadata, &self.namespace)?,
			convert("Secret", &self.pull_secret.metadata, &self.pull_secret)?,
		];
		if let Some(ssh_key) = &self.ssh_key {
			objects.push(convert("Secret", &ssh_key.metadata, ssh_key)?);
		}
		objects.push(convert(
			"Secret",
			&self.etcd_encryption_key.metadata,
			&self.etcd_encryption_key,
		)?);
		objects.push(convert("HostedCluster", &self.cluster.metadata, &self.cluster)?);
		if let Some(pool) = &self.node_pool {
			objects.push(convert("NodePool", &pool.metadata, pool)?);
		}
		Ok(objects)
	}
}

/// APIServer is always a load balancer; the rest use routes where the cluster serves them.
fn service_publishing(capabilities: &ManagementClusterCapabilities) -> Vec<ServicePublishingStrategyMapping> {
	let exposed = if capabilities.has_routes() {
		PublishingStrategyType::Route
	} else {
		PublishingStrategyType::NodePort
	};
	vec![
		ServicePublishingStrategyMapping::new(ServiceType::ApiServer, PublishingStrategyType::LoadBalancer),
		ServicePublishingStrategyMapping::new(ServiceType::OAuthServer, exposed),
		ServicePublishingStrategyMapping::new(ServiceType::Konnectivity, exposed),
		ServicePublishingStrategyMapping::new(ServiceType::Ignition, exposed),
	]
}

fn secret(
	opts: &ExampleOptions,
	name: String,
	type_: Option<&str>,
	key: &str,
	value: Vec<u8>,
) -> Secret {
	Secret {
		metadata: ObjectMeta {
			name: Some(name),
			namespace: Some(opts.namespace.clone()),
			..Default::default()
		},
		type_: type_.map(str::to_string),
		data: Some(BTreeMap::from([(key.to_string(), ByteString(value))])),
		..Default::default()
	}
}

fn name_of(secret: &Secret) -> String {
	secret.metadata.name.clone().unwrap_or_default()
}

fn convert<K: serde::Serialize>(
	kind: &'static str,
	meta: &ObjectMeta,
	object: &K,
) -> Result<DynamicObject, BuildError> {
	to_dynamic_object(object).map_err(|source| BuildError::Convert {
		kind,
		name: meta.name.clone().unwrap_or_default(),
		source,
	})
}
