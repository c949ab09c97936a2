use std::collections::BTreeMap;

use hcp_api::{
	etcd::default_persistent_volume_etcd_storage_size, AvailabilityPolicy, EtcdSpec,
	EtcdStorageType, HostedControlPlane, PersistentVolumeEtcdStorageSpec,
	CONTROL_PLANE_COMPONENT_LABEL,
};
use k8s_openapi::{
	api::core::v1::ResourceRequirements, apimachinery::pkg::api::resource::Quantity,
};

use crate::deployment::{DeploymentConfig, OwnerRef};

pub const ETCD_CONTAINER: &str = "etcd";
pub const ETCD_PRIORITY_CLASS: &str = "hypershift-etcd";

/// Selector matching every etcd member pod.
pub fn pod_selector() -> BTreeMap<String, String> {
	BTreeMap::from([("app".to_string(), "etcd".to_string())])
}

/// Resolved storage backend. Exactly one variant is active.
#[derive(Debug, Clone, PartialEq)]
pub enum EtcdStorage {
	PersistentVolume(PersistentVolumeEtcdStorageSpec),
}

#[derive(Debug, Clone, PartialEq)]
pub struct EtcdParams {
	pub image: String,
	pub owner_ref: OwnerRef,
	pub deployment_config: DeploymentConfig,
	pub storage: EtcdStorage,
}

impl EtcdParams {
	pub fn new(hcp: &HostedControlPlane, images: &BTreeMap<String, String>) -> Self {
		let mut config = DeploymentConfig {
			replicas: replicas_for(hcp.spec.controller_availability_policy),
			resources: BTreeMap::from([(ETCD_CONTAINER.to_string(), etcd_resources())]),
			..Default::default()
		};
		config
			.additional_labels
			.insert(CONTROL_PLANE_COMPONENT_LABEL.to_string(), "etcd".to_string());
		config.scheduling.priority_class = Some(ETCD_PRIORITY_CLASS.to_string());
		config.set_multizone_spread(pod_selector());
		config.set_control_plane_isolation(hcp);
		config.set_colocation_anchor(hcp);

		Self {
			image: images.get("etcd").cloned().unwrap_or_default(),
			owner_ref: OwnerRef::from_hosted_control_plane(hcp),
			deployment_config: config,
			storage: resolve_storage(&hcp.spec.etcd),
		}
	}
}

fn replicas_for(policy: AvailabilityPolicy) -> i32 {
	match policy {
		AvailabilityPolicy::HighlyAvailable => 3,
		AvailabilityPolicy::SingleReplica => 1,
	}
}

fn etcd_resources() -> ResourceRequirements {
	ResourceRequirements {
		requests: Some(BTreeMap::from([
			("memory".to_string(), Quantity("600Mi".to_string())),
			("cpu".to_string(), Quantity("300m".to_string())),
		])),
		..Default::default()
	}
}

/// Pick the storage backend and fold the owner's overrides into its defaults.
///
/// The owner's storage class always wins, even when unset; its size only
/// when set.
pub fn resolve_storage(etcd: &EtcdSpec) -> EtcdStorage {
	let storage = etcd.managed.as_ref().map(|m| &m.storage);
	let storage_type = storage.and_then(|s| s.type_).unwrap_or_default();

	match storage_type {
		EtcdStorageType::PersistentVolume => {
			let mut pv = PersistentVolumeEtcdStorageSpec {
				storage_class_name: None,
				size: Some(default_persistent_volume_etcd_storage_size()),
			};
			if let Some(owner) = storage.and_then(|s| s.persistent_volume.as_ref()) {
				pv.storage_class_name.clone_from(&owner.storage_class_name);
				if let Some(size) = &owner.size {
					pv.size = Some(size.clone());
				}
			}
			EtcdStorage::PersistentVolume(pv)
		}
	}
}
