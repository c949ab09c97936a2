//! Etcd configuration of a hosted control plane.

use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use serde::{Deserialize, Serialize};

/// Default size of the volume backing a managed etcd member.
pub const DEFAULT_PERSISTENT_VOLUME_ETCD_STORAGE_SIZE: &str = "4Gi";

/// Default etcd volume size as a [`Quantity`].
pub fn default_persistent_volume_etcd_storage_size() -> Quantity {
	Quantity(DEFAULT_PERSISTENT_VOLUME_ETCD_STORAGE_SIZE.to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EtcdManagementType {
	/// Etcd runs inside the hosted control plane namespace.
	#[default]
	Managed,
	/// Etcd is provided by the user.
	Unmanaged,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EtcdSpec {
	pub management_type: EtcdManagementType,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub managed: Option<ManagedEtcdSpec>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagedEtcdSpec {
	pub storage: ManagedEtcdStorageSpec,
}

/// Storage backend of managed etcd.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum EtcdStorageType {
	#[default]
	PersistentVolume,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagedEtcdStorageSpec {
	/// Unset means the default backend.
	#[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
	pub type_: Option<EtcdStorageType>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub persistent_volume: Option<PersistentVolumeEtcdStorageSpec>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistentVolumeEtcdStorageSpec {
	/// `None` selects the cluster default storage class.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub storage_class_name: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub size: Option<Quantity>,
}

impl EtcdSpec {
	/// Managed etcd on a default-sized persistent volume.
	pub fn managed_persistent_volume() -> Self {
		Self {
			management_type: EtcdManagementType::Managed,
			managed: Some(ManagedEtcdSpec {
				storage: ManagedEtcdStorageSpec {
					type_: Some(EtcdStorageType::PersistentVolume),
					persistent_volume: Some(PersistentVolumeEtcdStorageSpec {
						storage_class_name: None,
						size: Some(default_persistent_volume_etcd_storage_size()),
					}),
				},
			}),
		}
	}
}
