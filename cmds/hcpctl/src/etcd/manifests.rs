use std::collections::BTreeMap;

use k8s_openapi::{
	api::{
		apps::v1::{StatefulSet, StatefulSetSpec},
		core::v1::{
			Container, ContainerPort, PersistentVolumeClaim, PersistentVolumeClaimSpec, PodSpec,
			PodTemplateSpec, Service, ServicePort, ServiceSpec, VolumeMount,
			VolumeResourceRequirements,
		},
	},
	apimachinery::pkg::{
		apis::meta::v1::{LabelSelector, ObjectMeta},
		util::intstr::IntOrString,
	},
};
use kube::api::DynamicObject;

use crate::k8s::to_dynamic_object;

use super::params::{pod_selector, EtcdParams, EtcdStorage, ETCD_CONTAINER};

pub const DISCOVERY_SERVICE: &str = "etcd-discovery";
pub const CLIENT_SERVICE: &str = "etcd-client";
pub const STATEFUL_SET: &str = "etcd";
const DATA_VOLUME: &str = "data";
const CLIENT_PORT: i32 = 2379;
const PEER_PORT: i32 = 2380;

/// Objects running managed etcd for one hosted control plane.
///
/// Order: discovery service, client service, stateful set.
pub fn manifests(params: &EtcdParams, namespace: &str) -> Result<Vec<DynamicObject>, serde_json::Error> {
	Ok(vec![
		to_dynamic_object(&discovery_service(params, namespace))?,
		to_dynamic_object(&client_service(params, namespace))?,
		to_dynamic_object(&stateful_set(params, namespace))?,
	])
}

fn metadata(params: &EtcdParams, namespace: &str, name: &str) -> ObjectMeta {
	let mut meta = ObjectMeta {
		name: Some(name.to_string()),
		namespace: Some(namespace.to_string()),
		labels: Some(pod_selector()),
		..Default::default()
	};
	params.deployment_config.apply_to_object_meta(&mut meta);
	params.owner_ref.apply_to(&mut meta);
	meta
}

fn port(name: &str, port: i32) -> ServicePort {
	ServicePort {
		name: Some(name.to_string()),
		port,
		target_port: Some(IntOrString::Int(port)),
		protocol: Some("TCP".to_string()),
		..Default::default()
	}
}

fn discovery_service(params: &EtcdParams, namespace: &str) -> Service {
	Service {
		metadata: metadata(params, namespace, DISCOVERY_SERVICE),
		spec: Some(ServiceSpec {
			cluster_ip: Some("None".to_string()),
			publish_not_ready_addresses: Some(true),
			selector: Some(pod_selector()),
			ports: Some(vec![port("peer", PEER_PORT), port("etcd-client", CLIENT_PORT)]),
			..Default::default()
		}),
		..Default::default()
	}
}

fn client_service(params: &EtcdParams, namespace: &str) -> Service {
	Service {
		metadata: metadata(params, namespace, CLIENT_SERVICE),
		spec: Some(ServiceSpec {
			selector: Some(pod_selector()),
			ports: Some(vec![port("etcd-client", CLIENT_PORT)]),
			..Default::default()
		}),
		..Default::default()
	}
}

fn volume_claim(params: &EtcdParams) -> PersistentVolumeClaim {
	let spec = match &params.storage {
		EtcdStorage::PersistentVolume(pv) => PersistentVolumeClaimSpec {
			access_modes: Some(vec!["ReadWriteOnce".to_string()]),
			storage_class_name: pv.storage_class_name.clone(),
			resources: pv.size.clone().map(|size| VolumeResourceRequirements {
				requests: Some(BTreeMap::from([("storage".to_string(), size)])),
				..Default::default()
			}),
			..Default::default()
		},
	};
	PersistentVolumeClaim {
		metadata: ObjectMeta {
			name: Some(DATA_VOLUME.to_string()),
			..Default::default()
		},
		spec: Some(spec),
		..Default::default()
	}
}

fn stateful_set(params: &EtcdParams, namespace: &str) -> StatefulSet {
	let mut pod_meta = ObjectMeta {
		labels: Some(pod_selector()),
		..Default::default()
	};
	params.deployment_config.apply_to_object_meta(&mut pod_meta);

	let mut pod_spec = PodSpec {
		containers: vec![Container {
			name: ETCD_CONTAINER.to_string(),
			image: Some(params.image.clone()),
			ports: Some(vec![
				ContainerPort {
					name: Some("client".to_string()),
					container_port: CLIENT_PORT,
					..Default::default()
				},
				ContainerPort {
					name: Some("peer".to_string()),
					container_port: PEER_PORT,
					..Default::default()
				},
			]),
			volume_mounts: Some(vec![VolumeMount {
				name: DATA_VOLUME.to_string(),
				mount_path: "/var/lib".to_string(),
				..Default::default()
			}]),
			..Default::default()
		}],
		..Default::default()
	};
	params.deployment_config.apply_to_pod_spec(&mut pod_spec);

	StatefulSet {
		metadata: metadata(params, namespace, STATEFUL_SET),
		spec: Some(StatefulSetSpec {
			replicas: Some(params.deployment_config.replicas),
			service_name: Some(DISCOVERY_SERVICE.to_string()),
			pod_management_policy: Some("Parallel".to_string()),
			selector: LabelSelector {
				match_labels: Some(pod_selector()),
				..Default::default()
			},
			template: PodTemplateSpec {
				metadata: Some(pod_meta),
				spec: Some(pod_spec),
			},
			volume_claim_templates: Some(vec![volume_claim(params)]),
			..Default::default()
		}),
		..Default::default()
	}
}
