//! Placement and sizing shared by control plane component workloads.

use std::collections::BTreeMap;

use hcp_api::{
	HostedControlPlane, CLUSTER_NODE_LABEL, CONTROL_PLANE_NODE_LABEL, HOSTED_CONTROL_PLANE_LABEL,
};
use k8s_openapi::{
	api::core::v1::{
		Affinity, NodeAffinity, NodeSelectorRequirement, NodeSelectorTerm, PodAffinity,
		PodAffinityTerm, PodAntiAffinity, PodSpec, PreferredSchedulingTerm, ResourceRequirements,
		Toleration, WeightedPodAffinityTerm,
	},
	apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta, OwnerReference},
};
use kube::Resource;

const TOPOLOGY_ZONE_LABEL: &str = "topology.kubernetes.io/zone";
const HOSTNAME_LABEL: &str = "kubernetes.io/hostname";

/// Resource requirements keyed by container name.
pub type ResourcesSpec = BTreeMap<String, ResourceRequirements>;

/// Controller reference to the owning object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OwnerRef {
	pub reference: Option<OwnerReference>,
}

impl OwnerRef {
	/// Empty unless the control plane has both a name and a uid.
	pub fn from_hosted_control_plane(hcp: &HostedControlPlane) -> Self {
		let (Some(name), Some(uid)) = (hcp.metadata.name.clone(), hcp.metadata.uid.clone()) else {
			return Self::default();
		};
		Self {
			reference: Some(OwnerReference {
				api_version: HostedControlPlane::api_version(&()).into_owned(),
				kind: HostedControlPlane::kind(&()).into_owned(),
				name,
				uid,
				controller: Some(true),
				block_owner_deletion: Some(true),
			}),
		}
	}

	/// Add the reference to `meta`, replacing any previous reference to the same owner.
	pub fn apply_to(&self, meta: &mut ObjectMeta) {
		let Some(reference) = &self.reference else {
			return;
		};
		let refs = meta.owner_references.get_or_insert_with(Vec::new);
		refs.retain(|r| !(r.kind == reference.kind && r.name == reference.name));
		refs.push(reference.clone());
	}
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scheduling {
	pub priority_class: Option<String>,
	pub affinity: Option<Affinity>,
	pub tolerations: Vec<Toleration>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeploymentConfig {
	pub replicas: i32,
	pub resources: ResourcesSpec,
	pub scheduling: Scheduling,
	pub additional_labels: BTreeMap<String, String>,
}

impl DeploymentConfig {
	fn affinity(&mut self) -> &mut Affinity {
		self.scheduling.affinity.get_or_insert_with(Affinity::default)
	}

	/// Require pods matching `selector` to land in distinct zones.
	pub fn set_multizone_spread(&mut self, selector: BTreeMap<String, String>) {
		let anti = self
			.affinity()
			.pod_anti_affinity
			.get_or_insert_with(PodAntiAffinity::default);
		anti.required_during_scheduling_ignored_during_execution = Some(vec![PodAffinityTerm {
			topology_key: TOPOLOGY_ZONE_LABEL.to_string(),
			label_selector: Some(LabelSelector {
				match_labels: Some(selector),
				..Default::default()
			}),
			..Default::default()
		}]);
	}

	/// Tolerate the control plane taints and prefer nodes dedicated to this cluster.
	pub fn set_control_plane_isolation(&mut self, hcp: &HostedControlPlane) {
		let cluster = cluster_key(hcp);
		self.scheduling.tolerations = vec![
			no_schedule_toleration(CONTROL_PLANE_NODE_LABEL, "true"),
			no_schedule_toleration(CLUSTER_NODE_LABEL, &cluster),
		];

		let node = self
			.affinity()
			.node_affinity
			.get_or_insert_with(NodeAffinity::default);
		node.preferred_during_scheduling_ignored_during_execution = Some(vec![
			preferred_node_label(50, CONTROL_PLANE_NODE_LABEL, "true"),
			preferred_node_label(100, CLUSTER_NODE_LABEL, &cluster),
		]);
	}

	/// Mark pods as part of this control plane and prefer co-locating them.
	pub fn set_colocation_anchor(&mut self, hcp: &HostedControlPlane) {
		let cluster = cluster_key(hcp);
		self.additional_labels
			.insert(HOSTED_CONTROL_PLANE_LABEL.to_string(), cluster.clone());

		let pod = self
			.affinity()
			.pod_affinity
			.get_or_insert_with(PodAffinity::default);
		pod.preferred_during_scheduling_ignored_during_execution = Some(vec![WeightedPodAffinityTerm {
			weight: 100,
			pod_affinity_term: PodAffinityTerm {
				topology_key: HOSTNAME_LABEL.to_string(),
				label_selector: Some(LabelSelector {
					match_labels: Some(BTreeMap::from([(
						HOSTED_CONTROL_PLANE_LABEL.to_string(),
						cluster,
					)])),
					..Default::default()
				}),
				..Default::default()
			},
		}]);
	}

	pub fn apply_to_object_meta(&self, meta: &mut ObjectMeta) {
		if self.additional_labels.is_empty() {
			return;
		}
		meta.labels
			.get_or_insert_with(BTreeMap::new)
			.extend(self.additional_labels.clone());
	}

	/// Project scheduling and per-container resources onto `spec`.
	pub fn apply_to_pod_spec(&self, spec: &mut PodSpec) {
		if let Some(class) = &self.scheduling.priority_class {
			spec.priority_class_name = Some(class.clone());
		}
		if let Some(affinity) = &self.scheduling.affinity {
			spec.affinity = Some(affinity.clone());
		}
		if !self.scheduling.tolerations.is_empty() {
			spec.tolerations = Some(self.scheduling.tolerations.clone());
		}
		for container in &mut spec.containers {
			if let Some(resources) = self.resources.get(&container.name) {
				container.resources = Some(resources.clone());
			}
		}
	}
}

/// Namespace identifying a hosted control plane on the management cluster.
fn cluster_key(hcp: &HostedControlPlane) -> String {
	hcp.metadata.namespace.clone().unwrap_or_default()
}

fn no_schedule_toleration(key: &str, value: &str) -> Toleration {
	Toleration {
		key: Some(key.to_string()),
		operator: Some("Equal".to_string()),
		value: Some(value.to_string()),
		effect: Some("NoSchedule".to_string()),
		..Default::default()
	}
}

fn preferred_node_label(weight: i32, key: &str, value: &str) -> PreferredSchedulingTerm {
	PreferredSchedulingTerm {
		weight,
		preference: NodeSelectorTerm {
			match_expressions: Some(vec![NodeSelectorRequirement {
				key: key.to_string(),
				operator: "In".to_string(),
				values: Some(vec![value.to_string()]),
			}]),
			..Default::default()
		},
	}
}

#[cfg(test)]
mod tests {
	use hcp_api::HostedControlPlaneSpec;
	use k8s_openapi::api::core::v1::Container;

	use super::*;

	fn hcp() -> HostedControlPlane {
		let mut hcp = HostedControlPlane::new("example", HostedControlPlaneSpec::default());
		hcp.metadata.namespace = Some("clusters-example".to_string());
		hcp.metadata.uid = Some("0000-1111".to_string());
		hcp
	}

	#[test]
	fn test_owner_ref_is_controller() {
		let owner = OwnerRef::from_hosted_control_plane(&hcp());
		let reference = owner.reference.clone().unwrap();
		assert_eq!(reference.kind, "HostedControlPlane");
		assert_eq!(reference.api_version, "hypershift.openshift.io/v1alpha1");
		assert_eq!(reference.uid, "0000-1111");
		assert_eq!(reference.controller, Some(true));
		assert_eq!(reference.block_owner_deletion, Some(true));

		let mut meta = ObjectMeta::default();
		owner.apply_to(&mut meta);
		owner.apply_to(&mut meta);
		assert_eq!(meta.owner_references.unwrap().len(), 1);
	}

	#[test]
	fn test_owner_ref_without_name_is_empty() {
		let mut hcp = hcp();
		hcp.metadata.name = None;
		let mut meta = ObjectMeta::default();
		OwnerRef::from_hosted_control_plane(&hcp).apply_to(&mut meta);
		assert_eq!(meta.owner_references, None);
	}

	#[test]
	fn test_owner_ref_without_uid_is_empty() {
		let mut hcp = hcp();
		hcp.metadata.uid = None;
		let owner = OwnerRef::from_hosted_control_plane(&hcp);
		assert_eq!(owner.reference, None);

		let mut meta = ObjectMeta::default();
		owner.apply_to(&mut meta);
		assert_eq!(meta.owner_references, None);
	}

	#[test]
	fn test_control_plane_isolation() {
		let mut config = DeploymentConfig::default();
		config.set_control_plane_isolation(&hcp());

		let tolerations = &config.scheduling.tolerations;
		assert_eq!(tolerations.len(), 2);
		assert_eq!(tolerations[1].key.as_deref(), Some(CLUSTER_NODE_LABEL));
		assert_eq!(tolerations[1].value.as_deref(), Some("clusters-example"));

		let preferred = config
			.scheduling
			.affinity
			.unwrap()
			.node_affinity
			.unwrap()
			.preferred_during_scheduling_ignored_during_execution
			.unwrap();
		let weights: Vec<_> = preferred.iter().map(|t| t.weight).collect();
		assert_eq!(weights, vec![50, 100]);
	}

	#[test]
	fn test_colocation_anchor_label() {
		let mut config = DeploymentConfig::default();
		config.set_colocation_anchor(&hcp());
		assert_eq!(
			config.additional_labels.get(HOSTED_CONTROL_PLANE_LABEL).map(String::as_str),
			Some("clusters-example")
		);
		let term = &config
			.scheduling
			.affinity
			.as_ref()
			.unwrap()
			.pod_affinity
			.as_ref()
			.unwrap()
			.preferred_during_scheduling_ignored_during_execution
			.as_ref()
			.unwrap()[0];
		assert_eq!(term.pod_affinity_term.topology_key, HOSTNAME_LABEL);
	}

	#[test]
	fn test_apply_to_pod_spec_matches_containers_by_name() {
		let mut config = DeploymentConfig::default();
		config.scheduling.priority_class = Some("high".to_string());
		config
			.resources
			.insert("etcd".to_string(), ResourceRequirements::default());
		let mut spec = PodSpec {
			containers: vec![
				Container {
					name: "etcd".to_string(),
					..Default::default()
				},
				Container {
					name: "sidecar".to_string(),
					..Default::default()
				},
			],
			..Default::default()
		};
		config.apply_to_pod_spec(&mut spec);
		assert_eq!(spec.priority_class_name.as_deref(), Some("high"));
		assert!(spec.containers[0].resources.is_some());
		assert!(spec.containers[1].resources.is_none());
		assert_eq!(spec.tolerations, None);
	}
}
