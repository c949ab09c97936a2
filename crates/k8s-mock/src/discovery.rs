//! API surface advertised by the mock server.

use std::collections::BTreeMap;

/// Which discovery protocol the mock server speaks.
#[derive(Debug, Clone, Copy, Default)]
pub enum DiscoveryMode {
	/// `APIGroupDiscoveryList` documents on `/api` and `/apis` (1.26+ servers).
	#[default]
	Aggregated,
	/// Aggregated requests answer 406, so clients fall back to per group-version lists.
	Legacy,
}

/// Served resources, split into the core group and named group-versions.
///
/// Group-versions are keyed as `group/version`; the `BTreeMap` keeps the
/// `/apis` listing in a stable order.
#[derive(Debug, Clone)]
pub struct MockDiscovery {
	pub core_resources: Vec<MockApiResource>,
	pub group_resources: BTreeMap<String, Vec<MockApiResource>>,
}

/// A plain management cluster with the hosted cluster CRDs installed.
impl Default for MockDiscovery {
	fn default() -> Self {
		use MockApiResource as R;

		Self {
			core_resources: vec![
				R::namespaced("configmaps", "ConfigMap"),
				R::namespaced("secrets", "Secret"),
				R::namespaced("services", "Service"),
				R::namespaced("pods", "Pod"),
				R::cluster_scoped("namespaces", "Namespace"),
			],
			group_resources: BTreeMap::new(),
		}
		.with_group(
			"apps/v1",
			vec![
				R::namespaced("deployments", "Deployment"),
				R::namespaced("statefulsets", "StatefulSet"),
			],
		)
		.with_group(
			"hypershift.openshift.io/v1alpha1",
			vec![
				R::namespaced("hostedclusters", "HostedCluster"),
				R::namespaced("nodepools", "NodePool"),
				R::namespaced("hostedcontrolplanes", "HostedControlPlane"),
			],
		)
	}
}

impl MockDiscovery {
	/// Add (or replace) a group-version and its resources.
	pub fn with_group(mut self, group_version: &str, resources: Vec<MockApiResource>) -> Self {
		self.group_resources
			.insert(group_version.to_string(), resources);
		self
	}

	/// Serve `route.openshift.io/v1`, as an OpenShift management cluster does.
	pub fn with_routes(self) -> Self {
		self.with_group(
			"route.openshift.io/v1",
			vec![MockApiResource::namespaced("routes", "Route")],
		)
	}

	pub fn find(&self, api_version: &str, kind: &str) -> Option<&MockApiResource> {
		let resources = match api_version {
			"v1" => &self.core_resources,
			gv => self.group_resources.get(gv)?,
		};
		resources.iter().find(|r| r.kind == kind)
	}
}

#[derive(Debug, Clone)]
pub struct MockApiResource {
	/// Plural name used in URLs.
	pub name: String,
	pub kind: String,
	pub namespaced: bool,
	pub verbs: Vec<String>,
}

impl MockApiResource {
	const VERBS: [&'static str; 7] = ["create", "delete", "get", "list", "patch", "update", "watch"];

	fn new(name: &str, kind: &str, namespaced: bool) -> Self {
		Self {
			name: name.to_string(),
			kind: kind.to_string(),
			namespaced,
			verbs: Self::VERBS.iter().map(|v| (*v).to_string()).collect(),
		}
	}

	pub fn namespaced(name: &str, kind: &str) -> Self {
		Self::new(name, kind, true)
	}

	pub fn cluster_scoped(name: &str, kind: &str) -> Self {
		Self::new(name, kind, false)
	}
}
