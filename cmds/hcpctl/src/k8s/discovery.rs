//! Kubernetes API discovery.
//!
//! Two consumers share this module: capability detection, which needs the raw
//! group-version inventory (including which group-versions failed to
//! enumerate), and the apply path, which needs to resolve an object's
//! apiVersion/kind to a REST resource.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::APIResourceList;
use kube::{
	api::DynamicObject,
	core::{GroupVersion, GroupVersionKind},
	discovery::{oneshot::pinned_kind, ApiCapabilities, ApiResource, Scope},
	Client, Discovery,
};
use thiserror::Error;
use tracing::instrument;

use super::ResourceScope;

/// Errors that can occur during API discovery.
#[derive(Debug, Error)]
pub enum DiscoveryError {
	/// The server's group list could not be retrieved; nothing is known about
	/// the API surface.
	#[error("listing server API groups")]
	Groups(#[source] kube::Error),

	/// Some group-versions are advertised by the server but their resource
	/// lists could not be fetched. `resources` holds everything that was
	/// enumerated successfully.
	#[error("unable to retrieve the complete list of server APIs: {}", format_failed_groups(.groups))]
	GroupDiscoveryFailed {
		groups: HashMap<GroupVersion, String>,
		resources: Vec<APIResourceList>,
	},

	#[error("failed to discover resource {api_version}/{kind}")]
	ResourceDiscovery {
		api_version: String,
		kind: String,
		#[source]
		source: kube::Error,
	},
}

fn format_failed_groups(groups: &HashMap<GroupVersion, String>) -> String {
	let mut failed: Vec<_> = groups
		.iter()
		.map(|(gv, err)| format!("{}: {}", gv.api_version(), err))
		.collect();
	failed.sort();
	failed.join(", ")
}

/// The server's API surface inventory.
#[async_trait]
pub trait DiscoveryClient: Send + Sync {
	/// List every served group-version together with its resources.
	///
	/// Partial failures are reported as [`DiscoveryError::GroupDiscoveryFailed`].
	async fn server_groups_and_resources(&self) -> Result<Vec<APIResourceList>, DiscoveryError>;
}

/// [`DiscoveryClient`] backed by the legacy (per group-version) discovery endpoints.
#[derive(Clone)]
pub struct KubeDiscovery {
	client: Client,
}

impl KubeDiscovery {
	pub fn new(client: Client) -> Self {
		Self { client }
	}
}

#[async_trait]
impl DiscoveryClient for KubeDiscovery {
	#[instrument(skip(self))]
	async fn server_groups_and_resources(&self) -> Result<Vec<APIResourceList>, DiscoveryError> {
		let core = self
			.client
			.list_core_api_versions()
			.await
			.map_err(DiscoveryError::Groups)?;
		let groups = self
			.client
			.list_api_groups()
			.await
			.map_err(DiscoveryError::Groups)?;

		let mut resources = Vec::new();
		let mut failed = HashMap::new();

		for version in &core.versions {
			match self.client.list_core_api_resources(version).await {
				Ok(list) => resources.push(list),
				Err(e) => {
					tracing::warn!(group_version = %version, error = %e, "failed to list core resources");
					failed.insert(GroupVersion::gv("", version), e.to_string());
				}
			}
		}

		for group in &groups.groups {
			for version in &group.versions {
				match self
					.client
					.list_api_group_resources(&version.group_version)
					.await
				{
					Ok(list) => resources.push(list),
					Err(e) => {
						tracing::warn!(
							group_version = %version.group_version,
							error = %e,
							"failed to list group resources"
						);
						failed.insert(GroupVersion::gv(&group.name, &version.version), e.to_string());
					}
				}
			}
		}

		tracing::debug!(
			discovered = resources.len(),
			failed = failed.len(),
			"enumerated server resources"
		);

		if failed.is_empty() {
			Ok(resources)
		} else {
			Err(DiscoveryError::GroupDiscoveryFailed {
				groups: failed,
				resources,
			})
		}
	}
}

/// Extract a GroupVersionKind from an object's type metadata.
pub fn gvk_from_object(object: &DynamicObject) -> Option<GroupVersionKind> {
	let types = object.types.as_ref()?;
	let (group, version) = types
		.api_version
		.split_once('/')
		.unwrap_or(("", types.api_version.as_str()));
	Some(GroupVersionKind::gvk(group, version, &types.kind))
}

/// REST mapping of one kind.
#[derive(Debug, Clone)]
pub struct DiscoveredResource {
	pub api_resource: ApiResource,
	pub scope: ResourceScope,
}

impl DiscoveredResource {
	fn new(api_resource: ApiResource, capabilities: &ApiCapabilities) -> Self {
		let scope = match capabilities.scope {
			Scope::Namespaced => ResourceScope::Namespaced,
			Scope::Cluster => ResourceScope::ClusterWide,
		};
		Self { api_resource, scope }
	}
}

/// REST mappings for the kinds of one apply run, resolved up front.
#[derive(Clone, Default)]
pub struct ApiResourceCache {
	resources: HashMap<GroupVersionKind, DiscoveredResource>,
}

impl ApiResourceCache {
	/// Resolve `required` through aggregated discovery (two requests on 1.26+
	/// servers), or kind by kind when the server does not support it.
	///
	/// Kinds the server does not serve are left out; applying them fails later
	/// with an unknown-type error.
	#[instrument(skip_all, fields(kind_count = required.len()))]
	pub async fn build(
		client: &Client,
		required: HashSet<GroupVersionKind>,
	) -> Result<Self, DiscoveryError> {
		let discovery = match Discovery::new(client.clone()).run_aggregated().await {
			Ok(discovery) => discovery,
			Err(e) => {
				tracing::debug!(error = %e, "aggregated discovery unavailable, resolving kinds one by one");
				return Self::resolve_each(client, required).await;
			}
		};

		let resources = discovery
			.groups()
			.flat_map(|group| {
				// Every version: objects may pin one that is not preferred
				group
					.versions()
					.flat_map(|version| group.versioned_resources(version))
					.collect::<Vec<_>>()
			})
			.map(|(ar, caps)| {
				let gvk = GroupVersionKind::gvk(&ar.group, &ar.version, &ar.kind);
				(gvk, DiscoveredResource::new(ar, &caps))
			})
			.collect();
		Ok(Self { resources })
	}

	async fn resolve_each(
		client: &Client,
		required: HashSet<GroupVersionKind>,
	) -> Result<Self, DiscoveryError> {
		let mut resources = HashMap::new();
		let mut first_error = None;

		for gvk in required {
			match pinned_kind(client, &gvk).await {
				Ok((ar, caps)) => {
					resources.insert(gvk, DiscoveredResource::new(ar, &caps));
				}
				Err(source) => {
					tracing::warn!(
						api_version = %gvk.api_version(),
						kind = %gvk.kind,
						error = %source,
						"failed to discover resource"
					);
					first_error.get_or_insert((gvk, source));
				}
			}
		}

		match first_error {
			Some((gvk, source)) if resources.is_empty() => Err(DiscoveryError::ResourceDiscovery {
				api_version: gvk.api_version(),
				kind: gvk.kind,
				source,
			}),
			_ => Ok(Self { resources }),
		}
	}

	pub fn lookup(&self, gvk: &GroupVersionKind) -> Option<&DiscoveredResource> {
		self.resources.get(gvk)
	}
}
