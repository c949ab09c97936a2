//! Optional API surfaces of the management cluster.
//!
//! Detected once per connection and then passed by value to whatever needs
//! feature-gated behavior.

use std::fmt;

use hcp_api::route_group_version;
use kube::core::GroupVersion;
use tracing::instrument;

use crate::k8s::discovery::{DiscoveryClient, DiscoveryError};

/// Optional capabilities of the management cluster.
///
/// Immutable after construction. `Default` is a cluster with none of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ManagementClusterCapabilities {
	has_routes: bool,
}

impl ManagementClusterCapabilities {
	pub const fn new(has_routes: bool) -> Self {
		Self { has_routes }
	}

	/// Probe the cluster for every tracked capability.
	///
	/// Each capability is probed with its own discovery request. Partial
	/// discovery failures are absorbed; any other discovery error aborts
	/// detection.
	#[instrument(skip_all)]
	pub async fn detect<D>(client: &D) -> Result<Self, DiscoveryError>
	where
		D: DiscoveryClient + ?Sized,
	{
		let has_routes = is_group_version_registered(client, &route_group_version()).await?;
		let capabilities = Self { has_routes };
		tracing::debug!(%capabilities, "detected management cluster capabilities");
		Ok(capabilities)
	}

	/// Whether the management cluster serves `route.openshift.io/v1`.
	pub fn has_routes(&self) -> bool {
		self.has_routes
	}
}

impl fmt::Display for ManagementClusterCapabilities {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"routes={}",
			if self.has_routes { "supported" } else { "absent" }
		)
	}
}

/// Determine whether `group_version` is registered on the cluster.
async fn is_group_version_registered<D>(
	client: &D,
	group_version: &GroupVersion,
) -> Result<bool, DiscoveryError>
where
	D: DiscoveryClient + ?Sized,
{
	let lists = match client.server_groups_and_resources().await {
		Ok(lists) => lists,
		Err(DiscoveryError::GroupDiscoveryFailed { groups, resources }) => {
			// A group-version that failed to enumerate is still served
			if groups.contains_key(group_version) {
				tracing::debug!(
					group_version = %group_version.api_version(),
					"group-version present but not fully discoverable"
				);
				return Ok(true);
			}
			resources
		}
		Err(e) => return Err(e),
	};

	let target = group_version.api_version();
	Ok(lists.iter().any(|list| list.group_version == target))
}

#[cfg(test)]
mod tests {
	use std::{
		collections::HashMap,
		sync::atomic::{AtomicUsize, Ordering},
	};

	use async_trait::async_trait;
	use k8s_openapi::apimachinery::pkg::apis::meta::v1::APIResourceList;
	use rstest::rstest;

	use super::*;

	/// Discovery double producing a fresh response per call.
	struct FakeDiscovery<F> {
		respond: F,
		calls: AtomicUsize,
	}

	impl<F> FakeDiscovery<F>
	where
		F: Fn() -> Result<Vec<APIResourceList>, DiscoveryError> + Send + Sync,
	{
		fn new(respond: F) -> Self {
			Self {
				respond,
				calls: AtomicUsize::new(0),
			}
		}
	}

	#[async_trait]
	impl<F> DiscoveryClient for FakeDiscovery<F>
	where
		F: Fn() -> Result<Vec<APIResourceList>, DiscoveryError> + Send + Sync,
	{
		async fn server_groups_and_resources(
			&self,
		) -> Result<Vec<APIResourceList>, DiscoveryError> {
			self.calls.fetch_add(1, Ordering::SeqCst);
			(self.respond)()
		}
	}

	fn list(group_version: &str) -> APIResourceList {
		APIResourceList {
			group_version: group_version.to_string(),
			resources: Vec::new(),
		}
	}

	fn lists(group_versions: &[&str]) -> Vec<APIResourceList> {
		group_versions.iter().map(|gv| list(gv)).collect()
	}

	#[rstest]
	#[case::present(&["v1", "apps/v1", "route.openshift.io/v1"], true)]
	#[case::absent(&["v1", "apps/v1"], false)]
	#[case::other_version(&["v1", "route.openshift.io/v2"], false)]
	#[case::group_prefix_only(&["route.openshift.io/v1beta1"], false)]
	#[case::empty(&[], false)]
	#[tokio::test]
	async fn test_clean_discovery_matches_membership(
		#[case] group_versions: &'static [&'static str],
		#[case] expected: bool,
	) {
		let client = FakeDiscovery::new(|| Ok(lists(group_versions)));
		let caps = ManagementClusterCapabilities::detect(&client).await.unwrap();
		assert_eq!(caps.has_routes(), expected);
		assert_eq!(client.calls.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn test_failed_group_counts_as_present() {
		let client = FakeDiscovery::new(|| {
			Err(DiscoveryError::GroupDiscoveryFailed {
				groups: HashMap::from([(route_group_version(), "service unavailable".to_string())]),
				resources: lists(&["v1", "apps/v1"]),
			})
		});
		let caps = ManagementClusterCapabilities::detect(&client).await.unwrap();
		assert!(caps.has_routes());
	}

	#[tokio::test]
	async fn test_unrelated_failed_group_falls_back_to_partial_list() {
		let client = FakeDiscovery::new(|| {
			Err(DiscoveryError::GroupDiscoveryFailed {
				groups: HashMap::from([(
					GroupVersion::gv("metrics.k8s.io", "v1beta1"),
					"service unavailable".to_string(),
				)]),
				resources: lists(&["v1", "route.openshift.io/v1"]),
			})
		});
		assert!(ManagementClusterCapabilities::detect(&client)
			.await
			.unwrap()
			.has_routes());

		let client = FakeDiscovery::new(|| {
			Err(DiscoveryError::GroupDiscoveryFailed {
				groups: HashMap::from([(
					GroupVersion::gv("metrics.k8s.io", "v1beta1"),
					"service unavailable".to_string(),
				)]),
				resources: lists(&["v1"]),
			})
		});
		assert!(!ManagementClusterCapabilities::detect(&client)
			.await
			.unwrap()
			.has_routes());
	}

	#[test]
	fn test_default_has_no_capabilities() {
		let caps = ManagementClusterCapabilities::default();
		assert!(!caps.has_routes());
		assert_eq!(caps.to_string(), "routes=absent");
		assert_eq!(ManagementClusterCapabilities::new(true).to_string(), "routes=supported");
	}
}
