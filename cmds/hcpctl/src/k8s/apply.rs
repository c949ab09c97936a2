//! Server-side apply against the management cluster.

use std::collections::HashSet;

use async_trait::async_trait;
use kube::{
	api::{Api, DynamicObject, Patch, PatchParams},
	Client,
};
use thiserror::Error;
use tracing::instrument;

use super::{
	discovery::{gvk_from_object, ApiResourceCache, DiscoveryError},
	ResourceScope,
};

/// Errors returned by a [`RemoteStore`].
#[derive(Debug, Error)]
pub enum StoreError {
	/// The object cannot be addressed (no apiVersion, kind or name).
	#[error("invalid object: {0}")]
	InvalidObject(&'static str),

	#[error("unknown resource type: {api_version}/{kind}")]
	UnknownResourceType { api_version: String, kind: String },

	/// Another field manager owns conflicting fields and ownership was not forced.
	#[error("conflict: {message}")]
	Conflict { message: String },

	#[error("not found: {message}")]
	NotFound { message: String },

	/// The server refused the object (validation, admission, authorization).
	#[error("rejected ({code}): {message}")]
	Rejected { code: u16, message: String },

	#[error("request failed")]
	Transport(#[source] kube::Error),

	#[error("no cluster connection")]
	Offline,
}

impl From<kube::Error> for StoreError {
	fn from(err: kube::Error) -> Self {
		match err {
			kube::Error::Api(ref status) if status.code == 409 => StoreError::Conflict {
				message: status.message.clone(),
			},
			kube::Error::Api(ref status) if status.code == 404 => StoreError::NotFound {
				message: status.message.clone(),
			},
			kube::Error::Api(ref status) => StoreError::Rejected {
				code: status.code,
				message: status.message.clone(),
			},
			other => StoreError::Transport(other),
		}
	}
}

/// A live object store accepting server-side apply requests.
#[async_trait]
pub trait RemoteStore: Send + Sync {
	/// Apply `object`, claiming its fields for `field_manager`.
	///
	/// With `force`, fields held by other managers are taken over instead of
	/// reported as a conflict.
	async fn apply(
		&self,
		object: &DynamicObject,
		field_manager: &str,
		force: bool,
	) -> Result<(), StoreError>;
}

/// Store for runs that must not touch a cluster. Every apply fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineStore;

#[async_trait]
impl RemoteStore for OfflineStore {
	async fn apply(&self, _: &DynamicObject, _: &str, _: bool) -> Result<(), StoreError> {
		Err(StoreError::Offline)
	}
}

/// [`RemoteStore`] backed by a kube client.
pub struct KubeStore {
	client: Client,
	api_cache: ApiResourceCache,
}

impl KubeStore {
	/// Create a store able to apply every kind present in `objects`.
	#[instrument(skip_all, fields(object_count = objects.len()))]
	pub async fn for_objects(client: Client, objects: &[DynamicObject]) -> Result<Self, DiscoveryError> {
		let required_keys: HashSet<_> = objects.iter().filter_map(gvk_from_object).collect();
		let api_cache = ApiResourceCache::build(&client, required_keys).await?;
		Ok(Self { client, api_cache })
	}

	/// Create a dynamic API for the given resource.
	fn dynamic_api(
		&self,
		ar: &kube::discovery::ApiResource,
		namespace: Option<&str>,
	) -> Api<DynamicObject> {
		match namespace {
			Some(ns) => Api::namespaced_with(self.client.clone(), ns, ar),
			None => Api::all_with(self.client.clone(), ar),
		}
	}
}

#[async_trait]
impl RemoteStore for KubeStore {
	#[instrument(skip(self, object), fields(
		kind = object.types.as_ref().map_or("unknown", |t| t.kind.as_str()),
		name = object.metadata.name.as_deref().unwrap_or("unknown"),
	))]
	async fn apply(
		&self,
		object: &DynamicObject,
		field_manager: &str,
		force: bool,
	) -> Result<(), StoreError> {
		let gvk = gvk_from_object(object).ok_or(StoreError::InvalidObject("missing apiVersion or kind"))?;
		let name = object
			.metadata
			.name
			.as_deref()
			.ok_or(StoreError::InvalidObject("missing metadata.name"))?;

		let discovered = self
			.api_cache
			.lookup(&gvk)
			.ok_or_else(|| StoreError::UnknownResourceType {
				api_version: gvk.api_version(),
				kind: gvk.kind.clone(),
			})?;

		let namespace = match discovered.scope {
			ResourceScope::Namespaced => Some(object.metadata.namespace.as_deref().unwrap_or("default")),
			ResourceScope::ClusterWide => None,
		};
		let api = self.dynamic_api(&discovered.api_resource, namespace);

		let params = PatchParams {
			field_manager: Some(field_manager.to_string()),
			force,
			..Default::default()
		};
		api.patch(name, &params, &Patch::Apply(object)).await?;
		Ok(())
	}
}
