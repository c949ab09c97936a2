//! Converges a desired object set: either renders it or applies it in order.

use std::{fmt, io::Write};

use kube::api::DynamicObject;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::{
	k8s::apply::{RemoteStore, StoreError},
	render::{EncodeError, Encoder},
};

/// Field owner recorded for every applied object.
pub const FIELD_MANAGER: &str = "hypershift-cli";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
	/// Serialize objects to the output stream.
	Render,
	/// Server-side apply each object to the cluster.
	Apply,
}

/// Identity of an object for reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectKey {
	pub kind: String,
	pub namespace: Option<String>,
	pub name: String,
}

impl ObjectKey {
	pub fn of(object: &DynamicObject) -> Self {
		Self {
			kind: object
				.types
				.as_ref()
				.map(|t| t.kind.clone())
				.unwrap_or_default(),
			namespace: object.metadata.namespace.clone(),
			name: object.metadata.name.clone().unwrap_or_default(),
		}
	}
}

impl fmt::Display for ObjectKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match &self.namespace {
			Some(ns) => write!(f, "{} {}/{}", self.kind, ns, self.name),
			None => write!(f, "{} {}", self.kind, self.name),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecuteSummary {
	pub mode: Mode,
	/// Objects written (render) or applied (apply).
	pub processed: usize,
}

#[derive(Debug, Error)]
pub enum ExecuteError {
	#[error("cancelled after applying {applied} objects, {remaining} not applied")]
	Cancelled { applied: usize, remaining: usize },

	#[error("applying {key}")]
	Apply {
		key: ObjectKey,
		#[source]
		source: StoreError,
	},

	#[error("rendering {key}")]
	Encode {
		key: ObjectKey,
		#[source]
		source: EncodeError,
	},

	#[error("writing output")]
	Io(#[from] std::io::Error),
}

impl ExecuteError {
	pub fn is_cancelled(&self) -> bool {
		matches!(self, ExecuteError::Cancelled { .. })
	}
}

/// Runs a desired object set in one of the two [`Mode`]s.
///
/// Objects are processed strictly in order. Apply stops at the first failure
/// and leaves already applied objects in place.
pub struct Executor<'a, S: ?Sized, W> {
	store: &'a S,
	out: W,
	encoder: &'a dyn Encoder,
}

impl<'a, S, W> Executor<'a, S, W>
where
	S: RemoteStore + ?Sized,
	W: Write,
{
	pub fn new(store: &'a S, out: W, encoder: &'a dyn Encoder) -> Self {
		Self {
			store,
			out,
			encoder,
		}
	}

	#[instrument(skip_all, fields(mode = ?mode, object_count = objects.len()))]
	pub async fn execute(
		&mut self,
		objects: &[DynamicObject],
		mode: Mode,
		cancel: &CancellationToken,
	) -> Result<ExecuteSummary, ExecuteError> {
		let processed = match mode {
			Mode::Render => self.render(objects)?,
			Mode::Apply => self.apply(objects, cancel).await?,
		};
		Ok(ExecuteSummary { mode, processed })
	}

	fn render(&mut self, objects: &[DynamicObject]) -> Result<usize, ExecuteError> {
		for object in objects {
			self.encoder
				.write(object, &mut self.out)
				.map_err(|source| ExecuteError::Encode {
					key: ObjectKey::of(object),
					source,
				})?;
			self.out.write_all(b"---\n")?;
		}
		self.out.flush()?;
		Ok(objects.len())
	}

	async fn apply(
		&mut self,
		objects: &[DynamicObject],
		cancel: &CancellationToken,
	) -> Result<usize, ExecuteError> {
		for (applied, object) in objects.iter().enumerate() {
			if cancel.is_cancelled() {
				return Err(ExecuteError::Cancelled {
					applied,
					remaining: objects.len() - applied,
				});
			}

			let key = ObjectKey::of(object);
			self.store
				.apply(object, FIELD_MANAGER, true)
				.await
				.map_err(|source| ExecuteError::Apply {
					key: key.clone(),
					source,
				})?;
			tracing::info!(
				kind = %key.kind,
				namespace = key.namespace.as_deref().unwrap_or(""),
				name = %key.name,
				"applied"
			);
		}
		Ok(objects.len())
	}
}
