//! Management cluster connection.

use std::{path::Path, time::Duration};

use k8s_openapi::apimachinery::pkg::version::Info;
use kube::{
	config::{KubeConfigOptions, Kubeconfig, KubeconfigError},
	Client, Config,
};
use thiserror::Error;
use tracing::instrument;

/// Default timeout for Kubernetes API requests.
const DEFAULT_API_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors that can occur when connecting to the management cluster.
#[derive(Debug, Error)]
pub enum ConnectionError {
	#[error("no context named `{0}` was found. Please check your kubeconfig")]
	ContextNotFound(String),

	#[error("reading kubeconfig from {path}")]
	ReadKubeconfig {
		path: String,
		#[source]
		source: KubeconfigError,
	},

	#[error(transparent)]
	Kubeconfig(#[from] KubeconfigError),

	#[error(transparent)]
	Kube(#[from] kube::Error),
}

/// A connection to the management cluster.
#[derive(Clone)]
pub struct ClusterConnection {
	client: Client,
	server_version: Info,
	/// Context the connection was built from.
	context: Option<String>,
}

impl std::fmt::Debug for ClusterConnection {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ClusterConnection")
			.field("context", &self.context)
			.field("server_version", &self.server_version)
			.finish_non_exhaustive()
	}
}

impl ClusterConnection {
	/// Connect using an explicit kubeconfig file, or the default loading rules
	/// (`$KUBECONFIG`, then `~/.kube/config`) when `path` is `None`.
	#[instrument(skip_all)]
	pub async fn connect(path: Option<&Path>, context: Option<&str>) -> Result<Self, ConnectionError> {
		let kubeconfig = match path {
			Some(path) => Kubeconfig::read_from(path).map_err(|source| ConnectionError::ReadKubeconfig {
				path: path.display().to_string(),
				source,
			})?,
			None => Kubeconfig::read()?,
		};
		Self::from_kubeconfig(kubeconfig, context).await
	}

	/// Connect using an already loaded kubeconfig.
	///
	/// `context` selects a named context; `None` uses the kubeconfig's current context.
	#[instrument(skip(kubeconfig))]
	pub async fn from_kubeconfig(
		kubeconfig: Kubeconfig,
		context: Option<&str>,
	) -> Result<Self, ConnectionError> {
		if let Some(name) = context {
			if !kubeconfig.contexts.iter().any(|c| c.name == name) {
				return Err(ConnectionError::ContextNotFound(name.to_string()));
			}
		}

		let context = context
			.map(str::to_string)
			.or_else(|| kubeconfig.current_context.clone());

		let mut config = Config::from_custom_kubeconfig(
			kubeconfig,
			&KubeConfigOptions {
				context: context.clone(),
				..Default::default()
			},
		)
		.await?;
		config.read_timeout = Some(DEFAULT_API_TIMEOUT);

		let client = Client::try_from(config)?;
		let server_version = client.apiserver_version().await?;

		tracing::debug!(
			context = ?context,
			server_version = %format!("{}.{}", server_version.major, server_version.minor),
			"connected to management cluster"
		);

		Ok(Self {
			client,
			server_version,
			context,
		})
	}

	/// Get a reference to the underlying kube client.
	pub fn client(&self) -> &Client {
		&self.client
	}

	pub fn server_version(&self) -> &Info {
		&self.server_version
	}

	pub fn context(&self) -> Option<&str> {
		self.context.as_deref()
	}
}
