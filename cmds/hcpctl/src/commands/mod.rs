pub mod capabilities;
pub mod create;
pub mod render;

pub mod util;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use crate::k8s::client::ClusterConnection;

/// Flags selecting the management cluster.
#[derive(Args, Debug, Clone, Default)]
pub struct ClusterArgs {
	/// Path to the kubeconfig file. Defaults to $KUBECONFIG, then ~/.kube/config
	#[arg(long)]
	pub kubeconfig: Option<PathBuf>,

	/// Kubeconfig context to use. Defaults to the current context
	#[arg(long)]
	pub context: Option<String>,
}

impl ClusterArgs {
	pub async fn connect(&self) -> Result<ClusterConnection> {
		ClusterConnection::connect(self.kubeconfig.as_deref(), self.context.as_deref())
			.await
			.context("connecting to the management cluster")
	}
}
