//! Render command handler.
//!
//! Renders control plane component workloads from a `HostedControlPlane`
//! manifest, without contacting a cluster.

use std::{collections::BTreeMap, fs, io::Write, path::PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use hcp_api::HostedControlPlane;
use tokio_util::sync::CancellationToken;

use super::util;
use crate::{
	etcd::{self, EtcdParams},
	executor::{Executor, Mode},
	k8s::apply::OfflineStore,
	render::OutputFormat,
};

#[derive(Args, Debug)]
pub struct RenderArgs {
	#[command(subcommand)]
	pub command: RenderCommands,
}

#[derive(Subcommand, Debug)]
pub enum RenderCommands {
	/// Managed etcd services and stateful set
	Etcd(EtcdArgs),
}

#[derive(Args, Debug)]
pub struct EtcdArgs {
	/// Path to a HostedControlPlane manifest (YAML or JSON)
	#[arg(long = "hosted-control-plane", short = 'f')]
	pub hosted_control_plane: PathBuf,

	/// Etcd image, as it appears in the release image map
	#[arg(long, default_value = "")]
	pub etcd_image: String,

	/// Output format
	#[arg(long, short = 'o', value_enum, default_value_t)]
	pub output: OutputFormat,
}

pub fn run<W: Write>(args: RenderArgs, writer: W) -> Result<()> {
	let RenderCommands::Etcd(args) = args.command;
	let content = fs::read_to_string(&args.hosted_control_plane).with_context(|| {
		format!("failed to read {}", args.hosted_control_plane.display())
	})?;
	let hcp: HostedControlPlane = serde_yaml_with_quirks::from_str(&content).with_context(|| {
		format!(
			"failed to parse HostedControlPlane from {}",
			args.hosted_control_plane.display()
		)
	})?;

	util::runtime()
		.context("creating tokio runtime")?
		.block_on(render_etcd(&hcp, &args.etcd_image, args.output, writer))
}

/// Write the etcd workload objects for `hcp`.
pub async fn render_etcd<W: Write>(
	hcp: &HostedControlPlane,
	etcd_image: &str,
	output: OutputFormat,
	writer: W,
) -> Result<()> {
	let namespace = hcp
		.metadata
		.namespace
		.as_deref()
		.context("HostedControlPlane has no metadata.namespace")?;
	// Workloads without a controller reference would outlive their control plane
	if hcp.metadata.uid.as_deref().unwrap_or_default().is_empty() {
		anyhow::bail!(
			"HostedControlPlane has no metadata.uid; render from a manifest read back from the cluster"
		);
	}

	let mut images = BTreeMap::new();
	if !etcd_image.is_empty() {
		images.insert("etcd".to_string(), etcd_image.to_string());
	}
	let params = EtcdParams::new(hcp, &images);
	let objects = etcd::manifests(&params, namespace).context("building etcd manifests")?;

	let encoder = output.encoder();
	Executor::new(&OfflineStore, writer, encoder.as_ref())
		.execute(&objects, Mode::Render, &CancellationToken::new())
		.await?;
	Ok(())
}
