//! Capabilities command handler.
//!
//! Prints which optional APIs the management cluster serves.

use std::io::Write;

use anyhow::{Context, Result};
use clap::Args;
use tracing::instrument;

use super::{util, ClusterArgs};
use crate::{
	capabilities::ManagementClusterCapabilities,
	k8s::discovery::{DiscoveryClient, KubeDiscovery},
};

#[derive(Args, Debug)]
pub struct CapabilitiesArgs {
	#[command(flatten)]
	pub cluster: ClusterArgs,
}

pub fn run<W: Write>(args: CapabilitiesArgs, writer: W) -> Result<()> {
	util::runtime()
		.context("creating tokio runtime")?
		.block_on(run_async(args, writer))
}

#[instrument(skip_all)]
async fn run_async<W: Write>(args: CapabilitiesArgs, writer: W) -> Result<()> {
	let connection = args.cluster.connect().await?;
	let discovery = KubeDiscovery::new(connection.client().clone());
	report(&discovery, writer).await
}

/// Detect capabilities through `discovery` and print one line per capability.
pub async fn report<D, W>(discovery: &D, mut writer: W) -> Result<()>
where
	D: DiscoveryClient + ?Sized,
	W: Write,
{
	let capabilities = ManagementClusterCapabilities::detect(discovery)
		.await
		.context("detecting management cluster capabilities")?;
	writeln!(writer, "{}", capabilities)?;
	Ok(())
}
