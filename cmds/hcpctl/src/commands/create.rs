//! Create command handler.
//!
//! Builds the objects of a basic hosted cluster and either renders them or
//! applies them to the management cluster.

use std::{fs, io::Write, path::PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use hcp_api::{AvailabilityPolicy, NetworkType};
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use super::{util, ClusterArgs};
use crate::{
	capabilities::ManagementClusterCapabilities,
	config::{CreateDefaults, CreateSettings, HcpctlConfig},
	executor::{Executor, Mode},
	fixtures::{ExampleOptions, ExamplePlatform, ExampleResources, KubevirtOptions},
	k8s::{
		apply::{KubeStore, OfflineStore},
		discovery::KubeDiscovery,
	},
	render::OutputFormat,
};

#[derive(Args, Debug)]
pub struct CreateArgs {
	#[command(subcommand)]
	pub command: CreateCommands,
}

#[derive(Subcommand, Debug)]
pub enum CreateCommands {
	/// Create basic functional HostedCluster resources
	Cluster(ClusterCommand),
}

#[derive(Args, Debug)]
pub struct ClusterCommand {
	#[command(subcommand)]
	pub platform: ClusterPlatform,
}

#[derive(Subcommand, Debug)]
pub enum ClusterPlatform {
	/// HostedCluster whose workers run as KubeVirt virtual machines
	Kubevirt(KubevirtArgs),
	/// HostedCluster without platform integration
	None(NoneArgs),
}

#[derive(Args, Debug)]
pub struct KubevirtArgs {
	#[command(flatten)]
	pub common: CommonArgs,

	/// Memory of each worker virtual machine
	#[arg(long, default_value = "4Gi")]
	pub memory: String,

	/// CPU cores of each worker virtual machine
	#[arg(long, default_value_t = 2)]
	pub cores: u32,

	/// Container disk image of the worker virtual machines
	#[arg(long, default_value = "quay.io/containerdisks/rhcos:4.7")]
	pub containerdisk: String,
}

#[derive(Args, Debug)]
pub struct NoneArgs {
	#[command(flatten)]
	pub common: CommonArgs,
}

#[derive(Args, Debug)]
pub struct CommonArgs {
	/// A namespace to contain the generated resources [default: clusters]
	#[arg(long)]
	pub namespace: Option<String>,

	/// A name for the cluster [default: example]
	#[arg(long)]
	pub name: Option<String>,

	/// The OCP release image for the cluster
	#[arg(long)]
	pub release_image: Option<String>,

	/// Path to a pull secret
	#[arg(long)]
	pub pull_secret: PathBuf,

	/// Path to an SSH public key to install on the workers
	#[arg(long)]
	pub ssh_key: Option<PathBuf>,

	/// Infrastructure id of the cluster [default: the cluster name]
	#[arg(long)]
	pub infra_id: Option<String>,

	/// Path to the raw AES-CBC key used to encrypt secrets in etcd.
	///
	/// Without it the key is derived from the cluster name, namespace, infra id
	/// and pull secret. That keeps rendering reproducible, but anyone holding
	/// the pull secret can recompute the derived key.
	#[arg(long, value_name = "PATH")]
	pub etcd_encryption_key_file: Option<PathBuf>,

	/// If >-1, create a default NodePool with this many replicas [default: 2]
	#[arg(long, allow_negative_numbers = true)]
	pub node_pool_replicas: Option<i32>,

	/// Network type: OpenShiftSDN, Calico or OVNKubernetes [default: OpenShiftSDN]
	#[arg(long)]
	pub network_type: Option<NetworkType>,

	/// Availability policy for hosted cluster components: SingleReplica or HighlyAvailable [default: SingleReplica]
	#[arg(long)]
	pub control_plane_availability_policy: Option<AvailabilityPolicy>,

	/// Base domain of the cluster [default: example.com]
	#[arg(long)]
	pub base_domain: Option<String>,

	/// Render output to stdout instead of applying
	#[arg(long)]
	pub render: bool,

	/// Output format when rendering
	#[arg(long, short = 'o', value_enum, default_value_t)]
	pub output: OutputFormat,

	#[command(flatten)]
	pub cluster: ClusterArgs,
}

impl CommonArgs {
	fn as_defaults(&self) -> CreateDefaults {
		CreateDefaults {
			namespace: self.namespace.clone(),
			name: self.name.clone(),
			node_pool_replicas: self.node_pool_replicas,
			network_type: self.network_type,
			availability_policy: self.control_plane_availability_policy,
			base_domain: self.base_domain.clone(),
			release_image: self.release_image.clone(),
		}
	}

	/// Layer flags over the config file over built-in defaults.
	fn settings(&self, file: Option<HcpctlConfig>) -> CreateSettings {
		let mut defaults = file.map(|c| c.defaults).unwrap_or_default();
		defaults.merge_from(&self.as_defaults());
		defaults.resolve()
	}
}

pub fn run<W: Write>(args: CreateArgs, writer: W) -> Result<()> {
	util::runtime()
		.context("creating tokio runtime")?
		.block_on(run_async(args, writer))
}

async fn run_async<W: Write>(args: CreateArgs, writer: W) -> Result<()> {
	let CreateCommands::Cluster(cluster) = args.command;
	let (common, platform) = match cluster.platform {
		ClusterPlatform::Kubevirt(args) => (
			args.common,
			ExamplePlatform::KubeVirt(KubevirtOptions {
				memory: args.memory,
				cores: args.cores,
				image: args.containerdisk,
			}),
		),
		ClusterPlatform::None(args) => (args.common, ExamplePlatform::None),
	};

	let cwd = std::env::current_dir().context("resolving working directory")?;
	let file = HcpctlConfig::load_from_directory(&cwd)?;
	let opts = example_options(&common, common.settings(file), platform)?;

	let token = CancellationToken::new();
	let ctrl_c = util::cancel_on_ctrl_c(token.clone());
	let result = create_cluster(&common, &opts, writer, &token).await;
	ctrl_c.abort();
	result
}

fn example_options(
	common: &CommonArgs,
	settings: CreateSettings,
	platform: ExamplePlatform,
) -> Result<ExampleOptions> {
	let pull_secret = fs::read(&common.pull_secret).with_context(|| {
		format!("failed to read pull secret file: {}", common.pull_secret.display())
	})?;
	let ssh_public_key = common
		.ssh_key
		.as_ref()
		.map(|path| {
			fs::read_to_string(path)
				.with_context(|| format!("failed to read ssh key file: {}", path.display()))
		})
		.transpose()?;
	let etcd_encryption_key = common
		.etcd_encryption_key_file
		.as_ref()
		.map(|path| {
			fs::read(path).with_context(|| {
				format!("failed to read etcd encryption key file: {}", path.display())
			})
		})
		.transpose()?;

	Ok(ExampleOptions::builder()
		.namespace(settings.namespace)
		.name(settings.name)
		.release_image(settings.release_image)
		.pull_secret(pull_secret)
		.maybe_ssh_public_key(ssh_public_key)
		.node_pool_replicas(settings.node_pool_replicas)
		.network_type(settings.network_type)
		.availability_policy(settings.availability_policy)
		.maybe_infra_id(common.infra_id.clone())
		.maybe_etcd_encryption_key(etcd_encryption_key)
		.base_domain(settings.base_domain)
		.platform(platform)
		.build())
}

/// Render or apply the cluster's objects.
///
/// Rendering never contacts the cluster and assumes it serves no optional APIs.
#[instrument(skip_all, fields(name = %opts.name, namespace = %opts.namespace, render = common.render))]
pub async fn create_cluster<W: Write>(
	common: &CommonArgs,
	opts: &ExampleOptions,
	writer: W,
	cancel: &CancellationToken,
) -> Result<()> {
	let encoder = common.output.encoder();

	if common.render {
		let objects = ExampleResources::new(opts, &ManagementClusterCapabilities::default())?
			.as_objects()?;
		Executor::new(&OfflineStore, writer, encoder.as_ref())
			.execute(&objects, Mode::Render, cancel)
			.await?;
		return Ok(());
	}

	let connection = common.cluster.connect().await?;
	tracing::info!(
		context = connection.context().unwrap_or_default(),
		server_version = %connection.server_version().git_version,
		"creating cluster"
	);
	let capabilities =
		ManagementClusterCapabilities::detect(&KubeDiscovery::new(connection.client().clone()))
			.await
			.context("detecting management cluster capabilities")?;
	tracing::info!(%capabilities, "detected management cluster capabilities");

	let objects = ExampleResources::new(opts, &capabilities)?.as_objects()?;
	let store = KubeStore::for_objects(connection.client().clone(), &objects)
		.await
		.context("discovering API resources")?;
	let summary = Executor::new(&store, writer, encoder.as_ref())
		.execute(&objects, Mode::Apply, cancel)
		.await
		.context("failed to create cluster")?;
	tracing::info!(applied = summary.processed, "cluster objects applied");
	Ok(())
}

#[cfg(test)]
mod tests {
	use clap::Parser;

	use super::*;

	#[derive(Parser)]
	struct TestCli {
		#[command(subcommand)]
		command: CreateCommands,
	}

	fn parse(args: &[&str]) -> ClusterPlatform {
		let cli = TestCli::try_parse_from(std::iter::once("create").chain(args.iter().copied())).unwrap();
		let CreateCommands::Cluster(cluster) = cli.command;
		cluster.platform
	}

	#[test]
	fn test_parse_kubevirt_flags() {
		let ClusterPlatform::Kubevirt(args) = parse(&[
			"cluster",
			"kubevirt",
			"--pull-secret",
			"/tmp/ps.json",
			"--node-pool-replicas",
			"-1",
			"--control-plane-availability-policy",
			"HighlyAvailable",
			"--cores",
			"4",
			"--render",
		]) else {
			panic!("expected kubevirt");
		};
		assert_eq!(args.cores, 4);
		assert_eq!(args.memory, "4Gi");
		assert_eq!(args.common.node_pool_replicas, Some(-1));
		assert_eq!(
			args.common.control_plane_availability_policy,
			Some(AvailabilityPolicy::HighlyAvailable)
		);
		assert!(args.common.render);
		assert_eq!(args.common.output, OutputFormat::Yaml);
	}

	#[test]
	fn test_flags_override_file_defaults() {
		let ClusterPlatform::None(args) = parse(&[
			"cluster",
			"none",
			"--pull-secret",
			"/tmp/ps.json",
			"--name",
			"flagged",
		]) else {
			panic!("expected none");
		};
		let file = HcpctlConfig {
			defaults: CreateDefaults {
				name: Some("from-file".to_string()),
				namespace: Some("hosted".to_string()),
				..Default::default()
			},
		};
		let settings = args.common.settings(Some(file));
		assert_eq!(settings.name, "flagged");
		assert_eq!(settings.namespace, "hosted");
		assert_eq!(settings.base_domain, "example.com");
	}

	#[test]
	fn test_encryption_key_file_is_read() {
		let dir = tempfile::tempdir().unwrap();
		let pull_secret = dir.path().join("pull-secret.json");
		let key = dir.path().join("etcd.key");
		fs::write(&pull_secret, br#"{"auths":{}}"#).unwrap();
		fs::write(&key, [7u8; 32]).unwrap();

		let ClusterPlatform::None(args) = parse(&[
			"cluster",
			"none",
			"--pull-secret",
			pull_secret.to_str().unwrap(),
			"--etcd-encryption-key-file",
			key.to_str().unwrap(),
		]) else {
			panic!("expected none");
		};
		assert_eq!(args.common.etcd_encryption_key_file.as_deref(), Some(key.as_path()));

		let settings = args.common.settings(None);
		let opts = example_options(&args.common, settings, ExamplePlatform::None).unwrap();
		assert_eq!(opts.etcd_encryption_key, Some(vec![7u8; 32]));
	}

	#[test]
	fn test_missing_encryption_key_file_fails() {
		let dir = tempfile::tempdir().unwrap();
		let pull_secret = dir.path().join("pull-secret.json");
		fs::write(&pull_secret, br#"{"auths":{}}"#).unwrap();
		let missing = dir.path().join("missing.key");

		let ClusterPlatform::None(args) = parse(&[
			"cluster",
			"none",
			"--pull-secret",
			pull_secret.to_str().unwrap(),
			"--etcd-encryption-key-file",
			missing.to_str().unwrap(),
		]) else {
			panic!("expected none");
		};
		let err = example_options(&args.common, args.common.settings(None), ExamplePlatform::None)
			.unwrap_err();
		assert!(err.to_string().contains("etcd encryption key"), "{err:?}");
	}

	#[test]
	fn test_invalid_policy_rejected() {
		let result = TestCli::try_parse_from([
			"create",
			"cluster",
			"none",
			"--pull-secret",
			"ps",
			"--control-plane-availability-policy",
			"Sometimes",
		]);
		assert!(result.is_err());
	}
}
