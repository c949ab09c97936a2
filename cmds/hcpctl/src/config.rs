//! Configuration file support for hcpctl
//!
//! A `.hcpctl.yaml` file supplies defaults for `create cluster` flags. hcpctl
//! searches from the working directory upward to the filesystem root.
//! Command line flags override file values, which override built-in defaults.

use std::{
	fs,
	path::{Path, PathBuf},
};

use hcp_api::{AvailabilityPolicy, NetworkType};
use serde::Deserialize;
use thiserror::Error;

/// The name of the config file hcpctl looks for
pub const CONFIG_FILE_NAME: &str = ".hcpctl.yaml";

pub const DEFAULT_NAMESPACE: &str = "clusters";
pub const DEFAULT_NAME: &str = "example";
pub const DEFAULT_NODE_POOL_REPLICAS: i32 = 2;
pub const DEFAULT_BASE_DOMAIN: &str = "example.com";

#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("failed to read config file: {}", path.display())]
	Read {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("failed to parse config file: {}", path.display())]
	Parse {
		path: PathBuf,
		#[source]
		source: serde_yaml_with_quirks::Error,
	},
}

/// Root configuration structure for .hcpctl.yaml
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HcpctlConfig {
	#[serde(default)]
	pub defaults: CreateDefaults,
}

/// Partially specified `create cluster` settings. Unset fields fall through
/// to the next layer.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDefaults {
	pub namespace: Option<String>,
	pub name: Option<String>,
	pub node_pool_replicas: Option<i32>,
	pub network_type: Option<NetworkType>,
	pub availability_policy: Option<AvailabilityPolicy>,
	pub base_domain: Option<String>,
	pub release_image: Option<String>,
}

/// Fully resolved `create cluster` settings.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateSettings {
	pub namespace: String,
	pub name: String,
	pub node_pool_replicas: i32,
	pub network_type: NetworkType,
	pub availability_policy: AvailabilityPolicy,
	pub base_domain: String,
	/// No built-in default; an empty image is rejected when building objects.
	pub release_image: String,
}

impl HcpctlConfig {
	/// Load config by searching from the given directory upward
	pub fn load_from_directory(start_dir: &Path) -> Result<Option<Self>, ConfigError> {
		find_config_file(start_dir)
			.map(|path| Self::load_from_file(&path))
			.transpose()
	}

	/// Load config from a specific file path
	pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
		let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
			path: path.to_path_buf(),
			source,
		})?;
		let config = serde_yaml_with_quirks::from_str(&content).map_err(|source| ConfigError::Parse {
			path: path.to_path_buf(),
			source,
		})?;
		tracing::debug!(path = %path.display(), "loaded config file");
		Ok(config)
	}
}

impl CreateDefaults {
	/// Overlay `other` on top of `self`: fields set in `other` win.
	pub fn merge_from(&mut self, other: &CreateDefaults) {
		fn overlay<T: Clone>(slot: &mut Option<T>, value: &Option<T>) {
			if value.is_some() {
				slot.clone_from(value);
			}
		}
		overlay(&mut self.namespace, &other.namespace);
		overlay(&mut self.name, &other.name);
		overlay(&mut self.node_pool_replicas, &other.node_pool_replicas);
		overlay(&mut self.network_type, &other.network_type);
		overlay(&mut self.availability_policy, &other.availability_policy);
		overlay(&mut self.base_domain, &other.base_domain);
		overlay(&mut self.release_image, &other.release_image);
	}

	/// Fill unset fields with built-in defaults.
	pub fn resolve(self) -> CreateSettings {
		CreateSettings {
			namespace: self.namespace.unwrap_or_else(|| DEFAULT_NAMESPACE.to_string()),
			name: self.name.unwrap_or_else(|| DEFAULT_NAME.to_string()),
			node_pool_replicas: self.node_pool_replicas.unwrap_or(DEFAULT_NODE_POOL_REPLICAS),
			network_type: self.network_type.unwrap_or_default(),
			availability_policy: self.availability_policy.unwrap_or_default(),
			base_domain: self
				.base_domain
				.unwrap_or_else(|| DEFAULT_BASE_DOMAIN.to_string()),
			release_image: self.release_image.unwrap_or_default(),
		}
	}
}

/// Search for a config file starting from `start_dir` and walking up to the filesystem root
pub fn find_config_file(start_dir: &Path) -> Option<PathBuf> {
	let start = start_dir
		.canonicalize()
		.unwrap_or_else(|_| start_dir.to_path_buf());
	start
		.ancestors()
		.map(|dir| dir.join(CONFIG_FILE_NAME))
		.find(|candidate| candidate.is_file())
}
