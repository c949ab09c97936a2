//! Cloud provider configuration for control plane components.
//!
//! Library surface only: no `hcpctl` command renders cloud config, so nothing
//! in the binary calls into this module. Callers rendering control plane
//! workloads use [`provider_config_key`] to locate the provider's config file.

use std::{fmt, str::FromStr};

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown cloud provider `{0}`")]
pub struct UnknownProvider(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloudProvider {
	Aws,
	KubeVirt,
}

impl CloudProvider {
	pub fn name(self) -> &'static str {
		match self {
			CloudProvider::Aws => "aws",
			CloudProvider::KubeVirt => "kubevirt",
		}
	}

	/// Key of the provider's config file inside the cloud config ConfigMap.
	pub fn config_key(self) -> &'static str {
		match self {
			CloudProvider::Aws => "aws.conf",
			CloudProvider::KubeVirt => "cloud.conf",
		}
	}
}

impl fmt::Display for CloudProvider {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.name())
	}
}

impl FromStr for CloudProvider {
	type Err = UnknownProvider;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"aws" => Ok(CloudProvider::Aws),
			"kubevirt" => Ok(CloudProvider::KubeVirt),
			other => Err(UnknownProvider(other.to_string())),
		}
	}
}

/// Config key for a provider name, or `""` when the provider has none.
pub fn provider_config_key(provider: &str) -> &'static str {
	provider
		.parse::<CloudProvider>()
		.map_or("", CloudProvider::config_key)
}
