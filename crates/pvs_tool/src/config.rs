//! Optional TOML configuration for the PVS tool.
//!
//! Every section and key may be omitted; missing values fall back to the
//! library defaults. Command line flags override the file.

use anyhow::{Context, Result};
use pvs_core::{OcclusionReport, OptimizerConfig};
use serde::Deserialize;
use std::path::Path;

/// Root configuration.
#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
	pub optimizer: OptimizerSection,
	pub compression: CompressionSection,
	pub analysis: AnalysisSection,
}

/// `[optimizer]`: octree subtree collapsing.
#[derive(Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct OptimizerSection {
	/// Minimum share of the merged visibility every child must already see.
	pub collapse_threshold: f64,
}

impl Default for OptimizerSection {
	fn default() -> Self {
		Self {
			collapse_threshold: OptimizerConfig::DEFAULT_COLLAPSE_THRESHOLD,
		}
	}
}

/// `[compression]`: sibling promotion for hierarchical octrees.
#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct CompressionSection {
	/// Children allowed to disagree with a promoted node.
	pub num_allowed_unequal_elements: u8,
}

/// `[analysis]`: occlusion report.
#[derive(Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisSection {
	/// Histogram bucket count.
	pub buckets: usize,
}

impl Default for AnalysisSection {
	fn default() -> Self {
		Self {
			buckets: OcclusionReport::DEFAULT_BUCKETS,
		}
	}
}

impl Config {
	/// Load configuration from a TOML file.
	pub fn load(path: &Path) -> Result<Self> {
		let content = std::fs::read_to_string(path)
			.with_context(|| format!("Failed to read config file: {}", path.display()))?;
		Self::from_toml_str(&content)
			.with_context(|| format!("Invalid config file: {}", path.display()))
	}

	/// Load `path` if given, otherwise the defaults.
	pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
		match path {
			Some(path) => Self::load(path),
			None => Ok(Self::default()),
		}
	}

	pub fn from_toml_str(content: &str) -> Result<Self> {
		let config: Config = toml::from_str(content).context("Failed to parse config TOML")?;
		config.validate()?;
		Ok(config)
	}

	pub fn validate(&self) -> Result<()> {
		let threshold = self.optimizer.collapse_threshold;
		if !(threshold > 0.0 && threshold <= 1.0) {
			anyhow::bail!("collapse_threshold must be in (0, 1], got {threshold}");
		}
		if self.compression.num_allowed_unequal_elements > 7 {
			anyhow::bail!(
				"num_allowed_unequal_elements must be at most 7, got {}",
				self.compression.num_allowed_unequal_elements
			);
		}
		if self.analysis.buckets == 0 {
			anyhow::bail!("analysis buckets must be at least 1");
		}
		Ok(())
	}

	pub fn optimizer_config(&self) -> OptimizerConfig {
		OptimizerConfig {
			collapse_threshold: self.optimizer.collapse_threshold,
		}
	}
}
