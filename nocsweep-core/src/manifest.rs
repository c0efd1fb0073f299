//! Campaign manifest.
//!
//! An optional `campaign.toml` in the project root names the input files,
//! the configuration artifacts, the simulator command and its time limit,
//! and the per-point failure policy. Every field has a default matching
//! the stock testbench layout, so a missing manifest is not an error.

use std::path::Path;

use crate::error::{Error, Result};
use crate::CAMPAIGN_MANIFEST_FILE;

/// What the sweep driver does when a single point fails.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Abort the whole campaign on the first point-level failure.
    FailFast,
    /// Record the failed point and continue with the next one.
    Continue,
}

impl Default for FailurePolicy {
    fn default() -> Self {
        FailurePolicy::FailFast
    }
}

impl std::str::FromStr for FailurePolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "fail-fast" => Ok(FailurePolicy::FailFast),
            "continue" => Ok(FailurePolicy::Continue),
            _ => Err(Error::Other(format!("unknown failure policy: {}", s))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CampaignManifest {
    /// Newline-delimited injection rates, one fractional value per line.
    pub rates_file: String,
    /// Newline-delimited `accurate,approximate` weight pairs.
    pub weights_file: String,
    /// Parameters package holding the named network constants.
    pub params_artifact: String,
    /// Injection driver artifact holding the two seed call sites.
    pub driver_artifact: String,
    /// Simulator executable.
    pub sim_command: String,
    /// Arguments handed to the simulator, including the run script.
    pub sim_args: Vec<String>,
    /// Bounded wait for one simulator run, in seconds. `None` waits
    /// indefinitely.
    pub timeout_secs: Option<u64>,
    pub on_point_failure: FailurePolicy,
}

impl Default for CampaignManifest {
    fn default() -> Self {
        CampaignManifest {
            rates_file: "injectionrates.dat".to_string(),
            weights_file: "weights.dat".to_string(),
            params_artifact: "src/shared/noc_parameterspkg.vhd".to_string(),
            driver_artifact: "src/pe/pe_injectiondriver.vhd".to_string(),
            sim_command: "vsim".to_string(),
            sim_args: vec![
                "-c".to_string(),
                "-do".to_string(),
                "do ./test_scripts/noc_mixed_weighted.do".to_string(),
            ],
            timeout_secs: None,
            on_point_failure: FailurePolicy::default(),
        }
    }
}

impl CampaignManifest {
    /// Reads the manifest at the given path.
    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let manifest = toml::from_slice(&bytes)?;
        Ok(manifest)
    }

    /// Reads `campaign.toml` from the project root if one exists,
    /// otherwise falls back to the defaults.
    pub fn load_or_default(project_root: &Path) -> Result<Self> {
        let manifest_path = project_root.join(CAMPAIGN_MANIFEST_FILE);
        if manifest_path.is_file() {
            info!("using campaign manifest at {:?}", manifest_path);
            Self::from_path(&manifest_path)
        } else {
            debug!("no campaign manifest found, using defaults");
            Ok(Self::default())
        }
    }
}

#[test]
fn manifest_defaults_without_file() {
    let dir = tempfile::tempdir().unwrap();
    let manifest = CampaignManifest::load_or_default(dir.path()).unwrap();
    assert_eq!(manifest.sim_command, "vsim");
    assert_eq!(manifest.on_point_failure, FailurePolicy::FailFast);
    assert!(manifest.timeout_secs.is_none());
}

#[test]
fn manifest_partial_override() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join(CAMPAIGN_MANIFEST_FILE),
        "sim_command = \"modelsim\"\ntimeout_secs = 600\non_point_failure = \"continue\"\n",
    )
    .unwrap();
    let manifest = CampaignManifest::load_or_default(dir.path()).unwrap();
    assert_eq!(manifest.sim_command, "modelsim");
    assert_eq!(manifest.timeout_secs, Some(600));
    assert_eq!(manifest.on_point_failure, FailurePolicy::Continue);
    // untouched fields keep their defaults
    assert_eq!(manifest.rates_file, "injectionrates.dat");
}
