//! Named-field patching of the shared configuration artifacts.
//!
//! The simulator reads its compile-time configuration from a VHDL
//! parameters package. Fields are addressed by constant name, never by
//! line offset: a lookup that matches zero lines or more than one line
//! fails loudly instead of corrupting an unrelated line. Writes are
//! flushed and synced before returning, so the artifact is always in a
//! fully-determined state when the simulator is next invoked.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::manifest::CampaignManifest;
use crate::params::{InjectionRate, WeightPair};
use crate::util::read_text_file;

/// Network parameters discovered once at campaign start. Read-only for
/// the duration of the sweep.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SystemParams {
    pub x_size: u32,
    pub y_size: u32,
    pub packet_qty: u32,
    pub period_size: u32,
}

impl SystemParams {
    pub fn node_count(&self) -> u32 {
        self.x_size * self.y_size
    }

    /// Record count one full run is expected to produce.
    pub fn expected_records(&self) -> usize {
        (self.node_count() * self.packet_qty) as usize
    }
}

/// Rewrites fields of the configuration artifacts in place.
pub struct ConfigPatcher {
    params_path: PathBuf,
    driver_path: PathBuf,
}

impl ConfigPatcher {
    pub fn new(project_root: &Path, manifest: &CampaignManifest) -> Self {
        ConfigPatcher {
            params_path: project_root.join(&manifest.params_artifact),
            driver_path: project_root.join(&manifest.driver_artifact),
        }
    }

    /// Reads the four read-only network constants from the parameters
    /// package.
    pub fn discover_params(&self) -> Result<SystemParams> {
        Ok(SystemParams {
            x_size: self.read_constant(crate::CONST_X_SIZE)?.parse()?,
            y_size: self.read_constant(crate::CONST_Y_SIZE)?.parse()?,
            packet_qty: self.read_constant(crate::CONST_PACKET_QTY)?.parse()?,
            period_size: self.read_constant(crate::CONST_PERIOD_SIZE)?.parse()?,
        })
    }

    /// Writes the weight pair for one scenario.
    pub fn apply_weights(&self, weights: &WeightPair) -> Result<()> {
        self.write_constant(crate::CONST_ACC_WEIGHT, &weights.accurate.to_string())?;
        self.write_constant(crate::CONST_APX_WEIGHT, &weights.approximate.to_string())?;
        Ok(())
    }

    /// Writes the derived packets-per-period field for one injection
    /// rate.
    pub fn apply_rate(&self, rate: &InjectionRate, period_size: u32) -> Result<()> {
        let packets = rate.packets_per_period(period_size);
        debug!("rate {} -> packets_per_period = {}", rate.label, packets);
        self.write_constant(crate::CONST_PACKETS_PER_PERIOD, &packets.to_string())
    }

    /// Returns the value text of a named constant in the parameters
    /// package.
    pub fn read_constant(&self, name: &str) -> Result<String> {
        let content = read_text_file(&self.params_path)?;
        let line = self.find_constant_line(&content, name)?;
        let (assign, semi) = value_span(line, &self.params_path)?;
        Ok(line[assign + 2..semi].trim().to_string())
    }

    /// Rewrites the value of a named constant, preserving every other
    /// line byte-for-byte.
    pub fn write_constant(&self, name: &str, value: &str) -> Result<()> {
        let content = read_text_file(&self.params_path)?;
        // locate first so a lookup failure leaves the artifact untouched
        self.find_constant_line(&content, name)?;

        let mut out = String::with_capacity(content.len());
        for line in content.split_inclusive('\n') {
            if constant_name(line) == Some(name) {
                let (assign, semi) = value_span(line, &self.params_path)?;
                out.push_str(&line[..assign]);
                out.push_str(":= ");
                out.push_str(value);
                out.push_str(&line[semi..]);
            } else {
                out.push_str(line);
            }
        }
        write_durable(&self.params_path, &out)
    }

    /// Replaces the seed literal at both `InitSeed` call sites of the
    /// driver artifact with freshly drawn values. Seeds differ run to
    /// run so no two points share a random stream.
    pub fn reseed(&self) -> Result<()> {
        let content = read_text_file(&self.driver_path)?;
        let site_count = content
            .lines()
            .filter(|l| l.contains(SEED_SITE_MARKER))
            .count();
        if site_count != SEED_SITE_COUNT {
            return Err(Error::SeedSiteMismatch {
                path: self.driver_path.to_string_lossy().to_string(),
                found: site_count,
            });
        }

        let mut out = String::with_capacity(content.len());
        for line in content.split_inclusive('\n') {
            if line.contains(SEED_SITE_MARKER) {
                let seed: f64 = rand::random();
                out.push_str(&splice_seed(line, &seed.to_string(), &self.driver_path)?);
            } else {
                out.push_str(line);
            }
        }
        write_durable(&self.driver_path, &out)
    }

    fn find_constant_line<'a>(&self, content: &'a str, name: &str) -> Result<&'a str> {
        let matches: Vec<&str> = content
            .lines()
            .filter(|l| constant_name(l) == Some(name))
            .collect();
        match matches.len() {
            1 => Ok(matches[0]),
            0 => Err(Error::FieldNotFound {
                field: name.to_string(),
                path: self.params_path.to_string_lossy().to_string(),
            }),
            n => Err(Error::FieldAmbiguous {
                field: name.to_string(),
                path: self.params_path.to_string_lossy().to_string(),
                count: n,
            }),
        }
    }
}

const SEED_SITE_MARKER: &str = ".InitSeed(";
const SEED_SITE_COUNT: usize = 2;

/// Extracts the constant name from a VHDL declaration line of the form
/// `constant <name> : <type> := <value>;`.
fn constant_name(line: &str) -> Option<&str> {
    let rest = line.trim_start().strip_prefix("constant ")?;
    rest.split(|c: char| c == ':' || c.is_whitespace())
        .find(|s| !s.is_empty())
}

/// Returns the byte offsets of `:=` and the terminating `;` on a
/// declaration line.
fn value_span(line: &str, path: &Path) -> Result<(usize, usize)> {
    let malformed = |reason: &str| Error::MalformedArtifact {
        path: path.to_string_lossy().to_string(),
        reason: format!("{}: `{}`", reason, line.trim_end()),
    };
    let assign = line.find(":=").ok_or_else(|| malformed("no `:=` on line"))?;
    let semi = line[assign..]
        .find(';')
        .map(|i| i + assign)
        .ok_or_else(|| malformed("no `;` after value"))?;
    Ok((assign, semi))
}

/// Replaces the last quoted literal on a seed call-site line.
fn splice_seed(line: &str, seed: &str, path: &Path) -> Result<String> {
    let malformed = || Error::MalformedArtifact {
        path: path.to_string_lossy().to_string(),
        reason: format!("seed call site has no quoted literal: `{}`", line.trim_end()),
    };
    let close = line.rfind('"').ok_or_else(malformed)?;
    let open = line[..close].rfind('"').ok_or_else(malformed)?;
    Ok(format!("{}{}{}", &line[..open + 1], seed, &line[close..]))
}

fn write_durable(path: &Path, content: &str) -> Result<()> {
    let mut file = File::create(path)?;
    file.write_all(content.as_bytes())?;
    file.sync_all()?;
    Ok(())
}

#[cfg(test)]
pub(crate) const PARAMS_FIXTURE: &str = "\
package noc_parameterspkg is
    constant x_size : natural := 2;
    constant y_size : natural := 2;
    constant packet_qty : natural := 5;
    constant period_size : natural := 100;
    constant acc_data_weight : natural := 80;
    constant apx_data_weight : natural := 20;
    constant packets_per_period : integer := 10;
end package;
";

#[cfg(test)]
pub(crate) const DRIVER_FIXTURE: &str = "\
architecture rtl of pe_injectiondriver is
begin
    injectionTimes_rand.InitSeed(instance & to_string(x_coord) & \"0.11\");
    randType.InitSeed(instance & to_string(x_coord) & \"0.22\");
end architecture;
";

#[cfg(test)]
fn fixture_patcher(dir: &Path) -> ConfigPatcher {
    std::fs::write(dir.join("params.vhd"), PARAMS_FIXTURE).unwrap();
    std::fs::write(dir.join("driver.vhd"), DRIVER_FIXTURE).unwrap();
    let manifest = CampaignManifest {
        params_artifact: "params.vhd".to_string(),
        driver_artifact: "driver.vhd".to_string(),
        ..Default::default()
    };
    ConfigPatcher::new(dir, &manifest)
}

#[test]
fn discover_network_params() {
    let dir = tempfile::tempdir().unwrap();
    let patcher = fixture_patcher(dir.path());
    let params = patcher.discover_params().unwrap();
    assert_eq!(
        params,
        SystemParams {
            x_size: 2,
            y_size: 2,
            packet_qty: 5,
            period_size: 100,
        }
    );
    assert_eq!(params.expected_records(), 20);
}

#[test]
fn patch_round_trip_preserves_other_lines() {
    let dir = tempfile::tempdir().unwrap();
    let patcher = fixture_patcher(dir.path());

    patcher.write_constant(crate::CONST_ACC_WEIGHT, "65").unwrap();
    assert_eq!(patcher.read_constant(crate::CONST_ACC_WEIGHT).unwrap(), "65");

    // every line not owning the field is untouched
    let after = std::fs::read_to_string(dir.path().join("params.vhd")).unwrap();
    for (before_line, after_line) in PARAMS_FIXTURE.lines().zip(after.lines()) {
        if constant_name(before_line) != Some(crate::CONST_ACC_WEIGHT) {
            assert_eq!(before_line, after_line);
        }
    }
    assert_eq!(patcher.read_constant(crate::CONST_APX_WEIGHT).unwrap(), "20");
}

#[test]
fn unknown_field_fails_loudly() {
    let dir = tempfile::tempdir().unwrap();
    let patcher = fixture_patcher(dir.path());
    let res = patcher.write_constant("no_such_constant", "1");
    assert!(matches!(res, Err(Error::FieldNotFound { .. })));
    // artifact untouched after the failed lookup
    let after = std::fs::read_to_string(dir.path().join("params.vhd")).unwrap();
    assert_eq!(after, PARAMS_FIXTURE);
}

#[test]
fn ambiguous_field_fails_loudly() {
    let dir = tempfile::tempdir().unwrap();
    let patcher = fixture_patcher(dir.path());
    let doubled = format!("{}    constant x_size : natural := 4;\n", PARAMS_FIXTURE);
    std::fs::write(dir.path().join("params.vhd"), doubled).unwrap();
    let res = patcher.read_constant(crate::CONST_X_SIZE);
    assert!(matches!(res, Err(Error::FieldAmbiguous { count: 2, .. })));
}

#[test]
fn reseed_draws_fresh_values() {
    let dir = tempfile::tempdir().unwrap();
    let patcher = fixture_patcher(dir.path());

    patcher.reseed().unwrap();
    let first = std::fs::read_to_string(dir.path().join("driver.vhd")).unwrap();
    patcher.reseed().unwrap();
    let second = std::fs::read_to_string(dir.path().join("driver.vhd")).unwrap();

    assert!(!first.contains("0.11"));
    assert_ne!(first, second);
    assert_eq!(first.lines().count(), DRIVER_FIXTURE.lines().count());
}

#[test]
fn seed_site_count_mismatch() {
    let dir = tempfile::tempdir().unwrap();
    let patcher = fixture_patcher(dir.path());
    std::fs::write(
        dir.path().join("driver.vhd"),
        "    injectionTimes_rand.InitSeed(instance & \"0.11\");\n",
    )
    .unwrap();
    let res = patcher.reseed();
    assert!(matches!(res, Err(Error::SeedSiteMismatch { found: 1, .. })));
}
