//! This library implements the sweep campaign core.
//!
//! Programming interface is centered around the [`Campaign`] structure,
//! which owns one full parametric sweep against an external hardware
//! simulator. A campaign iterates weight scenarios outer and injection
//! rates inner; for every point it patches the shared configuration
//! artifact, triggers one blocking simulator run, harvests the per-node
//! transcripts into an aggregate table, and once per weight scenario
//! renders a multi-sheet report workbook.
//!
//! The stages are usable on their own as well: [`ConfigPatcher`] for
//! named-field artifact updates, [`SimulationInvoker`] for the bounded
//! blocking run, [`ResultCollector`] for harvest and cleanup, and
//! [`ReportBuilder`] for workbook assembly.
//!
//! # Example
//!
//! ```ignore
//! use nocsweep_core::{Campaign, CampaignManifest};
//!
//! let manifest = CampaignManifest::load_or_default(".")?;
//! let mut campaign = Campaign::new(".", manifest);
//! let summary = campaign.run()?;
//! ```
//!
//! [`Campaign`]: sweep/struct.Campaign.html
//! [`ConfigPatcher`]: config/struct.ConfigPatcher.html
//! [`SimulationInvoker`]: invoke/struct.SimulationInvoker.html
//! [`ResultCollector`]: collect/struct.ResultCollector.html
//! [`ReportBuilder`]: report/struct.ReportBuilder.html

#[macro_use]
extern crate serde;
#[macro_use]
extern crate log;

// reexports
pub use collect::{ResultCollector, TransactionRecord};
pub use config::{ConfigPatcher, SystemParams};
pub use error::{Error, Result};
pub use invoke::SimulationInvoker;
pub use manifest::{CampaignManifest, FailurePolicy};
pub use params::{InjectionRate, ParameterSpace, WeightPair};
pub use report::{ReportBuilder, ReportBook};
pub use sweep::{Campaign, CampaignSummary, PausePoint};

pub mod collect;
pub mod config;
pub mod error;
pub mod invoke;
pub mod manifest;
pub mod params;
pub mod report;
pub mod sweep;

mod util;

pub const VERSION: &'static str = env!("CARGO_PKG_VERSION");

/// Campaign manifest file name, looked up in the project root.
pub const CAMPAIGN_MANIFEST_FILE: &str = "campaign.toml";

/// Name of the directory holding per-rate aggregate tables.
pub const CSV_DATA_DIR_NAME: &str = "csv_data";
/// Name of the directory the simulator writes per-node transcripts into.
pub const TRANSCRIPT_DIR_NAME: &str = "transcript_data";

/// Per-node transcript file name prefix, completed as
/// `transcript_received_<x>_<y>.csv`.
pub const TRANSCRIPT_FILE_PREFIX: &str = "transcript_received_";

// Named constants in the parameters package. Discovered read-only at
// campaign start.
pub const CONST_X_SIZE: &str = "x_size";
pub const CONST_Y_SIZE: &str = "y_size";
pub const CONST_PACKET_QTY: &str = "packet_qty";
pub const CONST_PERIOD_SIZE: &str = "period_size";

// Named constants mutated during the sweep.
pub const CONST_ACC_WEIGHT: &str = "acc_data_weight";
pub const CONST_APX_WEIGHT: &str = "apx_data_weight";
pub const CONST_PACKETS_PER_PERIOD: &str = "packets_per_period";
