//! Top-level sweep control loop.
//!
//! One [`Campaign`] owns one full sweep: weight scenarios outer,
//! injection rates inner. The loop is strictly sequential by design: the
//! configuration artifact is a single shared mutable resource the
//! simulator reads at startup, so concurrent points would race on it and
//! invalidate results.
//!
//! Stage order per point: patch rate and seeds, invoke the simulator,
//! harvest transcripts, clean the workspace. Once per weight scenario the
//! report workbook is written and the per-rate aggregates are cleared so
//! records never leak into the next scenario's report.

use std::path::{Path, PathBuf};

use crate::collect::ResultCollector;
use crate::config::{ConfigPatcher, SystemParams};
use crate::error::{Error, Result};
use crate::invoke::SimulationInvoker;
use crate::manifest::{CampaignManifest, FailurePolicy};
use crate::params::{InjectionRate, ParameterSpace};
use crate::report::{self, ReportBuilder};

/// Confirmation gates along the sweep. The driver itself never blocks on
/// user input; whoever runs the campaign installs a hook (the CLI
/// installs a stdin prompt, automated runs install nothing).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PausePoint {
    CampaignStart,
    /// The injection-rate == 1.00 point.
    SaturationRate,
}

pub type PauseHook = Box<dyn FnMut(PausePoint)>;

/// A point that failed under the `continue` policy, with the coordinates
/// needed to reproduce it without re-running the whole campaign.
#[derive(Debug)]
pub struct PointFailure {
    pub weight_idx: usize,
    pub rate_idx: usize,
    pub error: Error,
}

#[derive(Debug, Default)]
pub struct CampaignSummary {
    pub points_completed: usize,
    pub reports_written: Vec<PathBuf>,
    pub failures: Vec<PointFailure>,
}

/// One full sweep campaign against the external simulator.
pub struct Campaign {
    root: PathBuf,
    manifest: CampaignManifest,
    pause_hook: Option<PauseHook>,
}

impl Campaign {
    pub fn new<P: AsRef<Path>>(project_root: P, manifest: CampaignManifest) -> Self {
        Campaign {
            root: project_root.as_ref().to_path_buf(),
            manifest,
            pause_hook: None,
        }
    }

    pub fn set_pause_hook(&mut self, hook: PauseHook) {
        self.pause_hook = Some(hook);
    }

    /// Loads the sweep inputs and discovers the network parameters
    /// without touching the filesystem layout. Used by validation-only
    /// invocations.
    pub fn inspect(&self) -> Result<(ParameterSpace, SystemParams)> {
        let space = ParameterSpace::load(
            &self.root.join(&self.manifest.rates_file),
            &self.root.join(&self.manifest.weights_file),
        )?;
        let patcher = ConfigPatcher::new(&self.root, &self.manifest);
        let params = patcher.discover_params()?;
        Ok((space, params))
    }

    /// `PreparingEnvironment`: inputs validated before any mutation
    /// occurs, working directories created, stale artifacts cleared.
    fn prepare(&self) -> Result<(ParameterSpace, SystemParams)> {
        info!("preparing environment");
        let (space, params) = self.inspect()?;
        let collector = ResultCollector::new(&self.root);
        collector.ensure_dirs()?;
        collector.clean_campaign_start()?;

        info!("test type: weighted random");
        info!("network size: {} x {}", params.x_size, params.y_size);
        info!("packets to inject per node: {}", params.packet_qty);
        info!("ticks per period: {}", params.period_size);
        info!("injection rates to test: {}", space.rates.len());
        info!("weighted scenarios: {}", space.weights.len());
        Ok((space, params))
    }

    /// Runs the whole campaign. Campaign-fatal errors abort immediately;
    /// point-level failures are handled per the manifest's failure
    /// policy.
    pub fn run(&mut self) -> Result<CampaignSummary> {
        let (space, params) = self.prepare()?;
        self.pause(PausePoint::CampaignStart);

        let patcher = ConfigPatcher::new(&self.root, &self.manifest);
        let invoker = SimulationInvoker::new(&self.root, &self.manifest);
        let collector = ResultCollector::new(&self.root);
        let mut summary = CampaignSummary::default();

        for (weight_idx, weights) in space.weights.iter().enumerate() {
            info!(
                "accurate weight: {}%, approximate weight: {}%",
                weights.accurate, weights.approximate
            );
            patcher.apply_weights(weights)?;

            for (rate_idx, rate) in space.rates.iter().enumerate() {
                info!("current injection rate is {}", rate.label);
                let point_result = self.run_point(&patcher, &invoker, &collector, rate, &params);
                // workspace returns to the clean layout whether the
                // point completed or not
                collector.clean_point_artifacts()?;
                match point_result {
                    Ok(records) => {
                        debug!("point complete, {} records", records);
                        summary.points_completed += 1;
                    }
                    Err(e) => {
                        let e = e.at_point(weight_idx, rate_idx);
                        match self.manifest.on_point_failure {
                            FailurePolicy::FailFast => return Err(e),
                            FailurePolicy::Continue => {
                                error!("{}", e);
                                summary.failures.push(PointFailure {
                                    weight_idx,
                                    rate_idx,
                                    error: e,
                                });
                            }
                        }
                    }
                }
            }

            info!("creating report workbook");
            let builder = ReportBuilder::new(&params, &space.rates);
            let book = builder.build(weights, &collector)?;
            let path = self.root.join(ReportBuilder::file_name(weights));
            report::write_xlsx(&book, &path)?;
            summary.reports_written.push(path);
            collector.clean_aggregates()?;
        }

        info!(
            "campaign finished: {} points completed, {} failed",
            summary.points_completed,
            summary.failures.len()
        );
        Ok(summary)
    }

    fn run_point(
        &mut self,
        patcher: &ConfigPatcher,
        invoker: &SimulationInvoker,
        collector: &ResultCollector,
        rate: &InjectionRate,
        params: &SystemParams,
    ) -> Result<usize> {
        patcher.apply_rate(rate, params.period_size)?;
        patcher.reseed()?;
        invoker.run()?;
        if rate.is_saturation() {
            self.pause(PausePoint::SaturationRate);
        }
        collector.harvest(rate, params)
    }

    fn pause(&mut self, point: PausePoint) {
        if let Some(hook) = &mut self.pause_hook {
            hook(point);
        }
    }
}

// Stand-in simulator: a shell script producing one 5-record transcript
// per node of the 2x2 grid, like a real run would.
#[cfg(test)]
const FAKE_SIM: &str = "\
    for x in 0 1; do for y in 0 1; do \
        f=transcript_data/transcript_received_${x}_${y}.csv; \
        : > $f; \
        for i in 0 1 2 3 4; do echo \"$i,acc,$i,$((i+9)),$x,$y\" >> $f; done; \
    done; done";

// Same grid, but node (0,1) emits a non-numeric field in its second
// record.
#[cfg(test)]
const CORRUPT_SIM: &str = "\
    for x in 0 1; do for y in 0 1; do \
        f=transcript_data/transcript_received_${x}_${y}.csv; \
        : > $f; \
        for i in 0 1 2 3 4; do echo \"$i,acc,$i,$((i+9)),$x,$y\" >> $f; done; \
    done; done; \
    printf '0,acc,0,9,0,1\\n1,acc,two,11,0,1\\n' > transcript_data/transcript_received_0_1.csv";

#[cfg(test)]
fn fixture_root(
    sim_script: &str,
    policy: FailurePolicy,
    rates: &str,
) -> (tempfile::TempDir, CampaignManifest) {
    use crate::config::{DRIVER_FIXTURE, PARAMS_FIXTURE};

    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("injectionrates.dat"), rates).unwrap();
    std::fs::write(dir.path().join("weights.dat"), "80,20\n").unwrap();
    std::fs::write(dir.path().join("params.vhd"), PARAMS_FIXTURE).unwrap();
    std::fs::write(dir.path().join("driver.vhd"), DRIVER_FIXTURE).unwrap();
    let manifest = CampaignManifest {
        params_artifact: "params.vhd".to_string(),
        driver_artifact: "driver.vhd".to_string(),
        sim_command: "sh".to_string(),
        sim_args: vec!["-c".to_string(), sim_script.to_string()],
        on_point_failure: policy,
        ..Default::default()
    };
    (dir, manifest)
}

#[test]
fn full_campaign_end_to_end() {
    let (dir, manifest) = fixture_root(FAKE_SIM, FailurePolicy::FailFast, "0.10\n0.20\n");
    let mut campaign = Campaign::new(dir.path(), manifest);
    let summary = campaign.run().unwrap();

    assert_eq!(summary.points_completed, 2);
    assert!(summary.failures.is_empty());
    assert_eq!(summary.reports_written.len(), 1);
    let workbook = dir.path().join("results_mixed_weighted_acc80_apx20.xlsx");
    assert!(workbook.is_file());

    // aggregates cleared after the scenario's report, transcripts
    // cleared after every point
    assert_eq!(
        std::fs::read_dir(dir.path().join(crate::CSV_DATA_DIR_NAME))
            .unwrap()
            .count(),
        0
    );
    assert_eq!(
        std::fs::read_dir(dir.path().join(crate::TRANSCRIPT_DIR_NAME))
            .unwrap()
            .count(),
        0
    );

    // weights were committed to the artifact
    let params = std::fs::read_to_string(dir.path().join("params.vhd")).unwrap();
    assert!(params.contains("acc_data_weight : natural := 80;"));
    // rate 0.20 over a 100-tick period
    assert!(params.contains("packets_per_period : integer := 20;"));
}

#[test]
fn failing_simulator_fail_fast() {
    let (dir, manifest) = fixture_root("exit 3", FailurePolicy::FailFast, "0.10\n");
    let mut campaign = Campaign::new(dir.path(), manifest);
    match campaign.run() {
        Err(Error::Point {
            weight_idx: 0,
            rate_idx: 0,
            source,
        }) => assert!(matches!(*source, Error::SimulationFailed { code: Some(3) })),
        other => panic!("expected point failure, got {:?}", other.err()),
    }
}

#[test]
fn failing_simulator_continue_records_points() {
    let (dir, manifest) = fixture_root("exit 1", FailurePolicy::Continue, "0.10\n0.20\n");
    let mut campaign = Campaign::new(dir.path(), manifest);
    let summary = campaign.run().unwrap();

    assert_eq!(summary.points_completed, 0);
    assert_eq!(summary.failures.len(), 2);
    assert_eq!(summary.failures[1].rate_idx, 1);
    // the scenario report is still written, with empty rate sheets
    assert_eq!(summary.reports_written.len(), 1);
    assert!(summary.reports_written[0].is_file());
}

#[test]
fn corrupt_transcript_continue_keeps_aggregate_clean() {
    let (dir, manifest) = fixture_root(CORRUPT_SIM, FailurePolicy::Continue, "0.10\n");
    let mut campaign = Campaign::new(dir.path(), manifest);
    let summary = campaign.run().unwrap();

    assert_eq!(summary.points_completed, 0);
    assert_eq!(summary.failures.len(), 1);
    match &summary.failures[0].error {
        Error::Point { source, .. } => {
            assert!(matches!(**source, Error::MalformedTranscript { line: 2, .. }))
        }
        other => panic!("expected point failure, got {:?}", other),
    }
    // the valid nodes harvested before the corrupt one left nothing
    // behind, so the failed point's report sheet holds no data rows
    assert!(!dir
        .path()
        .join(crate::CSV_DATA_DIR_NAME)
        .join("results_0.10.csv")
        .is_file());
    assert_eq!(summary.reports_written.len(), 1);
    assert!(summary.reports_written[0].is_file());
}

#[test]
fn pause_gates_fire_at_start_and_saturation() {
    use std::sync::{Arc, Mutex};

    let (dir, manifest) = fixture_root(FAKE_SIM, FailurePolicy::FailFast, "0.10\n1.00\n");
    let mut campaign = Campaign::new(dir.path(), manifest);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_hook = seen.clone();
    campaign.set_pause_hook(Box::new(move |point| {
        seen_hook.lock().unwrap().push(point);
    }));
    campaign.run().unwrap();

    assert_eq!(
        *seen.lock().unwrap(),
        vec![PausePoint::CampaignStart, PausePoint::SaturationRate]
    );
}

#[test]
fn unreadable_inputs_abort_before_any_mutation() {
    use crate::config::PARAMS_FIXTURE;

    let (dir, manifest) = fixture_root(FAKE_SIM, FailurePolicy::FailFast, "0.10\n");
    std::fs::remove_file(dir.path().join("weights.dat")).unwrap();
    std::fs::write(dir.path().join("stale.csv"), "x\n").unwrap();
    let mut campaign = Campaign::new(dir.path(), manifest);

    let res = campaign.run();
    assert!(matches!(res, Err(Error::InputUnavailable { .. })));
    // nothing was cleaned or patched
    assert!(dir.path().join("stale.csv").is_file());
    let params = std::fs::read_to_string(dir.path().join("params.vhd")).unwrap();
    assert_eq!(params, PARAMS_FIXTURE);
}
