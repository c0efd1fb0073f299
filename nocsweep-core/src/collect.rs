//! Transcript harvesting and workspace cleanup.
//!
//! After each simulator run one transcript CSV per node sits in
//! `transcript_data/`. Harvesting walks the node grid X-major/Y-minor and
//! appends every record, verbatim and validated, to the per-rate
//! aggregate under `csv_data/`. Cleanup restores the filesystem layout a
//! fresh run expects; it is idempotent.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::config::SystemParams;
use crate::error::{Error, Result};
use crate::params::InjectionRate;
use crate::util::{read_text_file, remove_files_with_extension};
use crate::{CSV_DATA_DIR_NAME, TRANSCRIPT_DIR_NAME, TRANSCRIPT_FILE_PREFIX};

/// One transcript row. Latency is derived, never stored as a literal.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionRecord {
    pub id: i64,
    /// Traffic class tag, passed through uninterpreted.
    pub kind: String,
    pub sent_tick: i64,
    pub received_tick: i64,
    pub recv_x: i64,
    pub recv_y: i64,
}

impl TransactionRecord {
    /// Parses one CSV line. Returns the failure reason on malformed
    /// input; the caller owns the file/line context.
    pub fn parse(line: &str) -> core::result::Result<Self, String> {
        let fields: Vec<&str> = line.trim_end().split(',').collect();
        if fields.len() != 6 {
            return Err(format!("expected 6 columns, found {}", fields.len()));
        }
        let num = |idx: usize| -> core::result::Result<i64, String> {
            fields[idx]
                .trim()
                .parse()
                .map_err(|e| format!("column {} `{}`: {}", idx + 1, fields[idx], e))
        };
        Ok(TransactionRecord {
            id: num(0)?,
            kind: fields[1].trim().to_string(),
            sent_tick: num(2)?,
            received_tick: num(3)?,
            recv_x: num(4)?,
            recv_y: num(5)?,
        })
    }

    pub fn latency(&self) -> i64 {
        self.received_tick - self.sent_tick
    }
}

/// Harvests per-node transcripts and keeps the workspace clean between
/// runs.
pub struct ResultCollector {
    project_root: PathBuf,
}

impl ResultCollector {
    pub fn new(project_root: &Path) -> Self {
        ResultCollector {
            project_root: project_root.to_path_buf(),
        }
    }

    pub fn transcript_dir(&self) -> PathBuf {
        self.project_root.join(TRANSCRIPT_DIR_NAME)
    }

    pub fn csv_data_dir(&self) -> PathBuf {
        self.project_root.join(CSV_DATA_DIR_NAME)
    }

    pub fn aggregate_path(&self, rate: &InjectionRate) -> PathBuf {
        self.csv_data_dir()
            .join(format!("results_{}.csv", rate.label))
    }

    fn transcript_path(&self, x: u32, y: u32) -> PathBuf {
        self.transcript_dir()
            .join(format!("{}{}_{}.csv", TRANSCRIPT_FILE_PREFIX, x, y))
    }

    /// Creates the working directories. An already existing directory is
    /// logged and not an error.
    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in &[self.csv_data_dir(), self.transcript_dir()] {
            match std::fs::create_dir(dir) {
                Ok(_) => debug!("created directory {:?}", dir),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    info!("directory {:?} already exists", dir)
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    /// Appends every node's transcript for the just-completed run to the
    /// per-rate aggregate, in X-major/Y-minor node order. Every transcript
    /// is read and validated before the aggregate is touched: a missing or
    /// malformed transcript aborts this point's aggregation with nothing
    /// appended, rather than silently producing a truncated aggregate.
    /// Returns the number of records appended.
    pub fn harvest(&self, rate: &InjectionRate, params: &SystemParams) -> Result<usize> {
        let mut lines: Vec<String> = Vec::with_capacity(params.expected_records());
        for x in 0..params.x_size {
            for y in 0..params.y_size {
                let path = self.transcript_path(x, y);
                let content = read_text_file(&path).map_err(|_| Error::MissingTranscript {
                    x,
                    y,
                    path: path.to_string_lossy().to_string(),
                })?;
                for (line_no, line) in content.lines().enumerate() {
                    if line.trim().is_empty() {
                        continue;
                    }
                    TransactionRecord::parse(line).map_err(|reason| {
                        Error::MalformedTranscript {
                            path: path.to_string_lossy().to_string(),
                            line: line_no + 1,
                            reason,
                        }
                    })?;
                    lines.push(line.trim_end().to_string());
                }
            }
        }
        if lines.len() != params.expected_records() {
            return Err(Error::RecordCountMismatch {
                rate: rate.label.clone(),
                expected: params.expected_records(),
                found: lines.len(),
            });
        }

        let mut aggregate = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.aggregate_path(rate))?;
        for line in &lines {
            writeln!(aggregate, "{}", line)?;
        }
        aggregate.sync_all()?;

        info!("harvested {} records for rate {}", lines.len(), rate.label);
        Ok(lines.len())
    }

    /// Reads one rate's aggregate back as records, in aggregate order.
    pub fn read_aggregate(&self, rate: &InjectionRate) -> Result<Vec<TransactionRecord>> {
        let path = self.aggregate_path(rate);
        let content = read_text_file(&path)?;
        let mut records = Vec::new();
        for (line_no, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let record =
                TransactionRecord::parse(line).map_err(|reason| Error::MalformedTranscript {
                    path: path.to_string_lossy().to_string(),
                    line: line_no + 1,
                    reason,
                })?;
            records.push(record);
        }
        Ok(records)
    }

    /// Removes the transient artifacts of one run: transcript CSVs,
    /// top-level scratch CSVs and simulator binary logs.
    pub fn clean_point_artifacts(&self) -> Result<()> {
        let mut removed = remove_files_with_extension(&self.transcript_dir(), &["csv"])?;
        removed += remove_files_with_extension(&self.project_root, &["csv", "wlf"])?;
        debug!("point cleanup removed {} files", removed);
        Ok(())
    }

    /// Campaign-start cleanup: everything a previous campaign may have
    /// left behind, stale aggregates and workbooks included.
    pub fn clean_campaign_start(&self) -> Result<()> {
        self.clean_point_artifacts()?;
        self.clean_aggregates()?;
        remove_files_with_extension(&self.project_root, &["xlsx"])?;
        Ok(())
    }

    /// Clears the per-rate aggregates. Run between weight scenarios so
    /// one scenario's records never leak into the next scenario's report.
    pub fn clean_aggregates(&self) -> Result<()> {
        remove_files_with_extension(&self.csv_data_dir(), &["csv"])?;
        Ok(())
    }
}

#[cfg(test)]
fn write_transcripts(root: &Path, params: &SystemParams) {
    let dir = root.join(TRANSCRIPT_DIR_NAME);
    for x in 0..params.x_size {
        for y in 0..params.y_size {
            let mut content = String::new();
            for i in 0..params.packet_qty {
                content.push_str(&format!("{},acc,{},{},{},{}\n", i, i * 2, i * 2 + 7, x, y));
            }
            std::fs::write(
                dir.join(format!("{}{}_{}.csv", TRANSCRIPT_FILE_PREFIX, x, y)),
                content,
            )
            .unwrap();
        }
    }
}

#[cfg(test)]
fn test_params() -> SystemParams {
    SystemParams {
        x_size: 2,
        y_size: 2,
        packet_qty: 5,
        period_size: 100,
    }
}

#[cfg(test)]
fn test_rate() -> InjectionRate {
    InjectionRate {
        label: "0.10".to_string(),
        value: 0.1,
    }
}

#[test]
fn harvest_collects_all_nodes_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let collector = ResultCollector::new(dir.path());
    collector.ensure_dirs().unwrap();
    write_transcripts(dir.path(), &test_params());

    let count = collector.harvest(&test_rate(), &test_params()).unwrap();
    assert_eq!(count, 20);

    let records = collector.read_aggregate(&test_rate()).unwrap();
    assert_eq!(records.len(), 20);
    // X-major, Y-minor: node (0,0) first, then (0,1), (1,0), (1,1)
    assert_eq!((records[0].recv_x, records[0].recv_y), (0, 0));
    assert_eq!((records[5].recv_x, records[5].recv_y), (0, 1));
    assert_eq!((records[10].recv_x, records[10].recv_y), (1, 0));
    assert_eq!((records[15].recv_x, records[15].recv_y), (1, 1));
    assert_eq!(records[3].latency(), 7);
}

#[test]
fn missing_transcript_identifies_node() {
    let dir = tempfile::tempdir().unwrap();
    let collector = ResultCollector::new(dir.path());
    collector.ensure_dirs().unwrap();
    write_transcripts(dir.path(), &test_params());
    std::fs::remove_file(collector.transcript_path(1, 0)).unwrap();

    let res = collector.harvest(&test_rate(), &test_params());
    assert!(matches!(res, Err(Error::MissingTranscript { x: 1, y: 0, .. })));
}

#[test]
fn corrupt_transcript_identifies_line() {
    let dir = tempfile::tempdir().unwrap();
    let collector = ResultCollector::new(dir.path());
    collector.ensure_dirs().unwrap();
    write_transcripts(dir.path(), &test_params());
    std::fs::write(
        collector.transcript_path(0, 1),
        "0,acc,0,7,0,1\n1,acc,two,9,0,1\n2,acc,4,11,0,1\n3,acc,6,13,0,1\n4,acc,8,15,0,1\n",
    )
    .unwrap();

    match collector.harvest(&test_rate(), &test_params()) {
        Err(Error::MalformedTranscript { line, path, .. }) => {
            assert_eq!(line, 2);
            assert!(path.contains("transcript_received_0_1"));
        }
        other => panic!("expected MalformedTranscript, got {:?}", other.err()),
    }
}

#[test]
fn failed_harvest_leaves_no_partial_aggregate() {
    let dir = tempfile::tempdir().unwrap();
    let collector = ResultCollector::new(dir.path());
    collector.ensure_dirs().unwrap();
    write_transcripts(dir.path(), &test_params());
    // node (0,1) is corrupt, but nodes before it in traversal order were
    // valid; none of their records may reach the aggregate
    std::fs::write(
        collector.transcript_path(0, 1),
        "0,acc,0,7,0,1\n1,acc,two,9,0,1\n",
    )
    .unwrap();

    let res = collector.harvest(&test_rate(), &test_params());
    assert!(matches!(res, Err(Error::MalformedTranscript { .. })));
    assert!(!collector.aggregate_path(&test_rate()).is_file());
}

#[test]
fn short_transcript_breaks_count_invariant() {
    let dir = tempfile::tempdir().unwrap();
    let collector = ResultCollector::new(dir.path());
    collector.ensure_dirs().unwrap();
    write_transcripts(dir.path(), &test_params());
    std::fs::write(collector.transcript_path(1, 1), "0,acc,0,7,1,1\n").unwrap();

    let res = collector.harvest(&test_rate(), &test_params());
    assert!(matches!(
        res,
        Err(Error::RecordCountMismatch {
            expected: 20,
            found: 16,
            ..
        })
    ));
}

#[test]
fn cleanup_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let collector = ResultCollector::new(dir.path());
    collector.ensure_dirs().unwrap();
    write_transcripts(dir.path(), &test_params());
    std::fs::write(dir.path().join("scratch.csv"), "x\n").unwrap();
    std::fs::write(dir.path().join("vsim.wlf"), "x").unwrap();
    std::fs::write(dir.path().join("old.xlsx"), "x").unwrap();
    std::fs::write(dir.path().join("keep.vhd"), "x").unwrap();

    collector.clean_campaign_start().unwrap();
    let state_once: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    collector.clean_campaign_start().unwrap();
    let state_twice: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();

    assert_eq!(state_once, state_twice);
    assert!(dir.path().join("keep.vhd").is_file());
    assert!(!dir.path().join("scratch.csv").exists());
    assert!(!dir.path().join("vsim.wlf").exists());
    assert!(!dir.path().join("old.xlsx").exists());
    assert_eq!(
        std::fs::read_dir(collector.transcript_dir()).unwrap().count(),
        0
    );
}

#[test]
fn ensure_dirs_tolerates_existing() {
    let dir = tempfile::tempdir().unwrap();
    let collector = ResultCollector::new(dir.path());
    collector.ensure_dirs().unwrap();
    collector.ensure_dirs().unwrap();
}
