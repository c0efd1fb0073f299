//! Blocking invocation of the external simulator.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::{Error, Result};
use crate::manifest::CampaignManifest;

const POLL_WAIT: Duration = Duration::from_millis(100);

/// Launches one simulator run and blocks until it exits.
///
/// The simulator's own console output is not part of this system's
/// observable contract and is discarded. The wait is bounded: if a time
/// limit is configured and the child outlives it, the child is killed
/// and the run fails deterministically instead of hanging the campaign.
pub struct SimulationInvoker {
    command: String,
    args: Vec<String>,
    cwd: PathBuf,
    timeout: Option<Duration>,
}

impl SimulationInvoker {
    pub fn new(project_root: &Path, manifest: &CampaignManifest) -> Self {
        SimulationInvoker {
            command: manifest.sim_command.clone(),
            args: manifest.sim_args.clone(),
            cwd: project_root.to_path_buf(),
            timeout: manifest.timeout_secs.map(Duration::from_secs),
        }
    }

    /// Runs the simulator once. Non-zero exit is a
    /// [`Error::SimulationFailed`], a breached time limit a
    /// [`Error::SimulationTimeout`].
    pub fn run(&self) -> Result<()> {
        debug!("launching simulator: {} {:?}", self.command, self.args);
        let mut child = Command::new(&self.command)
            .args(&self.args)
            .current_dir(&self.cwd)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;

        let started = Instant::now();
        loop {
            if let Some(status) = child.try_wait()? {
                return if status.success() {
                    Ok(())
                } else {
                    Err(Error::SimulationFailed {
                        code: status.code(),
                    })
                };
            }
            if let Some(limit) = self.timeout {
                if started.elapsed() >= limit {
                    warn!("simulator exceeded {}s limit, killing", limit.as_secs());
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(Error::SimulationTimeout {
                        seconds: limit.as_secs(),
                    });
                }
            }
            thread::sleep(POLL_WAIT);
        }
    }
}

#[cfg(test)]
fn invoker(cmd: &str, args: &[&str], timeout: Option<u64>) -> SimulationInvoker {
    SimulationInvoker {
        command: cmd.to_string(),
        args: args.iter().map(|s| s.to_string()).collect(),
        cwd: std::env::temp_dir(),
        timeout: timeout.map(Duration::from_secs),
    }
}

#[test]
fn clean_exit_is_ok() {
    assert!(invoker("true", &[], None).run().is_ok());
}

#[test]
fn nonzero_exit_is_surfaced() {
    let res = invoker("false", &[], None).run();
    assert!(matches!(res, Err(Error::SimulationFailed { .. })));
}

#[test]
fn hung_simulator_is_killed() {
    let res = invoker("sleep", &["30"], Some(1)).run();
    assert!(matches!(res, Err(Error::SimulationTimeout { seconds: 1 })));
}
