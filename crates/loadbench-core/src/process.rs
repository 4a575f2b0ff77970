//! Discovery and signalling of external processes by command-line pattern.

use std::collections::BTreeSet;
use std::process::Command;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{BenchError, Result};
use crate::types::{ManagedProcess, ProcessId, Signal};

// ---------------------------------------------------------------------------
// Capability traits
// ---------------------------------------------------------------------------

pub trait ProcessFinder {
    /// Live processes whose full command line contains `pattern`.
    /// No match is an empty set, not an error.
    fn find(&self, pattern: &str) -> Result<BTreeSet<ProcessId>>;
}

pub trait ProcessSignaler {
    /// A target that has already exited yields `BenchError::NoSuchProcess`.
    fn signal(&self, pid: ProcessId, signal: Signal) -> Result<()>;
}

pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

// ---------------------------------------------------------------------------
// Host implementations
// ---------------------------------------------------------------------------

/// `pgrep -f`, excluding this process. The pattern is matched as a literal
/// substring of the command line.
#[derive(Debug, Default, Clone, Copy)]
pub struct Pgrep;

impl ProcessFinder for Pgrep {
    fn find(&self, pattern: &str) -> Result<BTreeSet<ProcessId>> {
        let output = Command::new("pgrep")
            .args(["-f", "--", &regex::escape(pattern)])
            .output()
            .map_err(|e| BenchError::ProcessTable {
                pattern: pattern.to_string(),
                message: e.to_string(),
            })?;
        match output.status.code() {
            Some(0) => Ok(parse_pids(&String::from_utf8_lossy(&output.stdout))),
            // pgrep: 1 = nothing matched
            Some(1) => Ok(BTreeSet::new()),
            code => Err(BenchError::ProcessTable {
                pattern: pattern.to_string(),
                message: format!(
                    "pgrep exited with {code:?}: {}",
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            }),
        }
    }
}

fn parse_pids(stdout: &str) -> BTreeSet<ProcessId> {
    let own = std::process::id();
    stdout
        .lines()
        .filter_map(|l| l.trim().parse::<u32>().ok())
        .filter(|&pid| pid != own)
        .map(ProcessId)
        .collect()
}

/// `kill -<SIGNAL> <pid>`.
#[derive(Debug, Default, Clone, Copy)]
pub struct KillCommand;

impl ProcessSignaler for KillCommand {
    fn signal(&self, pid: ProcessId, signal: Signal) -> Result<()> {
        let output = Command::new("kill")
            .args([format!("-{}", signal.as_str()), pid.to_string()])
            .output()
            .map_err(|e| BenchError::SignalFailed {
                pid,
                message: e.to_string(),
            })?;
        if output.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.contains("No such process") {
            return Err(BenchError::NoSuchProcess(pid));
        }
        Err(BenchError::SignalFailed {
            pid,
            message: format!(
                "kill -{} exited with {:?}: {}",
                signal.as_str(),
                output.status.code(),
                stderr.trim()
            ),
        })
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

// ---------------------------------------------------------------------------
// ProcessController
// ---------------------------------------------------------------------------

/// What a best-effort stop of one process class did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopSummary {
    /// Every process a signal was issued to, in pid order.
    pub signaled: Vec<ManagedProcess>,
    /// Targets that were already gone when signalled.
    pub vanished: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrainSummary {
    pub graceful: StopSummary,
    pub forced: StopSummary,
    pub grace_period_secs: u64,
}

pub struct ProcessController {
    finder: Box<dyn ProcessFinder>,
    signaler: Box<dyn ProcessSignaler>,
    sleeper: Box<dyn Sleeper>,
}

impl ProcessController {
    pub fn new(
        finder: Box<dyn ProcessFinder>,
        signaler: Box<dyn ProcessSignaler>,
        sleeper: Box<dyn Sleeper>,
    ) -> Self {
        Self {
            finder,
            signaler,
            sleeper,
        }
    }

    pub fn find_processes(&self, pattern: &str) -> Result<BTreeSet<ProcessId>> {
        self.finder.find(pattern)
    }

    pub fn signal_process(&self, pid: ProcessId, signal: Signal) -> Result<()> {
        self.signaler.signal(pid, signal)
    }

    /// Fixed, uninterruptible delay.
    pub fn wait_grace_period(&self, duration: Duration) {
        tracing::info!(seconds = duration.as_secs(), "waiting grace period");
        self.sleeper.sleep(duration);
    }

    /// Signal every process matching `pattern`. Never fails: an unreadable
    /// process table counts as "nothing running" and per-process errors are
    /// logged.
    pub fn stop_matching(&self, pattern: &str, signal: Signal) -> StopSummary {
        let mut summary = StopSummary::default();
        let pids = match self.find_processes(pattern) {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(pattern, error = %e, "process lookup failed; treating as none running");
                return summary;
            }
        };
        if pids.is_empty() {
            tracing::info!(pattern, "no matching processes");
        }
        for pid in pids {
            match self.signal_process(pid, signal) {
                Ok(()) => tracing::info!(pattern, %pid, %signal, "signalled"),
                Err(BenchError::NoSuchProcess(_)) => {
                    tracing::warn!(pattern, %pid, "process already exited");
                    summary.vanished += 1;
                }
                Err(e) => tracing::warn!(pattern, %pid, error = %e, "signal failed"),
            }
            summary.signaled.push(ManagedProcess {
                pattern: pattern.to_string(),
                pid,
                signal,
            });
        }
        summary
    }

    /// SIGTERM every data sender, wait out the grace period, then SIGKILL
    /// every load generator.
    pub fn drain(
        &self,
        data_sender_pattern: &str,
        load_generator_pattern: &str,
        grace_period: Duration,
    ) -> DrainSummary {
        let graceful = self.stop_matching(data_sender_pattern, Signal::Term);
        self.wait_grace_period(grace_period);
        let forced = self.stop_matching(load_generator_pattern, Signal::Kill);
        DrainSummary {
            graceful,
            forced,
            grace_period_secs: grace_period.as_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::rc::Rc;

    #[derive(Debug, Clone, PartialEq)]
    enum Event {
        Find(String),
        Signal(u32, Signal),
        Sleep(Duration),
    }

    type Log = Rc<RefCell<Vec<Event>>>;

    struct Table {
        log: Log,
        procs: HashMap<String, Vec<u32>>,
        broken: bool,
    }

    impl ProcessFinder for Table {
        fn find(&self, pattern: &str) -> Result<BTreeSet<ProcessId>> {
            self.log.borrow_mut().push(Event::Find(pattern.into()));
            if self.broken {
                return Err(BenchError::ProcessTable {
                    pattern: pattern.into(),
                    message: "boom".into(),
                });
            }
            Ok(self
                .procs
                .get(pattern)
                .into_iter()
                .flatten()
                .map(|&p| ProcessId(p))
                .collect())
        }
    }

    struct Signals {
        log: Log,
        gone: Vec<u32>,
    }

    impl ProcessSignaler for Signals {
        fn signal(&self, pid: ProcessId, signal: Signal) -> Result<()> {
            self.log.borrow_mut().push(Event::Signal(pid.0, signal));
            if self.gone.contains(&pid.0) {
                return Err(BenchError::NoSuchProcess(pid));
            }
            Ok(())
        }
    }

    struct Clock(Log);

    impl Sleeper for Clock {
        fn sleep(&self, d: Duration) {
            self.0.borrow_mut().push(Event::Sleep(d));
        }
    }

    fn controller(procs: &[(&str, &[u32])], gone: &[u32], broken: bool) -> (ProcessController, Log) {
        let log: Log = Rc::new(RefCell::new(Vec::new()));
        let table = Table {
            log: log.clone(),
            procs: procs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_vec()))
                .collect(),
            broken,
        };
        let ctl = ProcessController::new(
            Box::new(table),
            Box::new(Signals {
                log: log.clone(),
                gone: gone.to_vec(),
            }),
            Box::new(Clock(log.clone())),
        );
        (ctl, log)
    }

    #[test]
    fn drain_with_no_processes_still_waits() {
        let (ctl, log) = controller(&[], &[], false);
        let summary = ctl.drain("send_data", "locust", Duration::from_secs(10));
        assert!(summary.graceful.signaled.is_empty());
        assert!(summary.forced.signaled.is_empty());
        assert_eq!(
            *log.borrow(),
            vec![
                Event::Find("send_data".into()),
                Event::Sleep(Duration::from_secs(10)),
                Event::Find("locust".into()),
            ]
        );
    }

    #[test]
    fn terms_precede_wait_and_kills_follow() {
        let (ctl, log) = controller(
            &[("send_data", &[30, 10, 20]), ("locust", &[40])],
            &[],
            false,
        );
        let summary = ctl.drain("send_data", "locust", Duration::from_secs(10));
        assert_eq!(summary.graceful.signaled.len(), 3);
        assert_eq!(summary.forced.signaled.len(), 1);

        let log = log.borrow();
        let sleep_at = log
            .iter()
            .position(|e| matches!(e, Event::Sleep(_)))
            .unwrap();
        let terms: Vec<usize> = log
            .iter()
            .enumerate()
            .filter(|(_, e)| matches!(e, Event::Signal(_, Signal::Term)))
            .map(|(i, _)| i)
            .collect();
        let kills: Vec<usize> = log
            .iter()
            .enumerate()
            .filter(|(_, e)| matches!(e, Event::Signal(_, Signal::Kill)))
            .map(|(i, _)| i)
            .collect();
        assert_eq!(terms.len(), 3);
        assert!(terms.iter().all(|&i| i < sleep_at));
        assert_eq!(kills.len(), 1);
        assert!(kills.iter().all(|&i| i > sleep_at));
    }

    #[test]
    fn vanished_targets_are_counted_not_fatal() {
        let (ctl, _log) = controller(&[("send_data", &[1, 2])], &[2], false);
        let summary = ctl.stop_matching("send_data", Signal::Term);
        assert_eq!(summary.signaled.len(), 2);
        assert_eq!(summary.vanished, 1);
    }

    #[test]
    fn broken_process_table_means_nothing_running() {
        let (ctl, log) = controller(&[], &[], true);
        let summary = ctl.drain("send_data", "locust", Duration::from_secs(1));
        assert_eq!(summary, DrainSummary {
            grace_period_secs: 1,
            ..Default::default()
        });
        assert!(log
            .borrow()
            .iter()
            .all(|e| !matches!(e, Event::Signal(..))));
    }

    #[test]
    fn parse_pids_skips_noise_and_self() {
        let own = std::process::id();
        let out = format!("12\n  34 \nnot-a-pid\n{own}\n");
        let pids = parse_pids(&out);
        assert_eq!(
            pids.into_iter().collect::<Vec<_>>(),
            vec![ProcessId(12), ProcessId(34)]
        );
    }

    #[cfg(unix)]
    #[test]
    fn pgrep_finds_a_live_process_and_kill_stops_it() {
        if which::which("pgrep").is_err() {
            return;
        }
        let mut child = Command::new("sleep").arg("37.25").spawn().unwrap();
        let pid = ProcessId(child.id());
        let found = Pgrep.find("sleep 37.25").unwrap();
        assert!(found.contains(&pid), "{found:?} should contain {pid}");

        KillCommand.signal(pid, Signal::Kill).unwrap();
        child.wait().unwrap();
        assert!(matches!(
            KillCommand.signal(pid, Signal::Term),
            Err(BenchError::NoSuchProcess(_)) | Err(BenchError::SignalFailed { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn pgrep_matches_metacharacters_literally() {
        if which::which("pgrep").is_err() {
            return;
        }
        let own = std::process::id();
        let plus = format!("lb-{own}-a+b-marker");
        let dotted = format!("lb-{own}-dotXmarker");
        let mut children: Vec<_> = [&plus, &dotted]
            .iter()
            .map(|marker| {
                Command::new("sh")
                    .args(["-c", &format!("sleep 30; : {marker}")])
                    .spawn()
                    .unwrap()
            })
            .collect();
        std::thread::sleep(Duration::from_millis(200));

        let found_plus = Pgrep.find(&plus);
        let found_dot = Pgrep.find(&format!("lb-{own}-dot.marker"));
        let found_paren = Pgrep.find(&format!("lb-{own}-(unbalanced"));
        for child in &mut children {
            let _ = child.kill();
            let _ = child.wait();
        }

        assert_eq!(
            found_plus.unwrap(),
            BTreeSet::from([ProcessId(children[0].id())])
        );
        assert!(found_dot.unwrap().is_empty());
        assert!(found_paren.unwrap().is_empty());
    }

    #[test]
    fn pgrep_with_no_match_is_empty() {
        if which::which("pgrep").is_err() {
            return;
        }
        let pids = Pgrep.find("__loadbench_nothing_matches_this__").unwrap();
        assert!(pids.is_empty());
    }
}
