//! Worker loop and concurrent runner
//!
//! A probe run fans out one OS thread per worker. Workers share nothing but
//! the gateway; each runs its iterations strictly one after another so every
//! key is fully resolved before the next is created. The runner joins every
//! worker before it aggregates anything.

use crate::config::CampaignConfig;
use crate::gateway::{GatewayError, ObjectGateway, Payloads};
use crate::probe::Probe;
use crate::report::{ProbeResult, WorkerFault};
use log::{error, info};
use std::thread;

/// What one worker observed
#[derive(Debug)]
pub struct WorkerOutcome {
    pub violations: u64,
    /// Iterations that finished, including any that found a violation
    pub completed: u64,
    /// Harness fault that stopped this worker early
    pub fault: Option<GatewayError>,
}

/// Run `iterations` iterations of `probe`, stopping at the first harness fault
pub fn worker_loop(probe: Probe, gateway: &dyn ObjectGateway, iterations: usize, payloads: &Payloads) -> WorkerOutcome {
    let mut outcome = WorkerOutcome { violations: 0, completed: 0, fault: None };

    for _ in 0..iterations {
        match probe.run_iteration(gateway, payloads) {
            Ok(verdict) => {
                outcome.completed += 1;
                if verdict.is_violation() {
                    outcome.violations += 1;
                }
            }
            Err(e) => {
                error!("harness fault in {} after {} iterations: {}", probe, outcome.completed, e);
                outcome.fault = Some(e);
                break;
            }
        }
    }

    info!("{} {}/{} failed", probe, outcome.violations, outcome.completed);
    outcome
}

/// Runs each probe across the configured number of workers
pub struct ConcurrentRunner<'a> {
    gateway: &'a dyn ObjectGateway,
    settings: CampaignConfig,
    payloads: Payloads,
}

impl<'a> ConcurrentRunner<'a> {
    /// Create a runner; `chunk_len` is the validated payload length
    pub fn new(gateway: &'a dyn ObjectGateway, settings: CampaignConfig, chunk_len: usize) -> Self {
        Self {
            gateway,
            settings,
            payloads: Payloads::zeroed(chunk_len),
        }
    }

    /// Run `probe` on every worker and aggregate once all of them are done
    pub fn run(&self, probe: Probe) -> ProbeResult {
        let workers = self.settings.workers;
        let iterations = self.settings.iterations;

        let outcomes: Vec<Result<WorkerOutcome, String>> = thread::scope(|scope| {
            let handles: Vec<_> = (0..workers)
                .map(|index| {
                    let payloads = &self.payloads;
                    let gateway = self.gateway;
                    thread::Builder::new()
                        .name(format!("{}-{}", probe, index))
                        .spawn_scoped(scope, move || {
                            log_mdc::insert("probe", probe.name());
                            log_mdc::insert("worker", index.to_string());
                            let outcome = worker_loop(probe, gateway, iterations, payloads);
                            log_mdc::clear();
                            outcome
                        })
                })
                .collect();

            handles
                .into_iter()
                .map(|spawned| match spawned {
                    Ok(handle) => handle.join().map_err(|_| "worker thread panicked".to_string()),
                    Err(e) => Err(format!("failed to spawn worker thread: {}", e)),
                })
                .collect()
        });

        let result = aggregate(probe, &self.settings, outcomes);
        for fault in &result.faults {
            error!(
                "{} worker {} aborted after {} iterations: {}",
                probe, fault.worker, fault.completed, fault.message
            );
        }
        info!("{}", result.table_row());
        result
    }
}

/// Fold per-worker outcomes (indexed by worker) into one result. A worker
/// that never reported back counts as a fault with nothing completed.
fn aggregate(probe: Probe, settings: &CampaignConfig, outcomes: Vec<Result<WorkerOutcome, String>>) -> ProbeResult {
    let mut violations = 0;
    let mut completed = 0;
    let mut faults = Vec::new();

    for (worker, outcome) in outcomes.into_iter().enumerate() {
        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(message) => {
                faults.push(WorkerFault { worker, completed: 0, message });
                continue;
            }
        };
        violations += outcome.violations;
        completed += outcome.completed;
        if let Some(fault) = outcome.fault {
            faults.push(WorkerFault {
                worker,
                completed: outcome.completed,
                message: fault.to_string(),
            });
        }
    }

    ProbeResult {
        probe,
        attempted: settings.attempts_per_probe(),
        completed,
        violations,
        faults,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::mock_store::{Consistency, MockGateway};
    use std::collections::HashSet;

    fn settings(iterations: usize, workers: usize) -> CampaignConfig {
        CampaignConfig { iterations, workers, chunk_size: 1 }
    }

    #[test]
    fn test_worker_loop_counts_every_iteration() {
        let gateway = MockGateway::with_consistency(Consistency::StaleDeletes);
        let outcome = worker_loop(Probe::ReadAfterDelete, &gateway, 4, &Payloads::zeroed(1));
        assert_eq!(outcome.completed, 4);
        assert_eq!(outcome.violations, 4);
        assert!(outcome.fault.is_none());
    }

    #[test]
    fn test_worker_loop_stops_at_first_fault() {
        // read_after_delete makes 3 calls per iteration; call 5 is in iteration 2
        let gateway = MockGateway::new().fail_on_call(5);
        let outcome = worker_loop(Probe::ReadAfterDelete, &gateway, 4, &Payloads::zeroed(1));
        assert_eq!(outcome.completed, 1);
        assert_eq!(outcome.violations, 0);
        assert!(outcome.fault.is_some());
        // the failed DELETE is followed by one cleanup DELETE, then the worker stops
        assert_eq!(gateway.call_count(), 6);
        assert_eq!(gateway.object_count(), 0);
    }

    #[test]
    fn test_attempted_is_iterations_times_workers() {
        let gateway = MockGateway::new();
        for (iterations, workers) in [(1, 1), (3, 2), (5, 5), (2, 7)] {
            let runner = ConcurrentRunner::new(&gateway, settings(iterations, workers), 1);
            let result = runner.run(Probe::ListAfterCreate);
            assert_eq!(result.attempted, (iterations * workers) as u64);
            assert_eq!(result.completed, result.attempted);
            assert_eq!(result.violations, 0);
            assert!(!result.is_incomplete());
        }
    }

    #[test]
    fn test_stale_store_violations_bounded_by_attempted() {
        let gateway = MockGateway::with_consistency(Consistency::StaleDeletes);
        let runner = ConcurrentRunner::new(&gateway, settings(3, 4), 1);
        for probe in Probe::ALL {
            let result = runner.run(probe);
            assert!(result.violations <= result.attempted, "{}", probe);
        }
        assert_eq!(runner.run(Probe::ReadAfterDelete).violations, 12);
    }

    #[test]
    fn test_keys_are_unique_across_workers() {
        let gateway = MockGateway::new();
        let runner = ConcurrentRunner::new(&gateway, settings(5, 5), 1);
        runner.run(Probe::ReadAfterCreate);

        let log = gateway.put_log();
        let distinct: HashSet<_> = log.iter().collect();
        assert_eq!(log.len(), 25);
        assert_eq!(distinct.len(), 25);
        assert_eq!(gateway.object_count(), 0);
    }

    #[test]
    fn test_fault_marks_result_incomplete() {
        let gateway = MockGateway::new().fail_on_call(3);
        let runner = ConcurrentRunner::new(&gateway, settings(3, 2), 1);
        let result = runner.run(Probe::ReadAfterOverwrite);

        assert!(result.is_incomplete());
        assert_eq!(result.faults.len(), 1);
        assert_eq!(result.attempted, 6);
        assert!(result.completed < 6);
        assert_eq!(result.violations, 0);
        assert!(result.faults[0].message.contains("injected fault"));
    }

    #[test]
    fn test_lost_worker_is_reported_as_fault() {
        let outcomes = vec![
            Ok(WorkerOutcome { violations: 1, completed: 3, fault: None }),
            Err("worker thread panicked".to_string()),
        ];
        let result = aggregate(Probe::ListAfterDelete, &settings(3, 2), outcomes);
        assert_eq!(result.attempted, 6);
        assert_eq!(result.completed, 3);
        assert_eq!(result.violations, 1);
        assert_eq!(
            result.faults,
            vec![WorkerFault { worker: 1, completed: 0, message: "worker thread panicked".to_string() }]
        );
    }
}
