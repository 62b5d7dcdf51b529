//! Probe results and the campaign summary

use crate::config::CampaignConfig;
use crate::probe::Probe;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;

/// Harness fault that stopped one worker early
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerFault {
    /// Index of the worker inside its probe run
    pub worker: usize,
    /// Iterations the worker finished before the fault
    pub completed: u64,
    pub message: String,
}

/// Aggregate over one probe run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeResult {
    pub probe: Probe,
    /// iterations x workers, regardless of faults
    pub attempted: u64,
    /// Iterations that ran to completion
    pub completed: u64,
    pub violations: u64,
    pub faults: Vec<WorkerFault>,
}

impl ProbeResult {
    /// Violations as a percentage of attempted iterations
    pub fn violation_rate(&self) -> f64 {
        if self.attempted == 0 {
            return 0.0;
        }
        self.violations as f64 / self.attempted as f64 * 100.0
    }

    /// True when any worker faulted, so the counts are partial
    pub fn is_incomplete(&self) -> bool {
        !self.faults.is_empty()
    }

    fn status(&self) -> String {
        if self.is_incomplete() {
            format!(
                "INCOMPLETE ({} worker faults, {}/{} completed)",
                self.faults.len(),
                self.completed,
                self.attempted
            )
        } else {
            "ok".to_string()
        }
    }

    /// The historical log row: `name | attempted | errors | pct`
    pub fn table_row(&self) -> String {
        format!(
            "{:30} | {:10} | {:6} | {:8.4} | {}",
            self.probe.name(),
            self.attempted,
            self.violations,
            self.violation_rate(),
            self.status()
        )
    }
}

/// Compact form, e.g. `read_after_delete: 6/0/0.0%`
impl fmt::Display for ProbeResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {}/{}/{:.1}%",
            self.probe.name(),
            self.attempted,
            self.violations,
            self.violation_rate()
        )?;
        if self.is_incomplete() {
            f.write_str(" [incomplete]")?;
        }
        Ok(())
    }
}

/// Results of one campaign, in execution order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignReport {
    pub settings: CampaignConfig,
    pub target: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub results: Vec<ProbeResult>,
}

impl CampaignReport {
    pub fn result(&self, probe: Probe) -> Option<&ProbeResult> {
        self.results.iter().find(|result| result.probe == probe)
    }

    pub fn incomplete_probes(&self) -> Vec<Probe> {
        self.results
            .iter()
            .filter(|result| result.is_incomplete())
            .map(|result| result.probe)
            .collect()
    }

    pub fn total_violations(&self) -> u64 {
        self.results.iter().map(|result| result.violations).sum()
    }

    /// Write the report as pretty-printed JSON
    pub fn write_json(&self, path: &Path) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)
    }
}

impl fmt::Display for CampaignReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Summary of Results:")?;
        writeln!(
            f,
            "{:30} | {:10} | {:6} | {:8} | {}",
            "Test Name", "Iterations", "Errors", "Error %", "Status"
        )?;
        writeln!(f, "{}", "-".repeat(80))?;
        for result in &self.results {
            writeln!(f, "{}", result.table_row())?;
        }
        let incomplete = self.incomplete_probes();
        if !incomplete.is_empty() {
            let names: Vec<&str> = incomplete.iter().map(|probe| probe.name()).collect();
            writeln!(
                f,
                "\nWARNING: {} aborted on harness faults; their counts are partial, not a clean run.",
                names.join(", ")
            )?;
        }
        Ok(())
    }
}
