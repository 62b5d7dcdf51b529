//! Campaign orchestration
//!
//! Owns the gateway handle, runs every probe in the fixed order and builds
//! the report. Also provides the bucket clean mode.

use crate::config::CampaignConfig;
use crate::gateway::{GatewayResult, ObjectGateway};
use crate::probe::Probe;
use crate::report::CampaignReport;
use crate::runner::ConcurrentRunner;
use chrono::Utc;
use log::{debug, info, warn};
use std::sync::Arc;

/// One full run of all five probes under a shared configuration
pub struct Campaign {
    gateway: Arc<dyn ObjectGateway>,
    settings: CampaignConfig,
    chunk_len: usize,
}

impl Campaign {
    /// Create a campaign. `chunk_len` is the payload length returned by
    /// [`crate::config::AppConfig::validate`].
    pub fn new(gateway: Arc<dyn ObjectGateway>, settings: CampaignConfig, chunk_len: usize) -> Self {
        Self { gateway, settings, chunk_len }
    }

    pub fn gateway(&self) -> &Arc<dyn ObjectGateway> {
        &self.gateway
    }

    /// List the bucket once to prove it is reachable before any probe runs
    pub fn preflight(&self) -> GatewayResult<()> {
        let existing = self.gateway.list()?;
        if !existing.is_empty() {
            warn!(
                "{} already holds {} objects; listings will include them",
                self.gateway.describe(),
                existing.len()
            );
        }
        Ok(())
    }

    /// Run every probe in order. Probes that hit harness faults are reported
    /// as incomplete; the remaining probes still run.
    pub fn run(&self) -> CampaignReport {
        let started_at = Utc::now();
        info!(
            "Starting campaign against {}: iterations={}, workers={}, chunk_size={}",
            self.gateway.describe(),
            self.settings.iterations,
            self.settings.workers,
            self.chunk_len
        );

        let runner = ConcurrentRunner::new(self.gateway.as_ref(), self.settings.clone(), self.chunk_len);
        let results = Probe::ALL.iter().map(|&probe| runner.run(probe)).collect();

        CampaignReport {
            settings: self.settings.clone(),
            target: self.gateway.describe(),
            started_at,
            finished_at: Utc::now(),
            results,
        }
    }
}

/// Delete every object in the bucket, returning how many were deleted
pub fn clean_bucket(gateway: &dyn ObjectGateway) -> GatewayResult<usize> {
    let keys = gateway.list()?;
    info!("Cleaning {}: {} objects", gateway.describe(), keys.len());
    for key in &keys {
        gateway.delete(key)?;
        debug!("DELETE object {}", key);
    }
    Ok(keys.len())
}
