//! Consistency probes
//!
//! Each probe encodes one consistency expectation. A single iteration
//! creates a fresh object, mutates or deletes it, checks what the store
//! reports back, and removes whatever it may have left behind.
//!
//! Only `NotFound` is an observation. Every other gateway failure is
//! returned to the caller and never counted as a violation.

use crate::gateway::{GatewayResult, ObjectGateway, ObjectKey, Payloads};
use log::{debug, error, warn};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Verdict of one probe iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    Consistent,
    Violation,
}

impl ProbeOutcome {
    fn violation_if(condition: bool) -> Self {
        if condition {
            ProbeOutcome::Violation
        } else {
            ProbeOutcome::Consistent
        }
    }

    pub fn is_violation(self) -> bool {
        self == ProbeOutcome::Violation
    }
}

/// The five access patterns under test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Probe {
    ReadAfterDelete,
    ReadAfterCreate,
    ReadAfterOverwrite,
    ListAfterCreate,
    ListAfterDelete,
}

impl Probe {
    /// Campaign execution order. Kept stable so logs diff cleanly across runs.
    pub const ALL: [Probe; 5] = [
        Probe::ReadAfterDelete,
        Probe::ReadAfterCreate,
        Probe::ReadAfterOverwrite,
        Probe::ListAfterCreate,
        Probe::ListAfterDelete,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Probe::ReadAfterDelete => "read_after_delete",
            Probe::ReadAfterCreate => "read_after_create",
            Probe::ReadAfterOverwrite => "read_after_overwrite",
            Probe::ListAfterCreate => "list_after_create",
            Probe::ListAfterDelete => "list_after_delete",
        }
    }

    /// True for probes whose object should still exist once the checks pass
    fn leaves_object(self) -> bool {
        matches!(self, Probe::ReadAfterCreate | Probe::ReadAfterOverwrite | Probe::ListAfterCreate)
    }

    /// Run one iteration against `gateway` with a freshly generated key.
    ///
    /// The key is deleted afterwards whenever it may still exist: after a
    /// passing create or overwrite check, after a violation, and after any
    /// fault. A fault in that cleanup delete is only logged when the
    /// iteration had already failed.
    pub fn run_iteration(self, gateway: &dyn ObjectGateway, payloads: &Payloads) -> GatewayResult<ProbeOutcome> {
        let key = ObjectKey::generate();
        let checked = match self {
            Probe::ReadAfterCreate => read_after_create(gateway, &key, payloads),
            Probe::ReadAfterDelete => read_after_delete(gateway, &key, payloads),
            Probe::ReadAfterOverwrite => read_after_overwrite(gateway, &key, payloads),
            Probe::ListAfterCreate => list_after_create(gateway, &key, payloads),
            Probe::ListAfterDelete => list_after_delete(gateway, &key, payloads),
        };

        let outcome = match checked {
            Ok(outcome) => outcome,
            Err(e) => {
                if let Err(cleanup) = gateway.delete(&key) {
                    error!("{}: cleanup of {} failed after {}: {}", self, key, e, cleanup);
                }
                return Err(e);
            }
        };

        if outcome.is_violation() {
            warn!("consistency violation: {} on object {}", self, key);
        }
        if self.leaves_object() || outcome.is_violation() {
            gateway.delete(&key)?;
        }
        Ok(outcome)
    }
}

impl fmt::Display for Probe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn read_after_create(gateway: &dyn ObjectGateway, key: &ObjectKey, payloads: &Payloads) -> GatewayResult<ProbeOutcome> {
    gateway.put(key, payloads.base.clone())?;
    let found = gateway.lookup(key)?;
    if found.is_none() {
        debug!("read_after_create: expected {} to be readable", key);
    }
    Ok(ProbeOutcome::violation_if(found.is_none()))
}

fn read_after_delete(gateway: &dyn ObjectGateway, key: &ObjectKey, payloads: &Payloads) -> GatewayResult<ProbeOutcome> {
    gateway.put(key, payloads.base.clone())?;
    gateway.delete(key)?;
    let still_readable = gateway.lookup(key)?.is_some();
    if still_readable {
        debug!("read_after_delete: {} still readable after delete", key);
    }
    Ok(ProbeOutcome::violation_if(still_readable))
}

fn read_after_overwrite(gateway: &dyn ObjectGateway, key: &ObjectKey, payloads: &Payloads) -> GatewayResult<ProbeOutcome> {
    gateway.put(key, payloads.base.clone())?;
    gateway.put(key, payloads.overwrite.clone())?;
    let expected = payloads.overwrite.len();
    let actual = gateway.lookup(key)?.map(|body| body.len());
    if actual != Some(expected) {
        debug!(
            "read_after_overwrite: expected {} bytes for {}, got {:?}",
            expected, key, actual
        );
    }
    Ok(ProbeOutcome::violation_if(actual != Some(expected)))
}

fn list_after_create(gateway: &dyn ObjectGateway, key: &ObjectKey, payloads: &Payloads) -> GatewayResult<ProbeOutcome> {
    gateway.put(key, payloads.base.clone())?;
    let listed = gateway.list()?.contains(key);
    if !listed {
        debug!("list_after_create: expected {} to be listed", key);
    }
    Ok(ProbeOutcome::violation_if(!listed))
}

fn list_after_delete(gateway: &dyn ObjectGateway, key: &ObjectKey, payloads: &Payloads) -> GatewayResult<ProbeOutcome> {
    gateway.put(key, payloads.base.clone())?;
    gateway.delete(key)?;
    let listed = gateway.list()?.contains(key);
    if listed {
        debug!("list_after_delete: {} still listed after delete", key);
    }
    Ok(ProbeOutcome::violation_if(listed))
}
