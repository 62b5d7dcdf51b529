//! Mock implementation of ObjectGateway for testing and dry runs

use crate::gateway::{GatewayError, GatewayResult, ObjectGateway, ObjectKey, Operation};
use bytes::Bytes;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Consistency model simulated by the mock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Consistency {
    /// Reads and listings always reflect the latest write or delete
    #[default]
    Strong,
    /// Deleted objects keep reading back (last body) and keep being listed
    StaleDeletes,
    /// Newly created keys are invisible, overwrites return the previous body
    StaleWrites,
}

#[derive(Default)]
struct MockState {
    // key -> every body written since creation, oldest first
    live: HashMap<ObjectKey, Vec<Bytes>>,
    // deleted keys still served under StaleDeletes
    ghosts: HashMap<ObjectKey, Bytes>,
    put_log: Vec<ObjectKey>,
}

/// In-memory gateway shared by all workers
pub struct MockGateway {
    state: Mutex<MockState>,
    consistency: Consistency,
    calls: AtomicU64,
    // 1-based call index that fails once with a transient error; 0 = never
    fail_on_call: AtomicU64,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::with_consistency(Consistency::Strong)
    }

    pub fn with_consistency(consistency: Consistency) -> Self {
        Self {
            state: Mutex::new(MockState::default()),
            consistency,
            calls: AtomicU64::new(0),
            fail_on_call: AtomicU64::new(0),
        }
    }

    /// Make the `call`-th gateway call (counted across all operations and
    /// threads, starting at 1) fail once with a transient error
    pub fn fail_on_call(self, call: u64) -> Self {
        self.fail_on_call.store(call, Ordering::SeqCst);
        self
    }

    /// Number of objects currently stored
    pub fn object_count(&self) -> usize {
        let state = self.state.lock().unwrap();
        state.live.len()
    }

    /// Whether `key` is currently stored (ignoring simulated staleness)
    pub fn object_exists(&self, key: &ObjectKey) -> bool {
        let state = self.state.lock().unwrap();
        state.live.contains_key(key)
    }

    /// Every key passed to `put`, in call order (overwrites appear twice)
    pub fn put_log(&self) -> Vec<ObjectKey> {
        let state = self.state.lock().unwrap();
        state.put_log.clone()
    }

    /// Total number of gateway calls served so far
    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Seed an object directly, bypassing the call counter
    pub fn insert(&self, key: ObjectKey, body: Bytes) {
        let mut state = self.state.lock().unwrap();
        state.live.insert(key, vec![body]);
    }

    /// Remove everything, including stale ghosts
    pub fn clear(&self) {
        let mut state = self.state.lock().unwrap();
        state.live.clear();
        state.ghosts.clear();
    }

    fn check_fault(&self, operation: Operation) -> GatewayResult<()> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let target = self.fail_on_call.load(Ordering::SeqCst);
        if target != 0
            && call == target
            && self
                .fail_on_call
                .compare_exchange(target, 0, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
        {
            info!("Mock: injecting transient fault on call {} ({})", call, operation);
            return Err(GatewayError::transient(
                operation,
                format!("injected fault on call {}", call),
            ));
        }
        Ok(())
    }
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectGateway for MockGateway {
    fn put(&self, key: &ObjectKey, body: Bytes) -> GatewayResult<()> {
        self.check_fault(Operation::Put)?;
        let mut state = self.state.lock().unwrap();
        state.ghosts.remove(key);
        state.live.entry(key.clone()).or_default().push(body);
        state.put_log.push(key.clone());
        debug!("Mock: PUT object {}", key);
        Ok(())
    }

    fn get(&self, key: &ObjectKey) -> GatewayResult<Bytes> {
        self.check_fault(Operation::Get)?;
        let state = self.state.lock().unwrap();
        let visible = match (self.consistency, state.live.get(key)) {
            (Consistency::StaleWrites, Some(versions)) if versions.len() >= 2 => {
                Some(versions[versions.len() - 2].clone())
            }
            (Consistency::StaleWrites, Some(_)) => None,
            (_, Some(versions)) => versions.last().cloned(),
            (Consistency::StaleDeletes, None) => state.ghosts.get(key).cloned(),
            (_, None) => None,
        };
        visible.ok_or_else(|| GatewayError::not_found(key))
    }

    fn delete(&self, key: &ObjectKey) -> GatewayResult<()> {
        self.check_fault(Operation::Delete)?;
        let mut state = self.state.lock().unwrap();
        match state.live.remove(key) {
            Some(mut versions) if self.consistency == Consistency::StaleDeletes => {
                if let Some(last) = versions.pop() {
                    state.ghosts.insert(key.clone(), last);
                }
            }
            Some(_) => {}
            // deleting an already-deleted key finally retires its ghost
            None => {
                state.ghosts.remove(key);
            }
        }
        debug!("Mock: DELETE object {}", key);
        Ok(())
    }

    fn list(&self) -> GatewayResult<HashSet<ObjectKey>> {
        self.check_fault(Operation::List)?;
        let state = self.state.lock().unwrap();
        let keys = match self.consistency {
            Consistency::Strong => state.live.keys().cloned().collect(),
            Consistency::StaleDeletes => state
                .live
                .keys()
                .chain(state.ghosts.keys())
                .cloned()
                .collect(),
            Consistency::StaleWrites => state
                .live
                .iter()
                .filter(|(_, versions)| versions.len() >= 2)
                .map(|(key, _)| key.clone())
                .collect(),
        };
        Ok(keys)
    }

    fn describe(&self) -> String {
        format!("mock gateway ({:?})", self.consistency)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_gateway_basic_operations() {
        let gateway = MockGateway::new();
        let key = ObjectKey::new("test_object_mock");
        let body = Bytes::from_static(b"Hello, Mock Storage!");

        assert_eq!(gateway.object_count(), 0);
        gateway.put(&key, body.clone()).unwrap();
        assert_eq!(gateway.object_count(), 1);
        assert_eq!(gateway.get(&key).unwrap(), body);
        assert!(gateway.list().unwrap().contains(&key));

        gateway.delete(&key).unwrap();
        assert!(gateway.get(&key).unwrap_err().is_not_found());
        assert!(gateway.lookup(&key).unwrap().is_none());
        assert!(gateway.list().unwrap().is_empty());
    }

    #[test]
    fn test_mock_delete_is_idempotent() {
        let gateway = MockGateway::new();
        let key = ObjectKey::new("never_written");
        gateway.delete(&key).unwrap();
        gateway.delete(&key).unwrap();
    }

    #[test]
    fn test_stale_deletes_keep_serving_last_body() {
        let gateway = MockGateway::with_consistency(Consistency::StaleDeletes);
        let key = ObjectKey::new("ghost");
        gateway.put(&key, Bytes::from_static(b"v1")).unwrap();
        gateway.put(&key, Bytes::from_static(b"v22")).unwrap();
        gateway.delete(&key).unwrap();

        assert_eq!(gateway.get(&key).unwrap(), Bytes::from_static(b"v22"));
        assert!(gateway.list().unwrap().contains(&key));
        assert!(!gateway.object_exists(&key));

        // A fresh write replaces the ghost
        gateway.put(&key, Bytes::from_static(b"v3")).unwrap();
        gateway.delete(&key).unwrap();
        assert_eq!(gateway.get(&key).unwrap(), Bytes::from_static(b"v3"));
    }

    #[test]
    fn test_second_delete_retires_ghost() {
        let gateway = MockGateway::with_consistency(Consistency::StaleDeletes);
        let key = ObjectKey::new("ghost");
        gateway.put(&key, Bytes::from_static(b"v1")).unwrap();
        gateway.delete(&key).unwrap();
        assert!(gateway.lookup(&key).unwrap().is_some());

        gateway.delete(&key).unwrap();
        assert!(gateway.lookup(&key).unwrap().is_none());
        assert!(gateway.list().unwrap().is_empty());
    }

    #[test]
    fn test_stale_writes_hide_new_keys_and_overwrites() {
        let gateway = MockGateway::with_consistency(Consistency::StaleWrites);
        let key = ObjectKey::new("lagging");

        gateway.put(&key, Bytes::from_static(b"a")).unwrap();
        assert!(gateway.get(&key).unwrap_err().is_not_found());
        assert!(!gateway.list().unwrap().contains(&key));

        gateway.put(&key, Bytes::from_static(b"bb")).unwrap();
        assert_eq!(gateway.get(&key).unwrap(), Bytes::from_static(b"a"));
        assert!(gateway.list().unwrap().contains(&key));
    }

    #[test]
    fn test_fault_is_injected_exactly_once() {
        let gateway = MockGateway::new().fail_on_call(2);
        let key = ObjectKey::new("faulty");

        gateway.put(&key, Bytes::new()).unwrap();
        let err = gateway.get(&key).unwrap_err();
        assert!(matches!(err, GatewayError::Transient { operation: Operation::Get, .. }));
        assert!(gateway.get(&key).is_ok());
        assert_eq!(gateway.call_count(), 3);
    }

    #[test]
    fn test_put_log_records_every_put() {
        let gateway = MockGateway::new();
        let a = ObjectKey::new("a");
        let b = ObjectKey::new("b");
        gateway.put(&a, Bytes::new()).unwrap();
        gateway.put(&b, Bytes::new()).unwrap();
        gateway.put(&a, Bytes::new()).unwrap();
        assert_eq!(gateway.put_log(), vec![a.clone(), b, a]);

        gateway.clear();
        assert_eq!(gateway.object_count(), 0);
    }
}
