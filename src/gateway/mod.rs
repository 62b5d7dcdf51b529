//! Object Gateway Abstraction
//!
//! This module provides the abstraction over the object store under test,
//! allowing the probes to run against a real S3-compatible service or an
//! in-memory mock without changing the measurement code.

pub mod config;
pub mod mock_store;
pub mod s3_store;

#[cfg(test)]
mod comprehensive_test;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Largest payload the harness will allocate (5 GiB, the S3 single PUT limit)
pub const MAX_CHUNK_SIZE: u64 = 5 * 1024 * 1024 * 1024;

/// Result type for gateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Gateway operation, used to tag failures in logs and reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Put,
    Get,
    Delete,
    List,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Put => "PUT",
            Operation::Get => "GET",
            Operation::Delete => "DELETE",
            Operation::List => "LIST",
        };
        f.write_str(name)
    }
}

/// Errors surfaced by a gateway.
///
/// `NotFound` is an expected observation for the probes; the other two
/// variants are harness/environment faults.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// The object does not exist (or is not yet visible).
    #[error("object not found: {key}")]
    NotFound {
        /// The key that was requested.
        key: String,
    },

    /// A failure that may succeed on retry (throttling, 5xx, network).
    #[error("transient {operation} failure: {message}")]
    Transient {
        /// The failing operation.
        operation: Operation,
        /// Error message.
        message: String,
    },

    /// A failure that will not go away on its own (credentials, missing bucket).
    #[error("fatal {operation} failure: {message}")]
    Fatal {
        /// The failing operation.
        operation: Operation,
        /// Error message.
        message: String,
    },
}

impl GatewayError {
    pub fn not_found(key: &ObjectKey) -> Self {
        GatewayError::NotFound { key: key.to_string() }
    }

    pub fn transient(operation: Operation, message: impl Into<String>) -> Self {
        GatewayError::Transient { operation, message: message.into() }
    }

    pub fn fatal(operation: Operation, message: impl Into<String>) -> Self {
        GatewayError::Fatal { operation, message: message.into() }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, GatewayError::NotFound { .. })
    }
}

/// Key of an object in the bucket under test
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectKey(String);

impl ObjectKey {
    /// Wrap an existing key, e.g. one returned by a listing
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Generate a fresh random key. Every object the probes create gets one.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Trait defining the object store interface the probes need.
///
/// All four calls act on one pre-existing bucket. Implementations are shared
/// by every worker thread and must tolerate concurrent use.
pub trait ObjectGateway: Send + Sync {
    /// Store `body` under `key`, replacing any previous version
    fn put(&self, key: &ObjectKey, body: Bytes) -> GatewayResult<()>;

    /// Read the object stored under `key`
    fn get(&self, key: &ObjectKey) -> GatewayResult<Bytes>;

    /// Delete the object stored under `key`. Deleting a missing key succeeds.
    fn delete(&self, key: &ObjectKey) -> GatewayResult<()>;

    /// List every key currently in the bucket
    fn list(&self) -> GatewayResult<HashSet<ObjectKey>>;

    /// Read an object, turning `NotFound` into `None`
    fn lookup(&self, key: &ObjectKey) -> GatewayResult<Option<Bytes>> {
        match self.get(key) {
            Ok(body) => Ok(Some(body)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Short human-readable description used in log lines
    fn describe(&self) -> String {
        "object gateway".to_string()
    }
}

/// The two bodies a probe run writes: `base` of the configured chunk size and
/// `overwrite`, one byte longer. Both share one allocation, and cloning either
/// is a reference count bump.
#[derive(Debug, Clone)]
pub struct Payloads {
    pub base: Bytes,
    pub overwrite: Bytes,
}

impl Payloads {
    /// Allocate zero-filled payloads for `chunk_size` bytes
    pub fn zeroed(chunk_size: usize) -> Self {
        let overwrite = Bytes::from(vec![0u8; chunk_size + 1]);
        Self {
            base: overwrite.slice(..chunk_size),
            overwrite,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_keys_are_unique() {
        let keys: HashSet<ObjectKey> = (0..1000).map(|_| ObjectKey::generate()).collect();
        assert_eq!(keys.len(), 1000);
    }

    #[test]
    fn test_object_key_display() {
        let key = ObjectKey::new("some/key");
        assert_eq!(key.as_str(), "some/key");
        assert_eq!(key.to_string(), "some/key");
    }

    #[test]
    fn test_payload_sizes() {
        let payloads = Payloads::zeroed(4);
        assert_eq!(payloads.base.len(), 4);
        assert_eq!(payloads.overwrite.len(), 5);
        assert!(payloads.overwrite.iter().all(|&b| b == 0));
        // base is a view into the overwrite buffer
        assert_eq!(payloads.base.as_ptr(), payloads.overwrite.as_ptr());

        let empty = Payloads::zeroed(0);
        assert!(empty.base.is_empty());
        assert_eq!(empty.overwrite.len(), 1);
    }

    #[test]
    fn test_gateway_error_classification() {
        let key = ObjectKey::new("k");
        assert!(GatewayError::not_found(&key).is_not_found());
        assert!(!GatewayError::transient(Operation::Get, "slow down").is_not_found());
        assert!(!GatewayError::fatal(Operation::List, "access denied").is_not_found());

        let err = GatewayError::transient(Operation::Put, "503 Service Unavailable");
        assert_eq!(err.to_string(), "transient PUT failure: 503 Service Unavailable");
    }
}
