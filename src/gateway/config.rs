//! Backend selection for the object gateway

use crate::config::GatewayConfig;
use crate::gateway::{mock_store::MockGateway, s3_store::S3Gateway, GatewayResult, ObjectGateway};
use log::info;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Available gateway backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GatewayBackend {
    #[default]
    S3,
    Mock,
}

impl std::str::FromStr for GatewayBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "s3" | "aws" => Ok(GatewayBackend::S3),
            "mock" | "memory" => Ok(GatewayBackend::Mock),
            _ => Err(format!("Unknown gateway backend: {}", s)),
        }
    }
}

impl GatewayConfig {
    /// Create the gateway described by this configuration
    pub fn create_gateway(&self) -> GatewayResult<Arc<dyn ObjectGateway>> {
        match self.backend {
            GatewayBackend::S3 => {
                info!("Using S3 gateway for bucket {}", self.bucket);
                Ok(Arc::new(S3Gateway::connect(self)?))
            }
            GatewayBackend::Mock => {
                info!("Using mock gateway with {:?} consistency", self.mock_consistency);
                Ok(Arc::new(MockGateway::with_consistency(self.mock_consistency)))
            }
        }
    }
}
