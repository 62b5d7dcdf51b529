//! S3-compatible gateway backed by the AWS SDK.
//!
//! The SDK is async; the probes are not. `S3Gateway` owns a multi-threaded
//! tokio runtime and blocks the calling worker thread on each request, so
//! every worker keeps its own in-flight request while the runtime drives the
//! network I/O. Calling these methods from inside an async context panics.
//!
//! Credentials are resolved through the standard AWS chain:
//! 1. Environment variables (`AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY`)
//! 2. Shared credentials file (`~/.aws/credentials`)
//! 3. IAM role (for EC2/ECS/Lambda)

use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;

use aws_config::retry::RetryConfig;
use aws_config::timeout::TimeoutConfig;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_smithy_runtime_api::client::result::SdkError;
use aws_smithy_runtime_api::http::Response as HttpResponse;
use bytes::Bytes;
use log::{debug, info};
use tokio::runtime::Runtime;

use crate::config::GatewayConfig;
use crate::gateway::{GatewayError, GatewayResult, ObjectGateway, ObjectKey, Operation};

/// Gateway talking to one bucket of an S3-compatible service
pub struct S3Gateway {
    runtime: Runtime,
    client: aws_sdk_s3::Client,
    bucket: String,
    endpoint: Option<String>,
}

impl S3Gateway {
    /// Build the SDK client for the configured endpoint and region.
    ///
    /// # Errors
    ///
    /// Returns a fatal error if the runtime cannot be started or the bucket
    /// name is empty. Unreachable endpoints and bad credentials only surface
    /// on the first request.
    pub fn connect(config: &GatewayConfig) -> GatewayResult<Self> {
        if config.bucket.is_empty() {
            return Err(GatewayError::fatal(Operation::List, "bucket name must not be empty"));
        }

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("s3-gateway")
            .build()
            .map_err(|e| GatewayError::fatal(Operation::List, format!("failed to start runtime: {}", e)))?;

        let timeout = TimeoutConfig::builder()
            .operation_timeout(Duration::from_secs(config.timeout_secs))
            .build();
        let retry = RetryConfig::standard().with_max_attempts(config.max_attempts);

        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .timeout_config(timeout)
            .retry_config(retry);
        if let Some(region) = &config.region {
            loader = loader.region(Region::new(region.clone()));
        }
        let sdk_config = runtime.block_on(loader.load());

        let mut s3_config = aws_sdk_s3::config::Builder::from(&sdk_config);
        if let Some(endpoint) = &config.endpoint {
            s3_config = s3_config.endpoint_url(endpoint);
        }
        if config.force_path_style {
            s3_config = s3_config.force_path_style(true);
        }
        let client = aws_sdk_s3::Client::from_conf(s3_config.build());

        info!(
            "S3 gateway ready: bucket={}, endpoint={}, region={}",
            config.bucket,
            config.endpoint.as_deref().unwrap_or("<aws default>"),
            config.region.as_deref().unwrap_or("<aws default>")
        );

        Ok(Self {
            runtime,
            client,
            bucket: config.bucket.clone(),
            endpoint: config.endpoint.clone(),
        })
    }

    fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }

    async fn fetch(&self, key: &ObjectKey) -> GatewayResult<Bytes> {
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key.as_str())
            .send()
            .await
            .map_err(|e| classify(Operation::Get, Some(key), &e))?;

        let body = response.body.collect().await.map_err(|e| {
            GatewayError::transient(Operation::Get, format!("failed to read body of {}: {}", key, e))
        })?;
        Ok(body.into_bytes())
    }

    /// List the whole bucket, following continuation tokens
    async fn list_all(&self) -> GatewayResult<HashSet<ObjectKey>> {
        let mut keys = HashSet::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let mut request = self.client.list_objects_v2().bucket(&self.bucket);
            if let Some(token) = continuation_token.take() {
                request = request.continuation_token(token);
            }

            let response = request
                .send()
                .await
                .map_err(|e| classify(Operation::List, None, &e))?;

            if let Some(contents) = response.contents {
                keys.extend(contents.into_iter().filter_map(|object| object.key).map(ObjectKey::new));
            }

            continuation_token = match response.is_truncated {
                Some(true) => response.next_continuation_token,
                _ => None,
            };
            if continuation_token.is_none() {
                break;
            }
        }

        Ok(keys)
    }
}

impl ObjectGateway for S3Gateway {
    fn put(&self, key: &ObjectKey, body: Bytes) -> GatewayResult<()> {
        let size = body.len();
        self.block_on(
            self.client
                .put_object()
                .bucket(&self.bucket)
                .key(key.as_str())
                .body(ByteStream::from(body))
                .send(),
        )
        .map_err(|e| classify(Operation::Put, None, &e))?;
        debug!("PUT object {} ({} bytes)", key, size);
        Ok(())
    }

    fn get(&self, key: &ObjectKey) -> GatewayResult<Bytes> {
        self.block_on(self.fetch(key))
    }

    fn delete(&self, key: &ObjectKey) -> GatewayResult<()> {
        let result = self.block_on(
            self.client
                .delete_object()
                .bucket(&self.bucket)
                .key(key.as_str())
                .send(),
        );
        match result.map_err(|e| classify(Operation::Delete, Some(key), &e)) {
            // S3 delete is idempotent; some compatible stores still answer 404.
            Ok(_) | Err(GatewayError::NotFound { .. }) => {
                debug!("DELETE object {}", key);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn list(&self) -> GatewayResult<HashSet<ObjectKey>> {
        self.block_on(self.list_all())
    }

    fn describe(&self) -> String {
        format!(
            "s3://{} via {}",
            self.bucket,
            self.endpoint.as_deref().unwrap_or("aws")
        )
    }
}

/// Map an SDK failure onto the harness error taxonomy.
///
/// A 404 only means `NotFound` for object-level calls (`key` is set); on
/// PUT or LIST it means the bucket itself is missing.
fn classify<E>(operation: Operation, key: Option<&ObjectKey>, err: &SdkError<E, HttpResponse>) -> GatewayError
where
    E: std::error::Error + 'static,
{
    let message = DisplayErrorContext(err).to_string();
    match err {
        SdkError::ServiceError(service_err) => {
            let status = service_err.raw().status().as_u16();
            classify_status(operation, key, status, message)
        }
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => {
            GatewayError::transient(operation, message)
        }
        _ => GatewayError::fatal(operation, message),
    }
}

fn classify_status(operation: Operation, key: Option<&ObjectKey>, status: u16, message: String) -> GatewayError {
    match (status, key) {
        (404, Some(key)) => GatewayError::not_found(key),
        (429, _) | (500..=599, _) => GatewayError::transient(operation, message),
        _ => GatewayError::fatal(operation, message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_404_on_object_call_is_not_found() {
        let key = ObjectKey::new("missing");
        let err = classify_status(Operation::Get, Some(&key), 404, "NoSuchKey".to_string());
        assert_eq!(err, GatewayError::NotFound { key: "missing".to_string() });
    }

    #[test]
    fn test_404_on_bucket_call_is_fatal() {
        let err = classify_status(Operation::List, None, 404, "NoSuchBucket".to_string());
        assert!(matches!(err, GatewayError::Fatal { operation: Operation::List, .. }));
    }

    #[test]
    fn test_throttling_and_server_errors_are_transient() {
        for status in [429, 500, 503] {
            let err = classify_status(Operation::Put, None, status, "busy".to_string());
            assert!(matches!(err, GatewayError::Transient { .. }), "status {}", status);
        }
    }

    #[test]
    fn test_auth_errors_are_fatal() {
        let key = ObjectKey::new("k");
        let err = classify_status(Operation::Get, Some(&key), 403, "AccessDenied".to_string());
        assert!(matches!(err, GatewayError::Fatal { operation: Operation::Get, .. }));
    }

    #[test]
    fn test_connect_rejects_empty_bucket() {
        let config = GatewayConfig { bucket: String::new(), ..GatewayConfig::default() };
        assert!(S3Gateway::connect(&config).is_err());
    }
}
