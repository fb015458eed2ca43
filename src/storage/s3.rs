//! S3-compatible storage backend.
//!
//! Talks to whichever S3 API the tenant registered: AWS itself, MinIO,
//! or any other compatible endpoint.  The client is built from the
//! tenant's own credential record — static keys, the record's region,
//! and the record's endpoint URL if one is set.  Path-style addressing
//! is forced for custom endpoints, which rarely serve virtual-host
//! style buckets.

use aws_sdk_s3::Client;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use tracing::debug;

use super::backend::{Backend, BackendFuture, StorageObject};
use super::{clean_prefix, strip_object_prefix};
use crate::credentials::CredentialRecord;

/// Region assumed when the record leaves it blank.
const DEFAULT_REGION: &str = "us-east-1";

/// Backend for one tenant's S3-compatible endpoint.
#[derive(Debug)]
pub struct S3Backend {
    client: Client,
}

impl S3Backend {
    /// Build a client bound to the record's endpoint and credentials.
    pub async fn new(record: &CredentialRecord) -> Self {
        let region = if record.region.is_empty() {
            DEFAULT_REGION.to_string()
        } else {
            record.region.clone()
        };

        let creds = aws_sdk_s3::config::Credentials::new(
            &record.access_key,
            &record.access_secret,
            None, // session_token
            None, // expiry
            "podgate-register",
        );

        let mut config_loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(region))
            .credentials_provider(creds);

        if !record.endpoint.is_empty() {
            config_loader = config_loader.endpoint_url(&record.endpoint);
        }

        let sdk_config = config_loader.load().await;

        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(!record.endpoint.is_empty())
            .build();

        Self {
            client: Client::from_conf(s3_config),
        }
    }

    /// Map an AWS SDK error to an anyhow error with context.
    fn map_sdk_error(context: &str, err: impl std::fmt::Display) -> anyhow::Error {
        anyhow::anyhow!("s3 {context}: {err}")
    }

    /// Convert an SDK timestamp to a chrono UTC timestamp.
    fn to_utc(dt: Option<&aws_smithy_types::DateTime>) -> DateTime<Utc> {
        dt.and_then(|d| DateTime::from_timestamp(d.secs(), d.subsec_nanos()))
            .unwrap_or_default()
    }
}

impl Backend for S3Backend {
    fn create_bucket<'a>(&'a self, bucket: &str) -> BackendFuture<'a, ()> {
        let bucket = bucket.to_string();
        Box::pin(async move {
            debug!("s3 create_bucket: {bucket}");
            self.client
                .create_bucket()
                .bucket(&bucket)
                .send()
                .await
                .map_err(|e| Self::map_sdk_error("create_bucket", e.into_service_error()))?;
            Ok(())
        })
    }

    fn delete_bucket<'a>(&'a self, bucket: &str) -> BackendFuture<'a, ()> {
        let bucket = bucket.to_string();
        Box::pin(async move {
            debug!("s3 delete_bucket: {bucket}");
            self.client
                .delete_bucket()
                .bucket(&bucket)
                .send()
                .await
                .map_err(|e| Self::map_sdk_error("delete_bucket", e.into_service_error()))?;
            Ok(())
        })
    }

    fn list_objects<'a>(
        &'a self,
        bucket: &str,
        prefix: &str,
    ) -> BackendFuture<'a, Vec<StorageObject>> {
        let bucket = bucket.to_string();
        let prefix = clean_prefix(prefix).to_string();
        Box::pin(async move {
            debug!("s3 list_objects: bucket={bucket} prefix='{prefix}'");
            let mut objects = Vec::new();
            let mut continuation_token: Option<String> = None;

            loop {
                let mut req = self.client.list_objects_v2().bucket(&bucket);
                if !prefix.is_empty() {
                    req = req.prefix(&prefix);
                }
                if let Some(ref token) = continuation_token {
                    req = req.continuation_token(token);
                }

                let resp = req
                    .send()
                    .await
                    .map_err(|e| Self::map_sdk_error("list_objects_v2", e.into_service_error()))?;

                for obj in resp.contents() {
                    let Some(key) = obj.key() else { continue };
                    let path = strip_object_prefix(&prefix, key);
                    if path.is_empty() {
                        // The prefix marker object itself.
                        continue;
                    }
                    objects.push(StorageObject {
                        path,
                        content: Bytes::new(),
                        last_modified: Self::to_utc(obj.last_modified()),
                    });
                }

                if resp.is_truncated() == Some(true) {
                    continuation_token = resp.next_continuation_token().map(|s| s.to_string());
                } else {
                    break;
                }
            }

            Ok(objects)
        })
    }

    fn get_object<'a>(&'a self, bucket: &str, path: &str) -> BackendFuture<'a, StorageObject> {
        let bucket = bucket.to_string();
        let path = path.to_string();
        Box::pin(async move {
            debug!("s3 get_object: bucket={bucket} path={path}");
            let resp = self
                .client
                .get_object()
                .bucket(&bucket)
                .key(&path)
                .send()
                .await
                .map_err(|e| Self::map_sdk_error("get_object", e.into_service_error()))?;

            let last_modified = Self::to_utc(resp.last_modified());
            let body = resp
                .body
                .collect()
                .await
                .map_err(|e| Self::map_sdk_error("get_object body", e))?
                .into_bytes();

            Ok(StorageObject {
                path,
                content: body,
                last_modified,
            })
        })
    }

    fn put_object<'a>(
        &'a self,
        bucket: &str,
        path: &str,
        content: Bytes,
    ) -> BackendFuture<'a, ()> {
        let bucket = bucket.to_string();
        let path = path.to_string();
        Box::pin(async move {
            debug!(
                "s3 put_object: bucket={bucket} path={path} size={}",
                content.len()
            );
            self.client
                .put_object()
                .bucket(&bucket)
                .key(&path)
                .body(aws_sdk_s3::primitives::ByteStream::from(content))
                .send()
                .await
                .map_err(|e| Self::map_sdk_error("put_object", e.into_service_error()))?;
            Ok(())
        })
    }

    fn delete_object<'a>(&'a self, bucket: &str, path: &str) -> BackendFuture<'a, ()> {
        let bucket = bucket.to_string();
        let path = path.to_string();
        Box::pin(async move {
            debug!("s3 delete_object: bucket={bucket} path={path}");
            self.client
                .delete_object()
                .bucket(&bucket)
                .key(&path)
                .send()
                .await
                .map_err(|e| Self::map_sdk_error("delete_object", e.into_service_error()))?;
            Ok(())
        })
    }
}

// -- Tests -------------------------------------------------------------------
