//! S3 bucket and object management

use crate::context::{AwsContext, DEFAULT_REGION};
use crate::error::{AwsError, SdkResultExt, not_found_as_none};
use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{
    BucketLocationConstraint, CreateBucketConfiguration, Delete, ObjectIdentifier, Tag, Tagging,
};
use stackflow_cloud::{CloudError, Result};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

/// S3 operations used by the bucket and object resource kinds
pub struct S3Ops {
    client: Client,
    region: String,
}

impl S3Ops {
    pub fn from_context(ctx: &AwsContext) -> Self {
        Self {
            client: ctx.s3_client(),
            region: ctx.region().to_string(),
        }
    }

    /// Create a bucket in the context region and tag it
    pub async fn create_bucket(&self, bucket: &str, tags: &BTreeMap<String, String>) -> Result<()> {
        info!(bucket = %bucket, region = %self.region, "Creating S3 bucket");

        let mut request = self.client.create_bucket().bucket(bucket);
        // us-east-1 rejects an explicit location constraint
        if self.region != DEFAULT_REGION {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(self.region.as_str()))
                    .build(),
            );
        }
        request.send().await.classify("CreateBucket")?;

        if !tags.is_empty() {
            let tag_set = tags
                .iter()
                .map(|(k, v)| Tag::builder().key(k).value(v).build())
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| CloudError::InvalidConfig(format!("bucket tag: {}", e)))?;
            let tagging = Tagging::builder()
                .set_tag_set(Some(tag_set))
                .build()
                .map_err(|e| CloudError::InvalidConfig(format!("bucket tagging: {}", e)))?;

            self.client
                .put_bucket_tagging()
                .bucket(bucket)
                .tagging(tagging)
                .send()
                .await
                .classify("PutBucketTagging")?;
            debug!(bucket = %bucket, count = tags.len(), "Bucket tagged");
        }

        Ok(())
    }

    /// Whether the bucket exists and is ours
    pub async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        let result = self
            .client
            .head_bucket()
            .bucket(bucket)
            .send()
            .await
            .classify("HeadBucket");
        match not_found_as_none(result) {
            Ok(found) => Ok(found.is_some()),
            // the name is taken by another account
            Err(AwsError::AccessDenied { .. }) => {
                debug!(bucket = %bucket, "Bucket exists but belongs to someone else");
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Delete every object in the bucket, then the bucket
    pub async fn delete_bucket(&self, bucket: &str) -> Result<()> {
        info!(bucket = %bucket, "Deleting bucket and contents");
        self.empty_bucket(bucket).await?;

        self.client
            .delete_bucket()
            .bucket(bucket)
            .send()
            .await
            .classify("DeleteBucket")?;
        Ok(())
    }

    async fn empty_bucket(&self, bucket: &str) -> Result<()> {
        let mut continuation_token: Option<String> = None;
        loop {
            let mut request = self.client.list_objects_v2().bucket(bucket);
            if let Some(token) = &continuation_token {
                request = request.continuation_token(token);
            }
            let response = request.send().await.classify("ListObjectsV2")?;

            let objects = response
                .contents()
                .iter()
                .filter_map(|o| o.key())
                .map(|key| ObjectIdentifier::builder().key(key).build())
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| CloudError::InvalidConfig(format!("object identifier: {}", e)))?;

            if !objects.is_empty() {
                debug!(bucket = %bucket, count = objects.len(), "Deleting objects");
                let delete = Delete::builder()
                    .set_objects(Some(objects))
                    .quiet(true)
                    .build()
                    .map_err(|e| CloudError::InvalidConfig(format!("delete request: {}", e)))?;
                self.client
                    .delete_objects()
                    .bucket(bucket)
                    .delete(delete)
                    .send()
                    .await
                    .classify("DeleteObjects")?;
            }

            if response.is_truncated() == Some(true) {
                continuation_token = response.next_continuation_token().map(|s| s.to_string());
            } else {
                break;
            }
        }
        Ok(())
    }

    /// Upload a local file; returns the object's ETag
    pub async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        source: &Path,
        content_type: Option<&str>,
    ) -> Result<String> {
        info!(bucket = %bucket, key = %key, source = %source.display(), "Uploading object");

        let body = ByteStream::from_path(source).await.map_err(|e| {
            CloudError::InvalidConfig(format!("cannot read {}: {}", source.display(), e))
        })?;

        let output = self
            .client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(body)
            .set_content_type(content_type.map(str::to_string))
            .send()
            .await
            .classify("PutObject")?;

        Ok(output.e_tag().unwrap_or_default().to_string())
    }

    /// ETag of the object, if it exists
    pub async fn head_object(&self, bucket: &str, key: &str) -> Result<Option<String>> {
        let result = self
            .client
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .classify("HeadObject");
        Ok(not_found_as_none(result)?.map(|o| o.e_tag().unwrap_or_default().to_string()))
    }

    pub async fn delete_object(&self, bucket: &str, key: &str) -> Result<()> {
        info!(bucket = %bucket, key = %key, "Deleting object");
        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .classify("DeleteObject")?;
        Ok(())
    }
}
