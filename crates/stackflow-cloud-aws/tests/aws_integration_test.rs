//! Live AWS tests
//!
//! Run with `cargo test -p stackflow-cloud-aws -- --ignored` against an
//! account you can create and delete resources in. `STACKFLOW_TEST_REGION`
//! picks the region (default us-east-1).

use serde_json::json;
use stackflow_cloud::{ControlPlane, ResolvedResource};
use stackflow_cloud_aws::AwsControlPlane;
use stackflow_core::ResourceKind;

async fn plane() -> AwsControlPlane {
    let region = std::env::var("STACKFLOW_TEST_REGION").unwrap_or_else(|_| "us-east-1".to_string());
    AwsControlPlane::new(Some(&region), None).await
}

fn unique(prefix: &str) -> String {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    format!("{}-{}", prefix, nanos % 1_000_000_000)
}

#[tokio::test]
#[ignore = "requires AWS credentials"]
async fn test_check_auth() {
    let auth = plane().await.check_auth().await.unwrap();
    assert!(auth.authenticated, "{:?}", auth.error);
}

#[tokio::test]
#[ignore = "requires AWS credentials"]
async fn test_bucket_lifecycle() {
    let plane = plane().await;
    let bucket = ResolvedResource::new("bucket", ResourceKind::Bucket)
        .with_property("bucket-name", json!(unique("stackflow-it")))
        .with_property("tags", json!({"Documentation": "Documentation"}));

    assert!(plane.describe(&bucket).await.unwrap().is_none());

    let created = plane.create(&bucket).await.unwrap();
    assert!(created.attribute_str("arn").unwrap().starts_with("arn:aws:s3:::"));

    let found = plane.describe(&bucket).await.unwrap().unwrap();
    assert_eq!(found.id, created.id);

    let err = plane.create(&bucket).await.unwrap_err();
    assert!(err.is_already_exists());

    plane.delete(&bucket, &created).await.unwrap();
    assert!(plane.describe(&bucket).await.unwrap().is_none());

    let err = plane.delete(&bucket, &created).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
#[ignore = "requires AWS credentials"]
async fn test_rest_api_lifecycle() {
    let plane = plane().await;
    let api = ResolvedResource::new("api", ResourceKind::RestApi)
        .with_property("name", json!(unique("stackflow-it")))
        .with_property("endpoint-type", json!("REGIONAL"));

    let created = plane.create(&api).await.unwrap();
    let api_id = created.attribute_str("id").unwrap().to_string();
    let root = created.attribute_str("root_resource_id").unwrap().to_string();
    assert!(!root.is_empty());

    let path = ResolvedResource::new("users", ResourceKind::ResourcePath)
        .with_property("rest-api-id", json!(api_id))
        .with_property("parent-id", json!(root))
        .with_property("path-part", json!("users"));
    let users = plane.create(&path).await.unwrap();
    assert_eq!(users.attribute_str("path"), Some("/users"));
    assert_eq!(plane.describe(&path).await.unwrap().unwrap().id, users.id);

    // a second API with the same name would be orphaned by delete
    let err = plane.create(&api).await.unwrap_err();
    assert!(err.is_already_exists());

    plane.delete(&api, &created).await.unwrap();
    assert!(plane.describe(&api).await.unwrap().is_none());
}
