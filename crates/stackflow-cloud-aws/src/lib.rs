//! AWS control plane for stackflow
//!
//! This crate implements the [`ControlPlane`](stackflow_cloud::ControlPlane)
//! trait on top of the AWS SDK, covering every resource kind a stack can
//! declare: S3 buckets and objects, IAM roles, Lambda functions and their
//! invoke permissions, and API Gateway REST APIs with their models,
//! resources, methods and deployments.
//!
//! # Requirements
//!
//! - Credentials from the standard AWS chain (`AWS_PROFILE`, environment
//!   variables, `~/.aws/credentials`, instance roles)
//! - A region from the stack, `--region`, or the profile
//!
//! # Example
//!
//! ```ignore
//! use stackflow_cloud::{ControlPlane, Orchestrator};
//! use stackflow_cloud_aws::AwsControlPlane;
//! use std::sync::Arc;
//!
//! let plane = AwsControlPlane::new(Some("us-east-1"), None).await;
//! let auth = plane.check_auth().await?;
//! if !auth.authenticated {
//!     panic!("Not authenticated: {:?}", auth.error);
//! }
//!
//! let report = Orchestrator::new(Arc::new(plane)).create(&stack).await?;
//! ```

pub mod apigateway;
pub mod context;
pub mod error;
pub mod iam;
pub mod lambda;
pub mod provider;
pub mod s3;

pub use context::{AwsContext, DEFAULT_REGION};
pub use error::{AwsError, SdkResultExt, classify_aws_error, classify_sdk_error};
pub use provider::AwsControlPlane;
