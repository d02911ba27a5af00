//! AWS error classification
//!
//! SDK errors are classified by their service error code (via
//! `ProvideErrorMetadata`) into the few categories the orchestrator acts
//! on, then converted into [`CloudError`].

use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata};
use stackflow_cloud::CloudError;
use thiserror::Error;

/// AWS error categories
#[derive(Debug, Error)]
pub enum AwsError {
    /// Resource was not found (a no-op during delete)
    #[error("{operation}: not found: {message}")]
    NotFound {
        operation: &'static str,
        message: String,
    },

    /// Name is already taken
    #[error("{operation}: already exists: {message}")]
    AlreadyExists {
        operation: &'static str,
        message: String,
    },

    #[error("{operation}: access denied: {message}")]
    AccessDenied {
        operation: &'static str,
        message: String,
    },

    #[error("{operation}: invalid credentials: {message}")]
    Authentication {
        operation: &'static str,
        message: String,
    },

    /// Something this request refers to has not propagated yet
    #[error("{operation}: not ready: {message}")]
    NotReady {
        operation: &'static str,
        message: String,
    },

    #[error("{operation}: rate limit exceeded")]
    Throttled { operation: &'static str },

    /// Generic AWS SDK error with code and message
    #[error("{operation}: {}: {message}", code.as_deref().unwrap_or("error"))]
    Sdk {
        operation: &'static str,
        code: Option<String>,
        message: String,
    },
}

impl AwsError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, AwsError::NotFound { .. })
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, AwsError::AlreadyExists { .. })
    }
}

/// Known AWS error codes for "not found" conditions
const NOT_FOUND_CODES: &[&str] = &[
    "NoSuchBucket",
    "NoSuchKey",
    "NoSuchEntity",
    // HeadBucket / HeadObject answer a bare 404
    "NotFound",
    "ResourceNotFoundException",
    "NotFoundException",
];

/// Known AWS error codes for "already exists" conditions
const ALREADY_EXISTS_CODES: &[&str] = &[
    "BucketAlreadyExists",
    "BucketAlreadyOwnedByYou",
    "EntityAlreadyExists",
];

/// Conflict codes shared between name collisions and concurrent
/// modification; only the message tells them apart
const CONFLICT_CODES: &[&str] = &["ResourceConflictException", "ConflictException"];

const ALREADY_EXISTS_MESSAGES: &[&str] = &["already exist", "already has"];

const ACCESS_DENIED_CODES: &[&str] = &[
    "AccessDenied",
    "AccessDeniedException",
    "Forbidden",
    "UnauthorizedOperation",
];

const AUTHENTICATION_CODES: &[&str] = &[
    "UnrecognizedClientException",
    "InvalidClientTokenId",
    "InvalidAccessKeyId",
    "SignatureDoesNotMatch",
    "ExpiredToken",
    "ExpiredTokenException",
];

/// Known AWS error codes for throttling/rate limiting
const THROTTLING_CODES: &[&str] = &[
    "Throttling",
    "ThrottlingException",
    "TooManyRequestsException",
    "SlowDown",
];

/// Message fragments that mean "retry shortly": a fresh IAM role not yet
/// assumable by Lambda, or an API deployed before its methods exist
const NOT_READY_MESSAGES: &[&str] = &[
    "cannot be assumed",
    "execution role does not have permissions",
    "doesn't contain any methods",
];

/// Classify an AWS error by code and message
pub fn classify_aws_error(operation: &'static str, code: Option<&str>, message: &str) -> AwsError {
    let message = message.to_string();

    match code {
        Some(c) if NOT_FOUND_CODES.contains(&c) => AwsError::NotFound { operation, message },
        Some(c) if ALREADY_EXISTS_CODES.contains(&c) => {
            AwsError::AlreadyExists { operation, message }
        }
        Some(c)
            if CONFLICT_CODES.contains(&c)
                && ALREADY_EXISTS_MESSAGES.iter().any(|m| message.contains(m)) =>
        {
            AwsError::AlreadyExists { operation, message }
        }
        Some(c) if ACCESS_DENIED_CODES.contains(&c) => AwsError::AccessDenied { operation, message },
        Some(c) if AUTHENTICATION_CODES.contains(&c) => {
            AwsError::Authentication { operation, message }
        }
        Some(c) if THROTTLING_CODES.contains(&c) => AwsError::Throttled { operation },
        Some("InvalidParameterValueException" | "BadRequestException")
            if NOT_READY_MESSAGES.iter().any(|m| message.contains(m)) =>
        {
            AwsError::NotReady { operation, message }
        }
        _ => AwsError::Sdk {
            operation,
            code: code.map(|s| s.to_string()),
            message,
        },
    }
}

/// Classify any SDK error
pub fn classify_sdk_error<E>(operation: &'static str, error: &E) -> AwsError
where
    E: ProvideErrorMetadata + std::error::Error,
{
    let message = match error.message() {
        Some(m) => m.to_string(),
        None => DisplayErrorContext(error).to_string(),
    };
    classify_aws_error(operation, error.code(), &message)
}

/// `.classify("CreateBucket")?` on SDK results
pub trait SdkResultExt<T> {
    fn classify(self, operation: &'static str) -> Result<T, AwsError>;
}

impl<T, E> SdkResultExt<T> for Result<T, E>
where
    E: ProvideErrorMetadata + std::error::Error,
{
    fn classify(self, operation: &'static str) -> Result<T, AwsError> {
        self.map_err(|e| classify_sdk_error(operation, &e))
    }
}

impl From<AwsError> for CloudError {
    fn from(error: AwsError) -> Self {
        let text = error.to_string();
        match error {
            AwsError::NotFound { .. } => CloudError::ResourceNotFound(text),
            AwsError::AlreadyExists { .. } => CloudError::ResourceAlreadyExists(text),
            AwsError::AccessDenied { .. } => CloudError::PermissionDenied(text),
            AwsError::Authentication { .. } => CloudError::AuthenticationFailed(text),
            AwsError::NotReady { .. } => CloudError::DependencyNotReady(text),
            AwsError::Throttled { .. } | AwsError::Sdk { .. } => CloudError::ApiError(text),
        }
    }
}

/// Map a lookup result so "not found" becomes `None`
pub fn not_found_as_none<T>(result: Result<T, AwsError>) -> Result<Option<T>, AwsError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_codes() {
        for code in NOT_FOUND_CODES {
            let err = classify_aws_error("Op", Some(code), "some message");
            assert!(err.is_not_found(), "Expected NotFound for code: {code}");
        }
    }

    #[test]
    fn already_exists_codes() {
        for code in ALREADY_EXISTS_CODES {
            let err = classify_aws_error("Op", Some(code), "msg");
            assert!(
                err.is_already_exists(),
                "Expected AlreadyExists for code: {code}"
            );
        }
    }

    #[test]
    fn conflicts_are_collisions_only_when_the_message_says_so() {
        let cases = [
            ("ConflictException", "Another resource with the same parent already has this name: users"),
            ("ConflictException", "Method already exists for this resource"),
            ("ResourceConflictException", "Function already exist: stackflow-echo"),
            ("ResourceConflictException", "The statement id (x) provided already exists."),
        ];
        for (code, message) in cases {
            let err = classify_aws_error("Op", Some(code), message);
            assert!(err.is_already_exists(), "{code}: {message}");
        }

        let err = classify_aws_error(
            "CreateDeployment",
            Some("ConflictException"),
            "Unable to complete operation due to concurrent modification. Please try again later.",
        );
        assert!(matches!(err, AwsError::Sdk { .. }));
        let cloud: CloudError = err.into();
        assert!(!cloud.is_already_exists());
    }

    #[test]
    fn permission_and_credential_codes() {
        for code in ACCESS_DENIED_CODES {
            let err: CloudError = classify_aws_error("Op", Some(code), "msg").into();
            assert!(matches!(err, CloudError::PermissionDenied(_)), "{code}");
        }
        for code in AUTHENTICATION_CODES {
            let err: CloudError = classify_aws_error("Op", Some(code), "msg").into();
            assert!(matches!(err, CloudError::AuthenticationFailed(_)), "{code}");
        }
    }

    #[test]
    fn throttling_codes() {
        for code in THROTTLING_CODES {
            let err = classify_aws_error("Op", Some(code), "msg");
            assert!(matches!(err, AwsError::Throttled { .. }));
        }
    }

    #[test]
    fn iam_propagation_is_not_ready() {
        let err = classify_aws_error(
            "CreateFunction",
            Some("InvalidParameterValueException"),
            "The role defined for the function cannot be assumed by Lambda.",
        );
        assert!(matches!(err, AwsError::NotReady { .. }));

        let cloud: CloudError = err.into();
        assert!(matches!(cloud, CloudError::DependencyNotReady(_)));
    }

    #[test]
    fn other_invalid_parameters_are_sdk_errors() {
        let err = classify_aws_error(
            "CreateFunction",
            Some("InvalidParameterValueException"),
            "Unsupported runtime",
        );
        assert!(matches!(err, AwsError::Sdk { .. }));
    }

    #[test]
    fn unknown_and_missing_codes() {
        let err = classify_aws_error("Op", Some("SomeNewError"), "details");
        assert!(matches!(err, AwsError::Sdk { .. }));
        assert_eq!(err.to_string(), "Op: SomeNewError: details");

        let err2 = classify_aws_error("Op", None, "something failed");
        assert!(matches!(err2, AwsError::Sdk { code: None, .. }));
    }

    #[test]
    fn not_found_maps_to_cloud_not_found() {
        let err: CloudError = classify_aws_error("HeadBucket", Some("NotFound"), "404").into();
        assert!(err.is_not_found());
    }

    #[test]
    fn not_found_as_none_only_swallows_not_found() {
        let missing: Result<(), AwsError> =
            Err(classify_aws_error("GetRole", Some("NoSuchEntity"), "gone"));
        assert!(matches!(not_found_as_none(missing), Ok(None)));

        let denied: Result<(), AwsError> =
            Err(classify_aws_error("GetRole", Some("AccessDenied"), "no"));
        assert!(not_found_as_none(denied).is_err());
    }
}
