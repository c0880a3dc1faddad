use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    // Schema compilation
    #[error("Invalid shape '{shape}': {reason}")]
    Schema { shape: String, reason: String },

    // Codec and builder type checks
    #[error("Type mismatch on '{attribute}': expected {expected}, found {found}")]
    TypeMismatch {
        attribute: String,
        expected: String,
        found: String,
    },

    #[error("Malformed number: {0}")]
    MalformedNumber(String),

    #[error("Malformed attribute: {0}")]
    MalformedAttribute(String),

    // Builder misuse
    #[error("Missing key condition: {0}")]
    MissingKeyCondition(String),

    #[error("Unknown attribute '{attribute}' on shape '{shape}'")]
    UnknownAttribute { shape: String, attribute: String },

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Invalid expression: {0}")]
    InvalidExpression(String),

    #[error("Invalid cursor: {0}")]
    InvalidCursor(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // Registry
    #[error("Shape already registered with a different definition: {0}")]
    DuplicateShape(String),

    #[error("Registry is sealed, cannot register: {0}")]
    RegistryClosed(String),

    #[error("Shape not found: {0}")]
    ShapeNotFound(String),

    // Execution
    #[error("Conditional check failed: {0}")]
    ConditionalCheckFailed(String),

    /// One entry per write of the transaction: the store's reason for
    /// canceling on that write, or `None`
    #[error("Transaction canceled: {0:?}")]
    TransactionCanceled(Vec<Option<String>>),

    #[error("Throttled: {0}")]
    Throttled(String),

    #[error("Capacity exceeded after {attempts} attempts")]
    CapacityExceeded { attempts: u32 },

    #[error("Service error: {0}")]
    Service(String),
}

impl Error {
    /// Returns a stable error code for this error variant.
    /// These codes are stable and can be used by clients for error classification.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Schema { .. } => "SCHEMA_ERROR",
            Error::TypeMismatch { .. } => "TYPE_MISMATCH",
            Error::MalformedNumber(_) => "MALFORMED_NUMBER",
            Error::MalformedAttribute(_) => "MALFORMED_ATTRIBUTE",
            Error::MissingKeyCondition(_) => "MISSING_KEY_CONDITION",
            Error::UnknownAttribute { .. } => "UNKNOWN_ATTRIBUTE",
            Error::InvalidQuery(_) => "INVALID_QUERY",
            Error::InvalidExpression(_) => "INVALID_EXPRESSION",
            Error::InvalidCursor(_) => "INVALID_CURSOR",
            Error::InvalidArgument(_) => "INVALID_ARGUMENT",
            Error::DuplicateShape(_) => "DUPLICATE_SHAPE",
            Error::RegistryClosed(_) => "REGISTRY_CLOSED",
            Error::ShapeNotFound(_) => "SHAPE_NOT_FOUND",
            Error::ConditionalCheckFailed(_) => "CONDITIONAL_CHECK_FAILED",
            Error::TransactionCanceled(_) => "TRANSACTION_CANCELED",
            Error::Throttled(_) => "THROTTLED",
            Error::CapacityExceeded { .. } => "CAPACITY_EXCEEDED",
            Error::Service(_) => "SERVICE_ERROR",
        }
    }

    /// Returns true if this error is potentially retryable.
    ///
    /// Only store throttling is transient. Conditional-check failures are a
    /// logical outcome and service errors are passed through untouched.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Throttled(_) => true,

            Error::Schema { .. }
            | Error::TypeMismatch { .. }
            | Error::MalformedNumber(_)
            | Error::MalformedAttribute(_)
            | Error::MissingKeyCondition(_)
            | Error::UnknownAttribute { .. }
            | Error::InvalidQuery(_)
            | Error::InvalidExpression(_)
            | Error::InvalidCursor(_)
            | Error::InvalidArgument(_)
            | Error::DuplicateShape(_)
            | Error::RegistryClosed(_)
            | Error::ShapeNotFound(_)
            | Error::ConditionalCheckFailed(_)
            | Error::TransactionCanceled(_)
            | Error::CapacityExceeded { .. }
            | Error::Service(_) => false,
        }
    }

    /// Shorthand for a [`Error::TypeMismatch`].
    pub fn type_mismatch(
        attribute: impl Into<String>,
        expected: impl ToString,
        found: impl ToString,
    ) -> Error {
        Error::TypeMismatch {
            attribute: attribute.into(),
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }

    /// Shorthand for a [`Error::Schema`].
    pub fn schema(shape: impl Into<String>, reason: impl Into<String>) -> Error {
        Error::Schema {
            shape: shape.into(),
            reason: reason.into(),
        }
    }

    /// Re-labels the attribute of a `TypeMismatch` raised while decoding a
    /// nested value, so the caller sees the full attribute path.
    pub fn at_attribute(self, attribute: &str) -> Error {
        match self {
            Error::TypeMismatch {
                attribute: inner,
                expected,
                found,
            } => {
                let attribute = if inner.is_empty() {
                    attribute.to_string()
                } else {
                    format!("{}.{}", attribute, inner)
                };
                Error::TypeMismatch {
                    attribute,
                    expected,
                    found,
                }
            }
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
