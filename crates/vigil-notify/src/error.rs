/// Errors that can occur within the delivery subsystem.
///
/// Delivery failures local to one webhook call or one device are normally
/// captured in per-target result structures (`WebhookResult`,
/// `DeliveryResult`) rather than raised; this type covers configuration
/// problems and transport errors before a result could be produced.
///
/// # Examples
///
/// ```rust
/// use vigil_notify::error::NotifyError;
///
/// let err = NotifyError::InvalidConfig("missing apns topic".to_string());
/// assert!(err.to_string().contains("apns topic"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// Provider or quiet-hours configuration is missing a required field
    /// or contains an invalid value.
    #[error("Notify: invalid configuration: {0}")]
    InvalidConfig(String),

    /// An HTTP request to an external delivery endpoint failed before a
    /// response was received.
    #[error("Notify: HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// JSON serialization or deserialization failed.
    #[error("Notify: JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Generic delivery error for cases not covered by other variants.
    #[error("Notify: {0}")]
    Other(String),
}

/// Convenience `Result` alias for delivery operations.
pub type Result<T> = std::result::Result<T, NotifyError>;
