use thiserror::Error;

/// Transport-level failure classes reported by a classifier provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    Timeout,
    Quota,
    Auth,
    Network,
    Http,
    EmptyResponse,
}

impl ProviderErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderErrorKind::Timeout => "timeout",
            ProviderErrorKind::Quota => "quota",
            ProviderErrorKind::Auth => "auth",
            ProviderErrorKind::Network => "network",
            ProviderErrorKind::Http => "http",
            ProviderErrorKind::EmptyResponse => "empty_response",
        }
    }

    /// Classify a non-success HTTP status.
    pub fn from_status(status: u16) -> Self {
        match status {
            429 => ProviderErrorKind::Quota,
            401 | 403 => ProviderErrorKind::Auth,
            408 | 504 => ProviderErrorKind::Timeout,
            _ => ProviderErrorKind::Http,
        }
    }
}

#[derive(Debug, Error)]
pub enum ClassifiedError {
    #[error("provider error ({}): {message}", kind.as_str())]
    Provider {
        kind: ProviderErrorKind,
        message: String,
    },

    #[error("unrecoverable provider output: {0}")]
    Parse(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ClassifiedError {
    pub fn provider(kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        ClassifiedError::Provider {
            kind,
            message: message.into(),
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::provider(ProviderErrorKind::Timeout, message)
    }

    /// Short stable label used in per-item `reason` strings.
    pub fn failure_class(&self) -> &'static str {
        match self {
            ClassifiedError::Provider { kind, .. } => kind.as_str(),
            ClassifiedError::Parse(_) => "parse_failure",
            ClassifiedError::Config(_) => "config",
        }
    }
}

impl From<reqwest::Error> for ClassifiedError {
    fn from(e: reqwest::Error) -> Self {
        let kind = if e.is_timeout() {
            ProviderErrorKind::Timeout
        } else if let Some(status) = e.status() {
            ProviderErrorKind::from_status(status.as_u16())
        } else if e.is_decode() {
            ProviderErrorKind::EmptyResponse
        } else {
            ProviderErrorKind::Network
        };
        ClassifiedError::provider(kind, e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_map_to_failure_classes() {
        assert_eq!(ProviderErrorKind::from_status(429), ProviderErrorKind::Quota);
        assert_eq!(ProviderErrorKind::from_status(401), ProviderErrorKind::Auth);
        assert_eq!(ProviderErrorKind::from_status(504), ProviderErrorKind::Timeout);
        assert_eq!(ProviderErrorKind::from_status(500), ProviderErrorKind::Http);
    }

    #[test]
    fn failure_class_labels() {
        assert_eq!(ClassifiedError::timeout("slow").failure_class(), "timeout");
        assert_eq!(
            ClassifiedError::Parse("bad".into()).failure_class(),
            "parse_failure"
        );
        let quota = ClassifiedError::provider(ProviderErrorKind::Quota, "limit");
        assert_eq!(quota.to_string(), "provider error (quota): limit");
    }
}
