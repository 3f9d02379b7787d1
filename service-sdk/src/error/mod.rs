//! Error handling for the service SDK
//!
//! This module provides the error taxonomy shared by every upstream call:
//! - Transport failures (timeouts, unreachable hosts)
//! - Non-2xx HTTP answers, carrying the status code
//! - Circuit breaker rejections
//! - Context (service, endpoint, attempts) attached as the error travels up

use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

pub mod mapping;

/// Result type for service SDK operations
pub type Result<T> = std::result::Result<T, ServiceError>;

/// Main error type for upstream service calls
#[derive(Error, Debug)]
pub enum ServiceError {
    /// The request did not complete within its timeout
    #[error("Timeout error: {0}")]
    Timeout(String),

    /// Connection refused, DNS failure or any other transport failure
    #[error("Service unreachable: {0}")]
    Unreachable(String),

    /// The service answered with a non-2xx status
    #[error("HTTP error {status}: {message}")]
    Http { status: u16, message: String },

    /// The circuit breaker for the service is open
    #[error("Circuit open: {0}")]
    CircuitOpen(String),

    /// No endpoint is registered under the requested name
    #[error("Unknown service: {0}")]
    UnknownService(String),

    /// Response body could not be decoded
    #[error("Parsing error: {0}")]
    Parsing(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Errors with additional context
    #[error("{inner}")]
    WithContext {
        inner: Box<ServiceError>,
        context: ErrorContext,
    },
}

/// Flat classification of a [`ServiceError`], independent of attached context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Timeout,
    Unreachable,
    Http(u16),
    CircuitOpen,
    UnknownService,
    Parsing,
    Configuration,
}

impl ServiceError {
    /// Create a timeout error
    pub fn timeout(message: impl Into<String>) -> Self {
        ServiceError::Timeout(message.into())
    }

    /// Create an unreachable error
    pub fn unreachable(message: impl Into<String>) -> Self {
        ServiceError::Unreachable(message.into())
    }

    /// Create an HTTP status error
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        ServiceError::Http {
            status,
            message: message.into(),
        }
    }

    /// Create a circuit open error
    pub fn circuit_open(service: impl Into<String>) -> Self {
        ServiceError::CircuitOpen(service.into())
    }

    /// Create an unknown service error
    pub fn unknown_service(service: impl Into<String>) -> Self {
        ServiceError::UnknownService(service.into())
    }

    /// Create a parsing error
    pub fn parsing(message: impl Into<String>) -> Self {
        ServiceError::Parsing(message.into())
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        ServiceError::Configuration(message.into())
    }

    /// Add context to an existing error
    pub fn with_context(self, context: ErrorContext) -> Self {
        match self {
            // Merge instead of nesting so the chain stays one level deep
            ServiceError::WithContext { inner, context: mut existing } => {
                existing.merge(context);
                ServiceError::WithContext {
                    inner,
                    context: existing,
                }
            }
            other => ServiceError::WithContext {
                inner: Box::new(other),
                context,
            },
        }
    }

    /// Add a single context key/value to an existing error
    pub fn with_context_value(self, key: impl Into<String>, value: impl fmt::Display) -> Self {
        let mut context = ErrorContext::new();
        context.add(key, value);
        self.with_context(context)
    }

    /// The error without any attached context
    pub fn root(&self) -> &ServiceError {
        match self {
            ServiceError::WithContext { inner, .. } => inner.root(),
            other => other,
        }
    }

    /// The flat error kind callers branch on
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::Timeout(_) => ErrorKind::Timeout,
            ServiceError::Unreachable(_) => ErrorKind::Unreachable,
            ServiceError::Http { status, .. } => ErrorKind::Http(*status),
            ServiceError::CircuitOpen(_) => ErrorKind::CircuitOpen,
            ServiceError::UnknownService(_) => ErrorKind::UnknownService,
            ServiceError::Parsing(_) => ErrorKind::Parsing,
            ServiceError::Configuration(_) => ErrorKind::Configuration,
            ServiceError::WithContext { inner, .. } => inner.kind(),
        }
    }

    /// Get the HTTP status code if the service answered
    pub fn status_code(&self) -> Option<u16> {
        match self.kind() {
            ErrorKind::Http(status) => Some(status),
            _ => None,
        }
    }

    /// Get the attached context if any
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            ServiceError::WithContext { context, .. } => Some(context),
            _ => None,
        }
    }

    /// Check if this is a retryable error
    pub fn is_retryable(&self) -> bool {
        match self.kind() {
            ErrorKind::Timeout | ErrorKind::Unreachable => true,
            ErrorKind::Http(status) => mapping::is_retryable_status(status),
            _ => false,
        }
    }

    /// Check if the service answered and refused this particular request
    /// (a 4xx other than 408/429). Such answers say nothing about the
    /// service's health.
    pub fn is_client_rejection(&self) -> bool {
        match self.kind() {
            ErrorKind::Http(status) => (400..500).contains(&status) && !self.is_retryable(),
            _ => false,
        }
    }

    /// Check if this error means the circuit breaker rejected the call
    pub fn is_circuit_open(&self) -> bool {
        self.kind() == ErrorKind::CircuitOpen
    }
}

/// Error context information
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    /// Service that generated the error
    pub service: Option<String>,

    /// Endpoint that was called
    pub endpoint: Option<String>,

    /// Number of attempts made before giving up
    pub attempts: Option<u32>,

    /// Additional context data
    pub data: HashMap<String, String>,
}

impl ErrorContext {
    /// Create a new error context
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new error context for a specific service
    pub fn for_service(service: impl Into<String>) -> Self {
        Self {
            service: Some(service.into()),
            ..Self::default()
        }
    }

    /// Add an endpoint
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Add the attempt count
    pub fn attempts(mut self, attempts: u32) -> Self {
        self.attempts = Some(attempts);
        self
    }

    /// Add a context value
    pub fn add<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: fmt::Display,
    {
        self.data.insert(key.into(), value.to_string());
    }

    fn merge(&mut self, other: ErrorContext) {
        if other.service.is_some() {
            self.service = other.service;
        }
        if other.endpoint.is_some() {
            self.endpoint = other.endpoint;
        }
        if other.attempts.is_some() {
            self.attempts = other.attempts;
        }
        self.data.extend(other.data);
    }
}

/// Convert reqwest transport errors to ServiceError
impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ServiceError::timeout(format!("Request timed out: {}", err))
        } else if err.is_decode() || err.is_body() {
            ServiceError::parsing(format!("Response decode error: {}", err))
        } else if let Some(status) = err.status() {
            ServiceError::http(status.as_u16(), err.to_string())
        } else {
            ServiceError::unreachable(format!("Connection error: {}", err))
        }
    }
}

/// Convert serde_json errors to ServiceError
impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        ServiceError::parsing(format!("JSON error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_sees_through_context() {
        let err = ServiceError::http(503, "down")
            .with_context(ErrorContext::for_service("cache").attempts(3));

        assert_eq!(err.kind(), ErrorKind::Http(503));
        assert_eq!(err.status_code(), Some(503));
        assert_eq!(err.context().and_then(|c| c.attempts), Some(3));
    }

    #[test]
    fn test_context_is_merged_not_nested() {
        let err = ServiceError::timeout("slow")
            .with_context(ErrorContext::for_service("rag"))
            .with_context_value("attempt", 2);

        match &err {
            ServiceError::WithContext { inner, context } => {
                assert!(matches!(**inner, ServiceError::Timeout(_)));
                assert_eq!(context.service.as_deref(), Some("rag"));
                assert_eq!(context.data.get("attempt").map(String::as_str), Some("2"));
            }
            other => panic!("expected context wrapper, got {:?}", other),
        }
    }

    #[test]
    fn test_retryable_classification() {
        assert!(ServiceError::timeout("t").is_retryable());
        assert!(ServiceError::unreachable("u").is_retryable());
        assert!(ServiceError::http(502, "bad gateway").is_retryable());
        assert!(ServiceError::http(429, "slow down").is_retryable());
        assert!(!ServiceError::http(404, "missing").is_retryable());
        assert!(!ServiceError::circuit_open("kg").is_retryable());
        assert!(!ServiceError::parsing("junk").is_retryable());
    }
}
