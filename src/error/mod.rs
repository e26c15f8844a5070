//! The unified error handling system for the engine.

use std::fmt::Display;

pub use types::ResilienceError;

/// A unified `Result` type for the entire application.
///
/// All functions that can fail should return this type.
pub type Result<T> = std::result::Result<T, ResilienceError>;

pub mod types;

/// Context trait for adding context to errors.
pub trait Context<T, E> {
    #[track_caller]
    fn context<C>(self, context: C) -> Result<T>
    where
        C: Display;

    #[track_caller]
    fn with_context<C, F>(self, context: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: Display;
}

impl<T, E> Context<T, E> for std::result::Result<T, E>
where
    E: Into<ResilienceError>,
{
    #[track_caller]
    fn context<C>(self, context: C) -> Result<T>
    where
        C: Display,
    {
        self.with_context(|| context)
    }

    #[track_caller]
    fn with_context<C, F>(self, context: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: Display,
    {
        match self {
            Ok(value) => Ok(value),
            Err(error) => {
                let context_message = context().to_string();
                Err(ResilienceError::Context {
                    context: context_message,
                    source: Box::new(error.into()),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_response_parts() {
        let err = ResilienceError::validation("latency_ms", "must be <= 5000");
        let (status, code) = err.to_http_response_parts();
        assert_eq!(status, axum::http::StatusCode::BAD_REQUEST);
        assert_eq!(code, "VALIDATION_ERROR");

        let err = ResilienceError::circuit_open("alpha");
        let (_, code) = err.to_http_response_parts();
        assert_eq!(code, "CIRCUIT_OPEN");
    }

    #[test]
    fn test_context_preserves_response_parts() {
        let err: Result<()> = Err(ResilienceError::provider_not_found("ghost"));
        let wrapped = err.context("while injecting failure").unwrap_err();
        let (status, code) = wrapped.to_http_response_parts();
        assert_eq!(status, axum::http::StatusCode::NOT_FOUND);
        assert_eq!(code, "PROVIDER_NOT_FOUND");
    }

    #[test]
    fn test_circuit_open_is_not_transient() {
        // 熔断信号不应被重试逻辑当作瞬时存储故障
        assert!(!ResilienceError::circuit_open("alpha").is_transient());
        assert!(ResilienceError::persistence("store down").is_transient());
    }
}
