/*!
 * Tests for error classification and conversion
 */

use nodeweave::errors::{
    AppError, DocumentError, ProviderError, TranslationError, ValidationError,
};

#[test]
fn test_providerError_isRetryable_shouldSeparateTransientFromPermanent() {
    assert!(ProviderError::Timeout("slow".to_string()).is_retryable());
    assert!(ProviderError::ConnectionError("reset".to_string()).is_retryable());
    assert!(ProviderError::from_status(429, "busy").is_retryable());
    assert!(ProviderError::from_status(500, "oops").is_retryable());
    assert!(ProviderError::from_status(408, "late").is_retryable());
    assert!(!ProviderError::from_status(400, "bad request").is_retryable());
    assert!(!ProviderError::from_status(403, "forbidden").is_retryable());
}

#[test]
fn test_translationError_fromValidation_shouldNeverRetry() {
    let err: TranslationError = ValidationError::EmptyNode(3).into();
    assert!(!err.is_retryable());
    assert_eq!(err.to_string(), "Validation error: Node 3 has no translatable content");
}

#[test]
fn test_appError_shouldWrapDocumentErrors() {
    let err: AppError = DocumentError::SessionMismatch {
        session_id: "abc".to_string(),
        expected: 4,
        actual: 5,
    }
    .into();
    assert_eq!(
        err.to_string(),
        "Document error: Session 'abc' tracks 4 nodes but the document has 5"
    );
}
