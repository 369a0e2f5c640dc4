use std::time::Duration;

use heimdall::{AdmissionResult, HeimdallError, HolderId, Result};

#[test]
fn test_denial_message_carries_occupancy_and_wait() {
    let err = HeimdallError::AdmissionDenied {
        current_slots: 32,
        max_slots: 32,
        estimated_wait: Duration::from_secs(30),
    };
    let msg = err.to_string();
    assert!(msg.contains("32/32"));
    assert!(msg.contains("30s"));
}

#[test]
fn test_result_alias() {
    fn returns_error() -> Result<()> {
        Err(HeimdallError::Transport("connection reset".into()))
    }
    assert!(returns_error().is_err());
}

#[test]
fn test_io_error_is_transport() {
    let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
    let err: HeimdallError = io.into();
    assert!(matches!(err, HeimdallError::Transport(_)));
}

#[test]
fn test_json_error_converts() {
    let err: HeimdallError = serde_json::from_str::<u32>("nope").unwrap_err().into();
    assert!(matches!(err, HeimdallError::Json(_)));
}

// ============================================================================
// Classification
// ============================================================================

#[test]
fn retryable_errors() {
    assert!(
        HeimdallError::AdmissionDenied {
            current_slots: 1,
            max_slots: 1,
            estimated_wait: Duration::from_secs(1),
        }
        .is_retryable()
    );
    assert!(
        HeimdallError::ExternalTimeout {
            timeout: Duration::from_secs(120)
        }
        .is_retryable()
    );
    assert!(HeimdallError::ExternalFailure("502".into()).is_retryable());
}

#[test]
fn internal_errors_are_neither_retryable_nor_visible() {
    let internal = [
        HeimdallError::CacheUnavailable("down".into()),
        HeimdallError::InvalidHolder("dup".into()),
        HeimdallError::Ledger("down".into()),
        HeimdallError::Transport("reset".into()),
        HeimdallError::Protocol("bad frame".into()),
        HeimdallError::Configuration("bad".into()),
    ];
    for err in internal {
        assert!(!err.is_retryable(), "{err} should not be retryable");
        assert!(!err.is_user_visible(), "{err} should not be user visible");
        assert_eq!(err.retry_after(), None);
    }
}

#[test]
fn denied_admission_result_becomes_error() {
    let result = AdmissionResult::denied(4, 4, Duration::from_secs(3));
    let err = result.into_granted().unwrap_err();
    assert_eq!(err.retry_after(), Some(Duration::from_secs(3)));
    assert!(AdmissionResult::granted(1, 4).into_granted().is_ok());
}

#[test]
fn invalid_holder_ids() {
    assert!(HolderId::new("").is_err());
    assert!(HolderId::new("has space").is_err());
    assert!(HolderId::new("x".repeat(200)).is_err());
    assert!(HolderId::new("session-1:job-2").is_ok());
}
