use ems_core::errors::{EmsError, ErrorInfo};

fn sample_info(code: &str, message: &str) -> ErrorInfo {
    ErrorInfo::new(code, message)
        .with_context("slot", "7")
        .with_context("swap", "42")
}

#[test]
fn input_error_surface() {
    let err = EmsError::Input(sample_info("duplicate-slot", "swap references one slot twice"));
    assert_eq!(err.info().code, "duplicate-slot");
    assert!(err.info().context.contains_key("slot"));
}

#[test]
fn structure_error_surface() {
    let err = EmsError::Structure(sample_info("missing-answer", "existence query unanswered"));
    assert_eq!(err.info().code, "missing-answer");
    assert!(err.info().context.contains_key("swap"));
}

#[test]
fn sort_error_surface() {
    let err = EmsError::Sort(sample_info("spill-write", "failed to write spill run"));
    assert_eq!(err.info().code, "spill-write");
}

#[test]
fn errors_serialize_with_family_tag() {
    let err = EmsError::Structure(sample_info("broken-chain", "dependency chain has a gap"));
    let json = serde_json::to_string(&err).unwrap();
    assert!(json.contains("\"family\":\"Structure\""));
    let back: EmsError = serde_json::from_str(&json).unwrap();
    assert_eq!(back, err);
}
