//! Unit tests for `DiagnosticRecord` serialization.
//!
//! The record format is consumed by scripts: key names, key order, and the
//! omission of absent values are all part of the contract.

use toolbox_watchdog::{AppError, DiagnosticRecord, UnexpectedError};

#[test]
fn not_found_scenario_renders_exact_record() {
    let err = AppError::not_found("Service not found").with_code("ERR_404");
    let record = DiagnosticRecord::from_diagnostic(&err);
    let json = record.to_pretty_json().expect("serialize");
    assert_eq!(
        json,
        "{\n  \"code\": \"ERR_404\",\n  \"message\": \"Service not found\",\n  \"class\": \"NotFoundError\"\n}"
    );
}

#[test]
fn absent_code_key_is_omitted() {
    let err = AppError::generic("no code here");
    let json = DiagnosticRecord::from_diagnostic(&err)
        .to_pretty_json()
        .expect("serialize");
    let value: serde_json::Value = serde_json::from_str(&json).expect("valid json");
    assert!(value.get("code").is_none(), "code key must be absent: {json}");
    assert!(!json.contains("null"));
}

#[test]
fn empty_code_is_treated_as_absent() {
    let err = AppError::usage("bad flags").with_code("");
    let record = DiagnosticRecord::from_diagnostic(&err);
    assert_eq!(record.code, None);
    assert!(!record.to_pretty_json().expect("serialize").contains("\"code\""));
}

#[test]
fn keys_follow_stable_order() {
    let err = AppError::remote("upstream failed")
        .with_code("E_UPSTREAM")
        .with_stacktrace(vec!["client.rs:42".into()]);
    let json = DiagnosticRecord::from_diagnostic(&err)
        .to_pretty_json()
        .expect("serialize");

    let positions: Vec<usize> = ["\"code\"", "\"message\"", "\"class\"", "\"stacktrace\""]
        .iter()
        .map(|key| json.find(key).expect("key present"))
        .collect();
    assert!(
        positions.windows(2).all(|w| w[0] < w[1]),
        "keys out of order: {json}"
    );
}

#[test]
fn unexpected_record_uses_type_name_and_frames() {
    let err = UnexpectedError::from_parts(
        "std::io::error::Error",
        "permission denied",
        vec!["a".into(), "b".into()],
    );
    let record = DiagnosticRecord::from_diagnostic(&err);
    assert_eq!(record.code, None);
    assert_eq!(record.class, "std::io::error::Error");
    assert_eq!(record.message, "permission denied");
    assert_eq!(record.stacktrace, Some(vec!["a".to_owned(), "b".to_owned()]));
}

#[test]
fn empty_stacktrace_is_omitted() {
    let err = AppError::io("disk full").with_stacktrace(Vec::new());
    let json = DiagnosticRecord::from_diagnostic(&err)
        .to_pretty_json()
        .expect("serialize");
    assert!(!json.contains("stacktrace"));
}

#[test]
fn record_round_trips_through_json() {
    let err = AppError::not_found("Service not found").with_code("ERR_404");
    let record = DiagnosticRecord::from_diagnostic(&err);
    let parsed: DiagnosticRecord =
        serde_json::from_str(&record.to_pretty_json().expect("serialize")).expect("parse");
    assert_eq!(parsed, record);
}

#[test]
fn equivalent_errors_render_identically() {
    let a = AppError::config("bad key").with_stacktrace(vec!["x".into()]);
    let b = AppError::config("bad key").with_stacktrace(vec!["x".into()]);
    assert_eq!(
        DiagnosticRecord::from_diagnostic(&a).to_pretty_json().unwrap(),
        DiagnosticRecord::from_diagnostic(&b).to_pretty_json().unwrap()
    );
}
