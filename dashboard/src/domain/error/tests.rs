//! Tests for domain error construction and serialisation.

use super::*;
use rstest::rstest;
use serde_json::json;

#[rstest]
fn invalid_request_constructor_sets_code() {
    let err = Error::invalid_request("bad");
    assert_eq!(err.code(), ErrorCode::InvalidRequest);
}

#[rstest]
fn try_new_rejects_empty_messages() {
    let result = Error::try_new(ErrorCode::InvalidRequest, "   ");
    assert!(matches!(result, Err(ErrorValidationError::EmptyMessage)));
}

#[rstest]
#[case(Error::backend_transient("pool exhausted"), true)]
#[case(Error::backend_permanent("bad column"), false)]
#[case(Error::forbidden("nope"), false)]
fn transient_flag_follows_backend_details(#[case] error: Error, #[case] expected: bool) {
    assert_eq!(error.is_transient(), expected);
}

#[rstest]
fn serialises_code_in_snake_case() {
    let err = Error::not_found("missing").with_details(json!({ "id": "x" }));
    let value = serde_json::to_value(&err).expect("serialise error");
    assert_eq!(value["code"], json!("not_found"));
    assert_eq!(value["message"], json!("missing"));
    assert_eq!(value["details"]["id"], json!("x"));
}

#[rstest]
fn deserialising_blank_message_fails() {
    let payload = json!({ "code": "forbidden", "message": "  " });
    let result: Result<Error, _> = serde_json::from_value(payload);
    assert!(result.is_err());
}
