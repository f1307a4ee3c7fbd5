use feeder_core::{FeedRequest, PayloadError};
use rstest::rstest;

const NOW: u64 = 1_700_000_000;

#[rstest]
fn json_with_as_of() {
    let req = FeedRequest::from_json(r#"{"rotations": 3, "asOf": 1000}"#, NOW).unwrap();
    assert_eq!(req, FeedRequest::new(1000, NOW, 3));
}

#[rstest]
fn json_as_of_defaults_to_now() {
    let req = FeedRequest::from_json(r#"{"rotations": 2}"#, NOW).unwrap();
    assert_eq!(req.as_of, NOW);
    assert_eq!(req.adjusted_time_sec, NOW);
}

#[rstest]
#[case(r#"{"asOf": 5}"#, PayloadError::Missing("rotations"))]
#[case(r#"{"rotations": 0}"#, PayloadError::NotPositive { field: "rotations", value: "0".into() })]
#[case(r#"{"rotations": -2}"#, PayloadError::NotPositive { field: "rotations", value: "-2".into() })]
#[case(r#"{"rotations": 2, "asOf": 0}"#, PayloadError::NotPositive { field: "asOf", value: "0".into() })]
#[case(r#"{"rotations": 5000000000}"#, PayloadError::OutOfRange { field: "rotations", value: "5000000000".into() })]
fn json_field_errors(#[case] payload: &str, #[case] expected: PayloadError) {
    assert_eq!(FeedRequest::from_json(payload, NOW), Err(expected));
}

#[rstest]
#[case("not json")]
#[case(r#"{"rotations": "3"}"#)]
#[case(r#"{"rotations": 1.5}"#)]
fn malformed_json(#[case] payload: &str) {
    assert!(matches!(
        FeedRequest::from_json(payload, NOW),
        Err(PayloadError::Json(_))
    ));
}

#[rstest]
fn form_requires_both_fields() {
    let req = FeedRequest::from_form([("rotations", "4"), ("asOf", " 1234 ")], NOW).unwrap();
    assert_eq!(req, FeedRequest::new(1234, NOW, 4));

    assert_eq!(
        FeedRequest::from_form([("rotations", "4")], NOW),
        Err(PayloadError::Missing("asOf"))
    );
    assert_eq!(
        FeedRequest::from_form([("asOf", "4")], NOW),
        Err(PayloadError::Missing("rotations"))
    );
}

#[rstest]
#[case("abc")]
#[case("0")]
#[case("-1")]
fn form_values_must_be_positive_integers(#[case] raw: &str) {
    let err = FeedRequest::from_form([("rotations", raw), ("asOf", "10")], NOW).unwrap_err();
    assert!(matches!(err, PayloadError::NotPositive { field: "rotations", .. }));
}

#[rstest]
fn form_ignores_unknown_fields() {
    let req =
        FeedRequest::from_form([("x", "1"), ("rotations", "1"), ("asOf", "2")], NOW).unwrap();
    assert_eq!(req.rotations, 1);
}
