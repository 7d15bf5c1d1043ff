// crates/proto-metrics-core/tests/envelope.rs
// ============================================================================
// Module: Envelope Codec Tests
// Description: Wire layout and strict decoding of envelopes.
// Purpose: Ensure envelopes interoperate with an independent decoder and that
//          malformed records fail closed.
// Dependencies: proto-metrics-core, prost
// ============================================================================
//! ## Overview
//! Encodes envelopes, decodes them with independent prost records, and feeds
//! malformed records back through the strict decoder.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

mod common;

use common::ElementRecord;
use common::EnvelopeRecord;
use common::RepeatedRecord;
use common::SingleRecord;
use prost::Message;
use proto_metrics_core::Envelope;
use proto_metrics_core::MetricsError;
use proto_metrics_core::RepeatedValue;
use proto_metrics_core::WireKind;
use proto_metrics_core::runtime::envelope;

#[test]
fn single_envelope_matches_record_layout() {
    let bytes = envelope::encode_single("pkg.Msg", WireKind::Message, &[8, 1]);
    let record = EnvelopeRecord::decode(bytes.as_slice()).expect("record");
    assert_eq!(record.is_repeated, Some(false));
    assert!(record.repeated.is_none());
    let single = record.single.expect("single");
    assert_eq!(single.r#type, Some(11));
    assert_eq!(single.type_name.as_deref(), Some("pkg.Msg"));
    assert_eq!(single.protobuf, Some(vec![8, 1]));
}

#[test]
fn repeated_envelope_matches_record_layout() {
    let values = vec![
        RepeatedValue::Long(-4),
        RepeatedValue::String("s".to_string()),
        RepeatedValue::Double(0.5),
        RepeatedValue::Bytes(Vec::new()),
    ];
    let bytes = envelope::encode_repeated(&values);
    let record = EnvelopeRecord::decode(bytes.as_slice()).expect("record");
    assert_eq!(record.is_repeated, Some(true));
    let elements = record.repeated.expect("repeated").value;
    assert_eq!(elements.len(), 4);
    assert_eq!(elements[0].int_value, Some(-4));
    assert_eq!(elements[1].string_value.as_deref(), Some("s"));
    assert_eq!(elements[2].double_value, Some(0.5));
    assert_eq!(elements[3].bytes_value, Some(Vec::new()));

    assert_eq!(envelope::decode(&bytes).expect("decode"), Envelope::Repeated(values));
}

#[test]
fn discriminator_must_agree_with_record() {
    let mislabeled = EnvelopeRecord {
        is_repeated: Some(true),
        single: Some(SingleRecord {
            r#type: Some(11),
            type_name: Some("pkg.Msg".to_string()),
            protobuf: Some(vec![8, 1]),
        }),
        repeated: None,
    }
    .encode_to_vec();
    let err = envelope::decode(&mislabeled).expect_err("mislabeled");
    assert!(matches!(err, MetricsError::EnvelopeDecode(_)));

    let flipped = EnvelopeRecord {
        is_repeated: Some(false),
        single: None,
        repeated: Some(RepeatedRecord {
            value: Vec::new(),
        }),
    }
    .encode_to_vec();
    assert!(envelope::decode(&flipped).is_err());
}

#[test]
fn missing_records_are_rejected() {
    let empty_single = EnvelopeRecord {
        is_repeated: Some(false),
        single: None,
        repeated: None,
    }
    .encode_to_vec();
    let err = envelope::decode(&empty_single).expect_err("no single");
    assert_eq!(err.message(), "Envelope has no single record");

    let empty_repeated = EnvelopeRecord {
        is_repeated: Some(true),
        single: None,
        repeated: None,
    }
    .encode_to_vec();
    let err = envelope::decode(&empty_repeated).expect_err("no repeated");
    assert_eq!(err.message(), "Envelope has no repeated record");
}

#[test]
fn repeated_element_without_value_is_rejected() {
    let bytes = EnvelopeRecord {
        is_repeated: Some(true),
        single: None,
        repeated: Some(RepeatedRecord {
            value: vec![ElementRecord::default()],
        }),
    }
    .encode_to_vec();
    let err = envelope::decode(&bytes).expect_err("valueless element");
    assert_eq!(err, MetricsError::EnvelopeDecode("Unknown type in repeated field".to_string()));
}

#[test]
fn missing_payload_differs_from_empty_payload() {
    let missing = envelope::decode(&common::single_record(11, "pkg.Msg", None)).expect("decode");
    let empty =
        envelope::decode(&common::single_record(11, "pkg.Msg", Some(Vec::new()))).expect("decode");
    let (Envelope::Single(missing), Envelope::Single(empty)) = (missing, empty) else {
        panic!("expected single envelopes");
    };
    assert_eq!(missing.payload, None);
    assert_eq!(empty.payload, Some(Vec::new()));
}

#[test]
fn decode_single_message_checks_in_order() {
    let repeated = envelope::encode_repeated(&[RepeatedValue::Long(1)]);
    let err = envelope::decode_single_message(&repeated, "pkg.Msg").expect_err("repeated");
    assert_eq!(err.message(), "Cannot handle nested repeated messages");

    let bytes = envelope::encode_single("pkg.Msg", WireKind::Enum, &[8, 1]);
    let err = envelope::decode_single_message(&bytes, "pkg.Msg").expect_err("wrong kind");
    assert_eq!(err, MetricsError::TypeMismatch("Message field has wrong wire type 14".to_string()));

    let bytes = envelope::encode_single("pkg.Other", WireKind::Message, &[8, 1]);
    let err = envelope::decode_single_message(&bytes, "pkg.Msg").expect_err("wrong name");
    assert!(matches!(err, MetricsError::TypeMismatch(_)));

    let bytes = envelope::encode_single("pkg.Msg", WireKind::Message, &[8, 1]);
    assert_eq!(envelope::decode_single_message(&bytes, "pkg.Msg").expect("payload"), vec![8, 1]);
}

#[test]
fn malformed_bytes_are_rejected() {
    let err = envelope::decode(&[0x0a, 0x05, 0x01]).expect_err("truncated");
    assert!(matches!(err, MetricsError::EnvelopeDecode(_)));
    assert!(err.message().starts_with("Malformed envelope"));
}
