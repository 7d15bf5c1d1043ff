// crates/proto-metrics-core/src/runtime/envelope.rs
// ============================================================================
// Module: Envelope Codec
// Description: Self-describing wrapper for sub-messages and repeated values.
// Purpose: Carry typed partial results through a scalar/blob-only channel.
// Dependencies: prost, crate::core
// ============================================================================

//! ## Overview
//! An envelope is a small protobuf message that either wraps one serialized
//! sub-message (with its wire kind and full type name) or carries an ordered
//! list of scalar values destined for a repeated field. Envelopes never nest:
//! inner messages are serialized first and then wrapped.
//!
//! Decoding is strict. Oversize input is rejected, the discriminator must agree
//! with the populated record, and a single record without a payload is an error
//! distinct from one with a zero-length payload.

// ============================================================================
// SECTION: Imports
// ============================================================================

use prost::Message;

use self::wire::BuilderResult;
use self::wire::ElementValue;
use self::wire::ProtoBuilderResult;
use self::wire::RepeatedBuilderResult;
use self::wire::RepeatedElement;
use self::wire::SingleBuilderResult;
use crate::core::MetricsError;
use crate::core::MetricsResult;
use crate::core::SqlValue;
use crate::core::WireKind;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Largest message or envelope accepted, matching the wire format's ceiling.
pub const MAX_MESSAGE_BYTES: usize = (1 << 28) - 1;

// ============================================================================
// SECTION: Wire Records
// ============================================================================

/// Protobuf records backing the envelope wire format.
mod wire {
    #![allow(
        dead_code,
        clippy::missing_docs_in_private_items,
        reason = "prost derives accessors the codec does not call."
    )]

    use prost::Message;

    /// Outer envelope record.
    #[derive(Clone, PartialEq, Message)]
    pub(super) struct ProtoBuilderResult {
        /// Discriminator: true for repeated value lists.
        #[prost(bool, optional, tag = "1")]
        pub(super) is_repeated: Option<bool>,
        /// Populated record.
        #[prost(oneof = "BuilderResult", tags = "2, 3")]
        pub(super) result: Option<BuilderResult>,
    }

    /// One-of payload of the outer envelope.
    #[derive(Clone, PartialEq, prost::Oneof)]
    pub(super) enum BuilderResult {
        /// Single serialized sub-message.
        #[prost(message, tag = "2")]
        Single(SingleBuilderResult),
        /// Repeated value list.
        #[prost(message, tag = "3")]
        Repeated(RepeatedBuilderResult),
    }

    /// Single sub-message record.
    #[derive(Clone, PartialEq, Message)]
    pub(super) struct SingleBuilderResult {
        /// Declared `FieldDescriptorProto.Type` number.
        #[prost(uint32, optional, tag = "1")]
        pub(super) r#type: Option<u32>,
        /// Declared full type name.
        #[prost(string, optional, tag = "2")]
        pub(super) type_name: Option<String>,
        /// Serialized sub-message payload.
        #[prost(bytes = "vec", optional, tag = "3")]
        pub(super) protobuf: Option<Vec<u8>>,
    }

    /// Repeated value list record.
    #[derive(Clone, PartialEq, Message)]
    pub(super) struct RepeatedBuilderResult {
        /// Ordered elements.
        #[prost(message, repeated, tag = "1")]
        pub(super) value: Vec<RepeatedElement>,
    }

    /// One repeated element.
    #[derive(Clone, PartialEq, Message)]
    pub(super) struct RepeatedElement {
        /// Populated value.
        #[prost(oneof = "ElementValue", tags = "1, 2, 3, 4")]
        pub(super) value: Option<ElementValue>,
    }

    /// One-of payload of a repeated element.
    #[derive(Clone, PartialEq, prost::Oneof)]
    pub(super) enum ElementValue {
        /// Integer element.
        #[prost(int64, tag = "1")]
        IntValue(i64),
        /// Text element.
        #[prost(string, tag = "2")]
        StringValue(String),
        /// Float element.
        #[prost(double, tag = "3")]
        DoubleValue(f64),
        /// Byte element (empty means null placeholder).
        #[prost(bytes = "vec", tag = "4")]
        BytesValue(Vec<u8>),
    }
}

// ============================================================================
// SECTION: Envelope Types
// ============================================================================

/// Decoded envelope.
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    /// One serialized sub-message.
    Single(SingleEnvelope),
    /// Ordered values for a repeated field.
    Repeated(Vec<RepeatedValue>),
}

/// Single sub-message envelope.
///
/// # Invariants
/// - `payload` is `None` only when the record omitted it on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SingleEnvelope {
    /// Declared `FieldDescriptorProto.Type` number.
    pub declared_type: u32,
    /// Declared full type name.
    pub type_name: String,
    /// Serialized payload.
    pub payload: Option<Vec<u8>>,
}

impl SingleEnvelope {
    /// Returns the declared wire kind when it is a known type number.
    #[must_use]
    pub const fn wire_kind(&self) -> Option<WireKind> {
        WireKind::from_descriptor_type(self.declared_type)
    }
}

/// One element of a repeated envelope.
#[derive(Debug, Clone, PartialEq)]
pub enum RepeatedValue {
    /// Integer element.
    Long(i64),
    /// Float element.
    Double(f64),
    /// Text element.
    String(String),
    /// Byte element; empty stands for a null placeholder.
    Bytes(Vec<u8>),
}

impl RepeatedValue {
    /// Borrows the element as a [`SqlValue`].
    #[must_use]
    pub fn as_value(&self) -> SqlValue<'_> {
        match self {
            Self::Long(value) => SqlValue::Long(*value),
            Self::Double(value) => SqlValue::Double(*value),
            Self::String(value) => SqlValue::String(value),
            Self::Bytes(value) => SqlValue::Bytes(value),
        }
    }
}

// ============================================================================
// SECTION: Encoding
// ============================================================================

/// Encodes a single envelope around an already-serialized payload.
#[must_use]
pub fn encode_single(type_name: &str, wire_kind: WireKind, payload: &[u8]) -> Vec<u8> {
    ProtoBuilderResult {
        is_repeated: Some(false),
        result: Some(BuilderResult::Single(SingleBuilderResult {
            r#type: Some(wire_kind.descriptor_type()),
            type_name: Some(type_name.to_string()),
            protobuf: Some(payload.to_vec()),
        })),
    }
    .encode_to_vec()
}

/// Encodes a repeated envelope preserving element order.
#[must_use]
pub fn encode_repeated(values: &[RepeatedValue]) -> Vec<u8> {
    let value = values
        .iter()
        .map(|element| RepeatedElement {
            value: Some(match element {
                RepeatedValue::Long(value) => ElementValue::IntValue(*value),
                RepeatedValue::Double(value) => ElementValue::DoubleValue(*value),
                RepeatedValue::String(value) => ElementValue::StringValue(value.clone()),
                RepeatedValue::Bytes(value) => ElementValue::BytesValue(value.clone()),
            }),
        })
        .collect();
    ProtoBuilderResult {
        is_repeated: Some(true),
        result: Some(BuilderResult::Repeated(RepeatedBuilderResult {
            value,
        })),
    }
    .encode_to_vec()
}

// ============================================================================
// SECTION: Decoding
// ============================================================================

/// Decodes and structurally validates an envelope.
///
/// # Errors
///
/// Returns [`MetricsError::EnvelopeDecode`] for oversize, malformed, or
/// inconsistently tagged input.
pub fn decode(bytes: &[u8]) -> MetricsResult<Envelope> {
    check_size(bytes.len())?;
    let outer = ProtoBuilderResult::decode(bytes)
        .map_err(|err| MetricsError::EnvelopeDecode(format!("Malformed envelope: {err}")))?;
    let is_repeated = outer.is_repeated.unwrap_or(false);
    match (is_repeated, outer.result) {
        (false, Some(BuilderResult::Single(single))) => Ok(Envelope::Single(SingleEnvelope {
            declared_type: single.r#type.unwrap_or_default(),
            type_name: single.type_name.unwrap_or_default(),
            payload: single.protobuf,
        })),
        (true, Some(BuilderResult::Repeated(repeated))) => {
            let mut values = Vec::with_capacity(repeated.value.len());
            for element in repeated.value {
                values.push(match element.value {
                    Some(ElementValue::IntValue(value)) => RepeatedValue::Long(value),
                    Some(ElementValue::DoubleValue(value)) => RepeatedValue::Double(value),
                    Some(ElementValue::StringValue(value)) => RepeatedValue::String(value),
                    Some(ElementValue::BytesValue(value)) => RepeatedValue::Bytes(value),
                    None => {
                        return Err(MetricsError::EnvelopeDecode(
                            "Unknown type in repeated field".to_string(),
                        ));
                    }
                });
            }
            Ok(Envelope::Repeated(values))
        }
        (false, Some(BuilderResult::Repeated(_))) | (true, Some(BuilderResult::Single(_))) => {
            Err(MetricsError::EnvelopeDecode(
                "Envelope discriminator does not match its record".to_string(),
            ))
        }
        (false, None) => {
            Err(MetricsError::EnvelopeDecode("Envelope has no single record".to_string()))
        }
        (true, None) => {
            Err(MetricsError::EnvelopeDecode("Envelope has no repeated record".to_string()))
        }
    }
}

/// Validates a non-empty single message envelope and returns its payload.
///
/// Checks, in order: size bound, not repeated, declared kind is message,
/// declared type name equals `expected_type`, payload present and non-empty.
///
/// # Errors
///
/// Returns [`MetricsError::EnvelopeDecode`] for structural failures and
/// [`MetricsError::TypeMismatch`] for wire kind or type name mismatches.
pub fn decode_single_message(bytes: &[u8], expected_type: &str) -> MetricsResult<Vec<u8>> {
    check_size(bytes.len())?;
    let single = match decode(bytes)? {
        Envelope::Single(single) => single,
        Envelope::Repeated(_) => {
            return Err(MetricsError::EnvelopeDecode(
                "Cannot handle nested repeated messages".to_string(),
            ));
        }
    };
    if single.wire_kind() != Some(WireKind::Message) {
        return Err(MetricsError::TypeMismatch(format!(
            "Message field has wrong wire type {}",
            single.declared_type
        )));
    }
    if single.type_name != expected_type {
        return Err(MetricsError::TypeMismatch(format!(
            "Field has wrong type (expected {expected_type}, was {})",
            single.type_name
        )));
    }
    let Some(payload) = single.payload else {
        return Err(MetricsError::EnvelopeDecode("Message has no proto bytes".to_string()));
    };
    if payload.is_empty() {
        return Err(MetricsError::EnvelopeDecode("Field has zero size".to_string()));
    }
    Ok(payload)
}

/// Rejects inputs above [`MAX_MESSAGE_BYTES`].
fn check_size(size: usize) -> MetricsResult<()> {
    if size > MAX_MESSAGE_BYTES {
        return Err(MetricsError::EnvelopeDecode(format!(
            "Message has size {size} which is larger than the maximum allowed message size \
             {MAX_MESSAGE_BYTES}"
        )));
    }
    Ok(())
}

// ============================================================================
// SECTION: Tests
// ============================================================================
