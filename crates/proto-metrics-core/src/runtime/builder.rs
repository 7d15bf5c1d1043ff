// crates/proto-metrics-core/src/runtime/builder.rs
// ============================================================================
// Module: Message Builder
// Description: Descriptor-driven protobuf encoder fed one SQL value at a time.
// Purpose: Serialize typed field writes for a message known only at runtime.
// Dependencies: bytes, prost, crate::core, crate::runtime::envelope
// ============================================================================

//! ## Overview
//! A [`MessageBuilder`] accumulates field writes against one message
//! descriptor. Field writes are appended to the output buffer in call order with
//! no deduplication: writing a scalar field twice yields two wire entries and
//! decoders keep the last one, while repeated fields accumulate.
//!
//! Nested messages and repeated fields arrive as envelope blobs. Repeated
//! envelopes are replayed element by element; single envelopes are validated
//! against the field's declared type before their payload is embedded.
//!
//! Builders are single-use. Partial writes are not rolled back on error, so a
//! builder that reported a failure must be discarded.

// ============================================================================
// SECTION: Imports
// ============================================================================

use bytes::BufMut;
use prost::encoding::WireType;
use prost::encoding::encode_key;
use prost::encoding::encode_varint;

use crate::core::EnumDescriptor;
use crate::core::FieldDescriptor;
use crate::core::MessageDescriptor;
use crate::core::MetricsError;
use crate::core::MetricsResult;
use crate::core::SchemaRegistry;
use crate::core::SqlValue;
use crate::core::WireKind;
use crate::runtime::envelope;
use crate::runtime::envelope::Envelope;

// ============================================================================
// SECTION: Builder
// ============================================================================

/// Accumulates typed field writes for one message.
///
/// # Invariants
/// - `buffer` only ever holds complete, well-formed field entries.
#[derive(Debug)]
pub struct MessageBuilder<'a> {
    /// Registry used to resolve enum types.
    registry: &'a SchemaRegistry,
    /// Descriptor of the message being built.
    descriptor: &'a MessageDescriptor,
    /// Serialized field entries in write order.
    buffer: Vec<u8>,
}

impl<'a> MessageBuilder<'a> {
    /// Creates a builder for `descriptor`.
    #[must_use]
    pub const fn new(registry: &'a SchemaRegistry, descriptor: &'a MessageDescriptor) -> Self {
        Self {
            registry,
            descriptor,
            buffer: Vec::new(),
        }
    }

    /// Creates a builder for the message named `type_name`.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::SchemaResolution`] when the type is unknown.
    pub fn for_message(registry: &'a SchemaRegistry, type_name: &str) -> MetricsResult<Self> {
        Ok(Self::new(registry, registry.message(type_name)?))
    }

    /// Returns the descriptor of the message being built.
    #[must_use]
    pub const fn descriptor(&self) -> &'a MessageDescriptor {
        self.descriptor
    }

    /// Returns true when no field has been written.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Appends `value` to the field named `field_name`.
    ///
    /// Null values leave the field absent. Repeated fields only accept a
    /// repeated envelope blob, whose elements are written in order.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError`] when the field is unknown, the value kind does
    /// not fit the field, or a nested envelope fails validation. An unknown
    /// field never mutates the builder.
    pub fn append(&mut self, field_name: &str, value: SqlValue<'_>) -> MetricsResult<()> {
        let descriptor = self.descriptor;
        let Some(field) = descriptor.find_field(field_name) else {
            return Err(MetricsError::SchemaResolution(format!(
                "Field with name {field_name} not found in proto type {}",
                descriptor.full_name()
            )));
        };
        if matches!(value, SqlValue::Null) {
            return Ok(());
        }
        if field.repeated {
            return self.append_repeated(field, value);
        }
        self.write_value(field, value)
    }

    /// Serializes the written fields as a plain message.
    #[must_use]
    pub fn serialize_raw(self) -> Vec<u8> {
        self.buffer
    }

    /// Serializes the message wrapped in a single envelope.
    ///
    /// Returns an empty vector when nothing was written.
    #[must_use]
    pub fn serialize_as_envelope(self) -> Vec<u8> {
        if self.buffer.is_empty() {
            return Vec::new();
        }
        envelope::encode_single(self.descriptor.full_name(), WireKind::Message, &self.buffer)
    }

    // ------------------------------------------------------------------------
    // Repeated replay
    // ------------------------------------------------------------------------

    /// Decodes a repeated envelope and writes each element in order.
    fn append_repeated(&mut self, field: &FieldDescriptor, value: SqlValue<'_>) -> MetricsResult<()> {
        let SqlValue::Bytes(bytes) = value else {
            return Err(MetricsError::TypeMismatch(format!(
                "Unexpected {} value for repeated field {} in proto type {}",
                value.kind(),
                field.name,
                self.descriptor.full_name()
            )));
        };
        let decoded = envelope::decode(bytes).map_err(|err| {
            err.with_context(&format!(
                "[Field {} in message {}]",
                field.name,
                self.descriptor.full_name()
            ))
        })?;
        let Envelope::Repeated(values) = decoded else {
            return Err(MetricsError::EnvelopeDecode(format!(
                "Unexpected message value for repeated field {} in proto type {}",
                field.name,
                self.descriptor.full_name()
            )));
        };
        for element in &values {
            self.write_value(field, element.as_value())?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Dispatch
    // ------------------------------------------------------------------------

    /// Writes one value under `field`, dispatching on the source kind.
    fn write_value(&mut self, field: &FieldDescriptor, value: SqlValue<'_>) -> MetricsResult<()> {
        if field.kind == WireKind::Uint64 {
            return Err(MetricsError::TypeMismatch(format!(
                "Field {} (in proto message {}) is using a uint64 type. uint64 in metric \
                 messages is not supported; use an int64 field instead.",
                field.name,
                self.descriptor.full_name()
            )));
        }
        match value {
            SqlValue::Null => Ok(()),
            SqlValue::Long(value) => self.write_long(field, value),
            SqlValue::Double(value) => self.write_double(field, value),
            SqlValue::String(value) => self.write_string(field, value),
            SqlValue::Bytes(value) => self.write_bytes(field, value),
        }
    }

    /// Writes an integer source value.
    fn write_long(&mut self, field: &FieldDescriptor, value: i64) -> MetricsResult<()> {
        match field.kind {
            WireKind::Int32 | WireKind::Int64 | WireKind::Uint32 | WireKind::Bool => {
                self.put_varint(field.number, value.cast_unsigned());
            }
            WireKind::Enum => {
                let enumeration = self.resolve_enum(field)?;
                let declared =
                    i32::try_from(value).ok().and_then(|member| enumeration.name_of(member));
                if declared.is_none() {
                    return Err(MetricsError::TypeMismatch(format!(
                        "Invalid enum value {value} in enum type {}; encountered while filling \
                         field {} (in proto message {})",
                        field.resolved_type_name(),
                        field.name,
                        self.descriptor.full_name()
                    )));
                }
                self.put_varint(field.number, value.cast_unsigned());
            }
            WireKind::Sint32 | WireKind::Sint64 => {
                self.put_varint(field.number, zigzag(value));
            }
            WireKind::Fixed32 => {
                let narrowed = u32::try_from(value).map_err(|_| self.out_of_range(field, value))?;
                encode_key(field.number, WireType::ThirtyTwoBit, &mut self.buffer);
                self.buffer.put_u32_le(narrowed);
            }
            WireKind::Sfixed32 => {
                let narrowed = i32::try_from(value).map_err(|_| self.out_of_range(field, value))?;
                encode_key(field.number, WireType::ThirtyTwoBit, &mut self.buffer);
                self.buffer.put_i32_le(narrowed);
            }
            WireKind::Fixed64 => {
                encode_key(field.number, WireType::SixtyFourBit, &mut self.buffer);
                self.buffer.put_u64_le(value.cast_unsigned());
            }
            WireKind::Sfixed64 => {
                encode_key(field.number, WireType::SixtyFourBit, &mut self.buffer);
                self.buffer.put_i64_le(value);
            }
            _ => return Err(self.mismatch(field, "long")),
        }
        Ok(())
    }

    /// Writes a float source value.
    fn write_double(&mut self, field: &FieldDescriptor, value: f64) -> MetricsResult<()> {
        match field.kind {
            WireKind::Float => {
                #[allow(
                    clippy::cast_possible_truncation,
                    reason = "Float fields store double sources at single precision."
                )]
                let narrowed = value as f32;
                encode_key(field.number, WireType::ThirtyTwoBit, &mut self.buffer);
                self.buffer.put_f32_le(narrowed);
            }
            WireKind::Double => {
                encode_key(field.number, WireType::SixtyFourBit, &mut self.buffer);
                self.buffer.put_f64_le(value);
            }
            _ => return Err(self.mismatch(field, "double")),
        }
        Ok(())
    }

    /// Writes a text source value.
    fn write_string(&mut self, field: &FieldDescriptor, value: &str) -> MetricsResult<()> {
        match field.kind {
            WireKind::String => {
                self.put_length_delimited(field.number, value.as_bytes());
            }
            WireKind::Enum => {
                let enumeration = self.resolve_enum(field)?;
                let Some(member) = enumeration.value_of(value) else {
                    return Err(MetricsError::TypeMismatch(format!(
                        "Invalid enum string {value} in enum type {}; encountered while \
                         filling field {} (in proto message {})",
                        field.resolved_type_name(),
                        field.name,
                        self.descriptor.full_name()
                    )));
                };
                self.put_varint(field.number, i64::from(member).cast_unsigned());
            }
            _ => return Err(self.mismatch(field, "string")),
        }
        Ok(())
    }

    /// Writes a byte source value; only message fields accept bytes.
    fn write_bytes(&mut self, field: &FieldDescriptor, value: &[u8]) -> MetricsResult<()> {
        if field.kind == WireKind::Message {
            return self.write_single_message(field, value);
        }
        if value.is_empty() {
            return Err(MetricsError::TypeMismatch(format!(
                "Tried to write zero-sized value into field {} (in proto type {}). Nulls are \
                 only supported for message protos; all other types should ensure that nulls \
                 are not passed to proto builder functions by using IFNULL/COALESCE.",
                field.name,
                self.descriptor.full_name()
            )));
        }
        Err(self.mismatch(field, "bytes"))
    }

    /// Embeds a nested message carried by a single envelope.
    ///
    /// Empty input marks the field present but empty.
    fn write_single_message(&mut self, field: &FieldDescriptor, value: &[u8]) -> MetricsResult<()> {
        if value.is_empty() {
            self.put_length_delimited(field.number, &[]);
            return Ok(());
        }
        let payload =
            envelope::decode_single_message(value, field.resolved_type_name()).map_err(|err| {
                err.with_context(&format!(
                    "[Field {} in message {}]",
                    field.name,
                    self.descriptor.full_name()
                ))
            })?;
        self.put_length_delimited(field.number, &payload);
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------------

    /// Resolves the enum type referenced by `field`.
    fn resolve_enum(&self, field: &FieldDescriptor) -> MetricsResult<&'a EnumDescriptor> {
        self.registry.find_enum(field.resolved_type_name()).ok_or_else(|| {
            MetricsError::SchemaResolution(format!(
                "Unable to find enum type {} to fill field {} (in proto message {})",
                field.resolved_type_name(),
                field.name,
                self.descriptor.full_name()
            ))
        })
    }

    /// Builds the generic source/destination mismatch error.
    fn mismatch(&self, field: &FieldDescriptor, source: &str) -> MetricsError {
        MetricsError::TypeMismatch(format!(
            "Tried to write value of type {source} into field {} (in proto type {}) which has \
             type {}",
            field.name,
            self.descriptor.full_name(),
            field.kind
        ))
    }

    /// Builds the error for integers that do not fit a 32-bit fixed field.
    fn out_of_range(&self, field: &FieldDescriptor, value: i64) -> MetricsError {
        MetricsError::TypeMismatch(format!(
            "Value {value} does not fit field {} (in proto type {}) which has type {}",
            field.name,
            self.descriptor.full_name(),
            field.kind
        ))
    }

    /// Appends a varint field entry.
    fn put_varint(&mut self, number: u32, value: u64) {
        encode_key(number, WireType::Varint, &mut self.buffer);
        encode_varint(value, &mut self.buffer);
    }

    /// Appends a length-delimited field entry.
    fn put_length_delimited(&mut self, number: u32, payload: &[u8]) {
        encode_key(number, WireType::LengthDelimited, &mut self.buffer);
        encode_varint(payload.len() as u64, &mut self.buffer);
        self.buffer.put_slice(payload);
    }
}

/// Zig-zag maps signed integers so small magnitudes encode in few bytes.
const fn zigzag(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)).cast_unsigned()
}
