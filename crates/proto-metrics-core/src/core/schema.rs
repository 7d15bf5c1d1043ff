// crates/proto-metrics-core/src/core/schema.rs
// ============================================================================
// Module: Schema Registry
// Description: Immutable message and enum descriptor tables.
// Purpose: Resolve message fields and enum members by name at runtime.
// Dependencies: serde, crate::core::error
// ============================================================================

//! ## Overview
//! The schema registry holds plain, immutable descriptor tables built once from
//! message/enum definitions (TOML or binary descriptor sets). Field lookup is
//! exact and case-sensitive through a name index. The only polymorphism is the
//! closed [`WireKind`] tag.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::collections::HashMap;
use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::core::error::MetricsError;
use crate::core::error::MetricsResult;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Smallest valid field number.
pub const MIN_FIELD_NUMBER: u32 = 1;
/// Largest valid field number (29-bit tag space).
pub const MAX_FIELD_NUMBER: u32 = (1 << 29) - 1;

// ============================================================================
// SECTION: Wire Kinds
// ============================================================================

/// Declared encoding of a field.
///
/// # Invariants
/// - [`WireKind::descriptor_type`] matches `FieldDescriptorProto.Type` numbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WireKind {
    /// 64-bit IEEE float.
    Double,
    /// 32-bit IEEE float.
    Float,
    /// Varint-encoded signed 64-bit integer.
    Int64,
    /// Unsigned 64-bit integer (never writable).
    Uint64,
    /// Varint-encoded signed 32-bit integer.
    Int32,
    /// Fixed-width unsigned 64-bit integer.
    Fixed64,
    /// Fixed-width unsigned 32-bit integer.
    Fixed32,
    /// Boolean.
    Bool,
    /// UTF-8 string.
    String,
    /// Legacy group (declarable, never writable).
    Group,
    /// Nested message.
    Message,
    /// Raw bytes (declarable, never writable from SQL).
    Bytes,
    /// Varint-encoded unsigned 32-bit integer.
    Uint32,
    /// Enum member.
    Enum,
    /// Fixed-width signed 32-bit integer.
    Sfixed32,
    /// Fixed-width signed 64-bit integer.
    Sfixed64,
    /// Zig-zag encoded signed 32-bit integer.
    Sint32,
    /// Zig-zag encoded signed 64-bit integer.
    Sint64,
}

impl WireKind {
    /// Returns the `FieldDescriptorProto.Type` number for the kind.
    #[must_use]
    pub const fn descriptor_type(self) -> u32 {
        match self {
            Self::Double => 1,
            Self::Float => 2,
            Self::Int64 => 3,
            Self::Uint64 => 4,
            Self::Int32 => 5,
            Self::Fixed64 => 6,
            Self::Fixed32 => 7,
            Self::Bool => 8,
            Self::String => 9,
            Self::Group => 10,
            Self::Message => 11,
            Self::Bytes => 12,
            Self::Uint32 => 13,
            Self::Enum => 14,
            Self::Sfixed32 => 15,
            Self::Sfixed64 => 16,
            Self::Sint32 => 17,
            Self::Sint64 => 18,
        }
    }

    /// Maps a `FieldDescriptorProto.Type` number back to a kind.
    #[must_use]
    pub const fn from_descriptor_type(value: u32) -> Option<Self> {
        let kind = match value {
            1 => Self::Double,
            2 => Self::Float,
            3 => Self::Int64,
            4 => Self::Uint64,
            5 => Self::Int32,
            6 => Self::Fixed64,
            7 => Self::Fixed32,
            8 => Self::Bool,
            9 => Self::String,
            10 => Self::Group,
            11 => Self::Message,
            12 => Self::Bytes,
            13 => Self::Uint32,
            14 => Self::Enum,
            15 => Self::Sfixed32,
            16 => Self::Sfixed64,
            17 => Self::Sint32,
            18 => Self::Sint64,
            _ => return None,
        };
        Some(kind)
    }

    /// Returns a stable label for the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Double => "double",
            Self::Float => "float",
            Self::Int64 => "int64",
            Self::Uint64 => "uint64",
            Self::Int32 => "int32",
            Self::Fixed64 => "fixed64",
            Self::Fixed32 => "fixed32",
            Self::Bool => "bool",
            Self::String => "string",
            Self::Group => "group",
            Self::Message => "message",
            Self::Bytes => "bytes",
            Self::Uint32 => "uint32",
            Self::Enum => "enum",
            Self::Sfixed32 => "sfixed32",
            Self::Sfixed64 => "sfixed64",
            Self::Sint32 => "sint32",
            Self::Sint64 => "sint64",
        }
    }

    /// Returns true when the kind references another registry type.
    #[must_use]
    pub const fn needs_type_name(self) -> bool {
        matches!(self, Self::Enum | Self::Message)
    }
}

impl fmt::Display for WireKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Definitions
// ============================================================================

/// Field definition as authored in config or extracted from a descriptor set.
///
/// # Invariants
/// - `type_name` is set exactly when `kind` is enum or message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldDescriptor {
    /// Field name (exact, case-sensitive).
    pub name: String,
    /// Field number (wire identity).
    pub number: u32,
    /// Declared wire kind.
    pub kind: WireKind,
    /// Whether the field is repeated.
    #[serde(default)]
    pub repeated: bool,
    /// Resolved type name for enum and message fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
}

impl FieldDescriptor {
    /// Returns the resolved type name, or an empty string for scalar kinds.
    #[must_use]
    pub fn resolved_type_name(&self) -> &str {
        self.type_name.as_deref().unwrap_or_default()
    }
}

/// Message definition input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MessageSpec {
    /// Fully qualified message name without a leading dot.
    pub name: String,
    /// Field definitions.
    #[serde(default)]
    pub fields: Vec<FieldDescriptor>,
}

/// Enum definition input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnumSpec {
    /// Fully qualified enum name without a leading dot.
    pub name: String,
    /// Member names mapped to values.
    #[serde(default)]
    pub values: BTreeMap<String, i32>,
}

// ============================================================================
// SECTION: Descriptors
// ============================================================================

/// Immutable message descriptor with a field-name index.
#[derive(Debug, Clone)]
pub struct MessageDescriptor {
    /// Fully qualified message name.
    full_name: String,
    /// Fields in declaration order.
    fields: Vec<FieldDescriptor>,
    /// Field index keyed by name.
    by_name: HashMap<String, usize>,
}

impl MessageDescriptor {
    /// Returns the fully qualified message name.
    #[must_use]
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    /// Returns the last component of the full name.
    #[must_use]
    pub fn short_name(&self) -> &str {
        self.full_name.rsplit('.').next().unwrap_or(&self.full_name)
    }

    /// Finds a field by exact name.
    #[must_use]
    pub fn find_field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.by_name.get(name).and_then(|index| self.fields.get(*index))
    }

    /// Returns all fields in declaration order.
    #[must_use]
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }
}

/// Immutable enum descriptor with bidirectional lookup.
#[derive(Debug, Clone)]
pub struct EnumDescriptor {
    /// Fully qualified enum name.
    full_name: String,
    /// Member values keyed by name.
    by_name: BTreeMap<String, i32>,
    /// Member name for each value (smallest name among aliases).
    by_value: BTreeMap<i32, String>,
}

impl EnumDescriptor {
    /// Returns the fully qualified enum name.
    #[must_use]
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    /// Resolves a member name to its value.
    #[must_use]
    pub fn value_of(&self, name: &str) -> Option<i32> {
        self.by_name.get(name).copied()
    }

    /// Resolves a value to its member name.
    #[must_use]
    pub fn name_of(&self, value: i32) -> Option<&str> {
        self.by_value.get(&value).map(String::as_str)
    }
}

// ============================================================================
// SECTION: Registry
// ============================================================================

/// Registry of message and enum descriptors resolved by full name.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    /// Message descriptors keyed by full name.
    messages: BTreeMap<String, MessageDescriptor>,
    /// Enum descriptors keyed by full name.
    enums: BTreeMap<String, EnumDescriptor>,
}

impl SchemaRegistry {
    /// Starts a registry builder.
    #[must_use]
    pub fn builder() -> SchemaRegistryBuilder {
        SchemaRegistryBuilder::default()
    }

    /// Finds a message descriptor by full name.
    #[must_use]
    pub fn find_message(&self, name: &str) -> Option<&MessageDescriptor> {
        self.messages.get(name)
    }

    /// Resolves a message descriptor by full name.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::SchemaResolution`] when the message is unknown.
    pub fn message(&self, name: &str) -> Result<&MessageDescriptor, MetricsError> {
        self.find_message(name).ok_or_else(|| {
            MetricsError::SchemaResolution(format!("Unable to find message type {name}"))
        })
    }

    /// Finds an enum descriptor by full name.
    #[must_use]
    pub fn find_enum(&self, name: &str) -> Option<&EnumDescriptor> {
        self.enums.get(name)
    }

    /// Iterates message descriptors in full-name order.
    pub fn messages(&self) -> impl Iterator<Item = &MessageDescriptor> {
        self.messages.values()
    }

    /// Iterates enum descriptors in full-name order.
    pub fn enums(&self) -> impl Iterator<Item = &EnumDescriptor> {
        self.enums.values()
    }
}

/// Builder collecting definitions before validation.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistryBuilder {
    /// Pending message definitions.
    messages: Vec<MessageSpec>,
    /// Pending enum definitions.
    enums: Vec<EnumSpec>,
}

impl SchemaRegistryBuilder {
    /// Adds a message definition.
    #[must_use]
    pub fn message(mut self, spec: MessageSpec) -> Self {
        self.messages.push(spec);
        self
    }

    /// Adds an enum definition.
    #[must_use]
    pub fn enumeration(mut self, spec: EnumSpec) -> Self {
        self.enums.push(spec);
        self
    }

    /// Adds many message and enum definitions.
    #[must_use]
    pub fn extend(
        mut self,
        messages: impl IntoIterator<Item = MessageSpec>,
        enums: impl IntoIterator<Item = EnumSpec>,
    ) -> Self {
        self.messages.extend(messages);
        self.enums.extend(enums);
        self
    }

    /// Adds every message and enum in a binary `FileDescriptorSet`.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::SchemaResolution`] when the set cannot be decoded.
    pub fn descriptor_set(self, bytes: &[u8]) -> MetricsResult<Self> {
        let (messages, enums) = crate::core::descriptor_set::specs_from_descriptor_set(bytes)?;
        Ok(self.extend(messages, enums))
    }

    /// Validates definitions and builds the registry.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::SchemaResolution`] on duplicate names, invalid
    /// field numbers, or dangling type references.
    pub fn build(self) -> MetricsResult<SchemaRegistry> {
        let mut enums = BTreeMap::new();
        for spec in self.enums {
            let descriptor = build_enum(spec);
            if enums.contains_key(&descriptor.full_name) {
                return Err(MetricsError::SchemaResolution(format!(
                    "Duplicate enum type {}",
                    descriptor.full_name
                )));
            }
            enums.insert(descriptor.full_name.clone(), descriptor);
        }

        let mut messages = BTreeMap::new();
        for spec in self.messages {
            if enums.contains_key(&spec.name) || messages.contains_key(&spec.name) {
                return Err(MetricsError::SchemaResolution(format!(
                    "Duplicate message type {}",
                    spec.name
                )));
            }
            let descriptor = build_message(spec)?;
            messages.insert(descriptor.full_name.clone(), descriptor);
        }

        for message in messages.values() {
            for field in &message.fields {
                validate_reference(message, field, &messages, &enums)?;
            }
        }

        Ok(SchemaRegistry {
            messages,
            enums,
        })
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Builds an enum descriptor; aliased values map back to their smallest name.
fn build_enum(spec: EnumSpec) -> EnumDescriptor {
    let mut by_value = BTreeMap::new();
    for (name, value) in &spec.values {
        by_value.entry(*value).or_insert_with(|| name.clone());
    }
    EnumDescriptor {
        full_name: spec.name,
        by_name: spec.values,
        by_value,
    }
}

/// Builds a message descriptor and its name index.
fn build_message(spec: MessageSpec) -> MetricsResult<MessageDescriptor> {
    let mut by_name = HashMap::with_capacity(spec.fields.len());
    let mut numbers = BTreeSet::new();
    for (index, field) in spec.fields.iter().enumerate() {
        if !(MIN_FIELD_NUMBER ..= MAX_FIELD_NUMBER).contains(&field.number) {
            return Err(MetricsError::SchemaResolution(format!(
                "Field {} in message {} has invalid number {}",
                field.name, spec.name, field.number
            )));
        }
        if !numbers.insert(field.number) {
            return Err(MetricsError::SchemaResolution(format!(
                "Field number {} is used twice in message {}",
                field.number, spec.name
            )));
        }
        if by_name.insert(field.name.clone(), index).is_some() {
            return Err(MetricsError::SchemaResolution(format!(
                "Field {} is declared twice in message {}",
                field.name, spec.name
            )));
        }
    }
    Ok(MessageDescriptor {
        full_name: spec.name,
        fields: spec.fields,
        by_name,
    })
}

/// Ensures enum/message fields reference a known type of the right family.
fn validate_reference(
    message: &MessageDescriptor,
    field: &FieldDescriptor,
    messages: &BTreeMap<String, MessageDescriptor>,
    enums: &BTreeMap<String, EnumDescriptor>,
) -> MetricsResult<()> {
    if !field.kind.needs_type_name() {
        return Ok(());
    }
    let Some(type_name) = field.type_name.as_deref() else {
        return Err(MetricsError::SchemaResolution(format!(
            "Field {} in message {} has kind {} but no type name",
            field.name, message.full_name, field.kind
        )));
    };
    let known = match field.kind {
        WireKind::Enum => enums.contains_key(type_name),
        _ => messages.contains_key(type_name),
    };
    if known {
        Ok(())
    } else {
        Err(MetricsError::SchemaResolution(format!(
            "Field {} in message {} references unknown {} type {type_name}",
            field.name, message.full_name, field.kind
        )))
    }
}
