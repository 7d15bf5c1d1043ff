// crates/proto-metrics-core/src/core/descriptor_set.rs
// ============================================================================
// Module: Descriptor Set Loading
// Description: Flatten binary FileDescriptorSets into registry definitions.
// Purpose: Let the registry consume schemas compiled by protoc.
// Dependencies: prost, prost-types, crate::core::schema
// ============================================================================

//! ## Overview
//! Walks every file, message, nested message, and enum in a
//! `FileDescriptorSet` and produces [`MessageSpec`] / [`EnumSpec`] values with
//! dotted full names. Type references lose their leading dot so they compare
//! equal to the names builders stamp on envelopes.

// ============================================================================
// SECTION: Imports
// ============================================================================

use prost::Message;
use prost_types::DescriptorProto;
use prost_types::EnumDescriptorProto;
use prost_types::FieldDescriptorProto;
use prost_types::FileDescriptorSet;
use prost_types::field_descriptor_proto::Label;

use crate::core::error::MetricsError;
use crate::core::error::MetricsResult;
use crate::core::schema::EnumSpec;
use crate::core::schema::FieldDescriptor;
use crate::core::schema::MessageSpec;
use crate::core::schema::WireKind;

// ============================================================================
// SECTION: Loading
// ============================================================================

/// Decodes a binary `FileDescriptorSet` into message and enum definitions.
///
/// # Errors
///
/// Returns [`MetricsError::SchemaResolution`] when the bytes are not a valid
/// descriptor set or a field uses an unknown type number.
pub fn specs_from_descriptor_set(bytes: &[u8]) -> MetricsResult<(Vec<MessageSpec>, Vec<EnumSpec>)> {
    let set = FileDescriptorSet::decode(bytes).map_err(|err| {
        MetricsError::SchemaResolution(format!("Invalid file descriptor set: {err}"))
    })?;
    let mut messages = Vec::new();
    let mut enums = Vec::new();
    for file in &set.file {
        let prefix = file.package().to_string();
        for message in &file.message_type {
            collect_message(&prefix, message, &mut messages, &mut enums)?;
        }
        for enumeration in &file.enum_type {
            enums.push(enum_spec(&prefix, enumeration));
        }
    }
    Ok((messages, enums))
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Joins a package or parent prefix with a local name.
fn qualify(prefix: &str, name: &str) -> String {
    if prefix.is_empty() { name.to_string() } else { format!("{prefix}.{name}") }
}

/// Recursively collects a message and its nested types.
fn collect_message(
    prefix: &str,
    message: &DescriptorProto,
    messages: &mut Vec<MessageSpec>,
    enums: &mut Vec<EnumSpec>,
) -> MetricsResult<()> {
    let full_name = qualify(prefix, message.name());
    let mut fields = Vec::with_capacity(message.field.len());
    for field in &message.field {
        fields.push(field_descriptor(&full_name, field)?);
    }
    for nested in &message.nested_type {
        collect_message(&full_name, nested, messages, enums)?;
    }
    for enumeration in &message.enum_type {
        enums.push(enum_spec(&full_name, enumeration));
    }
    messages.push(MessageSpec {
        name: full_name,
        fields,
    });
    Ok(())
}

/// Converts a field descriptor proto into a registry field.
fn field_descriptor(message: &str, field: &FieldDescriptorProto) -> MetricsResult<FieldDescriptor> {
    let type_number = u32::try_from(field.r#type.unwrap_or_default()).unwrap_or_default();
    let Some(kind) = WireKind::from_descriptor_type(type_number) else {
        return Err(MetricsError::SchemaResolution(format!(
            "Field {} in message {message} has unknown type {type_number}",
            field.name()
        )));
    };
    let number = u32::try_from(field.number()).map_err(|_| {
        MetricsError::SchemaResolution(format!(
            "Field {} in message {message} has invalid number {}",
            field.name(),
            field.number()
        ))
    })?;
    let type_name = if kind.needs_type_name() {
        Some(field.type_name().trim_start_matches('.').to_string())
    } else {
        None
    };
    Ok(FieldDescriptor {
        name: field.name().to_string(),
        number,
        kind,
        repeated: field.label() == Label::Repeated,
        type_name,
    })
}

/// Converts an enum descriptor proto into a registry enum.
fn enum_spec(prefix: &str, enumeration: &EnumDescriptorProto) -> EnumSpec {
    EnumSpec {
        name: qualify(prefix, enumeration.name()),
        values: enumeration
            .value
            .iter()
            .map(|value| (value.name().to_string(), value.number()))
            .collect(),
    }
}
