// crates/proto-metrics-core/src/core/value.rs
// ============================================================================
// Module: SQL Values
// Description: Tagged scalar values crossing the SQL engine boundary.
// Purpose: Model the five value shapes a SQL engine can hand to the encoder.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! [`SqlValue`] is the only payload shape that crosses from the SQL engine into
//! the encoder. Text and byte variants borrow from the engine's row or argument
//! storage; [`OwnedSqlValue`] is used where rows outlive the engine cursor.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Serialize;

// ============================================================================
// SECTION: Borrowed Values
// ============================================================================

/// Scalar value produced by the SQL engine.
///
/// # Invariants
/// - Exactly one variant is active; byte spans carry their own length.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SqlValue<'a> {
    /// SQL NULL.
    Null,
    /// 64-bit signed integer.
    Long(i64),
    /// 64-bit IEEE float.
    Double(f64),
    /// UTF-8 text.
    String(&'a str),
    /// Opaque byte blob.
    Bytes(&'a [u8]),
}

impl SqlValue<'_> {
    /// Returns the value kind.
    #[must_use]
    pub const fn kind(&self) -> SqlValueKind {
        match self {
            Self::Null => SqlValueKind::Null,
            Self::Long(_) => SqlValueKind::Long,
            Self::Double(_) => SqlValueKind::Double,
            Self::String(_) => SqlValueKind::String,
            Self::Bytes(_) => SqlValueKind::Bytes,
        }
    }

    /// Returns an owned copy of the value.
    #[must_use]
    pub fn to_owned_value(&self) -> OwnedSqlValue {
        match *self {
            Self::Null => OwnedSqlValue::Null,
            Self::Long(value) => OwnedSqlValue::Long(value),
            Self::Double(value) => OwnedSqlValue::Double(value),
            Self::String(value) => OwnedSqlValue::String(value.to_string()),
            Self::Bytes(value) => OwnedSqlValue::Bytes(value.to_vec()),
        }
    }

    /// Converts the value to its canonical text form for template substitution.
    ///
    /// Doubles always carry six fractional digits so SQL keeps reading them
    /// as REAL literals. Returns `None` for bytes and null, which have no
    /// text form.
    #[must_use]
    pub fn to_template_text(&self) -> Option<String> {
        match *self {
            Self::String(value) => Some(value.to_string()),
            Self::Long(value) => Some(value.to_string()),
            Self::Double(value) => Some(format!("{value:.6}")),
            Self::Bytes(_) | Self::Null => None,
        }
    }
}

// ============================================================================
// SECTION: Owned Values
// ============================================================================

/// Owned scalar value, used for rows returned by an engine query.
#[derive(Debug, Clone, PartialEq)]
pub enum OwnedSqlValue {
    /// SQL NULL.
    Null,
    /// 64-bit signed integer.
    Long(i64),
    /// 64-bit IEEE float.
    Double(f64),
    /// UTF-8 text.
    String(String),
    /// Opaque byte blob.
    Bytes(Vec<u8>),
}

impl OwnedSqlValue {
    /// Borrows the value as a [`SqlValue`].
    #[must_use]
    pub fn as_value(&self) -> SqlValue<'_> {
        match self {
            Self::Null => SqlValue::Null,
            Self::Long(value) => SqlValue::Long(*value),
            Self::Double(value) => SqlValue::Double(*value),
            Self::String(value) => SqlValue::String(value),
            Self::Bytes(value) => SqlValue::Bytes(value),
        }
    }

    /// Returns the value kind.
    #[must_use]
    pub const fn kind(&self) -> SqlValueKind {
        match self {
            Self::Null => SqlValueKind::Null,
            Self::Long(_) => SqlValueKind::Long,
            Self::Double(_) => SqlValueKind::Double,
            Self::String(_) => SqlValueKind::String,
            Self::Bytes(_) => SqlValueKind::Bytes,
        }
    }
}

// ============================================================================
// SECTION: Kinds
// ============================================================================

/// Value kind label used in diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SqlValueKind {
    /// SQL NULL.
    Null,
    /// 64-bit integer.
    Long,
    /// 64-bit float.
    Double,
    /// UTF-8 text.
    String,
    /// Byte blob.
    Bytes,
}

impl SqlValueKind {
    /// Returns a stable label for the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Long => "long",
            Self::Double => "double",
            Self::String => "string",
            Self::Bytes => "bytes",
        }
    }
}

impl fmt::Display for SqlValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
