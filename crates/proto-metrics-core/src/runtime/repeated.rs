// crates/proto-metrics-core/src/runtime/repeated.rs
// ============================================================================
// Module: Repeated Field Accumulator
// Description: Ordered aggregation of SQL values into a repeated envelope.
// Purpose: Back the repeated-field aggregate exposed to SQL.
// Dependencies: crate::core, crate::runtime::envelope
// ============================================================================

//! ## Overview
//! One accumulator lives per aggregation group. Values are kept in arrival
//! order; nulls become empty byte placeholders so element positions survive
//! the round trip. An accumulator that never received a value finishes empty,
//! which the SQL host surfaces as NULL.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::core::SqlValue;
use crate::runtime::envelope;
use crate::runtime::envelope::RepeatedValue;

// ============================================================================
// SECTION: Accumulator
// ============================================================================

/// Accumulates values for one repeated field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RepeatedFieldBuilder {
    /// Values in arrival order.
    values: Vec<RepeatedValue>,
}

impl RepeatedFieldBuilder {
    /// Starts an empty accumulation.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            values: Vec::new(),
        }
    }

    /// Adds one value; null is stored as an empty byte placeholder.
    pub fn add(&mut self, value: SqlValue<'_>) {
        let element = match value {
            SqlValue::Null => RepeatedValue::Bytes(Vec::new()),
            SqlValue::Long(value) => RepeatedValue::Long(value),
            SqlValue::Double(value) => RepeatedValue::Double(value),
            SqlValue::String(value) => RepeatedValue::String(value.to_string()),
            SqlValue::Bytes(value) => RepeatedValue::Bytes(value.to_vec()),
        };
        self.values.push(element);
    }

    /// Returns the number of values added so far.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true when no value has been added.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Finishes the accumulation as a repeated envelope.
    ///
    /// Returns an empty vector when no value was added.
    #[must_use]
    pub fn finish(self) -> Vec<u8> {
        if self.values.is_empty() {
            return Vec::new();
        }
        envelope::encode_repeated(&self.values)
    }
}
