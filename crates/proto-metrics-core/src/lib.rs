// crates/proto-metrics-core/src/lib.rs
// ============================================================================
// Module: Proto Metrics Core Library
// Description: Public API surface for the proto metrics core.
// Purpose: Expose schema types, the encoder, and the metric orchestrator.
// Dependencies: crate::{audit, core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! Proto metrics core turns rows produced by SQL scripts into protobuf
//! messages whose schema is only known at runtime. Nested messages and
//! repeated fields travel through the SQL engine as self-describing envelope
//! blobs, and an orchestrator assembles per-metric outputs into one composite
//! root message. The core is engine-agnostic and integrates through the
//! [`SqlEngine`] interface.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit;
pub mod core;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use crate::core::*;

pub use audit::FileAuditSink;
pub use audit::MetricsAuditEvent;
pub use audit::MetricsAuditSink;
pub use audit::NoopAuditSink;
pub use audit::StderrAuditSink;
pub use interfaces::EngineError;
pub use interfaces::QueryOutput;
pub use interfaces::SqlEngine;
pub use runtime::Envelope;
pub use runtime::MessageBuilder;
pub use runtime::MetricOrchestrator;
pub use runtime::PreparedRun;
pub use runtime::RepeatedFieldBuilder;
pub use runtime::RepeatedValue;
pub use runtime::SingleEnvelope;
pub use runtime::build_proto;
pub use runtime::null_if_empty;
pub use runtime::prepare_run_metric;
pub use runtime::render_template;
pub use runtime::unwrap_metric_proto;
