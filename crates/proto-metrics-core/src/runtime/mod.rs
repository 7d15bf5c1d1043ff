// crates/proto-metrics-core/src/runtime/mod.rs
// ============================================================================
// Module: Proto Metrics Runtime
// Description: Encoder, envelope codec, templates, and orchestration.
// Purpose: Turn SQL values and metric scripts into serialized protobuf output.
// Dependencies: bytes, prost, crate::core, crate::interfaces, crate::audit
// ============================================================================

//! ## Overview
//! The runtime is layered bottom-up: the envelope codec wraps partial results,
//! the message builder and repeated accumulator produce them, the boundary
//! functions adapt SQL argument lists, and the orchestrator drives a SQL engine
//! to assemble the root message.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod boundary;
pub mod builder;
pub mod envelope;
pub mod orchestrator;
pub mod repeated;
pub mod template;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use boundary::PreparedRun;
pub use boundary::build_proto;
pub use boundary::null_if_empty;
pub use boundary::prepare_run_metric;
pub use boundary::unwrap_metric_proto;
pub use builder::MessageBuilder;
pub use envelope::Envelope;
pub use envelope::MAX_MESSAGE_BYTES;
pub use envelope::RepeatedValue;
pub use envelope::SingleEnvelope;
pub use orchestrator::MetricOrchestrator;
pub use orchestrator::run_prepared;
pub use repeated::RepeatedFieldBuilder;
pub use template::render_template;
