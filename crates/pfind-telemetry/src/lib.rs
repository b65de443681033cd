//! # pfind Telemetry
//!
//! Tracing subscriber and OpenTelemetry setup, plus span helpers for store
//! calls and versioned saves.

mod spans;
mod tracer;

pub use spans::{SaveSpanAttributes, record_saved_version, save_span, store_call_span};
pub use tracer::{init_telemetry, register_span_processor, tracer_provider};

/// Span attribute names.
pub mod attributes {
    pub const PFIND_OPERATION: &str = "pfind.operation";
    pub const PFIND_TARGET: &str = "pfind.target";
    pub const PFIND_CONTAINER_ID: &str = "pfind.container_id";
    pub const PFIND_BASE_FILENAME: &str = "pfind.base_filename";
    pub const PFIND_ARTIFACT_NAME: &str = "pfind.artifact_name";
    pub const PFIND_VERSION: &str = "pfind.version";
    pub const PFIND_USER: &str = "pfind.user";
    pub const PFIND_PARTICIPANT_ID: &str = "pfind.participant_id";
    pub const PFIND_ACCELEROMETER_TYPE: &str = "pfind.accelerometer_type";

    /// Tracer name used when the config does not set one
    pub const SYSTEM_NAME: &str = "pfind";
}
