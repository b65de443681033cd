//! Span creation helpers for store calls and saves

use crate::attributes::*;
use tracing::Span;
use tracing::field::Empty;

/// Span around a single store call, e.g. `store_call_span("list_children", "ActiGraph")`.
///
/// Attach it to the future with `tracing::Instrument::instrument`.
pub fn store_call_span(operation: &str, target: &str) -> Span {
    tracing::debug_span!(
        "store_call",
        { PFIND_OPERATION } = operation,
        { PFIND_TARGET } = target,
    )
}

/// Who saved what, where.
#[derive(Debug, Clone, Default)]
pub struct SaveSpanAttributes {
    pub user: String,
    pub container_id: String,
    pub base_filename: String,
    pub participant_id: Option<String>,
    pub accelerometer_type: Option<String>,
}

/// Span covering one versioned save.
///
/// The chosen name and version are unknown until the write succeeds; fill
/// them in with [`record_saved_version`].
pub fn save_span(attrs: &SaveSpanAttributes) -> Span {
    let span = tracing::info_span!(
        "save_versioned",
        { PFIND_USER } = %attrs.user,
        { PFIND_CONTAINER_ID } = %attrs.container_id,
        { PFIND_BASE_FILENAME } = %attrs.base_filename,
        { PFIND_PARTICIPANT_ID } = Empty,
        { PFIND_ACCELEROMETER_TYPE } = Empty,
        { PFIND_ARTIFACT_NAME } = Empty,
        { PFIND_VERSION } = Empty,
    );

    if let Some(participant_id) = &attrs.participant_id {
        span.record(PFIND_PARTICIPANT_ID, participant_id.as_str());
    }
    if let Some(accelerometer_type) = &attrs.accelerometer_type {
        span.record(PFIND_ACCELEROMETER_TYPE, accelerometer_type.as_str());
    }
    span
}

pub fn record_saved_version(span: &Span, name: &str, version: u64) {
    span.record(PFIND_ARTIFACT_NAME, name);
    span.record(PFIND_VERSION, version);
}
