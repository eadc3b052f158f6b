//! Policy guard for mutating and result-bounded tools.
//!
//! Two independent checks are evaluated against every call, reading the
//! policy flags fresh each time:
//! - read-only mode blocks inserts, updates, deletes and aggregations that
//!   write through `$out` or `$merge`
//! - the result cap bounds the number of documents `find` and `aggregate`
//!   may return
//!
//! `$out`/`$merge` detection is a substring match on the serialized pipeline.
//! A string value that merely contains `$out` is rejected as well, and a
//! write stage nested inside `$facet` or `$lookup` is still caught.

use crate::config::{PolicyFlags, PolicySource};
use crate::db::convert::JsonObject;
use crate::error::{GatewayError, GatewayResult};
use std::sync::Arc;
use tracing::warn;

/// Stage names that make an aggregation write to a collection.
pub const WRITE_STAGE_MARKERS: [&str; 2] = ["$out", "$merge"];

/// Result of inspecting an aggregation pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineCheckResult {
    /// Pipeline only reads
    ReadOnly,
    /// Pipeline text contains a write stage marker
    Writes(&'static str),
}

/// Check whether an aggregation pipeline can write.
///
/// # Examples
///
/// ```
/// use mongodb_mcp_server::tools::guard::{check_pipeline, PipelineCheckResult};
/// use serde_json::json;
///
/// let stages = vec![json!({ "$out": "archive" }).as_object().unwrap().clone()];
/// assert_eq!(check_pipeline(&stages), PipelineCheckResult::Writes("$out"));
///
/// let stages = vec![json!({ "$match": { "x": 1 } }).as_object().unwrap().clone()];
/// assert_eq!(check_pipeline(&stages), PipelineCheckResult::ReadOnly);
/// ```
pub fn check_pipeline(pipeline: &[JsonObject]) -> PipelineCheckResult {
    let text = serde_json::to_string(pipeline).unwrap_or_default();
    WRITE_STAGE_MARKERS
        .iter()
        .find(|marker| text.contains(*marker))
        .map_or(PipelineCheckResult::ReadOnly, |marker| {
            PipelineCheckResult::Writes(marker)
        })
}

/// Evaluates the global policy switches.
#[derive(Debug, Clone)]
pub struct PolicyGuard {
    source: Arc<dyn PolicySource>,
}

impl PolicyGuard {
    pub fn new(source: Arc<dyn PolicySource>) -> Self {
        Self { source }
    }

    /// Guard backed by fixed flags.
    pub fn fixed(flags: PolicyFlags) -> Self {
        Self::new(Arc::new(flags))
    }

    /// Current flags, read from the source.
    pub fn flags(&self) -> PolicyFlags {
        self.source.flags()
    }

    /// Fail with `ReadOnlyViolation` if read-only mode is on.
    pub fn ensure_writable(&self, operation: &str) -> GatewayResult<()> {
        if self.flags().read_only {
            warn!(
                operation = operation,
                "Write operation blocked: server is in READ_ONLY mode"
            );
            return Err(GatewayError::read_only(operation));
        }
        Ok(())
    }

    /// Fail with `ReadOnlyViolation` for `$out`/`$merge` pipelines in read-only mode.
    pub fn ensure_pipeline_allowed(&self, pipeline: &[JsonObject]) -> GatewayResult<()> {
        if !self.flags().read_only {
            return Ok(());
        }
        if let PipelineCheckResult::Writes(stage) = check_pipeline(pipeline) {
            warn!(
                stage = stage,
                "Blocked aggregation with $out/$merge in read-only mode"
            );
            return Err(GatewayError::read_only("aggregation with $out or $merge"));
        }
        Ok(())
    }

    /// `min(requested, max_documents)`; a request of 0 or less means "up to the cap".
    pub fn effective_limit(&self, requested: i64) -> i64 {
        let max = i64::from(self.flags().max_documents);
        if requested <= 0 { max } else { requested.min(max) }
    }

    /// Maximum number of documents a streaming tool may consume.
    pub fn result_cap(&self) -> usize {
        self.flags().max_documents as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn stages(value: serde_json::Value) -> Vec<JsonObject> {
        value
            .as_array()
            .unwrap()
            .iter()
            .map(|stage| stage.as_object().unwrap().clone())
            .collect()
    }

    fn guard(read_only: bool, max_documents: u32) -> PolicyGuard {
        PolicyGuard::fixed(PolicyFlags {
            read_only,
            max_documents,
        })
    }

    #[test]
    fn test_out_stage_detected() {
        let pipeline = stages(json!([{ "$match": {} }, { "$out": "archive" }]));
        assert_eq!(check_pipeline(&pipeline), PipelineCheckResult::Writes("$out"));
    }

    #[test]
    fn test_merge_stage_detected() {
        let pipeline = stages(json!([{ "$merge": { "into": "totals" } }]));
        assert_eq!(
            check_pipeline(&pipeline),
            PipelineCheckResult::Writes("$merge")
        );
    }

    #[test]
    fn test_nested_facet_out_detected() {
        let pipeline = stages(json!([{ "$facet": { "a": [{ "$out": "x" }] } }]));
        assert!(matches!(
            check_pipeline(&pipeline),
            PipelineCheckResult::Writes(_)
        ));
    }

    #[test]
    fn test_string_value_containing_marker_is_rejected() {
        // Substring matching: a literal value mentioning $out also trips the check
        let pipeline = stages(json!([{ "$match": { "note": "uses $out later" } }]));
        assert_eq!(check_pipeline(&pipeline), PipelineCheckResult::Writes("$out"));
    }

    #[test]
    fn test_read_pipeline_allowed() {
        let pipeline = stages(json!([
            { "$match": { "status": "A" } },
            { "$group": { "_id": "$cust_id", "total": { "$sum": "$amount" } } }
        ]));
        assert_eq!(check_pipeline(&pipeline), PipelineCheckResult::ReadOnly);
    }

    #[test]
    fn test_ensure_writable() {
        assert!(guard(false, 10).ensure_writable("insert_one").is_ok());
        let err = guard(true, 10).ensure_writable("insert_one").unwrap_err();
        assert!(matches!(err, GatewayError::ReadOnlyViolation { .. }));
    }

    #[test]
    fn test_pipeline_guard_only_applies_in_read_only_mode() {
        let pipeline = stages(json!([{ "$out": "archive" }]));
        assert!(guard(false, 10).ensure_pipeline_allowed(&pipeline).is_ok());
        assert!(matches!(
            guard(true, 10).ensure_pipeline_allowed(&pipeline),
            Err(GatewayError::ReadOnlyViolation { .. })
        ));
    }

    #[test]
    fn test_effective_limit() {
        let guard = guard(false, 100);
        assert_eq!(guard.effective_limit(20), 20);
        assert_eq!(guard.effective_limit(500), 100);
        assert_eq!(guard.effective_limit(0), 100);
        assert_eq!(guard.effective_limit(-3), 100);
        assert_eq!(guard.effective_limit(i64::MAX), 100);
        assert_eq!(guard.result_cap(), 100);
    }
}
