//! Snapshot + override merge producing the final submission payload.
//!
//! # Design
//! - Pure and deterministic: the same snapshot and overrides always yield the
//!   same payload, independent of override iteration order.
//! - Overrides are written in a single pass against the snapshot copy; no
//!   override value is derived from another payload entry.
//! - Critical-field validation runs after the merge and fails before any
//!   network call can be made with a partial payload.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::{ReconcileError, ReconcileResult};
use crate::model::{FieldMap, FormSnapshot, SubmissionPayload};

/// Name of the single header carried by every payload.
pub const REFERER_HEADER: &str = "Referer";

/// Merges live snapshots with per-user overrides.
#[derive(Debug, Clone)]
pub struct FieldReconciler {
    referer: String,
    critical_fields: Vec<String>,
}

impl FieldReconciler {
    /// Reconciler that stamps `referer` on every payload and always requires
    /// `critical_fields` in addition to any per-call critical fields.
    #[must_use]
    pub fn new(referer: impl Into<String>, critical_fields: Vec<String>) -> Self {
        Self {
            referer: referer.into(),
            critical_fields,
        }
    }

    /// Merge `snapshot` with `overrides` and validate critical fields.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError::MissingCriticalField`] naming every critical
    /// field (global or `critical_fields`) that is absent or blank after the merge.
    pub fn reconcile(
        &self,
        snapshot: &FormSnapshot,
        overrides: &FieldMap,
        critical_fields: &[String],
    ) -> ReconcileResult<SubmissionPayload> {
        let fields = merge(&snapshot.fields, overrides);

        let missing: BTreeSet<&String> = self
            .critical_fields
            .iter()
            .chain(critical_fields)
            .filter(|field| {
                fields
                    .get(field.as_str())
                    .is_none_or(|value| value.trim().is_empty())
            })
            .collect();
        if !missing.is_empty() {
            return Err(ReconcileError::MissingCriticalField {
                fields: missing.into_iter().cloned().collect(),
            });
        }

        Ok(SubmissionPayload {
            fields,
            headers: BTreeMap::from([(REFERER_HEADER.to_string(), self.referer.clone())]),
        })
    }
}

/// Snapshot entries not overridden pass through; every override is final.
fn merge(snapshot: &FieldMap, overrides: &FieldMap) -> FieldMap {
    let mut merged = snapshot.clone();
    for (name, value) in overrides {
        merged.insert(name.clone(), value.clone());
    }
    merged
}
