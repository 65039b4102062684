//! Conversion of raw result payloads into cache rows.

use serde_json::Value;
use std::collections::BTreeSet;

use crate::cache::{HeatmapEntry, HeatmapRow, ResultRow};
use crate::constants::COUNT_KEY_SUFFIX;
use crate::error::RemoteComputationError;
use crate::identity::{fingerprint, heatmap_fingerprint};

use super::task_spec::{CountQuerySpec, HeatmapQuerySpec};

/// Convert a count payload of the form `{"<variable>_count": {"<category>": n}}`
///
/// Every variable in the payload yields rows under its own fingerprint, built
/// from the request's filters and organisations. The requested variable must
/// be among them.
pub fn count_rows(
    payload: &Value,
    spec: &CountQuerySpec,
) -> Result<Vec<ResultRow>, RemoteComputationError> {
    let object = payload
        .as_object()
        .ok_or_else(|| RemoteComputationError::malformed("count payload is not an object"))?;

    let mut rows = Vec::new();
    let mut requested_present = false;
    for (key, categories) in object {
        let variable = key
            .strip_suffix(COUNT_KEY_SUFFIX)
            .ok_or_else(|| {
                RemoteComputationError::malformed(format!(
                    "key '{key}' does not end in '{COUNT_KEY_SUFFIX}'"
                ))
            })?;
        let categories = categories.as_object().ok_or_else(|| {
            RemoteComputationError::malformed(format!("counts for '{key}' are not an object"))
        })?;

        requested_present |= variable == spec.variable;
        let fp = fingerprint(variable, &spec.filters, &spec.organisation_ids);
        for (category, value) in categories {
            let value = value.as_f64().ok_or_else(|| {
                RemoteComputationError::malformed(format!(
                    "count of '{category}' in '{key}' is not a number"
                ))
            })?;
            rows.push(ResultRow::new(category.clone(), value, fp.clone()));
        }
    }

    if !requested_present {
        return Err(RemoteComputationError::malformed(format!(
            "payload has no counts for '{}'",
            spec.variable
        )));
    }
    Ok(rows)
}

/// Convert a column-oriented correlation payload `{"<column>": {"<row>": n}}`
///
/// Every column must carry the same row labels. `null` cells become NaN.
pub fn heatmap_entry(
    payload: &Value,
    spec: &HeatmapQuerySpec,
) -> Result<HeatmapEntry, RemoteComputationError> {
    let object = payload
        .as_object()
        .ok_or_else(|| RemoteComputationError::malformed("heatmap payload is not an object"))?;
    if object.is_empty() {
        return Err(RemoteComputationError::malformed("heatmap payload has no columns"));
    }

    let mut label_sets = Vec::with_capacity(object.len());
    for (column, cells) in object {
        let cells = cells.as_object().ok_or_else(|| {
            RemoteComputationError::malformed(format!("column '{column}' is not an object"))
        })?;
        label_sets.push((column, cells.keys().map(String::as_str).collect::<BTreeSet<_>>()));
    }
    let labels = label_sets[0].1.clone();
    if let Some((column, _)) = label_sets.iter().find(|(_, set)| *set != labels) {
        return Err(RemoteComputationError::malformed(format!(
            "column '{column}' has different row labels"
        )));
    }

    let columns: Vec<String> = object.keys().cloned().collect();
    let mut rows = Vec::with_capacity(labels.len());
    for label in labels {
        let mut values = Vec::with_capacity(columns.len());
        for column in &columns {
            let cell = &object[column][label];
            let value = match cell {
                Value::Null => f64::NAN,
                other => other.as_f64().ok_or_else(|| {
                    RemoteComputationError::malformed(format!(
                        "cell ({label}, {column}) is not a number"
                    ))
                })?,
            };
            values.push(value);
        }
        rows.push(HeatmapRow {
            label: label.to_string(),
            values,
        });
    }

    Ok(HeatmapEntry {
        fingerprint: heatmap_fingerprint(&spec.organisation_ids, &spec.region),
        region: spec.region.clone(),
        columns,
        rows,
    })
}
