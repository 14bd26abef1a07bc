//! Metric schema derived from configuration
//!
//! The schema pairs each exported allocation field with a metric name and
//! lists the labels every metric carries. It is built once at startup and
//! read-only afterwards.

use crate::config::{LabelSource, MetricsConfig};
use kubecost_shared::types::allocation::{field_accessor, AllocationRecord, FieldAccessor};
use std::collections::HashSet;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("metrics.names[{0}] has an empty name")]
    EmptyMetricName(usize),

    #[error("metrics.labels[{0}] has an empty name")]
    EmptyLabelName(usize),

    #[error("label '{0}' is declared more than once in metrics.labels")]
    DuplicateLabel(String),

    #[error("metric '{0}' is declared more than once in metrics.names")]
    DuplicateMetric(String),

    #[error("failed to create metric '{name}': {source}")]
    Metric {
        name: String,
        #[source]
        source: prometheus::Error,
    },
}

/// One exported field and the metric it is reported as
#[derive(Clone)]
pub struct FieldMetric {
    /// Metric name without namespace and subsystem
    pub name: String,

    /// Allocation field identifier, e.g. `TotalCost`
    pub field: String,

    accessor: Option<FieldAccessor>,
}

impl FieldMetric {
    /// Value of this field in `record`; zero if the field name is unknown
    pub fn value(&self, record: &AllocationRecord) -> f64 {
        self.accessor.map(|get| get(record)).unwrap_or(0.0)
    }

    /// Whether the field name matched a known allocation field
    pub fn is_known(&self) -> bool {
        self.accessor.is_some()
    }
}

impl std::fmt::Debug for FieldMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldMetric")
            .field("name", &self.name)
            .field("field", &self.field)
            .field("known", &self.is_known())
            .finish()
    }
}

/// Metrics and labels to export
#[derive(Debug, Clone)]
pub struct MetricSchema {
    pub namespace: String,
    pub subsystem: String,
    pub names: Vec<FieldMetric>,
    pub labels: Vec<LabelSource>,
}

impl MetricSchema {
    /// Build the schema, resolving every field name to its accessor.
    ///
    /// Unknown field names are accepted (their metric always reports zero)
    /// but logged. Empty or duplicated names are rejected.
    pub fn from_config(config: &MetricsConfig) -> Result<Self, SchemaError> {
        let mut seen_labels = HashSet::new();
        for (i, label) in config.labels.iter().enumerate() {
            if label.name.is_empty() {
                return Err(SchemaError::EmptyLabelName(i));
            }
            if !seen_labels.insert(label.name.as_str()) {
                return Err(SchemaError::DuplicateLabel(label.name.clone()));
            }
        }

        let mut seen_metrics = HashSet::new();
        let mut names = Vec::with_capacity(config.names.len());
        for (i, metric) in config.names.iter().enumerate() {
            if metric.name.is_empty() {
                return Err(SchemaError::EmptyMetricName(i));
            }
            if !seen_metrics.insert(metric.name.as_str()) {
                return Err(SchemaError::DuplicateMetric(metric.name.clone()));
            }

            let accessor = field_accessor(&metric.field);
            if accessor.is_none() {
                warn!(
                    metric = %metric.name,
                    field = %metric.field,
                    "Unknown allocation field; metric will always report 0"
                );
            }
            names.push(FieldMetric {
                name: metric.name.clone(),
                field: metric.field.clone(),
                accessor,
            });
        }

        Ok(Self {
            namespace: config.namespace.clone(),
            subsystem: config.subsystem.clone(),
            names,
            labels: config.labels.clone(),
        })
    }

    /// Label names in declaration order, the variable labels of every gauge
    pub fn label_names(&self) -> Vec<&str> {
        self.labels.iter().map(|l| l.name.as_str()).collect()
    }
}
