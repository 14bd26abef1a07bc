//! Allocation gauges and their update from fetched records
//!
//! Every entry of the metric schema becomes one `GaugeVec` whose variable
//! labels are the schema's label names. Gauges are never reset: each poll
//! sets the latest value for every label set it sees.

use crate::metrics::LABEL_MISMATCH_TOTAL;
use crate::schema::{FieldMetric, MetricSchema, SchemaError};
use kubecost_shared::types::allocation::AllocationRecord;
use kubecost_shared::types::value::LabelMap;
use kubecost_shared::utils::{canonicalize, resolve_path, DEFAULT_SEPARATOR};
use prometheus::{GaugeVec, Opts, Registry};
use std::collections::{BTreeMap, HashMap};
use tracing::warn;

/// Label name to canonical label value
pub type LabelSet = BTreeMap<String, String>;

/// Outcome of applying one batch of records
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateSummary {
    pub records: usize,
    pub updated: usize,
    pub skipped: usize,
}

struct GaugeFamily {
    metric: FieldMetric,
    gauge: GaugeVec,
}

/// Gauges for every configured allocation field
pub struct AllocationGauges {
    schema: MetricSchema,
    families: Vec<GaugeFamily>,
}

impl AllocationGauges {
    /// Create one gauge family per schema entry.
    pub fn new(schema: MetricSchema) -> Result<Self, SchemaError> {
        let label_names = schema.label_names();
        let families = schema
            .names
            .iter()
            .map(|metric| {
                let opts = Opts::new(
                    metric.name.clone(),
                    format!("Kubecost allocation {}", metric.field),
                )
                .namespace(schema.namespace.clone())
                .subsystem(schema.subsystem.clone());

                GaugeVec::new(opts, &label_names)
                    .map(|gauge| GaugeFamily {
                        metric: metric.clone(),
                        gauge,
                    })
                    .map_err(|source| SchemaError::Metric {
                        name: metric.name.clone(),
                        source,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { schema, families })
    }

    /// Register every gauge family with `registry`
    pub fn register(&self, registry: &Registry) -> Result<(), SchemaError> {
        for family in &self.families {
            registry
                .register(Box::new(family.gauge.clone()))
                .map_err(|source| SchemaError::Metric {
                    name: family.metric.name.clone(),
                    source,
                })?;
        }
        Ok(())
    }

    /// Label values for a record's properties.
    ///
    /// Every configured label is present; paths that do not resolve yield an
    /// empty value.
    pub fn label_values(&self, properties: &LabelMap) -> LabelSet {
        self.schema
            .labels
            .iter()
            .map(|label| {
                let value = resolve_path(&label.key, properties)
                    .map(|v| canonicalize(v, DEFAULT_SEPARATOR))
                    .unwrap_or_default();
                (label.name.clone(), value)
            })
            .collect()
    }

    /// Set every gauge from a batch of records
    pub fn update(&self, records: &[AllocationRecord]) -> UpdateSummary {
        let mut summary = UpdateSummary {
            records: records.len(),
            ..Default::default()
        };

        for record in records {
            let labels = self.label_values(&record.properties);
            let (updated, skipped) = self.apply(record, &labels);
            summary.updated += updated;
            summary.skipped += skipped;
        }
        summary
    }

    /// Set every gauge for one record using `labels`. A label set that does
    /// not match a gauge's variable labels skips that gauge.
    fn apply(&self, record: &AllocationRecord, labels: &LabelSet) -> (usize, usize) {
        let lookup: HashMap<&str, &str> = labels
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();

        let mut updated = 0;
        let mut skipped = 0;
        for family in &self.families {
            match family.gauge.get_metric_with(&lookup) {
                Ok(gauge) => {
                    gauge.set(family.metric.value(record));
                    updated += 1;
                }
                Err(e) => {
                    warn!(
                        metric = %family.metric.name,
                        field = %family.metric.field,
                        labels = ?labels,
                        "Number of label values is not the same as the number of variable labels: {}",
                        e
                    );
                    LABEL_MISMATCH_TOTAL.inc();
                    skipped += 1;
                }
            }
        }
        (updated, skipped)
    }
}
