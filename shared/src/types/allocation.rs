//! Allocation API data structures
//!
//! These types mirror the JSON returned by the Kubecost Allocation API
//! (`/allocation/compute`). Numeric fields are looked up by name at runtime
//! through an accessor table, so the metric configuration can refer to any of
//! them without a hardcoded field list in the exporter.

use crate::types::value::LabelMap;
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};

/// Reads a numeric field out of an [`AllocationRecord`]
pub type FieldAccessor = fn(&AllocationRecord) -> f64;

/// Deserialize `null` as the type's default value.
///
/// Kubecost emits `null` for empty maps and for some numeric fields.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

macro_rules! allocation_record {
    ($( $(#[$doc:meta])* $field:ident: $exported:literal => $json:literal, )*) => {
        /// One cost allocation entry for an aggregation (cluster, namespace, pod, ...)
        #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
        pub struct AllocationRecord {
            #[serde(default, deserialize_with = "null_as_default")]
            pub name: String,

            /// Free-form properties used as label sources
            #[serde(default, deserialize_with = "null_as_default")]
            pub properties: LabelMap,

            #[serde(default, deserialize_with = "null_as_default")]
            pub window: LabelMap,

            #[serde(default, deserialize_with = "null_as_default")]
            pub start: String,

            #[serde(default, deserialize_with = "null_as_default")]
            pub end: String,

            #[serde(default, deserialize_with = "null_as_default")]
            pub pvs: LabelMap,

            #[serde(rename = "rawAllocationOnly", default, deserialize_with = "null_as_default")]
            pub raw_allocation_only: LabelMap,

            $(
                $(#[$doc])*
                #[serde(rename = $json, default, deserialize_with = "null_as_default")]
                pub $field: f64,
            )*
        }

        /// Exported field identifier, JSON key, accessor
        const FIELDS: &[(&str, &str, FieldAccessor)] = &[
            $( ($exported, $json, |a: &AllocationRecord| a.$field), )*
        ];
    };
}

allocation_record! {
    minutes: "Minutes" => "minutes",
    cpu_cores: "CPUCores" => "cpuCores",
    cpu_core_request_average: "CPUCoreRequestAverage" => "cpuCoreRequestAverage",
    cpu_core_usage_average: "CPUCoreUsageAverage" => "cpuCoreUsageAverage",
    cpu_core_hours: "CPUCoreHours" => "cpuCoreHours",
    cpu_cost: "CPUCost" => "cpuCost",
    cpu_cost_adjustment: "CPUCostAdjustment" => "cpuCostAdjustment",
    cpu_efficiency: "CPUEfficiency" => "cpuEfficiency",
    gpu_count: "GPUCount" => "gpuCount",
    gpu_hours: "GPUHours" => "gpuHours",
    gpu_cost: "GPUCost" => "gpuCost",
    gpu_cost_adjustment: "GPUCostAdjustment" => "gpuCostAdjustment",
    network_transfer_bytes: "NetworkTransferBytes" => "networkTransferBytes",
    network_receive_bytes: "NetworkReceiveBytes" => "networkReceiveBytes",
    network_cost: "NetworkCost" => "networkCost",
    network_cost_adjustment: "NetworkCostAdjustment" => "networkCostAdjustment",
    load_balancer_cost: "LoadBalancerCost" => "loadBalancerCost",
    load_balancer_cost_adjustment: "LoadBalancerCostAdjustment" => "loadBalancerCostAdjustment",
    pv_bytes: "PVBytes" => "pvBytes",
    pv_byte_hours: "PVByteHours" => "pvByteHours",
    pv_cost: "PVCost" => "pvCost",
    pv_cost_adjustment: "PVCostAdjustment" => "pvCostAdjustment",
    ram_bytes: "RAMBytes" => "ramBytes",
    ram_byte_request_average: "RAMByteRequestAverage" => "ramByteRequestAverage",
    ram_byte_usage_average: "RAMByteUsageAverage" => "ramByteUsageAverage",
    ram_byte_hours: "RAMByteHours" => "ramByteHours",
    ram_cost: "RAMCost" => "ramCost",
    ram_cost_adjustment: "RAMCostAdjustment" => "ramCostAdjustment",
    ram_efficiency: "RAMEfficiency" => "ramEfficiency",
    shared_cost: "SharedCost" => "sharedCost",
    external_cost: "ExternalCost" => "externalCost",
    /// Sum of all cost components
    total_cost: "TotalCost" => "totalCost",
    total_efficiency: "TotalEfficiency" => "totalEfficiency",
}

/// Look up the accessor for a numeric field.
///
/// Accepts the exported identifier (`TotalCost`) as well as the JSON key
/// (`totalCost`). Returns `None` for anything else.
pub fn field_accessor(name: &str) -> Option<FieldAccessor> {
    FIELDS
        .iter()
        .find(|(exported, json, _)| *exported == name || *json == name)
        .map(|(_, _, accessor)| *accessor)
}

/// All exported numeric field identifiers, in declaration order
pub fn field_names() -> impl Iterator<Item = &'static str> {
    FIELDS.iter().map(|(exported, _, _)| *exported)
}

impl AllocationRecord {
    /// Value of a numeric field by name, zero if the name is unknown
    pub fn value_by_field_name(&self, name: &str) -> f64 {
        field_accessor(name).map(|get| get(self)).unwrap_or(0.0)
    }
}

/// Allocation API response envelope.
///
/// `data` holds one map per step of the query window; each map goes from
/// the aggregation value (e.g. a namespace name) to its allocation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AllocationResponse {
    #[serde(default)]
    pub code: i32,

    #[serde(default, deserialize_with = "null_as_default")]
    pub status: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub data: Vec<IndexMap<String, AllocationRecord>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl AllocationResponse {
    /// Drop the aggregation keys and flatten all buckets into one list,
    /// keeping the order in which records appear in the document.
    pub fn into_records(self) -> Vec<AllocationRecord> {
        self.data
            .into_iter()
            .flat_map(|bucket| bucket.into_values())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::value::LabelValue;

    #[test]
    fn test_value_by_field_name() {
        let record = AllocationRecord {
            cpu_cores: 1337.0,
            ..Default::default()
        };

        assert_eq!(record.value_by_field_name("CPUCores"), 1337.0);
        assert_eq!(record.value_by_field_name("cpuCores"), 1337.0);
        assert_eq!(record.value_by_field_name("x"), 0.0);
        assert_eq!(AllocationRecord::default().value_by_field_name("x"), 0.0);
    }

    #[test]
    fn test_every_field_is_reachable() {
        let names: Vec<_> = field_names().collect();
        assert_eq!(names.len(), 33);
        for name in names {
            assert!(field_accessor(name).is_some(), "{} has no accessor", name);
        }
    }

    #[test]
    fn test_decode_record_with_nulls() {
        let json = r#"{
            "name": "kube-system",
            "properties": {"cluster": "cluster-one", "namespace": "kube-system"},
            "window": {"start": "2023-01-01T00:00:00Z", "end": "2023-01-01T00:01:00Z"},
            "start": "2023-01-01T00:00:00Z",
            "end": "2023-01-01T00:01:00Z",
            "cpuCost": 0.25,
            "ramCost": null,
            "pvs": null,
            "totalCost": 1.5
        }"#;

        let record: AllocationRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.name, "kube-system");
        assert_eq!(record.cpu_cost, 0.25);
        assert_eq!(record.ram_cost, 0.0);
        assert_eq!(record.total_cost, 1.5);
        assert!(record.pvs.is_empty());
        assert_eq!(
            record.properties["namespace"],
            LabelValue::String("kube-system".into())
        );
    }

    #[test]
    fn test_flatten_preserves_order() {
        let json = r#"{
            "code": 200,
            "status": "success",
            "data": [
                {"zeta": {"name": "zeta"}, "alpha": {"name": "alpha"}},
                {"mid": {"name": "mid"}}
            ]
        }"#;

        let response: AllocationResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.code, 200);

        let names: Vec<_> = response
            .into_records()
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_empty_data() {
        let response: AllocationResponse =
            serde_json::from_str(r#"{"code": 200, "status": "success", "data": []}"#).unwrap();
        assert!(response.into_records().is_empty());

        let response: AllocationResponse =
            serde_json::from_str(r#"{"code": 200, "status": "success", "data": null}"#).unwrap();
        assert!(response.into_records().is_empty());
    }
}
