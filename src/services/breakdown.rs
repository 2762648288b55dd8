//! Per-dimension account rollups (provider, store, ad type).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::MetricRecord;
use crate::utils::{mean, round2};

/// Aggregate performance for one value of a breakdown dimension.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DimensionSlice {
    pub value: String,
    pub ad_count: usize,
    pub total_spend: f64,
    pub total_conversion_value: f64,
    pub avg_cpa: f64,
    pub avg_roas: f64,
    pub avg_ctr: f64,
}

/// Rollup of the whole account along one dimension, largest spend first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DimensionBreakdown {
    pub dimension: String,
    pub slices: Vec<DimensionSlice>,
}

pub fn breakdown_by(records: &[MetricRecord], dimension: &str) -> DimensionBreakdown {
    let mut groups: BTreeMap<&str, Vec<&MetricRecord>> = BTreeMap::new();
    for record in records {
        let value = dimension_value(record, dimension);
        if value.is_empty() {
            continue;
        }
        groups.entry(value).or_default().push(record);
    }

    let mut slices: Vec<DimensionSlice> = groups
        .into_iter()
        .map(|(value, members)| {
            let cpas: Vec<f64> = members.iter().map(|r| r.cpa).collect();
            let roases: Vec<f64> = members.iter().map(|r| r.roas).collect();
            let ctrs: Vec<f64> = members.iter().map(|r| r.ctr).collect();
            DimensionSlice {
                value: value.to_string(),
                ad_count: members.len(),
                total_spend: round2(members.iter().map(|r| r.spend).sum()),
                total_conversion_value: round2(
                    members.iter().map(|r| r.conversion_value).sum(),
                ),
                avg_cpa: round2(mean(&cpas).unwrap_or(0.0)),
                avg_roas: round2(mean(&roases).unwrap_or(0.0)),
                avg_ctr: round2(mean(&ctrs).unwrap_or(0.0)),
            }
        })
        .collect();

    slices.sort_by(|a, b| {
        b.total_spend.partial_cmp(&a.total_spend).unwrap_or(std::cmp::Ordering::Equal)
    });

    DimensionBreakdown { dimension: dimension.to_string(), slices }
}

fn dimension_value<'a>(record: &'a MetricRecord, dimension: &str) -> &'a str {
    match dimension {
        "ad_provider" => &record.ad_provider,
        "store" => &record.store,
        "ad_type" => &record.ad_type,
        _ => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(provider: &str, spend: f64, roas: f64) -> MetricRecord {
        MetricRecord {
            ad_name: format!("{}-{}", provider, spend),
            ad_provider: provider.to_string(),
            spend,
            roas,
            cpa: 10.0,
            ctr: 0.02,
            conversion_value: spend * roas,
            ..Default::default()
        }
    }

    #[test]
    fn test_slices_sorted_by_spend_desc() {
        let records = vec![
            record("meta", 100.0, 2.0),
            record("google", 500.0, 3.0),
            record("meta", 150.0, 4.0),
        ];
        let breakdown = breakdown_by(&records, "ad_provider");

        assert_eq!(breakdown.slices.len(), 2);
        assert_eq!(breakdown.slices[0].value, "google");
        assert_eq!(breakdown.slices[0].total_spend, 500.0);
        assert_eq!(breakdown.slices[1].value, "meta");
        assert_eq!(breakdown.slices[1].total_spend, 250.0);
        assert_eq!(breakdown.slices[1].ad_count, 2);
        assert_eq!(breakdown.slices[1].avg_roas, 3.0);
    }

    #[test]
    fn test_missing_dimension_values_are_dropped() {
        let records = vec![record("", 100.0, 2.0), record("meta", 50.0, 2.0)];
        let breakdown = breakdown_by(&records, "ad_provider");
        assert_eq!(breakdown.slices.len(), 1);
        assert_eq!(breakdown.slices[0].value, "meta");
    }

    #[test]
    fn test_unknown_dimension_yields_empty_breakdown() {
        let records = vec![record("meta", 100.0, 2.0)];
        let breakdown = breakdown_by(&records, "campaign_objective");
        assert!(breakdown.slices.is_empty());
    }
}
