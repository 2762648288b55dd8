//! Shared fixtures for integration tests.

use crate::models::MetricRecord;

/// One healthy mid-pack ad.
pub fn healthy_ad(name: &str, provider: &str, spend: f64) -> MetricRecord {
    MetricRecord {
        ad_name: name.to_string(),
        ad_id: format!("{}-id", name),
        ad_provider: provider.to_string(),
        store: "US".to_string(),
        ad_type: "video".to_string(),
        spend,
        total_impressions: 100_000,
        total_clicks: 2_000,
        purchases: 40.0,
        conversion_value: spend * 2.5,
        cpa: 22.0,
        roas: 2.5,
        ctr: 0.02,
        cvr: 0.02,
        days_active: 30,
        creative_variants: 3,
        ..Default::default()
    }
}

/// An account with enough healthy ads to clear the detection sample floor.
pub fn healthy_account(size: usize) -> Vec<MetricRecord> {
    (0..size)
        .map(|i| {
            let provider = if i % 2 == 0 { "meta" } else { "google" };
            let mut ad = healthy_ad(&format!("ad_{}", i), provider, 400.0 + i as f64 * 10.0);
            ad.cpa = 20.0 + (i % 5) as f64;
            ad.roas = 2.2 + (i % 4) as f64 * 0.2;
            ad
        })
        .collect()
}

/// A high-spend ad burning money: extreme CPA, near-zero ROAS.
pub fn money_pit(name: &str, spend: f64) -> MetricRecord {
    let mut ad = healthy_ad(name, "meta", spend);
    ad.cpa = 450.0;
    ad.roas = 0.2;
    ad.conversion_value = spend * 0.2;
    ad.purchases = 2.0;
    ad
}

/// A proven winner eligible for the scaling scan.
pub fn star_performer(name: &str, spend: f64) -> MetricRecord {
    let mut ad = healthy_ad(name, "google", spend);
    ad.roas = 5.5;
    ad.cpa = 8.0;
    ad.conversion_value = spend * 5.5;
    ad
}
