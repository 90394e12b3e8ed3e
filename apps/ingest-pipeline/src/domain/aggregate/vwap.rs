//! Volume-weighted average price over a set of observations.
//!
//! The VWAP series is the cross-source consensus price the rest of the
//! system treats as ground truth in preference to any single source.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::observation::PriceObservation;
use crate::domain::shared::{AssetId, SourceId, Timestamp};

/// One VWAP data point: a single asset over a single time window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VwapRecord {
    /// Asset this record aggregates.
    pub asset_id: AssetId,
    /// Start of the aggregation window.
    pub window_start: Timestamp,
    /// Window width in seconds.
    pub window_secs: u64,
    /// Volume-weighted average price.
    pub vwap_price: Decimal,
    /// Total volume across contributing observations.
    pub total_volume: Decimal,
    /// Total notional value (Σ price × volume).
    pub total_value: Decimal,
    /// Number of distinct contributing sources.
    pub source_count: u32,
    /// Sorted, deduplicated contributing source ids, kept for auditability.
    pub sources: Vec<SourceId>,
}

/// Compute one VWAP record per distinct asset present in `observations`.
///
/// Only entries with positive price and positive volume contribute; an
/// asset whose contributions sum to zero volume yields no record rather
/// than a fabricated zero price. Output order and content are invariant to
/// input order (assets are grouped through an ordered map and source lists
/// are sorted).
#[must_use]
pub fn compute_vwap(
    observations: &[PriceObservation],
    window_start: Timestamp,
    window_secs: u64,
) -> Vec<VwapRecord> {
    let mut groups: BTreeMap<&AssetId, Vec<&PriceObservation>> = BTreeMap::new();
    for obs in observations {
        groups.entry(&obs.asset_id).or_default().push(obs);
    }

    let mut records = Vec::with_capacity(groups.len());
    for (asset_id, group) in groups {
        let mut total_value = Decimal::ZERO;
        let mut total_volume = Decimal::ZERO;
        let mut sources: Vec<SourceId> = Vec::new();

        for obs in group {
            if obs.price > Decimal::ZERO && obs.volume > Decimal::ZERO {
                total_value += obs.price * obs.volume;
                total_volume += obs.volume;
                sources.push(obs.source_id.clone());
            }
        }

        if total_volume == Decimal::ZERO {
            continue;
        }

        sources.sort();
        sources.dedup();

        records.push(VwapRecord {
            asset_id: asset_id.clone(),
            window_start,
            window_secs,
            vwap_price: total_value / total_volume,
            total_volume,
            total_value,
            source_count: u32::try_from(sources.len()).unwrap_or(u32::MAX),
            sources,
        });
    }

    records
}
