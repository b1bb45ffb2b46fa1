//! Region resolution and per-region batching.

use indexmap::IndexMap;

use crate::model::{ExportKey, KeyRecord};

/// Entry in `native_regions` meaning "serve every region natively".
pub const REGION_WILDCARD: &str = "*";

/// Group key records into per-region batches.
///
/// For every record and every region in its `regions` set, the target region
/// is `default_region` when `native_regions` contains the wildcard `*` or
/// that region literally; otherwise the region code is used unchanged. A
/// record listing N regions lands in up to N batches — intentional fan-out.
///
/// Batches preserve first-seen order per region (the caller feeds records in
/// `key_data` order, so regenerated batches are identical). Empty input
/// yields an empty map.
pub fn partition_by_region(
    records: &[KeyRecord],
    default_region: &str,
    native_regions: &[String],
) -> IndexMap<String, Vec<ExportKey>> {
    let serve_all = native_regions.iter().any(|r| r == REGION_WILDCARD);

    let mut batches: IndexMap<String, Vec<ExportKey>> = IndexMap::new();
    for record in records {
        for region in &record.regions {
            let target = if serve_all || native_regions.iter().any(|r| r == region) {
                default_region
            } else {
                region.as_str()
            };
            batches
                .entry(target.to_string())
                .or_default()
                .push(record.to_export_key());
        }
    }
    batches
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(id: i64, regions: &[&str]) -> KeyRecord {
        KeyRecord {
            id,
            created_at: Utc::now(),
            key_data: "AAAAAAAAAAAAAAAAAAAAAA==".to_string(),
            rolling_start_interval_number: 2_650_000,
            rolling_period: 144,
            transmission_risk_level: 4,
            regions: regions.iter().map(|r| r.to_string()).collect(),
        }
    }

    #[test]
    fn test_empty_input_yields_empty_map() {
        let batches = partition_by_region(&[], "US", &[]);
        assert!(batches.is_empty());
    }

    #[test]
    fn test_fan_out_to_every_listed_region() {
        let records = vec![record(1, &["A", "B"])];
        let batches = partition_by_region(&records, "US", &[]);

        assert_eq!(batches.len(), 2);
        assert_eq!(batches["A"].len(), 1);
        assert_eq!(batches["B"].len(), 1);
        assert_eq!(batches["A"][0], records[0].to_export_key());
    }

    #[test]
    fn test_wildcard_collapses_everything_to_default() {
        let records = vec![record(1, &["A", "B"]), record(2, &["C"])];
        let wildcard = vec![REGION_WILDCARD.to_string()];
        let batches = partition_by_region(&records, "US", &wildcard);

        assert_eq!(batches.len(), 1);
        // record 1 fans out twice (once per listed region), record 2 once.
        assert_eq!(batches["US"].len(), 3);
    }

    #[test]
    fn test_native_region_resolves_to_default() {
        let records = vec![record(1, &["DE", "FR"])];
        let native = vec!["DE".to_string()];
        let batches = partition_by_region(&records, "US", &native);

        assert_eq!(batches["US"].len(), 1);
        assert_eq!(batches["FR"].len(), 1);
    }

    #[test]
    fn test_first_seen_order_preserved() {
        let records = vec![record(1, &["B"]), record(2, &["A"]), record(3, &["B"])];
        let batches = partition_by_region(&records, "US", &[]);

        let regions: Vec<&str> = batches.keys().map(String::as_str).collect();
        assert_eq!(regions, vec!["B", "A"]);
        assert_eq!(batches["B"].len(), 2);
    }
}
