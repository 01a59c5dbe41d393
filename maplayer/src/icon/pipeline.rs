//! Sequential icon batch resolution and the badge size-lookup table.

use std::sync::Arc;

use tracing::{debug, warn};

use super::resolver::{IconImage, IconResolver};

/// Lookup table from cluster-size thresholds to badge icons.
///
/// Thresholds are held in ascending order. For a cluster of size `k`, the
/// badge is the image of the smallest threshold strictly greater than `k`;
/// when no threshold exceeds `k`, the largest-threshold image is used.
#[derive(Debug, Clone, Default)]
pub struct ClusterIconTable {
    entries: Vec<(u32, Arc<IconImage>)>,
}

impl ClusterIconTable {
    /// The badge icon for a cluster of `count` members.
    ///
    /// Returns `None` only when the table is empty.
    pub fn icon_for_count(&self, count: u32) -> Option<&Arc<IconImage>> {
        self.entries
            .iter()
            .find(|(threshold, _)| *threshold > count)
            .map(|(_, image)| image)
            .or_else(|| self.entries.last().map(|(_, image)| image))
    }

    /// Number of resolved buckets.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether any bucket resolved.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The ascending threshold values with resolved icons.
    pub fn thresholds(&self) -> impl Iterator<Item = u32> + '_ {
        self.entries.iter().map(|(threshold, _)| *threshold)
    }
}

/// Resolve a batch of `(threshold, url)` pairs into a badge table.
///
/// Strictly sequential: each URL is only requested after the previous one
/// has resolved or failed. A failing URL is logged and skipped; the batch
/// never aborts. The returned table contains exactly the buckets whose URL
/// resolved, and the function returns exactly once, after the final entry,
/// immediately for an empty batch.
pub async fn resolve_batch(
    resolver: &dyn IconResolver,
    entries: &[(u32, String)],
    width: u32,
    height: u32,
) -> ClusterIconTable {
    let mut resolved = Vec::with_capacity(entries.len());

    for (threshold, url) in entries {
        match resolver.resolve(url, width, height).await {
            Ok(image) => resolved.push((*threshold, image)),
            Err(error) => {
                warn!(url = %url, threshold, %error, "cluster icon failed to resolve, skipping");
            }
        }
    }

    resolved.sort_by_key(|(threshold, _)| *threshold);
    debug!(buckets = resolved.len(), requested = entries.len(), "icon batch complete");

    ClusterIconTable { entries: resolved }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::FakeIconResolver;
    use std::collections::HashMap;

    fn batch(urls: &[(u32, &str)]) -> Vec<(u32, String)> {
        urls.iter().map(|(t, u)| (*t, u.to_string())).collect()
    }

    #[tokio::test]
    async fn test_empty_batch_completes_without_resolver_calls() {
        let resolver = FakeIconResolver::new();
        let table = resolve_batch(&resolver, &[], 30, 30).await;

        assert!(table.is_empty());
        assert_eq!(resolver.call_count(), 0);
    }

    #[tokio::test]
    async fn test_batch_preserves_submission_order() {
        let resolver = FakeIconResolver::new();
        let entries = batch(&[(10, "u1"), (50, "u2"), (100, "u3")]);
        resolve_batch(&resolver, &entries, 30, 30).await;

        assert_eq!(resolver.calls(), vec!["u1", "u2", "u3"]);
    }

    #[tokio::test]
    async fn test_failed_url_is_skipped_not_fatal() {
        let resolver = FakeIconResolver::failing_on(&["u2"]);
        let entries = batch(&[(10, "u1"), (50, "u2"), (100, "u3")]);
        let table = resolve_batch(&resolver, &entries, 30, 30).await;

        // u3 was still requested after u2 failed.
        assert_eq!(resolver.calls(), vec!["u1", "u2", "u3"]);
        // Table holds exactly the surviving buckets.
        let thresholds: Vec<u32> = table.thresholds().collect();
        assert_eq!(thresholds, vec![10, 100]);
    }

    #[tokio::test]
    async fn test_icon_for_count_picks_smallest_exceeding_threshold() {
        let resolver = FakeIconResolver::new();
        let entries = batch(&[(10, "u1"), (50, "u2"), (100, "u3")]);
        let table = resolve_batch(&resolver, &entries, 30, 30).await;

        let mut by_threshold: HashMap<u32, usize> = HashMap::new();
        for (i, t) in table.thresholds().enumerate() {
            by_threshold.insert(t, i);
        }

        // count 5 → bucket 10; count 10 → bucket 50 (strictly greater);
        // count 99 → bucket 100; count 500 → largest available bucket.
        let icon_5 = table.icon_for_count(5).unwrap();
        let icon_10 = table.icon_for_count(10).unwrap();
        let icon_500 = table.icon_for_count(500).unwrap();

        assert!(Arc::ptr_eq(icon_5, table.icon_for_count(9).unwrap()));
        assert!(!Arc::ptr_eq(icon_5, icon_10));
        assert!(Arc::ptr_eq(icon_500, table.icon_for_count(1000).unwrap()));
        assert_eq!(by_threshold.len(), 3);
    }

    #[test]
    fn test_empty_table_has_no_icon() {
        let table = ClusterIconTable::default();
        assert!(table.icon_for_count(10).is_none());
    }
}
