//! Duplicate grouping: find older posts advertising the same catalog item
//! (keyword + SKU) and plan their removal, keeping the newest copy.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info};

use crate::{
    delete::BatchDeleter,
    domain::{ChatId, PostId},
    extract::{extract_sku, match_keywords},
    messaging::{port::ChannelClient, types::Post},
    Result,
};

/// Recent posts scanned by the operator-triggered bulk sweep.
pub const DEFAULT_SCAN_LIMIT: usize = 600;
/// Candidate window for the targeted per-post probe.
pub const DEFAULT_PROBE_LIMIT: usize = 300;

/// SKU → ids of posts carrying both the keyword and that SKU.
/// Built fresh per scan, never persisted.
pub type DuplicateGroups = BTreeMap<String, Vec<PostId>>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlanEntry {
    pub sku: String,
    /// Numerically largest id in the group; ids grow with creation time,
    /// so largest means newest. Definitional policy, not a heuristic.
    pub keep: PostId,
    pub delete: Vec<PostId>,
}

/// What the sweep proposes to remove, surfaced to the operator before any
/// deletion happens.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeletionPlan {
    pub entries: Vec<PlanEntry>,
}

impl DeletionPlan {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_deletions(&self) -> usize {
        self.entries.iter().map(|e| e.delete.len()).sum()
    }
}

/// Build the plan from grouped ids: keep the largest id per SKU, delete the
/// rest; single-member groups produce no entry at all.
pub fn build_plan(groups: DuplicateGroups) -> DeletionPlan {
    let mut entries = Vec::new();
    for (sku, mut ids) in groups {
        ids.sort();
        ids.dedup();
        let Some(&keep) = ids.last() else {
            continue;
        };
        let delete: Vec<PostId> = ids.iter().copied().filter(|id| *id != keep).collect();
        if delete.is_empty() {
            continue;
        }
        entries.push(PlanEntry { sku, keep, delete });
    }
    DeletionPlan { entries }
}

/// Scans chat history and groups posts by extracted SKU.
pub struct DedupEngine {
    client: Arc<dyn ChannelClient>,
    scan_limit: usize,
    probe_limit: usize,
}

impl DedupEngine {
    pub fn new(client: Arc<dyn ChannelClient>) -> Self {
        Self {
            client,
            scan_limit: DEFAULT_SCAN_LIMIT,
            probe_limit: DEFAULT_PROBE_LIMIT,
        }
    }

    pub fn with_limits(client: Arc<dyn ChannelClient>, scan_limit: usize, probe_limit: usize) -> Self {
        Self {
            client,
            scan_limit,
            probe_limit,
        }
    }

    /// Bulk mode: scan recent posts mentioning `keyword` and group by SKU.
    pub async fn collect_groups(&self, chat_id: ChatId, keyword: &str) -> Result<DuplicateGroups> {
        let posts = self
            .client
            .search_history(chat_id, keyword, self.scan_limit)
            .await?;
        let mut groups = DuplicateGroups::new();
        for post in &posts {
            let Some(sku) = extract_sku(&post.text, keyword) else {
                continue;
            };
            groups.entry(sku).or_default().push(post.id);
        }
        debug!(
            chat = chat_id.0,
            scanned = posts.len(),
            groups = groups.len(),
            "grouped posts by sku"
        );
        Ok(groups)
    }

    /// Bulk mode, all the way to a deletion plan.
    pub async fn sweep_plan(&self, chat_id: ChatId, keyword: &str) -> Result<DeletionPlan> {
        Ok(build_plan(self.collect_groups(chat_id, keyword).await?))
    }

    /// Targeted mode: ids of posts that carry both `keyword` and `sku`,
    /// excluding `exclude` (the post that triggered the check).
    ///
    /// The platform search is only a coarse pre-filter (it matches partial
    /// tokens), so every candidate is re-verified locally before it counts.
    pub async fn find_duplicates(
        &self,
        chat_id: ChatId,
        keyword: &str,
        sku: &str,
        exclude: PostId,
    ) -> Result<Vec<PostId>> {
        let candidates = self
            .client
            .search_history(chat_id, sku, self.probe_limit)
            .await?;
        let keyword_lower = keyword.to_lowercase();
        Ok(candidates
            .into_iter()
            .filter(|p| p.id != exclude)
            .filter(|p| {
                p.text.to_lowercase().contains(&keyword_lower) && p.text.contains(sku)
            })
            .map(|p| p.id)
            .collect())
    }

    /// Post-edit hook body: match the post against the keyword list (first
    /// keyword with an extractable SKU wins), then remove older copies.
    /// Returns the number of posts whose deletion was requested.
    pub async fn reconcile_post(
        &self,
        post: &Post,
        keywords: &[String],
        deleter: &BatchDeleter,
    ) -> Result<usize> {
        let text = post.text.trim();
        if text.is_empty() || keywords.is_empty() {
            return Ok(0);
        }
        let Some((keyword, sku)) = match_keywords(text, keywords) else {
            return Ok(0);
        };

        let duplicates = self
            .find_duplicates(post.chat_id, &keyword, &sku, post.id)
            .await?;
        if duplicates.is_empty() {
            return Ok(0);
        }

        let deleted = deleter.delete_many(post.chat_id, &duplicates).await;
        if deleted > 0 {
            info!(
                chat = post.chat_id.0,
                kept = post.id.0,
                removed = deleted,
                %keyword,
                %sku,
                "removed duplicate posts"
            );
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(raw: &[i32]) -> Vec<PostId> {
        raw.iter().copied().map(PostId).collect()
    }

    #[test]
    fn plan_keeps_largest_id() {
        let mut groups = DuplicateGroups::new();
        groups.insert("127".to_string(), ids(&[1001, 1050, 1200]));

        let plan = build_plan(groups);
        assert_eq!(plan.entries.len(), 1);
        let entry = &plan.entries[0];
        assert_eq!(entry.sku, "127");
        assert_eq!(entry.keep, PostId(1200));
        assert_eq!(entry.delete, ids(&[1001, 1050]));
        assert_eq!(plan.total_deletions(), 2);
    }

    #[test]
    fn plan_ignores_arrival_order() {
        let mut groups = DuplicateGroups::new();
        groups.insert("a".to_string(), ids(&[1200, 1001, 1050]));

        let plan = build_plan(groups);
        assert_eq!(plan.entries[0].keep, PostId(1200));
        assert_eq!(plan.entries[0].delete, ids(&[1001, 1050]));
    }

    #[test]
    fn singleton_groups_produce_no_entry() {
        let mut groups = DuplicateGroups::new();
        groups.insert("solo".to_string(), ids(&[42]));
        groups.insert("pair".to_string(), ids(&[10, 20]));

        let plan = build_plan(groups);
        assert_eq!(plan.entries.len(), 1);
        assert_eq!(plan.entries[0].sku, "pair");
        assert_eq!(plan.entries[0].delete.len(), 1);
    }

    #[test]
    fn group_of_n_plans_n_minus_one_deletions() {
        let mut groups = DuplicateGroups::new();
        groups.insert("x".to_string(), ids(&[1, 2, 3, 4, 5]));

        let plan = build_plan(groups);
        let entry = &plan.entries[0];
        assert_eq!(entry.delete.len(), 4);
        assert!(!entry.delete.contains(&entry.keep));
    }

    #[test]
    fn empty_groups_make_empty_plan() {
        let plan = build_plan(DuplicateGroups::new());
        assert!(plan.is_empty());
        assert_eq!(plan.total_deletions(), 0);
    }
}
