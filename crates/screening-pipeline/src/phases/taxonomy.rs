//! Industry taxonomy: expand the modal tree, pick plausible top-level
//! categories, pick leaves per category in bounded batches, then drop
//! redundant parent/child pairs before checking everything in one pass.

use oracle_client::OracleReply;
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::PhaseContext;
use crate::cache::{sanitize_file_stem, CacheStore};
use crate::model::{rationale, reason_or_placeholder, ExecutionSummary, OneOrMany, TaxonomyNode};
use crate::prompts;

pub const TOP_LEVEL_KEY: &str = "taxonomy/top_level_categories.json";

pub fn category_key(category: &str) -> String {
    format!("taxonomy/{}.json", sanitize_file_stem(category))
}

#[derive(Debug, Default, Deserialize)]
struct TopLevelDecision {
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    selected_categories: OneOrMany,
}

#[derive(Debug, Default, Deserialize)]
struct BatchDecision {
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    selected_nodes: OneOrMany,
}

/// Where round 2 reads a category's nodes from.
enum TaxonomySource {
    Cached,
    Collected(Vec<(String, Vec<TaxonomyNode>)>),
}

impl TaxonomySource {
    async fn top_level(&self, cache: &CacheStore) -> Vec<String> {
        match self {
            Self::Cached => cache.load(TOP_LEVEL_KEY).await.unwrap_or_default(),
            Self::Collected(groups) => groups.iter().map(|(name, _)| name.clone()).collect(),
        }
    }

    async fn nodes(&self, cache: &CacheStore, category: &str) -> Option<Vec<TaxonomyNode>> {
        match self {
            Self::Cached => cache.load(&category_key(category)).await,
            Self::Collected(groups) => groups
                .iter()
                .find(|(name, _)| name == category)
                .map(|(_, nodes)| nodes.clone()),
        }
    }
}

/// Groups nodes by top-level ancestor, in order of first appearance.
pub fn group_by_top_level(nodes: Vec<TaxonomyNode>) -> Vec<(String, Vec<TaxonomyNode>)> {
    let mut groups: Vec<(String, Vec<TaxonomyNode>)> = Vec::new();
    for node in nodes {
        match groups.iter_mut().find(|(name, _)| *name == node.top_level) {
            Some((_, members)) => members.push(node),
            None => groups.push((node.top_level.clone(), vec![node])),
        }
    }
    groups
}

/// End (exclusive) of the descendant span of `nodes[index]`: the run of
/// following nodes with strictly greater depth.
fn span_end(nodes: &[TaxonomyNode], index: usize) -> usize {
    let depth = nodes[index].depth;
    nodes[index + 1..]
        .iter()
        .position(|node| node.depth <= depth)
        .map_or(nodes.len(), |offset| index + 1 + offset)
}

/// Removes redundant parent/child selections. `nodes` must be in
/// depth-first document order.
///
/// Pass 1: a selected expandable node at depth <= 1 yields to any selected
/// descendant. Pass 2: any remaining selected expandable node removes every
/// selected descendant. Returns survivors in document order, followed by
/// selected labels that are not in `nodes`.
pub fn resolve_conflicts(nodes: &[TaxonomyNode], selected: &[String]) -> Vec<String> {
    let mut chosen: HashSet<&str> = selected.iter().map(String::as_str).collect();
    let first_index = |label: &str| nodes.iter().position(|node| node.label == label);

    for (index, node) in nodes.iter().enumerate() {
        if !node.expandable || node.depth > 1 || !chosen.contains(node.label.as_str()) {
            continue;
        }
        if first_index(&node.label) != Some(index) {
            continue;
        }
        let end = span_end(nodes, index);
        if nodes[index + 1..end]
            .iter()
            .any(|child| chosen.contains(child.label.as_str()))
        {
            debug!(target: "pipeline", parent = %node.label, "parent yields to a selected child");
            chosen.remove(node.label.as_str());
        }
    }

    for (index, node) in nodes.iter().enumerate() {
        if !node.expandable || !chosen.contains(node.label.as_str()) {
            continue;
        }
        let end = span_end(nodes, index);
        for child in &nodes[index + 1..end] {
            if chosen.remove(child.label.as_str()) {
                debug!(target: "pipeline", parent = %node.label, child = %child.label, "child covered by parent");
            }
        }
    }

    let mut survivors: Vec<String> = Vec::new();
    for label in nodes
        .iter()
        .map(|node| node.label.as_str())
        .chain(selected.iter().map(String::as_str))
    {
        if chosen.remove(label) {
            survivors.push(label.to_string());
        }
    }
    survivors
}

pub async fn run(ctx: &mut PhaseContext<'_>, summary: &mut ExecutionSummary) {
    ctx.progress.notice("🏭 Phase 6: industry taxonomy");

    match ctx.form.open_taxonomy().await {
        Ok(true) => {}
        Ok(false) => {
            ctx.progress
                .notice("  - ⚠️ The industry selector could not be opened, skipping");
            return;
        }
        Err(err) => {
            warn!(target: "pipeline", ?err, "opening the industry selector failed");
            ctx.progress
                .notice(format!("  - ⚠️ The industry selector is unavailable: {err}"));
            return;
        }
    }

    expand_tree(ctx).await;
    let source = match load_or_collect(ctx).await {
        Some(source) => source,
        None => return,
    };

    ctx.progress.notice("🧠 Round 1: top-level categories");
    let top_level = source.top_level(ctx.cache).await;
    if top_level.is_empty() {
        ctx.progress.notice("  - ❌ No top-level categories available");
        return;
    }
    let categories = match ctx
        .oracle
        .decide::<TopLevelDecision>(&prompts::taxonomy_top_level(ctx.guidance, &top_level))
        .await
    {
        OracleReply::Decision(decision) => {
            summary.set_rationale(
                rationale::INDUSTRY_TOP_LEVEL,
                reason_or_placeholder(decision.reason.as_deref()),
            );
            let mut picked = Vec::new();
            for category in decision.selected_categories.into_vec() {
                if top_level.contains(&category) && !picked.contains(&category) {
                    picked.push(category);
                } else {
                    debug!(target: "pipeline", %category, "unknown top-level category dropped");
                }
            }
            picked
        }
        OracleReply::Malformed(raw) => {
            debug!(target: "pipeline", raw_len = raw.len(), "malformed top-level decision");
            ctx.progress.notice("  - No usable top-level decision");
            Vec::new()
        }
    };
    ctx.progress.notice(format!(
        "  - {} categor(ies) selected: {}",
        categories.len(),
        categories.join(", ")
    ));
    if categories.is_empty() {
        return;
    }

    ctx.progress.notice("🧠 Round 2: detailed nodes");
    let mut union: Vec<String> = Vec::new();
    for category in &categories {
        ctx.progress.notice(format!("  - 📂 [{category}]"));
        let Some(nodes) = source.nodes(ctx.cache, category).await else {
            ctx.progress
                .notice("    - ⚠️ No cached nodes for this category");
            continue;
        };
        let selected = select_in_batches(ctx, summary, category, &nodes).await;
        if selected.is_empty() {
            continue;
        }
        let resolved = resolve_conflicts(&nodes, &selected);
        ctx.progress.notice(format!(
            "    - ✅ {} node(s) after conflict resolution (from {})",
            resolved.len(),
            selected.len()
        ));
        for label in resolved {
            if !union.contains(&label) {
                union.push(label);
            }
        }
    }

    if union.is_empty() {
        ctx.progress.notice("  - No industry nodes selected");
        return;
    }

    ctx.progress
        .notice(format!("⚙️ Checking {} industry node(s)...", union.len()));
    match ctx.form.check_taxonomy_nodes(&union).await {
        Ok(checked) => {
            let recorded: Vec<String> = union
                .iter()
                .filter(|label| checked.contains(label))
                .cloned()
                .collect();
            ctx.progress.notice(format!(
                "  - {} of {} node(s) checked",
                recorded.len(),
                union.len()
            ));
            summary.taxonomy = recorded;
        }
        Err(err) => {
            warn!(target: "pipeline", ?err, "batch check of industry nodes failed");
            ctx.progress
                .notice(format!("  - Could not check industry nodes: {err}"));
        }
    }
    ctx.capture("industries selected").await;
}

async fn expand_tree(ctx: &mut PhaseContext<'_>) {
    let settings = &ctx.config.taxonomy;
    let pause = Duration::from_millis(settings.expand_pause_ms);
    let mut total = 0usize;
    for round in 1..=settings.max_expand_rounds {
        match ctx.form.expand_taxonomy_batch().await {
            Ok(0) => break,
            Ok(expanded) => {
                total += expanded;
                debug!(target: "pipeline", round, expanded, "taxonomy batch expanded");
                ctx.form.pause(pause).await;
            }
            Err(err) => {
                warn!(target: "pipeline", ?err, round, "taxonomy expansion failed");
                break;
            }
        }
    }
    ctx.progress
        .notice(format!("  - Expanded {total} industry node(s)"));
}

async fn load_or_collect(ctx: &mut PhaseContext<'_>) -> Option<TaxonomySource> {
    if ctx.cache.contains(TOP_LEVEL_KEY).await {
        ctx.progress.notice("  - Using the cached industry index");
        return Some(TaxonomySource::Cached);
    }

    let nodes = match ctx.form.collect_taxonomy().await {
        Ok(nodes) => nodes,
        Err(err) => {
            warn!(target: "pipeline", ?err, "collecting industry nodes failed");
            ctx.progress
                .notice(format!("  - ❌ Could not collect industry nodes: {err}"));
            return None;
        }
    };
    if nodes.is_empty() {
        ctx.progress.notice("  - ❌ No industry nodes found");
        return None;
    }
    info!(target: "pipeline", count = nodes.len(), "industry nodes collected");
    ctx.progress
        .notice(format!("  - Collected {} industry node(s)", nodes.len()));

    let groups = group_by_top_level(nodes);
    let index: Vec<&str> = groups.iter().map(|(name, _)| name.as_str()).collect();
    for (name, members) in &groups {
        ctx.cache.store(&category_key(name), members).await;
    }
    // The index goes last so it only exists once every category is written.
    ctx.cache.store(TOP_LEVEL_KEY, &index).await;
    Some(TaxonomySource::Collected(groups))
}

async fn select_in_batches(
    ctx: &mut PhaseContext<'_>,
    summary: &mut ExecutionSummary,
    category: &str,
    nodes: &[TaxonomyNode],
) -> Vec<String> {
    let mut options: Vec<String> = Vec::new();
    for node in nodes.iter().filter(|node| node.selectable && !node.selected) {
        if !options.contains(&node.label) {
            options.push(node.label.clone());
        }
    }
    if options.is_empty() {
        ctx.progress.notice("    - No selectable options");
        return Vec::new();
    }

    let batch_size = ctx.config.taxonomy.batch_size.max(1);
    let batches = options.len().div_ceil(batch_size);
    let pause = Duration::from_millis(ctx.config.taxonomy.batch_pause_ms);
    let key = rationale::industry(category);
    let mut selected: Vec<String> = Vec::new();

    for (idx, batch) in options.chunks(batch_size).enumerate() {
        if idx > 0 {
            ctx.form.pause(pause).await;
        }
        let prompt = prompts::taxonomy_batch(ctx.guidance, category, batch);
        match ctx.oracle.decide::<BatchDecision>(&prompt).await {
            OracleReply::Decision(decision) => {
                let mut accepted = 0usize;
                for label in decision.selected_nodes.into_vec() {
                    if !batch.contains(&label) {
                        debug!(target: "pipeline", %label, "label outside the batch dropped");
                        continue;
                    }
                    if !selected.contains(&label) {
                        selected.push(label);
                        accepted += 1;
                    }
                }
                if let Some(reason) = decision.reason.as_deref() {
                    summary.append_rationale(&key, reason);
                }
                ctx.progress.notice(format!(
                    "    - Batch {}/{batches}: {accepted} selected",
                    idx + 1
                ));
            }
            OracleReply::Malformed(raw) => {
                debug!(target: "pipeline", raw_len = raw.len(), "malformed batch decision");
                ctx.progress.notice(format!(
                    "    - Batch {}/{batches}: no usable decision",
                    idx + 1
                ));
            }
        }
    }
    selected
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(label: &str, depth: usize, expandable: bool) -> TaxonomyNode {
        TaxonomyNode {
            label: label.to_string(),
            depth,
            top_level: "批发和零售业".to_string(),
            expandable,
            selectable: true,
            selected: false,
        }
    }

    fn tree() -> Vec<TaxonomyNode> {
        vec![
            node("批发和零售业", 0, true),
            node("批发业", 1, true),
            node("农、林、牧、渔产品批发", 2, true),
            node("水产品批发", 3, false),
            node("畜牧渔业饲料批发", 3, false),
            node("食品、饮料及烟草制品批发", 2, true),
            node("米、面制品及食用油批发", 3, false),
            node("零售业", 1, true),
            node("综合零售", 2, false),
        ]
    }

    fn labels(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn shallow_parent_yields_to_child() {
        let out = resolve_conflicts(&tree(), &labels(&["批发业", "水产品批发"]));
        assert_eq!(out, labels(&["水产品批发"]));
    }

    #[test]
    fn deep_parent_overrides_children() {
        let out = resolve_conflicts(
            &tree(),
            &labels(&["水产品批发", "农、林、牧、渔产品批发", "畜牧渔业饲料批发"]),
        );
        assert_eq!(out, labels(&["农、林、牧、渔产品批发"]));
    }

    #[test]
    fn mixed_chain_keeps_depth_two_parent() {
        let out = resolve_conflicts(
            &tree(),
            &labels(&["批发和零售业", "批发业", "农、林、牧、渔产品批发", "水产品批发", "综合零售"]),
        );
        assert_eq!(out, labels(&["农、林、牧、渔产品批发", "综合零售"]));
    }

    #[test]
    fn idempotent() {
        let nodes = tree();
        let inputs = [
            labels(&["批发业", "水产品批发", "零售业"]),
            labels(&["批发和零售业", "米、面制品及食用油批发"]),
            labels(&["食品、饮料及烟草制品批发", "米、面制品及食用油批发", "综合零售"]),
            labels(&["批发和零售业", "批发业", "零售业", "综合零售", "水产品批发"]),
        ];
        for input in inputs {
            let once = resolve_conflicts(&nodes, &input);
            assert_eq!(resolve_conflicts(&nodes, &once), once);
        }
    }

    #[test]
    fn unrelated_selection_is_unchanged() {
        let input = labels(&["水产品批发", "米、面制品及食用油批发", "零售业"]);
        assert_eq!(resolve_conflicts(&tree(), &input), input);
    }

    #[test]
    fn unknown_labels_survive_at_the_end() {
        let out = resolve_conflicts(&tree(), &labels(&["外部标签", "综合零售"]));
        assert_eq!(out, labels(&["综合零售", "外部标签"]));
    }

    #[test]
    fn groups_follow_first_appearance() {
        let mut nodes = tree();
        nodes.push(TaxonomyNode {
            top_level: "制造业".into(),
            ..node("制造业", 0, true)
        });
        let groups = group_by_top_level(nodes);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].1.len(), 9);
        assert_eq!(groups[1].0, "制造业");
    }

    #[test]
    fn category_keys_are_sanitized() {
        assert_eq!(category_key("农/林:渔"), "taxonomy/农_林_渔.json");
    }
}
