//! Lineage traversal
//!
//! PLLs form a directed acyclic graph through their parents. A parent may be
//! shared by several children, so traversals deduplicate by [`PllId`].

use crate::error::Result;
use crate::pll::{PllId, PllNode};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

/// Every PLL `node` is computed from, excluding itself.
///
/// Parents always come before their children, and a PLL reachable through
/// several paths appears once.
pub fn ancestors(node: &Arc<dyn PllNode>) -> Vec<Arc<dyn PllNode>> {
    let mut visited = HashSet::new();
    let mut order = Vec::new();
    visited.insert(node.id());
    for parent in node.parents() {
        visit(parent, &mut visited, &mut order);
    }
    order
}

fn visit(
    node: Arc<dyn PllNode>,
    visited: &mut HashSet<PllId>,
    order: &mut Vec<Arc<dyn PllNode>>,
) {
    if !visited.insert(node.id()) {
        return;
    }
    for parent in node.parents() {
        visit(parent, visited, order);
    }
    order.push(node);
}

/// Length of the longest parent chain above `node`. Leaves have depth 0.
pub fn lineage_depth(node: &dyn PllNode) -> usize {
    node.parents()
        .iter()
        .map(|parent| lineage_depth(parent.as_ref()) + 1)
        .max()
        .unwrap_or(0)
}

/// PLLs to cache, in order, so that every target ends up cached.
///
/// Uncached ancestors of the targets are scheduled before them so a target's
/// materialization reads its parents from memory. Already-cached PLLs are
/// skipped, as is everything above them.
pub fn cache_plan(targets: &[Arc<dyn PllNode>]) -> Vec<Arc<dyn PllNode>> {
    let mut visited = HashSet::new();
    let mut plan = Vec::new();
    for target in targets {
        plan_node(target.clone(), &mut visited, &mut plan);
    }
    plan
}

fn plan_node(
    node: Arc<dyn PllNode>,
    visited: &mut HashSet<PllId>,
    plan: &mut Vec<Arc<dyn PllNode>>,
) {
    if !visited.insert(node.id()) || node.is_cached() {
        return;
    }
    for parent in node.parents() {
        plan_node(parent, visited, plan);
    }
    plan.push(node);
}

/// Cache every PLL of [`cache_plan`], one after the other, blocking until
/// the last one is done.
///
/// Returns the number of PLLs that were cached. Stops at the first failure;
/// PLLs cached before it stay cached.
pub fn cache_all(targets: &[Arc<dyn PllNode>]) -> Result<usize> {
    let plan = cache_plan(targets);
    debug!(targets = targets.len(), planned = plan.len(), "caching lineage");

    for node in &plan {
        node.clone().cache_async().wait()?;
        debug!(pll = %node.id(), label = node.label(), "lineage step cached");
    }

    if !plan.is_empty() {
        info!(count = plan.len(), "cached lineage");
    }
    Ok(plan.len())
}
