//! Usage and dependency queries over the codebase graph.
//!
//! Both directions walk USES edges with explicit visited sets so cyclic
//! reference graphs always terminate. Import nodes are transparent: a
//! reference to an import binding counts as a usage of whatever the import
//! resolves to, classified by whether the import chain renames.

use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::trace;

use crate::graph::{CodeGraph, EdgeType, Node};
use crate::model::ByteRange;

// ============================================================================
// Usage Types
// ============================================================================

/// Bitmask of usage classifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct UsageType(u8);

impl UsageType {
    /// Textual reference in the same file, or an import naming its target
    pub const DIRECT: UsageType = UsageType(1);
    /// Reference through an import chain that renames
    pub const ALIASED: UsageType = UsageType(1 << 1);
    /// Reference through a non-renaming import chain
    pub const INDIRECT: UsageType = UsageType(1 << 2);
    /// Attribute access on a resolved module or class
    pub const CHAINED: UsageType = UsageType(1 << 3);

    pub const NONE: UsageType = UsageType(0);
    pub const ALL: UsageType = UsageType(0b1111);

    const NAMES: [(UsageType, &'static str); 4] = [
        (UsageType::DIRECT, "direct"),
        (UsageType::ALIASED, "aliased"),
        (UsageType::INDIRECT, "indirect"),
        (UsageType::CHAINED, "chained"),
    ];

    pub fn bits(&self) -> u8 {
        self.0
    }

    /// True when every flag of `other` is set.
    pub fn contains(&self, other: UsageType) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn intersects(&self, other: UsageType) -> bool {
        self.0 & other.0 != 0
    }

    pub fn union(self, other: UsageType) -> UsageType {
        UsageType(self.0 | other.0)
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

impl BitOr for UsageType {
    type Output = UsageType;

    fn bitor(self, rhs: Self) -> Self::Output {
        self.union(rhs)
    }
}

impl BitOrAssign for UsageType {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for UsageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = Self::NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();
        if names.is_empty() {
            write!(f, "none")
        } else {
            write!(f, "{}", names.join("|"))
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown usage type '{0}' (expected direct, aliased, indirect, chained or all)")]
pub struct UnknownUsageType(pub String);

impl FromStr for UsageType {
    type Err = UnknownUsageType;

    /// Parse a comma- or pipe-separated list such as `direct,chained`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut mask = UsageType::NONE;
        for part in s.split([',', '|']).map(str::trim).filter(|p| !p.is_empty()) {
            let lower = part.to_ascii_lowercase();
            if lower == "all" {
                mask |= UsageType::ALL;
                continue;
            }
            let flag = Self::NAMES
                .iter()
                .find(|(_, name)| *name == lower)
                .map(|(flag, _)| *flag)
                .ok_or_else(|| UnknownUsageType(part.to_string()))?;
            mask |= flag;
        }
        Ok(mask)
    }
}

// ============================================================================
// Usage
// ============================================================================

/// One reference to a symbol.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Usage {
    /// Node the usage resolves to
    pub target: String,
    /// Matched identifier in `file`
    pub match_range: ByteRange,
    pub file: String,
    /// Innermost symbol (or file / import node) containing the reference
    pub usage_symbol: String,
    pub usage_type: UsageType,
}

/// Classification of a reference that reaches its target through `import`.
fn through_import(chain_aliased: bool) -> UsageType {
    if chain_aliased {
        UsageType::ALIASED
    } else {
        UsageType::INDIRECT
    }
}

/// All usages of `target`, filtered by `types`.
///
/// Incoming USES edges keep their own classification. Import nodes that
/// point at the target are walked backwards, and references to them are
/// classified ALIASED when any import on the way renames, INDIRECT
/// otherwise. Results are ordered by file, then offset.
pub fn usages(graph: &CodeGraph, target: &str, types: UsageType) -> Vec<Usage> {
    let mut out = Vec::new();
    let mut seen_edges: HashSet<(String, ByteRange)> = HashSet::new();
    let mut visited: HashSet<String> = HashSet::from([target.to_string()]);
    // (node, reached through an import, any import on the path renames)
    let mut queue: VecDeque<(String, bool, bool)> = VecDeque::from([(target.to_string(), false, false)]);

    while let Some((current, via_import, aliased)) = queue.pop_front() {
        for (source, edge) in graph.incoming_edges(&current) {
            if edge.edge_type != EdgeType::Uses {
                continue;
            }
            let (Some(edge_type), Some(range)) = (edge.usage_type, edge.match_range) else {
                continue;
            };
            let usage_type = if via_import {
                through_import(aliased)
            } else {
                edge_type
            };

            if let Some(info) = source.as_import() {
                if visited.insert(source.id.clone()) {
                    queue.push_back((source.id.clone(), true, aliased || info.is_aliased()));
                }
            }

            if !types.intersects(usage_type) {
                continue;
            }
            if !seen_edges.insert((source.id.clone(), range)) {
                continue;
            }
            out.push(Usage {
                target: target.to_string(),
                match_range: range,
                file: source.file.clone(),
                usage_symbol: source.id.clone(),
                usage_type,
            });
        }
    }

    out.sort_by(|a, b| {
        a.file
            .cmp(&b.file)
            .then(a.match_range.cmp(&b.match_range))
            .then(a.usage_symbol.cmp(&b.usage_symbol))
    });
    trace!("{} usages of {}", out.len(), target);
    out
}

/// Distinct nodes that use `target`, in the order of [`usages`].
pub fn symbol_usages(graph: &CodeGraph, target: &str, types: UsageType) -> Vec<String> {
    let mut seen = HashSet::new();
    usages(graph, target, types)
        .into_iter()
        .filter(|u| seen.insert(u.usage_symbol.clone()))
        .map(|u| u.usage_symbol)
        .collect()
}

/// Symbols `source` depends on, up to `max_depth` symbol hops.
///
/// Each layer expands every node in the previous layer's CONTAINS subtree,
/// follows its USES edges and hops through imports to their resolution.
/// Targets inside the expanded node itself are skipped and `source` never
/// appears in its own result. A global visited set makes the result at depth
/// `k` a prefix of the result at depth `k + 1`.
pub fn dependencies<'g>(
    graph: &'g CodeGraph,
    source: &str,
    max_depth: usize,
    types: UsageType,
) -> Vec<&'g Node> {
    let mut out = Vec::new();
    let mut visited: HashSet<String> = HashSet::from([source.to_string()]);
    let mut frontier = vec![source.to_string()];

    for depth in 0..max_depth {
        let mut next = Vec::new();
        for current in &frontier {
            let subtree: Vec<&Node> = graph.subtree(current);
            let inside: HashSet<&str> = subtree.iter().map(|n| n.id.as_str()).collect();

            for member in &subtree {
                for (target, edge) in graph.outgoing_edges(&member.id) {
                    if edge.edge_type != EdgeType::Uses {
                        continue;
                    }
                    let Some((resolved, usage_type)) = resolve_hop(graph, target, edge.usage_type) else {
                        continue;
                    };
                    if !resolved.is_symbol() || !types.intersects(usage_type) {
                        continue;
                    }
                    if inside.contains(resolved.id.as_str()) {
                        continue;
                    }
                    if visited.insert(resolved.id.clone()) {
                        out.push(resolved);
                        next.push(resolved.id.clone());
                    }
                }
            }
        }
        if next.is_empty() {
            trace!("dependencies of {} reached a fixpoint at depth {}", source, depth);
            break;
        }
        frontier = next;
    }
    out
}

/// Step through an import to its resolution.
fn resolve_hop<'g>(
    graph: &'g CodeGraph,
    target: &'g Node,
    edge_usage: Option<UsageType>,
) -> Option<(&'g Node, UsageType)> {
    if !target.is_import() {
        return Some((target, edge_usage.unwrap_or(UsageType::DIRECT)));
    }
    graph
        .outgoing_edges(&target.id)
        .find(|(_, data)| data.edge_type == EdgeType::Imports)
        .map(|(node, data)| (node, data.usage_type.unwrap_or(UsageType::INDIRECT)))
}
