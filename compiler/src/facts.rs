// facts.rs — Lattice facts recorded by the analyses
//
// Two stores keyed by node identity: a per-node `Range` (integer interval plus
// a coarse type) and a per-region table of `Limit`s (known inequalities on
// values inside that region). The stores are plain data; reductions call the
// `update_*` primitives and re-queue the owning node when they report a change.
//
// Preconditions: none; absent entries read as the lattice top.
// Postconditions: `update_*` return true iff the stored fact changed. A range
//                 whose type reached `none` is never modified again.
// Failure modes: none.
// Side effects: none.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Serialize, Serializer};

use crate::graph::{Graph, NodeId};

// ── Bounds and ranges ───────────────────────────────────────────────────────

/// An inclusive interval endpoint on the extended integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Bound {
    NegInf,
    Int(i64),
    PosInf,
}

impl Serialize for Bound {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Bound::NegInf => serializer.serialize_str("-inf"),
            Bound::Int(v) => serializer.serialize_i64(*v),
            Bound::PosInf => serializer.serialize_str("+inf"),
        }
    }
}

impl fmt::Display for Bound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bound::NegInf => f.write_str("-inf"),
            Bound::Int(v) => write!(f, "{v}"),
            Bound::PosInf => f.write_str("+inf"),
        }
    }
}

/// Coarse classification of a value. `None` is bottom (contradiction),
/// `Int` a refined integer fact, `Any` top.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RangeType {
    None,
    Int,
    Any,
}

impl fmt::Display for RangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RangeType::None => "none",
            RangeType::Int => "int",
            RangeType::Any => "any",
        })
    }
}

/// Inclusive interval `[from, to]`, meaningful only when `ty` is `Int`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Range {
    pub from: Bound,
    pub to: Bound,
    #[serde(rename = "type")]
    pub ty: RangeType,
}

impl Default for Range {
    fn default() -> Self {
        Range {
            from: Bound::NegInf,
            to: Bound::PosInf,
            ty: RangeType::Any,
        }
    }
}

impl Range {
    /// The single value this range holds, if `from == to`.
    pub fn point(&self) -> Option<Bound> {
        (self.from == self.to).then_some(self.from)
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.ty {
            RangeType::Int => write!(f, "int [{}, {}]", self.from, self.to),
            ty => write!(f, "{ty}"),
        }
    }
}

// ── Limits ──────────────────────────────────────────────────────────────────

/// The relation a limit asserts between a value and its bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum LimitKind {
    #[serde(rename = "<")]
    Less,
    #[serde(rename = ">=")]
    GreaterEq,
    #[serde(rename = "any")]
    Any,
}

impl fmt::Display for LimitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LimitKind::Less => "<",
            LimitKind::GreaterEq => ">=",
            LimitKind::Any => "any",
        })
    }
}

/// "Inside this region, the value is `kind` `bound`."
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Limit {
    #[serde(rename = "type")]
    pub kind: LimitKind,
    pub bound: Option<NodeId>,
}

impl Default for Limit {
    fn default() -> Self {
        Limit {
            kind: LimitKind::Any,
            bound: None,
        }
    }
}

// ── Fact store ──────────────────────────────────────────────────────────────

/// Range and limit facts for one analysis run.
#[derive(Debug, Clone, Default)]
pub struct Facts {
    ranges: BTreeMap<NodeId, Range>,
    limits: BTreeMap<NodeId, BTreeMap<NodeId, Limit>>,
}

impl Facts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded range of `node`, or the unknown range if none was recorded.
    pub fn range(&self, node: NodeId) -> Range {
        self.ranges.get(&node).copied().unwrap_or_default()
    }

    /// Refine `node` to `int [from, to]`.
    ///
    /// No-op when the node is `none` or already holds exactly this interval.
    pub fn update_range(&mut self, node: NodeId, from: Bound, to: Bound) -> bool {
        let range = self.ranges.entry(node).or_default();
        if range.ty == RangeType::None {
            return false;
        }
        if range.ty == RangeType::Int && range.from == from && range.to == to {
            return false;
        }
        *range = Range {
            from,
            to,
            ty: RangeType::Int,
        };
        log::trace!("range {node} := {range}");
        true
    }

    /// Move `node` to type `ty`, keeping its bounds. `none` is final.
    pub fn update_type(&mut self, node: NodeId, ty: RangeType) -> bool {
        let range = self.ranges.entry(node).or_default();
        if range.ty == ty || range.ty == RangeType::None {
            return false;
        }
        range.ty = ty;
        log::trace!("type {node} := {ty}");
        true
    }

    /// Recorded limit on `value` inside `region`, if any.
    pub fn limit(&self, region: NodeId, value: NodeId) -> Option<&Limit> {
        self.limits.get(&region)?.get(&value)
    }

    /// All limits recorded for `region`, ordered by value.
    pub fn limits_in(&self, region: NodeId) -> impl Iterator<Item = (NodeId, &Limit)> + '_ {
        self.limits
            .get(&region)
            .into_iter()
            .flat_map(|map| map.iter().map(|(&v, l)| (v, l)))
    }

    /// Record `value kind bound` for `region`. Returns true if the stored
    /// limit differed.
    pub fn update_limit(
        &mut self,
        region: NodeId,
        value: NodeId,
        kind: LimitKind,
        bound: Option<NodeId>,
    ) -> bool {
        let limit = self
            .limits
            .entry(region)
            .or_default()
            .entry(value)
            .or_default();
        if limit.kind == kind && limit.bound == bound {
            return false;
        }
        *limit = Limit { kind, bound };
        log::trace!("limit {region}: {value} {kind} {bound:?}");
        true
    }

    /// Copy every limit of `from` into `into`. Returns true if any changed.
    ///
    /// Not used by the default propagation, which only populates direct
    /// branch targets.
    pub fn merge_limits(&mut self, into: NodeId, from: NodeId) -> bool {
        let incoming: Vec<(NodeId, Limit)> =
            self.limits_in(from).map(|(v, l)| (v, *l)).collect();
        let mut changed = false;
        for (value, limit) in incoming {
            changed |= self.update_limit(into, value, limit.kind, limit.bound);
        }
        changed
    }

    /// Nodes with a recorded range, ascending.
    pub fn ranges(&self) -> impl Iterator<Item = (NodeId, &Range)> + '_ {
        self.ranges.iter().map(|(&n, r)| (n, r))
    }

    /// Regions with at least one recorded limit, ascending.
    pub fn regions(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.limits
            .iter()
            .filter(|(_, map)| !map.is_empty())
            .map(|(&r, _)| r)
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty() && self.limits.values().all(BTreeMap::is_empty)
    }

    /// Serializable view keyed by the graph's source names.
    pub fn report(&self, graph: &Graph) -> FactsReport {
        let name = |id: NodeId| -> String {
            graph
                .node(id)
                .name
                .clone()
                .unwrap_or_else(|| id.to_string())
        };
        let ranges = self
            .ranges()
            .map(|(node, range)| RangeEntry {
                node: name(node),
                range: *range,
            })
            .collect();
        let limits = self
            .limits
            .iter()
            .flat_map(|(&region, map)| {
                map.iter().map(move |(&value, limit)| (region, value, *limit))
            })
            .map(|(region, value, limit)| LimitEntry {
                region: name(region),
                value: name(value),
                kind: limit.kind,
                bound: limit.bound.map(&name),
            })
            .collect();
        FactsReport { ranges, limits }
    }
}

// ── Report ──────────────────────────────────────────────────────────────────

/// JSON shape of `--emit facts`.
#[derive(Debug, Serialize)]
pub struct FactsReport {
    pub ranges: Vec<RangeEntry>,
    pub limits: Vec<LimitEntry>,
}

#[derive(Debug, Serialize)]
pub struct RangeEntry {
    pub node: String,
    #[serde(flatten)]
    pub range: Range,
}

#[derive(Debug, Serialize)]
pub struct LimitEntry {
    pub region: String,
    pub value: String,
    #[serde(rename = "type")]
    pub kind: LimitKind,
    pub bound: Option<String>,
}
