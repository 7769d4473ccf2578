// Critical-path analysis
//
//  Copyright (C) 2014-2023 Ryan Specialty, LLC.
//
//  This file is part of dagcost.
//
//  This program is free software: you can redistribute it and/or modify
//  it under the terms of the GNU General Public License as published by
//  the Free Software Foundation, either version 3 of the License, or
//  (at your option) any later version.
//
//  This program is distributed in the hope that it will be useful,
//  but WITHOUT ANY WARRANTY; without even the implied warranty of
//  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
//  GNU General Public License for more details.
//
//  You should have received a copy of the GNU General Public License
//  along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Weighing of the dependency graph and extraction of its critical path.
//!
//! Each node is assigned an _inclusive weight_:
//!   its own cycle cost plus the inclusive weights of its distinct
//!   producers,
//!     i.e. the total cost of computing its value from scratch.
//! Weights are memoized across the shared sub-structure of the DAG,
//!   so the calculation is linear in nodes and edges despite the
//!   recursive definition.
//!
//! The critical path itself is traced greedily:
//!   from each graph output,
//!     repeatedly descend into the heaviest producer until a leaf is
//!     reached;
//!   the heaviest such chain over all outputs is retained on the graph
//!   (see [`Dag::critical_path`]).
//! Ties are broken in favor of the first producer encountered,
//!   keeping the trace deterministic for a given construction order.

use super::error::DagResult;
use super::graph::{Dag, NodeRef};
use crate::cost::CostModel;
use fxhash::FxHashMap;

/// An ordered chain of dependent nodes,
///   consumer first.
///
/// Consecutive members are always linked by a producer edge in the
///   owning graph.
#[derive(Debug, Clone, PartialEq)]
pub struct Path {
    nodes: Vec<NodeRef>,
}

impl Path {
    pub fn new(nodes: Vec<NodeRef>) -> Self {
        Self { nodes }
    }

    /// Members of the path,
    ///   consumer first.
    pub fn nodes(&self) -> &[NodeRef] {
        &self.nodes
    }

    /// Number of nodes on the path.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Whether the given node lies on the path.
    pub fn contains(&self, nref: NodeRef) -> bool {
        self.nodes.contains(&nref)
    }

    /// Whether the pair is a consecutive consumer/producer link of this
    ///   path.
    ///
    /// Used when rendering to highlight the path's edges,
    ///   not just its nodes.
    pub fn links(&self, consumer: NodeRef, producer: NodeRef) -> bool {
        self.nodes
            .windows(2)
            .any(|pair| pair[0] == consumer && pair[1] == producer)
    }

    /// Total cycle latency of the path:
    ///   the sum of each member's own cost.
    pub fn cycles(&self, dag: &Dag, cost: &CostModel) -> DagResult<u64> {
        self.nodes
            .iter()
            .try_fold(0, |sum, &n| {
                Ok(sum + cost.cycles_for(&dag.node(n).kind)?)
            })
    }

    /// Floating-point operations performed along the path.
    pub fn flops(&self, dag: &Dag) -> usize {
        self.nodes.iter().map(|&n| dag.node(n).kind.flops()).sum()
    }
}

/// Compute the inclusive weight of every node.
///
/// A node's weight counts each distinct producer once,
///   even when parallel edges consume the same value twice;
///     the value is only computed once,
///       so it only costs once.
pub fn calc_costs(
    dag: &Dag,
    cost: &CostModel,
) -> DagResult<FxHashMap<NodeRef, u64>> {
    let mut memo = FxHashMap::default();

    for nref in dag.nodes() {
        weigh(dag, cost, &mut memo, nref)?;
    }

    Ok(memo)
}

fn weigh(
    dag: &Dag,
    cost: &CostModel,
    memo: &mut FxHashMap<NodeRef, u64>,
    nref: NodeRef,
) -> DagResult<u64> {
    if let Some(&weight) = memo.get(&nref) {
        return Ok(weight);
    }

    let mut producers: Vec<NodeRef> = dag.producers(nref).collect();
    producers.sort_by_key(NodeRef::index);
    producers.dedup();

    let mut weight = cost.cycles_for(&dag.node(nref).kind)?;

    for producer in producers {
        weight += weigh(dag, cost, memo, producer)?;
    }

    memo.insert(nref, weight);

    Ok(weight)
}

/// Trace the critical path and retain it on the graph.
///
/// One chain is traced per graph output;
///   the one with the greatest cycle latency wins.
/// An empty graph has no critical path.
pub fn calc_critical_path(dag: &mut Dag, cost: &CostModel) -> DagResult<()> {
    let weights = calc_costs(dag, cost)?;

    let mut best: Option<(Path, u64)> = None;

    for output in dag.outputs() {
        let path = trace_from(dag, &weights, output);
        let cycles = path.cycles(dag, cost)?;

        let better = match &best {
            Some((_, best_cycles)) => cycles > *best_cycles,
            None => true,
        };

        if better {
            best = Some((path, cycles));
        }
    }

    dag.set_critical_path(best.map(|(path, _)| path));

    Ok(())
}

/// Greedy heaviest-producer descent from one output.
fn trace_from(
    dag: &Dag,
    weights: &FxHashMap<NodeRef, u64>,
    output: NodeRef,
) -> Path {
    let mut nodes = vec![output];
    let mut at = output;

    loop {
        let mut heaviest: Option<(NodeRef, u64)> = None;

        for producer in dag.producers(at) {
            let weight = weights.get(&producer).copied().unwrap_or(0);

            // Strictly-greater comparison: the first producer seen at a
            // given weight wins.
            let better = match heaviest {
                Some((_, best)) => weight > best,
                None => true,
            };

            if better {
                heaviest = Some((producer, weight));
            }
        }

        match heaviest {
            Some((producer, _)) => {
                nodes.push(producer);
                at = producer;
            }
            None => break,
        }
    }

    Path::new(nodes)
}
