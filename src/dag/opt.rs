// DAG optimization passes
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

//! Post-construction optimization of a built [`Dag`].
//!
//! Three passes run in a fixed order:
//!
//!   1. [`prune_scalar_temporaries`] splices out pass-through scalar
//!        temporaries introduced by the statement-by-statement assignment
//!        structure;
//!   2. [`merge_duplicates`] finds structurally identical operation
//!        sub-graphs and merges them behind a synthesized `sub_exp<N>`
//!        placeholder;
//!   3. [`fuse_multiply_adds`] collapses eligible multiply/add pairs
//!        into single fused nodes.
//!
//! All passes trust the builder's acyclicity invariant;
//!   no cycle detection is performed here.

use super::error::DagResult;
use super::graph::{Dag, NodeRef};
use super::node::{NodeKind, Opr};

/// Run all three passes,
///   returning the number of multiply-add fusions performed
///   (for reporting purposes).
pub fn optimize(dag: &mut Dag) -> DagResult<usize> {
    prune_scalar_temporaries(dag);
    merge_duplicates(dag)?;

    Ok(fuse_multiply_adds(dag))
}

/// Pass A:
///   splice out pass-through scalar temporaries.
///
/// A plain scalar node with exactly one producer and one consumer
///   carries no computational content of its own;
///     its consumer is rewired directly onto its producer and the node
///     is deleted.
/// Only [`NodeKind::Scalar`] nodes are eligible:
///   operators and intrinsics carry cycles,
///     and constants and array references never have a producer in the
///     first place.
///
/// The pass iterates to a fixed point and is order-independent;
///   running it again on an already-pruned graph removes nothing.
///
/// Returns the number of nodes spliced out.
pub fn prune_scalar_temporaries(dag: &mut Dag) -> usize {
    let mut pruned = 0;

    loop {
        let victim = dag.nodes().find(|&n| {
            dag.node(n).kind == NodeKind::Scalar
                && dag.producer_count(n) == 1
                && dag.consumer_count(n) == 1
        });

        let victim = match victim {
            Some(victim) => victim,
            None => return pruned,
        };

        let producer = dag
            .producers(victim)
            .next()
            .expect("internal error: missing producer of temporary");
        let consumer = dag
            .consumers(victim)
            .next()
            .expect("internal error: missing consumer of temporary");

        dag.add_producer(consumer, producer);
        dag.remove(victim);

        pruned += 1;
    }
}

/// Fixed merge order:
///   decreasing operation cost,
///     so the most expensive redundant computation is eliminated first
///     when multiple operator kinds have duplicates.
const MERGE_ORDER: [Opr; 4] = [Opr::Div, Opr::Mul, Opr::Add, Opr::Sub];

/// Pass B:
///   merge duplicated operation sub-graphs.
///
/// For each operator kind in [`MERGE_ORDER`],
///   repeatedly locate a node with one or more structural duplicates
///   (see [`subgraph_matches`]),
///   synthesize a unique `sub_exp<N>` placeholder fed once by the
///   representative,
///   rewire every consumer of every duplicate
///     (the representative's included)
///     onto the placeholder,
///   and delete the redundant duplicates along with any of their
///   dependency sub-graphs left without consumers.
///
/// Returns the number of placeholder nodes synthesized.
pub fn merge_duplicates(dag: &mut Dag) -> DagResult<usize> {
    let mut merged = 0;

    for op in MERGE_ORDER {
        loop {
            let nodes = dag.opr_nodes(op);

            // With fewer than two nodes of this kind there is nothing to
            // compare.
            if nodes.len() < 2 {
                break;
            }

            if !merge_first_duplicate(dag, &nodes)? {
                break;
            }

            merged += 1;
        }
    }

    Ok(merged)
}

/// Merge the first node of `nodes` that has at least one structural
///   duplicate,
///     returning whether a merge was performed.
fn merge_first_duplicate(
    dag: &mut Dag,
    nodes: &[NodeRef],
) -> DagResult<bool> {
    for (at, &node) in nodes.iter().enumerate() {
        let dupes: Vec<NodeRef> = nodes[at + 1..]
            .iter()
            .copied()
            .filter(|&other| subgraph_matches(dag, node, other))
            .collect();

        if dupes.is_empty() {
            continue;
        }

        let placeholder_name = dag.next_sub_exp_name();
        let placeholder =
            dag.get_node(&placeholder_name, None, true, NodeKind::Scalar);

        // The duplicate computation is performed once (by the
        // representative) and its result fans out from the placeholder.
        let consumers: Vec<NodeRef> = dag.consumers(node).collect();

        for consumer in consumers {
            dag.remove_producer(consumer, node);
            dag.add_producer(consumer, placeholder);
        }

        dag.add_producer(placeholder, node);

        for dupe in dupes {
            let consumers: Vec<NodeRef> = dag.consumers(dupe).collect();

            for consumer in consumers {
                dag.remove_producer(consumer, dupe);
                dag.add_producer(consumer, placeholder);
            }

            dag.delete_sub_graph(dupe)?;
        }

        return Ok(true);
    }

    Ok(false)
}

/// Structural-equality predicate for duplicate detection.
///
/// Two nodes match if their names and kinds are equal,
///   they have the same number of producers,
///   and each producer of one has _some_ matching producer of the other
///   (order-independent set matching, not positional).
///
/// Two special cases refine this:
///   FMA nodes compare their two recorded multiplicand operands
///     (in either order)
///     instead of their full producer sets;
///   division nodes additionally require their recorded denominators to
///     correspond,
///       which distinguishes `a/b` from `b/a` despite their equal
///       producer sets.
pub fn subgraph_matches(dag: &Dag, n1: NodeRef, n2: NodeRef) -> bool {
    if n1 == n2 {
        return true;
    }

    // Recorded operands may dangle after earlier splices; a deleted
    // node matches nothing.
    let (a, b) = match (dag.get(n1), dag.get(n2)) {
        (Some(a), Some(b)) => (a, b),
        _ => return false,
    };

    if a.name != b.name || a.kind != b.kind {
        return false;
    }

    if dag.producer_count(n1) != dag.producer_count(n2) {
        return false;
    }

    if a.kind == NodeKind::Fma {
        return a.operands.iter().all(|&op1| {
            b.operands
                .iter()
                .any(|&op2| subgraph_matches(dag, op1, op2))
        });
    }

    if a.kind == NodeKind::Opr(Opr::Div) {
        if let (Some(&d1), Some(&d2)) = (a.operands.first(), b.operands.first())
        {
            if !subgraph_matches(dag, d1, d2) {
                return false;
            }
        }
    }

    dag.producers(n1).all(|p1| {
        dag.producers(n2).any(|p2| subgraph_matches(dag, p1, p2))
    })
}

/// Pass C:
///   recognize and fuse multiply-add pairs.
///
/// An addition or subtraction whose two producers are a multiplication
///   and one other node,
///     where the multiplication's result is consumed nowhere else,
///   is rewritten in place into a single FMA node:
///     its producers become the two multiplicands plus the addend,
///     its `operands` list retains the multiplicands for later
///     duplicate-matching and cost purposes,
///   and the original multiplication node is deleted.
///
/// Returns the number of fusions performed.
pub fn fuse_multiply_adds(dag: &mut Dag) -> usize {
    let mut fused = 0;

    loop {
        let candidate = find_fusion_candidate(dag);

        let (target, mul) = match candidate {
            Some(pair) => pair,
            None => return fused,
        };

        let multiplicands: Vec<NodeRef> = dag.producers(mul).collect();

        dag.remove_producer(target, mul);
        dag.remove(mul);

        for &m in &multiplicands {
            dag.add_producer(target, m);
        }

        let node = dag.node_mut(target);
        node.kind = NodeKind::Fma;
        node.name = "FMA".into();
        node.operands.clear();

        for &m in &multiplicands {
            node.operands.push(m);
        }

        fused += 1;
    }
}

/// Locate an `(add-or-sub, mul)` pair eligible for fusion.
fn find_fusion_candidate(dag: &Dag) -> Option<(NodeRef, NodeRef)> {
    dag.nodes().find_map(|n| {
        if !matches!(
            dag.node(n).kind,
            NodeKind::Opr(Opr::Add) | NodeKind::Opr(Opr::Sub),
        ) {
            return None;
        }

        if dag.producer_count(n) != 2 {
            return None;
        }

        dag.producers(n)
            .find(|&p| {
                dag.node(p).kind == NodeKind::Opr(Opr::Mul)
                    && dag.consumer_count(p) == 1
                    && dag.producer_count(p) == 2
            })
            .map(|mul| (n, mul))
    })
}

#[cfg(test)]
mod test;
