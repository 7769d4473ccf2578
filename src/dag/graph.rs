// Concrete dependency DAG
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

//! Concrete [`Dag`] container owning every node of one subroutine's
//!   dependency graph.
//!
//! This implementation is currently based on [`petgraph`].
//!
//! Non-unique nodes are cached by name for `O(1)` lookup;
//!   unique nodes
//!     (operators, constants, intrinsics, synthesized sub-expression
//!     placeholders)
//!     bypass the name index entirely and are addressable only through
//!     their [`NodeRef`].
//! Since the [optimizer](super::opt) deletes nodes,
//!   the graph is a [`StableDiGraph`] so that [`NodeRef`]s held
//!   elsewhere remain valid across removals.
//!
//! Each directed edge `(A->B)` represents that `A` depends upon `B`:
//!   a node's _producers_ are its outgoing neighbors and its _consumers_
//!   its incoming ones.
//! The same pair of nodes may be linked by parallel edges,
//!   since an operation may consume one value more than once
//!   (`a + a`).

use super::error::{DagError, DagResult};
use super::node::{NodeKind, NodeModel, Opr};
use super::path::Path;
use fxhash::FxHashMap;
use petgraph::graph::NodeIndex;
use petgraph::stable_graph::StableDiGraph;
use petgraph::visit::{EdgeRef, IntoEdgeReferences, NodeIndexable};
use petgraph::Direction;
use std::fmt::Write as _;

/// Reference to a node stored within a [`Dag`].
///
/// Node references are integer offsets,
///   not pointers,
///   and so remain valid as other nodes are added and removed.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct NodeRef(NodeIndex);

impl NodeRef {
    /// Integer offset of the referenced node.
    pub fn index(&self) -> usize {
        self.0.index()
    }
}

impl From<NodeIndex> for NodeRef {
    fn from(index: NodeIndex) -> Self {
        Self(index)
    }
}

impl From<NodeRef> for NodeIndex {
    fn from(nref: NodeRef) -> Self {
        nref.0
    }
}

/// There are currently no data stored on edges ("edge weights").
type DagEdge = ();

/// Dependency graph for one subroutine's worth of assignment statements.
///
/// The graph owns all of its nodes;
///   edges are index pairs between nodes held in the same container.
/// Acyclicity is maintained by construction order:
///   the [builder](super::build) only ever links a parent downward into
///   its freshly-walked children,
///     so no back-edge can be introduced.
pub struct Dag {
    /// Subroutine identifier this graph was accumulated for.
    name: String,

    /// Directed graph on which nodes are stored.
    graph: StableDiGraph<NodeModel, DagEdge>,

    /// Map of name to node reference for non-unique nodes.
    index: FxHashMap<String, NodeRef>,

    /// Critical path,
    ///   once computed by [`calc_critical_path`](super::path).
    critical_path: Option<Path>,

    /// Monotonic counter naming synthesized `sub_exp<N>` placeholders.
    sub_exp_count: usize,
}

impl Dag {
    /// Create an empty graph for the named subroutine.
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            graph: StableDiGraph::new(),
            index: FxHashMap::default(),
            critical_path: None,
            sub_exp_count: 0,
        }
    }

    /// Subroutine identifier.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of nodes on the graph.
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Upper bound on node offsets,
    ///   for sizing dense per-node state
    ///   (see [`crate::sched`]).
    pub fn node_bound(&self) -> usize {
        self.graph.node_bound()
    }

    /// Retrieve a node by reference.
    ///
    /// Since a [`NodeRef`] should only be produced by this graph,
    ///   this will fail only if the node has since been deleted by an
    ///   optimizer pass.
    pub fn get(&self, nref: NodeRef) -> Option<&NodeModel> {
        self.graph.node_weight(nref.into())
    }

    /// Retrieve a node by reference,
    ///   panicking if it has been deleted.
    ///
    /// Intended for references known to be live;
    ///   for anything else see [`Dag::get`].
    pub fn node(&self, nref: NodeRef) -> &NodeModel {
        self.get(nref).expect("internal error: missing DAG node")
    }

    /// Mutable variant of [`Dag::node`].
    pub fn node_mut(&mut self, nref: NodeRef) -> &mut NodeModel {
        self.graph
            .node_weight_mut(nref.into())
            .expect("internal error: missing DAG node")
    }

    /// Attempt to retrieve a non-unique node from the graph by name.
    ///
    /// Unique nodes are not indexed and cannot be retrieved this way;
    ///   for those,
    ///     see [`Dag::find_named`].
    pub fn lookup(&self, name: &str) -> Option<NodeRef> {
        self.index.get(name).copied()
    }

    /// Locate any node
    ///   (unique or not)
    ///   by name,
    ///     scanning the entire node set.
    ///
    /// First match in node-storage order wins;
    ///   this is intended for tests and diagnostics,
    ///     not the hot path.
    pub fn find_named(&self, name: &str) -> Option<NodeRef> {
        self.nodes().find(|&n| self.node(n).name == name)
    }

    /// Look up or create the node for the given name.
    ///
    /// If `unique` is set,
    ///   deduplication is bypassed entirely:
    ///     a fresh node is always created and is _not_ entered into the
    ///     name index,
    ///       so distinct textual occurrences
    ///         (of e.g. a constant or operator)
    ///         remain distinct nodes.
    /// Otherwise the name is first remapped through `mapping`
    ///   (SSA-style variable versioning)
    ///   and an existing node with the remapped name is returned if
    ///   present;
    ///     only if there is none is a new node created and indexed.
    pub fn get_node(
        &mut self,
        name: &str,
        mapping: Option<&FxHashMap<String, String>>,
        unique: bool,
        kind: NodeKind,
    ) -> NodeRef {
        if unique {
            return NodeRef(self.graph.add_node(NodeModel::new(name, kind)));
        }

        let mapped = mapping
            .and_then(|map| map.get(name))
            .map(String::as_str)
            .unwrap_or(name);

        if let Some(existing) = self.index.get(mapped) {
            return *existing;
        }

        let nref = NodeRef(self.graph.add_node(NodeModel::new(mapped, kind)));
        self.index.insert(mapped.to_owned(), nref);

        nref
    }

    /// Declare that `producer` supplies an input to `consumer`.
    ///
    /// This single edge also registers the reverse consumer
    ///   relationship,
    ///     which is simply the same edge read in the incoming direction.
    /// Parallel edges are permitted,
    ///   since an operation may read the same value twice.
    pub fn add_producer(&mut self, consumer: NodeRef, producer: NodeRef) {
        self.graph.add_edge(consumer.into(), producer.into(), ());
    }

    /// Remove one producer edge between the pair,
    ///   if any exists.
    pub fn remove_producer(&mut self, consumer: NodeRef, producer: NodeRef) {
        if let Some(edge) =
            self.graph.find_edge(consumer.into(), producer.into())
        {
            self.graph.remove_edge(edge);
        }
    }

    /// Whether at least one producer edge links the pair.
    pub fn has_producer(&self, consumer: NodeRef, producer: NodeRef) -> bool {
        self.graph
            .find_edge(consumer.into(), producer.into())
            .is_some()
    }

    /// Inputs of a node,
    ///   one item per producer edge
    ///   (a doubly-consumed value appears twice).
    pub fn producers(
        &self,
        nref: NodeRef,
    ) -> impl Iterator<Item = NodeRef> + '_ {
        self.graph
            .neighbors_directed(nref.into(), Direction::Outgoing)
            .map(NodeRef)
    }

    /// Dependents of a node,
    ///   one item per consumer edge.
    pub fn consumers(
        &self,
        nref: NodeRef,
    ) -> impl Iterator<Item = NodeRef> + '_ {
        self.graph
            .neighbors_directed(nref.into(), Direction::Incoming)
            .map(NodeRef)
    }

    /// Number of producer edges of a node.
    pub fn producer_count(&self, nref: NodeRef) -> usize {
        self.producers(nref).count()
    }

    /// Number of consumer edges of a node.
    pub fn consumer_count(&self, nref: NodeRef) -> usize {
        self.consumers(nref).count()
    }

    /// Every node on the graph,
    ///   in storage order.
    pub fn nodes(&self) -> impl Iterator<Item = NodeRef> + '_ {
        self.graph.node_indices().map(NodeRef)
    }

    /// Graph inputs:
    ///   nodes with no producers.
    pub fn inputs(&self) -> Vec<NodeRef> {
        self.nodes()
            .filter(|&n| self.producer_count(n) == 0)
            .collect()
    }

    /// Graph outputs:
    ///   nodes with no consumers,
    ///     each the root of some sub-computation.
    pub fn outputs(&self) -> Vec<NodeRef> {
        self.nodes()
            .filter(|&n| self.consumer_count(n) == 0)
            .collect()
    }

    /// All nodes of the given operator kind,
    ///   in storage order.
    pub fn opr_nodes(&self, op: Opr) -> Vec<NodeRef> {
        self.nodes()
            .filter(|&n| self.node(n).kind == NodeKind::Opr(op))
            .collect()
    }

    /// Node-type-filtered query by type string.
    ///
    /// Recognized type strings are the four operator symbols,
    ///   `FMA`,
    ///   `constant`,
    ///   `array_ref`,
    ///   `intrinsic`,
    ///   and `scalar`;
    /// anything else is a configuration error.
    pub fn nodes_with_kind(&self, ty: &str) -> DagResult<Vec<NodeRef>> {
        let matches: fn(&NodeKind) -> bool = match ty {
            "+" => |kind| *kind == NodeKind::Opr(Opr::Add),
            "-" => |kind| *kind == NodeKind::Opr(Opr::Sub),
            "*" => |kind| *kind == NodeKind::Opr(Opr::Mul),
            "/" => |kind| *kind == NodeKind::Opr(Opr::Div),
            "FMA" => |kind| *kind == NodeKind::Fma,
            "constant" => |kind| *kind == NodeKind::Constant,
            "array_ref" => |kind| matches!(kind, NodeKind::ArrayRef(_)),
            "intrinsic" => |kind| matches!(kind, NodeKind::Intrinsic(_)),
            "scalar" => |kind| *kind == NodeKind::Scalar,
            _ => return Err(DagError::UnknownNodeType(ty.into())),
        };

        Ok(self
            .nodes()
            .filter(|&n| matches(&self.node(n).kind))
            .collect())
    }

    /// Remove a single node,
    ///   along with all of its edges and its name-index entry.
    pub(super) fn remove(&mut self, nref: NodeRef) -> Option<NodeModel> {
        let model = self.graph.remove_node(nref.into())?;

        if self.index.get(&model.name) == Some(&nref) {
            self.index.remove(&model.name);
        }

        Some(model)
    }

    /// Delete a node and,
    ///   transitively,
    ///   any of its dependency sub-graph left without consumers.
    ///
    /// A node is deleted only if it has no remaining consumers;
    ///   a shared dependency that still feeds a surviving consumer is
    ///   left untouched.
    /// Requesting deletion of a node that is not present in the graph is
    ///   a construction error.
    pub fn delete_sub_graph(&mut self, nref: NodeRef) -> DagResult<()> {
        if !self.graph.contains_node(nref.into()) {
            return Err(DagError::MissingNode(format!("#{}", nref.index())));
        }

        if self.consumer_count(nref) > 0 {
            return Ok(());
        }

        let producers: Vec<NodeRef> = self.producers(nref).collect();
        self.remove(nref);

        for producer in producers {
            // Parallel edges may repeat a producer that a previous
            // iteration already deleted.
            if self.graph.contains_node(producer.into()) {
                self.delete_sub_graph(producer)?;
            }
        }

        Ok(())
    }

    /// Allocate the next synthesized sub-expression placeholder name.
    pub(super) fn next_sub_exp_name(&mut self) -> String {
        let name = format!("sub_exp{}", self.sub_exp_count);
        self.sub_exp_count += 1;

        name
    }

    /// The critical path,
    ///   if [`calc_critical_path`](super::path::calc_critical_path) has
    ///   been run.
    pub fn critical_path(&self) -> Option<&Path> {
        self.critical_path.as_ref()
    }

    pub(super) fn set_critical_path(&mut self, path: Option<Path>) {
        self.critical_path = path;
    }

    /// Render the graph as Graphviz DOT.
    ///
    /// Operators and other schedulable nodes are boxed;
    ///   members of the critical path
    ///     (if computed)
    ///     are overlaid in red.
    /// Edges point from consumer to producer,
    ///   matching the internal dependency direction.
    pub fn to_dot(&self) -> String {
        let mut out = String::new();
        let on_path = |nref: NodeRef| {
            self.critical_path
                .as_ref()
                .map(|path| path.contains(nref))
                .unwrap_or(false)
        };

        let _ = writeln!(out, "strict digraph {{");

        for nref in self.nodes() {
            let model = self.node(nref);
            let shape = match &model.kind {
                kind if kind.is_schedulable() => "box",
                NodeKind::Constant => "diamond",
                _ => "ellipse",
            };
            let color = if on_path(nref) { "red" } else { "black" };

            let _ = writeln!(
                out,
                "    n{} [label=\"{}\", shape=\"{}\", color=\"{}\"]",
                nref.index(),
                model.name,
                shape,
                color,
            );
        }

        for edge in self.graph.edge_references() {
            let consumer = NodeRef(edge.source());
            let producer = NodeRef(edge.target());
            let attrs = match self.critical_path.as_ref() {
                Some(path) if path.links(consumer, producer) => {
                    " [color=\"red\", penwidth=2]"
                }
                _ => "",
            };

            let _ = writeln!(
                out,
                "    n{} -> n{}{}",
                consumer.index(),
                producer.index(),
                attrs,
            );
        }

        let _ = writeln!(out, "}}");

        out
    }

    /// Underlying petgraph storage,
    ///   exposed for whole-graph algorithms
    ///   (topological traversal in tests, mainly).
    pub fn inner(&self) -> &StableDiGraph<NodeModel, DagEdge> {
        &self.graph
    }
}

impl std::fmt::Debug for Dag {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            fmt,
            "[DAG `{}`: {} nodes, {} edges]",
            self.name,
            self.graph.node_count(),
            self.graph.edge_count(),
        )
    }
}
