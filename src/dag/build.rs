// DAG construction from parsed expression trees
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

//! Incremental construction of a [`Dag`] from parsed expression trees.
//!
//! The builder walks the flattened tree supplied by the statement parser
//!   (see [`crate::expr`])
//!   strictly downward,
//!     linking each freshly-created child to its parent,
//!     which is what maintains the graph's acyclicity invariant without
//!     any explicit cycle checking.
//!
//! One builder accumulates all assignment statements of a subroutine
//!   into a single graph;
//!     reassigning a variable creates a new _version_ of its name
//!     (`a`, then `a'`, then `a''`),
//!       with subsequent reads remapped to the newest version.

use super::error::{DagError, DagResult};
use super::graph::{Dag, NodeRef};
use super::node::{NodeKind, Opr};
use crate::expr::{ExprNode, Variable};
use fxhash::FxHashMap;

/// Elementary intrinsic functions recognized by the builder.
///
/// A call to any other name is taken to be an array-element access.
pub const INTRINSICS: &[&str] = &[
    "SIGN", "SIN", "COS", "MIN", "MAX", "MOD", "SQRT", "ABS", "EXP", "LOG",
    "TANH",
];

/// Whether `name` refers to a recognized elementary intrinsic.
pub fn is_intrinsic(name: &str) -> bool {
    INTRINSICS
        .iter()
        .any(|intrinsic| intrinsic.eq_ignore_ascii_case(name))
}

/// Builds up a [`Dag`] from successive assignment statements.
///
/// The builder holds the SSA-style rename map across statements,
///   so one builder must live for the duration of one subroutine's
///   accumulation.
pub struct DagBuilder<'a> {
    dag: &'a mut Dag,

    /// Original name to current version name,
    ///   for variables that have been reassigned.
    rename: FxHashMap<String, String>,
}

impl<'a> DagBuilder<'a> {
    pub fn new(dag: &'a mut Dag) -> Self {
        Self {
            dag,
            rename: FxHashMap::default(),
        }
    }

    /// Add one assignment statement `lhs = <rhs...>` to the graph.
    ///
    /// If the target name already has a node,
    ///   a fresh version of the name is minted
    ///   (suffixing `'` until unused)
    ///   and all subsequent reads of the original name are remapped to
    ///   it;
    ///     the previous version's node is left untouched as a historical
    ///     value.
    ///
    /// Returns the node representing the assigned value.
    pub fn add_assignment(
        &mut self,
        lhs: &Variable,
        rhs: &[ExprNode],
    ) -> DagResult<NodeRef> {
        let current = self
            .rename
            .get(&lhs.name)
            .cloned()
            .unwrap_or_else(|| lhs.name.clone());

        let versioned = if self.dag.lookup(&current).is_some() {
            let mut versioned = current.clone();

            loop {
                versioned.push('\'');

                if self.dag.lookup(&versioned).is_none() {
                    break;
                }
            }

            Some(versioned)
        } else {
            None
        };

        let kind = if lhs.is_array_ref {
            NodeKind::ArrayRef(lhs.clone())
        } else {
            NodeKind::Scalar
        };

        let target = self.dag.get_node(
            versioned.as_deref().unwrap_or(&current),
            None,
            false,
            kind,
        );

        // The right-hand side is walked under the _old_ mapping, so that
        // `a = a + 1.0` reads the previous version of `a`; only then does
        // the new version shadow it for subsequent statements.
        self.build(target, rhs)?;

        if let Some(versioned) = versioned {
            self.rename.insert(lhs.name.clone(), versioned);
        }

        Ok(target)
    }

    /// Populate producer edges for `parent` from one level of expression
    ///   children.
    ///
    /// An empty child list is a no-op.
    /// At most one binary operator may appear among direct siblings;
    ///   when present it becomes the effective parent of every other
    ///   sibling,
    ///     reflecting that the operator consumes the operands and the
    ///     original parent consumes the operator's result.
    pub fn build(
        &mut self,
        parent: NodeRef,
        children: &[ExprNode],
    ) -> DagResult<()> {
        let mut parent = parent;

        // Single scan for the level's operator.  Symbols outside the
        // allowed set are stray punctuation, not operators.
        let mut operator: Option<(usize, Opr)> = None;

        for (pos, child) in children.iter().enumerate() {
            if let ExprNode::Opr(sym) = child {
                let op = match Opr::from_symbol(sym) {
                    Some(op) => op,
                    None => continue,
                };

                if let Some((_, prev)) = operator {
                    return Err(DagError::MultipleOperators(
                        prev.symbol().into(),
                        op.symbol().into(),
                    ));
                }

                let opnode = self.dag.get_node(
                    op.symbol(),
                    None,
                    true,
                    NodeKind::Opr(op),
                );

                self.dag.add_producer(parent, opnode);
                parent = opnode;
                operator = Some((pos, op));
            }
        }

        // The sibling immediately following a division operator is the
        // denominator; its node must be captured for later FMA and
        // structural-matching logic.
        let divisor_pos = match operator {
            Some((pos, Opr::Div)) => Some(pos + 1),
            _ => None,
        };

        for (pos, child) in children.iter().enumerate() {
            let made = match child {
                ExprNode::Opr(_) => None,

                ExprNode::Name(name) => {
                    let node = self.dag.get_node(
                        name,
                        Some(&self.rename),
                        false,
                        NodeKind::Scalar,
                    );

                    self.dag.add_producer(parent, node);
                    Some(node)
                }

                // Constants are unique per textual occurrence and are
                // never shared, even between equal-valued literals.
                ExprNode::Literal(text) => {
                    let node = self.dag.get_node(
                        text,
                        None,
                        true,
                        NodeKind::Constant,
                    );

                    self.dag.add_producer(parent, node);
                    Some(node)
                }

                ExprNode::Call { name, args } => {
                    Some(self.build_call(parent, name, args)?)
                }

                // Groupings are transparent: recurse with the same
                // parent so graph depth reflects data dependency, not
                // the parser's nesting shape.
                ExprNode::Group(inner) | ExprNode::ArgList(inner) => {
                    self.build(parent, inner)?;
                    None
                }
            };

            if divisor_pos == Some(pos) {
                if let Some(divisor) = made {
                    self.dag.node_mut(parent).operands.push(divisor);
                }
            }
        }

        Ok(())
    }

    /// Disambiguate and link a function/array reference.
    ///
    /// Intrinsic calls become unique nodes whose arguments are walked as
    ///   that node's children
    ///   (the call consumes its arguments).
    /// Anything else is an array-element access,
    ///   deduplicated by its full index-qualified name;
    ///     subscripts are retained as metadata only and are never
    ///     decomposed into graph nodes.
    fn build_call(
        &mut self,
        parent: NodeRef,
        name: &str,
        args: &[ExprNode],
    ) -> DagResult<NodeRef> {
        if name.is_empty() {
            return Err(DagError::BadCallTarget(
                ExprNode::ArgList(args.to_vec()).text(),
            ));
        }

        if is_intrinsic(name) {
            let canonical = name.to_uppercase();
            let node = self.dag.get_node(
                &canonical,
                None,
                true,
                NodeKind::Intrinsic(canonical.clone()),
            );

            self.dag.add_producer(parent, node);
            self.build(node, args)?;

            return Ok(node);
        }

        let var = Variable::array_ref(name, args);
        let full_name = var.name.clone();
        let node = self.dag.get_node(
            &full_name,
            Some(&self.rename),
            false,
            NodeKind::ArrayRef(var),
        );

        self.dag.add_producer(parent, node);

        Ok(node)
    }
}
