// Parsed expression tree boundary
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

//! Parsed expression tree supplied by the statement-parsing frontend.
//!
//! The frontend hands the [DAG builder](crate::dag::build) one flattened
//!   expression tree per assignment statement.
//! Each level of the tree has been reduced to _at most one_ binary
//!   operator among its direct children;
//!     precedence has already been resolved by the parser,
//!     so nesting depth carries no semantic weight beyond grouping.
//!
//! This is a closed set of token kinds,
//!   matched exhaustively by the builder;
//!     the builder never inspects surface syntax itself.

use std::fmt::{self, Display};

/// A single child of one level of a parsed expression tree.
///
/// The variants correspond exactly to what the statement parser is able
///   to distinguish;
///     anything more refined
///       (intrinsic recognition, array-access grouping, renaming)
///       is the responsibility of the
///       [builder](crate::dag::build::DagBuilder).
#[derive(Debug, Clone, PartialEq)]
pub enum ExprNode {
    /// A textual operator or punctuation symbol appearing between
    ///   siblings.
    ///
    /// Only `+ - * /` are meaningful to the builder;
    ///   any other symbol is ignored as stray punctuation.
    Opr(String),

    /// A plain named variable reference.
    Name(String),

    /// A real-literal constant in its original textual form.
    Literal(String),

    /// A function-call or array-element reference.
    ///
    /// Whether this is an intrinsic call or an array access is decided by
    ///   the builder via a fixed intrinsic-name table;
    ///     the parser cannot tell the two apart.
    Call { name: String, args: Vec<ExprNode> },

    /// A parenthesized or intermediate sub-expression grouping.
    ///
    /// Groupings are transparent to the builder:
    ///   their children are walked with the same parent node,
    ///     so the graph reflects data dependency rather than the parser's
    ///     nesting shape.
    Group(Vec<ExprNode>),

    /// An argument-list grouping,
    ///   transparent in the same way as [`ExprNode::Group`].
    ArgList(Vec<ExprNode>),
}

impl ExprNode {
    /// Render this tree back to a compact textual form.
    ///
    /// This is used only for naming array-reference nodes by their full
    ///   index-qualified form
    ///     (e.g. `u(i,j+1)`),
    ///   never for code generation.
    pub fn text(&self) -> String {
        match self {
            Self::Opr(sym) => sym.clone(),
            Self::Name(name) => name.clone(),
            Self::Literal(lit) => lit.clone(),
            Self::Call { name, args } => {
                format!("{}({})", name, join_text(args, ","))
            }
            Self::Group(children) => join_text(children, ""),
            Self::ArgList(children) => join_text(children, ","),
        }
    }
}

fn join_text(children: &[ExprNode], sep: &str) -> String {
    children
        .iter()
        .map(ExprNode::text)
        .collect::<Vec<_>>()
        .join(sep)
}

/// Surface form of a parsed variable or array reference.
///
/// This is a value model describing how a reference appeared in source;
///   it is not itself part of the graph's ownership model,
///     but array-reference nodes retain one as metadata for the
///     cache-line analysis performed by the
///     [report](crate::report) layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    /// Full reference name,
    ///   index-qualified for array references (`u(i,j+1)`).
    pub name: String,

    /// Name prior to any SSA-style renaming.
    pub orig_name: String,

    /// Whether this reference is an array-element access.
    pub is_array_ref: bool,

    /// Index-variable names appearing in the subscripts,
    ///   in subscript order.
    pub indices: Vec<String>,

    /// Simplified textual index expression with `+1`/`-1` offsets folded,
    ///   one entry per subscript.
    pub index_expr: Vec<String>,
}

impl Variable {
    /// A plain scalar reference.
    pub fn scalar<S: Into<String>>(name: S) -> Self {
        let name = name.into();

        Self {
            orig_name: name.clone(),
            name,
            is_array_ref: false,
            indices: vec![],
            index_expr: vec![],
        }
    }

    /// An array-element reference with the provided subscript trees.
    ///
    /// Subscripts are folded
    ///   (see [`fold_subscript`])
    ///   and retained only as metadata;
    ///     they are never decomposed into graph nodes.
    pub fn array_ref<S: Into<String>>(name: S, subscripts: &[ExprNode]) -> Self {
        let base = name.into();
        let index_expr: Vec<String> =
            subscripts.iter().map(fold_subscript).collect();
        let indices = subscripts
            .iter()
            .flat_map(index_names)
            .collect::<Vec<String>>();

        Self {
            name: format!("{}({})", base, index_expr.join(",")),
            orig_name: base,
            is_array_ref: true,
            indices,
            index_expr,
        }
    }

    /// Base array name without subscripts.
    pub fn base_name(&self) -> &str {
        &self.orig_name
    }

    /// Grouping key for the cache-line estimate:
    ///   the array name plus every subscript apart from the first.
    ///
    /// Accesses differing only in the first
    ///   (innermost, unit-stride)
    ///   subscript are assumed to fall within a single fetched line.
    /// This is a documented approximation,
    ///   not a precise model.
    pub fn cache_line_key(&self) -> String {
        let mut key = self.orig_name.clone();

        for subscript in self.index_expr.iter().skip(1) {
            key.push(',');
            key.push_str(subscript);
        }

        key
    }
}

impl Display for Variable {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "{}", self.name)
    }
}

/// Fold a subscript tree into a simplified textual form.
///
/// A subscript consisting of a chain of names and integer literals joined
///   by `+`/`-` is folded into `name`, `name+K`, or `name-K` with the net
///   integer offset `K`;
///     `j+1-1` therefore folds to `j`.
/// Any other shape is rendered verbatim via [`ExprNode::text`].
pub fn fold_subscript(subscript: &ExprNode) -> String {
    let children = match subscript {
        ExprNode::Group(children) | ExprNode::ArgList(children) => children,
        other => return other.text(),
    };

    let mut names: Vec<&str> = vec![];
    let mut offset: i64 = 0;
    let mut sign: i64 = 1;

    for child in children {
        match child {
            ExprNode::Name(name) => {
                // A name under a `-` is not a foldable offset.
                if sign < 0 {
                    return subscript.text();
                }

                names.push(name);
            }
            ExprNode::Literal(lit) => match lit.parse::<i64>() {
                Ok(value) => offset += sign * value,
                Err(_) => return subscript.text(),
            },
            ExprNode::Opr(sym) if sym == "+" => sign = 1,
            ExprNode::Opr(sym) if sym == "-" => sign = -1,
            _ => return subscript.text(),
        }
    }

    let base = names.join("+");

    match offset {
        0 => base,
        k if k > 0 => format!("{}+{}", base, k),
        k => format!("{}{}", base, k),
    }
}

/// Index-variable names referenced by a subscript tree.
fn index_names(subscript: &ExprNode) -> Vec<String> {
    match subscript {
        ExprNode::Name(name) => vec![name.clone()],
        ExprNode::Group(children) | ExprNode::ArgList(children) => {
            children.iter().flat_map(index_names).collect()
        }
        _ => vec![],
    }
}
