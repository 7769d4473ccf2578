// DAG node model
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

//! Vertex data for the dependency [DAG](super).

use crate::expr::Variable;
use arrayvec::ArrayVec;
use std::fmt::{self, Display};

/// The four binary arithmetic operators modeled by the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opr {
    Add,
    Sub,
    Mul,
    Div,
}

impl Opr {
    /// Operator symbol as it appears in source and in reports.
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
        }
    }

    /// Recognize an operator symbol among expression-tree siblings.
    ///
    /// Symbols outside the fixed allowed set yield [`None`] and are
    ///   treated as stray punctuation by the builder,
    ///     not as errors.
    pub fn from_symbol(sym: &str) -> Option<Self> {
        match sym {
            "+" => Some(Self::Add),
            "-" => Some(Self::Sub),
            "*" => Some(Self::Mul),
            "/" => Some(Self::Div),
            _ => None,
        }
    }
}

impl Display for Opr {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "{}", self.symbol())
    }
}

/// Tagged variant describing what a node represents.
///
/// Plain scalar variables are the "unset" type of the data model;
///   everything else is either an arithmetic operation,
///     a synthesized fused operation,
///     or a leaf reference kind.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// A plain (scalar) variable reference or synthesized placeholder.
    Scalar,

    /// A binary arithmetic operator.
    Opr(Opr),

    /// A fused multiply-add synthesized by the optimizer.
    Fma,

    /// A real-literal constant.
    Constant,

    /// An array-element reference,
    ///   retaining the surface form for cache-line analysis.
    ArrayRef(Variable),

    /// A call to a recognized elementary intrinsic.
    Intrinsic(String),
}

impl NodeKind {
    /// Whether nodes of this kind must be issued to an execution port.
    ///
    /// Only schedulable nodes carry a cycle cost;
    ///   references and constants contribute no cycles of their own.
    pub fn is_schedulable(&self) -> bool {
        matches!(self, Self::Opr(_) | Self::Fma | Self::Intrinsic(_))
    }

    /// Floating-point operations represented by a node of this kind.
    ///
    /// A fused multiply-add performs two.
    pub fn flops(&self) -> usize {
        match self {
            Self::Opr(_) => 1,
            Self::Fma => 2,
            _ => 0,
        }
    }
}

impl Display for NodeKind {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Scalar => write!(fmt, "scalar"),
            Self::Opr(op) => write!(fmt, "{}", op),
            Self::Fma => write!(fmt, "FMA"),
            Self::Constant => write!(fmt, "constant"),
            Self::ArrayRef(_) => write!(fmt, "array_ref"),
            Self::Intrinsic(name) => write!(fmt, "intrinsic {}", name),
        }
    }
}

/// Maximum number of tracked operand references per node.
///
/// Only the division denominator and the two FMA multiplicands are ever
///   recorded;
///     general dataflow is carried by graph edges instead.
pub const MAX_OPERANDS: usize = 2;

/// One vertex of the dependency graph.
///
/// Edges
///   (producer and consumer relationships)
///   live on the owning [`Dag`](super::Dag);
///     a node holds only its own identity and scheduling state.
/// The cycle cost of a node is always computed from the active
///   [`CostModel`](crate::cost::CostModel),
///     never stored.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeModel {
    /// Lookup name for non-unique nodes,
    ///   or a display name for unique ones
    ///   (operator symbol, literal text, `sub_exp<N>`).
    pub name: String,

    /// What this node represents.
    pub kind: NodeKind,

    /// Scheduling-state flag used by the
    ///   [list scheduler](crate::sched).
    ///
    /// A ready node's value is available for consumption.
    pub ready: bool,

    /// Tracked operand references
    ///   (division denominator or FMA multiplicands).
    pub operands: ArrayVec<super::NodeRef, MAX_OPERANDS>,
}

impl NodeModel {
    pub fn new<S: Into<String>>(name: S, kind: NodeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            ready: false,
            operands: ArrayVec::new(),
        }
    }

    /// An operator node named by its symbol.
    pub fn opr(op: Opr) -> Self {
        Self::new(op.symbol(), NodeKind::Opr(op))
    }

    /// The array-reference metadata,
    ///   if this node is an array reference.
    pub fn array_var(&self) -> Option<&Variable> {
        match &self.kind {
            NodeKind::ArrayRef(var) => Some(var),
            _ => None,
        }
    }
}

impl Display for NodeModel {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "{}", self.name)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn operator_symbols_round_trip() {
        for op in [Opr::Add, Opr::Sub, Opr::Mul, Opr::Div] {
            assert_eq!(Some(op), Opr::from_symbol(op.symbol()));
        }
    }

    #[test]
    fn stray_punctuation_is_not_an_operator() {
        assert_eq!(None, Opr::from_symbol("**"));
        assert_eq!(None, Opr::from_symbol(","));
        assert_eq!(None, Opr::from_symbol(""));
    }

    #[test]
    fn only_operations_are_schedulable() {
        assert!(NodeKind::Opr(Opr::Add).is_schedulable());
        assert!(NodeKind::Fma.is_schedulable());
        assert!(NodeKind::Intrinsic("SIN".into()).is_schedulable());

        assert!(!NodeKind::Scalar.is_schedulable());
        assert!(!NodeKind::Constant.is_schedulable());
    }

    #[test]
    fn fma_counts_as_two_flops() {
        assert_eq!(2, NodeKind::Fma.flops());
        assert_eq!(1, NodeKind::Opr(Opr::Div).flops());
        assert_eq!(0, NodeKind::Scalar.flops());
    }
}
