// Processor cost model
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

//! Static per-operation cycle costs and machine parameters.
//!
//! A [`CostModel`] is a snapshot of one microarchitecture's double-precision
//!   operation latencies,
//!     along with the handful of machine parameters
//!     (cache-line size, clock, issue width)
//!     needed by the
//!       [critical-path](crate::dag::path),
//!       [scheduling](crate::sched),
//!       and [reporting](crate::report)
//!       layers.
//!
//! Costs are complete by construction for operators and fused operations;
//!   intrinsics are table-driven,
//!     and a missing table entry is a hard
//!     [`UnknownCost`](crate::dag::DagError::UnknownCost) error rather
//!     than a silent default.

use crate::dag::{DagError, DagResult, NodeKind, Opr};
use fxhash::FxHashMap;

/// Issue ports available to the scheduler.
///
/// Port `0` issues multiplications,
///   divisions,
///   fused multiply-adds,
///   and intrinsics;
/// port `1` issues additions and subtractions.
pub const PORTS: usize = 2;

/// Per-operation cycle costs and machine parameters for one target
///   microarchitecture.
#[derive(Debug, Clone)]
pub struct CostModel {
    /// Profile identifier, for reports.
    pub name: &'static str,

    /// Cycles for one addition or subtraction.
    add_sub: u64,

    /// Cycles for one multiplication.
    mul: u64,

    /// Cycles for one division.
    div: u64,

    /// Cycles for one fused multiply-add.
    fma: u64,

    /// Whether the target issues fused multiply-adds natively.
    ///
    /// When unset,
    ///   fusion is still modeled
    ///   (the optimizer runs regardless)
    ///   but reports flag the profile as lacking the instruction.
    pub has_fma: bool,

    /// Cycle cost per recognized intrinsic,
    ///   keyed by canonical uppercase name.
    intrinsics: FxHashMap<&'static str, u64>,

    /// Data-cache line size in bytes.
    pub cache_line_bytes: u64,

    /// Core clock in GHz,
    ///   for converting cycle totals to wall time and GFLOPS.
    pub clock_ghz: f64,
}

impl CostModel {
    /// Ivy Bridge profile
    ///   (double precision, no native FMA).
    pub fn ivy_bridge() -> Self {
        Self {
            name: "ivy_bridge",
            add_sub: 1,
            mul: 1,
            div: 8,
            fma: 1,
            has_fma: false,
            intrinsics: Self::intrinsic_table(),
            cache_line_bytes: 64,
            clock_ghz: 3.6,
        }
    }

    /// Haswell profile
    ///   (double precision, native FMA).
    pub fn haswell() -> Self {
        Self {
            name: "haswell",
            has_fma: true,
            div: 7,
            ..Self::ivy_bridge()
        }
    }

    fn intrinsic_table() -> FxHashMap<&'static str, u64> {
        let mut table = FxHashMap::default();

        table.insert("ABS", 1);
        table.insert("MIN", 2);
        table.insert("MAX", 2);
        table.insert("SIGN", 3);
        table.insert("MOD", 8);
        table.insert("EXP", 20);
        table.insert("LOG", 20);
        table.insert("SQRT", 21);
        table.insert("SIN", 49);
        table.insert("COS", 49);
        table.insert("TANH", 70);

        table
    }

    /// Cycle cost of one node of the given kind.
    ///
    /// Non-schedulable kinds
    ///   (scalars, constants, array references)
    ///   cost nothing;
    ///     their contribution to runtime is memory traffic,
    ///     which is modeled separately
    ///     (see [`crate::report`]).
    pub fn cycles_for(&self, kind: &NodeKind) -> DagResult<u64> {
        match kind {
            NodeKind::Scalar | NodeKind::Constant | NodeKind::ArrayRef(_) => {
                Ok(0)
            }
            NodeKind::Opr(Opr::Add) | NodeKind::Opr(Opr::Sub) => {
                Ok(self.add_sub)
            }
            NodeKind::Opr(Opr::Mul) => Ok(self.mul),
            NodeKind::Opr(Opr::Div) => Ok(self.div),
            NodeKind::Fma => Ok(self.fma),
            NodeKind::Intrinsic(name) => self
                .intrinsics
                .get(name.as_str())
                .copied()
                .ok_or_else(|| DagError::UnknownCost(name.clone())),
        }
    }

    /// Issue port for a schedulable node,
    ///   or [`None`] for kinds that are never issued.
    pub fn issue_port(&self, kind: &NodeKind) -> Option<usize> {
        match kind {
            NodeKind::Opr(Opr::Mul)
            | NodeKind::Opr(Opr::Div)
            | NodeKind::Fma
            | NodeKind::Intrinsic(_) => Some(0),

            NodeKind::Opr(Opr::Add) | NodeKind::Opr(Opr::Sub) => Some(1),

            _ => None,
        }
    }
}
