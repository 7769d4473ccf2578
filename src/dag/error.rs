// DAG errors
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

//! Errors resulting from DAG construction, analysis, and scheduling.
//!
//! Every variant is fatal for the statement or graph being processed;
//!   there is no partial-result recovery.
//! The taxonomy distinguishes bad input
//!   (construction),
//!   bad static configuration,
//!   and internal-consistency failures that signal a logic bug.

use std::fmt::{self, Display};

/// A [`Result`] with a hard-coded [`DagError`] error type.
///
/// This is the result of every graph operation that could potentially
///   fail in error.
pub type DagResult<T> = Result<T, DagError>;

/// An error from a DAG operation.
#[derive(Debug, PartialEq)]
pub enum DagError {
    /// More than one top-level operator was found among the direct
    ///   children of one expression level.
    ///
    /// The expression tree supplied by the parser must already be
    ///   flattened to single-operator form at every level;
    ///     encountering a second operator means that precondition was
    ///     violated.
    /// Carries the two offending operator symbols.
    MultipleOperators(String, String),

    /// A function/array reference did not name its call target.
    BadCallTarget(String),

    /// A sub-graph deletion was requested for a node that is not present
    ///   in the graph.
    MissingNode(String),

    /// An operator or intrinsic has no entry in the active cost table.
    ///
    /// There is deliberately no silent default cost.
    UnknownCost(String),

    /// An unrecognized node-type string was given to the type-filtered
    ///   node query.
    UnknownNodeType(String),

    /// The scheduler exceeded its safety bound without retiring every
    ///   operation.
    ///
    /// Since a well-formed acyclic graph always schedules,
    ///   this signals a construction bug rather than bad input.
    ScheduleOverrun(usize),
}

impl Display for DagError {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::MultipleOperators(first, second) => write!(
                fmt,
                "multiple operators `{}` and `{}` among direct siblings \
                 (expression level must contain at most one operator)",
                first, second,
            ),
            Self::BadCallTarget(text) => {
                write!(fmt, "call reference `{}` does not name its target", text)
            }
            Self::MissingNode(name) => write!(
                fmt,
                "cannot delete node `{}`: not present in graph",
                name,
            ),
            Self::UnknownCost(what) => write!(
                fmt,
                "no cycle cost configured for `{}` in the active cost model",
                what,
            ),
            Self::UnknownNodeType(ty) => {
                write!(fmt, "unrecognized node type `{}`", ty)
            }
            Self::ScheduleOverrun(bound) => write!(
                fmt,
                "internal error: schedule exceeded {} cycles without \
                 terminating (this is likely a graph construction bug!)",
                bound,
            ),
        }
    }
}

impl std::error::Error for DagError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }
}
