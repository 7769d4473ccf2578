// Data-dependency DAG
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

//! Data-dependency graph of one subroutine's assignment statements.
//!
//! The [`Dag`] is the system's core data structure:
//!   the [builder](build) accumulates parsed assignment statements into
//!   it,
//!   the [optimizer](opt) rewrites it,
//!   [path analysis](path) weighs it,
//!   and the [scheduler](crate::sched) and [reports](crate::report)
//!   consume the result.
//!
//! See the [graph] module for the concrete representation and its
//!   invariants.

pub mod build;
pub mod error;
pub mod graph;
pub mod node;
pub mod opt;
pub mod path;

pub use build::DagBuilder;
pub use error::{DagError, DagResult};
pub use graph::{Dag, NodeRef};
pub use node::{NodeKind, NodeModel, Opr};
pub use path::Path;
