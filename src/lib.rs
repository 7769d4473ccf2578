// Dependency-DAG cost analysis
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

//! Data-dependency analysis of scalar assignment statements.
//!
//! A sequence of parsed assignment statements
//!   (see [`expr`])
//!   is accumulated into a dependency DAG
//!   ([`dag::build`]),
//!   optimized
//!   ([`dag::opt`]),
//!   weighed against a processor cost model
//!   ([`cost`], [`dag::path`]),
//!   scheduled onto a simple port model
//!   ([`sched`]),
//!   and summarized
//!   ([`report`]).
//!
//! The pipeline's entry point is [`report::Report::compile`];
//!   each stage below it is usable on its own.

// We build docs for private items.
#![allow(rustdoc::private_intra_doc_links)]

pub mod cost;
pub mod dag;
pub mod expr;
pub mod report;
pub mod sched;
