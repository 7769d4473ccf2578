// Analysis report
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

//! Whole-graph analysis report.
//!
//! [`Report::compile`] is the top of the analysis pipeline:
//!   it weighs the graph,
//!   traces its critical path,
//!   schedules it,
//!   and takes a census of its operations and memory traffic.
//! The resulting value is self-contained:
//!   it renders as a human-readable summary via [`Display`],
//!   and retains the Graphviz rendering of the analyzed graph
//!     (critical path highlighted)
//!     for separate output.

use crate::cost::{CostModel, PORTS};
use crate::dag::path::calc_critical_path;
use crate::dag::{Dag, DagResult, NodeKind};
use crate::sched::{schedule, Schedule};
use fxhash::FxHashSet;
use std::fmt::{self, Display};

/// Node-kind census rows,
///   in report order.
const CENSUS_KINDS: [&str; 9] = [
    "+",
    "-",
    "*",
    "/",
    "FMA",
    "intrinsic",
    "array_ref",
    "constant",
    "scalar",
];

/// Critical-path summary retained by a [`Report`].
#[derive(Debug, Clone, PartialEq)]
pub struct CriticalSummary {
    /// Cycle latency along the path.
    pub cycles: u64,

    /// Floating-point operations along the path.
    pub flops: usize,

    /// Node names along the path,
    ///   consumer first.
    pub names: Vec<String>,
}

/// Computed analysis of one subroutine's dependency graph.
#[derive(Debug, Clone)]
pub struct Report {
    name: String,
    profile: &'static str,
    clock_ghz: f64,
    cache_line_bytes: u64,
    has_fma: bool,

    counts: Vec<(&'static str, usize)>,
    flops: usize,
    mem_refs: usize,
    cache_lines: usize,

    total_cycles: u64,
    critical: Option<CriticalSummary>,
    schedule: Schedule,

    dot: String,
}

impl Report {
    /// Run the full analysis pipeline over a built
    ///   (and optionally optimized)
    ///   graph.
    ///
    /// The graph is left carrying its critical path and final scheduling
    ///   state;
    ///     the report itself borrows nothing from it.
    pub fn compile(dag: &mut Dag, cost: &CostModel) -> DagResult<Self> {
        calc_critical_path(dag, cost)?;
        let schedule = schedule(dag, cost)?;

        let mut counts = Vec::with_capacity(CENSUS_KINDS.len());

        for kind in CENSUS_KINDS {
            counts.push((kind, dag.nodes_with_kind(kind)?.len()));
        }

        let flops = dag
            .nodes()
            .map(|n| dag.node(n).kind.flops())
            .sum::<usize>();

        // Memory traffic: every array reference is a load or store, and
        // every scalar input must be fetched at least once.  Constants
        // are immediates.
        let scalar_inputs = dag
            .inputs()
            .into_iter()
            .filter(|&n| dag.node(n).kind == NodeKind::Scalar)
            .count();
        let array_refs = dag
            .nodes()
            .filter(|&n| matches!(dag.node(n).kind, NodeKind::ArrayRef(_)))
            .count();
        let mem_refs = array_refs + scalar_inputs;

        let cache_lines = dag
            .nodes()
            .filter_map(|n| dag.node(n).array_var())
            .map(|var| var.cache_line_key())
            .collect::<FxHashSet<String>>()
            .len();

        let total_cycles =
            dag.nodes().try_fold(0u64, |sum, n| -> DagResult<u64> {
                Ok(sum + cost.cycles_for(&dag.node(n).kind)?)
            })?;

        let critical = match dag.critical_path() {
            Some(path) => Some(CriticalSummary {
                cycles: path.cycles(dag, cost)?,
                flops: path.flops(dag),
                names: path
                    .nodes()
                    .iter()
                    .map(|&n| dag.node(n).name.clone())
                    .collect(),
            }),
            None => None,
        };

        let dot = dag.to_dot();

        Ok(Self {
            name: dag.name().to_owned(),
            profile: cost.name,
            clock_ghz: cost.clock_ghz,
            cache_line_bytes: cost.cache_line_bytes,
            has_fma: cost.has_fma,
            counts,
            flops,
            mem_refs,
            cache_lines,
            total_cycles,
            critical,
            schedule,
            dot,
        })
    }

    /// Node-kind census,
    ///   in report order.
    pub fn counts(&self) -> &[(&'static str, usize)] {
        &self.counts
    }

    /// Floating-point operations performed per evaluation.
    pub fn flops(&self) -> usize {
        self.flops
    }

    /// Memory references per evaluation
    ///   (array accesses plus scalar inputs).
    pub fn mem_refs(&self) -> usize {
        self.mem_refs
    }

    /// Estimated distinct cache lines touched per evaluation.
    pub fn cache_lines(&self) -> usize {
        self.cache_lines
    }

    /// Sum of every operation's own cycle cost:
    ///   the work bound,
    ///     ignoring parallelism entirely.
    pub fn total_cycles(&self) -> u64 {
        self.total_cycles
    }

    /// Critical-path summary,
    ///   if the graph was nonempty.
    pub fn critical(&self) -> Option<&CriticalSummary> {
        self.critical.as_ref()
    }

    /// The issue schedule the analysis produced.
    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    /// Graphviz DOT rendering of the analyzed graph,
    ///   critical path highlighted.
    pub fn dot(&self) -> &str {
        &self.dot
    }

    /// Estimated sustained GFLOPS at the model's clock,
    ///   from the scheduled cycle count.
    ///
    /// [`None`] when the schedule is empty
    ///   (nothing to issue).
    pub fn gflops(&self) -> Option<f64> {
        let cycles = self.schedule.cycles();

        if cycles == 0 {
            return None;
        }

        Some(self.flops as f64 * self.clock_ghz / cycles as f64)
    }

    /// Estimated memory bandwidth in GB/s at the model's clock,
    ///   assuming each estimated cache line is fetched once per
    ///   evaluation.
    ///
    /// Approximate and presentational,
    ///   like [`Report::gflops`].
    pub fn bandwidth_gbs(&self) -> Option<f64> {
        let cycles = self.schedule.cycles();

        if cycles == 0 {
            return None;
        }

        Some(
            (self.cache_lines as u64 * self.cache_line_bytes) as f64
                * self.clock_ghz
                / cycles as f64,
        )
    }
}

impl Display for Report {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        writeln!(
            fmt,
            "subroutine `{}` (profile {}, {} GHz, FMA: {})",
            self.name,
            self.profile,
            self.clock_ghz,
            if self.has_fma { "native" } else { "modeled only" },
        )?;

        write!(fmt, "  nodes:")?;

        for (kind, count) in &self.counts {
            if *count > 0 {
                write!(fmt, " {}: {}", kind, count)?;
            }
        }

        writeln!(fmt)?;
        writeln!(fmt, "  flops per evaluation: {}", self.flops)?;
        writeln!(
            fmt,
            "  memory references: {} ({} cache lines)",
            self.mem_refs, self.cache_lines,
        )?;
        writeln!(fmt, "  work bound: {} cycles", self.total_cycles)?;

        match &self.critical {
            Some(critical) => writeln!(
                fmt,
                "  critical path: {} cycles, {} flops ({})",
                critical.cycles,
                critical.flops,
                critical.names.join(" -> "),
            )?,
            None => writeln!(fmt, "  critical path: (empty graph)")?,
        }

        writeln!(
            fmt,
            "  schedule: {} cycles on {} ports",
            self.schedule.cycles(),
            PORTS,
        )?;

        match (self.gflops(), self.bandwidth_gbs()) {
            (Some(gflops), Some(gbs)) => writeln!(
                fmt,
                "  estimated GFLOPS: {:.2} ({:.2} GB/s)",
                gflops, gbs,
            )?,
            _ => writeln!(fmt, "  estimated GFLOPS: n/a")?,
        }

        writeln!(fmt)?;
        write!(fmt, "{}", self.schedule)
    }
}
