// Greedy list scheduler
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

//! Cycle-by-cycle greedy list scheduling of a dependency graph.
//!
//! The machine model is deliberately simple:
//!   [`PORTS`] issue ports,
//!     each able to issue at most one operation per cycle,
//!     with operation kinds statically assigned to ports
//!     (see [`CostModel::issue_port`]).
//! Each cycle,
//!   the set of _available_ operations is computed up front
//!     (not yet issued, every producer ready),
//!   and each is placed into its port's slot if that slot is still empty;
//! an issued operation retires immediately,
//!   but since availability was snapshotted at the top of the cycle,
//!   its consumers cannot issue until the following cycle.
//! Readiness then propagates through the zero-cost reference nodes
//!   between cycles.
//!
//! A well-formed acyclic graph always terminates;
//!   the [`MAX_SCHEDULE_CYCLES`] bound exists to turn a construction bug
//!   (a cycle smuggled past the builder,
//!     leaving operations permanently blocked)
//!   into a hard error instead of a hang.

use crate::cost::{CostModel, PORTS};
use crate::dag::{Dag, DagError, DagResult, NodeRef};
use fixedbitset::FixedBitSet;
use std::fmt::{self, Display};

/// Safety bound on schedule length.
///
/// Generous for any graph a single subroutine produces;
///   exceeding it is reported as an internal error.
pub const MAX_SCHEDULE_CYCLES: usize = 500;

/// A completed issue table:
///   one row per cycle,
///   one column per port,
///   each cell naming the operation issued there
///     (if any).
#[derive(Debug, Clone, PartialEq)]
pub struct Schedule {
    rows: Vec<Vec<Option<String>>>,
}

impl Schedule {
    /// Total cycles taken to issue every operation.
    pub fn cycles(&self) -> usize {
        self.rows.len()
    }

    /// Issue rows,
    ///   one per cycle.
    pub fn rows(&self) -> &[Vec<Option<String>>] {
        &self.rows
    }
}

impl Display for Schedule {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "cycle")?;

        for port in 0..PORTS {
            write!(fmt, "  {:<10}", format!("port {}", port))?;
        }

        writeln!(fmt)?;

        for (cycle, row) in self.rows.iter().enumerate() {
            write!(fmt, "{:>5}", cycle)?;

            for cell in row {
                write!(fmt, "  {:<10}", cell.as_deref().unwrap_or("."))?;
            }

            writeln!(fmt)?;
        }

        Ok(())
    }
}

/// Schedule every operation of the graph.
///
/// Per-node scheduling state
///   (the `ready` flag)
///   is reset on entry,
///     so repeated scheduling of the same graph is deterministic.
pub fn schedule(dag: &mut Dag, cost: &CostModel) -> DagResult<Schedule> {
    let all: Vec<NodeRef> = dag.nodes().collect();

    for &n in &all {
        dag.node_mut(n).ready = false;
    }

    let schedulable: Vec<NodeRef> = all
        .iter()
        .copied()
        .filter(|&n| dag.node(n).kind.is_schedulable())
        .collect();

    // Issued-operation set, keyed densely by node offset.
    let mut issued = FixedBitSet::with_capacity(dag.node_bound());
    let mut remaining = schedulable.len();

    let mut rows: Vec<Vec<Option<String>>> = Vec::new();

    // Leaves and anything else computable for free are ready before the
    // first cycle.
    propagate_ready(dag);

    while remaining > 0 {
        if rows.len() == MAX_SCHEDULE_CYCLES {
            return Err(DagError::ScheduleOverrun(MAX_SCHEDULE_CYCLES));
        }

        // Availability is snapshotted before any issue this cycle, so an
        // operation can never consume a value produced in its own cycle.
        let available: Vec<NodeRef> = schedulable
            .iter()
            .copied()
            .filter(|&n| {
                !issued.contains(n.index())
                    && dag.producers(n).all(|p| dag.node(p).ready)
            })
            .collect();

        let mut row: Vec<Option<String>> = vec![None; PORTS];

        for n in available {
            let port = match cost.issue_port(&dag.node(n).kind) {
                Some(port) => port,
                None => continue,
            };

            if row[port].is_some() {
                continue;
            }

            row[port] = Some(dag.node(n).name.clone());
            issued.insert(n.index());
            dag.node_mut(n).ready = true;
            remaining -= 1;
        }

        rows.push(row);
        propagate_ready(dag);
    }

    Ok(Schedule { rows })
}

/// Fixed-point propagation of readiness through zero-cost nodes.
///
/// A non-schedulable node is ready as soon as all of its producers are
///   (vacuously so for leaves).
fn propagate_ready(dag: &mut Dag) {
    loop {
        let newly: Vec<NodeRef> = dag
            .nodes()
            .filter(|&n| {
                let node = dag.node(n);

                !node.ready
                    && !node.kind.is_schedulable()
                    && dag.producers(n).all(|p| dag.node(p).ready)
            })
            .collect();

        if newly.is_empty() {
            return;
        }

        for n in newly {
            dag.node_mut(n).ready = true;
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::dag::build::DagBuilder;
    use crate::dag::{NodeKind, Opr};
    use crate::expr::{ExprNode, Variable};

    fn name(s: &str) -> ExprNode {
        ExprNode::Name(s.into())
    }

    fn opr(s: &str) -> ExprNode {
        ExprNode::Opr(s.into())
    }

    fn group(children: Vec<ExprNode>) -> ExprNode {
        ExprNode::Group(children)
    }

    #[test]
    fn single_addition_takes_one_cycle() -> DagResult<()> {
        let mut dag = Dag::new("one");
        let mut builder = DagBuilder::new(&mut dag);

        builder.add_assignment(
            &Variable::scalar("x"),
            &[name("a"), opr("+"), name("b")],
        )?;

        let sched = schedule(&mut dag, &CostModel::ivy_bridge())?;

        assert_eq!(1, sched.cycles());
        assert_eq!(Some("+".to_owned()), sched.rows()[0][1]);
        assert_eq!(None, sched.rows()[0][0]);

        Ok(())
    }

    #[test]
    fn independent_multiplies_contend_for_one_port() -> DagResult<()> {
        let mut dag = Dag::new("contend");
        let mut builder = DagBuilder::new(&mut dag);

        builder.add_assignment(
            &Variable::scalar("x"),
            &[name("a"), opr("*"), name("b")],
        )?;
        builder.add_assignment(
            &Variable::scalar("y"),
            &[name("c"), opr("*"), name("d")],
        )?;
        builder.add_assignment(
            &Variable::scalar("z"),
            &[name("e"), opr("*"), name("f")],
        )?;

        let sched = schedule(&mut dag, &CostModel::ivy_bridge())?;

        // One multiply per cycle; the add/sub port stays idle.
        assert_eq!(3, sched.cycles());

        for row in sched.rows() {
            assert_eq!(Some("*".to_owned()), row[0]);
            assert_eq!(None, row[1]);
        }

        Ok(())
    }

    #[test]
    fn distinct_ports_dual_issue() -> DagResult<()> {
        let mut dag = Dag::new("dual");
        let mut builder = DagBuilder::new(&mut dag);

        builder.add_assignment(
            &Variable::scalar("x"),
            &[name("a"), opr("+"), name("b")],
        )?;
        builder.add_assignment(
            &Variable::scalar("y"),
            &[name("c"), opr("*"), name("d")],
        )?;

        let sched = schedule(&mut dag, &CostModel::ivy_bridge())?;

        assert_eq!(1, sched.cycles());
        assert_eq!(Some("*".to_owned()), sched.rows()[0][0]);
        assert_eq!(Some("+".to_owned()), sched.rows()[0][1]);

        Ok(())
    }

    #[test]
    fn same_port_operations_serialize() -> DagResult<()> {
        let mut dag = Dag::new("divs");
        let mut builder = DagBuilder::new(&mut dag);

        builder.add_assignment(
            &Variable::scalar("x"),
            &[name("a"), opr("/"), name("b")],
        )?;
        builder.add_assignment(
            &Variable::scalar("y"),
            &[name("c"), opr("/"), name("d")],
        )?;

        let sched = schedule(&mut dag, &CostModel::ivy_bridge())?;

        // Both divisions want port 0; one issues per cycle.
        assert_eq!(2, sched.cycles());
        assert_eq!(Some("/".to_owned()), sched.rows()[0][0]);
        assert_eq!(Some("/".to_owned()), sched.rows()[1][0]);
        assert_eq!(None, sched.rows()[0][1]);

        Ok(())
    }

    #[test]
    fn dependent_operation_waits_a_cycle() -> DagResult<()> {
        let mut dag = Dag::new("dep");
        let mut builder = DagBuilder::new(&mut dag);

        // x = (a*b) + c: the addition reads the multiply's result and
        // cannot issue in the multiply's own cycle.
        builder.add_assignment(
            &Variable::scalar("x"),
            &[
                group(vec![name("a"), opr("*"), name("b")]),
                opr("+"),
                name("c"),
            ],
        )?;

        let sched = schedule(&mut dag, &CostModel::ivy_bridge())?;

        assert_eq!(2, sched.cycles());
        assert_eq!(Some("*".to_owned()), sched.rows()[0][0]);
        assert_eq!(None, sched.rows()[0][1]);
        assert_eq!(Some("+".to_owned()), sched.rows()[1][1]);

        Ok(())
    }

    #[test]
    fn graph_without_operations_schedules_in_zero_cycles() -> DagResult<()> {
        let mut dag = Dag::new("copy");
        let mut builder = DagBuilder::new(&mut dag);

        // x = y: nothing to issue.
        builder.add_assignment(&Variable::scalar("x"), &[name("y")])?;

        let sched = schedule(&mut dag, &CostModel::ivy_bridge())?;

        assert_eq!(0, sched.cycles());

        Ok(())
    }

    #[test]
    fn rescheduling_is_deterministic() -> DagResult<()> {
        let mut dag = Dag::new("again");
        let mut builder = DagBuilder::new(&mut dag);

        builder.add_assignment(
            &Variable::scalar("x"),
            &[
                group(vec![name("a"), opr("/"), name("b")]),
                opr("-"),
                name("c"),
            ],
        )?;

        let cost = CostModel::ivy_bridge();
        let first = schedule(&mut dag, &cost)?;
        let second = schedule(&mut dag, &cost)?;

        assert_eq!(first, second);

        Ok(())
    }

    // The bound is unreachable from the builder, which cannot produce a
    // cycle; a hand-made one must trip it rather than hang.
    #[test]
    fn cyclic_graph_trips_the_safety_bound() {
        let mut dag = Dag::new("cycle");

        let add1 = dag.get_node("+", None, true, NodeKind::Opr(Opr::Add));
        let add2 = dag.get_node("+", None, true, NodeKind::Opr(Opr::Add));

        dag.add_producer(add1, add2);
        dag.add_producer(add2, add1);

        assert_eq!(
            Err(DagError::ScheduleOverrun(MAX_SCHEDULE_CYCLES)),
            schedule(&mut dag, &CostModel::ivy_bridge()),
        );
    }

    #[test]
    fn rendered_table_lists_every_cycle() -> DagResult<()> {
        let mut dag = Dag::new("render");
        let mut builder = DagBuilder::new(&mut dag);

        builder.add_assignment(
            &Variable::scalar("x"),
            &[name("a"), opr("+"), name("b")],
        )?;

        let sched = schedule(&mut dag, &CostModel::ivy_bridge())?;
        let table = sched.to_string();

        assert!(table.starts_with("cycle"));
        assert!(table.contains("port 0"));
        assert!(table.contains("port 1"));
        assert!(table.contains('+'));

        Ok(())
    }
}
