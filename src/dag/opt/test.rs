// DAG optimization pass tests
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

use super::*;
use crate::dag::build::DagBuilder;
use crate::dag::error::DagResult;
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

fn kind_count(dag: &Dag, kind: &NodeKind) -> usize {
    dag.nodes().filter(|&n| dag.node(n).kind == *kind).count()
}

#[test]
fn prune_splices_pass_through_temporary() -> DagResult<()> {
    let mut dag = Dag::new("prune");
    let mut builder = DagBuilder::new(&mut dag);

    // t = a + b;  x = t * c — `t` is a pass-through temporary.
    builder.add_assignment(
        &Variable::scalar("t"),
        &[name("a"), opr("+"), name("b")],
    )?;
    builder.add_assignment(
        &Variable::scalar("x"),
        &[name("t"), opr("*"), name("c")],
    )?;

    assert_eq!(1, prune_scalar_temporaries(&mut dag));

    let add = dag.find_named("+").unwrap();
    let mul = dag.find_named("*").unwrap();

    assert_eq!(None, dag.lookup("t"));
    assert!(dag.has_producer(mul, add));

    Ok(())
}

#[test]
fn prune_is_idempotent() -> DagResult<()> {
    let mut dag = Dag::new("prune2");
    let mut builder = DagBuilder::new(&mut dag);

    builder.add_assignment(
        &Variable::scalar("t"),
        &[name("a"), opr("+"), name("b")],
    )?;
    builder.add_assignment(
        &Variable::scalar("x"),
        &[name("t"), opr("*"), name("c")],
    )?;

    prune_scalar_temporaries(&mut dag);

    let nodes_before = dag.node_count();
    let edges_before = dag.inner().edge_count();

    // A second run must be a no-op.
    assert_eq!(0, prune_scalar_temporaries(&mut dag));
    assert_eq!(nodes_before, dag.node_count());
    assert_eq!(edges_before, dag.inner().edge_count());

    Ok(())
}

#[test]
fn prune_spares_operators_and_leaves() -> DagResult<()> {
    let mut dag = Dag::new("prune3");
    let mut builder = DagBuilder::new(&mut dag);

    // x = sin(a) + 1.0: the intrinsic has one producer and one consumer
    // but carries cycles and must survive.
    builder.add_assignment(
        &Variable::scalar("x"),
        &[
            ExprNode::Call {
                name: "sin".into(),
                args: vec![name("a")],
            },
            opr("+"),
            ExprNode::Literal("1.0".into()),
        ],
    )?;

    assert_eq!(0, prune_scalar_temporaries(&mut dag));
    assert!(dag.find_named("SIN").is_some());

    Ok(())
}

#[test]
fn duplicate_subexpressions_merge_behind_placeholder() -> DagResult<()> {
    let mut dag = Dag::new("cse");
    let mut builder = DagBuilder::new(&mut dag);

    // e = (a+b) * (a+b)
    builder.add_assignment(
        &Variable::scalar("e"),
        &[
            group(vec![name("a"), opr("+"), name("b")]),
            opr("*"),
            group(vec![name("a"), opr("+"), name("b")]),
        ],
    )?;

    assert_eq!(2, kind_count(&dag, &NodeKind::Opr(Opr::Add)));

    assert_eq!(1, merge_duplicates(&mut dag)?);

    // Exactly one addition survives, consumed twice via the synthesized
    // placeholder.
    assert_eq!(1, kind_count(&dag, &NodeKind::Opr(Opr::Add)));

    let placeholder = dag.find_named("sub_exp0").expect("no placeholder");
    let mul = dag.find_named("*").unwrap();
    let add = dag.find_named("+").unwrap();

    assert_eq!(2, dag.producer_count(mul));
    assert_eq!(2, dag.consumer_count(placeholder));
    assert!(dag.has_producer(mul, placeholder));
    assert!(dag.has_producer(placeholder, add));
    assert_eq!(1, dag.producer_count(placeholder));

    Ok(())
}

#[test]
fn merge_reclaims_unreferenced_dependencies() -> DagResult<()> {
    let mut dag = Dag::new("cse2");
    let mut builder = DagBuilder::new(&mut dag);

    // x = a*b + a*b: the duplicate multiply and nothing else goes; `a`
    // and `b` still feed the surviving multiply.
    builder.add_assignment(
        &Variable::scalar("x"),
        &[
            group(vec![name("a"), opr("*"), name("b")]),
            opr("+"),
            group(vec![name("a"), opr("*"), name("b")]),
        ],
    )?;

    merge_duplicates(&mut dag)?;

    assert_eq!(1, kind_count(&dag, &NodeKind::Opr(Opr::Mul)));
    assert!(dag.lookup("a").is_some());
    assert!(dag.lookup("b").is_some());

    Ok(())
}

#[test]
fn division_duplicates_merge_first() -> DagResult<()> {
    let mut dag = Dag::new("cse3");
    let mut builder = DagBuilder::new(&mut dag);

    // x = a/b + a/b
    builder.add_assignment(
        &Variable::scalar("x"),
        &[
            group(vec![name("a"), opr("/"), name("b")]),
            opr("+"),
            group(vec![name("a"), opr("/"), name("b")]),
        ],
    )?;

    assert_eq!(1, merge_duplicates(&mut dag)?);
    assert_eq!(1, kind_count(&dag, &NodeKind::Opr(Opr::Div)));

    Ok(())
}

#[test]
fn reciprocal_divisions_do_not_match() -> DagResult<()> {
    let mut dag = Dag::new("cse4");
    let mut builder = DagBuilder::new(&mut dag);

    // x = a/b + b/a: equal producer sets, different denominators.
    builder.add_assignment(
        &Variable::scalar("x"),
        &[
            group(vec![name("a"), opr("/"), name("b")]),
            opr("+"),
            group(vec![name("b"), opr("/"), name("a")]),
        ],
    )?;

    assert_eq!(0, merge_duplicates(&mut dag)?);
    assert_eq!(2, kind_count(&dag, &NodeKind::Opr(Opr::Div)));

    Ok(())
}

#[test]
fn single_node_of_a_kind_is_a_noop() -> DagResult<()> {
    let mut dag = Dag::new("cse5");
    let mut builder = DagBuilder::new(&mut dag);

    builder.add_assignment(
        &Variable::scalar("x"),
        &[name("a"), opr("*"), name("b")],
    )?;

    assert_eq!(0, merge_duplicates(&mut dag)?);

    Ok(())
}

#[test]
fn multiply_add_fuses() -> DagResult<()> {
    let mut dag = Dag::new("fma");
    let mut builder = DagBuilder::new(&mut dag);

    // d = a*b + c
    builder.add_assignment(
        &Variable::scalar("d"),
        &[
            group(vec![name("a"), opr("*"), name("b")]),
            opr("+"),
            name("c"),
        ],
    )?;

    assert_eq!(1, fuse_multiply_adds(&mut dag));

    assert_eq!(0, kind_count(&dag, &NodeKind::Opr(Opr::Mul)));
    assert_eq!(0, kind_count(&dag, &NodeKind::Opr(Opr::Add)));
    assert_eq!(1, kind_count(&dag, &NodeKind::Fma));

    let fma = dag.find_named("FMA").unwrap();
    let a = dag.lookup("a").unwrap();
    let b = dag.lookup("b").unwrap();
    let c = dag.lookup("c").unwrap();

    // Multiplicands are retained as operands; the addend is an ordinary
    // producer.
    let mut operands = dag.node(fma).operands.to_vec();
    operands.sort_by_key(NodeRef::index);
    assert_eq!(vec![a, b], operands);

    assert_eq!(3, dag.producer_count(fma));
    assert!(dag.has_producer(fma, c));

    Ok(())
}

#[test]
fn shared_multiply_result_is_not_fused() -> DagResult<()> {
    let mut dag = Dag::new("fma2");
    let mut builder = DagBuilder::new(&mut dag);

    // t = a*b;  x = t + c;  y = t + d — the multiply fans out and must
    // survive as-is.
    builder.add_assignment(
        &Variable::scalar("t"),
        &[name("a"), opr("*"), name("b")],
    )?;
    builder.add_assignment(
        &Variable::scalar("x"),
        &[name("t"), opr("+"), name("c")],
    )?;
    builder.add_assignment(
        &Variable::scalar("y"),
        &[name("t"), opr("+"), name("d")],
    )?;

    prune_scalar_temporaries(&mut dag);

    assert_eq!(0, fuse_multiply_adds(&mut dag));
    assert_eq!(1, kind_count(&dag, &NodeKind::Opr(Opr::Mul)));

    Ok(())
}

#[test]
fn fused_duplicates_match_on_operands() -> DagResult<()> {
    let mut dag = Dag::new("fma3");
    let mut builder = DagBuilder::new(&mut dag);

    // x = a*b + c;  y = b*a + c — same FMA either way around.
    builder.add_assignment(
        &Variable::scalar("x"),
        &[
            group(vec![name("a"), opr("*"), name("b")]),
            opr("+"),
            name("c"),
        ],
    )?;
    builder.add_assignment(
        &Variable::scalar("y"),
        &[
            group(vec![name("b"), opr("*"), name("a")]),
            opr("+"),
            name("c"),
        ],
    )?;

    assert_eq!(2, fuse_multiply_adds(&mut dag));

    let fmas = dag
        .nodes()
        .filter(|&n| dag.node(n).kind == NodeKind::Fma)
        .collect::<Vec<_>>();

    assert!(subgraph_matches(&dag, fmas[0], fmas[1]));

    Ok(())
}

#[test]
fn optimize_runs_all_passes() -> DagResult<()> {
    let mut dag = Dag::new("all");
    let mut builder = DagBuilder::new(&mut dag);

    // t = a*b;  x = t + c
    builder.add_assignment(
        &Variable::scalar("t"),
        &[name("a"), opr("*"), name("b")],
    )?;
    builder.add_assignment(
        &Variable::scalar("x"),
        &[name("t"), opr("+"), name("c")],
    )?;

    // Pruning `t` exposes the multiply to fusion.
    assert_eq!(1, optimize(&mut dag)?);
    assert_eq!(1, kind_count(&dag, &NodeKind::Fma));

    Ok(())
}

#[test]
fn graphs_remain_acyclic_after_optimization() -> DagResult<()> {
    let mut dag = Dag::new("acyclic");
    let mut builder = DagBuilder::new(&mut dag);

    builder.add_assignment(
        &Variable::scalar("t"),
        &[
            group(vec![name("a"), opr("+"), name("b")]),
            opr("*"),
            group(vec![name("a"), opr("+"), name("b")]),
        ],
    )?;
    builder.add_assignment(
        &Variable::scalar("x"),
        &[name("t"), opr("/"), name("c")],
    )?;

    optimize(&mut dag)?;

    assert!(petgraph::algo::toposort(dag.inner(), None).is_ok());

    Ok(())
}
