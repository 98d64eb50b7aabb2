mod common;

use std::collections::BTreeSet;
use std::sync::Arc;

use actdata_core::{Document, Entry, ParameterId, TreeFunctionBinding};
use actdata_exec::{
    DependencyAnalyzer, ExecError, ExecuteOptions, ExecutionEngine, FunctionRegistry, GraphState,
    LoopStrategy,
};

use common::*;

struct LoopFixture {
    doc: Document,
    p1: ParameterId,
    p2: ParameterId,
    p3: ParameterId,
    f2: Cell,
}

/// F1 reads P1 and P3 and writes P2; F2 reads P2 and writes P3.
fn looped() -> LoopFixture {
    let mut doc = Document::new(registry()).unwrap();
    let a = cell(&mut doc, 1.0);
    let b = cell(&mut doc, 2.0);
    let c = cell(&mut doc, 3.0);
    bind(&mut doc, &b, "sum", &[a.value, c.value]);
    bind(&mut doc, &c, "copy", &[b.value]);
    LoopFixture {
        doc,
        p1: a.value,
        p2: b.value,
        p3: c.value,
        f2: c,
    }
}

#[test]
fn both_strategies_report_the_loop() {
    common::init_tracing();
    let fixture = looped();
    let expected: BTreeSet<ParameterId> = [fixture.p1, fixture.p2, fixture.p3].into();

    for strategy in [LoopStrategy::ExhaustiveDfs, LoopStrategy::Tarjan] {
        let mut analyzer = DependencyAnalyzer::new(&fixture.doc);
        assert_eq!(analyzer.detect_loops(strategy), GraphState::HasLoops);
        assert_eq!(analyzer.cyclic_parameters(false), expected);
        assert_eq!(analyzer.cyclic_parameters(true), expected);
    }
}

#[test]
fn execution_refuses_loops_without_side_effects() {
    let mut fixture = looped();
    let sum = Arc::new(sum());
    let copy = Arc::new(copy());
    let mut functions = FunctionRegistry::new();
    functions.register(sum.clone()).unwrap();
    functions.register(copy.clone()).unwrap();
    let engine = ExecutionEngine::new(Arc::new(functions));
    let undos = fixture.doc.nb_undos();

    let err = engine
        .execute_all(&mut fixture.doc, &ExecuteOptions::default())
        .unwrap_err();
    match err {
        ExecError::Cycle { parameters } => {
            assert_eq!(parameters, vec![fixture.p1, fixture.p2, fixture.p3]);
        }
        other => panic!("expected a cycle error, got {other}"),
    }

    assert_eq!(sum.calls() + copy.calls(), 0);
    assert_eq!(real(&fixture.doc, fixture.p2), 2.0);
    assert_eq!(real(&fixture.doc, fixture.p3), 3.0);
    assert_eq!(fixture.doc.nb_undos(), undos);
    assert!(!fixture.doc.has_open_command());
}

#[test]
fn breaking_the_loop_invalidates_cached_analysis() {
    let mut fixture = looped();
    let engine = ExecutionEngine::new(Arc::new(FunctionRegistry::new()));

    let (state, _) = engine
        .analyze(&fixture.doc, LoopStrategy::Tarjan)
        .unwrap();
    assert_eq!(state, GraphState::HasLoops);

    edit(&mut fixture.doc, |doc| {
        doc.disconnect_tree_function(fixture.f2.compute).unwrap()
    });
    let (state, cyclic) = engine
        .analyze(&fixture.doc, LoopStrategy::Tarjan)
        .unwrap();
    assert_eq!(state, GraphState::Ok);
    assert!(cyclic.is_empty());
}

#[test]
fn empty_document_has_no_graph() {
    let mut doc = Document::new(registry()).unwrap();
    cell(&mut doc, 1.0);

    let mut analyzer = DependencyAnalyzer::new(&doc);
    assert_eq!(analyzer.detect_loops(LoopStrategy::ExhaustiveDfs), GraphState::NoGraph);

    let engine = ExecutionEngine::new(Arc::new(FunctionRegistry::new()));
    let report = engine
        .execute_all(&mut doc, &ExecuteOptions::default())
        .unwrap();
    assert!(report.vertices.is_empty());
}

#[test]
fn dangling_reference_is_reported() {
    let mut doc = Document::new(registry()).unwrap();
    let target = cell(&mut doc, 0.0);
    let missing: Entry = "0:2:1:99:1".parse().unwrap();
    let output = doc.entry(target.value).unwrap();
    edit(&mut doc, |doc| {
        doc.connect_tree_function(
            target.compute,
            TreeFunctionBinding::new("copy")
                .with_inputs([missing])
                .with_outputs([output]),
        )
        .unwrap()
    });

    let analyzer = DependencyAnalyzer::new(&doc);
    assert_eq!(analyzer.state(), GraphState::NoGraph);

    let engine = ExecutionEngine::new(Arc::new(FunctionRegistry::new()));
    let err = engine
        .execute_all(&mut doc, &ExecuteOptions::default())
        .unwrap_err();
    assert!(matches!(err, ExecError::Graph(_)));
}
