//! Loop detection over the dependency graph.
//!
//! Two strategies classify a graph identically: the exhaustive search walks
//! every simple path from every vertex and reports each elementary cycle
//! once; Tarjan reports strongly connected components that contain a
//! cycle. The sets of cycle vertices agree, the cycle lists may not.

use std::collections::{BTreeSet, VecDeque};

use serde::{Deserialize, Serialize};

use actdata_core::{Document, ParameterId};

use crate::graph::{DependencyGraph, VertexId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GraphState {
    /// Loop detection has not run yet.
    Undefined,
    Ok,
    HasLoops,
    /// No vertices, or the graph could not be built.
    NoGraph,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LoopStrategy {
    #[default]
    ExhaustiveDfs,
    Tarjan,
}

#[derive(Debug, Clone)]
pub struct DependencyAnalyzer {
    graph: Option<DependencyGraph>,
    state: GraphState,
    cycles: Vec<Vec<VertexId>>,
}

impl DependencyAnalyzer {
    /// Builds the graph of `doc`. A graph that cannot be built leaves the
    /// analyzer in [`GraphState::NoGraph`].
    pub fn new(doc: &Document) -> Self {
        match DependencyGraph::build(doc) {
            Ok(graph) => Self::from_graph(graph),
            Err(err) => {
                tracing::warn!(error = %err, "dependency graph unavailable");
                Self {
                    graph: None,
                    state: GraphState::NoGraph,
                    cycles: Vec::new(),
                }
            }
        }
    }

    pub fn from_graph(graph: DependencyGraph) -> Self {
        let state = if graph.is_empty() {
            GraphState::NoGraph
        } else {
            GraphState::Undefined
        };
        Self {
            graph: Some(graph),
            state,
            cycles: Vec::new(),
        }
    }

    pub fn graph(&self) -> Option<&DependencyGraph> {
        self.graph.as_ref()
    }

    pub fn state(&self) -> GraphState {
        self.state
    }

    /// Runs loop detection and records the resulting state.
    pub fn detect_loops(&mut self, strategy: LoopStrategy) -> GraphState {
        let Some(graph) = self.graph.as_ref().filter(|g| !g.is_empty()) else {
            self.state = GraphState::NoGraph;
            self.cycles.clear();
            return self.state;
        };

        self.cycles = match strategy {
            LoopStrategy::ExhaustiveDfs => exhaustive_cycles(graph),
            LoopStrategy::Tarjan => tarjan_cycles(graph),
        };
        self.state = if self.cycles.is_empty() {
            GraphState::Ok
        } else {
            GraphState::HasLoops
        };
        tracing::debug!(
            ?strategy,
            state = ?self.state,
            cycles = self.cycles.len(),
            "loop detection finished"
        );
        self.state
    }

    /// Cycles found by the last detection, each as a vertex sequence.
    pub fn cycles(&self) -> &[Vec<VertexId>] {
        &self.cycles
    }

    pub fn cyclic_vertices(&self) -> BTreeSet<VertexId> {
        self.cycles.iter().flatten().copied().collect()
    }

    /// Inputs and outputs of every vertex on a cycle. With `enriched`, the
    /// vertices downstream of a cycle contribute theirs too.
    pub fn cyclic_parameters(&self, enriched: bool) -> BTreeSet<ParameterId> {
        let Some(graph) = self.graph.as_ref() else {
            return BTreeSet::new();
        };

        let mut vertices = self.cyclic_vertices();
        if enriched {
            let mut queue: VecDeque<VertexId> = vertices.iter().copied().collect();
            while let Some(current) = queue.pop_front() {
                for next in graph.successors(current) {
                    if vertices.insert(next) {
                        queue.push_back(next);
                    }
                }
            }
        }

        let mut parameters = BTreeSet::new();
        for id in vertices {
            if let Some(vertex) = graph.vertex(id) {
                parameters.extend(vertex.inputs.iter().copied());
                parameters.extend(vertex.outputs.iter().copied());
            }
        }
        parameters
    }
}

// ---- exhaustive search ----

fn exhaustive_cycles(graph: &DependencyGraph) -> Vec<Vec<VertexId>> {
    let mut found: BTreeSet<Vec<VertexId>> = BTreeSet::new();
    let mut path = Vec::new();
    for vertex in graph.vertices() {
        walk(graph, vertex.id, &mut path, &mut found);
    }
    found.into_iter().collect()
}

fn walk(
    graph: &DependencyGraph,
    current: VertexId,
    path: &mut Vec<VertexId>,
    found: &mut BTreeSet<Vec<VertexId>>,
) {
    path.push(current);
    for next in graph.successors(current) {
        match path.iter().position(|v| *v == next) {
            Some(start) => {
                found.insert(canonical(&path[start..]));
            }
            None => walk(graph, next, path, found),
        }
    }
    path.pop();
}

/// Rotates a cycle so it starts at its smallest vertex.
fn canonical(cycle: &[VertexId]) -> Vec<VertexId> {
    let start = cycle
        .iter()
        .enumerate()
        .min_by_key(|(_, v)| **v)
        .map_or(0, |(i, _)| i);
    cycle[start..].iter().chain(&cycle[..start]).copied().collect()
}

// ---- tarjan ----

fn tarjan_cycles(graph: &DependencyGraph) -> Vec<Vec<VertexId>> {
    let inner = graph.inner();
    let mut cycles: Vec<Vec<VertexId>> = petgraph::algo::tarjan_scc(inner)
        .into_iter()
        .filter(|component| {
            component.len() > 1 || inner.contains_edge(component[0], component[0])
        })
        .map(|component| {
            let mut vertices: Vec<VertexId> = component.iter().map(|&i| inner[i]).collect();
            vertices.sort();
            vertices
        })
        .collect();
    cycles.sort();
    cycles
}
