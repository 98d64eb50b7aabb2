//! Dependency graph over Tree-Function invocations.
//!
//! Each vertex is one bound `TreeFunction` Parameter. An edge `u -> v`
//! exists when some output of `u` is an input of `v`; the edge weight is
//! the first Parameter found to link them. Self loops are kept since they
//! are cycles.

use std::collections::HashMap;
use std::fmt;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};

use actdata_core::{Document, Entry, ParameterId, TreeFunctionBinding};

use crate::error::GraphError;

/// Vertex identity: the label index of the Tree-Function Parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VertexId(pub u32);

impl fmt::Display for VertexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<ParameterId> for VertexId {
    fn from(id: ParameterId) -> Self {
        VertexId(id.0)
    }
}

/// Traversal direction along dependency edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    /// Follow edges from producer to consumer.
    #[default]
    Successors,
    /// Follow edges from consumer back to producer.
    Predecessors,
}

impl Direction {
    pub fn reverse(self) -> Self {
        match self {
            Direction::Successors => Direction::Predecessors,
            Direction::Predecessors => Direction::Successors,
        }
    }

    fn petgraph(self) -> petgraph::Direction {
        match self {
            Direction::Successors => petgraph::Direction::Outgoing,
            Direction::Predecessors => petgraph::Direction::Incoming,
        }
    }
}

/// A Tree-Function invocation with its references resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct Vertex {
    pub id: VertexId,
    pub parameter: ParameterId,
    pub binding: TreeFunctionBinding,
    pub inputs: Vec<ParameterId>,
    pub outputs: Vec<ParameterId>,
}

#[derive(Debug, Clone)]
pub struct DependencyGraph {
    graph: DiGraph<VertexId, ParameterId>,
    indices: HashMap<VertexId, NodeIndex>,
    vertices: Vec<Vertex>,
    revision: u64,
}

impl DependencyGraph {
    /// Builds the graph from every bound Tree Function in `doc`.
    pub fn build(doc: &Document) -> Result<Self, GraphError> {
        let mut vertices = Vec::new();
        for (parameter, binding) in doc.tree_functions() {
            let inputs = resolve_all(doc, parameter, &binding.inputs)?;
            let outputs = resolve_all(doc, parameter, &binding.outputs)?;
            vertices.push(Vertex {
                id: VertexId::from(parameter),
                parameter,
                binding,
                inputs,
                outputs,
            });
        }
        let graph = Self::from_vertices(vertices, doc.bindings_revision());
        tracing::debug!(
            vertices = graph.len(),
            edges = graph.edge_count(),
            revision = graph.revision,
            "built dependency graph"
        );
        Ok(graph)
    }

    /// Builds the graph from already resolved vertices.
    pub fn from_vertices(vertices: Vec<Vertex>, revision: u64) -> Self {
        let mut graph = DiGraph::with_capacity(vertices.len(), vertices.len());
        let mut indices = HashMap::new();
        let mut producers: HashMap<ParameterId, Vec<NodeIndex>> = HashMap::new();

        for vertex in &vertices {
            let index = graph.add_node(vertex.id);
            indices.insert(vertex.id, index);
            for output in &vertex.outputs {
                producers.entry(*output).or_default().push(index);
            }
        }

        for vertex in &vertices {
            let consumer = indices[&vertex.id];
            for input in &vertex.inputs {
                let Some(sources) = producers.get(input) else {
                    continue;
                };
                for &producer in sources {
                    if graph.find_edge(producer, consumer).is_none() {
                        graph.add_edge(producer, consumer, *input);
                    }
                }
            }
        }

        Self {
            graph,
            indices,
            vertices,
            revision,
        }
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// The document bindings revision this graph was built from.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn contains(&self, id: VertexId) -> bool {
        self.indices.contains_key(&id)
    }

    pub fn vertex(&self, id: VertexId) -> Option<&Vertex> {
        self.indices.get(&id).map(|index| &self.vertices[index.index()])
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    /// Neighbours of `id` in `direction`, sorted and without duplicates.
    pub fn neighbors(&self, id: VertexId, direction: Direction) -> Vec<VertexId> {
        let Some(&index) = self.indices.get(&id) else {
            return Vec::new();
        };
        let mut found: Vec<VertexId> = self
            .graph
            .neighbors_directed(index, direction.petgraph())
            .map(|n| self.graph[n])
            .collect();
        found.sort();
        found.dedup();
        found
    }

    pub fn successors(&self, id: VertexId) -> Vec<VertexId> {
        self.neighbors(id, Direction::Successors)
    }

    pub fn predecessors(&self, id: VertexId) -> Vec<VertexId> {
        self.neighbors(id, Direction::Predecessors)
    }

    /// Vertices with no incoming edge, in id order.
    pub fn roots(&self) -> Vec<VertexId> {
        let mut roots: Vec<VertexId> = self
            .graph
            .node_indices()
            .filter(|&index| {
                self.graph
                    .neighbors_directed(index, petgraph::Direction::Incoming)
                    .next()
                    .is_none()
            })
            .map(|index| self.graph[index])
            .collect();
        roots.sort();
        roots
    }

    /// Every edge as `(producer, consumer, linking parameter)`.
    pub fn edges(&self) -> Vec<(VertexId, VertexId, ParameterId)> {
        let mut edges: Vec<_> = self
            .graph
            .edge_references()
            .map(|edge| (self.graph[edge.source()], self.graph[edge.target()], *edge.weight()))
            .collect();
        edges.sort();
        edges
    }

    pub fn has_self_loop(&self, id: VertexId) -> bool {
        self.indices
            .get(&id)
            .is_some_and(|&index| self.graph.contains_edge(index, index))
    }

    pub(crate) fn inner(&self) -> &DiGraph<VertexId, ParameterId> {
        &self.graph
    }
}

fn resolve_all(
    doc: &Document,
    function: ParameterId,
    entries: &[Entry],
) -> Result<Vec<ParameterId>, GraphError> {
    entries
        .iter()
        .map(|entry| {
            doc.resolve(entry).ok_or_else(|| GraphError::DanglingReference {
                function,
                entry: entry.clone(),
            })
        })
        .collect()
}
