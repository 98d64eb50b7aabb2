//! Level-by-level traversal from a root vertex.
//!
//! The iterator visits the vertices reachable from the root in an order
//! where every vertex comes after all of its reachable neighbours on the
//! opposite side. The root sits at level 0; a vertex is one level deeper
//! than the neighbour whose visit released it. Vertices on a cycle other
//! than the root are never reached.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::graph::{DependencyGraph, Direction, VertexId};

pub struct LevelIterator<'g> {
    graph: &'g DependencyGraph,
    direction: Direction,
    root: VertexId,
    queue: VecDeque<(VertexId, usize)>,
    remaining: HashMap<VertexId, usize>,
    level: usize,
}

impl<'g> LevelIterator<'g> {
    /// An iterator over nothing when `root` is not in the graph.
    pub fn new(graph: &'g DependencyGraph, root: VertexId, direction: Direction) -> Self {
        let mut queue = VecDeque::new();
        let mut remaining = HashMap::new();

        if graph.contains(root) {
            let reachable = reachable_from(graph, root, direction);
            for &vertex in reachable.iter().filter(|v| **v != root) {
                let blockers = graph
                    .neighbors(vertex, direction.reverse())
                    .into_iter()
                    .filter(|n| reachable.contains(n))
                    .count();
                remaining.insert(vertex, blockers);
            }
            queue.push_back((root, 0));
        }

        Self {
            graph,
            direction,
            root,
            queue,
            remaining,
            level: 0,
        }
    }

    pub fn root(&self) -> VertexId {
        self.root
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Level of the vertex most recently returned by `next`.
    pub fn level(&self) -> usize {
        self.level
    }
}

impl Iterator for LevelIterator<'_> {
    type Item = VertexId;

    fn next(&mut self) -> Option<VertexId> {
        let (vertex, level) = self.queue.pop_front()?;
        self.level = level;

        for next in self.graph.neighbors(vertex, self.direction) {
            if next == self.root {
                continue;
            }
            if let Some(count) = self.remaining.get_mut(&next) {
                *count = count.saturating_sub(1);
                if *count == 0 {
                    self.remaining.remove(&next);
                    self.queue.push_back((next, level + 1));
                }
            }
        }
        Some(vertex)
    }
}

fn reachable_from(
    graph: &DependencyGraph,
    root: VertexId,
    direction: Direction,
) -> HashSet<VertexId> {
    let mut seen = HashSet::from([root]);
    let mut queue = VecDeque::from([root]);
    while let Some(current) = queue.pop_front() {
        for next in graph.neighbors(current, direction) {
            if seen.insert(next) {
                queue.push_back(next);
            }
        }
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::tests::vertex;
    use proptest::prelude::*;

    fn collect(it: &mut LevelIterator<'_>) -> Vec<(VertexId, usize)> {
        let mut out = Vec::new();
        while let Some(v) = it.next() {
            out.push((v, it.level()));
        }
        out
    }

    fn diamond() -> DependencyGraph {
        // 1 -> 2, 1 -> 3, 2 -> 4, 3 -> 4, 1 -> 4
        DependencyGraph::from_vertices(
            vec![
                vertex(1, &[], &[101]),
                vertex(2, &[101], &[102]),
                vertex(3, &[101], &[103]),
                vertex(4, &[101, 102, 103], &[104]),
            ],
            0,
        )
    }

    #[test]
    fn successors_by_level() {
        let graph = diamond();
        let mut it = LevelIterator::new(&graph, VertexId(1), Direction::Successors);
        assert_eq!(
            collect(&mut it),
            vec![
                (VertexId(1), 0),
                (VertexId(2), 1),
                (VertexId(3), 1),
                (VertexId(4), 2)
            ]
        );
    }

    #[test]
    fn predecessors_by_level() {
        let graph = diamond();
        let mut it = LevelIterator::new(&graph, VertexId(4), Direction::Predecessors);
        let order = collect(&mut it);
        assert_eq!(order.first(), Some(&(VertexId(4), 0)));
        assert_eq!(order.last(), Some(&(VertexId(1), 2)));
        assert_eq!(order.len(), 4);
    }

    #[test]
    fn subgraph_restricts_to_reachable() {
        let graph = diamond();
        let mut it = LevelIterator::new(&graph, VertexId(2), Direction::Successors);
        // 4 also depends on 1 and 3, which are not reachable from 2.
        assert_eq!(collect(&mut it), vec![(VertexId(2), 0), (VertexId(4), 1)]);
    }

    #[test]
    fn cycle_members_other_than_root_are_skipped() {
        // 1 -> 2 <-> 3 -> 4
        let graph = DependencyGraph::from_vertices(
            vec![
                vertex(1, &[], &[101]),
                vertex(2, &[101, 103], &[102]),
                vertex(3, &[102], &[103]),
                vertex(4, &[103], &[104]),
            ],
            0,
        );
        let order: Vec<VertexId> =
            LevelIterator::new(&graph, VertexId(1), Direction::Successors).collect();
        assert_eq!(order, vec![VertexId(1)]);

        // From inside the cycle the back edge into the root is ignored.
        let order: Vec<VertexId> =
            LevelIterator::new(&graph, VertexId(2), Direction::Successors).collect();
        assert_eq!(order, vec![VertexId(2), VertexId(3), VertexId(4)]);
    }

    #[test]
    fn missing_root_yields_nothing() {
        let graph = diamond();
        assert_eq!(
            LevelIterator::new(&graph, VertexId(42), Direction::Successors).count(),
            0
        );
    }

    fn acyclic_graph() -> impl Strategy<Value = DependencyGraph> {
        // Vertex i only reads outputs of vertices with a smaller index.
        (1usize..9).prop_flat_map(|n| {
            proptest::collection::vec(proptest::collection::vec(any::<u32>(), 0..3), n).prop_map(
                |reads| {
                    let vertices = reads
                        .into_iter()
                        .enumerate()
                        .map(|(i, picks)| {
                            let inputs: Vec<u32> = if i == 0 {
                                Vec::new()
                            } else {
                                picks.iter().map(|p| 100 + p % i as u32).collect()
                            };
                            vertex(i as u32, &inputs, &[100 + i as u32])
                        })
                        .collect();
                    DependencyGraph::from_vertices(vertices, 0)
                },
            )
        })
    }

    proptest! {
        #[test]
        fn every_vertex_follows_its_reachable_predecessors(graph in acyclic_graph()) {
            for root in graph.roots() {
                let mut it = LevelIterator::new(&graph, root, Direction::Successors);
                let mut position = HashMap::new();
                let mut levels = HashMap::new();
                while let Some(v) = it.next() {
                    position.insert(v, position.len());
                    levels.insert(v, it.level());
                }
                let reachable = reachable_from(&graph, root, Direction::Successors);
                prop_assert_eq!(position.len(), reachable.len());
                for (from, to, _) in graph.edges() {
                    if reachable.contains(&from) && reachable.contains(&to) {
                        prop_assert!(position[&from] < position[&to]);
                        prop_assert!(levels[&from] < levels[&to]);
                    }
                }
            }
        }
    }
}
