//! Directed graphs given as `u-v` edge lists.

use crate::GraphError;
use shmring::Edge;

/// An edge list plus its vertex set.
///
/// Vertices are arbitrary `u32` ids; algorithms work on dense indices
/// (`0..vertex_count()`) obtained from [`Graph::index_pairs`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Graph {
    edges: Vec<Edge>,
    vertices: Vec<u32>,
    index_pairs: Vec<(usize, usize)>,
}

impl Graph {
    /// Builds a graph from edges. Duplicate edges are dropped, first
    /// occurrence wins.
    pub fn new(edges: impl IntoIterator<Item = Edge>) -> Result<Self, GraphError> {
        let mut unique: Vec<Edge> = Vec::new();
        for edge in edges {
            if edge.u == edge.v {
                return Err(GraphError::SelfLoop(edge.to_string()));
            }
            if !unique.contains(&edge) {
                unique.push(edge);
            }
        }
        if unique.is_empty() {
            return Err(GraphError::Empty);
        }

        let mut vertices: Vec<u32> = unique.iter().flat_map(|e| [e.u, e.v]).collect();
        vertices.sort_unstable();
        vertices.dedup();

        let index = |v: u32| vertices.binary_search(&v).unwrap_or_default();
        let index_pairs = unique.iter().map(|e| (index(e.u), index(e.v))).collect();

        Ok(Self {
            edges: unique,
            vertices,
            index_pairs,
        })
    }

    /// Parses command-line arguments like `0-1 1-2 2-0`.
    pub fn parse<I, S>(args: I) -> Result<Self, GraphError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let edges = args
            .into_iter()
            .map(|arg| parse_edge(arg.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(edges)
    }

    #[inline]
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Vertex ids in ascending order.
    #[inline]
    pub fn vertices(&self) -> &[u32] {
        &self.vertices
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Edges as dense `(from, to)` vertex indices, parallel to [`edges`](Self::edges).
    #[inline]
    pub fn index_pairs(&self) -> &[(usize, usize)] {
        &self.index_pairs
    }
}

/// Parses a single `u-v` edge.
pub fn parse_edge(arg: &str) -> Result<Edge, GraphError> {
    let malformed = || GraphError::Malformed(arg.to_string());
    let (u, v) = arg.split_once('-').ok_or_else(malformed)?;
    let vertex = |s: &str| {
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(malformed());
        }
        s.parse::<u32>().map_err(|_| malformed())
    };
    Ok(Edge::new(vertex(u)?, vertex(v)?))
}
