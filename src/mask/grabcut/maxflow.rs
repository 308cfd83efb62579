//! Dinic max-flow / min-cut over a pixel graph with two terminals.

use std::collections::VecDeque;

const EPS: f64 = 1e-9;
const UNREACHED: usize = usize::MAX;

pub(super) struct FlowGraph {
    adjacency: Vec<Vec<usize>>,
    to: Vec<usize>,
    capacity: Vec<f64>,
    source: usize,
    sink: usize,
    level: Vec<usize>,
    cursor: Vec<usize>,
}

impl FlowGraph {
    /// Graph with `nodes` pixel nodes plus the two terminals.
    pub fn new(nodes: usize) -> Self {
        let total = nodes + 2;
        Self {
            adjacency: vec![Vec::new(); total],
            to: Vec::new(),
            capacity: Vec::new(),
            source: nodes,
            sink: nodes + 1,
            level: vec![UNREACHED; total],
            cursor: vec![0; total],
        }
    }

    fn push_pair(&mut self, a: usize, b: usize, forward: f64, backward: f64) {
        let e = self.to.len();
        self.to.push(b);
        self.capacity.push(forward);
        self.to.push(a);
        self.capacity.push(backward);
        self.adjacency[a].push(e);
        self.adjacency[b].push(e + 1);
    }

    /// Link between two pixel nodes with a capacity in each direction.
    pub fn add_edge(&mut self, a: usize, b: usize, ab: f64, ba: f64) {
        if ab <= 0.0 && ba <= 0.0 {
            return;
        }
        self.push_pair(a, b, ab.max(0.0), ba.max(0.0));
    }

    /// Terminal links of `node`.
    ///
    /// Only the difference between the two weights affects the cut, so the
    /// smaller one is subtracted from both; negative weights are allowed.
    pub fn add_terminal_weights(&mut self, node: usize, from_source: f64, to_sink: f64) {
        let shared = from_source.min(to_sink);
        let (src, snk) = (from_source - shared, to_sink - shared);
        if src > 0.0 {
            self.push_pair(self.source, node, src, 0.0);
        }
        if snk > 0.0 {
            self.push_pair(node, self.sink, snk, 0.0);
        }
    }

    fn build_levels(&mut self) -> bool {
        self.level.fill(UNREACHED);
        self.level[self.source] = 0;
        let mut queue = VecDeque::from([self.source]);
        while let Some(u) = queue.pop_front() {
            for &e in &self.adjacency[u] {
                let v = self.to[e];
                if self.capacity[e] > EPS && self.level[v] == UNREACHED {
                    self.level[v] = self.level[u] + 1;
                    queue.push_back(v);
                }
            }
        }
        self.level[self.sink] != UNREACHED
    }

    fn blocking_flow(&mut self) -> f64 {
        self.cursor.fill(0);
        let mut total = 0.0;
        let mut path: Vec<usize> = Vec::new();
        let mut u = self.source;

        loop {
            if u == self.sink {
                let pushed = path
                    .iter()
                    .map(|&e| self.capacity[e])
                    .fold(f64::INFINITY, f64::min);
                for &e in &path {
                    self.capacity[e] -= pushed;
                    self.capacity[e ^ 1] += pushed;
                }
                total += pushed;
                let keep = path
                    .iter()
                    .position(|&e| self.capacity[e] <= EPS)
                    .unwrap_or(0);
                path.truncate(keep);
                u = match path.last() {
                    Some(&e) => self.to[e],
                    None => self.source,
                };
                continue;
            }

            let mut advanced = false;
            while self.cursor[u] < self.adjacency[u].len() {
                let e = self.adjacency[u][self.cursor[u]];
                let v = self.to[e];
                if self.capacity[e] > EPS
                    && self.level[v] != UNREACHED
                    && self.level[v] == self.level[u] + 1
                {
                    path.push(e);
                    u = v;
                    advanced = true;
                    break;
                }
                self.cursor[u] += 1;
            }

            if !advanced {
                // dead end: drop u from the level graph and back off one edge
                self.level[u] = UNREACHED;
                let Some(e) = path.pop() else {
                    break;
                };
                u = self.to[e ^ 1];
                self.cursor[u] += 1;
            }
        }
        total
    }

    /// Saturate the graph; returns the total flow (the min-cut cost).
    pub fn max_flow(&mut self) -> f64 {
        let _span = tracing::debug_span!("maxflow", nodes = self.adjacency.len()).entered();
        let mut flow = 0.0;
        while self.build_levels() {
            flow += self.blocking_flow();
        }
        flow
    }

    /// Nodes still reachable from the source in the residual graph.
    ///
    /// Call after [`FlowGraph::max_flow`].
    pub fn source_side(&self) -> Vec<bool> {
        let mut seen = vec![false; self.adjacency.len()];
        seen[self.source] = true;
        let mut queue = VecDeque::from([self.source]);
        while let Some(u) = queue.pop_front() {
            for &e in &self.adjacency[u] {
                let v = self.to[e];
                if self.capacity[e] > EPS && !seen[v] {
                    seen[v] = true;
                    queue.push_back(v);
                }
            }
        }
        seen.truncate(self.source);
        seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn textbook_network() {
        // s -> 0 (3), s -> 1 (2), 0 -> 1 (1), 0 -> t (2), 1 -> t (3)
        let mut g = FlowGraph::new(2);
        g.add_terminal_weights(0, 3.0, 2.0);
        g.add_terminal_weights(1, 2.0, 3.0);
        g.add_edge(0, 1, 1.0, 0.0);
        // terminal weights reduce to s->0 (1) and 1->t (1)
        let flow = g.max_flow();
        assert!((flow - 1.0).abs() < 1e-9);
    }

    #[test]
    fn cut_separates_strong_terminal_preferences() {
        let mut g = FlowGraph::new(3);
        g.add_terminal_weights(0, 10.0, 0.0);
        g.add_terminal_weights(1, 0.0, 10.0);
        g.add_terminal_weights(2, 10.0, 0.0);
        g.add_edge(0, 1, 1.0, 1.0);
        g.add_edge(1, 2, 1.0, 1.0);
        let flow = g.max_flow();
        assert!((flow - 2.0).abs() < 1e-9);
        assert_eq!(g.source_side(), vec![true, false, true]);
    }

    #[test]
    fn strong_smoothness_keeps_chain_together() {
        let mut g = FlowGraph::new(3);
        g.add_terminal_weights(0, 5.0, 0.0);
        g.add_terminal_weights(1, 0.0, 1.0);
        g.add_terminal_weights(2, 5.0, 0.0);
        g.add_edge(0, 1, 100.0, 100.0);
        g.add_edge(1, 2, 100.0, 100.0);
        let flow = g.max_flow();
        assert!((flow - 1.0).abs() < 1e-9);
        assert!(g.source_side().iter().all(|&s| s));
    }

    #[test]
    fn negative_terminal_weights_are_shifted() {
        let mut g = FlowGraph::new(1);
        g.add_terminal_weights(0, -3.0, -1.0);
        g.max_flow();
        assert_eq!(g.source_side(), vec![false]);
    }
}
