//! Rank assignment and crossing minimization over an index graph.
//!
//! Nodes are addressed by their position in the component's insertion-order
//! id list; edges are `(from, to)` index pairs. Everything here is
//! deterministic for a fixed insertion order, which is what makes layout
//! results diffable between successive computations.

use std::collections::VecDeque;

/// Marks cycle edges. A depth-first search runs from every root (no incoming
/// edges) in index order, then from any node left unvisited (isolated
/// cycles); an edge into a node currently on the DFS path is a back edge.
pub(super) fn find_back_edges(node_count: usize, edges: &[(usize, usize)]) -> Vec<bool> {
    let mut adjacency: Vec<Vec<(usize, usize)>> = vec![Vec::new(); node_count];
    let mut indegree = vec![0usize; node_count];
    for (edge_idx, &(from, to)) in edges.iter().enumerate() {
        adjacency[from].push((edge_idx, to));
        indegree[to] += 1;
    }

    let mut back = vec![false; edges.len()];
    // 0 = unvisited, 1 = on the current path, 2 = finished
    let mut state = vec![0u8; node_count];

    let roots = (0..node_count).filter(|&n| indegree[n] == 0);
    let rest = 0..node_count;
    for start in roots.chain(rest) {
        if state[start] != 0 {
            continue;
        }
        state[start] = 1;
        let mut stack: Vec<(usize, usize)> = vec![(start, 0)];
        while let Some((node, child)) = stack.pop() {
            if child < adjacency[node].len() {
                let (edge_idx, next) = adjacency[node][child];
                stack.push((node, child + 1));
                match state[next] {
                    0 => {
                        state[next] = 1;
                        stack.push((next, 0));
                    }
                    1 => back[edge_idx] = true,
                    _ => {}
                }
            } else {
                state[node] = 2;
            }
        }
    }
    back
}

/// Longest-path ranking over a DAG (back edges already excluded). Sources
/// sit at rank 0; every edge spans at least one rank forward.
pub(super) fn assign_ranks(node_count: usize, forward_edges: &[(usize, usize)]) -> Vec<usize> {
    let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); node_count];
    let mut indegree = vec![0usize; node_count];
    for &(from, to) in forward_edges {
        adjacency[from].push(to);
        indegree[to] += 1;
    }

    let mut ranks = vec![0usize; node_count];
    let mut queue: VecDeque<usize> = (0..node_count).filter(|&n| indegree[n] == 0).collect();
    while let Some(node) = queue.pop_front() {
        for &next in &adjacency[node] {
            ranks[next] = ranks[next].max(ranks[node] + 1);
            indegree[next] -= 1;
            if indegree[next] == 0 {
                queue.push_back(next);
            }
        }
    }
    ranks
}

/// Buckets nodes by rank and reorders each bucket to reduce crossings using
/// the median heuristic: alternating downward sweeps (sort by median
/// position of incoming neighbors) and upward sweeps (outgoing neighbors).
/// Ties keep the current order, so the result is stable across runs.
pub(super) fn order_ranks(
    ranks: &[usize],
    forward_edges: &[(usize, usize)],
    passes: usize,
) -> Vec<Vec<usize>> {
    let node_count = ranks.len();
    let max_rank = ranks.iter().copied().max().unwrap_or(0);
    let mut buckets: Vec<Vec<usize>> = vec![Vec::new(); max_rank + 1];
    for (node, &rank) in ranks.iter().enumerate() {
        buckets[rank].push(node);
    }
    if buckets.len() <= 1 {
        return buckets;
    }

    let mut incoming: Vec<Vec<usize>> = vec![Vec::new(); node_count];
    let mut outgoing: Vec<Vec<usize>> = vec![Vec::new(); node_count];
    for &(from, to) in forward_edges {
        outgoing[from].push(to);
        incoming[to].push(from);
    }

    let mut positions = vec![0usize; node_count];
    let refresh = |buckets: &[Vec<usize>], positions: &mut Vec<usize>| {
        for bucket in buckets {
            for (idx, &node) in bucket.iter().enumerate() {
                positions[node] = idx;
            }
        }
    };
    refresh(&buckets, &mut positions);

    let sort_bucket = |bucket: &mut Vec<usize>, neighbors: &[Vec<usize>], positions: &[usize]| {
        let keys: Vec<(usize, f32)> = bucket
            .iter()
            .enumerate()
            .map(|(idx, &node)| {
                let values: Vec<f32> = neighbors[node]
                    .iter()
                    .map(|&n| positions[n] as f32)
                    .collect();
                let key = if values.is_empty() {
                    idx as f32
                } else {
                    median(values)
                };
                (node, key)
            })
            .collect();
        let mut indexed: Vec<(f32, usize)> = keys.iter().map(|&(node, key)| (key, node)).collect();
        indexed.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        *bucket = indexed.into_iter().map(|(_, node)| node).collect();
    };

    for _ in 0..passes.max(1) {
        for rank in 1..buckets.len() {
            if buckets[rank].len() > 1 {
                sort_bucket(&mut buckets[rank], &incoming, &positions);
                refresh(&buckets, &mut positions);
            }
        }
        for rank in (0..buckets.len().saturating_sub(1)).rev() {
            if buckets[rank].len() > 1 {
                sort_bucket(&mut buckets[rank], &outgoing, &positions);
                refresh(&buckets, &mut positions);
            }
        }
    }
    buckets
}

fn median(mut values: Vec<f32>) -> f32 {
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        values[mid]
    } else {
        (values[mid - 1] + values[mid]) * 0.5
    }
}
