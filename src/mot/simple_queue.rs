use std::cmp::Ordering;

// Score of binding one observation (row) to one track (column) for priority queue ordering.
// Ordering is reversed so that `BinaryHeap` pops the smallest score first. Equal scores
// pop in row-major order (lowest row, then lowest column).
#[derive(Debug, Clone, Copy)]
pub struct ScoredPair {
    pub score: f64,
    pub row: usize,
    pub col: usize,
}

impl PartialEq for ScoredPair {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ScoredPair {}

impl PartialOrd for ScoredPair {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScoredPair {
    fn cmp(&self, other: &Self) -> Ordering {
        // self.score < other.score means self has higher priority
        other
            .score
            .total_cmp(&self.score)
            .then_with(|| other.row.cmp(&self.row))
            .then_with(|| other.col.cmp(&self.col))
    }
}

#[cfg(test)]
mod tests {
    use super::ScoredPair;
    use std::collections::BinaryHeap;

    #[test]
    fn test_min_heap() {
        let mut priority_queue: BinaryHeap<ScoredPair> = BinaryHeap::new();
        for (score, row, col) in [(4.0, 0, 0), (2.0, 1, 0), (3.0, 0, 1), (1.0, 1, 1)] {
            priority_queue.push(ScoredPair { score, row, col });
        }
        assert_eq!(priority_queue.pop().unwrap().score, 1.0);
        assert_eq!(priority_queue.pop().unwrap().score, 2.0);
        assert_eq!(priority_queue.pop().unwrap().score, 3.0);
        assert_eq!(priority_queue.pop().unwrap().score, 4.0);
    }

    #[test]
    fn test_ties_pop_in_row_major_order() {
        let mut priority_queue: BinaryHeap<ScoredPair> = BinaryHeap::new();
        for (row, col) in [(1, 1), (0, 1), (1, 0), (0, 0)] {
            priority_queue.push(ScoredPair { score: 0.5, row, col });
        }
        let order: Vec<(usize, usize)> = std::iter::from_fn(|| priority_queue.pop())
            .map(|p| (p.row, p.col))
            .collect();
        assert_eq!(order, vec![(0, 0), (0, 1), (1, 0), (1, 1)]);
    }
}
