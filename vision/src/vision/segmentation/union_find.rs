/// Disjoint sets over the indices `0..n`, with path compression and union by rank.
#[derive(Debug, Clone)]
pub struct UnionFind {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl UnionFind {
    pub fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            rank: vec![0; n],
        }
    }

    pub fn len(&self) -> usize {
        self.parent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parent.is_empty()
    }

    /// Returns the root of the set containing `x` and points every node on the way directly at it.
    pub fn find(&mut self, x: usize) -> usize {
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }

        // Second walk does the compression, no recursion so large frames can't overflow the stack
        let mut current = x;
        while self.parent[current] != root {
            let next = self.parent[current];
            self.parent[current] = root;
            current = next;
        }

        root
    }

    /// Merges the sets of `a` and `b` and returns the root of the merged set.
    pub fn union(&mut self, a: usize, b: usize) -> usize {
        let root_a = self.find(a);
        let root_b = self.find(b);
        if root_a == root_b {
            return root_a;
        }

        if self.rank[root_a] < self.rank[root_b] {
            self.parent[root_a] = root_b;
            root_b
        } else if self.rank[root_a] > self.rank[root_b] {
            self.parent[root_b] = root_a;
            root_a
        } else {
            self.parent[root_b] = root_a;
            self.rank[root_a] += 1;
            root_a
        }
    }
}
