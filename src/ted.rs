//! Zhang–Shasha ordered tree edit distance with unit costs.
//!
//! Both trees are flattened into post-order arrays (1-based, slot 0 unused)
//! and the distance is filled into DP tables; nothing here recurses.

use crate::ast::SyntaxNode;

const DELETE: usize = 1;
const INSERT: usize = 1;
const RELABEL: usize = 1;

struct PostOrder {
    labels: Vec<String>,
    /// Post-order index of each node's leftmost leaf descendant.
    leftmost: Vec<usize>,
}

impl PostOrder {
    fn new(root: &SyntaxNode) -> Self {
        let mut labels = vec![String::new()];
        let mut leftmost = vec![0];
        // (node, next child to visit, leftmost leaf seen under it)
        let mut stack: Vec<(&SyntaxNode, usize, Option<usize>)> = vec![(root, 0, None)];

        while let Some(&(node, next, first_leaf)) = stack.last() {
            if let Some(child) = node.children.get(next) {
                if let Some(top) = stack.last_mut() {
                    top.1 += 1;
                }
                stack.push((child, 0, None));
                continue;
            }
            stack.pop();
            labels.push(node.label());
            let index = labels.len() - 1;
            let leaf = first_leaf.unwrap_or(index);
            leftmost.push(leaf);
            if let Some(parent) = stack.last_mut() {
                parent.2.get_or_insert(leaf);
            }
        }

        PostOrder { labels, leftmost }
    }

    fn len(&self) -> usize {
        self.labels.len() - 1
    }

    /// Nodes with no ancestor sharing their leftmost leaf, ascending.
    fn keyroots(&self) -> Vec<usize> {
        let mut seen = vec![false; self.len() + 1];
        let mut roots = Vec::new();
        for i in (1..=self.len()).rev() {
            let l = self.leftmost[i];
            if !seen[l] {
                seen[l] = true;
                roots.push(i);
            }
        }
        roots.reverse();
        roots
    }
}

/// Minimum number of node inserts, deletes and relabels turning `a` into `b`.
/// Labels are node kind plus leaf text.
pub fn distance(a: &SyntaxNode, b: &SyntaxNode) -> usize {
    let t1 = PostOrder::new(a);
    let t2 = PostOrder::new(b);
    let (n1, n2) = (t1.len(), t2.len());
    let mut tree = vec![vec![0usize; n2 + 1]; n1 + 1];

    let roots2 = t2.keyroots();
    for &i in &t1.keyroots() {
        for &j in &roots2 {
            forest_distance(&t1, &t2, i, j, &mut tree);
        }
    }
    tree[n1][n2]
}

fn forest_distance(t1: &PostOrder, t2: &PostOrder, i: usize, j: usize, tree: &mut [Vec<usize>]) {
    let li = t1.leftmost[i];
    let lj = t2.leftmost[j];
    let rows = i - li + 2;
    let cols = j - lj + 2;
    let mut forest = vec![vec![0usize; cols]; rows];

    for x in 1..rows {
        forest[x][0] = forest[x - 1][0] + DELETE;
    }
    for y in 1..cols {
        forest[0][y] = forest[0][y - 1] + INSERT;
    }

    for x in 1..rows {
        let i1 = li + x - 1;
        for y in 1..cols {
            let j1 = lj + y - 1;
            let delete = forest[x - 1][y] + DELETE;
            let insert = forest[x][y - 1] + INSERT;

            if t1.leftmost[i1] == li && t2.leftmost[j1] == lj {
                let relabel = if t1.labels[i1] == t2.labels[j1] { 0 } else { RELABEL };
                let best = delete.min(insert).min(forest[x - 1][y - 1] + relabel);
                forest[x][y] = best;
                tree[i1][j1] = best;
            } else {
                let px = t1.leftmost[i1] - li;
                let py = t2.leftmost[j1] - lj;
                forest[x][y] = delete.min(insert).min(forest[px][py] + tree[i1][j1]);
            }
        }
    }
}
