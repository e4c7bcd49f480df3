//! Multi-group k-d tree.
//!
//! Nodes live in a flat arena; leaves reference ranges of a permutation of
//! point indices. Splits are at the median of the widest coordinate. A
//! single coordinate difference is a lower bound on its group's distance
//! under either norm, so pruning on it is exact for both k-NN (against the
//! current k-th joint distance) and range search (against that group's
//! radius).

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use super::{Neighbour, NormKind, PointSet};
use crate::error::{Result, TeError};

/// Points per leaf before a split is attempted.
const LEAF_SIZE: usize = 12;

#[derive(Debug, Clone, Copy)]
enum Node {
    Leaf {
        start: usize,
        end: usize,
    },
    Split {
        axis: usize,
        value: f64,
        left: usize,
        right: usize,
    },
}

/// Immutable exact-search tree over a [`PointSet`].
#[derive(Debug, Clone)]
pub struct GroupedKdTree {
    points: PointSet,
    norm: NormKind,
    axis_group: Vec<usize>,
    order: Vec<usize>,
    nodes: Vec<Node>,
}

/// Max-heap entry ordered by (distance, index).
#[derive(Debug, Clone, Copy)]
struct Candidate {
    distance: f64,
    index: usize,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then(self.index.cmp(&other.index))
    }
}

impl GroupedKdTree {
    /// Build with the default max norm inside groups.
    #[must_use]
    pub fn build(points: PointSet) -> Self {
        Self::build_with_norm(points, NormKind::default())
    }

    #[must_use]
    pub fn build_with_norm(points: PointSet, norm: NormKind) -> Self {
        let axis_group = (0..points.dims()).map(|a| points.group_of_axis(a)).collect();
        let mut tree = Self {
            order: (0..points.len()).collect(),
            points,
            norm,
            axis_group,
            nodes: Vec::new(),
        };
        if !tree.order.is_empty() {
            let n = tree.order.len();
            tree.build_node(0, n);
        }
        tree
    }

    fn build_node(&mut self, start: usize, end: usize) -> usize {
        let slot = self.nodes.len();
        self.nodes.push(Node::Leaf { start, end });
        if end - start <= LEAF_SIZE {
            return slot;
        }
        let Some(axis) = self.widest_axis(start, end) else {
            // All coordinates identical across the range (or zero dims).
            return slot;
        };

        let mid = start + (end - start) / 2;
        let points = &self.points;
        self.order[start..end].select_nth_unstable_by(mid - start, |&a, &b| {
            points.point(a)[axis].total_cmp(&points.point(b)[axis])
        });
        let value = self.points.point(self.order[mid])[axis];

        let left = self.build_node(start, mid);
        let right = self.build_node(mid, end);
        self.nodes[slot] = Node::Split {
            axis,
            value,
            left,
            right,
        };
        slot
    }

    fn widest_axis(&self, start: usize, end: usize) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for axis in 0..self.points.dims() {
            let (lo, hi) = self.order[start..end]
                .iter()
                .map(|&i| self.points.point(i)[axis])
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                    (lo.min(v), hi.max(v))
                });
            let spread = hi - lo;
            if spread > 0.0 && best.is_none_or(|(_, s)| spread > s) {
                best = Some((axis, spread));
            }
        }
        best.map(|(axis, _)| axis)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    #[must_use]
    pub fn group_count(&self) -> usize {
        self.points.group_count()
    }

    #[must_use]
    pub fn norm(&self) -> NormKind {
        self.norm
    }

    #[must_use]
    pub fn points(&self) -> &PointSet {
        &self.points
    }

    /// Per-group distances between stored points `a` and `b`.
    #[must_use]
    pub fn group_norms(&self, a: usize, b: usize) -> Vec<f64> {
        let mut out = Vec::with_capacity(self.group_count());
        self.points
            .group_norms_into(self.norm, self.points.point(a), b, &mut out);
        out
    }

    /// The `k` nearest stored points to stored point `query_index`,
    /// excluding the point itself, sorted by `(distance, index)`.
    pub fn k_nearest(&self, k: usize, query_index: usize) -> Result<Vec<Neighbour>> {
        let available = self.len().saturating_sub(1);
        if k > available {
            return Err(TeError::InsufficientNeighbours {
                requested: k,
                available,
            });
        }
        if k == 0 {
            return Ok(Vec::new());
        }
        let query = self.points.point(query_index);
        let mut heap = BinaryHeap::with_capacity(k + 1);
        let mut scratch = Vec::with_capacity(self.group_count());
        self.knn_node(0, query, query_index, k, &mut heap, &mut scratch);

        let mut found = heap.into_sorted_vec();
        found.truncate(k);
        Ok(found
            .into_iter()
            .map(|c| {
                let mut norms = Vec::with_capacity(self.group_count());
                self.points
                    .group_norms_into(self.norm, query, c.index, &mut norms);
                Neighbour {
                    index: c.index,
                    distance: c.distance,
                    norms,
                }
            })
            .collect())
    }

    fn knn_node(
        &self,
        node: usize,
        query: &[f64],
        exclude: usize,
        k: usize,
        heap: &mut BinaryHeap<Candidate>,
        scratch: &mut Vec<f64>,
    ) {
        match self.nodes[node] {
            Node::Leaf { start, end } => {
                for &i in &self.order[start..end] {
                    if i == exclude {
                        continue;
                    }
                    self.points.group_norms_into(self.norm, query, i, scratch);
                    let candidate = Candidate {
                        distance: scratch.iter().copied().fold(0.0, f64::max),
                        index: i,
                    };
                    if heap.len() < k {
                        heap.push(candidate);
                    } else if heap.peek().is_some_and(|worst| candidate < *worst) {
                        heap.pop();
                        heap.push(candidate);
                    }
                }
            }
            Node::Split {
                axis,
                value,
                left,
                right,
            } => {
                let diff = query[axis] - value;
                let (near, far) = if diff <= 0.0 {
                    (left, right)
                } else {
                    (right, left)
                };
                self.knn_node(near, query, exclude, k, heap, scratch);
                // Only prune strictly: equal-distance points with a lower
                // index may still displace the current worst candidate.
                let bound = diff.abs();
                let must_visit = heap.len() < k || heap.peek().is_some_and(|w| bound <= w.distance);
                if must_visit {
                    self.knn_node(far, query, exclude, k, heap, scratch);
                }
            }
        }
    }

    /// Stored points within every per-group radius of stored point
    /// `query_index`, in ascending index order.
    pub fn points_within_radii(
        &self,
        query_index: usize,
        radii: &[f64],
        exclude_self: bool,
    ) -> Result<Vec<usize>> {
        self.check_radii(radii)?;
        let query = self.points.point(query_index);
        let exclude = exclude_self.then_some(query_index);
        Ok(self.range_search(query, radii, exclude))
    }

    /// Stored points within every per-group radius of an external point
    /// given as one slice per group.
    pub fn points_within_radii_of(&self, query: &[&[f64]], radii: &[f64]) -> Result<Vec<usize>> {
        self.check_radii(radii)?;
        let flat = self.points.flatten_query(query)?;
        Ok(self.range_search(&flat, radii, None))
    }

    fn check_radii(&self, radii: &[f64]) -> Result<()> {
        if radii.len() != self.group_count() {
            return Err(TeError::GroupMismatch {
                expected: self.group_count(),
                actual: radii.len(),
            });
        }
        Ok(())
    }

    fn range_search(&self, query: &[f64], radii: &[f64], exclude: Option<usize>) -> Vec<usize> {
        let mut out = Vec::new();
        if self.nodes.is_empty() {
            return out;
        }
        let mut scratch = Vec::with_capacity(self.group_count());
        let mut stack = vec![0usize];
        while let Some(node) = stack.pop() {
            match self.nodes[node] {
                Node::Leaf { start, end } => {
                    for &i in &self.order[start..end] {
                        if exclude == Some(i) {
                            continue;
                        }
                        self.points.group_norms_into(self.norm, query, i, &mut scratch);
                        if scratch.iter().zip(radii).all(|(d, r)| d <= r) {
                            out.push(i);
                        }
                    }
                }
                Node::Split {
                    axis,
                    value,
                    left,
                    right,
                } => {
                    let r = radii[self.axis_group[axis]];
                    if query[axis] - value <= r {
                        stack.push(left);
                    }
                    if value - query[axis] <= r {
                        stack.push(right);
                    }
                }
            }
        }
        out.sort_unstable();
        out
    }
}
