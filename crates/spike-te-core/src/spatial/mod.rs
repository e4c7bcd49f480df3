//! Exact nearest-neighbour and range search over grouped vectors.
//!
//! A point is the concatenation of several *groups* of coordinates (for
//! example source history, destination history, time to next spike). Each
//! group yields its own sub-distance under a [`NormKind`]; joint distances
//! combine the groups with the max norm. Range queries take one radius per
//! group and match a point only when every group is inside its radius.
//!
//! - [`PointSet`]: flat row-major storage with group layout.
//! - [`GroupedKdTree`]: immutable k-d tree answering k-NN and range queries.
//! - [`UnivariateSearcher`]: sorted 1-D counter for the zero-history case.

mod kdtree;
mod univariate;

pub use kdtree::GroupedKdTree;
pub use univariate::UnivariateSearcher;

use crate::error::{Result, TeError};

/// Norm applied inside one group of coordinates.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NormKind {
    /// Largest absolute coordinate difference.
    #[default]
    MaxNorm,
    /// Square root of the summed squared differences.
    Euclidean,
}

impl NormKind {
    /// Distance between two equally sized coordinate slices.
    #[must_use]
    pub fn distance(self, a: &[f64], b: &[f64]) -> f64 {
        match self {
            Self::MaxNorm => a
                .iter()
                .zip(b)
                .map(|(x, y)| (x - y).abs())
                .fold(0.0, f64::max),
            Self::Euclidean => {
                if a.len() == 1 {
                    return (a[0] - b[0]).abs();
                }
                a.iter()
                    .zip(b)
                    .map(|(x, y)| (x - y) * (x - y))
                    .sum::<f64>()
                    .sqrt()
            }
        }
    }
}

/// One k-NN result.
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbour {
    /// Index of the neighbour in insertion order.
    pub index: usize,
    /// Joint (max over groups) distance to the query.
    pub distance: f64,
    /// Per-group distances to the query.
    pub norms: Vec<f64>,
}

/// Row-major point storage with a fixed group layout.
#[derive(Debug, Clone, PartialEq)]
pub struct PointSet {
    group_dims: Vec<usize>,
    group_offsets: Vec<usize>,
    dims: usize,
    len: usize,
    coords: Vec<f64>,
}

impl PointSet {
    #[must_use]
    pub fn new(group_dims: &[usize]) -> Self {
        Self::with_capacity(group_dims, 0)
    }

    #[must_use]
    pub fn with_capacity(group_dims: &[usize], capacity: usize) -> Self {
        let mut group_offsets = Vec::with_capacity(group_dims.len());
        let mut dims = 0;
        for &d in group_dims {
            group_offsets.push(dims);
            dims += d;
        }
        Self {
            group_dims: group_dims.to_vec(),
            group_offsets,
            dims,
            len: 0,
            coords: Vec::with_capacity(capacity * dims),
        }
    }

    /// Append a point given as one slice per group. Returns its index.
    pub fn push(&mut self, groups: &[&[f64]]) -> Result<usize> {
        self.check_groups(groups)?;
        for g in groups {
            self.coords.extend_from_slice(g);
        }
        self.len += 1;
        Ok(self.len - 1)
    }

    /// Flatten a query given as one slice per group.
    pub fn flatten_query(&self, groups: &[&[f64]]) -> Result<Vec<f64>> {
        self.check_groups(groups)?;
        Ok(groups.iter().flat_map(|g| g.iter().copied()).collect())
    }

    fn check_groups(&self, groups: &[&[f64]]) -> Result<()> {
        if groups.len() != self.group_dims.len() {
            return Err(TeError::GroupMismatch {
                expected: self.group_dims.len(),
                actual: groups.len(),
            });
        }
        for (g, &d) in groups.iter().zip(&self.group_dims) {
            if g.len() != d {
                return Err(TeError::GroupMismatch {
                    expected: d,
                    actual: g.len(),
                });
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Total dimension across all groups.
    #[must_use]
    pub fn dims(&self) -> usize {
        self.dims
    }

    #[must_use]
    pub fn group_dims(&self) -> &[usize] {
        &self.group_dims
    }

    #[must_use]
    pub fn group_count(&self) -> usize {
        self.group_dims.len()
    }

    /// All coordinates of point `i`.
    #[must_use]
    pub fn point(&self, i: usize) -> &[f64] {
        &self.coords[i * self.dims..(i + 1) * self.dims]
    }

    /// Group `g` of a flat point.
    #[must_use]
    pub fn group_of<'a>(&self, point: &'a [f64], g: usize) -> &'a [f64] {
        let start = self.group_offsets[g];
        &point[start..start + self.group_dims[g]]
    }

    /// Which group a flat coordinate belongs to.
    #[must_use]
    pub(crate) fn group_of_axis(&self, axis: usize) -> usize {
        // Offsets are non-decreasing; zero-width groups share an offset with
        // their successor, so take the last group starting at or before axis.
        self.group_offsets
            .iter()
            .zip(&self.group_dims)
            .rposition(|(&off, &d)| off <= axis && d > 0)
            .unwrap_or(0)
    }

    /// Per-group distances between a flat query and point `i`.
    pub(crate) fn group_norms_into(
        &self,
        norm: NormKind,
        query: &[f64],
        i: usize,
        out: &mut Vec<f64>,
    ) {
        out.clear();
        let p = self.point(i);
        for g in 0..self.group_dims.len() {
            out.push(norm.distance(self.group_of(query, g), self.group_of(p, g)));
        }
    }
}
