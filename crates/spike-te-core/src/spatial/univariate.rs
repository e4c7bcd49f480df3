//! Sorted 1-D counter used when the destination history has no intervals.
//!
//! Membership is decided on the difference `x - v` rather than on the
//! shifted bounds `v ± r`, so the counts agree exactly with distance checks
//! made by [`GroupedKdTree`](super::GroupedKdTree) on the same values.
//! `fl(x - v)` is monotone in `x`, which keeps binary search valid.

/// Sorted copy of a sequence with back-references to the original order.
#[derive(Debug, Clone)]
pub struct UnivariateSearcher {
    sorted: Vec<f64>,
    /// Original index -> position in `sorted`.
    rank: Vec<usize>,
}

impl UnivariateSearcher {
    #[must_use]
    pub fn new(values: &[f64]) -> Self {
        let mut order: Vec<usize> = (0..values.len()).collect();
        order.sort_by(|&a, &b| values[a].total_cmp(&values[b]).then(a.cmp(&b)));
        let mut rank = vec![0; values.len()];
        for (pos, &orig) in order.iter().enumerate() {
            rank[orig] = pos;
        }
        Self {
            sorted: order.iter().map(|&i| values[i]).collect(),
            rank,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sorted.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sorted.is_empty()
    }

    /// Value originally stored at `index`.
    #[must_use]
    pub fn value(&self, index: usize) -> f64 {
        self.sorted[self.rank[index]]
    }

    /// Count points in `[v - lower_radius, v + upper_radius]` where `v` is
    /// the value at `index`.
    #[must_use]
    pub fn count_within(
        &self,
        index: usize,
        lower_radius: f64,
        upper_radius: f64,
        exclude_self: bool,
    ) -> usize {
        let v = self.value(index);
        let count = self.count_within_value(v, lower_radius, upper_radius);
        count - usize::from(exclude_self && self_in_window(lower_radius, upper_radius))
    }

    /// Count points in `[v - lower_radius, v + upper_radius]`.
    #[must_use]
    pub fn count_within_value(&self, v: f64, lower_radius: f64, upper_radius: f64) -> usize {
        let lo = self.first_at_least(v, lower_radius);
        let hi = self.sorted.partition_point(|&x| x - v <= upper_radius);
        hi.saturating_sub(lo)
    }

    /// Count points `>= v - lower_radius` where `v` is the value at `index`.
    #[must_use]
    pub fn count_at_least(&self, index: usize, lower_radius: f64, exclude_self: bool) -> usize {
        let v = self.value(index);
        let count = self.count_at_least_value(v, lower_radius);
        count - usize::from(exclude_self && self_in_window(lower_radius, f64::INFINITY))
    }

    /// Count points `>= v - lower_radius`.
    #[must_use]
    pub fn count_at_least_value(&self, v: f64, lower_radius: f64) -> usize {
        self.sorted.len() - self.first_at_least(v, lower_radius)
    }

    fn first_at_least(&self, v: f64, lower_radius: f64) -> usize {
        self.sorted.partition_point(|&x| x - v < -lower_radius)
    }
}

// The query point's own difference is exactly zero.
fn self_in_window(lower_radius: f64, upper_radius: f64) -> bool {
    lower_radius >= 0.0 && upper_radius >= 0.0
}
