//! Search structures built once from a finalised [`EmbeddingStore`].

use crate::error::Result;
use crate::spatial::{GroupedKdTree, PointSet, UnivariateSearcher};
use crate::store::{EmbeddedEvent, EmbeddingStore, NextSpiker};

/// Destination-history subspace of destination-next events.
#[derive(Debug, Clone)]
pub enum DestHistoryIndex {
    /// `k > 1`: k-d tree over the `k - 1` destination intervals.
    Tree(GroupedKdTree),
    /// `k = 1`: no history dimensions; sorted times to next spike.
    Univariate(UnivariateSearcher),
}

/// Joint and history-only indices for one next-spiker partition.
#[derive(Debug, Clone)]
pub struct PartitionIndex {
    /// Groups: source history, destination history, time to next.
    pub joint: GroupedKdTree,
    /// Groups: source history, destination history.
    pub histories: GroupedKdTree,
}

impl PartitionIndex {
    fn build(events: &[EmbeddedEvent], l: usize, dest_dims: usize) -> Result<Self> {
        let mut joint = PointSet::with_capacity(&[l, dest_dims, 1], events.len());
        let mut histories = PointSet::with_capacity(&[l, dest_dims], events.len());
        for e in events {
            joint.push(&[&e.source_history, &e.dest_history, &[e.time_to_next]])?;
            histories.push(&[&e.source_history, &e.dest_history])?;
        }
        Ok(Self {
            joint: GroupedKdTree::build(joint),
            histories: GroupedKdTree::build(histories),
        })
    }
}

#[derive(Debug, Clone)]
pub struct IndexSet {
    pub destination_next: PartitionIndex,
    pub source_next: PartitionIndex,
    /// Groups: destination history, time to next (destination-next only).
    pub dest_joint: GroupedKdTree,
    pub dest_history: DestHistoryIndex,
}

impl IndexSet {
    /// Build all search structures for embedding depths `k` and `l`.
    pub fn build(store: &EmbeddingStore, k: usize, l: usize) -> Result<Self> {
        let dest_dims = k.saturating_sub(1);
        let destination_next =
            PartitionIndex::build(store.partition(NextSpiker::Destination), l, dest_dims)?;
        let source_next = PartitionIndex::build(store.partition(NextSpiker::Source), l, dest_dims)?;

        let samples = store.destination_samples();
        let mut dest_joint = PointSet::with_capacity(&[dest_dims, 1], samples.len());
        for s in samples {
            dest_joint.push(&[&s.dest_history, &[s.time_to_next]])?;
        }
        let dest_history = if dest_dims == 0 {
            let times: Vec<f64> = samples.iter().map(|s| s.time_to_next).collect();
            DestHistoryIndex::Univariate(UnivariateSearcher::new(&times))
        } else {
            let mut points = PointSet::with_capacity(&[dest_dims], samples.len());
            for s in samples {
                points.push(&[&s.dest_history])?;
            }
            DestHistoryIndex::Tree(GroupedKdTree::build(points))
        };

        Ok(Self {
            destination_next,
            source_next,
            dest_joint: GroupedKdTree::build(dest_joint),
            dest_history,
        })
    }

    #[must_use]
    pub fn partition(&self, spiker: NextSpiker) -> &PartitionIndex {
        match spiker {
            NextSpiker::Destination => &self.destination_next,
            NextSpiker::Source => &self.source_next,
        }
    }
}
