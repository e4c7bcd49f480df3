//! Event extraction from a pair of spike trains.
//!
//! Both trains are merged into a chronological sequence of "next spike"
//! events. Each event is embedded relative to the most recent destination
//! spike: `l` source intervals, `k - 1` destination intervals and the time
//! until whichever process fires next.

use crate::error::{Result, TeError};
use crate::store::{EmbeddedEvent, EmbeddingStore, NextSpiker};

/// Embeds one trial at a time into an [`EmbeddingStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventExtractor {
    dest_history: usize,
    source_history: usize,
}

impl EventExtractor {
    /// `dest_history` is `k`, `source_history` is `l`; both must be at least 1.
    pub fn new(dest_history: usize, source_history: usize) -> Result<Self> {
        if dest_history < 1 || source_history < 1 {
            return Err(TeError::UnsupportedEmbeddingDepth {
                k: dest_history,
                l: source_history,
            });
        }
        Ok(Self {
            dest_history,
            source_history,
        })
    }

    /// Extract the events of trial number `trial` and append them to
    /// `store`. Returns the number of events; sparse trials yield zero.
    pub fn extract_trial(
        &self,
        trial: usize,
        source: &[f64],
        dest: &[f64],
        store: &mut EmbeddingStore,
    ) -> Result<usize> {
        let source = sorted_times(trial, source)?;
        let dest = sorted_times(trial, dest)?;
        let events = self.embed(trial, &source, &dest, store)?;
        store.record_trial(events);
        Ok(events)
    }

    fn embed(
        &self,
        trial: usize,
        source: &[f64],
        dest: &[f64],
        store: &mut EmbeddingStore,
    ) -> Result<usize> {
        let (k, l) = (self.dest_history, self.source_history);
        if source.len() < l || dest.len() < k {
            return Ok(0);
        }
        let Some((mut si, mut di)) = starting_indices(source, dest, l - 1, k - 1) else {
            return Ok(0);
        };

        let mut prev_dest = dest[di];
        let mut events = 0;
        while si + 1 < source.len() || di + 1 < dest.len() {
            let spiker = if si + 1 == source.len() {
                NextSpiker::Destination
            } else if di + 1 == dest.len() || source[si + 1] < dest[di + 1] {
                NextSpiker::Source
            } else {
                NextSpiker::Destination
            };
            let next_time = match spiker {
                NextSpiker::Destination => dest[di + 1],
                NextSpiker::Source => source[si + 1],
            };
            let time_to_next = next_time - prev_dest;
            if time_to_next < 0.0 {
                return Err(TeError::NegativeTimeToNext {
                    trial,
                    time_to_next,
                });
            }
            if next_time < source[si] {
                return Err(TeError::NextSpikeBeforeSource {
                    trial,
                    next_time,
                    source_time: source[si],
                });
            }

            let mut source_history = Vec::with_capacity(l);
            source_history.push(prev_dest - source[si]);
            source_history.extend((1..l).map(|i| source[si - i + 1] - source[si - i]));
            let dest_history = (1..k).map(|i| dest[di - i + 1] - dest[di - i]).collect();

            store.push(
                spiker,
                EmbeddedEvent {
                    source_history,
                    dest_history,
                    time_to_next,
                },
            );
            events += 1;

            match spiker {
                NextSpiker::Destination => {
                    di += 1;
                    prev_dest = dest[di];
                }
                NextSpiker::Source => si += 1,
            }
        }
        Ok(events)
    }
}

fn sorted_times(trial: usize, times: &[f64]) -> Result<Vec<f64>> {
    if let Some(&value) = times.iter().find(|t| !t.is_finite()) {
        return Err(TeError::NonFiniteSpikeTime { trial, value });
    }
    let mut sorted = times.to_vec();
    sorted.sort_by(f64::total_cmp);
    Ok(sorted)
}

/// Position both pointers so that each history is complete and the later
/// of the two starting spikes is preceded by the other process's most
/// recent spike. `None` when the advanced train runs out.
fn starting_indices(
    source: &[f64],
    dest: &[f64],
    mut si: usize,
    mut di: usize,
) -> Option<(usize, usize)> {
    if source[si] > dest[di] {
        let anchor = source[si];
        di += dest[di..].iter().position(|&t| t > anchor)?;
        di -= 1;
    } else {
        let anchor = dest[di];
        si += source[si..].iter().position(|&t| t > anchor)?;
        si -= 1;
    }
    Some((si, di))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::EventLocator;

    fn extract(k: usize, l: usize, source: &[f64], dest: &[f64]) -> (usize, EmbeddingStore) {
        let mut store = EmbeddingStore::new();
        let n = EventExtractor::new(k, l)
            .unwrap()
            .extract_trial(0, source, dest, &mut store)
            .unwrap();
        (n, store)
    }

    #[test]
    fn rejects_zero_depth() {
        assert_eq!(
            EventExtractor::new(0, 1),
            Err(TeError::UnsupportedEmbeddingDepth { k: 0, l: 1 })
        );
    }

    #[test]
    fn merges_two_trains_in_time_order() {
        let (n, store) = extract(1, 1, &[0.5, 1.5], &[1.0, 2.0, 3.0]);
        // start: dest index 0 (1.0), source index 0 (0.5)
        // events: source@1.5, dest@2.0, dest@3.0
        assert_eq!(n, 3);
        let timeline: Vec<EventLocator> = store.timeline().map(|(l, _)| l).collect();
        assert_eq!(
            timeline,
            vec![
                EventLocator::Source(0),
                EventLocator::Destination(0),
                EventLocator::Destination(1),
            ]
        );
        let src = &store.partition(NextSpiker::Source)[0];
        assert_eq!(src.source_history, vec![0.5]);
        assert_eq!(src.time_to_next, 0.5);

        let d0 = &store.partition(NextSpiker::Destination)[0];
        // source spiked at 1.5 after the previous destination spike at 1.0
        assert_eq!(d0.source_history, vec![-0.5]);
        assert_eq!(d0.time_to_next, 1.0);
        assert_eq!(d0.elapsed_time(), 0.5);

        let d1 = &store.partition(NextSpiker::Destination)[1];
        assert_eq!(d1.source_history, vec![0.5]);
        assert_eq!(d1.time_to_next, 1.0);
        assert_eq!(store.events_per_trial(), &[3]);
    }

    #[test]
    fn histories_hold_backward_intervals() {
        let (n, store) = extract(3, 2, &[0.1, 0.4, 2.6, 4.0], &[0.0, 1.0, 3.0, 6.0]);
        // start: dest index 2 (3.0), source advanced to index 2 (2.6)
        assert_eq!(n, 2);
        let e = &store.partition(NextSpiker::Source)[0];
        assert!((e.source_history[0] - 0.4).abs() < 1e-12);
        assert!((e.source_history[1] - 2.2).abs() < 1e-12);
        assert_eq!(e.dest_history, vec![2.0, 1.0]);
        assert_eq!(e.time_to_next, 1.0);

        let d = &store.partition(NextSpiker::Destination)[0];
        assert!((d.source_history[0] + 1.0).abs() < 1e-12);
        assert!((d.source_history[1] - 1.4).abs() < 1e-12);
        assert_eq!(d.time_to_next, 3.0);
    }

    #[test]
    fn ties_go_to_destination() {
        let (_, store) = extract(1, 1, &[0.0, 2.0], &[1.0, 2.0]);
        let first = store.timeline().next().map(|(l, _)| l);
        assert_eq!(first, Some(EventLocator::Destination(0)));
    }

    #[test]
    fn unsorted_input_is_sorted_first() {
        let (_, a) = extract(2, 1, &[0.3, 1.7, 2.9], &[0.0, 1.0, 2.0, 3.5]);
        let (_, b) = extract(2, 1, &[2.9, 0.3, 1.7], &[3.5, 1.0, 0.0, 2.0]);
        assert_eq!(a, b);
    }

    #[test]
    fn sparse_trial_records_zero_events() {
        let (n, store) = extract(3, 1, &[0.5, 1.0, 1.5], &[0.2, 0.9]);
        assert_eq!(n, 0);
        assert!(store.is_empty());
        assert_eq!(store.events_per_trial(), &[0]);
    }

    #[test]
    fn exhausted_advance_records_zero_events() {
        // every destination spike precedes the first source spike
        let (n, _) = extract(1, 1, &[5.0, 6.0], &[1.0, 2.0]);
        assert_eq!(n, 0);
    }

    #[test]
    fn destination_running_backwards_is_fatal() {
        let extractor = EventExtractor::new(1, 1).unwrap();
        let mut store = EmbeddingStore::new();
        let err = extractor
            .embed(2, &[0.5, 5.0], &[1.0, 3.0, 2.0], &mut store)
            .unwrap_err();
        assert_eq!(
            err,
            TeError::NegativeTimeToNext {
                trial: 2,
                time_to_next: -1.0
            }
        );
    }

    #[test]
    fn spike_before_latest_source_spike_is_fatal() {
        // after the source spike at 3.0 the next source spike claims 2.5
        let extractor = EventExtractor::new(1, 1).unwrap();
        let mut store = EmbeddingStore::new();
        let err = extractor
            .embed(1, &[0.5, 3.0, 2.5], &[1.0, 2.0, 4.0], &mut store)
            .unwrap_err();
        assert_eq!(
            err,
            TeError::NextSpikeBeforeSource {
                trial: 1,
                next_time: 2.5,
                source_time: 3.0
            }
        );
    }

    #[test]
    fn non_finite_times_are_rejected() {
        let mut store = EmbeddingStore::new();
        let err = EventExtractor::new(1, 1)
            .unwrap()
            .extract_trial(4, &[0.0, f64::NAN], &[1.0], &mut store)
            .unwrap_err();
        assert!(matches!(err, TeError::NonFiniteSpikeTime { trial: 4, .. }));
        assert!(store.events_per_trial().is_empty());
    }
}
