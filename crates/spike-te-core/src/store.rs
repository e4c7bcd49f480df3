//! Partitioned embedding store.
//!
//! Events are split by which process spiked next. A third container keeps
//! the `(dest_history, time_to_next)` pairs of destination-next events; it
//! is index-aligned with the destination partition. The chronological
//! timeline holds one [`EventLocator`] per event.

/// Which process produced the next spike after the reference time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NextSpiker {
    Destination,
    Source,
}

impl NextSpiker {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Destination => "destination",
            Self::Source => "source",
        }
    }
}

/// One embedded observation.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddedEvent {
    /// `l` entries: offset of the latest source spike before the previous
    /// destination spike, then successive backward source intervals.
    pub source_history: Vec<f64>,
    /// `k - 1` backward destination intervals.
    pub dest_history: Vec<f64>,
    /// Time from the previous destination spike to the next spike.
    pub time_to_next: f64,
}

impl EmbeddedEvent {
    /// Previous destination spike time minus latest source spike time.
    /// Negative when the source spiked after the previous destination spike.
    #[must_use]
    pub fn source_offset(&self) -> f64 {
        self.source_history[0]
    }

    /// Real time this event contributes to the integration window.
    #[must_use]
    pub fn elapsed_time(&self) -> f64 {
        let offset = self.source_offset();
        if offset < 0.0 {
            self.time_to_next + offset
        } else {
            self.time_to_next
        }
    }
}

/// Position of an event inside its partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventLocator {
    Destination(usize),
    Source(usize),
}

impl EventLocator {
    #[must_use]
    pub const fn next_spiker(self) -> NextSpiker {
        match self {
            Self::Destination(_) => NextSpiker::Destination,
            Self::Source(_) => NextSpiker::Source,
        }
    }

    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Destination(i) | Self::Source(i) => i,
        }
    }
}

/// Destination-only marginal sample.
#[derive(Debug, Clone, PartialEq)]
pub struct DestinationSample {
    pub dest_history: Vec<f64>,
    pub time_to_next: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmbeddingStore {
    destination_next: Vec<EmbeddedEvent>,
    source_next: Vec<EmbeddedEvent>,
    destination_samples: Vec<DestinationSample>,
    timeline: Vec<EventLocator>,
    events_per_trial: Vec<usize>,
}

impl EmbeddingStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event and return its locator.
    pub fn push(&mut self, spiker: NextSpiker, event: EmbeddedEvent) -> EventLocator {
        let locator = match spiker {
            NextSpiker::Destination => {
                self.destination_samples.push(DestinationSample {
                    dest_history: event.dest_history.clone(),
                    time_to_next: event.time_to_next,
                });
                self.destination_next.push(event);
                EventLocator::Destination(self.destination_next.len() - 1)
            }
            NextSpiker::Source => {
                self.source_next.push(event);
                EventLocator::Source(self.source_next.len() - 1)
            }
        };
        self.timeline.push(locator);
        locator
    }

    /// Close a trial that produced `events` events.
    pub fn record_trial(&mut self, events: usize) {
        self.events_per_trial.push(events);
    }

    #[must_use]
    pub fn partition(&self, spiker: NextSpiker) -> &[EmbeddedEvent] {
        match spiker {
            NextSpiker::Destination => &self.destination_next,
            NextSpiker::Source => &self.source_next,
        }
    }

    #[must_use]
    pub fn destination_samples(&self) -> &[DestinationSample] {
        &self.destination_samples
    }

    #[must_use]
    pub fn get(&self, locator: EventLocator) -> &EmbeddedEvent {
        match locator {
            EventLocator::Destination(i) => &self.destination_next[i],
            EventLocator::Source(i) => &self.source_next[i],
        }
    }

    /// Events in chronological (per-trial extraction) order.
    pub fn timeline(&self) -> impl Iterator<Item = (EventLocator, &EmbeddedEvent)> {
        self.timeline.iter().map(|&loc| (loc, self.get(loc)))
    }

    #[must_use]
    pub fn events_per_trial(&self) -> &[usize] {
        &self.events_per_trial
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.timeline.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.timeline.is_empty()
    }

    /// Sum of per-event elapsed times.
    #[must_use]
    pub fn total_elapsed_time(&self) -> f64 {
        self.timeline().map(|(_, e)| e.elapsed_time()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(offset: f64, t: f64) -> EmbeddedEvent {
        EmbeddedEvent {
            source_history: vec![offset],
            dest_history: vec![],
            time_to_next: t,
        }
    }

    #[test]
    fn locators_index_their_partition() {
        let mut store = EmbeddingStore::new();
        assert_eq!(store.push(NextSpiker::Source, event(0.1, 0.5)), EventLocator::Source(0));
        assert_eq!(
            store.push(NextSpiker::Destination, event(0.2, 0.7)),
            EventLocator::Destination(0)
        );
        assert_eq!(
            store.push(NextSpiker::Destination, event(-0.1, 0.9)),
            EventLocator::Destination(1)
        );
        store.record_trial(3);

        assert_eq!(store.len(), 3);
        assert_eq!(store.partition(NextSpiker::Destination).len(), 2);
        assert_eq!(store.destination_samples().len(), 2);
        assert_eq!(store.destination_samples()[1].time_to_next, 0.9);
        assert_eq!(store.events_per_trial(), &[3]);
        let kinds: Vec<NextSpiker> = store.timeline().map(|(l, _)| l.next_spiker()).collect();
        assert_eq!(
            kinds,
            vec![NextSpiker::Source, NextSpiker::Destination, NextSpiker::Destination]
        );
    }

    #[test]
    fn elapsed_time_discounts_late_source_spikes() {
        assert_eq!(event(0.3, 1.0).elapsed_time(), 1.0);
        assert_eq!(event(-0.25, 1.0).elapsed_time(), 0.75);
        let mut store = EmbeddingStore::new();
        store.push(NextSpiker::Source, event(0.3, 1.0));
        store.push(NextSpiker::Destination, event(-0.25, 1.0));
        assert_eq!(store.total_elapsed_time(), 1.75);
    }
}
