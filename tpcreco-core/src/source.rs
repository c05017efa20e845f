//! Collaborator traits for the event source and the row sink.
//!
//! Event framing belongs to the source: the engine never infers event
//! boundaries from record content. Opening a sink happens in its
//! constructor; the engine only appends rows and finishes.

use std::collections::VecDeque;

use crate::cluster::ClusterRow;
use crate::step::StepEvent;
use crate::Result;

/// A stream of events, read one at a time.
pub trait EventSource {
    /// Reads the next event, or `None` once the stream is exhausted.
    ///
    /// # Errors
    /// Returns `SourceUnavailable` if the underlying stream cannot be read.
    fn next_event(&mut self) -> Result<Option<StepEvent>>;
}

impl<S: EventSource + ?Sized> EventSource for &mut S {
    fn next_event(&mut self) -> Result<Option<StepEvent>> {
        (**self).next_event()
    }
}

impl<S: EventSource + ?Sized> EventSource for Box<S> {
    fn next_event(&mut self) -> Result<Option<StepEvent>> {
        (**self).next_event()
    }
}

/// An append-only destination for cluster rows.
pub trait RowSink {
    /// Appends one row.
    ///
    /// # Errors
    /// Returns `SinkUnavailable` if the row cannot be written.
    fn append(&mut self, row: &ClusterRow) -> Result<()>;

    /// Flushes and closes the sink. Rows appended earlier stay valid even
    /// if this fails.
    ///
    /// # Errors
    /// Returns `SinkUnavailable` if buffered rows cannot be flushed.
    fn finish(&mut self) -> Result<()>;
}

impl<S: RowSink + ?Sized> RowSink for &mut S {
    fn append(&mut self, row: &ClusterRow) -> Result<()> {
        (**self).append(row)
    }

    fn finish(&mut self) -> Result<()> {
        (**self).finish()
    }
}

impl<S: RowSink + ?Sized> RowSink for Box<S> {
    fn append(&mut self, row: &ClusterRow) -> Result<()> {
        (**self).append(row)
    }

    fn finish(&mut self) -> Result<()> {
        (**self).finish()
    }
}

/// In-memory sink that collects rows.
impl RowSink for Vec<ClusterRow> {
    fn append(&mut self, row: &ClusterRow) -> Result<()> {
        self.push(row.clone());
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// In-memory event source.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    events: VecDeque<StepEvent>,
}

impl MemorySource {
    /// Creates a source over the given events.
    #[must_use]
    pub fn new(events: Vec<StepEvent>) -> Self {
        Self {
            events: events.into(),
        }
    }

    /// Number of events not yet read.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.events.len()
    }
}

impl FromIterator<StepEvent> for MemorySource {
    fn from_iter<I: IntoIterator<Item = StepEvent>>(iter: I) -> Self {
        Self {
            events: iter.into_iter().collect(),
        }
    }
}

impl EventSource for MemorySource {
    fn next_event(&mut self) -> Result<Option<StepEvent>> {
        Ok(self.events.pop_front())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::StepRecord;

    #[test]
    fn test_memory_source_preserves_order() {
        let mut source: MemorySource = (0..3)
            .map(|id| StepEvent::new(id, vec![StepRecord::new(id, 1, 0, 22)]))
            .collect();

        assert_eq!(source.remaining(), 3);
        let ids: Vec<i32> = std::iter::from_fn(|| source.next_event().ok().flatten())
            .map(|event| event.event_id)
            .collect();
        assert_eq!(ids, vec![0, 1, 2]);
        assert!(source.next_event().unwrap().is_none());
    }
}
