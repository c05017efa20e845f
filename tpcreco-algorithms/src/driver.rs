//! Event loop between a step source and a row sink.
//!
//! One stream is processed strictly in order by a single builder.
//! Independent streams share nothing and can run in parallel, each with
//! its own builder and sink.

use log::{debug, info, warn};
use rayon::prelude::*;
use tpcreco_core::config::ReconstructionConfig;
use tpcreco_core::source::{EventSource, RowSink};
use tpcreco_core::Result;

use crate::builder::ClusterBuilder;

/// Outcome of one completed run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Events read from the source, including empty ones.
    pub events_read: u64,
    /// Events skipped because they carried no steps.
    pub events_skipped: u64,
    /// Rows appended to the sink.
    pub rows_written: u64,
    /// Rows suppressed by the containment veto.
    pub rows_vetoed: u64,
    /// Rows carrying an attributed secondary.
    pub rows_attributed: u64,
    /// Tracks resolved through the unknown-parent fallback.
    pub fallback_resolutions: u64,
}

/// Drives a [`ClusterBuilder`] over a whole event stream.
pub struct StreamDriver {
    builder: ClusterBuilder,
}

impl StreamDriver {
    /// Creates a driver for the given configuration.
    ///
    /// # Errors
    /// Returns `ConfigError` if the configuration is invalid.
    pub fn new(config: ReconstructionConfig) -> Result<Self> {
        Ok(Self {
            builder: ClusterBuilder::new(config)?,
        })
    }

    /// Reads every event from `source` and appends the resulting rows to
    /// `sink` in emission order, then finishes the sink.
    ///
    /// # Errors
    /// Stops at the first source or sink failure. Rows appended before the
    /// failure are not withdrawn; on a source failure the sink is still
    /// finished so buffered rows reach storage.
    pub fn run<S, K>(&mut self, source: &mut S, sink: &mut K) -> Result<RunSummary>
    where
        S: EventSource + ?Sized,
        K: RowSink + ?Sized,
    {
        self.builder.reset_statistics();
        let interval = self.builder.config().progress_report_interval;
        let mut summary = RunSummary::default();

        loop {
            let event = match source.next_event() {
                Ok(Some(event)) => event,
                Ok(None) => break,
                Err(e) => {
                    if let Err(finish_error) = sink.finish() {
                        warn!("finishing sink after source failure: {finish_error}");
                    }
                    return Err(e);
                }
            };
            summary.events_read += 1;

            if event.is_empty() {
                debug!("event {}: no steps, skipped", event.event_id);
                summary.events_skipped += 1;
            } else {
                for row in self.builder.process_event(event.event_id, &event.steps) {
                    sink.append(&row)?;
                    summary.rows_written += 1;
                }
            }

            if interval > 0 && summary.events_read % interval == 0 {
                info!(
                    "{} events processed, {} clusters written",
                    summary.events_read, summary.rows_written
                );
            }
        }

        sink.finish()?;

        let stats = self.builder.statistics();
        summary.rows_vetoed = stats.clusters_vetoed as u64;
        summary.rows_attributed = stats.clusters_attributed as u64;
        summary.fallback_resolutions = stats.fallback_resolutions as u64;

        info!(
            "wrote {} clusters from {} events ({} empty, {} vetoed)",
            summary.rows_written, summary.events_read, summary.events_skipped, summary.rows_vetoed
        );
        if summary.fallback_resolutions > 0 {
            debug!(
                "{} tracks resolved without a known parent",
                summary.fallback_resolutions
            );
        }
        Ok(summary)
    }
}

/// Runs one stream from `source` to `sink` with a fresh driver.
///
/// # Errors
/// Returns `ConfigError` for an invalid configuration, or the first source
/// or sink failure.
pub fn run<S, K>(source: &mut S, sink: &mut K, config: &ReconstructionConfig) -> Result<RunSummary>
where
    S: EventSource + ?Sized,
    K: RowSink + ?Sized,
{
    StreamDriver::new(config.clone())?.run(source, sink)
}

/// Runs independent streams in parallel, one driver per stream.
///
/// Results come back in input order. A failing stream does not affect the
/// others. Event IDs are not disambiguated across streams.
pub fn run_streams<S, K>(
    streams: Vec<(S, K)>,
    config: &ReconstructionConfig,
) -> Vec<Result<RunSummary>>
where
    S: EventSource + Send,
    K: RowSink + Send,
{
    streams
        .into_par_iter()
        .map(|(mut source, mut sink)| run(&mut source, &mut sink, config))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tpcreco_core::cluster::ClusterRow;
    use tpcreco_core::source::MemorySource;
    use tpcreco_core::step::{StepEvent, StepRecord};
    use tpcreco_core::Error;

    fn event(id: i32, tracks: &[(i32, i32)]) -> StepEvent {
        let steps = tracks
            .iter()
            .map(|&(track, parent)| {
                StepRecord::new(id, track, parent, 22).with_position(0.0, 0.0, 51.4)
            })
            .collect();
        StepEvent::new(id, steps)
    }

    /// Keeps rows in memory until `finish`.
    #[derive(Default)]
    struct BufferingSink {
        pending: Vec<ClusterRow>,
        persisted: Vec<ClusterRow>,
    }

    impl RowSink for BufferingSink {
        fn append(&mut self, row: &ClusterRow) -> Result<()> {
            self.pending.push(row.clone());
            Ok(())
        }

        fn finish(&mut self) -> Result<()> {
            self.persisted.append(&mut self.pending);
            Ok(())
        }
    }

    /// Yields its events, then fails.
    struct TruncatedSource {
        events: std::vec::IntoIter<StepEvent>,
    }

    impl EventSource for TruncatedSource {
        fn next_event(&mut self) -> Result<Option<StepEvent>> {
            match self.events.next() {
                Some(event) => Ok(Some(event)),
                None => Err(Error::SourceUnavailable("line 3: truncated".to_string())),
            }
        }
    }

    struct FailingSink {
        accepted: usize,
        limit: usize,
    }

    impl RowSink for FailingSink {
        fn append(&mut self, _row: &ClusterRow) -> Result<()> {
            if self.accepted == self.limit {
                return Err(Error::SinkUnavailable("disk full".to_string()));
            }
            self.accepted += 1;
            Ok(())
        }

        fn finish(&mut self) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_run_counts() {
        let mut source = MemorySource::new(vec![
            event(0, &[(1, 0), (2, 1)]),
            StepEvent::new(1, Vec::new()),
            event(2, &[(1, 0), (3, 0)]),
        ]);
        let mut rows: Vec<ClusterRow> = Vec::new();

        let summary = run(&mut source, &mut rows, &ReconstructionConfig::default()).unwrap();

        assert_eq!(summary.events_read, 3);
        assert_eq!(summary.events_skipped, 1);
        assert_eq!(summary.rows_written, 3);
        assert_eq!(rows.len(), 3);
        let keys: Vec<(i32, i32)> = rows.iter().map(|r| (r.event_id, r.root_id)).collect();
        assert_eq!(keys, vec![(0, 1), (2, 1), (2, 3)]);
    }

    #[test]
    fn test_sink_failure_is_fatal() {
        let mut source = MemorySource::new(vec![event(0, &[(1, 0), (2, 0), (3, 0)])]);
        let mut sink = FailingSink {
            accepted: 0,
            limit: 2,
        };

        let result = run(&mut source, &mut sink, &ReconstructionConfig::default());
        assert!(matches!(result, Err(Error::SinkUnavailable(_))));
        assert_eq!(sink.accepted, 2);
    }

    #[test]
    fn test_source_failure_still_finishes_sink() {
        let mut source = TruncatedSource {
            events: vec![event(0, &[(1, 0)])].into_iter(),
        };
        let mut sink = BufferingSink::default();

        let result = run(&mut source, &mut sink, &ReconstructionConfig::default());
        assert!(matches!(result, Err(Error::SourceUnavailable(_))));
        assert!(sink.pending.is_empty());
        assert_eq!(sink.persisted.len(), 1);
        assert_eq!(sink.persisted[0].root_id, 1);
    }

    #[test]
    fn test_streams_run_independently() {
        let streams: Vec<(MemorySource, Vec<ClusterRow>)> = (0..4)
            .map(|n| {
                let events = (0..=n).map(|id| event(id, &[(1, 0)])).collect();
                (MemorySource::new(events), Vec::new())
            })
            .collect();

        let results = run_streams(streams, &ReconstructionConfig::default());
        let written: Vec<u64> = results
            .into_iter()
            .map(|r| r.unwrap().rows_written)
            .collect();
        assert_eq!(written, vec![1, 2, 3, 4]);
    }
}
