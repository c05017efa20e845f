//! Online ancestry resolution.
//!
//! Maps every track of one event to its primary ancestor and its distance
//! from it, in a single pass over a stream that is not topologically
//! sorted. A track whose parent has not been seen yet is attached directly
//! under the parent ID as a new root (generation 1). This is a known
//! approximation kept to stay single-pass; it is not resolved later.

use std::collections::HashMap;

use log::trace;

/// Root ancestor and generation of one track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AncestryEntry {
    /// Track ID of the primary ancestor.
    pub root_id: i32,
    /// Number of parent links between the track and its root.
    pub generation: u32,
}

impl AncestryEntry {
    /// Entry of a primary track.
    #[inline]
    #[must_use]
    pub fn primary(track_id: i32) -> Self {
        Self {
            root_id: track_id,
            generation: 0,
        }
    }
}

/// Per-event map from trackID to its ancestry entry.
///
/// Entries are written once and never recomputed; call [`reset`](Self::reset)
/// at every event boundary.
#[derive(Debug, Default)]
pub struct AncestryTracker {
    entries: HashMap<i32, AncestryEntry>,
    fallbacks: usize,
}

impl AncestryTracker {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty tracker sized for `capacity` tracks.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: HashMap::with_capacity(capacity),
            fallbacks: 0,
        }
    }

    /// Resolves the root and generation of `track_id`.
    ///
    /// Primaries (`parent_id == 0`) are their own root at generation 0.
    /// Other tracks inherit the parent's root one generation deeper, or fall
    /// back to `(parent_id, 1)` when the parent is unknown. A track that was
    /// already resolved keeps its first entry, whatever `parent_id` says now.
    pub fn resolve(&mut self, track_id: i32, parent_id: i32) -> AncestryEntry {
        if let Some(entry) = self.entries.get(&track_id) {
            return *entry;
        }

        let entry = if parent_id == 0 {
            AncestryEntry::primary(track_id)
        } else if let Some(parent) = self.entries.get(&parent_id) {
            AncestryEntry {
                root_id: parent.root_id,
                generation: parent.generation + 1,
            }
        } else {
            trace!("track {track_id}: parent {parent_id} not resolved yet, treating it as root");
            self.fallbacks += 1;
            AncestryEntry {
                root_id: parent_id,
                generation: 1,
            }
        };

        self.entries.insert(track_id, entry);
        entry
    }

    /// Returns the entry of an already resolved track.
    #[must_use]
    pub fn get(&self, track_id: i32) -> Option<AncestryEntry> {
        self.entries.get(&track_id).copied()
    }

    /// Number of resolved tracks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no track has been resolved since the last reset.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of fallback resolutions since the last reset.
    #[must_use]
    pub fn fallback_count(&self) -> usize {
        self.fallbacks
    }

    /// Discards all entries. Ancestry never spans events.
    pub fn reset(&mut self) {
        self.entries.clear();
        self.fallbacks = 0;
    }
}
