//! Per-event cluster building.
//!
//! Steps of one event are grouped by their root ancestor. Groups keep the
//! order in which their root first appeared; members of a group are
//! re-sorted by time (stable, so equal times keep arrival order) before any
//! derived quantity is computed.

use std::collections::HashMap;

use log::debug;
use tpcreco_core::cluster::{AttributedSecondary, Attribution, ClusterRow, HitPoint};
use tpcreco_core::config::ReconstructionConfig;
use tpcreco_core::step::{particle_name, StepRecord};
use tpcreco_core::Result;

use crate::ancestry::AncestryTracker;
use crate::attribution::SecondaryAttributor;
use crate::geometry::ContainmentVolume;

/// Counters accumulated over the events a builder has processed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClusterStatistics {
    /// Events with at least one step.
    pub events_processed: usize,
    /// Clusters finalized, including vetoed ones.
    pub clusters_built: usize,
    /// Clusters suppressed by the containment veto.
    pub clusters_vetoed: usize,
    /// Clusters with an attributed secondary.
    pub clusters_attributed: usize,
    /// Tracks resolved through the unknown-parent fallback.
    pub fallback_resolutions: usize,
}

/// A step together with its resolved generation.
struct Member<'a> {
    step: &'a StepRecord,
    generation: u32,
}

/// Steps sharing one root, open while their event is processed.
struct OpenCluster<'a> {
    root_id: i32,
    members: Vec<Member<'a>>,
}

/// Turns the steps of one event into cluster rows.
pub struct ClusterBuilder {
    config: ReconstructionConfig,
    volume: ContainmentVolume,
    attributor: SecondaryAttributor,
    ancestry: AncestryTracker,
    stats: ClusterStatistics,
}

impl ClusterBuilder {
    /// Creates a builder for a validated configuration.
    ///
    /// # Errors
    /// Returns `ConfigError` if the configuration is invalid.
    pub fn new(config: ReconstructionConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            volume: ContainmentVolume::new(&config.geometry),
            attributor: SecondaryAttributor::new(config.attribution.clone()),
            ancestry: AncestryTracker::new(),
            stats: ClusterStatistics::default(),
            config,
        })
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &ReconstructionConfig {
        &self.config
    }

    /// Returns the counters accumulated so far.
    #[must_use]
    pub fn statistics(&self) -> ClusterStatistics {
        self.stats
    }

    /// Clears the accumulated counters.
    pub fn reset_statistics(&mut self) {
        self.stats = ClusterStatistics::default();
    }

    /// Builds the rows of one event, in root-appearance order.
    ///
    /// An empty event yields no rows. With the selection veto enabled, rows
    /// that fail containment are dropped.
    pub fn process_event(&mut self, event_id: i32, steps: &[StepRecord]) -> Vec<ClusterRow> {
        self.ancestry.reset();
        if steps.is_empty() {
            return Vec::new();
        }

        let mut clusters = self.group_by_root(steps);
        self.stats.events_processed += 1;
        self.stats.fallback_resolutions += self.ancestry.fallback_count();

        let mut rows = Vec::with_capacity(clusters.len());
        for cluster in &mut clusters {
            cluster
                .members
                .sort_by(|a, b| a.step.time.total_cmp(&b.step.time));

            let row = self.finalize(event_id, cluster);
            self.stats.clusters_built += 1;
            if row.attributed {
                self.stats.clusters_attributed += 1;
            }
            if self.config.selection_veto && !row.contained {
                debug!(
                    "event {event_id}: cluster of root {} vetoed by containment",
                    row.root_id
                );
                self.stats.clusters_vetoed += 1;
                continue;
            }
            rows.push(row);
        }
        rows
    }

    fn group_by_root<'a>(&mut self, steps: &'a [StepRecord]) -> Vec<OpenCluster<'a>> {
        let mut clusters: Vec<OpenCluster<'a>> = Vec::new();
        let mut slot_of_root: HashMap<i32, usize> = HashMap::new();

        for step in steps {
            let entry = self.ancestry.resolve(step.track_id, step.parent_id);
            let slot = *slot_of_root.entry(entry.root_id).or_insert_with(|| {
                clusters.push(OpenCluster {
                    root_id: entry.root_id,
                    members: Vec::new(),
                });
                clusters.len() - 1
            });
            clusters[slot].members.push(Member {
                step,
                generation: entry.generation,
            });
        }
        clusters
    }

    fn finalize(&self, event_id: i32, cluster: &OpenCluster<'_>) -> ClusterRow {
        let unit = self.config.energy_unit;
        let members = &cluster.members;

        let total_mev: f64 = members.iter().map(|m| m.step.energy_deposit).sum();
        let path_length: f64 = members
            .windows(2)
            .map(|pair| pair[1].step.position.distance(&pair[0].step.position))
            .sum();
        let step_length_sum: f64 = members.iter().map(|m| m.step.step_length).sum();
        let max_generation = members.iter().map(|m| m.generation).max().unwrap_or(0);
        let particle_label = dominant_pdg(members);
        let contained = self
            .volume
            .contains_all(members.iter().map(|m| &m.step.position));

        let attribution = members
            .iter()
            .filter(|m| self.attributor.is_target(m.step, m.generation))
            .find_map(|m| self.attributor.attribute(m.step, m.generation));
        let (secondary, candidate_secondary_count) = match attribution {
            Some(Attribution {
                secondary,
                candidate_count,
                ..
            }) => (
                Some(AttributedSecondary {
                    kinetic_energy: unit.from_mev(secondary.kinetic_energy),
                    ..secondary
                }),
                candidate_count,
            ),
            None => (None, 0),
        };

        let first = members.first().map(|m| m.step);
        let (start_position, start_momentum) = first
            .map(|s| (s.position, s.momentum))
            .unwrap_or_default();
        let (creator_type, creator_sub_type) =
            first.map_or((-1, -1), |s| (s.creator_type, s.creator_sub_type));

        let hits = members
            .iter()
            .map(|m| HitPoint {
                track_id: m.step.track_id,
                pdg: m.step.pdg,
                position: m.step.position,
                time: m.step.time,
                momentum: m.step.momentum,
                energy_deposit: unit.from_mev(m.step.energy_deposit),
                step_length: m.step.step_length,
            })
            .collect();

        ClusterRow {
            event_id,
            root_id: cluster.root_id,
            hit_count: members.len(),
            total_energy_deposit: unit.from_mev(total_mev),
            path_length,
            step_length_sum,
            ion_pairs: total_mev / self.config.w_value_mev,
            particle_label,
            particle_name: particle_name(particle_label).into_owned(),
            max_generation,
            creator_type,
            creator_sub_type,
            contained,
            start_position,
            start_momentum,
            start_azimuth: start_momentum.azimuthal_angle(),
            start_inclination: start_momentum.polar_angle(),
            attributed: secondary.is_some(),
            secondary,
            candidate_secondary_count,
            hits,
        }
    }
}

/// Most frequent PDG code; ties go to the code seen first.
fn dominant_pdg(members: &[Member<'_>]) -> i32 {
    let mut counts: Vec<(i32, usize)> = Vec::new();
    for member in members {
        match counts.iter_mut().find(|(pdg, _)| *pdg == member.step.pdg) {
            Some((_, n)) => *n += 1,
            None => counts.push((member.step.pdg, 1)),
        }
    }

    let mut best: Option<(i32, usize)> = None;
    for (pdg, n) in counts {
        if best.is_none_or(|(_, best_n)| n > best_n) {
            best = Some((pdg, n));
        }
    }
    best.map_or(0, |(pdg, _)| pdg)
}
