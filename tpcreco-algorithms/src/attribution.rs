//! Secondary attribution for flagged interaction steps.
//!
//! A step of the source species, limited by the target process, usually
//! carries several secondaries. The product of *this* interaction is the
//! candidate of the product species whose creator process is the very
//! process that limited the step. When no candidate carries that identity
//! the most energetic candidate is taken instead, earliest listed on ties.

use tpcreco_core::cluster::{AttributedSecondary, Attribution};
use tpcreco_core::config::AttributionTarget;
use tpcreco_core::step::{CandidateSecondary, ProcessHandle, StepRecord};

/// Picks the product secondary of a target interaction.
#[derive(Debug, Clone, Default)]
pub struct SecondaryAttributor {
    target: AttributionTarget,
}

impl SecondaryAttributor {
    /// Creates an attributor for the given target.
    #[must_use]
    pub fn new(target: AttributionTarget) -> Self {
        Self { target }
    }

    /// Returns the attribution target.
    #[must_use]
    pub fn target(&self) -> &AttributionTarget {
        &self.target
    }

    /// Returns true if the step is the target interaction of the source species.
    #[must_use]
    pub fn is_target(&self, step: &StepRecord, generation: u32) -> bool {
        step.step_process_type == self.target.process_type
            && step.step_process_sub_type == self.target.process_sub_type
            && step.pdg == self.target.source_pdg
            && self
                .target
                .source_generation
                .is_none_or(|required| required == generation)
    }

    /// Attributes a secondary to `step`.
    ///
    /// Returns `None` if the step is not a target, carries no interaction
    /// marker, or offers no candidate of the product species.
    #[must_use]
    pub fn attribute(&self, step: &StepRecord, generation: u32) -> Option<Attribution> {
        if !self.is_target(step, generation) {
            return None;
        }
        let interaction = step.interaction.as_ref()?;
        self.select(interaction.process, &interaction.secondaries)
    }

    /// Chooses among `candidates` for an interaction driven by `process`.
    ///
    /// The candidate count in the result covers every candidate of the
    /// product species, not only the ones that competed for the pick.
    #[must_use]
    pub fn select(
        &self,
        process: Option<ProcessHandle>,
        candidates: &[CandidateSecondary],
    ) -> Option<Attribution> {
        let mut count = 0usize;
        let mut matched: Option<&CandidateSecondary> = None;
        let mut most_energetic: Option<&CandidateSecondary> = None;

        for candidate in candidates
            .iter()
            .filter(|c| c.pdg == self.target.product_pdg)
        {
            count += 1;
            if matched.is_none() && process.is_some() && candidate.creator_process == process {
                matched = Some(candidate);
            }
            if most_energetic.is_none_or(|best| candidate.kinetic_energy > best.kinetic_energy) {
                most_energetic = Some(candidate);
            }
        }

        let (chosen, matched_process) = match (matched, most_energetic) {
            (Some(candidate), _) => (candidate, true),
            (None, Some(candidate)) => (candidate, false),
            (None, None) => return None,
        };

        Some(Attribution {
            secondary: AttributedSecondary {
                track_id: chosen.track_id,
                momentum: chosen.momentum,
                kinetic_energy: chosen.kinetic_energy,
                polar_angle: chosen.momentum.polar_angle(),
                azimuthal_angle: chosen.momentum.azimuthal_angle(),
            },
            matched_process,
            candidate_count: count,
        })
    }
}
