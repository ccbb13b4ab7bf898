//! Forward-only lifecycle of a single investigation.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::PhaseError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrchestrationPhase {
    Initialized,
    DiscoveryRunning,
    DiscoveryDone,
    SpecialistsRunning,
    SpecialistsDone,
    SynthesisRunning,
    Complete,
}

impl OrchestrationPhase {
    /// The phase that follows this one, if any.
    pub fn successor(self) -> Option<Self> {
        use OrchestrationPhase::*;
        match self {
            Initialized => Some(DiscoveryRunning),
            DiscoveryRunning => Some(DiscoveryDone),
            DiscoveryDone => Some(SpecialistsRunning),
            SpecialistsRunning => Some(SpecialistsDone),
            SpecialistsDone => Some(SynthesisRunning),
            SynthesisRunning => Some(Complete),
            Complete => None,
        }
    }

    /// Move to `next`, which must be the immediate successor.
    pub fn advance(&mut self, next: Self) -> Result<(), PhaseError> {
        if next == *self {
            return Err(PhaseError::Unchanged(next));
        }
        if next < *self {
            return Err(PhaseError::Backward { from: *self, to: next });
        }
        if self.successor() != Some(next) {
            return Err(PhaseError::Skipped { from: *self, to: next });
        }
        *self = next;
        Ok(())
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initialized => "initialized",
            Self::DiscoveryRunning => "discovery_running",
            Self::DiscoveryDone => "discovery_done",
            Self::SpecialistsRunning => "specialists_running",
            Self::SpecialistsDone => "specialists_done",
            Self::SynthesisRunning => "synthesis_running",
            Self::Complete => "complete",
        }
    }
}

impl fmt::Display for OrchestrationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::OrchestrationPhase::*;
    use super::*;

    #[test]
    fn walks_forward_to_complete() {
        let mut phase = Initialized;
        let mut visited = vec![phase];
        while let Some(next) = phase.successor() {
            phase.advance(next).unwrap();
            visited.push(phase);
        }
        assert_eq!(visited.len(), 7);
        assert_eq!(phase, Complete);
    }

    #[test]
    fn backward_and_skips_are_rejected() {
        let mut phase = SpecialistsRunning;
        assert_eq!(
            phase.advance(DiscoveryDone),
            Err(PhaseError::Backward {
                from: SpecialistsRunning,
                to: DiscoveryDone
            })
        );
        assert_eq!(
            phase.advance(Complete),
            Err(PhaseError::Skipped {
                from: SpecialistsRunning,
                to: Complete
            })
        );
        assert_eq!(phase.advance(SpecialistsRunning), Err(PhaseError::Unchanged(SpecialistsRunning)));
        assert_eq!(phase, SpecialistsRunning);
    }
}
