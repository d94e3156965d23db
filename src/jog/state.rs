use crate::engine::TimerToken;
use crate::jog::estimator::RateEstimator;

/// Scratch bookkeeping for one deck.
///
/// `active` mirrors whether the transport currently has the simulation
/// enabled. While it is set, the pending release timer is the only thing that
/// will switch it off again.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SimulationHandle {
    pub active: bool,
    pub pending_release: Option<TimerToken>,
}

/// Everything the handler remembers about one deck between events.
#[derive(Debug)]
pub struct DeckState {
    pub estimator: Box<dyn RateEstimator>,
    pub simulation: SimulationHandle,
}

impl DeckState {
    pub fn new(estimator: Box<dyn RateEstimator>) -> Self {
        Self {
            estimator,
            simulation: SimulationHandle::default(),
        }
    }
}
