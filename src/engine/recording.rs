//! Recording doubles for the transport and timer seams.
//!
//! [`RecordingTransport`] logs every call and can script the play flag per
//! poll. [`ManualTimerScheduler`] keeps its own virtual clock; advancing it
//! hands back the expiries that became due, which the test then delivers to the
//! handler exactly as the dispatcher would.

use super::{ScratchParameters, TimerScheduler, TimerToken, TransportEngine};
use crate::controller::decoder::Deck;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::time::Duration;

#[derive(Clone, Debug, PartialEq)]
pub enum TransportCall {
    Enable(Deck, ScratchParameters),
    Tick(Deck, f64),
    Disable(Deck),
    SetPosition(Deck, f64),
}

#[derive(Debug, Default)]
pub struct RecordingTransport {
    playing: HashMap<Deck, bool>,
    scripted: HashMap<Deck, VecDeque<bool>>,
    positions: HashMap<Deck, f64>,
    calls: Vec<TransportCall>,
    playback_queries: usize,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_playing(&mut self, deck: Deck, playing: bool) {
        self.playing.insert(deck, playing);
    }

    /// Queues answers for the next polls of `deck`; once drained, the value set
    /// with [`RecordingTransport::set_playing`] applies again.
    pub fn script_playback(&mut self, deck: Deck, answers: impl IntoIterator<Item = bool>) {
        self.scripted.entry(deck).or_default().extend(answers);
    }

    pub fn set_position_raw(&mut self, deck: Deck, position: f64) {
        self.positions.insert(deck, position);
    }

    pub fn calls(&self) -> &[TransportCall] {
        &self.calls
    }

    pub fn playback_queries(&self) -> usize {
        self.playback_queries
    }

    pub fn enable_count(&self, deck: Deck) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, TransportCall::Enable(d, _) if *d == deck))
            .count()
    }

    pub fn disable_count(&self, deck: Deck) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, TransportCall::Disable(d) if *d == deck))
            .count()
    }

    pub fn ticks(&self, deck: Deck) -> Vec<f64> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                TransportCall::Tick(d, tick) if *d == deck => Some(*tick),
                _ => None,
            })
            .collect()
    }

    pub fn current_position(&self, deck: Deck) -> f64 {
        self.positions.get(&deck).copied().unwrap_or(0.0)
    }
}

impl TransportEngine for RecordingTransport {
    fn playback_active(&mut self, deck: Deck) -> bool {
        self.playback_queries += 1;
        if let Some(answer) = self.scripted.get_mut(&deck).and_then(VecDeque::pop_front) {
            return answer;
        }
        self.playing.get(&deck).copied().unwrap_or(false)
    }

    fn position(&mut self, deck: Deck) -> f64 {
        self.current_position(deck)
    }

    fn set_position(&mut self, deck: Deck, position: f64) {
        self.positions.insert(deck, position);
        self.calls.push(TransportCall::SetPosition(deck, position));
    }

    fn enable_inertial_simulation(&mut self, deck: Deck, params: ScratchParameters) {
        self.calls.push(TransportCall::Enable(deck, params));
    }

    fn feed_inertial_tick(&mut self, deck: Deck, tick: f64) {
        self.calls.push(TransportCall::Tick(deck, tick));
    }

    fn disable_inertial_simulation(&mut self, deck: Deck) {
        self.calls.push(TransportCall::Disable(deck));
    }
}

#[derive(Debug, Default)]
pub struct ManualTimerScheduler {
    now: Duration,
    next_token: u64,
    // token -> (deck, deadline)
    pending: BTreeMap<TimerToken, (Deck, Duration)>,
    scheduled: Vec<(TimerToken, Deck, Duration)>,
    cancelled: Vec<TimerToken>,
}

impl ManualTimerScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Timers scheduled and neither cancelled nor fired yet.
    pub fn outstanding(&self) -> usize {
        self.pending.len()
    }

    pub fn outstanding_for(&self, deck: Deck) -> usize {
        self.pending.values().filter(|(d, _)| *d == deck).count()
    }

    pub fn scheduled(&self) -> &[(TimerToken, Deck, Duration)] {
        &self.scheduled
    }

    /// Tokens that were cancelled while still pending.
    pub fn cancelled(&self) -> &[TimerToken] {
        &self.cancelled
    }

    /// Moves the virtual clock forward and returns the expiries now due, in
    /// deadline order. Each timer is returned at most once.
    pub fn advance(&mut self, by: Duration) -> Vec<(Deck, TimerToken)> {
        self.now += by;
        let now = self.now;
        let mut due: Vec<(Duration, TimerToken, Deck)> = self
            .pending
            .iter()
            .filter(|(_, (_, deadline))| *deadline <= now)
            .map(|(token, (deck, deadline))| (*deadline, *token, *deck))
            .collect();
        due.sort();
        for (_, token, _) in &due {
            self.pending.remove(token);
        }
        due.into_iter().map(|(_, token, deck)| (deck, token)).collect()
    }
}

impl TimerScheduler for ManualTimerScheduler {
    fn schedule_release(&mut self, deck: Deck, delay: Duration) -> TimerToken {
        self.next_token += 1;
        let token = TimerToken(self.next_token);
        self.pending.insert(token, (deck, self.now + delay));
        self.scheduled.push((token, deck, delay));
        token
    }

    fn cancel(&mut self, token: TimerToken) {
        if self.pending.remove(&token).is_some() {
            self.cancelled.push(token);
        }
    }
}
