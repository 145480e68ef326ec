//! Episode segmenter
//!
//! Turns one device's merged timeline into fault episodes in two phases:
//!
//! 1. **Boundaries** - a RUNNING/STOPPED state machine walks the timeline and
//!    records STOP and START sentinels, collapsing repeats of the same kind
//!    (debounce). A leading START is then discarded, and a trailing STOP is
//!    closed with a synthetic boundary on the last event of the timeline.
//!    A leading STOP is kept: the timeline opens on a real stop, so it pairs
//!    with the next START like any other and still needs a trigger in the
//!    window to become an episode.
//! 2. **Triggers** - each (STOP, START) pair becomes a candidate episode. The
//!    trigger is the first fault-class event, in timeline order, within
//!    `[stop_time - W, stop_time + W]` of the whole timeline. Pairs with no
//!    such event are omitted and counted as unresolved.
//!
//! Debouncing has to finish before pairing, otherwise every sentinel flap
//! would open a new episode with a stale search window.

use crate::codemap::{CodeMap, NO_CODE_MAP};
use crate::config::DetectionConfig;
use crate::types::{Boundary, FaultEpisode, RawEvent, SentinelKind, Timestamp};

/// Result of segmenting one device timeline
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SegmentOutcome {
    /// Episodes in stop-time order
    pub episodes: Vec<FaultEpisode>,
    /// Stop/start pairs without a trigger in the window
    pub unresolved: usize,
    /// Triggers whose code is absent from the code map
    pub unmapped: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MachineState {
    Running,
    Stopped,
}

/// Boundary state machine (phase 1, before post-processing)
struct BoundaryMachine {
    state: MachineState,
    boundaries: Vec<Boundary>,
}

impl BoundaryMachine {
    fn new() -> Self {
        Self {
            state: MachineState::Running,
            boundaries: Vec::new(),
        }
    }

    fn feed(&mut self, index: usize, kind: SentinelKind) {
        let record = match (self.state, kind) {
            (_, SentinelKind::Other) => false,
            (MachineState::Running, SentinelKind::Stop) => {
                self.state = MachineState::Stopped;
                true
            }
            (MachineState::Stopped, SentinelKind::Start) => {
                self.state = MachineState::Running;
                true
            }
            // A START before anything else was observed still counts as a
            // boundary; post-processing discards it.
            (MachineState::Running, SentinelKind::Start) => self.boundaries.is_empty(),
            (MachineState::Stopped, SentinelKind::Stop) => false,
        };

        if record {
            self.boundaries.push(Boundary {
                index,
                kind,
                synthetic: false,
            });
        }
    }
}

/// Debounced, alternating boundary list for a sorted timeline
///
/// The result starts with a STOP and alternates STOP, START, STOP, ...; if it
/// is non-empty, it has even length, and the last START may be synthetic.
pub fn collect_boundaries(timeline: &[RawEvent], detection: &DetectionConfig) -> Vec<Boundary> {
    let mut machine = BoundaryMachine::new();
    for (index, event) in timeline.iter().enumerate() {
        machine.feed(index, detection.classify(&event.description_en));
    }

    let mut boundaries = machine.boundaries;

    // The STOP belonging to a leading START lies before the window
    if boundaries.first().map(|b| b.kind) == Some(SentinelKind::Start) {
        boundaries.remove(0);
    }

    // Still stopped at the end of the data: close on the last event
    if boundaries.last().map(|b| b.kind) == Some(SentinelKind::Stop) {
        boundaries.push(Boundary {
            index: timeline.len() - 1,
            kind: SentinelKind::Start,
            synthetic: true,
        });
    }

    boundaries
}

/// First trigger candidate within the window around `stop_time`
///
/// `timeline` must be sorted by timestamp. Ties are resolved by timeline
/// order, so the earliest file/row wins.
pub fn find_trigger<'a>(
    timeline: &'a [RawEvent],
    stop_time: Timestamp,
    detection: &DetectionConfig,
) -> Option<&'a RawEvent> {
    let window = detection.trigger_window();
    let (lo, hi) = (stop_time - window, stop_time + window);

    let first = timeline.partition_point(|e| e.timestamp < lo);
    timeline[first..]
        .iter()
        .take_while(|e| e.timestamp <= hi)
        .find(|e| detection.is_trigger_candidate(&e.description_en))
}

/// Extract the fault episodes of one device timeline
pub fn segment(
    timeline: &[RawEvent],
    detection: &DetectionConfig,
    code_map: Option<&CodeMap>,
) -> SegmentOutcome {
    let mut outcome = SegmentOutcome::default();
    let boundaries = collect_boundaries(timeline, detection);

    for pair in boundaries.chunks_exact(2) {
        let stop = &timeline[pair[0].index];
        let end = &timeline[pair[1].index];

        let Some(trigger) = find_trigger(timeline, stop.timestamp, detection) else {
            log::debug!(
                "Device {}: no trigger within {}s of stop at {} ({}:{})",
                stop.device_id,
                detection.trigger_window_secs,
                stop.timestamp,
                stop.source_file,
                stop.row_number
            );
            outcome.unresolved += 1;
            continue;
        };

        let description_cn = match code_map {
            Some(map) => match map.lookup(&trigger.code) {
                Some(entry) => entry.description.clone(),
                None => {
                    outcome.unmapped += 1;
                    map.describe(&trigger.code).to_string()
                }
            },
            None => NO_CODE_MAP.to_string(),
        };

        outcome.episodes.push(FaultEpisode {
            device_id: stop.device_id.clone(),
            source_file: stop.source_file.clone(),
            stop_row: stop.row_number,
            fault_row: trigger.row_number,
            stop_time: stop.timestamp,
            fault_time: trigger.timestamp,
            code: trigger.code.clone(),
            description_en: trigger.description_en.clone(),
            description_cn,
            duration: end.timestamp - stop.timestamp,
        });
    }

    outcome
}
