//! Subsession splitting at anomalous idle gaps.
//!
//! A long pause inside a session usually means the user left and came back.
//! Rather than a fixed threshold, each session's own gap distribution is
//! modelled with a [`GapAnomalyDetector`] and the outlier gaps become split
//! points.

use chrono::Duration;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::anomaly::{ForestConfig, GapAnomalyDetector, IsolationForest};
use crate::event::Event;
use crate::segment::Session;
use crate::types::{SessionId, SubsessionId};

const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// Configuration for subsession splitting.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitterConfig {
    /// Fraction of a session's gaps used to fit the detector. Default: 0.1.
    pub sample_fraction: f64,

    /// Lower bound on the fit sample size (capped at the session length), so
    /// short sessions are still modelled. Default: 16.
    pub min_sample_size: usize,

    /// Isolation forest parameters; its seed also drives gap sampling.
    pub forest: ForestConfig,
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            sample_fraction: 0.1,
            min_sample_size: 16,
            forest: ForestConfig::default(),
        }
    }
}

/// Time elapsed since the previous event of the same session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ClickGap(Duration);

impl ClickGap {
    /// The gap of a session's first event.
    pub const ZERO: Self = Self(Duration::zero());

    /// Returns the exact gap.
    pub const fn duration(self) -> Duration {
        self.0
    }

    /// Returns the gap in (fractional) days.
    #[expect(clippy::cast_precision_loss, reason = "gaps are far below 2^52 ms")]
    pub fn days(self) -> f64 {
        self.0.num_milliseconds() as f64 / MILLIS_PER_DAY
    }

    /// True for events at the same instant as their predecessor.
    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }
}

/// An event paired with its gap to the previous event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimedEvent {
    pub event: Event,
    pub click_gap: ClickGap,
}

/// A contiguous slice of a session between outlier gaps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subsession {
    /// `{session}__{ordinal}`.
    pub id: SubsessionId,
    /// The owning session.
    pub session_id: SessionId,
    /// Number of outlier gaps seen up to and including this slice's first event.
    pub ordinal: usize,
    /// Time-ordered events with their gaps.
    pub events: Vec<TimedEvent>,
}

/// Computes each event's gap to its predecessor; the first gap is zero.
///
/// Events must be sorted by timestamp.
pub fn click_gaps(events: &[Event]) -> Vec<ClickGap> {
    let mut gaps = Vec::with_capacity(events.len());
    let mut previous = None;
    for event in events {
        gaps.push(previous.map_or(ClickGap::ZERO, |prev| {
            ClickGap(event.event_timestamp - prev)
        }));
        previous = Some(event.event_timestamp);
    }
    gaps
}

/// Splits a session with the default isolation forest.
pub fn split_subsessions(session: Session, config: &SplitterConfig) -> Vec<Subsession> {
    let mut detector = IsolationForest::new(config.forest.clone());
    split_subsessions_with(session, config, &mut detector)
}

/// Splits a session using `detector` to find outlier gaps.
///
/// The result always covers every event of the session exactly once, in
/// order. The first event never opens a new subsession, so the first
/// subsession has ordinal 0.
pub fn split_subsessions_with(
    session: Session,
    config: &SplitterConfig,
    detector: &mut dyn GapAnomalyDetector,
) -> Vec<Subsession> {
    let gaps = click_gaps(&session.events);
    let outliers = outlier_gaps(&session.id, &gaps, config, detector);

    let mut subsessions: Vec<Subsession> = Vec::new();
    let mut ordinal = 0usize;

    for ((event, click_gap), outlier) in session.events.into_iter().zip(gaps).zip(outliers) {
        if outlier {
            ordinal += 1;
        }
        let timed = TimedEvent { event, click_gap };
        match subsessions.last_mut() {
            Some(current) if current.ordinal == ordinal => current.events.push(timed),
            _ => subsessions.push(Subsession {
                id: SubsessionId::for_session(&session.id, ordinal),
                session_id: session.id.clone(),
                ordinal,
                events: vec![timed],
            }),
        }
    }

    subsessions
}

/// Flags outlier gaps; a failed fit means no outliers.
fn outlier_gaps(
    session_id: &SessionId,
    gaps: &[ClickGap],
    config: &SplitterConfig,
    detector: &mut dyn GapAnomalyDetector,
) -> Vec<bool> {
    let days: Vec<f64> = gaps.iter().map(|g| g.days()).collect();
    let sample = sample_gaps(&days, config);

    let mut flags = match detector.fit(&sample) {
        Ok(()) => detector.predict(&days),
        Err(e) => {
            tracing::debug!(session = %session_id, error = %e, "gap model not fitted, keeping session whole");
            vec![false; days.len()]
        }
    };
    flags.resize(days.len(), false);

    // The first gap is a placeholder, not an observed pause.
    if let Some(first) = flags.first_mut() {
        *first = false;
    }
    flags
}

/// Draws the fit sample uniformly without replacement.
#[expect(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss,
    reason = "sample sizes are small non-negative counts"
)]
fn sample_gaps(days: &[f64], config: &SplitterConfig) -> Vec<f64> {
    let n = days.len();
    let by_fraction = (n as f64 * config.sample_fraction.clamp(0.0, 1.0)).round() as usize;
    let size = by_fraction.max(config.min_sample_size.min(n)).min(n);

    let mut rng = StdRng::seed_from_u64(config.forest.seed);
    days.choose_multiple(&mut rng, size).copied().collect()
}
