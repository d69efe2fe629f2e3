//! Pace/Tempo Model (spec §4.1): maps a user pace bucket or explicit
//! cadence override to a target BPM window per effort tier, and scores
//! how well a candidate's tempo fits that window.

use crate::models::EffortTier;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaceBucket {
    A,
    B,
    C,
    D,
}

impl PaceBucket {
    pub fn parse(raw: &str) -> Option<PaceBucket> {
        match raw.to_uppercase().as_str() {
            "A" => Some(PaceBucket::A),
            "B" => Some(PaceBucket::B),
            "C" => Some(PaceBucket::C),
            "D" => Some(PaceBucket::D),
            _ => None,
        }
    }
}

const MIN_OVERRIDE_SPM: f64 = 80.0;
const MAX_OVERRIDE_SPM: f64 = 220.0;

/// Cadence anchor in steps/beats per minute. An explicit steps-per-minute
/// override, if in range, replaces the bucket anchor.
pub fn cadence_anchor(bucket: PaceBucket, override_spm: Option<f64>) -> f64 {
    if let Some(spm) = override_spm {
        if (MIN_OVERRIDE_SPM..=MAX_OVERRIDE_SPM).contains(&spm) {
            return spm;
        }
    }
    match bucket {
        PaceBucket::A => 158.0,
        PaceBucket::B => 165.0,
        PaceBucket::C => 172.0,
        PaceBucket::D => 178.0,
    }
}

/// Target BPM window for a tier, scaled off the cadence anchor. The
/// source material describes three scaling bands (easy, moderate/steady,
/// hard); resolved here to one window per tier of the 5-tier order, with
/// `strong` interpolated between the moderate and hard bands and `max`
/// extended past hard (see DESIGN.md).
pub fn tempo_window(anchor: f64, tier: EffortTier) -> (f64, f64) {
    match tier {
        EffortTier::Easy => (0.90 * anchor, 1.00 * anchor),
        EffortTier::Moderate => (1.00 * anchor, 1.05 * anchor),
        EffortTier::Strong => (1.025 * anchor, 1.075 * anchor),
        EffortTier::Hard => (1.05 * anchor, 1.10 * anchor),
        EffortTier::Max => (1.08 * anchor, 1.15 * anchor),
    }
}

/// Per-tier tempo-fit tolerance (BPM) and hard-gate minimum fit.
pub fn tier_tolerance_and_min_fit(tier: EffortTier) -> (f64, f64) {
    match tier {
        EffortTier::Easy => (15.0, 0.35),
        EffortTier::Moderate => (12.0, 0.42),
        EffortTier::Strong => (10.0, 0.50),
        EffortTier::Hard => (8.0, 0.55),
        EffortTier::Max => (6.0, 0.60),
    }
}

/// Tempo fit in `[0,1]`. Considers the track tempo itself plus its
/// half-time and double-time readings, taking whichever lands closest to
/// (or inside) the tier's window. Falls back to an energy/danceability
/// proxy when tempo is missing.
pub fn tempo_fit(
    tempo_bpm: Option<f64>,
    energy: Option<f64>,
    danceability: Option<f64>,
    anchor: f64,
    tier: EffortTier,
    tolerance_bpm: f64,
) -> f64 {
    match tempo_bpm {
        Some(t) if t > 0.0 => {
            let (min_bpm, max_bpm) = tempo_window(anchor, tier);
            let candidates = [t, t / 2.0, 2.0 * t];
            let best_distance = candidates
                .iter()
                .map(|&c| (min_bpm - c).max(c - max_bpm).max(0.0))
                .fold(f64::INFINITY, f64::min);

            if best_distance <= 0.0 {
                1.0
            } else {
                (1.0 - best_distance / tolerance_bpm).max(0.0)
            }
        }
        _ => match (energy, danceability) {
            (Some(e), Some(d)) => ((0.6 * e + 0.4 * d) * 0.9).clamp(0.0, 1.0),
            _ => 0.45,
        },
    }
}
