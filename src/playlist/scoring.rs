//! Scoring Core (spec §4.5): per-candidate, per-slot score combining
//! tempo/energy/danceability fit with the bonus stack, plus the hard
//! gates applied before scoring. Generalizes the teacher's
//! `scoring::PlaylistScoring`.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::models::{ArtistId, Candidate, Decade, EffortTier, Segment, Slot, SourceLayer, Template, Umbrella};
use crate::playlist::umbrella as umbrella_svc;

/// Per-tier `(tempo, energy, dance)` weights feeding `effort_index`.
/// Tempo's share rises with intensity; dance stays flat.
fn tier_weights(tier: EffortTier) -> (f64, f64, f64) {
    match tier {
        EffortTier::Easy => (0.56, 0.34, 0.10),
        EffortTier::Moderate => (0.59, 0.31, 0.10),
        EffortTier::Strong => (0.61, 0.29, 0.10),
        EffortTier::Hard => (0.63, 0.27, 0.10),
        EffortTier::Max => (0.65, 0.25, 0.10),
    }
}

fn tier_energy_floor(tier: EffortTier) -> Option<f64> {
    match tier {
        EffortTier::Easy => None,
        EffortTier::Moderate => Some(0.35),
        EffortTier::Strong => Some(0.45),
        EffortTier::Hard => Some(0.55),
        EffortTier::Max => Some(0.65),
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ScoreBreakdown {
    pub total: f64,
    pub tempo_fit: f64,
    pub effort_index: f64,
    pub slot_fit: f64,
}

/// Everything the bonus stack needs beyond the candidate and slot
/// themselves, owned by the Selector's running state.
pub struct ScoreContext<'a> {
    pub now: DateTime<Utc>,
    pub anchor_bpm: f64,
    pub tolerance_bpm: f64,
    /// Last up to 7 chosen artist ids, oldest first.
    pub recent_artists: &'a [ArtistId],
    /// Genres and release year of every track chosen so far this run.
    pub chosen_genres_and_decades: &'a [(Vec<String>, Option<i32>)],
    /// Latest `lastUsedAt` seen anywhere in the catalog for each artist id.
    pub artist_last_used: &'a HashMap<ArtistId, DateTime<Utc>>,
    pub umbrella_counts: &'a HashMap<Umbrella, usize>,
    pub selected_umbrellas: &'a [Umbrella],
    pub chosen_rediscovery_count: usize,
    pub target_total_slots: usize,
    pub last_tempo: Option<f64>,
}

fn energy_shaping(tier: EffortTier, energy: f64) -> f64 {
    match tier {
        EffortTier::Easy => {
            if energy > 0.70 {
                let frac = ((energy - 0.70) / 0.30).clamp(0.0, 1.0);
                -0.12 * frac
            } else {
                0.0
            }
        }
        _ => match tier_energy_floor(tier) {
            Some(floor) if energy < floor => {
                let frac = ((floor - energy) / floor).clamp(0.0, 1.0);
                -0.10 * frac
            }
            _ => 0.0,
        },
    }
}

fn recency_bonus(last_used_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> f64 {
    let penalty = match last_used_at {
        None => 0.0,
        Some(t) => {
            let days_since = (now - t).num_days() as f64;
            (1.0 - days_since / 10.0).max(0.0)
        }
    };
    0.10 * (1.0 - penalty)
}

fn artist_spacing_bonus(artist_id: &str, recent: &[ArtistId]) -> f64 {
    match recent.iter().rev().position(|a| a == artist_id) {
        Some(pos) => {
            let dist = (pos + 1) as f64;
            0.16 * ((dist - 1.0) / 6.0).clamp(0.0, 1.0)
        }
        None => 0.16,
    }
}

fn diversity_bonus(candidate: &Candidate, chosen: &[(Vec<String>, Option<i32>)]) -> f64 {
    if chosen.is_empty() {
        return 0.10;
    }
    let total = chosen.len() as f64;

    let genres = candidate.artist_genres();
    let genre_component = if genres.is_empty() {
        0.0
    } else {
        let hist_count = chosen
            .iter()
            .filter(|(g, _)| g.iter().any(|tag| genres.contains(tag)))
            .count() as f64;
        ((total - hist_count) / total).max(0.0) * 0.05
    };

    let decade_component = match candidate.track.album_release_year.and_then(Decade::of_year) {
        Some(decade) => {
            let hist_count = chosen
                .iter()
                .filter(|(_, year)| year.and_then(Decade::of_year) == Some(decade))
                .count() as f64;
            ((total - hist_count) / total).max(0.0) * 0.05
        }
        None => 0.0,
    };

    (genre_component + decade_component).min(0.10)
}

fn artist_novelty_bonus(artist_id: &str, artist_last_used: &HashMap<ArtistId, DateTime<Utc>>, now: DateTime<Utc>) -> f64 {
    match artist_last_used.get(artist_id) {
        None => 0.06,
        Some(last) => {
            let days_since = (now - *last).num_days() as f64;
            if days_since > 10.0 {
                0.08 * ((days_since - 10.0) / 20.0).clamp(0.0, 1.0)
            } else {
                0.0
            }
        }
    }
}

fn umbrella_balance_bonus(candidate: &Candidate, ctx: &ScoreContext) -> f64 {
    if ctx.selected_umbrellas.len() <= 1 {
        return 0.0;
    }
    let best = candidate
        .artist_genres()
        .iter()
        .filter_map(|g| umbrella_svc::classify(g))
        .find(|u| ctx.selected_umbrellas.contains(u));
    let best = match best {
        Some(u) => u,
        None => return 0.0,
    };

    let total: usize = ctx.umbrella_counts.values().sum();
    let uniform = 1.0 / ctx.selected_umbrellas.len() as f64;
    let share = if total == 0 {
        0.0
    } else {
        *ctx.umbrella_counts.get(&best).unwrap_or(&0) as f64 / total as f64
    };
    let deficit = (uniform - share).max(0.0);
    let surplus = (share - uniform).max(0.0);
    0.12 * deficit * 0.60 - 0.05 * surplus * 0.25
}

fn rediscovery_bias(candidate: &Candidate, ctx: &ScoreContext) -> f64 {
    if !candidate.is_rediscovery {
        return 0.0;
    }
    let target = (ctx.target_total_slots / 2).max(1) as f64;
    let chosen = ctx.chosen_rediscovery_count as f64;
    let bias = ((target - chosen) / target).clamp(0.0, 1.0);
    0.05 * bias
}

fn source_bias(source: SourceLayer) -> f64 {
    match source {
        SourceLayer::Tertiary => 0.0,
        _ => 0.03,
    }
}

fn transition_bonus(prev_tempo: Option<f64>, current_tempo: Option<f64>) -> f64 {
    match (prev_tempo, current_tempo) {
        (Some(p), Some(c)) => {
            let delta = (p - c).abs();
            if delta <= 15.0 {
                0.10
            } else if delta <= 25.0 {
                0.05
            } else if delta > 40.0 {
                -0.05
            } else {
                0.0
            }
        }
        _ => 0.0,
    }
}

/// Scores one candidate against one slot. Does not apply hard gates.
/// Callers run `passes_hard_gates` first.
pub fn score_candidate(candidate: &Candidate, slot: &Slot, ctx: &ScoreContext) -> ScoreBreakdown {
    let (w_tempo, w_energy, w_dance) = tier_weights(slot.effort);
    let tempo_fit = crate::playlist::pace::tempo_fit(
        candidate.feature.tempo,
        candidate.feature.energy,
        candidate.feature.danceability,
        ctx.anchor_bpm,
        slot.effort,
        ctx.tolerance_bpm,
    );
    let energy = candidate.feature.energy.unwrap_or(0.5);
    let dance = candidate.feature.danceability.unwrap_or(0.5);
    let effort_index = w_tempo * tempo_fit + w_energy * energy + w_dance * dance;

    let slot_fit = (1.0 - (effort_index - slot.target_effort).abs()).max(0.0);
    let base = 0.60 * slot_fit;
    let shaping = energy_shaping(slot.effort, energy);

    let bonuses = recency_bonus(candidate.last_used_at, ctx.now)
        + artist_spacing_bonus(&candidate.track.artist_id, ctx.recent_artists)
        + diversity_bonus(candidate, ctx.chosen_genres_and_decades)
        + artist_novelty_bonus(&candidate.track.artist_id, ctx.artist_last_used, ctx.now)
        + 0.08 * candidate.genre_affinity
        + umbrella_balance_bonus(candidate, ctx)
        + rediscovery_bias(candidate, ctx)
        + source_bias(candidate.source)
        + transition_bonus(ctx.last_tempo, candidate.feature.tempo);

    let total = (base + shaping + bonuses).max(0.0);

    ScoreBreakdown {
        total,
        tempo_fit,
        effort_index,
        slot_fit,
    }
}

/// Everything the hard gates (spec §4.5) need from the Selector's running
/// state.
pub struct GateContext<'a> {
    pub template: Template,
    pub last_artist: Option<&'a str>,
    pub artist_counts: &'a HashMap<ArtistId, usize>,
    pub per_artist_cap: usize,
    pub max_tier_used: bool,
    pub kicker_hard_count: usize,
    pub fairness_umbrella: Option<Umbrella>,
}

/// Applies the hard gates in order, short-circuiting on the first failure.
pub fn passes_hard_gates(candidate: &Candidate, slot: &Slot, tempo_fit: f64, min_fit: f64, gates: &GateContext) -> bool {
    if tempo_fit < min_fit {
        return false;
    }
    if matches!(slot.segment, Segment::Warmup | Segment::Cooldown) && candidate.duration_seconds() < 90 {
        return false;
    }
    if gates.last_artist == Some(candidate.track.artist_id.as_str()) {
        return false;
    }
    let current_count = *gates.artist_counts.get(&candidate.track.artist_id).unwrap_or(&0);
    if current_count >= gates.per_artist_cap {
        return false;
    }
    if slot.effort == EffortTier::Max && gates.max_tier_used {
        return false;
    }
    if gates.template == Template::Kicker && slot.effort == EffortTier::Hard && gates.kicker_hard_count >= 2 {
        return false;
    }
    if let Some(required) = gates.fairness_umbrella {
        let matches_required = candidate
            .artist_genres()
            .iter()
            .filter_map(|g| umbrella_svc::classify(g))
            .any(|u| u == required);
        if !matches_required {
            return false;
        }
    }
    true
}
