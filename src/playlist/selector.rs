//! Selector (spec §4.6): the orchestrator loop. Iterates the timeline,
//! gates and scores the pool, picks a weighted top-K winner per slot,
//! progressively relaxes when a slot can't be filled, then runs the
//! tail-extension / cooldown-reconcile post-pass. Generalizes the
//! teacher's `generator::PlaylistGenerator::generate_playlist`
//! sort-then-truncate into a real per-slot state machine.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::catalog::CatalogIndex;
use crate::models::{
    ArtistId, Candidate, ChosenTrack, EffortTier, Segment, Slot, SourceLayer, Template, TrackId, Umbrella,
};
use crate::music_service::MusicService;
use crate::playlist::pace::{self, PaceBucket};
use crate::playlist::pool::Pool;
use crate::playlist::scoring::{self, GateContext, ScoreBreakdown, ScoreContext};
use crate::playlist::timeline::{self, DurationPlan};
use crate::playlist::umbrella as umbrella_svc;
use crate::usage_store::UsageIndex;

const RECENT_ARTIST_WINDOW: usize = 7;
const MAX_NEIGHBOR_RELAX_SLOTS: usize = 2;
const TAIL_EXTENSION_GUARD: usize = 64;
const COOLDOWN_RECONCILE_GUARD: usize = 64;

fn top_k_for(tier: EffortTier) -> usize {
    match tier {
        EffortTier::Easy => 25,
        EffortTier::Moderate => 15,
        _ => 8,
    }
}

/// One relaxation attempt: which tiers to score the pool against, the
/// gate applied in place of the normal tempo-fit minimum, and which pool
/// to draw from.
enum Gate {
    TempoMin(f64),
    SlotFitMin(f64),
}

struct Attempt<'a> {
    candidates: &'a [Candidate],
    tiers: Vec<EffortTier>,
    gate: Gate,
}

/// Hard gate 6 (spec §4.5): in warmup/cooldown, if one of the selected
/// umbrellas has fallen more than 0.10 below an even share of what's been
/// chosen so far, restrict this slot to that umbrella.
fn fairness_umbrella_for_slot(slot: &Slot, state: &SelectorState, genres: &[Umbrella]) -> Option<Umbrella> {
    if !matches!(slot.segment, Segment::Warmup | Segment::Cooldown) {
        return None;
    }
    if genres.len() <= 1 {
        return None;
    }
    let total: usize = state.umbrella_counts.values().sum();
    if total == 0 {
        return None;
    }
    let uniform = 1.0 / genres.len() as f64;
    genres
        .iter()
        .find(|u| {
            let share = *state.umbrella_counts.get(u).unwrap_or(&0) as f64 / total as f64;
            uniform - share > 0.10
        })
        .copied()
}

struct SelectorState {
    selected_ids: HashSet<TrackId>,
    artist_counts: HashMap<ArtistId, usize>,
    recent_artists: Vec<ArtistId>,
    umbrella_counts: HashMap<Umbrella, usize>,
    chosen: Vec<ChosenTrack>,
    seconds_so_far: u32,
    warmup_seconds: u32,
    main_seconds: u32,
    cooldown_seconds: u32,
    chosen_rediscovery_count: usize,
    max_tier_used: bool,
    kicker_hard_count: usize,
    neighbor_relax_count: usize,
    lockout_break_used: bool,
    last_tempo: Option<f64>,
    last_artist: Option<ArtistId>,
}

impl SelectorState {
    fn new() -> Self {
        SelectorState {
            selected_ids: HashSet::new(),
            artist_counts: HashMap::new(),
            recent_artists: Vec::new(),
            umbrella_counts: HashMap::new(),
            chosen: Vec::new(),
            seconds_so_far: 0,
            warmup_seconds: 0,
            main_seconds: 0,
            cooldown_seconds: 0,
            chosen_rediscovery_count: 0,
            max_tier_used: false,
            kicker_hard_count: 0,
            neighbor_relax_count: 0,
            lockout_break_used: false,
            last_tempo: None,
            last_artist: None,
        }
    }
}

pub struct SelectionOutcome {
    pub chosen: Vec<ChosenTrack>,
    pub duration_plan: DurationPlan,
    pub neighbor_relax_slots: usize,
    pub lockout_breaks: usize,
    pub used_neighbor_broadening: bool,
    pub debug_lines: Vec<String>,
    pub min_target_seconds: u32,
    pub max_target_seconds: u32,
}

fn build_artist_last_used(catalog: &CatalogIndex, usage: &UsageIndex) -> HashMap<ArtistId, DateTime<Utc>> {
    let mut map: HashMap<ArtistId, DateTime<Utc>> = HashMap::new();
    for track in catalog.tracks.values() {
        if let Some(last) = usage.last_used_at(&track.id) {
            map.entry(track.artist_id.clone())
                .and_modify(|existing| {
                    if last > *existing {
                        *existing = last;
                    }
                })
                .or_insert(last);
        }
    }
    map
}

fn best_umbrella(candidate: &Candidate) -> Option<Umbrella> {
    candidate.artist_genres().iter().find_map(|g| umbrella_svc::classify(g))
}

#[allow(clippy::too_many_arguments)]
fn duration_ok(segment: Segment, duration_seconds: u32, state: &SelectorState, plan: &DurationPlan, max_target_seconds: u32) -> bool {
    match segment {
        Segment::Warmup => {
            state.warmup_seconds + duration_seconds <= plan.warmup_target_seconds() + 60
                && state.seconds_so_far + duration_seconds + plan.cooldown_target_seconds() <= max_target_seconds
        }
        Segment::Cooldown => state.cooldown_seconds + duration_seconds <= plan.cooldown_target_seconds() + 60,
        Segment::Main => state.seconds_so_far + duration_seconds + plan.cooldown_target_seconds() <= max_target_seconds,
    }
}

/// Scores and gates one attempt's candidate pool, returning the top-K
/// winners sorted descending by score, tagged with the tier they were
/// evaluated against.
#[allow(clippy::too_many_arguments)]
fn score_attempt<'a>(
    attempt: &Attempt<'a>,
    slot: &Slot,
    state: &SelectorState,
    template: Template,
    fairness_umbrella: Option<Umbrella>,
    score_ctx: &ScoreContext,
) -> Vec<(&'a Candidate, EffortTier, ScoreBreakdown)> {
    let gates = GateContext {
        template,
        last_artist: state.last_artist.as_deref(),
        artist_counts: &state.artist_counts,
        per_artist_cap: if template == Template::Light { 1 } else { 2 },
        max_tier_used: state.max_tier_used,
        kicker_hard_count: state.kicker_hard_count,
        fairness_umbrella,
    };

    let mut scored: Vec<(&Candidate, EffortTier, ScoreBreakdown)> = Vec::new();
    for candidate in attempt.candidates {
        if state.selected_ids.contains(&candidate.track.id) {
            continue;
        }
        for &tier in &attempt.tiers {
            let synthetic = Slot { effort: tier, target_effort: slot.target_effort, segment: slot.segment };
            let breakdown = scoring::score_candidate(candidate, &synthetic, score_ctx);
            let passes_relaxed_gate = match attempt.gate {
                Gate::TempoMin(min) => breakdown.tempo_fit >= min,
                Gate::SlotFitMin(min) => breakdown.slot_fit >= min,
            };
            if !passes_relaxed_gate {
                continue;
            }
            if scoring::passes_hard_gates(candidate, &synthetic, breakdown.tempo_fit, 0.0, &gates) {
                scored.push((candidate, tier, breakdown));
            }
        }
    }

    let k = top_k_for(slot.effort);
    scored.sort_by(|a, b| b.2.total.partial_cmp(&a.2.total).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(k);
    scored
}

fn weighted_pick<'a>(
    ranked: &[(&'a Candidate, EffortTier, ScoreBreakdown)],
    rng: &mut StdRng,
) -> Option<usize> {
    if ranked.is_empty() {
        return None;
    }
    use rand::Rng;
    let weights: Vec<f64> = ranked.iter().map(|(_, _, b)| b.total.max(1e-4)).collect();
    let total: f64 = weights.iter().sum();
    let mut draw = rng.gen_range(0.0..total);
    for (i, w) in weights.iter().enumerate() {
        if draw < *w {
            return Some(i);
        }
        draw -= w;
    }
    Some(ranked.len() - 1)
}

/// A lookup failure or timeout is treated as playable, per the external
/// call fallback rules.
fn is_playable_single(music_service: &dyn MusicService, market: &str, id: &TrackId) -> bool {
    music_service
        .playable_ids(std::slice::from_ref(id), market)
        .map(|playable| playable.contains(id))
        .unwrap_or(true)
}

/// Tries one relaxation attempt end to end: score + gate, weighted pick,
/// then walk the ranked list (starting from the stochastic winner) for
/// the first candidate that also clears single-id playability preflight
/// and segment duration gating.
#[allow(clippy::too_many_arguments)]
fn try_attempt(
    attempt: &Attempt,
    slot: &Slot,
    state: &SelectorState,
    template: Template,
    plan: &DurationPlan,
    max_target_seconds: u32,
    fairness_umbrella: Option<Umbrella>,
    score_ctx: &ScoreContext,
    music_service: &dyn MusicService,
    market: &str,
    rng: &mut StdRng,
) -> Option<(TrackId, EffortTier, ScoreBreakdown)> {
    let ranked = score_attempt(attempt, slot, state, template, fairness_umbrella, score_ctx);
    let start = weighted_pick(&ranked, rng)?;

    let ordered = ranked.iter().skip(start).chain(ranked.iter().take(start));
    for (candidate, tier, breakdown) in ordered {
        if !duration_ok(slot.segment, candidate.duration_seconds(), state, plan, max_target_seconds) {
            continue;
        }
        if !is_playable_single(music_service, market, &candidate.track.id) {
            continue;
        }
        return Some((candidate.track.id.clone(), *tier, *breakdown));
    }
    None
}

#[allow(clippy::too_many_arguments)]
fn accept(
    state: &mut SelectorState,
    candidate: &Candidate,
    slot: &Slot,
    tier: EffortTier,
    breakdown: ScoreBreakdown,
    used_neighbor: bool,
    broke_lockout: bool,
) {
    let duration_seconds = candidate.duration_seconds();
    state.selected_ids.insert(candidate.track.id.clone());
    *state.artist_counts.entry(candidate.track.artist_id.clone()).or_insert(0) += 1;
    state.recent_artists.push(candidate.track.artist_id.clone());
    if state.recent_artists.len() > RECENT_ARTIST_WINDOW {
        state.recent_artists.remove(0);
    }
    if let Some(u) = best_umbrella(candidate) {
        *state.umbrella_counts.entry(u).or_insert(0) += 1;
    }

    state.seconds_so_far += duration_seconds;
    match slot.segment {
        Segment::Warmup => state.warmup_seconds += duration_seconds,
        Segment::Main => state.main_seconds += duration_seconds,
        Segment::Cooldown => state.cooldown_seconds += duration_seconds,
    }
    if candidate.is_rediscovery {
        state.chosen_rediscovery_count += 1;
    }
    if tier == EffortTier::Max {
        state.max_tier_used = true;
    }
    state.last_tempo = candidate.feature.tempo;
    state.last_artist = Some(candidate.track.artist_id.clone());
    if used_neighbor {
        state.neighbor_relax_count += 1;
    }
    if broke_lockout {
        state.lockout_break_used = true;
    }

    let index = state.chosen.len();
    let bumped_kicker_hard = tier == EffortTier::Hard;
    state.chosen.push(ChosenTrack {
        index,
        segment: slot.segment,
        effort: tier,
        target_effort: slot.target_effort,
        track_id: candidate.track.id.clone(),
        artist_id: candidate.track.artist_id.clone(),
        artist_name: candidate.artist_name(),
        track_name: candidate.track.name.clone(),
        album_release_year: candidate.track.album_release_year,
        tempo: candidate.feature.tempo,
        energy: candidate.feature.energy,
        danceability: candidate.feature.danceability,
        duration_seconds,
        tempo_fit: breakdown.tempo_fit,
        effort_index: breakdown.effort_index,
        slot_fit: breakdown.slot_fit,
        genre_affinity: candidate.genre_affinity,
        is_rediscovery: candidate.is_rediscovery,
        used_neighbor,
        broke_lockout,
        source: candidate.source,
        genres: candidate.artist_genres(),
    });
    if bumped_kicker_hard {
        state.kicker_hard_count += 1;
    }
}

fn revert_last_main(state: &mut SelectorState) -> bool {
    let Some(pos) = state.chosen.iter().rposition(|c| c.segment == Segment::Main) else {
        return false;
    };
    let dropped = state.chosen.remove(pos);
    state.selected_ids.remove(&dropped.track_id);
    if let Some(count) = state.artist_counts.get_mut(&dropped.artist_id) {
        *count = count.saturating_sub(1);
    }
    state.seconds_so_far = state.seconds_so_far.saturating_sub(dropped.duration_seconds);
    state.main_seconds = state.main_seconds.saturating_sub(dropped.duration_seconds);
    if dropped.is_rediscovery {
        state.chosen_rediscovery_count = state.chosen_rediscovery_count.saturating_sub(1);
    }
    if dropped.effort == EffortTier::Hard {
        state.kicker_hard_count = state.kicker_hard_count.saturating_sub(1);
    }
    for track in state.chosen.iter_mut().skip(pos) {
        track.index = track.index.saturating_sub(1);
    }
    true
}

struct RunBuilders<'a> {
    pool: &'a Pool,
    artist_last_used: HashMap<ArtistId, DateTime<Utc>>,
    genres: &'a [Umbrella],
    anchor_bpm: f64,
    template: Template,
    plan: DurationPlan,
    max_target_seconds: u32,
    target_total_slots: usize,
    music_service: &'a dyn MusicService,
    market: String,
}

fn chosen_genres_and_decades(state: &SelectorState) -> Vec<(Vec<String>, Option<i32>)> {
    state
        .chosen
        .iter()
        .map(|c| (c.genres.clone(), c.album_release_year))
        .collect()
}

#[allow(clippy::too_many_arguments)]
fn build_score_ctx<'a>(
    builders: &'a RunBuilders,
    state: &'a SelectorState,
    chosen: &'a [(Vec<String>, Option<i32>)],
    now: DateTime<Utc>,
    tolerance_bpm: f64,
) -> ScoreContext<'a> {
    ScoreContext {
        now,
        anchor_bpm: builders.anchor_bpm,
        tolerance_bpm,
        recent_artists: &state.recent_artists,
        chosen_genres_and_decades: chosen,
        artist_last_used: &builders.artist_last_used,
        umbrella_counts: &state.umbrella_counts,
        selected_umbrellas: builders.genres,
        chosen_rediscovery_count: state.chosen_rediscovery_count,
        target_total_slots: builders.target_total_slots,
        last_tempo: state.last_tempo,
    }
}

/// Attempts to fill one slot, walking the relaxation ladder Normal → R1 →
/// R2 → R3 (umbrella neighbors) → R4 (break lockout) until one succeeds or
/// all are exhausted.
#[allow(clippy::too_many_arguments)]
fn fill_slot(
    slot: &Slot,
    state: &mut SelectorState,
    builders: &RunBuilders,
    rng: &mut StdRng,
    now: DateTime<Utc>,
    debug_lines: &mut Vec<String>,
) -> bool {
    let chosen = chosen_genres_and_decades(state);
    let (tolerance, min_fit) = pace::tier_tolerance_and_min_fit(slot.effort);
    let score_ctx = build_score_ctx(builders, state, &chosen, now, tolerance);
    let fairness_umbrella = fairness_umbrella_for_slot(slot, state, builders.genres);

    // Normal.
    let normal = Attempt {
        candidates: &builders.pool.candidates,
        tiers: vec![slot.effort],
        gate: Gate::TempoMin(min_fit),
    };
    if let Some((id, tier, breakdown)) = try_attempt(&normal, slot, state, builders.template, &builders.plan, builders.max_target_seconds, fairness_umbrella, &score_ctx, builders.music_service, &builders.market, rng) {
        let candidate = builders.pool.candidates.iter().find(|c| c.track.id == id).unwrap();
        accept(state, candidate, slot, tier, breakdown, false, false);
        return true;
    }

    // R1: adjacent tier, slot_fit >= 0.70.
    let mut r1_tiers = Vec::new();
    if let Some(t) = slot.effort.step(1) {
        r1_tiers.push(t);
    }
    if let Some(t) = slot.effort.step(-1) {
        r1_tiers.push(t);
    }
    if !r1_tiers.is_empty() {
        let r1 = Attempt {
            candidates: &builders.pool.candidates,
            tiers: r1_tiers,
            gate: Gate::SlotFitMin(0.70),
        };
        if let Some((id, tier, breakdown)) = try_attempt(&r1, slot, state, builders.template, &builders.plan, builders.max_target_seconds, fairness_umbrella, &score_ctx, builders.music_service, &builders.market, rng) {
            let candidate = builders.pool.candidates.iter().find(|c| c.track.id == id).unwrap();
            debug_lines.push(format!("slot {}: filled via R1 adjacent-tier relax", state.chosen.len()));
            accept(state, candidate, slot, tier, breakdown, false, false);
            return true;
        }
    }

    // R2: second-adjacent tier, slot_fit >= 0.65.
    let mut r2_tiers = Vec::new();
    if let Some(t) = slot.effort.step(2) {
        r2_tiers.push(t);
    }
    if let Some(t) = slot.effort.step(-2) {
        r2_tiers.push(t);
    }
    if !r2_tiers.is_empty() {
        let r2 = Attempt {
            candidates: &builders.pool.candidates,
            tiers: r2_tiers,
            gate: Gate::SlotFitMin(0.65),
        };
        if let Some((id, tier, breakdown)) = try_attempt(&r2, slot, state, builders.template, &builders.plan, builders.max_target_seconds, fairness_umbrella, &score_ctx, builders.music_service, &builders.market, rng) {
            let candidate = builders.pool.candidates.iter().find(|c| c.track.id == id).unwrap();
            debug_lines.push(format!("slot {}: filled via R2 second-adjacent-tier relax", state.chosen.len()));
            accept(state, candidate, slot, tier, breakdown, false, false);
            return true;
        }
    }

    // R3: broaden umbrellas to neighbors, limit 2 per run. Primary-only
    // first, then any source.
    if !builders.genres.is_empty() && state.neighbor_relax_count < MAX_NEIGHBOR_RELAX_SLOTS {
        let primary_only: Vec<Candidate> = builders
            .pool
            .neighbor_pool
            .iter()
            .filter(|c| c.source == SourceLayer::Primary)
            .cloned()
            .collect();
        for candidates in [&primary_only, &builders.pool.neighbor_pool] {
            if candidates.is_empty() {
                continue;
            }
            let r3 = Attempt {
                candidates,
                tiers: vec![slot.effort],
                gate: Gate::SlotFitMin(0.60),
            };
            if let Some((id, tier, breakdown)) = try_attempt(&r3, slot, state, builders.template, &builders.plan, builders.max_target_seconds, fairness_umbrella, &score_ctx, builders.music_service, &builders.market, rng) {
                let candidate = candidates.iter().find(|c| c.track.id == id).unwrap();
                debug_lines.push(format!("slot {}: filled via R3 neighbor-umbrella broadening", state.chosen.len()));
                accept(state, candidate, slot, tier, breakdown, true, false);
                return true;
            }
        }
    }

    // R4: break the 10-day lockout, once per run, with normal gates otherwise.
    if !state.lockout_break_used && !builders.pool.locked_out.is_empty() {
        let r4 = Attempt {
            candidates: &builders.pool.locked_out,
            tiers: vec![slot.effort],
            gate: Gate::TempoMin(min_fit),
        };
        if let Some((id, tier, breakdown)) = try_attempt(&r4, slot, state, builders.template, &builders.plan, builders.max_target_seconds, fairness_umbrella, &score_ctx, builders.music_service, &builders.market, rng) {
            let candidate = builders.pool.locked_out.iter().find(|c| c.track.id == id).unwrap();
            debug_lines.push(format!("slot {}: filled via R4 lockout break", state.chosen.len()));
            accept(state, candidate, slot, tier, breakdown, false, true);
            return true;
        }
    }

    debug_lines.push(format!("slot {} ({:?}/{:?}) unfillable, skipped", state.chosen.len(), slot.segment, slot.effort));
    false
}

/// Runs the full selector for one request: timeline planning, per-slot
/// fill loop, tail extension, and cooldown reconcile. `Template::Rest`
/// and `minutes == 0` both short-circuit to an empty outcome.
#[allow(clippy::too_many_arguments)]
pub fn run(
    template: Template,
    minutes: u32,
    pace_bucket: PaceBucket,
    override_spm: Option<f64>,
    genres: &[Umbrella],
    pool: &Pool,
    catalog: &CatalogIndex,
    usage: &UsageIndex,
    music_service: &dyn MusicService,
    market: &str,
    now: DateTime<Utc>,
    seed: u64,
) -> SelectionOutcome {
    let (plan, timeline) = timeline::build_timeline(template, minutes);
    let target_total_seconds = (minutes as i64) * 60;
    let min_target_seconds = (target_total_seconds - 60).max(0) as u32;
    let max_target_seconds = (target_total_seconds + 60) as u32;
    if timeline.is_empty() {
        return SelectionOutcome {
            chosen: Vec::new(),
            duration_plan: plan,
            neighbor_relax_slots: 0,
            lockout_breaks: 0,
            used_neighbor_broadening: pool.used_neighbor_broadening,
            debug_lines: Vec::new(),
            min_target_seconds,
            max_target_seconds,
        };
    }

    let anchor_bpm = pace::cadence_anchor(pace_bucket, override_spm);

    let builders = RunBuilders {
        pool,
        artist_last_used: build_artist_last_used(catalog, usage),
        genres,
        anchor_bpm,
        template,
        plan,
        max_target_seconds,
        target_total_slots: timeline.len(),
        music_service,
        market: market.to_string(),
    };

    let mut state = SelectorState::new();
    let mut rng = StdRng::seed_from_u64(seed);
    let mut debug_lines = Vec::new();

    for slot in &timeline {
        if slot.segment != Segment::Cooldown && state.seconds_so_far >= min_target_seconds {
            continue;
        }
        if state.seconds_so_far >= max_target_seconds {
            break;
        }
        fill_slot(slot, &mut state, &builders, &mut rng, now, &mut debug_lines);
    }

    let mut tail_guard = 0;
    while state.seconds_so_far < min_target_seconds && state.seconds_so_far < max_target_seconds && tail_guard < TAIL_EXTENSION_GUARD {
        tail_guard += 1;
        let synth = Slot { effort: EffortTier::Easy, target_effort: 0.45, segment: Segment::Main };
        if !fill_slot(&synth, &mut state, &builders, &mut rng, now, &mut debug_lines) {
            break;
        }
    }

    let cooldown_floor = builders.plan.cooldown_target_seconds().saturating_sub(60);
    let mut reconcile_guard = 0;
    while state.cooldown_seconds < cooldown_floor && state.seconds_so_far < max_target_seconds && reconcile_guard < COOLDOWN_RECONCILE_GUARD {
        reconcile_guard += 1;
        let synth = Slot { effort: EffortTier::Easy, target_effort: 0.35, segment: Segment::Cooldown };
        if fill_slot(&synth, &mut state, &builders, &mut rng, now, &mut debug_lines) {
            continue;
        }
        if !revert_last_main(&mut state) {
            debug_lines.push("cooldown reconcile: no main track left to drop, bailing".to_string());
            break;
        }
    }

    SelectionOutcome {
        chosen: state.chosen,
        duration_plan: builders.plan,
        neighbor_relax_slots: state.neighbor_relax_count,
        lockout_breaks: usize::from(state.lockout_break_used),
        used_neighbor_broadening: pool.used_neighbor_broadening,
        debug_lines,
        min_target_seconds,
        max_target_seconds,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogLayerFile, InMemoryCatalogStore};
    use crate::models::{Artist, AudioFeature, SourceLayer, Track};
    use crate::playlist::pool::build_pool;
    use crate::usage_store::InMemoryUsageStore;

    struct AlwaysPlayable;

    impl MusicService for AlwaysPlayable {
        fn get_market(&self) -> String {
            "US".to_string()
        }
        fn playable_ids(&self, ids: &[TrackId], _market: &str) -> Result<HashSet<TrackId>, crate::errors::PlannerError> {
            Ok(ids.iter().cloned().collect())
        }
        fn find_alternate_playable(&self, _id: &TrackId, _market: &str) -> Result<Option<TrackId>, crate::errors::PlannerError> {
            Ok(None)
        }
        fn create_playlist(&self, _name: &str, _description: &str, _is_public: bool, _uris: &[String]) -> Result<String, crate::errors::PlannerError> {
            Ok("https://example.invalid/playlist".to_string())
        }
    }

    fn make_catalog(n: usize) -> CatalogIndex {
        let mut tracks = Vec::new();
        let mut features = Vec::new();
        let mut artists = Vec::new();
        for i in 0..n {
            let id = format!("t{i}");
            let artist_id = format!("a{}", i % 12);
            tracks.push(Track {
                id: id.clone(),
                name: format!("Song {i}"),
                artist_id: artist_id.clone(),
                duration_ms: 200_000,
                album_release_year: Some(2015 + (i % 10) as i32),
                is_playable: true,
                album_name: None,
                popularity: None,
            });
            let tempo = 140.0 + (i % 40) as f64;
            features.push(AudioFeature {
                track_id: id,
                tempo: Some(tempo),
                energy: Some(0.5),
                danceability: Some(0.5),
                valence: None,
                loudness: None,
                key: None,
                mode: None,
                time_signature: None,
            });
        }
        for i in 0..12 {
            artists.push(Artist {
                id: format!("a{i}"),
                name: format!("Artist {i}"),
                genres: vec!["pop".to_string()],
                popularity: None,
            });
        }
        let primary = InMemoryCatalogStore {
            layer: SourceLayer::Primary,
            data: CatalogLayerFile { tracks, artists, features },
        };
        let empty = |layer| InMemoryCatalogStore {
            layer,
            data: CatalogLayerFile { tracks: vec![], artists: vec![], features: vec![] },
        };
        CatalogIndex::build(&primary, &empty(SourceLayer::Secondary), &empty(SourceLayer::Tertiary)).unwrap()
    }

    #[test]
    fn rest_template_produces_empty_outcome() {
        let catalog = make_catalog(50);
        let usage = UsageIndex::build(&InMemoryUsageStore::default()).unwrap();
        let pool = build_pool(&catalog, &usage, &[], &[], Utc::now()).unwrap();
        let outcome = run(Template::Rest, 30, PaceBucket::B, None, &[], &pool, &catalog, &usage, &AlwaysPlayable, "US", Utc::now(), 1);
        assert!(outcome.chosen.is_empty());
    }

    #[test]
    fn light_run_lands_near_target_duration_with_no_back_to_back_artists() {
        let catalog = make_catalog(200);
        let usage = UsageIndex::build(&InMemoryUsageStore::default()).unwrap();
        let pool = build_pool(&catalog, &usage, &[], &[], Utc::now()).unwrap();
        let outcome = run(Template::Light, 30, PaceBucket::B, None, &[], &pool, &catalog, &usage, &AlwaysPlayable, "US", Utc::now(), 7);

        assert!(!outcome.chosen.is_empty());
        let total: u32 = outcome.chosen.iter().map(|c| c.duration_seconds).sum();
        assert!((total as i64 - 1800).abs() <= 300);

        for w in outcome.chosen.windows(2) {
            assert_ne!(w[0].artist_id, w[1].artist_id);
        }
        for track in &outcome.chosen {
            assert!(matches!(track.effort, EffortTier::Easy | EffortTier::Moderate));
        }
    }

    #[test]
    fn same_seed_is_deterministic() {
        let catalog = make_catalog(200);
        let usage = UsageIndex::build(&InMemoryUsageStore::default()).unwrap();
        let pool = build_pool(&catalog, &usage, &[], &[], Utc::now()).unwrap();
        let now = Utc::now();
        let a = run(Template::Tempo, 30, PaceBucket::C, None, &[], &pool, &catalog, &usage, &AlwaysPlayable, "US", now, 42);
        let b = run(Template::Tempo, 30, PaceBucket::C, None, &[], &pool, &catalog, &usage, &AlwaysPlayable, "US", now, 42);
        let ids_a: Vec<_> = a.chosen.iter().map(|c| c.track_id.clone()).collect();
        let ids_b: Vec<_> = b.chosen.iter().map(|c| c.track_id.clone()).collect();
        assert_eq!(ids_a, ids_b);
    }

    #[test]
    fn max_tier_appears_at_most_once() {
        let catalog = make_catalog(200);
        let usage = UsageIndex::build(&InMemoryUsageStore::default()).unwrap();
        let pool = build_pool(&catalog, &usage, &[], &[], Utc::now()).unwrap();
        let outcome = run(Template::Pyramid, 60, PaceBucket::B, None, &[], &pool, &catalog, &usage, &AlwaysPlayable, "US", Utc::now(), 3);
        let max_count = outcome.chosen.iter().filter(|c| c.effort == EffortTier::Max).count();
        assert!(max_count <= 1);
    }
}
