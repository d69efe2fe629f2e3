//! Output assembly (spec §6): folds a [`SelectionOutcome`] and a
//! [`PublishOutcome`] into the single JSON object the CLI prints on
//! stdout. Field names below are contractual, this module is the only
//! place camelCase translation happens.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{unique_artists, ChosenTrack, Decade, EffortTier, Segment, SourceLayer, Template, Umbrella};
use crate::playlist::preflight::PublishOutcome;
use crate::playlist::selector::SelectionOutcome;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotRecord {
    pub index: usize,
    pub segment: Segment,
    pub effort: EffortTier,
    pub target_effort: f64,
    pub track_id: String,
    pub artist_id: String,
    pub artist_name: String,
    pub track_name: String,
    pub tempo: Option<f64>,
    pub energy: Option<f64>,
    pub danceability: Option<f64>,
    pub duration_seconds: u32,
    pub tempo_fit: f64,
    pub effort_index: f64,
    pub slot_fit: f64,
    pub genre_affinity: f64,
    pub is_rediscovery: bool,
    pub used_neighbor: bool,
    pub broke_lockout: bool,
    pub source: SourceLayer,
    pub genres: Vec<String>,
}

impl From<&ChosenTrack> for SlotRecord {
    fn from(t: &ChosenTrack) -> Self {
        SlotRecord {
            index: t.index,
            segment: t.segment,
            effort: t.effort,
            target_effort: t.target_effort,
            track_id: t.track_id.clone(),
            artist_id: t.artist_id.clone(),
            artist_name: t.artist_name.clone(),
            track_name: t.track_name.clone(),
            tempo: t.tempo,
            energy: t.energy,
            danceability: t.danceability,
            duration_seconds: t.duration_seconds,
            tempo_fit: t.tempo_fit,
            effort_index: t.effort_index,
            slot_fit: t.slot_fit,
            genre_affinity: t.genre_affinity,
            is_rediscovery: t.is_rediscovery,
            used_neighbor: t.used_neighbor,
            broke_lockout: t.broke_lockout,
            source: t.source,
            genres: t.genres.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionReport {
    pub template: Template,
    pub run_minutes: u32,
    pub genres: Vec<String>,
    pub decades: Vec<String>,
    pub track_ids: Vec<String>,
    pub artist_ids: Vec<String>,
    pub efforts: Vec<EffortTier>,
    pub sources: Vec<SourceLayer>,
    pub total_seconds: u32,
    pub min_seconds: u32,
    pub max_seconds: u32,
    pub warmup_seconds: u32,
    pub main_seconds: u32,
    pub cooldown_seconds: u32,
    pub warmup_target: u32,
    pub main_target: u32,
    pub cooldown_target: u32,
    pub preflight_unplayable: usize,
    pub swapped: usize,
    pub removed: usize,
    pub market: String,
    pub slots: Vec<SlotRecord>,
    pub avg_tempo_fit: f64,
    pub avg_slot_fit: f64,
    pub avg_genre_affinity: f64,
    pub rediscovery_pct: f64,
    pub unique_artists: usize,
    pub neighbor_relax_slots: usize,
    pub lockout_breaks: usize,
    pub source_likes: usize,
    pub source_playlists: usize,
    pub source_third: usize,
    pub debug_lines: Vec<String>,
    pub generated_at: DateTime<Utc>,
}

fn average(values: impl Iterator<Item = f64>, count: usize) -> f64 {
    if count == 0 {
        return 0.0;
    }
    values.sum::<f64>() / count as f64
}

/// Builds the published report. `selection` carries the timeline/duration
/// accounting; `publish` carries the post-preflight track list and counts
/// actually handed to the caller.
#[allow(clippy::too_many_arguments)]
pub fn build_report(
    template: Template,
    run_minutes: u32,
    genres: &[Umbrella],
    decades: &[Decade],
    market: String,
    selection: &SelectionOutcome,
    publish: &PublishOutcome,
    generated_at: DateTime<Utc>,
) -> SelectionReport {
    let tracks = &publish.final_tracks;
    let n = tracks.len();

    let mut warmup_seconds = 0u32;
    let mut main_seconds = 0u32;
    let mut cooldown_seconds = 0u32;
    let mut source_likes = 0usize;
    let mut source_playlists = 0usize;
    let mut source_third = 0usize;
    let mut rediscoveries = 0usize;

    for t in tracks {
        match t.segment {
            Segment::Warmup => warmup_seconds += t.duration_seconds,
            Segment::Main => main_seconds += t.duration_seconds,
            Segment::Cooldown => cooldown_seconds += t.duration_seconds,
        }
        match t.source {
            SourceLayer::Primary => source_likes += 1,
            SourceLayer::Secondary => source_playlists += 1,
            SourceLayer::Tertiary => source_third += 1,
        }
        if t.is_rediscovery {
            rediscoveries += 1;
        }
    }

    SelectionReport {
        template,
        run_minutes,
        genres: genres.iter().map(|g| g.as_str().to_string()).collect(),
        decades: decades.iter().map(|d| d.as_str().to_string()).collect(),
        track_ids: tracks.iter().map(|t| t.track_id.clone()).collect(),
        artist_ids: tracks.iter().map(|t| t.artist_id.clone()).collect(),
        efforts: tracks.iter().map(|t| t.effort).collect(),
        sources: tracks.iter().map(|t| t.source).collect(),
        total_seconds: warmup_seconds + main_seconds + cooldown_seconds,
        min_seconds: selection.min_target_seconds,
        max_seconds: selection.max_target_seconds,
        warmup_seconds,
        main_seconds,
        cooldown_seconds,
        warmup_target: selection.duration_plan.warmup_target_seconds(),
        main_target: selection.duration_plan.main_target_seconds(),
        cooldown_target: selection.duration_plan.cooldown_target_seconds(),
        preflight_unplayable: publish.counts.unplayable,
        swapped: publish.counts.swapped,
        removed: publish.counts.removed,
        market,
        slots: tracks.iter().map(SlotRecord::from).collect(),
        avg_tempo_fit: average(tracks.iter().map(|t| t.tempo_fit), n),
        avg_slot_fit: average(tracks.iter().map(|t| t.slot_fit), n),
        avg_genre_affinity: average(tracks.iter().map(|t| t.genre_affinity), n),
        rediscovery_pct: if n == 0 { 0.0 } else { rediscoveries as f64 / n as f64 },
        unique_artists: unique_artists(tracks).len(),
        neighbor_relax_slots: selection.neighbor_relax_slots,
        lockout_breaks: selection.lockout_breaks,
        source_likes,
        source_playlists,
        source_third,
        debug_lines: selection.debug_lines.clone(),
        generated_at,
    }
}
