use std::collections::{HashMap, HashSet};

use chrono::{Duration, Utc};

use run_playlist_planner::catalog::{CatalogIndex, CatalogLayerFile, InMemoryCatalogStore};
use run_playlist_planner::errors::PlannerError;
use run_playlist_planner::models::{
    Artist, AudioFeature, ChosenTrack, EffortTier, Segment, SourceLayer, Template, Track, TrackId, Umbrella,
};
use run_playlist_planner::music_service::MusicService;
use run_playlist_planner::playlist::pace::PaceBucket;
use run_playlist_planner::playlist::preflight::preflight_and_publish;
use run_playlist_planner::playlist::pool::build_pool;
use run_playlist_planner::playlist::selector;
use run_playlist_planner::usage_store::{InMemoryUsageStore, UsageIndex, UsageStore};

struct AlwaysPlayable;

impl MusicService for AlwaysPlayable {
    fn get_market(&self) -> String {
        "US".to_string()
    }
    fn playable_ids(&self, ids: &[TrackId], _market: &str) -> Result<HashSet<TrackId>, PlannerError> {
        Ok(ids.iter().cloned().collect())
    }
    fn find_alternate_playable(&self, _id: &TrackId, _market: &str) -> Result<Option<TrackId>, PlannerError> {
        Ok(None)
    }
    fn create_playlist(&self, _name: &str, _description: &str, _is_public: bool, _uris: &[String]) -> Result<String, PlannerError> {
        Ok("https://example.invalid/playlist".to_string())
    }
}

/// Builds a synthetic catalog with `n` tracks over 12 artists, tempos
/// spread across a running-friendly range, all tagged with a genre that
/// classifies under the `pop` umbrella.
fn make_catalog(n: usize, aged_fraction: usize) -> (CatalogIndex, InMemoryUsageStore) {
    let mut tracks = Vec::new();
    let mut features = Vec::new();
    let mut artists = Vec::new();
    let usage_store = InMemoryUsageStore::default();
    let mut aged_rows = Vec::new();

    for i in 0..n {
        let id = format!("t{i}");
        let artist_id = format!("a{}", i % 12);
        tracks.push(Track {
            id: id.clone(),
            name: format!("Song {i}"),
            artist_id,
            duration_ms: 200_000,
            album_release_year: Some(2015 + (i % 10) as i32),
            is_playable: true,
            album_name: None,
            popularity: None,
        });
        features.push(AudioFeature {
            track_id: id.clone(),
            tempo: Some(140.0 + (i % 40) as f64),
            energy: Some(0.5),
            danceability: Some(0.5),
            valence: None,
            loudness: None,
            key: None,
            mode: None,
            time_signature: None,
        });
        // every `aged_fraction`-th track looks like a rediscovery
        // candidate (unused for 90 days); the rest carry a 20-day-old
        // usage row so they are neither locked out (< 10 days) nor a
        // rediscovery (< 60 days), giving a clean partition.
        if aged_fraction > 0 {
            let days_ago = if i % aged_fraction < aged_fraction * 3 / 5 { 90 } else { 20 };
            aged_rows.push(run_playlist_planner::models::Usage {
                track_id: id,
                last_used_at: Some(Utc::now() - Duration::days(days_ago)),
                used_count: 1,
            });
        }
    }
    for i in 0..12 {
        artists.push(Artist {
            id: format!("a{i}"),
            name: format!("Artist {i}"),
            genres: vec!["pop".to_string()],
            popularity: None,
        });
    }
    usage_store.upsert_many(&aged_rows).unwrap();

    let primary = InMemoryCatalogStore {
        layer: SourceLayer::Primary,
        data: CatalogLayerFile { tracks, artists, features },
    };
    let empty = |layer| InMemoryCatalogStore {
        layer,
        data: CatalogLayerFile { tracks: vec![], artists: vec![], features: vec![] },
    };
    let catalog = CatalogIndex::build(&primary, &empty(SourceLayer::Secondary), &empty(SourceLayer::Tertiary)).unwrap();
    (catalog, usage_store)
}

/// Scenario 1 (spec §8): light template, 30 minutes, no filters, seed 1.
#[test]
fn scenario_light_30_minutes_stays_easy_or_moderate() {
    let (catalog, usage_store) = make_catalog(200, 0);
    let usage = UsageIndex::build(&usage_store).unwrap();
    let now = Utc::now();
    let pool = build_pool(&catalog, &usage, &[], &[], now).unwrap();

    let outcome = selector::run(
        Template::Light,
        30,
        PaceBucket::B,
        None,
        &[],
        &pool,
        &catalog,
        &usage,
        &AlwaysPlayable,
        "US",
        now,
        1,
    );

    assert!(outcome.chosen.len() >= 7 && outcome.chosen.len() <= 12);
    let total: i64 = outcome.chosen.iter().map(|c| c.duration_seconds as i64).sum();
    assert!((total - 1800).abs() <= 300, "total {total}s too far from 1800s target");

    let moderate_count = outcome.chosen.iter().filter(|c| c.effort == EffortTier::Moderate).count();
    assert!((moderate_count as f64 / outcome.chosen.len() as f64) <= 0.4);
    for track in &outcome.chosen {
        assert!(matches!(track.effort, EffortTier::Easy | EffortTier::Moderate));
    }
}

/// Scenario 5 (spec §8): 2 of the final 10 ids are unplayable, one of
/// which has an alternate. Expected counts {checked:10, unplayable:2,
/// swapped:1, removed:1}, with usage rows written for the 9 survivors.
struct SwapOrDropService {
    unplayable: HashSet<TrackId>,
    alternates: HashMap<TrackId, TrackId>,
}

impl MusicService for SwapOrDropService {
    fn get_market(&self) -> String {
        "US".to_string()
    }
    fn playable_ids(&self, ids: &[TrackId], _market: &str) -> Result<HashSet<TrackId>, PlannerError> {
        Ok(ids.iter().filter(|id| !self.unplayable.contains(*id)).cloned().collect())
    }
    fn find_alternate_playable(&self, id: &TrackId, _market: &str) -> Result<Option<TrackId>, PlannerError> {
        Ok(self.alternates.get(id).cloned())
    }
    fn create_playlist(&self, _name: &str, _description: &str, _is_public: bool, uris: &[String]) -> Result<String, PlannerError> {
        assert_eq!(uris.len(), 9);
        Ok("https://example.invalid/playlist".to_string())
    }
}

fn chosen_track(id: &str) -> ChosenTrack {
    ChosenTrack {
        index: 0,
        segment: Segment::Main,
        effort: EffortTier::Moderate,
        target_effort: 0.5,
        track_id: id.to_string(),
        artist_id: "a1".to_string(),
        artist_name: "Artist".to_string(),
        track_name: "Track".to_string(),
        album_release_year: Some(2020),
        tempo: Some(160.0),
        energy: Some(0.6),
        danceability: Some(0.6),
        duration_seconds: 200,
        tempo_fit: 0.8,
        effort_index: 0.5,
        slot_fit: 0.85,
        genre_affinity: 0.0,
        is_rediscovery: false,
        used_neighbor: false,
        broke_lockout: false,
        source: SourceLayer::Primary,
        genres: vec![],
    }
}

#[test]
fn scenario_preflight_swaps_one_and_drops_one_of_ten() {
    let service = SwapOrDropService {
        unplayable: ["t2".to_string(), "t7".to_string()].into_iter().collect(),
        alternates: [("t2".to_string(), "t2-alt".to_string())].into_iter().collect(),
    };
    let usage_store = InMemoryUsageStore::default();
    let usage_index = UsageIndex::build(&usage_store).unwrap();
    let chosen: Vec<ChosenTrack> = (0..10).map(|i| chosen_track(&format!("t{i}"))).collect();

    let outcome = preflight_and_publish(&service, &usage_store, &usage_index, "Run", "generated", false, chosen, Utc::now()).unwrap();

    assert_eq!(outcome.counts.checked, 10);
    assert_eq!(outcome.counts.unplayable, 2);
    assert_eq!(outcome.counts.swapped, 1);
    assert_eq!(outcome.counts.removed, 1);
    assert_eq!(outcome.final_tracks.len(), 9);

    let rows = usage_store.load_all().unwrap();
    assert_eq!(rows.len(), 9);
}

/// Scenario 6 (spec §8): 60% of the pool is a rediscovery (untouched for
/// 90 days, past the 60-day threshold). For a 30-minute run, the default
/// bias should land `rediscoveryPct >= 0.5`.
#[test]
fn scenario_rediscovery_gating_biases_toward_older_tracks() {
    let (catalog, usage_store) = make_catalog(200, 5); // 3 of every 5 tracks aged 90 days -> 60% aged pool
    let usage = UsageIndex::build(&usage_store).unwrap();
    let now = Utc::now();
    let pool = build_pool(&catalog, &usage, &[], &[], now).unwrap();

    let outcome = selector::run(
        Template::Light,
        30,
        PaceBucket::B,
        None,
        &[],
        &pool,
        &catalog,
        &usage,
        &AlwaysPlayable,
        "US",
        now,
        6,
    );

    assert!(!outcome.chosen.is_empty());
    let rediscoveries = outcome.chosen.iter().filter(|c| c.is_rediscovery).count();
    let pct = rediscoveries as f64 / outcome.chosen.len() as f64;
    assert!(pct >= 0.5, "rediscoveryPct {pct} below the 0.5 floor for a 50%+ aged pool");
}

/// Boundary behavior (spec §8): zero genre and zero decade filters admit
/// the full filtered catalog, and genre affinity contributes nothing.
#[test]
fn boundary_zero_filters_give_zero_genre_affinity() {
    let (catalog, usage_store) = make_catalog(50, 0);
    let usage = UsageIndex::build(&usage_store).unwrap();
    let now = Utc::now();
    let pool = build_pool(&catalog, &usage, &[], &[], now).unwrap();

    assert_eq!(pool.candidates.len(), 50);
    assert!(pool.candidates.iter().all(|c| c.genre_affinity == 0.0));
    assert!(!pool.used_neighbor_broadening);
}

/// Boundary behavior (spec §8): template=rest produces an empty plan and
/// selection; the publisher must never be invoked.
#[test]
fn boundary_rest_template_skips_selection_and_publish() {
    let (catalog, usage_store) = make_catalog(50, 0);
    let usage = UsageIndex::build(&usage_store).unwrap();
    let now = Utc::now();
    let pool = build_pool(&catalog, &usage, &[], &[], now).unwrap();

    let outcome = selector::run(
        Template::Rest,
        0,
        PaceBucket::B,
        None,
        &[],
        &pool,
        &catalog,
        &usage,
        &AlwaysPlayable,
        "US",
        now,
        1,
    );
    assert!(outcome.chosen.is_empty());

    let usage_index = UsageIndex::build(&usage_store).unwrap();
    let err = preflight_and_publish(&AlwaysPlayable, &usage_store, &usage_index, "Run", "generated", false, outcome.chosen, now).unwrap_err();
    assert_eq!(err.kind(), "EmptySelection");
}

/// Boundary behavior (spec §8): a genre selection over a thin pool
/// activates neighbor broadening automatically.
#[test]
fn boundary_thin_genre_pool_activates_neighbor_broadening() {
    let (catalog, usage_store) = make_catalog(20, 0);
    let usage = UsageIndex::build(&usage_store).unwrap();
    let now = Utc::now();
    // catalog fixture tags every artist "pop"; Electronic is Pop's
    // adjacency-table neighbor, so a thin Electronic-only pool broadens.
    let pool = build_pool(&catalog, &usage, &[Umbrella::Electronic], &[], now).unwrap();
    assert!(pool.used_neighbor_broadening);
}

/// Scenario 2 (spec §8): hiit template, 45 minutes, genre filter, seed 2.
/// Checks the gates that hold regardless of which relaxation rung filled
/// each slot: at most one max, per-artist cap of 2, at most two slots
/// relaxed via neighbor broadening, and landing near the target duration.
#[test]
fn scenario_hiit_45_minutes_respects_caps_and_relax_limit() {
    let (catalog, usage_store) = make_catalog(200, 0);
    let usage = UsageIndex::build(&usage_store).unwrap();
    let now = Utc::now();
    let pool = build_pool(&catalog, &usage, &[Umbrella::Pop], &[], now).unwrap();

    let outcome = selector::run(
        Template::Hiit,
        45,
        PaceBucket::B,
        None,
        &[Umbrella::Pop],
        &pool,
        &catalog,
        &usage,
        &AlwaysPlayable,
        "US",
        now,
        2,
    );

    assert!(!outcome.chosen.is_empty());
    let total: i64 = outcome.chosen.iter().map(|c| c.duration_seconds as i64).sum();
    assert!((total - 2700).abs() <= 300, "total {total}s too far from 2700s target");

    let max_count = outcome.chosen.iter().filter(|c| c.effort == EffortTier::Max).count();
    assert!(max_count <= 1);
    assert!(outcome.neighbor_relax_slots <= 2);

    let mut per_artist: HashMap<String, usize> = HashMap::new();
    for track in &outcome.chosen {
        *per_artist.entry(track.artist_id.clone()).or_insert(0) += 1;
    }
    assert!(per_artist.values().all(|&n| n <= 2));
}

/// Scenario 3 (spec §8): pyramid template, 60 minutes, no filters, seed 3.
/// The global max-tier gate caps `max` at one regardless of relaxation,
/// and the last main-segment track (whether the pyramid's closing
/// moderate slot or a tail-extension easy slot) never exceeds moderate.
#[test]
fn scenario_pyramid_60_minutes_caps_max_and_closes_at_or_below_moderate() {
    let (catalog, usage_store) = make_catalog(200, 0);
    let usage = UsageIndex::build(&usage_store).unwrap();
    let now = Utc::now();
    let pool = build_pool(&catalog, &usage, &[], &[], now).unwrap();

    let outcome = selector::run(
        Template::Pyramid,
        60,
        PaceBucket::B,
        None,
        &[],
        &pool,
        &catalog,
        &usage,
        &AlwaysPlayable,
        "US",
        now,
        3,
    );

    assert!(!outcome.chosen.is_empty());
    let max_count = outcome.chosen.iter().filter(|c| c.effort == EffortTier::Max).count();
    assert_eq!(max_count, 1);

    let last_main = outcome.chosen.iter().filter(|c| c.segment == Segment::Main).last();
    if let Some(track) = last_main {
        assert!(track.effort <= EffortTier::Moderate);
    }

    let mut per_artist: HashMap<String, usize> = HashMap::new();
    for track in &outcome.chosen {
        *per_artist.entry(track.artist_id.clone()).or_insert(0) += 1;
    }
    assert!(per_artist.values().all(|&n| n <= 2));
}

/// Scenario 4 (spec §8): kicker template, 40 minutes, genre filter, seed 4.
/// Caps hold regardless of relaxation: `hard` at most twice, `max` at
/// most once.
#[test]
fn scenario_kicker_40_minutes_caps_hard_and_max() {
    let (catalog, usage_store) = make_catalog(200, 0);
    let usage = UsageIndex::build(&usage_store).unwrap();
    let now = Utc::now();
    // Electronic is Pop's adjacency-table neighbor, so this filter drives
    // the same neighbor-broadening path as the thin-pool boundary test,
    // but against a full-size catalog and the real selector loop.
    let pool = build_pool(&catalog, &usage, &[Umbrella::Electronic], &[], now).unwrap();
    assert!(pool.used_neighbor_broadening);

    let outcome = selector::run(
        Template::Kicker,
        40,
        PaceBucket::B,
        None,
        &[Umbrella::Electronic],
        &pool,
        &catalog,
        &usage,
        &AlwaysPlayable,
        "US",
        now,
        4,
    );

    assert!(!outcome.chosen.is_empty());
    let hard_count = outcome.chosen.iter().filter(|c| c.effort == EffortTier::Hard).count();
    let max_count = outcome.chosen.iter().filter(|c| c.effort == EffortTier::Max).count();
    assert!(hard_count <= 2);
    assert!(max_count <= 1);
}
