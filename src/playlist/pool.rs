//! Candidate Pool Builder (spec §4.4): turns the joined catalog + usage
//! snapshot into the set of candidates the Selector is allowed to draw
//! from, generalizing the teacher's `filters::SongFilters`.

use chrono::{DateTime, Duration, Utc};

use crate::catalog::CatalogIndex;
use crate::errors::PlannerError;
use crate::models::{Candidate, Decade, Umbrella};
use crate::playlist::umbrella;
use crate::usage_store::UsageIndex;

const MIN_DURATION_MS: u32 = 90_000;
const MAX_DURATION_MS: u32 = 360_000;
const LOCKOUT_DAYS: i64 = 10;
const REDISCOVERY_DAYS: i64 = 60;
const NEIGHBOR_BROADEN_THRESHOLD: usize = 200;
const NEIGHBOR_WEIGHT: f64 = 0.6;

/// Result of pool building: the admitted candidates plus a parallel set of
/// candidates held back only by the 10-day lockout, kept aside so the
/// Selector's R4 relaxation can draw from them without re-running every
/// other filter.
#[derive(Debug)]
pub struct Pool {
    pub candidates: Vec<Candidate>,
    pub locked_out: Vec<Candidate>,
    pub used_neighbor_broadening: bool,
    /// Candidates admitted under neighbor-broadened umbrella weights,
    /// regardless of whether `candidates` itself needed broadening. Feeds
    /// the Selector's R3 relaxation without re-touching the catalog.
    pub neighbor_pool: Vec<Candidate>,
}

fn passes_decade(candidate: &Candidate, decades: &[Decade]) -> bool {
    if decades.is_empty() {
        return true;
    }
    match candidate.track.album_release_year.and_then(Decade::of_year) {
        Some(d) => decades.contains(&d),
        None => false,
    }
}

/// Applies the genre-affinity and decade filters to a staged candidate
/// set, filling in `genre_affinity` along the way. `neighbor_weight = 0`
/// is selected-only.
fn apply_genre_and_decade(
    items: Vec<Candidate>,
    genres: &[Umbrella],
    decades: &[Decade],
    neighbor_weight: f64,
) -> Vec<Candidate> {
    let weights = (!genres.is_empty()).then(|| umbrella::selected_with_neighbors(genres, neighbor_weight));

    items
        .into_iter()
        .filter_map(|mut c| {
            if let Some(weights) = &weights {
                let affinity = umbrella::affinity(&c.artist_genres(), weights);
                if affinity <= 0.0 {
                    return None;
                }
                c.genre_affinity = affinity;
            }
            if !passes_decade(&c, decades) {
                return None;
            }
            Some(c)
        })
        .collect()
}

/// Builds the candidate pool for one run.
pub fn build_pool(
    catalog: &CatalogIndex,
    usage: &UsageIndex,
    genres: &[Umbrella],
    decades: &[Decade],
    now: DateTime<Utc>,
) -> Result<Pool, PlannerError> {
    let mut featured_count = 0usize;
    let mut unlocked: Vec<Candidate> = Vec::new();
    let mut locked: Vec<Candidate> = Vec::new();

    for track in catalog.tracks.values() {
        let feature = match catalog.feature_of(&track.id) {
            Some(f) if f.tempo.is_some() => f,
            _ => continue,
        };
        featured_count += 1;

        if !(MIN_DURATION_MS..=MAX_DURATION_MS).contains(&track.duration_ms) {
            continue;
        }
        if !track.is_playable {
            continue;
        }

        let last_used_at = usage.last_used_at(&track.id);
        let is_locked_out = last_used_at
            .map(|t| now - t < Duration::days(LOCKOUT_DAYS))
            .unwrap_or(false);
        let is_rediscovery = last_used_at
            .map(|t| now - t >= Duration::days(REDISCOVERY_DAYS))
            .unwrap_or(true);

        let candidate = Candidate {
            track: track.clone(),
            feature: feature.clone(),
            artist: catalog.artist_of(&track.artist_id).cloned(),
            is_rediscovery,
            last_used_at,
            genre_affinity: 0.0,
            source: catalog.source_of(&track.id),
        };

        if is_locked_out {
            locked.push(candidate);
        } else {
            unlocked.push(candidate);
        }
    }

    if featured_count == 0 {
        return Err(PlannerError::FeaturesStarved);
    }

    let mut used_neighbor_broadening = false;
    let selected_only = apply_genre_and_decade(unlocked.clone(), genres, decades, 0.0);
    let broadened = if genres.is_empty() {
        None
    } else {
        Some(apply_genre_and_decade(unlocked, genres, decades, NEIGHBOR_WEIGHT))
    };

    let candidates = if selected_only.len() < NEIGHBOR_BROADEN_THRESHOLD && broadened.is_some() {
        used_neighbor_broadening = true;
        broadened.clone().unwrap()
    } else {
        selected_only
    };

    if candidates.is_empty() {
        return Err(PlannerError::PoolEmpty);
    }

    let neighbor_pool = broadened.unwrap_or_else(|| candidates.clone());

    let locked_weight = if used_neighbor_broadening { NEIGHBOR_WEIGHT } else { 0.0 };
    let locked_out = apply_genre_and_decade(locked, genres, decades, locked_weight);

    Ok(Pool {
        candidates,
        locked_out,
        used_neighbor_broadening,
        neighbor_pool,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogLayerFile, InMemoryCatalogStore};
    use crate::models::{Artist, AudioFeature, SourceLayer, Track, Usage};
    use crate::usage_store::{InMemoryUsageStore, UsageStore};

    fn track(id: &str, year: i32) -> Track {
        Track {
            id: id.to_string(),
            name: format!("Track {id}"),
            artist_id: "artist-1".to_string(),
            duration_ms: 200_000,
            album_release_year: Some(year),
            is_playable: true,
            album_name: None,
            popularity: None,
        }
    }

    fn feature(id: &str, tempo: Option<f64>) -> AudioFeature {
        AudioFeature {
            track_id: id.to_string(),
            tempo,
            energy: Some(0.6),
            danceability: Some(0.6),
            valence: None,
            loudness: None,
            key: None,
            mode: None,
            time_signature: None,
        }
    }

    fn build_catalog(tracks: Vec<Track>, features: Vec<AudioFeature>, artists: Vec<Artist>) -> CatalogIndex {
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
    fn drops_tracks_without_tempo_and_out_of_duration_band() {
        let mut too_short = track("short", 2020);
        too_short.duration_ms = 10_000;
        let no_tempo = track("notempo", 2020);
        let ok = track("ok", 2020);

        let catalog = build_catalog(
            vec![too_short.clone(), no_tempo.clone(), ok.clone()],
            vec![
                feature("short", Some(150.0)),
                feature("notempo", None),
                feature("ok", Some(150.0)),
            ],
            vec![Artist { id: "artist-1".to_string(), name: "A".to_string(), genres: vec![], popularity: None }],
        );
        let usage = UsageIndex::build(&InMemoryUsageStore::default()).unwrap();

        let pool = build_pool(&catalog, &usage, &[], &[], Utc::now()).unwrap();
        assert_eq!(pool.candidates.len(), 1);
        assert_eq!(pool.candidates[0].track.id, "ok");
    }

    #[test]
    fn recently_used_tracks_go_to_locked_out_not_candidates() {
        let t1 = track("t1", 2020);
        let catalog = build_catalog(
            vec![t1],
            vec![feature("t1", Some(150.0))],
            vec![Artist { id: "artist-1".to_string(), name: "A".to_string(), genres: vec![], popularity: None }],
        );
        let usage_store = InMemoryUsageStore::default();
        usage_store
            .upsert_many(&[Usage {
                track_id: "t1".to_string(),
                last_used_at: Some(Utc::now() - Duration::days(2)),
                used_count: 1,
            }])
            .unwrap();
        let usage = UsageIndex::build(&usage_store).unwrap();

        let err = build_pool(&catalog, &usage, &[], &[], Utc::now()).unwrap_err();
        assert_eq!(err.kind(), "PoolEmpty");
    }

    #[test]
    fn genre_filter_broadens_to_neighbors_when_pool_is_thin() {
        let t1 = track("t1", 2020);
        let catalog = build_catalog(
            vec![t1],
            vec![feature("t1", Some(150.0))],
            vec![Artist {
                id: "artist-1".to_string(),
                name: "A".to_string(),
                genres: vec!["metal".to_string()],
                popularity: None,
            }],
        );
        let usage = UsageIndex::build(&InMemoryUsageStore::default()).unwrap();

        let pool = build_pool(&catalog, &usage, &[Umbrella::Rock], &[], Utc::now()).unwrap();
        assert!(pool.used_neighbor_broadening);
        assert_eq!(pool.candidates.len(), 1);
    }

    #[test]
    fn decade_filter_excludes_tracks_outside_selection() {
        let old = track("old", 1995);
        let new = track("new", 2021);
        let catalog = build_catalog(
            vec![old, new],
            vec![feature("old", Some(150.0)), feature("new", Some(150.0))],
            vec![Artist { id: "artist-1".to_string(), name: "A".to_string(), genres: vec![], popularity: None }],
        );
        let usage = UsageIndex::build(&InMemoryUsageStore::default()).unwrap();

        let pool = build_pool(&catalog, &usage, &[], &[Decade::D20s], Utc::now()).unwrap();
        assert_eq!(pool.candidates.len(), 1);
        assert_eq!(pool.candidates[0].track.id, "new");
    }
}
