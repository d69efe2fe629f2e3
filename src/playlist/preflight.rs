//! Preflight & Publisher (spec §4.7): batch-checks playability of the
//! final selection, swaps in alternates or drops unplayable tracks,
//! creates the output playlist, and upserts the Usage Store. Generalizes
//! the teacher's `client::create_playlist_with_pattern_cleanup`.

use chrono::{DateTime, Utc};
use log::{info, warn};

use crate::errors::PlannerError;
use crate::models::{ChosenTrack, TrackId};
use crate::music_service::MusicService;
use crate::usage_store::{UsageIndex, UsageStore};

/// Counts reported alongside the published playlist, matching the §4.7
/// step-2 bookkeeping and the §8 metrics.
#[derive(Debug, Clone, Copy, Default)]
pub struct PreflightCounts {
    pub checked: usize,
    pub unplayable: usize,
    pub swapped: usize,
    pub removed: usize,
}

#[derive(Debug)]
pub struct PublishOutcome {
    pub playlist_url: String,
    pub final_tracks: Vec<ChosenTrack>,
    pub counts: PreflightCounts,
}

/// Swaps unplayable tracks for an alternate where one exists, otherwise
/// drops them. A lookup failure is treated as "no alternate" rather than
/// propagated, since the batch playability check already surfaced the
/// hard failure mode for this stage.
fn swap_or_drop(
    music_service: &dyn MusicService,
    market: &str,
    chosen: Vec<ChosenTrack>,
    playable_ids: &std::collections::HashSet<TrackId>,
) -> (Vec<ChosenTrack>, usize, usize) {
    let mut swapped = 0;
    let mut removed = 0;
    let mut final_tracks = Vec::with_capacity(chosen.len());

    for mut track in chosen {
        if playable_ids.contains(&track.track_id) {
            final_tracks.push(track);
            continue;
        }

        match music_service.find_alternate_playable(&track.track_id, market) {
            Ok(Some(alternate_id)) => {
                warn!("track {} unplayable, swapping to alternate {}", track.track_id, alternate_id);
                track.track_id = alternate_id;
                final_tracks.push(track);
                swapped += 1;
            }
            Ok(None) => {
                warn!("track {} unplayable, no alternate available, dropping", track.track_id);
                removed += 1;
            }
            Err(e) => {
                warn!("alternate lookup failed for {}: {e}, dropping", track.track_id);
                removed += 1;
            }
        }
    }

    (final_tracks, swapped, removed)
}

/// Runs the full preflight + publish pipeline for a finalized selection.
/// Does not touch the Usage Store if publishing fails.
pub fn preflight_and_publish(
    music_service: &dyn MusicService,
    usage_store: &dyn UsageStore,
    usage_index: &UsageIndex,
    playlist_name: &str,
    playlist_description: &str,
    is_public: bool,
    chosen: Vec<ChosenTrack>,
    now: DateTime<Utc>,
) -> Result<PublishOutcome, PlannerError> {
    if chosen.is_empty() {
        return Err(PlannerError::EmptySelection);
    }

    let market = music_service.get_market();
    let ids: Vec<TrackId> = chosen.iter().map(|c| c.track_id.clone()).collect();
    let checked = ids.len();

    let playable = music_service.playable_ids(&ids, &market)?;
    let unplayable = checked - ids.iter().filter(|id| playable.contains(*id)).count();

    let (final_tracks, swapped, removed) = swap_or_drop(music_service, &market, chosen, &playable);

    if final_tracks.is_empty() {
        return Err(PlannerError::EmptySelection);
    }

    let uris: Vec<String> = final_tracks.iter().map(|t| t.track_id.clone()).collect();
    let playlist_url = music_service.create_playlist(playlist_name, playlist_description, is_public, &uris)?;

    let usage_rows = usage_index.bump(&uris, now);
    usage_store.upsert_many(&usage_rows)?;

    let counts = PreflightCounts { checked, unplayable, swapped, removed };
    info!(
        "published playlist with {} tracks (checked={}, unplayable={}, swapped={}, removed={})",
        final_tracks.len(),
        counts.checked,
        counts.unplayable,
        counts.swapped,
        counts.removed
    );

    Ok(PublishOutcome { playlist_url, final_tracks, counts })
}
