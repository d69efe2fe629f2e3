use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::errors::PlannerError;
use crate::models::TrackId;

/// Narrow interface onto the external music service: market lookup,
/// batch playability, alternate-track lookup, and playlist creation. This
/// is the only trait the selector's preflight/publish stage depends on,
/// mirroring the teacher's `SubsonicClient` but generalized to a
/// Spotify-Web-API-shaped surface and made mockable.
#[cfg_attr(test, mockall::automock)]
pub trait MusicService {
    /// Market/country code for the current user. Defaults to "US" on
    /// failure at the call site, never propagates an error.
    fn get_market(&self) -> String;

    /// Which of `ids` are currently playable in `market`.
    fn playable_ids(&self, ids: &[TrackId], market: &str) -> Result<HashSet<TrackId>, PlannerError>;

    /// An alternate playable version of `id`, if one exists.
    fn find_alternate_playable(
        &self,
        id: &TrackId,
        market: &str,
    ) -> Result<Option<TrackId>, PlannerError>;

    /// Create the output playlist, returning its URL.
    fn create_playlist(
        &self,
        name: &str,
        description: &str,
        is_public: bool,
        uris: &[String],
    ) -> Result<String, PlannerError>;
}

/// HTTP-backed `MusicService`, using `ureq` + bearer-token auth the way
/// the teacher's `SubsonicClient` uses `ureq` + MD5 salt/token auth (the
/// salt/token scheme is Subsonic-specific and has no analogue against a
/// Spotify-Web-API-shaped backend, so a plain bearer token replaces it).
pub struct HttpMusicService {
    agent: ureq::Agent,
    base_url: String,
    bearer_token: String,
}

#[derive(Deserialize)]
struct MarketResponse {
    market: String,
}

#[derive(Deserialize)]
struct PlayableTrack {
    id: TrackId,
    #[serde(rename = "isPlayable")]
    is_playable: bool,
}

#[derive(Deserialize)]
struct PlayableTracksResponse {
    tracks: Vec<PlayableTrack>,
}

#[derive(Deserialize)]
struct AlternateResponse {
    #[serde(rename = "alternateId")]
    alternate_id: Option<TrackId>,
}

#[derive(Serialize)]
struct CreatePlaylistBody<'a> {
    name: &'a str,
    description: &'a str,
    #[serde(rename = "public")]
    is_public: bool,
    uris: &'a [String],
}

#[derive(Deserialize)]
struct CreatePlaylistResponse {
    url: String,
}

impl HttpMusicService {
    pub fn new(base_url: String, bearer_token: String) -> Self {
        Self {
            agent: ureq::Agent::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            bearer_token,
        }
    }

    fn auth(&self, req: ureq::Request) -> ureq::Request {
        req.set("Authorization", &format!("Bearer {}", self.bearer_token))
    }
}

impl MusicService for HttpMusicService {
    fn get_market(&self) -> String {
        let url = format!("{}/v1/me/market", self.base_url);
        let attempt = self
            .auth(self.agent.get(&url))
            .call()
            .ok()
            .and_then(|resp| resp.into_json::<MarketResponse>().ok());
        attempt.map(|r| r.market).unwrap_or_else(|| "US".to_string())
    }

    fn playable_ids(&self, ids: &[TrackId], market: &str) -> Result<HashSet<TrackId>, PlannerError> {
        if ids.is_empty() {
            return Ok(HashSet::new());
        }
        let url = format!("{}/v1/tracks", self.base_url);
        let response = self
            .auth(self.agent.get(&url))
            .query("ids", &ids.join(","))
            .query("market", market)
            .call()
            .map_err(|e| PlannerError::PlayabilityLookupFailed(e.to_string()))?;
        let parsed: PlayableTracksResponse = response
            .into_json()
            .map_err(|e| PlannerError::PlayabilityLookupFailed(e.to_string()))?;
        Ok(parsed
            .tracks
            .into_iter()
            .filter(|t| t.is_playable)
            .map(|t| t.id)
            .collect())
    }

    fn find_alternate_playable(
        &self,
        id: &TrackId,
        market: &str,
    ) -> Result<Option<TrackId>, PlannerError> {
        let url = format!("{}/v1/tracks/{}/alternates", self.base_url, id);
        let response = self
            .auth(self.agent.get(&url))
            .query("market", market)
            .call()
            .map_err(|e| PlannerError::AlternateLookupFailed(e.to_string()))?;
        let parsed: AlternateResponse = response
            .into_json()
            .map_err(|e| PlannerError::AlternateLookupFailed(e.to_string()))?;
        Ok(parsed.alternate_id)
    }

    fn create_playlist(
        &self,
        name: &str,
        description: &str,
        is_public: bool,
        uris: &[String],
    ) -> Result<String, PlannerError> {
        let url = format!("{}/v1/me/playlists", self.base_url);
        let body = CreatePlaylistBody {
            name,
            description,
            is_public,
            uris,
        };
        let response = self
            .auth(self.agent.post(&url))
            .send_json(json!(body))
            .map_err(|e| PlannerError::PublishFailed(e.to_string()))?;
        let parsed: CreatePlaylistResponse = response
            .into_json()
            .map_err(|e| PlannerError::PublishFailed(e.to_string()))?;
        Ok(parsed.url)
    }
}
