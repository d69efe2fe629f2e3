use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type TrackId = String;
pub type ArtistId = String;

/// A single indexed track, as read from one catalog layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Track {
    pub id: TrackId,
    pub name: String,
    #[serde(rename = "artistId")]
    pub artist_id: ArtistId,
    #[serde(rename = "durationMs")]
    pub duration_ms: u32,
    #[serde(rename = "albumReleaseYear")]
    pub album_release_year: Option<i32>,
    #[serde(rename = "isPlayable")]
    pub is_playable: bool,
    #[serde(rename = "albumName")]
    pub album_name: Option<String>,
    pub popularity: Option<f64>,
}

/// Audio characteristics for a track, keyed by trackId.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioFeature {
    #[serde(rename = "trackId")]
    pub track_id: TrackId,
    pub tempo: Option<f64>,
    pub energy: Option<f64>,
    pub danceability: Option<f64>,
    pub valence: Option<f64>,
    pub loudness: Option<f64>,
    pub key: Option<i32>,
    pub mode: Option<i32>,
    #[serde(rename = "timeSignature")]
    pub time_signature: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artist {
    pub id: ArtistId,
    pub name: String,
    pub genres: Vec<String>,
    pub popularity: Option<f64>,
}

/// Usage record keyed by trackId.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    #[serde(rename = "trackId")]
    pub track_id: TrackId,
    #[serde(rename = "lastUsedAt")]
    pub last_used_at: Option<DateTime<Utc>>,
    #[serde(rename = "usedCount")]
    pub used_count: u32,
}

/// Workout template. `Rest` (and the `longEasy` alias, handled by the
/// caller scaling minutes) produce an empty plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Template {
    Light,
    Tempo,
    Hiit,
    Intervals,
    Pyramid,
    Kicker,
    Rest,
}

impl Template {
    /// Parse a template name, accepting both the canonical name and the
    /// alias seen in the source material (easyRun/strongSteady/etc).
    pub fn parse(raw: &str) -> Option<Template> {
        match raw.to_lowercase().as_str() {
            "light" | "easyrun" | "easy_run" => Some(Template::Light),
            "tempo" | "strongsteady" | "strong_steady" => Some(Template::Tempo),
            "hiit" | "shortwaves" | "short_waves" => Some(Template::Hiit),
            "intervals" | "longwaves" | "long_waves" => Some(Template::Intervals),
            "pyramid" => Some(Template::Pyramid),
            "kicker" => Some(Template::Kicker),
            "rest" => Some(Template::Rest),
            // `longEasy` is `light` with the caller having already scaled
            // minutes by ~1.5; the planner itself does not branch on it.
            "longeasy" | "long_easy" => Some(Template::Light),
            _ => None,
        }
    }
}

/// Quantized intensity label, total order easy < moderate < strong < hard < max.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EffortTier {
    Easy,
    Moderate,
    Strong,
    Hard,
    Max,
}

impl EffortTier {
    pub const ALL: [EffortTier; 5] = [
        EffortTier::Easy,
        EffortTier::Moderate,
        EffortTier::Strong,
        EffortTier::Hard,
        EffortTier::Max,
    ];

    /// Tier `delta` steps up (positive) or down (negative) the total order.
    pub fn step(self, delta: i32) -> Option<EffortTier> {
        let idx = Self::ALL.iter().position(|&t| t == self)? as i32 + delta;
        if idx < 0 {
            return None;
        }
        Self::ALL.get(idx as usize).copied()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Segment {
    Warmup,
    Main,
    Cooldown,
}

#[derive(Debug, Clone, Copy)]
pub struct Slot {
    pub effort: EffortTier,
    pub target_effort: f64,
    pub segment: Segment,
}

/// Fixed, coarse genre grouping used for affinity scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Umbrella {
    Pop,
    Rock,
    Electronic,
    HipHop,
    Indie,
    Country,
    Latin,
    RnB,
    Jazz,
    Classical,
    Folk,
    Metal,
}

impl Umbrella {
    pub const ALL: [Umbrella; 12] = [
        Umbrella::Pop,
        Umbrella::Rock,
        Umbrella::Electronic,
        Umbrella::HipHop,
        Umbrella::Indie,
        Umbrella::Country,
        Umbrella::Latin,
        Umbrella::RnB,
        Umbrella::Jazz,
        Umbrella::Classical,
        Umbrella::Folk,
        Umbrella::Metal,
    ];

    pub fn parse(raw: &str) -> Option<Umbrella> {
        let norm = raw.to_lowercase().replace([' ', '-', '&'], "");
        match norm.as_str() {
            "pop" => Some(Umbrella::Pop),
            "rock" | "rockalt" => Some(Umbrella::Rock),
            "electronic" => Some(Umbrella::Electronic),
            "hiphop" => Some(Umbrella::HipHop),
            "indie" => Some(Umbrella::Indie),
            "country" => Some(Umbrella::Country),
            "latin" => Some(Umbrella::Latin),
            "rnb" | "rb" => Some(Umbrella::RnB),
            "jazz" => Some(Umbrella::Jazz),
            "classical" => Some(Umbrella::Classical),
            "folk" => Some(Umbrella::Folk),
            "metal" => Some(Umbrella::Metal),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Umbrella::Pop => "pop",
            Umbrella::Rock => "rock",
            Umbrella::Electronic => "electronic",
            Umbrella::HipHop => "hiphop",
            Umbrella::Indie => "indie",
            Umbrella::Country => "country",
            Umbrella::Latin => "latin",
            Umbrella::RnB => "rnb",
            Umbrella::Jazz => "jazz",
            Umbrella::Classical => "classical",
            Umbrella::Folk => "folk",
            Umbrella::Metal => "metal",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Decade {
    D70s,
    D80s,
    D90s,
    D00s,
    D10s,
    D20s,
}

impl Decade {
    pub fn parse(raw: &str) -> Option<Decade> {
        match raw.to_lowercase().as_str() {
            "70s" => Some(Decade::D70s),
            "80s" => Some(Decade::D80s),
            "90s" => Some(Decade::D90s),
            "00s" => Some(Decade::D00s),
            "10s" => Some(Decade::D10s),
            "20s" => Some(Decade::D20s),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Decade::D70s => "70s",
            Decade::D80s => "80s",
            Decade::D90s => "90s",
            Decade::D00s => "00s",
            Decade::D10s => "10s",
            Decade::D20s => "20s",
        }
    }

    /// The decade an album release year falls into. `20s` covers years >= 2020.
    pub fn of_year(year: i32) -> Option<Decade> {
        match year {
            1970..=1979 => Some(Decade::D70s),
            1980..=1989 => Some(Decade::D80s),
            1990..=1999 => Some(Decade::D90s),
            2000..=2009 => Some(Decade::D00s),
            2010..=2019 => Some(Decade::D10s),
            y if y >= 2020 => Some(Decade::D20s),
            _ => None,
        }
    }
}

/// Source catalog layer, in descending precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceLayer {
    Primary,
    Secondary,
    Tertiary,
}

/// A track admitted to the candidate pool, carrying its joined feature and
/// artist data plus pool-computed flags.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub track: Track,
    pub feature: AudioFeature,
    pub artist: Option<Artist>,
    pub is_rediscovery: bool,
    pub last_used_at: Option<DateTime<Utc>>,
    pub genre_affinity: f64,
    pub source: SourceLayer,
}

impl Candidate {
    pub fn artist_genres(&self) -> Vec<String> {
        self.artist
            .as_ref()
            .map(|a| a.genres.clone())
            .unwrap_or_default()
    }

    pub fn artist_name(&self) -> String {
        self.artist
            .as_ref()
            .map(|a| a.name.clone())
            .unwrap_or_else(|| "Unknown Artist".to_string())
    }

    pub fn duration_seconds(&self) -> u32 {
        self.track.duration_ms / 1000
    }
}

/// One emitted track, with the full diagnostic record described by the
/// JSON output schema's `slots[]` entries.
#[derive(Debug, Clone)]
pub struct ChosenTrack {
    pub index: usize,
    pub segment: Segment,
    pub effort: EffortTier,
    pub target_effort: f64,
    pub track_id: TrackId,
    pub artist_id: ArtistId,
    pub artist_name: String,
    pub track_name: String,
    pub album_release_year: Option<i32>,
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

/// Distinct artist ids seen in a selection.
pub fn unique_artists(chosen: &[ChosenTrack]) -> HashSet<&str> {
    chosen.iter().map(|c| c.artist_id.as_str()).collect()
}
