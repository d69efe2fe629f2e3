use std::collections::HashMap;

use serde::Deserialize;

use crate::errors::PlannerError;
use crate::models::{ArtistId, Artist, AudioFeature, SourceLayer, Track, TrackId};

/// On-disk shape of one catalog layer: a flat JSON object of parallel
/// arrays, the simplest format a read-only external store can hand us.
#[derive(Debug, Deserialize)]
pub struct CatalogLayerFile {
    pub tracks: Vec<Track>,
    pub artists: Vec<Artist>,
    pub features: Vec<AudioFeature>,
}

/// Narrow read-only interface onto one catalog layer (Primary, Secondary,
/// or Tertiary). Tests substitute an in-memory implementation.
pub trait CatalogStore {
    fn layer(&self) -> SourceLayer;
    fn load(&self) -> Result<CatalogLayerFile, PlannerError>;
}

/// Reads a layer from a JSON file on disk.
pub struct JsonFileCatalogStore {
    pub path: String,
    pub layer: SourceLayer,
}

impl CatalogStore for JsonFileCatalogStore {
    fn layer(&self) -> SourceLayer {
        self.layer
    }

    fn load(&self) -> Result<CatalogLayerFile, PlannerError> {
        let content = std::fs::read_to_string(&self.path)
            .map_err(|e| PlannerError::CatalogUnavailable(format!("{}: {}", self.path, e)))?;
        serde_json::from_str(&content)
            .map_err(|e| PlannerError::CatalogUnavailable(format!("{}: {}", self.path, e)))
    }
}

/// In-memory layer, useful for tests and for callers that already have
/// catalog data loaded (e.g. fixtures).
pub struct InMemoryCatalogStore {
    pub layer: SourceLayer,
    pub data: CatalogLayerFile,
}

impl CatalogStore for InMemoryCatalogStore {
    fn layer(&self) -> SourceLayer {
        self.layer
    }

    fn load(&self) -> Result<CatalogLayerFile, PlannerError> {
        Ok(CatalogLayerFile {
            tracks: self.data.tracks.clone(),
            artists: self.data.artists.clone(),
            features: self.data.features.clone(),
        })
    }
}

/// A joined, deduplicated view over all three catalog layers, built once
/// at startup and treated as read-only for the rest of the run.
#[derive(Debug)]
pub struct CatalogIndex {
    pub tracks: HashMap<TrackId, Track>,
    pub features: HashMap<TrackId, AudioFeature>,
    pub artists: HashMap<ArtistId, Artist>,
    pub source: HashMap<TrackId, SourceLayer>,
}

impl CatalogIndex {
    /// Builds the index from the three layers in decreasing precedence.
    /// Primary entries always win; Secondary fills gaps Primary doesn't
    /// cover; Tertiary fills whatever remains.
    pub fn build(
        primary: &dyn CatalogStore,
        secondary: &dyn CatalogStore,
        tertiary: &dyn CatalogStore,
    ) -> Result<CatalogIndex, PlannerError> {
        let mut index = CatalogIndex {
            tracks: HashMap::new(),
            features: HashMap::new(),
            artists: HashMap::new(),
            source: HashMap::new(),
        };

        for store in [primary, secondary, tertiary] {
            let layer = store.load()?;
            let tag = store.layer();
            for track in layer.tracks {
                index.source.entry(track.id.clone()).or_insert(tag);
                index.tracks.entry(track.id.clone()).or_insert(track);
            }
            for feature in layer.features {
                index
                    .features
                    .entry(feature.track_id.clone())
                    .or_insert(feature);
            }
            for artist in layer.artists {
                index.artists.entry(artist.id.clone()).or_insert(artist);
            }
        }

        if index.tracks.is_empty() {
            return Err(PlannerError::CatalogUnavailable(
                "no tracks in any layer".to_string(),
            ));
        }

        Ok(index)
    }

    pub fn feature_of(&self, track_id: &str) -> Option<&AudioFeature> {
        self.features.get(track_id)
    }

    pub fn artist_of(&self, artist_id: &str) -> Option<&Artist> {
        self.artists.get(artist_id)
    }

    pub fn source_of(&self, track_id: &str) -> SourceLayer {
        self.source
            .get(track_id)
            .copied()
            .unwrap_or(SourceLayer::Tertiary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(id: &str) -> Track {
        Track {
            id: id.to_string(),
            name: format!("Track {id}"),
            artist_id: "artist-1".to_string(),
            duration_ms: 200_000,
            album_release_year: Some(2021),
            is_playable: true,
            album_name: None,
            popularity: None,
        }
    }

    fn layer_with(layer: SourceLayer, ids: &[&str]) -> InMemoryCatalogStore {
        InMemoryCatalogStore {
            layer,
            data: CatalogLayerFile {
                tracks: ids.iter().map(|id| track(id)).collect(),
                artists: vec![],
                features: vec![],
            },
        }
    }

    #[test]
    fn primary_wins_on_duplicate_ids() {
        let primary = layer_with(SourceLayer::Primary, &["a", "b"]);
        let secondary = layer_with(SourceLayer::Secondary, &["b", "c"]);
        let tertiary = layer_with(SourceLayer::Tertiary, &["c", "d"]);

        let index = CatalogIndex::build(&primary, &secondary, &tertiary).unwrap();

        assert_eq!(index.tracks.len(), 4);
        assert_eq!(index.source_of("b"), SourceLayer::Primary);
        assert_eq!(index.source_of("c"), SourceLayer::Secondary);
        assert_eq!(index.source_of("d"), SourceLayer::Tertiary);
    }

    #[test]
    fn empty_layers_yield_catalog_unavailable() {
        let primary = layer_with(SourceLayer::Primary, &[]);
        let secondary = layer_with(SourceLayer::Secondary, &[]);
        let tertiary = layer_with(SourceLayer::Tertiary, &[]);

        let err = CatalogIndex::build(&primary, &secondary, &tertiary).unwrap_err();
        assert_eq!(err.kind(), "CatalogUnavailable");
    }
}
