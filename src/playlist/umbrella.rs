//! Genre Umbrella Service (spec §4.2): maps free-form artist genre tags
//! onto a fixed set of umbrellas, scores affinity against a target
//! weighting, and broadens a weighting to neighboring umbrellas.

use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::models::Umbrella;

/// Fixed adjacency graph, provided with the implementation per spec §4.2.
/// Symmetric by construction (`neighbors_of` looks both directions).
static ADJACENCY: Lazy<Vec<(Umbrella, Umbrella)>> = Lazy::new(|| {
    vec![
        (Umbrella::Pop, Umbrella::Electronic),
        (Umbrella::Rock, Umbrella::Indie),
        (Umbrella::Rock, Umbrella::Metal),
        (Umbrella::HipHop, Umbrella::RnB),
        (Umbrella::Country, Umbrella::Folk),
        (Umbrella::Jazz, Umbrella::Classical),
        (Umbrella::Latin, Umbrella::Pop),
        (Umbrella::Indie, Umbrella::Electronic),
    ]
});

/// Substring match table from a lowercased free-form genre tag to the
/// umbrella it belongs to. First match wins; a tag may only belong to one
/// umbrella.
const TAG_TABLE: &[(&str, Umbrella)] = &[
    ("hip hop", Umbrella::HipHop),
    ("hip-hop", Umbrella::HipHop),
    ("rap", Umbrella::HipHop),
    ("r&b", Umbrella::RnB),
    ("rnb", Umbrella::RnB),
    ("soul", Umbrella::RnB),
    ("reggaeton", Umbrella::Latin),
    ("latin", Umbrella::Latin),
    ("indie", Umbrella::Indie),
    ("alt", Umbrella::Rock),
    ("punk", Umbrella::Rock),
    ("rock", Umbrella::Rock),
    ("metal", Umbrella::Metal),
    ("electro", Umbrella::Electronic),
    ("edm", Umbrella::Electronic),
    ("house", Umbrella::Electronic),
    ("techno", Umbrella::Electronic),
    ("dance", Umbrella::Electronic),
    ("country", Umbrella::Country),
    ("folk", Umbrella::Folk),
    ("jazz", Umbrella::Jazz),
    ("classical", Umbrella::Classical),
    ("orchestral", Umbrella::Classical),
    ("pop", Umbrella::Pop),
];

/// Classify a single free-form genre tag into an umbrella, if any table
/// entry matches.
pub fn classify(tag: &str) -> Option<Umbrella> {
    let lower = tag.to_lowercase();
    TAG_TABLE
        .iter()
        .find(|(pattern, _)| lower.contains(pattern))
        .map(|(_, umbrella)| *umbrella)
}

fn neighbors_of(umbrella: Umbrella) -> Vec<Umbrella> {
    ADJACENCY
        .iter()
        .filter_map(|&(a, b)| {
            if a == umbrella {
                Some(b)
            } else if b == umbrella {
                Some(a)
            } else {
                None
            }
        })
        .collect()
}

/// Affinity in `[0,1]` between a set of artist genre tags and a target
/// umbrella weighting: weighted overlap count normalized by the number of
/// artist genre tags, capped at 1.
pub fn affinity(artist_genres: &[String], target_weights: &HashMap<Umbrella, f64>) -> f64 {
    if artist_genres.is_empty() || target_weights.is_empty() {
        return 0.0;
    }
    let weighted_sum: f64 = artist_genres
        .iter()
        .filter_map(|g| classify(g))
        .filter_map(|u| target_weights.get(&u))
        .sum();
    (weighted_sum / artist_genres.len() as f64).min(1.0)
}

/// Builds a target weighting from the selected umbrellas: 1.0 for each
/// selected umbrella, `neighbor_weight` for each of their neighbors (never
/// overriding a selected umbrella's 1.0), 0 elsewhere. `neighbor_weight =
/// 0` means selected-only.
pub fn selected_with_neighbors(
    selected: &[Umbrella],
    neighbor_weight: f64,
) -> HashMap<Umbrella, f64> {
    let mut weights = HashMap::new();
    for &u in selected {
        weights.insert(u, 1.0);
    }
    if neighbor_weight > 0.0 {
        for &u in selected {
            for n in neighbors_of(u) {
                weights.entry(n).or_insert(neighbor_weight);
            }
        }
    }
    weights
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn classifies_common_tags() {
        assert_eq!(classify("Dance Pop"), Some(Umbrella::Electronic));
        assert_eq!(classify("Deep House"), Some(Umbrella::Electronic));
        assert_eq!(classify("Alt Rock"), Some(Umbrella::Rock));
        assert_eq!(classify("Bluegrass Folk"), Some(Umbrella::Folk));
        assert_eq!(classify("unrelated-tag"), None);
    }

    #[test]
    fn affinity_is_weighted_overlap_capped_at_one() {
        let mut weights = HashMap::new();
        weights.insert(Umbrella::Rock, 1.0);
        let genres = vec!["rock".to_string(), "metal".to_string()];
        let score = affinity(&genres, &weights);
        assert_relative_eq!(score, 0.5);
    }

    #[test]
    fn neighbor_broadening_never_overrides_selected_weight() {
        let weights = selected_with_neighbors(&[Umbrella::Rock], 0.6);
        assert_relative_eq!(*weights.get(&Umbrella::Rock).unwrap(), 1.0);
        assert_relative_eq!(*weights.get(&Umbrella::Indie).unwrap(), 0.6);
        assert_relative_eq!(*weights.get(&Umbrella::Metal).unwrap(), 0.6);
        assert!(weights.get(&Umbrella::Jazz).is_none());
    }

    #[test]
    fn selected_only_mode_has_no_neighbors() {
        let weights = selected_with_neighbors(&[Umbrella::Rock], 0.0);
        assert_eq!(weights.len(), 1);
    }
}
