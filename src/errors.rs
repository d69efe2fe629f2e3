use thiserror::Error;

/// The error taxonomy for the planner core. Kinds map 1:1 onto the
/// `{error, details}` object the CLI prints on failure; `kind()` gives the
/// stable machine-readable tag.
#[derive(Debug, Error)]
pub enum PlannerError {
    #[error("catalog store unavailable: {0}")]
    CatalogUnavailable(String),

    #[error("no candidate tracks carry audio features")]
    FeaturesStarved,

    #[error("candidate pool is empty after filters")]
    PoolEmpty,

    #[error("final selection is empty")]
    EmptySelection,

    #[error("playability lookup failed: {0}")]
    PlayabilityLookupFailed(String),

    #[error("alternate-track lookup failed: {0}")]
    AlternateLookupFailed(String),

    #[error("publish failed: {0}")]
    PublishFailed(String),
}

impl PlannerError {
    pub fn kind(&self) -> &'static str {
        match self {
            PlannerError::CatalogUnavailable(_) => "CatalogUnavailable",
            PlannerError::FeaturesStarved => "FeaturesStarved",
            PlannerError::PoolEmpty => "PoolEmpty",
            PlannerError::EmptySelection => "EmptySelection",
            PlannerError::PlayabilityLookupFailed(_) => "PlayabilityLookupFailed",
            PlannerError::AlternateLookupFailed(_) => "AlternateLookupFailed",
            PlannerError::PublishFailed(_) => "PublishFailed",
        }
    }
}

pub type PlannerResult<T> = Result<T, PlannerError>;
