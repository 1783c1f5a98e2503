use thiserror::Error;

/// Failures the playback engine knows how to classify.
///
/// Only `MetadataUnavailable` and `NoCandidateSource` ever reach the viewer;
/// `SourceUnreachable` drives automatic fallback and `PersistedStateCorrupt`
/// is recovered by treating the stored list as empty.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub(crate) enum PlaybackError {
    #[error("could not fetch details for this title: {0}")]
    MetadataUnavailable(String),

    #[error("no video sources available")]
    NoCandidateSource,

    #[error("source {provider} is unreachable")]
    SourceUnreachable { provider: String },

    #[error("stored list '{key}' is corrupt: {detail}")]
    PersistedStateCorrupt { key: String, detail: String },
}

/// Tagged failure shape returned across the metadata boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub(crate) enum MetadataError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("request failed: {0}")]
    Transport(String),

    #[error("malformed response: {0}")]
    Malformed(String),
}

impl From<MetadataError> for PlaybackError {
    fn from(err: MetadataError) -> Self {
        match err {
            MetadataError::NotFound(detail)
            | MetadataError::Transport(detail)
            | MetadataError::Malformed(detail) => Self::MetadataUnavailable(detail),
        }
    }
}
