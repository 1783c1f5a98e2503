use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum MediaKind {
    Movie,
    Series,
}

impl MediaKind {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Movie => "movie",
            Self::Series => "series",
        }
    }

    pub(crate) fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "movie" => Some(Self::Movie),
            "series" => Some(Self::Series),
            _ => None,
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A chosen season/episode pair; both numbers are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct EpisodeRef {
    season: u32,
    episode: u32,
}

impl EpisodeRef {
    pub(crate) fn new(season: u32, episode: u32) -> Option<Self> {
        (season >= 1 && episode >= 1).then_some(Self { season, episode })
    }

    pub(crate) fn season(self) -> u32 {
        self.season
    }

    pub(crate) fn episode(self) -> u32 {
        self.episode
    }
}

impl fmt::Display for EpisodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S{}E{}", self.season, self.episode)
    }
}

/// What the viewer asked to watch. An episode is only present for series,
/// and only once one has been chosen.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct MediaRequest {
    title_id: String,
    kind: MediaKind,
    episode: Option<EpisodeRef>,
}

impl MediaRequest {
    pub(crate) fn movie(title_id: impl Into<String>) -> Self {
        Self {
            title_id: title_id.into(),
            kind: MediaKind::Movie,
            episode: None,
        }
    }

    pub(crate) fn series(title_id: impl Into<String>) -> Self {
        Self {
            title_id: title_id.into(),
            kind: MediaKind::Series,
            episode: None,
        }
    }

    pub(crate) fn episode(title_id: impl Into<String>, episode: EpisodeRef) -> Self {
        Self {
            title_id: title_id.into(),
            kind: MediaKind::Series,
            episode: Some(episode),
        }
    }

    pub(crate) fn title_id(&self) -> &str {
        &self.title_id
    }

    pub(crate) fn kind(&self) -> MediaKind {
        self.kind
    }

    pub(crate) fn chosen_episode(&self) -> Option<EpisodeRef> {
        self.episode
    }
}
