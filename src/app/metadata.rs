use serde::Deserialize;
use tracing::debug;

use super::media::MediaKind;
use crate::config::MetadataConfig;
use crate::error::MetadataError;
use crate::http::{RetryPolicy, get_text_with_retries};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TitleDetails {
    pub(crate) title_id: String,
    pub(crate) title: String,
    pub(crate) kind: MediaKind,
    pub(crate) year: Option<String>,
    pub(crate) plot: Option<String>,
    pub(crate) poster_url: Option<String>,
    pub(crate) total_seasons: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SearchHit {
    pub(crate) title_id: String,
    pub(crate) title: String,
    pub(crate) year: Option<String>,
    pub(crate) kind: MediaKind,
    pub(crate) poster_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SearchPage {
    pub(crate) results: Vec<SearchHit>,
    pub(crate) total_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct EpisodeSummary {
    pub(crate) number: u32,
    pub(crate) title: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SeasonListing {
    pub(crate) season: u32,
    pub(crate) episodes: Vec<EpisodeSummary>,
}

/// Title metadata lookups. Every call answers with a tagged result; nothing
/// here panics or retries beyond the transport policy.
pub(crate) trait MetadataService: Send + Sync {
    fn lookup_by_title(
        &self,
        title: &str,
        kind: Option<MediaKind>,
    ) -> Result<TitleDetails, MetadataError>;

    fn lookup_by_id(&self, title_id: &str) -> Result<TitleDetails, MetadataError>;

    fn search(
        &self,
        query: &str,
        page: u32,
        kind: Option<MediaKind>,
    ) -> Result<SearchPage, MetadataError>;

    fn list_season(&self, title_id: &str, season: u32) -> Result<SeasonListing, MetadataError>;
}

/// Client for an OMDb-compatible proxy mounted at `{base_url}/omdb-proxy`.
pub(crate) struct OmdbProxyClient {
    endpoint: String,
    policy: RetryPolicy,
}

impl OmdbProxyClient {
    pub(crate) fn new(config: &MetadataConfig) -> Self {
        Self {
            endpoint: format!("{}/omdb-proxy", config.base_url.trim_end_matches('/')),
            policy: RetryPolicy {
                connect_timeout: config.connect_timeout(),
                read_timeout: config.read_timeout(),
                attempts: config.attempts,
                retry_delay: config.retry_delay(),
            },
        }
    }

    fn fetch(&self, query: &[(&str, String)]) -> Result<String, MetadataError> {
        debug!(endpoint = %self.endpoint, ?query, "metadata request");
        get_text_with_retries(&self.endpoint, query, &self.policy).map_err(MetadataError::Transport)
    }
}

impl MetadataService for OmdbProxyClient {
    fn lookup_by_title(
        &self,
        title: &str,
        kind: Option<MediaKind>,
    ) -> Result<TitleDetails, MetadataError> {
        let mut query = vec![("title", title.to_string())];
        if let Some(kind) = kind {
            query.push(("type", kind.as_str().to_string()));
        }
        parse_details(&self.fetch(&query)?)
    }

    fn lookup_by_id(&self, title_id: &str) -> Result<TitleDetails, MetadataError> {
        parse_details(&self.fetch(&[
            ("imdbID", title_id.to_string()),
            ("plot", "full".to_string()),
        ])?)
    }

    fn search(
        &self,
        query: &str,
        page: u32,
        kind: Option<MediaKind>,
    ) -> Result<SearchPage, MetadataError> {
        let mut params = vec![("s", query.to_string()), ("page", page.max(1).to_string())];
        if let Some(kind) = kind {
            params.push(("type", kind.as_str().to_string()));
        }
        parse_search(&self.fetch(&params)?)
    }

    fn list_season(&self, title_id: &str, season: u32) -> Result<SeasonListing, MetadataError> {
        let raw = self.fetch(&[
            ("imdbID", title_id.to_string()),
            ("seasonNumber", season.to_string()),
        ])?;
        parse_season(&raw, season)
    }
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "Response")]
    response: Option<String>,
    #[serde(rename = "Error")]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawDetails {
    #[serde(rename = "imdbID")]
    imdb_id: Option<String>,
    #[serde(rename = "Title")]
    title: Option<String>,
    #[serde(rename = "Type")]
    kind: Option<String>,
    #[serde(rename = "Year")]
    year: Option<String>,
    #[serde(rename = "Plot")]
    plot: Option<String>,
    #[serde(rename = "Poster")]
    poster: Option<String>,
    #[serde(rename = "totalSeasons")]
    total_seasons: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawSearch {
    #[serde(rename = "Search", default)]
    results: Vec<RawDetails>,
    #[serde(rename = "totalResults")]
    total_results: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawSeason {
    #[serde(rename = "Episodes", default)]
    episodes: Vec<RawEpisode>,
}

#[derive(Debug, Deserialize)]
struct RawEpisode {
    #[serde(rename = "Episode")]
    episode: Option<String>,
    #[serde(rename = "Title")]
    title: Option<String>,
}

/// Fields the proxy fills with "N/A" carry no information.
fn present(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty() && v != "N/A")
}

fn check_envelope(raw: &str) -> Result<(), MetadataError> {
    let envelope: Envelope =
        serde_json::from_str(raw).map_err(|err| MetadataError::Malformed(err.to_string()))?;
    match envelope.response.as_deref() {
        Some("True") => Ok(()),
        Some(_) => Err(MetadataError::NotFound(
            present(envelope.error).unwrap_or_else(|| "Unknown error.".to_string()),
        )),
        None => Err(MetadataError::Malformed(
            "missing Response field".to_string(),
        )),
    }
}

fn details_from_raw(raw: RawDetails) -> Result<TitleDetails, MetadataError> {
    let (Some(title_id), Some(title)) = (present(raw.imdb_id), present(raw.title)) else {
        return Err(MetadataError::Malformed(
            "details without id or title".to_string(),
        ));
    };
    // Only movies and series have playable URLs; episodes and games do not.
    let kind = match present(raw.kind) {
        None => MediaKind::Movie,
        Some(kind) => MediaKind::parse(&kind).ok_or_else(|| {
            MetadataError::NotFound(format!("{title_id} is a {kind}, not a movie or series"))
        })?,
    };
    Ok(TitleDetails {
        title_id,
        title,
        kind,
        year: present(raw.year),
        plot: present(raw.plot),
        poster_url: present(raw.poster),
        total_seasons: present(raw.total_seasons).and_then(|v| v.parse().ok()),
    })
}

pub(crate) fn parse_details(raw: &str) -> Result<TitleDetails, MetadataError> {
    check_envelope(raw)?;
    let details: RawDetails =
        serde_json::from_str(raw).map_err(|err| MetadataError::Malformed(err.to_string()))?;
    details_from_raw(details)
}

pub(crate) fn parse_search(raw: &str) -> Result<SearchPage, MetadataError> {
    check_envelope(raw)?;
    let search: RawSearch =
        serde_json::from_str(raw).map_err(|err| MetadataError::Malformed(err.to_string()))?;
    let results: Vec<SearchHit> = search
        .results
        .into_iter()
        .filter_map(|raw| details_from_raw(raw).ok())
        .map(|details| SearchHit {
            title_id: details.title_id,
            title: details.title,
            year: details.year,
            kind: details.kind,
            poster_url: details.poster_url,
        })
        .collect();
    let total_count = present(search.total_results)
        .and_then(|v| v.parse().ok())
        .unwrap_or(results.len() as u32);
    Ok(SearchPage {
        results,
        total_count,
    })
}

pub(crate) fn parse_season(raw: &str, season: u32) -> Result<SeasonListing, MetadataError> {
    check_envelope(raw)?;
    let listing: RawSeason =
        serde_json::from_str(raw).map_err(|err| MetadataError::Malformed(err.to_string()))?;
    let mut episodes: Vec<EpisodeSummary> = listing
        .episodes
        .into_iter()
        .filter_map(|ep| {
            let number = present(ep.episode)?.parse::<u32>().ok()?;
            (number >= 1).then(|| EpisodeSummary {
                number,
                title: present(ep.title).unwrap_or_else(|| format!("Episode {number}")),
            })
        })
        .collect();
    episodes.sort_by_key(|ep| ep.number);
    episodes.dedup_by_key(|ep| ep.number);
    Ok(SeasonListing { season, episodes })
}
