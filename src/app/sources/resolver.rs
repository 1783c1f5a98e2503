use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use super::{SourceDescriptor, SourceRegistry};
use crate::app::media::{EpisodeRef, MediaKind, MediaRequest};

/// Path shape a provider expects for a specific episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum EpisodeStyle {
    /// `{base}{id}/{season}/{episode}`
    PathSegments,
    /// `{base}{id}-S{season}-E{episode}.html`
    DashedHtml,
    /// `{base}{id}-{season}-{episode}`
    Dashed,
    /// `{base}tv?id={id}&s={season}&e={episode}`
    TvQuery,
    /// `{base}{id}/season/{season}/episode/{episode}`
    SeasonEpisodePath,
    /// `{base}tv/{id}/season/{season}/episode/{episode}`
    TvSeasonEpisodePath,
    /// `{base}imdb/tv?id={id}&s={season}&e={episode}`
    ImdbTvQuery,
    /// `{base}{id}&s={season}&e={episode}`
    AppendedQuery,
    /// `{base}{id}-S{season}E{episode}`
    Generic,
}

/// Exact provider names with a known episode shape.
const EPISODE_STYLES: &[(&str, EpisodeStyle)] = &[
    ("VidCloud", EpisodeStyle::DashedHtml),
    ("fsapi.xyz", EpisodeStyle::Dashed),
    ("SuperEmbed", EpisodeStyle::Dashed),
    ("2Embed", EpisodeStyle::TvQuery),
    ("MoviesAPI", EpisodeStyle::SeasonEpisodePath),
    ("Fmovies", EpisodeStyle::TvSeasonEpisodePath),
    ("LookMovie", EpisodeStyle::TvSeasonEpisodePath),
    ("AutoEmbed", EpisodeStyle::ImdbTvQuery),
    ("MultiEmbed", EpisodeStyle::AppendedQuery),
];

/// Deployments of the VidSrc engine share one shape whatever their domain,
/// so they are grouped by a case-insensitive name match.
const VIDSRC_FAMILY: &str = "vidsrc";

pub(crate) fn style_for(source: &SourceDescriptor) -> EpisodeStyle {
    if let Some(style) = source.episode_style() {
        return style;
    }
    if source.name().to_ascii_lowercase().contains(VIDSRC_FAMILY) {
        return EpisodeStyle::PathSegments;
    }
    EPISODE_STYLES
        .iter()
        .find(|(name, _)| *name == source.name())
        .map(|(_, style)| *style)
        .unwrap_or(EpisodeStyle::Generic)
}

fn format_episode(style: EpisodeStyle, base: &str, id: &str, ep: EpisodeRef) -> String {
    let (s, e) = (ep.season(), ep.episode());
    match style {
        EpisodeStyle::PathSegments => format!("{base}{id}/{s}/{e}"),
        EpisodeStyle::DashedHtml => format!("{base}{id}-S{s}-E{e}.html"),
        EpisodeStyle::Dashed => format!("{base}{id}-{s}-{e}"),
        EpisodeStyle::TvQuery => format!("{base}tv?id={id}&s={s}&e={e}"),
        EpisodeStyle::SeasonEpisodePath => format!("{base}{id}/season/{s}/episode/{e}"),
        EpisodeStyle::TvSeasonEpisodePath => format!("{base}tv/{id}/season/{s}/episode/{e}"),
        EpisodeStyle::ImdbTvQuery => format!("{base}imdb/tv?id={id}&s={s}&e={e}"),
        EpisodeStyle::AppendedQuery => format!("{base}{id}&s={s}&e={e}"),
        EpisodeStyle::Generic => format!("{base}{id}-S{s}E{e}"),
    }
}

/// Builds the playback URL for one provider, or `None` when the provider has
/// no template for the requested kind. Pure; performs no I/O.
pub(crate) fn resolve(source: &SourceDescriptor, request: &MediaRequest) -> Option<String> {
    let id = request.title_id();
    match request.kind() {
        MediaKind::Movie => source.movie_url_template().map(|base| format!("{base}{id}")),
        MediaKind::Series => {
            let base = source.series_url_template()?;
            Some(match request.chosen_episode() {
                Some(ep) => format_episode(style_for(source), base, id, ep),
                None => format!("{base}{id}"),
            })
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ResolvedUrl {
    pub(crate) source: SourceDescriptor,
    pub(crate) url: String,
}

/// Resolves every registered provider in registry order, omitting the ones
/// that cannot serve the request.
pub(crate) fn resolve_all(registry: &SourceRegistry, request: &MediaRequest) -> Vec<ResolvedUrl> {
    registry
        .list_all()
        .iter()
        .filter_map(|source| {
            resolve(source, request).map(|url| ResolvedUrl {
                source: source.clone(),
                url,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::sources::builtin_sources;

    fn builtin(name: &str) -> SourceDescriptor {
        builtin_sources()
            .into_iter()
            .find(|s| s.name() == name)
            .expect("builtin exists")
    }

    fn episode(id: &str, season: u32, ep: u32) -> MediaRequest {
        MediaRequest::episode(id, EpisodeRef::new(season, ep).expect("valid episode"))
    }

    #[test]
    fn movie_url_is_suffix_concatenation() {
        let url = resolve(&builtin("VidSrc.to"), &MediaRequest::movie("tt001"));
        assert_eq!(url.as_deref(), Some("https://vidsrc.to/embed/movie/tt001"));
    }

    #[test]
    fn series_without_template_is_unsupported() {
        let curt = builtin("CurtStream");
        assert_eq!(resolve(&curt, &MediaRequest::series("tt1")), None);
        assert_eq!(resolve(&curt, &episode("tt1", 1, 1)), None);
    }

    #[test]
    fn movie_without_template_is_unsupported() {
        let source = SourceDescriptor::new("B", None, Some("https://b/")).expect("valid");
        assert_eq!(resolve(&source, &MediaRequest::movie("tt001")), None);
    }

    #[test]
    fn series_without_episode_uses_suffix_form() {
        let url = resolve(&builtin("2Embed"), &MediaRequest::series("tt9"));
        assert_eq!(url.as_deref(), Some("https://2embed.cc/embed/tt9"));
    }

    #[test]
    fn vidsrc_episode_uses_path_segments() {
        let url = resolve(&builtin("VidSrc.to"), &episode("tt777", 2, 5));
        assert_eq!(url.as_deref(), Some("https://vidsrc.to/embed/tv/tt777/2/5"));
    }

    #[test]
    fn every_builtin_has_its_documented_episode_shape() {
        let expected = [
            ("VidCloud", "https://vidcloud.stream/tt5-S3-E7.html"),
            ("fsapi.xyz", "https://fsapi.xyz/tv-imdb/tt5-3-7"),
            ("VidSrc.to", "https://vidsrc.to/embed/tv/tt5/3/7"),
            ("VidSrc.xyz", "https://vidsrc.xyz/embed/tv/tt5/3/7"),
            ("VidSrc.in", "https://vidsrc.in/embed/tv/tt5/3/7"),
            ("SuperEmbed", "https://superembed.stream/tv/tt5-3-7"),
            ("MoviesAPI", "https://moviesapi.club/tv/tt5/season/3/episode/7"),
            ("2Embed", "https://2embed.cc/embed/tv?id=tt5&s=3&e=7"),
            ("Fmovies", "https://fmovies.to/embed/tv/tt5/season/3/episode/7"),
            ("LookMovie", "https://lookmovie.io/player/tv/tt5/season/3/episode/7"),
            ("AutoEmbed", "https://autoembed.cc/embed/imdb/tv?id=tt5&s=3&e=7"),
            ("MultiEmbed", "https://multiembed.mov/?video_id=tt5&s=3&e=7"),
        ];
        let request = episode("tt5", 3, 7);
        for (name, url) in expected {
            assert_eq!(
                resolve(&builtin(name), &request).as_deref(),
                Some(url),
                "provider {name}"
            );
        }
    }

    #[test]
    fn family_match_is_case_insensitive_and_unknown_names_use_generic() {
        let mirror = SourceDescriptor::new("my-VIDSRC-mirror", None, Some("https://m/tv/"))
            .expect("valid");
        assert_eq!(style_for(&mirror), EpisodeStyle::PathSegments);

        let other = SourceDescriptor::new("Other", None, Some("https://o/")).expect("valid");
        assert_eq!(
            resolve(&other, &episode("tt1", 10, 12)).as_deref(),
            Some("https://o/tt1-S10E12")
        );
    }

    #[test]
    fn explicit_style_overrides_table() {
        let custom = SourceDescriptor::new("VidCloud", None, Some("https://x/"))
            .expect("valid")
            .with_episode_style(EpisodeStyle::TvQuery);
        assert_eq!(
            resolve(&custom, &episode("tt2", 1, 2)).as_deref(),
            Some("https://x/tv?id=tt2&s=1&e=2")
        );
    }

    #[test]
    fn resolution_is_deterministic_and_contains_request_parts() {
        let request = episode("tt42", 4, 11);
        for source in builtin_sources() {
            let first = resolve(&source, &request);
            let second = resolve(&source, &request);
            assert_eq!(first, second);
            if let Some(url) = first {
                assert!(url.contains("tt42"), "{url}");
                assert!(url.contains('4') && url.contains("11"), "{url}");
            }
        }
    }

    #[test]
    fn resolve_all_filters_and_keeps_registry_order() {
        let registry = SourceRegistry::from_sources(
            vec![
                SourceDescriptor::new("A", Some("https://a/"), None).expect("valid"),
                SourceDescriptor::new("B", None, Some("https://b/")).expect("valid"),
            ],
            None,
        );
        let candidates = resolve_all(&registry, &MediaRequest::movie("tt001"));
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].source.name(), "A");
        assert_eq!(candidates[0].url, "https://a/tt001");

        let series = resolve_all(&registry, &episode("tt001", 1, 1));
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].source.name(), "B");
    }
}
