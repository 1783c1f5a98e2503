mod resolver;

pub(crate) use resolver::{EpisodeStyle, ResolvedUrl, resolve_all, style_for};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// One embed provider. At least one of the two templates is always present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SourceDescriptor {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    movie_url_template: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    series_url_template: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    episode_style: Option<EpisodeStyle>,
}

impl SourceDescriptor {
    pub(crate) fn new(
        name: &str,
        movie_url_template: Option<&str>,
        series_url_template: Option<&str>,
    ) -> Option<Self> {
        let name = name.trim();
        let movie = non_blank(movie_url_template);
        let series = non_blank(series_url_template);
        if name.is_empty() || (movie.is_none() && series.is_none()) {
            return None;
        }
        Some(Self {
            name: name.to_string(),
            movie_url_template: movie,
            series_url_template: series,
            episode_style: None,
        })
    }

    pub(crate) fn with_episode_style(mut self, style: EpisodeStyle) -> Self {
        self.episode_style = Some(style);
        self
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn movie_url_template(&self) -> Option<&str> {
        self.movie_url_template.as_deref()
    }

    pub(crate) fn series_url_template(&self) -> Option<&str> {
        self.series_url_template.as_deref()
    }

    pub(crate) fn episode_style(&self) -> Option<EpisodeStyle> {
        self.episode_style
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

struct BuiltinSource {
    name: &'static str,
    movie: Option<&'static str>,
    series: Option<&'static str>,
}

const BUILTIN_SOURCES: &[BuiltinSource] = &[
    BuiltinSource {
        name: "VidCloud",
        movie: Some("https://vidcloud.stream/"),
        series: Some("https://vidcloud.stream/"),
    },
    BuiltinSource {
        name: "fsapi.xyz",
        movie: Some("https://fsapi.xyz/movie/"),
        series: Some("https://fsapi.xyz/tv-imdb/"),
    },
    BuiltinSource {
        name: "CurtStream",
        movie: Some("https://curtstream.com/movies/imdb/"),
        series: None,
    },
    BuiltinSource {
        name: "VidSrc.to",
        movie: Some("https://vidsrc.to/embed/movie/"),
        series: Some("https://vidsrc.to/embed/tv/"),
    },
    BuiltinSource {
        name: "VidSrc.xyz",
        movie: Some("https://vidsrc.xyz/embed/movie/"),
        series: Some("https://vidsrc.xyz/embed/tv/"),
    },
    BuiltinSource {
        name: "VidSrc.in",
        movie: Some("https://vidsrc.in/embed/movie/"),
        series: Some("https://vidsrc.in/embed/tv/"),
    },
    BuiltinSource {
        name: "SuperEmbed",
        movie: Some("https://superembed.stream/movie/"),
        series: Some("https://superembed.stream/tv/"),
    },
    BuiltinSource {
        name: "MoviesAPI",
        movie: Some("https://moviesapi.club/movie/"),
        series: Some("https://moviesapi.club/tv/"),
    },
    BuiltinSource {
        name: "2Embed",
        movie: Some("https://2embed.cc/embed/"),
        series: Some("https://2embed.cc/embed/"),
    },
    BuiltinSource {
        name: "Fmovies",
        movie: Some("https://fmovies.to/embed/"),
        series: Some("https://fmovies.to/embed/"),
    },
    BuiltinSource {
        name: "LookMovie",
        movie: Some("https://lookmovie.io/player/"),
        series: Some("https://lookmovie.io/player/"),
    },
    BuiltinSource {
        name: "AutoEmbed",
        movie: Some("https://autoembed.cc/embed/"),
        series: Some("https://autoembed.cc/embed/"),
    },
    BuiltinSource {
        name: "MultiEmbed",
        movie: Some("https://multiembed.mov/?video_id="),
        series: Some("https://multiembed.mov/?video_id="),
    },
];

pub(crate) fn builtin_sources() -> Vec<SourceDescriptor> {
    BUILTIN_SOURCES
        .iter()
        .filter_map(|src| SourceDescriptor::new(src.name, src.movie, src.series))
        .collect()
}

/// Shape accepted from persisted configuration. `url`/`tvUrl` are the legacy
/// spellings of the two templates.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredSource {
    #[serde(default)]
    name: Option<String>,
    #[serde(default, alias = "url")]
    movie_url_template: Option<String>,
    #[serde(default, alias = "tvUrl")]
    series_url_template: Option<String>,
    #[serde(default)]
    episode_style: Option<EpisodeStyle>,
}

/// Parses the persisted custom source list. A non-array document is an error;
/// individual entries that fail validation are dropped.
pub(crate) fn parse_custom_sources(raw: &str) -> Result<Vec<SourceDescriptor>, serde_json::Error> {
    let entries: Vec<Value> = serde_json::from_str(raw)?;
    let mut out = Vec::with_capacity(entries.len());
    for (idx, entry) in entries.into_iter().enumerate() {
        let Ok(stored) = serde_json::from_value::<StoredSource>(entry) else {
            warn!(index = idx, "ignoring custom source with invalid shape");
            continue;
        };
        let Some(descriptor) = SourceDescriptor::new(
            stored.name.as_deref().unwrap_or_default(),
            stored.movie_url_template.as_deref(),
            stored.series_url_template.as_deref(),
        ) else {
            warn!(index = idx, "ignoring custom source without a name or template");
            continue;
        };
        out.push(match stored.episode_style {
            Some(style) => descriptor.with_episode_style(style),
            None => descriptor,
        });
    }
    Ok(out)
}

/// Ordered provider list for one session: built-ins first, then custom entries.
#[derive(Debug, Clone)]
pub(crate) struct SourceRegistry {
    sources: Vec<SourceDescriptor>,
    preferred: Option<String>,
}

impl SourceRegistry {
    pub(crate) fn new(custom: Vec<SourceDescriptor>, preferred: Option<&str>) -> Self {
        let mut sources = builtin_sources();
        sources.extend(custom);
        Self::from_sources(sources, preferred)
    }

    /// Builds a registry from an explicit list. Later entries reusing an
    /// earlier name are dropped so lookups stay unambiguous.
    pub(crate) fn from_sources(sources: Vec<SourceDescriptor>, preferred: Option<&str>) -> Self {
        let mut unique: Vec<SourceDescriptor> = Vec::with_capacity(sources.len());
        for source in sources {
            if unique.iter().any(|s| s.name() == source.name()) {
                warn!(name = source.name(), "ignoring duplicate source name");
                continue;
            }
            unique.push(source);
        }
        Self {
            sources: unique,
            preferred: preferred
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string),
        }
    }

    pub(crate) fn list_all(&self) -> &[SourceDescriptor] {
        &self.sources
    }

    pub(crate) fn find_by_name(&self, name: &str) -> Option<&SourceDescriptor> {
        self.sources.iter().find(|s| s.name() == name)
    }

    pub(crate) fn default_source(&self) -> Option<&SourceDescriptor> {
        self.preferred
            .as_deref()
            .and_then(|name| self.find_by_name(name))
            .or_else(|| self.sources.first())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(name: &str, movie: Option<&str>, series: Option<&str>) -> SourceDescriptor {
        SourceDescriptor::new(name, movie, series).expect("valid descriptor")
    }

    #[test]
    fn descriptor_requires_name_and_one_template() {
        assert!(SourceDescriptor::new("", Some("https://a/"), None).is_none());
        assert!(SourceDescriptor::new("A", None, None).is_none());
        assert!(SourceDescriptor::new("A", Some("  "), Some("")).is_none());
        assert!(SourceDescriptor::new("A", None, Some("https://b/")).is_some());
    }

    #[test]
    fn builtins_keep_declaration_order() {
        let names: Vec<String> = builtin_sources()
            .iter()
            .map(|s| s.name().to_string())
            .collect();
        assert_eq!(names.len(), 13);
        assert_eq!(names[0], "VidCloud");
        assert_eq!(names[3], "VidSrc.to");
        assert_eq!(names[12], "MultiEmbed");
        let curt = builtin_sources()
            .into_iter()
            .find(|s| s.name() == "CurtStream")
            .expect("CurtStream is built in");
        assert_eq!(curt.series_url_template(), None);
    }

    #[test]
    fn registry_appends_custom_after_builtins() {
        let custom = vec![source("Mine", Some("https://mine/"), None)];
        let registry = SourceRegistry::new(custom, None);
        let all = registry.list_all();
        assert_eq!(all.len(), 14);
        assert_eq!(all.last().map(SourceDescriptor::name), Some("Mine"));
        assert_eq!(registry.default_source().map(|s| s.name()), Some("VidCloud"));
    }

    #[test]
    fn default_prefers_configured_name_regardless_of_position() {
        let sources = vec![
            source("A", Some("https://a/"), None),
            source("B", Some("https://b/"), None),
            source("C", Some("https://c/"), None),
        ];
        let registry = SourceRegistry::from_sources(sources.clone(), Some("C"));
        assert_eq!(registry.default_source().map(|s| s.name()), Some("C"));

        let mut reversed = sources;
        reversed.reverse();
        let registry = SourceRegistry::from_sources(reversed, Some("C"));
        assert_eq!(registry.default_source().map(|s| s.name()), Some("C"));
    }

    #[test]
    fn default_falls_back_to_first_and_empty_is_none() {
        let registry = SourceRegistry::from_sources(
            vec![source("A", Some("https://a/"), None)],
            Some("Missing"),
        );
        assert_eq!(registry.default_source().map(|s| s.name()), Some("A"));

        let empty = SourceRegistry::from_sources(Vec::new(), Some("A"));
        assert!(empty.list_all().is_empty());
        assert!(empty.default_source().is_none());
    }

    #[test]
    fn duplicate_names_keep_first_declaration() {
        let registry = SourceRegistry::new(
            vec![source("VidSrc.to", Some("https://fake/"), None)],
            None,
        );
        let vidsrc = registry.find_by_name("VidSrc.to").expect("present");
        assert_eq!(
            vidsrc.movie_url_template(),
            Some("https://vidsrc.to/embed/movie/")
        );
        assert_eq!(registry.list_all().len(), 13);
    }

    #[test]
    fn custom_sources_drop_invalid_entries_silently() {
        let raw = r#"[
            {"name": "Legacy", "url": "https://legacy/", "tvUrl": null},
            {"name": "", "url": "https://nameless/"},
            {"name": "NoTemplates"},
            42,
            {"name": "Modern", "seriesUrlTemplate": "https://modern/tv/", "episodeStyle": "dashed"}
        ]"#;
        let parsed = parse_custom_sources(raw).expect("array parses");
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].name(), "Legacy");
        assert_eq!(parsed[0].movie_url_template(), Some("https://legacy/"));
        assert_eq!(parsed[1].name(), "Modern");
        assert_eq!(parsed[1].episode_style(), Some(EpisodeStyle::Dashed));
    }

    #[test]
    fn custom_sources_reject_non_array_document() {
        assert!(parse_custom_sources(r#"{"name":"A"}"#).is_err());
        assert!(parse_custom_sources("not json").is_err());
    }

    #[test]
    fn descriptor_serializes_with_camel_case_keys() {
        let json = serde_json::to_string(&source("A", None, Some("https://a/tv/")))
            .expect("serialize");
        assert_eq!(json, r#"{"name":"A","seriesUrlTemplate":"https://a/tv/"}"#);
    }
}
