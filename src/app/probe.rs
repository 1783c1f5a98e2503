use serde_json::{Value, json};
use tracing::debug;

use crate::config::{MetadataConfig, ProbeConfig};
use crate::http::{RetryPolicy, post_json};

/// Best-effort reachability check for a playback URL.
///
/// Answers `false` whenever availability cannot be confirmed: transport
/// failures, error statuses and unexpected bodies all count as unavailable.
pub(crate) trait AvailabilityProbe: Send + Sync {
    fn check(&self, url: &str) -> bool;
}

/// Asks the companion service at `{base_url}/check-video` about a URL.
pub(crate) struct CheckVideoProbe {
    endpoint: String,
    policy: RetryPolicy,
}

impl CheckVideoProbe {
    pub(crate) fn new(metadata: &MetadataConfig, probe: &ProbeConfig) -> Self {
        Self {
            endpoint: format!("{}/check-video", metadata.base_url.trim_end_matches('/')),
            policy: RetryPolicy::single(probe.connect_timeout(), probe.read_timeout()),
        }
    }
}

impl AvailabilityProbe for CheckVideoProbe {
    fn check(&self, url: &str) -> bool {
        let body = json!({ "url": url }).to_string();
        match post_json(&self.endpoint, &body, &self.policy) {
            Ok(raw) => {
                let available = parse_availability(&raw);
                debug!(url, available, "probe answered");
                available
            }
            Err(err) => {
                debug!(url, error = %err, "probe failed");
                false
            }
        }
    }
}

pub(crate) fn parse_availability(raw: &str) -> bool {
    serde_json::from_str::<Value>(raw)
        .ok()
        .and_then(|value| value.get("available").and_then(Value::as_bool))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::test_server::{Reply, ScriptedServer};

    fn probe_for(server: &ScriptedServer) -> CheckVideoProbe {
        CheckVideoProbe::new(
            &MetadataConfig {
                base_url: server.base_url.clone(),
                ..MetadataConfig::default()
            },
            &ProbeConfig {
                connect_timeout_ms: 200,
                read_timeout_ms: 100,
            },
        )
    }

    #[test]
    fn availability_requires_a_boolean_field() {
        assert!(parse_availability(r#"{"available":true}"#));
        assert!(!parse_availability(r#"{"available":false}"#));
        assert!(!parse_availability(r#"{"available":"yes"}"#));
        assert!(!parse_availability(r#"{}"#));
        assert!(!parse_availability("<html>oops</html>"));
    }

    #[test]
    fn check_posts_url_and_reads_answer() {
        let server = ScriptedServer::spawn(vec![Reply::Status(
            200,
            r#"{"available":true}"#.to_string(),
        )]);
        assert!(probe_for(&server).check("https://a/tt001"));
        let requests = server.requests();
        assert!(requests[0].starts_with("POST /check-video "));
        assert!(requests[0].contains(r#"{"url":"https://a/tt001"}"#));
    }

    #[test]
    fn check_treats_errors_and_timeouts_as_unavailable() {
        let server = ScriptedServer::spawn(vec![
            Reply::Status(503, r#"{"available":true}"#.to_string()),
            Reply::Delayed(
                std::time::Duration::from_millis(300),
                200,
                r#"{"available":true}"#.to_string(),
            ),
        ]);
        let probe = probe_for(&server);
        assert!(!probe.check("https://a/1"));
        assert!(!probe.check("https://a/2"));
    }

    #[test]
    fn check_against_closed_port_is_unavailable() {
        let probe = CheckVideoProbe::new(
            &MetadataConfig {
                base_url: "http://127.0.0.1:9".to_string(),
                ..MetadataConfig::default()
            },
            &ProbeConfig {
                connect_timeout_ms: 100,
                read_timeout_ms: 100,
            },
        );
        assert!(!probe.check("https://a/tt001"));
    }
}
