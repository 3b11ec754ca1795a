//! Settings type definitions.

use campus_core::ReconnectConfig;
use serde::{Deserialize, Serialize};

fn default_version() -> String {
    "0.1.0".to_string()
}
fn default_name() -> String {
    "campus".to_string()
}

/// Top-level settings document.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampusSettings {
    /// Settings schema version.
    #[serde(default = "default_version")]
    pub version: String,
    /// Application name.
    #[serde(default = "default_name")]
    pub name: String,
    /// Real-time sync layer settings.
    #[serde(default)]
    pub sync: SyncSettings,
}

impl Default for CampusSettings {
    fn default() -> Self {
        Self {
            version: default_version(),
            name: default_name(),
            sync: SyncSettings::default(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}
fn default_ws_path() -> String {
    "/ws/status/".to_string()
}
fn default_active_endpoint() -> String {
    "/api/activities/active/".to_string()
}
fn default_send_queue_size() -> usize {
    64
}

/// Settings for the status socket and its REST pull endpoint.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSettings {
    /// HTTP(S) base URL of the backend; the socket URL is derived from it.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Path of the status WebSocket endpoint.
    #[serde(default = "default_ws_path")]
    pub ws_path: String,
    /// Path of the active-records REST endpoint.
    #[serde(default = "default_active_endpoint")]
    pub active_endpoint: String,
    /// Reconnect backoff policy.
    #[serde(default)]
    pub reconnect: ReconnectConfig,
    /// Capacity of the outbound command queue.
    #[serde(default = "default_send_queue_size")]
    pub send_queue_size: usize,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            ws_path: default_ws_path(),
            active_endpoint: default_active_endpoint(),
            reconnect: ReconnectConfig::default(),
            send_queue_size: default_send_queue_size(),
        }
    }
}

impl SyncSettings {
    /// WebSocket URL derived from the HTTP base host.
    ///
    /// `http://` becomes `ws://` and `https://` becomes `wss://`; anything
    /// else is passed through untouched (already a socket URL).
    #[must_use]
    pub fn ws_url(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        let scheme_swapped = if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            base.to_string()
        };
        format!("{scheme_swapped}{}", self.ws_path)
    }

    /// REST URL of the active-records endpoint.
    #[must_use]
    pub fn active_url(&self) -> String {
        format!(
            "{}{}",
            self.base_url.trim_end_matches('/'),
            self.active_endpoint
        )
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings() {
        let settings = CampusSettings::default();
        assert_eq!(settings.version, "0.1.0");
        assert_eq!(settings.name, "campus");
        assert_eq!(settings.sync.base_url, "http://localhost:8000");
        assert_eq!(settings.sync.send_queue_size, 64);
        assert_eq!(settings.sync.reconnect.base_delay_ms, 1000);
    }

    #[test]
    fn empty_json_yields_defaults() {
        let settings: CampusSettings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings.sync.ws_path, "/ws/status/");
        assert_eq!(settings.sync.active_endpoint, "/api/activities/active/");
    }

    #[test]
    fn partial_sync_section_keeps_other_defaults() {
        let settings: CampusSettings =
            serde_json::from_str(r#"{"sync":{"baseUrl":"https://school.example"}}"#).unwrap();
        assert_eq!(settings.sync.base_url, "https://school.example");
        assert_eq!(settings.sync.ws_path, "/ws/status/");
    }

    #[test]
    fn ws_url_from_http_base() {
        let sync = SyncSettings::default();
        assert_eq!(sync.ws_url(), "ws://localhost:8000/ws/status/");
    }

    #[test]
    fn ws_url_from_https_base() {
        let sync = SyncSettings {
            base_url: "https://school.example/".into(),
            ..SyncSettings::default()
        };
        assert_eq!(sync.ws_url(), "wss://school.example/ws/status/");
    }

    #[test]
    fn ws_url_passes_through_socket_scheme() {
        let sync = SyncSettings {
            base_url: "wss://push.school.example".into(),
            ws_path: "/status".into(),
            ..SyncSettings::default()
        };
        assert_eq!(sync.ws_url(), "wss://push.school.example/status");
    }

    #[test]
    fn active_url_joins_without_double_slash() {
        let sync = SyncSettings {
            base_url: "http://localhost:8000/".into(),
            ..SyncSettings::default()
        };
        assert_eq!(
            sync.active_url(),
            "http://localhost:8000/api/activities/active/"
        );
    }

    #[test]
    fn settings_serialize_camel_case() {
        let json = serde_json::to_value(CampusSettings::default()).unwrap();
        assert!(json["sync"]["baseUrl"].is_string());
        assert!(json["sync"]["activeEndpoint"].is_string());
        assert!(json["sync"]["reconnect"]["baseDelayMs"].is_number());
    }
}
