//! API-key authentication.
//!
//! Auth is an external collaborator as far as the sync core is concerned:
//! this module's only job is to turn a bearer key into a verified
//! `{user_id, org_id}` context. Keys live in a YAML config file loaded at
//! startup, one entry per device key.

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// API key entry in the server config file.
#[derive(Debug, Clone, Deserialize)]
struct ApiKeyEntry {
    key: String,
    user_id: String,
    org_id: String,
}

/// Server key file structure.
#[derive(Debug, Clone, Deserialize, Default)]
struct KeyFile {
    #[serde(default)]
    api_keys: Vec<ApiKeyEntry>,
}

/// Authenticated caller identity, added to request extensions after auth.
///
/// Handlers read the org from here and nowhere else; request bodies never
/// carry trusted tenant identity.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
    pub org_id: String,
}

/// API key store - maps key -> AuthUser.
#[derive(Debug, Clone, Default)]
pub struct ApiKeyStore {
    keys: HashMap<String, AuthUser>,
}

impl ApiKeyStore {
    /// Load API keys from the config file.
    pub fn load(config_path: &Path) -> Self {
        let keys = match std::fs::read_to_string(config_path) {
            Ok(contents) => match serde_yaml::from_str::<KeyFile>(&contents) {
                Ok(config) => {
                    let mut map = HashMap::new();
                    for entry in config.api_keys {
                        map.insert(
                            entry.key,
                            AuthUser {
                                user_id: entry.user_id,
                                org_id: entry.org_id,
                            },
                        );
                    }
                    tracing::info!("Loaded {} API key(s)", map.len());
                    map
                }
                Err(e) => {
                    tracing::warn!("Failed to parse key file: {}", e);
                    HashMap::new()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to read key file {}: {}", config_path.display(), e);
                tracing::warn!("No API keys loaded - all authenticated requests will fail");
                HashMap::new()
            }
        };

        Self { keys }
    }

    /// Builds a store from in-memory entries.
    pub fn from_entries(entries: impl IntoIterator<Item = (String, AuthUser)>) -> Self {
        Self {
            keys: entries.into_iter().collect(),
        }
    }

    /// Validate an API key and return the associated user.
    pub fn validate(&self, key: &str) -> Option<AuthUser> {
        self.keys.get(key).cloned()
    }
}

/// Auth error response body.
#[derive(Serialize)]
struct AuthError {
    error: &'static str,
    message: &'static str,
}

/// Authentication middleware.
pub async fn auth_middleware(
    State(keys): State<Arc<ApiKeyStore>>,
    mut request: Request,
    next: Next,
) -> Response {
    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let api_key = match auth_header {
        Some(h) if h.starts_with("Bearer ") => &h[7..],
        Some(_) => {
            return (
                StatusCode::UNAUTHORIZED,
                Json(AuthError {
                    error: "invalid_auth",
                    message: "Authorization header must use Bearer scheme",
                }),
            )
                .into_response();
        }
        None => {
            return (
                StatusCode::UNAUTHORIZED,
                Json(AuthError {
                    error: "missing_auth",
                    message: "Authorization header required",
                }),
            )
                .into_response();
        }
    };

    match keys.validate(api_key) {
        Some(user) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        None => (
            StatusCode::UNAUTHORIZED,
            Json(AuthError {
                error: "invalid_key",
                message: "Invalid API key",
            }),
        )
            .into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_load_key_file() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("keys.yaml");

        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "api_keys:").unwrap();
        writeln!(file, "  - key: \"k-truck-7\"").unwrap();
        writeln!(file, "    user_id: \"lineman1\"").unwrap();
        writeln!(file, "    org_id: \"acme-power\"").unwrap();

        let store = ApiKeyStore::load(&path);
        let user = store.validate("k-truck-7").unwrap();
        assert_eq!(user.user_id, "lineman1");
        assert_eq!(user.org_id, "acme-power");
    }

    #[test]
    fn test_missing_file_yields_empty_store() {
        let temp_dir = tempdir().unwrap();
        let store = ApiKeyStore::load(&temp_dir.path().join("nope.yaml"));
        assert!(store.validate("anything").is_none());
    }

    #[test]
    fn test_unknown_key_rejected() {
        let store = ApiKeyStore::from_entries([(
            "good".to_string(),
            AuthUser {
                user_id: "u".into(),
                org_id: "o".into(),
            },
        )]);

        assert!(store.validate("good").is_some());
        assert!(store.validate("bad").is_none());
    }
}
