//! Profile mirror over the Firestore REST documents API.

use crate::config::{FirebaseConfig, HttpConfig};
use crate::error::{Result, SessionError};
use crate::providers::{ProfileRecord, ProfileStore};
use crate::state::PrincipalId;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value, json};
use std::future::Future;
use std::sync::Arc;

/// Collection holding one document per principal.
pub const USERS_COLLECTION: &str = "users";

/// Source of the bearer token sent with document requests.
pub trait BearerTokenSource: Send + Sync {
    /// Current ID token, `None` to send the request unauthenticated.
    ///
    /// # Errors
    ///
    /// Returns `AuthFailure` if a token could not be obtained.
    fn bearer_token(&self) -> impl Future<Output = Result<Option<String>>> + Send;
}

/// Fixed token, for tests and service tools.
#[derive(Debug, Clone, Default)]
pub struct StaticToken(pub Option<String>);

impl BearerTokenSource for StaticToken {
    async fn bearer_token(&self) -> Result<Option<String>> {
        Ok(self.0.clone())
    }
}

/// [`ProfileStore`] backed by Firestore.
#[derive(Debug, Clone)]
pub struct FirestoreProfileStore<T> {
    http: reqwest::Client,
    endpoint: String,
    project_id: String,
    tokens: Arc<T>,
}

impl<T: BearerTokenSource> FirestoreProfileStore<T> {
    /// Create a store for the configured project.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Internal`] if the HTTP client cannot be built.
    pub fn new(config: &FirebaseConfig, http: &HttpConfig, tokens: Arc<T>) -> Result<Self> {
        let client = http
            .client()
            .map_err(|e| SessionError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self::with_client(config, client, tokens))
    }

    /// Create a store around an existing HTTP client.
    #[must_use]
    pub fn with_client(config: &FirebaseConfig, http: reqwest::Client, tokens: Arc<T>) -> Self {
        Self {
            http,
            endpoint: config.firestore_endpoint.trim_end_matches('/').to_string(),
            project_id: config.project_id.clone(),
            tokens,
        }
    }

    fn document_url(&self, uid: &PrincipalId) -> String {
        format!(
            "{}/v1/projects/{}/databases/(default)/documents/{USERS_COLLECTION}/{uid}",
            self.endpoint, self.project_id
        )
    }

    async fn authorized(&self, request: reqwest::RequestBuilder) -> Result<reqwest::RequestBuilder> {
        Ok(match self.tokens.bearer_token().await? {
            Some(token) => request.bearer_auth(token),
            None => request,
        })
    }

    async fn patch(&self, uid: &PrincipalId, record: &ProfileRecord, mask: bool) -> Result<()> {
        let fields = encode_fields(record);
        let mut request = self.http.patch(self.document_url(uid));
        if mask {
            let mut query: Vec<(&str, &str)> = fields
                .keys()
                .map(|path| ("updateMask.fieldPaths", path.as_str()))
                .collect();
            query.push(("currentDocument.exists", "true"));
            request = request.query(&query);
        }

        let response = self
            .authorized(request.json(&json!({ "fields": fields })))
            .await?
            .send()
            .await
            .map_err(|e| SessionError::storage(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        tracing::warn!(%uid, %status, "Profile write rejected");
        Err(SessionError::storage(format!("HTTP {status}: {}", error_message(&body))))
    }
}

impl<T: BearerTokenSource> ProfileStore for FirestoreProfileStore<T> {
    #[tracing::instrument(skip(self, record))]
    async fn set(&self, uid: &PrincipalId, record: &ProfileRecord) -> Result<()> {
        self.patch(uid, record, false).await
    }

    #[tracing::instrument(skip(self, record))]
    async fn merge(&self, uid: &PrincipalId, record: &ProfileRecord) -> Result<()> {
        self.patch(uid, record, true).await
    }

    async fn get(&self, uid: &PrincipalId) -> Result<Option<ProfileRecord>> {
        let response = self
            .authorized(self.http.get(self.document_url(uid)))
            .await?
            .send()
            .await
            .map_err(|e| SessionError::storage(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SessionError::storage(format!(
                "HTTP {status}: {}",
                error_message(&body)
            )));
        }

        let document: Value = response
            .json()
            .await
            .map_err(|e| SessionError::storage(format!("Malformed document: {e}")))?;
        Ok(Some(decode_fields(&document["fields"])))
    }
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.to_string())
}

fn string_value(value: &str) -> Value {
    json!({ "stringValue": value })
}

fn timestamp_value(value: DateTime<Utc>) -> Value {
    json!({ "timestampValue": value.to_rfc3339_opts(chrono::SecondsFormat::Micros, true) })
}

/// Encode the `Some` fields of a record as Firestore typed values.
fn encode_fields(record: &ProfileRecord) -> Map<String, Value> {
    let mut fields = Map::new();
    if let Some(name) = &record.display_name {
        fields.insert("displayName".into(), string_value(name));
    }
    if let Some(email) = &record.email {
        fields.insert("email".into(), string_value(email));
    }
    if let Some(url) = &record.photo_url {
        fields.insert("photoURL".into(), string_value(url));
    }
    if let Some(at) = record.created_at {
        fields.insert("createdAt".into(), timestamp_value(at));
    }
    if let Some(at) = record.updated_at {
        fields.insert("updatedAt".into(), timestamp_value(at));
    }
    fields
}

fn decode_fields(fields: &Value) -> ProfileRecord {
    let text = |name: &str| fields[name]["stringValue"].as_str().map(str::to_string);
    let time = |name: &str| {
        fields[name]["timestampValue"]
            .as_str()
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|at| at.with_timezone(&Utc))
    };

    ProfileRecord {
        display_name: text("displayName"),
        email: text("email"),
        photo_url: text("photoURL"),
        created_at: time("createdAt"),
        updated_at: time("updatedAt"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_skips_absent_fields() {
        let record = ProfileRecord {
            display_name: Some("Ann".into()),
            email: Some("ann@example.com".into()),
            ..ProfileRecord::default()
        };
        let fields = encode_fields(&record);
        assert_eq!(fields.len(), 2);
        assert_eq!(fields["displayName"], json!({ "stringValue": "Ann" }));
        assert!(!fields.contains_key("photoURL"));
    }

    #[test]
    fn test_present_fields_are_string_values() {
        let record = ProfileRecord {
            display_name: Some("Ann".into()),
            email: Some("ann@example.com".into()),
            photo_url: Some("https://img.example/ann.png".into()),
            ..ProfileRecord::default()
        };
        let fields = encode_fields(&record);
        assert_eq!(fields["photoURL"], json!({ "stringValue": "https://img.example/ann.png" }));
        assert!(fields.values().all(|value| value.get("nullValue").is_none()));
        assert_eq!(decode_fields(&Value::Object(fields)), record);
    }

    #[test]
    fn test_decode_document_fields() {
        let fields = json!({
            "displayName": { "stringValue": "Ann" },
            "email": { "stringValue": "ann@example.com" },
            "photoURL": { "nullValue": null },
            "createdAt": { "timestampValue": "2025-01-01T00:00:00Z" }
        });
        let record = decode_fields(&fields);
        assert_eq!(record.display_name.as_deref(), Some("Ann"));
        assert_eq!(record.photo_url, None);
        assert_eq!(
            record.created_at.map(|at| at.to_rfc3339()),
            Some("2025-01-01T00:00:00+00:00".to_string())
        );
        assert_eq!(record.updated_at, None);
    }

    #[test]
    fn test_error_message_extraction() {
        let body = r#"{"error":{"code":404,"message":"No document to update","status":"NOT_FOUND"}}"#;
        assert_eq!(error_message(body), "No document to update");
        assert_eq!(error_message("gateway timeout"), "gateway timeout");
    }
}
