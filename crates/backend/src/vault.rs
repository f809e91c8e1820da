//! HashiCorp Vault KV backend over the HTTP API

use crate::Backend;
use async_trait::async_trait;
use avp_config::{AuthMethod, KvVersion, VaultSettings};
use avp_core::{Annotations, Error, Result, SecretMap, AVP_KV_VERSION_ANNOTATION};
use avp_utils::network::{retry_async, RetryConfig};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde_json::{json, Value};

const TOKEN_HEADER: &str = "X-Vault-Token";
const NAMESPACE_HEADER: &str = "X-Vault-Namespace";

/// Vault KV v1/v2 backend.
///
/// Secrets are read with `GET /v1/<path>`. For KV v2 the path must include the
/// `data/` segment, e.g. `secret/data/app`, and the payload is unwrapped from
/// `data.data`.
pub struct VaultBackend {
    settings: VaultSettings,
    client: reqwest::Client,
    retry: RetryConfig,
    token: Option<String>,
}

impl VaultBackend {
    /// Build a client for `settings`
    pub fn new(settings: VaultSettings) -> Result<Self> {
        let mut builder = reqwest::Client::builder().timeout(settings.timeout);

        if let Some(ca_cert) = &settings.ca_cert {
            let pem = std::fs::read(ca_cert)
                .map_err(|e| Error::file_system(ca_cert, "read CA certificate", e))?;
            let certificate = reqwest::Certificate::from_pem(&pem).map_err(|e| {
                Error::configuration(format!(
                    "invalid CA certificate {}: {e}",
                    ca_cert.display()
                ))
            })?;
            builder = builder.add_root_certificate(certificate);
        }
        if settings.skip_verify {
            tracing::warn!("TLS certificate verification is disabled for vault");
            builder = builder.danger_accept_invalid_certs(true);
        }

        let client = builder
            .build()
            .map_err(|e| Error::configuration(format!("could not build vault client: {e}")))?;

        Ok(Self {
            settings,
            client,
            retry: RetryConfig::network(),
            token: None,
        })
    }

    /// Override the retry policy for transient failures
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.settings.address, path.trim_start_matches('/'))
    }

    fn builder(
        &self,
        method: Method,
        url: &str,
        token: Option<&str>,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> RequestBuilder {
        let mut request = self.client.request(method, url);
        if let Some(namespace) = &self.settings.namespace {
            request = request.header(NAMESPACE_HEADER, namespace);
        }
        if let Some(token) = token {
            request = request.header(TOKEN_HEADER, token);
        }
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        request
    }

    /// Send a request, retrying transient failures.
    ///
    /// Returns `Ok(None)` when vault answers 404.
    async fn request(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<Option<Value>> {
        let url = self.url(path);
        let url = url.as_str();
        retry_async(self.retry.clone(), move || {
            let request = self.builder(method.clone(), url, token, query, body);
            async move { send(request, url).await }
        })
        .await
    }

    async fn login_request(&self, mount_path: &str, body: Value) -> Result<String> {
        let path = format!("{}/login", mount_path.trim_matches('/'));
        let response = self
            .request(Method::POST, &path, None, &[], Some(&body))
            .await?
            .ok_or_else(|| Error::backend("vault", format!("no auth method mounted at {path}")))?;

        response
            .pointer("/auth/client_token")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| Error::backend("vault", "login response did not contain a client token"))
    }

    async fn authenticate(&self) -> Result<String> {
        match &self.settings.auth {
            AuthMethod::Token { token } => {
                self.request(
                    Method::GET,
                    "auth/token/lookup-self",
                    Some(token.as_str()),
                    &[],
                    None,
                )
                .await?
                .ok_or_else(|| Error::backend("vault", "token lookup endpoint not found"))?;
                Ok(token.clone())
            }
            AuthMethod::AppRole {
                role_id,
                secret_id,
                mount_path,
            } => {
                self.login_request(
                    mount_path,
                    json!({ "role_id": role_id, "secret_id": secret_id }),
                )
                .await
            }
            AuthMethod::Kubernetes {
                role,
                mount_path,
                token_path,
            } => {
                let jwt = tokio::fs::read_to_string(token_path)
                    .await
                    .map_err(|e| Error::file_system(token_path, "read service account token", e))?;
                self.login_request(mount_path, json!({ "role": role, "jwt": jwt.trim() }))
                    .await
            }
        }
    }
}

impl std::fmt::Debug for VaultBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultBackend")
            .field("settings", &self.settings)
            .field("logged_in", &self.token.is_some())
            .finish_non_exhaustive()
    }
}

async fn send(request: RequestBuilder, url: &str) -> Result<Option<Value>> {
    let response = request.send().await.map_err(|e| {
        if e.is_connect() || e.is_timeout() || e.is_request() {
            Error::network(url, e.to_string())
        } else {
            Error::backend("vault", e.to_string())
        }
    })?;

    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        return Ok(None);
    }
    if status.is_server_error() {
        return Err(Error::network(url, format!("vault returned {status}")));
    }
    if !status.is_success() {
        let detail = response
            .json::<Value>()
            .await
            .ok()
            .and_then(|body| error_messages(&body))
            .unwrap_or_else(|| status.to_string());
        return Err(Error::backend("vault", format!("{status}: {detail}")));
    }
    if status == StatusCode::NO_CONTENT {
        return Ok(Some(Value::Null));
    }

    response
        .json::<Value>()
        .await
        .map(Some)
        .map_err(|e| Error::backend("vault", format!("invalid response from {url}: {e}")))
}

/// Join the `errors` array of a vault error body
fn error_messages(body: &Value) -> Option<String> {
    let errors = body.get("errors")?.as_array()?;
    let messages: Vec<&str> = errors.iter().filter_map(Value::as_str).collect();
    if messages.is_empty() {
        None
    } else {
        Some(messages.join(", "))
    }
}

#[async_trait]
impl Backend for VaultBackend {
    fn name(&self) -> &str {
        "vault"
    }

    async fn login(&mut self) -> Result<()> {
        tracing::debug!(
            address = %self.settings.address,
            auth = self.settings.auth.name(),
            "logging in to vault"
        );
        let token = self
            .authenticate()
            .await
            .map_err(|e| Error::authentication("vault", e.to_string()))?;
        self.token = Some(token);
        Ok(())
    }

    async fn lookup(
        &self,
        path: &str,
        version: Option<&str>,
        annotations: &Annotations,
    ) -> Result<SecretMap> {
        let token = self
            .token
            .as_deref()
            .ok_or_else(|| Error::backend("vault", "lookup called before login"))?;

        let kv_version = match annotations.get(AVP_KV_VERSION_ANNOTATION) {
            Some(value) => KvVersion::parse(value)?,
            None => self.settings.kv_version,
        };

        let mut query = Vec::new();
        match (kv_version, version) {
            (KvVersion::V2, Some(version)) => query.push(("version", version.to_string())),
            (KvVersion::V1, Some(version)) => {
                tracing::debug!(path, version, "KV v1 has no secret versions, reading latest");
            }
            (_, None) => {}
        }

        tracing::debug!(path, kv_version = ?kv_version, "reading secret from vault");
        let mut body = self
            .request(Method::GET, path, Some(token), &query, None)
            .await?
            .ok_or_else(|| Error::secret_not_found(path))?;

        let pointer = match kv_version {
            KvVersion::V1 => "/data",
            KvVersion::V2 => "/data/data",
        };
        match body.pointer_mut(pointer).map(Value::take) {
            Some(Value::Object(map)) => Ok(map.into_iter().collect()),
            _ => Err(Error::secret_not_found(path)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_joined() {
        let body = json!({ "errors": ["permission denied", "token expired"] });
        assert_eq!(
            error_messages(&body).as_deref(),
            Some("permission denied, token expired")
        );
        assert_eq!(error_messages(&json!({ "errors": [] })), None);
        assert_eq!(error_messages(&json!({})), None);
    }
}
