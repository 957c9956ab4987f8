use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{
    validate_pubkey, validate_username, HealthResponse, Nip05Error, Nip05Names,
    PendingRegistration, Registration,
};
use crate::config::Nip05Config;

#[derive(Debug, Serialize)]
struct RegisterRequest<'a> {
    username: &'a str,
    pubkey: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    domain: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct RejectRequest<'a> {
    username: &'a str,
}

/// `{success, message | error, ...payload}` envelope used by the API routes.
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(flatten)]
    data: T,
}

#[derive(Debug, Default, Deserialize)]
struct NoPayload {}

#[derive(Debug, Deserialize)]
struct PendingPayload {
    #[serde(default)]
    pending: Vec<PendingRegistration>,
}

#[derive(Debug, Deserialize)]
struct RegistrationsPayload {
    #[serde(default)]
    registrations: Vec<Registration>,
}

/// HTTP client for the registration service.
pub struct Nip05Client {
    http: Client,
    config: Nip05Config,
}

impl std::fmt::Debug for Nip05Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Nip05Client")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Nip05Client {
    pub fn new(config: &Nip05Config) -> Result<Self, Nip05Error> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            config: config.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        self.config.url.trim_end_matches('/')
    }

    fn url(&self, path: &str) -> String {
        self.config.endpoint(path)
    }

    fn admin(&self, request: RequestBuilder) -> Result<RequestBuilder, Nip05Error> {
        let key = self
            .config
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or(Nip05Error::Unauthorized)?;
        Ok(request.bearer_auth(key))
    }

    pub async fn health(&self) -> Result<HealthResponse, Nip05Error> {
        let response = self.http.get(self.url("/health")).send().await?;
        Ok(response.error_for_status()?.json().await?)
    }

    /// Approved `username -> pubkey` bindings.
    pub async fn names(&self) -> Result<Nip05Names, Nip05Error> {
        let url = self.url("/.well-known/nostr.json");
        debug!("Fetching NIP-05 names from {}", url);

        let response = self.http.get(&url).send().await?;
        Ok(response.error_for_status()?.json().await?)
    }

    /// Public identity bound to `username`, if approved.
    pub async fn lookup(&self, username: &str) -> Result<Option<String>, Nip05Error> {
        validate_username(username)?;
        let mut names = self.names().await?;
        Ok(names.names.remove(username))
    }

    /// Submit a registration for admin approval. Returns the service message.
    pub async fn register(
        &self,
        username: &str,
        pubkey: &str,
        domain: Option<&str>,
    ) -> Result<String, Nip05Error> {
        validate_username(username)?;
        let pubkey = validate_pubkey(pubkey)?;

        let response = self
            .http
            .post(self.url("/api/register"))
            .json(&RegisterRequest {
                username,
                pubkey: &pubkey,
                domain,
            })
            .send()
            .await?;

        let body: ApiResponse<NoPayload> = parse(response).await?;
        info!(username, "NIP-05 registration submitted");
        Ok(body.message.unwrap_or_default())
    }

    /// Pending registrations, newest first.
    pub async fn pending(&self) -> Result<Vec<PendingRegistration>, Nip05Error> {
        let request = self.admin(self.http.get(self.url("/api/admin/pending")))?;
        let body: ApiResponse<PendingPayload> = parse(request.send().await?).await?;
        Ok(body.data.pending)
    }

    pub async fn approve(&self, username: &str, pubkey: &str) -> Result<String, Nip05Error> {
        validate_username(username)?;
        let pubkey = validate_pubkey(pubkey)?;

        let request = self
            .admin(self.http.post(self.url("/api/admin/approve")))?
            .json(&RegisterRequest {
                username,
                pubkey: &pubkey,
                domain: None,
            });
        let body: ApiResponse<NoPayload> = parse(request.send().await?).await?;
        info!(username, "NIP-05 registration approved");
        Ok(body.message.unwrap_or_default())
    }

    pub async fn reject(&self, username: &str) -> Result<String, Nip05Error> {
        validate_username(username)?;

        let request = self
            .admin(self.http.post(self.url("/api/admin/reject")))?
            .json(&RejectRequest { username });
        let body: ApiResponse<NoPayload> = parse(request.send().await?).await?;
        info!(username, "NIP-05 registration rejected");
        Ok(body.message.unwrap_or_default())
    }

    /// Every approved registration, sorted by username.
    pub async fn registrations(&self) -> Result<Vec<Registration>, Nip05Error> {
        let request = self.admin(self.http.get(self.url("/api/admin/registrations")))?;
        let body: ApiResponse<RegistrationsPayload> = parse(request.send().await?).await?;
        Ok(body.data.registrations)
    }
}

async fn parse<T: DeserializeOwned>(response: Response) -> Result<ApiResponse<T>, Nip05Error> {
    let status = response.status();
    if status == StatusCode::UNAUTHORIZED {
        return Err(Nip05Error::Unauthorized);
    }

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiResponse<NoPayload>>(&body)
            .ok()
            .and_then(|r| r.error.or(r.message))
            .unwrap_or(body);
        warn!("NIP-05 service returned {}: {}", status, message);
        return Err(Nip05Error::Rejected {
            status: status.as_u16(),
            message,
        });
    }

    Ok(response.json().await?)
}
