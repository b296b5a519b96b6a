//! HTTP client for the library API.
//!
//! Every call goes through [`ApiClient::execute`], which turns non-2xx
//! responses and transport failures into [`ClientError`]s. Authenticated
//! calls carry `Authorization: Bearer <token>`.

use std::time::Duration;

use anyhow::{Context, Result};
use libradmin_types::{
    ApiEnvelope, ApiMessage, DashboardSummary, Entity, LoginCredentials, LoginData, OverdueLoan,
    OverdueNotice, PasswordReset, PasswordResetLink,
};
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{ClientError, ClientResult};

/// Library API client.
#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    http: reqwest::Client,
}

impl ApiClient {
    /// Creates a client for `base_url` (e.g. `http://localhost:8080/api`).
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, timeout: Option<Duration>) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().context("Failed to build HTTP client")?;
        let base_url = base_url.into().trim_end_matches('/').to_string();

        Ok(Self { base_url, http })
    }

    /// Creates a client from the resolved configuration.
    ///
    /// # Errors
    /// Returns an error if the API URL is invalid or the client cannot be built.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(config.resolve_api_url()?, config.request_timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorized(builder: RequestBuilder, token: Option<&str>) -> RequestBuilder {
        match token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Sends the request and decodes a 2xx body as `T`.
    async fn execute<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
    ) -> ClientResult<(StatusCode, T)> {
        let response = builder.send().await.map_err(|err| {
            let err = ClientError::transport(&err);
            warn!(error = ?err, "request failed without a response");
            err
        })?;

        let status = response.status();
        let url = response.url().path().to_string();
        let body = response.text().await.map_err(|err| ClientError::transport(&err))?;

        if !status.is_success() {
            let err = ClientError::from_status(status.as_u16(), &body);
            warn!(%url, status = status.as_u16(), error = ?err, "request rejected");
            return Err(err);
        }

        debug!(%url, status = status.as_u16(), "request ok");
        let body = if body.trim().is_empty() {
            "null"
        } else {
            body.as_str()
        };
        let value = serde_json::from_str(body).map_err(|err| {
            ClientError::internal(format!("Failed to parse response from {url}: {err}"))
        })?;
        Ok((status, value))
    }

    /// `POST /auth/login`
    ///
    /// # Errors
    /// Returns the classified failure.
    pub async fn login(
        &self,
        credentials: &LoginCredentials,
    ) -> ClientResult<(StatusCode, ApiEnvelope<LoginData>)> {
        let request = self.http.post(self.url("/auth/login")).json(credentials);
        self.execute(request).await
    }

    /// `POST /auth/link-reset-password`
    ///
    /// # Errors
    /// Returns the classified failure.
    pub async fn request_password_reset(&self, email: &str) -> ClientResult<ApiMessage> {
        let body = PasswordResetLink {
            email: email.to_string(),
        };
        let request = self
            .http
            .post(self.url("/auth/link-reset-password"))
            .json(&body);
        self.execute::<Option<ApiMessage>>(request)
            .await
            .map(|(_, msg)| msg.unwrap_or_default())
    }

    /// `POST /auth/reset-password`
    ///
    /// # Errors
    /// Returns the classified failure.
    pub async fn reset_password(&self, reset: &PasswordReset) -> ClientResult<ApiMessage> {
        let request = self.http.post(self.url("/auth/reset-password")).json(reset);
        self.execute::<Option<ApiMessage>>(request)
            .await
            .map(|(_, msg)| msg.unwrap_or_default())
    }

    /// `GET /library/loan/overdue`
    ///
    /// # Errors
    /// Returns the classified failure.
    pub async fn overdue_loans(&self, token: Option<&str>) -> ClientResult<Vec<OverdueLoan>> {
        let request = Self::authorized(self.http.get(self.url("/library/loan/overdue")), token);
        self.execute::<Option<Vec<OverdueLoan>>>(request)
            .await
            .map(|(_, loans)| loans.unwrap_or_default())
    }

    /// `POST /library/loan/overdue`
    ///
    /// # Errors
    /// Returns the classified failure.
    pub async fn send_overdue_notice(
        &self,
        token: Option<&str>,
        notice: &OverdueNotice,
    ) -> ClientResult<ApiMessage> {
        let request = Self::authorized(
            self.http.post(self.url("/library/loan/overdue")).json(notice),
            token,
        );
        self.execute::<Option<ApiMessage>>(request)
            .await
            .map(|(_, msg)| msg.unwrap_or_default())
    }

    /// `GET /library/dashboard`
    ///
    /// # Errors
    /// Returns the classified failure.
    pub async fn dashboard(&self, token: Option<&str>) -> ClientResult<DashboardSummary> {
        let request = Self::authorized(self.http.get(self.url("/library/dashboard")), token);
        self.execute(request).await.map(|(_, summary)| summary)
    }

    /// `GET /library/{entity}`
    ///
    /// # Errors
    /// Returns the classified failure.
    pub async fn list(&self, token: Option<&str>, entity: Entity) -> ClientResult<Vec<Value>> {
        let path = format!("/library/{}", entity.segment());
        let request = Self::authorized(self.http.get(self.url(&path)), token);
        self.execute::<Option<Vec<Value>>>(request)
            .await
            .map(|(_, records)| records.unwrap_or_default())
    }

    /// `POST /library/{entity}/new`
    ///
    /// # Errors
    /// Returns the classified failure.
    pub async fn create(
        &self,
        token: Option<&str>,
        entity: Entity,
        record: &Value,
    ) -> ClientResult<ApiMessage> {
        let path = format!("/library/{}/new", entity.segment());
        let request = Self::authorized(self.http.post(self.url(&path)).json(record), token);
        self.execute::<Option<ApiMessage>>(request)
            .await
            .map(|(_, msg)| msg.unwrap_or_default())
    }

    /// `PUT /library/{entity}/update`
    ///
    /// # Errors
    /// Returns the classified failure.
    pub async fn update(
        &self,
        token: Option<&str>,
        entity: Entity,
        record: &Value,
    ) -> ClientResult<ApiMessage> {
        let path = format!("/library/{}/update", entity.segment());
        let request = Self::authorized(self.http.put(self.url(&path)).json(record), token);
        self.execute::<Option<ApiMessage>>(request)
            .await
            .map(|(_, msg)| msg.unwrap_or_default())
    }

    /// `DELETE /library/{entity}/{id}`
    ///
    /// # Errors
    /// Returns the classified failure.
    pub async fn delete(
        &self,
        token: Option<&str>,
        entity: Entity,
        id: i64,
    ) -> ClientResult<ApiMessage> {
        let path = format!("/library/{}/{id}", entity.segment());
        let request = Self::authorized(self.http.delete(self.url(&path)), token);
        self.execute::<Option<ApiMessage>>(request)
            .await
            .map(|(_, msg)| msg.unwrap_or_default())
    }
}
