use anyhow::Context;
use reqwest::StatusCode;
use reqwest::blocking::Client;
use tracing::{debug, instrument};

use crate::task::{Credentials, MessageBody, Task, TaskPayload, TokenBody};

/// The one place HTTP happens. Requests are blocking; the caller suspends
/// at the network boundary and resumes when the response arrives.
///
/// Mutation methods return the response status and leave policy (refresh
/// or not, surface or not) to the caller. A transport or decode failure
/// is an error everywhere.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http: Client::new(),
            base_url,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// POST /auth/register. The server's message comes back verbatim,
    /// whatever the response status.
    #[instrument(skip(self, password))]
    pub fn register(&self, username: &str, password: &str) -> anyhow::Result<String> {
        let url = format!("{}/auth/register", self.base_url);
        let response = self
            .http
            .post(url)
            .json(&Credentials { username, password })
            .send()?;

        debug!(status = %response.status(), "register response");
        let body: MessageBody = response.json().context("decode register response")?;
        Ok(body.message)
    }

    /// POST /auth/login. `Some(token)` on an ok status; `None` on any
    /// rejection — invalid credentials are an expected outcome, not a
    /// failure.
    #[instrument(skip(self, password))]
    pub fn login(&self, username: &str, password: &str) -> anyhow::Result<Option<String>> {
        let url = format!("{}/auth/login", self.base_url);
        let response = self
            .http
            .post(url)
            .json(&Credentials { username, password })
            .send()?;

        if !response.status().is_success() {
            debug!(status = %response.status(), "login rejected");
            return Ok(None);
        }

        let body: TokenBody = response.json().context("decode login response")?;
        Ok(Some(body.token))
    }

    /// GET /tasks. The server's array order is preserved.
    #[instrument(skip(self, token))]
    pub fn list_tasks(&self, token: &str) -> anyhow::Result<Vec<Task>> {
        let url = format!("{}/tasks", self.base_url);
        let response = self.http.get(url).bearer_auth(token).send()?;
        if !response.status().is_success() {
            anyhow::bail!("status {}", response.status());
        }
        response.json::<Vec<Task>>().context("decode task list")
    }

    /// POST /tasks.
    #[instrument(skip(self, token, description))]
    pub fn create_task(
        &self,
        token: &str,
        title: &str,
        description: &str,
    ) -> anyhow::Result<StatusCode> {
        let url = format!("{}/tasks", self.base_url);
        let response = self
            .http
            .post(url)
            .bearer_auth(token)
            .json(&TaskPayload { title, description })
            .send()?;
        Ok(response.status())
    }

    /// PUT /tasks/{id} — full title/description replacement.
    #[instrument(skip(self, token, description))]
    pub fn update_task(
        &self,
        token: &str,
        id: u64,
        title: &str,
        description: &str,
    ) -> anyhow::Result<StatusCode> {
        let url = format!("{}/tasks/{id}", self.base_url);
        let response = self
            .http
            .put(url)
            .bearer_auth(token)
            .json(&TaskPayload { title, description })
            .send()?;
        Ok(response.status())
    }

    /// PATCH /tasks/{id}/complete.
    #[instrument(skip(self, token))]
    pub fn complete_task(&self, token: &str, id: u64) -> anyhow::Result<StatusCode> {
        let url = format!("{}/tasks/{id}/complete", self.base_url);
        let response = self.http.patch(url).bearer_auth(token).send()?;
        Ok(response.status())
    }

    /// DELETE /tasks/{id}.
    #[instrument(skip(self, token))]
    pub fn delete_task(&self, token: &str, id: u64) -> anyhow::Result<StatusCode> {
        let url = format!("{}/tasks/{id}", self.base_url);
        let response = self.http.delete(url).bearer_auth(token).send()?;
        Ok(response.status())
    }
}
