use tracing::{debug, info, instrument};

use crate::api::ApiClient;

/// Which half of the UI is active. Derived from credential presence, so
/// the view can never disagree with the token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Auth,
    Tasks,
}

/// Process-lifetime session state: the bearer token, if any. Never
/// persisted; a restart always begins unauthenticated.
#[derive(Debug, Default)]
pub struct Session {
    token: Option<String>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registration reports the server's message and does not log in.
    #[instrument(skip_all)]
    pub fn register(
        &self,
        api: &ApiClient,
        username: &str,
        password: &str,
    ) -> anyhow::Result<String> {
        api.register(username, password)
    }

    /// On an ok response the returned token becomes the active credential
    /// and the task view opens. On rejection nothing is stored.
    #[instrument(skip_all)]
    pub fn login(
        &mut self,
        api: &ApiClient,
        username: &str,
        password: &str,
    ) -> anyhow::Result<bool> {
        match api.login(username, password)? {
            Some(token) => {
                info!(username, "login accepted");
                self.token = Some(token);
                Ok(true)
            }
            None => {
                debug!(username, "login rejected");
                Ok(false)
            }
        }
    }

    pub fn logout(&mut self) {
        info!("logging out");
        self.token = None;
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn view(&self) -> View {
        if self.token.is_some() {
            View::Tasks
        } else {
            View::Auth
        }
    }
}
