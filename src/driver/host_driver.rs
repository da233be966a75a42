//! Automation-host implementation of every collaborator seam.
//!
//! Each trait method becomes one host request. Host-side failures come
//! back as `AppError::Host` from the client and are re-tagged here with
//! the variant of the seam they belong to (`Browser`, `Auth`,
//! `Dashboard`, `Task`), so logs read the same regardless of backend.

use std::path::Path;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::process::Child;
use tracing::debug;

use crate::driver::{
    AccessToken, Authenticator, BrowserProvider, BrowserSession, DriverFuture, Page, RewardsApi,
    SessionStore, TaskRunner,
};
use crate::host::client::HostClient;
use crate::host::spawner::HostProcess;
use crate::models::persona::Persona;
use crate::models::points::{
    AppEarnablePoints, BrowserEarnablePoints, DashboardData, SearchPoints,
};
use crate::network::NetworkContext;
use crate::{AppError, Result};

#[derive(Debug, Deserialize)]
struct CreatedSession {
    session_id: String,
}

#[derive(Debug, Deserialize)]
struct IssuedToken {
    token: String,
}

/// Collaborator backend that forwards every call to the automation host.
#[derive(Debug)]
pub struct HostDriver {
    client: Arc<HostClient>,
    /// Host process; dropping the driver kills it.
    _child: Option<Child>,
}

impl HostDriver {
    /// Take ownership of a spawned host.
    #[must_use]
    pub fn new(process: HostProcess) -> Self {
        Self {
            client: Arc::new(process.client),
            _child: Some(process.child),
        }
    }

    /// Drive an already-connected client (no child process to own).
    #[must_use]
    pub fn from_client(client: HostClient) -> Self {
        Self {
            client: Arc::new(client),
            _child: None,
        }
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
        retag: fn(String) -> AppError,
    ) -> Result<T> {
        self.client
            .call(method, params)
            .await
            .map_err(|err| retag_host_error(err, retag))
    }

    async fn call_unit(
        &self,
        method: &str,
        params: Value,
        retag: fn(String) -> AppError,
    ) -> Result<()> {
        let _: Value = self.call(method, params, retag).await?;
        Ok(())
    }
}

fn retag_host_error(err: AppError, retag: fn(String) -> AppError) -> AppError {
    match err {
        AppError::Host(msg) => retag(msg),
        other => other,
    }
}

/// Session living inside the automation host.
struct HostSession {
    id: String,
    client: Arc<HostClient>,
}

impl BrowserSession for HostSession {
    fn id(&self) -> &str {
        &self.id
    }

    fn new_page(&mut self) -> DriverFuture<'_, Page> {
        Box::pin(async move {
            self.client
                .call("session/new_page", json!({ "session_id": self.id }))
                .await
                .map_err(|err| retag_host_error(err, AppError::Browser))
        })
    }
}

impl BrowserProvider for HostDriver {
    fn create_session<'a>(
        &'a self,
        net: &'a NetworkContext,
        account: &'a str,
        persona: Persona,
    ) -> DriverFuture<'a, Box<dyn BrowserSession>> {
        Box::pin(async move {
            let created: CreatedSession = self
                .call(
                    "session/create",
                    json!({ "account": account, "persona": persona, "network": net }),
                    AppError::Browser,
                )
                .await?;
            debug!(session_id = created.session_id, %persona, "host session created");
            let session: Box<dyn BrowserSession> = Box::new(HostSession {
                id: created.session_id,
                client: Arc::clone(&self.client),
            });
            Ok(session)
        })
    }

    fn close_session<'a>(
        &'a self,
        session: Box<dyn BrowserSession>,
        account: &'a str,
    ) -> DriverFuture<'a, ()> {
        Box::pin(async move {
            self.call_unit(
                "session/close",
                json!({ "session_id": session.id(), "account": account }),
                AppError::Browser,
            )
            .await
        })
    }
}

impl Authenticator for HostDriver {
    fn login<'a>(
        &'a self,
        page: &'a Page,
        email: &'a str,
        password: &'a str,
    ) -> DriverFuture<'a, ()> {
        Box::pin(self.call_unit(
            "auth/login",
            json!({ "page_id": page.id, "email": email, "password": password }),
            AppError::Auth,
        ))
    }

    fn mobile_access_token<'a>(
        &'a self,
        page: &'a Page,
        email: &'a str,
    ) -> DriverFuture<'a, AccessToken> {
        Box::pin(async move {
            let issued: IssuedToken = self
                .call(
                    "auth/mobile_token",
                    json!({ "page_id": page.id, "email": email }),
                    AppError::Auth,
                )
                .await?;
            Ok(AccessToken::new(issued.token))
        })
    }
}

impl RewardsApi for HostDriver {
    fn go_home<'a>(&'a self, page: &'a Page) -> DriverFuture<'a, ()> {
        Box::pin(self.call_unit(
            "rewards/go_home",
            json!({ "page_id": page.id }),
            AppError::Dashboard,
        ))
    }

    fn dashboard<'a>(&'a self, page: &'a Page) -> DriverFuture<'a, DashboardData> {
        Box::pin(self.call(
            "rewards/dashboard",
            json!({ "page_id": page.id }),
            AppError::Dashboard,
        ))
    }

    fn browser_earnable_points<'a>(
        &'a self,
        page: &'a Page,
    ) -> DriverFuture<'a, BrowserEarnablePoints> {
        Box::pin(self.call(
            "rewards/browser_earnable",
            json!({ "page_id": page.id }),
            AppError::Dashboard,
        ))
    }

    fn app_earnable_points<'a>(
        &'a self,
        net: &'a NetworkContext,
        token: &'a AccessToken,
    ) -> DriverFuture<'a, AppEarnablePoints> {
        Box::pin(self.call(
            "rewards/app_earnable",
            json!({ "network": net, "token": token.as_str() }),
            AppError::Dashboard,
        ))
    }

    fn search_points<'a>(&'a self, page: &'a Page) -> DriverFuture<'a, SearchPoints> {
        Box::pin(self.call(
            "rewards/search_points",
            json!({ "page_id": page.id }),
            AppError::Dashboard,
        ))
    }

    fn current_points<'a>(&'a self, page: &'a Page) -> DriverFuture<'a, i64> {
        Box::pin(self.call(
            "rewards/current_points",
            json!({ "page_id": page.id }),
            AppError::Dashboard,
        ))
    }
}

impl TaskRunner for HostDriver {
    fn daily_set<'a>(&'a self, page: &'a Page, data: &'a DashboardData) -> DriverFuture<'a, ()> {
        Box::pin(self.call_unit(
            "task/daily_set",
            json!({ "page_id": page.id, "dashboard": data }),
            AppError::Task,
        ))
    }

    fn more_promotions<'a>(
        &'a self,
        page: &'a Page,
        data: &'a DashboardData,
    ) -> DriverFuture<'a, ()> {
        Box::pin(self.call_unit(
            "task/more_promotions",
            json!({ "page_id": page.id, "dashboard": data }),
            AppError::Task,
        ))
    }

    fn punch_cards<'a>(
        &'a self,
        page: &'a Page,
        data: &'a DashboardData,
    ) -> DriverFuture<'a, ()> {
        Box::pin(self.call_unit(
            "task/punch_cards",
            json!({ "page_id": page.id, "dashboard": data }),
            AppError::Task,
        ))
    }

    fn search<'a>(
        &'a self,
        page: &'a Page,
        data: &'a DashboardData,
        persona: Persona,
    ) -> DriverFuture<'a, ()> {
        Box::pin(self.call_unit(
            "task/search",
            json!({ "page_id": page.id, "dashboard": data, "persona": persona }),
            AppError::Task,
        ))
    }

    fn daily_check_in<'a>(
        &'a self,
        net: &'a NetworkContext,
        token: &'a AccessToken,
        data: &'a DashboardData,
    ) -> DriverFuture<'a, ()> {
        Box::pin(self.call_unit(
            "task/daily_check_in",
            json!({ "network": net, "token": token.as_str(), "dashboard": data }),
            AppError::Task,
        ))
    }

    fn read_to_earn<'a>(
        &'a self,
        net: &'a NetworkContext,
        token: &'a AccessToken,
        data: &'a DashboardData,
    ) -> DriverFuture<'a, ()> {
        Box::pin(self.call_unit(
            "task/read_to_earn",
            json!({ "network": net, "token": token.as_str(), "dashboard": data }),
            AppError::Task,
        ))
    }
}

impl SessionStore for HostDriver {
    fn save_session<'a>(
        &'a self,
        path: &'a Path,
        session: &'a dyn BrowserSession,
        account: &'a str,
        persona: Persona,
    ) -> DriverFuture<'a, ()> {
        Box::pin(self.call_unit(
            "session/save",
            json!({
                "session_id": session.id(),
                "path": path.to_string_lossy(),
                "account": account,
                "persona": persona,
            }),
            AppError::Browser,
        ))
    }
}
