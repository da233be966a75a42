//! Collaborator seams consumed by the orchestration engine.
//!
//! The engine never talks to a browser, a login form, or the rewards
//! service directly. Everything it needs is expressed as the traits
//! below, bundled into [`Collaborators`]. [`host_driver::HostDriver`]
//! implements all of them on top of an external automation host; tests
//! plug in fakes.

pub mod host_driver;

use std::fmt::{Debug, Formatter};
use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::models::persona::Persona;
use crate::models::points::{
    AppEarnablePoints, BrowserEarnablePoints, DashboardData, SearchPoints,
};
use crate::network::NetworkContext;
use crate::Result;

/// Boxed future returned by every collaborator method.
pub type DriverFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Opaque page reference inside a browser session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Page {
    /// Provider-assigned page identifier.
    pub id: String,
}

/// Mobile-app access credential obtained after login.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    /// Wrap a raw token.
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Raw token value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Debug for AccessToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("AccessToken(<redacted>)")
    }
}

/// One live browser-automation session.
///
/// Exclusively owned by a single persona-run attempt and handed back to
/// [`BrowserProvider::close_session`] exactly once.
pub trait BrowserSession: Send + Sync {
    /// Provider-assigned session identifier.
    fn id(&self) -> &str;

    /// Open a new page in this session.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Browser`](crate::AppError::Browser) if the page cannot be created.
    fn new_page(&mut self) -> DriverFuture<'_, Page>;
}

/// Creates and releases browser sessions.
pub trait BrowserProvider: Send + Sync {
    /// Launch a fresh session for `account` routed through `net`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Browser`](crate::AppError::Browser) if the session cannot be launched.
    fn create_session<'a>(
        &'a self,
        net: &'a NetworkContext,
        account: &'a str,
        persona: Persona,
    ) -> DriverFuture<'a, Box<dyn BrowserSession>>;

    /// Close a session. Consumes it, so a session is closed at most once.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Browser`](crate::AppError::Browser) if the close fails.
    fn close_session<'a>(
        &'a self,
        session: Box<dyn BrowserSession>,
        account: &'a str,
    ) -> DriverFuture<'a, ()>;
}

/// Login flow.
pub trait Authenticator: Send + Sync {
    /// Sign `email` in on `page`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Auth`](crate::AppError::Auth) on login failure.
    fn login<'a>(&'a self, page: &'a Page, email: &'a str, password: &'a str)
        -> DriverFuture<'a, ()>;

    /// Obtain the mobile-app access credential for a signed-in page.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Auth`](crate::AppError::Auth) if no token is issued.
    fn mobile_access_token<'a>(
        &'a self,
        page: &'a Page,
        email: &'a str,
    ) -> DriverFuture<'a, AccessToken>;
}

/// Dashboard and point lookups.
pub trait RewardsApi: Send + Sync {
    /// Navigate `page` to the rewards home page.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Dashboard`](crate::AppError::Dashboard) on navigation failure.
    fn go_home<'a>(&'a self, page: &'a Page) -> DriverFuture<'a, ()>;

    /// Current dashboard snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Dashboard`](crate::AppError::Dashboard) if it cannot be fetched.
    fn dashboard<'a>(&'a self, page: &'a Page) -> DriverFuture<'a, DashboardData>;

    /// Points still earnable through the browser.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Dashboard`](crate::AppError::Dashboard) if the lookup fails.
    fn browser_earnable_points<'a>(&'a self, page: &'a Page)
        -> DriverFuture<'a, BrowserEarnablePoints>;

    /// Points still earnable through the mobile app.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Dashboard`](crate::AppError::Dashboard) if the lookup fails.
    fn app_earnable_points<'a>(
        &'a self,
        net: &'a NetworkContext,
        token: &'a AccessToken,
    ) -> DriverFuture<'a, AppEarnablePoints>;

    /// Server-reported search progress.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Dashboard`](crate::AppError::Dashboard) if the lookup fails.
    fn search_points<'a>(&'a self, page: &'a Page) -> DriverFuture<'a, SearchPoints>;

    /// Current point balance.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Dashboard`](crate::AppError::Dashboard) if the lookup fails.
    fn current_points<'a>(&'a self, page: &'a Page) -> DriverFuture<'a, i64>;
}

/// Point-earning sub-tasks. Each call either completes or fails; none retry.
pub trait TaskRunner: Send + Sync {
    /// Complete the daily set.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Task`](crate::AppError::Task) on failure.
    fn daily_set<'a>(&'a self, page: &'a Page, data: &'a DashboardData) -> DriverFuture<'a, ()>;

    /// Complete the "more promotions" activities.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Task`](crate::AppError::Task) on failure.
    fn more_promotions<'a>(
        &'a self,
        page: &'a Page,
        data: &'a DashboardData,
    ) -> DriverFuture<'a, ()>;

    /// Complete punch cards.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Task`](crate::AppError::Task) on failure.
    fn punch_cards<'a>(&'a self, page: &'a Page, data: &'a DashboardData)
        -> DriverFuture<'a, ()>;

    /// Run the searches for `persona`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Task`](crate::AppError::Task) on failure or when the
    /// search budget is exhausted before the counter fills.
    fn search<'a>(
        &'a self,
        page: &'a Page,
        data: &'a DashboardData,
        persona: Persona,
    ) -> DriverFuture<'a, ()>;

    /// Mobile-app daily check-in.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Task`](crate::AppError::Task) on failure.
    fn daily_check_in<'a>(
        &'a self,
        net: &'a NetworkContext,
        token: &'a AccessToken,
        data: &'a DashboardData,
    ) -> DriverFuture<'a, ()>;

    /// Mobile-app read-to-earn.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Task`](crate::AppError::Task) on failure.
    fn read_to_earn<'a>(
        &'a self,
        net: &'a NetworkContext,
        token: &'a AccessToken,
        data: &'a DashboardData,
    ) -> DriverFuture<'a, ()>;
}

/// Persists session state (cookies, fingerprints) for later runs.
pub trait SessionStore: Send + Sync {
    /// Save `session` under `path` for `account`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Browser`](crate::AppError::Browser) or
    /// [`AppError::Io`](crate::AppError::Io) if the state cannot be written.
    fn save_session<'a>(
        &'a self,
        path: &'a Path,
        session: &'a dyn BrowserSession,
        account: &'a str,
        persona: Persona,
    ) -> DriverFuture<'a, ()>;
}

/// All collaborators the engine needs, cheaply cloneable.
#[derive(Clone)]
pub struct Collaborators {
    /// Browser session provider.
    pub browser: Arc<dyn BrowserProvider>,
    /// Login flow.
    pub auth: Arc<dyn Authenticator>,
    /// Dashboard and point lookups.
    pub rewards: Arc<dyn RewardsApi>,
    /// Sub-task implementations.
    pub tasks: Arc<dyn TaskRunner>,
    /// Session persistence.
    pub sessions: Arc<dyn SessionStore>,
}

impl Collaborators {
    /// Use one object for every seam.
    #[must_use]
    pub fn from_driver<D>(driver: Arc<D>) -> Self
    where
        D: BrowserProvider + Authenticator + RewardsApi + TaskRunner + SessionStore + 'static,
    {
        Self {
            browser: driver.clone(),
            auth: driver.clone(),
            rewards: driver.clone(),
            tasks: driver.clone(),
            sessions: driver,
        }
    }
}
