//! Desktop and mobile persona-runs for one account.
//!
//! Every persona-run attempt acquires its own browser session and hands
//! it back to the provider exactly once, whichever way the attempt ends:
//! completion, zero-points soft-stop, incomplete mobile search, or a
//! propagated failure. The session never outlives the attempt.

use std::path::PathBuf;

use tracing::{info, info_span, warn, Instrument};

use crate::config::{GlobalConfig, WorkerToggles};
use crate::driver::{BrowserSession, Collaborators};
use crate::models::account::AccountCredential;
use crate::models::persona::Persona;
use crate::models::points::PointSnapshot;
use crate::network::NetworkContext;
use crate::Result;

/// The slice of configuration the persona-runs depend on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSettings {
    /// Run sub-tasks even when nothing is earnable.
    pub run_on_zero_points: bool,
    /// Run desktop and mobile concurrently per account.
    pub parallel: bool,
    /// Per-sub-task switches.
    pub toggles: WorkerToggles,
    /// Where session state is persisted.
    pub session_path: PathBuf,
    /// Mobile-search retry budget per account.
    pub max_mobile_search_retries: u32,
}

impl RunSettings {
    /// Extract the run settings from the global configuration.
    #[must_use]
    pub fn from_config(config: &GlobalConfig) -> Self {
        Self {
            run_on_zero_points: config.run_on_zero_points,
            parallel: config.parallel,
            toggles: config.workers.clone(),
            session_path: config.session_path.clone(),
            max_mobile_search_retries: config.max_mobile_search_retries(),
        }
    }
}

/// How a desktop persona-run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DesktopOutcome {
    /// Nothing to earn and `run_on_zero_points` is off.
    SoftStopped,
    /// All enabled sub-tasks ran and the session state was saved.
    Completed {
        /// Point bookkeeping for the run.
        points: PointSnapshot,
    },
}

/// What happened to the mobile search within one mobile attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchResolution {
    /// The search sub-task completed.
    Succeeded,
    /// The search failed, but the server reports nothing left to earn.
    NothingRemaining,
    /// Mobile search is switched off in the configuration.
    Disabled,
    /// The dashboard has no mobile search counter (account too new).
    Unavailable,
}

/// How one mobile attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MobileAttempt {
    /// Nothing to earn and `run_on_zero_points` is off.
    SoftStopped,
    /// The attempt ran to the end and fetched the final balance.
    Finished {
        /// Point bookkeeping for the run.
        points: PointSnapshot,
        /// Mobile search result.
        search: SearchResolution,
    },
    /// Mobile search failed with points still left; a retry may help.
    SearchIncomplete {
        /// Server-reported points still left on the mobile counter.
        remaining: i64,
        /// Balance this attempt's dashboard reported.
        initial_points: i64,
    },
}

/// Runs single persona-run attempts against the collaborators.
#[derive(Clone)]
pub struct SessionRunner {
    collaborators: Collaborators,
    settings: RunSettings,
}

impl SessionRunner {
    /// Create a runner.
    #[must_use]
    pub fn new(collaborators: Collaborators, settings: RunSettings) -> Self {
        Self {
            collaborators,
            settings,
        }
    }

    /// Settings this runner was built with.
    #[must_use]
    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    /// Run the desktop persona for `account`.
    ///
    /// # Errors
    ///
    /// Propagates any collaborator failure; desktop sub-tasks are not retried.
    pub async fn run_desktop(
        &self,
        account: &AccountCredential,
        net: &NetworkContext,
    ) -> Result<DesktopOutcome> {
        let span = info_span!("persona_run", persona = %Persona::Desktop);
        async {
            let mut session = self
                .collaborators
                .browser
                .create_session(net, &account.email, Persona::Desktop)
                .await?;
            info!("starting browser");

            let outcome = self.desktop_sequence(session.as_mut(), account).await;
            self.release(session, &account.email, outcome).await
        }
        .instrument(span)
        .await
    }

    /// Run one mobile attempt (fresh session, login, tasks, search).
    ///
    /// `seed` is the balance recorded by the first attempt of this
    /// persona-run; `None` on the first attempt, which seeds from its own
    /// dashboard.
    ///
    /// # Errors
    ///
    /// Propagates every failure except a failed mobile search, which is
    /// reported as [`MobileAttempt::SearchIncomplete`] or resolved.
    pub async fn run_mobile_attempt(
        &self,
        account: &AccountCredential,
        net: &NetworkContext,
        attempt: u32,
        seed: Option<i64>,
    ) -> Result<MobileAttempt> {
        let span = info_span!("persona_run", persona = %Persona::Mobile, attempt);
        async {
            let mut session = self
                .collaborators
                .browser
                .create_session(net, &account.email, Persona::Mobile)
                .await?;
            info!("starting browser");

            let outcome = self
                .mobile_sequence(session.as_mut(), account, net, seed)
                .await;
            self.release(session, &account.email, outcome).await
        }
        .instrument(span)
        .await
    }

    async fn desktop_sequence(
        &self,
        session: &mut dyn BrowserSession,
        account: &AccountCredential,
    ) -> Result<DesktopOutcome> {
        let c = &self.collaborators;
        let toggles = &self.settings.toggles;

        let page = session.new_page().await?;
        c.auth.login(&page, &account.email, &account.password).await?;
        c.rewards.go_home(&page).await?;

        let data = c.rewards.dashboard(&page).await?;
        let mut points = PointSnapshot::seeded(data.user_status.available_points);
        info!(tag = "MAIN-POINTS", points = points.initial_points, "current point count");

        let earnable = c.rewards.browser_earnable_points(&page).await?;
        points.earnable_points = earnable.desktop_total();
        info!(tag = "MAIN-POINTS", earnable = points.earnable_points, "points earnable today");

        if self.zero_points_gate(points.earnable_points) {
            return Ok(DesktopOutcome::SoftStopped);
        }

        if toggles.do_daily_set {
            c.tasks.daily_set(&page, &data).await?;
        }
        if toggles.do_more_promotions {
            c.tasks.more_promotions(&page, &data).await?;
        }
        if toggles.do_punch_cards {
            c.tasks.punch_cards(&page, &data).await?;
        }
        if toggles.do_desktop_search {
            c.tasks.search(&page, &data, Persona::Desktop).await?;
        }

        c.sessions
            .save_session(
                &self.settings.session_path,
                &*session,
                &account.email,
                Persona::Desktop,
            )
            .await?;

        Ok(DesktopOutcome::Completed { points })
    }

    async fn mobile_sequence(
        &self,
        session: &mut dyn BrowserSession,
        account: &AccountCredential,
        net: &NetworkContext,
        seed: Option<i64>,
    ) -> Result<MobileAttempt> {
        let c = &self.collaborators;
        let toggles = &self.settings.toggles;

        let page = session.new_page().await?;
        c.auth.login(&page, &account.email, &account.password).await?;
        let token = c.auth.mobile_access_token(&page, &account.email).await?;
        c.rewards.go_home(&page).await?;

        let data = c.rewards.dashboard(&page).await?;
        let mut points =
            PointSnapshot::seeded(seed.unwrap_or(data.user_status.available_points));

        let browser = c.rewards.browser_earnable_points(&page).await?;
        let app = c.rewards.app_earnable_points(net, &token).await?;
        points.earnable_points = browser
            .mobile_search_points
            .saturating_add(app.total_earnable_points);
        info!(
            tag = "MAIN-POINTS",
            earnable = points.earnable_points,
            browser = browser.mobile_search_points,
            app = app.total_earnable_points,
            "points earnable today"
        );

        if self.zero_points_gate(points.earnable_points) {
            return Ok(MobileAttempt::SoftStopped);
        }

        if toggles.do_daily_check_in {
            c.tasks.daily_check_in(net, &token, &data).await?;
        }
        if toggles.do_read_to_earn {
            c.tasks.read_to_earn(net, &token, &data).await?;
        }

        let search = if !toggles.do_mobile_search {
            warn!("mobile search disabled, skipping");
            SearchResolution::Disabled
        } else if !data.has_mobile_search_counter() {
            warn!("unable to fetch search points, account is most likely too new; try again later");
            SearchResolution::Unavailable
        } else {
            match c.tasks.search(&page, &data, Persona::Mobile).await {
                Ok(()) => {
                    info!("mobile search completed successfully");
                    SearchResolution::Succeeded
                }
                Err(err) => {
                    let progress = c.rewards.search_points(&page).await?;
                    match progress.mobile_remaining() {
                        Some(remaining) if remaining > 0 => {
                            warn!(%err, remaining, "mobile search incomplete");
                            return Ok(MobileAttempt::SearchIncomplete {
                                remaining,
                                initial_points: points.initial_points,
                            });
                        }
                        _ => {
                            info!(%err, "mobile search failed but nothing is left to earn");
                            SearchResolution::NothingRemaining
                        }
                    }
                }
            }
        };

        points.current_points = Some(c.rewards.current_points(&page).await?);
        info!(
            tag = "MAIN-POINTS",
            collected = points.collected().unwrap_or_default(),
            "points collected today"
        );

        Ok(MobileAttempt::Finished { points, search })
    }

    fn zero_points_gate(&self, earnable: u64) -> bool {
        if earnable == 0 && !self.settings.run_on_zero_points {
            warn!("no points to earn and run_on_zero_points is false, stopping");
            return true;
        }
        false
    }

    /// Close `session` and merge the close result into `outcome`.
    ///
    /// A close failure after a successful attempt becomes the error; after
    /// a failed attempt it is logged and the original error wins.
    async fn release<T>(
        &self,
        session: Box<dyn BrowserSession>,
        account: &str,
        outcome: Result<T>,
    ) -> Result<T> {
        let closed = self
            .collaborators
            .browser
            .close_session(session, account)
            .await;

        match (outcome, closed) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(close_err)) => Err(close_err),
            (Err(err), Ok(())) => Err(err),
            (Err(err), Err(close_err)) => {
                warn!(%close_err, "failed to close browser after an earlier failure");
                Err(err)
            }
        }
    }
}
