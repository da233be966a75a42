//! Shared fakes for engine-level integration tests.
//!
//! `FakeDriver` implements every collaborator seam from a `FakeScript`
//! and records each call, so tests can assert on session lifecycles and
//! sub-task order without a browser.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use rewards_runner::config::WorkerToggles;
use rewards_runner::driver::{
    AccessToken, Authenticator, BrowserProvider, BrowserSession, Collaborators, DriverFuture,
    Page, RewardsApi, SessionStore, TaskRunner,
};
use rewards_runner::models::account::{AccountCredential, ProxyConfig};
use rewards_runner::models::persona::Persona;
use rewards_runner::models::points::{
    AppEarnablePoints, BrowserEarnablePoints, CounterProgress, Counters, DashboardData,
    SearchPoints, UserStatus,
};
use rewards_runner::network::NetworkContext;
use rewards_runner::orchestrator::session_runner::{RunSettings, SessionRunner};
use rewards_runner::{AppError, Result};

/// Mobile counter maximum reported by the fake dashboard.
pub const MOBILE_COUNTER_MAX: i64 = 100;

/// What the fake collaborators report and where they fail.
#[derive(Debug, Clone)]
pub struct FakeScript {
    pub available_points: i64,
    /// Added to the dashboard balance on every fetch after the first.
    pub balance_step: i64,
    pub browser_earnable: BrowserEarnablePoints,
    pub app_earnable: AppEarnablePoints,
    pub mobile_counter: bool,
    /// Mobile searches that fail per account before one succeeds.
    pub mobile_search_failures: u32,
    /// Points left on the mobile counter after a failed search.
    pub mobile_remaining: i64,
    pub final_points: i64,
    /// `(operation, account)` that fails hard.
    pub failing_op: Option<(&'static str, String)>,
    pub fail_close: bool,
}

impl Default for FakeScript {
    fn default() -> Self {
        Self {
            available_points: 1000,
            balance_step: 0,
            browser_earnable: BrowserEarnablePoints {
                desktop_search_points: 150,
                mobile_search_points: 100,
                daily_set_points: 30,
                more_promotions_points: 20,
            },
            app_earnable: AppEarnablePoints {
                read_to_earn: 30,
                check_in: 5,
                total_earnable_points: 35,
            },
            mobile_counter: true,
            mobile_search_failures: 0,
            mobile_remaining: 60,
            final_points: 1200,
            failing_op: None,
            fail_close: false,
        }
    }
}

/// One recorded collaborator call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub op: &'static str,
    pub account: String,
    pub persona: Option<Persona>,
}

#[derive(Debug, Default)]
struct FakeState {
    calls: Vec<Call>,
    sessions_created: usize,
    dashboard_fetches: i64,
    mobile_searches: HashMap<String, u32>,
}

/// Scripted implementation of every collaborator trait.
#[derive(Debug, Default)]
pub struct FakeDriver {
    script: FakeScript,
    state: Mutex<FakeState>,
}

struct FakeSession {
    id: String,
}

impl BrowserSession for FakeSession {
    fn id(&self) -> &str {
        &self.id
    }

    fn new_page(&mut self) -> DriverFuture<'_, Page> {
        let page = Page {
            id: format!("{}|page", self.id),
        };
        Box::pin(std::future::ready(Ok(page)))
    }
}

fn parse_persona(raw: &str) -> Option<Persona> {
    match raw {
        "desktop" => Some(Persona::Desktop),
        "mobile" => Some(Persona::Mobile),
        _ => None,
    }
}

/// Session and page ids look like `account|persona|n[|page]`.
fn owner_of(id: &str) -> (String, Option<Persona>) {
    let mut parts = id.split('|');
    let account = parts.next().unwrap_or_default().to_owned();
    let persona = parts.next().and_then(parse_persona);
    (account, persona)
}

impl FakeDriver {
    pub fn new(script: FakeScript) -> Arc<Self> {
        Arc::new(Self {
            script,
            state: Mutex::new(FakeState::default()),
        })
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn ops(&self) -> Vec<&'static str> {
        self.calls().into_iter().map(|call| call.op).collect()
    }

    pub fn count(&self, op: &str) -> usize {
        self.calls().iter().filter(|call| call.op == op).count()
    }

    pub fn count_for(&self, op: &str, account: &str) -> usize {
        self.calls()
            .iter()
            .filter(|call| call.op == op && call.account == account)
            .count()
    }

    pub fn count_persona(&self, op: &str, persona: Persona) -> usize {
        self.calls()
            .iter()
            .filter(|call| call.op == op && call.persona == Some(persona))
            .count()
    }

    /// Accounts in the order their sessions were opened.
    pub fn open_order(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|call| call.op == "open")
            .map(|call| call.account)
            .collect()
    }

    fn record(&self, op: &'static str, account: &str, persona: Option<Persona>) -> Result<()> {
        self.state.lock().unwrap().calls.push(Call {
            op,
            account: account.to_owned(),
            persona,
        });

        match &self.script.failing_op {
            Some((failing, who)) if *failing == op && who == account => {
                Err(AppError::Task(format!("{op} failed for {account}")))
            }
            _ => Ok(()),
        }
    }

    fn record_page(&self, op: &'static str, page: &Page) -> Result<()> {
        let (account, persona) = owner_of(&page.id);
        self.record(op, &account, persona)
    }

    fn dashboard_data(&self) -> DashboardData {
        let fetched_before = {
            let mut state = self.state.lock().unwrap();
            state.dashboard_fetches += 1;
            state.dashboard_fetches - 1
        };

        let mobile_search = self.script.mobile_counter.then(|| {
            vec![CounterProgress {
                point_progress: 0,
                point_progress_max: MOBILE_COUNTER_MAX,
            }]
        });

        DashboardData {
            user_status: UserStatus {
                available_points: self.script.available_points
                    + self.script.balance_step * fetched_before,
                counters: Counters {
                    pc_search: None,
                    mobile_search,
                },
            },
            extra: serde_json::Map::new(),
        }
    }

    fn run_search(&self, page: &Page, persona: Persona) -> Result<()> {
        let (account, _) = owner_of(&page.id);
        let op = if persona.is_mobile() {
            "mobile_search"
        } else {
            "desktop_search"
        };
        self.record(op, &account, Some(persona))?;

        if !persona.is_mobile() {
            return Ok(());
        }

        let mut state = self.state.lock().unwrap();
        let seen = state.mobile_searches.entry(account).or_insert(0);
        *seen += 1;
        if *seen <= self.script.mobile_search_failures {
            Err(AppError::Task("search budget exhausted".into()))
        } else {
            Ok(())
        }
    }
}

impl BrowserProvider for FakeDriver {
    fn create_session<'a>(
        &'a self,
        _net: &'a NetworkContext,
        account: &'a str,
        persona: Persona,
    ) -> DriverFuture<'a, Box<dyn BrowserSession>> {
        let result = self.record("open", account, Some(persona)).map(|()| {
            let mut state = self.state.lock().unwrap();
            state.sessions_created += 1;
            let session: Box<dyn BrowserSession> = Box::new(FakeSession {
                id: format!("{account}|{persona}|{}", state.sessions_created),
            });
            session
        });
        Box::pin(std::future::ready(result))
    }

    fn close_session<'a>(
        &'a self,
        session: Box<dyn BrowserSession>,
        _account: &'a str,
    ) -> DriverFuture<'a, ()> {
        let (account, persona) = owner_of(session.id());
        let mut result = self.record("close", &account, persona);
        if result.is_ok() && self.script.fail_close {
            result = Err(AppError::Browser("close failed".into()));
        }
        Box::pin(std::future::ready(result))
    }
}

impl Authenticator for FakeDriver {
    fn login<'a>(
        &'a self,
        page: &'a Page,
        _email: &'a str,
        _password: &'a str,
    ) -> DriverFuture<'a, ()> {
        Box::pin(std::future::ready(self.record_page("login", page)))
    }

    fn mobile_access_token<'a>(
        &'a self,
        page: &'a Page,
        _email: &'a str,
    ) -> DriverFuture<'a, AccessToken> {
        let result = self
            .record_page("token", page)
            .map(|()| AccessToken::new("token"));
        Box::pin(std::future::ready(result))
    }
}

impl RewardsApi for FakeDriver {
    fn go_home<'a>(&'a self, page: &'a Page) -> DriverFuture<'a, ()> {
        Box::pin(std::future::ready(self.record_page("go_home", page)))
    }

    fn dashboard<'a>(&'a self, page: &'a Page) -> DriverFuture<'a, DashboardData> {
        let result = self
            .record_page("dashboard", page)
            .map(|()| self.dashboard_data());
        Box::pin(std::future::ready(result))
    }

    fn browser_earnable_points<'a>(
        &'a self,
        page: &'a Page,
    ) -> DriverFuture<'a, BrowserEarnablePoints> {
        let result = self
            .record_page("browser_earnable", page)
            .map(|()| self.script.browser_earnable);
        Box::pin(std::future::ready(result))
    }

    fn app_earnable_points<'a>(
        &'a self,
        net: &'a NetworkContext,
        _token: &'a AccessToken,
    ) -> DriverFuture<'a, AppEarnablePoints> {
        let result = self
            .record("app_earnable", &net.account, Some(Persona::Mobile))
            .map(|()| self.script.app_earnable);
        Box::pin(std::future::ready(result))
    }

    fn search_points<'a>(&'a self, page: &'a Page) -> DriverFuture<'a, SearchPoints> {
        let result = self.record_page("search_points", page).map(|()| SearchPoints {
            pc_search: Vec::new(),
            mobile_search: vec![CounterProgress {
                point_progress: MOBILE_COUNTER_MAX - self.script.mobile_remaining,
                point_progress_max: MOBILE_COUNTER_MAX,
            }],
        });
        Box::pin(std::future::ready(result))
    }

    fn current_points<'a>(&'a self, page: &'a Page) -> DriverFuture<'a, i64> {
        let result = self
            .record_page("current_points", page)
            .map(|()| self.script.final_points);
        Box::pin(std::future::ready(result))
    }
}

impl TaskRunner for FakeDriver {
    fn daily_set<'a>(&'a self, page: &'a Page, _data: &'a DashboardData) -> DriverFuture<'a, ()> {
        Box::pin(std::future::ready(self.record_page("daily_set", page)))
    }

    fn more_promotions<'a>(
        &'a self,
        page: &'a Page,
        _data: &'a DashboardData,
    ) -> DriverFuture<'a, ()> {
        Box::pin(std::future::ready(self.record_page("more_promotions", page)))
    }

    fn punch_cards<'a>(
        &'a self,
        page: &'a Page,
        _data: &'a DashboardData,
    ) -> DriverFuture<'a, ()> {
        Box::pin(std::future::ready(self.record_page("punch_cards", page)))
    }

    fn search<'a>(
        &'a self,
        page: &'a Page,
        _data: &'a DashboardData,
        persona: Persona,
    ) -> DriverFuture<'a, ()> {
        Box::pin(std::future::ready(self.run_search(page, persona)))
    }

    fn daily_check_in<'a>(
        &'a self,
        net: &'a NetworkContext,
        _token: &'a AccessToken,
        _data: &'a DashboardData,
    ) -> DriverFuture<'a, ()> {
        let result = self.record("daily_check_in", &net.account, Some(Persona::Mobile));
        Box::pin(std::future::ready(result))
    }

    fn read_to_earn<'a>(
        &'a self,
        net: &'a NetworkContext,
        _token: &'a AccessToken,
        _data: &'a DashboardData,
    ) -> DriverFuture<'a, ()> {
        let result = self.record("read_to_earn", &net.account, Some(Persona::Mobile));
        Box::pin(std::future::ready(result))
    }
}

impl SessionStore for FakeDriver {
    fn save_session<'a>(
        &'a self,
        _path: &'a Path,
        session: &'a dyn BrowserSession,
        _account: &'a str,
        _persona: Persona,
    ) -> DriverFuture<'a, ()> {
        let (account, persona) = owner_of(session.id());
        Box::pin(std::future::ready(self.record("save", &account, persona)))
    }
}

pub fn account(email: &str) -> AccountCredential {
    AccountCredential {
        email: email.to_owned(),
        password: "password".to_owned(),
        proxy: ProxyConfig::default(),
    }
}

pub fn network(account: &AccountCredential) -> NetworkContext {
    NetworkContext::for_account(&account.email, &account.proxy)
}

/// Settings with every sub-task on and a retry budget of `max_retries`.
pub fn settings(max_retries: u32) -> RunSettings {
    RunSettings {
        run_on_zero_points: false,
        parallel: false,
        toggles: WorkerToggles::default(),
        session_path: PathBuf::from("sessions"),
        max_mobile_search_retries: max_retries,
    }
}

/// Toggles with every sub-task switched off.
pub fn all_off() -> WorkerToggles {
    WorkerToggles {
        do_daily_set: false,
        do_more_promotions: false,
        do_punch_cards: false,
        do_desktop_search: false,
        do_daily_check_in: false,
        do_read_to_earn: false,
        do_mobile_search: false,
    }
}

pub fn collaborators(driver: &Arc<FakeDriver>) -> Collaborators {
    Collaborators::from_driver(Arc::clone(driver))
}

pub fn runner(driver: &Arc<FakeDriver>, settings: RunSettings) -> SessionRunner {
    SessionRunner::new(collaborators(driver), settings)
}
