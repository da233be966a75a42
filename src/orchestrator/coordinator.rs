//! Per-account sequencing of the desktop and mobile persona-runs.
//!
//! Accounts are processed strictly one after another; the next account
//! never starts before the previous one resolved. A hard failure in
//! either persona aborts the rest of the chunk.

use tracing::{info, info_span, warn, Instrument};

use crate::driver::Collaborators;
use crate::models::account::AccountCredential;
use crate::network::NetworkContext;
use crate::orchestrator::mobile_retry::{MobileOutcome, MobileRetryController};
use crate::orchestrator::session_runner::{DesktopOutcome, RunSettings, SessionRunner};
use crate::Result;

/// Result of processing one account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountReport {
    /// Account e-mail.
    pub email: String,
    /// Desktop persona result.
    pub desktop: DesktopOutcome,
    /// Mobile persona result.
    pub mobile: MobileOutcome,
}

/// Runs a chunk of accounts in order.
#[derive(Clone)]
pub struct AccountTaskCoordinator {
    runner: SessionRunner,
}

impl AccountTaskCoordinator {
    /// Create a coordinator.
    #[must_use]
    pub fn new(collaborators: Collaborators, settings: RunSettings) -> Self {
        Self {
            runner: SessionRunner::new(collaborators, settings),
        }
    }

    /// Process every account in `accounts`, in order.
    ///
    /// # Errors
    ///
    /// Returns the first hard failure; the remaining accounts are skipped.
    pub async fn run_chunk(&self, accounts: &[AccountCredential]) -> Result<Vec<AccountReport>> {
        let mut reports = Vec::with_capacity(accounts.len());

        for account in accounts {
            let span = info_span!("account_run", account = %account.email);
            let report = self.run_account(account).instrument(span).await?;
            reports.push(report);
        }

        info!(
            tag = "MAIN-WORKER",
            accounts = reports.len(),
            "completed tasks for all accounts"
        );
        Ok(reports)
    }

    async fn run_account(&self, account: &AccountCredential) -> Result<AccountReport> {
        info!(tag = "MAIN-WORKER", "started tasks for account");

        let net = NetworkContext::for_account(&account.email, &account.proxy);
        let mut mobile_controller =
            MobileRetryController::new(self.runner.settings().max_mobile_search_retries);

        let (desktop, mobile) = if self.runner.settings().parallel {
            let (desktop, mobile) = tokio::join!(
                self.runner.run_desktop(account, &net),
                mobile_controller.run(&self.runner, account, &net),
            );
            if let (Err(_), Err(mobile_err)) = (&desktop, &mobile) {
                warn!(%mobile_err, "mobile run also failed");
            }
            (desktop?, mobile?)
        } else {
            let desktop = self.runner.run_desktop(account, &net).await?;
            let mobile = mobile_controller.run(&self.runner, account, &net).await?;
            (desktop, mobile)
        };

        info!(tag = "MAIN-WORKER", "completed tasks for account");

        Ok(AccountReport {
            email: account.email.clone(),
            desktop,
            mobile,
        })
    }
}
