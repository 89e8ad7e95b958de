use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// When a consultant may mark an appointment as done, relative to its
/// scheduled date. The source shipped both rules in different revisions,
/// so it is a deployment policy rather than a fixed behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionPolicy {
    /// Only on the scheduled day itself.
    SameDayOnly,
    /// On the scheduled day or any later day.
    OnOrAfter,
}

impl CompletionPolicy {
    pub fn allows(self, today: NaiveDate, appointment: NaiveDate) -> bool {
        match self {
            CompletionPolicy::SameDayOnly => today == appointment,
            CompletionPolicy::OnOrAfter => today >= appointment,
        }
    }
}

impl FromStr for CompletionPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "same-day" => Ok(CompletionPolicy::SameDayOnly),
            "on-or-after" => Ok(CompletionPolicy::OnOrAfter),
            other => bail!("unknown completion policy: {other} (expected same-day or on-or-after)"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: PathBuf,
    pub port: u16,
    pub completion_policy: CompletionPolicy,
    pub require_payment_before_completion: bool,
    /// Endpoint for the pending-booking email notification; disabled when unset.
    pub notify_url: Option<String>,
    /// Bound on store write round-trips issued by mutation commands.
    pub command_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let home_dir = std::env::var("HOME").unwrap_or_else(|_| ".".into());
        let db_path = match std::env::var("PORTAL_DB_PATH") {
            Ok(p) => PathBuf::from(p),
            Err(_) => PathBuf::from(home_dir).join(".neocare").join("portal.db"),
        };

        let port = match std::env::var("PORT") {
            Ok(p) => p.parse().context("invalid PORT")?,
            Err(_) => 3000,
        };

        let completion_policy = match std::env::var("COMPLETION_POLICY") {
            Ok(p) => p.parse()?,
            Err(_) => CompletionPolicy::OnOrAfter,
        };

        let require_payment_before_completion = std::env::var("REQUIRE_PAYMENT_BEFORE_COMPLETION")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        let notify_url = std::env::var("NOTIFY_URL").ok().filter(|u| !u.is_empty());

        let command_timeout = match std::env::var("COMMAND_TIMEOUT_SECS") {
            Ok(s) => Duration::from_secs(s.parse().context("invalid COMMAND_TIMEOUT_SECS")?),
            Err(_) => Duration::from_secs(15),
        };

        Ok(Self {
            db_path,
            port,
            completion_policy,
            require_payment_before_completion,
            notify_url,
            command_timeout,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("portal.db"),
            port: 3000,
            completion_policy: CompletionPolicy::OnOrAfter,
            require_payment_before_completion: false,
            notify_url: None,
            command_timeout: Duration::from_secs(15),
        }
    }
}
