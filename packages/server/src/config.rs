use anyhow::{bail, Context, Result};
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::domains::applications::models::ApplicationStatus;
use crate::kernel::jobs::JobWorkerConfig;
use crate::kernel::{PipelineSettings, SchedulerConfig};

/// Base URLs of the collaborator sidecars.
#[derive(Debug, Clone)]
pub struct CollaboratorUrls {
    pub talent_system: String,
    pub resume_parser: String,
    pub fact_extractor: String,
    pub interview_channel: String,
    pub timeout: Duration,
}

/// Shortest lease a running job may hold. The worker heartbeats three times
/// per lease, so shorter leases would expire between database round trips.
const MIN_JOB_LEASE_MS: i64 = 3_000;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub worker_concurrency: usize,
    pub worker_poll_interval: Duration,
    pub job_lease_ms: i64,
    pub job_timeout: Option<Duration>,
    pub eligibility_sweep_interval: Duration,
    pub stuck_sweep_interval: Duration,
    pub stuck_timeout: Duration,
    pub interview_ttl: Duration,
    pub interviews_enabled: bool,
    pub human_wait_statuses: Vec<ApplicationStatus>,
    pub collaborators: CollaboratorUrls,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let collaborators = CollaboratorUrls {
            talent_system: var("TALENT_SYSTEM_URL")
                .unwrap_or_else(|| "http://localhost:8081".to_string()),
            resume_parser: var("RESUME_PARSER_URL")
                .unwrap_or_else(|| "http://localhost:8082".to_string()),
            fact_extractor: var("FACT_EXTRACTOR_URL")
                .unwrap_or_else(|| "http://localhost:8083".to_string()),
            interview_channel: var("INTERVIEW_CHANNEL_URL")
                .unwrap_or_else(|| "http://localhost:8084".to_string()),
            timeout: Duration::from_secs(parse_or(&var, "COLLABORATOR_TIMEOUT_SECS", 60)?),
        };

        let human_wait_statuses = match var("HUMAN_WAIT_STATUSES") {
            Some(raw) => parse_status_list(&raw)?,
            None => vec![ApplicationStatus::LiveInterviewPending],
        };

        let job_timeout = match var("JOB_TIMEOUT_SECS") {
            Some(raw) => Some(Duration::from_secs(
                raw.trim()
                    .parse()
                    .context("JOB_TIMEOUT_SECS must be a valid number")?,
            )),
            None => None,
        };

        let job_lease_ms: i64 = parse_or(&var, "JOB_LEASE_MS", 300_000)?;
        if job_lease_ms < MIN_JOB_LEASE_MS {
            bail!("JOB_LEASE_MS must be at least {MIN_JOB_LEASE_MS}, got {job_lease_ms}");
        }

        Ok(Self {
            database_url: var("DATABASE_URL").context("DATABASE_URL must be set")?,
            port: parse_or(&var, "PORT", 8080)?,
            worker_concurrency: parse_or(&var, "WORKER_CONCURRENCY", 4)?,
            worker_poll_interval: Duration::from_millis(parse_or(&var, "WORKER_POLL_INTERVAL_MS", 2000)?),
            job_lease_ms,
            job_timeout,
            eligibility_sweep_interval: Duration::from_secs(parse_or(&var, "ELIGIBILITY_SWEEP_SECS", 60)?),
            stuck_sweep_interval: Duration::from_secs(parse_or(&var, "STUCK_SWEEP_SECS", 300)?),
            stuck_timeout: Duration::from_secs(60 * parse_or::<u64>(&var, "STUCK_TIMEOUT_MINUTES", 30)?),
            interview_ttl: Duration::from_secs(3600 * parse_or::<u64>(&var, "INTERVIEW_TTL_HOURS", 72)?),
            interviews_enabled: parse_bool(&var, "INTERVIEWS_ENABLED", true)?,
            human_wait_statuses,
            collaborators,
        })
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings::new(
            self.interviews_enabled,
            self.interview_ttl,
            self.stuck_timeout,
            self.human_wait_statuses.iter().copied(),
        )
    }

    pub fn worker_config(&self) -> JobWorkerConfig {
        JobWorkerConfig {
            concurrency: self.worker_concurrency,
            poll_interval: self.worker_poll_interval,
            job_timeout: self.job_timeout,
            heartbeat_interval: heartbeat_for_lease(self.job_lease_ms),
            ..Default::default()
        }
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            eligibility_interval: self.eligibility_sweep_interval,
            stuck_interval: self.stuck_sweep_interval,
        }
    }
}

fn parse_or<T>(var: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match var(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} must be a valid number")),
        None => Ok(default),
    }
}

fn parse_bool(var: &impl Fn(&str) -> Option<String>, key: &str, default: bool) -> Result<bool> {
    match var(key).as_deref().map(str::trim) {
        None => Ok(default),
        Some("1") | Some("true") | Some("yes") | Some("on") => Ok(true),
        Some("0") | Some("false") | Some("no") | Some("off") => Ok(false),
        Some(other) => anyhow::bail!("{key} must be a boolean, got {other:?}"),
    }
}

/// Comma-separated status names. Empty entries are ignored.
fn parse_status_list(raw: &str) -> Result<Vec<ApplicationStatus>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<ApplicationStatus>()
                .with_context(|| format!("HUMAN_WAIT_STATUSES contains unknown status {s:?}"))
        })
        .collect()
}

/// Extend the lease three times per lease period so one missed heartbeat
/// never lets another worker reclaim a live job.
fn heartbeat_for_lease(lease_ms: i64) -> Duration {
    Duration::from_millis((lease_ms / 3).max(1) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn database_url_is_required() {
        let err = load(&[]).unwrap_err();
        assert!(err.to_string().contains("DATABASE_URL"));
    }

    #[test]
    fn defaults_apply() {
        let config = load(&[("DATABASE_URL", "postgres://db/screening")]).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.worker_concurrency, 4);
        assert_eq!(config.job_lease_ms, 300_000);
        assert_eq!(config.job_timeout, None);
        assert_eq!(config.stuck_timeout, Duration::from_secs(1800));
        assert_eq!(config.interview_ttl, Duration::from_secs(72 * 3600));
        assert!(config.interviews_enabled);
        assert_eq!(
            config.human_wait_statuses,
            vec![ApplicationStatus::LiveInterviewPending]
        );
    }

    #[test]
    fn overrides_parse() {
        let config = load(&[
            ("DATABASE_URL", "postgres://db/screening"),
            ("PORT", "9000"),
            ("WORKER_CONCURRENCY", "8"),
            ("JOB_TIMEOUT_SECS", "45"),
            ("INTERVIEWS_ENABLED", "false"),
            ("STUCK_TIMEOUT_MINUTES", "5"),
        ])
        .unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.worker_concurrency, 8);
        assert_eq!(config.job_timeout, Some(Duration::from_secs(45)));
        assert!(!config.interviews_enabled);
        assert_eq!(config.stuck_timeout, Duration::from_secs(300));
        assert_eq!(config.worker_config().concurrency, 8);
    }

    #[test]
    fn heartbeat_follows_the_lease() {
        let config = load(&[("DATABASE_URL", "x")]).unwrap();
        assert_eq!(config.worker_config().heartbeat_interval, Duration::from_secs(100));

        let config = load(&[("DATABASE_URL", "x"), ("JOB_LEASE_MS", "15000")]).unwrap();
        let worker = config.worker_config();
        assert_eq!(worker.heartbeat_interval, Duration::from_secs(5));
        assert!(worker.heartbeat_interval * 2 < Duration::from_millis(15_000));
    }

    #[test]
    fn lease_shorter_than_the_minimum_is_rejected() {
        let err = load(&[("DATABASE_URL", "x"), ("JOB_LEASE_MS", "500")]).unwrap_err();
        assert!(err.to_string().contains("JOB_LEASE_MS"), "{err}");
    }

    #[test]
    fn bad_number_names_the_variable() {
        let err = load(&[("DATABASE_URL", "x"), ("PORT", "eighty")]).unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }

    #[test]
    fn human_wait_list_is_unioned_with_required_statuses() {
        let config = load(&[
            ("DATABASE_URL", "x"),
            ("HUMAN_WAIT_STATUSES", " interview_expired, ,on_hold"),
        ])
        .unwrap();
        let settings = config.pipeline_settings();
        for required in ApplicationStatus::REQUIRED_HUMAN_WAIT {
            assert!(settings.human_wait_statuses().contains(&required));
        }
        assert!(settings
            .human_wait_statuses()
            .contains(&ApplicationStatus::InterviewExpired));
    }

    #[test]
    fn unknown_human_wait_status_is_rejected() {
        let err = load(&[("DATABASE_URL", "x"), ("HUMAN_WAIT_STATUSES", "lunch")]).unwrap_err();
        assert!(err.to_string().contains("lunch"));
    }

    #[test]
    fn empty_human_wait_list_keeps_required_statuses() {
        let config = load(&[("DATABASE_URL", "x"), ("HUMAN_WAIT_STATUSES", "")]).unwrap();
        assert!(config.human_wait_statuses.is_empty());
        assert_eq!(config.pipeline_settings().human_wait_statuses().len(), 3);
    }
}
