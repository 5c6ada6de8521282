use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::time::Duration;
use chrono::{FixedOffset, NaiveTime, Offset, Utc};
use reqwest::Url;
use crate::config::env::*;
use crate::scheduler::DailyTrigger;

fn default_reminder_time() -> NaiveTime {
    NaiveTime::from_hms_opt(9, 0, 0).unwrap_or_default()
}

#[derive(Clone)]
#[cfg_attr(test, derive(Default))]
pub struct AppConfig {
    pub reminders: RemindersConfig,
    pub ack_retry_attempts: u32,
}

#[derive(Clone, Copy, Debug)]
pub struct RemindersConfig {
    pub trigger: DailyTrigger,
    pub poll_interval: Duration,
    pub restore_on_startup: bool,
}

impl Default for RemindersConfig {
    fn default() -> Self {
        Self {
            trigger: DailyTrigger::new(default_reminder_time(), Utc.fix()),
            poll_interval: Duration::from_secs(60),
            restore_on_startup: true,
        }
    }
}

#[derive(Clone)]
pub struct DatabaseConfig {
    pub url: Url,
    pub max_connections: u32,
    pub timeout: Duration,
}

/// Wall-clock time of the day in the `HH:MM` or `HH:MM:SS` format.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ReminderTime(pub NaiveTime);

impl FromStr for ReminderTime {
    type Err = chrono::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NaiveTime::parse_from_str(s, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
            .map(Self)
    }
}

impl Display for ReminderTime {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.format("%H:%M"))
    }
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let reminder_time = get_env_value_or_default("REMINDER_TIME", ReminderTime(default_reminder_time()));
        let offset_minutes: i32 = get_env_value_or_default("REMINDER_UTC_OFFSET_MINUTES", 0);
        let offset = offset_minutes.checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| anyhow::anyhow!("REMINDER_UTC_OFFSET_MINUTES is out of range: {offset_minutes}"))?;
        let poll_interval_secs = get_env_value_or_default("SCHEDULER_POLL_INTERVAL_SECS", 60);
        let restore_on_startup = get_env_value_or_default("RESTORE_REMINDERS_ON_STARTUP", true);
        let ack_retry_attempts = get_env_value_or_default("ACK_RETRY_ATTEMPTS", 3);
        Ok(Self {
            reminders: RemindersConfig {
                trigger: DailyTrigger::new(reminder_time.0, offset),
                poll_interval: Duration::from_secs(poll_interval_secs),
                restore_on_startup,
            },
            ack_retry_attempts,
        })
    }
}

impl DatabaseConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            url: get_env_mandatory_value("DATABASE_URL")?,
            max_connections: get_env_value_or_default("DATABASE_MAX_CONNECTIONS", 10),
            timeout: Duration::from_secs(get_env_value_or_default("DATABASE_TIMEOUT_SECS", 10)),
        })
    }
}
