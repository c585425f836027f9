//! Runtime configuration
//!
//! Every rate, cap and target is read once at startup and passed explicitly
//! into the components that need it. A missing or non-positive rate or cap is
//! a fatal [`ConfigError`]; there are no silent defaults for CPM or
//! account-manager money values. Creator contract fees default to the
//! published contract terms and may be overridden.

use rust_decimal::Decimal;
use std::str::FromStr;
use thiserror::Error;

pub const ENV_DATABASE_URL: &str = "DATABASE_URL";
pub const ENV_BIND_ADDR: &str = "BIND_ADDR";
pub const ENV_CPM_RATE: &str = "CPM_RATE_PER_THOUSAND";
pub const ENV_POST_CAP: &str = "CPM_POST_LIFETIME_CAP";
pub const ENV_MONTHLY_CAP: &str = "CPM_USER_MONTHLY_CAP";
pub const ENV_CPM_WINDOW_DAYS: &str = "CPM_WINDOW_DAYS";
pub const ENV_DAILY_POST_TARGET: &str = "AM_DAILY_POST_TARGET";
pub const ENV_WEEKLY_BONUS: &str = "AM_WEEKLY_BONUS_AMOUNT";
pub const ENV_MONTHLY_BONUS: &str = "AM_MONTHLY_BONUS_AMOUNT";
pub const ENV_CPM_SYNC_INTERVAL: &str = "CPM_LEDGER_SYNC_INTERVAL_SECS";
pub const ENV_PAYOUT_SYNC_INTERVAL: &str = "AM_PAYOUT_SYNC_INTERVAL_SECS";
pub const ENV_CPM_SYNC_DRY_RUN: &str = "CPM_LEDGER_SYNC_DRY_RUN";
pub const ENV_CPM_SYNC_CONCURRENCY: &str = "CPM_SYNC_CONCURRENCY";
pub const ENV_CREATOR_VIDEO_FEE: &str = "UGC_OPTION1_FEE_PER_VIDEO";
pub const ENV_CREATOR_SLIDESHOW_FEE: &str = "UGC_OPTION1_FEE_PER_SLIDESHOW";
pub const ENV_CREATOR_MONTHLY_FEE: &str = "UGC_OPTION2_MONTHLY_FEE";
pub const ENV_CREATOR_POST_TARGET: &str = "UGC_MONTHLY_POST_TARGET";

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
/// Posts earn CPM for 4 weeks after submission
const DEFAULT_CPM_WINDOW_DAYS: u32 = 28;
const DEFAULT_SYNC_INTERVAL_SECS: u64 = 86400;
const DEFAULT_CPM_SYNC_CONCURRENCY: usize = 8;
const DEFAULT_CREATOR_VIDEO_FEE: Decimal = Decimal::from_parts(3125, 0, 0, false, 3);
const DEFAULT_CREATOR_SLIDESHOW_FEE: Decimal = Decimal::ONE;
const DEFAULT_CREATOR_MONTHLY_FEE: Decimal = Decimal::from_parts(500, 0, 0, false, 0);
const DEFAULT_CREATOR_POST_TARGET: u32 = 96;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{key} has invalid value '{value}': {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// CPM accrual parameters
#[derive(Debug, Clone, PartialEq)]
pub struct CpmConfig {
    /// Dollars per 1,000 views
    pub rate_per_thousand: Decimal,
    /// Maximum dollars a single post may ever earn
    pub post_lifetime_cap: Decimal,
    /// Maximum dollars a user may earn per UTC calendar month
    pub user_monthly_cap: Decimal,
    /// Days after submission during which a post accrues CPM
    pub window_days: u32,
}

impl CpmConfig {
    pub fn new(
        rate_per_thousand: Decimal,
        post_lifetime_cap: Decimal,
        user_monthly_cap: Decimal,
        window_days: u32,
    ) -> Result<Self, ConfigError> {
        ensure_positive(ENV_CPM_RATE, rate_per_thousand)?;
        ensure_positive(ENV_POST_CAP, post_lifetime_cap)?;
        ensure_positive(ENV_MONTHLY_CAP, user_monthly_cap)?;
        if window_days == 0 {
            return Err(ConfigError::Invalid {
                key: ENV_CPM_WINDOW_DAYS,
                value: "0".to_string(),
                reason: "must be positive".to_string(),
            });
        }

        Ok(Self {
            rate_per_thousand,
            post_lifetime_cap,
            user_monthly_cap,
            window_days,
        })
    }
}

/// Account-manager pay parameters
#[derive(Debug, Clone, PartialEq)]
pub struct AccountManagerConfig {
    /// Posts per day per account pair for a day to count as hit
    pub daily_post_target: u32,
    /// Weekly attendance bonus per account pair
    pub weekly_bonus_amount: Decimal,
    /// Monthly attendance bonus per account pair
    pub monthly_bonus_amount: Decimal,
}

impl AccountManagerConfig {
    pub fn new(
        daily_post_target: u32,
        weekly_bonus_amount: Decimal,
        monthly_bonus_amount: Decimal,
    ) -> Result<Self, ConfigError> {
        if daily_post_target == 0 {
            return Err(ConfigError::Invalid {
                key: ENV_DAILY_POST_TARGET,
                value: "0".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        ensure_positive(ENV_WEEKLY_BONUS, weekly_bonus_amount)?;
        ensure_positive(ENV_MONTHLY_BONUS, monthly_bonus_amount)?;

        Ok(Self {
            daily_post_target,
            weekly_bonus_amount,
            monthly_bonus_amount,
        })
    }
}

/// Creator contract terms
#[derive(Debug, Clone, PartialEq)]
pub struct CreatorPayoutConfig {
    /// Option 1 fee per approved UGC video
    pub fee_per_video: Decimal,
    /// Option 1 fee per approved slideshow
    pub fee_per_slideshow: Decimal,
    /// Option 2 flat monthly fee
    pub monthly_fee: Decimal,
    /// Approved posts per month before a payout can be claimed
    pub monthly_post_target: u32,
}

impl CreatorPayoutConfig {
    pub fn new(
        fee_per_video: Decimal,
        fee_per_slideshow: Decimal,
        monthly_fee: Decimal,
        monthly_post_target: u32,
    ) -> Result<Self, ConfigError> {
        ensure_positive(ENV_CREATOR_VIDEO_FEE, fee_per_video)?;
        ensure_positive(ENV_CREATOR_SLIDESHOW_FEE, fee_per_slideshow)?;
        ensure_positive(ENV_CREATOR_MONTHLY_FEE, monthly_fee)?;

        Ok(Self {
            fee_per_video,
            fee_per_slideshow,
            monthly_fee,
            monthly_post_target,
        })
    }
}

impl Default for CreatorPayoutConfig {
    fn default() -> Self {
        Self {
            fee_per_video: DEFAULT_CREATOR_VIDEO_FEE,
            fee_per_slideshow: DEFAULT_CREATOR_SLIDESHOW_FEE,
            monthly_fee: DEFAULT_CREATOR_MONTHLY_FEE,
            monthly_post_target: DEFAULT_CREATOR_POST_TARGET,
        }
    }
}

/// Background job scheduling
#[derive(Debug, Clone, PartialEq)]
pub struct JobConfig {
    pub cpm_sync_interval_secs: u64,
    pub payout_sync_interval_secs: u64,
    /// Log what the ledger job would do without writing rows
    pub cpm_sync_dry_run: bool,
    /// Users processed in parallel by one ledger batch
    pub cpm_sync_concurrency: usize,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            cpm_sync_interval_secs: DEFAULT_SYNC_INTERVAL_SECS,
            payout_sync_interval_secs: DEFAULT_SYNC_INTERVAL_SECS,
            cpm_sync_dry_run: false,
            cpm_sync_concurrency: DEFAULT_CPM_SYNC_CONCURRENCY,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub database_url: String,
    pub bind_addr: String,
    pub cpm: CpmConfig,
    pub account_manager: AccountManagerConfig,
    pub creator_payouts: CreatorPayoutConfig,
    pub jobs: JobConfig,
}

impl AppConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = required(&lookup, ENV_DATABASE_URL)?;
        let bind_addr = lookup(ENV_BIND_ADDR).unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());

        let cpm = cpm_from_lookup(&lookup)?;

        let account_manager = AccountManagerConfig::new(
            parse_required(&lookup, ENV_DAILY_POST_TARGET)?,
            parse_required(&lookup, ENV_WEEKLY_BONUS)?,
            parse_required(&lookup, ENV_MONTHLY_BONUS)?,
        )?;

        let contract = CreatorPayoutConfig::default();
        let creator_payouts = CreatorPayoutConfig::new(
            parse_optional(&lookup, ENV_CREATOR_VIDEO_FEE)?.unwrap_or(contract.fee_per_video),
            parse_optional(&lookup, ENV_CREATOR_SLIDESHOW_FEE)?
                .unwrap_or(contract.fee_per_slideshow),
            parse_optional(&lookup, ENV_CREATOR_MONTHLY_FEE)?.unwrap_or(contract.monthly_fee),
            parse_optional(&lookup, ENV_CREATOR_POST_TARGET)?
                .unwrap_or(contract.monthly_post_target),
        )?;

        let defaults = JobConfig::default();
        let jobs = JobConfig {
            cpm_sync_interval_secs: interval_secs(&lookup, ENV_CPM_SYNC_INTERVAL)?
                .unwrap_or(defaults.cpm_sync_interval_secs),
            payout_sync_interval_secs: interval_secs(&lookup, ENV_PAYOUT_SYNC_INTERVAL)?
                .unwrap_or(defaults.payout_sync_interval_secs),
            cpm_sync_dry_run: lookup(ENV_CPM_SYNC_DRY_RUN)
                .map(|v| v.to_lowercase() == "true")
                .unwrap_or(defaults.cpm_sync_dry_run),
            cpm_sync_concurrency: parse_optional::<usize, _>(&lookup, ENV_CPM_SYNC_CONCURRENCY)?
                .unwrap_or(defaults.cpm_sync_concurrency)
                .max(1),
        };

        Ok(Self {
            database_url,
            bind_addr,
            cpm,
            account_manager,
            creator_payouts,
            jobs,
        })
    }
}

/// Load only the CPM section, for tools that never touch payouts
pub fn cpm_from_env() -> Result<CpmConfig, ConfigError> {
    cpm_from_lookup(&|key: &str| std::env::var(key).ok())
}

fn cpm_from_lookup<F>(lookup: &F) -> Result<CpmConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    CpmConfig::new(
        parse_required(lookup, ENV_CPM_RATE)?,
        parse_required(lookup, ENV_POST_CAP)?,
        parse_required(lookup, ENV_MONTHLY_CAP)?,
        parse_optional(lookup, ENV_CPM_WINDOW_DAYS)?.unwrap_or(DEFAULT_CPM_WINDOW_DAYS),
    )
}

fn required<F>(lookup: &F, key: &'static str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
        _ => Err(ConfigError::Missing(key)),
    }
}

fn parse_required<T, F>(lookup: &F, key: &'static str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    let raw = required(lookup, key)?;
    raw.parse::<T>().map_err(|e| ConfigError::Invalid {
        key,
        value: raw.clone(),
        reason: e.to_string(),
    })
}

fn parse_optional<T, F>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => {
            raw.trim()
                .parse::<T>()
                .map(Some)
                .map_err(|e| ConfigError::Invalid {
                    key,
                    value: raw.clone(),
                    reason: e.to_string(),
                })
        }
        _ => Ok(None),
    }
}

/// A job interval; zero would spin the scheduler
fn interval_secs<F>(lookup: &F, key: &'static str) -> Result<Option<u64>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let secs = parse_optional::<u64, _>(lookup, key)?;
    if secs == Some(0) {
        return Err(ConfigError::Invalid {
            key,
            value: "0".to_string(),
            reason: "must be positive".to_string(),
        });
    }
    Ok(secs)
}

fn ensure_positive(key: &'static str, value: Decimal) -> Result<(), ConfigError> {
    if value <= Decimal::ZERO {
        return Err(ConfigError::Invalid {
            key,
            value: value.to_string(),
            reason: "must be positive".to_string(),
        });
    }
    Ok(())
}
