//! Monthly creator payout models for the `/api/creators/payouts` endpoints

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::ugc_creator_payouts;
use crate::models::payout::PayoutStatus;
use crate::services::calendar::YearMonth;

/// Contract a creator signed
///
/// - `option1`: a fixed fee per approved post plus CPM
/// - `option2`: a flat monthly fee, no CPM
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContractOption {
    Option1,
    Option2,
}

impl std::fmt::Display for ContractOption {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContractOption::Option1 => write!(f, "option1"),
            ContractOption::Option2 => write!(f, "option2"),
        }
    }
}

impl std::str::FromStr for ContractOption {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "option1" => Ok(ContractOption::Option1),
            "option2" => Ok(ContractOption::Option2),
            _ => Err(format!("Unknown contract option: {}", s)),
        }
    }
}

/// Contract details of a creator account
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CreatorProfile {
    pub contract_option: Option<ContractOption>,
    pub paypal_info: Option<String>,
}

/// Ledger sums for one user over one month
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthlyEarnings {
    pub user_id: Uuid,
    pub cpm_earned: Decimal,
    pub views_delta: i64,
    /// Distinct posts with at least one row in the month
    pub posts: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatorPayout {
    pub id: Uuid,
    pub user_id: Uuid,
    pub period: YearMonth,
    pub contract_option: Option<ContractOption>,
    pub posts_count: i32,
    pub approved_posts_count: i32,
    pub posts_missing: i32,
    pub can_claim: bool,
    pub total_views: i64,
    pub base_amount: Decimal,
    pub cpm_amount: Decimal,
    pub total_amount: Decimal,
    pub paypal_info: Option<String>,
    pub status: PayoutStatus,
    pub approved_by: Option<Uuid>,
    pub approved_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<ugc_creator_payouts::Model> for CreatorPayout {
    type Error = String;

    fn try_from(model: ugc_creator_payouts::Model) -> Result<Self, Self::Error> {
        let month = u32::try_from(model.period_month)
            .map_err(|_| format!("Invalid period month {}", model.period_month))?;
        let period = YearMonth::new(model.period_year, month)
            .ok_or_else(|| format!("Invalid period {}-{}", model.period_year, month))?;

        Ok(Self {
            id: model.id,
            user_id: model.user_id,
            period,
            contract_option: model
                .contract_option
                .as_deref()
                .map(str::parse::<ContractOption>)
                .transpose()?,
            posts_count: model.posts_count,
            approved_posts_count: model.approved_posts_count,
            posts_missing: model.posts_missing,
            can_claim: model.can_claim,
            total_views: model.total_views,
            base_amount: model.base_amount,
            cpm_amount: model.cpm_amount,
            total_amount: model.total_amount,
            paypal_info: model.paypal_info,
            status: model.status.parse()?,
            approved_by: model.approved_by,
            approved_at: model.approved_at.map(|t| t.with_timezone(&Utc)),
            paid_at: model.paid_at.map(|t| t.with_timezone(&Utc)),
            created_at: model.created_at.with_timezone(&Utc),
            updated_at: model.updated_at.with_timezone(&Utc),
        })
    }
}

/// Freshly computed amounts for a (creator, month)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatorPayoutDraft {
    pub user_id: Uuid,
    pub period: YearMonth,
    pub contract_option: Option<ContractOption>,
    pub posts_count: i32,
    pub approved_posts_count: i32,
    pub posts_missing: i32,
    pub can_claim: bool,
    pub total_views: i64,
    pub base_amount: Decimal,
    pub cpm_amount: Decimal,
    pub total_amount: Decimal,
    pub paypal_info: Option<String>,
}

/// GET /api/creators/payouts query parameters
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreatorPayoutQuery {
    pub status: Option<String>,
    pub year: Option<i32>,
    pub month: Option<u32>,
    pub user_id: Option<Uuid>,
}

/// Parsed form of [`CreatorPayoutQuery`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CreatorPayoutFilter {
    pub status: Option<PayoutStatus>,
    pub year: Option<i32>,
    pub month: Option<u32>,
    pub user_id: Option<Uuid>,
}

impl CreatorPayoutFilter {
    pub fn matches(&self, payout: &CreatorPayout) -> bool {
        self.status.is_none_or(|s| s == payout.status)
            && self.year.is_none_or(|y| y == payout.period.year())
            && self.month.is_none_or(|m| m == payout.period.month())
            && self.user_id.is_none_or(|u| u == payout.user_id)
    }
}

impl CreatorPayoutQuery {
    pub fn validate(&self) -> Result<CreatorPayoutFilter, String> {
        let status = self
            .status
            .as_deref()
            .map(str::parse::<PayoutStatus>)
            .transpose()?;
        if let Some(month) = self.month {
            if !(1..=12).contains(&month) {
                return Err(format!("month must be 1-12, got {}", month));
            }
        }

        Ok(CreatorPayoutFilter {
            status,
            year: self.year,
            month: self.month,
            user_id: self.user_id,
        })
    }
}

/// POST /api/creators/payouts/refresh body
#[derive(Debug, Clone, Deserialize)]
pub struct RefreshRequest {
    /// Calendar month as YYYY-MM
    pub month: YearMonth,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatorPayoutListResponse {
    pub payouts: Vec<CreatorPayout>,
    pub total_amount: Decimal,
}
