//! Account-manager posting activity views

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::payout::{NewPayout, PeriodType};

/// Dashboard view of an account manager's current day, week and month
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmStats {
    pub posts_today: u32,
    pub daily_target: u32,
    pub daily_earnings: Decimal,
    pub days_hit_this_week: u32,
    pub weekly_base: Decimal,
    pub weekly_bonus: Decimal,
    pub weekly_total: Decimal,
    pub weeks_hit_this_month: u32,
    pub monthly_base: Decimal,
    pub monthly_bonus: Decimal,
    pub monthly_total: Decimal,
    /// Multiplier actually applied; 1 when a team filter is active
    pub account_pairs: u32,
}

/// Pay figures for one closed week or month
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodAggregate {
    pub period_type: PeriodType,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub posts_count: u32,
    pub days_hit: u32,
    pub weeks_hit: u32,
    pub base_amount: Decimal,
    pub bonus_amount: Decimal,
    pub total_amount: Decimal,
}

impl PeriodAggregate {
    pub fn into_new_payout(self, user_id: Uuid) -> NewPayout {
        NewPayout {
            user_id,
            period_type: self.period_type,
            period_start: self.period_start,
            period_end: self.period_end,
            posts_count: self.posts_count as i32,
            days_hit: self.days_hit as i32,
            weeks_hit: self.weeks_hit as i32,
            base_amount: self.base_amount,
            bonus_amount: self.bonus_amount,
            total_amount: self.total_amount,
        }
    }
}

/// GET /api/am/{user_id}/stats query parameters
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatsQuery {
    /// Restrict to a single team assignment (collapses the multiplier to 1)
    pub team_id: Option<Uuid>,
}
