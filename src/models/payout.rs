//! Account-manager payout models

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::account_manager_payouts;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodType {
    Weekly,
    Monthly,
}

impl std::fmt::Display for PeriodType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PeriodType::Weekly => write!(f, "weekly"),
            PeriodType::Monthly => write!(f, "monthly"),
        }
    }
}

impl std::str::FromStr for PeriodType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "weekly" => Ok(PeriodType::Weekly),
            "monthly" => Ok(PeriodType::Monthly),
            _ => Err(format!("Unknown period type: {}", s)),
        }
    }
}

/// Payout lifecycle: pending -> approved -> paid, never backwards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayoutStatus {
    Pending,
    Approved,
    Paid,
}

impl PayoutStatus {
    pub fn can_transition_to(&self, next: PayoutStatus) -> bool {
        matches!(
            (self, next),
            (PayoutStatus::Pending, PayoutStatus::Approved)
                | (PayoutStatus::Approved, PayoutStatus::Paid)
        )
    }
}

impl std::fmt::Display for PayoutStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PayoutStatus::Pending => write!(f, "pending"),
            PayoutStatus::Approved => write!(f, "approved"),
            PayoutStatus::Paid => write!(f, "paid"),
        }
    }
}

impl std::str::FromStr for PayoutStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(PayoutStatus::Pending),
            "approved" => Ok(PayoutStatus::Approved),
            "paid" => Ok(PayoutStatus::Paid),
            _ => Err(format!("Unknown payout status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payout {
    pub id: Uuid,
    pub user_id: Uuid,
    pub period_type: PeriodType,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub posts_count: i32,
    pub days_hit: i32,
    pub weeks_hit: i32,
    pub base_amount: Decimal,
    pub bonus_amount: Decimal,
    pub total_amount: Decimal,
    pub status: PayoutStatus,
    pub approved_by: Option<Uuid>,
    pub approved_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<account_manager_payouts::Model> for Payout {
    type Error = String;

    fn try_from(model: account_manager_payouts::Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: model.id,
            user_id: model.user_id,
            period_type: model.period_type.parse()?,
            period_start: model.period_start,
            period_end: model.period_end,
            posts_count: model.posts_count,
            days_hit: model.days_hit,
            weeks_hit: model.weeks_hit,
            base_amount: model.base_amount,
            bonus_amount: model.bonus_amount,
            total_amount: model.total_amount,
            status: model.status.parse()?,
            approved_by: model.approved_by,
            approved_at: model.approved_at.map(|t| t.with_timezone(&Utc)),
            paid_at: model.paid_at.map(|t| t.with_timezone(&Utc)),
            created_at: model.created_at.with_timezone(&Utc),
        })
    }
}

/// Insert shape for a freshly aggregated period; always starts `pending`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPayout {
    pub user_id: Uuid,
    pub period_type: PeriodType,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub posts_count: i32,
    pub days_hit: i32,
    pub weeks_hit: i32,
    pub base_amount: Decimal,
    pub bonus_amount: Decimal,
    pub total_amount: Decimal,
}

/// GET /api/am/payouts query parameters
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PayoutQuery {
    pub status: Option<String>,
    pub period_type: Option<String>,
    pub user_id: Option<Uuid>,
}

/// Parsed form of [`PayoutQuery`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PayoutFilter {
    pub status: Option<PayoutStatus>,
    pub period_type: Option<PeriodType>,
    pub user_id: Option<Uuid>,
}

impl PayoutFilter {
    pub fn matches(&self, payout: &Payout) -> bool {
        self.status.is_none_or(|s| s == payout.status)
            && self.period_type.is_none_or(|p| p == payout.period_type)
            && self.user_id.is_none_or(|u| u == payout.user_id)
    }
}

impl PayoutQuery {
    pub fn validate(&self) -> Result<PayoutFilter, String> {
        let status = self
            .status
            .as_deref()
            .map(str::parse::<PayoutStatus>)
            .transpose()?;
        let period_type = self
            .period_type
            .as_deref()
            .map(str::parse::<PeriodType>)
            .transpose()?;

        Ok(PayoutFilter {
            status,
            period_type,
            user_id: self.user_id,
        })
    }
}

/// POST /api/am/payouts/{id}/approve body
#[derive(Debug, Clone, Deserialize)]
pub struct ApproveRequest {
    pub approver_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayoutListResponse {
    pub payouts: Vec<Payout>,
    pub total_amount: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_forward_transitions_allowed() {
        use PayoutStatus::*;
        assert!(Pending.can_transition_to(Approved));
        assert!(Approved.can_transition_to(Paid));

        assert!(!Pending.can_transition_to(Paid));
        assert!(!Approved.can_transition_to(Pending));
        assert!(!Paid.can_transition_to(Approved));
        assert!(!Paid.can_transition_to(Pending));
        assert!(!Approved.can_transition_to(Approved));
    }

    #[test]
    fn test_query_validation() {
        let query = PayoutQuery {
            status: Some("Approved".to_string()),
            period_type: Some("weekly".to_string()),
            user_id: None,
        };
        let filter = query.validate().unwrap();
        assert_eq!(filter.status, Some(PayoutStatus::Approved));
        assert_eq!(filter.period_type, Some(PeriodType::Weekly));

        let bad = PayoutQuery {
            status: Some("refunded".to_string()),
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }
}
