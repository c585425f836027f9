//! Account-manager payout lifecycle
//!
//! Payouts are created `pending` by the aggregation job and advanced by an
//! admin: pending -> approved (records approver and time) -> paid (records
//! time). Each step is a compare-and-set on the current status, so two
//! admins racing on the same payout cannot both succeed.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::models::activity::PeriodAggregate;
use crate::models::payout::{Payout, PayoutFilter, PayoutStatus, PeriodType};
use crate::storage::{PayoutStore, StoreError};

#[derive(Debug, Error)]
pub enum PayoutError {
    #[error("payout {0} not found")]
    NotFound(Uuid),
    #[error("payout {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: Uuid,
        from: PayoutStatus,
        to: PayoutStatus,
    },
    #[error("a {period_type} payout starting {period_start} already exists for user {user_id}")]
    AlreadyExists {
        user_id: Uuid,
        period_type: PeriodType,
        period_start: chrono::NaiveDate,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl PayoutError {
    pub fn code(&self) -> &'static str {
        match self {
            PayoutError::NotFound(_) => "PAYOUT_NOT_FOUND",
            PayoutError::InvalidTransition { .. } => "INVALID_TRANSITION",
            PayoutError::AlreadyExists { .. } => "PAYOUT_EXISTS",
            PayoutError::Store(_) => "STORE_ERROR",
        }
    }
}

pub struct PayoutService {
    store: Arc<dyn PayoutStore>,
}

impl PayoutService {
    pub fn new(store: Arc<dyn PayoutStore>) -> Self {
        Self { store }
    }

    /// Persist a period aggregate as a `pending` payout
    pub async fn create_pending(
        &self,
        user_id: Uuid,
        aggregate: PeriodAggregate,
    ) -> Result<Payout, PayoutError> {
        let (period_type, period_start) = (aggregate.period_type, aggregate.period_start);
        match self.store.insert_payout(aggregate.into_new_payout(user_id)).await {
            Ok(payout) => {
                info!(
                    payout_id = %payout.id,
                    user_id = %user_id,
                    period_type = %period_type,
                    period_start = %period_start,
                    total_amount = %payout.total_amount,
                    "Created pending payout"
                );
                Ok(payout)
            }
            Err(StoreError::UniqueViolation(_)) => Err(PayoutError::AlreadyExists {
                user_id,
                period_type,
                period_start,
            }),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get(&self, id: Uuid) -> Result<Payout, PayoutError> {
        self.store
            .get_payout(id)
            .await?
            .ok_or(PayoutError::NotFound(id))
    }

    pub async fn list(&self, filter: PayoutFilter) -> Result<Vec<Payout>, PayoutError> {
        Ok(self.store.list_payouts(filter).await?)
    }

    /// Sum of `total_amount` over `payouts`
    pub fn total(payouts: &[Payout]) -> Decimal {
        payouts.iter().map(|p| p.total_amount).sum()
    }

    pub async fn approve(&self, id: Uuid, approver_id: Uuid) -> Result<Payout, PayoutError> {
        let payout = self
            .advance(id, PayoutStatus::Pending, PayoutStatus::Approved, Some(approver_id))
            .await?;
        info!(payout_id = %id, approver_id = %approver_id, "Payout approved");
        Ok(payout)
    }

    pub async fn mark_paid(&self, id: Uuid) -> Result<Payout, PayoutError> {
        let payout = self
            .advance(id, PayoutStatus::Approved, PayoutStatus::Paid, None)
            .await?;
        info!(payout_id = %id, total_amount = %payout.total_amount, "Payout marked paid");
        Ok(payout)
    }

    async fn advance(
        &self,
        id: Uuid,
        from: PayoutStatus,
        to: PayoutStatus,
        approved_by: Option<Uuid>,
    ) -> Result<Payout, PayoutError> {
        debug_assert!(from.can_transition_to(to));

        if let Some(updated) = self
            .store
            .transition(id, from, to, approved_by, Utc::now())
            .await?
        {
            return Ok(updated);
        }

        // Nothing moved: either the payout is missing or it is in another status
        let current = self.get(id).await?;
        Err(PayoutError::InvalidTransition {
            id,
            from: current.status,
            to,
        })
    }
}
