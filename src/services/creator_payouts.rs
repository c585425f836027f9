//! Monthly creator payouts
//!
//! A creator's month is paid according to their contract:
//!
//! - `option1`: a fixed fee per approved UGC video and per approved
//!   slideshow created in the month, plus the CPM the ledger credited
//! - `option2`: a flat monthly fee; CPM is not paid
//! - no contract: CPM only
//!
//! Rows are refreshed from the ledger while `pending` and frozen once an
//! admin approves them. The lifecycle is the same as account-manager
//! payouts: pending -> approved -> paid.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::CreatorPayoutConfig;
use crate::models::creator_payout::{
    ContractOption, CreatorPayout, CreatorPayoutDraft, CreatorPayoutFilter, CreatorProfile,
    MonthlyEarnings,
};
use crate::models::post::ContentType;
use crate::models::payout::PayoutStatus;
use crate::services::calendar::{YearMonth, day_end, day_start};
use crate::services::cpm_calculator::round_currency;
use crate::services::payouts::PayoutError;
use crate::storage::{CreatorPayoutStore, LedgerStore, PostRepository, StoreError};

/// Approved posts a creator had created in a month, by content type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApprovedPostCounts {
    pub videos: i32,
    pub slideshows: i32,
}

impl ApprovedPostCounts {
    pub fn total(&self) -> i32 {
        self.videos + self.slideshows
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshReport {
    pub month: Option<YearMonth>,
    pub created: usize,
    pub updated: usize,
    /// Approved or paid rows left untouched
    pub frozen: usize,
    /// Users without the creator role
    pub skipped: usize,
}

/// Compute a creator's month from ledger sums and approved post counts
pub fn compute_draft(
    config: &CreatorPayoutConfig,
    user_id: Uuid,
    period: YearMonth,
    earnings: &MonthlyEarnings,
    counts: ApprovedPostCounts,
    profile: CreatorProfile,
) -> CreatorPayoutDraft {
    let (base_amount, cpm_amount) = match profile.contract_option {
        Some(ContractOption::Option1) => {
            let fees = config.fee_per_video * Decimal::from(counts.videos)
                + config.fee_per_slideshow * Decimal::from(counts.slideshows);
            (round_currency(fees), earnings.cpm_earned)
        }
        Some(ContractOption::Option2) => (config.monthly_fee, Decimal::ZERO),
        None => (Decimal::ZERO, earnings.cpm_earned),
    };

    let target = i32::try_from(config.monthly_post_target).unwrap_or(i32::MAX);
    let approved = counts.total();

    CreatorPayoutDraft {
        user_id,
        period,
        contract_option: profile.contract_option,
        posts_count: i32::try_from(earnings.posts).unwrap_or(i32::MAX),
        approved_posts_count: approved,
        posts_missing: (target - approved).max(0),
        can_claim: approved >= target,
        total_views: earnings.views_delta,
        base_amount,
        cpm_amount,
        total_amount: base_amount + cpm_amount,
        paypal_info: profile.paypal_info,
    }
}

pub struct CreatorPayoutService {
    store: Arc<dyn CreatorPayoutStore>,
    ledger: Arc<dyn LedgerStore>,
    posts: Arc<dyn PostRepository>,
    config: CreatorPayoutConfig,
}

impl CreatorPayoutService {
    pub fn new(
        store: Arc<dyn CreatorPayoutStore>,
        ledger: Arc<dyn LedgerStore>,
        posts: Arc<dyn PostRepository>,
        config: CreatorPayoutConfig,
    ) -> Self {
        Self {
            store,
            ledger,
            posts,
            config,
        }
    }

    /// Recompute every creator's payout for `month`.
    ///
    /// A creator is included once the ledger credited them anything in the
    /// month, or when a payout row already exists.
    pub async fn refresh_month(&self, month: YearMonth) -> Result<RefreshReport, StoreError> {
        let earnings: BTreeMap<Uuid, MonthlyEarnings> = self
            .ledger
            .monthly_user_totals(month)
            .await?
            .into_iter()
            .map(|e| (e.user_id, e))
            .collect();

        let existing: HashMap<Uuid, CreatorPayout> = self
            .store
            .list_creator_payouts(CreatorPayoutFilter {
                year: Some(month.year()),
                month: Some(month.month()),
                ..Default::default()
            })
            .await?
            .into_iter()
            .map(|p| (p.user_id, p))
            .collect();

        let users: BTreeSet<Uuid> = earnings
            .values()
            .filter(|e| e.cpm_earned > Decimal::ZERO)
            .map(|e| e.user_id)
            .chain(existing.keys().copied())
            .collect();

        let counts = self.approved_post_counts(month).await?;
        let mut report = RefreshReport {
            month: Some(month),
            ..Default::default()
        };

        for user_id in users {
            if let Some(payout) = existing.get(&user_id)
                && payout.status != PayoutStatus::Pending
            {
                report.frozen += 1;
                continue;
            }

            let Some(profile) = self.posts.creator_profile(user_id).await? else {
                debug!(user_id = %user_id, "Not a creator, skipping payout");
                report.skipped += 1;
                continue;
            };

            let empty = MonthlyEarnings {
                user_id,
                cpm_earned: Decimal::ZERO,
                views_delta: 0,
                posts: 0,
            };
            let draft = compute_draft(
                &self.config,
                user_id,
                month,
                earnings.get(&user_id).unwrap_or(&empty),
                counts.get(&user_id).copied().unwrap_or_default(),
                profile,
            );

            match existing.get(&user_id) {
                Some(payout) => {
                    match self.store.update_pending_creator_payout(payout.id, draft).await? {
                        Some(_) => report.updated += 1,
                        // Approved between the read and the write
                        None => report.frozen += 1,
                    }
                }
                None => match self.store.insert_creator_payout(draft).await {
                    Ok(payout) => {
                        info!(
                            payout_id = %payout.id,
                            user_id = %user_id,
                            period = %month,
                            total_amount = %payout.total_amount,
                            "Created pending creator payout"
                        );
                        report.created += 1;
                    }
                    Err(StoreError::UniqueViolation(_)) => {
                        warn!(user_id = %user_id, period = %month, "Creator payout created concurrently");
                        report.frozen += 1;
                    }
                    Err(e) => return Err(e),
                },
            }
        }

        Ok(report)
    }

    async fn approved_post_counts(
        &self,
        month: YearMonth,
    ) -> Result<HashMap<Uuid, ApprovedPostCounts>, StoreError> {
        let posts = self
            .posts
            .approved_posts_created_between(day_start(month.first_day()), day_end(month.last_day()))
            .await?;

        let mut counts: HashMap<Uuid, ApprovedPostCounts> = HashMap::new();
        for post in posts {
            let entry = counts.entry(post.submitted_by).or_default();
            match post.content_type {
                ContentType::Slideshow => entry.slideshows += 1,
                ContentType::UgcVideo => entry.videos += 1,
            }
        }
        Ok(counts)
    }

    pub async fn get(&self, id: Uuid) -> Result<CreatorPayout, PayoutError> {
        self.store
            .get_creator_payout(id)
            .await?
            .ok_or(PayoutError::NotFound(id))
    }

    pub async fn list(&self, filter: CreatorPayoutFilter) -> Result<Vec<CreatorPayout>, PayoutError> {
        Ok(self.store.list_creator_payouts(filter).await?)
    }

    pub fn total(payouts: &[CreatorPayout]) -> Decimal {
        payouts.iter().map(|p| p.total_amount).sum()
    }

    pub async fn approve(&self, id: Uuid, approver_id: Uuid) -> Result<CreatorPayout, PayoutError> {
        let payout = self
            .advance(id, PayoutStatus::Pending, PayoutStatus::Approved, Some(approver_id))
            .await?;
        info!(payout_id = %id, approver_id = %approver_id, "Creator payout approved");
        Ok(payout)
    }

    pub async fn mark_paid(&self, id: Uuid) -> Result<CreatorPayout, PayoutError> {
        let payout = self
            .advance(id, PayoutStatus::Approved, PayoutStatus::Paid, None)
            .await?;
        info!(payout_id = %id, total_amount = %payout.total_amount, "Creator payout marked paid");
        Ok(payout)
    }

    async fn advance(
        &self,
        id: Uuid,
        from: PayoutStatus,
        to: PayoutStatus,
        approved_by: Option<Uuid>,
    ) -> Result<CreatorPayout, PayoutError> {
        debug_assert!(from.can_transition_to(to));

        if let Some(updated) = self
            .store
            .transition_creator_payout(id, from, to, approved_by, Utc::now())
            .await?
        {
            return Ok(updated);
        }

        let current = self.get(id).await?;
        Err(PayoutError::InvalidTransition {
            id,
            from: current.status,
            to,
        })
    }
}
