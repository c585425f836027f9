//! PostgreSQL store implementations on top of sea-orm

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::sea_query::{Alias, Expr, OnConflict};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, DbBackend,
    EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set, Statement, TransactionTrait,
};
use uuid::Uuid;

use super::{
    BatchProgressStore, CreatorPayoutStore, FailedItem, LedgerStore, LedgerVersion, LedgerWrite,
    LedgerWriteOutcome, PayoutStore, PostRepository, StoreError,
};
use crate::entities::prelude::*;
use crate::entities::{
    account_manager_payouts, am_team_assignments, analytics, cpm_booked_days, cpm_failed_items,
    cpm_post_breakdown, posts, ugc_creator_payouts, users,
};
use crate::models::cpm::{LedgerRow, NewLedgerRow};
use crate::models::creator_payout::{
    ContractOption, CreatorPayout, CreatorPayoutDraft, CreatorPayoutFilter, CreatorProfile,
    MonthlyEarnings,
};
use crate::models::payout::{NewPayout, Payout, PayoutFilter, PayoutStatus};
use crate::models::post::{ContentType, PostRecord, PostStatus, TeamAssignment, ViewSnapshot};
use crate::services::calendar::YearMonth;

const ACCOUNT_MANAGER_ROLE: &str = "account_manager";
const CREATOR_ROLE: &str = "creator";

const USER_LEDGER_LOCK_SQL: &str = "SELECT pg_advisory_xact_lock(hashtext($1))";

#[derive(Clone)]
pub struct PgLedgerStore {
    db: DatabaseConnection,
}

impl PgLedgerStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn to_active_row(row: NewLedgerRow) -> cpm_post_breakdown::ActiveModel {
    cpm_post_breakdown::ActiveModel {
        post_id: Set(row.post_id),
        user_id: Set(row.user_id),
        date: Set(row.date),
        cumulative_views: Set(row.cumulative_views),
        reported_views: Set(row.reported_views),
        views_delta: Set(row.views_delta),
        cpm_earned: Set(row.cpm_earned),
        post_age_days: Set(row.post_age_days),
        cumulative_post_cpm: Set(row.cumulative_post_cpm),
        cumulative_user_monthly_cpm: Set(row.cumulative_user_monthly_cpm),
        is_post_capped: Set(row.is_post_capped),
        is_user_monthly_capped: Set(row.is_user_monthly_capped),
        is_view_regression: Set(row.is_view_regression),
        created_at: Set(Utc::now().into()),
        ..Default::default()
    }
}

async fn version_of<C: ConnectionTrait>(conn: &C, user_id: Uuid) -> Result<LedgerVersion, StoreError> {
    let version: Option<(i64, Option<i64>)> = CpmPostBreakdown::find()
        .select_only()
        .column_as(cpm_post_breakdown::Column::Id.count(), "rows")
        .column_as(cpm_post_breakdown::Column::Id.max(), "max_id")
        .filter(cpm_post_breakdown::Column::UserId.eq(user_id))
        .into_tuple()
        .one(conn)
        .await?;

    Ok(version
        .map(|(rows, max_id)| LedgerVersion { rows, max_id })
        .unwrap_or_default())
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn latest_row(&self, post_id: Uuid) -> Result<Option<LedgerRow>, StoreError> {
        let row = CpmPostBreakdown::find()
            .filter(cpm_post_breakdown::Column::PostId.eq(post_id))
            .order_by_desc(cpm_post_breakdown::Column::Date)
            .one(&self.db)
            .await?;
        Ok(row.map(LedgerRow::from))
    }

    async fn user_version(&self, user_id: Uuid) -> Result<LedgerVersion, StoreError> {
        version_of(&self.db, user_id).await
    }

    async fn commit_user_rows(
        &self,
        user_id: Uuid,
        expected: LedgerVersion,
        write: LedgerWrite,
    ) -> Result<LedgerWriteOutcome, StoreError> {
        let txn = self.db.begin().await?;

        // Held until commit or rollback; serializes writers across processes
        txn.execute(Statement::from_sql_and_values(
            DbBackend::Postgres,
            USER_LEDGER_LOCK_SQL,
            [user_id.to_string().into()],
        ))
        .await?;

        if version_of(&txn, user_id).await? != expected {
            txn.rollback().await?;
            return Err(StoreError::Conflict(user_id));
        }

        let mut rows_deleted = 0;
        if let Some(from) = write.delete_from {
            rows_deleted = CpmPostBreakdown::delete_many()
                .filter(cpm_post_breakdown::Column::UserId.eq(user_id))
                .filter(cpm_post_breakdown::Column::Date.gte(from))
                .exec(&txn)
                .await?
                .rows_affected;
        }

        let mut rows = Vec::with_capacity(write.insert.len());
        for row in write.insert {
            let inserted = to_active_row(row).insert(&txn).await?;
            rows.push(LedgerRow::from(inserted));
        }

        txn.commit().await?;
        Ok(LedgerWriteOutcome { rows_deleted, rows })
    }

    async fn monthly_total(&self, user_id: Uuid, month: YearMonth) -> Result<Decimal, StoreError> {
        let total: Option<Option<Decimal>> = CpmPostBreakdown::find()
            .select_only()
            .column_as(cpm_post_breakdown::Column::CpmEarned.sum(), "total")
            .filter(cpm_post_breakdown::Column::UserId.eq(user_id))
            .filter(cpm_post_breakdown::Column::Date.between(month.first_day(), month.last_day()))
            .into_tuple()
            .one(&self.db)
            .await?;

        Ok(total.flatten().unwrap_or(Decimal::ZERO))
    }

    async fn rows_for_post(&self, post_id: Uuid) -> Result<Vec<LedgerRow>, StoreError> {
        let rows = CpmPostBreakdown::find()
            .filter(cpm_post_breakdown::Column::PostId.eq(post_id))
            .order_by_asc(cpm_post_breakdown::Column::Date)
            .all(&self.db)
            .await?;
        Ok(rows.into_iter().map(LedgerRow::from).collect())
    }

    async fn rows_for_user(
        &self,
        user_id: Uuid,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<LedgerRow>, StoreError> {
        let mut query =
            CpmPostBreakdown::find().filter(cpm_post_breakdown::Column::UserId.eq(user_id));
        if let Some(from) = from {
            query = query.filter(cpm_post_breakdown::Column::Date.gte(from));
        }
        if let Some(to) = to {
            query = query.filter(cpm_post_breakdown::Column::Date.lte(to));
        }

        let rows = query
            .order_by_asc(cpm_post_breakdown::Column::Date)
            .order_by_asc(cpm_post_breakdown::Column::Id)
            .all(&self.db)
            .await?;
        Ok(rows.into_iter().map(LedgerRow::from).collect())
    }

    async fn monthly_user_totals(&self, month: YearMonth) -> Result<Vec<MonthlyEarnings>, StoreError> {
        let totals: Vec<(Uuid, Option<Decimal>, Option<i64>, i64)> = CpmPostBreakdown::find()
            .select_only()
            .column(cpm_post_breakdown::Column::UserId)
            .column_as(cpm_post_breakdown::Column::CpmEarned.sum(), "cpm_earned")
            .column_as(
                cpm_post_breakdown::Column::ViewsDelta
                    .sum()
                    .cast_as(Alias::new("bigint")),
                "views_delta",
            )
            .column_as(
                Expr::col(cpm_post_breakdown::Column::PostId).count_distinct(),
                "posts",
            )
            .filter(cpm_post_breakdown::Column::Date.between(month.first_day(), month.last_day()))
            .group_by(cpm_post_breakdown::Column::UserId)
            .order_by_asc(cpm_post_breakdown::Column::UserId)
            .into_tuple()
            .all(&self.db)
            .await?;

        Ok(totals
            .into_iter()
            .map(|(user_id, cpm_earned, views_delta, posts)| MonthlyEarnings {
                user_id,
                cpm_earned: cpm_earned.unwrap_or(Decimal::ZERO),
                views_delta: views_delta.unwrap_or(0),
                posts,
            })
            .collect())
    }
}

#[derive(Clone)]
pub struct PgPayoutStore {
    db: DatabaseConnection,
}

impl PgPayoutStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn to_payout(model: account_manager_payouts::Model) -> Result<Payout, StoreError> {
    Payout::try_from(model).map_err(StoreError::InvalidData)
}

#[async_trait]
impl PayoutStore for PgPayoutStore {
    async fn insert_payout(&self, payout: NewPayout) -> Result<Payout, StoreError> {
        let model = account_manager_payouts::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(payout.user_id),
            period_type: Set(payout.period_type.to_string()),
            period_start: Set(payout.period_start),
            period_end: Set(payout.period_end),
            posts_count: Set(payout.posts_count),
            days_hit: Set(payout.days_hit),
            weeks_hit: Set(payout.weeks_hit),
            base_amount: Set(payout.base_amount),
            bonus_amount: Set(payout.bonus_amount),
            total_amount: Set(payout.total_amount),
            status: Set(PayoutStatus::Pending.to_string()),
            approved_by: Set(None),
            approved_at: Set(None),
            paid_at: Set(None),
            created_at: Set(Utc::now().into()),
        };

        to_payout(model.insert(&self.db).await?)
    }

    async fn get_payout(&self, id: Uuid) -> Result<Option<Payout>, StoreError> {
        AccountManagerPayouts::find_by_id(id)
            .one(&self.db)
            .await?
            .map(to_payout)
            .transpose()
    }

    async fn list_payouts(&self, filter: PayoutFilter) -> Result<Vec<Payout>, StoreError> {
        let mut condition = Condition::all();
        if let Some(status) = filter.status {
            condition = condition.add(account_manager_payouts::Column::Status.eq(status.to_string()));
        }
        if let Some(period_type) = filter.period_type {
            condition = condition
                .add(account_manager_payouts::Column::PeriodType.eq(period_type.to_string()));
        }
        if let Some(user_id) = filter.user_id {
            condition = condition.add(account_manager_payouts::Column::UserId.eq(user_id));
        }

        let rows = AccountManagerPayouts::find()
            .filter(condition)
            .order_by_desc(account_manager_payouts::Column::PeriodStart)
            .order_by_asc(account_manager_payouts::Column::Id)
            .all(&self.db)
            .await?;

        rows.into_iter().map(to_payout).collect()
    }

    async fn transition(
        &self,
        id: Uuid,
        from: PayoutStatus,
        to: PayoutStatus,
        approved_by: Option<Uuid>,
        at: DateTime<Utc>,
    ) -> Result<Option<Payout>, StoreError> {
        let mut update = AccountManagerPayouts::update_many()
            .col_expr(
                account_manager_payouts::Column::Status,
                Expr::value(to.to_string()),
            )
            .filter(account_manager_payouts::Column::Id.eq(id))
            .filter(account_manager_payouts::Column::Status.eq(from.to_string()));

        match to {
            PayoutStatus::Approved => {
                update = update
                    .col_expr(
                        account_manager_payouts::Column::ApprovedBy,
                        Expr::value(approved_by),
                    )
                    .col_expr(account_manager_payouts::Column::ApprovedAt, Expr::value(at));
            }
            PayoutStatus::Paid => {
                update = update.col_expr(account_manager_payouts::Column::PaidAt, Expr::value(at));
            }
            PayoutStatus::Pending => {}
        }

        // Compare-and-set on the current status
        let result = update.exec(&self.db).await?;
        if result.rows_affected == 0 {
            return Ok(None);
        }

        self.get_payout(id).await
    }
}

#[derive(Clone)]
pub struct PgCreatorPayoutStore {
    db: DatabaseConnection,
}

impl PgCreatorPayoutStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn to_creator_payout(model: ugc_creator_payouts::Model) -> Result<CreatorPayout, StoreError> {
    CreatorPayout::try_from(model).map_err(StoreError::InvalidData)
}

#[async_trait]
impl CreatorPayoutStore for PgCreatorPayoutStore {
    async fn insert_creator_payout(
        &self,
        draft: CreatorPayoutDraft,
    ) -> Result<CreatorPayout, StoreError> {
        let now = Utc::now();
        let model = ugc_creator_payouts::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(draft.user_id),
            period_year: Set(draft.period.year()),
            period_month: Set(draft.period.month() as i32),
            contract_option: Set(draft.contract_option.map(|c| c.to_string())),
            posts_count: Set(draft.posts_count),
            approved_posts_count: Set(draft.approved_posts_count),
            posts_missing: Set(draft.posts_missing),
            can_claim: Set(draft.can_claim),
            total_views: Set(draft.total_views),
            base_amount: Set(draft.base_amount),
            cpm_amount: Set(draft.cpm_amount),
            total_amount: Set(draft.total_amount),
            paypal_info: Set(draft.paypal_info),
            status: Set(PayoutStatus::Pending.to_string()),
            approved_by: Set(None),
            approved_at: Set(None),
            paid_at: Set(None),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };

        to_creator_payout(model.insert(&self.db).await?)
    }

    async fn get_creator_payout(&self, id: Uuid) -> Result<Option<CreatorPayout>, StoreError> {
        UgcCreatorPayouts::find_by_id(id)
            .one(&self.db)
            .await?
            .map(to_creator_payout)
            .transpose()
    }

    async fn find_creator_payout(
        &self,
        user_id: Uuid,
        period: YearMonth,
    ) -> Result<Option<CreatorPayout>, StoreError> {
        UgcCreatorPayouts::find()
            .filter(ugc_creator_payouts::Column::UserId.eq(user_id))
            .filter(ugc_creator_payouts::Column::PeriodYear.eq(period.year()))
            .filter(ugc_creator_payouts::Column::PeriodMonth.eq(period.month() as i32))
            .one(&self.db)
            .await?
            .map(to_creator_payout)
            .transpose()
    }

    async fn update_pending_creator_payout(
        &self,
        id: Uuid,
        draft: CreatorPayoutDraft,
    ) -> Result<Option<CreatorPayout>, StoreError> {
        use ugc_creator_payouts::Column;

        let result = UgcCreatorPayouts::update_many()
            .col_expr(
                Column::ContractOption,
                Expr::value(draft.contract_option.map(|c| c.to_string())),
            )
            .col_expr(Column::PostsCount, Expr::value(draft.posts_count))
            .col_expr(Column::ApprovedPostsCount, Expr::value(draft.approved_posts_count))
            .col_expr(Column::PostsMissing, Expr::value(draft.posts_missing))
            .col_expr(Column::CanClaim, Expr::value(draft.can_claim))
            .col_expr(Column::TotalViews, Expr::value(draft.total_views))
            .col_expr(Column::BaseAmount, Expr::value(draft.base_amount))
            .col_expr(Column::CpmAmount, Expr::value(draft.cpm_amount))
            .col_expr(Column::TotalAmount, Expr::value(draft.total_amount))
            .col_expr(Column::PaypalInfo, Expr::value(draft.paypal_info))
            .col_expr(Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(Column::Id.eq(id))
            .filter(Column::Status.eq(PayoutStatus::Pending.to_string()))
            .exec(&self.db)
            .await?;
        if result.rows_affected == 0 {
            return Ok(None);
        }

        self.get_creator_payout(id).await
    }

    async fn list_creator_payouts(
        &self,
        filter: CreatorPayoutFilter,
    ) -> Result<Vec<CreatorPayout>, StoreError> {
        let mut condition = Condition::all();
        if let Some(status) = filter.status {
            condition = condition.add(ugc_creator_payouts::Column::Status.eq(status.to_string()));
        }
        if let Some(year) = filter.year {
            condition = condition.add(ugc_creator_payouts::Column::PeriodYear.eq(year));
        }
        if let Some(month) = filter.month {
            condition = condition.add(ugc_creator_payouts::Column::PeriodMonth.eq(month as i32));
        }
        if let Some(user_id) = filter.user_id {
            condition = condition.add(ugc_creator_payouts::Column::UserId.eq(user_id));
        }

        let rows = UgcCreatorPayouts::find()
            .filter(condition)
            .order_by_desc(ugc_creator_payouts::Column::PeriodYear)
            .order_by_desc(ugc_creator_payouts::Column::PeriodMonth)
            .order_by_asc(ugc_creator_payouts::Column::UserId)
            .all(&self.db)
            .await?;

        rows.into_iter().map(to_creator_payout).collect()
    }

    async fn transition_creator_payout(
        &self,
        id: Uuid,
        from: PayoutStatus,
        to: PayoutStatus,
        approved_by: Option<Uuid>,
        at: DateTime<Utc>,
    ) -> Result<Option<CreatorPayout>, StoreError> {
        let mut update = UgcCreatorPayouts::update_many()
            .col_expr(ugc_creator_payouts::Column::Status, Expr::value(to.to_string()))
            .col_expr(ugc_creator_payouts::Column::UpdatedAt, Expr::value(at))
            .filter(ugc_creator_payouts::Column::Id.eq(id))
            .filter(ugc_creator_payouts::Column::Status.eq(from.to_string()));

        match to {
            PayoutStatus::Approved => {
                update = update
                    .col_expr(ugc_creator_payouts::Column::ApprovedBy, Expr::value(approved_by))
                    .col_expr(ugc_creator_payouts::Column::ApprovedAt, Expr::value(at));
            }
            PayoutStatus::Paid => {
                update = update.col_expr(ugc_creator_payouts::Column::PaidAt, Expr::value(at));
            }
            PayoutStatus::Pending => {}
        }

        let result = update.exec(&self.db).await?;
        if result.rows_affected == 0 {
            return Ok(None);
        }

        self.get_creator_payout(id).await
    }
}

#[derive(Clone)]
pub struct PgBatchProgressStore {
    db: DatabaseConnection,
}

impl PgBatchProgressStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl BatchProgressStore for PgBatchProgressStore {
    async fn last_booked_day(&self) -> Result<Option<NaiveDate>, StoreError> {
        let day = CpmBookedDays::find()
            .order_by_desc(cpm_booked_days::Column::Date)
            .one(&self.db)
            .await?;
        Ok(day.map(|d| d.date))
    }

    async fn mark_day_booked(
        &self,
        date: NaiveDate,
        appended: i32,
        failed: i32,
    ) -> Result<(), StoreError> {
        let model = cpm_booked_days::ActiveModel {
            date: Set(date),
            appended: Set(appended),
            failed: Set(failed),
            booked_at: Set(Utc::now().into()),
        };
        CpmBookedDays::insert(model)
            .on_conflict(
                OnConflict::column(cpm_booked_days::Column::Date)
                    .update_columns([
                        cpm_booked_days::Column::Appended,
                        cpm_booked_days::Column::Failed,
                        cpm_booked_days::Column::BookedAt,
                    ])
                    .to_owned(),
            )
            .exec(&self.db)
            .await?;
        Ok(())
    }

    async fn record_failed_item(
        &self,
        post_id: Uuid,
        date: NaiveDate,
        code: &str,
        error: &str,
    ) -> Result<(), StoreError> {
        let model = cpm_failed_items::ActiveModel {
            post_id: Set(post_id),
            date: Set(date),
            code: Set(code.to_string()),
            error: Set(error.to_string()),
            attempts: Set(1),
            last_attempt_at: Set(Utc::now().into()),
            ..Default::default()
        };
        CpmFailedItems::insert(model)
            .on_conflict(
                OnConflict::columns([
                    cpm_failed_items::Column::PostId,
                    cpm_failed_items::Column::Date,
                ])
                .update_columns([
                    cpm_failed_items::Column::Code,
                    cpm_failed_items::Column::Error,
                    cpm_failed_items::Column::LastAttemptAt,
                ])
                .value(
                    cpm_failed_items::Column::Attempts,
                    Expr::col((CpmFailedItems, cpm_failed_items::Column::Attempts)).add(1),
                )
                .to_owned(),
            )
            .exec(&self.db)
            .await?;
        Ok(())
    }

    async fn pending_failed_items(&self, max_attempts: i32) -> Result<Vec<FailedItem>, StoreError> {
        let items = CpmFailedItems::find()
            .filter(cpm_failed_items::Column::Attempts.lt(max_attempts))
            .order_by_asc(cpm_failed_items::Column::Date)
            .order_by_asc(cpm_failed_items::Column::PostId)
            .all(&self.db)
            .await?;

        Ok(items
            .into_iter()
            .map(|item| FailedItem {
                post_id: item.post_id,
                date: item.date,
                code: item.code,
                error: item.error,
                attempts: item.attempts,
            })
            .collect())
    }

    async fn resolve_failed_item(&self, post_id: Uuid, date: NaiveDate) -> Result<(), StoreError> {
        CpmFailedItems::delete_many()
            .filter(cpm_failed_items::Column::PostId.eq(post_id))
            .filter(cpm_failed_items::Column::Date.eq(date))
            .exec(&self.db)
            .await?;
        Ok(())
    }
}

#[derive(Clone)]
pub struct PgPostRepository {
    db: DatabaseConnection,
}

impl PgPostRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn to_post_record(model: posts::Model) -> Result<PostRecord, StoreError> {
    Ok(PostRecord {
        id: model.id,
        submitted_by: model.submitted_by,
        account_id: model.account_id,
        platform: model.platform.parse().map_err(StoreError::InvalidData)?,
        status: model.status.parse().map_err(StoreError::InvalidData)?,
        content_type: model.content_type.parse().map_err(StoreError::InvalidData)?,
        created_at: model.created_at.with_timezone(&Utc),
    })
}

fn to_snapshot(model: analytics::Model) -> ViewSnapshot {
    ViewSnapshot {
        post_id: model.post_id,
        views: model.views,
        likes: model.likes,
        comments: model.comments,
        fetched_at: model.fetched_at.with_timezone(&Utc),
    }
}

fn to_team_assignment(model: am_team_assignments::Model) -> TeamAssignment {
    TeamAssignment {
        id: model.id,
        user_id: model.user_id,
        team_name: model.team_name,
        tiktok_account_id: model.tiktok_account_id,
        instagram_account_id: model.instagram_account_id,
    }
}

#[async_trait]
impl PostRepository for PgPostRepository {
    async fn find_post(&self, post_id: Uuid) -> Result<Option<PostRecord>, StoreError> {
        Posts::find_by_id(post_id)
            .one(&self.db)
            .await?
            .map(to_post_record)
            .transpose()
    }

    async fn approved_posts_created_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<PostRecord>, StoreError> {
        let rows = Posts::find()
            .filter(posts::Column::Status.eq(PostStatus::Approved.to_string()))
            .filter(posts::Column::CreatedAt.between(from, to))
            .order_by_asc(posts::Column::CreatedAt)
            .all(&self.db)
            .await?;

        rows.into_iter().map(to_post_record).collect()
    }

    async fn approved_slideshows(
        &self,
        user_id: Uuid,
        accounts: Option<&[Uuid]>,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<PostRecord>, StoreError> {
        let mut query = Posts::find()
            .filter(posts::Column::SubmittedBy.eq(user_id))
            .filter(posts::Column::Status.eq(PostStatus::Approved.to_string()))
            .filter(posts::Column::ContentType.eq(ContentType::Slideshow.to_string()))
            .filter(posts::Column::CreatedAt.between(from, to));

        if let Some(ids) = accounts {
            query = query.filter(posts::Column::AccountId.is_in(ids.iter().copied()));
        }

        let rows = query
            .order_by_asc(posts::Column::CreatedAt)
            .all(&self.db)
            .await?;

        rows.into_iter().map(to_post_record).collect()
    }

    async fn record_snapshot(&self, snapshot: &ViewSnapshot) -> Result<(), StoreError> {
        let model = analytics::ActiveModel {
            post_id: Set(snapshot.post_id),
            views: Set(snapshot.views),
            likes: Set(snapshot.likes),
            comments: Set(snapshot.comments),
            fetched_at: Set(snapshot.fetched_at.into()),
            ..Default::default()
        };
        model.insert(&self.db).await?;
        Ok(())
    }

    async fn latest_snapshot_before(
        &self,
        post_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<Option<ViewSnapshot>, StoreError> {
        let row = Analytics::find()
            .filter(analytics::Column::PostId.eq(post_id))
            .filter(analytics::Column::FetchedAt.lte(at))
            .order_by_desc(analytics::Column::FetchedAt)
            .one(&self.db)
            .await?;
        Ok(row.map(to_snapshot))
    }

    async fn snapshots_between(
        &self,
        post_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<ViewSnapshot>, StoreError> {
        let rows = Analytics::find()
            .filter(analytics::Column::PostId.eq(post_id))
            .filter(analytics::Column::FetchedAt.between(from, to))
            .order_by_asc(analytics::Column::FetchedAt)
            .all(&self.db)
            .await?;
        Ok(rows.into_iter().map(to_snapshot).collect())
    }

    async fn account_pairs(&self, user_id: Uuid) -> Result<Option<i32>, StoreError> {
        let user = Users::find_by_id(user_id).one(&self.db).await?;
        Ok(user.map(|u| u.account_pairs))
    }

    async fn team_assignment(&self, id: Uuid) -> Result<Option<TeamAssignment>, StoreError> {
        let assignment = AmTeamAssignments::find_by_id(id).one(&self.db).await?;
        Ok(assignment.map(to_team_assignment))
    }

    async fn account_managers(&self) -> Result<Vec<Uuid>, StoreError> {
        let ids: Vec<Uuid> = Users::find()
            .select_only()
            .column(users::Column::Id)
            .filter(users::Column::Role.eq(ACCOUNT_MANAGER_ROLE))
            .order_by_asc(users::Column::Id)
            .into_tuple()
            .all(&self.db)
            .await?;
        Ok(ids)
    }

    async fn creator_profile(&self, user_id: Uuid) -> Result<Option<CreatorProfile>, StoreError> {
        let user = Users::find_by_id(user_id)
            .filter(users::Column::Role.eq(CREATOR_ROLE))
            .one(&self.db)
            .await?;

        user.map(|u| {
            let contract_option = u
                .contract_option
                .as_deref()
                .map(str::parse::<ContractOption>)
                .transpose()
                .map_err(StoreError::InvalidData)?;
            Ok(CreatorProfile {
                contract_option,
                paypal_info: u.paypal_info,
            })
        })
        .transpose()
    }
}
