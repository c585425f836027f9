//! Store tests against a real Postgres; skipped unless TEST_DATABASE_URL is set

mod common;

use std::sync::Arc;

use chrono::{NaiveDate, TimeZone, Utc};
use creator_payouts_backend::entities::{posts, users};
use creator_payouts_backend::config::CreatorPayoutConfig;
use creator_payouts_backend::models::creator_payout::{ContractOption, CreatorPayoutFilter};
use creator_payouts_backend::models::payout::{NewPayout, PayoutFilter, PayoutStatus, PeriodType};
use creator_payouts_backend::models::post::ViewSnapshot;
use creator_payouts_backend::services::calendar::YearMonth;
use creator_payouts_backend::services::ledger::{BreakdownLedger, LedgerError};
use creator_payouts_backend::services::creator_payouts::CreatorPayoutService;
use creator_payouts_backend::services::payouts::{PayoutError, PayoutService};
use creator_payouts_backend::storage::{
    BatchProgressStore, PayoutStore, PgBatchProgressStore, PgCreatorPayoutStore, PgLedgerStore,
    PgPayoutStore, PgPostRepository, PostRepository,
};
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use sea_orm_migration::MigratorTrait;
use uuid::Uuid;

use crate::common::{cpm_config, setup_test_db};

async fn migrated_db() -> Option<DatabaseConnection> {
    let db = match setup_test_db().await {
        Some(db) => db.expect("Test database connection should succeed"),
        None => {
            eprintln!("TEST_DATABASE_URL not set, skipping");
            return None;
        }
    };
    migration::Migrator::up(&db, None)
        .await
        .expect("Failed to run migrations");
    Some(db)
}

async fn seed_user(db: &DatabaseConnection, role: &str, account_pairs: i32) -> Uuid {
    let id = Uuid::new_v4();
    users::ActiveModel {
        id: Set(id),
        full_name: Set(Some("Test User".to_string())),
        email: Set(Some(format!("{}@example.com", id))),
        role: Set(role.to_string()),
        account_pairs: Set(account_pairs),
        contract_option: Set((role == "creator").then(|| "option1".to_string())),
        paypal_info: Set(None),
        created_at: Set(Utc::now().fixed_offset()),
    }
    .insert(db)
    .await
    .expect("Failed to insert user");
    id
}

async fn seed_post(db: &DatabaseConnection, submitted_by: Uuid) -> Uuid {
    let id = Uuid::new_v4();
    posts::ActiveModel {
        id: Set(id),
        url: Set(format!("https://www.tiktok.com/@test/video/{}", id.simple())),
        platform: Set("tiktok".to_string()),
        account_id: Set(None),
        submitted_by: Set(submitted_by),
        status: Set("approved".to_string()),
        content_type: Set("ugc_video".to_string()),
        created_at: Set(Utc.with_ymd_and_hms(2026, 1, 1, 10, 0, 0).unwrap().fixed_offset()),
    }
    .insert(db)
    .await
    .expect("Failed to insert post");
    id
}

#[tokio::test]
async fn test_pg_ledger_appends_and_rejects_duplicate_day() {
    let Some(db) = migrated_db().await else {
        return;
    };
    let user = seed_user(&db, "creator", 1).await;
    let post_id = seed_post(&db, user).await;

    let repo = PgPostRepository::new(db.clone());
    let post = repo.find_post(post_id).await.unwrap().unwrap();
    let ledger = BreakdownLedger::new(Arc::new(PgLedgerStore::new(db.clone())), cpm_config());

    let day = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
    let snapshot = ViewSnapshot {
        post_id,
        views: 5000,
        likes: 10,
        comments: 2,
        fetched_at: Utc.with_ymd_and_hms(2026, 1, 1, 23, 0, 0).unwrap(),
    };
    repo.record_snapshot(&snapshot).await.unwrap();

    let row = ledger.append_row(&post, day, &snapshot).await.unwrap();
    assert_eq!(row.cpm_earned, dec!(7.50));

    let err = ledger.append_row(&post, day, &snapshot).await.unwrap_err();
    assert!(matches!(err, LedgerError::DuplicateRow { .. }));

    let total = ledger
        .monthly_total(user, YearMonth::new(2026, 1).unwrap())
        .await
        .unwrap();
    assert_eq!(total, dec!(7.50));

    let latest = repo
        .latest_snapshot_before(post_id, Utc.with_ymd_and_hms(2026, 1, 2, 0, 0, 0).unwrap())
        .await
        .unwrap();
    assert_eq!(latest.map(|s| s.views), Some(5000));
}

#[tokio::test]
async fn test_pg_payout_transitions() {
    let Some(db) = migrated_db().await else {
        return;
    };
    let manager = seed_user(&db, "account_manager", 2).await;
    let approver = seed_user(&db, "admin", 0).await;

    let store = Arc::new(PgPayoutStore::new(db.clone()));
    let payout = store
        .insert_payout(NewPayout {
            user_id: manager,
            period_type: PeriodType::Weekly,
            period_start: NaiveDate::from_ymd_opt(2026, 1, 5).unwrap(),
            period_end: NaiveDate::from_ymd_opt(2026, 1, 11).unwrap(),
            posts_count: 120,
            days_hit: 6,
            weeks_hit: 0,
            base_amount: dec!(120),
            bonus_amount: dec!(20),
            total_amount: dec!(140),
        })
        .await
        .unwrap();
    assert_eq!(payout.status, PayoutStatus::Pending);

    let service = PayoutService::new(store);
    let err = service.mark_paid(payout.id).await.unwrap_err();
    assert!(matches!(err, PayoutError::InvalidTransition { .. }));

    let approved = service.approve(payout.id, approver).await.unwrap();
    assert_eq!(approved.approved_by, Some(approver));
    let paid = service.mark_paid(payout.id).await.unwrap();
    assert_eq!(paid.status, PayoutStatus::Paid);

    let listed = service
        .list(PayoutFilter {
            user_id: Some(manager),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);

    let managers = PgPostRepository::new(db).account_managers().await.unwrap();
    assert!(managers.contains(&manager));
}

#[tokio::test]
async fn test_pg_creator_payout_refresh_and_approve() {
    let Some(db) = migrated_db().await else {
        return;
    };
    let creator = seed_user(&db, "creator", 1).await;
    let post_id = seed_post(&db, creator).await;

    let repo = Arc::new(PgPostRepository::new(db.clone()));
    let profile = repo.creator_profile(creator).await.unwrap().unwrap();
    assert_eq!(profile.contract_option, Some(ContractOption::Option1));

    let ledger_store = Arc::new(PgLedgerStore::new(db.clone()));
    let ledger = BreakdownLedger::new(ledger_store.clone(), cpm_config());
    let post = repo.find_post(post_id).await.unwrap().unwrap();
    let snapshot = ViewSnapshot {
        post_id,
        views: 2000,
        likes: 0,
        comments: 0,
        fetched_at: Utc.with_ymd_and_hms(2026, 1, 1, 22, 0, 0).unwrap(),
    };
    ledger
        .append_row(&post, NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(), &snapshot)
        .await
        .unwrap();

    let service = CreatorPayoutService::new(
        Arc::new(PgCreatorPayoutStore::new(db.clone())),
        ledger_store,
        repo,
        CreatorPayoutConfig::default(),
    );
    let january = YearMonth::new(2026, 1).unwrap();
    service.refresh_month(january).await.unwrap();

    let listed = service
        .list(CreatorPayoutFilter {
            user_id: Some(creator),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
    let payout = &listed[0];
    assert_eq!(payout.period, january);
    assert_eq!(payout.cpm_amount, dec!(3.00));
    // One approved UGC video at 3.125, rounded
    assert_eq!(payout.base_amount, dec!(3.13));
    assert_eq!(payout.total_views, 2000);

    let approved = service.approve(payout.id, Uuid::new_v4()).await.unwrap();
    assert_eq!(approved.status, PayoutStatus::Approved);
    let report = service.refresh_month(january).await.unwrap();
    assert!(report.frozen >= 1);
}

#[tokio::test]
async fn test_pg_batch_progress_tracks_days_and_failures() {
    let Some(db) = migrated_db().await else {
        return;
    };
    let progress = PgBatchProgressStore::new(db);
    let post_id = Uuid::new_v4();
    let day = NaiveDate::from_ymd_opt(2026, 1, 3).unwrap();

    progress.record_failed_item(post_id, day, "STORE_ERROR", "timeout").await.unwrap();
    progress.record_failed_item(post_id, day, "LEDGER_CONTENDED", "busy").await.unwrap();
    let item = progress
        .pending_failed_items(10)
        .await
        .unwrap()
        .into_iter()
        .find(|i| i.post_id == post_id)
        .unwrap();
    assert_eq!(item.attempts, 2);
    assert_eq!(item.code, "LEDGER_CONTENDED");

    progress.resolve_failed_item(post_id, day).await.unwrap();
    assert!(
        progress
            .pending_failed_items(10)
            .await
            .unwrap()
            .iter()
            .all(|i| i.post_id != post_id)
    );

    progress.mark_day_booked(day, 5, 1).await.unwrap();
    progress.mark_day_booked(day, 6, 0).await.unwrap();
    assert!(progress.last_booked_day().await.unwrap() >= Some(day));
}
