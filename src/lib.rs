// src/lib.rs

use std::sync::Arc;

use config::{AccountManagerConfig, CpmConfig, CreatorPayoutConfig, JobConfig};
use services::{
    am_activity::ActivityAggregator, cpm_sync::CpmSyncService,
    creator_payouts::CreatorPayoutService, ledger::BreakdownLedger, payouts::PayoutService,
};
use storage::{CreatorPayoutStore, LedgerStore, PayoutStore, PostRepository};

/// The stores every service is built over
#[derive(Clone)]
pub struct Stores {
    pub ledger: Arc<dyn LedgerStore>,
    pub payouts: Arc<dyn PayoutStore>,
    pub creator_payouts: Arc<dyn CreatorPayoutStore>,
    pub posts: Arc<dyn PostRepository>,
}

#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<BreakdownLedger>,
    pub cpm_sync: Arc<CpmSyncService>,
    pub activity: Arc<ActivityAggregator>,
    pub payouts: Arc<PayoutService>,
    pub creator_payouts: Arc<CreatorPayoutService>,
}

impl AppState {
    /// Wire the services over a set of stores
    pub fn new(
        stores: Stores,
        cpm: CpmConfig,
        account_manager: AccountManagerConfig,
        creator_payouts: CreatorPayoutConfig,
        jobs: &JobConfig,
    ) -> Self {
        let ledger = Arc::new(BreakdownLedger::new(stores.ledger.clone(), cpm));
        let cpm_sync = Arc::new(CpmSyncService::new(
            ledger.clone(),
            stores.posts.clone(),
            jobs.cpm_sync_concurrency,
        ));
        let activity = Arc::new(ActivityAggregator::new(stores.posts.clone(), account_manager));
        let payouts = Arc::new(PayoutService::new(stores.payouts));
        let creator_payouts = Arc::new(CreatorPayoutService::new(
            stores.creator_payouts,
            stores.ledger,
            stores.posts,
            creator_payouts,
        ));

        Self {
            ledger,
            cpm_sync,
            activity,
            payouts,
            creator_payouts,
        }
    }
}

pub mod config;

pub mod entities {
    pub mod prelude;
    pub mod users;
    pub mod posts;
    pub mod analytics;
    pub mod am_team_assignments;
    pub mod cpm_post_breakdown;
    pub mod account_manager_payouts;
    pub mod sync_status;
    pub mod ugc_creator_payouts;
    pub mod cpm_booked_days;
    pub mod cpm_failed_items;
}

pub mod services {
    pub mod calendar;
    pub mod view_delta;
    pub mod cpm_calculator;
    pub mod cap_enforcer;
    pub mod ledger;
    pub mod am_activity;
    pub mod payouts;
    pub mod creator_payouts;
    pub mod cpm_sync;
    pub mod sync_status;
}

pub mod storage;
pub mod models;
pub mod handlers;
pub mod jobs;
