use std::sync::Arc;

use creator_payouts_backend::{
    AppState, Stores,
    config::AppConfig,
    handlers,
    jobs::{am_payout_sync::start_am_payout_sync_job, cpm_ledger_sync::start_cpm_ledger_sync_job},
    storage::{
        PgBatchProgressStore, PgCreatorPayoutStore, PgLedgerStore, PgPayoutStore,
        PgPostRepository, PostRepository,
    },
};
use sea_orm::Database;
use sea_orm_migration::MigratorTrait;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,creator_payouts_backend=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            std::process::exit(1);
        }
    };

    tracing::info!(
        rate_per_thousand = %config.cpm.rate_per_thousand,
        post_lifetime_cap = %config.cpm.post_lifetime_cap,
        user_monthly_cap = %config.cpm.user_monthly_cap,
        window_days = config.cpm.window_days,
        daily_post_target = config.account_manager.daily_post_target,
        creator_monthly_post_target = config.creator_payouts.monthly_post_target,
        "Configuration loaded"
    );

    // Connect to database
    tracing::info!("Connecting to database...");
    let db = Database::connect(&config.database_url)
        .await
        .expect("Failed to connect to database");

    // Run migrations
    tracing::info!("Running migrations...");
    migration::Migrator::up(&db, None)
        .await
        .expect("Failed to run migrations");

    let posts: Arc<dyn PostRepository> = Arc::new(PgPostRepository::new(db.clone()));
    let state = AppState::new(
        Stores {
            ledger: Arc::new(PgLedgerStore::new(db.clone())),
            payouts: Arc::new(PgPayoutStore::new(db.clone())),
            creator_payouts: Arc::new(PgCreatorPayoutStore::new(db.clone())),
            posts: posts.clone(),
        },
        config.cpm.clone(),
        config.account_manager.clone(),
        config.creator_payouts.clone(),
        &config.jobs,
    );

    // Background jobs
    start_cpm_ledger_sync_job(
        db.clone(),
        state.cpm_sync.clone(),
        Arc::new(PgBatchProgressStore::new(db.clone())),
        config.jobs.clone(),
    )
    .await;
    start_am_payout_sync_job(
        db.clone(),
        posts,
        state.activity.clone(),
        state.payouts.clone(),
        state.creator_payouts.clone(),
        config.jobs.clone(),
    )
    .await;

    let app = handlers::router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind listener");

    tracing::info!(addr = %config.bind_addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("Shutdown signal received");
        })
        .await
        .expect("Server error");
}
