use std::env;
use std::sync::Arc;

use chrono::NaiveDate;
use sea_orm::Database;
use uuid::Uuid;

use creator_payouts_backend::config::cpm_from_env;
use creator_payouts_backend::services::{cpm_sync::CpmSyncService, ledger::BreakdownLedger};
use creator_payouts_backend::storage::{PgLedgerStore, PgPostRepository};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();
    if args.len() != 3 {
        eprintln!("Usage: {} <post_id> <from YYYY-MM-DD>", args[0]);
        eprintln!("Example: {} 6f1c0c1e-1d7e-4a57-9d0b-3b1d7f0e2a11 2026-01-02", args[0]);
        std::process::exit(1);
    }

    let post_id: Uuid = args[1].parse()?;
    let from = NaiveDate::parse_from_str(&args[2], "%Y-%m-%d")?;

    dotenvy::dotenv().ok();
    let cpm = cpm_from_env()?;
    let db = Database::connect(env::var("DATABASE_URL")?).await?;

    let ledger = Arc::new(BreakdownLedger::new(Arc::new(PgLedgerStore::new(db.clone())), cpm));
    let sync = CpmSyncService::new(ledger, Arc::new(PgPostRepository::new(db)), 1);

    println!("Replaying ledger for post {} from {}", post_id, from);
    let outcome = sync.replay(post_id, from).await?;

    println!(
        "Deleted {} rows of user {}, rebuilt {}",
        outcome.rows_deleted,
        outcome.user_id,
        outcome.rows.len()
    );
    for row in &outcome.rows {
        println!(
            "  {}  post={} views={} delta={} earned={} post_total={} monthly_total={}{}{}{}",
            row.date,
            row.post_id,
            row.reported_views,
            row.views_delta,
            row.cpm_earned,
            row.cumulative_post_cpm,
            row.cumulative_user_monthly_cpm,
            if row.is_post_capped { " [post cap]" } else { "" },
            if row.is_user_monthly_capped { " [monthly cap]" } else { "" },
            if row.is_view_regression { " [regression]" } else { "" },
        );
    }

    Ok(())
}
