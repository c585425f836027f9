pub use sea_orm_migration::prelude::*;

mod m20260105_000001_create_users;
mod m20260105_000002_create_posts;
mod m20260105_000003_create_analytics;
mod m20260105_000004_create_am_team_assignments;
mod m20260105_000005_create_cpm_post_breakdown;
mod m20260105_000006_create_account_manager_payouts;
mod m20260105_000007_create_sync_status;
mod m20260105_000008_add_creator_contract_to_users;
mod m20260105_000009_create_ugc_creator_payouts;
mod m20260105_000010_create_cpm_batch_progress;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260105_000001_create_users::Migration),
            Box::new(m20260105_000002_create_posts::Migration),
            Box::new(m20260105_000003_create_analytics::Migration),
            Box::new(m20260105_000004_create_am_team_assignments::Migration),
            Box::new(m20260105_000005_create_cpm_post_breakdown::Migration),
            Box::new(m20260105_000006_create_account_manager_payouts::Migration),
            Box::new(m20260105_000007_create_sync_status::Migration),
            Box::new(m20260105_000008_add_creator_contract_to_users::Migration),
            Box::new(m20260105_000009_create_ugc_creator_payouts::Migration),
            Box::new(m20260105_000010_create_cpm_batch_progress::Migration),
        ]
    }
}
