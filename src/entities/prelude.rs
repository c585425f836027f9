pub use super::account_manager_payouts::Entity as AccountManagerPayouts;
pub use super::am_team_assignments::Entity as AmTeamAssignments;
pub use super::analytics::Entity as Analytics;
pub use super::cpm_booked_days::Entity as CpmBookedDays;
pub use super::cpm_failed_items::Entity as CpmFailedItems;
pub use super::cpm_post_breakdown::Entity as CpmPostBreakdown;
pub use super::posts::Entity as Posts;
pub use super::sync_status::Entity as SyncStatus;
pub use super::ugc_creator_payouts::Entity as UgcCreatorPayouts;
pub use super::users::Entity as Users;
