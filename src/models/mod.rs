pub mod activity;
pub mod cpm;
pub mod creator_payout;
pub mod payout;
pub mod post;
