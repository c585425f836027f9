pub mod am_payout_sync;
pub mod cpm_ledger_sync;
