//! Per-post lifetime and per-user monthly earnings caps

use rust_decimal::Decimal;

/// Running totals and limits going into one day's computation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapInput {
    /// Uncapped amount for today's delta
    pub earned: Decimal,
    pub post_total_before: Decimal,
    pub post_cap: Decimal,
    /// The user's credited total for the calendar month so far
    pub monthly_total_before: Decimal,
    pub monthly_cap: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapOutcome {
    pub credited: Decimal,
    pub post_total: Decimal,
    pub monthly_total: Decimal,
    pub is_post_capped: bool,
    pub is_user_monthly_capped: bool,
}

/// Clip `earned` by both caps; the stricter one wins.
///
/// Once a cap is saturated every later day credits zero while still
/// reporting the flag.
pub fn apply(input: CapInput) -> CapOutcome {
    let post_remaining = (input.post_cap - input.post_total_before).max(Decimal::ZERO);
    let after_post_cap = input.earned.min(post_remaining);
    let is_post_capped = input.earned > post_remaining;

    let monthly_remaining = (input.monthly_cap - input.monthly_total_before).max(Decimal::ZERO);
    let credited = after_post_cap.min(monthly_remaining);
    let is_user_monthly_capped = after_post_cap > monthly_remaining;

    CapOutcome {
        credited,
        post_total: input.post_total_before + credited,
        monthly_total: input.monthly_total_before + credited,
        is_post_capped,
        is_user_monthly_capped,
    }
}
