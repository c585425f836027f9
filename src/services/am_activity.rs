//! Account-manager activity aggregation
//!
//! Approved slideshow posts are bucketed by UTC day and compared against the
//! daily target. Base pay is one dollar per slideshow; attendance bonuses
//! need 6 hit days in a Monday-Sunday week, and 4 hit weeks that lie fully
//! inside the calendar month. All amounts scale with the account-pair
//! multiplier, which is 1 when a single team is selected.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::config::AccountManagerConfig;
use crate::models::activity::{AmStats, PeriodAggregate};
use crate::models::payout::PeriodType;
use crate::models::post::{ContentType, PostRecord};
use crate::services::calendar::{
    YearMonth, complete_weeks_in, day_end, day_start, days_between, monday_of, sunday_of,
};
use crate::storage::{PostRepository, StoreError};

/// Dollars paid per approved slideshow before the multiplier
pub const BASE_PAY_PER_SLIDESHOW: Decimal = Decimal::ONE;

/// Hit days a week needs for the weekly bonus
pub const DAYS_HIT_FOR_WEEKLY_BONUS: u32 = 6;

/// Hit weeks a month needs for the monthly bonus
pub const WEEKS_HIT_FOR_MONTHLY_BONUS: u32 = 4;

#[derive(Debug, Error)]
pub enum ActivityError {
    #[error("user {0} not found")]
    UserNotFound(Uuid),
    #[error("team assignment {0} not found for this user")]
    TeamNotFound(Uuid),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Approved slideshow posts per UTC day
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DailyCounts(BTreeMap<NaiveDate, u32>);

impl DailyCounts {
    pub fn from_posts(posts: &[PostRecord]) -> Self {
        let mut counts = BTreeMap::new();
        for post in posts
            .iter()
            .filter(|p| p.is_approved() && p.content_type == ContentType::Slideshow)
        {
            *counts.entry(post.created_at.date_naive()).or_insert(0) += 1;
        }
        Self(counts)
    }

    pub fn on(&self, day: NaiveDate) -> u32 {
        self.0.get(&day).copied().unwrap_or(0)
    }

    /// Posts and hit days in `[start, end]`, ignoring days after `today`
    fn tally(&self, start: NaiveDate, end: NaiveDate, today: NaiveDate, target: u32) -> (u32, u32) {
        let end = end.min(today);
        if start > end {
            return (0, 0);
        }
        days_between(start, end).fold((0, 0), |(posts, hits), day| {
            let count = self.on(day);
            (posts + count, hits + u32::from(count >= target))
        })
    }
}

fn pay(count: u32, multiplier: u32) -> Decimal {
    BASE_PAY_PER_SLIDESHOW * Decimal::from(count) * Decimal::from(multiplier)
}

/// Pay figures for the Monday-Sunday week starting `monday`
pub fn weekly_aggregate(
    counts: &DailyCounts,
    monday: NaiveDate,
    today: NaiveDate,
    multiplier: u32,
    config: &AccountManagerConfig,
) -> PeriodAggregate {
    let sunday = sunday_of(monday);
    let (posts, days_hit) = counts.tally(monday, sunday, today, config.daily_post_target);

    let base_amount = pay(posts, multiplier);
    let bonus_amount = if days_hit >= DAYS_HIT_FOR_WEEKLY_BONUS {
        config.weekly_bonus_amount * Decimal::from(multiplier)
    } else {
        Decimal::ZERO
    };

    PeriodAggregate {
        period_type: PeriodType::Weekly,
        period_start: monday,
        period_end: sunday,
        posts_count: posts,
        days_hit,
        weeks_hit: 0,
        base_amount,
        bonus_amount,
        total_amount: base_amount + bonus_amount,
    }
}

/// Complete weeks inside `month` that have fully elapsed before `today`
/// and met the hit-day threshold
pub fn weeks_hit_in_month(
    counts: &DailyCounts,
    month: YearMonth,
    today: NaiveDate,
    config: &AccountManagerConfig,
) -> u32 {
    complete_weeks_in(month)
        .into_iter()
        .filter(|monday| sunday_of(*monday) < today)
        .filter(|monday| {
            let (_, days_hit) =
                counts.tally(*monday, sunday_of(*monday), today, config.daily_post_target);
            days_hit >= DAYS_HIT_FOR_WEEKLY_BONUS
        })
        .count() as u32
}

/// Pay figures for a calendar month
pub fn monthly_aggregate(
    counts: &DailyCounts,
    month: YearMonth,
    today: NaiveDate,
    multiplier: u32,
    config: &AccountManagerConfig,
) -> PeriodAggregate {
    let (posts, days_hit) = counts.tally(
        month.first_day(),
        month.last_day(),
        today,
        config.daily_post_target,
    );
    let weeks_hit = weeks_hit_in_month(counts, month, today, config);

    let base_amount = pay(posts, multiplier);
    let bonus_amount = if weeks_hit >= WEEKS_HIT_FOR_MONTHLY_BONUS {
        config.monthly_bonus_amount * Decimal::from(multiplier)
    } else {
        Decimal::ZERO
    };

    PeriodAggregate {
        period_type: PeriodType::Monthly,
        period_start: month.first_day(),
        period_end: month.last_day(),
        posts_count: posts,
        days_hit,
        weeks_hit,
        base_amount,
        bonus_amount,
        total_amount: base_amount + bonus_amount,
    }
}

/// Today, this week and this month as of `today`
pub fn stats_for(
    counts: &DailyCounts,
    today: NaiveDate,
    multiplier: u32,
    config: &AccountManagerConfig,
) -> AmStats {
    let posts_today = counts.on(today);
    let week = weekly_aggregate(counts, monday_of(today), today, multiplier, config);
    let month = monthly_aggregate(counts, YearMonth::of(today), today, multiplier, config);

    AmStats {
        posts_today,
        daily_target: config.daily_post_target,
        daily_earnings: pay(posts_today, multiplier),
        days_hit_this_week: week.days_hit,
        weekly_base: week.base_amount,
        weekly_bonus: week.bonus_amount,
        weekly_total: week.total_amount,
        weeks_hit_this_month: month.weeks_hit,
        monthly_base: month.base_amount,
        monthly_bonus: month.bonus_amount,
        monthly_total: month.total_amount,
        account_pairs: multiplier,
    }
}

/// Which posts count and how much each is worth
#[derive(Debug, Clone, PartialEq, Eq)]
struct Scope {
    multiplier: u32,
    accounts: Option<Vec<Uuid>>,
}

pub struct ActivityAggregator {
    posts: Arc<dyn PostRepository>,
    config: AccountManagerConfig,
}

impl ActivityAggregator {
    pub fn new(posts: Arc<dyn PostRepository>, config: AccountManagerConfig) -> Self {
        Self { posts, config }
    }

    pub fn config(&self) -> &AccountManagerConfig {
        &self.config
    }

    async fn scope(&self, user_id: Uuid, team_id: Option<Uuid>) -> Result<Scope, ActivityError> {
        let pairs = self
            .posts
            .account_pairs(user_id)
            .await?
            .ok_or(ActivityError::UserNotFound(user_id))?;

        let Some(team_id) = team_id else {
            return Ok(Scope {
                multiplier: u32::try_from(pairs).unwrap_or(0).max(1),
                accounts: None,
            });
        };

        let assignment = self
            .posts
            .team_assignment(team_id)
            .await?
            .filter(|a| a.user_id == user_id)
            .ok_or(ActivityError::TeamNotFound(team_id))?;

        Ok(Scope {
            multiplier: 1,
            accounts: Some(assignment.account_ids()),
        })
    }

    async fn counts(
        &self,
        user_id: Uuid,
        scope: &Scope,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<DailyCounts, ActivityError> {
        let posts = self
            .posts
            .approved_slideshows(user_id, scope.accounts.as_deref(), day_start(from), day_end(to))
            .await?;
        debug!(
            user_id = %user_id,
            from = %from,
            to = %to,
            posts = posts.len(),
            "Loaded slideshow posts for activity aggregation"
        );
        Ok(DailyCounts::from_posts(&posts))
    }

    /// Dashboard stats for `user_id` as of `today`, optionally for one team
    pub async fn stats(
        &self,
        user_id: Uuid,
        team_id: Option<Uuid>,
        today: NaiveDate,
    ) -> Result<AmStats, ActivityError> {
        let scope = self.scope(user_id, team_id).await?;
        // The current week may start in the previous month
        let from = monday_of(today).min(YearMonth::of(today).first_day());
        let counts = self.counts(user_id, &scope, from, today).await?;
        Ok(stats_for(&counts, today, scope.multiplier, &self.config))
    }

    /// Aggregate for the week starting `monday` across all of the user's pairs
    pub async fn weekly_period(
        &self,
        user_id: Uuid,
        monday: NaiveDate,
        today: NaiveDate,
    ) -> Result<PeriodAggregate, ActivityError> {
        let scope = self.scope(user_id, None).await?;
        let counts = self.counts(user_id, &scope, monday, sunday_of(monday)).await?;
        Ok(weekly_aggregate(&counts, monday, today, scope.multiplier, &self.config))
    }

    /// Aggregate for a calendar month across all of the user's pairs
    pub async fn monthly_period(
        &self,
        user_id: Uuid,
        month: YearMonth,
        today: NaiveDate,
    ) -> Result<PeriodAggregate, ActivityError> {
        let scope = self.scope(user_id, None).await?;
        let counts = self
            .counts(user_id, &scope, month.first_day(), month.last_day())
            .await?;
        Ok(monthly_aggregate(&counts, month, today, scope.multiplier, &self.config))
    }
}

/// Most recent Monday-Sunday week that ended before `today`
pub fn last_closed_week(today: NaiveDate) -> NaiveDate {
    monday_of(today) - chrono::Days::new(7)
}

/// Calendar month before the one containing `today`
pub fn last_closed_month(today: NaiveDate) -> YearMonth {
    YearMonth::of(today).previous()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::post::{Platform, PostStatus, TeamAssignment};
    use crate::storage::MemoryPostRepository;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn config() -> AccountManagerConfig {
        AccountManagerConfig::new(10, dec!(10), dec!(20)).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn counts(days: &[(NaiveDate, u32)]) -> DailyCounts {
        DailyCounts(days.iter().copied().collect())
    }

    fn slideshow(user: Uuid, account: Option<Uuid>, day: NaiveDate, hour: u32) -> PostRecord {
        PostRecord {
            id: Uuid::new_v4(),
            submitted_by: user,
            account_id: account,
            platform: Platform::Tiktok,
            status: PostStatus::Approved,
            content_type: ContentType::Slideshow,
            created_at: Utc
                .from_utc_datetime(&day.and_hms_opt(hour, 0, 0).unwrap()),
        }
    }

    #[test]
    fn test_daily_counts_skip_unapproved_and_videos() {
        let user = Uuid::new_v4();
        let day = date(2026, 1, 5);
        let mut rejected = slideshow(user, None, day, 1);
        rejected.status = PostStatus::Rejected;
        let mut video = slideshow(user, None, day, 2);
        video.content_type = ContentType::UgcVideo;
        let posts = vec![slideshow(user, None, day, 3), rejected, video, slideshow(user, None, day, 23)];

        assert_eq!(DailyCounts::from_posts(&posts).on(day), 2);
    }

    #[test]
    fn test_six_hit_days_earn_weekly_bonus() {
        // Week of Mon 2026-01-05; Thursday misses the target
        let monday = date(2026, 1, 5);
        let days: Vec<_> = days_between(monday, sunday_of(monday))
            .enumerate()
            .map(|(i, d)| (d, if i == 3 { 4 } else { 10 }))
            .collect();
        let week = weekly_aggregate(&counts(&days), monday, date(2026, 1, 20), 1, &config());

        assert_eq!(week.days_hit, 6);
        assert_eq!(week.posts_count, 64);
        assert_eq!(week.base_amount, dec!(64));
        assert_eq!(week.bonus_amount, dec!(10));
        assert_eq!(week.total_amount, dec!(74));
    }

    #[test]
    fn test_five_hit_days_earn_no_bonus() {
        let monday = date(2026, 1, 5);
        let days: Vec<_> = days_between(monday, sunday_of(monday))
            .enumerate()
            .map(|(i, d)| (d, if i < 5 { 12 } else { 0 }))
            .collect();
        let week = weekly_aggregate(&counts(&days), monday, date(2026, 1, 20), 1, &config());
        assert_eq!(week.days_hit, 5);
        assert_eq!(week.bonus_amount, Decimal::ZERO);
    }

    #[test]
    fn test_future_days_are_not_counted() {
        let monday = date(2026, 1, 5);
        let days: Vec<_> = days_between(monday, sunday_of(monday)).map(|d| (d, 10)).collect();
        // Wednesday
        let week = weekly_aggregate(&counts(&days), monday, date(2026, 1, 7), 1, &config());
        assert_eq!(week.days_hit, 3);
        assert_eq!(week.posts_count, 30);
    }

    #[test]
    fn test_multiplier_scales_base_and_bonus() {
        let monday = date(2026, 1, 5);
        let days: Vec<_> = days_between(monday, sunday_of(monday)).map(|d| (d, 10)).collect();
        let week = weekly_aggregate(&counts(&days), monday, date(2026, 2, 1), 3, &config());
        assert_eq!(week.base_amount, dec!(210));
        assert_eq!(week.bonus_amount, dec!(30));
    }

    #[test]
    fn test_week_spanning_months_counts_for_neither() {
        // Mon 2026-01-26 .. Sun 2026-02-01, every day hit
        let monday = date(2026, 1, 26);
        let days: Vec<_> = days_between(monday, sunday_of(monday)).map(|d| (d, 15)).collect();
        let counts = counts(&days);
        let today = date(2026, 3, 1);

        let jan = YearMonth::new(2026, 1).unwrap();
        let feb = YearMonth::new(2026, 2).unwrap();
        assert_eq!(weeks_hit_in_month(&counts, jan, today, &config()), 0);
        assert_eq!(weeks_hit_in_month(&counts, feb, today, &config()), 0);

        // The week still earns its own weekly bonus
        let week = weekly_aggregate(&counts, monday, today, 1, &config());
        assert_eq!(week.days_hit, 7);
        assert_eq!(week.bonus_amount, dec!(10));
    }

    #[test]
    fn test_four_complete_weeks_earn_monthly_bonus() {
        // June 2026 has complete weeks starting 1, 8, 15, 22
        let month = YearMonth::new(2026, 6).unwrap();
        let days: Vec<_> = days_between(month.first_day(), month.last_day())
            .map(|d| (d, 10))
            .collect();
        let counts = counts(&days);

        let closed = monthly_aggregate(&counts, month, date(2026, 7, 1), 2, &config());
        assert_eq!(closed.weeks_hit, 4);
        assert_eq!(closed.posts_count, 300);
        assert_eq!(closed.base_amount, dec!(600));
        assert_eq!(closed.bonus_amount, dec!(40));
        assert_eq!(closed.total_amount, dec!(640));

        // On Sunday the 28th the fourth week has not finished yet
        let in_progress = monthly_aggregate(&counts, month, date(2026, 6, 28), 2, &config());
        assert_eq!(in_progress.weeks_hit, 3);
        assert_eq!(in_progress.bonus_amount, Decimal::ZERO);
        assert_eq!(in_progress.posts_count, 280);
    }

    #[test]
    fn test_stats_for_mid_week() {
        let today = date(2026, 6, 10);
        let counts = counts(&[
            (date(2026, 6, 8), 10),
            (date(2026, 6, 9), 11),
            (today, 4),
            (date(2026, 6, 11), 50),
        ]);
        let stats = stats_for(&counts, today, 1, &config());

        assert_eq!(stats.posts_today, 4);
        assert_eq!(stats.daily_target, 10);
        assert_eq!(stats.daily_earnings, dec!(4));
        assert_eq!(stats.days_hit_this_week, 2);
        assert_eq!(stats.weekly_base, dec!(25));
        assert_eq!(stats.weekly_bonus, Decimal::ZERO);
        assert_eq!(stats.monthly_base, dec!(25));
        assert_eq!(stats.weeks_hit_this_month, 0);
    }

    #[test]
    fn test_closed_period_helpers() {
        assert_eq!(last_closed_week(date(2026, 1, 7)), date(2025, 12, 29));
        assert_eq!(last_closed_month(date(2026, 1, 7)), YearMonth::new(2025, 12).unwrap());
    }

    #[tokio::test]
    async fn test_team_filter_collapses_multiplier_and_accounts() {
        let repo = Arc::new(MemoryPostRepository::new());
        let user = Uuid::new_v4();
        let (lakers_tt, lakers_ig, other) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        repo.add_account_manager(user, 3);

        let team = TeamAssignment {
            id: Uuid::new_v4(),
            user_id: user,
            team_name: "Lakers".to_string(),
            tiktok_account_id: Some(lakers_tt),
            instagram_account_id: Some(lakers_ig),
        };
        repo.add_team_assignment(team.clone());

        let today = date(2026, 6, 10);
        repo.add_post(slideshow(user, Some(lakers_tt), today, 1));
        repo.add_post(slideshow(user, Some(lakers_ig), today, 2));
        repo.add_post(slideshow(user, Some(other), today, 3));

        let aggregator = ActivityAggregator::new(repo.clone(), config());

        let all = aggregator.stats(user, None, today).await.unwrap();
        assert_eq!(all.account_pairs, 3);
        assert_eq!(all.posts_today, 3);
        assert_eq!(all.daily_earnings, dec!(9));

        let filtered = aggregator.stats(user, Some(team.id), today).await.unwrap();
        assert_eq!(filtered.account_pairs, 1);
        assert_eq!(filtered.posts_today, 2);
        assert_eq!(filtered.daily_earnings, dec!(2));

        let err = aggregator
            .stats(user, Some(Uuid::new_v4()), today)
            .await
            .unwrap_err();
        assert!(matches!(err, ActivityError::TeamNotFound(_)));
    }

    #[tokio::test]
    async fn test_unset_account_pairs_default_to_one() {
        let repo = Arc::new(MemoryPostRepository::new());
        let user = Uuid::new_v4();
        repo.add_account_manager(user, 0);
        let aggregator = ActivityAggregator::new(repo, config());

        let stats = aggregator.stats(user, None, date(2026, 6, 10)).await.unwrap();
        assert_eq!(stats.account_pairs, 1);

        let missing = aggregator
            .stats(Uuid::new_v4(), None, date(2026, 6, 10))
            .await
            .unwrap_err();
        assert!(matches!(missing, ActivityError::UserNotFound(_)));
    }

    #[tokio::test]
    async fn test_stats_include_previous_month_days_of_current_week() {
        let repo = Arc::new(MemoryPostRepository::new());
        let user = Uuid::new_v4();
        repo.add_account_manager(user, 1);
        // Wed 2026-07-01; the week started Mon 2026-06-29
        let today = date(2026, 7, 1);
        for day in [date(2026, 6, 29), date(2026, 6, 30), today] {
            for hour in 0..10 {
                repo.add_post(slideshow(user, None, day, hour));
            }
        }

        let aggregator = ActivityAggregator::new(repo, config());
        let stats = aggregator.stats(user, None, today).await.unwrap();
        assert_eq!(stats.days_hit_this_week, 3);
        assert_eq!(stats.weekly_base, dec!(30));
        assert_eq!(stats.monthly_base, dec!(10));
    }
}
