//! Tiered snapshot retention
//!
//! Snapshots are bucketed by age:
//!
//! | Tier      | Age                | Kept                    |
//! |-----------|--------------------|-------------------------|
//! | daily     | < 7 days           | newest `daily`          |
//! | weekly    | 7 days .. 30 days  | newest `weekly`         |
//! | monthly   | 30 days .. 365 days| newest `monthly`        |
//! | expired   | >= 365 days        | none                    |
//!
//! After the tiers, an optional overall cap keeps only the newest
//! `max_snapshots` survivors. Planning is pure; the snapshot manager applies
//! the plan.

use chrono::{DateTime, Duration, Utc};
use docvault_core::RetentionConfig;

use crate::id::SnapshotId;

/// Age bucket of a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RetentionTier {
    /// Younger than 7 days
    Daily,
    /// 7 to 30 days old
    Weekly,
    /// 30 to 365 days old
    Monthly,
    /// Older than every tier
    Expired,
}

impl RetentionTier {
    /// Tier for a snapshot of the given age.
    ///
    /// Snapshots dated in the future (clock moved backwards) count as
    /// daily.
    pub fn classify(age: Duration) -> Self {
        if age < Duration::days(7) {
            RetentionTier::Daily
        } else if age < Duration::days(30) {
            RetentionTier::Weekly
        } else if age < Duration::days(365) {
            RetentionTier::Monthly
        } else {
            RetentionTier::Expired
        }
    }

    /// Maximum number of snapshots this tier keeps
    pub fn limit(&self, config: &RetentionConfig) -> usize {
        match self {
            RetentionTier::Daily => config.daily,
            RetentionTier::Weekly => config.weekly,
            RetentionTier::Monthly => config.monthly,
            RetentionTier::Expired => 0,
        }
    }

    /// Tier name for logging
    pub fn name(&self) -> &'static str {
        match self {
            RetentionTier::Daily => "daily",
            RetentionTier::Weekly => "weekly",
            RetentionTier::Monthly => "monthly",
            RetentionTier::Expired => "expired",
        }
    }
}

impl std::fmt::Display for RetentionTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Which snapshots survive a retention pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetentionPlan {
    /// Survivors, newest first
    pub keep: Vec<SnapshotId>,
    /// Snapshots to delete, newest first
    pub prune: Vec<SnapshotId>,
}

impl RetentionPlan {
    /// Whether the plan deletes anything
    pub fn is_noop(&self) -> bool {
        self.prune.is_empty()
    }
}

/// Decide which of `snapshots` to keep at instant `now`.
///
/// `snapshots` pairs each identifier with its creation time; order does not
/// matter.
pub fn plan_retention(
    snapshots: &[(SnapshotId, DateTime<Utc>)],
    now: DateTime<Utc>,
    config: &RetentionConfig,
    max_snapshots: Option<usize>,
) -> RetentionPlan {
    let mut ordered: Vec<&(SnapshotId, DateTime<Utc>)> = snapshots.iter().collect();
    ordered.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| b.0.cmp(&a.0)));

    let mut plan = RetentionPlan::default();
    let mut seen = [0usize; 4];

    for (id, created_at) in ordered {
        let tier = RetentionTier::classify(now - *created_at);
        let slot = &mut seen[tier as usize];
        let within_tier = *slot < tier.limit(config);
        *slot += 1;

        let within_cap = max_snapshots.map_or(true, |max| plan.keep.len() < max);
        if within_tier && within_cap {
            plan.keep.push(id.clone());
        } else {
            plan.prune.push(id.clone());
        }
    }

    plan
}
