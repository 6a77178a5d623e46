//! Quota accounting
//!
//! Usage is never stored: every snapshot walks the relevant subtree. The
//! walk is O(files) and is the dominant cost of `storage_info` and `save`.

use crate::config::QuotaLimits;
use crate::navigate::PathResolver;
use crate::storage::filesystem::{TreeUsage, tree_usage};
use crate::storage::results::QuotaSnapshot;
use crate::user::UserId;

/// Computes used/available bytes globally and per user.
#[derive(Debug, Clone)]
pub struct QuotaAccountant {
    resolver: PathResolver,
    limits: QuotaLimits,
}

impl QuotaAccountant {
    pub fn new(resolver: PathResolver, limits: QuotaLimits) -> Self {
        Self { resolver, limits }
    }

    pub fn limits(&self) -> QuotaLimits {
        self.limits
    }

    /// Usage across the whole storage root.
    pub fn global_usage(&self) -> QuotaSnapshot {
        let usage = tree_usage(self.resolver.storage_root());
        snapshot(usage, self.limits.max_total_bytes)
    }

    /// Usage of one user's subtree. A user without a directory uses nothing.
    pub fn user_usage(&self, user: UserId) -> QuotaSnapshot {
        let usage = tree_usage(&self.resolver.user_root_path(user));
        snapshot(usage, self.limits.max_user_bytes)
    }

    /// True iff `file_size` bytes fit in the user's quota when a user is
    /// given, or in the global quota otherwise.
    pub fn has_space_available(&self, file_size: u64, user: Option<UserId>) -> bool {
        let snapshot = match user {
            Some(user) => self.user_usage(user),
            None => self.global_usage(),
        };
        snapshot.available >= file_size
    }
}

/// Builds a snapshot; `available` saturates at zero when usage exceeds the
/// limit and the percentage is 0 for a zero limit.
pub(crate) fn snapshot(usage: TreeUsage, max: u64) -> QuotaSnapshot {
    let percentage = if max > 0 {
        ((usage.bytes as f64 / max as f64) * 100.0 * 100.0).round() / 100.0
    } else {
        0.0
    };

    QuotaSnapshot {
        used: usage.bytes,
        max,
        available: max.saturating_sub(usage.bytes),
        percentage,
        files_count: usage.files,
    }
}
