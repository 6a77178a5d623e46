//! Per-user write serialization
//!
//! Mutating operations on one user's tree run one at a time so the quota
//! check and the write that follows it cannot interleave with another
//! upload from the same user. Different users never contend.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

use crate::user::UserId;

/// Registry of one mutex per user directory.
#[derive(Debug)]
pub struct UserLocks {
    enabled: bool,
    locks: Mutex<HashMap<UserId, Arc<Mutex<()>>>>,
}

impl UserLocks {
    /// With `enabled == false` every call runs unsynchronized.
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Runs `f` while holding `user`'s lock.
    pub fn with_user<T>(&self, user: UserId, f: impl FnOnce() -> T) -> T {
        if !self.enabled {
            return f();
        }

        let lock = self.lock_for(user);
        let _guard = lock.lock();
        f()
    }

    fn lock_for(&self, user: UserId) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock();
        Arc::clone(locks.entry(user).or_default())
    }

    /// Number of users that have taken a lock so far.
    pub fn len(&self) -> usize {
        self.locks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for UserLocks {
    fn default() -> Self {
        Self::new(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_same_user_is_serialized() {
        let locks = Arc::new(UserLocks::new(true));
        let inside = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let locks = Arc::clone(&locks);
                let inside = Arc::clone(&inside);
                let max_seen = Arc::clone(&max_seen);
                thread::spawn(move || {
                    locks.with_user(UserId::new(1), || {
                        let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                        max_seen.fetch_max(now, Ordering::SeqCst);
                        thread::sleep(Duration::from_millis(5));
                        inside.fetch_sub(1, Ordering::SeqCst);
                    })
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
        assert_eq!(locks.len(), 1);
    }

    #[test]
    fn test_disabled_registry_takes_no_locks() {
        let locks = UserLocks::new(false);
        let value = locks.with_user(UserId::new(3), || 42);

        assert_eq!(value, 42);
        assert!(locks.is_empty());
        assert!(!locks.is_enabled());
    }

    #[test]
    fn test_users_get_distinct_locks() {
        let locks = UserLocks::default();
        locks.with_user(UserId::new(1), || {
            // A different user's lock is free while user 1 holds theirs.
            locks.with_user(UserId::new(2), || {});
        });
        assert_eq!(locks.len(), 2);
    }
}
