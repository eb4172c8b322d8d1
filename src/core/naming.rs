//! # Task name selection.
//!
//! When a submitted task's requested name collides with a live sibling, the
//! supervisor asks its [`NameStrategy`] for proposals until one is free:
//!
//! ```text
//! attempt 0: propose(requested, "",        0) ──► "worker"      (taken)
//! attempt 1: propose(requested, "worker",  1) ──► "worker+1"    (taken)
//! attempt 2: propose(requested, "worker+1",2) ──► "worker+1+1"  (free) ✓
//! ```
//!
//! After [`MAX_NAME_ATTEMPTS`] proposals the supervisor gives up with
//! [`UsageError::NameExhausted`](crate::UsageError::NameExhausted).

use std::sync::Arc;

use rand::Rng;

/// Upper bound on proposals tried for one submission.
pub const MAX_NAME_ATTEMPTS: usize = 100;

/// Literal suffix appended by [`NameStrategy::suffix`] on each collision.
pub const COLLISION_SUFFIX: &str = "+1";

/// Placeholder replaced with random digits by [`NameStrategy::wildcard`].
pub const WILDCARD: char = '%';

type ProposeFn = dyn Fn(&str, &str, usize) -> String + Send + Sync;

/// Policy proposing a task name: `(requested, previously_attempted, attempts) -> proposed`.
#[derive(Clone)]
pub struct NameStrategy(Arc<ProposeFn>);

impl NameStrategy {
    /// Wraps a custom proposal function.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&str, &str, usize) -> String + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// Default policy: the requested name first, then `"+1"` appended to the
    /// previous attempt on every collision.
    ///
    /// # Example
    /// ```
    /// use treesup::NameStrategy;
    ///
    /// let s = NameStrategy::suffix();
    /// assert_eq!(s.propose("job", "", 0), "job");
    /// assert_eq!(s.propose("job", "job", 1), "job+1");
    /// ```
    pub fn suffix() -> Self {
        Self::new(suffix_proposal)
    }

    /// Pool policy: every `%` in the requested name is replaced with random
    /// digits on every attempt. Names without `%` fall back to [`NameStrategy::suffix`].
    pub fn wildcard() -> Self {
        Self::new(|requested, attempted, attempts| {
            if requested.contains(WILDCARD) {
                fill_wildcards(requested)
            } else {
                suffix_proposal(requested, attempted, attempts)
            }
        })
    }

    /// Asks the policy for a proposal.
    pub fn propose(&self, requested: &str, attempted: &str, attempts: usize) -> String {
        (self.0)(requested, attempted, attempts)
    }

    /// Runs the proposal loop until `taken` rejects a name, or gives up.
    pub(crate) fn select(&self, requested: &str, taken: impl Fn(&str) -> bool) -> Option<String> {
        let mut attempted = String::new();
        for attempts in 0..MAX_NAME_ATTEMPTS {
            attempted = self.propose(requested, &attempted, attempts);
            if !taken(&attempted) {
                return Some(attempted);
            }
        }
        None
    }
}

impl Default for NameStrategy {
    fn default() -> Self {
        Self::suffix()
    }
}

impl std::fmt::Debug for NameStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("NameStrategy(..)")
    }
}

fn suffix_proposal(requested: &str, attempted: &str, attempts: usize) -> String {
    if attempts > 0 {
        format!("{attempted}{COLLISION_SUFFIX}")
    } else {
        requested.to_string()
    }
}

fn fill_wildcards(requested: &str) -> String {
    let mut rng = rand::rng();
    let mut out = String::with_capacity(requested.len() + 8);
    for c in requested.chars() {
        if c == WILDCARD {
            out.push_str(&rng.random_range(0..1_000_000u32).to_string());
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn suffix_appends_on_each_collision() {
        let taken: HashSet<&str> = ["job", "job+1"].into_iter().collect();
        let name = NameStrategy::suffix().select("job", |n| taken.contains(n));
        assert_eq!(name.as_deref(), Some("job+1+1"));
    }

    #[test]
    fn wildcard_replaces_placeholders_with_digits() {
        let name = NameStrategy::wildcard().propose("pool-%", "", 0);
        assert!(name.starts_with("pool-"));
        assert!(name["pool-".len()..].chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn wildcard_without_placeholder_behaves_like_suffix() {
        let s = NameStrategy::wildcard();
        assert_eq!(s.propose("job", "", 0), "job");
        assert_eq!(s.propose("job", "job", 1), "job+1");
    }

    #[test]
    fn gives_up_after_ceiling() {
        let stubborn = NameStrategy::new(|requested, _, _| requested.to_string());
        assert!(stubborn.select("same", |_| true).is_none());
    }
}
