//! Uid allocation.
//!
//! Every uid handed out is registered in the store's set of existing uids
//! before it is returned. Generation prefers a random v4 uuid, falls back to
//! a timestamp+random v7 uuid, and only when both keep colliding emits a
//! marked sentinel so callers never block on allocation.

use std::collections::HashSet;

use uuid::Uuid;

use crate::model::Uid;

/// Attempts per strategy before moving on to the next one.
pub const MAX_UID_ATTEMPTS: usize = 3;

/// Uid emitted when no unique value could be produced.
pub const NON_UNIQUE_UID: &str = "uid-collision";

pub type UidSet = HashSet<Uid>;

type RandomSource = Box<dyn FnMut() -> Option<String> + Send>;
type CompositeSource = Box<dyn FnMut() -> String + Send>;

pub struct UidGenerator {
    random: RandomSource,
    composite: CompositeSource,
}

impl Default for UidGenerator {
    fn default() -> Self {
        Self {
            random: Box::new(|| Some(Uuid::new_v4().to_string())),
            composite: Box::new(|| Uuid::now_v7().to_string()),
        }
    }
}

impl UidGenerator {
    /// Builds a generator from explicit sources. `random` returning `None`
    /// means no strong randomness is available.
    pub fn with_sources(
        random: impl FnMut() -> Option<String> + Send + 'static,
        composite: impl FnMut() -> String + Send + 'static,
    ) -> Self {
        Self {
            random: Box::new(random),
            composite: Box::new(composite),
        }
    }

    /// Returns a uid not present in `existing` and records it there.
    pub fn create(&mut self, existing: &mut UidSet) -> Uid {
        for _ in 0..MAX_UID_ATTEMPTS {
            let Some(candidate) = (self.random)() else {
                break;
            };
            let uid = Uid::new(candidate);
            if existing.insert(uid.clone()) {
                return uid;
            }
            log::warn!("uid_collision strategy=random uid={}", uid);
        }

        for _ in 0..MAX_UID_ATTEMPTS {
            let uid = Uid::new((self.composite)());
            if existing.insert(uid.clone()) {
                return uid;
            }
            log::warn!("uid_collision strategy=composite uid={}", uid);
        }

        log::error!(
            "uid_generation_failed attempts={} existing={}",
            MAX_UID_ATTEMPTS * 2,
            existing.len()
        );
        let sentinel = Uid::new(NON_UNIQUE_UID);
        existing.insert(sentinel.clone());
        sentinel
    }
}

impl std::fmt::Debug for UidGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UidGenerator").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_uids_are_distinct_and_registered() {
        let mut generator = UidGenerator::default();
        let mut existing = UidSet::new();
        let mut seen = Vec::new();
        for _ in 0..200 {
            let uid = generator.create(&mut existing);
            assert!(existing.contains(&uid));
            assert!(!seen.contains(&uid));
            seen.push(uid);
        }
    }

    #[test]
    fn falls_back_to_composite_when_random_collides() {
        let mut generator = UidGenerator::with_sources(
            || Some("fixed".to_string()),
            || Uuid::now_v7().to_string(),
        );
        let mut existing = UidSet::new();
        let first = generator.create(&mut existing);
        assert_eq!(first.as_str(), "fixed");
        let second = generator.create(&mut existing);
        assert_ne!(second, first);
        assert!(existing.contains(&second));
    }

    #[test]
    fn falls_back_to_composite_without_randomness() {
        let mut counter = 0;
        let mut generator = UidGenerator::with_sources(
            || None,
            move || {
                counter += 1;
                format!("composite-{counter}")
            },
        );
        let mut existing = UidSet::new();
        assert_eq!(generator.create(&mut existing).as_str(), "composite-1");
        assert_eq!(generator.create(&mut existing).as_str(), "composite-2");
    }

    #[test]
    fn emits_sentinel_after_exhausting_strategies() {
        let mut generator =
            UidGenerator::with_sources(|| Some("same".to_string()), || "same".to_string());
        let mut existing = UidSet::new();
        generator.create(&mut existing);
        let uid = generator.create(&mut existing);
        assert_eq!(uid.as_str(), NON_UNIQUE_UID);
    }
}
