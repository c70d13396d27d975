use game_types::{RoundType, Topic};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

use crate::{LifecycleError, TopicCatalog, TopicUsage};

/// Source of uniform random choices. Injected so tests can script exact draws.
pub trait RandomSource: Send {
    /// Pick an index in `0..len`. `len` is never zero.
    fn pick_index(&mut self, len: usize) -> usize;
}

/// Adapts any `rand` generator into a [`RandomSource`].
pub struct RngSource<R>(R);

impl<R: Rng + Send> RngSource<R> {
    pub fn new(rng: R) -> Self {
        Self(rng)
    }
}

impl RngSource<StdRng> {
    pub fn from_entropy() -> Self {
        Self(StdRng::from_entropy())
    }

    pub fn seeded(seed: u64) -> Self {
        Self(StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng + Send> RandomSource for RngSource<R> {
    fn pick_index(&mut self, len: usize) -> usize {
        self.0.gen_range(0..len)
    }
}

/// A round that has been chosen but not yet committed.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundPlan {
    pub round_number: i32,
    pub round_type: RoundType,
    pub topic: Topic,
    pool_exhausted: bool,
}

/// Chooses the type and topic of upcoming rounds for one game.
pub struct RoundPlanner {
    catalog: Arc<TopicCatalog>,
    usage: TopicUsage,
    random: Box<dyn RandomSource>,
}

impl RoundPlanner {
    pub fn new(catalog: Arc<TopicCatalog>, usage: TopicUsage, random: Box<dyn RandomSource>) -> Self {
        Self {
            catalog,
            usage,
            random,
        }
    }

    pub fn usage(&self) -> &TopicUsage {
        &self.usage
    }

    /// First round is a coin flip, every later round flips the previous type.
    pub fn choose_round_type(&mut self, previous: Option<RoundType>) -> RoundType {
        match previous {
            Some(previous) => previous.toggled(),
            None => RoundType::ALL[self.random.pick_index(RoundType::ALL.len())],
        }
    }

    /// Draw an unused topic for `round_type`, starting a fresh pass over the
    /// pool once every topic has been shown. Usage is not updated until
    /// [`RoundPlanner::commit`] is called.
    pub fn plan_round(
        &mut self,
        round_number: i32,
        previous: Option<RoundType>,
    ) -> Result<RoundPlan, LifecycleError> {
        let round_type = self.choose_round_type(previous);

        let mut candidates = self.usage.remaining(&self.catalog, round_type);
        let pool_exhausted = candidates.is_empty();
        if pool_exhausted {
            candidates = self.catalog.topics(round_type).iter().collect();
        }
        if candidates.is_empty() {
            return Err(LifecycleError::EmptyTopicPool(round_type));
        }

        let topic = candidates[self.random.pick_index(candidates.len())].clone();

        Ok(RoundPlan {
            round_number,
            round_type,
            topic,
            pool_exhausted,
        })
    }

    /// Mark a plan's topic as used once its round really exists
    pub fn commit(&mut self, plan: &RoundPlan) {
        if plan.pool_exhausted {
            tracing::debug!(round_type = %plan.round_type, "Topic pool exhausted, starting a new pass");
            self.usage.reset(plan.round_type);
        }
        self.usage.record(plan.round_type, plan.topic.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Replays a fixed list of picks, falling back to 0
    struct Scripted(VecDeque<usize>);

    impl RandomSource for Scripted {
        fn pick_index(&mut self, len: usize) -> usize {
            self.0.pop_front().unwrap_or(0) % len
        }
    }

    fn planner(picks: &[usize]) -> RoundPlanner {
        let catalog = TopicCatalog::from_lists("Animals\nFruits\nColors", "Sports\nKitchen").unwrap();
        RoundPlanner::new(
            Arc::new(catalog),
            TopicUsage::new(),
            Box::new(Scripted(picks.iter().copied().collect())),
        )
    }

    #[test]
    fn test_first_round_type_is_drawn() {
        assert_eq!(planner(&[0]).choose_round_type(None), RoundType::Match);
        assert_eq!(planner(&[1]).choose_round_type(None), RoundType::Unmatch);
    }

    #[test]
    fn test_later_round_types_alternate() {
        let mut planner = planner(&[]);
        let mut previous = Some(RoundType::Unmatch);
        let mut sequence = Vec::new();
        for _ in 0..4 {
            let next = planner.choose_round_type(previous);
            sequence.push(next);
            previous = Some(next);
        }
        assert_eq!(
            sequence,
            vec![RoundType::Match, RoundType::Unmatch, RoundType::Match, RoundType::Unmatch]
        );
    }

    #[test]
    fn test_no_repeat_within_a_pass() {
        // Always pick the first remaining topic
        let mut planner = planner(&[0, 0, 0, 0]);
        let mut seen = Vec::new();
        for round_number in 1..=3 {
            let plan = planner.plan_round(round_number, Some(RoundType::Unmatch)).unwrap();
            assert_eq!(plan.round_type, RoundType::Match);
            planner.commit(&plan);
            seen.push(plan.topic.prompt);
        }
        assert_eq!(seen, vec!["Animals", "Fruits", "Colors"]);
    }

    #[test]
    fn test_pool_resets_after_exhaustion() {
        let mut planner = planner(&[1, 0, 1]);
        let first = planner.plan_round(2, Some(RoundType::Match)).unwrap();
        assert_eq!(first.topic.prompt, "Kitchen");
        planner.commit(&first);

        let second = planner.plan_round(4, Some(RoundType::Match)).unwrap();
        assert_eq!(second.topic.prompt, "Sports");
        planner.commit(&second);

        // Both unmatch topics used, the full pool is available again
        let third = planner.plan_round(6, Some(RoundType::Match)).unwrap();
        assert_eq!(third.topic.prompt, "Kitchen");
        planner.commit(&third);
        assert!(planner.usage().is_used(RoundType::Unmatch, 1));
        assert!(!planner.usage().is_used(RoundType::Unmatch, 0));
    }

    #[test]
    fn test_uncommitted_plan_leaves_usage_untouched() {
        let mut planner = planner(&[0]);
        let plan = planner.plan_round(1, Some(RoundType::Unmatch)).unwrap();
        assert!(!planner.usage().is_used(plan.round_type, plan.topic.id));
    }

    #[test]
    fn test_seeded_rng_source_stays_in_range() {
        let mut source = RngSource::seeded(7);
        for len in 1..20 {
            assert!(source.pick_index(len) < len);
        }
    }
}
