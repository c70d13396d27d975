use anyhow::{Context, Result, anyhow};
use game_types::{Round, RoundType, Topic};
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Topic pools for both round types, loaded once and shared between games.
#[derive(Debug, Clone)]
pub struct TopicCatalog {
    pools: HashMap<RoundType, Vec<Topic>>,
}

impl TopicCatalog {
    /// Build a catalog from two newline separated lists. Blank lines and lines
    /// starting with `#` are skipped.
    pub fn from_lists(match_list: &str, unmatch_list: &str) -> Result<Self> {
        let mut pools = HashMap::new();
        pools.insert(RoundType::Match, parse_pool(match_list));
        pools.insert(RoundType::Unmatch, parse_pool(unmatch_list));

        for round_type in RoundType::ALL {
            if pools[&round_type].is_empty() {
                return Err(anyhow!("No topics available for {} rounds", round_type));
            }
        }

        Ok(Self { pools })
    }

    /// Load `match.txt` and `unmatch.txt` from a directory
    pub fn from_directory<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        let read = |round_type: RoundType| -> Result<String> {
            let path = dir.join(format!("{}.txt", round_type));
            std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read topic list {}", path.display()))
        };

        let catalog = Self::from_lists(&read(RoundType::Match)?, &read(RoundType::Unmatch)?)?;
        tracing::info!(
            match_topics = catalog.topics(RoundType::Match).len(),
            unmatch_topics = catalog.topics(RoundType::Unmatch).len(),
            "Loaded topic catalog from {}",
            dir.display()
        );
        Ok(catalog)
    }

    pub fn topics(&self, round_type: RoundType) -> &[Topic] {
        self.pools.get(&round_type).map(Vec::as_slice).unwrap_or(&[])
    }
}

fn parse_pool(list: &str) -> Vec<Topic> {
    list.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .enumerate()
        .map(|(index, prompt)| Topic {
            id: index as i32,
            prompt: prompt.to_string(),
        })
        .collect()
}

/// Topics already shown in one game, tracked separately per round type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopicUsage {
    used: HashMap<RoundType, HashSet<i32>>,
}

impl TopicUsage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild usage from rounds a game has already played
    pub fn from_rounds(catalog: &TopicCatalog, rounds: &[Round]) -> Self {
        let mut usage = Self::new();
        let mut ordered: Vec<&Round> = rounds.iter().collect();
        ordered.sort_by_key(|r| r.round_number);

        for round in ordered {
            if usage.remaining(catalog, round.round_type).is_empty() {
                usage.reset(round.round_type);
            }
            usage.record(round.round_type, round.topic.id);
        }
        usage
    }

    pub fn is_used(&self, round_type: RoundType, topic_id: i32) -> bool {
        self.used
            .get(&round_type)
            .is_some_and(|ids| ids.contains(&topic_id))
    }

    pub fn remaining<'a>(&self, catalog: &'a TopicCatalog, round_type: RoundType) -> Vec<&'a Topic> {
        catalog
            .topics(round_type)
            .iter()
            .filter(|topic| !self.is_used(round_type, topic.id))
            .collect()
    }

    pub fn record(&mut self, round_type: RoundType, topic_id: i32) {
        self.used.entry(round_type).or_default().insert(topic_id);
    }

    pub fn reset(&mut self, round_type: RoundType) {
        self.used.remove(&round_type);
    }
}
