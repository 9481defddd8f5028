//! Shortlist Builder — the bounded, source-diversified candidate set offered to
//! the ranking oracle.
//!
//! Algorithm:
//! 1. Drop every prompt selected within the recency window (60 days, inclusive).
//! 2. Partition the rest into four disjoint buckets by source and type.
//! 3. Draw up to 8 per bucket uniformly without replacement.
//! 4. Top up from everything not yet drawn (unbucketed prompts included).
//! 5. Cap at 32.

use std::collections::HashSet;

use chrono::{Duration, NaiveDate};
use rand::seq::SliceRandom;
use rand::Rng;

use crate::models::prompt::{Prompt, PromptType, ShortlistedPrompt};
use crate::models::selection::SelectionRecord;

pub const SHORTLIST_SIZE: usize = 32;
pub const PER_BUCKET: usize = 8;
pub const RECENCY_WINDOW_DAYS: i64 = 60;

/// Provenance buckets used for source diversity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    Copilot,
    Anthropic,
    PromptHeroImage,
    PromptHeroVideo,
}

impl Bucket {
    pub const ALL: [Bucket; 4] = [
        Bucket::Copilot,
        Bucket::Anthropic,
        Bucket::PromptHeroImage,
        Bucket::PromptHeroVideo,
    ];

    /// First matching rule wins, which keeps the buckets disjoint.
    pub fn classify(prompt: &Prompt) -> Option<Bucket> {
        let source = prompt.source.as_str();
        if source.contains("Copilot") {
            Some(Bucket::Copilot)
        } else if source.contains("Anthropic") {
            Some(Bucket::Anthropic)
        } else if source.contains("PromptHero") {
            match prompt.prompt_type {
                PromptType::Image => Some(Bucket::PromptHeroImage),
                PromptType::Video => Some(Bucket::PromptHeroVideo),
                PromptType::Text => None,
            }
        } else {
            None
        }
    }
}

/// Ids selected on any date within `RECENCY_WINDOW_DAYS` of `today`.
pub fn recently_selected(ledger: &[SelectionRecord], today: NaiveDate) -> HashSet<&str> {
    let cutoff = today - Duration::days(RECENCY_WINDOW_DAYS);
    ledger
        .iter()
        .filter(|record| record.date >= cutoff)
        .map(|record| record.prompt_id.as_str())
        .collect()
}

/// Builds the shortlist. An empty result means nothing is eligible this cycle.
pub fn build_shortlist<R: Rng + ?Sized>(
    snapshot: &[Prompt],
    ledger: &[SelectionRecord],
    today: NaiveDate,
    rng: &mut R,
) -> Vec<ShortlistedPrompt> {
    let excluded = recently_selected(ledger, today);
    let eligible: Vec<&Prompt> = snapshot
        .iter()
        .filter(|p| !excluded.contains(p.id.as_str()))
        .collect();

    if eligible.is_empty() {
        return Vec::new();
    }

    let mut drawn = vec![false; eligible.len()];
    let mut picks: Vec<usize> = Vec::with_capacity(SHORTLIST_SIZE);

    for bucket in Bucket::ALL {
        let members: Vec<usize> = (0..eligible.len())
            .filter(|&i| Bucket::classify(eligible[i]) == Some(bucket))
            .collect();
        for i in random_sample(members, PER_BUCKET, rng) {
            drawn[i] = true;
            picks.push(i);
        }
    }

    if picks.len() < SHORTLIST_SIZE {
        let pool: Vec<usize> = (0..eligible.len()).filter(|&i| !drawn[i]).collect();
        picks.extend(random_sample(pool, SHORTLIST_SIZE - picks.len(), rng));
    }

    picks.truncate(SHORTLIST_SIZE);
    picks
        .into_iter()
        .map(|i| ShortlistedPrompt::from(eligible[i]))
        .collect()
}

fn random_sample<T, R: Rng + ?Sized>(mut pool: Vec<T>, count: usize, rng: &mut R) -> Vec<T> {
    pool.shuffle(rng);
    pool.truncate(count);
    pool
}
