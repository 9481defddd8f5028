//! Shared fixtures for in-crate tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};

use crate::clock::Clock;
use crate::models::prompt::{Prompt, PromptType, ShortlistedPrompt};
use crate::selection::oracle::{RankingOracle, RankingResult};

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

pub fn prompt(id: &str, source: &str, prompt_type: PromptType) -> Prompt {
    Prompt {
        id: id.to_string(),
        content: format!("Prompt body for {id}"),
        title: Some(format!("Title {id}")),
        description: None,
        source: source.to_string(),
        url: format!("https://prompts.example/{id}"),
        prompt_type,
        model: None,
        media_url: None,
        created_at: Utc.with_ymd_and_hms(2025, 8, 1, 0, 0, 0).unwrap(),
    }
}

/// `per_bucket` prompts in each of the four diversity buckets.
pub fn bucketed_snapshot(per_bucket: usize) -> Vec<Prompt> {
    let mut prompts = Vec::new();
    for i in 0..per_bucket {
        let buckets = [
            ("copilot", "Microsoft Copilot", PromptType::Text),
            ("anthropic", "Anthropic Prompt Library", PromptType::Text),
            ("hero-img", "PromptHero ChatGPT Images", PromptType::Image),
            ("hero-vid", "PromptHero Veo", PromptType::Video),
        ];
        for (stem, source, prompt_type) in buckets {
            prompts.push(prompt(&format!("{stem}-{i}"), source, prompt_type));
        }
    }
    prompts
}

pub struct FixedClock {
    pub now: DateTime<Utc>,
    pub today: NaiveDate,
}

impl FixedClock {
    pub fn on(day: &str) -> Self {
        let today = date(day);
        Self {
            now: Utc.from_utc_datetime(&today.and_hms_opt(6, 0, 0).unwrap()),
            today,
        }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.now
    }

    fn today(&self) -> NaiveDate {
        self.today
    }
}

/// Oracle double that returns a canned answer and records every call.
#[derive(Default)]
pub struct StubOracle {
    answer: Option<RankingResult>,
    calls: AtomicUsize,
    seen: Mutex<Vec<Vec<ShortlistedPrompt>>>,
}

impl StubOracle {
    pub fn answering(answer: RankingResult) -> Self {
        Self {
            answer: Some(answer),
            ..Default::default()
        }
    }

    pub fn failing() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_shortlist(&self) -> Option<Vec<ShortlistedPrompt>> {
        self.seen.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl RankingOracle for StubOracle {
    async fn rank(&self, candidates: &[ShortlistedPrompt]) -> Option<RankingResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(candidates.to_vec());
        self.answer.clone()
    }
}
