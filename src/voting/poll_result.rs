use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::catalogue::Category;

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct StudyTally {
    pub name: String,
    pub count: u64,
    /// Share of the category leader's count, from 0 to 100.
    pub percent: f64,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct CategoryResult {
    pub name: String,
    pub studies: Vec<StudyTally>,
}

#[derive(Serialize, Debug, Clone)]
pub struct PollResult {
    pub evaluated_at: DateTime<Utc>,
    pub categories: Vec<CategoryResult>,
}

impl PollResult {
    /// Tallies each category from per-study vote counts.
    ///
    /// A study's count is every vote row that references it, so a study listed
    /// under several categories shows the same count in each. Percentages are
    /// relative to the leader of the category, which always shows 100 unless
    /// nobody has voted there yet.
    pub fn evaluate(categories: &[Category], counts: &HashMap<i32, i64>) -> PollResult {
        let categories = categories
            .iter()
            .map(|category| {
                let with_votes: Vec<(&str, u64)> = category
                    .studies
                    .iter()
                    .map(|study| {
                        let count = counts.get(&study.id).copied().unwrap_or(0).max(0) as u64;
                        (study.name.as_str(), count)
                    })
                    .collect();
                let max_votes = with_votes.iter().map(|(_, count)| *count).max().unwrap_or(0);

                let studies = with_votes
                    .into_iter()
                    .map(|(name, count)| StudyTally {
                        name: name.to_owned(),
                        count,
                        percent: leader_percent(count, max_votes),
                    })
                    .collect();

                CategoryResult {
                    name: category.name.clone(),
                    studies,
                }
            })
            .collect();

        PollResult {
            evaluated_at: Utc::now(),
            categories,
        }
    }

    pub fn category(&self, name: &str) -> Option<&CategoryResult> {
        self.categories.iter().find(|c| c.name == name)
    }
}

fn leader_percent(count: u64, max_votes: u64) -> f64 {
    if max_votes == 0 {
        return 0.0;
    }
    count as f64 * 100.0 / max_votes as f64
}
