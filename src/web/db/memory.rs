use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use diesel::result::{DatabaseErrorKind, Error as DbError};

use super::{BallotOutcome, CatalogueSummary, PollStore, ResetSummary, POLL_STATUS};
use crate::error::StoreError;
use crate::voting::{Catalogue, Category, Study, Ticket};

#[derive(Default)]
struct Tables {
    criteria: BTreeMap<i32, String>,
    studies: BTreeMap<i32, String>,
    links: Vec<(i32, i32)>,
    tickets: BTreeMap<String, bool>,
    votes: Vec<(i32, String)>,
    flags: HashMap<String, bool>,
    next_id: i32,
}

impl Tables {
    fn next_id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }
}

/// Store kept in process memory, mirroring the PostgreSQL semantics.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn vote_rows(&self) -> Vec<(i32, String)> {
        self.tables().votes.clone()
    }
}

fn foreign_key_violation(study_id: i32) -> StoreError {
    StoreError::Db(DbError::DatabaseError(
        DatabaseErrorKind::ForeignKeyViolation,
        Box::new(format!("study {study_id} does not exist")),
    ))
}

impl PollStore for MemoryStore {
    fn init(&self) -> Result<Vec<String>, StoreError> {
        self.tables()
            .flags
            .entry(POLL_STATUS.to_owned())
            .or_insert(false);
        Ok(vec![])
    }

    fn find_ticket(&self, token: &str) -> Result<Option<Ticket>, StoreError> {
        Ok(self.tables().tickets.get(token).map(|valid| Ticket {
            id: token.to_owned(),
            valid: *valid,
        }))
    }

    fn ticket_ids(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.tables().tickets.keys().cloned().collect())
    }

    fn add_tickets(&self, tokens: &[String]) -> Result<usize, StoreError> {
        let mut tables = self.tables();
        let mut inserted = 0;
        for token in tokens {
            if !tables.tickets.contains_key(token) {
                tables.tickets.insert(token.clone(), true);
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    fn poll_open(&self) -> Result<bool, StoreError> {
        Ok(self.tables().flags.get(POLL_STATUS).copied().unwrap_or(false))
    }

    fn toggle_poll(&self) -> Result<bool, StoreError> {
        let mut tables = self.tables();
        let enabled = tables.flags.entry(POLL_STATUS.to_owned()).or_insert(false);
        *enabled = !*enabled;
        Ok(*enabled)
    }

    fn categories(&self) -> Result<Vec<Category>, StoreError> {
        let tables = self.tables();
        let categories = tables
            .criteria
            .iter()
            .map(|(&id, name)| {
                let mut study_ids: Vec<i32> = tables
                    .links
                    .iter()
                    .filter(|(criteria_id, _)| *criteria_id == id)
                    .map(|(_, study_id)| *study_id)
                    .collect();
                study_ids.sort_unstable();

                Category {
                    id,
                    name: name.clone(),
                    studies: study_ids
                        .into_iter()
                        .map(|study_id| Study {
                            id: study_id,
                            name: tables.studies[&study_id].clone(),
                        })
                        .collect(),
                }
            })
            .collect();
        Ok(categories)
    }

    fn cast_ballot(&self, token: &str, study_ids: &[i32]) -> Result<BallotOutcome, StoreError> {
        let mut tables = self.tables();
        if tables.tickets.get(token) != Some(&true) {
            return Ok(BallotOutcome::TicketSpent);
        }
        if let Some(missing) = study_ids.iter().find(|id| !tables.studies.contains_key(*id)) {
            return Err(foreign_key_violation(*missing));
        }

        tables.tickets.insert(token.to_owned(), false);
        for study_id in study_ids {
            tables.votes.push((*study_id, token.to_owned()));
        }
        Ok(BallotOutcome::Recorded(study_ids.len()))
    }

    fn vote_counts(&self) -> Result<HashMap<i32, i64>, StoreError> {
        let mut counts = HashMap::new();
        for (study_id, _) in &self.tables().votes {
            *counts.entry(*study_id).or_insert(0) += 1;
        }
        Ok(counts)
    }

    fn total_votes(&self) -> Result<i64, StoreError> {
        Ok(self.tables().votes.len() as i64)
    }

    fn reset_votes(&self) -> Result<ResetSummary, StoreError> {
        let mut tables = self.tables();
        let votes_deleted = tables.votes.len();
        tables.votes.clear();
        for valid in tables.tickets.values_mut() {
            *valid = true;
        }
        Ok(ResetSummary {
            votes_deleted,
            tickets_reactivated: tables.tickets.len(),
        })
    }

    fn reset_store(&self) -> Result<(), StoreError> {
        *self.tables() = Tables::default();
        self.init().map(|_| ())
    }

    fn load_catalogue(&self, catalogue: &Catalogue) -> Result<CatalogueSummary, StoreError> {
        let mut tables = self.tables();
        let mut summary = CatalogueSummary::default();

        for entry in &catalogue.categories {
            let criteria_id = tables.next_id();
            tables.criteria.insert(criteria_id, entry.name.clone());
            summary.categories += 1;

            for study_name in &entry.studies {
                let existing = tables
                    .studies
                    .iter()
                    .find(|(_, name)| *name == study_name)
                    .map(|(id, _)| *id);
                let study_id = match existing {
                    Some(id) => id,
                    None => {
                        let id = tables.next_id();
                        tables.studies.insert(id, study_name.clone());
                        summary.studies_created += 1;
                        id
                    }
                };
                tables.links.push((criteria_id, study_id));
                summary.links += 1;
            }
        }

        Ok(summary)
    }
}
