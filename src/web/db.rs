pub mod models;
pub mod schema;

#[cfg(test)]
pub mod memory;

use std::collections::HashMap;

use chrono::Utc;
use diesel::dsl::{count_star, not};
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::PgConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use tracing::info;

use crate::error::StoreError;
use crate::voting::{Catalogue, Category, Ticket};
use schema::{admin_flags, criteria, criteria_studies, studies, tickets, votes};

/// Admin flag holding whether votes are accepted.
pub const POLL_STATUS: &str = "POLL_STATUS";

const TICKET_INSERT_CHUNK: usize = 1_000;

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

pub type PgPool = Pool<ConnectionManager<PgConnection>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BallotOutcome {
    /// The ticket was burned and this many vote rows were written.
    Recorded(usize),
    /// The ticket was missing or already burned; nothing was written.
    TicketSpent,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResetSummary {
    pub votes_deleted: usize,
    pub tickets_reactivated: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CatalogueSummary {
    pub categories: usize,
    pub studies_created: usize,
    pub links: usize,
}

/// Everything the poll needs from persistent storage.
///
/// Methods are blocking; async callers go through [`crate::web::with_store`].
pub trait PollStore: Send + Sync {
    /// Brings the schema up to date and makes sure the poll flag exists (closed).
    /// Returns the migrations that were applied.
    fn init(&self) -> Result<Vec<String>, StoreError>;

    fn find_ticket(&self, token: &str) -> Result<Option<Ticket>, StoreError>;

    fn ticket_ids(&self) -> Result<Vec<String>, StoreError>;

    /// Stores tokens as valid tickets, skipping any already present.
    fn add_tickets(&self, tokens: &[String]) -> Result<usize, StoreError>;

    /// A missing flag reads as closed.
    fn poll_open(&self) -> Result<bool, StoreError>;

    /// Flips the poll flag and returns the new state.
    fn toggle_poll(&self) -> Result<bool, StoreError>;

    /// Categories ordered by id, each with its studies ordered by id.
    fn categories(&self) -> Result<Vec<Category>, StoreError>;

    /// Burns the ticket and writes one vote per study id, all or nothing.
    ///
    /// The burn only succeeds on a ticket that is still valid at write time, so
    /// two submissions racing on one ticket cannot both record votes.
    fn cast_ballot(&self, token: &str, study_ids: &[i32]) -> Result<BallotOutcome, StoreError>;

    /// Vote rows per study id; studies without votes are absent.
    fn vote_counts(&self) -> Result<HashMap<i32, i64>, StoreError>;

    fn total_votes(&self) -> Result<i64, StoreError>;

    /// Deletes every vote and makes every ticket valid again.
    fn reset_votes(&self) -> Result<ResetSummary, StoreError>;

    /// Drops and recreates the whole schema, leaving every table empty.
    fn reset_store(&self) -> Result<(), StoreError>;

    fn load_catalogue(&self, catalogue: &Catalogue) -> Result<CatalogueSummary, StoreError>;
}

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn connect(database_url: &str, pool_size: u32) -> Result<PgStore, StoreError> {
        let manager = ConnectionManager::<PgConnection>::new(database_url);
        let pool = Pool::builder().max_size(pool_size).build(manager)?;
        Ok(PgStore { pool })
    }

    fn with_conn<T>(
        &self,
        f: impl FnOnce(&mut PgConnection) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut conn = self.pool.get()?;
        f(&mut *conn)
    }
}

fn run_migrations(conn: &mut PgConnection) -> Result<Vec<String>, StoreError> {
    let applied = conn
        .run_pending_migrations(MIGRATIONS)
        .map_err(StoreError::Migration)?
        .into_iter()
        .map(|v| v.to_string())
        .collect();
    Ok(applied)
}

fn ensure_poll_flag(conn: &mut PgConnection) -> Result<(), StoreError> {
    diesel::insert_into(admin_flags::table)
        .values(models::NewAdminFlag {
            name: POLL_STATUS,
            enabled: false,
        })
        .on_conflict_do_nothing()
        .execute(conn)?;
    Ok(())
}

/// Reverts and reapplies every migration. Callers wrap this in a transaction
/// so a failure part way leaves the old schema and data in place.
fn recreate_schema(conn: &mut PgConnection) -> Result<(), StoreError> {
    let reverted = conn
        .revert_all_migrations(MIGRATIONS)
        .map_err(StoreError::Migration)?;
    info!("Reverted {} migration(s)", reverted.len());

    run_migrations(conn)?;
    ensure_poll_flag(conn)
}

impl PollStore for PgStore {
    fn init(&self) -> Result<Vec<String>, StoreError> {
        self.with_conn(|conn| {
            let applied = run_migrations(conn)?;
            ensure_poll_flag(conn)?;
            Ok(applied)
        })
    }

    fn find_ticket(&self, token: &str) -> Result<Option<Ticket>, StoreError> {
        self.with_conn(|conn| {
            let ticket: Option<models::Ticket> = tickets::table
                .find(token)
                .select(models::Ticket::as_select())
                .first(conn)
                .optional()?;
            Ok(ticket.map(Ticket::from))
        })
    }

    fn ticket_ids(&self) -> Result<Vec<String>, StoreError> {
        self.with_conn(|conn| {
            let ids = tickets::table
                .select(tickets::id)
                .order(tickets::id)
                .load::<String>(conn)?;
            Ok(ids)
        })
    }

    fn add_tickets(&self, tokens: &[String]) -> Result<usize, StoreError> {
        self.with_conn(|conn| {
            conn.transaction::<_, StoreError, _>(|conn| {
                let mut inserted = 0;
                for chunk in tokens.chunks(TICKET_INSERT_CHUNK) {
                    let rows: Vec<models::NewTicket> = chunk
                        .iter()
                        .map(|id| models::NewTicket {
                            id: id.as_str(),
                            valid: true,
                        })
                        .collect();
                    inserted += diesel::insert_into(tickets::table)
                        .values(&rows)
                        .on_conflict_do_nothing()
                        .execute(conn)?;
                }
                Ok(inserted)
            })
        })
    }

    fn poll_open(&self) -> Result<bool, StoreError> {
        self.with_conn(|conn| {
            let enabled: Option<bool> = admin_flags::table
                .find(POLL_STATUS)
                .select(admin_flags::enabled)
                .first(conn)
                .optional()?;
            Ok(enabled.unwrap_or(false))
        })
    }

    fn toggle_poll(&self) -> Result<bool, StoreError> {
        self.with_conn(|conn| {
            conn.transaction::<_, StoreError, _>(|conn| {
                ensure_poll_flag(conn)?;
                let enabled = diesel::update(admin_flags::table.find(POLL_STATUS))
                    .set(admin_flags::enabled.eq(not(admin_flags::enabled)))
                    .returning(admin_flags::enabled)
                    .get_result::<bool>(conn)?;
                Ok(enabled)
            })
        })
    }

    fn categories(&self) -> Result<Vec<Category>, StoreError> {
        self.with_conn(|conn| {
            let all: Vec<models::Criteria> = criteria::table
                .order(criteria::id)
                .select(models::Criteria::as_select())
                .load(conn)?;

            let links: Vec<(models::CriteriaStudy, models::Study)> =
                models::CriteriaStudy::belonging_to(&all)
                    .inner_join(studies::table)
                    .order(studies::id)
                    .select((models::CriteriaStudy::as_select(), models::Study::as_select()))
                    .load(conn)?;

            let grouped = links.grouped_by(&all);
            let categories = all
                .into_iter()
                .zip(grouped)
                .map(|(criteria, links)| Category {
                    id: criteria.id,
                    name: criteria.name,
                    studies: links.into_iter().map(|(_, study)| study.into()).collect(),
                })
                .collect();
            Ok(categories)
        })
    }

    fn cast_ballot(&self, token: &str, study_ids: &[i32]) -> Result<BallotOutcome, StoreError> {
        self.with_conn(|conn| {
            conn.transaction::<_, StoreError, _>(|conn| {
                let burned = diesel::update(
                    tickets::table
                        .filter(tickets::id.eq(token))
                        .filter(tickets::valid.eq(true)),
                )
                .set(tickets::valid.eq(false))
                .execute(conn)?;
                if burned == 0 {
                    return Ok(BallotOutcome::TicketSpent);
                }

                let cast_at = Utc::now().naive_utc();
                let rows: Vec<models::NewVote> = study_ids
                    .iter()
                    .map(|&study_id| models::NewVote {
                        study_id,
                        ticket_id: token,
                        cast_at,
                        vote_count: 1,
                    })
                    .collect();
                let recorded = diesel::insert_into(votes::table)
                    .values(&rows)
                    .execute(conn)?;

                Ok(BallotOutcome::Recorded(recorded))
            })
        })
    }

    fn vote_counts(&self) -> Result<HashMap<i32, i64>, StoreError> {
        self.with_conn(|conn| {
            let rows: Vec<(i32, i64)> = votes::table
                .group_by(votes::study_id)
                .select((votes::study_id, count_star()))
                .load(conn)?;
            Ok(rows.into_iter().collect())
        })
    }

    fn total_votes(&self) -> Result<i64, StoreError> {
        self.with_conn(|conn| Ok(votes::table.count().get_result(conn)?))
    }

    fn reset_votes(&self) -> Result<ResetSummary, StoreError> {
        self.with_conn(|conn| {
            conn.transaction::<_, StoreError, _>(|conn| {
                let votes_deleted = diesel::delete(votes::table).execute(conn)?;
                let tickets_reactivated = diesel::update(tickets::table)
                    .set(tickets::valid.eq(true))
                    .execute(conn)?;
                Ok(ResetSummary {
                    votes_deleted,
                    tickets_reactivated,
                })
            })
        })
    }

    fn reset_store(&self) -> Result<(), StoreError> {
        self.with_conn(|conn| conn.transaction(recreate_schema))
    }

    fn load_catalogue(&self, catalogue: &Catalogue) -> Result<CatalogueSummary, StoreError> {
        self.with_conn(|conn| {
            conn.transaction::<_, StoreError, _>(|conn| {
                let mut summary = CatalogueSummary::default();

                for entry in &catalogue.categories {
                    let criteria_id: i32 = diesel::insert_into(criteria::table)
                        .values(models::NewCriteria { name: entry.name.as_str() })
                        .returning(criteria::id)
                        .get_result(conn)?;
                    summary.categories += 1;

                    for study_name in &entry.studies {
                        let existing: Option<i32> = studies::table
                            .filter(studies::name.eq(study_name.as_str()))
                            .select(studies::id)
                            .order(studies::id)
                            .first(conn)
                            .optional()?;

                        let study_id = match existing {
                            Some(id) => id,
                            None => {
                                summary.studies_created += 1;
                                diesel::insert_into(studies::table)
                                    .values(models::NewStudy { name: study_name.as_str() })
                                    .returning(studies::id)
                                    .get_result(conn)?
                            }
                        };

                        diesel::insert_into(criteria_studies::table)
                            .values(models::NewCriteriaStudy {
                                criteria_id,
                                study_id,
                            })
                            .execute(conn)?;
                        summary.links += 1;
                    }
                }

                Ok(summary)
            })
        })
    }
}
