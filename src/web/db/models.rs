use chrono::NaiveDateTime;
use diesel::prelude::*;

use super::schema;
use crate::voting;

#[derive(Identifiable, Queryable, Selectable)]
#[diesel(table_name = schema::criteria)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Criteria {
    pub id: i32,
    pub name: String,
}

#[derive(Insertable)]
#[diesel(table_name = schema::criteria)]
pub struct NewCriteria<'a> {
    pub name: &'a str,
}

#[derive(Identifiable, Queryable, Selectable)]
#[diesel(table_name = schema::studies)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Study {
    pub id: i32,
    pub name: String,
}

impl From<Study> for voting::Study {
    fn from(Study { id, name }: Study) -> Self {
        voting::Study { id, name }
    }
}

#[derive(Insertable)]
#[diesel(table_name = schema::studies)]
pub struct NewStudy<'a> {
    pub name: &'a str,
}

#[derive(Associations, Identifiable, Queryable, Selectable)]
#[diesel(table_name = schema::criteria_studies)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[diesel(belongs_to(Criteria))]
#[diesel(belongs_to(Study))]
pub struct CriteriaStudy {
    pub id: i32,
    pub criteria_id: i32,
    pub study_id: i32,
}

#[derive(Insertable)]
#[diesel(table_name = schema::criteria_studies)]
pub struct NewCriteriaStudy {
    pub criteria_id: i32,
    pub study_id: i32,
}

#[derive(Queryable, Selectable)]
#[diesel(table_name = schema::tickets)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Ticket {
    pub id: String,
    pub valid: bool,
}

impl From<Ticket> for voting::Ticket {
    fn from(Ticket { id, valid }: Ticket) -> Self {
        voting::Ticket { id, valid }
    }
}

#[derive(Insertable)]
#[diesel(table_name = schema::tickets)]
pub struct NewTicket<'a> {
    pub id: &'a str,
    pub valid: bool,
}

#[derive(Insertable)]
#[diesel(table_name = schema::votes)]
pub struct NewVote<'a> {
    pub study_id: i32,
    pub ticket_id: &'a str,
    pub cast_at: NaiveDateTime,
    pub vote_count: i32,
}

#[derive(Insertable)]
#[diesel(table_name = schema::admin_flags)]
pub struct NewAdminFlag<'a> {
    pub name: &'a str,
    pub enabled: bool,
}
