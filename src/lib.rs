//! Ticket-gated category polling: single-use tickets, per-category votes, and
//! leader-relative results, served over HTTP from a PostgreSQL store.

pub mod config;
pub mod error;
pub mod tickets;
pub mod voting;
pub mod web;
