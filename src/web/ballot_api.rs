use std::convert::Infallible;
use std::sync::Arc;

use serde::Deserialize;
use tracing::{error, info, warn};
use warp::reply::{self, Reply, Response};

use super::db::{BallotOutcome, PollStore};
use super::{pages, redirect, with_store, App};
use crate::error::VoteError;
use crate::voting::{Ballot, Category, Ticket};

pub const VOTE_RECORDED: &str = "Your vote has been submitted successfully! Thank you.";

#[derive(Debug, Deserialize)]
pub struct TokenQuery {
    pub token: String,
}

/// Checks that `token` names a ticket that may vote right now.
pub fn admit(store: &dyn PollStore, token: &str) -> Result<Ticket, VoteError> {
    let ticket = store.find_ticket(token)?.ok_or(VoteError::TicketNotFound)?;
    if !ticket.valid {
        return Err(VoteError::TicketSpent);
    }
    if !store.poll_open()? {
        return Err(VoteError::PollClosed);
    }
    Ok(ticket)
}

pub fn open_ballot(store: &dyn PollStore, token: &str) -> Result<Vec<Category>, VoteError> {
    admit(store, token)?;
    Ok(store.categories()?)
}

/// Records one vote per category field and burns the ticket.
/// Returns the number of votes written.
pub fn submit_ballot(
    store: &dyn PollStore,
    token: &str,
    fields: &[(String, String)],
) -> Result<usize, VoteError> {
    admit(store, token)?;
    let ballot = Ballot::from_form(fields)?;

    match store.cast_ballot(token, &ballot.study_ids())? {
        BallotOutcome::Recorded(count) => Ok(count),
        // another submission burned the ticket after admit
        BallotOutcome::TicketSpent => Err(VoteError::TicketSpent),
    }
}

fn rejected(err: &VoteError) -> Response {
    match err {
        VoteError::Store(source) => error!("Vote failed: {source}"),
        VoteError::Invalid(source) => warn!("Ballot rejected: {source}"),
        other => info!("Ticket turned away: {other}"),
    }
    redirect("/", Some(err.user_message()))
}

/// QR codes carry `?token=`; send the holder on to their ballot.
pub async fn follow_link(query: TokenQuery) -> Result<Response, Infallible> {
    let url_safe = query
        .token
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if query.token.is_empty() || !url_safe {
        return Ok(rejected(&VoteError::TicketNotFound));
    }
    Ok(redirect(&format!("/vote/{}", query.token), None))
}

pub async fn show(token: String, app: Arc<App>) -> Result<Response, Infallible> {
    let lookup = token.clone();
    let outcome = with_store(&app.store, move |store| open_ballot(store, &lookup)).await;

    Ok(match outcome {
        Ok(categories) => reply::html(pages::ballot(&token, &categories)).into_response(),
        Err(err) => rejected(&err),
    })
}

pub async fn submit(
    token: String,
    fields: Vec<(String, String)>,
    app: Arc<App>,
) -> Result<Response, Infallible> {
    let outcome = with_store(&app.store, move |store| submit_ballot(store, &token, &fields)).await;

    Ok(match outcome {
        Ok(count) => {
            info!("Recorded {count} votes");
            redirect("/", Some(VOTE_RECORDED))
        }
        Err(err) => rejected(&err),
    })
}
