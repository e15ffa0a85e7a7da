use std::convert::Infallible;
use std::sync::Arc;

use tracing::error;
use warp::http::StatusCode;
use warp::reply::{self, Reply, Response};

use super::db::PollStore;
use super::{pages, with_store, App};
use crate::error::StoreError;
use crate::voting::PollResult;

pub fn tally(store: &dyn PollStore) -> Result<PollResult, StoreError> {
    let categories = store.categories()?;
    let counts = store.vote_counts()?;
    Ok(PollResult::evaluate(&categories, &counts))
}

async fn evaluate(app: &App) -> Result<PollResult, Response> {
    with_store(&app.store, tally).await.map_err(|err: StoreError| {
        error!("Failed to tally results: {err}");
        reply::with_status("Failed to tally results", StatusCode::INTERNAL_SERVER_ERROR)
            .into_response()
    })
}

pub async fn page(app: Arc<App>) -> Result<Response, Infallible> {
    Ok(match evaluate(&app).await {
        Ok(result) => reply::html(pages::results(&result)).into_response(),
        Err(response) => response,
    })
}

pub async fn json(app: Arc<App>) -> Result<Response, Infallible> {
    Ok(match evaluate(&app).await {
        Ok(result) => reply::json(&result).into_response(),
        Err(response) => response,
    })
}
