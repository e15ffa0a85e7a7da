pub mod admin_api;
pub mod ballot_api;
pub mod db;
pub mod pages;
pub mod result_api;
pub mod session;

use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::Deserialize;
use tracing::info;
use warp::filters::BoxedFilter;
use warp::http::{header, StatusCode};
use warp::reply::{self, Reply, Response};
use warp::Filter;

use crate::error::StoreError;
use db::PollStore;
use session::{AdminSession, SessionKey, SESSION_COOKIE};

/// Form bodies above this size are refused.
const FORM_LIMIT: u64 = 16 * 1024;

/// Shared state handed to every handler.
pub struct App {
    pub store: Arc<dyn PollStore>,
    pub sessions: SessionKey,
    pub admin_password: String,
    pub session_ttl: Duration,
}

impl App {
    pub fn new(
        store: Arc<dyn PollStore>,
        admin_password: String,
        secret_key: &str,
        session_ttl: Duration,
    ) -> App {
        App {
            store,
            sessions: SessionKey::derive(secret_key),
            admin_password,
            session_ttl,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct MessageQuery {
    pub message: Option<String>,
}

/// Runs blocking store work off the async executor.
pub async fn with_store<T, E, F>(store: &Arc<dyn PollStore>, f: F) -> Result<T, E>
where
    F: FnOnce(&dyn PollStore) -> Result<T, E> + Send + 'static,
    T: Send + 'static,
    E: From<StoreError> + Send + 'static,
{
    let store = Arc::clone(store);
    match tokio::task::spawn_blocking(move || f(store.as_ref())).await {
        Ok(result) => result,
        Err(err) => Err(StoreError::from(err).into()),
    }
}

/// A 303 to `path`, optionally carrying a message for the next page.
pub fn redirect(path: &str, message: Option<&str>) -> Response {
    let location = match message {
        Some(message) => {
            let query = serde_urlencoded::to_string([("message", message)]).unwrap_or_default();
            format!("{path}?{query}")
        }
        None => path.to_owned(),
    };
    reply::with_header(
        reply::with_status(warp::reply(), StatusCode::SEE_OTHER),
        header::LOCATION,
        location,
    )
    .into_response()
}

fn with_app(app: Arc<App>) -> impl Filter<Extract = (Arc<App>,), Error = Infallible> + Clone {
    warp::any().map(move || app.clone())
}

fn with_session(app: Arc<App>) -> BoxedFilter<(Option<AdminSession>,)> {
    warp::cookie::optional::<String>(SESSION_COOKIE)
        .map(move |cookie: Option<String>| {
            cookie.and_then(|token| app.sessions.verify(&token, Utc::now()))
        })
        .boxed()
}

fn form<T>() -> impl Filter<Extract = (T,), Error = warp::Rejection> + Clone
where
    T: serde::de::DeserializeOwned + Send,
{
    warp::body::content_length_limit(FORM_LIMIT).and(warp::body::form())
}

async fn home(query: MessageQuery) -> Result<Response, Infallible> {
    Ok(reply::html(pages::home(query.message.as_deref())).into_response())
}

async fn home_action(fields: HashMap<String, String>) -> Result<Response, Infallible> {
    if fields.get("action").map(String::as_str) == Some("results") {
        return Ok(redirect("/results", None));
    }
    Ok(reply::html(pages::home(None)).into_response())
}

pub fn routes(app: Arc<App>) -> impl Filter<Extract = (impl Reply,), Error = warp::Rejection> + Clone {
    let home_get = warp::path::end()
        .and(warp::get())
        .and(warp::query::<MessageQuery>())
        .and_then(home);
    let home_post = warp::path::end()
        .and(warp::post())
        .and(form::<HashMap<String, String>>())
        .and_then(home_action);

    let vote_link = warp::path!("vote")
        .and(warp::get())
        .and(warp::query::<ballot_api::TokenQuery>())
        .and_then(ballot_api::follow_link);
    let vote_get = warp::path!("vote" / String)
        .and(warp::get())
        .and(with_app(app.clone()))
        .and_then(ballot_api::show);
    let vote_post = warp::path!("vote" / String)
        .and(warp::post())
        .and(form::<Vec<(String, String)>>())
        .and(with_app(app.clone()))
        .and_then(ballot_api::submit);

    let results_page = warp::path!("results")
        .and(warp::get())
        .and(with_app(app.clone()))
        .and_then(result_api::page);
    let results_json = warp::path!("api" / "results")
        .and(warp::get())
        .and(with_app(app.clone()))
        .and_then(result_api::json);

    let login_get = warp::path!("login")
        .and(warp::get())
        .and(with_session(app.clone()))
        .and_then(admin_api::login_page);
    let login_post = warp::path!("login")
        .and(warp::post())
        .and(form::<admin_api::LoginForm>())
        .and(with_app(app.clone()))
        .and_then(admin_api::login);

    let admin_get = warp::path!("admin")
        .and(warp::get())
        .and(with_session(app.clone()))
        .and(warp::query::<MessageQuery>())
        .and(with_app(app.clone()))
        .and_then(admin_api::dashboard);
    let admin_post = warp::path!("admin")
        .and(warp::post())
        .and(with_session(app.clone()))
        .and(form::<admin_api::ActionForm>())
        .and(with_app(app.clone()))
        .and_then(admin_api::act);

    let logout = warp::path!("logout")
        .and(warp::get())
        .and(with_app(app))
        .and_then(admin_api::logout);

    home_get
        .or(home_post)
        .or(vote_link)
        .or(vote_get)
        .or(vote_post)
        .or(results_page)
        .or(results_json)
        .or(login_get)
        .or(login_post)
        .or(admin_get)
        .or(admin_post)
        .or(logout)
        .with(warp::trace::request())
}

pub async fn serve(app: Arc<App>, addr: SocketAddr) {
    info!("Listening on {addr}");
    warp::serve(routes(app)).run(addr).await;
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::voting::Catalogue;
    use db::memory::MemoryStore;

    pub const PASSWORD: &str = "let-me-in";

    /// App over a memory store holding two categories, with study ids:
    /// Sustainable = {2: Wind Farm, 3: Solar Roof}, Community = {2: Wind Farm, 5: Garden}.
    pub fn app() -> (Arc<App>, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::default());
        store.init().unwrap();
        let catalogue = Catalogue::from_json(
            r#"{"categories": [
                {"name": "Sustainable", "studies": ["Wind Farm", "Solar Roof"]},
                {"name": "Community", "studies": ["Wind Farm", "Garden"]}
            ]}"#,
        )
        .unwrap();
        store.load_catalogue(&catalogue).unwrap();

        let app = App::new(store.clone(), PASSWORD.to_owned(), "test secret", Duration::minutes(60));
        (Arc::new(app), store)
    }

    pub fn location(res: &warp::http::Response<warp::hyper::body::Bytes>) -> &str {
        res.headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
    }
}
