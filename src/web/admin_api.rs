use std::convert::Infallible;
use std::str::FromStr;
use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use tracing::{error, info, warn};
use warp::http::header;
use warp::reply::{self, Reply, Response};

use super::db::PollStore;
use super::session::{expired_cookie, password_matches, session_cookie, AdminSession};
use super::{pages, redirect, with_store, App, MessageQuery};
use crate::error::StoreError;

pub const INVALID_CREDENTIALS: &str = "Invalid Credentials. Please try again.";
pub const LOGIN_UNAVAILABLE: &str = "Login is unavailable. Please contact the admin.";

/// Dashboard action that ends the session instead of touching the store.
pub const LOGOUT_ACTION: &str = "logout";

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ActionForm {
    #[serde(default)]
    pub action: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminAction {
    TogglePoll,
    ResetPoll,
    ResetDb,
}

impl FromStr for AdminAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "toggle_poll" => Ok(AdminAction::TogglePoll),
            "reset_poll" => Ok(AdminAction::ResetPoll),
            "reset_db" => Ok(AdminAction::ResetDb),
            other => Err(format!("unknown admin action {other:?}")),
        }
    }
}

/// Applies a store-changing action and returns the notice for the dashboard.
pub fn perform(store: &dyn PollStore, action: AdminAction) -> Result<String, StoreError> {
    match action {
        AdminAction::TogglePoll => {
            let open = store.toggle_poll()?;
            let state = if open { "OPEN" } else { "CLOSED" };
            info!("Poll is now {state}");
            Ok(format!("Poll is now {state}"))
        }
        AdminAction::ResetPoll => {
            let summary = store.reset_votes()?;
            info!(
                votes_deleted = summary.votes_deleted,
                tickets_reactivated = summary.tickets_reactivated,
                "Votes reset"
            );
            Ok(format!(
                "Reset Complete: {} votes deleted. Success: {} tickets re-activated!",
                summary.votes_deleted, summary.tickets_reactivated
            ))
        }
        AdminAction::ResetDb => {
            warn!("Resetting database");
            store.reset_store()?;
            info!("All tables recreated");
            Ok(String::from("All tables recreated successfully. Database is now empty."))
        }
    }
}

fn logged_out(app: &App) -> Response {
    app.sessions.revoke_all();
    info!("Admin logged out");
    reply::with_header(redirect("/login", None), header::SET_COOKIE, expired_cookie())
        .into_response()
}

pub async fn login_page(session: Option<AdminSession>) -> Result<Response, Infallible> {
    if session.is_some() {
        return Ok(redirect("/admin", None));
    }
    Ok(reply::html(pages::login(None)).into_response())
}

pub async fn login(form: LoginForm, app: Arc<App>) -> Result<Response, Infallible> {
    if !password_matches(&app.admin_password, &form.password) {
        warn!("Rejected admin login");
        return Ok(reply::html(pages::login(Some(INVALID_CREDENTIALS))).into_response());
    }

    let Some((session, token)) = app.sessions.issue(Utc::now(), app.session_ttl) else {
        error!("Session lifetime {} overflows the clock", app.session_ttl);
        return Ok(reply::html(pages::login(Some(LOGIN_UNAVAILABLE))).into_response());
    };
    info!(expires_at = %session.expires_at, "Admin logged in");
    Ok(reply::with_header(
        redirect("/admin", None),
        header::SET_COOKIE,
        session_cookie(&token, app.session_ttl),
    )
    .into_response())
}

pub async fn dashboard(
    session: Option<AdminSession>,
    query: MessageQuery,
    app: Arc<App>,
) -> Result<Response, Infallible> {
    if session.is_none() {
        return Ok(redirect("/login", None));
    }

    let state = with_store(&app.store, |store| {
        Ok::<_, StoreError>((store.poll_open()?, store.total_votes()?))
    })
    .await;

    Ok(match state {
        Ok((open, total_votes)) => {
            reply::html(pages::admin_dashboard(open, total_votes, query.message.as_deref()))
                .into_response()
        }
        Err(err) => {
            error!("Failed to load dashboard: {err}");
            reply::html(pages::admin_dashboard(false, 0, Some(&format!("Error: {err}"))))
                .into_response()
        }
    })
}

pub async fn act(
    session: Option<AdminSession>,
    form: ActionForm,
    app: Arc<App>,
) -> Result<Response, Infallible> {
    if session.is_none() {
        return Ok(redirect("/login", None));
    }

    if form.action == LOGOUT_ACTION {
        return Ok(logged_out(&app));
    }
    let action = match form.action.parse::<AdminAction>() {
        Ok(action) => action,
        Err(err) => {
            warn!("{err}");
            return Ok(redirect("/admin", None));
        }
    };

    let outcome = with_store(&app.store, move |store| perform(store, action)).await;
    Ok(match outcome {
        Ok(notice) => redirect("/admin", Some(&notice)),
        Err(err) => {
            error!("Admin action {action:?} failed: {err}");
            redirect("/admin", Some(&format!("Error: {err}")))
        }
    })
}

pub async fn logout(app: Arc<App>) -> Result<Response, Infallible> {
    Ok(logged_out(&app))
}

#[cfg(test)]
mod tests {
    use warp::http::StatusCode;

    use super::super::routes;
    use super::super::testing::{app, location, PASSWORD};
    use super::*;

    fn set_cookie(res: &warp::http::Response<warp::hyper::body::Bytes>) -> String {
        let raw = res.headers()[header::SET_COOKIE].to_str().unwrap();
        raw.split(';').next().unwrap().to_owned()
    }

    async fn log_in(app: &Arc<App>) -> String {
        let res = warp::test::request()
            .method("POST")
            .path("/login")
            .header("content-type", "application/x-www-form-urlencoded")
            .body(format!("password={PASSWORD}"))
            .reply(&routes(app.clone()))
            .await;
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&res), "/admin");
        set_cookie(&res)
    }

    async fn post_action(app: &Arc<App>, cookie: &str, action: &str) -> String {
        let res = warp::test::request()
            .method("POST")
            .path("/admin")
            .header("cookie", cookie)
            .header("content-type", "application/x-www-form-urlencoded")
            .body(format!("action={action}"))
            .reply(&routes(app.clone()))
            .await;
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        location(&res).to_owned()
    }

    #[test]
    fn parses_actions() {
        assert_eq!("toggle_poll".parse::<AdminAction>(), Ok(AdminAction::TogglePoll));
        assert_eq!("reset_poll".parse::<AdminAction>(), Ok(AdminAction::ResetPoll));
        assert_eq!("reset_db".parse::<AdminAction>(), Ok(AdminAction::ResetDb));
        assert!("drop_tables".parse::<AdminAction>().is_err());
        // handled by the session, never by the store
        assert!(LOGOUT_ACTION.parse::<AdminAction>().is_err());
    }

    #[test]
    fn toggle_flips_from_closed() {
        let (_, store) = app();
        assert!(!store.poll_open().unwrap());

        assert_eq!(perform(&*store, AdminAction::TogglePoll).unwrap(), "Poll is now OPEN");
        assert!(store.poll_open().unwrap());
        assert_eq!(perform(&*store, AdminAction::TogglePoll).unwrap(), "Poll is now CLOSED");
        assert!(!store.poll_open().unwrap());
    }

    #[test]
    fn reset_votes_keeps_catalogue() {
        let (_, store) = app();
        let tokens = vec![String::from("a"), String::from("b"), String::from("c")];
        store.add_tickets(&tokens).unwrap();
        store.cast_ballot("a", &[2, 5]).unwrap();
        store.cast_ballot("b", &[3]).unwrap();
        let before = store.categories().unwrap();

        let notice = perform(&*store, AdminAction::ResetPoll).unwrap();
        assert_eq!(
            notice,
            "Reset Complete: 3 votes deleted. Success: 3 tickets re-activated!"
        );
        assert_eq!(store.total_votes().unwrap(), 0);
        for token in &tokens {
            assert!(store.find_ticket(token).unwrap().unwrap().valid);
        }
        assert_eq!(store.categories().unwrap(), before);
    }

    #[test]
    fn reset_db_empties_everything() {
        let (_, store) = app();
        store.add_tickets(&[String::from("a")]).unwrap();
        store.toggle_poll().unwrap();

        perform(&*store, AdminAction::ResetDb).unwrap();
        assert!(store.categories().unwrap().is_empty());
        assert!(store.ticket_ids().unwrap().is_empty());
        assert!(!store.poll_open().unwrap());
    }

    #[tokio::test]
    async fn admin_requires_login() {
        let (app, store) = app();
        let routes = routes(app);

        let page = warp::test::request().path("/admin").reply(&routes).await;
        assert_eq!(page.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&page), "/login");

        let res = warp::test::request()
            .method("POST")
            .path("/admin")
            .header("content-type", "application/x-www-form-urlencoded")
            .body("action=toggle_poll")
            .reply(&routes)
            .await;
        assert_eq!(location(&res), "/login");
        assert!(!store.poll_open().unwrap());

        let forged = warp::test::request()
            .path("/admin")
            .header("cookie", "poll_admin=99999999999.deadbeef")
            .reply(&routes)
            .await;
        assert_eq!(location(&forged), "/login");
    }

    #[tokio::test]
    async fn wrong_password_rerenders_login() {
        let (app, _) = app();
        let res = warp::test::request()
            .method("POST")
            .path("/login")
            .header("content-type", "application/x-www-form-urlencoded")
            .body("password=guess")
            .reply(&routes(app))
            .await;

        assert_eq!(res.status(), StatusCode::OK);
        assert!(res.headers().get(header::SET_COOKIE).is_none());
        assert!(String::from_utf8_lossy(res.body()).contains(INVALID_CREDENTIALS));
    }

    #[tokio::test]
    async fn oversized_session_lifetime_refuses_login() {
        let (_, store) = app();
        let app = Arc::new(App::new(
            store,
            PASSWORD.to_owned(),
            "test secret",
            chrono::Duration::days(1_000_000_000),
        ));

        let res = warp::test::request()
            .method("POST")
            .path("/login")
            .header("content-type", "application/x-www-form-urlencoded")
            .body(format!("password={PASSWORD}"))
            .reply(&routes(app))
            .await;

        assert_eq!(res.status(), StatusCode::OK);
        assert!(res.headers().get(header::SET_COOKIE).is_none());
        assert!(String::from_utf8_lossy(res.body()).contains(LOGIN_UNAVAILABLE));
    }

    #[tokio::test]
    async fn admin_session_controls_poll() {
        let (app, store) = app();
        let cookie = log_in(&app).await;

        let page = warp::test::request()
            .path("/admin")
            .header("cookie", cookie.as_str())
            .reply(&routes(app.clone()))
            .await;
        assert_eq!(page.status(), StatusCode::OK);
        assert!(String::from_utf8_lossy(page.body()).contains("CLOSED"));

        let notice = post_action(&app, &cookie, "toggle_poll").await;
        assert_eq!(notice, "/admin?message=Poll+is+now+OPEN");
        assert!(store.poll_open().unwrap());

        let notice = post_action(&app, &cookie, "toggle_poll").await;
        assert_eq!(notice, "/admin?message=Poll+is+now+CLOSED");
        assert!(!store.poll_open().unwrap());
    }

    #[tokio::test]
    async fn logout_expires_cookie() {
        let (app, _) = app();
        let cookie = log_in(&app).await;
        let routes = routes(app);

        let res = warp::test::request()
            .method("POST")
            .path("/admin")
            .header("cookie", cookie.as_str())
            .header("content-type", "application/x-www-form-urlencoded")
            .body("action=logout")
            .reply(&routes)
            .await;
        assert_eq!(location(&res), "/login");
        assert_eq!(set_cookie(&res), "poll_admin=");

        // a copy of the old cookie no longer opens the dashboard
        let replay = warp::test::request()
            .path("/admin")
            .header("cookie", cookie.as_str())
            .reply(&routes)
            .await;
        assert_eq!(location(&replay), "/login");

        let res = warp::test::request().path("/logout").reply(&routes).await;
        assert_eq!(location(&res), "/login");
        assert_eq!(set_cookie(&res), "poll_admin=");
    }

    #[tokio::test]
    async fn logout_route_ends_session() {
        let (app, store) = app();
        let cookie = log_in(&app).await;

        let res = warp::test::request()
            .path("/logout")
            .reply(&routes(app.clone()))
            .await;
        assert_eq!(location(&res), "/login");

        assert_eq!(post_action(&app, &cookie, "toggle_poll").await, "/login");
        assert!(!store.poll_open().unwrap());
    }
}
