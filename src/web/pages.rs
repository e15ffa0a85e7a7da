use std::fmt::Write as _;

use crate::voting::{Category, PollResult, CATEGORY_FIELD_PREFIX};

pub const DEFAULT_HOME_MESSAGE: &str = "See the Live Poll Below";

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn layout(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
         <title>{}</title>\n</head>\n<body>\n{body}\n</body>\n</html>\n",
        escape(title)
    )
}

fn message_block(message: Option<&str>) -> String {
    match message {
        Some(message) if !message.is_empty() => {
            format!("<p class=\"message\">{}</p>", escape(message))
        }
        _ => String::new(),
    }
}

pub fn home(message: Option<&str>) -> String {
    let message = message.unwrap_or(DEFAULT_HOME_MESSAGE);
    let body = format!(
        "<h1>Poll</h1>\n{}\n<form method=\"post\" action=\"/\">\n\
         <button type=\"submit\" name=\"action\" value=\"results\">View results</button>\n</form>",
        message_block(Some(message))
    );
    layout("Poll", &body)
}

pub fn ballot(token: &str, categories: &[Category]) -> String {
    let mut body = format!(
        "<h1>Cast your vote</h1>\n<form method=\"post\" action=\"/vote/{}\">\n",
        escape(token)
    );
    for category in categories {
        let _ = write!(
            body,
            "<label>{name}\n<select name=\"{CATEGORY_FIELD_PREFIX}{id}\" required>\n",
            name = escape(&category.name),
            id = category.id,
        );
        for study in &category.studies {
            let _ = writeln!(
                body,
                "<option value=\"{}\">{}</option>",
                study.id,
                escape(&study.name)
            );
        }
        body.push_str("</select>\n</label>\n");
    }
    body.push_str("<button type=\"submit\">Submit vote</button>\n</form>");
    layout("Vote", &body)
}

pub fn results(result: &PollResult) -> String {
    let mut body = String::from("<h1>Results</h1>\n");
    for category in &result.categories {
        let _ = writeln!(body, "<h2>{}</h2>\n<table>", escape(&category.name));
        for study in &category.studies {
            let _ = writeln!(
                body,
                "<tr><td>{}</td><td>{}</td>\
                 <td><div class=\"bar\" style=\"width: {:.0}%\"></div></td></tr>",
                escape(&study.name),
                study.count,
                study.percent
            );
        }
        body.push_str("</table>\n");
    }
    layout("Results", &body)
}

pub fn login(error: Option<&str>) -> String {
    let body = format!(
        "<h1>Admin login</h1>\n{}\n<form method=\"post\" action=\"/login\">\n\
         <input type=\"password\" name=\"password\" autofocus>\n\
         <button type=\"submit\">Log in</button>\n</form>",
        message_block(error)
    );
    layout("Admin login", &body)
}

pub fn admin_dashboard(is_poll_open: bool, total_votes: i64, message: Option<&str>) -> String {
    let state = if is_poll_open { "OPEN" } else { "CLOSED" };
    let body = format!(
        "<h1>Admin</h1>\n{}\n<p>Poll is <strong>{state}</strong>. Total votes: {total_votes}</p>\n\
         <form method=\"post\" action=\"/admin\">\n\
         <button type=\"submit\" name=\"action\" value=\"toggle_poll\">Toggle poll</button>\n\
         <button type=\"submit\" name=\"action\" value=\"reset_poll\">Reset votes</button>\n\
         <button type=\"submit\" name=\"action\" value=\"reset_db\">Reset database</button>\n\
         <button type=\"submit\" name=\"action\" value=\"logout\">Log out</button>\n</form>",
        message_block(message)
    );
    layout("Admin", &body)
}
