use std::path::Path;

use tracing::info;

use crate::error::IssueError;
use crate::voting::{emit_qr_codes, generate_tokens};
use crate::web::db::PollStore;

/// Generates `count` new tickets, writes their QR codes into `out_dir` and
/// then stores them as valid. Returns the new tokens.
///
/// With a store, new tokens avoid every stored one. Codes are written before
/// the insert, so a failed write leaves no ticket without an image.
pub fn issue_tickets(
    store: Option<&dyn PollStore>,
    count: usize,
    base_url: &str,
    out_dir: &Path,
    nbytes: usize,
) -> Result<Vec<String>, IssueError> {
    let existing = match store {
        Some(store) => store.ticket_ids()?,
        None => Vec::new(),
    };
    let known = existing.len();

    let mut tokens = generate_tokens(count, existing, nbytes)?;
    let fresh = tokens.split_off(known);

    emit_qr_codes(base_url, &fresh, out_dir)?;

    if let Some(store) = store {
        let inserted = store.add_tickets(&fresh)?;
        info!("Stored {inserted} new tickets");
    }
    Ok(fresh)
}
