mod ballot;
mod catalogue;
mod poll_result;
mod qr;
mod token;

pub use ballot::{Ballot, Selection, CATEGORY_FIELD_PREFIX};
pub use catalogue::{Catalogue, CatalogueEntry, Category, Study, Ticket};
pub use poll_result::{CategoryResult, PollResult, StudyTally};
pub use qr::{emit_qr_codes, ticket_url, QR_MODULE_SCALE};
pub use token::{generate_tokens, generate_tokens_with, DEFAULT_TOKEN_BYTES, MAX_ATTEMPTS_PER_TOKEN};
