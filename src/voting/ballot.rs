use std::collections::HashSet;

use crate::error::{self, ValidationError};

/// Form fields starting with this prefix carry the study chosen for a category.
pub const CATEGORY_FIELD_PREFIX: &str = "cat_";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Selection {
    pub field: String,
    pub study_id: i32,
}

/// The choices submitted with one ticket, one per category field.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Ballot {
    pub selections: Vec<Selection>,
}

impl Ballot {
    /// Reads a ballot out of submitted form pairs.
    ///
    /// Fields without the category prefix are ignored. A field repeated in the
    /// same submission counts once, keeping the first value.
    pub fn from_form(fields: &[(String, String)]) -> Result<Ballot, ValidationError> {
        let mut seen = HashSet::new();
        let mut selections = vec![];

        for (field, value) in fields {
            if !field.starts_with(CATEGORY_FIELD_PREFIX) || !seen.insert(field.as_str()) {
                continue;
            }

            let study_id = value
                .trim()
                .parse::<i32>()
                .map_err(|_| error::ballot_invalid_selection(field, value))?;
            selections.push(Selection {
                field: field.clone(),
                study_id,
            });
        }

        if selections.is_empty() {
            return Err(error::ballot_empty());
        }

        Ok(Ballot { selections })
    }

    pub fn study_ids(&self) -> Vec<i32> {
        self.selections.iter().map(|s| s.study_id).collect()
    }
}
