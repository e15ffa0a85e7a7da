use serde::{Deserialize, Serialize};

/// A candidate that can be chosen within one or more categories.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Study {
    pub id: i32,
    pub name: String,
}

/// A voting category and the studies listed under it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Category {
    pub id: i32,
    pub name: String,
    pub studies: Vec<Study>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ticket {
    pub id: String,
    pub valid: bool,
}

/// Categories and studies to load before a poll, as read from JSON:
///
/// ```json
/// {"categories": [{"name": "Sustainability", "studies": ["Wind Farm", "Solar Roof"]}]}
/// ```
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
pub struct Catalogue {
    pub categories: Vec<CatalogueEntry>,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct CatalogueEntry {
    pub name: String,
    #[serde(default)]
    pub studies: Vec<String>,
}

impl Catalogue {
    pub fn from_json(raw: &str) -> serde_json::Result<Catalogue> {
        serde_json::from_str(raw)
    }

    pub fn study_links(&self) -> usize {
        self.categories.iter().map(|c| c.studies.len()).sum()
    }
}
