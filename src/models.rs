use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Author label stamped on every joke at fetch time; the API itself has no
/// author field.
pub const JOKE_AUTHOR: &str = "JokesAPI";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JokeKind {
    Single,
    Twopart,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Joke {
    pub id: u32,
    pub category: String,
    #[serde(rename = "type")]
    pub kind: JokeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub joke: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub setup: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery: Option<String>,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub likes: u32,
}

impl Joke {
    /// Flattens the joke body for display: two-part jokes become
    /// "setup\ndelivery", single jokes are the body as-is.
    pub fn flattened_text(&self) -> String {
        match self.kind {
            JokeKind::Single => self.joke.clone().unwrap_or_default(),
            JokeKind::Twopart => format!(
                "{}\n{}",
                self.setup.as_deref().unwrap_or_default(),
                self.delivery.as_deref().unwrap_or_default()
            ),
        }
    }
}

/// The session cache maps joke id to joke. Ids are unique within one
/// snapshot; entries are created on fetch and never deleted in-session.
pub type JokeStore = HashMap<u32, Joke>;

/// Summary returned by the info endpoint: how many safe jokes exist for the
/// selected language, and which categories the service knows about.
#[derive(Debug, Clone)]
pub struct JokeInfo {
    pub count: u32,
    pub categories: Vec<String>,
}
