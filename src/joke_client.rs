use anyhow::{anyhow, Result};
use reqwest::blocking::Client;
use serde::Deserialize;
use std::thread;
use std::time::Duration;
use tracing::info;

use crate::models::{Joke, JokeInfo, JokeStore, JOKE_AUTHOR};

const BASE_URL: &str = "https://v2.jokeapi.dev";

/// Ids requested per windowed joke fetch.
const WINDOW_SIZE: u32 = 10;

/// Query parameters for the joke endpoint. Everything is optional; the
/// category falls back to "Any".
#[derive(Debug, Clone, Default)]
pub struct EndpointParams {
    pub category: Option<String>,
    pub id_range: Option<(u32, u32)>,
    pub amount: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct InfoResponse {
    jokes: InfoJokes,
}

#[derive(Debug, Deserialize)]
struct InfoJokes {
    #[serde(rename = "safeJokes")]
    safe_jokes: Vec<SafeJokeCount>,
    categories: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct SafeJokeCount {
    lang: String,
    count: u32,
}

/// One page of the joke endpoint. Windows that fall entirely into an id gap
/// come back as an error body without a `jokes` array.
#[derive(Debug, Deserialize)]
struct JokesPage {
    #[serde(default)]
    jokes: Option<Vec<Joke>>,
}

#[derive(Clone)]
pub struct JokeApiClient {
    client: Client,
    base_url: String,
}

impl JokeApiClient {
    pub fn new() -> Self {
        Self::with_base_url(BASE_URL)
    }

    /// Same client against a different host; used by the tests.
    pub fn with_base_url(base_url: &str) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .user_agent(concat!("joke_reader/", env!("CARGO_PKG_VERSION")))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Builds a fully qualified joke endpoint. The safe-mode flag is always
    /// appended last; category names are percent-encoded. No network I/O.
    pub fn build_endpoint(&self, params: Option<&EndpointParams>) -> String {
        let mut endpoint = format!("{}/joke/", self.base_url);

        match params {
            Some(params) => {
                match &params.category {
                    Some(category) => endpoint.push_str(&urlencoding::encode(category)),
                    None => endpoint.push_str("Any"),
                }
                endpoint.push('?');

                if let Some((lo, hi)) = params.id_range {
                    endpoint.push_str(&format!("idRange={}-{}&", lo, hi));
                }
                if let Some(amount) = params.amount {
                    endpoint.push_str(&format!("amount={}&", amount));
                }
            }
            None => endpoint.push_str("Any?amount=10&"),
        }

        endpoint.push_str("safe-mode");
        endpoint
    }

    /// Fetches the safe-joke count for `lang` plus the category list from
    /// the info endpoint. Network and parse errors propagate; no retry.
    pub fn fetch_info(&self, lang: &str) -> Result<JokeInfo> {
        let endpoint = format!("{}/info", self.base_url);
        let response: InfoResponse = self
            .client
            .get(&endpoint)
            .send()?
            .error_for_status()?
            .json()?;

        let count = response
            .jokes
            .safe_jokes
            .iter()
            .find(|entry| entry.lang == lang)
            .map(|entry| entry.count)
            .ok_or_else(|| anyhow!("no safe-joke count for language {:?}", lang))?;

        Ok(JokeInfo {
            count,
            categories: response.jokes.categories,
        })
    }

    /// Fetches the whole corpus in windows of ten ids covering
    /// `[0, total)`, one thread per window, joined before any merge. A
    /// single failed window fails the whole batch; windows that land in an
    /// id gap (no `jokes` array in the body) are skipped. Every merged joke
    /// gets the fixed author label and zero likes.
    pub fn fetch_all_jokes(&self, total: u32) -> Result<JokeStore> {
        let mut handles = Vec::new();
        let mut start = 0;
        while start < total {
            let client = self.clone();
            handles.push(thread::spawn(move || {
                client.fetch_window(start, start + WINDOW_SIZE - 1)
            }));
            start += WINDOW_SIZE;
        }

        let mut merged = JokeStore::new();
        for handle in handles {
            let jokes = handle
                .join()
                .map_err(|_| anyhow!("joke fetch thread panicked"))??;
            for mut joke in jokes {
                joke.author = JOKE_AUTHOR.to_string();
                joke.likes = 0;
                merged.insert(joke.id, joke);
            }
        }

        info!(jokes = merged.len(), "merged joke windows");
        Ok(merged)
    }

    fn fetch_window(&self, lo: u32, hi: u32) -> Result<Vec<Joke>> {
        let endpoint = self.build_endpoint(Some(&EndpointParams {
            category: None,
            id_range: Some((lo, hi)),
            amount: Some(WINDOW_SIZE),
        }));

        let page: JokesPage = self
            .client
            .get(&endpoint)
            .send()?
            .error_for_status()?
            .json()?;

        Ok(page.jokes.unwrap_or_default())
    }
}

impl Default for JokeApiClient {
    fn default() -> Self {
        Self::new()
    }
}
