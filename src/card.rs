use anyhow::Result;
use tracing::{info, warn};

use crate::models::Joke;
use crate::store::JokeCache;

/// Fixed footer appended to shared jokes.
pub const SHARE_FOOTER: &str =
    "Shared from Joke Reader. Jokes by JokeAPI: https://v2.jokeapi.dev";

/// What an attached card presents.
#[derive(Debug, Clone, PartialEq)]
pub struct CardView {
    pub joke_id: u32,
    pub category: String,
    pub author: String,
    pub text: String,
    pub likes: u32,
}

type LikeHandler = Box<dyn FnMut(u32, u32)>;

/// View-model for one joke card. Carries its construction attributes until
/// `attach()` renders them into the view; owns its own like counter and
/// writes it back through the joke cache on `increment()`.
pub struct JokeCard {
    id: u32,
    category: String,
    // Consumed once on attach; external mutation afterwards is not synced.
    attr_text: Option<String>,
    attr_author: Option<String>,
    likes: u32,
    view: Option<CardView>,
    on_like: Option<LikeHandler>,
}

impl JokeCard {
    pub fn from_joke(joke: &Joke) -> Self {
        Self {
            id: joke.id,
            category: joke.category.clone(),
            attr_text: Some(joke.flattened_text()),
            attr_author: Some(joke.author.clone()),
            likes: joke.likes,
            view: None,
            on_like: None,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn likes(&self) -> u32 {
        self.likes
    }

    pub fn view(&self) -> Option<&CardView> {
        self.view.as_ref()
    }

    /// Registers the handler fired after every like, with the joke id and
    /// the new count. The owner uses it to request a pipeline re-render.
    pub fn on_like(&mut self, handler: impl FnMut(u32, u32) + 'static) {
        self.on_like = Some(Box::new(handler));
    }

    /// Renders the construction attributes into the internal view and
    /// clears the text-bearing ones. Attaching twice is a no-op.
    pub fn attach(&mut self) {
        if self.view.is_some() {
            return;
        }
        let text = self.attr_text.take().unwrap_or_default();
        let author = self.attr_author.take().unwrap_or_default();
        self.view = Some(CardView {
            joke_id: self.id,
            category: self.category.clone(),
            author,
            text,
            likes: self.likes,
        });
    }

    /// Drops the registered handler so nothing dangles after the card
    /// leaves the page.
    pub fn detach(&mut self) {
        self.on_like = None;
    }

    /// Bumps the like counter, reflects it in the view, writes the new
    /// count through the cache and fires the registered handler.
    pub fn increment(&mut self, cache: &dyn JokeCache) -> Result<u32> {
        self.likes += 1;
        if let Some(view) = self.view.as_mut() {
            view.likes = self.likes;
        }
        cache.set_likes(self.id, self.likes)?;

        let (id, likes) = (self.id, self.likes);
        if let Some(handler) = self.on_like.as_mut() {
            handler(id, likes);
        }
        Ok(likes)
    }

    /// The joke text plus the fixed footer, or `None` before attach.
    pub fn share_message(&self) -> Option<String> {
        self.view
            .as_ref()
            .map(|view| format!("{}\n\n{}", view.text, SHARE_FOOTER))
    }

    /// Best-effort copy of the share message to the system clipboard.
    /// Failures are logged, never surfaced.
    pub fn share(&self, clipboard: &mut arboard::Clipboard) {
        let Some(message) = self.share_message() else {
            warn!(joke_id = self.id, "share requested before attach");
            return;
        };
        match clipboard.set_text(message) {
            Ok(()) => info!(joke_id = self.id, "joke copied to clipboard"),
            Err(e) => warn!(joke_id = self.id, error = %e, "failed to share joke"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{JokeKind, JokeStore, JOKE_AUTHOR};
    use crate::store::{JokeCache, SessionCache};
    use std::cell::Cell;
    use std::rc::Rc;

    fn joke(id: u32, likes: u32) -> Joke {
        Joke {
            id,
            category: "Pun".to_string(),
            kind: JokeKind::Twopart,
            joke: None,
            setup: Some("Setup?".to_string()),
            delivery: Some("Punchline.".to_string()),
            author: JOKE_AUTHOR.to_string(),
            likes,
        }
    }

    fn cache_with(jokes: &[Joke]) -> SessionCache {
        let cache = SessionCache::new();
        let store: JokeStore = jokes.iter().cloned().map(|j| (j.id, j)).collect();
        cache.save(&store).unwrap();
        cache
    }

    #[test]
    fn attach_renders_and_consumes_text_attributes() {
        let mut card = JokeCard::from_joke(&joke(3, 1));
        assert!(card.view().is_none());

        card.attach();
        let view = card.view().unwrap().clone();
        assert_eq!(view.text, "Setup?\nPunchline.");
        assert_eq!(view.author, JOKE_AUTHOR);
        assert_eq!(view.likes, 1);
        assert!(card.attr_text.is_none());
        assert!(card.attr_author.is_none());

        // Attributes were consumed; a second attach changes nothing.
        card.attach();
        assert_eq!(card.view().unwrap(), &view);
    }

    #[test]
    fn increment_updates_view_cache_and_fires_handler() {
        let cache = cache_with(&[joke(3, 1)]);
        let mut card = JokeCard::from_joke(&joke(3, 1));
        card.attach();

        let fired = Rc::new(Cell::new(0u32));
        let observed = fired.clone();
        card.on_like(move |_, likes| observed.set(likes));

        assert_eq!(card.increment(&cache).unwrap(), 2);
        assert_eq!(card.view().unwrap().likes, 2);
        assert_eq!(fired.get(), 2);
        assert_eq!(cache.load().unwrap().unwrap()[&3].likes, 2);
    }

    #[test]
    fn detach_drops_the_handler() {
        let cache = cache_with(&[joke(3, 0)]);
        let mut card = JokeCard::from_joke(&joke(3, 0));
        card.attach();

        let fired = Rc::new(Cell::new(0u32));
        let observed = fired.clone();
        card.on_like(move |_, likes| observed.set(likes));
        card.detach();

        card.increment(&cache).unwrap();
        assert_eq!(fired.get(), 0);
    }

    #[test]
    fn share_message_carries_the_footer() {
        let mut card = JokeCard::from_joke(&joke(3, 0));
        assert!(card.share_message().is_none());

        card.attach();
        let message = card.share_message().unwrap();
        assert!(message.starts_with("Setup?\nPunchline."));
        assert!(message.ends_with(SHARE_FOOTER));
    }
}
