use anyhow::Result;
use std::cell::Cell;
use std::rc::Rc;
use tracing::info;

use crate::card::JokeCard;
use crate::daily::{self, DailySelectionStore};
use crate::models::{Joke, JokeStore};
use crate::store::JokeCache;

/// Cards per page.
pub const PAGE_SIZE: usize = 12;

/// Sorted view of the store, descending by likes. Tie order is whatever the
/// sort leaves behind; callers must not rely on it.
pub fn sort_by_likes(store: &JokeStore) -> Vec<Joke> {
    let mut jokes: Vec<Joke> = store.values().cloned().collect();
    jokes.sort_by(|a, b| b.likes.cmp(&a.likes));
    jokes
}

/// Positional diff of two id orders: false only when both sequences are
/// identical; any reordering or length change counts as changed.
pub fn needs_refresh(current: &[u32], updated: &[u32]) -> bool {
    if current.len() != updated.len() {
        return true;
    }
    current.iter().zip(updated).any(|(a, b)| a != b)
}

/// Partitions the sorted view into fixed-size pages.
pub fn paginate(sorted: Vec<Joke>) -> Vec<Vec<Joke>> {
    let mut pages = Vec::new();
    let mut page = Vec::new();
    for joke in sorted {
        if page.len() == PAGE_SIZE {
            pages.push(page);
            page = Vec::new();
        }
        page.push(joke);
    }
    if !page.is_empty() {
        pages.push(page);
    }
    pages
}

/// Parses a `#page-N` fragment into a 1-based page number.
pub fn parse_page_fragment(fragment: &str) -> Option<usize> {
    let fragment = fragment.strip_prefix('#').unwrap_or(fragment);
    let number: usize = fragment.strip_prefix("page-")?.parse().ok()?;
    (number >= 1).then_some(number)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// No cached store yet; the owner must run the info + fetch sequence,
    /// save the result and sync again with `init = true`.
    Empty,
    Populated,
}

/// Fetch -> cache -> sort -> paginate -> display control flow. Cards are
/// rebuilt only when the sorted id order actually changed; the pagination
/// controls (page count, initially visible page) only on init. There is no
/// terminal state: every like re-enters the pipeline.
pub struct RenderPipeline {
    state: PipelineState,
    last_order: Vec<u32>,
    pages: Vec<Vec<JokeCard>>,
    page_count: usize,
    active_page: usize,
    daily_joke: Option<Joke>,
    refresh_requested: Rc<Cell<bool>>,
}

impl RenderPipeline {
    /// `initial_fragment` is the `#page-N` selector; anything malformed
    /// falls back to page 1.
    pub fn new(initial_fragment: Option<&str>) -> Self {
        let active_page = initial_fragment
            .and_then(parse_page_fragment)
            .unwrap_or(1);
        Self {
            state: PipelineState::Empty,
            last_order: Vec::new(),
            pages: Vec::new(),
            page_count: 0,
            active_page,
            daily_joke: None,
            refresh_requested: Rc::new(Cell::new(false)),
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn is_empty(&self) -> bool {
        self.state == PipelineState::Empty
    }

    pub fn page_count(&self) -> usize {
        self.page_count
    }

    /// 1-based.
    pub fn active_page(&self) -> usize {
        self.active_page
    }

    pub fn set_active_page(&mut self, page: usize) {
        if (1..=self.page_count.max(1)).contains(&page) {
            self.active_page = page;
        }
    }

    pub fn daily_joke(&self) -> Option<&Joke> {
        self.daily_joke.as_ref()
    }

    /// The cards of the currently selected page.
    pub fn active_cards_mut(&mut self) -> &mut [JokeCard] {
        let index = self.active_page.saturating_sub(1);
        match self.pages.get_mut(index) {
            Some(page) => page.as_mut_slice(),
            None => &mut [],
        }
    }

    /// True once after any card asked for a re-render via its like handler.
    pub fn take_refresh_request(&mut self) -> bool {
        self.refresh_requested.replace(false)
    }

    /// Recomputes the view from the cache: sorted order, daily selection,
    /// and, when `init` or the order changed, the card pages.
    pub fn sync(
        &mut self,
        cache: &dyn JokeCache,
        daily_store: &dyn DailySelectionStore,
        init: bool,
    ) -> Result<()> {
        let Some(store) = cache.load()? else {
            self.state = PipelineState::Empty;
            return Ok(());
        };
        self.state = PipelineState::Populated;

        let sorted = sort_by_likes(&store);

        // A persisted selection pointing at an id that is no longer in the
        // store yields no daily joke at all.
        self.daily_joke = daily::select_daily_joke(daily_store, &sorted)?
            .and_then(|id| store.get(&id).cloned());

        let updated: Vec<u32> = sorted.iter().map(|joke| joke.id).collect();
        if init || needs_refresh(&self.last_order, &updated) {
            self.rebuild_cards(sorted, init);
            self.last_order = updated;
        }
        Ok(())
    }

    fn rebuild_cards(&mut self, sorted: Vec<Joke>, init: bool) {
        for card in self.pages.iter_mut().flatten() {
            card.detach();
        }

        let pages = paginate(sorted);
        if init {
            self.page_count = pages.len();
            if self.active_page > self.page_count {
                self.active_page = 1;
            }
        }

        let flag = self.refresh_requested.clone();
        self.pages = pages
            .into_iter()
            .map(|page| {
                page.iter()
                    .map(|joke| {
                        let mut card = JokeCard::from_joke(joke);
                        let flag = flag.clone();
                        card.on_like(move |_, _| flag.set(true));
                        card.attach();
                        card
                    })
                    .collect()
            })
            .collect();

        info!(pages = self.pages.len(), init, "rebuilt joke cards");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::daily::MemoryDailyStore;
    use crate::models::{JokeKind, JOKE_AUTHOR};
    use crate::store::SessionCache;

    fn joke(id: u32, likes: u32) -> Joke {
        Joke {
            id,
            category: "Misc".to_string(),
            kind: JokeKind::Single,
            joke: Some(format!("joke {id}")),
            setup: None,
            delivery: None,
            author: JOKE_AUTHOR.to_string(),
            likes,
        }
    }

    fn store_of(jokes: impl IntoIterator<Item = Joke>) -> JokeStore {
        jokes.into_iter().map(|j| (j.id, j)).collect()
    }

    #[test]
    fn sorted_view_is_a_non_increasing_permutation() {
        let store = store_of([joke(1, 2), joke(2, 9), joke(3, 0), joke(4, 9)]);
        let sorted = sort_by_likes(&store);

        assert_eq!(sorted.len(), store.len());
        for window in sorted.windows(2) {
            assert!(window[0].likes >= window[1].likes);
        }
        let mut ids: Vec<u32> = sorted.iter().map(|j| j.id).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 2, 3, 4]);
    }

    #[test]
    fn needs_refresh_only_on_real_changes() {
        assert!(!needs_refresh(&[], &[]));
        assert!(!needs_refresh(&[1, 2, 3], &[1, 2, 3]));
        // Single swap.
        assert!(needs_refresh(&[1, 2, 3], &[1, 3, 2]));
        // Insertion.
        assert!(needs_refresh(&[1, 2, 3], &[1, 2, 3, 4]));
        // Removal.
        assert!(needs_refresh(&[1, 2, 3], &[1, 2]));
    }

    #[test]
    fn paginates_into_fixed_size_pages() {
        let pages = paginate((0..22).map(|id| joke(id, 0)).collect());
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].len(), 12);
        assert_eq!(pages[1].len(), 10);

        assert_eq!(paginate(Vec::new()).len(), 0);
        assert_eq!(paginate((0..12).map(|id| joke(id, 0)).collect()).len(), 1);
    }

    #[test]
    fn parses_page_fragments() {
        assert_eq!(parse_page_fragment("#page-3"), Some(3));
        assert_eq!(parse_page_fragment("page-1"), Some(1));
        assert_eq!(parse_page_fragment("#page-0"), None);
        assert_eq!(parse_page_fragment("#page-x"), None);
        assert_eq!(parse_page_fragment("#settings"), None);
        assert_eq!(parse_page_fragment(""), None);
    }

    #[test]
    fn stays_empty_without_a_cached_store() {
        let cache = SessionCache::new();
        let daily = MemoryDailyStore::default();
        let mut pipeline = RenderPipeline::new(None);

        pipeline.sync(&cache, &daily, true).unwrap();
        assert!(pipeline.is_empty());
        assert_eq!(pipeline.page_count(), 0);
        assert!(pipeline.daily_joke().is_none());
    }

    #[test]
    fn malformed_initial_fragment_falls_back_to_page_one() {
        assert_eq!(RenderPipeline::new(Some("#page-abc")).active_page(), 1);
        assert_eq!(RenderPipeline::new(Some("#page-2")).active_page(), 2);
        assert_eq!(RenderPipeline::new(None).active_page(), 1);
    }

    #[test]
    fn init_clamps_out_of_range_fragment_page() {
        let cache = SessionCache::new();
        cache
            .save(&store_of((0..5).map(|id| joke(id, 0))))
            .unwrap();
        let daily = MemoryDailyStore::default();

        let mut pipeline = RenderPipeline::new(Some("#page-9"));
        pipeline.sync(&cache, &daily, true).unwrap();
        assert_eq!(pipeline.active_page(), 1);
    }

    #[test]
    fn liked_page_two_joke_moves_to_the_front_after_resync() {
        let cache = SessionCache::new();
        cache
            .save(&store_of((0..22).map(|id| joke(id, 0))))
            .unwrap();
        let daily = MemoryDailyStore::default();

        let mut pipeline = RenderPipeline::new(None);
        pipeline.sync(&cache, &daily, true).unwrap();

        assert_eq!(pipeline.state(), PipelineState::Populated);
        assert_eq!(pipeline.page_count(), 2);
        assert_eq!(pipeline.pages[0].len(), 12);
        assert_eq!(pipeline.pages[1].len(), 10);
        assert!(pipeline.daily_joke().is_some());

        // Like the first joke on page two; one like outranks everything.
        let liked_id = pipeline.pages[1][0].id();
        pipeline.pages[1][0].increment(&cache).unwrap();

        assert!(pipeline.take_refresh_request());
        pipeline.sync(&cache, &daily, false).unwrap();

        assert_eq!(pipeline.pages[0][0].id(), liked_id);
        assert_eq!(pipeline.pages[0][0].likes(), 1);
        // The page layout itself is unchanged: still 12 + 10.
        assert_eq!(pipeline.page_count(), 2);
        assert_eq!(pipeline.pages[1].len(), 10);
    }

    #[test]
    fn unchanged_order_does_not_rebuild_cards() {
        let cache = SessionCache::new();
        cache
            .save(&store_of([joke(1, 5), joke(2, 3)]))
            .unwrap();
        let daily = MemoryDailyStore::default();

        let mut pipeline = RenderPipeline::new(None);
        pipeline.sync(&cache, &daily, true).unwrap();
        let before: Vec<u32> = pipeline.pages[0].iter().map(|c| c.id()).collect();

        // Liking the current leader keeps the order stable.
        pipeline.pages[0][0].increment(&cache).unwrap();
        pipeline.sync(&cache, &daily, false).unwrap();

        let after: Vec<u32> = pipeline.pages[0].iter().map(|c| c.id()).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn daily_selection_survives_resyncs_with_changed_order() {
        let cache = SessionCache::new();
        cache
            .save(&store_of((0..4).map(|id| joke(id, 0))))
            .unwrap();
        let daily = MemoryDailyStore::default();

        let mut pipeline = RenderPipeline::new(None);
        pipeline.sync(&cache, &daily, true).unwrap();
        let first = pipeline.daily_joke().unwrap().id;

        cache.set_likes(3, 10).unwrap();
        pipeline.sync(&cache, &daily, false).unwrap();
        assert_eq!(pipeline.daily_joke().unwrap().id, first);
    }
}
