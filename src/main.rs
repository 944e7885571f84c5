use eframe::egui;
use egui::{Color32, CornerRadius, RichText, ScrollArea, Ui, ViewportBuilder};
use std::sync::mpsc::{Receiver, TryRecvError};
use std::sync::Arc;
use std::thread;
use tracing::{info, warn};

mod auth;
mod card;
mod daily;
mod db;
mod joke_client;
mod models;
mod pipeline;
mod store;

use crate::auth::SignInError;
use crate::card::JokeCard;
use crate::db::Database;
use crate::joke_client::JokeApiClient;
use crate::models::JokeStore;
use crate::pipeline::RenderPipeline;
use crate::store::{JokeCache, SessionCache};

fn main() -> Result<(), eframe::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("joke_reader=info")),
        )
        .init();

    // A `#page-N` argument selects the initially visible page.
    let initial_fragment = std::env::args().nth(1);

    let options = eframe::NativeOptions {
        viewport: ViewportBuilder::default()
            .with_inner_size([900.0, 700.0])
            .with_min_inner_size([600.0, 480.0])
            .with_title("Joke Reader"),
        ..Default::default()
    };

    eframe::run_native(
        "Joke Reader",
        options,
        Box::new(move |cc| {
            let mut app = JokeReaderApp::new(initial_fragment.as_deref());

            if let Some(storage) = cc.storage {
                if let Some(theme_str) = storage.get_string("is_dark_mode") {
                    if let Ok(is_dark_mode) = theme_str.parse::<bool>() {
                        app.is_dark_mode = is_dark_mode;
                        app.theme = if is_dark_mode {
                            AppTheme::dark()
                        } else {
                            AppTheme::light()
                        };
                    }
                }
            }

            Ok(Box::new(app))
        }),
    )
}

struct AppTheme {
    is_dark: bool,
    background: Color32,
    card_background: Color32,
    banner_background: Color32,
    text: Color32,
    secondary_text: Color32,
    highlight: Color32,
    error: Color32,
    button_background: Color32,
    button_foreground: Color32,
    button_active_background: Color32,
}

impl AppTheme {
    fn dark() -> Self {
        Self {
            is_dark: true,
            background: Color32::from_rgb(18, 18, 18),
            card_background: Color32::from_rgb(30, 30, 30),
            banner_background: Color32::from_rgb(40, 34, 18),
            text: Color32::from_rgb(240, 240, 240),
            secondary_text: Color32::from_rgb(180, 180, 180),
            highlight: Color32::from_rgb(255, 193, 7),
            error: Color32::from_rgb(229, 115, 115),
            button_background: Color32::from_rgb(66, 66, 66),
            button_foreground: Color32::from_rgb(240, 240, 240),
            button_active_background: Color32::from_rgb(255, 152, 0),
        }
    }

    fn light() -> Self {
        Self {
            is_dark: false,
            background: Color32::from_rgb(245, 245, 245),
            card_background: Color32::from_rgb(255, 255, 255),
            banner_background: Color32::from_rgb(255, 243, 205),
            text: Color32::from_rgb(20, 20, 20),
            secondary_text: Color32::from_rgb(90, 90, 90),
            highlight: Color32::from_rgb(190, 120, 0),
            error: Color32::from_rgb(180, 40, 40),
            button_background: Color32::from_rgb(225, 225, 225),
            button_foreground: Color32::from_rgb(20, 20, 20),
            button_active_background: Color32::from_rgb(235, 140, 10),
        }
    }

    fn apply_to_ctx(&self, ctx: &egui::Context) {
        let mut visuals = if self.is_dark {
            egui::Visuals::dark()
        } else {
            egui::Visuals::light()
        };
        visuals.panel_fill = self.background;
        ctx.set_visuals(visuals);
    }
}

struct JokeReaderApp {
    client: JokeApiClient,
    cache: SessionCache,
    database: Arc<Database>,
    pipeline: RenderPipeline,
    theme: AppTheme,
    is_dark_mode: bool,
    loading: bool,
    load_error: Option<String>,
    jokes_receiver: Option<Receiver<Option<JokeStore>>>,
    load_thread: Option<thread::JoinHandle<()>>,
    clipboard: Option<arboard::Clipboard>,
    authenticated: bool,
    username_input: String,
    password_input: String,
    sign_in_error: Option<SignInError>,
    started: bool,
}

impl JokeReaderApp {
    fn new(initial_fragment: Option<&str>) -> Self {
        let database = Arc::new(Database::new().expect("Failed to open the state database"));
        let authenticated = database.is_authenticated().unwrap_or(false);

        let clipboard = match arboard::Clipboard::new() {
            Ok(clipboard) => Some(clipboard),
            Err(e) => {
                warn!(error = %e, "clipboard unavailable; share buttons will do nothing");
                None
            }
        };

        Self {
            client: JokeApiClient::new(),
            cache: SessionCache::new(),
            database,
            pipeline: RenderPipeline::new(initial_fragment),
            theme: AppTheme::dark(),
            is_dark_mode: true,
            loading: false,
            load_error: None,
            jokes_receiver: None,
            load_thread: None,
            clipboard,
            authenticated,
            username_input: String::new(),
            password_input: String::new(),
            sign_in_error: None,
            started: false,
        }
    }

    /// Runs the info + fetch sequence on a background thread. The result
    /// arrives over the channel and is picked up in `update()`.
    fn load_jokes(&mut self) {
        if self.loading {
            return;
        }
        self.loading = true;
        self.load_error = None;

        let client = self.client.clone();
        let (tx, rx) = std::sync::mpsc::channel();

        let handle = thread::spawn(move || {
            let result = client
                .fetch_info("en")
                .and_then(|info| client.fetch_all_jokes(info.count));
            match result {
                Ok(jokes) => {
                    info!(jokes = jokes.len(), "fetched joke corpus");
                    let _ = tx.send(Some(jokes));
                }
                Err(e) => {
                    warn!(error = %e, "joke fetch failed");
                    let _ = tx.send(None);
                }
            }
        });

        self.load_thread = Some(handle);
        self.jokes_receiver = Some(rx);
    }

    fn check_loading_thread(&mut self) {
        let Some(rx) = &self.jokes_receiver else {
            return;
        };
        match rx.try_recv() {
            Ok(Some(jokes)) => {
                self.loading = false;
                self.jokes_receiver = None;
                self.load_thread = None;
                if let Err(e) = self.cache.save(&jokes) {
                    warn!(error = %e, "failed to cache fetched jokes");
                }
                self.sync_pipeline(true);
            }
            Ok(None) | Err(TryRecvError::Disconnected) => {
                // The pipeline stays Empty; no retry.
                self.loading = false;
                self.jokes_receiver = None;
                self.load_thread = None;
                self.load_error =
                    Some("Couldn't load jokes. Check your connection and restart.".to_string());
            }
            Err(TryRecvError::Empty) => {}
        }
    }

    fn sync_pipeline(&mut self, init: bool) {
        if let Err(e) = self.pipeline.sync(&self.cache, &*self.database, init) {
            warn!(error = %e, "pipeline sync failed");
        }
    }

    fn sign_out(&mut self) {
        if let Err(e) = self.database.clear_authenticated() {
            warn!(error = %e, "failed to clear the auth flag");
        }
        self.authenticated = false;
        self.username_input.clear();
        self.password_input.clear();
        self.sign_in_error = None;
    }

    fn render_sign_in(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default().show(ctx, |ui| {
            ui.vertical_centered(|ui| {
                ui.add_space(120.0);
                ui.label(
                    RichText::new("Joke Reader")
                        .color(self.theme.highlight)
                        .size(30.0)
                        .strong(),
                );
                ui.add_space(24.0);

                ui.add(
                    egui::TextEdit::singleline(&mut self.username_input)
                        .hint_text("Username")
                        .desired_width(240.0),
                );
                ui.add_space(8.0);
                ui.add(
                    egui::TextEdit::singleline(&mut self.password_input)
                        .hint_text("Password")
                        .password(true)
                        .desired_width(240.0),
                );
                ui.add_space(16.0);

                let sign_in_btn = ui.add_sized(
                    [240.0, 32.0],
                    egui::Button::new(
                        RichText::new("Sign in")
                            .color(self.theme.button_foreground)
                            .size(16.0),
                    )
                    .corner_radius(CornerRadius::same(6))
                    .fill(self.theme.button_background),
                );

                if sign_in_btn.clicked() {
                    match auth::verify_credentials(&self.username_input, &self.password_input) {
                        Ok(()) => {
                            if let Err(e) = self.database.set_authenticated() {
                                warn!(error = %e, "failed to persist the auth flag");
                            }
                            self.authenticated = true;
                            self.sign_in_error = None;
                            self.password_input.clear();
                        }
                        Err(e) => self.sign_in_error = Some(e),
                    }
                }

                if let Some(error) = self.sign_in_error {
                    ui.add_space(12.0);
                    ui.label(RichText::new(error.message()).color(self.theme.error));
                }
            });
        });
    }

    fn render_header(&mut self, ui: &mut Ui) {
        ui.horizontal(|ui| {
            ui.label(
                RichText::new("Joke Reader")
                    .color(self.theme.highlight)
                    .size(22.0)
                    .strong(),
            );

            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                let sign_out_btn = ui.add(
                    egui::Button::new(
                        RichText::new("Sign out")
                            .color(self.theme.button_foreground)
                            .size(14.0),
                    )
                    .corner_radius(CornerRadius::same(6))
                    .fill(self.theme.button_background),
                );
                if sign_out_btn.clicked() {
                    self.sign_out();
                }

                let theme_btn = ui.add(
                    egui::Button::new(
                        RichText::new(if self.is_dark_mode { "Light" } else { "Dark" })
                            .color(self.theme.button_foreground)
                            .size(14.0),
                    )
                    .corner_radius(CornerRadius::same(6))
                    .fill(self.theme.button_background),
                );
                if theme_btn.clicked() {
                    self.is_dark_mode = !self.is_dark_mode;
                    self.theme = if self.is_dark_mode {
                        AppTheme::dark()
                    } else {
                        AppTheme::light()
                    };
                }

                let api_btn = ui.add(
                    egui::Button::new(
                        RichText::new("JokeAPI")
                            .color(self.theme.button_foreground)
                            .size(14.0),
                    )
                    .corner_radius(CornerRadius::same(6))
                    .fill(self.theme.button_background),
                );
                if api_btn.clicked() {
                    if let Err(e) = open::that("https://v2.jokeapi.dev") {
                        warn!(error = %e, "failed to open the JokeAPI page");
                    }
                }
            });
        });
    }

    fn render_daily_joke(&self, ui: &mut Ui) {
        let Some(joke) = self.pipeline.daily_joke() else {
            return;
        };
        egui::Frame::new()
            .fill(self.theme.banner_background)
            .corner_radius(CornerRadius::same(8))
            .inner_margin(12.0)
            .outer_margin(egui::vec2(8.0, 6.0))
            .show(ui, |ui| {
                ui.label(
                    RichText::new("Joke of the day")
                        .color(self.theme.highlight)
                        .size(14.0)
                        .strong(),
                );
                ui.add_space(4.0);
                ui.label(
                    RichText::new(joke.flattened_text())
                        .color(self.theme.text)
                        .size(16.0),
                );
            });
    }

    fn render_card(
        ui: &mut Ui,
        theme: &AppTheme,
        card: &mut JokeCard,
        cache: &dyn JokeCache,
        clipboard: &mut Option<arboard::Clipboard>,
    ) {
        let Some(view) = card.view().cloned() else {
            return;
        };

        egui::Frame::new()
            .fill(theme.card_background)
            .corner_radius(CornerRadius::same(8))
            .inner_margin(12.0)
            .outer_margin(egui::vec2(8.0, 6.0))
            .show(ui, |ui| {
                ui.horizontal(|ui| {
                    ui.label(
                        RichText::new(&view.category)
                            .color(theme.highlight)
                            .size(13.0)
                            .strong(),
                    );
                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        ui.label(
                            RichText::new(format!("by {}", view.author))
                                .color(theme.secondary_text)
                                .size(13.0),
                        );
                    });
                });

                ui.add_space(6.0);
                ui.label(RichText::new(&view.text).color(theme.text).size(16.0));
                ui.add_space(8.0);

                ui.horizontal(|ui| {
                    let like_btn = ui.add(
                        egui::Button::new(
                            RichText::new(format!("♥ {}", card.likes()))
                                .color(theme.button_foreground)
                                .size(14.0),
                        )
                        .corner_radius(CornerRadius::same(6))
                        .fill(theme.button_active_background),
                    );
                    if like_btn.clicked() {
                        if let Err(e) = card.increment(cache) {
                            warn!(error = %e, joke_id = card.id(), "failed to record like");
                        }
                    }

                    let share_btn = ui.add(
                        egui::Button::new(
                            RichText::new("Share")
                                .color(theme.button_foreground)
                                .size(14.0),
                        )
                        .corner_radius(CornerRadius::same(6))
                        .fill(theme.button_background),
                    );
                    if share_btn.clicked() {
                        match clipboard.as_mut() {
                            Some(clipboard) => card.share(clipboard),
                            None => warn!(joke_id = card.id(), "no clipboard to share to"),
                        }
                    }
                });
            });
    }

    fn render_pagination_controls(&mut self, ui: &mut Ui) {
        if self.pipeline.page_count() < 2 {
            return;
        }
        let active = self.pipeline.active_page();
        let mut selected = None;

        ui.horizontal(|ui| {
            ui.label(
                RichText::new(format!("Page {} of {}", active, self.pipeline.page_count()))
                    .color(self.theme.secondary_text)
                    .size(14.0),
            );
            ui.add_space(8.0);

            for page in 1..=self.pipeline.page_count() {
                let is_active = page == active;
                let page_btn = ui.add(
                    egui::Button::new(
                        RichText::new(format!("{}", page))
                            .color(self.theme.button_foreground)
                            .size(14.0),
                    )
                    .min_size(egui::Vec2::new(28.0, 28.0))
                    .corner_radius(CornerRadius::same(4))
                    .fill(if is_active {
                        self.theme.button_active_background
                    } else {
                        self.theme.button_background
                    }),
                );
                if page_btn.clicked() && !is_active {
                    selected = Some(page);
                }
            }
        });

        if let Some(page) = selected {
            self.pipeline.set_active_page(page);
        }
    }
}

impl eframe::App for JokeReaderApp {
    fn save(&mut self, storage: &mut dyn eframe::Storage) {
        storage.set_string("is_dark_mode", self.is_dark_mode.to_string());
    }

    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.theme.apply_to_ctx(ctx);

        if !self.authenticated {
            self.render_sign_in(ctx);
            return;
        }

        self.check_loading_thread();

        if !self.started {
            self.started = true;
            self.sync_pipeline(true);
            if self.pipeline.is_empty() {
                self.load_jokes();
            }
        }

        egui::CentralPanel::default().show(ctx, |ui| {
            self.render_header(ui);
            ui.separator();
            self.render_daily_joke(ui);

            if self.loading {
                ui.vertical_centered(|ui| {
                    ui.add_space(30.0);
                    ui.spinner();
                    ui.label(
                        RichText::new("Loading jokes...")
                            .color(self.theme.secondary_text)
                            .size(16.0),
                    );
                });
            } else if let Some(error) = &self.load_error {
                ui.vertical_centered(|ui| {
                    ui.add_space(30.0);
                    ui.label(RichText::new(error).color(self.theme.error).size(16.0));
                });
            } else {
                ScrollArea::vertical()
                    .auto_shrink([false; 2])
                    .show(ui, |ui| {
                        let cache = &self.cache;
                        let theme = &self.theme;
                        let clipboard = &mut self.clipboard;
                        for c in self.pipeline.active_cards_mut() {
                            Self::render_card(ui, theme, c, cache, clipboard);
                        }
                    });

                self.render_pagination_controls(ui);
            }
        });

        if self.pipeline.take_refresh_request() {
            self.sync_pipeline(false);
            ctx.request_repaint();
        }

        if self.loading {
            ctx.request_repaint_after(std::time::Duration::from_millis(100));
        }
    }
}
