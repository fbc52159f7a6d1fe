use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use futures::stream::{self, StreamExt};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::Style,
    text::Span,
    widgets::Paragraph,
    Frame,
};
use tokio::sync::mpsc;
use tracing::debug;

use crate::api::{
    ApiError, ApiGateway, Comment, ExploreUser, LoginResponse, PageOf, Profile, RegisterRequest,
    Tweet, UserIdentity,
};
use crate::reconcile::PendingToggle;
use crate::route::{self, Route};
use crate::session::SessionStore;
use crate::theme::Theme;
use crate::trends::{self, Trend};
use crate::ui::views::explore::ExploreView;
use crate::ui::views::feed::{FeedKeyContext, FeedView};
use crate::ui::views::login::LoginView;
use crate::ui::views::profile::{ProfileKeyContext, ProfileView};
use crate::ui::views::register::RegisterView;
use crate::ui::views::trends::TrendsPanel;

/// Pages of the global timeline sampled for the trends panel.
const TREND_PAGES: u32 = 3;
const TREND_TOPICS: usize = 6;

/// Hide the trends column below this terminal width.
const TRENDS_MIN_WIDTH: u16 = 100;
const TRENDS_WIDTH: u16 = 30;

const STATUS_TTL: Duration = Duration::from_secs(5);

/// Which view container started an interaction. Completions are routed back
/// to the same container only; the other copies of the entity are never
/// touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewScope {
    Feed,
    Explore,
    Profile,
}

/// Completion of a network call, delivered to the UI loop over the event
/// channel.
#[derive(Debug)]
pub enum ApiEvent {
    LoggedIn(Result<LoginResponse, ApiError>),
    Registered(Result<(), ApiError>),
    FeedLoaded(Result<Vec<Tweet>, ApiError>),
    TrendsLoaded(Result<Vec<Trend>, ApiError>),
    UsersLoaded {
        page: u32,
        result: Result<PageOf<ExploreUser>, ApiError>,
    },
    ProfileLoaded {
        username: String,
        result: Result<Profile, ApiError>,
    },
    TweetPosted(Result<Tweet, ApiError>),
    TweetDeleted {
        scope: ViewScope,
        tweet_id: String,
        result: Result<(), ApiError>,
    },
    LikeSettled {
        scope: ViewScope,
        tweet_id: String,
        pending: PendingToggle,
        result: Result<(), ApiError>,
    },
    FollowSettled {
        scope: ViewScope,
        user_id: String,
        pending: PendingToggle,
        result: Result<(), ApiError>,
    },
    CommentsLoaded {
        tweet_id: String,
        result: Result<Vec<Comment>, ApiError>,
    },
    ReplyPosted {
        tweet_id: String,
        result: Result<Comment, ApiError>,
    },
    ProfileSaved {
        name: String,
        image_url: Option<String>,
        result: Result<UserIdentity, ApiError>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StatusKind {
    Info,
    Error,
}

struct StatusLine {
    kind: StatusKind,
    text: String,
    at: Instant,
}

impl StatusLine {
    fn info(text: impl Into<String>) -> StatusLine {
        StatusLine {
            kind: StatusKind::Info,
            text: text.into(),
            at: Instant::now(),
        }
    }

    fn error(text: impl Into<String>) -> StatusLine {
        StatusLine {
            kind: StatusKind::Error,
            text: text.into(),
            at: Instant::now(),
        }
    }
}

/// The whole client: session, gateway, route and the per-page views. Keys
/// come in from the terminal loop, completions from the event channel.
pub struct App {
    session: Arc<SessionStore>,
    gateway: Arc<dyn ApiGateway>,
    events_tx: mpsc::UnboundedSender<ApiEvent>,
    route: Route,
    theme: Theme,
    login: LoginView,
    register: RegisterView,
    feed: FeedView,
    explore: ExploreView,
    profile: ProfileView,
    trends: TrendsPanel,
    status: Option<StatusLine>,
    should_quit: bool,
}

impl App {
    pub fn new(
        session: Arc<SessionStore>,
        gateway: Arc<dyn ApiGateway>,
        events_tx: mpsc::UnboundedSender<ApiEvent>,
    ) -> App {
        let theme = session.theme();
        let mut app = App {
            session,
            gateway,
            events_tx,
            route: Route::Login,
            theme,
            login: LoginView::new(),
            register: RegisterView::new(),
            feed: FeedView::new(),
            explore: ExploreView::new(),
            profile: ProfileView::new(),
            trends: TrendsPanel::new(),
            status: None,
            should_quit: false,
        };
        // A persisted session skips the login page entirely.
        let start = route::resolve(Route::Home, app.session.is_logged_in());
        app.enter(start);
        app
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    pub fn route(&self) -> &Route {
        &self.route
    }

    // --- navigation ---

    fn navigate(&mut self, requested: Route) {
        let resolved = route::resolve(requested, self.session.is_logged_in());
        self.enter(resolved);
    }

    /// Switch route and kick off the mount fetches for the new page.
    fn enter(&mut self, route: Route) {
        match &route {
            Route::Home => {
                self.feed.set_loading();
                self.trends.set_loading();
                self.spawn_feed();
                self.spawn_trends();
            }
            Route::Explore => {
                self.explore.set_loading();
                self.spawn_users(self.explore.page().max(1));
            }
            Route::Profile(username) => {
                self.profile.open(username);
                self.spawn_profile(username.clone());
            }
            Route::Login | Route::Register => {}
        }
        self.route = route;
    }

    fn sign_out(&mut self) {
        self.session.logout();
        self.login.reset();
        self.status = Some(StatusLine::info("Signed out."));
        self.enter(Route::Login);
    }

    /// Unconditional transition after an observed 401, no matter which
    /// container's call tripped it.
    fn note_auth_failure(&mut self, error: &ApiError) {
        if *error != ApiError::AuthenticationExpired {
            return;
        }
        if self.route.is_public() {
            return;
        }
        debug!("401 observed, dropping to the login page");
        self.session.logout();
        self.login.reset();
        self.status = Some(StatusLine::error("Session expired. Please sign in again."));
        self.enter(Route::Login);
    }

    fn require_login(&mut self, action: &str) -> bool {
        if self.session.is_logged_in() {
            true
        } else {
            self.status = Some(StatusLine::error(format!("Sign in to {}.", action)));
            false
        }
    }

    fn toggle_theme(&mut self) {
        self.theme = self.theme.toggle();
        self.session.set_theme(self.theme);
    }

    // --- key handling ---

    pub fn handle_key(&mut self, key: KeyEvent) {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.should_quit = true;
            return;
        }
        // Theme switching works everywhere, including the text-entry pages.
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('t') {
            self.toggle_theme();
            return;
        }

        match self.route.clone() {
            Route::Login => self.handle_login_key(key),
            Route::Register => self.handle_register_key(key),
            Route::Home => self.handle_home_key(key),
            Route::Explore => self.handle_explore_key(key),
            Route::Profile(_) => self.handle_profile_key(key),
        }
    }

    fn handle_login_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::F(2) => self.navigate(Route::Register),
            KeyCode::Tab => self.login.switch_field(),
            KeyCode::Backspace => self.login.delete_char(),
            KeyCode::Enter => {
                if let Some((username, password)) = self.login.take_submit() {
                    self.spawn_login(username, password);
                }
            }
            KeyCode::Char(c) => self.login.add_char(c),
            _ => {}
        }
    }

    fn handle_register_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => self.navigate(Route::Login),
            KeyCode::Tab => self.register.switch_field(),
            KeyCode::Backspace => self.register.delete_char(),
            KeyCode::Enter => {
                if let Some(request) = self.register.take_submit() {
                    self.spawn_register(request);
                }
            }
            KeyCode::Char(c) => self.register.add_char(c),
            _ => {}
        }
    }

    fn handle_home_key(&mut self, key: KeyEvent) {
        match self.feed.key_context() {
            FeedKeyContext::TextEntry => match key.code {
                KeyCode::Esc => self.feed.close_modal(),
                KeyCode::Enter => {
                    if let Some(content) = self.feed.take_compose() {
                        self.spawn_post(content);
                    } else if let Some((tweet_id, content)) = self.feed.take_reply() {
                        self.spawn_reply(tweet_id, content);
                    }
                }
                KeyCode::Backspace => self.feed.delete_char(),
                KeyCode::Char(c) => self.feed.add_char(c),
                _ => {}
            },
            FeedKeyContext::ConfirmDelete => match key.code {
                KeyCode::Enter => {
                    if let Some(tweet_id) = self.feed.confirm_delete() {
                        self.spawn_delete(ViewScope::Feed, tweet_id);
                    }
                }
                KeyCode::Esc => self.feed.cancel_delete(),
                _ => {}
            },
            FeedKeyContext::Normal => match key.code {
                KeyCode::Char('q') => self.should_quit = true,
                KeyCode::Char('j') | KeyCode::Down => self.feed.scroll_down(),
                KeyCode::Char('k') | KeyCode::Up => self.feed.scroll_up(),
                KeyCode::Char('l') => self.like_in(ViewScope::Feed),
                KeyCode::Enter => {
                    if let Some(tweet_id) = self.feed.open_thread() {
                        self.spawn_comments(tweet_id);
                    }
                }
                KeyCode::Char('n') => {
                    if self.require_login("tweet") {
                        self.feed.open_compose();
                    }
                }
                KeyCode::Char('d') => self.request_delete(ViewScope::Feed),
                KeyCode::Char('r') => {
                    self.feed.set_loading();
                    self.trends.set_loading();
                    self.spawn_feed();
                    self.spawn_trends();
                }
                KeyCode::Char('e') => self.navigate(Route::Explore),
                KeyCode::Char('p') => {
                    if let Some(tweet) = self.feed.selected() {
                        let username = tweet.user.username.clone();
                        self.navigate(Route::Profile(username));
                    }
                }
                KeyCode::Char('m') => {
                    if let Some(username) = self.session.username() {
                        self.navigate(Route::Profile(username));
                    }
                }
                KeyCode::Char('t') => self.toggle_theme(),
                KeyCode::Char('x') => self.sign_out(),
                KeyCode::Esc => self.status = None,
                _ => {}
            },
        }
    }

    fn handle_explore_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('j') | KeyCode::Down => self.explore.scroll_down(),
            KeyCode::Char('k') | KeyCode::Up => self.explore.scroll_up(),
            KeyCode::Char('f') => self.follow_in(ViewScope::Explore),
            KeyCode::Enter => {
                if let Some(username) = self.explore.selected_username() {
                    self.navigate(Route::Profile(username));
                }
            }
            KeyCode::Char(']') | KeyCode::Right => {
                if let Some(page) = self.explore.next_page() {
                    self.explore.set_loading();
                    self.spawn_users(page);
                }
            }
            KeyCode::Char('[') | KeyCode::Left => {
                if let Some(page) = self.explore.prev_page() {
                    self.explore.set_loading();
                    self.spawn_users(page);
                }
            }
            KeyCode::Char('r') => {
                self.explore.set_loading();
                self.spawn_users(self.explore.page());
            }
            KeyCode::Char('h') => self.navigate(Route::Home),
            KeyCode::Char('m') => {
                if let Some(username) = self.session.username() {
                    self.navigate(Route::Profile(username));
                }
            }
            KeyCode::Char('t') => self.toggle_theme(),
            KeyCode::Char('x') => self.sign_out(),
            KeyCode::Esc => self.navigate(Route::Home),
            _ => {}
        }
    }

    fn handle_profile_key(&mut self, key: KeyEvent) {
        match self.profile.key_context() {
            ProfileKeyContext::TextEntry => match key.code {
                KeyCode::Esc => self.profile.close_modal(),
                KeyCode::Tab => self.profile.switch_edit_field(),
                KeyCode::Enter => {
                    if let Some((name, image_url)) = self.profile.take_edit() {
                        self.spawn_update_profile(name, image_url);
                    }
                }
                KeyCode::Backspace => self.profile.delete_char(),
                KeyCode::Char(c) => self.profile.add_char(c),
                _ => {}
            },
            ProfileKeyContext::ConfirmDelete => match key.code {
                KeyCode::Enter => {
                    if let Some(tweet_id) = self.profile.confirm_delete() {
                        self.spawn_delete(ViewScope::Profile, tweet_id);
                    }
                }
                KeyCode::Esc => self.profile.cancel_delete(),
                _ => {}
            },
            ProfileKeyContext::Normal => {
                let own = self.profile.is_own(self.session.username().as_deref());
                match key.code {
                    KeyCode::Char('q') => self.should_quit = true,
                    KeyCode::Char('j') | KeyCode::Down => self.profile.scroll_down(),
                    KeyCode::Char('k') | KeyCode::Up => self.profile.scroll_up(),
                    KeyCode::Char('l') => self.like_in(ViewScope::Profile),
                    KeyCode::Char('f') => {
                        if !own {
                            self.follow_in(ViewScope::Profile);
                        }
                    }
                    KeyCode::Char('e') => {
                        if own {
                            self.profile.open_edit();
                        } else {
                            self.navigate(Route::Explore);
                        }
                    }
                    KeyCode::Char('d') => self.request_delete(ViewScope::Profile),
                    KeyCode::Char('r') => {
                        let username = self.profile.username().to_string();
                        self.profile.set_loading();
                        self.spawn_profile(username);
                    }
                    KeyCode::Char('h') | KeyCode::Esc => self.navigate(Route::Home),
                    KeyCode::Char('m') => {
                        if let Some(username) = self.session.username() {
                            self.navigate(Route::Profile(username));
                        }
                    }
                    KeyCode::Char('t') => self.toggle_theme(),
                    KeyCode::Char('x') => self.sign_out(),
                    _ => {}
                }
            }
        }
    }

    // --- interactions ---

    fn like_in(&mut self, scope: ViewScope) {
        if !self.require_login("like tweets") {
            return;
        }
        let toggled = match scope {
            ViewScope::Feed => self.feed.toggle_like(),
            ViewScope::Profile => self.profile.toggle_like(),
            ViewScope::Explore => None,
        };
        let Some((tweet_id, pending)) = toggled else {
            return;
        };

        let gateway = Arc::clone(&self.gateway);
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let result = if pending.desired() {
                gateway.like(&tweet_id).await
            } else {
                gateway.unlike(&tweet_id).await
            };
            let _ = tx.send(ApiEvent::LikeSettled {
                scope,
                tweet_id,
                pending,
                result,
            });
        });
    }

    fn follow_in(&mut self, scope: ViewScope) {
        if !self.require_login("follow users") {
            return;
        }
        let toggled = match scope {
            ViewScope::Explore => self.explore.toggle_follow(),
            ViewScope::Profile => self.profile.toggle_follow(),
            ViewScope::Feed => None,
        };
        let Some((user_id, pending)) = toggled else {
            return;
        };

        let gateway = Arc::clone(&self.gateway);
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let result = if pending.desired() {
                gateway.follow(&user_id).await
            } else {
                gateway.unfollow(&user_id).await
            };
            let _ = tx.send(ApiEvent::FollowSettled {
                scope,
                user_id,
                pending,
                result,
            });
        });
    }

    fn request_delete(&mut self, scope: ViewScope) {
        let Some(username) = self.session.username() else {
            return;
        };
        let armed = match scope {
            ViewScope::Feed => self.feed.request_delete(&username),
            ViewScope::Profile => self.profile.request_delete(&username),
            ViewScope::Explore => false,
        };
        if !armed {
            self.status = Some(StatusLine::error("You can only delete your own tweets."));
        }
    }

    /// Refetch the container whose optimistic state was rolled back.
    fn refresh_scope(&mut self, scope: ViewScope) {
        if !self.session.is_logged_in() {
            return;
        }
        match scope {
            ViewScope::Feed => {
                self.feed.set_loading();
                self.spawn_feed();
            }
            ViewScope::Explore => {
                self.explore.set_loading();
                self.spawn_users(self.explore.page());
            }
            ViewScope::Profile => {
                let username = self.profile.username().to_string();
                if !username.is_empty() {
                    self.profile.set_loading();
                    self.spawn_profile(username);
                }
            }
        }
    }

    // --- network task spawns ---

    fn spawn_login(&self, username: String, password: String) {
        let gateway = Arc::clone(&self.gateway);
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let result = gateway.login(&username, &password).await;
            let _ = tx.send(ApiEvent::LoggedIn(result));
        });
    }

    fn spawn_register(&self, request: RegisterRequest) {
        let gateway = Arc::clone(&self.gateway);
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let result = gateway.register(&request).await;
            let _ = tx.send(ApiEvent::Registered(result));
        });
    }

    fn spawn_feed(&self) {
        let gateway = Arc::clone(&self.gateway);
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let result = gateway.feed().await;
            let _ = tx.send(ApiEvent::FeedLoaded(result));
        });
    }

    /// Sample the first pages of the global timeline concurrently and rank
    /// the hashtags found there.
    fn spawn_trends(&self) {
        let gateway = Arc::clone(&self.gateway);
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let pages: Vec<Result<PageOf<Tweet>, ApiError>> = stream::iter(1..=TREND_PAGES)
                .map(|page| {
                    let gateway = Arc::clone(&gateway);
                    async move { gateway.global_tweets(page).await }
                })
                .buffer_unordered(3)
                .collect()
                .await;

            let mut tweets = Vec::new();
            let mut first_error = None;
            for page in pages {
                match page {
                    Ok(listing) => tweets.extend(listing.items),
                    Err(e) => {
                        if first_error.is_none() {
                            first_error = Some(e);
                        }
                    }
                }
            }

            let result = match (tweets.is_empty(), first_error) {
                (true, Some(e)) => Err(e),
                (_, _) => Ok(trends::trending_topics(&tweets, TREND_TOPICS)),
            };
            let _ = tx.send(ApiEvent::TrendsLoaded(result));
        });
    }

    fn spawn_users(&self, page: u32) {
        let gateway = Arc::clone(&self.gateway);
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let result = gateway.users(page).await;
            let _ = tx.send(ApiEvent::UsersLoaded { page, result });
        });
    }

    fn spawn_profile(&self, username: String) {
        let gateway = Arc::clone(&self.gateway);
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let result = gateway.profile(&username).await;
            let _ = tx.send(ApiEvent::ProfileLoaded { username, result });
        });
    }

    fn spawn_post(&self, content: String) {
        let gateway = Arc::clone(&self.gateway);
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let result = gateway.create_tweet(&content).await;
            let _ = tx.send(ApiEvent::TweetPosted(result));
        });
    }

    fn spawn_delete(&self, scope: ViewScope, tweet_id: String) {
        let gateway = Arc::clone(&self.gateway);
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let result = gateway.delete_tweet(&tweet_id).await;
            let _ = tx.send(ApiEvent::TweetDeleted {
                scope,
                tweet_id,
                result,
            });
        });
    }

    fn spawn_comments(&self, tweet_id: String) {
        let gateway = Arc::clone(&self.gateway);
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let result = gateway.comments(&tweet_id).await;
            let _ = tx.send(ApiEvent::CommentsLoaded { tweet_id, result });
        });
    }

    fn spawn_reply(&self, tweet_id: String, content: String) {
        let gateway = Arc::clone(&self.gateway);
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let result = gateway.create_comment(&tweet_id, &content).await;
            let _ = tx.send(ApiEvent::ReplyPosted { tweet_id, result });
        });
    }

    fn spawn_update_profile(&self, name: String, image_url: Option<String>) {
        let gateway = Arc::clone(&self.gateway);
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let result = gateway.update_profile(&name, image_url.as_deref()).await;
            let _ = tx.send(ApiEvent::ProfileSaved {
                name,
                image_url,
                result,
            });
        });
    }

    // --- completion handling ---

    pub fn handle_event(&mut self, event: ApiEvent) {
        match event {
            ApiEvent::LoggedIn(Ok(response)) => {
                self.session.login(response.token, response.user);
                self.login.reset();
                self.status = Some(StatusLine::info("Welcome back!"));
                self.navigate(Route::Home);
            }
            ApiEvent::LoggedIn(Err(e)) => self.login.login_failed(&e),

            ApiEvent::Registered(Ok(())) => {
                self.register.reset();
                self.status = Some(StatusLine::info("Account created. Sign in to continue."));
                self.navigate(Route::Login);
            }
            ApiEvent::Registered(Err(e)) => self.register.register_failed(&e),

            ApiEvent::FeedLoaded(result) => match result {
                Ok(tweets) => self.feed.update_feed(Ok(tweets)),
                Err(e) => {
                    self.feed.update_feed(Err(&e));
                    self.note_auth_failure(&e);
                }
            },

            ApiEvent::TrendsLoaded(result) => match result {
                Ok(topics) => self.trends.update(Ok(topics)),
                Err(e) => {
                    self.trends.update(Err(&e));
                    self.note_auth_failure(&e);
                }
            },

            ApiEvent::UsersLoaded { page, result } => match result {
                Ok(listing) => self.explore.update_users(page, Ok(listing)),
                Err(e) => {
                    self.explore.update_users(page, Err(&e));
                    self.note_auth_failure(&e);
                }
            },

            ApiEvent::ProfileLoaded { username, result } => {
                // Ignore responses for a profile we already navigated away
                // from.
                if self.profile.username() != username {
                    return;
                }
                match result {
                    Ok(profile) => self.profile.update_profile(Ok(profile)),
                    Err(e) => {
                        self.profile.update_profile(Err(&e));
                        self.note_auth_failure(&e);
                    }
                }
            }

            ApiEvent::TweetPosted(result) => match result {
                Ok(_) => {
                    self.feed.tweet_posted();
                    self.status = Some(StatusLine::info("Tweet posted!"));
                    // Posting refreshes the feed (and the trends with it).
                    self.feed.set_loading();
                    self.trends.set_loading();
                    self.spawn_feed();
                    self.spawn_trends();
                }
                Err(e) => {
                    self.feed.post_failed();
                    self.status = Some(StatusLine::error(e.to_string()));
                    self.note_auth_failure(&e);
                }
            },

            ApiEvent::TweetDeleted {
                scope,
                tweet_id,
                result,
            } => match result {
                Ok(()) => {
                    match scope {
                        ViewScope::Feed => self.feed.apply_delete(&tweet_id),
                        ViewScope::Profile => self.profile.apply_delete(&tweet_id),
                        ViewScope::Explore => {}
                    }
                    self.status = Some(StatusLine::info("Tweet deleted."));
                }
                Err(e) => {
                    self.status = Some(StatusLine::error(e.to_string()));
                    self.note_auth_failure(&e);
                }
            },

            ApiEvent::LikeSettled {
                scope,
                tweet_id,
                pending,
                result,
            } => {
                let error = result.as_ref().err();
                let refresh = match scope {
                    ViewScope::Feed => self.feed.settle_like(&tweet_id, pending, error),
                    ViewScope::Profile => self.profile.settle_like(&tweet_id, pending, error),
                    ViewScope::Explore => false,
                };
                if let Some(e) = error {
                    self.note_auth_failure(e);
                    if refresh {
                        self.status = Some(StatusLine::error("Couldn't update the like. Try again."));
                        self.refresh_scope(scope);
                    }
                }
            }

            ApiEvent::FollowSettled {
                scope,
                user_id,
                pending,
                result,
            } => {
                let error = result.as_ref().err();
                let refresh = match scope {
                    ViewScope::Explore => self.explore.settle_follow(&user_id, pending, error),
                    ViewScope::Profile => self.profile.settle_follow(&user_id, pending, error),
                    ViewScope::Feed => false,
                };
                if let Some(e) = error {
                    self.note_auth_failure(e);
                    if refresh {
                        self.status = Some(StatusLine::error("Couldn't update the follow. Try again."));
                        self.refresh_scope(scope);
                    }
                }
            }

            ApiEvent::CommentsLoaded { tweet_id, result } => match result {
                Ok(comments) => self.feed.update_comments(&tweet_id, Ok(comments)),
                Err(e) => {
                    self.feed.update_comments(&tweet_id, Err(&e));
                    self.note_auth_failure(&e);
                }
            },

            ApiEvent::ReplyPosted { tweet_id, result } => match result {
                Ok(comment) => {
                    self.feed.apply_reply(&tweet_id, comment);
                    self.status = Some(StatusLine::info("Reply posted."));
                }
                Err(e) => {
                    self.feed.reply_failed();
                    self.status = Some(StatusLine::error(e.to_string()));
                    self.note_auth_failure(&e);
                }
            },

            ApiEvent::ProfileSaved {
                name,
                image_url,
                result,
            } => match result {
                Ok(_) => {
                    self.session.update_identity(name.clone(), image_url.clone());
                    self.profile.edit_saved(&name, image_url.as_deref());
                    self.status = Some(StatusLine::info("Profile updated."));
                }
                Err(e) => {
                    self.profile.edit_failed();
                    self.status = Some(StatusLine::error(e.to_string()));
                    self.note_auth_failure(&e);
                }
            },
        }
    }

    // --- rendering ---

    pub fn render(&self, frame: &mut Frame) {
        let palette = self.theme.palette();
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(0), Constraint::Length(1)])
            .split(frame.area());
        let content = chunks[0];
        let now = Utc::now();

        match &self.route {
            Route::Login => self.login.render(frame, content, &palette),
            Route::Register => self.register.render(frame, content, &palette),
            Route::Home => {
                if content.width >= TRENDS_MIN_WIDTH {
                    let columns = Layout::default()
                        .direction(Direction::Horizontal)
                        .constraints([Constraint::Min(0), Constraint::Length(TRENDS_WIDTH)])
                        .split(content);
                    self.feed.render(frame, columns[0], &palette, now);
                    self.trends.render(frame, columns[1], &palette);
                } else {
                    self.feed.render(frame, content, &palette, now);
                }
            }
            Route::Explore => self.explore.render(frame, content, &palette),
            Route::Profile(_) => {
                let own = self.profile.is_own(self.session.username().as_deref());
                self.profile.render(frame, content, &palette, own, now);
            }
        }

        self.render_footer(frame, chunks[1]);
    }

    fn render_footer(&self, frame: &mut Frame, area: Rect) {
        let palette = self.theme.palette();

        if let Some(status) = &self.status {
            if status.at.elapsed() < STATUS_TTL {
                let style = match status.kind {
                    StatusKind::Info => Style::default().fg(palette.success),
                    StatusKind::Error => Style::default().fg(palette.danger),
                };
                frame.render_widget(
                    Paragraph::new(Span::styled(status.text.as_str(), style)),
                    area,
                );
                return;
            }
        }

        let hint = match &self.route {
            Route::Login => "Tab switch | Enter sign in | F2 register | Ctrl+T theme | Ctrl+C quit",
            Route::Register => "Tab switch | Enter register | Esc back | Ctrl+T theme | Ctrl+C quit",
            Route::Home => {
                "j/k scroll | l like | Enter replies | n new | d delete | r refresh | e explore | m me | t theme | x sign out | q quit"
            }
            Route::Explore => {
                "j/k scroll | f follow | Enter profile | ]/[ page | h home | m me | t theme | q quit"
            }
            Route::Profile(_) => {
                "j/k scroll | l like | f follow | e edit | d delete | r refresh | h home | q quit"
            }
        };
        frame.render_widget(
            Paragraph::new(Span::styled(hint, Style::default().fg(palette.dim))),
            area,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::UserSummary;
    use chrono::TimeZone;

    struct StubGateway {
        tweets: Vec<Tweet>,
        like_result: Result<(), ApiError>,
    }

    impl StubGateway {
        fn new(tweets: Vec<Tweet>) -> StubGateway {
            StubGateway {
                tweets,
                like_result: Ok(()),
            }
        }
    }

    fn stub_tweet(id: &str, author: &str, likes: u32) -> Tweet {
        Tweet {
            id: id.to_string(),
            content: format!("tweet {}", id),
            user_id: format!("uid-{}", author),
            created_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            is_liked_by_me: false,
            likes_count: likes,
            replies_count: 0,
            user: UserSummary {
                username: author.to_string(),
                name: author.to_string(),
                image_url: None,
            },
        }
    }

    fn stub_identity() -> UserIdentity {
        UserIdentity {
            id: "u1".to_string(),
            username: "ada".to_string(),
            name: "Ada".to_string(),
            image_url: None,
        }
    }

    #[async_trait::async_trait]
    impl ApiGateway for StubGateway {
        async fn login(&self, username: &str, _password: &str) -> Result<LoginResponse, ApiError> {
            Ok(LoginResponse {
                token: "tok".to_string(),
                user: UserIdentity {
                    id: "u1".to_string(),
                    username: username.to_string(),
                    name: username.to_string(),
                    image_url: None,
                },
            })
        }

        async fn register(&self, _request: &RegisterRequest) -> Result<(), ApiError> {
            Ok(())
        }

        async fn feed(&self) -> Result<Vec<Tweet>, ApiError> {
            Ok(self.tweets.clone())
        }

        async fn global_tweets(&self, _page: u32) -> Result<PageOf<Tweet>, ApiError> {
            Ok(PageOf {
                items: Vec::new(),
                total_pages: 0,
            })
        }

        async fn create_tweet(&self, content: &str) -> Result<Tweet, ApiError> {
            Ok(stub_tweet(content, "ada", 0))
        }

        async fn delete_tweet(&self, _tweet_id: &str) -> Result<(), ApiError> {
            Ok(())
        }

        async fn like(&self, _tweet_id: &str) -> Result<(), ApiError> {
            self.like_result.clone()
        }

        async fn unlike(&self, _tweet_id: &str) -> Result<(), ApiError> {
            self.like_result.clone()
        }

        async fn comments(&self, _tweet_id: &str) -> Result<Vec<Comment>, ApiError> {
            Ok(Vec::new())
        }

        async fn create_comment(&self, _tweet_id: &str, content: &str) -> Result<Comment, ApiError> {
            Ok(Comment {
                id: "c1".to_string(),
                content: content.to_string(),
                created_at: Utc.with_ymd_and_hms(2024, 5, 1, 13, 0, 0).unwrap(),
                user: UserSummary {
                    username: "ada".to_string(),
                    name: "Ada".to_string(),
                    image_url: None,
                },
            })
        }

        async fn users(&self, _page: u32) -> Result<PageOf<ExploreUser>, ApiError> {
            Ok(PageOf {
                items: Vec::new(),
                total_pages: 0,
            })
        }

        async fn profile(&self, username: &str) -> Result<Profile, ApiError> {
            Err(ApiError::NotFound {
                message: format!("no user {}", username),
            })
        }

        async fn update_profile(
            &self,
            name: &str,
            image_url: Option<&str>,
        ) -> Result<UserIdentity, ApiError> {
            Ok(UserIdentity {
                id: "u1".to_string(),
                username: "ada".to_string(),
                name: name.to_string(),
                image_url: image_url.map(|s| s.to_string()),
            })
        }

        async fn follow(&self, _user_id: &str) -> Result<(), ApiError> {
            Ok(())
        }

        async fn unfollow(&self, _user_id: &str) -> Result<(), ApiError> {
            Ok(())
        }
    }

    fn logged_in_session() -> Arc<SessionStore> {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::open(dir.path().join("session.json"));
        store.login("tok".to_string(), stub_identity());
        Arc::new(store)
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    /// Build an app on a stub gateway and drain the two mount fetches the
    /// home page kicks off (feed + trends).
    async fn app_on_home(
        gateway: StubGateway,
    ) -> (App, mpsc::UnboundedReceiver<ApiEvent>) {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut app = App::new(logged_in_session(), Arc::new(gateway), tx);
        assert_eq!(*app.route(), Route::Home);

        for _ in 0..2 {
            let event = rx.recv().await.unwrap();
            app.handle_event(event);
        }
        (app, rx)
    }

    #[tokio::test]
    async fn test_anonymous_start_lands_on_login() {
        let dir = tempfile::tempdir().unwrap();
        let session = Arc::new(SessionStore::open(dir.path().join("session.json")));
        let (tx, _rx) = mpsc::unbounded_channel();
        let app = App::new(session, Arc::new(StubGateway::new(Vec::new())), tx);
        assert_eq!(*app.route(), Route::Login);
    }

    #[tokio::test]
    async fn test_like_toggle_settles_confirmed() {
        let gateway = StubGateway::new(vec![stub_tweet("t1", "grace", 3)]);
        let (mut app, mut rx) = app_on_home(gateway).await;

        app.handle_key(key(KeyCode::Char('l')));
        // Optimistic state is visible before the completion arrives.
        assert!(app.feed.tweets()[0].is_liked_by_me);
        assert_eq!(app.feed.tweets()[0].likes_count, 4);

        let event = rx.recv().await.unwrap();
        app.handle_event(event);
        assert!(app.feed.tweets()[0].is_liked_by_me);
        assert_eq!(app.feed.tweets()[0].likes_count, 4);
    }

    #[tokio::test]
    async fn test_like_failure_rolls_back_and_refetches() {
        let mut gateway = StubGateway::new(vec![stub_tweet("t1", "grace", 3)]);
        gateway.like_result = Err(ApiError::Server { status: 500 });
        let (mut app, mut rx) = app_on_home(gateway).await;

        app.handle_key(key(KeyCode::Char('l')));
        let event = rx.recv().await.unwrap();
        app.handle_event(event);

        assert!(!app.feed.tweets()[0].is_liked_by_me);
        assert_eq!(app.feed.tweets()[0].likes_count, 3);
        // The rollback also scheduled a refetch of the feed.
        let refetch = rx.recv().await.unwrap();
        assert!(matches!(refetch, ApiEvent::FeedLoaded(Ok(_))));
    }

    #[tokio::test]
    async fn test_delete_is_confirm_then_commit() {
        let gateway = StubGateway::new(vec![stub_tweet("t1", "ada", 0), stub_tweet("t2", "grace", 0)]);
        let (mut app, mut rx) = app_on_home(gateway).await;

        app.handle_key(key(KeyCode::Char('d')));
        // Nothing removed before the confirmation.
        assert_eq!(app.feed.tweets().len(), 2);

        app.handle_key(key(KeyCode::Enter));
        let event = rx.recv().await.unwrap();
        app.handle_event(event);
        assert_eq!(app.feed.tweets().len(), 1);
        assert_eq!(app.feed.tweets()[0].id, "t2");
    }

    #[tokio::test]
    async fn test_observed_401_forces_login_route() {
        let gateway = StubGateway::new(vec![stub_tweet("t1", "grace", 0)]);
        let (mut app, _rx) = app_on_home(gateway).await;

        app.handle_event(ApiEvent::FeedLoaded(Err(ApiError::AuthenticationExpired)));
        assert_eq!(*app.route(), Route::Login);
        assert!(!app.session.is_logged_in());
    }

    #[tokio::test]
    async fn test_login_flow_establishes_session_and_routes_home() {
        let dir = tempfile::tempdir().unwrap();
        let session = Arc::new(SessionStore::open(dir.path().join("session.json")));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut app = App::new(
            Arc::clone(&session),
            Arc::new(StubGateway::new(Vec::new())),
            tx,
        );

        for c in "ada".chars() {
            app.handle_key(key(KeyCode::Char(c)));
        }
        app.handle_key(key(KeyCode::Tab));
        for c in "secret".chars() {
            app.handle_key(key(KeyCode::Char(c)));
        }
        app.handle_key(key(KeyCode::Enter));

        let event = rx.recv().await.unwrap();
        app.handle_event(event);

        assert!(session.is_logged_in());
        assert_eq!(*app.route(), Route::Home);
    }

    #[tokio::test]
    async fn test_reply_increments_counter_only_after_confirmation() {
        let gateway = StubGateway::new(vec![stub_tweet("t1", "grace", 0)]);
        let (mut app, mut rx) = app_on_home(gateway).await;

        app.handle_key(key(KeyCode::Enter));
        let comments = rx.recv().await.unwrap();
        app.handle_event(comments);

        for c in "nice".chars() {
            app.handle_key(key(KeyCode::Char(c)));
        }
        app.handle_key(key(KeyCode::Enter));
        assert_eq!(app.feed.tweets()[0].replies_count, 0);

        let reply = rx.recv().await.unwrap();
        app.handle_event(reply);
        assert_eq!(app.feed.tweets()[0].replies_count, 1);
    }

    #[tokio::test]
    async fn test_sign_out_returns_to_login() {
        let gateway = StubGateway::new(vec![stub_tweet("t1", "grace", 0)]);
        let (mut app, _rx) = app_on_home(gateway).await;

        app.handle_key(key(KeyCode::Char('x')));
        assert_eq!(*app.route(), Route::Login);
        assert!(!app.session.is_logged_in());
    }
}
