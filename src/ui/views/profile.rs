use chrono::{DateTime, Utc};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
    Frame,
};

use super::{settle_like_in, toggle_like_at};
use crate::api::{ApiError, Profile};
use crate::reconcile::{self, PendingToggle, Settlement};
use crate::theme::Palette;
use crate::ui::{center_rect, compact_count, relative_time};

#[derive(Debug, Clone, PartialEq)]
enum ProfileMode {
    Normal,
    Edit { field: EditField },
    ConfirmDelete { tweet_id: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EditField {
    Name,
    ImageUrl,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileKeyContext {
    Normal,
    TextEntry,
    ConfirmDelete,
}

/// One user's page: identity header, follow edge, and their tweets. The
/// view owns its copy of the profile; nothing is shared with the feed.
pub struct ProfileView {
    username: String,
    profile: Option<Profile>,
    list_state: ListState,
    loading: bool,
    error: Option<String>,
    mode: ProfileMode,
    edit_name: String,
    edit_image_url: String,
    saving: bool,
}

impl ProfileView {
    pub fn new() -> ProfileView {
        let mut list_state = ListState::default();
        list_state.select(Some(0));

        ProfileView {
            username: String::new(),
            profile: None,
            list_state,
            loading: false,
            error: None,
            mode: ProfileMode::Normal,
            edit_name: String::new(),
            edit_image_url: String::new(),
            saving: false,
        }
    }

    /// Point the view at a username and reset for a fresh fetch.
    pub fn open(&mut self, username: &str) {
        self.username = username.to_string();
        self.profile = None;
        self.loading = true;
        self.error = None;
        self.mode = ProfileMode::Normal;
        self.list_state.select(Some(0));
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn profile(&self) -> Option<&Profile> {
        self.profile.as_ref()
    }

    pub fn set_loading(&mut self) {
        self.loading = true;
        self.error = None;
    }

    pub fn update_profile(&mut self, result: Result<Profile, &ApiError>) {
        self.loading = false;
        match result {
            Ok(profile) => {
                self.profile = Some(profile);
                self.error = None;
                self.list_state.select(Some(0));
            }
            Err(e) => {
                self.error = Some(e.to_string());
                self.profile = None;
            }
        }
    }

    pub fn is_own(&self, viewer: Option<&str>) -> bool {
        viewer.is_some_and(|name| name == self.username)
    }

    pub fn key_context(&self) -> ProfileKeyContext {
        match self.mode {
            ProfileMode::Normal => ProfileKeyContext::Normal,
            ProfileMode::Edit { .. } => ProfileKeyContext::TextEntry,
            ProfileMode::ConfirmDelete { .. } => ProfileKeyContext::ConfirmDelete,
        }
    }

    pub fn scroll_up(&mut self) {
        if let Some(selected) = self.list_state.selected() {
            if selected > 0 {
                self.list_state.select(Some(selected - 1));
            }
        }
    }

    pub fn scroll_down(&mut self) {
        let len = self.profile.as_ref().map_or(0, |p| p.tweets.len());
        if let Some(selected) = self.list_state.selected() {
            if selected < len.saturating_sub(1) {
                self.list_state.select(Some(selected + 1));
            }
        }
    }

    // --- follow edge ---

    /// Optimistically toggle the follow edge on the viewed profile.
    pub fn toggle_follow(&mut self) -> Option<(String, PendingToggle)> {
        let profile = self.profile.as_mut()?;
        let pending =
            PendingToggle::apply(&mut profile.is_following, &mut profile.followers_count);
        Some((profile.id.clone(), pending))
    }

    /// Returns true when the profile must be refetched (rollback happened).
    pub fn settle_follow(
        &mut self,
        user_id: &str,
        pending: PendingToggle,
        error: Option<&ApiError>,
    ) -> bool {
        let Some(profile) = self.profile.as_mut() else {
            return false;
        };
        if profile.id != user_id {
            // The view moved to another profile while the call was in flight.
            return false;
        }

        let outcome = match error {
            None => Ok(()),
            Some(e) => Err(e),
        };
        match pending.settle(outcome) {
            Settlement::Confirmed => false,
            Settlement::RolledBack => {
                pending.roll_back(&mut profile.is_following, &mut profile.followers_count);
                true
            }
        }
    }

    // --- likes on the embedded tweets ---

    pub fn toggle_like(&mut self) -> Option<(String, PendingToggle)> {
        let index = self.list_state.selected()?;
        let profile = self.profile.as_mut()?;
        toggle_like_at(&mut profile.tweets, index)
    }

    pub fn settle_like(
        &mut self,
        tweet_id: &str,
        pending: PendingToggle,
        error: Option<&ApiError>,
    ) -> bool {
        match self.profile.as_mut() {
            Some(profile) => settle_like_in(&mut profile.tweets, tweet_id, pending, error),
            None => false,
        }
    }

    // --- deleting own tweets ---

    pub fn request_delete(&mut self, own_username: &str) -> bool {
        let Some(profile) = self.profile.as_ref() else {
            return false;
        };
        let Some(index) = self.list_state.selected() else {
            return false;
        };
        let Some(tweet) = profile.tweets.get(index) else {
            return false;
        };
        if !tweet.is_authored_by(own_username) {
            return false;
        }
        self.mode = ProfileMode::ConfirmDelete {
            tweet_id: tweet.id.clone(),
        };
        true
    }

    pub fn confirm_delete(&mut self) -> Option<String> {
        if !matches!(self.mode, ProfileMode::ConfirmDelete { .. }) {
            return None;
        }
        match std::mem::replace(&mut self.mode, ProfileMode::Normal) {
            ProfileMode::ConfirmDelete { tweet_id } => Some(tweet_id),
            _ => None,
        }
    }

    pub fn cancel_delete(&mut self) {
        if matches!(self.mode, ProfileMode::ConfirmDelete { .. }) {
            self.mode = ProfileMode::Normal;
        }
    }

    /// Server confirmed: drop the tweet and move the counter, never below
    /// zero.
    pub fn apply_delete(&mut self, tweet_id: &str) {
        let Some(profile) = self.profile.as_mut() else {
            return;
        };
        let before = profile.tweets.len();
        profile.tweets.retain(|t| t.id != tweet_id);
        if profile.tweets.len() < before {
            reconcile::confirm_delete(&mut profile.tweets_count);
        }
        let selected = self.list_state.selected().unwrap_or(0);
        self.list_state
            .select(Some(selected.min(profile.tweets.len().saturating_sub(1))));
    }

    // --- editing the own profile ---

    pub fn open_edit(&mut self) {
        let Some(profile) = self.profile.as_ref() else {
            return;
        };
        self.edit_name = profile.name.clone();
        self.edit_image_url = profile.image_url.clone().unwrap_or_default();
        self.saving = false;
        self.mode = ProfileMode::Edit {
            field: EditField::Name,
        };
    }

    pub fn close_modal(&mut self) {
        if self.saving {
            return;
        }
        self.mode = ProfileMode::Normal;
    }

    pub fn switch_edit_field(&mut self) {
        if let ProfileMode::Edit { field } = &mut self.mode {
            *field = match field {
                EditField::Name => EditField::ImageUrl,
                EditField::ImageUrl => EditField::Name,
            };
        }
    }

    pub fn add_char(&mut self, c: char) {
        if self.saving {
            return;
        }
        if let ProfileMode::Edit { field } = &self.mode {
            match field {
                EditField::Name => self.edit_name.push(c),
                EditField::ImageUrl => self.edit_image_url.push(c),
            }
        }
    }

    pub fn delete_char(&mut self) {
        if self.saving {
            return;
        }
        if let ProfileMode::Edit { field } = &self.mode {
            match field {
                EditField::Name => {
                    self.edit_name.pop();
                }
                EditField::ImageUrl => {
                    self.edit_image_url.pop();
                }
            }
        }
    }

    /// Claim the edited fields for submission; the modal stays disabled
    /// until `edit_saved` or `edit_failed`.
    pub fn take_edit(&mut self) -> Option<(String, Option<String>)> {
        if !matches!(self.mode, ProfileMode::Edit { .. }) || self.saving {
            return None;
        }
        let name = self.edit_name.trim().to_string();
        if name.is_empty() {
            return None;
        }
        let image_url = {
            let trimmed = self.edit_image_url.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        };
        self.saving = true;
        Some((name, image_url))
    }

    pub fn edit_saved(&mut self, name: &str, image_url: Option<&str>) {
        self.saving = false;
        self.mode = ProfileMode::Normal;
        if let Some(profile) = self.profile.as_mut() {
            profile.name = name.to_string();
            profile.image_url = image_url.map(|s| s.to_string());
        }
    }

    pub fn edit_failed(&mut self) {
        self.saving = false;
    }

    // --- rendering ---

    pub fn render(
        &self,
        frame: &mut Frame,
        area: Rect,
        palette: &Palette,
        own: bool,
        now: DateTime<Utc>,
    ) {
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(palette.border_focus))
            .title(format!(" @{} ", self.username));
        let inner = block.inner(area);
        frame.render_widget(block, area);

        if self.loading && self.profile.is_none() {
            frame.render_widget(Paragraph::new("Loading profile..."), inner);
            return;
        }

        if let Some(ref error) = self.error {
            let text = Paragraph::new(format!("Error: {}", error))
                .style(Style::default().fg(palette.danger))
                .wrap(Wrap { trim: true });
            frame.render_widget(text, inner);
            return;
        }

        let Some(profile) = self.profile.as_ref() else {
            frame.render_widget(
                Paragraph::new("Profile not available.").style(Style::default().fg(palette.dim)),
                inner,
            );
            return;
        };

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(5), Constraint::Min(0)])
            .split(inner);

        let follow_line = if own {
            Span::styled("e to edit profile", Style::default().fg(palette.dim))
        } else if profile.is_following {
            Span::styled("[following] f to unfollow", Style::default().fg(palette.accent))
        } else {
            Span::styled("f to follow", Style::default().fg(palette.dim))
        };

        let header = vec![
            Line::from(vec![
                Span::styled(
                    profile.name.as_str(),
                    Style::default().add_modifier(Modifier::BOLD),
                ),
                Span::styled(
                    format!(" @{}", profile.username),
                    Style::default().fg(palette.dim),
                ),
            ]),
            Line::from(vec![
                Span::styled(
                    compact_count(profile.following_count),
                    Style::default().add_modifier(Modifier::BOLD),
                ),
                Span::styled(" following   ", Style::default().fg(palette.dim)),
                Span::styled(
                    compact_count(profile.followers_count),
                    Style::default().add_modifier(Modifier::BOLD),
                ),
                Span::styled(" followers   ", Style::default().fg(palette.dim)),
                Span::styled(
                    compact_count(profile.tweets_count),
                    Style::default().add_modifier(Modifier::BOLD),
                ),
                Span::styled(" tweets", Style::default().fg(palette.dim)),
            ]),
            Line::from(follow_line),
            Line::from(""),
        ];
        frame.render_widget(Paragraph::new(header), chunks[0]);

        if profile.tweets.is_empty() {
            frame.render_widget(
                Paragraph::new("No tweets yet.").style(Style::default().fg(palette.dim)),
                chunks[1],
            );
        } else {
            let width = chunks[1].width.saturating_sub(2).max(20) as usize;
            let items: Vec<ListItem> = profile
                .tweets
                .iter()
                .map(|tweet| {
                    let mut lines = vec![Line::from(vec![Span::styled(
                        format!("· {}", relative_time(tweet.created_at, now)),
                        Style::default().fg(palette.dim),
                    )])];
                    for wrapped in textwrap::wrap(&tweet.content, width) {
                        lines.push(Line::from(wrapped.into_owned()));
                    }
                    let heart = if tweet.is_liked_by_me { "♥" } else { "♡" };
                    let heart_style = if tweet.is_liked_by_me {
                        Style::default().fg(palette.like)
                    } else {
                        Style::default().fg(palette.dim)
                    };
                    lines.push(Line::from(vec![
                        Span::styled(
                            format!("{} {}", heart, compact_count(tweet.likes_count)),
                            heart_style,
                        ),
                        Span::styled(
                            format!("   ↩ {}", compact_count(tweet.replies_count)),
                            Style::default().fg(palette.dim),
                        ),
                    ]));
                    lines.push(Line::from(""));
                    ListItem::new(lines)
                })
                .collect();

            let list = List::new(items).highlight_style(
                Style::default()
                    .bg(palette.highlight_bg)
                    .add_modifier(Modifier::BOLD),
            );
            let mut state = self.list_state.clone();
            frame.render_stateful_widget(list, chunks[1], &mut state);
        }

        match &self.mode {
            ProfileMode::Edit { field } => self.render_edit_modal(frame, area, palette, *field),
            ProfileMode::ConfirmDelete { .. } => render_confirm_modal(frame, area, palette),
            ProfileMode::Normal => {}
        }
    }

    fn render_edit_modal(&self, frame: &mut Frame, area: Rect, palette: &Palette, field: EditField) {
        let modal_area = center_rect(60, 35, area);
        frame.render_widget(Clear, modal_area);

        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(palette.accent))
            .title(" Edit Profile ");
        let inner = block.inner(modal_area);
        frame.render_widget(block, modal_area);

        let marker = |f: EditField| if f == field { "> " } else { "  " };
        let hint = if self.saving {
            "Saving..."
        } else {
            "Tab to switch | Enter to save | Esc to cancel"
        };

        let text = vec![
            Line::from(""),
            Line::from(vec![
                Span::styled(marker(EditField::Name), Style::default().fg(palette.accent)),
                Span::raw(format!("Name:   {}", self.edit_name)),
            ]),
            Line::from(vec![
                Span::styled(
                    marker(EditField::ImageUrl),
                    Style::default().fg(palette.accent),
                ),
                Span::raw(format!("Avatar: {}", self.edit_image_url)),
            ]),
            Line::from(""),
            Line::from(Span::styled(hint, Style::default().fg(palette.dim))),
        ];
        frame.render_widget(Paragraph::new(text).wrap(Wrap { trim: false }), inner);
    }
}

fn render_confirm_modal(frame: &mut Frame, area: Rect, palette: &Palette) {
    let modal_area = center_rect(50, 20, area);
    frame.render_widget(Clear, modal_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(palette.danger))
        .title(" Delete Tweet ");
    let inner = block.inner(modal_area);
    frame.render_widget(block, modal_area);

    let text = vec![
        Line::from(""),
        Line::from("Delete this tweet? This cannot be undone."),
        Line::from(""),
        Line::from(Span::styled(
            "Enter to delete | Esc to cancel",
            Style::default().fg(palette.dim),
        )),
    ];
    frame.render_widget(Paragraph::new(text).wrap(Wrap { trim: true }), inner);
}
