use chrono::{DateTime, Utc};
use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
    Frame,
};

use super::{settle_like_in, toggle_like_at};
use crate::api::{ApiError, Comment, Tweet};
use crate::reconcile::{self, PendingToggle};
use crate::theme::Palette;
use crate::ui::{center_rect, compact_count, relative_time};

pub const MAX_TWEET_CHARS: usize = 280;

#[derive(Debug, Clone, PartialEq)]
enum FeedMode {
    Normal,
    Compose,
    ConfirmDelete { tweet_id: String },
    Thread,
}

/// Where key strokes should be routed while the feed has focus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedKeyContext {
    Normal,
    TextEntry,
    ConfirmDelete,
}

/// The reply thread overlay for one tweet. Comments are fetched lazily
/// when the overlay opens.
struct ThreadState {
    tweet_id: String,
    comments: Vec<Comment>,
    loading: bool,
    reply: String,
    sending: bool,
}

/// The home timeline: owns its copy of the fetched tweets and every
/// interaction performed on them.
pub struct FeedView {
    tweets: Vec<Tweet>,
    list_state: ListState,
    loading: bool,
    error: Option<String>,
    mode: FeedMode,
    compose: String,
    posting: bool,
    thread: Option<ThreadState>,
}

impl FeedView {
    pub fn new() -> FeedView {
        let mut list_state = ListState::default();
        list_state.select(Some(0));

        FeedView {
            tweets: Vec::new(),
            list_state,
            loading: true,
            error: None,
            mode: FeedMode::Normal,
            compose: String::new(),
            posting: false,
            thread: None,
        }
    }

    pub fn set_loading(&mut self) {
        self.loading = true;
        self.error = None;
    }

    pub fn update_feed(&mut self, result: Result<Vec<Tweet>, &ApiError>) {
        self.loading = false;
        match result {
            Ok(tweets) => {
                self.tweets = tweets;
                self.error = None;
                let selected = self.list_state.selected().unwrap_or(0);
                let clamped = selected.min(self.tweets.len().saturating_sub(1));
                self.list_state.select(Some(clamped));
            }
            Err(e) => {
                self.error = Some(e.to_string());
            }
        }
    }

    pub fn tweets(&self) -> &[Tweet] {
        &self.tweets
    }

    pub fn selected(&self) -> Option<&Tweet> {
        self.tweets.get(self.list_state.selected()?)
    }

    pub fn scroll_up(&mut self) {
        if let Some(selected) = self.list_state.selected() {
            if selected > 0 {
                self.list_state.select(Some(selected - 1));
            }
        }
    }

    pub fn scroll_down(&mut self) {
        if let Some(selected) = self.list_state.selected() {
            if selected < self.tweets.len().saturating_sub(1) {
                self.list_state.select(Some(selected + 1));
            }
        }
    }

    pub fn key_context(&self) -> FeedKeyContext {
        match self.mode {
            FeedMode::Normal => FeedKeyContext::Normal,
            FeedMode::Compose | FeedMode::Thread => FeedKeyContext::TextEntry,
            FeedMode::ConfirmDelete { .. } => FeedKeyContext::ConfirmDelete,
        }
    }

    pub fn is_modal_open(&self) -> bool {
        self.mode != FeedMode::Normal
    }

    // --- likes ---

    /// Optimistically toggle the like on the selected tweet.
    pub fn toggle_like(&mut self) -> Option<(String, PendingToggle)> {
        let index = self.list_state.selected()?;
        toggle_like_at(&mut self.tweets, index)
    }

    /// Returns true when the feed must be refetched (rollback happened).
    pub fn settle_like(
        &mut self,
        tweet_id: &str,
        pending: PendingToggle,
        error: Option<&ApiError>,
    ) -> bool {
        settle_like_in(&mut self.tweets, tweet_id, pending, error)
    }

    // --- composing ---

    pub fn open_compose(&mut self) {
        self.mode = FeedMode::Compose;
        self.compose.clear();
        self.posting = false;
    }

    pub fn close_modal(&mut self) {
        if self.posting || self.thread.as_ref().is_some_and(|t| t.sending) {
            return;
        }
        self.mode = FeedMode::Normal;
        self.compose.clear();
        self.thread = None;
    }

    pub fn add_char(&mut self, c: char) {
        match self.mode {
            FeedMode::Compose => {
                if self.compose.chars().count() < MAX_TWEET_CHARS && !self.posting {
                    self.compose.push(c);
                }
            }
            FeedMode::Thread => {
                if let Some(thread) = self.thread.as_mut() {
                    if thread.reply.chars().count() < MAX_TWEET_CHARS && !thread.sending {
                        thread.reply.push(c);
                    }
                }
            }
            _ => {}
        }
    }

    pub fn delete_char(&mut self) {
        match self.mode {
            FeedMode::Compose => {
                self.compose.pop();
            }
            FeedMode::Thread => {
                if let Some(thread) = self.thread.as_mut() {
                    thread.reply.pop();
                }
            }
            _ => {}
        }
    }

    pub fn compose_remaining(&self) -> usize {
        MAX_TWEET_CHARS.saturating_sub(self.compose.chars().count())
    }

    /// Claim the compose text for submission. The modal stays open and
    /// disabled until `tweet_posted` or `post_failed` is called.
    pub fn take_compose(&mut self) -> Option<String> {
        if self.mode != FeedMode::Compose || self.posting {
            return None;
        }
        let content = self.compose.trim().to_string();
        if content.is_empty() {
            return None;
        }
        self.posting = true;
        Some(content)
    }

    pub fn tweet_posted(&mut self) {
        self.posting = false;
        self.compose.clear();
        self.mode = FeedMode::Normal;
    }

    /// Keep the text so the user can retry.
    pub fn post_failed(&mut self) {
        self.posting = false;
    }

    // --- deleting ---

    /// Arm the confirm modal for the selected tweet, only when it belongs
    /// to the viewer. Returns false when there is nothing to delete.
    pub fn request_delete(&mut self, own_username: &str) -> bool {
        let Some(tweet) = self.selected() else {
            return false;
        };
        if !tweet.is_authored_by(own_username) {
            return false;
        }
        self.mode = FeedMode::ConfirmDelete {
            tweet_id: tweet.id.clone(),
        };
        true
    }

    /// The explicit confirmation: hand back the armed tweet id.
    pub fn confirm_delete(&mut self) -> Option<String> {
        if !matches!(self.mode, FeedMode::ConfirmDelete { .. }) {
            return None;
        }
        match std::mem::replace(&mut self.mode, FeedMode::Normal) {
            FeedMode::ConfirmDelete { tweet_id } => Some(tweet_id),
            _ => None,
        }
    }

    pub fn cancel_delete(&mut self) {
        if matches!(self.mode, FeedMode::ConfirmDelete { .. }) {
            self.mode = FeedMode::Normal;
        }
    }

    /// Server confirmed the delete: drop the tweet from this view's list.
    pub fn apply_delete(&mut self, tweet_id: &str) {
        self.tweets.retain(|t| t.id != tweet_id);
        let selected = self.list_state.selected().unwrap_or(0);
        let clamped = selected.min(self.tweets.len().saturating_sub(1));
        self.list_state.select(Some(clamped));
    }

    // --- replies ---

    /// Open the thread overlay for the selected tweet; comments load lazily.
    pub fn open_thread(&mut self) -> Option<String> {
        let tweet_id = self.selected()?.id.clone();
        self.mode = FeedMode::Thread;
        self.thread = Some(ThreadState {
            tweet_id: tweet_id.clone(),
            comments: Vec::new(),
            loading: true,
            reply: String::new(),
            sending: false,
        });
        Some(tweet_id)
    }

    pub fn update_comments(&mut self, tweet_id: &str, result: Result<Vec<Comment>, &ApiError>) {
        let Some(thread) = self.thread.as_mut() else {
            return;
        };
        if thread.tweet_id != tweet_id {
            return;
        }
        thread.loading = false;
        if let Ok(comments) = result {
            thread.comments = comments;
        }
    }

    /// Claim the reply text for submission.
    pub fn take_reply(&mut self) -> Option<(String, String)> {
        let thread = self.thread.as_mut()?;
        if thread.sending {
            return None;
        }
        let content = thread.reply.trim().to_string();
        if content.is_empty() {
            return None;
        }
        thread.sending = true;
        Some((thread.tweet_id.clone(), content))
    }

    /// Server confirmed the reply: append it to the thread and only now
    /// move the parent's reply counter.
    pub fn apply_reply(&mut self, tweet_id: &str, comment: Comment) {
        if let Some(thread) = self.thread.as_mut() {
            if thread.tweet_id == tweet_id {
                thread.sending = false;
                thread.reply.clear();
                thread.comments.push(comment);
            }
        }
        if let Some(tweet) = self.tweets.iter_mut().find(|t| t.id == tweet_id) {
            reconcile::confirm_reply(&mut tweet.replies_count);
        }
    }

    pub fn reply_failed(&mut self) {
        if let Some(thread) = self.thread.as_mut() {
            thread.sending = false;
        }
    }

    // --- rendering ---

    pub fn render(
        &self,
        frame: &mut Frame,
        area: Rect,
        palette: &Palette,
        now: DateTime<Utc>,
    ) {
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(palette.border_focus))
            .title(" Home ");
        let inner = block.inner(area);
        frame.render_widget(block, area);

        if self.loading && self.tweets.is_empty() {
            frame.render_widget(Paragraph::new("Loading your feed..."), inner);
            return;
        }

        if let Some(ref error) = self.error {
            let text = Paragraph::new(format!("Error: {}", error))
                .style(Style::default().fg(palette.danger))
                .wrap(Wrap { trim: true });
            frame.render_widget(text, inner);
            return;
        }

        if self.tweets.is_empty() {
            let hint = Paragraph::new("Your feed is empty. Follow other users to see their tweets!")
                .style(Style::default().fg(palette.dim))
                .wrap(Wrap { trim: true });
            frame.render_widget(hint, inner);
            return;
        }

        let width = inner.width.saturating_sub(2).max(20) as usize;
        let items: Vec<ListItem> = self
            .tweets
            .iter()
            .map(|tweet| tweet_item(tweet, palette, width, now))
            .collect();

        let list = List::new(items).highlight_style(
            Style::default()
                .bg(palette.highlight_bg)
                .add_modifier(Modifier::BOLD),
        );
        let mut state = self.list_state.clone();
        frame.render_stateful_widget(list, inner, &mut state);

        match &self.mode {
            FeedMode::Compose => self.render_compose_modal(frame, area, palette),
            FeedMode::ConfirmDelete { .. } => render_confirm_modal(frame, area, palette),
            FeedMode::Thread => self.render_thread_overlay(frame, area, palette, now),
            FeedMode::Normal => {}
        }
    }

    fn render_compose_modal(&self, frame: &mut Frame, area: Rect, palette: &Palette) {
        let modal_area = center_rect(60, 40, area);
        frame.render_widget(Clear, modal_area);

        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(palette.accent))
            .title(" Compose Tweet ");
        let inner = block.inner(modal_area);
        frame.render_widget(block, modal_area);

        let remaining = self.compose_remaining();
        let counter_style = if remaining < 20 {
            Style::default().fg(palette.danger)
        } else {
            Style::default().fg(palette.dim)
        };

        let footer = if self.posting {
            Line::from(Span::styled("Posting...", Style::default().fg(palette.dim)))
        } else {
            Line::from(vec![
                Span::styled(format!("{} left", remaining), counter_style),
                Span::styled("  |  Enter to post | Esc to cancel", Style::default().fg(palette.dim)),
            ])
        };

        let text = vec![
            Line::from(""),
            Line::from(self.compose.as_str()),
            Line::from(""),
            footer,
        ];
        frame.render_widget(Paragraph::new(text).wrap(Wrap { trim: false }), inner);
    }

    fn render_thread_overlay(
        &self,
        frame: &mut Frame,
        area: Rect,
        palette: &Palette,
        now: DateTime<Utc>,
    ) {
        let Some(thread) = self.thread.as_ref() else {
            return;
        };

        let modal_area = center_rect(70, 70, area);
        frame.render_widget(Clear, modal_area);

        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(palette.accent))
            .title(" Replies ");
        let inner = block.inner(modal_area);
        frame.render_widget(block, modal_area);

        let mut lines: Vec<Line> = Vec::new();
        if thread.loading {
            lines.push(Line::from("Loading replies..."));
        } else if thread.comments.is_empty() {
            lines.push(Line::from(Span::styled(
                "No replies yet.",
                Style::default().fg(palette.dim),
            )));
        } else {
            for comment in &thread.comments {
                lines.push(Line::from(vec![
                    Span::styled(
                        comment.user.name.as_str(),
                        Style::default().add_modifier(Modifier::BOLD),
                    ),
                    Span::styled(
                        format!(" @{}", comment.user.username),
                        Style::default().fg(palette.dim),
                    ),
                    Span::styled(
                        format!(" · {}", relative_time(comment.created_at, now)),
                        Style::default().fg(palette.dim),
                    ),
                ]));
                lines.push(Line::from(comment.content.as_str()));
                lines.push(Line::from(""));
            }
        }

        lines.push(Line::from(""));
        lines.push(Line::from(vec![
            Span::styled("Reply: ", Style::default().fg(palette.accent)),
            Span::raw(thread.reply.as_str()),
        ]));
        let hint = if thread.sending {
            "Sending..."
        } else {
            "Enter to send | Esc to close"
        };
        lines.push(Line::from(Span::styled(hint, Style::default().fg(palette.dim))));

        frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }), inner);
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

/// One feed row: header line, wrapped body, interaction counters.
fn tweet_item<'a>(
    tweet: &'a Tweet,
    palette: &Palette,
    width: usize,
    now: DateTime<Utc>,
) -> ListItem<'a> {
    let mut lines = vec![Line::from(vec![
        Span::styled(
            tweet.user.name.as_str(),
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!(" @{}", tweet.user.username),
            Style::default().fg(palette.dim),
        ),
        Span::styled(
            format!(" · {}", relative_time(tweet.created_at, now)),
            Style::default().fg(palette.dim),
        ),
    ])];

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
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::UserSummary;
    use crate::ui::views::test_support::tweet;
    use chrono::TimeZone;

    fn comment(id: &str) -> Comment {
        Comment {
            id: id.to_string(),
            content: "nice one".to_string(),
            created_at: Utc.with_ymd_and_hms(2024, 5, 1, 13, 0, 0).unwrap(),
            user: UserSummary {
                username: "grace".to_string(),
                name: "Grace".to_string(),
                image_url: None,
            },
        }
    }

    fn loaded_view() -> FeedView {
        let mut view = FeedView::new();
        view.update_feed(Ok(vec![
            tweet("t1", "ada", 3),
            tweet("t2", "grace", 0),
            tweet("t3", "ada", 1),
        ]));
        view
    }

    #[test]
    fn test_update_feed_clears_loading() {
        let mut view = FeedView::new();
        assert!(view.loading);
        view.update_feed(Ok(vec![tweet("t1", "ada", 0)]));
        assert!(!view.loading);
        assert_eq!(view.tweets().len(), 1);
    }

    #[test]
    fn test_update_feed_stores_error() {
        let mut view = FeedView::new();
        let error = ApiError::Server { status: 500 };
        view.update_feed(Err(&error));
        assert!(view.error.is_some());
    }

    #[test]
    fn test_update_feed_clamps_selection() {
        let mut view = loaded_view();
        view.scroll_down();
        view.scroll_down();
        assert_eq!(view.list_state.selected(), Some(2));

        view.update_feed(Ok(vec![tweet("t1", "ada", 3)]));
        assert_eq!(view.list_state.selected(), Some(0));
    }

    #[test]
    fn test_scroll_clamps_at_both_ends() {
        let mut view = loaded_view();
        view.scroll_up();
        assert_eq!(view.list_state.selected(), Some(0));
        view.scroll_down();
        view.scroll_down();
        view.scroll_down();
        assert_eq!(view.list_state.selected(), Some(2));
    }

    #[test]
    fn test_toggle_like_on_selected_tweet() {
        let mut view = loaded_view();
        let (id, pending) = view.toggle_like().unwrap();
        assert_eq!(id, "t1");
        assert!(pending.desired());
        assert_eq!(view.tweets()[0].likes_count, 4);
        assert!(view.tweets()[0].is_liked_by_me);
    }

    #[test]
    fn test_settle_like_rollback_requests_refresh() {
        let mut view = loaded_view();
        let (id, pending) = view.toggle_like().unwrap();
        let error = ApiError::Network {
            message: "down".to_string(),
        };
        assert!(view.settle_like(&id, pending, Some(&error)));
        assert_eq!(view.tweets()[0].likes_count, 3);
        assert!(!view.tweets()[0].is_liked_by_me);
    }

    #[test]
    fn test_compose_respects_char_limit() {
        let mut view = FeedView::new();
        view.open_compose();
        for _ in 0..(MAX_TWEET_CHARS + 40) {
            view.add_char('x');
        }
        assert_eq!(view.compose.chars().count(), MAX_TWEET_CHARS);
        assert_eq!(view.compose_remaining(), 0);
    }

    #[test]
    fn test_take_compose_requires_content() {
        let mut view = FeedView::new();
        view.open_compose();
        view.add_char(' ');
        assert!(view.take_compose().is_none());

        view.add_char('h');
        view.add_char('i');
        assert_eq!(view.take_compose().as_deref(), Some("hi"));
        // In flight: no double submission.
        assert!(view.take_compose().is_none());
    }

    #[test]
    fn test_post_failed_keeps_draft() {
        let mut view = FeedView::new();
        view.open_compose();
        view.add_char('h');
        view.take_compose().unwrap();
        view.post_failed();
        assert_eq!(view.key_context(), FeedKeyContext::TextEntry);
        assert_eq!(view.compose, "h");
    }

    #[test]
    fn test_delete_requires_ownership() {
        let mut view = loaded_view();
        assert!(!view.request_delete("grace"));
        assert!(view.request_delete("ada"));
        assert_eq!(view.key_context(), FeedKeyContext::ConfirmDelete);
    }

    #[test]
    fn test_delete_needs_confirmation_then_removes_exactly_one() {
        let mut view = loaded_view();
        assert!(view.request_delete("ada"));

        let tweet_id = view.confirm_delete().unwrap();
        assert_eq!(tweet_id, "t1");

        let before = view.tweets().len();
        view.apply_delete(&tweet_id);
        assert_eq!(view.tweets().len(), before - 1);
        assert!(view.tweets().iter().all(|t| t.id != "t1"));
    }

    #[test]
    fn test_cancel_delete_leaves_list_untouched() {
        let mut view = loaded_view();
        view.request_delete("ada");
        view.cancel_delete();
        assert_eq!(view.key_context(), FeedKeyContext::Normal);
        assert_eq!(view.tweets().len(), 3);
    }

    #[test]
    fn test_reply_counter_moves_only_after_confirmation() {
        let mut view = loaded_view();
        let tweet_id = view.open_thread().unwrap();
        assert_eq!(tweet_id, "t1");
        view.update_comments(&tweet_id, Ok(vec![]));

        view.add_char('y');
        view.add_char('o');
        let (target, content) = view.take_reply().unwrap();
        assert_eq!(content, "yo");

        // Not yet confirmed: counter unchanged.
        assert_eq!(view.tweets()[0].replies_count, 0);

        view.apply_reply(&target, comment("c1"));
        assert_eq!(view.tweets()[0].replies_count, 1);
        assert_eq!(view.thread.as_ref().unwrap().comments.len(), 1);
    }

    #[test]
    fn test_reply_in_flight_blocks_double_send() {
        let mut view = loaded_view();
        view.open_thread().unwrap();
        view.add_char('a');
        assert!(view.take_reply().is_some());
        assert!(view.take_reply().is_none());
    }

    #[test]
    fn test_stale_comment_update_is_ignored() {
        let mut view = loaded_view();
        view.open_thread().unwrap();
        view.update_comments("t9", Ok(vec![comment("c1")]));
        assert!(view.thread.as_ref().unwrap().loading);
        assert!(view.thread.as_ref().unwrap().comments.is_empty());
    }
}
