use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
    Frame,
};

use crate::api::{ApiError, ExploreUser, PageOf};
use crate::reconcile::{PendingToggle, Settlement};
use crate::theme::Palette;
use crate::ui::compact_count;

/// The user directory, paged by page number. Owns its copy of the listed
/// users, including their follow edges.
pub struct ExploreView {
    users: Vec<ExploreUser>,
    page: u32,
    total_pages: u32,
    list_state: ListState,
    loading: bool,
    error: Option<String>,
}

impl ExploreView {
    pub fn new() -> ExploreView {
        let mut list_state = ListState::default();
        list_state.select(Some(0));

        ExploreView {
            users: Vec::new(),
            page: 1,
            total_pages: 0,
            list_state,
            loading: true,
            error: None,
        }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn set_loading(&mut self) {
        self.loading = true;
        self.error = None;
    }

    pub fn update_users(&mut self, page: u32, result: Result<PageOf<ExploreUser>, &ApiError>) {
        self.loading = false;
        match result {
            Ok(listing) => {
                self.page = page;
                self.users = listing.items;
                self.total_pages = listing.total_pages;
                self.error = None;
                let selected = self.list_state.selected().unwrap_or(0);
                self.list_state
                    .select(Some(selected.min(self.users.len().saturating_sub(1))));
            }
            Err(e) => {
                self.error = Some(e.to_string());
            }
        }
    }

    pub fn next_page(&self) -> Option<u32> {
        (self.page < self.total_pages).then(|| self.page + 1)
    }

    pub fn prev_page(&self) -> Option<u32> {
        (self.page > 1).then(|| self.page - 1)
    }

    pub fn selected_username(&self) -> Option<String> {
        let index = self.list_state.selected()?;
        self.users.get(index).map(|u| u.username.clone())
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
            if selected < self.users.len().saturating_sub(1) {
                self.list_state.select(Some(selected + 1));
            }
        }
    }

    /// Optimistically toggle the follow edge on the selected user.
    pub fn toggle_follow(&mut self) -> Option<(String, PendingToggle)> {
        let index = self.list_state.selected()?;
        let user = self.users.get_mut(index)?;
        let pending = PendingToggle::apply(&mut user.is_following, &mut user.followers_count);
        Some((user.id.clone(), pending))
    }

    /// Returns true when the listing must be refetched (rollback happened).
    pub fn settle_follow(
        &mut self,
        user_id: &str,
        pending: PendingToggle,
        error: Option<&ApiError>,
    ) -> bool {
        let Some(user) = self.users.iter_mut().find(|u| u.id == user_id) else {
            return false;
        };

        let outcome = match error {
            None => Ok(()),
            Some(e) => Err(e),
        };
        match pending.settle(outcome) {
            Settlement::Confirmed => false,
            Settlement::RolledBack => {
                pending.roll_back(&mut user.is_following, &mut user.followers_count);
                true
            }
        }
    }

    pub fn render(&self, frame: &mut Frame, area: Rect, palette: &Palette) {
        let title = if self.total_pages > 1 {
            format!(" Explore · page {}/{} ", self.page, self.total_pages)
        } else {
            " Explore ".to_string()
        };
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(palette.border_focus))
            .title(title);
        let inner = block.inner(area);
        frame.render_widget(block, area);

        if self.loading && self.users.is_empty() {
            frame.render_widget(Paragraph::new("Loading users..."), inner);
            return;
        }

        if let Some(ref error) = self.error {
            let text = Paragraph::new(format!("Error: {}", error))
                .style(Style::default().fg(palette.danger))
                .wrap(Wrap { trim: true });
            frame.render_widget(text, inner);
            return;
        }

        if self.users.is_empty() {
            let hint = Paragraph::new("No users found.").style(Style::default().fg(palette.dim));
            frame.render_widget(hint, inner);
            return;
        }

        let items: Vec<ListItem> = self
            .users
            .iter()
            .map(|user| user_item(user, palette))
            .collect();

        let list = List::new(items).highlight_style(
            Style::default()
                .bg(palette.highlight_bg)
                .add_modifier(Modifier::BOLD),
        );
        let mut state = self.list_state.clone();
        frame.render_stateful_widget(list, inner, &mut state);
    }
}

fn user_item<'a>(user: &'a ExploreUser, palette: &Palette) -> ListItem<'a> {
    let mut header = vec![
        Span::styled(
            user.name.as_str(),
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!(" @{}", user.username),
            Style::default().fg(palette.dim),
        ),
    ];
    if user.is_following {
        header.push(Span::styled(
            " [following]",
            Style::default().fg(palette.accent),
        ));
    }

    let mut lines = vec![Line::from(header)];
    match &user.latest_tweet {
        Some(latest) => lines.push(Line::from(Span::styled(
            format!("  \"{}\"", latest.content),
            Style::default().fg(palette.dim).add_modifier(Modifier::ITALIC),
        ))),
        None => lines.push(Line::from(Span::styled(
            "  No recent tweets.",
            Style::default().fg(palette.dim),
        ))),
    }
    lines.push(Line::from(Span::styled(
        format!("  {} followers", compact_count(user.followers_count)),
        Style::default().fg(palette.dim),
    )));
    lines.push(Line::from(""));

    ListItem::new(lines)
}
