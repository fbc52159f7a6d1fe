use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph},
    Frame,
};

use crate::api::ApiError;
use crate::theme::Palette;
use crate::trends::Trend;
use crate::ui::compact_count;

/// The "what's happening" side column, shown next to the feed on wide
/// terminals. Read-only; refreshed together with the feed.
pub struct TrendsPanel {
    trends: Vec<Trend>,
    loading: bool,
    error: Option<String>,
}

impl TrendsPanel {
    pub fn new() -> TrendsPanel {
        TrendsPanel {
            trends: Vec::new(),
            loading: true,
            error: None,
        }
    }

    pub fn set_loading(&mut self) {
        self.loading = true;
        self.error = None;
    }

    pub fn update(&mut self, result: Result<Vec<Trend>, &ApiError>) {
        self.loading = false;
        match result {
            Ok(trends) => {
                self.trends = trends;
                self.error = None;
            }
            Err(e) => {
                self.error = Some(e.to_string());
            }
        }
    }

    pub fn render(&self, frame: &mut Frame, area: Rect, palette: &Palette) {
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(palette.border))
            .title(" What's happening ");
        let inner = block.inner(area);
        frame.render_widget(block, area);

        if self.loading && self.trends.is_empty() {
            frame.render_widget(Paragraph::new("Loading trends..."), inner);
            return;
        }

        if let Some(ref error) = self.error {
            frame.render_widget(
                Paragraph::new(format!("Error: {}", error))
                    .style(Style::default().fg(palette.danger)),
                inner,
            );
            return;
        }

        if self.trends.is_empty() {
            frame.render_widget(
                Paragraph::new("Nothing trending yet.").style(Style::default().fg(palette.dim)),
                inner,
            );
            return;
        }

        let items: Vec<ListItem> = self
            .trends
            .iter()
            .map(|trend| {
                ListItem::new(vec![
                    Line::from(Span::styled(
                        trend.topic.as_str(),
                        Style::default().add_modifier(Modifier::BOLD),
                    )),
                    Line::from(Span::styled(
                        format!("{} Tweets", compact_count(trend.tweet_count as u32)),
                        Style::default().fg(palette.dim),
                    )),
                    Line::from(""),
                ])
            })
            .collect();

        frame.render_widget(List::new(items), inner);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_replaces_trends() {
        let mut panel = TrendsPanel::new();
        assert!(panel.loading);

        panel.update(Ok(vec![Trend {
            topic: "#rust".to_string(),
            tweet_count: 4,
        }]));
        assert!(!panel.loading);
        assert_eq!(panel.trends.len(), 1);
    }

    #[test]
    fn test_update_error_keeps_old_trends() {
        let mut panel = TrendsPanel::new();
        panel.update(Ok(vec![Trend {
            topic: "#rust".to_string(),
            tweet_count: 4,
        }]));

        let error = ApiError::Server { status: 500 };
        panel.update(Err(&error));
        assert!(panel.error.is_some());
        assert_eq!(panel.trends.len(), 1);
    }
}
