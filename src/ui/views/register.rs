use ratatui::{
    layout::Rect,
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};

use crate::api::{ApiError, RegisterRequest};
use crate::theme::Palette;
use crate::ui::center_rect;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RegisterField {
    Name,
    Username,
    Password,
    ImageUrl,
}

const FIELD_ORDER: [RegisterField; 4] = [
    RegisterField::Name,
    RegisterField::Username,
    RegisterField::Password,
    RegisterField::ImageUrl,
];

/// The account-creation page. The avatar URL is optional; everything else
/// is required before a request goes out.
pub struct RegisterView {
    name: String,
    username: String,
    password: String,
    image_url: String,
    focus: RegisterField,
    submitting: bool,
    error: Option<String>,
}

impl RegisterView {
    pub fn new() -> RegisterView {
        RegisterView {
            name: String::new(),
            username: String::new(),
            password: String::new(),
            image_url: String::new(),
            focus: RegisterField::Name,
            submitting: false,
            error: None,
        }
    }

    fn field_mut(&mut self) -> &mut String {
        match self.focus {
            RegisterField::Name => &mut self.name,
            RegisterField::Username => &mut self.username,
            RegisterField::Password => &mut self.password,
            RegisterField::ImageUrl => &mut self.image_url,
        }
    }

    pub fn add_char(&mut self, c: char) {
        if !self.submitting {
            self.field_mut().push(c);
        }
    }

    pub fn delete_char(&mut self) {
        if !self.submitting {
            self.field_mut().pop();
        }
    }

    pub fn switch_field(&mut self) {
        let current = FIELD_ORDER
            .iter()
            .position(|f| *f == self.focus)
            .unwrap_or(0);
        self.focus = FIELD_ORDER[(current + 1) % FIELD_ORDER.len()];
    }

    pub fn take_submit(&mut self) -> Option<RegisterRequest> {
        if self.submitting {
            return None;
        }
        let name = self.name.trim();
        let username = self.username.trim();
        if name.is_empty() || username.is_empty() || self.password.is_empty() {
            self.error = Some("Name, username and password are required.".to_string());
            return None;
        }

        self.error = None;
        self.submitting = true;
        let image_url = {
            let trimmed = self.image_url.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        };
        Some(RegisterRequest {
            name: name.to_string(),
            username: username.to_string(),
            password: self.password.clone(),
            image_url,
        })
    }

    pub fn register_failed(&mut self, error: &ApiError) {
        self.submitting = false;
        self.error = Some(match error {
            ApiError::Validation { message } | ApiError::Conflict { message } => message.clone(),
            other => other.to_string(),
        });
    }

    pub fn reset(&mut self) {
        *self = RegisterView::new();
    }

    pub fn render(&self, frame: &mut Frame, area: Rect, palette: &Palette) {
        let panel = center_rect(55, 55, area);
        frame.render_widget(Clear, panel);

        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(palette.accent))
            .title(" Create your account ");
        let inner = block.inner(panel);
        frame.render_widget(block, panel);

        let marker = |f: RegisterField| if f == self.focus { "> " } else { "  " };
        let masked: String = "•".repeat(self.password.chars().count());

        let mut lines = vec![
            Line::from(""),
            Line::from(vec![
                Span::styled(marker(RegisterField::Name), Style::default().fg(palette.accent)),
                Span::raw(format!("Name:     {}", self.name)),
            ]),
            Line::from(vec![
                Span::styled(
                    marker(RegisterField::Username),
                    Style::default().fg(palette.accent),
                ),
                Span::raw(format!("Username: {}", self.username)),
            ]),
            Line::from(vec![
                Span::styled(
                    marker(RegisterField::Password),
                    Style::default().fg(palette.accent),
                ),
                Span::raw(format!("Password: {}", masked)),
            ]),
            Line::from(vec![
                Span::styled(
                    marker(RegisterField::ImageUrl),
                    Style::default().fg(palette.accent),
                ),
                Span::raw(format!("Avatar:   {} (optional)", self.image_url)),
            ]),
            Line::from(""),
        ];

        if self.submitting {
            lines.push(Line::from(Span::styled(
                "Creating account...",
                Style::default().fg(palette.dim),
            )));
        } else if let Some(ref error) = self.error {
            lines.push(Line::from(Span::styled(
                error.as_str(),
                Style::default().fg(palette.danger),
            )));
        }

        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            "Tab to switch | Enter to register | Esc back to sign-in",
            Style::default().fg(palette.dim),
        )));

        frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }), inner);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fill(view: &mut RegisterView, name: &str, username: &str, password: &str, avatar: &str) {
        for c in name.chars() {
            view.add_char(c);
        }
        view.switch_field();
        for c in username.chars() {
            view.add_char(c);
        }
        view.switch_field();
        for c in password.chars() {
            view.add_char(c);
        }
        view.switch_field();
        for c in avatar.chars() {
            view.add_char(c);
        }
    }

    #[test]
    fn test_required_fields() {
        let mut view = RegisterView::new();
        fill(&mut view, "Ada", "ada", "", "");
        assert!(view.take_submit().is_none());
        assert!(view.error.is_some());
    }

    #[test]
    fn test_optional_avatar_is_omitted_when_blank() {
        let mut view = RegisterView::new();
        fill(&mut view, "Ada", "ada", "secret", "  ");
        let request = view.take_submit().unwrap();
        assert_eq!(request.username, "ada");
        assert!(request.image_url.is_none());
    }

    #[test]
    fn test_avatar_is_kept_when_given() {
        let mut view = RegisterView::new();
        fill(&mut view, "Ada", "ada", "secret", "http://a/b.png");
        let request = view.take_submit().unwrap();
        assert_eq!(request.image_url.as_deref(), Some("http://a/b.png"));
    }

    #[test]
    fn test_field_cycle_wraps_around() {
        let mut view = RegisterView::new();
        for _ in 0..4 {
            view.switch_field();
        }
        assert_eq!(view.focus, RegisterField::Name);
    }

    #[test]
    fn test_server_validation_message_is_shown_verbatim() {
        let mut view = RegisterView::new();
        fill(&mut view, "Ada", "ada", "secret", "");
        view.take_submit().unwrap();

        view.register_failed(&ApiError::Validation {
            message: "username already taken".to_string(),
        });
        assert_eq!(view.error.as_deref(), Some("username already taken"));
        // The form can be resubmitted after the failure.
        assert!(view.take_submit().is_some());
    }
}
