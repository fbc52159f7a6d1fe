use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};

use crate::api::ApiError;
use crate::theme::Palette;
use crate::ui::center_rect;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoginField {
    Username,
    Password,
}

/// The sign-in page. Holds the credential draft and the outcome of the
/// last attempt; never touches the session store itself.
pub struct LoginView {
    username: String,
    password: String,
    focus: LoginField,
    submitting: bool,
    error: Option<String>,
}

impl LoginView {
    pub fn new() -> LoginView {
        LoginView {
            username: String::new(),
            password: String::new(),
            focus: LoginField::Username,
            submitting: false,
            error: None,
        }
    }

    pub fn add_char(&mut self, c: char) {
        if self.submitting {
            return;
        }
        match self.focus {
            LoginField::Username => self.username.push(c),
            LoginField::Password => self.password.push(c),
        }
    }

    pub fn delete_char(&mut self) {
        if self.submitting {
            return;
        }
        match self.focus {
            LoginField::Username => {
                self.username.pop();
            }
            LoginField::Password => {
                self.password.pop();
            }
        }
    }

    pub fn switch_field(&mut self) {
        self.focus = match self.focus {
            LoginField::Username => LoginField::Password,
            LoginField::Password => LoginField::Username,
        };
    }

    /// Claim the credentials for submission. Incomplete input becomes an
    /// inline error instead of a request.
    pub fn take_submit(&mut self) -> Option<(String, String)> {
        if self.submitting {
            return None;
        }
        if self.username.trim().is_empty() || self.password.is_empty() {
            self.error = Some("Please fill in both fields.".to_string());
            return None;
        }
        self.error = None;
        self.submitting = true;
        Some((self.username.trim().to_string(), self.password.clone()))
    }

    pub fn login_failed(&mut self, error: &ApiError) {
        self.submitting = false;
        self.error = Some(match error {
            // A 401 from /auth/login means the credentials were wrong, not
            // that a session expired.
            ApiError::AuthenticationExpired | ApiError::Validation { .. } => {
                "Authentication failed. Check your credentials.".to_string()
            }
            other => other.to_string(),
        });
    }

    /// Clear the draft once a session is established.
    pub fn reset(&mut self) {
        self.username.clear();
        self.password.clear();
        self.focus = LoginField::Username;
        self.submitting = false;
        self.error = None;
    }

    pub fn render(&self, frame: &mut Frame, area: Rect, palette: &Palette) {
        let panel = center_rect(50, 45, area);
        frame.render_widget(Clear, panel);

        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(palette.accent))
            .title(" Sign in to Growtwitter ");
        let inner = block.inner(panel);
        frame.render_widget(block, panel);

        let marker = |f: LoginField| if f == self.focus { "> " } else { "  " };
        let masked: String = "•".repeat(self.password.chars().count());

        let mut lines = vec![
            Line::from(""),
            Line::from(vec![
                Span::styled(marker(LoginField::Username), Style::default().fg(palette.accent)),
                Span::raw(format!("Username: {}", self.username)),
            ]),
            Line::from(vec![
                Span::styled(marker(LoginField::Password), Style::default().fg(palette.accent)),
                Span::raw(format!("Password: {}", masked)),
            ]),
            Line::from(""),
        ];

        if self.submitting {
            lines.push(Line::from(Span::styled(
                "Signing in...",
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
            "Tab to switch | Enter to sign in",
            Style::default().fg(palette.dim),
        )));
        lines.push(Line::from(vec![
            Span::styled("No account? ", Style::default().fg(palette.dim)),
            Span::styled(
                "F2 to register",
                Style::default()
                    .fg(palette.accent)
                    .add_modifier(Modifier::BOLD),
            ),
        ]));

        frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }), inner);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn typed(view: &mut LoginView, username: &str, password: &str) {
        for c in username.chars() {
            view.add_char(c);
        }
        view.switch_field();
        for c in password.chars() {
            view.add_char(c);
        }
    }

    #[test]
    fn test_submit_requires_both_fields() {
        let mut view = LoginView::new();
        assert!(view.take_submit().is_none());
        assert!(view.error.is_some());

        typed(&mut view, "ada", "");
        assert!(view.take_submit().is_none());
    }

    #[test]
    fn test_submit_trims_username() {
        let mut view = LoginView::new();
        typed(&mut view, " ada ", "secret");
        let (username, password) = view.take_submit().unwrap();
        assert_eq!(username, "ada");
        assert_eq!(password, "secret");
    }

    #[test]
    fn test_submit_blocks_while_in_flight() {
        let mut view = LoginView::new();
        typed(&mut view, "ada", "secret");
        assert!(view.take_submit().is_some());
        assert!(view.take_submit().is_none());
    }

    #[test]
    fn test_unauthorized_reads_as_bad_credentials() {
        let mut view = LoginView::new();
        typed(&mut view, "ada", "wrong");
        view.take_submit().unwrap();

        view.login_failed(&ApiError::AuthenticationExpired);
        assert_eq!(
            view.error.as_deref(),
            Some("Authentication failed. Check your credentials.")
        );
        // Attempt again after the failure.
        assert!(view.take_submit().is_some());
    }

    #[test]
    fn test_network_failure_keeps_its_message() {
        let mut view = LoginView::new();
        typed(&mut view, "ada", "secret");
        view.take_submit().unwrap();

        view.login_failed(&ApiError::Network {
            message: "connection refused".to_string(),
        });
        assert!(view.error.as_deref().unwrap().contains("connection refused"));
    }

    #[test]
    fn test_reset_clears_draft() {
        let mut view = LoginView::new();
        typed(&mut view, "ada", "secret");
        view.reset();
        assert!(view.username.is_empty());
        assert!(view.password.is_empty());
    }
}
