use ratatui::style::Color;
use serde::{Deserialize, Serialize};

/// Visual theme preference. Persisted with the session and restored at
/// startup; exactly two recognized values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    #[default]
    Dark,
}

/// Concrete colors for one theme.
#[derive(Debug, Clone, Copy)]
pub struct Palette {
    pub text: Color,
    pub dim: Color,
    pub accent: Color,
    pub danger: Color,
    pub success: Color,
    pub like: Color,
    pub border: Color,
    pub border_focus: Color,
    pub highlight_bg: Color,
}

impl Theme {
    pub fn toggle(self) -> Theme {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }

    pub fn palette(self) -> Palette {
        match self {
            Theme::Dark => Palette {
                text: Color::White,
                dim: Color::DarkGray,
                accent: Color::Cyan,
                danger: Color::Red,
                success: Color::Green,
                like: Color::LightRed,
                border: Color::Gray,
                border_focus: Color::Cyan,
                highlight_bg: Color::DarkGray,
            },
            Theme::Light => Palette {
                text: Color::Black,
                dim: Color::DarkGray,
                accent: Color::Blue,
                danger: Color::Red,
                success: Color::Green,
                like: Color::Red,
                border: Color::DarkGray,
                border_focus: Color::Blue,
                highlight_bg: Color::Gray,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle_flips_both_ways() {
        assert_eq!(Theme::Light.toggle(), Theme::Dark);
        assert_eq!(Theme::Dark.toggle(), Theme::Light);
    }

    #[test]
    fn test_serde_uses_lowercase_names() {
        assert_eq!(serde_json::to_string(&Theme::Dark).unwrap(), "\"dark\"");
        let theme: Theme = serde_json::from_str("\"light\"").unwrap();
        assert_eq!(theme, Theme::Light);
    }

    #[test]
    fn test_default_is_dark() {
        assert_eq!(Theme::default(), Theme::Dark);
    }
}
