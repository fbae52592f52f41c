//! Colors and styles
//!
//! One palette per terminal color depth, picked at startup.

use ratatui::style::{Color, Modifier, Style};

/// Terminal color capability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorMode {
    /// 16 ANSI colors
    Basic,
    #[default]
    Indexed,
    /// 24-bit RGB
    TrueColor,
}

impl ColorMode {
    /// Guess from `COLORTERM` and `TERM`
    pub fn detect() -> Self {
        Self::from_env(
            std::env::var("COLORTERM").ok().as_deref(),
            std::env::var("TERM").ok().as_deref(),
        )
    }

    fn from_env(colorterm: Option<&str>, term: Option<&str>) -> Self {
        if matches!(colorterm, Some("truecolor" | "24bit")) {
            return Self::TrueColor;
        }

        match term {
            Some(t) if t.contains("kitty") || t.contains("alacritty") => Self::TrueColor,
            Some(t) if t.contains("256color") => Self::Indexed,
            _ => Self::Basic,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Theme {
    pub border_focused: Color,
    pub border_unfocused: Color,

    pub selection_bg: Color,
    pub selection_fg: Option<Color>,

    pub public_repo: Color,
    pub private_repo: Color,
    pub default_branch: Color,
    /// Repositories with an operation in flight
    pub busy: Color,

    pub text_secondary: Color,
    pub text_accent: Color,

    pub modal_info: Color,
    pub modal_warning: Color,
    pub modal_error: Color,

    pub status_bar_bg: Color,
    pub status_bar_fg: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self::for_color_mode(ColorMode::detect())
    }
}

impl Theme {
    pub fn for_color_mode(mode: ColorMode) -> Self {
        match mode {
            ColorMode::Basic => Self::basic(),
            ColorMode::Indexed => Self::indexed(),
            ColorMode::TrueColor => Self::truecolor(),
        }
    }

    pub fn basic() -> Self {
        Self {
            border_focused: Color::Cyan,
            border_unfocused: Color::DarkGray,
            selection_bg: Color::Blue,
            selection_fg: Some(Color::White),
            public_repo: Color::Green,
            private_repo: Color::Yellow,
            default_branch: Color::Magenta,
            busy: Color::Yellow,
            text_secondary: Color::DarkGray,
            text_accent: Color::Blue,
            modal_info: Color::Cyan,
            modal_warning: Color::Yellow,
            modal_error: Color::Red,
            status_bar_bg: Color::Blue,
            status_bar_fg: Color::White,
        }
    }

    pub fn indexed() -> Self {
        Self {
            border_focused: Color::Indexed(111),
            border_unfocused: Color::Indexed(242),
            selection_bg: Color::Indexed(24),
            selection_fg: Some(Color::Indexed(255)),
            public_repo: Color::Indexed(114),
            private_repo: Color::Indexed(179),
            default_branch: Color::Indexed(176),
            busy: Color::Indexed(215),
            text_secondary: Color::Indexed(248),
            text_accent: Color::Indexed(110),
            modal_info: Color::Indexed(111),
            modal_warning: Color::Indexed(215),
            modal_error: Color::Indexed(203),
            status_bar_bg: Color::Indexed(235),
            status_bar_fg: Color::Indexed(252),
        }
    }

    pub fn truecolor() -> Self {
        Self {
            border_focused: Color::Rgb(88, 166, 255),
            border_unfocused: Color::Rgb(72, 79, 88),
            selection_bg: Color::Rgb(31, 58, 95),
            selection_fg: Some(Color::Rgb(240, 246, 252)),
            public_repo: Color::Rgb(63, 185, 80),
            private_repo: Color::Rgb(210, 153, 34),
            default_branch: Color::Rgb(188, 140, 255),
            busy: Color::Rgb(219, 109, 40),
            text_secondary: Color::Rgb(139, 148, 158),
            text_accent: Color::Rgb(121, 192, 255),
            modal_info: Color::Rgb(88, 166, 255),
            modal_warning: Color::Rgb(210, 153, 34),
            modal_error: Color::Rgb(248, 81, 73),
            status_bar_bg: Color::Rgb(22, 27, 34),
            status_bar_fg: Color::Rgb(201, 209, 217),
        }
    }

    pub fn border(&self, focused: bool) -> Style {
        if focused {
            Style::default().fg(self.border_focused)
        } else {
            Style::default().fg(self.border_unfocused)
        }
    }

    pub fn selection(&self) -> Style {
        let style = Style::default()
            .bg(self.selection_bg)
            .add_modifier(Modifier::BOLD);
        match self.selection_fg {
            Some(fg) => style.fg(fg),
            None => style,
        }
    }

    pub fn visibility(&self, private: bool) -> Style {
        Style::default().fg(if private {
            self.private_repo
        } else {
            self.public_repo
        })
    }

    pub fn secondary(&self) -> Style {
        Style::default().fg(self.text_secondary)
    }

    pub fn status_bar(&self) -> Style {
        Style::default().bg(self.status_bar_bg).fg(self.status_bar_fg)
    }
}
