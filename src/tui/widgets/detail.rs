//! Scrollable multi-line text panel
//!
//! Used for the selected repository and for long modal bodies such as
//! `git status` output.

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    text::Text,
    widgets::{Block, Paragraph, Widget, Wrap},
};

pub struct Detail<'a> {
    text: Text<'a>,
    block: Option<Block<'a>>,
    scroll: u16,
}

impl<'a> Detail<'a> {
    pub fn new(text: impl Into<Text<'a>>) -> Self {
        Self {
            text: text.into(),
            block: None,
            scroll: 0,
        }
    }

    pub fn block(mut self, block: Block<'a>) -> Self {
        self.block = Some(block);
        self
    }

    pub fn scroll(mut self, scroll: u16) -> Self {
        self.scroll = scroll;
        self
    }
}

impl<'a> Widget for Detail<'a> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let mut paragraph = Paragraph::new(self.text)
            .wrap(Wrap { trim: false })
            .scroll((self.scroll, 0));
        if let Some(block) = self.block {
            paragraph = paragraph.block(block);
        }
        paragraph.render(area, buf);
    }
}

/// Scroll position over a known number of lines
#[derive(Debug, Default, Clone)]
pub struct ScrollState {
    pub offset: u16,
    pub total_lines: usize,
    pub visible_height: u16,
}

impl ScrollState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_content(&mut self, content: &str, visible_height: u16) {
        self.total_lines = content.lines().count();
        self.visible_height = visible_height;
        self.clamp();
    }

    pub fn scroll_up(&mut self, n: u16) {
        self.offset = self.offset.saturating_sub(n);
    }

    pub fn scroll_down(&mut self, n: u16) {
        self.offset = self.offset.saturating_add(n);
        self.clamp();
    }

    pub fn page_up(&mut self) {
        self.scroll_up(self.visible_height.saturating_sub(2).max(1));
    }

    pub fn page_down(&mut self) {
        self.scroll_down(self.visible_height.saturating_sub(2).max(1));
    }

    pub fn reset(&mut self) {
        self.offset = 0;
    }

    fn max_offset(&self) -> u16 {
        let overflow = self.total_lines.saturating_sub(self.visible_height as usize);
        u16::try_from(overflow).unwrap_or(u16::MAX)
    }

    fn clamp(&mut self) {
        self.offset = self.offset.min(self.max_offset());
    }
}
