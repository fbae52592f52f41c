//! Repository and branch lists

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, List, ListItem, ListState, StatefulWidget},
};

use crate::flow::OperationLocks;
use crate::session::{Branch, RepositorySummary};
use crate::tui::theme::Theme;

/// Filtered repository list with visibility and busy markers
pub struct RepoList<'a> {
    repositories: &'a [&'a RepositorySummary],
    locks: &'a OperationLocks,
    theme: &'a Theme,
    block: Option<Block<'a>>,
}

impl<'a> RepoList<'a> {
    pub fn new(
        repositories: &'a [&'a RepositorySummary],
        locks: &'a OperationLocks,
        theme: &'a Theme,
    ) -> Self {
        Self {
            repositories,
            locks,
            theme,
            block: None,
        }
    }

    pub fn block(mut self, block: Block<'a>) -> Self {
        self.block = Some(block);
        self
    }

    fn to_list_items(&self) -> Vec<ListItem<'a>> {
        self.repositories
            .iter()
            .map(|repo| {
                let marker = if self.locks.is_locked(&repo.id) {
                    Span::styled("◐ ", Style::default().fg(self.theme.busy))
                } else {
                    Span::raw("  ")
                };

                let lock = if repo.private { "🔒" } else { "  " };

                ListItem::new(Line::from(vec![
                    marker,
                    Span::styled(
                        repo.name.clone(),
                        Style::default().add_modifier(Modifier::BOLD),
                    ),
                    Span::raw(" "),
                    Span::styled(lock, self.theme.visibility(repo.private)),
                    Span::styled(
                        format!(" {}", repo.id.owner()),
                        self.theme.secondary(),
                    ),
                ]))
            })
            .collect()
    }
}

impl<'a> StatefulWidget for RepoList<'a> {
    type State = ListState;

    fn render(self, area: Rect, buf: &mut Buffer, state: &mut Self::State) {
        let items = self.to_list_items();
        let mut list = List::new(items).highlight_style(self.theme.selection());
        if let Some(block) = self.block {
            list = list.block(block);
        }

        StatefulWidget::render(list, area, buf, state);
    }
}

/// Remote branches of one repository, default marked
pub struct BranchList<'a> {
    branches: &'a [Branch],
    theme: &'a Theme,
    refreshing: bool,
    block: Option<Block<'a>>,
}

impl<'a> BranchList<'a> {
    pub fn new(branches: &'a [Branch], theme: &'a Theme) -> Self {
        Self {
            branches,
            theme,
            refreshing: false,
            block: None,
        }
    }

    /// Hide the default marker while a newer branch list is on its way
    pub fn refreshing(mut self, refreshing: bool) -> Self {
        self.refreshing = refreshing;
        self
    }

    pub fn block(mut self, block: Block<'a>) -> Self {
        self.block = Some(block);
        self
    }
}

impl<'a> StatefulWidget for BranchList<'a> {
    type State = ListState;

    fn render(self, area: Rect, buf: &mut Buffer, state: &mut Self::State) {
        let items: Vec<ListItem<'_>> = self
            .branches
            .iter()
            .map(|branch| {
                let mut spans = vec![Span::raw(branch.name.clone())];
                if branch.is_default && !self.refreshing {
                    spans.push(Span::styled(
                        " (default)",
                        Style::default()
                            .fg(self.theme.default_branch)
                            .add_modifier(Modifier::ITALIC),
                    ));
                }
                ListItem::new(Line::from(spans))
            })
            .collect();

        let mut list = List::new(items).highlight_style(self.theme.selection());
        if let Some(block) = self.block {
            list = list.block(block);
        }

        StatefulWidget::render(list, area, buf, state);
    }
}

/// Wrapping selection over a list whose length changes underneath it
#[derive(Debug, Default)]
pub struct ListNavState {
    pub list_state: ListState,
    pub item_count: usize,
}

impl ListNavState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selected(&self) -> Option<usize> {
        self.list_state.selected()
    }

    pub fn select(&mut self, index: Option<usize>) {
        self.list_state.select(index);
    }

    pub fn next(&mut self) {
        if self.item_count == 0 {
            return;
        }

        let i = match self.list_state.selected() {
            Some(i) if i + 1 < self.item_count => i + 1,
            _ => 0,
        };
        self.list_state.select(Some(i));
    }

    pub fn previous(&mut self) {
        if self.item_count == 0 {
            return;
        }

        let i = match self.list_state.selected() {
            Some(0) => self.item_count - 1,
            Some(i) => i - 1,
            None => 0,
        };
        self.list_state.select(Some(i));
    }

    /// Update the length, keeping the selection in range
    pub fn set_item_count(&mut self, count: usize) {
        self.item_count = count;

        match self.list_state.selected() {
            _ if count == 0 => self.list_state.select(None),
            Some(selected) if selected >= count => self.list_state.select(Some(count - 1)),
            None => self.list_state.select(Some(0)),
            Some(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::sample_repo;

    #[test]
    fn test_nav_wraps_both_ways() {
        let mut state = ListNavState::new();
        state.set_item_count(3);
        assert_eq!(state.selected(), Some(0));

        state.next();
        state.next();
        assert_eq!(state.selected(), Some(2));
        state.next();
        assert_eq!(state.selected(), Some(0));

        state.previous();
        assert_eq!(state.selected(), Some(2));
    }

    #[test]
    fn test_nav_shrinking_list_clamps_selection() {
        let mut state = ListNavState::new();
        state.set_item_count(5);
        state.select(Some(4));

        state.set_item_count(2);
        assert_eq!(state.selected(), Some(1));

        state.set_item_count(0);
        assert_eq!(state.selected(), None);
        state.next();
        assert_eq!(state.selected(), None);
    }

    #[test]
    fn test_repo_list_renders_names_and_busy_marker() {
        let theme = Theme::basic();
        let locks = OperationLocks::new();
        let alpha = sample_repo("octo", "alpha");
        let beta = sample_repo("octo", "beta");
        let _guard = locks.acquire(&beta.id).unwrap();
        let repos = vec![&alpha, &beta];

        let area = Rect::new(0, 0, 30, 2);
        let mut buf = Buffer::empty(area);
        let mut state = ListState::default();
        RepoList::new(&repos, &locks, &theme).render(area, &mut buf, &mut state);

        let row = |y: u16| -> String {
            (0..area.width).map(|x| buf[(x, y)].symbol().to_string()).collect()
        };
        assert!(row(0).starts_with("  alpha"));
        assert!(row(1).starts_with("◐ beta"));
    }

    #[test]
    fn test_branch_list_marks_default() {
        let theme = Theme::basic();
        let branches = vec![
            Branch {
                name: "dev".into(),
                is_default: false,
            },
            Branch {
                name: "main".into(),
                is_default: true,
            },
        ];

        let area = Rect::new(0, 0, 20, 2);
        let mut buf = Buffer::empty(area);
        let mut state = ListState::default();
        BranchList::new(&branches, &theme).render(area, &mut buf, &mut state);

        let second: String = (0..area.width).map(|x| buf[(x, 1)].symbol().to_string()).collect();
        assert!(second.starts_with("main (default)"));
    }

    #[test]
    fn test_branch_list_hides_default_while_refreshing() {
        let theme = Theme::basic();
        let branches = vec![Branch {
            name: "main".into(),
            is_default: true,
        }];

        let area = Rect::new(0, 0, 20, 1);
        let mut buf = Buffer::empty(area);
        let mut state = ListState::default();
        BranchList::new(&branches, &theme)
            .refreshing(true)
            .render(area, &mut buf, &mut state);

        let row: String = (0..area.width).map(|x| buf[(x, 0)].symbol().to_string()).collect();
        assert_eq!(row.trim_end(), "main");
    }
}
