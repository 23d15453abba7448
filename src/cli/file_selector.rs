//! In-terminal file and folder browser.
//!
//! Runs inside the wizard's terminal session and returns when the user picks
//! an entry or cancels. Hidden entries are skipped; directories are listed
//! first.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use ratatui::{
    backend::Backend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    prelude::*,
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph},
    Terminal,
};

/// What the browser is allowed to return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectMode {
    /// A file with one of these extensions. Empty means any file.
    File(&'static [&'static str]),
    /// A directory. Files are not listed.
    Directory,
}

impl SelectMode {
    fn accepts_file(&self, path: &Path) -> bool {
        match self {
            SelectMode::File(extensions) if extensions.is_empty() => true,
            SelectMode::File(extensions) => path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| extensions.iter().any(|x| x.eq_ignore_ascii_case(e))),
            SelectMode::Directory => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileSelectResult {
    Selected(PathBuf),
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub name: String,
    pub path: PathBuf,
    pub is_dir: bool,
}

struct FileSelectorState {
    title: String,
    mode: SelectMode,
    current_dir: PathBuf,
    entries: Vec<FileEntry>,
    selected: usize,
    search: String,
    filtered: Vec<usize>,
}

impl FileSelectorState {
    fn new(title: &str, mode: SelectMode, start_dir: PathBuf) -> Self {
        let entries = list_directory(&start_dir, mode);
        let filtered = (0..entries.len()).collect();
        Self {
            title: title.to_string(),
            mode,
            current_dir: start_dir,
            entries,
            selected: 0,
            search: String::new(),
            filtered,
        }
    }

    fn navigate_to(&mut self, path: PathBuf) {
        self.current_dir = path;
        self.entries = list_directory(&self.current_dir, self.mode);
        self.search.clear();
        self.filtered = (0..self.entries.len()).collect();
        self.selected = 0;
    }

    fn update_filter(&mut self) {
        let search = self.search.to_lowercase();
        self.filtered = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.name.to_lowercase().contains(&search))
            .map(|(i, _)| i)
            .collect();
        self.selected = 0;
    }

    fn highlighted(&self) -> Option<&FileEntry> {
        self.filtered
            .get(self.selected)
            .and_then(|&i| self.entries.get(i))
    }
}

/// Start folder for a browser: the given hint's folder, else home, else `.`.
pub fn start_dir(hint: Option<&Path>) -> PathBuf {
    hint.map(|p| if p.is_dir() { p } else { p.parent().unwrap_or(p) })
        .filter(|p| p.is_dir())
        .map(Path::to_path_buf)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Browse for a file or folder inside an already-initialized terminal.
pub fn run_file_selector<B: Backend>(
    terminal: &mut Terminal<B>,
    title: &str,
    mode: SelectMode,
    start: PathBuf,
) -> Result<FileSelectResult> {
    let mut state = FileSelectorState::new(title, mode, start);

    loop {
        terminal.draw(|frame| draw_file_selector(frame, &state))?;

        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        match key.code {
            KeyCode::Enter => {
                if let Some(entry) = state.highlighted().cloned() {
                    if entry.is_dir {
                        state.navigate_to(entry.path);
                    } else {
                        return Ok(FileSelectResult::Selected(entry.path));
                    }
                }
            }
            KeyCode::Tab if mode == SelectMode::Directory => {
                return Ok(FileSelectResult::Selected(state.current_dir.clone()));
            }
            KeyCode::Backspace => {
                if state.search.is_empty() {
                    if let Some(parent) = state.current_dir.parent() {
                        state.navigate_to(parent.to_path_buf());
                    }
                } else {
                    state.search.pop();
                    state.update_filter();
                }
            }
            KeyCode::Esc => {
                if state.search.is_empty() {
                    return Ok(FileSelectResult::Cancelled);
                }
                state.search.clear();
                state.update_filter();
            }
            KeyCode::Up => state.selected = state.selected.saturating_sub(1),
            KeyCode::Down => {
                if state.selected + 1 < state.filtered.len() {
                    state.selected += 1;
                }
            }
            KeyCode::PageUp => state.selected = state.selected.saturating_sub(10),
            KeyCode::PageDown => {
                state.selected = (state.selected + 10).min(state.filtered.len().saturating_sub(1));
            }
            KeyCode::Home => state.selected = 0,
            KeyCode::End => state.selected = state.filtered.len().saturating_sub(1),
            KeyCode::Char(c) if !c.is_control() => {
                state.search.push(c);
                state.update_filter();
            }
            _ => {}
        }
    }
}

/// Entries of `path` visible in `mode`: `..`, then folders, then files.
pub fn list_directory(path: &Path, mode: SelectMode) -> Vec<FileEntry> {
    let mut entries = Vec::new();

    if let Some(parent) = path.parent() {
        if parent != path {
            entries.push(FileEntry {
                name: "..".to_string(),
                path: parent.to_path_buf(),
                is_dir: true,
            });
        }
    }

    if let Ok(read_dir) = fs::read_dir(path) {
        for entry in read_dir.flatten() {
            let entry_path = entry.path();
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with('.') {
                continue;
            }
            let is_dir = entry_path.is_dir();
            if is_dir || mode.accepts_file(&entry_path) {
                entries.push(FileEntry {
                    name,
                    path: entry_path,
                    is_dir,
                });
            }
        }
    }

    entries.sort_by(|a, b| {
        use std::cmp::Ordering;
        if a.name == ".." {
            return Ordering::Less;
        }
        if b.name == ".." {
            return Ordering::Greater;
        }
        match (a.is_dir, b.is_dir) {
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            _ => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
        }
    });

    entries
}

/// Shorten a path from the start: `...rest/of/path`.
pub fn truncate_path_start(path: &str, max_len: usize) -> String {
    let chars: Vec<char> = path.chars().collect();
    if chars.len() <= max_len {
        return path.to_string();
    }
    if max_len <= 3 {
        return "...".to_string();
    }
    let keep = max_len - 3;
    let tail: String = chars[chars.len() - keep..].iter().collect();
    format!("...{tail}")
}

fn draw_file_selector(frame: &mut Frame, state: &FileSelectorState) {
    let area = frame.area();
    let width = 72u16.min(area.width);
    let height = 24u16.min(area.height);
    let popup = Rect::new(
        area.x + area.width.saturating_sub(width) / 2,
        area.y + area.height.saturating_sub(height) / 2,
        width,
        height,
    );
    frame.render_widget(Clear, popup);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(format!(" {} ", state.title))
        .title_style(Style::default().fg(Color::Cyan).bold())
        .title_alignment(Alignment::Center);
    let inner = block.inner(popup);
    frame.render_widget(block, popup);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2),
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(1),
        ])
        .split(inner);

    let path_str = state.current_dir.display().to_string();
    let max_path_len = (chunks[0].width as usize).saturating_sub(12);
    let path_line = Line::from(vec![
        Span::styled("  Current: ", Style::default().fg(Color::DarkGray)),
        Span::styled(
            truncate_path_start(&path_str, max_path_len),
            Style::default().fg(Color::White),
        ),
    ]);
    frame.render_widget(Paragraph::new(path_line), chunks[0]);

    let search_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(" Filter ")
        .title_style(Style::default().fg(Color::DarkGray));
    let search_line = if state.search.is_empty() {
        Line::from(vec![
            Span::styled("Type to filter...", Style::default().fg(Color::DarkGray)),
            Span::styled("▌", Style::default().fg(Color::Cyan)),
        ])
    } else {
        Line::from(vec![
            Span::styled(state.search.as_str(), Style::default().fg(Color::White)),
            Span::styled("▌", Style::default().fg(Color::Cyan)),
        ])
    };
    frame.render_widget(Paragraph::new(search_line).block(search_block), chunks[1]);

    let list_height = chunks[2].height as usize;
    let start_idx = (state.selected + 1).saturating_sub(list_height);
    let items: Vec<ListItem> = state
        .filtered
        .iter()
        .enumerate()
        .skip(start_idx)
        .take(list_height)
        .map(|(display_idx, &entry_idx)| {
            let entry = &state.entries[entry_idx];
            let icon = if entry.is_dir { "▸ " } else { "  " };
            let suffix = if entry.is_dir && entry.name != ".." { "/" } else { "" };
            let style = match (display_idx == state.selected, entry.is_dir) {
                (true, true) => Style::default().fg(Color::Black).bg(Color::Cyan).bold(),
                (true, false) => Style::default().fg(Color::Black).bg(Color::Green).bold(),
                (false, true) => Style::default().fg(Color::Cyan),
                (false, false) => Style::default().fg(Color::White),
            };
            ListItem::new(format!("  {icon}{}{suffix}", entry.name)).style(style)
        })
        .collect();
    let mut list_state = ListState::default();
    list_state.select(Some(state.selected.saturating_sub(start_idx)));
    frame.render_stateful_widget(List::new(items), chunks[2], &mut list_state);

    if state.filtered.is_empty() {
        let msg = if state.search.is_empty() {
            "Nothing to select in this folder"
        } else {
            "No matching entries"
        };
        let msg_area = Rect::new(
            chunks[2].x + 2,
            chunks[2].y + chunks[2].height / 2,
            chunks[2].width.saturating_sub(4),
            1,
        );
        frame.render_widget(
            Paragraph::new(Span::styled(msg, Style::default().fg(Color::DarkGray).italic()))
                .alignment(Alignment::Center),
            msg_area,
        );
    }

    let mut help = vec![
        Span::styled("  Enter", Style::default().fg(Color::Cyan)),
        Span::styled(" open/select  ", Style::default().fg(Color::DarkGray)),
    ];
    if state.mode == SelectMode::Directory {
        help.push(Span::styled("Tab", Style::default().fg(Color::Cyan)));
        help.push(Span::styled(" use this folder  ", Style::default().fg(Color::DarkGray)));
    }
    help.extend([
        Span::styled("Bksp", Style::default().fg(Color::Cyan)),
        Span::styled(" up  ", Style::default().fg(Color::DarkGray)),
        Span::styled("Esc", Style::default().fg(Color::Cyan)),
        Span::styled(" cancel", Style::default().fg(Color::DarkGray)),
    ]);
    frame.render_widget(Paragraph::new(Line::from(help)), chunks[3]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_mode_filters_extensions() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("events.csv"), "a\n").unwrap();
        fs::write(dir.path().join("notes.txt"), "x").unwrap();
        fs::write(dir.path().join(".hidden.csv"), "a\n").unwrap();

        let entries = list_directory(dir.path(), SelectMode::File(&["csv", "parquet"]));
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["..", "nested", "events.csv"]);
    }

    #[test]
    fn test_directory_mode_lists_folders_only() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("out")).unwrap();
        fs::write(dir.path().join("events.csv"), "a\n").unwrap();

        let entries = list_directory(dir.path(), SelectMode::Directory);
        assert!(entries.iter().all(|e| e.is_dir));
        assert!(entries.iter().any(|e| e.name == "out"));
    }

    #[test]
    fn test_truncate_path_start() {
        assert_eq!(truncate_path_start("/a/b", 10), "/a/b");
        assert_eq!(truncate_path_start("/home/user/data", 8), ".../data");
        assert_eq!(truncate_path_start("/home/user/data", 2), "...");
    }
}
