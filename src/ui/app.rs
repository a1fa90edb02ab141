use std::io::stdout;
use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use image::DynamicImage;
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use ratatui_image::{picker::Picker, protocol::StatefulProtocol};
use tui_input::backend::crossterm::EventHandler;
use tui_input::Input;

use crate::catalog::Catalog;
use crate::config::{Config, UiColors};
use crate::search::{self, MatchResult, SearchSettings};

use super::draw;
use super::panes::Focus;
use super::selection::Selection;

const DEFAULT_FONT_SIZE: (u16, u16) = (8, 16);
const PAGE_STEP: isize = 5;

fn create_image_picker() -> Picker {
    let mut picker = base_picker();
    picker.guess_protocol();
    picker
}

#[cfg(unix)]
fn base_picker() -> Picker {
    Picker::from_termios().unwrap_or_else(|_| Picker::new(DEFAULT_FONT_SIZE))
}

#[cfg(not(unix))]
fn base_picker() -> Picker {
    Picker::new(DEFAULT_FONT_SIZE)
}

/// Help modal state with scroll support
#[derive(Debug, Clone)]
pub struct HelpModal {
    /// Current scroll offset (line index at top of viewport)
    pub scroll: usize,
    pub total_lines: usize,
    /// Viewport height (set during rendering)
    pub viewport_height: usize,
}

impl HelpModal {
    pub fn new(total_lines: usize) -> Self {
        Self {
            scroll: 0,
            total_lines,
            viewport_height: 10,
        }
    }

    pub fn scroll_down(&mut self, lines: usize) {
        let max_scroll = self.total_lines.saturating_sub(self.viewport_height);
        self.scroll = (self.scroll + lines).min(max_scroll);
    }

    pub fn scroll_up(&mut self, lines: usize) {
        self.scroll = self.scroll.saturating_sub(lines);
    }

    pub fn scroll_to_top(&mut self) {
        self.scroll = 0;
    }

    pub fn scroll_to_bottom(&mut self) {
        self.scroll = self.total_lines.saturating_sub(self.viewport_height);
    }

    pub fn can_scroll_up(&self) -> bool {
        self.scroll > 0
    }

    pub fn can_scroll_down(&self) -> bool {
        self.scroll + self.viewport_height < self.total_lines
    }
}

/// A section in the help modal (e.g., "Global", "Viewer")
pub struct HelpSection {
    pub title: &'static str,
    pub entries: Vec<HelpEntry>,
}

/// A single help entry (action name + key bindings)
pub struct HelpEntry {
    pub action: &'static str,
    pub keys: String,
}

/// Decoded page image plus the terminal protocol state used to draw it.
pub struct PageImage {
    image: DynamicImage,
    state: Box<dyn StatefulProtocol>,
}

impl PageImage {
    pub fn dimensions(&self) -> (u32, u32) {
        (self.image.width(), self.image.height())
    }

    pub fn state(&mut self) -> &mut Box<dyn StatefulProtocol> {
        &mut self.state
    }
}

/// What an image slot currently shows.
pub enum ImageSlot {
    Empty,
    Missing,
    Failed(String),
    Loaded(PageImage),
}

pub struct App<'a> {
    catalog: &'a Catalog,
    config: &'a Config,
    settings: SearchSettings,
    pub search_input: Input,
    pub results: Vec<MatchResult<'a>>,
    pub selected: usize,
    pub focus: Focus,
    selection: Selection,
    image_picker: Picker,
    pub thumbnail: ImageSlot,
    pub viewer: ImageSlot,
    pub help_modal: Option<HelpModal>,
    pub status: Option<String>,
}

impl<'a> App<'a> {
    pub fn new(catalog: &'a Catalog, config: &'a Config) -> Self {
        Self {
            catalog,
            config,
            settings: config.search_settings(),
            search_input: Input::default(),
            results: Vec::new(),
            selected: 0,
            focus: Focus::Input,
            selection: Selection::default(),
            image_picker: create_image_picker(),
            thumbnail: ImageSlot::Empty,
            viewer: ImageSlot::Empty,
            help_modal: None,
            status: None,
        }
    }

    pub fn run(&mut self) -> Result<()> {
        enable_raw_mode()?;
        let mut stdout = stdout();
        stdout.execute(EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        terminal.clear()?;

        let result = self.event_loop(&mut terminal);

        disable_raw_mode()?;
        terminal.backend_mut().execute(LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        result
    }

    fn event_loop<B>(&mut self, terminal: &mut Terminal<B>) -> Result<()>
    where
        B: ratatui::backend::Backend,
    {
        loop {
            draw::render(terminal, self)?;

            if event::poll(Duration::from_millis(250))? {
                if let Event::Key(key) = event::read()? {
                    if self.handle_key(key) {
                        break;
                    }
                }
            }
        }
        Ok(())
    }

    /// Returns true when the application should exit.
    fn handle_key(&mut self, key: KeyEvent) -> bool {
        // Ctrl+C always quits
        if key.modifiers.contains(KeyModifiers::CONTROL)
            && matches!(key.code, KeyCode::Char('c') | KeyCode::Char('C'))
        {
            return true;
        }

        if self.help_modal.is_some() {
            self.handle_help_modal_key(key);
            return false;
        }

        match self.focus {
            Focus::Viewer => self.handle_viewer_key(key),
            Focus::Input => self.handle_input_key(key),
            Focus::Results => self.handle_results_key(key),
        }
    }

    fn handle_input_key(&mut self, key: KeyEvent) -> bool {
        let input_keys = &self.config.keys.search_input;

        // Printable keys belong to the query, so only named keys open help here
        if !matches!(key.code, KeyCode::Char(_))
            && key_matches_any(&key, &self.config.keys.global.help)
        {
            self.show_help();
            return false;
        }

        // Cancel: move focus to results
        if key_matches_any(&key, &input_keys.cancel) {
            self.focus = Focus::Results;
            return false;
        }

        if key_matches_any(&key, &input_keys.confirm) {
            if self.results.is_empty() {
                self.focus = Focus::Results;
            } else {
                self.open_viewer();
            }
            return false;
        }

        if key_matches_any(&key, &input_keys.next) {
            self.move_selection(1);
            return false;
        }
        if key_matches_any(&key, &input_keys.prev) {
            self.move_selection(-1);
            return false;
        }

        if let Some(change) = self.search_input.handle_event(&Event::Key(key)) {
            if change.value {
                self.refresh_results();
            }
        }
        false
    }

    fn handle_results_key(&mut self, key: KeyEvent) -> bool {
        let results_keys = &self.config.keys.search_results;
        let global_keys = &self.config.keys.global;

        if key_matches_any(&key, &global_keys.quit) {
            return true;
        }

        if key_matches_any(&key, &global_keys.help) {
            self.show_help();
            return false;
        }

        // Search key and cancel both return to the input
        if key_matches_any(&key, &global_keys.search)
            || key_matches_any(&key, &results_keys.cancel)
        {
            self.focus = Focus::Input;
            return false;
        }

        if key_matches_any(&key, &results_keys.confirm) {
            self.open_viewer();
            return false;
        }

        if key_matches_any(&key, &results_keys.next) {
            self.move_selection(1);
        } else if key_matches_any(&key, &results_keys.prev) {
            self.move_selection(-1);
        } else if key_matches_any(&key, &results_keys.page_down) {
            self.move_selection(PAGE_STEP);
        } else if key_matches_any(&key, &results_keys.page_up) {
            self.move_selection(-PAGE_STEP);
        }
        false
    }

    fn handle_viewer_key(&mut self, key: KeyEvent) -> bool {
        let viewer_keys = &self.config.keys.viewer;

        if key_matches_any(&key, &viewer_keys.close) {
            self.close_viewer();
            return false;
        }

        if key_matches_any(&key, &self.config.keys.global.help) {
            self.show_help();
            return false;
        }

        let delta = if key_matches_any(&key, &viewer_keys.next) {
            1
        } else if key_matches_any(&key, &viewer_keys.prev) {
            -1
        } else {
            return false;
        };

        let before = self.selected;
        self.move_selection(delta);
        if self.selected != before {
            self.open_viewer();
        }
        false
    }

    fn refresh_results(&mut self) {
        self.results = search::search(self.catalog, self.search_input.value(), &self.settings);
        self.selected = 0;
        self.status = None;
        self.load_selection();
    }

    fn move_selection(&mut self, delta: isize) {
        if self.results.is_empty() {
            return;
        }
        let next = clamp_index(self.selected, delta, self.results.len());
        if next != self.selected {
            self.selected = next;
            self.load_selection();
        }
    }

    fn load_selection(&mut self) {
        let slot = match self.results.get(self.selected) {
            None => ImageSlot::Empty,
            Some(result) if !result.asset.exists => ImageSlot::Missing,
            Some(result) => {
                let page_id = result.page_id;
                let path = result.asset.path.clone();
                self.load_image(page_id, &path)
            }
        };
        self.thumbnail = slot;
    }

    fn load_image(&mut self, page_id: u32, path: &Path) -> ImageSlot {
        match image::open(path) {
            Ok(image) => {
                let state = self.image_picker.new_resize_protocol(image.clone());
                ImageSlot::Loaded(PageImage { image, state })
            }
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "failed to decode page image");
                ImageSlot::Failed(format!("Cannot decode page {}: {}", page_id, err))
            }
        }
    }

    fn open_viewer(&mut self) {
        let Some(page_id) = self.current_result().map(|result| result.page_id) else {
            return;
        };

        let selection = std::mem::take(&mut self.selection);
        self.selection = selection.select(&self.settings.assets, page_id);

        let Some(path) = self.selection.path().map(Path::to_path_buf) else {
            return;
        };
        self.viewer = if path.is_file() {
            self.load_image(page_id, &path)
        } else {
            ImageSlot::Missing
        };
        if let ImageSlot::Failed(message) = &self.viewer {
            self.status = Some(message.clone());
        }
        self.focus = Focus::Viewer;
    }

    fn close_viewer(&mut self) {
        let selection = std::mem::take(&mut self.selection);
        self.selection = selection.dismiss();
        self.viewer = ImageSlot::Empty;
        self.focus = Focus::Results;
    }

    pub fn current_result(&self) -> Option<&MatchResult<'a>> {
        self.results.get(self.selected)
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn catalog(&self) -> &Catalog {
        self.catalog
    }

    pub fn catalog_path(&self) -> &Path {
        &self.config.catalog
    }

    pub fn ui_colors(&self) -> &UiColors {
        &self.config.ui.colors
    }

    pub fn columns(&self) -> [u16; 2] {
        self.config.presentation.columns
    }

    pub fn image_width(&self) -> u16 {
        self.config.presentation.image_width
    }

    pub fn image_font_size(&self) -> (u16, u16) {
        self.image_picker.font_size
    }

    pub fn query(&self) -> &str {
        self.search_input.value()
    }

    /// Footer text for the current state.
    pub fn footer_message(&self) -> String {
        let hints = self.context_hints();
        if let Some(status) = &self.status {
            return format!("{}  {}", status, hints);
        }
        match footer_summary(self.query(), self.results.len()) {
            Some(summary) => format!("{}  {}", summary, hints),
            None => hints,
        }
    }

    fn context_hints(&self) -> String {
        let keys = &self.config.keys;
        match self.focus {
            Focus::Input => format!(
                "Type to search  {}: results  {}: view",
                first_key(&keys.search_input.cancel),
                first_key(&keys.search_input.confirm),
            ),
            Focus::Results => format!(
                "{}: search  {}: view  {}: help  {}: quit",
                first_key(&keys.global.search),
                first_key(&keys.search_results.confirm),
                first_key(&keys.global.help),
                first_key(&keys.global.quit),
            ),
            Focus::Viewer => format!(
                "{}/{}: page  {}: close",
                first_key(&keys.viewer.prev),
                first_key(&keys.viewer.next),
                first_key(&keys.viewer.close),
            ),
        }
    }

    // =========================================================================
    // Help Modal
    // =========================================================================

    /// Generate help content from current keybindings configuration
    pub fn help_entries(&self) -> Vec<HelpSection> {
        let keys = &self.config.keys;
        let entry = |action: &'static str, bindings: &[String]| HelpEntry {
            action,
            keys: bindings.join(", "),
        };

        vec![
            HelpSection {
                title: "Global",
                entries: vec![
                    entry("Quit", &keys.global.quit),
                    entry("Focus search", &keys.global.search),
                    entry("Help", &keys.global.help),
                ],
            },
            HelpSection {
                title: "Search input",
                entries: vec![
                    entry("Focus results", &keys.search_input.cancel),
                    entry("View image", &keys.search_input.confirm),
                    entry("Next result", &keys.search_input.next),
                    entry("Previous result", &keys.search_input.prev),
                ],
            },
            HelpSection {
                title: "Search results",
                entries: vec![
                    entry("Back to input", &keys.search_results.cancel),
                    entry("View image", &keys.search_results.confirm),
                    entry("Next result", &keys.search_results.next),
                    entry("Previous result", &keys.search_results.prev),
                    entry("Page down", &keys.search_results.page_down),
                    entry("Page up", &keys.search_results.page_up),
                ],
            },
            HelpSection {
                title: "Viewer",
                entries: vec![
                    entry("Close", &keys.viewer.close),
                    entry("Next page", &keys.viewer.next),
                    entry("Previous page", &keys.viewer.prev),
                ],
            },
        ]
    }

    fn help_total_lines(&self) -> usize {
        self.help_entries()
            .iter()
            .map(|section| section.entries.len() + 2)
            .sum()
    }

    pub fn show_help(&mut self) {
        self.help_modal = Some(HelpModal::new(self.help_total_lines()));
    }

    fn handle_help_modal_key(&mut self, key: KeyEvent) {
        if matches!(key.code, KeyCode::Esc | KeyCode::Char('q')) {
            self.help_modal = None;
            return;
        }

        let Some(modal) = self.help_modal.as_mut() else {
            return;
        };

        match key.code {
            KeyCode::Char('j') | KeyCode::Down => modal.scroll_down(1),
            KeyCode::Char('k') | KeyCode::Up => modal.scroll_up(1),
            KeyCode::PageDown => {
                let page = modal.viewport_height.saturating_sub(1).max(1);
                modal.scroll_down(page);
            }
            KeyCode::PageUp => {
                let page = modal.viewport_height.saturating_sub(1).max(1);
                modal.scroll_up(page);
            }
            KeyCode::Char('g') | KeyCode::Home => modal.scroll_to_top(),
            KeyCode::Char('G') | KeyCode::End => modal.scroll_to_bottom(),
            _ => {}
        }
    }
}

fn first_key(bindings: &[String]) -> &str {
    bindings.first().map(String::as_str).unwrap_or("-")
}

/// `N result(s)` for a non-empty query, `No matches` when nothing matched.
fn footer_summary(query: &str, count: usize) -> Option<String> {
    if query.trim().is_empty() {
        None
    } else if count == 0 {
        Some("No matches".to_string())
    } else {
        Some(format!("{} result(s)", count))
    }
}

fn clamp_index(current: usize, delta: isize, len: usize) -> usize {
    if len == 0 {
        return 0;
    }
    let max = len as isize - 1;
    (current as isize + delta).clamp(0, max) as usize
}

/// Check if the key event matches any of the bindings in the list
fn key_matches_any(event: &KeyEvent, bindings: &[String]) -> bool {
    bindings.iter().any(|b| key_matches_single(event, b))
}

/// Check if the key event matches a single binding string
fn key_matches_single(event: &KeyEvent, binding: &str) -> bool {
    let trimmed = binding.trim();
    if trimmed.is_empty() {
        return false;
    }

    // Ctrl/Alt/Super combinations are not bindable
    let disallowed = KeyModifiers::CONTROL | KeyModifiers::ALT | KeyModifiers::SUPER;
    if event.modifiers.intersects(disallowed) {
        return false;
    }

    match trimmed.to_ascii_lowercase().as_str() {
        "enter" => matches!(event.code, KeyCode::Enter),
        "tab" => matches!(event.code, KeyCode::Tab),
        "backtab" | "shift+tab" => matches!(event.code, KeyCode::BackTab),
        "backspace" => matches!(event.code, KeyCode::Backspace),
        "esc" | "escape" => matches!(event.code, KeyCode::Esc),
        "space" => matches!(event.code, KeyCode::Char(' ')),
        "up" => matches!(event.code, KeyCode::Up),
        "down" => matches!(event.code, KeyCode::Down),
        "left" => matches!(event.code, KeyCode::Left),
        "right" => matches!(event.code, KeyCode::Right),
        "pageup" | "page_up" => matches!(event.code, KeyCode::PageUp),
        "pagedown" | "page_down" => matches!(event.code, KeyCode::PageDown),
        "home" => matches!(event.code, KeyCode::Home),
        "end" => matches!(event.code, KeyCode::End),
        name if name.len() > 1 && name.starts_with('f') => name[1..]
            .parse::<u8>()
            .map(|n| (1..=12).contains(&n) && event.code == KeyCode::F(n))
            .unwrap_or(false),
        // Single character - case-sensitive (m != M, since M requires Shift)
        _ => {
            let mut chars = trimmed.chars();
            if let (Some(first), None) = (chars.next(), chars.next()) {
                matches!(event.code, KeyCode::Char(c) if c == first)
            } else {
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn test_key_matches_named_keys() {
        assert!(key_matches_single(&key(KeyCode::Esc), "Escape"));
        assert!(key_matches_single(&key(KeyCode::Esc), "esc"));
        assert!(key_matches_single(&key(KeyCode::PageDown), "PageDown"));
        assert!(key_matches_single(&key(KeyCode::F(1)), "F1"));
        assert!(key_matches_single(&key(KeyCode::F(12)), "f12"));
        assert!(!key_matches_single(&key(KeyCode::F(2)), "F1"));
        assert!(!key_matches_single(&key(KeyCode::Char('f')), "F13"));
    }

    #[test]
    fn test_key_matches_chars_case_sensitive() {
        assert!(key_matches_single(&key(KeyCode::Char('q')), "q"));
        assert!(!key_matches_single(&key(KeyCode::Char('Q')), "q"));
        assert!(key_matches_single(&key(KeyCode::Char('?')), "?"));
        assert!(!key_matches_single(&key(KeyCode::Char('q')), ""));
    }

    #[test]
    fn test_key_matches_rejects_control() {
        let event = KeyEvent::new(KeyCode::Char('q'), KeyModifiers::CONTROL);
        assert!(!key_matches_single(&event, "q"));
    }

    #[test]
    fn test_key_matches_any() {
        let bindings = vec!["j".to_string(), "Down".to_string()];
        assert!(key_matches_any(&key(KeyCode::Down), &bindings));
        assert!(!key_matches_any(&key(KeyCode::Up), &bindings));
    }

    #[test]
    fn test_clamp_index() {
        assert_eq!(clamp_index(0, -1, 3), 0);
        assert_eq!(clamp_index(1, 1, 3), 2);
        assert_eq!(clamp_index(2, 5, 3), 2);
        assert_eq!(clamp_index(4, -5, 10), 0);
        assert_eq!(clamp_index(0, 1, 0), 0);
    }

    #[test]
    fn test_footer_summary() {
        assert_eq!(footer_summary("", 0), None);
        assert_eq!(footer_summary("   ", 0), None);
        assert_eq!(footer_summary("rose", 0), Some("No matches".to_string()));
        assert_eq!(footer_summary("rose", 3), Some("3 result(s)".to_string()));
    }

    #[test]
    fn test_help_modal_scrolling() {
        let mut modal = HelpModal::new(30);
        modal.viewport_height = 10;
        assert!(!modal.can_scroll_up());
        modal.scroll_down(50);
        assert_eq!(modal.scroll, 20);
        assert!(!modal.can_scroll_down());
        modal.scroll_up(5);
        assert_eq!(modal.scroll, 15);
        modal.scroll_to_top();
        assert_eq!(modal.scroll, 0);
    }
}
