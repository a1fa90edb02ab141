use anyhow::Result;
use ratatui::backend::Backend;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::symbols::line::NORMAL as LINE;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap};
use ratatui::{Frame, Terminal};
use ratatui_image::{Resize, StatefulImage};

use crate::config::RgbColor;
use crate::fragment::{Emphasis, Fragment, ELLIPSIS};

use super::app::{App, ImageSlot};
use super::panes::Focus;

const HELP_MODAL_FOOTER: &str = "j/k: scroll  Esc/q: close";
const SEARCH_LIST_WIDTH: u16 = 32;
const IMAGE_NOT_FOUND: &str = "IMAGE NOT FOUND";

pub fn render<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<()> {
    terminal.draw(|frame| draw_frame(frame, app))?;
    Ok(())
}

fn draw_frame(frame: &mut Frame<'_>, app: &mut App) {
    let size = frame.area();
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(size);

    draw_header(frame, layout[0], app);
    draw_body(frame, layout[1], app);
    draw_footer(frame, layout[2], app);
    draw_help_modal(frame, size, app);
}

fn draw_header(frame: &mut Frame<'_>, area: Rect, app: &App) {
    let header_style = header_text_style(app);
    let catalog = app.catalog();
    let mut spans = vec![
        Span::styled(
            format!("CATALOG://{}", app.catalog_path().display()),
            header_style,
        ),
        Span::raw("   "),
        Span::styled(format!("{} PAGES", catalog.len()), header_style),
    ];

    let malformed = catalog.malformed().len();
    if malformed > 0 {
        spans.push(Span::raw(" | "));
        spans.push(Span::styled(
            format!("{} MALFORMED", malformed),
            selection_style(app),
        ));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn draw_body(frame: &mut Frame<'_>, area: Rect, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(SEARCH_LIST_WIDTH), Constraint::Min(0)])
        .split(area);
    draw_search(frame, chunks[0], app);

    if matches!(app.focus, Focus::Viewer) {
        draw_viewer(frame, chunks[1], app);
    } else {
        draw_preview(frame, chunks[1], app);
    }
}

fn draw_search(frame: &mut Frame<'_>, area: Rect, app: &App) {
    let active = matches!(app.focus, Focus::Input);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style(app));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    if inner.width == 0 || inner.height == 0 {
        return;
    }

    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(2), Constraint::Min(0)])
        .split(inner);

    draw_search_header(frame, layout[0], app, active, area.width);
    draw_search_list(frame, layout[1], app);
}

fn draw_search_header(frame: &mut Frame<'_>, area: Rect, app: &App, active: bool, outer_width: u16) {
    if area.width == 0 || area.height == 0 {
        return;
    }

    let label = format!("{}: ", app.focus.title());
    let value_style = if active {
        selection_style(app)
    } else {
        Style::default()
    };
    let line = Line::from(vec![
        Span::styled(label.clone(), header_text_style(app)),
        Span::styled(app.query().to_string(), value_style),
    ]);

    let cursor_column = if active {
        let label_width = Span::raw(label.as_str()).width();
        Some(label_width + app.search_input.visual_cursor())
    } else {
        None
    };

    let header_row = Rect { height: 1, ..area };
    render_header_with_separator(frame, area, line, app, outer_width);

    if let Some(column) = cursor_column {
        let x = header_row.x.saturating_add(column as u16);
        frame.set_cursor_position((x, header_row.y));
    }
}

fn draw_search_list(frame: &mut Frame<'_>, area: Rect, app: &App) {
    let items: Vec<ListItem> = if app.results.is_empty() {
        let message = if app.query().trim().is_empty() {
            "Type to search"
        } else {
            "No matches"
        };
        vec![ListItem::new(Line::from(message))]
    } else {
        app.results
            .iter()
            .map(|result| {
                let mut spans = vec![Span::raw(format!("PAGE {}", result.page_id))];
                if !result.asset.exists {
                    spans.push(Span::styled(" [missing]", header_text_style(app)));
                }
                ListItem::new(Line::from(spans))
            })
            .collect()
    };

    let mut state = ListState::default();
    if !app.results.is_empty() {
        state.select(Some(app.selected));
    }

    let list = List::new(items)
        .highlight_style(selection_style(app))
        .highlight_symbol(" ")
        .repeat_highlight_symbol(false);

    frame.render_stateful_widget(list, area, &mut state);
}

fn draw_preview(frame: &mut Frame<'_>, area: Rect, app: &mut App) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style(app));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    if inner.width == 0 || inner.height == 0 {
        return;
    }

    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(2), Constraint::Min(0)])
        .split(inner);

    let (title, fragment) = match app.current_result() {
        Some(result) => {
            let mut title = format!("PAGE {}", result.page_id);
            if !result.asset.exists {
                title.push_str("  (image missing)");
            }
            (title, Some(fragment_lines(&result.fragment, app)))
        }
        None => ("NO PAGE SELECTED".to_string(), None),
    };
    let header = Line::from(Span::styled(title, header_text_style(app)));
    render_header_with_separator(frame, layout[0], header, app, area.width);

    let Some(fragment) = fragment else {
        render_centered_words(frame, layout[1], "Search the catalog");
        return;
    };

    let [left, right] = app.columns();
    let total = u32::from(left) + u32::from(right);
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Ratio(u32::from(left), total),
            Constraint::Ratio(u32::from(right), total),
        ])
        .split(layout[1]);

    draw_thumbnail(frame, columns[0], app);
    frame.render_widget(
        Paragraph::new(fragment).wrap(Wrap { trim: false }),
        columns[1],
    );
}

fn fragment_lines(fragment: &Fragment, app: &App) -> Vec<Line<'static>> {
    let highlight = highlight_style(app);
    let mut spans: Vec<Span<'static>> = fragment
        .spans()
        .iter()
        .map(|span| match span.emphasis {
            Emphasis::None => Span::raw(span.text.clone()),
            Emphasis::Query => Span::styled(span.text.clone(), highlight),
            Emphasis::Label => {
                Span::styled(span.text.clone(), Style::default().add_modifier(Modifier::BOLD))
            }
        })
        .collect();
    if fragment.is_truncated() {
        spans.push(Span::raw(ELLIPSIS));
    }
    vec![Line::from(spans)]
}

fn draw_thumbnail(frame: &mut Frame<'_>, area: Rect, app: &mut App) {
    if area.width == 0 || area.height == 0 {
        return;
    }
    frame.render_widget(Clear, area);

    let font_size = app.image_font_size();
    match &mut app.thumbnail {
        ImageSlot::Loaded(page) => {
            let render_area = image_render_area(page.dimensions(), font_size, area);
            let widget = StatefulImage::new(None).resize(Resize::Fit);
            frame.render_stateful_widget(widget, render_area, page.state());
        }
        ImageSlot::Failed(error) => render_centered_words(frame, area, error),
        ImageSlot::Missing => render_centered_words(frame, area, IMAGE_NOT_FOUND),
        ImageSlot::Empty => {}
    }
}

fn draw_viewer(frame: &mut Frame<'_>, area: Rect, app: &mut App) {
    // Width capped at the configured number of cells, centered
    let width = app.image_width().saturating_add(2).min(area.width);
    let x = area.x + area.width.saturating_sub(width) / 2;
    let viewer_area = Rect { x, width, ..area };

    let title = match app.selection().current() {
        Some(image) => format!(" PAGE {} ", image.page_id),
        None => " VIEWER ".to_string(),
    };
    let subtitle = app
        .selection()
        .path()
        .map(|path| format!(" {} ", path.display()))
        .unwrap_or_default();

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style(app))
        .title(Line::from(Span::styled(title, header_text_style(app))))
        .title_bottom(Line::from(Span::styled(subtitle, header_text_style(app))))
        .title_alignment(Alignment::Center);
    let inner = block.inner(viewer_area);
    frame.render_widget(Clear, viewer_area);
    frame.render_widget(block, viewer_area);

    if inner.width == 0 || inner.height == 0 {
        return;
    }

    let font_size = app.image_font_size();
    match &mut app.viewer {
        ImageSlot::Loaded(page) => {
            let render_area = image_render_area(page.dimensions(), font_size, inner);
            let widget = StatefulImage::new(None).resize(Resize::Fit);
            frame.render_stateful_widget(widget, render_area, page.state());
        }
        ImageSlot::Failed(error) => render_centered_words(frame, inner, error),
        ImageSlot::Missing | ImageSlot::Empty => {
            render_centered_words(frame, inner, IMAGE_NOT_FOUND)
        }
    }
}

/// Largest centered area that keeps the image aspect ratio in terminal cells.
fn image_render_area(dimensions: (u32, u32), font_size: (u16, u16), area: Rect) -> Rect {
    if area.width == 0 || area.height == 0 {
        return area;
    }

    let (font_w, font_h) = font_size;
    if font_w == 0 || font_h == 0 {
        return area;
    }

    let (image_w, image_h) = dimensions;
    let desired_width = div_ceil_u32(image_w, u32::from(font_w));
    let desired_height = div_ceil_u32(image_h, u32::from(font_h));

    if desired_width == 0 || desired_height == 0 {
        return area;
    }

    let desired_width = desired_width.min(u32::from(u16::MAX)) as u16;
    let desired_height = desired_height.min(u32::from(u16::MAX)) as u16;

    let target_width = desired_width.min(area.width);
    let target_height = desired_height.min(area.height);

    let wratio = target_width as f64 / desired_width as f64;
    let hratio = target_height as f64 / desired_height as f64;
    let mut ratio = wratio.min(hratio);
    if !ratio.is_finite() || ratio <= 0.0 {
        ratio = 1.0;
    }

    let width = (desired_width as f64 * ratio)
        .round()
        .clamp(1.0, area.width as f64) as u16;
    let height = (desired_height as f64 * ratio)
        .round()
        .clamp(1.0, area.height as f64) as u16;

    let offset_x = area.width.saturating_sub(width) / 2;
    let offset_y = area.height.saturating_sub(height) / 2;

    Rect {
        x: area.x.saturating_add(offset_x),
        y: area.y.saturating_add(offset_y),
        width: width.max(1),
        height: height.max(1),
    }
}

fn div_ceil_u32(value: u32, divisor: u32) -> u32 {
    if divisor == 0 {
        return 0;
    }
    value / divisor + u32::from(value % divisor != 0)
}

fn draw_help_modal(frame: &mut Frame<'_>, area: Rect, app: &mut App) {
    if app.help_modal.is_none() {
        return;
    }

    // 2/3 width, 80% height
    let width = area.width.saturating_mul(2).saturating_div(3).max(40).min(area.width);
    let height = area.height.saturating_mul(4).saturating_div(5).max(10).min(area.height);

    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    let modal_area = Rect::new(x, y, width, height);

    frame.render_widget(Clear, modal_area);

    let header_style = header_text_style(app);
    let border_s = border_style(app);

    let sections = app.help_entries();
    let mut lines: Vec<Line> = Vec::new();

    let content_width = width.saturating_sub(4) as usize;
    let action_width = 20usize;

    for (section_idx, section) in sections.iter().enumerate() {
        let header_text = format!(" {} ", section.title);
        let padding_total = content_width.saturating_sub(header_text.len());
        let left_pad = padding_total / 2;
        let right_pad = padding_total - left_pad;
        let header_line = format!(
            "{}{}{}",
            LINE.horizontal.to_string().repeat(left_pad),
            header_text,
            LINE.horizontal.to_string().repeat(right_pad)
        );
        lines.push(Line::from(Span::styled(header_line, header_style)));

        for entry in &section.entries {
            let action = format!("{:<width$}", entry.action, width = action_width);
            lines.push(Line::from(vec![
                Span::styled(action, Style::default()),
                Span::styled(entry.keys.clone(), header_style),
            ]));
        }

        if section_idx < sections.len() - 1 {
            lines.push(Line::from(""));
        }
    }

    let total_lines = lines.len();
    // borders (2) + footer line (1)
    let inner_height = height.saturating_sub(3) as usize;

    let Some(modal) = app.help_modal.as_mut() else {
        return;
    };
    modal.total_lines = total_lines;
    modal.viewport_height = inner_height;

    let max_scroll = modal.total_lines.saturating_sub(modal.viewport_height);
    if modal.scroll > max_scroll {
        modal.scroll = max_scroll;
    }

    let scroll = modal.scroll;
    let viewport_height = modal.viewport_height;
    let scroll_indicator = match (modal.can_scroll_up(), modal.can_scroll_down()) {
        (true, true) => "▲▼",
        (true, false) => "▲ ",
        (false, true) => " ▼",
        (false, false) => "  ",
    };

    let visible_lines: Vec<Line> = lines
        .into_iter()
        .skip(scroll)
        .take(viewport_height)
        .collect();

    let title = Line::from(vec![
        Span::styled(" HELP ", header_style),
        Span::styled(scroll_indicator, header_style),
    ]);
    let footer = Line::from(Span::styled(
        format!(" {} ", HELP_MODAL_FOOTER),
        header_style,
    ));

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_s)
        .title(title)
        .title_bottom(footer)
        .title_alignment(Alignment::Center);

    let inner = block.inner(modal_area);
    frame.render_widget(block, modal_area);
    frame.render_widget(Paragraph::new(visible_lines), inner);
}

fn draw_footer(frame: &mut Frame<'_>, area: Rect, app: &App) {
    let colors = app.ui_colors();
    let style = Style::default()
        .fg(color(colors.status_fg))
        .bg(color(colors.status_bg));

    let message = if app.help_modal.is_some() {
        HELP_MODAL_FOOTER.to_string()
    } else {
        app.footer_message()
    };

    let background = Block::default().style(Style::default().bg(color(colors.status_bg)));
    frame.render_widget(background, area);
    frame.render_widget(Paragraph::new(message).style(style), area);
}

fn selection_style(app: &App) -> Style {
    let colors = app.ui_colors();
    Style::default()
        .fg(color(colors.selection_fg))
        .bg(color(colors.selection_bg))
}

fn border_style(app: &App) -> Style {
    Style::default().fg(color(app.ui_colors().border))
}

fn header_text_style(app: &App) -> Style {
    Style::default().fg(color(app.ui_colors().separator))
}

fn separator_style(app: &App) -> Style {
    Style::default().fg(color(app.ui_colors().separator))
}

fn highlight_style(app: &App) -> Style {
    Style::default()
        .fg(color(app.ui_colors().highlight))
        .add_modifier(Modifier::BOLD)
}

fn render_centered_words(frame: &mut Frame<'_>, area: Rect, text: &str) {
    if area.width == 0 || area.height == 0 {
        return;
    }

    let mut lines: Vec<Line> = text
        .split_whitespace()
        .map(|word| Line::from(word.to_string()))
        .collect();

    if lines.is_empty() {
        return;
    }

    if lines.len() as u16 > area.height {
        lines.truncate(area.height as usize);
    }

    let height = lines.len() as u16;
    let start_y = area.y + (area.height.saturating_sub(height)) / 2;
    let target = Rect {
        x: area.x,
        y: start_y,
        width: area.width,
        height,
    };

    frame.render_widget(Paragraph::new(lines).alignment(Alignment::Center), target);
}

/// Render a header line with a `├───┤` separator below it.
/// `outer_width` is the full pane width so the separator meets the side borders.
fn render_header_with_separator(
    frame: &mut Frame<'_>,
    area: Rect,
    content: Line<'static>,
    app: &App,
    outer_width: u16,
) {
    if area.width == 0 || area.height == 0 {
        return;
    }

    if area.height == 1 {
        frame.render_widget(Paragraph::new(content), area);
        return;
    }

    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Length(1)])
        .split(area);

    frame.render_widget(Paragraph::new(content), layout[0]);

    let inner_width = outer_width.saturating_sub(2) as usize;
    let separator = format!(
        "{}{}{}",
        LINE.vertical_right,
        LINE.horizontal.to_string().repeat(inner_width),
        LINE.vertical_left
    );
    let separator_line = Line::from(Span::styled(separator, separator_style(app)));

    // Shifted left by 1 to start on the border
    let separator_area = Rect {
        x: layout[1].x.saturating_sub(1),
        y: layout[1].y,
        width: outer_width,
        height: 1,
    };
    frame.render_widget(Paragraph::new(separator_line), separator_area);
}

fn color(rgb: RgbColor) -> Color {
    Color::Rgb(rgb.r, rgb.g, rgb.b)
}
