use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{
    Block, BorderType, Borders, Cell, Clear, Padding, Paragraph, Row, Table, Wrap,
};

use super::super::display::truncate;
use super::super::media::MediaKind;
use super::super::playback::{ProbeState, SessionSnapshot, SessionStatus};
use super::{LibraryTab, PlayerFocus, TuiState};

const ACCENT: Color = Color::Rgb(110, 170, 255);
const MUTED: Color = Color::Rgb(185, 195, 210);
const TEXT: Color = Color::Rgb(230, 235, 242);

pub(super) fn draw_library(frame: &mut Frame, state: &mut TuiState) {
    let bg = Block::default().style(Style::default().bg(Color::Black));
    frame.render_widget(bg, frame.area());

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(8),
            Constraint::Length(3),
            Constraint::Length(3),
        ])
        .split(frame.area());

    let rows = state.rows();
    let header = Paragraph::new(Line::from(vec![
        Span::styled(
            "REELPICK",
            Style::default().fg(ACCENT).add_modifier(Modifier::BOLD),
        ),
        Span::raw("   "),
        Span::styled(
            format!("{} continue", state.continue_items.len()),
            Style::default().fg(MUTED),
        ),
        Span::raw("   "),
        Span::styled(
            format!("{} on watchlist", state.watchlist_items.len()),
            Style::default().fg(MUTED),
        ),
        Span::raw("   "),
        Span::styled(state.tab.label(), Style::default().fg(Color::Yellow)),
    ]))
    .alignment(Alignment::Center)
    .block(panel_block("Library"));
    frame.render_widget(header, chunks[0]);

    let (headings, title) = match state.tab {
        LibraryTab::Continue => (["Title", "Progress", "Updated"], "Continue Watching".to_string()),
        LibraryTab::Watchlist => (["Title", "", ""], "Watchlist".to_string()),
        LibraryTab::Search if state.search.loading => {
            (["Title", "Kind", "Year"], "Search (loading...)".to_string())
        }
        LibraryTab::Search => (
            ["Title", "Kind", "Year"],
            format!(
                "Search \"{}\" page {}/{}",
                truncate(&state.search.query, 30),
                state.search.page,
                state.search.total_count.div_ceil(10).max(1)
            ),
        ),
    };
    let table_rows: Vec<Row> = rows
        .iter()
        .map(|row| {
            Row::new(vec![
                Cell::from(truncate(&row.title, 60)),
                Cell::from(row.detail.clone()),
                Cell::from(row.when.clone()),
            ])
        })
        .collect();
    let table = Table::new(
        table_rows,
        [
            Constraint::Percentage(60),
            Constraint::Length(16),
            Constraint::Length(14),
        ],
    )
    .header(
        Row::new(headings.to_vec())
            .style(Style::default().fg(ACCENT).add_modifier(Modifier::BOLD)),
    )
    .block(panel_block_owned(title))
    .row_highlight_style(highlight_style())
    .highlight_symbol("▸ ");
    frame.render_stateful_widget(table, chunks[1], &mut state.table_state);

    if rows.is_empty() {
        let hint = match state.tab {
            LibraryTab::Continue => "Nothing to continue yet.\nPress s to search for a title.",
            LibraryTab::Watchlist => "Watchlist is empty.\nPress w on the player screen to add.",
            LibraryTab::Search => "No search results.\nPress s to search.",
        };
        let area = centered_fixed_rect(44, 4, chunks[1]);
        frame.render_widget(
            Paragraph::new(hint)
                .alignment(Alignment::Center)
                .style(Style::default().fg(MUTED)),
            area,
        );
    }

    let controls = Paragraph::new(library_controls_line(state.tab))
        .alignment(Alignment::Center)
        .block(panel_block("Controls"));
    frame.render_widget(controls, chunks[2]);
    render_status(frame, chunks[3], &state.status);

    if let Some(input) = state.search_input.as_deref() {
        let text = format!("Search titles\n\n> {input}_\n\n[Enter] Search   [Esc] Cancel");
        render_modal(frame, "Search", &text);
    } else if let Some(confirm) = state.pending_delete.as_ref() {
        let from = match confirm.tab {
            LibraryTab::Watchlist => "the watchlist",
            _ => "continue watching",
        };
        let text = format!(
            "Remove from {from}?\n\n{}\n\n[y / Enter] Remove   [n / Esc] Cancel",
            truncate(&confirm.title, 56)
        );
        render_modal(frame, "Confirm Remove", &text);
    }
}

pub(super) fn draw_player(
    frame: &mut Frame,
    state: &mut TuiState,
    snapshot: &SessionSnapshot,
    in_watchlist: bool,
) {
    let bg = Block::default().style(Style::default().bg(Color::Black));
    frame.render_widget(bg, frame.area());

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(8),
            Constraint::Length(3),
            Constraint::Length(3),
        ])
        .split(frame.area());

    let mut header = vec![
        Span::styled(
            truncate(snapshot.title.as_deref().unwrap_or("Loading..."), 48),
            Style::default().fg(ACCENT).add_modifier(Modifier::BOLD),
        ),
        Span::raw("   "),
    ];
    if let Some(kind) = snapshot.kind {
        header.push(Span::styled(kind.to_string(), Style::default().fg(MUTED)));
        header.push(Span::raw("   "));
    }
    if let Some(episode) = snapshot.episode {
        header.push(Span::styled(
            format!("{episode} of {} seasons", snapshot.season_count),
            Style::default().fg(MUTED),
        ));
        header.push(Span::raw("   "));
    }
    if in_watchlist {
        header.push(Span::styled("★ watchlist", Style::default().fg(Color::Yellow)));
        header.push(Span::raw("   "));
    }
    header.push(Span::styled(
        snapshot.status.label(),
        Style::default().fg(session_status_color(&snapshot.status)),
    ));
    frame.render_widget(
        Paragraph::new(Line::from(header))
            .alignment(Alignment::Center)
            .block(panel_block("Now Playing")),
        chunks[0],
    );

    let is_series = snapshot.kind == Some(MediaKind::Series);
    let body = if is_series {
        Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(58), Constraint::Percentage(42)])
            .split(chunks[1])
    } else {
        Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(100)])
            .split(chunks[1])
    };

    draw_sources(frame, body[0], state, snapshot);
    if is_series {
        draw_episodes(frame, body[1], state, snapshot);
    }

    let url_line = Line::from(vec![
        Span::styled("URL ", Style::default().fg(MUTED)),
        Span::styled(
            snapshot.active_url.clone().unwrap_or_else(|| "-".to_string()),
            Style::default().fg(TEXT),
        ),
    ]);
    let controls = Paragraph::new(vec![player_controls_line(state.focus, is_series)])
        .alignment(Alignment::Center)
        .block(panel_block("Controls"));
    frame.render_widget(controls, chunks[2]);

    let status_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(chunks[3]);
    render_status(frame, status_chunks[0], &state.status);
    frame.render_widget(
        Paragraph::new(url_line).block(panel_block("Active")),
        status_chunks[1],
    );
}

fn draw_sources(frame: &mut Frame, area: Rect, state: &mut TuiState, snapshot: &SessionSnapshot) {
    let rows: Vec<Row> = snapshot
        .candidates
        .iter()
        .map(|candidate| {
            let marker = if candidate.active { "●" } else { " " };
            Row::new(vec![
                Cell::from(marker),
                Cell::from(candidate.name.clone()),
                Cell::from(candidate.probe.to_string())
                    .style(Style::default().fg(probe_color(candidate.probe))),
                Cell::from(candidate.url.clone()).style(Style::default().fg(MUTED)),
            ])
        })
        .collect();
    let focused = state.focus == PlayerFocus::Sources;
    let table = Table::new(
        rows,
        [
            Constraint::Length(2),
            Constraint::Length(14),
            Constraint::Length(12),
            Constraint::Min(10),
        ],
    )
    .header(
        Row::new(vec!["", "Source", "Probe", "URL"])
            .style(Style::default().fg(ACCENT).add_modifier(Modifier::BOLD)),
    )
    .block(focusable_block("Sources", focused))
    .row_highlight_style(if focused {
        highlight_style()
    } else {
        Style::default().add_modifier(Modifier::BOLD)
    })
    .highlight_symbol("▸ ");
    frame.render_stateful_widget(table, area, &mut state.source_state);

    if snapshot.candidates.is_empty() {
        let text = match &snapshot.status {
            SessionStatus::Resolving | SessionStatus::ChoosingEpisode => "Loading video sources...",
            SessionStatus::NoEpisodes => "No episodes found for this season.",
            SessionStatus::Unavailable(_) => "Title details unavailable.",
            _ => "No video sources available.",
        };
        frame.render_widget(
            Paragraph::new(text)
                .alignment(Alignment::Center)
                .style(Style::default().fg(MUTED)),
            centered_fixed_rect(40, 1, area),
        );
    }
}

fn draw_episodes(frame: &mut Frame, area: Rect, state: &mut TuiState, snapshot: &SessionSnapshot) {
    let current = snapshot.episode.map(|ep| ep.episode());
    let rows: Vec<Row> = snapshot
        .episodes
        .iter()
        .map(|(number, title)| {
            let style = if Some(*number) == current {
                Style::default().fg(ACCENT).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(TEXT)
            };
            Row::new(vec![Cell::from(number.to_string()), Cell::from(title.clone())]).style(style)
        })
        .collect();
    let title = match snapshot.season {
        Some(season) => format!("Season {season}/{}", snapshot.season_count),
        None => "Episodes".to_string(),
    };
    let focused = state.focus == PlayerFocus::Episodes;
    let table = Table::new(rows, [Constraint::Length(4), Constraint::Min(10)])
        .header(
            Row::new(vec!["Ep", "Title"])
                .style(Style::default().fg(ACCENT).add_modifier(Modifier::BOLD)),
        )
        .block(focusable_block_owned(title, focused))
        .row_highlight_style(if focused {
            highlight_style()
        } else {
            Style::default()
        })
        .highlight_symbol("▸ ");
    frame.render_stateful_widget(table, area, &mut state.episode_state);
}

fn render_status(frame: &mut Frame, area: Rect, status: &str) {
    let widget = Paragraph::new(status.to_string())
        .style(status_style(status))
        .block(panel_block("Status"));
    frame.render_widget(widget, area);
}

fn render_modal(frame: &mut Frame, title: &'static str, text: &str) {
    let popup_area = popup_rect_for_text(frame.area(), text);
    render_popup_shadow(frame, popup_area);
    frame.render_widget(Clear, popup_area);
    let popup = Paragraph::new(text.to_string())
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .block(modal_block(title));
    frame.render_widget(popup, popup_area);
}

fn panel_block(title: &'static str) -> Block<'static> {
    panel_block_owned(title.to_string())
}

fn panel_block_owned(title: String) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(Color::Rgb(125, 135, 150)))
        .title(title)
}

fn focusable_block(title: &'static str, focused: bool) -> Block<'static> {
    focusable_block_owned(title.to_string(), focused)
}

fn focusable_block_owned(title: String, focused: bool) -> Block<'static> {
    if !focused {
        return panel_block_owned(title);
    }
    panel_block_owned(title).border_style(Style::default().fg(ACCENT))
}

fn modal_block(title: &'static str) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(
            Style::default()
                .fg(Color::Rgb(160, 190, 235))
                .add_modifier(Modifier::BOLD),
        )
        .title(title)
        .padding(Padding::new(2, 2, 1, 1))
}

fn highlight_style() -> Style {
    Style::default()
        .bg(ACCENT)
        .fg(Color::Black)
        .add_modifier(Modifier::BOLD)
}

fn pill_active() -> Style {
    highlight_style()
}

fn pill_inactive() -> Style {
    Style::default().bg(Color::Rgb(72, 82, 96)).fg(TEXT)
}

fn library_controls_line(current: LibraryTab) -> Line<'static> {
    let pill = |tab: LibraryTab| {
        let style = if tab == current {
            pill_active()
        } else {
            pill_inactive()
        };
        Span::styled(format!(" {} ", tab.label()), style)
    };
    Line::from(vec![
        pill(LibraryTab::Continue),
        Span::raw(" "),
        pill(LibraryTab::Watchlist),
        Span::raw(" "),
        pill(LibraryTab::Search),
        Span::styled(
            "   ↑/↓ move  ←/→ tab  Enter open  s search  d remove  PgUp/PgDn page  q quit",
            Style::default().fg(MUTED),
        ),
    ])
}

fn player_controls_line(focus: PlayerFocus, is_series: bool) -> Line<'static> {
    let hints = if is_series {
        "↑/↓ move  Tab focus  Enter play  n/p episode  [/] season  w watchlist  Esc back  q quit"
    } else {
        "↑/↓ move  Enter switch source  w watchlist  Esc back  q quit"
    };
    let focus_label = match focus {
        PlayerFocus::Sources => " SOURCES ",
        PlayerFocus::Episodes => " EPISODES ",
    };
    Line::from(vec![
        Span::styled(focus_label, pill_active()),
        Span::styled(format!("   {hints}"), Style::default().fg(MUTED)),
    ])
}

fn probe_color(probe: ProbeState) -> Color {
    match probe {
        ProbeState::Pending => MUTED,
        ProbeState::Available => Color::Rgb(130, 220, 150),
        ProbeState::Unavailable => Color::Rgb(255, 145, 120),
    }
}

fn session_status_color(status: &SessionStatus) -> Color {
    match status {
        SessionStatus::Playing => Color::Rgb(130, 220, 150),
        status if status.is_error() => Color::Rgb(255, 145, 120),
        _ => Color::Yellow,
    }
}

fn status_style(status: &str) -> Style {
    if status.starts_with("ERROR:") {
        Style::default()
            .fg(Color::Rgb(255, 145, 120))
            .add_modifier(Modifier::BOLD)
    } else if status.starts_with("INFO:") {
        Style::default().fg(Color::Rgb(205, 165, 255))
    } else {
        Style::default().fg(TEXT)
    }
}

fn centered_fixed_rect(width: u16, height: u16, area: Rect) -> Rect {
    let clamped_width = width.min(area.width.max(1));
    let clamped_height = height.min(area.height.max(1));
    let x = area.x + area.width.saturating_sub(clamped_width) / 2;
    let y = area.y + area.height.saturating_sub(clamped_height) / 2;
    Rect::new(x, y, clamped_width, clamped_height)
}

fn render_popup_shadow(frame: &mut Frame, popup_area: Rect) {
    let area = frame.area();
    let shadow = Rect::new(
        (popup_area.x + 1).min(area.x + area.width.saturating_sub(1)),
        (popup_area.y + 1).min(area.y + area.height.saturating_sub(1)),
        popup_area.width.saturating_sub(1),
        popup_area.height.saturating_sub(1),
    );
    if shadow.width == 0 || shadow.height == 0 {
        return;
    }
    frame.render_widget(
        Block::default().style(Style::default().bg(Color::Rgb(14, 16, 24))),
        shadow,
    );
}

fn popup_rect_for_text(area: Rect, text: &str) -> Rect {
    let widest = text
        .lines()
        .map(|line| line.chars().count() as u16)
        .max()
        .unwrap_or(0);
    let line_count = text.lines().count() as u16;

    let available_width = area.width.saturating_sub(2).max(1);
    let width = widest
        .saturating_add(12)
        .clamp(48.min(available_width), 72.min(available_width));
    let available_height = area.height.saturating_sub(2).max(1);
    let height = line_count
        .saturating_add(6)
        .clamp(10.min(available_height), 18.min(available_height));

    centered_fixed_rect(width, height, area)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn popup_fits_inside_small_terminals() {
        let area = Rect::new(0, 0, 30, 8);
        let popup = popup_rect_for_text(area, "Remove from the watchlist?\n\nA Title");
        assert!(popup.width <= area.width);
        assert!(popup.height <= area.height);
    }

    #[test]
    fn centered_rect_is_clamped_to_area() {
        let area = Rect::new(2, 3, 10, 4);
        let rect = centered_fixed_rect(40, 1, area);
        assert_eq!(rect.width, 10);
        assert_eq!(rect.x, 2);
        assert_eq!(rect.y, 4);
    }
}
