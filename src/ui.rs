pub mod board;

use itertools::Itertools;
use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, Widget, Wrap},
};
use time_humanize::{Accuracy, HumanTime, Tense};

use crate::session::{Status, STAGES};
use crate::util::format_clock;
use crate::{App, AppState};

const HORIZONTAL_MARGIN: u16 = 2;
const VERTICAL_MARGIN: u16 = 1;

fn status_line(status: &Status) -> (String, Style) {
    let bold = Style::default().add_modifier(Modifier::BOLD);
    match status {
        Status::FindTargets => (
            "find the moves".into(),
            Style::default().add_modifier(Modifier::DIM),
        ),
        Status::Found { san } => (format!("{} found", san), bold.fg(Color::Green)),
        Status::FoundButDangerous { san } => (
            format!("{} found (but it loses material)", san),
            bold.fg(Color::Yellow),
        ),
        Status::AlreadyFound { san } => (
            format!("{} already found", san),
            Style::default().fg(Color::Yellow),
        ),
        Status::NotATarget => (
            "not a check or capture".into(),
            Style::default().fg(Color::Red),
        ),
        Status::BadMovePlayed { san } => (
            format!("{} loses material", san),
            bold.fg(Color::Red),
        ),
        Status::RefutationUnresolvable { san } => (
            format!("{} is a mistake (refutation unavailable)", san),
            bold.fg(Color::Red),
        ),
        Status::PuzzleSolved => ("solved!".into(), bold.fg(Color::Green)),
        Status::PuzzleTimeout => ("time is up for this puzzle".into(), bold.fg(Color::Red)),
        Status::SessionTimeUp => ("session time is up".into(), bold.fg(Color::Red)),
    }
}

impl Widget for &App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        match self.state {
            AppState::Playing => render_playing(self, area, buf),
            AppState::Results => render_results(self, area, buf),
            AppState::History => render_history(self, area, buf),
        }
    }
}

fn render_playing(app: &App, area: Rect, buf: &mut Buffer) {
    let bold = Style::default().add_modifier(Modifier::BOLD);
    let dim = Style::default().add_modifier(Modifier::DIM);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Min(1),
            Constraint::Length(1),
        ])
        .split(area);

    let (number, total) = app.session.puzzle_number();
    let mut header = vec![
        Span::styled(format!("puzzle {}/{}", number, total), bold),
        Span::raw("   "),
        Span::styled(app.session.task_label(), Style::default().fg(Color::Cyan)),
    ];
    if let Some(remaining) = app.session.remaining_secs() {
        header.push(Span::raw("   "));
        let timer_style = if remaining <= 10 {
            bold.fg(Color::Red)
        } else {
            bold
        };
        header.push(Span::styled(format_clock(remaining), timer_style));
    } else {
        header.push(Span::raw("   "));
        header.push(Span::styled(
            format_clock(app.session.elapsed_secs() as u64),
            dim,
        ));
    }
    Paragraph::new(Line::from(header)).render(chunks[0], buf);

    let found = app.session.found_count();
    let progress = Paragraph::new(Span::styled(
        format!(
            "found {}   clicks {}   errors {}",
            found,
            app.session.stats().total_clicks,
            app.session.stats().total_errors
        ),
        dim,
    ));
    progress.render(chunks[1], buf);

    // Board on the left, found-move log on the right.
    let (board_w, _) = crate::ui::board::BoardView::size();
    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(board_w + 2), Constraint::Min(10)])
        .split(chunks[2]);

    app.board.render(body[0], buf);

    let log_lines: Vec<Line> = app
        .log
        .iter()
        .map(|entry| {
            let mut tags = Vec::new();
            if entry.is_check {
                tags.push("check");
            }
            if entry.is_capture {
                tags.push("capture");
            }
            let side = if entry.color.is_white() { "w" } else { "b" };
            Line::from(Span::styled(
                format!("{} {} ({})", side, entry.san, tags.iter().join("+")),
                Style::default().fg(if entry.color.is_white() {
                    Color::White
                } else {
                    Color::Gray
                }),
            ))
        })
        .collect();
    Paragraph::new(log_lines)
        .block(Block::default().borders(Borders::LEFT))
        .wrap(Wrap { trim: true })
        .render(body[1], buf);

    let (text, style) = status_line(&app.status);
    let status = if app.time_up_prompt {
        Paragraph::new(Span::styled(
            "session time is up. press any key to see your results",
            Style::default()
                .fg(Color::Red)
                .add_modifier(Modifier::BOLD | Modifier::ITALIC),
        ))
    } else {
        Paragraph::new(Span::styled(text, style))
    };
    status.render(chunks[3], buf);
}

fn render_results(app: &App, area: Rect, buf: &mut Buffer) {
    let bold = Style::default().add_modifier(Modifier::BOLD);
    let italic = Style::default().add_modifier(Modifier::ITALIC);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints([
            Constraint::Length(2),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(6),
            Constraint::Min(1),
            Constraint::Length(1),
        ])
        .split(area);

    let Some(summary) = &app.summary else {
        Paragraph::new("no session played yet")
            .alignment(Alignment::Center)
            .render(chunks[0], buf);
        return;
    };
    let stats = &summary.stats;

    Paragraph::new(Span::styled("session results", bold))
        .alignment(Alignment::Center)
        .render(chunks[0], buf);

    let headline = Paragraph::new(Span::styled(
        format!(
            "{:.0}% accuracy   {}/{} moves   {}/{} puzzles   {} in {}",
            summary.accuracy,
            stats.moves_found,
            stats.moves_available,
            stats.puzzles_solved,
            stats.puzzles_attempted,
            summary.difficulty,
            format_clock(summary.elapsed_secs as u64),
        ),
        bold,
    ))
    .alignment(Alignment::Center);
    headline.render(chunks[1], buf);

    let detail = Paragraph::new(Span::styled(
        format!(
            "{} clicks, {} errors, {:.1}s per puzzle, {} new / {} repeat solves",
            stats.total_clicks,
            stats.total_errors,
            summary.avg_secs_per_puzzle,
            stats.newly_solved,
            stats.previously_solved,
        ),
        Style::default().fg(Color::Cyan).patch(italic),
    ))
    .alignment(Alignment::Center);
    detail.render(chunks[2], buf);

    let breakdown: Vec<Line> = STAGES
        .iter()
        .enumerate()
        .map(|(i, _)| {
            let found = stats.category_found[i];
            let total = stats.category_total[i];
            let style = if total > 0 && found == total {
                Style::default().fg(Color::Green)
            } else {
                Style::default()
            };
            Line::from(Span::styled(
                format!("{:<16} {}/{}", crate::session::stage_name(i), found, total),
                style,
            ))
        })
        .collect();
    Paragraph::new(breakdown)
        .alignment(Alignment::Center)
        .render(chunks[3], buf);

    Paragraph::new(Span::styled(
        "(r)etry / (h)istory / (esc)ape",
        italic,
    ))
    .render(chunks[5], buf);
}

fn render_history(app: &App, area: Rect, buf: &mut Buffer) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(1),
            Constraint::Length(1),
        ])
        .split(area);

    Paragraph::new(Span::styled(
        "recent sessions",
        Style::default().add_modifier(Modifier::BOLD),
    ))
    .alignment(Alignment::Center)
    .render(chunks[0], buf);

    if app.history.is_empty() {
        Paragraph::new("no finished sessions yet")
            .alignment(Alignment::Center)
            .style(Style::default().fg(Color::Gray))
            .render(chunks[1], buf);
    } else {
        let header = Row::new(vec!["when", "difficulty", "accuracy", "solved", "time"]).style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        );
        let rows: Vec<Row> = app
            .history
            .iter()
            .map(|rec| {
                let secs = (chrono::Local::now() - rec.finished_at)
                    .num_seconds()
                    .max(0) as u64;
                let ago = HumanTime::from(std::time::Duration::from_secs(secs))
                    .to_text_en(Accuracy::Rough, Tense::Past);
                Row::new(vec![
                    Cell::from(ago),
                    Cell::from(rec.difficulty.clone()),
                    Cell::from(format!("{:.0}%", rec.accuracy)),
                    Cell::from(format!("{}/{}", rec.puzzles_solved, rec.puzzles_attempted)),
                    Cell::from(format_clock(rec.elapsed_secs as u64)),
                ])
            })
            .collect();
        Table::new(
            rows,
            &[
                Constraint::Length(20),
                Constraint::Length(10),
                Constraint::Length(9),
                Constraint::Length(8),
                Constraint::Length(7),
            ],
        )
        .header(header)
        .block(Block::default().borders(Borders::ALL))
        .render(chunks[1], buf);
    }

    Paragraph::new(Span::styled(
        "(b)ack / (esc)ape",
        Style::default().add_modifier(Modifier::ITALIC),
    ))
    .render(chunks[2], buf);
}
