use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::Line,
    widgets::{Paragraph, Widget, Wrap},
    Frame,
};

use crate::problem::ProblemData;
use crate::session::{GameState, Mode, Session};
use crate::App;

const BOX_COLOR_DEFAULT: Color = Color::Rgb(160, 174, 192);
const BOX_COLOR_FLASH: Color = Color::Rgb(246, 224, 94);

const HORIZONTAL_MARGIN: u16 = 2;
const VERTICAL_MARGIN: u16 = 1;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenAreas {
    pub message: Rect,
    pub board: Rect,
    pub help: Rect,
}

/// One layout for both rendering and mouse mapping, so clicks and pixels
/// always agree on where the board is.
pub fn screen_areas(area: Rect) -> ScreenAreas {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints([
            Constraint::Length(3), // message + instruction
            Constraint::Min(0),    // board
            Constraint::Length(2), // key bindings
        ])
        .split(area);
    ScreenAreas {
        message: chunks[0],
        board: chunks[1],
        help: chunks[2],
    }
}

/// Mapping between the problem's pixel plane and terminal cells. A cell spans
/// `px_per_col` pixels horizontally and twice that vertically, which keeps
/// boxes roughly square on a typical terminal font.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoardTransform {
    pub px_per_col: f64,
    pub origin_col: u16,
    pub origin_row: u16,
    pub cols: u16,
    pub rows: u16,
}

pub fn board_transform(problem: &ProblemData, board: Rect) -> Option<BoardTransform> {
    if board.width == 0 || board.height == 0 {
        return None;
    }
    let (w, h) = problem.bounds();
    let px_per_col = (w / board.width as f64).max(h / (2.0 * board.height as f64));
    let cols = ((w / px_per_col).ceil() as u16).clamp(1, board.width);
    let rows = ((h / (2.0 * px_per_col)).ceil() as u16).clamp(1, board.height);
    Some(BoardTransform {
        px_per_col,
        origin_col: board.x + (board.width - cols) / 2,
        origin_row: board.y + (board.height - rows) / 2,
        cols,
        rows,
    })
}

impl BoardTransform {
    /// Problem pixel at the center of a terminal cell.
    pub fn cell_to_pixel(&self, column: u16, row: u16) -> (f64, f64) {
        let c = column.saturating_sub(self.origin_col) as f64;
        let r = row.saturating_sub(self.origin_row) as f64;
        (
            (c + 0.5) * self.px_per_col,
            (r + 0.5) * 2.0 * self.px_per_col,
        )
    }

    /// None when the cell lies outside the board.
    pub fn terminal_to_pixel(&self, column: u16, row: u16) -> Option<(f64, f64)> {
        let inside = column >= self.origin_col
            && column < self.origin_col + self.cols
            && row >= self.origin_row
            && row < self.origin_row + self.rows;
        if !inside {
            return None;
        }
        Some(self.cell_to_pixel(column, row))
    }

    /// Terminal cell covering a problem pixel, clamped to the board.
    pub fn pixel_to_cell(&self, x: f64, y: f64) -> (u16, u16) {
        let c = (x / self.px_per_col).floor() as i64;
        let r = (y / (2.0 * self.px_per_col)).floor() as i64;
        (
            self.origin_col + c.clamp(0, self.cols as i64 - 1) as u16,
            self.origin_row + r.clamp(0, self.rows as i64 - 1) as u16,
        )
    }
}

pub fn draw(app: &App, f: &mut Frame) {
    f.render_widget(app, f.area());
}

impl Widget for &App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let session = &self.session;
        let areas = screen_areas(area);

        let bold = Style::default().add_modifier(Modifier::BOLD);
        let mut lines = vec![Line::styled(session.message().to_string(), bold)];
        if show_instruction(session) {
            lines.push(Line::styled(
                "Watch the boxes flash, then click them back in the same order.",
                Style::default().add_modifier(Modifier::ITALIC),
            ));
        }
        Paragraph::new(lines)
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true })
            .render(areas.message, buf);

        match session.state() {
            GameState::Unlocked => {
                Paragraph::new(Line::styled(
                    "Press Enter to start the scored test.",
                    Style::default()
                        .fg(Color::Green)
                        .add_modifier(Modifier::BOLD),
                ))
                .alignment(Alignment::Center)
                .render(areas.board, buf);
            }
            GameState::Completed | GameState::Finished => {}
            _ => {
                if let Some(problem) = session.problem() {
                    render_board(session, problem, areas.board, buf);
                }
            }
        }

        Paragraph::new(help_text(session))
            .alignment(Alignment::Center)
            .style(
                Style::default()
                    .fg(Color::Gray)
                    .add_modifier(Modifier::ITALIC),
            )
            .render(areas.help, buf);
    }
}

fn show_instruction(session: &Session) -> bool {
    session.mode() == Mode::Practice
        && matches!(session.state(), GameState::Loading | GameState::Starting)
}

fn help_text(session: &Session) -> String {
    let mut parts = vec![format!("mode: {}", session.mode())];
    match session.state() {
        GameState::Faulted => parts.push("(r) retry".to_string()),
        GameState::Unlocked => parts.push("(enter) start the scored test".to_string()),
        _ => {}
    }
    parts.push("(esc) quit".to_string());
    parts.join("  |  ")
}

fn render_board(session: &Session, problem: &ProblemData, area: Rect, buf: &mut Buffer) {
    let Some(t) = board_transform(problem, area) else {
        return;
    };
    let lit = session.lit_box();

    for row in t.origin_row..t.origin_row + t.rows {
        for col in t.origin_col..t.origin_col + t.cols {
            let (x, y) = t.cell_to_pixel(col, row);
            if let Some(id) = problem.hit_test(x, y) {
                let highlighted = lit == Some(id) || session.selection_index(id).is_some();
                let color = if highlighted {
                    BOX_COLOR_FLASH
                } else {
                    BOX_COLOR_DEFAULT
                };
                buf[(col, row)].set_char(' ').set_bg(color);
            }
        }
    }

    // 1-based click-order labels at the center of each selected box
    let label_style = Style::default()
        .fg(Color::White)
        .bg(BOX_COLOR_FLASH)
        .add_modifier(Modifier::BOLD);
    for (i, id) in session.user_sequence().iter().enumerate() {
        let Some(spec) = problem.find_box(*id) else {
            continue;
        };
        let (cx, cy) = spec.center();
        let (col, row) = t.pixel_to_cell(cx, cy);
        let label = (i + 1).to_string();
        let start = col.saturating_sub(label.len() as u16 / 2);
        for (j, ch) in label.chars().enumerate() {
            let c = start + j as u16;
            if c >= t.origin_col + t.cols {
                break;
            }
            buf[(c, row)].set_char(ch).set_style(label_style);
        }
    }
}
