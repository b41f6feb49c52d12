use std::collections::BTreeMap;
use std::io;
use std::time::Duration;

use crossterm::ExecutableCommand;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use miette::IntoDiagnostic;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::canvas::{Canvas, Line as CanvasLine, Map, MapResolution, Points};
use ratatui::widgets::{
    Bar, BarChart, BarGroup, Block, Borders, List, ListItem, ListState, Paragraph, Row, Table,
    Wrap,
};

use crate::aggregate::{CountEntry, Group, YearlyStack};
use crate::dashboard::{Dashboard, MapLayer, Panel, TableRow};
use crate::domain::{Period, Rgba};
use crate::palette::{FALLBACK, group_color};
use crate::session::{Action, Session};

const KEYS: &str = "↑/↓ move  space toggle  a all  x none  [ ] start  { } end  r reset  d data  q quit";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum View {
    Charts,
    Data,
}

/// Interactive dashboard over one session. Every key that changes state goes
/// through `Session::apply`, and the frame model is rebuilt afterwards.
pub struct Tui {
    session: Session,
    dashboard: Dashboard,
    cursor: usize,
    view: View,
    table_scroll: usize,
    status: String,
}

impl Tui {
    pub fn new(session: Session) -> Self {
        let dashboard = session.dashboard();
        Self {
            session,
            dashboard,
            cursor: 0,
            view: View::Charts,
            table_scroll: 0,
            status: "ready".to_string(),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn dashboard(&self) -> &Dashboard {
        &self.dashboard
    }

    pub fn run(&mut self) -> miette::Result<()> {
        let mut stdout = io::stdout();
        enable_raw_mode().into_diagnostic()?;
        stdout.execute(EnterAlternateScreen).into_diagnostic()?;

        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend).into_diagnostic()?;
        terminal.clear().into_diagnostic()?;

        let result = self.event_loop(&mut terminal);

        disable_raw_mode().into_diagnostic()?;
        io::stdout()
            .execute(LeaveAlternateScreen)
            .into_diagnostic()?;
        result
    }

    fn event_loop(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    ) -> miette::Result<()> {
        loop {
            terminal
                .draw(|frame| draw_ui(frame, self))
                .into_diagnostic()?;

            if event::poll(Duration::from_millis(200)).into_diagnostic()? {
                if let Event::Key(key) = event::read().into_diagnostic()? {
                    if self.handle_key(key) {
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Returns `true` when the user asked to quit.
    fn handle_key(&mut self, key: KeyEvent) -> bool {
        if key.kind != KeyEventKind::Press {
            return false;
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return true,
            KeyCode::Up | KeyCode::Char('k') => self.move_cursor(-1),
            KeyCode::Down | KeyCode::Char('j') => self.move_cursor(1),
            KeyCode::Char(' ') | KeyCode::Enter => {
                if let Some(name) = self.cursor_species() {
                    self.dispatch(Action::Toggle(name));
                }
            }
            KeyCode::Char('a') => self.dispatch(Action::SelectAll),
            KeyCode::Char('x') => self.dispatch(Action::DeselectAll),
            KeyCode::Char('[') => self.shift_range(-1, 0),
            KeyCode::Char(']') => self.shift_range(1, 0),
            KeyCode::Char('{') => self.shift_range(0, -1),
            KeyCode::Char('}') => self.shift_range(0, 1),
            KeyCode::Char('r') => self.dispatch(Action::ResetRange),
            KeyCode::Char('d') => {
                self.view = match self.view {
                    View::Charts => View::Data,
                    View::Data => View::Charts,
                };
                self.table_scroll = 0;
            }
            KeyCode::PageDown => {
                let rows = self.dashboard.table.ready().map(Vec::len).unwrap_or(0);
                self.table_scroll = (self.table_scroll + 10).min(rows.saturating_sub(1));
            }
            KeyCode::PageUp => self.table_scroll = self.table_scroll.saturating_sub(10),
            _ => {}
        }
        false
    }

    fn dispatch(&mut self, action: Action) {
        let label = format!("{action:?}");
        match self.session.apply(action) {
            Ok(()) => {
                self.dashboard = self.session.dashboard();
                self.table_scroll = 0;
                self.status = format!(
                    "{} observations, {} species selected",
                    self.dashboard.total, self.dashboard.selected_species
                );
            }
            Err(err) => {
                tracing::warn!(action = %label, error = %err, "action rejected");
                self.status = err.to_string();
            }
        }
    }

    fn move_cursor(&mut self, delta: isize) {
        let len = self.session.registry().len();
        if len == 0 {
            return;
        }
        self.cursor = self.cursor.saturating_add_signed(delta).min(len - 1);
    }

    fn cursor_species(&self) -> Option<String> {
        self.session
            .registry()
            .entries()
            .get(self.cursor)
            .map(|entry| entry.name.clone())
    }

    /// Moves the range bounds by whole months. Moves that would cross the
    /// bounds over each other are rejected by the session.
    fn shift_range(&mut self, start_delta: i32, end_delta: i32) {
        let Some(range) = self.session.date_range() else {
            return;
        };
        let step = |period: Period, delta: i32| match delta.signum() {
            1 => period.next(),
            -1 => period.prev(),
            _ => period,
        };
        self.dispatch(Action::SetRange {
            start: step(range.start(), start_delta),
            end: step(range.end(), end_delta),
        });
    }
}

fn rgb(color: Rgba) -> Color {
    Color::Rgb(color.r(), color.g(), color.b())
}

fn stack_color(group: &Group, rank: usize) -> Color {
    match group {
        Group::Category(_) => rgb(group_color(rank)),
        Group::Other => rgb(FALLBACK),
    }
}

fn titled(title: impl Into<String>) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .title(Span::styled(
            title.into(),
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ))
}

fn no_data(title: &str, message: &str) -> Paragraph<'static> {
    Paragraph::new(Line::from(Span::styled(
        message.to_string(),
        Style::default().fg(Color::Yellow),
    )))
    .alignment(Alignment::Center)
    .wrap(Wrap { trim: true })
    .block(titled(title.to_string()))
}

fn draw_ui(frame: &mut ratatui::Frame, tui: &Tui) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(10),
            Constraint::Length(2),
        ])
        .split(frame.area());

    frame.render_widget(draw_header(&tui.dashboard), chunks[0]);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(28), Constraint::Percentage(72)])
        .split(chunks[1]);

    draw_sidebar(frame, tui, body[0]);
    match tui.view {
        View::Charts => draw_charts(frame, &tui.dashboard, body[1]),
        View::Data => draw_table(frame, &tui.dashboard, tui.table_scroll, body[1]),
    }

    frame.render_widget(draw_footer(&tui.status), chunks[2]);
}

fn draw_header(dashboard: &Dashboard) -> Paragraph<'static> {
    let months = dashboard
        .date_range
        .map(|range| range.to_string())
        .unwrap_or_else(|| "-".to_string());
    let header_line = Line::from(vec![
        Span::styled(
            "KIRA-SG",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(" "),
        Span::styled(env!("CARGO_PKG_VERSION"), Style::default().fg(Color::Gray)),
        Span::raw(format!(
            "   Observations: {}   Species: {}/{}   Months: ",
            dashboard.total, dashboard.selected_species, dashboard.species_total
        )),
        Span::styled(months, Style::default().fg(Color::Cyan)),
    ]);
    let warning_line = match dashboard.warnings.first() {
        Some(warning) => Line::from(Span::styled(
            format!("warning: {warning}"),
            Style::default().fg(Color::Yellow),
        )),
        None => Line::from(""),
    };
    Paragraph::new(vec![header_line, warning_line])
        .alignment(Alignment::Left)
        .block(Block::default().borders(Borders::BOTTOM))
}

fn draw_footer(status: &str) -> Paragraph<'static> {
    Paragraph::new(vec![
        Line::from(Span::styled(status.to_string(), Style::default().fg(Color::Green))),
        Line::from(Span::styled(KEYS, Style::default().fg(Color::Gray))),
    ])
}

fn draw_sidebar(frame: &mut ratatui::Frame, tui: &Tui, area: Rect) {
    let parts = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(5), Constraint::Length(5)])
        .split(area);

    let selection = tui.session.selection();
    let items = tui
        .session
        .registry()
        .entries()
        .iter()
        .map(|entry| {
            let mark = if selection.is_selected(&entry.name) {
                "[x] "
            } else {
                "[ ] "
            };
            ListItem::new(Line::from(vec![
                Span::raw(mark),
                Span::styled("■ ", Style::default().fg(rgb(entry.color))),
                Span::raw(entry.label()),
            ]))
        })
        .collect::<Vec<_>>();

    let mut state = ListState::default();
    if !items.is_empty() {
        state.select(Some(tui.cursor.min(items.len() - 1)));
    }
    let list = List::new(items)
        .block(titled(format!(
            "Species {}/{}",
            selection.selected_count(),
            tui.session.registry().len()
        )))
        .highlight_style(
            Style::default()
                .bg(Color::DarkGray)
                .add_modifier(Modifier::BOLD),
        );
    frame.render_stateful_widget(list, parts[0], &mut state);

    let range_lines = match (tui.session.date_range(), tui.session.bounds()) {
        (Some(range), Some(bounds)) => vec![
            Line::from(vec![
                Span::raw("From "),
                Span::styled(range.start().to_string(), Style::default().fg(Color::Cyan)),
                Span::raw("  to "),
                Span::styled(range.end().to_string(), Style::default().fg(Color::Cyan)),
            ]),
            Line::from(Span::styled(
                format!("Data covers {bounds} ({} months)", bounds.months()),
                Style::default().fg(Color::Gray),
            )),
        ],
        _ => vec![Line::from("No dated observations")],
    };
    frame.render_widget(
        Paragraph::new(range_lines)
            .wrap(Wrap { trim: true })
            .block(titled("Months")),
        parts[1],
    );
}

fn draw_charts(frame: &mut ratatui::Frame, dashboard: &Dashboard, area: Rect) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(area);
    let charts = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(32),
            Constraint::Percentage(32),
            Constraint::Percentage(36),
        ])
        .split(rows[1]);

    match &dashboard.map {
        Panel::Ready(layer) => draw_map(frame, layer, rows[0]),
        Panel::NoData(message) => frame.render_widget(no_data("Map", message), rows[0]),
    }
    draw_counts(frame, "Top species", &dashboard.top_species, charts[0]);
    draw_counts(frame, "Top regions", &dashboard.top_regions, charts[1]);
    match &dashboard.yearly {
        Panel::Ready(stack) => draw_yearly(frame, stack, charts[2]),
        Panel::NoData(message) => {
            frame.render_widget(no_data("Observations per year", message), charts[2])
        }
    }
}

fn draw_map(frame: &mut ratatui::Frame, layer: &MapLayer, area: Rect) {
    let mut by_color = BTreeMap::<[u8; 4], Vec<(f64, f64)>>::new();
    for point in &layer.points {
        by_color
            .entry(point.color.0)
            .or_default()
            .push((point.longitude, point.latitude));
    }

    let view = layer.view;
    let canvas = Canvas::default()
        .block(titled(format!(
            "Map  {} points  center {:.3}, {:.3}  zoom {}",
            layer.points.len(),
            view.latitude,
            view.longitude,
            view.zoom
        )))
        .x_bounds(view.x_bounds())
        .y_bounds(view.y_bounds())
        .paint(move |ctx| {
            ctx.draw(&Map {
                color: Color::DarkGray,
                resolution: MapResolution::High,
            });
            ctx.layer();
            for (color, coords) in &by_color {
                ctx.draw(&Points {
                    coords,
                    color: rgb(Rgba(*color)),
                });
            }
        });
    frame.render_widget(canvas, area);
}

fn draw_counts(
    frame: &mut ratatui::Frame,
    title: &str,
    panel: &Panel<Vec<CountEntry>>,
    area: Rect,
) {
    let entries = match panel {
        Panel::Ready(entries) => entries,
        Panel::NoData(message) => {
            frame.render_widget(no_data(title, message), area);
            return;
        }
    };

    let bars = entries
        .iter()
        .map(|entry| {
            Bar::default()
                .value(entry.count as u64)
                .label(Line::from(entry.key.clone()))
                .text_value(entry.count.to_string())
                .style(Style::default().fg(Color::Cyan))
        })
        .collect::<Vec<_>>();
    let chart = BarChart::default()
        .block(titled(title.to_string()))
        .direction(Direction::Horizontal)
        .bar_width(1)
        .bar_gap(0)
        .data(BarGroup::default().bars(&bars));
    frame.render_widget(chart, area);
}

fn draw_yearly(frame: &mut ratatui::Frame, stack: &YearlyStack, area: Rect) {
    let parts = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(4), Constraint::Length(3)])
        .split(area);

    let years = stack.years();
    let groups = stack.groups();
    let first = years.first().copied().unwrap_or_default() as f64;
    let last = years.last().copied().unwrap_or_default() as f64;
    let top = stack.max_year_total().max(1) as f64;

    let canvas = Canvas::default()
        .block(titled(format!("Observations per year  {:.0}-{:.0}", first, last)))
        .x_bounds([first - 0.5, last + 0.5])
        .y_bounds([0.0, top])
        .paint(|ctx| {
            for &year in years {
                let Some(row) = stack.year_row(year) else {
                    continue;
                };
                let x = year as f64;
                let mut base = 0.0;
                for (rank, &count) in row.iter().enumerate() {
                    if count == 0 {
                        continue;
                    }
                    let height = count as f64;
                    let color = stack_color(&groups[rank], rank);
                    for step in 0..7 {
                        let dx = -0.3 + step as f64 * 0.1;
                        ctx.draw(&CanvasLine {
                            x1: x + dx,
                            y1: base,
                            x2: x + dx,
                            y2: base + height,
                            color,
                        });
                    }
                    base += height;
                }
            }
        });
    frame.render_widget(canvas, parts[0]);

    let legend = stack
        .groups()
        .iter()
        .enumerate()
        .flat_map(|(rank, group)| {
            [
                Span::styled("■ ", Style::default().fg(stack_color(group, rank))),
                Span::raw(format!("{}  ", group.label())),
            ]
        })
        .collect::<Vec<_>>();
    frame.render_widget(
        Paragraph::new(Line::from(legend)).wrap(Wrap { trim: true }),
        parts[1],
    );
}

fn draw_table(frame: &mut ratatui::Frame, dashboard: &Dashboard, scroll: usize, area: Rect) {
    let rows: &[TableRow] = match &dashboard.table {
        Panel::Ready(rows) => rows,
        Panel::NoData(message) => {
            frame.render_widget(no_data("Raw data", message), area);
            return;
        }
    };

    let body = rows
        .iter()
        .skip(scroll)
        .map(|row| {
            Row::new(vec![
                row.species.clone(),
                row.event_date.format("%Y-%m-%d %H:%M").to_string(),
                format!("{:.5}", row.latitude),
                format!("{:.5}", row.longitude),
            ])
        })
        .collect::<Vec<_>>();
    let table = Table::new(
        body,
        [
            Constraint::Percentage(40),
            Constraint::Percentage(24),
            Constraint::Percentage(18),
            Constraint::Percentage(18),
        ],
    )
    .header(
        Row::new(vec!["species", "eventDate", "latitude", "longitude"])
            .style(Style::default().add_modifier(Modifier::BOLD)),
    )
    .block(titled(format!(
        "Raw data  rows {}-{} of {}",
        (scroll + 1).min(rows.len()),
        rows.len(),
        rows.len()
    )));
    frame.render_widget(table, area);
}
