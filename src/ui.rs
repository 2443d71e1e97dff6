pub mod charting;

use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Axis, Chart, Dataset, GraphType, Paragraph, Widget},
    Frame,
};

use crate::app::{App, AppState, Outcome};
use crate::metrics;
use crate::session::Clock;

const HORIZONTAL_MARGIN: u16 = 5;
const VERTICAL_MARGIN: u16 = 2;

fn bold() -> Style {
    Style::default().add_modifier(Modifier::BOLD)
}

fn dim_bold() -> Style {
    bold().add_modifier(Modifier::DIM)
}

/// How a typed character that does not match is drawn
fn mistake_glyph(c: char) -> String {
    match c {
        ' ' => "·".to_string(),
        '\n' => "⏎".to_string(),
        '\t' => "→".to_string(),
        c => c.to_string(),
    }
}

fn expand(c: char, tab_width: usize) -> String {
    match c {
        '\t' => " ".repeat(tab_width),
        c => c.to_string(),
    }
}

/// The exercise as styled lines: typed chars green/red, cursor underlined, rest dim.
pub fn prompt_lines(target: &[char], typed: &[char], tab_width: usize) -> Vec<Line<'static>> {
    let correct = bold().fg(Color::Green);
    let wrong = bold().fg(Color::Red);
    let cursor = dim_bold().add_modifier(Modifier::UNDERLINED);
    let pending = dim_bold();

    let mut lines = Vec::new();
    let mut spans: Vec<Span<'static>> = Vec::new();

    for (idx, &expected) in target.iter().enumerate() {
        let span = match typed.get(idx) {
            Some(&got) if got == expected => {
                (expected != '\n').then(|| Span::styled(expand(expected, tab_width), correct))
            }
            Some(&got) => Some(Span::styled(mistake_glyph(got), wrong)),
            None if idx == typed.len() => Some(Span::styled(
                if expected == '\n' {
                    "⏎".to_string()
                } else {
                    expand(expected, tab_width)
                },
                cursor,
            )),
            None => (expected != '\n').then(|| Span::styled(expand(expected, tab_width), pending)),
        };
        spans.extend(span);

        if expected == '\n' {
            lines.push(Line::from(std::mem::take(&mut spans)));
        }
    }
    if !spans.is_empty() {
        lines.push(Line::from(spans));
    }
    lines
}

impl<C: Clock + Clone> Widget for &App<C> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        match (self.state, &self.outcome) {
            (AppState::Results, Some(outcome)) => render_results(self, outcome, area, buf),
            _ => render_typing(self, area, buf),
        }
    }
}

fn render_typing<C: Clock + Clone>(app: &App<C>, area: Rect, buf: &mut Buffer) {
    let session = &app.session;
    let lines = prompt_lines(
        session.target_chars(),
        session.typed_chars(),
        app.config.tab_width,
    );

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(1)
        .constraints([Constraint::Length(1), Constraint::Length(1), Constraint::Min(1)])
        .split(area);

    let elapsed = session.elapsed().num_milliseconds() as f64 / 1000.0;
    let header = Paragraph::new(Line::from(vec![
        Span::styled(session.exercise().name().to_string(), bold()),
        Span::styled(format!("  [{}]", app.lang), dim_bold()),
        Span::styled(format!("  {elapsed:.1}s"), dim_bold()),
    ]));
    header.render(chunks[0], buf);

    // Keep the cursor line in view on long exercises
    let cursor_line = session.target_chars()[..session.cursor()]
        .iter()
        .filter(|&&c| c == '\n')
        .count();
    let visible = chunks[2].height as usize;
    let scroll = cursor_line.saturating_sub(visible / 2);

    Paragraph::new(lines)
        .alignment(Alignment::Left)
        .scroll((scroll.min(u16::MAX as usize) as u16, 0))
        .render(chunks[2], buf);
}

fn render_results<C: Clock + Clone>(app: &App<C>, outcome: &Outcome, area: Rect, buf: &mut Buffer) {
    let m = &outcome.metrics;
    let magenta = Style::default().fg(Color::Magenta);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints([
            Constraint::Min(1),    // chart
            Constraint::Length(1), // speed
            Constraint::Length(1), // mistakes
            Constraint::Length(1), // missed keys
            Constraint::Length(1), // history
            Constraint::Length(1), // padding
            Constraint::Length(1), // legend
        ])
        .split(area);

    let (overall_duration, highest_wpm) = charting::compute_chart_params(&m.series);
    let tuples: Vec<(f64, f64)> = m.series.iter().map(|p| (*p).into()).collect();
    let datasets = vec![Dataset::default()
        .marker(ratatui::symbols::Marker::Braille)
        .style(magenta)
        .graph_type(GraphType::Line)
        .data(&tuples)];

    Chart::new(datasets)
        .x_axis(
            Axis::default()
                .title("seconds")
                .bounds([0.0, overall_duration])
                .labels(vec![
                    Span::styled("0", bold()),
                    Span::styled(charting::format_label(overall_duration), bold()),
                ]),
        )
        .y_axis(
            Axis::default()
                .title("wpm")
                .bounds([0.0, highest_wpm])
                .labels(vec![
                    Span::styled("0", bold()),
                    Span::styled(charting::format_label(highest_wpm), bold()),
                ]),
        )
        .render(chunks[0], buf);

    let duration = metrics::format_duration(m.duration);
    let centered = |text: String, style: Style, area: Rect, buf: &mut Buffer| {
        Paragraph::new(Span::styled(text, style))
            .alignment(Alignment::Center)
            .render(area, buf);
    };

    centered(
        format!(
            "{:.1} wpm   {:.1} raw   {:.2}% acc   {}   {:.2} sd",
            m.wpm, m.raw_wpm, m.accuracy, duration, m.consistency
        ),
        bold(),
        chunks[1],
        buf,
    );
    centered(
        format!(
            "{} mistakes   {} left uncorrected",
            m.mistakes, m.uncorrected_errors
        ),
        bold(),
        chunks[2],
        buf,
    );
    if !m.most_missed.is_empty() {
        centered(
            format!("most missed: {}", m.most_missed),
            Style::default().fg(Color::Red),
            chunks[3],
            buf,
        );
    }

    let history = match (outcome.best_wpm, outcome.saved) {
        (Some(best), true) => format!("saved · best {best:.1} wpm on this exercise"),
        (Some(best), false) => format!("not saved · best {best:.1} wpm on this exercise"),
        (None, true) => "saved".to_string(),
        (None, false) => "not saved".to_string(),
    };
    centered(
        history,
        Style::default().fg(Color::Cyan).add_modifier(Modifier::ITALIC),
        chunks[4],
        buf,
    );

    let legend = if app.source_can_change() {
        "(r)etry / (n)ew / (q)uit"
    } else {
        "(r)etry / (q)uit"
    };
    centered(
        legend.to_string(),
        Style::default().add_modifier(Modifier::ITALIC),
        chunks[6],
        buf,
    );
}

pub fn draw<C: Clock + Clone>(app: &App<C>, f: &mut Frame) {
    f.render_widget(app, f.area());
}
