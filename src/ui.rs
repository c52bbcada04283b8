use chrono::{Local, TimeZone};
use itertools::Itertools;
use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Axis, Chart, Dataset as ChartDataset, GraphType, Paragraph, Widget, Wrap},
};
use unicode_width::UnicodeWidthStr;

use crate::dataset::{Bound, Dataset};
use crate::stats::{CompletedStat, Metrics};
use crate::typewriter::Word;
use crate::{App, AppState};

const HORIZONTAL_MARGIN: u16 = 5;
const VERTICAL_MARGIN: u16 = 2;

impl Widget for &App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        match self.state {
            AppState::Typing => render_typing(self, area, buf),
            AppState::Results => render_results(self, area, buf),
            AppState::History => render_history(self, area, buf),
        }
    }
}

fn bold() -> Style {
    Style::default().add_modifier(Modifier::BOLD)
}

fn dim_bold() -> Style {
    bold().add_modifier(Modifier::DIM)
}

fn legend_style() -> Style {
    Style::default().add_modifier(Modifier::ITALIC)
}

/// One span per prompt character, styled by what the user has done with it:
/// typed-correct, typed-wrong (flagged offset), the cursor, or not yet
/// reached.
fn prompt_spans(words: &[Word], word_index: usize, char_index: usize) -> Vec<Span<'static>> {
    let green_bold = bold().fg(Color::Green);
    let red_bold = bold().fg(Color::Red);
    let cursor_style = dim_bold().add_modifier(Modifier::UNDERLINED);

    let mut spans = Vec::new();

    for (i, word) in words.iter().enumerate() {
        for (j, c) in word.text.chars().enumerate() {
            let typed = i < word_index || (i == word_index && j < char_index);
            let at_cursor = i == word_index && j == char_index;

            let span = if typed {
                if word.typos.contains(&j) {
                    // make a mistyped space visible
                    let shown = if c == ' ' { "·".to_owned() } else { c.to_string() };
                    Span::styled(shown, red_bold)
                } else {
                    Span::styled(c.to_string(), green_bold)
                }
            } else if at_cursor {
                Span::styled(c.to_string(), cursor_style)
            } else {
                Span::styled(c.to_string(), dim_bold())
            };

            spans.push(span);
        }
    }

    spans
}

fn render_typing(app: &App, area: Rect, buf: &mut Buffer) {
    let words = app.typewriter.words();
    let full_text: String = words.iter().map(|w| w.text.as_str()).collect();

    let max_chars_per_line = area.width.saturating_sub(HORIZONTAL_MARGIN * 2).max(1);
    let prompt_occupied_lines = if full_text.width() <= max_chars_per_line as usize {
        1
    } else {
        ((full_text.width() as f64 / max_chars_per_line as f64).ceil() + 1.0) as u16
    };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .constraints([
            Constraint::Length(
                ((area.height as f64 - prompt_occupied_lines as f64) / 2.0) as u16,
            ),
            Constraint::Length(prompt_occupied_lines),
            Constraint::Length(1),
            Constraint::Min(1),
        ])
        .split(area);

    let spans = prompt_spans(&words, app.typewriter.word_index(), app.typewriter.char_index());

    let prompt = Paragraph::new(Line::from(spans))
        .alignment(if prompt_occupied_lines == 1 {
            Alignment::Center
        } else {
            Alignment::Left
        })
        .wrap(Wrap { trim: false });

    prompt.render(chunks[1], buf);

    // everything consumed but a flawed word remains, or the commit is pending
    if app.typewriter.word_index() == words.len() {
        let hint = Paragraph::new(Span::styled("enter to finish", legend_style()))
            .alignment(Alignment::Center);
        hint.render(chunks[2], buf);
    }
}

fn fmt_wpm(wpm: Option<u32>) -> String {
    wpm.map_or_else(|| "--".to_owned(), |v| v.to_string())
}

fn fmt_pct(value: Option<f64>) -> String {
    value.map_or_else(|| "--".to_owned(), |v| format!("{:.1}%", v * 100.0))
}

fn fmt_secs(value: Option<f64>) -> String {
    value.map_or_else(|| "--".to_owned(), |v| format!("{v:.2}s"))
}

fn fmt_rhythm(value: Option<f64>) -> String {
    value.map_or_else(|| "--".to_owned(), |v| format!("{v:.1}"))
}

/// The five characters the user hesitates on the most.
fn slowest_chars(metrics: &Metrics) -> String {
    metrics
        .avg_char_delay
        .iter()
        .sorted_by(|a, b| b.1.partial_cmp(a.1).unwrap_or(std::cmp::Ordering::Equal))
        .take(5)
        .map(|(c, avg)| {
            let shown = if *c == ' ' { '␣' } else { *c };
            format!("{shown} {avg:.2}s")
        })
        .join("  ")
}

/// WPM of every stored session, oldest first, normalized for charting.
fn wpm_series(history: &[CompletedStat]) -> Dataset {
    let values: Vec<f64> = history
        .iter()
        .filter_map(|stat| stat.metrics().wpm)
        .map(f64::from)
        .collect();

    Dataset::new(values, Bound::Fixed(0.0), Bound::Auto)
}

fn render_wpm_chart(history: &[CompletedStat], title: &str, area: Rect, buf: &mut Buffer) {
    let series = wpm_series(history);

    if series.points.len() < 2 {
        let placeholder = Paragraph::new(Span::styled(
            "not enough sessions for a trend yet",
            dim_bold(),
        ))
        .alignment(Alignment::Center);
        placeholder.render(area, buf);
        return;
    }

    let tuples: Vec<(f64, f64)> = series.points.iter().map(|p| (p.x, p.y)).collect();

    let datasets = vec![ChartDataset::default()
        .marker(ratatui::symbols::Marker::Braille)
        .style(Style::default().fg(Color::Magenta))
        .graph_type(GraphType::Line)
        .data(&tuples)];

    let chart = Chart::new(datasets)
        .x_axis(
            Axis::default()
                .title(Span::styled(title.to_owned(), legend_style()))
                .bounds([0.0, 1.0]),
        )
        .y_axis(
            Axis::default()
                .bounds([0.0, 1.0])
                .labels(vec![
                    Span::raw(format!("{:.0}", series.y_min)),
                    Span::raw(format!("{:.0}", series.y_max)),
                ]),
        );

    chart.render(area, buf);
}

fn render_results(app: &App, area: Rect, buf: &mut Buffer) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints([
            Constraint::Min(1),    // wpm trend
            Constraint::Length(1), // headline numbers
            Constraint::Length(1), // rhythm numbers
            Constraint::Length(1), // slowest characters
            Constraint::Length(1), // padding
            Constraint::Length(1), // legend
        ])
        .split(area);

    render_wpm_chart(&app.history, "wpm per session", chunks[0], buf);

    if let Some(metrics) = &app.metrics {
        let headline = Paragraph::new(Span::styled(
            format!(
                "{} wpm   keystrokes {}   words {}",
                fmt_wpm(metrics.wpm),
                fmt_pct(metrics.keystroke_accuracy),
                fmt_pct(metrics.word_accuracy),
            ),
            bold(),
        ))
        .alignment(Alignment::Center);
        headline.render(chunks[1], buf);

        let rhythm = Paragraph::new(Span::styled(
            format!(
                "word delay {}   word rhythm {}   keystroke rhythm {}",
                fmt_secs(metrics.avg_word_delay),
                fmt_rhythm(metrics.word_rhythm),
                fmt_rhythm(metrics.keystroke_rhythm),
            ),
            dim_bold(),
        ))
        .alignment(Alignment::Center);
        rhythm.render(chunks[2], buf);

        let slow = slowest_chars(metrics);
        if !slow.is_empty() {
            let slowest = Paragraph::new(Span::styled(format!("slowest: {slow}"), dim_bold()))
                .alignment(Alignment::Center);
            slowest.render(chunks[3], buf);
        }
    }

    let legend = Paragraph::new(Span::styled(
        "(r)etry  (h)istory  (esc)ape",
        legend_style(),
    ))
    .alignment(Alignment::Center);
    legend.render(chunks[5], buf);
}

fn render_history(app: &App, area: Rect, buf: &mut Buffer) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints([
            Constraint::Min(1),    // trend over all sessions
            Constraint::Length(8), // recent sessions
            Constraint::Length(1), // padding
            Constraint::Length(1), // legend
        ])
        .split(area);

    render_wpm_chart(&app.history, "wpm across history", chunks[0], buf);

    let recent: Vec<Line> = app
        .history
        .iter()
        .rev()
        .take(chunks[1].height as usize)
        .map(session_line)
        .collect();

    Paragraph::new(recent)
        .alignment(Alignment::Center)
        .render(chunks[1], buf);

    let legend = Paragraph::new(Span::styled("(b)ack  (esc)ape", legend_style()))
        .alignment(Alignment::Center);
    legend.render(chunks[3], buf);
}

fn session_line(stat: &CompletedStat) -> Line<'static> {
    let metrics = stat.metrics();

    let when = Local
        .timestamp_millis_opt(stat.timestamp_ms)
        .single()
        .map_or_else(|| "----".to_owned(), |dt| dt.format("%Y-%m-%d %H:%M").to_string());

    Line::from(Span::styled(
        format!(
            "{when}   {} wpm   {}",
            fmt_wpm(metrics.wpm),
            fmt_pct(metrics.keystroke_accuracy),
        ),
        dim_bold(),
    ))
}
