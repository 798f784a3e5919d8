//! UI rendering and layout utilities

use crate::constants::ui;
use crate::detector::{BlowBands, BlowStrength};
use crate::slideshow::Slideshow;
use crate::state::{AppState, CandleView, Screen};
use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, Paragraph, Wrap},
};
use std::time::Instant;

/// Rows a candle occupies: flame, two body rows, key label
const CANDLE_ROWS: u16 = 4;

/// Create a gradient bar showing blow intensity
pub fn create_gradient_bar(width: usize, ratio: f64, bands: &BlowBands) -> Line<'static> {
    let filled = (ratio * width as f64) as usize;
    let partial_fill = (ratio * width as f64) - filled as f64;
    let mut spans = Vec::new();

    for i in 0..width {
        let ch = if i < filled {
            '█'
        } else if i == filled && partial_fill > 0.0 {
            match (partial_fill * 8.0) as usize {
                0 | 1 => '░',
                2 | 3 => '▒',
                4 | 5 => '▓',
                _ => '█',
            }
        } else {
            '░'
        };
        spans.push(Span::styled(ch.to_string(), Style::default().fg(zone_color(i, width, bands))));
    }

    Line::from(spans)
}

/// Marker strip under the meter: where the gate and the bands start
pub fn create_band_labels(width: usize, bands: &BlowBands) -> Line<'static> {
    let marks = [
        (bands.gate, "gate"),
        (bands.medium, "medium"),
        (bands.strong, "strong"),
    ];
    let mut cells: Vec<(String, Color)> = (0..width).map(|i| (" ".to_string(), zone_color(i, width, bands))).collect();

    if width == 0 {
        return Line::default();
    }

    let positions: Vec<usize> = marks
        .iter()
        .map(|(value, _)| (value.clamp(0.0, 1.0) as f64 * (width - 1) as f64).round() as usize)
        .collect();
    for &pos in &positions {
        cells[pos] = ("▲".to_string(), Color::White);
    }

    // labels never overwrite a marker or another label
    for (&pos, (_, label)) in positions.iter().zip(marks) {
        for (offset, ch) in label.chars().enumerate() {
            let i = pos + 1 + offset;
            if i >= width || cells[i].0 != " " {
                break;
            }
            cells[i].0 = ch.to_string();
        }
    }

    Line::from(
        cells
            .into_iter()
            .map(|(text, color)| Span::styled(text, Style::default().fg(color)))
            .collect::<Vec<_>>(),
    )
}

/// Green for flicker territory, yellow for one candle, red for two
fn zone_color(i: usize, width: usize, bands: &BlowBands) -> Color {
    let ratio = if width == 0 { 0.0 } else { i as f32 / width as f32 };
    if ratio < bands.medium {
        Color::Green
    } else if ratio < bands.strong {
        Color::Yellow
    } else {
        Color::Red
    }
}

/// Width of the cake top: room for every candle plus half a candle each side
fn cake_span(count: usize) -> u16 {
    ui::CANDLE_WIDTH.saturating_mul(count as u16 + 1)
}

/// First column of the cake top, centred in `area`
fn cake_left(area: Rect, count: usize) -> u16 {
    area.x + area.width.saturating_sub(cake_span(count)) / 2
}

/// First column of a candle whose position is `x` percent across the cake
fn candle_left(area: Rect, count: usize, x: f32) -> u16 {
    let span = cake_span(count);
    let center = cake_left(area, count) + (span as f32 * x.clamp(0.0, 100.0) / 100.0).round() as u16;
    center.saturating_sub(ui::CANDLE_WIDTH / 2)
}

/// Which candle (zero-based) sits under a mouse position
pub fn candle_at(area: Rect, candles: &[CandleView], column: u16, row: u16) -> Option<usize> {
    if row < area.y || row >= area.y + CANDLE_ROWS.min(area.height) {
        return None;
    }
    candles.iter().position(|candle| {
        let left = candle_left(area, candles.len(), candle.x);
        column >= left && column < left + ui::CANDLE_WIDTH
    })
}

fn candle_cells(candle: &CandleView, index: usize, now: Instant) -> [Span<'static>; CANDLE_ROWS as usize] {
    let width = ui::CANDLE_WIDTH as usize;
    let cell = |text: &str, style: Style| Span::styled(format!("{:^width$}", text), style);

    let flicker = candle.flicker_level(now);
    let flame = if !candle.lit {
        cell("~", Style::default().fg(Color::DarkGray))
    } else if flicker > 0.0 {
        let color = if flicker > 0.5 { Color::Red } else { Color::LightRed };
        cell("*", Style::default().fg(color).add_modifier(Modifier::BOLD))
    } else {
        cell("^", Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
    };

    let body_color = if candle.lit { Color::White } else { Color::Gray };
    let key = ((index + 1) % 10).to_string();

    [
        flame,
        cell("█", Style::default().fg(body_color)),
        cell("█", Style::default().fg(body_color)),
        cell(&key, Style::default().fg(Color::DarkGray)),
    ]
}

/// Draw the candles and the cake under them; returns the clickable area
fn render_cake(f: &mut Frame, area: Rect, state: &AppState, now: Instant) -> Rect {
    let block = Block::default().title("Cake").borders(Borders::ALL);
    let inner = block.inner(area);
    f.render_widget(block, area);

    let count = state.candles.len();
    let mut rows: Vec<Vec<Span>> = (0..CANDLE_ROWS).map(|_| Vec::new()).collect();
    let mut cursor = inner.x;
    for (index, candle) in state.candles.iter().enumerate() {
        // never draw over the previous candle on a narrow terminal
        let left = candle_left(inner, count, candle.x).max(cursor);
        let pad = " ".repeat((left - cursor) as usize);
        for (row, span) in candle_cells(candle, index, now).into_iter().enumerate() {
            rows[row].push(Span::raw(pad.clone()));
            rows[row].push(span);
        }
        cursor = left + ui::CANDLE_WIDTH;
    }

    let cake_width = cake_span(count) as usize;
    let mut lines: Vec<Line> = rows.into_iter().map(Line::from).collect();
    let frosting = Style::default().fg(Color::Magenta);
    let sponge = Style::default().fg(Color::LightYellow);
    let base_pad = " ".repeat((cake_left(inner, count) - inner.x) as usize);
    lines.push(Line::from(vec![Span::raw(base_pad.clone()), Span::styled("▄".repeat(cake_width), frosting)]));
    lines.push(Line::from(vec![Span::raw(base_pad.clone()), Span::styled("█".repeat(cake_width), sponge)]));
    lines.push(Line::from(vec![Span::raw(base_pad), Span::styled("▀".repeat(cake_width), sponge)]));

    f.render_widget(Paragraph::new(lines), inner);
    inner
}

fn render_meter(f: &mut Frame, area: Rect, state: &AppState) {
    let bar_width = (area.width as usize).saturating_sub(ui::BAR_BORDER_WIDTH);
    let ratio = state.meter.display().clamp(0.0, 1.0) as f64;
    let bar_line = create_gradient_bar(bar_width, ratio, &state.bands);
    let label_line = create_band_labels(bar_width, &state.bands);

    let title = if state.fallback_mode {
        "Blow meter (microphone off)".to_string()
    } else {
        let last = match state.last_blow {
            Some(BlowStrength::Strong) => "strong",
            Some(BlowStrength::Medium) => "medium",
            Some(BlowStrength::Light) => "light",
            None => "none yet",
        };
        format!(
            "Blow meter: {:.2} (threshold {:.0}, last blow {})",
            state.meter.display(),
            state.threshold,
            last
        )
    };
    let gauge = Paragraph::new(vec![bar_line, label_line])
        .block(Block::default().title(title).borders(Borders::ALL));
    f.render_widget(gauge, area);
}

fn render_progress(f: &mut Frame, area: Rect, state: &AppState) {
    let gauge = Gauge::default()
        .block(
            Block::default()
                .title(format!("Progress: {} of {} out", state.total - state.lit, state.total))
                .borders(Borders::ALL),
        )
        .gauge_style(Style::default().fg(Color::Magenta))
        .percent(state.progress_percent.round().clamp(0.0, 100.0) as u16)
        .label(state.status.clone());
    f.render_widget(gauge, area);
}

fn render_celebration(f: &mut Frame, area: Rect, since: Instant, now: Instant) {
    const CONFETTI: [char; 6] = ['*', '+', 'o', '.', '~', '\''];
    const COLORS: [Color; 5] = [Color::Red, Color::Yellow, Color::Green, Color::Cyan, Color::Magenta];

    let shift = (now.duration_since(since).as_millis() / 120) as usize;
    let width = area.width.saturating_sub(2) as usize;
    let confetti = |row: usize| {
        Line::from(
            (0..width)
                .map(|i| {
                    let seed = (i * 7 + row * 13 + shift) % 23;
                    if seed < CONFETTI.len() {
                        Span::styled(CONFETTI[seed].to_string(), Style::default().fg(COLORS[(i + row) % COLORS.len()]))
                    } else {
                        Span::raw(" ")
                    }
                })
                .collect::<Vec<_>>(),
        )
    };

    let mut lines = vec![confetti(0), confetti(1), Line::from("")];
    lines.push(Line::from(Span::styled(
        "All candles are out! Your wishes are coming true...",
        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
    )));
    lines.push(Line::from(""));
    lines.push(confetti(2));
    lines.push(confetti(3));

    let paragraph = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .block(Block::default().title("Celebration").borders(Borders::ALL));
    f.render_widget(paragraph, area);
}

fn render_wishes(f: &mut Frame, area: Rect, show: &Slideshow) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(5), Constraint::Length(1)])
        .split(area);

    let title = Paragraph::new("Your Wishes Are Coming True!")
        .alignment(Alignment::Center)
        .style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
        .block(Block::default().borders(Borders::ALL));
    f.render_widget(title, chunks[0]);

    let wish = show.current();
    let mut lines = Vec::new();
    if let Some(header) = &wish.header_image {
        lines.push(Line::from(Span::styled(format!("[header: {}]", header), Style::default().fg(Color::DarkGray))));
        lines.push(Line::from(""));
    }
    lines.push(Line::from(wish.text.clone()));
    if let Some(image) = &wish.image {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(format!("[image: {}]", image), Style::default().fg(Color::DarkGray))));
    }

    let slide = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .block(Block::default().title(format!("Wish {}", show.indicator())).borders(Borders::ALL));
    f.render_widget(slide, chunks[1]);

    let help = if show.len() > 1 {
        "←/→ navigate · Home/End jump · r restart · Esc quit"
    } else {
        "r restart · Esc quit"
    };
    let help = Paragraph::new(help).alignment(Alignment::Center);
    f.render_widget(help, chunks[2]);
}

/// Render the complete UI; returns the area candles can be clicked in
pub fn render_ui(f: &mut Frame, state: &AppState, now: Instant) -> Rect {
    let size = f.size();

    if let Screen::Wishes(show) = &state.screen {
        render_wishes(f, size, show);
        return Rect::default();
    }

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(CANDLE_ROWS + 5),
            Constraint::Length(3),
            Constraint::Length(4),
            Constraint::Length(1),
        ])
        .split(size);

    let heading = match &state.device_name {
        Some(device) => format!("{} (listening on {})", state.instructions, device),
        None => state.instructions.clone(),
    };
    let instructions = Paragraph::new(heading).block(Block::default().title("Make a Wish").borders(Borders::ALL));
    f.render_widget(instructions, chunks[0]);

    let cake_area = match &state.screen {
        Screen::Celebrating { since } => {
            render_celebration(f, chunks[1], *since, now);
            Rect::default()
        }
        _ => render_cake(f, chunks[1], state, now),
    };

    render_progress(f, chunks[2], state);
    render_meter(f, chunks[3], state);

    let help = if state.fallback_mode {
        "1-9,0 or click: tap a candle · r restart · Esc quit"
    } else {
        "1-9,0 or click: tap a candle · +/- threshold · r restart · Esc quit"
    };
    f.render_widget(Paragraph::new(help), chunks[4]);

    cake_area
}
