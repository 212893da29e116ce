use chrono::Utc;
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
};

use crate::app::state::{AppMode, AppState, SelectedPoint};
use crate::render::surface::{self, PixelSurface};

pub fn render(frame: &mut Frame, state: &AppState) {
    let area = frame.area();

    if area.width < 40 || area.height < 12 {
        let warning = Paragraph::new("Terminal too small. Resize to at least 40x12.")
            .block(Block::default().borders(Borders::ALL).title("atmos-globe"));
        frame.render_widget(warning, area);
        return;
    }

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(1), Constraint::Length(1)])
        .split(area);

    // Bottom-up compositing order: color overlay, coastlines, particle
    // trails, then the night shade on top.
    let config = state.config.get();
    let mut layers: Vec<&PixelSurface> = Vec::with_capacity(4);
    if let Some(field) = state.field.value() {
        layers.push(field.overlay());
    }
    layers.push(&state.map_surface);
    if config.show_animation {
        layers.push(&state.particle_surface);
    }
    if config.show_night {
        layers.push(&state.night_surface);
    }
    surface::blit_layers(&layers, chunks[0], frame.buffer_mut());

    render_status(frame, chunks[1], state);

    if config.show_clock {
        render_clock(frame, chunks[0]);
    }
    if state.show_help {
        render_help(frame, centered_rect(60, 70, area));
    }
}

fn render_status(frame: &mut Frame, area: Rect, state: &AppState) {
    let line = if let Some(error) = &state.last_error {
        Line::from(Span::styled(
            format!(" error: {error}  (e clears, ? for help)"),
            Style::default()
                .fg(Color::LightRed)
                .add_modifier(Modifier::BOLD),
        ))
    } else if let Some(progress) = state.field_progress {
        Line::from(format!(" interpolating {:.0}%", f64::from(progress) * 100.0))
    } else if state.mode == AppMode::Loading {
        Line::from(" loading…")
    } else {
        let mut text = String::from(" ");
        if let Some(grids) = state.grids.value() {
            let grid = &grids.primary;
            text.push_str(&grid.description());
            text.push_str("  ");
            text.push_str(&grid.date().format("%Y-%m-%d %HZ").to_string());
            text.push_str("  ");
            text.push_str(grid.source());
            if let Some(selected) = &state.selected {
                text.push_str("  |  ");
                text.push_str(&format_selected(selected, grid.as_ref()));
            }
        }
        Line::from(text)
    };

    let status = Paragraph::new(line).style(Style::default().bg(Color::Rgb(24, 24, 30)));
    frame.render_widget(status, area);
}

fn render_clock(frame: &mut Frame, map_area: Rect) {
    let text = format!(" UTC {} ", Utc::now().format("%H:%M:%S"));
    let width = (text.chars().count() as u16).min(map_area.width);
    let badge_area = Rect {
        x: map_area.right().saturating_sub(width + 1),
        y: map_area.y,
        width,
        height: 1,
    };
    let badge = Paragraph::new(Line::from(text)).style(
        Style::default()
            .fg(Color::White)
            .bg(Color::Rgb(24, 24, 30))
            .add_modifier(Modifier::BOLD),
    );
    frame.render_widget(badge, badge_area);
}

fn render_help(frame: &mut Frame, area: Rect) {
    let lines: Vec<Line> = [
        "drag      rotate the globe",
        "scroll    zoom in / out",
        "click     sample the field at a point",
        "arrows    nudge orientation",
        "+ / -     zoom in / out",
        "n / p     next / previous forecast hour",
        "o         cycle color overlay",
        "j         cycle projection",
        "k         toggle day/night shading",
        "c         toggle UTC clock",
        "a         toggle particle animation",
        "r         cycle autorotation speed",
        "g         toggle graticule",
        "e         clear the error banner",
        "q / Esc   quit",
    ]
    .iter()
    .map(|text| Line::from(*text))
    .collect();

    frame.render_widget(Clear, area);
    let help = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" keys (? closes) "),
    );
    frame.render_widget(help, area);
}

fn format_selected(point: &SelectedPoint, grid: &dyn crate::domain::grid::Grid) -> String {
    let coord = format_coordinate(point.lon, point.lat);
    match point.sample {
        Some(sample) => {
            let value = grid
                .units()
                .first()
                .map_or_else(|| format!("{:.1}", sample.scalar()), |unit| unit.format(sample.scalar()));
            format!("{coord}  {value}")
        }
        None => format!("{coord}  no data"),
    }
}

fn format_coordinate(lon: f64, lat: f64) -> String {
    let ns = if lat >= 0.0 { 'N' } else { 'S' };
    let ew = if lon >= 0.0 { 'E' } else { 'W' };
    format!("{:.1}°{ns} {:.1}°{ew}", lat.abs(), lon.abs())
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
