//! Loading-screen viewer
//!
//! Draws the generator grid after every script step, with an optional
//! heat overlay of the last hallway distance field.

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::Span,
    widgets::{Block, Borders, Gauge, Paragraph},
    Frame,
};

use crate::world::generation::Generator;
use crate::world::{BasicType, CellFlags, DistanceField, GeneratorCell, Point};

/// What the viewer shows for the current step
pub struct StepView<'a> {
    pub generator: &'a Generator,
    pub status: &'a str,
    pub step: usize,
    pub total: usize,
    pub finished: bool,
}

/// Terminal viewer state
#[derive(Debug, Default)]
pub struct Viewer {
    show_distance: bool,
}

impl Viewer {
    pub fn new(show_distance: bool) -> Self {
        Self { show_distance }
    }

    pub fn toggle_distance(&mut self) {
        self.show_distance = !self.show_distance;
    }

    pub fn render(&self, frame: &mut Frame, view: &StepView<'_>) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(3), Constraint::Length(3), Constraint::Length(1)])
            .split(frame.area());

        self.render_grid(frame, view.generator, chunks[0]);
        render_progress(frame, view, chunks[1]);

        let help = if view.finished {
            "q: quit  d: toggle distance overlay"
        } else {
            "q: abandon run"
        };
        frame.render_widget(
            Paragraph::new(help).style(Style::default().fg(Color::DarkGray)),
            chunks[2],
        );
    }

    fn render_grid(&self, frame: &mut Frame, generator: &Generator, area: Rect) {
        let cells = generator.cells();
        let title = format!(
            " {}x{} - {} prefabs ",
            cells.width(),
            cells.height(),
            generator.instances().count()
        );
        let block = Block::default()
            .borders(Borders::ALL)
            .title(title)
            .border_style(Style::default().fg(Color::Rgb(120, 110, 90)));
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let overlay = if self.show_distance {
            generator.debug_distance_field()
        } else {
            None
        };

        let view_width = (inner.width as i32).min(cells.width());
        let view_height = (inner.height as i32).min(cells.height());
        let buf = frame.buffer_mut();
        for y in 0..view_height {
            for x in 0..view_width {
                let point = Point::new(x, y);
                let Some(cell) = cells.get(point) else {
                    continue;
                };
                let mut style = cell_style(cell);
                if let Some(heat) = overlay.and_then(|field| heat_color(field, point)) {
                    style = style.bg(heat);
                }
                let glyph = cell.glyph();
                buf[(inner.x + x as u16, inner.y + y as u16)]
                    .set_char(glyph)
                    .set_style(style);
            }
        }
    }
}

fn render_progress(frame: &mut Frame, view: &StepView<'_>, area: Rect) {
    let ratio = if view.total == 0 {
        1.0
    } else {
        (view.step as f64 / view.total as f64).clamp(0.0, 1.0)
    };
    let label = Span::styled(
        view.status.to_string(),
        Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
    );
    let gauge = Gauge::default()
        .block(Block::default().borders(Borders::ALL).title(" Generating "))
        .gauge_style(Style::default().fg(Color::Rgb(150, 40, 40)))
        .ratio(ratio)
        .label(label);
    frame.render_widget(gauge, area);
}

fn cell_style(cell: &GeneratorCell) -> Style {
    let fg = if cell.is_port_used() {
        Color::Yellow
    } else if cell.is_port_unused() {
        Color::Rgb(90, 90, 140)
    } else if cell.poi.is_some() {
        Color::Green
    } else {
        match cell.basic_type {
            BasicType::Empty => Color::Reset,
            BasicType::Wall => Color::Rgb(140, 140, 140),
            BasicType::Floor if cell.flags.contains(CellFlags::LATE_STAGE_HALLWAY) => {
                Color::Rgb(200, 120, 60)
            }
            BasicType::Floor => Color::Rgb(100, 100, 100),
        }
    };
    let mut style = Style::default().fg(fg);
    if cell.flags.contains(CellFlags::DEBUG_POINT) {
        style = style.add_modifier(Modifier::BOLD);
    }
    style
}

/// Near cells glow red, far ones fade to blue
fn heat_color(field: &DistanceField, point: Point) -> Option<Color> {
    let value = field.normalized_value(point)?;
    let red = (value * 160.0) as u8;
    let blue = ((1.0 - value) * 160.0) as u8;
    Some(Color::Rgb(red, 20, blue))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::PoiDefinition;

    #[test]
    fn test_door_colors() {
        let mut door = GeneratorCell::new(BasicType::Wall);
        door.flags.insert(CellFlags::PORT_USED);
        assert_eq!(cell_style(&door).fg, Some(Color::Yellow));

        let mut poi = GeneratorCell::new(BasicType::Floor);
        poi.poi = Some(PoiDefinition::hall());
        assert_eq!(cell_style(&poi).fg, Some(Color::Green));
    }

    #[test]
    fn test_heat_needs_reached_cells() {
        let mut field = DistanceField::new(3, 1);
        field.populate(&[Point::ZERO], |_| true);
        assert_eq!(heat_color(&field, Point::ZERO), Some(Color::Rgb(160, 20, 0)));
        assert!(heat_color(&field, Point::new(5, 0)).is_none());
    }
}
