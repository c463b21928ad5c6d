use crossterm::event::{Event, KeyCode};
use ratatui::{prelude::*, style::Stylize, widgets::*};

use crate::viz::util::event_keycode;

use super::Component;

/// One metric plotted against the episode number
struct Plot {
    title: &'static str,
    x_bounds: [f64; 2],
    y_bounds: [f64; 2],
    data: Vec<(f64, f64)>,
}

impl Plot {
    fn new(title: &'static str, episodes: u32) -> Self {
        Self {
            title,
            x_bounds: [0.0, episodes.max(1).into()],
            y_bounds: [0.0, 0.0],
            data: Vec::new(),
        }
    }

    fn update(&mut self, point: (f64, f64)) {
        if self.data.is_empty() {
            self.y_bounds = [point.1, point.1];
        }
        self.x_bounds[1] = self.x_bounds[1].max(point.0);
        self.y_bounds[0] = self.y_bounds[0].min(point.1);
        self.y_bounds[1] = self.y_bounds[1].max(point.1);
        self.data.push(point);
    }
}

fn labels(bounds: [f64; 2]) -> Vec<Span<'static>> {
    bounds.iter().map(|x| format!("{x:.1}").bold()).collect()
}

impl Widget for &Plot {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let dataset = Dataset::default()
            .marker(Marker::Braille)
            .graph_type(GraphType::Scatter)
            .cyan()
            .data(&self.data);

        let x_axis = Axis::default()
            .title("episode")
            .dark_gray()
            .labels(labels(self.x_bounds))
            .bounds(self.x_bounds);

        let y_axis = Axis::default()
            .title(self.title)
            .dark_gray()
            .labels(labels(self.y_bounds))
            .bounds(self.y_bounds);

        Chart::new(vec![dataset])
            .x_axis(x_axis)
            .y_axis(y_axis)
            .render(area, buf);
    }
}

/// Tabbed per-episode metric plots, switched with the left and right arrow keys
pub struct Plots {
    names: Vec<&'static str>,
    plots: Vec<Plot>,
    selected: usize,
}

impl Plots {
    pub fn new(names: Vec<&'static str>, episodes: u32) -> Self {
        let plots = names.iter().map(|&k| Plot::new(k, episodes)).collect();
        Self {
            names,
            plots,
            selected: 0,
        }
    }

    /// Add the metrics of one episode, in the order of the plot names
    pub fn update(&mut self, episode: u32, data: &[f64]) {
        for (plot, &metric) in self.plots.iter_mut().zip(data) {
            plot.update((episode.into(), metric));
        }
    }
}

impl WidgetRef for Plots {
    fn render_ref(&self, area: Rect, buf: &mut Buffer) {
        let block = Block::bordered()
            .border_type(BorderType::Rounded)
            .title("Plots");
        let inner = block.inner(area);
        block.render(area, buf);

        let vert = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(1), Constraint::Fill(1)])
            .split(inner);

        Tabs::new(self.names.iter().copied())
            .white()
            .highlight_style(Style::default().light_green())
            .select(self.selected)
            .render(vert[0], buf);

        if let Some(plot) = self.plots.get(self.selected) {
            plot.render(vert[1], buf);
        }
    }
}

impl Component for Plots {
    fn handle_ui_event(&mut self, event: &Event) -> bool {
        let len = self.plots.len();
        if len == 0 {
            return false;
        }

        match event_keycode(event) {
            Some(KeyCode::Right) => self.selected = (self.selected + 1) % len,
            Some(KeyCode::Left) => self.selected = (self.selected + len - 1) % len,
            _ => return false,
        }
        true
    }
}
