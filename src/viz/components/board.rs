use ratatui::{prelude::*, widgets::*};

use crate::gym::{
    snake::{Pos, SnakeConfig},
    SnakeEnv,
};

/// Everything needed to draw the field after one step
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// Body segments, head first
    pub body: Vec<Pos>,
    pub food: Pos,
    pub score: u32,
    pub config: SnakeConfig,
}

impl From<&SnakeEnv> for Snapshot {
    fn from(env: &SnakeEnv) -> Self {
        Self {
            body: env.body().iter().copied().collect(),
            food: env.food(),
            score: env.score(),
            config: *env.config(),
        }
    }
}

impl Snapshot {
    /// Grid column and row of a position, `None` if it lies in the margin or beyond
    fn cell(&self, (x, y): Pos) -> Option<(u16, u16)> {
        let SnakeConfig {
            square_size,
            margin,
            ..
        } = self.config;
        if !self.config.contains((x, y)) {
            return None;
        }
        let col = (x - margin) / square_size;
        let row = (y - margin) / square_size;
        Some((col.try_into().ok()?, row.try_into().ok()?))
    }
}

/// Renders the field, each cell two terminal columns wide
pub struct Board {
    snapshot: Snapshot,
}

impl Board {
    pub fn new(snapshot: Snapshot) -> Self {
        Self { snapshot }
    }

    fn paint(&self, area: Rect, buf: &mut Buffer, pos: Pos, style: Style) {
        let Some((col, row)) = self.snapshot.cell(pos) else {
            return;
        };
        let x = area.x.saturating_add(col.saturating_mul(2));
        let y = area.y.saturating_add(row);
        if x.saturating_add(1) < area.right() && y < area.bottom() {
            buf.set_string(x, y, "██", style);
        }
    }
}

impl Widget for &Board {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::bordered()
            .border_type(BorderType::Plain)
            .title(format!("SCORE: {}", self.snapshot.score))
            .title_alignment(Alignment::Center);
        let field = block.inner(area);
        block.render(area, buf);

        for &segment in self.snapshot.body.iter().skip(1) {
            self.paint(field, buf, segment, Style::default().green());
        }
        self.paint(field, buf, self.snapshot.food, Style::default().red());
        if let Some(&head) = self.snapshot.body.first() {
            self.paint(field, buf, head, Style::default().light_green());
        }
    }
}
