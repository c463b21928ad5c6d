pub mod board;
pub mod log;
pub mod plot;

use crossterm::event::Event;
use ratatui::widgets::WidgetRef;

pub use board::Board;
pub use log::Logs;
pub use plot::Plots;

/// A widget that can react to terminal input
pub trait Component: WidgetRef {
    /// **Returns** whether the event was consumed
    fn handle_ui_event(&mut self, event: &Event) -> bool;
}
