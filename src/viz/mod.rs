use std::{
    io,
    sync::mpsc::{self, Receiver, Sender, TryRecvError},
    thread::{self, JoinHandle},
    time::Duration,
};

use crossterm::event;
use ratatui::{prelude::*, widgets::*};

use self::components::{Board, Component, Logs, Plots};

mod components;
mod tui;
mod util;

pub use components::board::Snapshot;

/// Messages sent from the training loop to the dashboard
pub enum Update {
    /// Metrics of a finished episode, in the order of the keys passed to [`init`]
    Episode { episode: u32, data: Vec<f64> },
    /// The field after a step, only sent while rendering is enabled
    Board(Snapshot),
}

#[derive(Default, PartialEq)]
enum State {
    #[default]
    Train,
    Done,
    Quit,
}

/// The root TUI component which holds the dashboard state and runs the render loop
pub struct App {
    state: State,
    episode: u32,
    total_episodes: u32,
    plots: Plots,
    board: Option<Board>,
    logs: Logs,
}

impl App {
    pub fn new(keys: &[&'static str], episodes: u32) -> Self {
        Self {
            state: State::default(),
            episode: 0,
            total_episodes: episodes,
            plots: Plots::new(keys.to_vec(), episodes),
            board: None,
            logs: Logs::new(log::LevelFilter::Info),
        }
    }

    fn apply(&mut self, update: Update) {
        match update {
            Update::Episode { episode, data } => {
                self.episode = episode + 1;
                self.plots.update(episode, &data);
            }
            Update::Board(snapshot) => self.board = Some(Board::new(snapshot)),
        }
    }

    /// Initialize the terminal and run the main loop until the user quits
    ///
    /// Restores the terminal on exit. A disconnected channel means training is over; the dashboard
    /// stays up so the final plots can be inspected.
    pub fn run(&mut self, rx: Receiver<Update>) -> io::Result<()> {
        let mut terminal = tui::Tui::init()?;

        while self.state != State::Quit {
            while self.state == State::Train {
                match rx.try_recv() {
                    Ok(update) => self.apply(update),
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        log::info!("training finished, press q to quit");
                        self.state = State::Done;
                    }
                }
            }

            terminal.draw(|frame| frame.render_widget(&*self, frame.size()))?;

            if event::poll(Duration::from_millis(16))? {
                let event = event::read()?;
                match util::event_keycode(&event) {
                    Some(event::KeyCode::Char('q')) => self.state = State::Quit,
                    _ => {
                        let _ = self.plots.handle_ui_event(&event)
                            || self.logs.handle_ui_event(&event);
                    }
                }
            }
        }

        Ok(())
    }
}

impl Widget for &App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let vert = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Fill(1), Constraint::Length(3)])
            .split(area);

        let charts = match &self.board {
            Some(board) => {
                let horz = Layout::default()
                    .direction(Direction::Horizontal)
                    .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
                    .split(vert[0]);
                board.render(horz[0], buf);
                horz[1]
            }
            None => vert[0],
        };

        let right = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
            .split(charts);
        self.plots.render_ref(right[0], buf);
        self.logs.render_ref(right[1], buf);

        let label = match self.state {
            State::Train => format!("{}/{}", self.episode, self.total_episodes),
            _ => format!("{}/{} done, q to quit", self.episode, self.total_episodes),
        };
        Gauge::default()
            .block(
                Block::bordered()
                    .border_type(BorderType::Rounded)
                    .title("Progress"),
            )
            .gauge_style(Color::Cyan)
            .ratio((self.episode as f64 / self.total_episodes.max(1) as f64).min(1.0))
            .label(label)
            .render(vert[1], buf);
    }
}

/// Spawn the dashboard on its own thread
///
/// **Returns** the thread handle and the sender to stream [`Update`]s through. Sending fails once
/// the user has quit the dashboard.
pub fn init(keys: &[&'static str], episodes: u32) -> (JoinHandle<io::Result<()>>, Sender<Update>) {
    let mut app = App::new(keys, episodes);
    let (tx, rx) = mpsc::channel();
    let handle = thread::spawn(move || app.run(rx));
    (handle, tx)
}
