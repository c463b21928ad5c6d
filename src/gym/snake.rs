use std::collections::VecDeque;

use rand::Rng;
use serde::{Deserialize, Serialize};
use strum::{EnumIter, FromRepr, VariantArray};

use crate::{
    env::{DiscreteActionSpace, Environment, Report},
    error::{Error, Result},
};

/// Screen coordinates of the top-left corner of a cell
pub type Pos = (i32, i32);

/// Absolute heading of the snake in screen coordinates (y grows downward)
#[derive(EnumIter, Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub enum Dir {
    Up = 0,
    Down = 1,
    Left = 2,
    Right = 3,
}

/// Heading after a turn, rows indexed by [`Dir`], columns by [`Turn`]
const ROTATION: [[Dir; 3]; 4] = [
    [Dir::Up, Dir::Left, Dir::Right],
    [Dir::Down, Dir::Right, Dir::Left],
    [Dir::Left, Dir::Down, Dir::Up],
    [Dir::Right, Dir::Up, Dir::Down],
];

impl Dir {
    /// Resolve a relative action into a new heading
    pub fn turn(self, turn: Turn) -> Dir {
        ROTATION[self as usize][turn as usize]
    }

    pub fn opposite(self) -> Dir {
        match self {
            Dir::Up => Dir::Down,
            Dir::Down => Dir::Up,
            Dir::Left => Dir::Right,
            Dir::Right => Dir::Left,
        }
    }

    /// The position one cell of size `step` away from `pos` in this direction
    pub fn advance(self, pos: Pos, step: i32) -> Pos {
        let (x, y) = pos;
        match self {
            Dir::Up => (x, y - step),
            Dir::Down => (x, y + step),
            Dir::Left => (x - step, y),
            Dir::Right => (x + step, y),
        }
    }

    /// Rotate a screen-space vector into the frame of a snake heading this way,
    /// so that "ahead" is always negative y
    fn to_heading_frame(self, (x, y): (i32, i32)) -> (i32, i32) {
        match self {
            Dir::Up => (x, y),
            Dir::Down => (-x, -y),
            Dir::Left => (-y, x),
            Dir::Right => (y, -x),
        }
    }
}

/// Action relative to the current heading
#[derive(
    EnumIter,
    VariantArray,
    FromRepr,
    Clone,
    Copy,
    Debug,
    Hash,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
)]
pub enum Turn {
    Straight = 0,
    Left = 1,
    Right = 2,
}

impl TryFrom<usize> for Turn {
    type Error = Error;

    fn try_from(index: usize) -> Result<Self> {
        Self::from_repr(index).ok_or_else(|| {
            Error::invalid(
                "action",
                format!("index {index} is outside 0..{}", Self::VARIANTS.len()),
            )
        })
    }
}

/// What occupies a cell
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Cell {
    Empty = 0,
    Food = 1,
    /// A wall or a body segment other than the head
    Blocked = 2,
}

impl Cell {
    /// Reward for moving the head onto a cell of this kind
    pub fn reward(self) -> f32 {
        match self {
            Cell::Empty => -1.0,
            Cell::Food => 50.0,
            Cell::Blocked => -30.0,
        }
    }
}

/// Sign of one food coordinate relative to the head
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Sign {
    Zero = 0,
    Negative = 1,
    Positive = 2,
}

impl Sign {
    fn of(n: i32) -> Self {
        match n.signum() {
            -1 => Sign::Negative,
            1 => Sign::Positive,
            _ => Sign::Zero,
        }
    }
}

/// Compact view of the game used as the Q-table key
///
/// Neighbor cells and the food vector are expressed relative to the snake's heading, which keeps
/// the state space to 3<sup>5</sup> = 243 values.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Observation {
    pub straight: Cell,
    pub left: Cell,
    pub right: Cell,
    /// Food to the left (`Negative`) or right (`Positive`) of the head
    pub food_x: Sign,
    /// Food ahead of (`Negative`) or behind (`Positive`) the head
    pub food_y: Sign,
}

impl Observation {
    /// The observation as its raw 5-tuple of codes
    pub fn codes(&self) -> [u8; 5] {
        [
            self.straight as u8,
            self.left as u8,
            self.right as u8,
            self.food_x as u8,
            self.food_y as u8,
        ]
    }
}

/// Geometry of the field in screen units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnakeConfig {
    pub width: i32,
    pub height: i32,
    /// Side length of one cell
    pub square_size: i32,
    /// Dead zone along every edge
    pub margin: i32,
}

impl Default for SnakeConfig {
    fn default() -> Self {
        Self {
            width: 440,
            height: 440,
            square_size: 20,
            margin: 20,
        }
    }
}

impl SnakeConfig {
    /// Largest playable x coordinate
    pub fn max_x(&self) -> i32 {
        self.width
            .saturating_sub(self.square_size)
            .saturating_sub(self.margin)
    }

    /// Largest playable y coordinate
    pub fn max_y(&self) -> i32 {
        self.height
            .saturating_sub(self.square_size)
            .saturating_sub(self.margin)
    }

    pub fn center(&self) -> Pos {
        (self.width / 2, self.height / 2)
    }

    pub fn contains(&self, (x, y): Pos) -> bool {
        x >= self.margin && x <= self.max_x() && y >= self.margin && y <= self.max_y()
    }

    /// Number of playable cells along each axis
    pub fn cells(&self) -> (usize, usize) {
        let span = |max: i32| ((max - self.margin) / self.square_size + 1) as usize;
        (span(self.max_x()), span(self.max_y()))
    }

    fn validate(&self) -> Result<()> {
        if self.width <= 0 || self.height <= 0 {
            return Err(Error::invalid("width/height", "must be positive"));
        }
        if self.square_size <= 0 {
            return Err(Error::invalid("square_size", "must be positive"));
        }
        if self.margin < 0 || self.margin % self.square_size != 0 {
            return Err(Error::invalid(
                "margin",
                format!("must be a non-negative multiple of {}", self.square_size),
            ));
        }
        // one cell plus the margin on both sides
        let min_side = self
            .margin
            .checked_mul(2)
            .and_then(|m| m.checked_add(self.square_size));
        if min_side.map_or(true, |min| self.width < min || self.height < min) {
            return Err(Error::invalid(
                "width/height",
                "field has no playable cell inside the margin",
            ));
        }
        let (cx, cy) = self.center();
        if cx % self.square_size != 0 || cy % self.square_size != 0 || !self.contains((cx, cy)) {
            return Err(Error::invalid(
                "width/height",
                "field center must be a playable cell",
            ));
        }
        Ok(())
    }
}

/// The game of snake on a fixed grid with a margin of walls
///
/// The snake starts as a single segment in the center heading up and steers with [`Turn`]s.
/// Eating food grows it by one segment; running into a wall or its own body ends the episode.
#[derive(Debug, Clone)]
pub struct SnakeEnv {
    config: SnakeConfig,
    body: VecDeque<Pos>,
    dir: Dir,
    food: Pos,
    score: u32,
    pub report: Report,
}

impl SnakeEnv {
    /// Create an environment with the given geometry
    ///
    /// Food is not placed until the first [`reset`](Environment::reset).
    pub fn new(config: SnakeConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            body: VecDeque::from([config.center()]),
            dir: Dir::Up,
            food: (config.margin, config.margin),
            score: 0,
            report: Report::new(vec!["score", "reward", "steps"]),
        })
    }

    pub fn config(&self) -> &SnakeConfig {
        &self.config
    }

    /// Body segments, head first
    pub fn body(&self) -> &VecDeque<Pos> {
        &self.body
    }

    pub fn head(&self) -> Pos {
        *self.body.front().expect("body is not empty")
    }

    pub fn food(&self) -> Pos {
        self.food
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn direction(&self) -> Dir {
        self.dir
    }

    fn cell_count(&self) -> usize {
        let (w, h) = self.config.cells();
        w * h
    }

    /// Classify a cell against the current food and every body segment except the head
    fn classify(&self, pos: Pos) -> Cell {
        if pos == self.food {
            Cell::Food
        } else if !self.config.contains(pos) || self.body.iter().skip(1).any(|&s| s == pos) {
            Cell::Blocked
        } else {
            Cell::Empty
        }
    }

    /// Place food on a random free cell by rejection sampling
    ///
    /// **Returns** `false` without moving the food if the body covers the whole field
    fn spawn_food<R: Rng + ?Sized>(&mut self, rng: &mut R) -> bool {
        if self.body.len() >= self.cell_count() {
            return false;
        }

        let SnakeConfig {
            square_size,
            margin,
            ..
        } = self.config;
        loop {
            let x = rng.gen_range(margin..=self.config.max_x()) / square_size * square_size;
            let y = rng.gen_range(margin..=self.config.max_y()) / square_size * square_size;
            if !self.body.contains(&(x, y)) {
                self.food = (x, y);
                return true;
            }
        }
    }

    /// Encode the current state as an [`Observation`]
    pub fn observation(&self) -> Observation {
        let head = self.head();
        let [straight, left, right] = [Turn::Straight, Turn::Left, Turn::Right]
            .map(|t| self.classify(self.dir.turn(t).advance(head, self.config.square_size)));

        let (fx, fy) = self
            .dir
            .to_heading_frame((self.food.0 - head.0, self.food.1 - head.1));

        Observation {
            straight,
            left,
            right,
            food_x: Sign::of(fx),
            food_y: Sign::of(fy),
        }
    }
}

impl DiscreteActionSpace for SnakeEnv {
    fn actions(&self) -> Vec<Self::Action> {
        Turn::VARIANTS.to_vec()
    }
}

impl Environment for SnakeEnv {
    type State = Observation;
    type Action = Turn;

    fn is_active(&self) -> bool {
        let head = self.head();
        self.config.contains(head)
            && !self.body.iter().skip(1).any(|&s| s == head)
            && self.body.len() < self.cell_count()
    }

    fn reset<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Self::State {
        self.score = 0;
        self.body.clear();
        self.body.push_back(self.config.center());
        self.dir = Dir::Up;
        self.spawn_food(rng);
        self.observation()
    }

    fn step<R: Rng + ?Sized>(
        &mut self,
        action: Self::Action,
        rng: &mut R,
    ) -> (Self::State, f32, bool) {
        self.dir = self.dir.turn(action);
        let head = self.dir.advance(self.head(), self.config.square_size);
        self.body.push_front(head);

        let cell = self.classify(head);
        let done = match cell {
            Cell::Food => {
                self.score += 1;
                self.report.add("score", 1.0);
                // a full field has nowhere left to put food
                !self.spawn_food(rng)
            }
            Cell::Blocked => true,
            Cell::Empty => {
                self.body.pop_back();
                false
            }
        };

        let reward = cell.reward();
        self.report.add("steps", 1.0);
        self.report.add("reward", reward.into());
        log::trace!("{action:?} -> {head:?} {cell:?} (reward {reward}, done {done})");

        (self.observation(), reward, done)
    }
}
