use std::collections::VecDeque;

use rand::{rngs::StdRng, seq::SliceRandom};
use strum::{EnumIter, FromRepr, VariantArray};

/// An integer cell coordinate on the field
///
/// Signed so that a head one step past the edge is representable while the
/// collision check runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// The adjacent cell one step in `dir`
    pub fn step(self, dir: Direction) -> Self {
        let (dx, dy) = dir.delta();
        Self::new(self.x + dx, self.y + dy)
    }

    /// Manhattan distance to another cell
    pub fn manhattan(self, other: Self) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }
}

/// The four compass moves, in the fixed UP/RIGHT/DOWN/LEFT action order
#[derive(EnumIter, FromRepr, VariantArray, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    Up = 0,
    Right = 1,
    Down = 2,
    Left = 3,
}

impl Direction {
    /// Unit vector of this direction, y growing downward
    pub const fn delta(self) -> (i32, i32) {
        match self {
            Self::Up => (0, -1),
            Self::Right => (1, 0),
            Self::Down => (0, 1),
            Self::Left => (-1, 0),
        }
    }

    /// Whether `other` is the exact 180 degree reverse of this direction
    pub fn is_reverse_of(self, other: Self) -> bool {
        (self as i8 - other as i8).abs() == 2
    }

    /// The direction 90 degrees clockwise
    pub const fn right(self) -> Self {
        match self {
            Self::Up => Self::Right,
            Self::Right => Self::Down,
            Self::Down => Self::Left,
            Self::Left => Self::Up,
        }
    }

    /// The direction 90 degrees counterclockwise
    pub const fn left(self) -> Self {
        match self {
            Self::Up => Self::Left,
            Self::Right => Self::Up,
            Self::Down => Self::Right,
            Self::Left => Self::Down,
        }
    }
}

/// The snake body, head-first
#[derive(Clone, Debug)]
pub struct Snake {
    body: VecDeque<Position>,
    dir: Direction,
}

impl Snake {
    fn new(start: Position, dir: Direction) -> Self {
        Self {
            body: VecDeque::from([start]),
            dir,
        }
    }

    pub fn head(&self) -> Position {
        *self.body.front().expect("body is never empty")
    }

    pub fn len(&self) -> usize {
        self.body.len()
    }

    pub fn dir(&self) -> Direction {
        self.dir
    }

    pub fn segments(&self) -> impl Iterator<Item = Position> + '_ {
        self.body.iter().copied()
    }

    /// Whether any segment occupies `pos`
    pub fn occupies(&self, pos: Position) -> bool {
        self.body.contains(&pos)
    }

    /// Whether any segment other than the head occupies `pos`
    ///
    /// Skips the head's own slot (index 0) rather than filtering by value,
    /// so a length-1 snake never shadows its own cell.
    pub fn body_occupies(&self, pos: Position) -> bool {
        self.body.iter().skip(1).any(|&s| s == pos)
    }

    /// Apply a turn, keeping the current direction on a 180 degree reversal
    fn turn(&mut self, dir: Direction) -> Direction {
        if !self.dir.is_reverse_of(dir) {
            self.dir = dir;
        }
        self.dir
    }
}

/// Why an episode ended
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EndCause {
    /// The head left the field
    Wall,
    /// The head ran into the body
    SelfHit,
    /// No vacant cell left for food; a forced win
    BoardFull,
}

/// Result of advancing the world by one tick
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StepOutcome {
    pub ate_food: bool,
    pub end: Option<EndCause>,
    pub score: u32,
}

impl StepOutcome {
    pub fn alive(&self) -> bool {
        self.end.is_none()
    }
}

/// One episode of snake: the body, the food, and the movement rules
///
/// Owns its own seeded RNG so food placement is reproducible.
pub struct GridWorld {
    size: i32,
    snake: Snake,
    food: Position,
    score: u32,
    alive: bool,
    rng: StdRng,
}

impl GridWorld {
    /// Create a world of `size` x `size` cells, already reset
    pub fn new(size: u32, mut rng: StdRng) -> Self {
        let size = size as i32;
        let center = Position::new(size / 2, size / 2);
        let snake = Snake::new(center, Direction::Right);
        let food = place_food(size, &snake, &mut rng).expect("grid holds more than one cell");
        Self {
            size,
            snake,
            food,
            score: 0,
            alive: true,
            rng,
        }
    }

    /// Start a fresh episode: snake back at the centre, direction Right,
    /// score zero, food replaced
    pub fn reset(&mut self) {
        let center = Position::new(self.size / 2, self.size / 2);
        self.snake = Snake::new(center, Direction::Right);
        self.food =
            place_food(self.size, &self.snake, &mut self.rng).expect("grid holds more than one cell");
        self.score = 0;
        self.alive = true;
    }

    pub fn size(&self) -> u32 {
        self.size as u32
    }

    pub fn snake(&self) -> &Snake {
        &self.snake
    }

    pub fn food(&self) -> Position {
        self.food
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    pub fn dir(&self) -> Direction {
        self.snake.dir
    }

    fn in_bounds(&self, pos: Position) -> bool {
        pos.x >= 0 && pos.y >= 0 && pos.x < self.size && pos.y < self.size
    }

    /// Advance one tick in `dir`
    ///
    /// A reversal keeps the previous direction. A wall or self collision ends
    /// the episode with the snake untouched. Eating grows the snake by one
    /// and respawns the food; otherwise the tail is dropped.
    pub fn step(&mut self, dir: Direction) -> StepOutcome {
        if !self.alive {
            return StepOutcome {
                ate_food: false,
                end: None,
                score: self.score,
            };
        }

        let dir = self.snake.turn(dir);
        let new_head = self.snake.head().step(dir);

        if !self.in_bounds(new_head) {
            return self.finish(EndCause::Wall);
        }
        // The cell the tail is about to vacate still counts as occupied.
        if self.snake.occupies(new_head) {
            return self.finish(EndCause::SelfHit);
        }

        self.snake.body.push_front(new_head);
        let ate_food = new_head == self.food;
        let mut end = None;

        if ate_food {
            self.score += 1;
            match place_food(self.size, &self.snake, &mut self.rng) {
                Some(food) => self.food = food,
                None => {
                    self.alive = false;
                    end = Some(EndCause::BoardFull);
                }
            }
        } else {
            self.snake.body.pop_back();
        }

        StepOutcome {
            ate_food,
            end,
            score: self.score,
        }
    }

    fn finish(&mut self, cause: EndCause) -> StepOutcome {
        self.alive = false;
        StepOutcome {
            ate_food: false,
            end: Some(cause),
            score: self.score,
        }
    }
}

/// Pick a food cell uniformly among cells the snake does not occupy
///
/// Returns `None` when the board is full, which callers must treat as a
/// terminal condition.
fn place_food(size: i32, snake: &Snake, rng: &mut StdRng) -> Option<Position> {
    let mut vacant = Vec::with_capacity((size * size) as usize - snake.len());
    for y in 0..size {
        for x in 0..size {
            let pos = Position::new(x, y);
            if !snake.occupies(pos) {
                vacant.push(pos);
            }
        }
    }

    vacant.choose(rng).copied()
}
