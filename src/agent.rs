use std::{cmp::Ordering, collections::HashMap};

use log::trace;
use rand::{rngs::StdRng, seq::SliceRandom, Rng};
use strum::VariantArray;

use crate::{
    assert_interval,
    exploration::{Choice, EpsilonGreedy},
    world::{Direction, Position, Snake},
};

/// Discount factor for future value in the TD target
const DISCOUNT: f32 = 0.95;
/// Rewards at or above this magnitude count as progress for stall tracking
pub const LARGE_REWARD: f32 = 10.0;
/// Ceiling for the noise seeded into fresh Q entries
const INIT_NOISE: f32 = 0.1;
/// Warm-start bias added to actions pointing at the food
const FOOD_BIAS: f32 = 0.05;
/// Shaping increment for closing on or retreating from the food
const SHAPING: f32 = 0.2;

/// Coarse Manhattan distance to the food
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DistBucket {
    Near,
    Mid,
    Far,
}

impl DistBucket {
    fn from_manhattan(d: u32) -> Self {
        match d {
            0..=4 => Self::Near,
            5..=10 => Self::Mid,
            _ => Self::Far,
        }
    }
}

/// Normalized observation of the world, used directly as the Q-table key
///
/// A pure function of (snake, food): equal inputs always produce an equal
/// key. The food cues are per-axis orderings of the food coordinate against
/// the head (`Greater` on x means the food lies to the right), and the
/// danger flags are relative to the direction of travel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct StateKey {
    dir: Direction,
    food_x: Ordering,
    food_y: Ordering,
    dist: DistBucket,
    danger_ahead: bool,
    danger_right: bool,
    danger_left: bool,
}

impl StateKey {
    pub fn encode(snake: &Snake, food: Position, grid_size: u32) -> Self {
        let head = snake.head();
        let dir = snake.dir();

        let danger = |d: Direction| {
            let cell = head.step(d);
            let off_field = cell.x < 0
                || cell.y < 0
                || cell.x >= grid_size as i32
                || cell.y >= grid_size as i32;
            // The head's own slot is excluded from the body check.
            off_field || snake.body_occupies(cell)
        };

        Self {
            dir,
            food_x: food.x.cmp(&head.x),
            food_y: food.y.cmp(&head.y),
            dist: DistBucket::from_manhattan(head.manhattan(food)),
            danger_ahead: danger(dir),
            danger_right: danger(dir.right()),
            danger_left: danger(dir.left()),
        }
    }
}

/// A tabular Q-learning controller for the snake
///
/// Owns its Q-table, exploration schedule, and a seeded RNG, so a trace of
/// `act`/`reward`/`learn` calls over identical inputs is fully reproducible.
pub struct Agent {
    grid_size: u32,
    q_table: HashMap<StateKey, [f32; 4]>,
    alpha: f32,
    exploration: EpsilonGreedy,
    rng: StdRng,
    last: Option<(StateKey, Direction)>,
    pending_reward: f32,
}

impl Agent {
    /// Initialize an agent for a `grid_size` x `grid_size` field
    ///
    /// **Panics** if `alpha` is not in the interval `(0,1]`
    pub fn new(grid_size: u32, alpha: f32, rng: StdRng) -> Self {
        assert_interval!(alpha, f32::EPSILON, 1.0);
        Self {
            grid_size,
            q_table: HashMap::new(),
            alpha,
            exploration: EpsilonGreedy::new(0.3, 0.01, 0.995),
            rng,
            last: None,
            pending_reward: 0.0,
        }
    }

    /// Choose the next direction for the current world state, epsilon-greedy
    ///
    /// Exploration picks uniformly among the three non-reversing directions;
    /// exploitation masks the reverse and breaks Q-value ties uniformly at
    /// random. The chosen (state, action) pair is recorded for the next
    /// [`learn`](Self::learn) call.
    pub fn act(&mut self, snake: &Snake, food: Position) -> Direction {
        let state = StateKey::encode(snake, food, self.grid_size);
        let current = snake.dir();

        let action = match self.exploration.choose(&mut self.rng) {
            Choice::Explore => {
                let valid = Direction::VARIANTS
                    .iter()
                    .copied()
                    .filter(|&d| !current.is_reverse_of(d))
                    .collect::<Vec<_>>();
                *valid.choose(&mut self.rng).expect("three directions remain")
            }
            Choice::Exploit => {
                let q = *self.q_values(state);
                let mut best = f32::NEG_INFINITY;
                let mut ties: Vec<Direction> = Vec::with_capacity(4);
                for &d in Direction::VARIANTS {
                    if current.is_reverse_of(d) {
                        continue;
                    }
                    let v = q[d as usize];
                    match v.partial_cmp(&best) {
                        Some(Ordering::Greater) => {
                            best = v;
                            ties.clear();
                            ties.push(d);
                        }
                        Some(Ordering::Equal) => ties.push(d),
                        _ => {}
                    }
                }
                *ties.choose(&mut self.rng).expect("three directions remain")
            }
        };

        self.last = Some((state, action));
        action
    }

    /// Accumulate a reward signal to be consumed by the next `learn` call
    pub fn reward(&mut self, reward: f32) {
        self.pending_reward += reward;
        if reward >= LARGE_REWARD {
            self.exploration.note_progress();
        }
    }

    /// Apply one TD(0) update for the transition into (`new_snake`, `new_food`)
    ///
    /// No-op until an action has been recorded by `act`. Consumes the
    /// accumulated reward, shaped by whether the head closed on the food when
    /// nothing was eaten this transition.
    pub fn learn(
        &mut self,
        prev_snake: &Snake,
        prev_food: Position,
        new_snake: &Snake,
        new_food: Position,
        ate_food: bool,
    ) {
        let Some((last_state, last_action)) = self.last else {
            return;
        };

        let next_state = StateKey::encode(new_snake, new_food, self.grid_size);

        let mut reward = self.pending_reward;
        self.pending_reward = 0.0;
        if !ate_food {
            let before = prev_snake.head().manhattan(prev_food);
            let after = new_snake.head().manhattan(new_food);
            match after.cmp(&before) {
                Ordering::Less => reward += SHAPING,
                Ordering::Greater => reward -= SHAPING,
                Ordering::Equal => {}
            }
        }

        let max_next = self
            .q_values(next_state)
            .iter()
            .copied()
            .fold(f32::NEG_INFINITY, f32::max);

        let alpha = self.alpha;
        let q = &mut self.q_values(last_state)[last_action as usize];
        *q += alpha * (reward + DISCOUNT * max_next - *q);
        trace!(
            "td update: action {:?} reward {:.2} q {:.4}",
            last_action,
            reward,
            q
        );
    }

    /// Fetch the Q vector for a state, lazily seeding it on first visit
    fn q_values(&mut self, state: StateKey) -> &mut [f32; 4] {
        let rng = &mut self.rng;
        self.q_table.entry(state).or_insert_with(|| {
            let mut q = [0.0f32; 4];
            for v in &mut q {
                *v = rng.gen::<f32>() * INIT_NOISE;
            }
            // Nudge the actions that point at the food.
            match state.food_x {
                Ordering::Greater => q[Direction::Right as usize] += FOOD_BIAS,
                Ordering::Less => q[Direction::Left as usize] += FOOD_BIAS,
                Ordering::Equal => {}
            }
            match state.food_y {
                Ordering::Greater => q[Direction::Down as usize] += FOOD_BIAS,
                Ordering::Less => q[Direction::Up as usize] += FOOD_BIAS,
                Ordering::Equal => {}
            }
            q
        })
    }

    /// Current exploration rate
    pub fn exploration_rate(&self) -> f32 {
        self.exploration.rate()
    }

    /// The learned table, one 4-vector of action values per visited state
    pub fn q_table(&self) -> &HashMap<StateKey, [f32; 4]> {
        &self.q_table
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::GridWorld;
    use rand::SeedableRng;

    fn agent(seed: u64) -> Agent {
        Agent::new(20, 0.1, StdRng::seed_from_u64(seed))
    }

    #[test]
    fn state_key_is_pure() {
        let w = GridWorld::new(20, StdRng::seed_from_u64(3));
        let a = StateKey::encode(w.snake(), w.food(), 20);
        let b = StateKey::encode(w.snake(), w.food(), 20);
        assert_eq!(a, b);
    }

    #[test]
    fn act_never_reverses() {
        let mut agent = agent(11);
        let w = GridWorld::new(20, StdRng::seed_from_u64(3));
        for _ in 0..500 {
            let dir = agent.act(w.snake(), w.food());
            assert!(!w.dir().is_reverse_of(dir));
        }
    }

    #[test]
    fn learn_before_act_is_a_no_op() {
        let mut agent = agent(11);
        let w = GridWorld::new(20, StdRng::seed_from_u64(3));
        agent.reward(-0.1);
        agent.learn(w.snake(), w.food(), w.snake(), w.food(), false);
        assert!(agent.q_table().is_empty());
    }

    #[test]
    fn learn_consumes_accumulated_reward() {
        let mut agent = agent(11);
        let mut w = GridWorld::new(20, StdRng::seed_from_u64(3));

        let prev_snake = w.snake().clone();
        let prev_food = w.food();
        let dir = agent.act(w.snake(), w.food());
        let out = w.step(dir);
        agent.reward(if out.ate_food { 10.0 } else { -0.1 });
        agent.learn(&prev_snake, prev_food, w.snake(), w.food(), out.ate_food);

        let key = StateKey::encode(&prev_snake, prev_food, 20);
        assert!(agent.q_table().contains_key(&key));
        assert_eq!(agent.pending_reward, 0.0, "reward consumed and zeroed");
    }

    #[test]
    fn seeded_runs_are_identical() {
        let run = || {
            let mut agent = agent(42);
            let mut w = GridWorld::new(20, StdRng::seed_from_u64(42));
            for _ in 0..2000 {
                let prev_snake = w.snake().clone();
                let prev_food = w.food();
                let dir = agent.act(w.snake(), w.food());
                let out = w.step(dir);
                agent.reward(if out.ate_food { 10.0 } else { -0.1 });
                if !out.alive() {
                    agent.reward(-15.0);
                }
                agent.learn(&prev_snake, prev_food, w.snake(), w.food(), out.ate_food);
                if !out.alive() {
                    w.reset();
                }
            }
            agent
        };

        let (a, b) = (run(), run());
        assert_eq!(a.q_table().len(), b.q_table().len());
        for (key, qa) in a.q_table() {
            assert_eq!(Some(qa), b.q_table().get(key));
        }
        assert_eq!(a.exploration_rate(), b.exploration_rate());
    }

    #[test]
    fn exploration_rate_stays_clamped() {
        let mut agent = agent(5);
        let w = GridWorld::new(20, StdRng::seed_from_u64(3));
        for _ in 0..5000 {
            agent.act(w.snake(), w.food());
            assert!((0.01..=1.0).contains(&agent.exploration_rate()));
        }
    }

    #[test]
    fn danger_flags_are_relative_to_travel() {
        let w = GridWorld::new(20, StdRng::seed_from_u64(3));
        // Head mid-field, nothing adjacent: no danger anywhere.
        let key = StateKey::encode(w.snake(), Position::new(0, 0), 20);
        assert!(!key.danger_ahead && !key.danger_right && !key.danger_left);
    }

    #[test]
    fn length_one_snake_is_not_its_own_danger() {
        let w = GridWorld::new(2, StdRng::seed_from_u64(3));
        // On a 2x2 grid the head at (1,1) faces the right wall; the cell the
        // snake itself sits in must not be flagged through the body check.
        let key = StateKey::encode(w.snake(), w.food(), 2);
        assert!(key.danger_ahead, "wall ahead");
    }
}
