//! Headless training run: drives a session from a synthetic clock so the
//! tick gate never waits on wall time, and logs the running stats.

use std::time::{Duration, Instant};

use log::info;

use clever_snake::session::{Event, Session, SessionConfig};

const TICKS: u32 = 200_000;
const REPORT_EVERY: u32 = 500;

fn main() {
    env_logger::init();

    let mut session = Session::new(SessionConfig {
        grid_size: 20,
        learning_rate: 0.1,
        seed: Some(42),
    })
    .expect("training config is valid");
    session.set_training(true);
    session.set_speed(1_000.0);

    let start = Instant::now();
    // Well past the 1ms gate at 1000 ticks/sec, and long enough that the
    // post-episode restart delay costs only a few ticks.
    let step = Duration::from_millis(100);
    let mut games_reported = 0;

    for i in 0..TICKS {
        let now = start + step * i;
        for event in session.tick(now) {
            if let Event::Stats(stats) = event {
                if stats.games_played >= games_reported + REPORT_EVERY {
                    games_reported = stats.games_played;
                    info!(
                        "game {}: high {} avg {:.2} epsilon {:.3} states {}",
                        stats.games_played,
                        stats.high_score,
                        stats.average_score,
                        session.agent().exploration_rate(),
                        session.agent().q_table().len(),
                    );
                }
            }
        }
    }

    let stats = session.stats();
    println!(
        "trained {} games: high score {}, average {:.2}, {} states visited",
        stats.games_played,
        stats.high_score,
        stats.average_score,
        session.agent().q_table().len(),
    );
}
