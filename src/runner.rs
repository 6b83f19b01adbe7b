use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc::{self, Sender, TryRecvError},
        Arc,
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use log::debug;

use crate::{
    session::{Event, Mode, Session},
    world::Direction,
};

/// How long the driver sleeps between tick attempts; the session's own time
/// gate sets the actual tick rate
const HEARTBEAT: Duration = Duration::from_millis(1);

/// Control messages applied at the next tick boundary
#[derive(Clone, Copy, Debug)]
pub enum Command {
    Direction(Direction),
    Mode(Mode),
    Speed(f32),
    Training(bool),
    Restart,
}

/// Handle to a running session driver
///
/// Dropping the handle without calling [`stop`](Self::stop) detaches the
/// thread; `stop` shuts it down cooperatively and hands the session back.
pub struct Handle {
    stop: Arc<AtomicBool>,
    commands: Sender<Command>,
    thread: JoinHandle<Session>,
}

impl Handle {
    /// A sender for feeding commands to the driver
    pub fn commands(&self) -> Sender<Command> {
        self.commands.clone()
    }

    /// Stop the driver: no further ticks fire once this returns
    pub fn stop(self) -> Session {
        self.stop.store(true, Ordering::Relaxed);
        self.thread.join().expect("driver thread does not panic")
    }
}

/// Spawn a driver thread that ticks `session` at its configured rate,
/// draining commands before every tick and forwarding events to `events`
pub fn spawn(mut session: Session, events: Sender<Event>) -> Handle {
    let stop = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&stop);
    let (commands, command_rx) = mpsc::channel();

    let thread = thread::spawn(move || {
        while !flag.load(Ordering::Relaxed) {
            loop {
                match command_rx.try_recv() {
                    Ok(command) => apply(&mut session, command),
                    Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
                }
            }

            for event in session.tick(Instant::now()) {
                // A departed observer is not a reason to stop simulating.
                let _ = events.send(event);
            }

            thread::sleep(HEARTBEAT);
        }
        debug!("driver stopped");
        session
    });

    Handle {
        stop,
        commands,
        thread,
    }
}

fn apply(session: &mut Session, command: Command) {
    match command {
        Command::Direction(dir) => session.queue_direction(dir),
        Command::Mode(mode) => session.set_mode(mode),
        Command::Speed(speed) => session.set_speed(speed),
        Command::Training(training) => session.set_training(training),
        Command::Restart => session.restart(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionConfig;

    #[test]
    fn stop_halts_ticking_and_returns_the_session() {
        let session = Session::new(SessionConfig {
            seed: Some(3),
            ..Default::default()
        })
        .expect("config is valid");

        let (event_tx, event_rx) = mpsc::channel();
        let handle = spawn(session, event_tx);
        handle
            .commands()
            .send(Command::Speed(200.0))
            .expect("driver is alive");
        handle
            .commands()
            .send(Command::Training(true))
            .expect("driver is alive");

        thread::sleep(Duration::from_millis(100));
        let session = handle.stop();

        assert!(session.is_training(), "commands were applied");

        // The driver owned the only event sender; after stop the channel
        // drains and then disconnects, so no further ticks can fire.
        while let Ok(_event) = event_rx.try_recv() {}
        assert!(matches!(event_rx.try_recv(), Err(TryRecvError::Disconnected)));
    }

    #[test]
    fn manual_commands_reach_the_world() {
        let session = Session::new(SessionConfig {
            seed: Some(9),
            ..Default::default()
        })
        .expect("config is valid");

        let (event_tx, _event_rx) = mpsc::channel();
        let handle = spawn(session, event_tx);
        let commands = handle.commands();
        commands.send(Command::Mode(Mode::Manual)).unwrap();
        commands.send(Command::Speed(100.0)).unwrap();
        commands.send(Command::Direction(Direction::Down)).unwrap();

        thread::sleep(Duration::from_millis(100));
        let session = handle.stop();

        assert_eq!(session.mode(), Mode::Manual);
        assert_ne!(
            session.world().snake().head(),
            crate::world::Position::new(10, 10),
            "the session ticked while driven"
        );
    }
}
