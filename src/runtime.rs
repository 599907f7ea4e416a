use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::Duration;

use crossterm::event::{self, Event, KeyEvent, KeyEventKind};

/// What the trainer loop reacts to.
#[derive(Clone, Debug)]
pub enum TrainerEvent {
    /// A key press. Release and repeat events are filtered at the source so
    /// one physical press never picks up and drops a piece in the same beat.
    Key(KeyEvent),
    /// The terminal changed shape; redraw, nothing else.
    Redraw,
    /// Periodic heartbeat that drives the session's delayed actions.
    Tick,
}

/// Where trainer events come from. The indirection lets integration tests
/// feed scripted input without a terminal attached.
pub trait TrainerEventSource: Send + 'static {
    fn recv_timeout(&self, timeout: Duration) -> Result<TrainerEvent, RecvTimeoutError>;
}

/// Reads crossterm events on a background thread and forwards the ones the
/// trainer cares about. The thread exits when the receiving side is dropped
/// or the terminal goes away.
pub struct CrosstermEventSource {
    rx: Receiver<TrainerEvent>,
}

impl CrosstermEventSource {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || loop {
            let forwarded = match event::read() {
                Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => {
                    tx.send(TrainerEvent::Key(key))
                }
                Ok(Event::Resize(_, _)) => tx.send(TrainerEvent::Redraw),
                Ok(_) => Ok(()),
                Err(_) => break,
            };
            if forwarded.is_err() {
                break;
            }
        });
        Self { rx }
    }
}

impl Default for CrosstermEventSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TrainerEventSource for CrosstermEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<TrainerEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Scripted source for headless tests: whatever lands on the channel comes
/// out of `recv_timeout`.
pub struct TestEventSource {
    rx: Receiver<TrainerEvent>,
}

impl TestEventSource {
    pub fn new(rx: Receiver<TrainerEvent>) -> Self {
        Self { rx }
    }
}

impl TrainerEventSource for TestEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<TrainerEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Pulls one event per call, substituting a `Tick` whenever the source stays
/// quiet for a whole tick interval. A disconnected source also degrades to
/// ticks, which keeps session timers running while the input thread dies.
pub struct Runner<E: TrainerEventSource> {
    source: E,
    tick_interval: Duration,
}

impl<E: TrainerEventSource> Runner<E> {
    pub fn new(source: E, tick_interval: Duration) -> Self {
        Self {
            source,
            tick_interval,
        }
    }

    pub fn step(&self) -> TrainerEvent {
        match self.source.recv_timeout(self.tick_interval) {
            Ok(ev) => ev,
            Err(_) => TrainerEvent::Tick,
        }
    }
}
