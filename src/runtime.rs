use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::Duration;

use crossterm::event::{
    self, Event as CtEvent, KeyEvent, MouseButton, MouseEvent, MouseEventKind,
};

pub const TICK_RATE_MS: u64 = 100;

/// Unified event type consumed by the app driver.
#[derive(Clone, Debug)]
pub enum AsetEvent {
    Key(KeyEvent),
    /// Left mouse button pressed at a terminal cell.
    Click { column: u16, row: u16 },
    Resize,
    Tick,
}

/// Source of terminal events (keyboard, mouse, resize).
pub trait EventSource: Send + 'static {
    /// Block for up to `timeout` waiting for an event.
    /// Returns Ok(event) if one arrives before the timeout, Err(Timeout) otherwise.
    fn recv_timeout(&self, timeout: Duration) -> Result<AsetEvent, RecvTimeoutError>;
}

/// Production event source using crossterm. Mouse capture must be enabled on
/// the terminal for clicks to arrive.
pub struct CrosstermEventSource {
    rx: Receiver<AsetEvent>,
}

impl CrosstermEventSource {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();

        std::thread::spawn(move || loop {
            match event::read() {
                Ok(CtEvent::Key(key)) => {
                    if tx.send(AsetEvent::Key(key)).is_err() {
                        break;
                    }
                }
                Ok(CtEvent::Mouse(MouseEvent {
                    kind: MouseEventKind::Down(MouseButton::Left),
                    column,
                    row,
                    ..
                })) => {
                    if tx.send(AsetEvent::Click { column, row }).is_err() {
                        break;
                    }
                }
                Ok(CtEvent::Resize(_, _)) => {
                    if tx.send(AsetEvent::Resize).is_err() {
                        break;
                    }
                }
                Ok(_) => {}
                Err(_) => break,
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

impl EventSource for CrosstermEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<AsetEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Pace of the tick clock. The session's delays and flash playback all count
/// tick-delivered elapsed time, so this is the game's only clock.
pub trait Ticker: Send + Sync + 'static {
    fn interval(&self) -> Duration;
}

/// Ticks at a constant interval; tests shrink it to run flows fast.
#[derive(Clone, Copy, Debug)]
pub struct FixedTicker {
    interval: Duration,
}

impl FixedTicker {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Ticker for FixedTicker {
    fn interval(&self) -> Duration {
        self.interval
    }
}

/// Channel-fed source for headless tests; the test side holds the sender.
pub struct TestEventSource {
    rx: Receiver<AsetEvent>,
}

impl TestEventSource {
    pub fn new(rx: Receiver<AsetEvent>) -> Self {
        Self { rx }
    }
}

impl EventSource for TestEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<AsetEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Pairs an event source with a ticker so the driver loop sees a single
/// stream: input when there is any, a tick otherwise.
pub struct Runner<E: EventSource, T: Ticker> {
    event_source: E,
    ticker: T,
}

impl<E: EventSource, T: Ticker> Runner<E, T> {
    pub fn new(event_source: E, ticker: T) -> Self {
        Self {
            event_source,
            ticker,
        }
    }

    /// Next event, waiting at most one tick interval; quiet periods and a
    /// closed source both come back as Tick.
    pub fn step(&self) -> AsetEvent {
        match self.event_source.recv_timeout(self.ticker.interval()) {
            Ok(ev) => ev,
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                AsetEvent::Tick
            }
        }
    }
}
