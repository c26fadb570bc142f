pub mod client;
pub mod problem;
pub mod runtime;
pub mod session;
pub mod ui;

use crate::{
    client::{HttpProblemServer, ProblemServer},
    runtime::{AsetEvent, CrosstermEventSource, FixedTicker, Runner, TICK_RATE_MS},
    session::{ClickOutcome, Command, GameState, Mode, Session},
};
use clap::{error::ErrorKind, CommandFactory, Parser};
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    layout::Rect,
    Terminal,
};
use std::{
    error::Error,
    io::{self, stdin},
    time::{Duration, Instant},
};
use webbrowser::Browser;

/// terminal client for the A-set visual memory test
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "Watch a sequence of boxes flash, then click them back in the same order. Talks to an A-set grading server over HTTP; run with --practice for an ungraded warm-up round."
)]
pub struct Cli {
    /// base URL of the grading server
    #[clap(short = 's', long, default_value = "http://127.0.0.1:5001")]
    server_url: String,

    /// start in practice mode (ungraded, unlocks the scored test)
    #[clap(short = 'p', long)]
    practice: bool,

    /// HTTP request timeout in seconds
    #[clap(long, default_value_t = 10)]
    timeout_secs: u64,
}

impl Cli {
    fn mode(&self) -> Mode {
        if self.practice {
            Mode::Practice
        } else {
            Mode::Test
        }
    }
}

/// Driver that owns the session and performs the I/O it requests.
pub struct App {
    pub session: Session,
    server: Box<dyn ProblemServer>,
    server_url: String,
    pub should_quit: bool,
}

impl App {
    pub fn new(mode: Mode, server: Box<dyn ProblemServer>, server_url: &str) -> Self {
        Self {
            session: Session::new(mode),
            server,
            server_url: server_url.trim_end_matches('/').to_string(),
            should_quit: false,
        }
    }

    /// Run one command from the session and feed the result back in. A test
    /// submission chains straight into the next fetch.
    pub fn execute(&mut self, command: Command) {
        match command {
            Command::FetchProblem => match self.session.mode() {
                Mode::Test => match self.server.fetch_problem() {
                    Ok(fetch) => self.session.problem_received(fetch),
                    Err(err) => self.session.fetch_failed(&err.to_string()),
                },
                Mode::Practice => match self.server.fetch_practice_problem() {
                    Ok(problem) => self
                        .session
                        .problem_received(crate::problem::ProblemFetch::Problem(problem)),
                    Err(err) => self.session.fetch_failed(&err.to_string()),
                },
            },
            Command::SubmitAnswer(answer) => match self.session.mode() {
                Mode::Test => match self.server.submit_answer(&answer) {
                    Ok(()) => {
                        let next = self.session.submit_succeeded();
                        self.execute(next);
                    }
                    Err(err) => self.session.submit_failed(&err.to_string()),
                },
                Mode::Practice => match self.server.submit_practice_answer(&answer) {
                    Ok(verdict) => self.session.verdict_received(&verdict),
                    Err(err) => self.session.submit_failed(&err.to_string()),
                },
            },
            Command::OpenUrl(url) => {
                let target = self.absolute_url(&url);
                if Browser::is_available() {
                    webbrowser::open(&target).unwrap_or_default();
                }
                self.should_quit = true;
            }
        }
    }

    /// Map a terminal click through the current layout into problem pixels.
    /// Clicks outside the board, or with no problem on screen, do nothing.
    pub fn handle_click(&mut self, column: u16, row: u16, area: Rect) {
        let pixel = {
            let Some(problem) = self.session.problem() else {
                return;
            };
            let board = ui::screen_areas(area).board;
            let Some(transform) = ui::board_transform(problem, board) else {
                return;
            };
            transform.terminal_to_pixel(column, row)
        };
        let Some((x, y)) = pixel else {
            return;
        };
        if let ClickOutcome::SequenceComplete(command) = self.session.on_click(x, y) {
            self.execute(command);
        }
    }

    /// Enter pressed after a correct practice round: swap to a fresh scored
    /// session. A no-op in every other state.
    pub fn start_scored_test(&mut self) {
        if self.session.state() != GameState::Unlocked {
            return;
        }
        self.session = Session::new(Mode::Test);
        self.execute(Command::FetchProblem);
    }

    /// From `Faulted`, re-issue the interrupted request.
    pub fn retry(&mut self) {
        if let Some(command) = self.session.retry_command() {
            self.execute(command);
        }
    }

    /// The server hands back relative redirect paths.
    fn absolute_url(&self, url: &str) -> String {
        if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else {
            format!("{}/{}", self.server_url, url.trim_start_matches('/'))
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    let server = HttpProblemServer::new(&cli.server_url, Duration::from_secs(cli.timeout_secs))?;
    let mut app = App::new(cli.mode(), Box::new(server), &cli.server_url);
    app.execute(Command::FetchProblem);

    enable_raw_mode()?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal, &mut app);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        DisableMouseCapture,
        LeaveAlternateScreen
    )?;
    terminal.show_cursor()?;

    result
}

fn run_app<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<(), Box<dyn Error>> {
    let runner = Runner::new(
        CrosstermEventSource::new(),
        FixedTicker::new(Duration::from_millis(TICK_RATE_MS)),
    );
    let mut last_tick = Instant::now();

    loop {
        terminal.draw(|f| ui::draw(app, f))?;
        if app.should_quit {
            break;
        }

        match runner.step() {
            AsetEvent::Tick => {
                let dt_ms = last_tick.elapsed().as_millis() as u64;
                last_tick = Instant::now();
                if let Some(command) = app.session.on_tick(dt_ms) {
                    app.execute(command);
                }
            }
            AsetEvent::Resize => {}
            AsetEvent::Click { column, row } => {
                let size = terminal.size()?;
                app.handle_click(column, row, Rect::new(0, 0, size.width, size.height));
            }
            AsetEvent::Key(key) => match key.code {
                KeyCode::Esc => break,
                KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => break,
                KeyCode::Char('r') => app.retry(),
                KeyCode::Enter => app.start_scored_test(),
                _ => {}
            },
        }
    }

    Ok(())
}
