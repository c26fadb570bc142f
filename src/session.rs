use crate::problem::{ProblemData, ProblemFetch, Verdict, VerdictStatus};

// Flash cadence: first highlight 1000ms into playback, each entry lit for
// 500ms with a 250ms gap before the next.
pub const FLASH_LEAD_IN_MS: u64 = 1000;
pub const FLASH_ON_MS: u64 = 500;
pub const FLASH_GAP_MS: u64 = 250;

pub const PRE_FLASH_DELAY_TEST_MS: u64 = 1500;
pub const PRE_FLASH_DELAY_PRACTICE_MS: u64 = 3000;
pub const PRE_FLASH_DELAY_REPLAY_MS: u64 = 1000;
pub const VERDICT_PAUSE_MS: u64 = 1500;
pub const REDIRECT_DELAY_MS: u64 = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum Mode {
    Test,
    Practice,
}

impl Mode {
    pub fn pre_flash_delay_ms(&self) -> u64 {
        match self {
            Mode::Test => PRE_FLASH_DELAY_TEST_MS,
            Mode::Practice => PRE_FLASH_DELAY_PRACTICE_MS,
        }
    }
}

/// Interaction controller state. Input events invalid for the current state
/// are rejected with a reason rather than silently dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum GameState {
    /// A problem fetch is outstanding.
    Loading,
    /// Problem on screen, counting down to the flash sequence.
    Starting,
    /// Flash playback in progress.
    Memorizing,
    /// Accepting clicks.
    Answering,
    /// A submission is outstanding.
    Processing,
    /// Practice: incorrect verdict shown, replay pending.
    RetryPause,
    /// Practice: correct verdict, scored test unlocked.
    Unlocked,
    /// Test: end-of-test message shown, redirect pending.
    Completed,
    /// Redirect issued; nothing left to do.
    Finished,
    /// A fetch or submission failed; `r` retries, Esc quits.
    Faulted,
}

/// Side effect requested from the driver. The controller performs no I/O
/// itself, which keeps every transition testable headlessly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    FetchProblem,
    SubmitAnswer(Vec<u32>),
    OpenUrl(String),
}

/// The interrupted action a `Faulted` session can retry.
#[derive(Debug, Clone, PartialEq, Eq)]
enum RetryAction {
    Fetch,
    Resubmit(Vec<u32>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickRejection {
    /// Clicks only count while answering.
    WrongState(GameState),
    NoBoxAtPoint,
    /// Practice mode: re-clicking a selected box is a no-op.
    AlreadySelected(u32),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickOutcome {
    Selected(u32),
    /// Test mode toggle: the box was removed from the sequence.
    Deselected(u32),
    /// The selection filled the sequence; submit exactly once.
    SequenceComplete(Command),
    Rejected(ClickRejection),
}

/// Precomputed on/off offsets for one problem's flash playback. The lit box
/// is derived from elapsed time within `Memorizing`, so abandoning a problem
/// abandons its schedule; there is no dangling timer to fire late.
#[derive(Debug, Clone, PartialEq)]
pub struct FlashSchedule {
    steps: Vec<FlashStep>,
    answering_at_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlashStep {
    pub box_id: u32,
    pub on_at_ms: u64,
    pub off_at_ms: u64,
}

impl FlashSchedule {
    pub fn for_sequence(sequence: &[u32]) -> Self {
        let step_len = FLASH_ON_MS + FLASH_GAP_MS;
        let steps = sequence
            .iter()
            .enumerate()
            .map(|(i, id)| {
                let on_at_ms = FLASH_LEAD_IN_MS + i as u64 * step_len;
                FlashStep {
                    box_id: *id,
                    on_at_ms,
                    off_at_ms: on_at_ms + FLASH_ON_MS,
                }
            })
            .collect::<Vec<_>>();
        Self {
            steps,
            answering_at_ms: FLASH_LEAD_IN_MS + sequence.len() as u64 * step_len,
        }
    }

    /// Box lit at `elapsed_ms` into the playback, if any.
    pub fn lit_at(&self, elapsed_ms: u64) -> Option<u32> {
        self.steps
            .iter()
            .find(|s| elapsed_ms >= s.on_at_ms && elapsed_ms < s.off_at_ms)
            .map(|s| s.box_id)
    }

    pub fn is_done(&self, elapsed_ms: u64) -> bool {
        elapsed_ms >= self.answering_at_ms
    }

    pub fn answering_at_ms(&self) -> u64 {
        self.answering_at_ms
    }

    pub fn steps(&self) -> &[FlashStep] {
        &self.steps
    }
}

/// One play-through in either mode. Owns all mutable session state;
/// constructed fresh per mode switch, reloaded per problem.
#[derive(Debug)]
pub struct Session {
    mode: Mode,
    state: GameState,
    problem: Option<ProblemData>,
    user_sequence: Vec<u32>,
    schedule: Option<FlashSchedule>,
    state_elapsed_ms: u64,
    start_delay_ms: u64,
    message: String,
    next_url: Option<String>,
    retry: Option<RetryAction>,
    epoch: u64,
}

impl Session {
    pub fn new(mode: Mode) -> Self {
        let message = match mode {
            Mode::Test => "Fetching the next problem...".to_string(),
            Mode::Practice => "Preparing a practice problem...".to_string(),
        };
        Self {
            mode,
            state: GameState::Loading,
            problem: None,
            user_sequence: Vec::new(),
            schedule: None,
            state_elapsed_ms: 0,
            start_delay_ms: 0,
            message,
            next_url: None,
            retry: None,
            epoch: 0,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn state(&self) -> GameState {
        self.state
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn problem(&self) -> Option<&ProblemData> {
        self.problem.as_ref()
    }

    pub fn user_sequence(&self) -> &[u32] {
        &self.user_sequence
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// 1-based click-order index of a selected box.
    pub fn selection_index(&self, id: u32) -> Option<usize> {
        self.user_sequence
            .iter()
            .position(|s| *s == id)
            .map(|i| i + 1)
    }

    /// Box currently lit by the flash playback. Always None outside
    /// `Memorizing`.
    pub fn lit_box(&self) -> Option<u32> {
        if self.state != GameState::Memorizing {
            return None;
        }
        self.schedule
            .as_ref()
            .and_then(|s| s.lit_at(self.state_elapsed_ms))
    }

    fn enter(&mut self, state: GameState) {
        self.state = state;
        self.state_elapsed_ms = 0;
    }

    /// Feed the result of a problem fetch back into the controller.
    pub fn problem_received(&mut self, fetch: ProblemFetch) {
        debug_assert_eq!(self.state, GameState::Loading);
        match fetch {
            ProblemFetch::Completed(notice) => {
                self.message = notice.message;
                self.next_url = Some(notice.next_url);
                self.problem = None;
                self.enter(GameState::Completed);
            }
            ProblemFetch::Problem(problem) => {
                if let Err(err) = problem.validate() {
                    self.fail(format!("Bad problem from server: {err}"), RetryAction::Fetch);
                    return;
                }
                self.epoch += 1;
                self.user_sequence.clear();
                self.schedule = Some(FlashSchedule::for_sequence(&problem.flash_sequence));
                self.message = match problem.level_header() {
                    Some(header) => format!("{header}: starting shortly."),
                    None => "Starting shortly.".to_string(),
                };
                self.problem = Some(problem);
                self.start_delay_ms = self.mode.pre_flash_delay_ms();
                self.retry = None;
                self.enter(GameState::Starting);
            }
        }
    }

    pub fn fetch_failed(&mut self, detail: &str) {
        self.fail(
            format!("Could not fetch a problem from the server: {detail}"),
            RetryAction::Fetch,
        );
    }

    /// Test mode: a submission went through; the response body is unused and
    /// the next problem is fetched immediately.
    pub fn submit_succeeded(&mut self) -> Command {
        debug_assert_eq!(self.mode, Mode::Test);
        self.message = "Fetching the next problem...".to_string();
        self.problem = None;
        self.user_sequence.clear();
        self.enter(GameState::Loading);
        Command::FetchProblem
    }

    /// Practice mode: the server graded the submission.
    pub fn verdict_received(&mut self, verdict: &Verdict) {
        debug_assert_eq!(self.state, GameState::Processing);
        match verdict.status() {
            VerdictStatus::Correct => {
                self.message = verdict.message_or_default();
                self.enter(GameState::Unlocked);
            }
            VerdictStatus::Incorrect => {
                self.message = verdict.message_or_default();
                self.enter(GameState::RetryPause);
            }
            VerdictStatus::Other => {
                self.message = format!("Error: {}", verdict.message_or_default());
                self.retry = None;
                self.enter(GameState::Faulted);
            }
        }
    }

    pub fn submit_failed(&mut self, detail: &str) {
        let answer = self.user_sequence.clone();
        self.fail(
            format!("Could not reach the server: {detail}"),
            RetryAction::Resubmit(answer),
        );
    }

    fn fail(&mut self, message: String, retry: RetryAction) {
        self.message = message;
        self.retry = Some(retry);
        self.enter(GameState::Faulted);
    }

    /// From `Faulted`, re-issue the interrupted action. Returns None when the
    /// fault is server-reported and there is nothing to retry.
    pub fn retry_command(&mut self) -> Option<Command> {
        if self.state != GameState::Faulted {
            return None;
        }
        match self.retry.take()? {
            RetryAction::Fetch => {
                self.message = "Retrying...".to_string();
                self.enter(GameState::Loading);
                Some(Command::FetchProblem)
            }
            RetryAction::Resubmit(answer) => {
                self.message = "Retrying submission...".to_string();
                self.enter(GameState::Processing);
                Some(Command::SubmitAnswer(answer))
            }
        }
    }

    /// Advance timers by `dt_ms`. At most one command comes back.
    pub fn on_tick(&mut self, dt_ms: u64) -> Option<Command> {
        self.state_elapsed_ms = self.state_elapsed_ms.saturating_add(dt_ms);
        match self.state {
            GameState::Starting => {
                if self.state_elapsed_ms >= self.start_delay_ms {
                    self.message = "Memorize the order...".to_string();
                    self.enter(GameState::Memorizing);
                }
                None
            }
            GameState::Memorizing => {
                let done = match self.schedule.as_ref() {
                    Some(s) => s.is_done(self.state_elapsed_ms),
                    None => true,
                };
                if done {
                    self.message = "Click the boxes in the order they flashed!".to_string();
                    self.enter(GameState::Answering);
                }
                None
            }
            GameState::RetryPause => {
                if self.state_elapsed_ms >= VERDICT_PAUSE_MS {
                    self.user_sequence.clear();
                    self.message = "Watch the order again...".to_string();
                    self.start_delay_ms = PRE_FLASH_DELAY_REPLAY_MS;
                    self.enter(GameState::Starting);
                }
                None
            }
            GameState::Completed => {
                if self.state_elapsed_ms >= REDIRECT_DELAY_MS {
                    self.enter(GameState::Finished);
                    return self.next_url.take().map(Command::OpenUrl);
                }
                None
            }
            _ => None,
        }
    }

    /// A click in problem pixel coordinates.
    pub fn on_click(&mut self, x: f64, y: f64) -> ClickOutcome {
        if self.state != GameState::Answering {
            return ClickOutcome::Rejected(ClickRejection::WrongState(self.state));
        }
        let problem = self
            .problem
            .as_ref()
            .expect("answering state always has a problem");
        let Some(id) = problem.hit_test(x, y) else {
            return ClickOutcome::Rejected(ClickRejection::NoBoxAtPoint);
        };
        let flash_count = problem.flash_count;

        if let Some(pos) = self.user_sequence.iter().position(|s| *s == id) {
            return match self.mode {
                Mode::Test => {
                    self.user_sequence.remove(pos);
                    ClickOutcome::Deselected(id)
                }
                Mode::Practice => ClickOutcome::Rejected(ClickRejection::AlreadySelected(id)),
            };
        }

        self.user_sequence.push(id);
        debug_assert!(self.user_sequence.len() <= flash_count);

        if self.user_sequence.len() == flash_count {
            self.message = match self.mode {
                Mode::Test => "Checking your answer...".to_string(),
                Mode::Practice => "Grading...".to_string(),
            };
            self.enter(GameState::Processing);
            return ClickOutcome::SequenceComplete(Command::SubmitAnswer(
                self.user_sequence.clone(),
            ));
        }
        ClickOutcome::Selected(id)
    }
}
