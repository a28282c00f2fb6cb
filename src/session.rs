//! Contains the loop that drives a practice session.
//!
//! Each iteration draws a prompt from the active pool, presents it, waits until the student holds
//! all of its keys, reveals the answer and waits for the reveal interval. The loop is polled: on
//! every tick the window is checked first, then the input device, and only then does the loop
//! sleep. A quit request unwinds as [SessionError::Cancelled] up to [SessionController::run], which
//! turns it into a normal outcome.

use derive_builder::Builder;
use parking_lot::RwLock;
use rand::{Rng, rngs::ThreadRng};
use std::{
    sync::Arc,
    thread,
    time::{Duration, Instant},
};
use ustr::Ustr;

use crate::{
    catalog::PromptCatalog,
    data::{Prompt, SessionState},
    device::{InputDevice, KeyLookup},
    error::{ConfigurationError, SessionError},
    matcher::{AnswerMatcher, MatchState},
    properties::Properties,
    render::{NotationPainter, Renderer, Styling},
    scheduler::SuiteScheduler,
    window::{WindowEvent, WindowEvents},
};

/// The default time between two polls of the window and the device.
pub const DEFAULT_TICK: Duration = Duration::from_millis(10);

/// The default time during which the answer stays on screen.
pub const DEFAULT_REVEAL_INTERVAL: Duration = Duration::from_millis(1500);

/// The timing and length of a session.
#[derive(Builder, Clone, Debug, Eq, PartialEq)]
pub struct SessionOptions {
    /// The time between two polls of the window and the device.
    #[builder(default = "DEFAULT_TICK")]
    pub tick: Duration,

    /// The time during which the answer stays on screen before the next prompt.
    #[builder(default = "DEFAULT_REVEAL_INTERVAL")]
    pub reveal_interval: Duration,

    /// The number of prompts after which the session completes. The session runs until cancelled
    /// if not set.
    #[builder(default, setter(strip_option))]
    pub prompt_limit: Option<usize>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            tick: DEFAULT_TICK,
            reveal_interval: DEFAULT_REVEAL_INTERVAL,
            prompt_limit: None,
        }
    }
}

impl SessionOptions {
    /// Reads the options from the properties. `TickMillis` and `RevealMillis` fall back to their
    /// defaults when unset.
    pub fn from_properties(properties: &dyn Properties) -> Result<Self, ConfigurationError> {
        let mut builder = SessionOptionsBuilder::default();
        if properties.get("TickMillis").is_some() {
            builder.tick(properties.require_millis("TickMillis")?);
        }
        if properties.get("RevealMillis").is_some() {
            builder.reveal_interval(properties.require_millis("RevealMillis")?);
        }
        if let Some(limit) = properties.optional_usize("PromptLimit")? {
            builder.prompt_limit(limit);
        }
        builder
            .build()
            .map_err(|e| ConfigurationError::InvalidProperty("session".to_string(), e.to_string()))
    }
}

/// The way a session ended.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SessionOutcome {
    /// The prompt limit was reached. Contains the number of answered prompts.
    Completed(usize),

    /// The student quit. Contains the number of answered prompts.
    Cancelled(usize),
}

/// The collaborators through which a session talks to the outside world. They are acquired before
/// the session starts and outlive it.
pub struct SessionIo<'a> {
    /// The renderer on which prompts are presented.
    pub renderer: &'a mut dyn Renderer,

    /// The device from which key events are read.
    pub input: &'a mut dyn InputDevice,

    /// The source of quit requests.
    pub window: &'a mut dyn WindowEvents,
}

/// Runs the practice loop.
pub struct SessionController<R: Rng = ThreadRng> {
    /// The catalog from which prompts and pools are read.
    catalog: Arc<RwLock<dyn PromptCatalog + Send + Sync>>,

    /// Chooses the next prompt.
    scheduler: SuiteScheduler<R>,

    /// Builds the canvas of each prompt.
    painter: NotationPainter,

    /// Maps note names to the key codes of the input device.
    key_lookup: Box<dyn KeyLookup>,

    /// The timing and length of the session.
    options: SessionOptions,

    /// The state carried from one iteration to the next.
    state: SessionState,
}

impl<R: Rng> SessionController<R> {
    /// Creates a session drawing from the given pool. Fails if the catalog has no such pool.
    pub fn new(
        catalog: Arc<RwLock<dyn PromptCatalog + Send + Sync>>,
        scheduler: SuiteScheduler<R>,
        painter: NotationPainter,
        key_lookup: Box<dyn KeyLookup>,
        options: SessionOptions,
        pool_id: Ustr,
    ) -> Result<Self, ConfigurationError> {
        if catalog.read().get_pool(&pool_id).is_none() {
            return Err(ConfigurationError::UnknownPool(pool_id));
        }
        Ok(Self {
            catalog,
            scheduler,
            painter,
            key_lookup,
            options,
            state: SessionState::new(pool_id),
        })
    }

    /// Returns the current state of the session.
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Makes the given pool the one from which the following prompts are drawn.
    pub fn set_active_pool(&mut self, pool_id: Ustr) -> Result<(), ConfigurationError> {
        if self.catalog.read().get_pool(&pool_id).is_none() {
            return Err(ConfigurationError::UnknownPool(pool_id));
        }
        log::info!("switching to pool {pool_id}");
        self.state.switch_pool(pool_id);
        Ok(())
    }

    /// Runs the loop until the student quits or the prompt limit is reached.
    pub fn run(&mut self, io: &mut SessionIo<'_>) -> Result<SessionOutcome, SessionError> {
        log::info!("starting session with pool {}", self.state.active_pool);
        let mut answered = 0;
        loop {
            if self.options.prompt_limit.is_some_and(|limit| answered >= limit) {
                log::info!("session completed after {answered} prompts");
                return Ok(SessionOutcome::Completed(answered));
            }

            match self.practice_once(io, &mut answered) {
                Ok(()) => {}
                Err(SessionError::Cancelled) => {
                    log::info!("session cancelled after {answered} prompts");
                    return Ok(SessionOutcome::Cancelled(answered));
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Draws the next prompt from the active pool and records it in the state.
    fn next_prompt(&mut self) -> Result<Prompt, ConfigurationError> {
        let catalog = self.catalog.read();
        let pool_id = self.state.active_pool;
        let pool = catalog
            .get_pool(&pool_id)
            .ok_or(ConfigurationError::UnknownPool(pool_id))?;
        let prompt_id = self
            .scheduler
            .choose_next(&pool, &mut self.state.sequential_cursor)?;
        let prompt = catalog
            .get_prompt(&prompt_id)
            .ok_or(ConfigurationError::UnknownPrompt(pool_id, prompt_id))?;
        self.state.advance(prompt_id);
        Ok(prompt)
    }

    /// Runs a single iteration of the loop. The prompt counts as answered as soon as the student
    /// holds its keys, before the reveal.
    fn practice_once(
        &mut self,
        io: &mut SessionIo<'_>,
        answered: &mut usize,
    ) -> Result<(), SessionError> {
        let prompt = self.next_prompt()?;
        let prompt_id = prompt.id();

        let question = self.painter.paint(&prompt, Styling::Question)?;
        io.renderer.present(&question)?;
        log::info!("displayed {prompt_id}");

        self.await_answer(&prompt, io)?;
        *answered += 1;
        log::info!("answered {prompt_id}");

        let answer = self.painter.paint(&prompt, Styling::Answer)?;
        io.renderer.present(&answer)?;
        self.reveal(io)
    }

    /// Fails with [SessionError::Cancelled] if the window asked to quit.
    fn check_quit(io: &mut SessionIo<'_>) -> Result<(), SessionError> {
        if io.window.poll().contains(&WindowEvent::Quit) {
            return Err(SessionError::Cancelled);
        }
        Ok(())
    }

    /// Waits until the student holds all the keys of the prompt.
    fn await_answer(&self, prompt: &Prompt, io: &mut SessionIo<'_>) -> Result<(), SessionError> {
        let mut matcher = AnswerMatcher::new(prompt.notes(), self.key_lookup.as_ref())?;
        while !matcher.is_satisfied() {
            Self::check_quit(io)?;
            for event in io.input.poll()? {
                if matcher.process(&event) == MatchState::Satisfied {
                    // The rest of the batch belongs to the reveal and is discarded there.
                    return Ok(());
                }
            }
            thread::sleep(self.options.tick);
        }
        Ok(())
    }

    /// Keeps the answer on screen for the reveal interval. Key events are discarded.
    fn reveal(&self, io: &mut SessionIo<'_>) -> Result<(), SessionError> {
        let start = Instant::now();
        loop {
            Self::check_quit(io)?;
            let _ = io.input.poll()?;
            if start.elapsed() >= self.options.reveal_interval {
                return Ok(());
            }
            thread::sleep(self.options.tick);
        }
    }
}
