pub mod config;
pub mod dataset;
pub mod history;
pub mod runtime;
pub mod stats;
pub mod typewriter;
pub mod ui;
pub mod util;
pub mod words;

use clap::{error::ErrorKind, CommandFactory, Parser, ValueEnum};
use crossterm::{
    event::{KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use std::{
    error::Error,
    io::{self, stdin},
    time::Duration,
};

use config::{Config, ConfigStore, FileConfigStore};
use history::{FileHistoryStore, HistoryStore};
use runtime::{AppEvent, Runner, TermEventSource};
use stats::{CompletedStat, Metrics};
use typewriter::{Key, Typewriter};
use words::{SizeRatios, WordBank};

const TICK_RATE_MS: u64 = 100;

/// terminal typing practice with rhythm analysis and session history
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "Terminal typing practice that tracks per-character timing and typos, scores speed, accuracy, and rhythm consistency, and keeps a history of every session."
)]
pub struct Cli {
    /// number of words to generate for the practice text
    #[clap(short = 'w', long)]
    number_of_words: Option<usize>,

    /// custom text to type instead of generated words
    #[clap(short = 'p', long)]
    prompt: Option<String>,

    /// word-length mix used when generating text
    #[clap(short = 'm', long, value_enum)]
    mix: Option<LengthMix>,

    /// open the session history instead of starting a session
    #[clap(long)]
    history: bool,
}

#[derive(Debug, Copy, Clone, ValueEnum, strum_macros::Display)]
pub enum LengthMix {
    Balanced,
    Short,
    Long,
}

impl LengthMix {
    fn as_ratios(&self) -> SizeRatios {
        match self {
            LengthMix::Balanced => SizeRatios::default(),
            LengthMix::Short => SizeRatios {
                short: 0.6,
                medium: 0.35,
                long: 0.05,
            },
            LengthMix::Long => SizeRatios {
                short: 0.05,
                medium: 0.35,
                long: 0.6,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AppState {
    Typing,
    Results,
    History,
}

pub struct App {
    pub state: AppState,
    pub typewriter: Typewriter,
    pub metrics: Option<Metrics>,
    pub history: Vec<CompletedStat>,
    pub should_quit: bool,
    number_of_words: usize,
    ratios: SizeRatios,
    custom_prompt: Option<String>,
    bank: WordBank,
    store: FileHistoryStore,
}

impl App {
    pub fn new(cfg: &Config, custom_prompt: Option<String>, store: FileHistoryStore) -> Self {
        let bank = WordBank::embedded();
        let text = custom_prompt.clone().unwrap_or_else(|| {
            bank.random_text(cfg.number_of_words, cfg.ratios, &mut rand::thread_rng())
        });

        let typewriter = Typewriter::with_history(&text, Box::new(store.clone()));

        Self {
            state: AppState::Typing,
            typewriter,
            metrics: None,
            history: Vec::new(),
            should_quit: false,
            number_of_words: cfg.number_of_words,
            ratios: cfg.ratios,
            custom_prompt,
            bank,
            store,
        }
    }

    pub fn new_session(&mut self) {
        let text = self.custom_prompt.clone().unwrap_or_else(|| {
            self.bank
                .random_text(self.number_of_words, self.ratios, &mut rand::thread_rng())
        });

        self.typewriter.reset(&text);
        self.metrics = None;
        self.state = AppState::Typing;
    }

    pub fn open_history(&mut self) {
        self.history = self.store.load();
        self.state = AppState::History;
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            self.should_quit = true;
            return;
        }

        match self.state {
            AppState::Typing => match key.code {
                KeyCode::Esc => self.should_quit = true,
                KeyCode::Backspace => self.typewriter.backspace(),
                KeyCode::Enter => self.typewriter.write(Key::Enter),
                KeyCode::Char(c) => self.typewriter.write(Key::Char(c)),
                _ => {}
            },
            AppState::Results => match key.code {
                KeyCode::Esc => self.should_quit = true,
                KeyCode::Char('r') => self.new_session(),
                KeyCode::Char('h') => self.open_history(),
                _ => {}
            },
            AppState::History => match key.code {
                KeyCode::Esc => self.should_quit = true,
                KeyCode::Char('b') => {
                    if self.metrics.is_some() {
                        self.state = AppState::Results;
                    } else {
                        self.should_quit = true;
                    }
                }
                KeyCode::Char('r') => self.new_session(),
                _ => {}
            },
        }

        // the tracker persisted its snapshot the instant it ended; the app
        // only has to swap screens
        if self.state == AppState::Typing && self.typewriter.has_ended() {
            self.finish_session();
        }
    }

    fn finish_session(&mut self) {
        self.metrics = Some(self.typewriter.snapshot().metrics());
        self.history = self.store.load();
        self.state = AppState::Results;
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    if !stdin().is_tty() {
        Cli::command()
            .error(ErrorKind::Io, "klack must be run in a terminal")
            .exit();
    }

    let config_store = FileConfigStore::new();
    let mut cfg = config_store.load();
    if let Some(n) = cli.number_of_words {
        cfg.number_of_words = n;
    }
    if let Some(mix) = cli.mix {
        cfg.ratios = mix.as_ratios();
    }
    let _ = config_store.save(&cfg);

    let mut app = App::new(&cfg, cli.prompt, FileHistoryStore::new());
    if cli.history {
        app.open_history();
    }

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal, &mut app);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn run_app<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<(), Box<dyn Error>> {
    let runner = Runner::new(
        TermEventSource::new(),
        Duration::from_millis(TICK_RATE_MS),
    );

    loop {
        terminal.draw(|f| f.render_widget(&*app, f.area()))?;

        match runner.step() {
            AppEvent::Key(key) => app.handle_key(key),
            AppEvent::Resize | AppEvent::Tick => {}
        }

        if app.should_quit {
            return Ok(());
        }
    }
}
