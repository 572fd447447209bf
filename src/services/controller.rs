use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, trace, warn};

use super::clock::{ReminderClock, ReminderFired};
use super::locale::{Language, Strings, INTERVAL_PRESETS};
use super::settings::{Settings, SettingsService};

/// Receives reminders as the clock fires. Implemented by the shell.
///
/// `strings` is the table of the session language, so the sink can label the
/// reminder and its sender consistently with the menu.
pub trait ReminderSink: Send + Sync {
    fn remind(&self, strings: &'static Strings, event: ReminderFired);
}

/// Launch tokens, order-independent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LaunchDirectives {
    pub force_start: bool,
    pub autostart_aware: bool,
}

impl LaunchDirectives {
    pub const FORCE_START: &'static str = "force-start";
    pub const AUTO_START: &'static str = "auto-start";

    pub fn from_args<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut directives = Self::default();
        for arg in args {
            match arg.as_ref() {
                Self::FORCE_START => directives.force_start = true,
                Self::AUTO_START => directives.autostart_aware = true,
                other => debug!(arg = other, "ignoring unknown launch argument"),
            }
        }
        directives
    }

    /// Runs unless the launch is autostart-aware and autostart is disabled.
    /// A forced launch always runs.
    pub fn should_run(&self, autostart_enabled: bool) -> bool {
        self.force_start || !self.autostart_aware || autostart_enabled
    }
}

/// Answer to an info request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Remaining(u32),
    Off,
}

impl Status {
    pub fn message(&self, strings: &Strings) -> String {
        match self {
            Status::Remaining(minutes) => format!("{minutes} {}", strings.minutes_left),
            Status::Off => strings.reminders_off.to_string(),
        }
    }
}

/// Process-level action the shell must carry out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    /// Tear down and relaunch the executable with these arguments.
    Restart { args: Vec<String> },
    Exit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuChoice<T> {
    pub value: T,
    pub label: String,
    pub checked: bool,
}

/// Everything the shell needs to render the menu, pulled on every render.
#[derive(Debug, Clone)]
pub struct MenuSnapshot {
    pub language: Language,
    pub strings: &'static Strings,
    pub reminders_paused: bool,
    pub autostart_enabled: bool,
    pub interval_minutes: u32,
    pub intervals: Vec<MenuChoice<u32>>,
    pub languages: Vec<MenuChoice<Language>>,
}

struct ReminderState {
    store: SettingsService,
    settings: Settings,
    clock: ReminderClock,
    terminated: bool,
}

impl ReminderState {
    fn persist(&mut self) {
        if let Err(err) = self.store.save(&self.settings) {
            warn!(%err, "settings not fully saved");
        }
    }
}

/// Applies menu actions to the settings and the clock.
///
/// One mutex serializes the UI thread and the ticker. Persistence happens under
/// that lock so consecutive clicks are written in order.
pub struct ReminderController {
    state: Mutex<ReminderState>,
    sink: Arc<dyn ReminderSink>,
}

impl ReminderController {
    /// Loads settings from `store`. The clock starts stopped.
    pub fn new(mut store: SettingsService, sink: Arc<dyn ReminderSink>) -> Self {
        let settings = store.load();
        Self {
            state: Mutex::new(ReminderState {
                store,
                clock: ReminderClock::new(settings.reminder_interval_minutes),
                settings,
                terminated: false,
            }),
            sink,
        }
    }

    // The state stays consistent after every mutation, so a poisoned lock is
    // still usable.
    fn lock(&self) -> MutexGuard<'_, ReminderState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Lock for a mutating action; `None` once the controller is terminal.
    fn lock_live(&self, action: &str) -> Option<MutexGuard<'_, ReminderState>> {
        let state = self.lock();
        if state.terminated {
            debug!(action, "ignoring action after shutdown");
            return None;
        }
        Some(state)
    }

    pub fn settings(&self) -> Settings {
        self.lock().settings
    }

    pub fn should_run(&self, directives: &LaunchDirectives) -> bool {
        let autostart_enabled = self.lock().settings.autostart_enabled;
        let run = directives.should_run(autostart_enabled);
        info!(?directives, autostart_enabled, run, "startup gate");
        run
    }

    pub fn is_running(&self) -> bool {
        self.lock().clock.is_running()
    }

    pub fn is_terminated(&self) -> bool {
        self.lock().terminated
    }

    /// Starts a fresh countdown with the configured interval.
    pub fn start_reminders(&self) {
        let Some(mut state) = self.lock_live("start") else {
            return;
        };
        let interval = state.settings.reminder_interval_minutes;
        state.clock.start(interval);
        info!(interval, "reminders started");
    }

    /// Stops the countdown. Resuming later starts again from zero.
    pub fn pause_reminders(&self) {
        let Some(mut state) = self.lock_live("pause") else {
            return;
        };
        if state.clock.is_running() {
            state.clock.stop();
            info!("reminders paused");
        }
    }

    pub fn toggle_break(&self) {
        let Some(mut state) = self.lock_live("toggle break") else {
            return;
        };
        if state.clock.is_running() {
            state.clock.stop();
            info!("reminders paused");
        } else {
            let interval = state.settings.reminder_interval_minutes;
            state.clock.start(interval);
            info!(interval, "reminders resumed");
        }
    }

    pub fn info(&self) -> Status {
        match self.lock().clock.time_remaining() {
            Some(minutes) => Status::Remaining(minutes),
            None => Status::Off,
        }
    }

    /// `info()` rendered in the current language.
    pub fn status_message(&self) -> String {
        let language = self.lock().settings.language;
        self.info().message(language.strings())
    }

    /// Flips and persists the autostart flag. The running clock is untouched.
    pub fn toggle_autostart(&self) {
        let Some(mut state) = self.lock_live("toggle autostart") else {
            return;
        };
        state.settings.autostart_enabled = !state.settings.autostart_enabled;
        info!(enabled = state.settings.autostart_enabled, "autostart toggled");
        state.persist();
    }

    /// Persists the interval and restarts the live countdown against it.
    pub fn set_interval(&self, minutes: u32) {
        if minutes == 0 {
            warn!("ignoring zero reminder interval");
            return;
        }
        let Some(mut state) = self.lock_live("set interval") else {
            return;
        };
        state.settings.reminder_interval_minutes = minutes;
        state.persist();
        state.clock.change_interval(minutes);
        info!(minutes, "reminder interval changed");
    }

    /// Persists the language and asks the shell to relaunch with `force-start`
    /// so every label is rebuilt. The controller is terminal afterwards.
    pub fn set_language(&self, language: Language) -> Option<ShellCommand> {
        let mut state = self.lock_live("set language")?;
        state.settings.language = language;
        state.persist();
        state.clock.stop();
        state.terminated = true;
        info!(%language, "language changed, requesting restart");
        Some(ShellCommand::Restart {
            args: vec![LaunchDirectives::FORCE_START.to_string()],
        })
    }

    pub fn quit(&self) -> ShellCommand {
        let mut state = self.lock();
        state.clock.stop();
        state.terminated = true;
        info!("shutting down");
        ShellCommand::Exit
    }

    pub fn snapshot(&self) -> MenuSnapshot {
        let state = self.lock();
        let settings = state.settings;
        let strings = settings.language.strings();
        MenuSnapshot {
            language: settings.language,
            strings,
            reminders_paused: !state.clock.is_running(),
            autostart_enabled: settings.autostart_enabled,
            interval_minutes: settings.reminder_interval_minutes,
            intervals: INTERVAL_PRESETS
                .iter()
                .zip(strings.presets)
                .map(|(&value, label)| MenuChoice {
                    value,
                    label: label.to_string(),
                    checked: value == settings.reminder_interval_minutes,
                })
                .collect(),
            languages: Language::ALL
                .iter()
                .map(|&value| MenuChoice {
                    value,
                    label: value.display_name(strings).to_string(),
                    checked: value == settings.language,
                })
                .collect(),
        }
    }

    /// One second of wall-clock time. Returns `false` once the controller is
    /// terminal so the ticker can exit.
    pub fn advance_second(&self) -> bool {
        self.advance(ReminderClock::tick_second)
    }

    /// One whole minute boundary.
    pub fn advance_minute(&self) -> bool {
        self.advance(ReminderClock::tick_minute)
    }

    fn advance(&self, tick: fn(&mut ReminderClock) -> Option<ReminderFired>) -> bool {
        let (fired, language) = {
            let mut state = self.lock();
            if state.terminated {
                return false;
            }
            (tick(&mut state.clock), state.settings.language)
        };
        if let Some(event) = fired {
            info!(interval = event.interval_minutes, "reminder fired");
            self.sink.remind(language.strings(), event);
        } else {
            trace!("tick");
        }
        true
    }
}
