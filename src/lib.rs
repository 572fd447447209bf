//! Core of the visual-break reminder: persisted settings, the reminder clock
//! and the controller the shell drives.

pub mod services;

pub use services::{
    clock::{ClockPhase, ReminderClock, ReminderFired},
    controller::{LaunchDirectives, MenuSnapshot, ReminderController, ReminderSink, ShellCommand, Status},
    error::PersistenceError,
    locale::Language,
    settings::{Settings, SettingsService},
};
