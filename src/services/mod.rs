pub mod autostart;
pub mod clock;
pub mod controller;
pub mod error;
pub mod locale;
#[cfg(windows)]
pub mod registry;
pub mod settings;
pub mod ticker;
