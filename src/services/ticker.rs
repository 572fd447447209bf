use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::debug;

use super::controller::ReminderController;

pub const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Spawns the single background loop that drives the reminder clock.
///
/// The thread lives for the whole session: while reminders are paused it keeps
/// sleeping without advancing anything, and it exits on the first tick after
/// the controller turns terminal.
pub fn spawn(controller: Arc<ReminderController>, period: Duration) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("reminder-ticker".into())
        .spawn(move || {
            loop {
                thread::sleep(period);
                if !controller.advance_second() {
                    break;
                }
            }
            debug!("reminder ticker stopped");
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::clock::ReminderFired;
    use crate::services::controller::ReminderSink;
    use crate::services::locale::Strings;
    use crate::services::settings::{MemoryBackend, SettingsService, StoredValue, KEY_REMINDER_TIME};
    use std::sync::mpsc::{self, Sender};
    use std::sync::Mutex;

    struct ChannelSink(Mutex<Sender<ReminderFired>>);

    impl ReminderSink for ChannelSink {
        fn remind(&self, _strings: &'static Strings, event: ReminderFired) {
            let _ = self.0.lock().unwrap().send(event);
        }
    }

    fn one_minute_controller() -> (Arc<ReminderController>, mpsc::Receiver<ReminderFired>) {
        let backend = MemoryBackend::new();
        backend.insert(KEY_REMINDER_TIME, StoredValue::Bytes(vec![1]));
        let (tx, rx) = mpsc::channel();
        let controller = Arc::new(ReminderController::new(
            SettingsService::with_backend(backend),
            Arc::new(ChannelSink(Mutex::new(tx))),
        ));
        (controller, rx)
    }

    #[test]
    fn ticker_delivers_reminders() {
        let (controller, rx) = one_minute_controller();
        controller.start_reminders();

        let handle = spawn(controller.clone(), Duration::from_millis(1)).unwrap();

        let event = rx.recv_timeout(Duration::from_secs(10)).expect("reminder");
        assert_eq!(event.interval_minutes, 1);

        controller.quit();
        handle.join().unwrap();
    }

    #[test]
    fn paused_ticker_keeps_running_without_firing() {
        let (controller, rx) = one_minute_controller();

        let handle = spawn(controller.clone(), Duration::from_millis(1)).unwrap();
        assert!(rx.recv_timeout(Duration::from_millis(300)).is_err());
        assert!(!handle.is_finished());

        controller.quit();
        handle.join().unwrap();
    }
}
