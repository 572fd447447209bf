use anyhow::{bail, Context, Result};
use notify_rust::Notification;
use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use visual_break::services::{
    autostart::LoginItem,
    clock::ReminderFired,
    controller::{LaunchDirectives, MenuSnapshot, ReminderController, ReminderSink, ShellCommand},
    locale::{Language, Strings},
    settings::{data_dir, SettingsService},
    ticker::{self, TICK_PERIOD},
};

const LOG_FILE_NAME: &str = "visual-break.log";

/// Shows reminders as desktop notifications, under the localized app name.
struct DesktopNotifier;

impl ReminderSink for DesktopNotifier {
    fn remind(&self, strings: &'static Strings, _event: ReminderFired) {
        println!("{}", strings.reminder_title);
        if let Err(err) = Notification::new()
            .summary(strings.reminder_title)
            .appname(strings.app_name)
            .show()
        {
            warn!(%err, "failed to show reminder notification");
        }
    }
}

/// A menu action typed on stdin.
#[derive(Debug, PartialEq, Eq)]
enum ConsoleCommand {
    Info,
    ToggleBreak,
    ToggleAutostart,
    SetInterval(u32),
    SetLanguage(Language),
    Menu,
    Quit,
}

fn parse_command(line: &str) -> Result<ConsoleCommand> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        bail!("empty command");
    };
    let command = match verb {
        "info" => ConsoleCommand::Info,
        "pause" | "resume" => ConsoleCommand::ToggleBreak,
        "autostart" => ConsoleCommand::ToggleAutostart,
        "interval" => {
            let value = words.next().context("usage: interval <minutes>")?;
            let minutes: u32 = value
                .parse()
                .with_context(|| format!("invalid interval {value:?}"))?;
            if minutes == 0 {
                bail!("interval must be positive");
            }
            ConsoleCommand::SetInterval(minutes)
        }
        "lang" => {
            let code = words.next().context("usage: lang <en|fr>")?;
            let language = Language::from_code(code)
                .with_context(|| format!("unsupported language {code:?}"))?;
            ConsoleCommand::SetLanguage(language)
        }
        "menu" => ConsoleCommand::Menu,
        "quit" | "stop" => ConsoleCommand::Quit,
        other => bail!("unknown command {other:?}"),
    };
    Ok(command)
}

fn check_box(checked: bool) -> &'static str {
    if checked {
        "[x]"
    } else {
        "[ ]"
    }
}

fn render_menu(snapshot: &MenuSnapshot) -> String {
    let s = snapshot.strings;
    let intervals: Vec<String> = snapshot
        .intervals
        .iter()
        .map(|c| format!("{} {}", check_box(c.checked), c.label))
        .collect();
    let languages: Vec<String> = snapshot
        .languages
        .iter()
        .map(|c| format!("{} {}", check_box(c.checked), c.label))
        .collect();
    format!(
        "{app}\n  {time_left} (info)\n  {paused} {pause} (pause)\n  {settings}\n    {autostart} {automatic} (autostart)\n    {reminder_time}: {current} (interval <minutes>)\n      {intervals}\n    {language} (lang <en|fr>)\n      {languages}\n  {stop} (quit)",
        app = s.app_name,
        time_left = s.time_left,
        paused = check_box(snapshot.reminders_paused),
        pause = s.pause_reminders,
        settings = s.settings,
        autostart = check_box(snapshot.autostart_enabled),
        automatic = s.automatic_start,
        reminder_time = s.reminder_time,
        current = s.interval_label(snapshot.interval_minutes),
        intervals = intervals.join("  "),
        language = s.language,
        languages = languages.join("  "),
        stop = s.stop,
    )
}

/// Runs menu actions until one of them ends the session. `None` means input
/// ended and the reminders keep running headless.
///
/// Lines are decoded lossily, so stray bytes only produce an unknown command.
fn run_console(controller: &ReminderController, mut input: impl BufRead) -> Option<ShellCommand> {
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match input.read_until(b'\n', &mut buf) {
            Ok(0) => return None,
            Ok(_) => {}
            Err(err) => {
                warn!(%err, "console input failed, running headless");
                return None;
            }
        }
        let line = String::from_utf8_lossy(&buf);
        if line.trim().is_empty() {
            continue;
        }
        let command = match parse_command(&line) {
            Ok(command) => command,
            Err(err) => {
                println!("{err:#}");
                continue;
            }
        };
        match command {
            ConsoleCommand::Info => println!("{}", controller.status_message()),
            ConsoleCommand::ToggleBreak => controller.toggle_break(),
            ConsoleCommand::ToggleAutostart => controller.toggle_autostart(),
            ConsoleCommand::SetInterval(minutes) => controller.set_interval(minutes),
            ConsoleCommand::SetLanguage(language) => {
                if let Some(command) = controller.set_language(language) {
                    return Some(command);
                }
            }
            ConsoleCommand::Menu => println!("{}", render_menu(&controller.snapshot())),
            ConsoleCommand::Quit => return Some(controller.quit()),
        }
        io::stdout().flush().ok();
    }
}

/// The relaunched process gets no stdin: it must not read from a terminal it
/// no longer owns once this process exits.
fn relaunch_command(exe: &Path, args: &[String]) -> Command {
    let mut command = Command::new(exe);
    command.args(args).stdin(Stdio::null());
    command
}

fn relaunch(args: &[String]) -> Result<()> {
    let exe = std::env::current_exe().context("failed to locate current executable")?;
    relaunch_command(&exe, args)
        .spawn()
        .with_context(|| format!("failed to relaunch {}", exe.display()))?;
    info!(exe = %exe.display(), ?args, "relaunched");
    Ok(())
}

fn register_login_item(app_name: &str) {
    let path = match std::env::current_exe() {
        Ok(path) => path,
        Err(err) => {
            warn!(%err, "cannot resolve executable path for login item");
            return;
        }
    };
    let item = LoginItem::new(app_name, path.to_string_lossy());
    if let Err(err) = item.ensure_registered() {
        warn!(%err, "failed to register login item");
    }
}

/// Logs go to a file because autostart launches have no console.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let folder = data_dir();
    let log_path = folder.join(LOG_FILE_NAME);
    let file = fs::create_dir_all(&folder)
        .and_then(|()| OpenOptions::new().create(true).append(true).open(&log_path));

    match file {
        Ok(file) => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .init(),
        Err(err) => {
            eprintln!("failed to open log file {}: {err}", log_path.display());
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(io::stderr)
                .init();
        }
    }
}

fn main() -> Result<()> {
    init_logging();

    let directives = LaunchDirectives::from_args(std::env::args().skip(1));
    let controller = Arc::new(ReminderController::new(
        SettingsService::new(),
        Arc::new(DesktopNotifier),
    ));

    if !controller.should_run(&directives) {
        info!("autostart disabled, not starting");
        return Ok(());
    }

    // The login entry keeps one stable name whatever the language.
    register_login_item(Language::En.strings().app_name);
    controller.start_reminders();
    let ticker = ticker::spawn(controller.clone(), TICK_PERIOD)
        .context("failed to start reminder ticker")?;

    println!("{}", render_menu(&controller.snapshot()));

    match run_console(&controller, io::stdin().lock()) {
        Some(ShellCommand::Restart { args }) => relaunch(&args)?,
        Some(ShellCommand::Exit) => {}
        None => info!("stdin closed, running headless"),
    }

    if ticker.join().is_err() {
        error!("reminder ticker panicked");
    }
    Ok(())
}
