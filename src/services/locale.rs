//! Supported languages and the display strings the shell renders.

use std::fmt;

/// UI language. Persisted as its two-letter code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Language {
    #[default]
    En,
    Fr,
}

impl Language {
    pub const ALL: [Language; 2] = [Language::En, Language::Fr];

    pub fn code(self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Fr => "fr",
        }
    }

    /// Parse a persisted code. Anything but an exact supported code is rejected.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "en" => Some(Language::En),
            "fr" => Some(Language::Fr),
            _ => None,
        }
    }

    pub fn strings(self) -> &'static Strings {
        match self {
            Language::En => &EN,
            Language::Fr => &FR,
        }
    }

    /// Name of this language as shown in the language submenu.
    pub fn display_name(self, strings: &Strings) -> &'static str {
        match self {
            Language::En => strings.english,
            Language::Fr => strings.french,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Reminder intervals offered in the menu, in minutes.
pub const INTERVAL_PRESETS: [u32; 6] = [10, 20, 30, 45, 60, 120];

/// Fixed per-locale string table, in menu order.
#[derive(Debug)]
pub struct Strings {
    pub minutes_left: &'static str,
    pub reminders_off: &'static str,
    pub reminder_title: &'static str,
    pub time_left: &'static str,
    pub pause_reminders: &'static str,
    pub settings: &'static str,
    pub automatic_start: &'static str,
    pub reminder_time: &'static str,
    pub presets: [&'static str; INTERVAL_PRESETS.len()],
    pub language: &'static str,
    pub english: &'static str,
    pub french: &'static str,
    pub stop: &'static str,
    pub app_name: &'static str,
}

impl Strings {
    /// Label for a preset interval, falling back to "<n>min" for custom values.
    pub fn interval_label(&self, minutes: u32) -> String {
        INTERVAL_PRESETS
            .iter()
            .position(|&p| p == minutes)
            .map(|i| self.presets[i].to_string())
            .unwrap_or_else(|| format!("{minutes}min"))
    }
}

static EN: Strings = Strings {
    minutes_left: "minutes left before the next reminder",
    reminders_off: "Reminders are deactivated for now",
    reminder_title: "Visual break!",
    time_left: "Time left",
    pause_reminders: "Pause the reminders",
    settings: "Settings",
    automatic_start: "Automatic start",
    reminder_time: "Reminders time",
    presets: ["10min", "20min", "30min", "45min", "1h", "2h"],
    language: "Language",
    english: "English",
    french: "Français",
    stop: "Stop",
    app_name: "VisualBreak",
};

static FR: Strings = Strings {
    minutes_left: "minutes restantes avant le prochain rappel",
    reminders_off: "Les rappels sont désactivés pour le moment",
    reminder_title: "Pause visuelle !",
    time_left: "Temps restant",
    pause_reminders: "Mettre en pause les rappels",
    settings: "Paramètres",
    automatic_start: "Démarrage automatique",
    reminder_time: "Temps des rappels",
    presets: ["10min", "20min", "30min", "45min", "1h", "2h"],
    language: "Langue",
    english: "English",
    french: "Français",
    stop: "Stop",
    app_name: "PauseVisuelle",
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_parse_back() {
        for lang in Language::ALL {
            assert_eq!(Language::from_code(lang.code()), Some(lang));
        }
    }

    #[test]
    fn unknown_codes_rejected() {
        assert_eq!(Language::from_code("de"), None);
        assert_eq!(Language::from_code("EN"), None);
        assert_eq!(Language::from_code(""), None);
        assert_eq!(Language::from_code("UNSET"), None);
    }

    #[test]
    fn interval_labels() {
        let s = Language::En.strings();
        assert_eq!(s.interval_label(60), "1h");
        assert_eq!(s.interval_label(120), "2h");
        assert_eq!(s.interval_label(25), "25min");
    }

    #[test]
    fn french_table_is_translated() {
        assert_eq!(Language::Fr.strings().reminder_title, "Pause visuelle !");
        assert_eq!(Language::Fr.display_name(Language::En.strings()), "Français");
    }
}
