use std::fmt::Display;
use std::io::IsTerminal;

use nu_ansi_term::{Color, Style};
use tagql::diagnostics::{Diagnostic, Severity};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Theme {
    Auto,
    Light,
    Dark,
    Plain,
}

/// Text-mode printer. Styles are only applied when stdout is a terminal.
pub struct Ui {
    styles: Option<Styles>,
}

impl Ui {
    pub fn new(theme: Theme) -> Self {
        if theme == Theme::Plain || !std::io::stdout().is_terminal() {
            return Self { styles: None };
        }

        #[cfg(windows)]
        let _ = nu_ansi_term::enable_ansi_support();

        Self {
            styles: Some(Styles::for_theme(theme)),
        }
    }

    /// Aligned `key: value` rows under a heading.
    pub fn section<'a, I, V>(&self, title: &str, rows: I)
    where
        I: IntoIterator<Item = (&'a str, V)>,
        V: Display,
    {
        let rows: Vec<(&str, String)> = rows.into_iter().map(|(k, v)| (k, v.to_string())).collect();
        let Some(width) = rows.iter().map(|(k, _)| k.chars().count()).max() else {
            return;
        };
        self.heading(title);
        for (key, value) in rows {
            let key = format!("{key:>width$}:");
            match &self.styles {
                Some(styles) => println!("  {} {value}", styles.label.paint(key)),
                None => println!("  {key} {value}"),
            }
        }
    }

    /// Bulleted entries under a heading. Nothing is printed for an empty list.
    pub fn list<I>(&self, title: &str, entries: I)
    where
        I: IntoIterator<Item = String>,
    {
        let mut entries = entries.into_iter().peekable();
        if entries.peek().is_none() {
            return;
        }
        self.heading(title);
        for entry in entries {
            match &self.styles {
                Some(styles) => println!("  {} {entry}", styles.bullet.paint("•")),
                None => println!("  - {entry}"),
            }
        }
    }

    pub fn diagnostics(&self, diagnostics: &[Diagnostic]) {
        if diagnostics.is_empty() {
            return;
        }
        self.heading("Diagnostics");
        for diagnostic in diagnostics {
            match &self.styles {
                Some(styles) => {
                    let style = match diagnostic.severity {
                        Severity::Warning => styles.warning,
                        Severity::Error => styles.error,
                    };
                    println!("  {}", style.paint(diagnostic.to_string()));
                }
                None => println!("  {diagnostic}"),
            }
        }
    }

    pub fn info(&self, message: &str) {
        match &self.styles {
            Some(styles) => println!("{}", styles.muted.paint(message)),
            None => println!("{message}"),
        }
    }

    pub fn failure(&self, message: &str) {
        match &self.styles {
            Some(styles) => eprintln!("{} {message}", styles.error.paint("error:")),
            None => eprintln!("error: {message}"),
        }
    }

    fn heading(&self, title: &str) {
        match &self.styles {
            Some(styles) => println!("{}", styles.heading.paint(format!("▸ {title}"))),
            None => println!("▸ {title}"),
        }
    }
}

struct Styles {
    heading: Style,
    label: Style,
    bullet: Style,
    muted: Style,
    warning: Style,
    error: Style,
}

impl Styles {
    fn for_theme(theme: Theme) -> Self {
        let (accent, label, muted, error) = match theme {
            Theme::Light => (Color::Blue, Color::Black, Color::DarkGray, Color::Red),
            _ => (Color::Purple, Color::LightBlue, Color::LightGray, Color::LightRed),
        };
        Self {
            heading: Style::new().fg(accent).bold(),
            label: Style::new().fg(label).bold(),
            bullet: Style::new().fg(accent),
            muted: Style::new().fg(muted).italic(),
            warning: Style::new().fg(Color::Yellow).bold(),
            error: Style::new().fg(error).bold(),
        }
    }
}
