use std::ops::Deref;

use ratatui::{
    Frame,
    layout::Rect,
    widgets::{Block, BorderType, Borders, Padding, Paragraph},
};

use super::key_events::KeyEvent;

#[derive(Debug, Clone)]
enum HelpKey {
    Key(KeyEvent),
    Plain(String),
}

/// One `description: key` pair of the help line.
#[derive(Debug, Clone)]
pub(crate) struct HelpEntry {
    key: HelpKey,
    desc: String,
}

impl HelpEntry {
    pub(crate) fn new<T: Into<String>, K: Into<KeyEvent>>(event: K, desc: T) -> Self {
        Self {
            key: HelpKey::Key(event.into()),
            desc: desc.into(),
        }
    }

    /// For key groups that are not a single key, like `up/down`.
    pub(crate) fn new_plain<K: Into<String>, T: Into<String>>(keys: K, desc: T) -> Self {
        Self {
            key: HelpKey::Plain(keys.into()),
            desc: desc.into(),
        }
    }

    pub(crate) fn key(&self) -> String {
        match &self.key {
            HelpKey::Key(key) => key.to_string(),
            HelpKey::Plain(key) => key.clone(),
        }
    }

    pub(crate) fn desc(&self) -> &str {
        &self.desc
    }
}

impl std::fmt::Display for HelpEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.desc(), self.key())
    }
}

#[derive(Default, Clone, Debug)]
pub(crate) struct HelpMsg {
    entries: Vec<HelpEntry>,
}

impl From<Vec<HelpEntry>> for HelpMsg {
    fn from(entries: Vec<HelpEntry>) -> Self {
        Self { entries }
    }
}

impl HelpMsg {
    pub(crate) fn extend(&mut self, other: &HelpMsg) {
        self.entries.extend(other.entries.iter().cloned());
    }

    pub(crate) fn push(&mut self, entry: HelpEntry) {
        self.entries.push(entry);
    }

    pub(crate) fn render(&self, frame: &mut Frame, area: Rect) {
        let paragraph = Paragraph::new(self.to_string()).block(
            Block::default()
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .padding(Padding::horizontal(1)),
        );
        frame.render_widget(paragraph, area);
    }
}

impl Deref for HelpMsg {
    type Target = [HelpEntry];

    fn deref(&self) -> &Self::Target {
        &self.entries
    }
}

impl std::fmt::Display for HelpMsg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let joined = self
            .entries
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" | ");
        f.write_str(&joined)
    }
}
