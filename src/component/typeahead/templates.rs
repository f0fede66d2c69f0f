use std::sync::Arc;

use ratatui::{
    style::{Color, Style, Stylize},
    text::Line,
};

pub type ItemTemplate<T> = Arc<dyn Fn(&T) -> Line<'static> + Send + Sync>;
pub type NotFoundTemplate = Arc<dyn Fn(&str) -> Line<'static> + Send + Sync>;
pub type FooterTemplate<T> = Arc<dyn Fn(&[T]) -> Line<'static> + Send + Sync>;

/// The render collaborators of a typeahead field.
///
/// The widget only picks which one to call and with what; how an item looks
/// is up to the host.
pub(crate) struct Templates<T> {
    pub result: ItemTemplate<T>,
    pub selected: ItemTemplate<T>,
    pub not_found: NotFoundTemplate,
    pub footer: Option<FooterTemplate<T>>,
}

pub(crate) fn default_not_found() -> NotFoundTemplate {
    Arc::new(|query: &str| {
        Line::styled(
            format!("No results for \"{query}\""),
            Style::default().fg(Color::DarkGray),
        )
        .italic()
    })
}
