pub(crate) mod typeahead;

use color_eyre::eyre::Result;

use crate::{actions::Action, page::WidgetExt};

pub(crate) trait Component: WidgetExt {
    fn get_id(&self) -> u64;

    /// Translate a terminal event into actions. Only called while the
    /// component holds focus.
    fn handle_events(&self, event: &crate::tui::Event) -> Result<()>;

    fn update(&mut self, action: &Action) -> Result<()>;
}
