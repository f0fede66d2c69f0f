//! Pages own the widgets shown on screen and route events and actions to them.

use color_eyre::eyre::Result;
use ratatui::Frame;
use ratatui::layout::Rect;

use crate::{actions::Action, tui::Event};

pub(crate) mod form;

/// Something that draws itself into an area of the frame.
pub(crate) trait WidgetExt {
    fn render(&mut self, frame: &mut Frame, area: Rect);
}

/// A participant of the event loop: turns events into actions, then applies
/// the actions that come back.
pub(crate) trait EventLoopParticipant {
    fn handle_events(&mut self, event: &Event) -> Result<()>;

    fn update(&mut self, action: Action) -> Result<()>;
}

/// A full screen page.
pub(crate) trait Page: WidgetExt + EventLoopParticipant {
    /// Called once before the first event is delivered
    fn init(&mut self) {}

    fn get_name(&self) -> String;
}
