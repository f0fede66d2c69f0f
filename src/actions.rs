use tracing::warn;

use crate::{
    component::typeahead::TypeaheadAction,
    focus::{ElementRef, Gesture},
    page::form::FormAction,
};

#[derive(Clone, Debug)]
pub enum Action {
    Tick,
    Render,
    Quit,

    /// Move keyboard focus to an element
    Focus(ElementRef),
    /// A gesture outside the owner's boundary, delivered by the gesture hub
    OutsideGesture {
        owner: u64,
        gesture: Gesture,
    },

    Form(FormAction),

    Comp((CompAction, u64)),
}

#[derive(Clone, Debug)]
pub enum CompAction {
    Typeahead(TypeaheadAction),
}

impl From<(CompAction, u64)> for Action {
    fn from(value: (CompAction, u64)) -> Self {
        Action::Comp(value)
    }
}

#[derive(Clone, Debug)]
pub struct ActionSender(pub tokio::sync::mpsc::UnboundedSender<Action>);

impl ActionSender {
    /// Queue an action for the event loop.
    ///
    /// Background tasks may outlive the loop during shutdown, so a closed
    /// channel is logged instead of treated as fatal.
    pub fn send<T: Into<Action>>(&self, action: T) {
        if let Err(err) = self.0.send(action.into()) {
            warn!("Action receiver is closed, dropping {:?}", err.0);
        }
    }
}
impl From<tokio::sync::mpsc::UnboundedSender<Action>> for ActionSender {
    fn from(value: tokio::sync::mpsc::UnboundedSender<Action>) -> Self {
        ActionSender(value)
    }
}
