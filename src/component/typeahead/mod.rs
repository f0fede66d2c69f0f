//! Typeahead field: type to search, pick one of the suggestions.
//!
//! The widget moves between five observable states (see [`TypeaheadState`]):
//!
//! ```text
//!            type ≥ min            timer fires            results
//!   Idle ───────────────▶ Debouncing ──────────▶ Searching ────────▶ MenuOpen
//!    ▲  ◀─── text cleared ──┘                                        │
//!    │                                                    enter      ▼
//!    └────── clear / escape / focus-out ◀──────────────────────── Selected
//! ```
//!
//! Keystrokes re-arm a single-shot debounce timer; only the tick of the last
//! arm starts a search. Searches run on spawned tasks and report back through
//! the action channel, tagged with a generation number so results of searches
//! that were superseded or abandoned can be recognised.

mod debounce;
mod options;
mod render;
mod search;
mod templates;

use std::sync::Arc;

use color_eyre::eyre::Result;
use crossterm::event::KeyCode;
use ratatui::{text::Line, widgets::ListState};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio_util::sync::DropGuard;
use tracing::{debug, warn};
use tui_input::{Input, InputRequest, backend::crossterm::EventHandler};

pub use options::{FOCUS_SETTLE_DELAY, ResultPolicy, TypeaheadError, TypeaheadOptions};
pub use search::SearchMethod;

use crate::{
    actions::{Action, ActionSender, CompAction},
    focus::{ElementRef, Gesture, GestureHub, GestureSubscription, focus_after_settle},
    form::FieldBinding,
    page::form::FormAction,
    tui::Event,
    utils::{
        help_msg::{HelpEntry, HelpMsg},
        key_events::KeyEvent,
    },
};

use debounce::Debouncer;
use search::{SearchOutcome, run_search};
use templates::{FooterTemplate, ItemTemplate, NotFoundTemplate, Templates, default_not_found};

/// Focusable parts of the field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::IntoStaticStr, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum TypeaheadElement {
    /// The text input, shown while no value is selected
    Input,
    /// The suggestion list
    Menu,
    /// Read-only rendering of the selected value
    Mask,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display)]
pub enum TypeaheadState {
    Idle,
    Debouncing,
    Searching,
    MenuOpen,
    Selected,
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum SearchStatus {
    Ready,
    Failed(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Movement {
    Previous,
    Next,
    First,
    Last,
}

#[derive(Clone, Debug)]
pub enum TypeaheadAction {
    HandleKey(KeyEvent),
    HandlePaste(String),
    DebounceElapsed(u64),
    /// A search task finished and left its outcome in the widget's queue
    SearchSettled,
    ToggleShowAll,
    MoveHighlight(Movement),
    SelectHighlighted,
    /// Close the dropdown and forget the typed text
    Dismiss,
    Clear,
}

#[derive(Clone, Debug)]
pub(crate) struct TypeaheadCtrlKeys {
    show_all: Vec<KeyEvent>,
    select: Vec<KeyEvent>,
    dismiss: Vec<KeyEvent>,
    clear: Vec<KeyEvent>,
}

impl Default for TypeaheadCtrlKeys {
    fn default() -> Self {
        Self {
            show_all: vec![KeyEvent::ctrl(KeyCode::Char(' ')), KeyCode::F(4).into()],
            select: vec![KeyCode::Enter.into()],
            dismiss: vec![
                KeyCode::Esc.into(),
                KeyCode::Backspace.into(),
                KeyCode::Delete.into(),
            ],
            clear: vec![KeyCode::Backspace.into(), KeyCode::Delete.into()],
        }
    }
}

pub(crate) struct TypeaheadBuilder<T> {
    title: String,
    options: TypeaheadOptions,
    search_method: Option<SearchMethod<T>>,
    result_template: Option<ItemTemplate<T>>,
    selected_template: Option<ItemTemplate<T>>,
    not_found_template: Option<NotFoundTemplate>,
    footer_template: Option<FooterTemplate<T>>,
    control_keys: TypeaheadCtrlKeys,
}

impl<T> TypeaheadBuilder<T>
where
    T: Clone + PartialEq + Send + 'static,
{
    pub fn options(mut self, options: TypeaheadOptions) -> Self {
        self.options = options;
        self
    }

    pub fn search_method(mut self, search_method: SearchMethod<T>) -> Self {
        self.search_method = Some(search_method);
        self
    }

    pub fn result_template<F>(mut self, template: F) -> Self
    where
        F: Fn(&T) -> Line<'static> + Send + Sync + 'static,
    {
        self.result_template = Some(Arc::new(template));
        self
    }

    pub fn selected_template<F>(mut self, template: F) -> Self
    where
        F: Fn(&T) -> Line<'static> + Send + Sync + 'static,
    {
        self.selected_template = Some(Arc::new(template));
        self
    }

    pub fn not_found_template<F>(mut self, template: F) -> Self
    where
        F: Fn(&str) -> Line<'static> + Send + Sync + 'static,
    {
        self.not_found_template = Some(Arc::new(template));
        self
    }

    pub fn footer_template<F>(mut self, template: F) -> Self
    where
        F: Fn(&[T]) -> Line<'static> + Send + Sync + 'static,
    {
        self.footer_template = Some(Arc::new(template));
        self
    }

    /// Validate the configuration and mount the field: from here on it
    /// receives outside gestures for `id` until it is dropped.
    pub fn build(
        self,
        id: u64,
        binding: FieldBinding<T>,
        tx: ActionSender,
        gestures: &GestureHub,
    ) -> Result<TypeaheadComp<T>, TypeaheadError> {
        let title = self.title;
        let search_method = self
            .search_method
            .ok_or_else(|| TypeaheadError::MissingSearchMethod(title.clone()))?;
        let result = self
            .result_template
            .ok_or_else(|| TypeaheadError::MissingResultTemplate(title.clone()))?;
        let selected = self
            .selected_template
            .ok_or_else(|| TypeaheadError::MissingSelectedTemplate(title.clone()))?;
        if self.options.maximum_suggestions == 0 {
            return Err(TypeaheadError::NoSuggestionsAllowed(title));
        }

        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();
        let subscription = gestures.subscribe(id, tx.clone());

        Ok(TypeaheadComp {
            id,
            title,
            tx,
            options: self.options,
            search_method,
            templates: Templates {
                result,
                selected,
                not_found: self.not_found_template.unwrap_or_else(default_not_found),
                footer: self.footer_template,
            },
            control_keys: self.control_keys,
            binding,
            input: Input::default(),
            results: Vec::new(),
            list_state: ListState::default(),
            show_menu: false,
            status: SearchStatus::Ready,
            focus: None,
            debouncer: Debouncer::default(),
            pending_focus: None,
            searching: false,
            issued: 0,
            discard_through: 0,
            outcome_tx,
            outcome_rx,
            _gestures: subscription,
        })
    }
}

/// Search-and-select field bound to a form value of type `T`.
///
/// Dropping the field cancels its debounce timer and its gesture
/// subscription. Searches already running are left to finish; their outcome is
/// discarded.
pub(crate) struct TypeaheadComp<T> {
    id: u64,
    title: String,
    tx: ActionSender,
    options: TypeaheadOptions,
    search_method: SearchMethod<T>,
    templates: Templates<T>,
    control_keys: TypeaheadCtrlKeys,
    binding: FieldBinding<T>,

    input: Input,
    results: Vec<T>,
    list_state: ListState,
    show_menu: bool,
    status: SearchStatus,
    focus: Option<TypeaheadElement>,

    debouncer: Debouncer,
    /// Focus move waiting for the settle delay; dropping it calls the move off
    pending_focus: Option<DropGuard>,
    searching: bool,
    /// Generation of the most recently issued search
    issued: u64,
    /// Outcomes up to this generation are dropped unconditionally
    discard_through: u64,
    outcome_tx: UnboundedSender<SearchOutcome<T>>,
    outcome_rx: UnboundedReceiver<SearchOutcome<T>>,
    _gestures: GestureSubscription,
}

impl<T> TypeaheadComp<T>
where
    T: Clone + PartialEq + Send + 'static,
{
    pub fn builder<S: Into<String>>(title: S) -> TypeaheadBuilder<T> {
        TypeaheadBuilder {
            title: title.into(),
            options: TypeaheadOptions::default(),
            search_method: None,
            result_template: None,
            selected_template: None,
            not_found_template: None,
            footer_template: None,
            control_keys: TypeaheadCtrlKeys::default(),
        }
    }

    fn get_action(&self, action: TypeaheadAction) -> Action {
        Action::Comp((CompAction::Typeahead(action), self.id))
    }

    fn send(&self, action: TypeaheadAction) {
        self.tx.send(self.get_action(action));
    }

    pub fn element_ref(&self, element: TypeaheadElement) -> ElementRef {
        ElementRef::new(self.id, element.into())
    }

    /// The element that should hold focus when the field is entered.
    pub fn primary_element(&self) -> TypeaheadElement {
        if self.binding.is_set() {
            TypeaheadElement::Mask
        } else {
            TypeaheadElement::Input
        }
    }

    pub fn primary_element_ref(&self) -> ElementRef {
        self.element_ref(self.primary_element())
    }

    pub fn focused_element(&self) -> Option<TypeaheadElement> {
        self.focus
    }

    pub fn search_text(&self) -> &str {
        self.input.value()
    }

    pub fn results(&self) -> &[T] {
        &self.results
    }

    pub fn is_searching(&self) -> bool {
        self.searching
    }

    pub fn search_failed(&self) -> Option<&str> {
        match &self.status {
            SearchStatus::Failed(message) => Some(message),
            SearchStatus::Ready => None,
        }
    }

    pub fn should_show_input(&self) -> bool {
        !self.binding.is_set()
    }

    pub fn should_show_mask(&self) -> bool {
        self.binding.is_set()
    }

    pub fn should_show_menu(&self) -> bool {
        self.show_menu
    }

    pub fn should_show_suggestions(&self) -> bool {
        self.show_menu && !self.results.is_empty()
    }

    pub fn should_show_not_found(&self) -> bool {
        self.show_menu
            && !self.input.value().trim().is_empty()
            && self.text_len() >= self.options.minimum_length
            && !self.searching
            && !self.debouncer.is_armed()
            && self.results.is_empty()
            && self.status == SearchStatus::Ready
    }

    pub fn state(&self) -> TypeaheadState {
        if self.debouncer.is_armed() {
            TypeaheadState::Debouncing
        } else if self.searching {
            TypeaheadState::Searching
        } else if self.show_menu {
            TypeaheadState::MenuOpen
        } else if !self.input.value().is_empty() {
            TypeaheadState::Debouncing
        } else if self.binding.is_set() {
            TypeaheadState::Selected
        } else {
            TypeaheadState::Idle
        }
    }

    fn text_len(&self) -> usize {
        self.input.value().chars().count()
    }

    /// Run the search method for `text`. The outcome arrives later as
    /// [`TypeaheadAction::SearchSettled`].
    pub fn search(&mut self, text: String) {
        self.issued += 1;
        let generation = self.issued;
        self.searching = true;
        self.status = SearchStatus::Ready;
        debug!(owner = self.id, generation, query = %text, "dispatching search");
        tokio::spawn(run_search(
            self.search_method.clone(),
            text,
            generation,
            self.id,
            self.outcome_tx.clone(),
            self.tx.clone(),
        ));
        self.tx.send(Action::Render);
    }

    /// Commit `item` as the field value.
    pub fn select_result(&mut self, item: T) {
        self.binding.set(Some(item));
        self.notify_field_changed();
        self.reset_search();
        self.settle_focus_on(TypeaheadElement::Mask);
    }

    /// Remove the field value and go back to an empty input.
    pub fn clear(&mut self) {
        self.binding.set(None);
        self.notify_field_changed();
        self.reset_search();
        self.settle_focus_on(TypeaheadElement::Input);
    }

    fn settle_focus_on(&mut self, element: TypeaheadElement) {
        self.pending_focus = Some(focus_after_settle(
            self.tx.clone(),
            self.element_ref(element),
        ));
    }

    fn notify_field_changed(&self) {
        self.tx
            .send(FormAction::FieldChanged(self.binding.name().to_string()));
    }

    fn reset_search(&mut self) {
        self.debouncer.cancel();
        self.input.reset();
        self.results.clear();
        self.list_state.select(None);
        self.show_menu = false;
        self.status = SearchStatus::Ready;
        self.abandon_searches();
    }

    fn abandon_searches(&mut self) {
        self.discard_through = self.issued;
        self.searching = false;
    }

    fn on_text_changed(&mut self) {
        let len = self.text_len();
        if len == 0 {
            self.debouncer.cancel();
            self.results.clear();
            self.list_state.select(None);
            self.show_menu = false;
            self.status = SearchStatus::Ready;
            self.abandon_searches();
        } else if len < self.options.minimum_length {
            self.debouncer.cancel();
        } else {
            let id = self.id;
            self.debouncer
                .arm(self.options.debounce(), self.tx.clone(), |arm| {
                    Action::Comp((
                        CompAction::Typeahead(TypeaheadAction::DebounceElapsed(arm)),
                        id,
                    ))
                });
        }
    }

    fn toggle_show_all(&mut self) {
        if self.show_menu {
            self.show_menu = false;
            self.abandon_searches();
        } else {
            self.debouncer.cancel();
            self.input.reset();
            self.search(String::new());
        }
    }

    fn apply_outcome(&mut self, outcome: SearchOutcome<T>) {
        let SearchOutcome {
            generation,
            query,
            result,
        } = outcome;
        if generation <= self.discard_through {
            debug!(owner = self.id, generation, "dropping outcome of abandoned search");
            return;
        }
        if self.options.result_policy == ResultPolicy::LatestRequest && generation < self.issued {
            debug!(
                owner = self.id,
                generation,
                latest = self.issued,
                "dropping outcome of superseded search"
            );
            return;
        }
        if generation == self.issued {
            self.searching = false;
        }
        match result {
            Ok(mut items) => {
                items.truncate(self.options.maximum_suggestions);
                debug!(owner = self.id, generation, query = %query, count = items.len(), "search completed");
                self.results = items;
                self.status = SearchStatus::Ready;
            }
            Err(err) => {
                warn!(owner = self.id, generation, query = %query, "search failed: {err:#}");
                self.results.clear();
                self.status = SearchStatus::Failed(err.to_string());
            }
        }
        self.list_state.select(None);
        self.show_menu = true;
    }

    fn move_highlight(&mut self, movement: Movement) {
        let Some(last) = self.results.len().checked_sub(1) else {
            self.list_state.select(None);
            return;
        };
        let next = match (movement, self.list_state.selected()) {
            (Movement::First, _) | (Movement::Next, None) => 0,
            (Movement::Last, _) | (Movement::Previous, None) => last,
            (Movement::Next, Some(i)) => (i + 1).min(last),
            (Movement::Previous, Some(i)) => i.saturating_sub(1),
        };
        self.list_state.select(Some(next));
    }

    fn on_outside_gesture(&mut self, gesture: Gesture) {
        if gesture == Gesture::FocusOut {
            self.pending_focus = None;
        }
        let reset = match gesture {
            Gesture::Escape => self.show_menu,
            // leaving the field forgets whatever was typed
            Gesture::FocusOut => {
                self.show_menu || self.searching || !self.input.value().is_empty()
            }
        };
        if reset {
            debug!(owner = self.id, %gesture, "outside gesture resets field");
            self.reset_search();
        }
    }

    fn apply(&mut self, action: TypeaheadAction) {
        match action {
            TypeaheadAction::HandleKey(key) => {
                let changed = self
                    .input
                    .handle_event(&crossterm::event::Event::Key(key.into()));
                if changed.is_some_and(|state| state.value) {
                    self.on_text_changed();
                }
            }
            TypeaheadAction::HandlePaste(text) => {
                let mut changed = false;
                for c in text.chars() {
                    changed |= self.input.handle(InputRequest::InsertChar(c)).is_some();
                }
                if changed {
                    self.on_text_changed();
                }
            }
            TypeaheadAction::DebounceElapsed(arm) => {
                if self.debouncer.fire(arm) {
                    let text = self.input.value().to_string();
                    self.search(text);
                }
            }
            TypeaheadAction::SearchSettled => {
                while let Ok(outcome) = self.outcome_rx.try_recv() {
                    self.apply_outcome(outcome);
                }
            }
            TypeaheadAction::ToggleShowAll => self.toggle_show_all(),
            TypeaheadAction::MoveHighlight(movement) => self.move_highlight(movement),
            TypeaheadAction::SelectHighlighted => {
                let item = self
                    .list_state
                    .selected()
                    .and_then(|i| self.results.get(i))
                    .cloned();
                if let Some(item) = item {
                    self.select_result(item);
                }
            }
            TypeaheadAction::Dismiss => {
                self.reset_search();
                self.settle_focus_on(self.primary_element());
            }
            TypeaheadAction::Clear => self.clear(),
        }
        self.tx.send(Action::Render);
    }

    /// Down opens the suggestion list if there is one, otherwise lists
    /// everything when nothing has been typed.
    fn handle_down(&self) {
        if self.should_show_suggestions() {
            self.tx
                .send(Action::Focus(self.element_ref(TypeaheadElement::Menu)));
            self.send(TypeaheadAction::MoveHighlight(Movement::First));
        } else if !self.show_menu && self.input.value().is_empty() {
            self.send(TypeaheadAction::ToggleShowAll);
        }
    }

    fn handle_key(&self, element: TypeaheadElement, key: KeyEvent) {
        let keys = &self.control_keys;
        if keys.show_all.contains(&key) {
            self.send(TypeaheadAction::ToggleShowAll);
            return;
        }
        match element {
            TypeaheadElement::Input => match key.code {
                KeyCode::Down => self.handle_down(),
                KeyCode::Esc
                | KeyCode::Enter
                | KeyCode::Tab
                | KeyCode::BackTab
                | KeyCode::Up => {}
                _ => self.send(TypeaheadAction::HandleKey(key)),
            },
            TypeaheadElement::Menu => {
                if keys.select.contains(&key) {
                    self.send(TypeaheadAction::SelectHighlighted);
                } else if keys.dismiss.contains(&key) {
                    self.send(TypeaheadAction::Dismiss);
                } else {
                    match key.code {
                        KeyCode::Up if self.list_state.selected().is_none_or(|i| i == 0) => {
                            self.tx.send(Action::Focus(self.primary_element_ref()));
                        }
                        KeyCode::Up => self.send(TypeaheadAction::MoveHighlight(Movement::Previous)),
                        KeyCode::Down => self.send(TypeaheadAction::MoveHighlight(Movement::Next)),
                        KeyCode::Home => self.send(TypeaheadAction::MoveHighlight(Movement::First)),
                        KeyCode::End => self.send(TypeaheadAction::MoveHighlight(Movement::Last)),
                        KeyCode::Char(_) if self.should_show_input() => {
                            self.tx
                                .send(Action::Focus(self.element_ref(TypeaheadElement::Input)));
                            self.send(TypeaheadAction::HandleKey(key));
                        }
                        _ => {}
                    }
                }
            }
            TypeaheadElement::Mask => {
                if keys.clear.contains(&key) {
                    self.send(TypeaheadAction::Clear);
                } else if keys.dismiss.contains(&key) {
                    self.send(TypeaheadAction::Dismiss);
                } else if key.code == KeyCode::Down {
                    self.handle_down();
                }
            }
        }
    }

    pub fn get_help_msg(&self) -> HelpMsg {
        fn push_first(msg: &mut HelpMsg, keys: &[KeyEvent], desc: &str) {
            if let Some(key) = keys.first() {
                msg.push(HelpEntry::new(key.clone(), desc));
            }
        }

        let keys = &self.control_keys;
        let mut msg = HelpMsg::default();
        match self.focus {
            None => {}
            Some(TypeaheadElement::Input) => {
                push_first(&mut msg, &keys.show_all, "show all");
                if self.should_show_suggestions() {
                    msg.push(HelpEntry::new(KeyCode::Down, "suggestions"));
                }
            }
            Some(TypeaheadElement::Menu) => {
                push_first(&mut msg, &keys.select, "select");
                msg.push(HelpEntry::new_plain("up/down", "move"));
                push_first(&mut msg, &keys.dismiss, "dismiss");
            }
            Some(TypeaheadElement::Mask) => {
                push_first(&mut msg, &keys.clear, "clear");
                push_first(&mut msg, &keys.show_all, "change");
            }
        }
        msg
    }
}

impl<T> super::Component for TypeaheadComp<T>
where
    T: Clone + PartialEq + Send + 'static,
{
    fn get_id(&self) -> u64 {
        self.id
    }

    fn handle_events(&self, event: &Event) -> Result<()> {
        let Some(element) = self.focus else {
            return Ok(());
        };
        match event {
            Event::Key(key) => self.handle_key(element, (*key).into()),
            Event::Paste(text) if element == TypeaheadElement::Input => {
                self.send(TypeaheadAction::HandlePaste(text.clone()))
            }
            _ => {}
        }
        Ok(())
    }

    fn update(&mut self, action: &Action) -> Result<()> {
        match action {
            Action::Focus(target) => {
                // a later focus move wins over one still waiting to settle
                self.pending_focus = None;
                self.focus = if target.owner == self.id {
                    target.element.parse().ok()
                } else {
                    None
                };
            }
            Action::OutsideGesture { owner, gesture } if *owner == self.id => {
                self.on_outside_gesture(*gesture);
            }
            Action::Comp((CompAction::Typeahead(action), id)) if *id == self.id => {
                self.apply(action.clone());
            }
            _ => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use std::{
        sync::{Arc, Mutex},
        time::Duration,
    };

    use color_eyre::eyre::eyre;
    use insta::assert_snapshot;
    use ratatui::{Terminal, backend::TestBackend, layout::Rect};

    use crate::{
        component::Component,
        page::WidgetExt,
        utils::key_events::test_utils::{get_char_evt, get_ctrl_evt, get_key_evt},
    };

    use super::*;

    const FIELD: &str = "fruit";

    type Queries = Arc<Mutex<Vec<String>>>;

    struct Harness {
        comp: TypeaheadComp<String>,
        binding: FieldBinding<String>,
        gestures: GestureHub,
        rx: mpsc::UnboundedReceiver<Action>,
        queries: Queries,
        changed: Vec<String>,
    }

    fn fruits() -> Vec<String> {
        [
            "apple",
            "apricot",
            "avocado",
            "banana",
            "blackberry",
            "blueberry",
            "cherry",
            "grape",
            "kiwi",
            "lemon",
        ]
        .map(String::from)
        .to_vec()
    }

    fn fruit_search(queries: Queries) -> SearchMethod<String> {
        SearchMethod::new(move |query: String| {
            queries.lock().unwrap().push(query.clone());
            async move {
                Ok(fruits()
                    .into_iter()
                    .filter(|fruit| fruit.contains(&query))
                    .collect())
            }
        })
    }

    /// Single letter queries take 500ms, longer ones 10ms.
    fn slow_short_queries(queries: Queries) -> SearchMethod<String> {
        SearchMethod::new(move |query: String| {
            queries.lock().unwrap().push(query.clone());
            async move {
                let delay = if query.chars().count() == 1 { 500 } else { 10 };
                tokio::time::sleep(Duration::from_millis(delay)).await;
                Ok(vec![format!("{query}-result")])
            }
        })
    }

    fn harness_with<F>(options: TypeaheadOptions, search: F) -> Harness
    where
        F: FnOnce(Queries) -> SearchMethod<String>,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let gestures = GestureHub::default();
        let binding = FieldBinding::new(FIELD, None);
        let queries = Queries::default();
        let mut comp = TypeaheadComp::builder("Fruit")
            .options(options)
            .search_method(search(queries.clone()))
            .result_template(|item: &String| Line::from(item.clone()))
            .selected_template(|item: &String| Line::from(format!("[{item}]")))
            .build(1, binding.clone(), tx.into(), &gestures)
            .unwrap();
        comp.update(&Action::Focus(comp.element_ref(TypeaheadElement::Input)))
            .unwrap();
        Harness {
            comp,
            binding,
            gestures,
            rx,
            queries,
            changed: vec![],
        }
    }

    fn harness(options: TypeaheadOptions) -> Harness {
        harness_with(options, fruit_search)
    }

    impl Harness {
        /// Let spawned tasks run and apply every queued action, the way the
        /// event loop would.
        async fn settle(&mut self) {
            for _ in 0..10 {
                tokio::task::yield_now().await;
                while let Ok(action) = self.rx.try_recv() {
                    match action {
                        Action::Form(FormAction::FieldChanged(field)) => self.changed.push(field),
                        Action::Render => {}
                        other => self.comp.update(&other).unwrap(),
                    }
                }
            }
        }

        async fn event(&mut self, event: Event) {
            self.comp.handle_events(&event).unwrap();
            self.settle().await;
        }

        async fn type_str(&mut self, text: &str) {
            for c in text.chars() {
                self.event(get_char_evt(c)).await;
            }
        }

        async fn wait(&mut self, ms: u64) {
            tokio::time::sleep(Duration::from_millis(ms)).await;
            self.settle().await;
        }

        fn queries(&self) -> Vec<String> {
            self.queries.lock().unwrap().clone()
        }
    }

    fn buffer_text(terminal: &Terminal<TestBackend>) -> String {
        let buffer = terminal.backend().buffer();
        (0..buffer.area.height)
            .map(|y| {
                (0..buffer.area.width)
                    .map(|x| buffer[(x, y)].symbol())
                    .collect::<String>()
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn missing_configuration_is_rejected() {
        let (tx, _rx) = mpsc::unbounded_channel::<Action>();
        let gestures = GestureHub::default();
        let binding = FieldBinding::new(FIELD, None::<String>);
        let result_template = |item: &String| Line::from(item.clone());

        let err = TypeaheadComp::builder("Fruit")
            .result_template(result_template)
            .selected_template(result_template)
            .build(1, binding.clone(), tx.clone().into(), &gestures)
            .err();
        assert_eq!(err, Some(TypeaheadError::MissingSearchMethod("Fruit".into())));

        let err = TypeaheadComp::builder("Fruit")
            .search_method(fruit_search(Queries::default()))
            .selected_template(result_template)
            .build(1, binding.clone(), tx.clone().into(), &gestures)
            .err();
        assert_eq!(err, Some(TypeaheadError::MissingResultTemplate("Fruit".into())));

        let err = TypeaheadComp::builder("Fruit")
            .search_method(fruit_search(Queries::default()))
            .result_template(result_template)
            .build(1, binding.clone(), tx.clone().into(), &gestures)
            .err();
        assert_eq!(
            err,
            Some(TypeaheadError::MissingSelectedTemplate("Fruit".into()))
        );

        let err = TypeaheadComp::builder("Fruit")
            .options(TypeaheadOptions::default().with_maximum_suggestions(0))
            .search_method(fruit_search(Queries::default()))
            .result_template(result_template)
            .selected_template(result_template)
            .build(1, binding, tx.into(), &gestures)
            .err();
        assert_eq!(err, Some(TypeaheadError::NoSuggestionsAllowed("Fruit".into())));

        assert_eq!(gestures.subscriber_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn below_minimum_length_never_searches() {
        let mut h = harness(TypeaheadOptions::default().with_minimum_length(2));
        h.type_str("a").await;
        assert_eq!(h.comp.state(), TypeaheadState::Debouncing);

        h.wait(1000).await;
        assert!(h.queries().is_empty());
        assert!(!h.comp.should_show_menu());
    }

    #[tokio::test(start_paused = true)]
    async fn debounce_collapses_a_burst_into_one_search() {
        let mut h = harness(
            TypeaheadOptions::default()
                .with_minimum_length(2)
                .with_debounce_ms(300),
        );
        h.type_str("a").await;
        h.wait(100).await;
        h.type_str("p").await;

        h.wait(299).await;
        assert!(h.queries().is_empty());
        assert!(!h.comp.should_show_not_found());

        h.wait(2).await;
        assert_eq!(h.queries(), vec!["ap"]);
        assert_eq!(h.comp.results(), ["apple", "apricot", "grape"]);
        assert_eq!(h.comp.state(), TypeaheadState::MenuOpen);
        assert!(h.comp.should_show_suggestions());
    }

    #[tokio::test(start_paused = true)]
    async fn each_keystroke_restarts_the_timer() {
        let mut h = harness(TypeaheadOptions::default());
        for c in "berr".chars() {
            h.type_str(&c.to_string()).await;
            h.wait(200).await;
        }
        assert!(h.queries().is_empty());

        h.wait(101).await;
        assert_eq!(h.queries(), vec!["berr"]);
    }

    #[tokio::test(start_paused = true)]
    async fn shrinking_below_minimum_cancels_pending_search() {
        let mut h = harness(TypeaheadOptions::default().with_minimum_length(2));
        h.type_str("ap").await;
        assert_eq!(h.comp.state(), TypeaheadState::Debouncing);
        h.wait(100).await;

        h.event(get_key_evt(KeyCode::Backspace)).await;
        assert_eq!(h.comp.search_text(), "a");
        h.wait(1000).await;
        assert!(h.queries().is_empty());
        assert!(!h.comp.should_show_menu());
    }

    #[tokio::test(start_paused = true)]
    async fn retyping_with_menu_open_is_debouncing() {
        let mut h = harness(TypeaheadOptions::default());
        h.type_str("an").await;
        h.wait(301).await;
        assert_eq!(h.comp.state(), TypeaheadState::MenuOpen);

        h.type_str("a").await;
        assert_eq!(h.comp.state(), TypeaheadState::Debouncing);
        assert!(!h.comp.should_show_not_found());

        h.wait(301).await;
        assert_eq!(h.queries(), vec!["an", "ana"]);
        assert_eq!(h.comp.results(), ["banana"]);
        assert_eq!(h.comp.state(), TypeaheadState::MenuOpen);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_text_cancels_timer_and_clears_results() {
        let mut h = harness(TypeaheadOptions::default());
        h.type_str("ch").await;
        h.wait(301).await;
        assert_eq!(h.comp.results(), ["cherry"]);

        h.type_str("e").await;
        for _ in 0..3 {
            h.event(get_key_evt(KeyCode::Backspace)).await;
        }
        assert_eq!(h.comp.search_text(), "");
        assert!(h.comp.results().is_empty());
        assert_eq!(h.comp.state(), TypeaheadState::Idle);

        h.wait(1000).await;
        assert_eq!(h.queries(), vec!["ch"]);
    }

    #[tokio::test(start_paused = true)]
    async fn results_are_capped_in_returned_order() {
        let mut h = harness_with(
            TypeaheadOptions::default().with_maximum_suggestions(3),
            |queries| {
                SearchMethod::new(move |query: String| {
                    queries.lock().unwrap().push(query);
                    async { Ok((0..10).map(|i| format!("item-{i}")).collect()) }
                })
            },
        );
        h.type_str("i").await;
        h.wait(301).await;
        assert_eq!(h.comp.results(), ["item-0", "item-1", "item-2"]);
    }

    #[tokio::test(start_paused = true)]
    async fn show_all_searches_with_empty_text() {
        let mut h = harness(TypeaheadOptions::default().with_maximum_suggestions(4));
        h.type_str("ki").await;

        h.event(get_ctrl_evt(KeyCode::Char(' '))).await;
        assert_eq!(h.queries(), vec![""]);
        assert_eq!(h.comp.search_text(), "");
        assert!(h.comp.should_show_menu());
        assert_eq!(h.comp.results(), ["apple", "apricot", "avocado", "banana"]);
        assert!(!h.comp.should_show_not_found());

        h.event(get_ctrl_evt(KeyCode::Char(' '))).await;
        assert!(!h.comp.should_show_menu());
        assert_eq!(h.comp.results().len(), 4);

        // the pending "ki" search was cancelled by show-all
        h.wait(1000).await;
        assert_eq!(h.queries(), vec![""]);
    }

    #[tokio::test(start_paused = true)]
    async fn down_on_empty_input_lists_everything() {
        let mut h = harness(TypeaheadOptions::default());
        h.event(get_key_evt(KeyCode::Down)).await;
        assert_eq!(h.queries(), vec![""]);
        assert_eq!(h.comp.results().len(), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn escape_while_menu_open_resets_to_idle() {
        let mut h = harness(TypeaheadOptions::default());
        h.type_str("an").await;
        h.wait(301).await;
        assert_eq!(h.comp.results(), ["banana"]);

        h.gestures.broadcast(Gesture::Escape);
        h.settle().await;
        assert_eq!(h.comp.search_text(), "");
        assert!(h.comp.results().is_empty());
        assert!(!h.comp.should_show_menu());
        assert_eq!(h.comp.state(), TypeaheadState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn escape_with_closed_menu_keeps_text_but_focus_out_does_not() {
        let mut h = harness(TypeaheadOptions::default().with_minimum_length(2));
        h.type_str("b").await;

        h.gestures.broadcast(Gesture::Escape);
        h.settle().await;
        assert_eq!(h.comp.search_text(), "b");

        h.gestures.notify(1, Gesture::FocusOut);
        h.settle().await;
        assert_eq!(h.comp.search_text(), "");
        assert_eq!(h.comp.state(), TypeaheadState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn enter_on_suggestion_commits_value() {
        let mut h = harness(TypeaheadOptions::default());
        h.type_str("berry").await;
        h.wait(301).await;
        assert_eq!(h.comp.results(), ["blackberry", "blueberry"]);

        h.event(get_key_evt(KeyCode::Down)).await;
        assert_eq!(h.comp.focused_element(), Some(TypeaheadElement::Menu));
        h.event(get_key_evt(KeyCode::Down)).await;
        h.event(get_key_evt(KeyCode::Enter)).await;

        assert_eq!(h.binding.cloned().as_deref(), Some("blueberry"));
        assert_eq!(h.comp.search_text(), "");
        assert!(!h.comp.should_show_menu());
        assert!(h.comp.should_show_mask());
        assert!(!h.comp.should_show_input());
        assert_eq!(h.comp.state(), TypeaheadState::Selected);
        assert_eq!(h.changed, vec![FIELD]);

        h.wait(200).await;
        assert_eq!(h.comp.focused_element(), Some(TypeaheadElement::Menu));
        h.wait(51).await;
        assert_eq!(h.comp.focused_element(), Some(TypeaheadElement::Mask));
    }

    #[tokio::test(start_paused = true)]
    async fn select_result_directly() {
        let mut h = harness(TypeaheadOptions::default());
        h.type_str("gr").await;
        h.comp.select_result("grape".to_string());
        h.settle().await;

        assert_eq!(h.binding.cloned().as_deref(), Some("grape"));
        assert_eq!(h.comp.search_text(), "");
        assert!(!h.comp.should_show_menu());
        assert_eq!(h.changed, vec![FIELD]);

        // the debounce armed by typing was cancelled
        h.wait(1000).await;
        assert!(h.queries().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn backspace_on_mask_clears_value() {
        let mut h = harness(TypeaheadOptions::default());
        h.binding.set(Some("kiwi".into()));
        h.comp
            .update(&Action::Focus(h.comp.primary_element_ref()))
            .unwrap();
        assert_eq!(h.comp.focused_element(), Some(TypeaheadElement::Mask));

        h.event(get_key_evt(KeyCode::Backspace)).await;
        assert_eq!(h.binding.cloned(), None);
        assert_eq!(h.changed, vec![FIELD]);
        assert!(!h.comp.should_show_mask());
        assert!(h.comp.should_show_input());
        assert_eq!(h.comp.search_text(), "");

        h.wait(251).await;
        assert_eq!(h.comp.focused_element(), Some(TypeaheadElement::Input));
    }

    #[tokio::test(start_paused = true)]
    async fn clear_resets_value_and_text() {
        let mut h = harness(TypeaheadOptions::default());
        h.binding.set(Some("lemon".into()));
        h.comp.clear();
        h.settle().await;

        assert_eq!(h.binding.cloned(), None);
        assert_eq!(h.comp.search_text(), "");
        assert!(!h.comp.should_show_mask());
        assert!(h.comp.should_show_input());
        assert_eq!(h.comp.state(), TypeaheadState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn escape_on_menu_returns_focus_to_input() {
        let mut h = harness(TypeaheadOptions::default());
        h.type_str("an").await;
        h.wait(301).await;
        h.event(get_key_evt(KeyCode::Down)).await;
        assert_eq!(h.comp.focused_element(), Some(TypeaheadElement::Menu));

        h.event(get_key_evt(KeyCode::Esc)).await;
        assert_eq!(h.comp.search_text(), "");
        assert!(h.comp.results().is_empty());
        assert_eq!(h.comp.state(), TypeaheadState::Idle);

        h.wait(251).await;
        assert_eq!(h.comp.focused_element(), Some(TypeaheadElement::Input));
    }

    #[tokio::test(start_paused = true)]
    async fn backspace_and_delete_on_menu_dismiss_like_escape() {
        for key in [KeyCode::Backspace, KeyCode::Delete] {
            let mut h = harness(TypeaheadOptions::default());
            h.type_str("an").await;
            h.wait(301).await;
            h.event(get_key_evt(KeyCode::Down)).await;
            assert_eq!(h.comp.focused_element(), Some(TypeaheadElement::Menu));

            h.event(get_key_evt(key)).await;
            assert_eq!(h.comp.search_text(), "", "{key:?}");
            assert!(h.comp.results().is_empty(), "{key:?}");
            assert!(!h.comp.should_show_menu(), "{key:?}");
            assert_eq!(h.comp.state(), TypeaheadState::Idle, "{key:?}");
            assert!(h.binding.cloned().is_none(), "{key:?}");

            h.wait(251).await;
            assert_eq!(
                h.comp.focused_element(),
                Some(TypeaheadElement::Input),
                "{key:?}"
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn leaving_before_settle_keeps_focus_elsewhere() {
        let mut h = harness(TypeaheadOptions::default());
        h.type_str("berry").await;
        h.wait(301).await;
        h.event(get_key_evt(KeyCode::Down)).await;
        h.event(get_key_evt(KeyCode::Enter)).await;
        assert_eq!(h.binding.cloned().as_deref(), Some("blackberry"));

        h.comp
            .update(&Action::Focus(ElementRef::new(2, "input")))
            .unwrap();
        h.gestures.notify(1, Gesture::FocusOut);
        h.settle().await;
        assert_eq!(h.comp.focused_element(), None);

        h.wait(300).await;
        assert_eq!(h.comp.focused_element(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn up_from_first_suggestion_returns_to_input() {
        let mut h = harness(TypeaheadOptions::default());
        h.type_str("berry").await;
        h.wait(301).await;
        h.event(get_key_evt(KeyCode::Down)).await;
        h.event(get_key_evt(KeyCode::End)).await;
        h.event(get_key_evt(KeyCode::Up)).await;
        assert_eq!(h.comp.focused_element(), Some(TypeaheadElement::Menu));

        h.event(get_key_evt(KeyCode::Up)).await;
        assert_eq!(h.comp.focused_element(), Some(TypeaheadElement::Input));
        assert!(h.comp.should_show_menu());
    }

    #[tokio::test(start_paused = true)]
    async fn not_found_only_after_a_completed_empty_search() {
        let mut h = harness(TypeaheadOptions::default());
        h.type_str("zz").await;
        assert!(!h.comp.should_show_not_found());

        h.wait(301).await;
        assert!(h.comp.should_show_not_found());

        h.type_str("z").await;
        assert!(!h.comp.should_show_not_found());
        h.wait(301).await;
        assert!(h.comp.should_show_not_found());
    }

    #[tokio::test(start_paused = true)]
    async fn superseded_search_results_are_dropped() {
        let mut h = harness_with(TypeaheadOptions::default(), slow_short_queries);
        h.type_str("a").await;
        h.wait(301).await;
        assert!(h.comp.is_searching());

        h.type_str("b").await;
        h.wait(301).await;
        h.wait(20).await;
        assert_eq!(h.comp.results(), ["ab-result"]);
        assert!(!h.comp.is_searching());

        // the slow "a" search completes last and must not win
        h.wait(300).await;
        assert_eq!(h.queries(), vec!["a", "ab"]);
        assert_eq!(h.comp.results(), ["ab-result"]);
    }

    #[tokio::test(start_paused = true)]
    async fn last_completed_policy_lets_late_results_win() {
        let mut h = harness_with(
            TypeaheadOptions::default().with_result_policy(ResultPolicy::LastCompleted),
            slow_short_queries,
        );
        h.type_str("a").await;
        h.wait(301).await;
        h.type_str("b").await;
        h.wait(301).await;
        h.wait(20).await;
        assert_eq!(h.comp.results(), ["ab-result"]);

        h.wait(300).await;
        assert_eq!(h.comp.results(), ["a-result"]);
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_search_does_not_reopen_menu() {
        let mut h = harness_with(TypeaheadOptions::default(), slow_short_queries);
        h.type_str("a").await;
        h.wait(301).await;
        assert!(h.comp.is_searching());

        h.gestures.notify(1, Gesture::FocusOut);
        h.settle().await;
        assert!(!h.comp.is_searching());

        h.wait(600).await;
        assert!(!h.comp.should_show_menu());
        assert!(h.comp.results().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_search_is_reported_instead_of_not_found() {
        let mut h = harness_with(TypeaheadOptions::default(), |queries| {
            SearchMethod::new(move |query: String| {
                queries.lock().unwrap().push(query);
                async { Err::<Vec<String>, _>(eyre!("backend unavailable")) }
            })
        });
        h.type_str("x").await;
        h.wait(301).await;

        assert_eq!(h.comp.search_failed(), Some("backend unavailable"));
        assert!(h.comp.should_show_menu());
        assert!(h.comp.results().is_empty());
        assert!(!h.comp.should_show_not_found());
        assert!(!h.comp.is_searching());
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_widget_cancels_timer_and_unsubscribes() {
        let h = harness(TypeaheadOptions::default());
        assert_eq!(h.gestures.subscriber_count(), 1);
        let Harness {
            mut comp,
            gestures,
            mut rx,
            ..
        } = h;
        comp.handle_events(&get_char_evt('a')).unwrap();
        while let Ok(action) = rx.try_recv() {
            comp.update(&action).unwrap();
        }

        drop(comp);
        assert_eq!(gestures.subscriber_count(), 0);

        tokio::time::sleep(Duration::from_secs(1)).await;
        while let Ok(action) = rx.try_recv() {
            assert!(!matches!(
                action,
                Action::Comp((CompAction::Typeahead(TypeaheadAction::DebounceElapsed(_)), _))
            ));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn paste_is_searched_like_typing() {
        let mut h = harness(TypeaheadOptions::default());
        h.event(Event::Paste("lem".into())).await;
        assert_eq!(h.comp.search_text(), "lem");
        h.wait(301).await;
        assert_eq!(h.queries(), vec!["lem"]);
        assert_eq!(h.comp.results(), ["lemon"]);
    }

    #[tokio::test(start_paused = true)]
    async fn help_follows_focused_element() {
        let mut h = harness(TypeaheadOptions::default());
        assert_snapshot!(h.comp.get_help_msg().to_string(), @"show all: ctrl-space");

        h.type_str("an").await;
        h.wait(301).await;
        assert_snapshot!(
            h.comp.get_help_msg().to_string(),
            @"show all: ctrl-space | suggestions: down"
        );

        h.event(get_key_evt(KeyCode::Down)).await;
        assert_snapshot!(
            h.comp.get_help_msg().to_string(),
            @"select: enter | move: up/down | dismiss: esc"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn renders_placeholder_suggestions_and_mask() {
        let mut h = harness(TypeaheadOptions::default().with_placeholder("Pick a fruit"));
        let mut terminal = Terminal::new(TestBackend::new(30, 10)).unwrap();
        let field = Rect::new(0, 0, 30, 3);

        terminal.draw(|f| h.comp.render(f, field)).unwrap();
        let screen = buffer_text(&terminal);
        assert!(screen.contains("Fruit"));
        assert!(screen.contains("Pick a fruit"));

        h.type_str("berry").await;
        h.wait(301).await;
        terminal.draw(|f| h.comp.render(f, field)).unwrap();
        let screen = buffer_text(&terminal);
        assert!(screen.contains("blackberry"));
        assert!(screen.contains("blueberry"));

        h.event(get_key_evt(KeyCode::Down)).await;
        h.event(get_key_evt(KeyCode::Enter)).await;
        terminal.draw(|f| h.comp.render(f, field)).unwrap();
        let screen = buffer_text(&terminal);
        assert!(screen.contains("[blackberry]"));
        assert!(!screen.contains("blueberry"));

        h.event(get_ctrl_evt(KeyCode::Char(' '))).await;
        terminal.draw(|f| h.comp.render(f, field)).unwrap();
        assert!(buffer_text(&terminal).contains("✓ blackberry"));
    }

    #[tokio::test(start_paused = true)]
    async fn renders_not_found_message() {
        let mut h = harness(TypeaheadOptions::default());
        let mut terminal = Terminal::new(TestBackend::new(40, 8)).unwrap();
        let field = Rect::new(0, 0, 40, 3);

        h.type_str("zz").await;
        h.wait(301).await;
        terminal.draw(|f| h.comp.render(f, field)).unwrap();
        assert!(buffer_text(&terminal).contains("No results for \"zz\""));
    }
}
