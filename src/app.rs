use color_eyre::eyre::Result;
use crossterm::event::{KeyCode, KeyModifiers};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender, error::TryRecvError};
use tracing::{debug, error, info};

use crate::{
    actions::{Action, ActionSender},
    config::Config,
    focus::{Gesture, GestureHub},
    page::{EventLoopParticipant, Page, WidgetExt, form::FormPage},
    tui,
};

pub struct RootState {
    pub should_quit: bool,
    pub action_tx: UnboundedSender<Action>,
    pub action_rx: UnboundedReceiver<Action>,
    pub gestures: GestureHub,

    pub config: Config,
}

impl RootState {
    pub fn new(config: Config) -> Self {
        let (action_tx, action_rx) = mpsc::unbounded_channel();
        Self {
            should_quit: false,
            action_tx,
            action_rx,
            gestures: GestureHub::default(),
            config,
        }
    }

    pub fn sender(&self) -> ActionSender {
        self.action_tx.clone().into()
    }

    pub fn send_action<T: Into<Action>>(&self, action: T) {
        self.sender().send(action);
    }

    pub fn try_recv(&mut self) -> Result<Action, TryRecvError> {
        self.action_rx.try_recv()
    }
}

pub struct App {
    pub page: FormPage,
    pub state: RootState,
    pub tui: tui::Tui,
}

impl App {
    pub fn new(state: RootState, tui: tui::Tui) -> Result<Self> {
        let page = FormPage::new(&state)?;
        Ok(Self { page, state, tui })
    }

    pub async fn run(&mut self) -> Result<()> {
        self.tui.enter()?;
        info!(page = self.page.get_name(), "starting");
        self.page.init();

        loop {
            let Some(event) = self.tui.next().await else {
                info!("event stream closed");
                break;
            };
            self.handle_event(event)?;

            while let Ok(action) = self.state.try_recv() {
                self.perform_action(action)?;
            }

            // application exit
            if self.state.should_quit {
                break;
            }
        }

        self.tui.exit()?;
        Ok(())
    }

    /// Handle application-wide events and hand everything else to the page.
    ///
    /// Escape and losing terminal focus are gestures outside every widget, so
    /// after the page had its turn they are broadcast through the gesture hub.
    fn handle_event(&mut self, event: tui::Event) -> Result<()> {
        match &event {
            tui::Event::Tick => self.state.send_action(Action::Tick),
            tui::Event::Render | tui::Event::Init | tui::Event::Resize(_, _) => {
                self.state.send_action(Action::Render)
            }
            tui::Event::Error => {
                error!("terminal event stream failed");
                self.state.send_action(Action::Quit);
            }
            tui::Event::FocusGained => {}
            tui::Event::FocusLost => self.state.gestures.broadcast(Gesture::FocusOut),
            tui::Event::Paste(_) => self.page.handle_events(&event)?,
            tui::Event::Key(key) => match (key.modifiers, key.code) {
                (KeyModifiers::CONTROL, KeyCode::Char('c' | 'q')) => {
                    self.state.send_action(Action::Quit)
                }
                (_, KeyCode::Esc) => {
                    self.page.handle_events(&event)?;
                    self.state.gestures.broadcast(Gesture::Escape);
                }
                _ => self.page.handle_events(&event)?,
            },
        }
        Ok(())
    }

    /// The only place the application state changes.
    fn perform_action(&mut self, action: Action) -> Result<()> {
        match action {
            Action::Quit => {
                debug!("quit requested");
                self.state.should_quit = true;
            }
            Action::Tick => {}
            Action::Render => {
                self.tui.draw(|f| {
                    let area = f.area();
                    self.page.render(f, area);
                })?;
            }
            _ => self.page.update(action)?,
        }
        Ok(())
    }
}
