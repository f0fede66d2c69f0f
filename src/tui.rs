//! Terminal setup and the background task turning terminal input into
//! [`Event`]s.

use std::{
    io::{Stderr, stderr},
    ops::{Deref, DerefMut},
    time::Duration,
};

use color_eyre::eyre::Result;
use futures::{FutureExt, StreamExt};
use ratatui::{
    backend::CrosstermBackend,
    crossterm::{
        cursor,
        event::{
            DisableBracketedPaste, DisableFocusChange, EnableBracketedPaste, EnableFocusChange,
            Event as CrosstermEvent, KeyEvent, KeyEventKind,
        },
        terminal::{EnterAlternateScreen, LeaveAlternateScreen},
    },
};
use tokio::{
    sync::mpsc::{self, UnboundedReceiver, UnboundedSender},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

#[derive(Clone, Debug)]
pub enum Event {
    Init,
    Error,
    Tick,
    Render,
    FocusGained,
    /// The terminal window lost focus
    FocusLost,
    Paste(String),
    Key(KeyEvent),
    Resize(u16, u16),
}

pub struct Tui {
    pub terminal: ratatui::Terminal<CrosstermBackend<Stderr>>,
    pub task: Option<JoinHandle<()>>,
    pub cancellation_token: CancellationToken,
    pub event_rx: UnboundedReceiver<Event>,
    pub event_tx: UnboundedSender<Event>,
    pub frame_rate: f64,
    pub tick_rate: f64,
    pub paste: bool,
}

impl Tui {
    pub fn new() -> Result<Self> {
        let terminal = ratatui::Terminal::new(CrosstermBackend::new(stderr()))?;
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        Ok(Self {
            terminal,
            task: None,
            cancellation_token: CancellationToken::new(),
            event_rx,
            event_tx,
            frame_rate: 60.0,
            tick_rate: 4.0,
            paste: true,
        })
    }

    pub fn tick_rate(mut self, tick_rate: f64) -> Self {
        self.tick_rate = tick_rate;
        self
    }

    pub fn frame_rate(mut self, frame_rate: f64) -> Self {
        self.frame_rate = frame_rate;
        self
    }

    pub fn start(&mut self) {
        let tick_delay = Duration::from_secs_f64(1.0 / self.tick_rate);
        let render_delay = Duration::from_secs_f64(1.0 / self.frame_rate);
        self.cancel();
        self.cancellation_token = CancellationToken::new();
        let cancellation_token = self.cancellation_token.clone();
        let event_tx = self.event_tx.clone();
        self.task = Some(tokio::spawn(async move {
            let mut reader = crossterm::event::EventStream::new();
            let mut tick_interval = tokio::time::interval(tick_delay);
            let mut render_interval = tokio::time::interval(render_delay);
            let send = |event: Event| {
                if event_tx.send(event).is_err() {
                    warn!("Event receiver dropped");
                }
            };
            send(Event::Init);
            loop {
                let tick = tick_interval.tick();
                let render = render_interval.tick();
                let crossterm_event = reader.next().fuse();
                tokio::select! {
                    _ = cancellation_token.cancelled() => break,
                    maybe_event = crossterm_event => match maybe_event {
                        Some(Ok(CrosstermEvent::Key(key))) if key.kind == KeyEventKind::Press => {
                            send(Event::Key(key))
                        }
                        Some(Ok(CrosstermEvent::Resize(x, y))) => send(Event::Resize(x, y)),
                        Some(Ok(CrosstermEvent::FocusLost)) => send(Event::FocusLost),
                        Some(Ok(CrosstermEvent::FocusGained)) => send(Event::FocusGained),
                        Some(Ok(CrosstermEvent::Paste(s))) => send(Event::Paste(s)),
                        Some(Ok(_)) => {}
                        Some(Err(_)) => send(Event::Error),
                        None => break,
                    },
                    _ = tick => send(Event::Tick),
                    _ = render => send(Event::Render),
                }
            }
        }));
    }

    /// Stop the event task, aborting it if it does not finish within 50ms.
    pub fn stop(&self) {
        self.cancel();
        let Some(task) = &self.task else {
            return;
        };
        let mut counter = 0;
        while !task.is_finished() {
            std::thread::sleep(Duration::from_millis(1));
            counter += 1;
            if counter > 50 {
                task.abort();
            }
            if counter > 100 {
                error!("Failed to abort task in 100 milliseconds for unknown reason");
                break;
            }
        }
    }

    pub fn enter(&mut self) -> Result<()> {
        crossterm::terminal::enable_raw_mode()?;
        crossterm::execute!(
            stderr(),
            EnterAlternateScreen,
            EnableFocusChange,
            cursor::Hide
        )?;
        if self.paste {
            crossterm::execute!(stderr(), EnableBracketedPaste)?;
        }
        self.start();
        Ok(())
    }

    pub fn exit(&mut self) -> Result<()> {
        self.stop();
        if crossterm::terminal::is_raw_mode_enabled()? {
            self.flush()?;
            restore()?;
        }
        Ok(())
    }

    pub fn cancel(&self) {
        self.cancellation_token.cancel();
    }

    /// `None` once the event task has finished.
    pub async fn next(&mut self) -> Option<Event> {
        self.event_rx.recv().await
    }
}

/// Put the terminal back into its normal mode.
///
/// Does not need a [`Tui`], so it is safe to call from the panic hook.
pub fn restore() -> Result<()> {
    crossterm::execute!(
        stderr(),
        DisableBracketedPaste,
        DisableFocusChange,
        LeaveAlternateScreen,
        cursor::Show
    )?;
    crossterm::terminal::disable_raw_mode()?;
    Ok(())
}

impl Deref for Tui {
    type Target = ratatui::Terminal<CrosstermBackend<Stderr>>;

    fn deref(&self) -> &Self::Target {
        &self.terminal
    }
}

impl DerefMut for Tui {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.terminal
    }
}

impl Drop for Tui {
    fn drop(&mut self) {
        if let Err(err) = self.exit() {
            error!("Unable to exit terminal: {err:?}");
        }
    }
}
