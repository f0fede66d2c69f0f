use std::{collections::BTreeSet, time::Duration};

use color_eyre::eyre::Result;
use crossterm::event::KeyCode;
use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Style, Stylize},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Paragraph},
};
use tracing::{debug, info};

use crate::{
    actions::{Action, ActionSender},
    app::RootState,
    component::{
        Component,
        typeahead::{TypeaheadComp, TypeaheadOptions},
    },
    focus::{ElementRef, FocusManager},
    form::FieldBinding,
    libs::catalogue::{self, Catalogue, Country},
    tui::Event,
    utils::help_msg::{HelpEntry, HelpMsg},
};

use super::{EventLoopParticipant, Page, WidgetExt};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FormAction {
    /// A field committed or cleared its value
    FieldChanged(String),
    FocusNext,
    FocusPrev,
}

impl From<FormAction> for Action {
    fn from(value: FormAction) -> Self {
        Action::Form(value)
    }
}

/// Two distinct random ids for the widgets of the page.
fn widget_ids() -> (u64, u64) {
    let first = rand::random::<u64>();
    loop {
        let second = rand::random::<u64>();
        if second != first {
            return (first, second);
        }
    }
}

fn with_placeholder(options: &TypeaheadOptions, placeholder: &str) -> TypeaheadOptions {
    if options.placeholder.is_empty() {
        options.clone().with_placeholder(placeholder)
    } else {
        options.clone()
    }
}

/// A small form with a country and a language field.
pub struct FormPage {
    tx: ActionSender,
    country: TypeaheadComp<Country>,
    language: TypeaheadComp<String>,
    country_value: FieldBinding<Country>,
    language_value: FieldBinding<String>,
    focus: FocusManager,
    modified: BTreeSet<String>,
}

impl FormPage {
    pub fn new(state: &RootState) -> Result<Self> {
        let tx = state.sender();
        let config = &state.config;
        let delay = Duration::from_millis(config.demo.search_delay_ms);

        let countries = match &config.demo.catalogue {
            Some(path) => Catalogue::from_json_file(path)?,
            None => catalogue::countries(),
        }
        .with_delay(delay);
        let languages = catalogue::languages().with_delay(delay);
        debug!(
            countries = countries.len(),
            languages = languages.len(),
            "catalogues ready"
        );

        let (country_id, language_id) = widget_ids();
        let country_value = FieldBinding::new("country", None);
        let language_value = FieldBinding::new("language", None);

        let country = TypeaheadComp::builder("Country")
            .options(with_placeholder(&config.widget, "Start typing a country"))
            .search_method(countries.search_method())
            .result_template(|country: &Country| {
                Line::from(vec![
                    Span::raw(country.name.clone()),
                    Span::styled(
                        format!(" {}", country.code),
                        Style::default().fg(Color::DarkGray),
                    ),
                ])
            })
            .selected_template(|country: &Country| Line::from(country.to_string()))
            .footer_template(|shown: &[Country]| Line::from(format!(" {} shown ", shown.len())))
            .build(
                country_id,
                country_value.clone(),
                tx.clone(),
                &state.gestures,
            )?;

        let language = TypeaheadComp::builder("Language")
            .options(with_placeholder(&config.widget, "Start typing a language"))
            .search_method(languages.search_method())
            .result_template(|language: &String| Line::from(language.clone()))
            .selected_template(|language: &String| Line::from(language.clone()).bold())
            .not_found_template(|query: &str| {
                Line::from(format!("No language matches \"{query}\"")).italic()
            })
            .build(
                language_id,
                language_value.clone(),
                tx.clone(),
                &state.gestures,
            )?;

        Ok(Self {
            tx,
            country,
            language,
            country_value,
            language_value,
            focus: FocusManager::new(state.gestures.clone()),
            modified: BTreeSet::new(),
        })
    }

    fn field_refs(&self) -> [ElementRef; 2] {
        [
            self.country.primary_element_ref(),
            self.language.primary_element_ref(),
        ]
    }

    fn cycle_focus(&self, step: isize) -> ElementRef {
        let fields = self.field_refs();
        let next = fields
            .iter()
            .position(|field| Some(field.owner) == self.focus.focused_owner())
            .map(|current| (current as isize + step).rem_euclid(fields.len() as isize) as usize)
            .unwrap_or(0);
        fields[next]
    }

    fn country_focused(&self) -> bool {
        self.focus.focused_owner() == Some(self.country.get_id())
    }

    fn get_help_msg(&self) -> HelpMsg {
        let mut msg = if self.country_focused() {
            self.country.get_help_msg()
        } else {
            self.language.get_help_msg()
        };
        msg.extend(
            &vec![
                HelpEntry::new(KeyCode::Tab, "next field"),
                HelpEntry::new_plain("ctrl-c", "quit"),
            ]
            .into(),
        );
        msg
    }

    fn render_status(&self, frame: &mut Frame, area: Rect) {
        let value_line = |label: &str, value: Option<String>| {
            Line::from(vec![
                Span::styled(format!("{label}: "), Style::default().fg(Color::Cyan)),
                match value {
                    Some(value) => Span::raw(value),
                    None => Span::styled("-", Style::default().fg(Color::DarkGray)),
                },
            ])
        };
        let modified = if self.modified.is_empty() {
            "none".to_string()
        } else {
            self.modified.iter().cloned().collect::<Vec<_>>().join(", ")
        };
        let lines = vec![
            value_line(
                "Country",
                self.country_value.cloned().map(|c| c.to_string()),
            ),
            value_line("Language", self.language_value.cloned()),
            Line::default(),
            value_line("Modified", Some(modified)),
        ];
        let block = Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .title("Form values");
        frame.render_widget(Paragraph::new(lines).block(block), area);
    }
}

impl WidgetExt for FormPage {
    fn render(&mut self, frame: &mut Frame, area: Rect) {
        let [body, help] =
            Layout::vertical([Constraint::Fill(1), Constraint::Length(3)]).areas(area);
        let [fields, status] =
            Layout::horizontal([Constraint::Percentage(60), Constraint::Percentage(40)])
                .areas(body);
        let [country_area, _, language_area, _] = Layout::vertical([
            Constraint::Length(3),
            Constraint::Length(1),
            Constraint::Length(3),
            Constraint::Fill(1),
        ])
        .margin(1)
        .areas(fields);

        self.render_status(frame, status);
        // the focused field goes last so its dropdown overlays the other one
        if self.country_focused() {
            self.language.render(frame, language_area);
            self.country.render(frame, country_area);
        } else {
            self.country.render(frame, country_area);
            self.language.render(frame, language_area);
        }
        self.get_help_msg().render(frame, help);
    }
}

impl EventLoopParticipant for FormPage {
    fn handle_events(&mut self, event: &Event) -> Result<()> {
        if let Event::Key(key) = event {
            match key.code {
                KeyCode::Tab => {
                    self.tx.send(FormAction::FocusNext);
                    return Ok(());
                }
                KeyCode::BackTab => {
                    self.tx.send(FormAction::FocusPrev);
                    return Ok(());
                }
                _ => {}
            }
        }
        match self.focus.focused_owner() {
            Some(id) if id == self.country.get_id() => self.country.handle_events(event),
            Some(id) if id == self.language.get_id() => self.language.handle_events(event),
            _ => Ok(()),
        }
    }

    fn update(&mut self, action: Action) -> Result<()> {
        match &action {
            Action::Focus(target) => self.focus.set_focus(*target),
            Action::Form(FormAction::FieldChanged(field)) => {
                info!(field, "form field changed");
                self.modified.insert(field.clone());
            }
            Action::Form(FormAction::FocusNext) => self.tx.send(Action::Focus(self.cycle_focus(1))),
            Action::Form(FormAction::FocusPrev) => {
                self.tx.send(Action::Focus(self.cycle_focus(-1)))
            }
            _ => {}
        }
        self.country.update(&action)?;
        self.language.update(&action)?;
        Ok(())
    }
}

impl Page for FormPage {
    fn init(&mut self) {
        self.tx
            .send(Action::Focus(self.country.primary_element_ref()));
    }

    fn get_name(&self) -> String {
        "Form".to_string()
    }
}
