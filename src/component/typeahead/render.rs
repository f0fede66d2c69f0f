use ratatui::{
    Frame,
    layout::Rect,
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Clear, List, ListItem, Paragraph},
};

use crate::page::WidgetExt;

use super::{TypeaheadComp, TypeaheadElement};

fn focus_style(focused: bool) -> Style {
    if focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default()
    }
}

impl<T> TypeaheadComp<T>
where
    T: Clone + PartialEq + Send + 'static,
{
    fn render_field(&self, frame: &mut Frame, area: Rect) {
        let indicator = if self.is_searching() {
            "searching…"
        } else if self.show_menu {
            "▲"
        } else {
            "▼"
        };
        let block = Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(focus_style(self.focus.is_some()))
            .title(Line::from(self.title.clone()).left_aligned())
            .title(Line::from(indicator).right_aligned());
        let inner = block.inner(area);
        frame.render_widget(block, area);

        if self.should_show_mask() {
            let line = match self.binding.get().as_ref() {
                Some(value) => (self.templates.selected)(value),
                None => Line::default(),
            };
            let style = if self.focused_element() == Some(TypeaheadElement::Mask) {
                Style::default().add_modifier(Modifier::REVERSED)
            } else {
                Style::default()
            };
            frame.render_widget(Paragraph::new(line).style(style), inner);
            return;
        }

        let width = inner.width.max(1) as usize;
        let scroll = self.input.visual_scroll(width);
        let paragraph = if self.input.value().is_empty() {
            Paragraph::new(self.options.placeholder.as_str()).fg(Color::DarkGray)
        } else {
            Paragraph::new(self.input.value()).scroll((0, scroll as u16))
        };
        frame.render_widget(paragraph, inner);

        if self.focused_element() == Some(TypeaheadElement::Input) {
            let x = self.input.visual_cursor().saturating_sub(scroll);
            frame.set_cursor_position((inner.x + x as u16, inner.y));
        }
    }

    /// Below the field when there is room, above it otherwise.
    fn menu_area(&self, screen: Rect, field: Rect) -> Rect {
        let rows = if self.should_show_suggestions() {
            self.results().len() as u16
        } else {
            1
        };
        let wanted = rows.saturating_add(2);
        let below = screen.bottom().saturating_sub(field.bottom());
        if below >= wanted.min(3) {
            Rect::new(field.x, field.bottom(), field.width, wanted.min(below))
        } else {
            let above = field.y.saturating_sub(screen.y);
            let height = wanted.min(above);
            Rect::new(field.x, field.y - height, field.width, height)
        }
    }

    fn render_menu(&mut self, frame: &mut Frame, area: Rect) {
        frame.render_widget(Clear, area);
        let mut block = Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(focus_style(self.focused_element() == Some(TypeaheadElement::Menu)));

        if !self.should_show_suggestions() {
            let line = if self.is_searching() {
                Line::styled("Searching…", Style::default().fg(Color::DarkGray))
            } else if let Some(message) = self.search_failed() {
                Line::styled(
                    format!("Search failed: {message}"),
                    Style::default().fg(Color::Red),
                )
            } else if self.should_show_not_found() {
                (self.templates.not_found)(self.search_text())
            } else {
                Line::styled("Type to search", Style::default().fg(Color::DarkGray))
            };
            frame.render_widget(Paragraph::new(line).block(block), area);
            return;
        }

        if let Some(footer) = &self.templates.footer {
            block = block.title_bottom(footer(&self.results).right_aligned());
        }
        let selected = self.binding.cloned();
        let items: Vec<ListItem> = self
            .results
            .iter()
            .map(|item| {
                let mut line = (self.templates.result)(item);
                let marker = if selected.as_ref() == Some(item) {
                    Span::styled("✓ ", Style::default().fg(Color::Green))
                } else {
                    Span::raw("  ")
                };
                line.spans.insert(0, marker);
                ListItem::new(line)
            })
            .collect();
        let list = List::new(items)
            .block(block)
            .highlight_style(Style::default().add_modifier(Modifier::REVERSED));
        frame.render_stateful_widget(list, area, &mut self.list_state);
    }
}

impl<T> WidgetExt for TypeaheadComp<T>
where
    T: Clone + PartialEq + Send + 'static,
{
    fn render(&mut self, frame: &mut Frame, area: Rect) {
        self.render_field(frame, area);
        if self.show_menu {
            let menu = self.menu_area(frame.area(), area);
            if menu.height > 0 {
                self.render_menu(frame, menu);
            }
        }
    }
}
