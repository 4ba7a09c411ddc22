use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::style::{Modifier, Style};
use ratatui::widgets::{Block, Borders, Cell as TableCell, Clear, Row, StatefulWidget, Table};
use ratatui::{buffer::Buffer, layout::Rect, widgets::Widget};
use std::sync::mpsc::Sender;
use tracing::{debug, warn};

pub mod backend;
pub mod cache;
pub mod column_picker;
pub mod config;
pub mod error;
pub mod error_display;
pub mod pagination;
pub mod prefs;
pub mod query_state;
pub mod result;
pub mod sql;
pub mod widgets;

pub use backend::{Backend, PolarsBackend};
pub use cache::{CacheManager, ResultCache, SourceStamp};
pub use config::{AppConfig, ConfigManager};
pub use error::QueryError;
pub use parqview_cli::Args;
pub use prefs::PrefsStore;
pub use query_state::{QueryOptions, QueryState, SessionState, SubscriptionId, DEFAULT_LIMIT};
pub use result::{Cell, ResultPage};
pub use sql::{OrderKey, SortDirection, Source};

use column_picker::{display_order, is_shown, ColumnPicker};
use error_display::user_message;
use widgets::controls::Controls;
use widgets::datatable::ResultTable;

/// Application name used for Config/Cache directories
pub const APP_NAME: &str = "parqview";

/// Page size change for `+` / `-`.
const LIMIT_STEP: usize = 5;

#[derive(Debug, Clone)]
pub enum AppEvent {
    Key(KeyEvent),
    Resize(u16, u16),
    /// The query state notified a change; carries its generation.
    Changed(u64),
    Exit,
}

/// Apply command-line selections to `query` as one batch (one query run, one notification).
pub fn apply_args<B: Backend>(query: &mut QueryState<B>, args: &Args) -> error::Result<()> {
    let source = if let Some(table) = &args.table {
        Some(Source::Table(table.clone()))
    } else if !args.paths.is_empty() {
        Some(Source::Files(args.paths.clone()))
    } else {
        None
    };

    query.batch(|q| {
        if let Some(source) = source {
            q.set_sources(source)?;
        }
        if !args.fields.is_empty() {
            q.set_fields(args.fields.clone())?;
        }
        if !args.filters.is_empty() {
            q.set_filter_clauses(args.filters.clone())?;
        }
        if !args.order_by.is_empty() {
            let keys = args
                .order_by
                .iter()
                .map(|o| OrderKey {
                    field: o.column.clone(),
                    direction: if o.descending {
                        SortDirection::Desc
                    } else {
                        SortDirection::Asc
                    },
                })
                .collect();
            q.set_order_by(keys)?;
        }
        if let Some(limit) = args.limit {
            q.set_limit(limit)?;
        }
        if let Some(page) = args.page {
            q.set_page(page)?;
        }
        Ok(())
    })?;
    Ok(())
}

pub struct App {
    pub query: QueryState,
    pub status: Option<String>,
    pub picker: ColumnPicker,
    pub row_numbers: bool,
    max_column_width: u16,
    /// Generation of the last change notification seen.
    pub seen_generation: u64,
}

impl App {
    /// Wrap `query` and forward its change notifications to `events`.
    pub fn new(mut query: QueryState, events: Sender<AppEvent>, config: &AppConfig) -> Self {
        query.subscribe(move |q| {
            if events.send(AppEvent::Changed(q.generation())).is_err() {
                debug!("event receiver gone, dropping change notification");
            }
        });
        Self {
            seen_generation: query.generation(),
            query,
            status: None,
            picker: ColumnPicker::new(),
            row_numbers: config.display.row_numbers,
            max_column_width: config.display.max_column_width,
        }
    }

    /// Handle one event; may return a follow-up event for the loop to send.
    pub fn event(&mut self, event: &AppEvent) -> Option<AppEvent> {
        match event {
            AppEvent::Key(key) => self.key(key),
            AppEvent::Changed(generation) => {
                // Older notifications may still be queued behind newer ones.
                if *generation > self.seen_generation {
                    self.seen_generation = *generation;
                }
                None
            }
            AppEvent::Resize(_, _) | AppEvent::Exit => None,
        }
    }

    fn key(&mut self, key: &KeyEvent) -> Option<AppEvent> {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return Some(AppEvent::Exit);
        }
        if self.picker.active {
            self.picker_key(key);
            return None;
        }
        let outcome = match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return Some(AppEvent::Exit),
            KeyCode::Char('n') | KeyCode::Right | KeyCode::PageDown => {
                self.query.next_page().map(|_| ())
            }
            KeyCode::Char('p') | KeyCode::Left | KeyCode::PageUp => {
                self.query.previous_page().map(|_| ())
            }
            KeyCode::Char('g') | KeyCode::Home => self.query.first_page().map(|_| ()),
            KeyCode::Char('G') | KeyCode::End => self.query.last_page().map(|_| ()),
            KeyCode::Char('+') => {
                let limit = self.query.limit() + LIMIT_STEP;
                self.query.set_limit(limit).map(|_| ())
            }
            KeyCode::Char('-') => {
                let limit = self.query.limit().saturating_sub(LIMIT_STEP).max(1);
                self.query.set_limit(limit).map(|_| ())
            }
            KeyCode::Char('r') => self.reverse_sort(),
            KeyCode::Char('c') => {
                self.open_picker();
                return None;
            }
            _ => return None,
        };
        self.report(outcome);
        None
    }

    fn report(&mut self, outcome: error::Result<()>) {
        match outcome {
            Ok(()) => self.status = None,
            Err(e) => {
                warn!(error = %e, "query failed");
                self.status = Some(user_message(&e));
            }
        }
    }

    fn open_picker(&mut self) {
        match self.query.available_columns() {
            Ok(columns) if columns.is_empty() => {
                self.status = Some("No columns to choose from.".to_string());
            }
            Ok(columns) => {
                self.status = None;
                self.picker.open(columns);
            }
            Err(e) => self.report(Err(e)),
        }
    }

    fn picker_key(&mut self, key: &KeyEvent) {
        let outcome = match key.code {
            KeyCode::Esc | KeyCode::Char('c') | KeyCode::Char('q') => {
                self.picker.close();
                Ok(())
            }
            KeyCode::Down | KeyCode::Char('j') => {
                self.picker.move_selection_down();
                Ok(())
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.picker.move_selection_up();
                Ok(())
            }
            KeyCode::Char(' ') | KeyCode::Enter => self.toggle_selected_field(),
            KeyCode::Char('[') => self.shift_selected_field(false),
            KeyCode::Char(']') => self.shift_selected_field(true),
            _ => return,
        };
        self.report(outcome);
    }

    /// Show or hide the column under the picker cursor. With no fields selected
    /// every column is shown, so hiding one selects all the others.
    fn toggle_selected_field(&mut self) -> error::Result<()> {
        let Some(name) = self.picker.selected().map(str::to_string) else {
            return Ok(());
        };
        let fields = self.query.fields();
        if fields.is_empty() {
            let rest = self
                .picker
                .columns
                .iter()
                .filter(|c| **c != name)
                .cloned()
                .collect();
            self.query.set_fields(rest)?;
        } else if fields.contains(&name) {
            self.query.remove_field(&name)?;
        } else {
            self.query.add_field(name)?;
        }
        Ok(())
    }

    /// Move the column under the picker cursor one display position left or right.
    fn shift_selected_field(&mut self, later: bool) -> error::Result<()> {
        let Some(name) = self.picker.selected().map(str::to_string) else {
            return Ok(());
        };
        if !is_shown(&name, self.query.fields()) {
            return Ok(());
        }
        let columns = self.picker.columns.clone();
        self.query.batch(|q| {
            if q.fields().is_empty() {
                q.set_fields(columns)?;
            }
            if let Some(i) = q.fields().iter().position(|f| *f == name) {
                let target = if later { i + 1 } else { i.saturating_sub(1) };
                q.move_field(&name, target)?;
            }
            Ok(())
        })?;
        Ok(())
    }

    /// Flip every sort key, or sort by the first shown column descending when unsorted.
    fn reverse_sort(&mut self) -> error::Result<()> {
        let keys: Vec<OrderKey> = if self.query.order_by().is_empty() {
            match self.query.header().first() {
                Some(first) => vec![OrderKey::desc(first.clone())],
                None => return Ok(()),
            }
        } else {
            self.query
                .order_by()
                .iter()
                .map(|k| OrderKey {
                    field: k.field.clone(),
                    direction: k.direction.reversed(),
                })
                .collect()
        };
        self.query.set_order_by(keys)?;
        Ok(())
    }

    fn title(&self) -> String {
        match self.query.source() {
            Some(Source::Files(paths)) => match paths.as_slice() {
                [one] => one.display().to_string(),
                many => format!("{} files", many.len()),
            },
            Some(Source::Table(name)) => name.clone(),
            None => APP_NAME.to_string(),
        }
    }
}

impl Widget for &mut App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Fill(1), Constraint::Length(1)])
            .split(area);

        let first_row = self.row_numbers.then(|| self.query.offset() + 1);
        ResultTable::new(self.query.result())
            .with_row_numbers(first_row)
            .with_max_column_width(self.max_column_width)
            .with_title(self.title())
            .render(layout[0], buf);

        Controls::new(
            self.query.page(),
            self.query.page_count(),
            self.query.row_count(),
        )
        .with_status(self.status.clone())
        .render(layout[1], buf);

        if self.picker.active {
            self.render_picker(layout[0], buf);
        }
    }
}

impl App {
    fn render_picker(&mut self, area: Rect, buf: &mut Buffer) {
        let width = area.width.min(48);
        let height = area.height.min(self.picker.columns.len() as u16 + 3);
        let picker_area = Rect::new(
            area.x + (area.width - width) / 2,
            area.y + (area.height - height) / 2,
            width,
            height,
        );
        Clear.render(picker_area, buf);

        let fields = self.query.fields();
        let rows: Vec<Row> = self
            .picker
            .columns
            .iter()
            .map(|name| {
                let shown = is_shown(name, fields);
                let order = display_order(name, fields)
                    .map(|n| format!("{n:2}"))
                    .unwrap_or_default();
                let style = if shown {
                    Style::default()
                } else {
                    Style::default().add_modifier(Modifier::DIM)
                };
                Row::new(vec![
                    TableCell::from(if shown { "[x]" } else { "[ ]" }),
                    TableCell::from(order),
                    TableCell::from(name.as_str()),
                ])
                .style(style)
            })
            .collect();

        let table = Table::new(
            rows,
            [
                Constraint::Length(3),
                Constraint::Length(2),
                Constraint::Min(0),
            ],
        )
        .header(
            Row::new(vec!["", "#", "Column"])
                .style(Style::default().add_modifier(Modifier::BOLD | Modifier::UNDERLINED)),
        )
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Columns (space show/hide, [ ] move, esc close)"),
        )
        .row_highlight_style(Style::default().add_modifier(Modifier::REVERSED));

        StatefulWidget::render(table, picker_area, buf, &mut self.picker.table_state);
    }
}
