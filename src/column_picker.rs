use ratatui::widgets::TableState;

/// Overlay listing every source column; the cursor picks which one the
/// toggle/move keys act on.
#[derive(Debug, Default)]
pub struct ColumnPicker {
    pub active: bool,
    pub columns: Vec<String>,
    pub table_state: TableState,
}

impl ColumnPicker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&mut self, columns: Vec<String>) {
        let keep = self
            .selected()
            .and_then(|name| columns.iter().position(|c| c == name));
        self.table_state
            .select(Some(keep.unwrap_or(0)).filter(|_| !columns.is_empty()));
        self.columns = columns;
        self.active = true;
    }

    pub fn close(&mut self) {
        self.active = false;
    }

    /// Column under the cursor.
    pub fn selected(&self) -> Option<&str> {
        self.table_state
            .selected()
            .and_then(|i| self.columns.get(i))
            .map(String::as_str)
    }

    pub fn move_selection_down(&mut self) {
        if let Some(i) = self.table_state.selected() {
            if i + 1 < self.columns.len() {
                self.table_state.select(Some(i + 1));
            }
        }
    }

    pub fn move_selection_up(&mut self) {
        if let Some(i) = self.table_state.selected() {
            self.table_state.select(Some(i.saturating_sub(1)));
        }
    }
}

/// Whether `name` is shown given the selected `fields` (none selected means all).
pub fn is_shown(name: &str, fields: &[String]) -> bool {
    fields.is_empty() || fields.iter().any(|f| f == name)
}

/// 1-based display position of `name` among `fields`.
pub fn display_order(name: &str, fields: &[String]) -> Option<usize> {
    fields.iter().position(|f| f == name).map(|i| i + 1)
}
