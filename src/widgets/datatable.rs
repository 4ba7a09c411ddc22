use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Rect},
    style::{Color, Modifier, Style},
    text::Line,
    widgets::{Block, Borders, Cell as TableCell, Paragraph, Row, Table, Widget},
};

use crate::result::{Cell, ResultPage};

/// Display width of each column: the widest of header and cells, capped at `max_width`.
pub fn column_widths(page: &ResultPage, max_width: u16) -> Vec<u16> {
    page.header
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let widest = page
                .rows
                .iter()
                .filter_map(|row| row.get(i))
                .map(|cell| cell.to_string().chars().count())
                .chain(std::iter::once(name.chars().count()))
                .max()
                .unwrap_or(0);
            (widest.min(max_width as usize) as u16).max(1)
        })
        .collect()
}

/// Cut `s` to `width` characters, marking the cut with `…`.
fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        return s.to_string();
    }
    let mut out: String = s.chars().take(width.saturating_sub(1)).collect();
    out.push('…');
    out
}

/// Plain-text rendering of a page for non-interactive output.
/// `first_row` numbers rows from that value when set.
pub fn render_plain(page: &ResultPage, first_row: Option<usize>, max_width: u16) -> String {
    if page.header.is_empty() {
        return String::from("(no rows)\n");
    }
    let widths = column_widths(page, max_width);
    let number_width = first_row
        .map(|start| (start + page.rows.len()).to_string().len())
        .unwrap_or(0);

    let mut out = String::new();
    let mut push_line = |number: Option<String>, cells: Vec<String>| {
        let mut parts = Vec::with_capacity(cells.len() + 1);
        if let Some(n) = number {
            parts.push(format!("{:>number_width$}", n));
        }
        for (cell, width) in cells.iter().zip(&widths) {
            let width = *width as usize;
            parts.push(format!("{:<width$}", truncate(cell, width)));
        }
        out.push_str(parts.join("  ").trim_end());
        out.push('\n');
    };

    push_line(first_row.map(|_| String::new()), page.header.clone());
    for (i, row) in page.rows.iter().enumerate() {
        push_line(
            first_row.map(|start| (start + i).to_string()),
            row.iter().map(Cell::to_string).collect(),
        );
    }
    out
}

/// Table view of the current page.
pub struct ResultTable<'a> {
    page: &'a ResultPage,
    first_row: Option<usize>,
    max_column_width: u16,
    title: Option<String>,
}

impl<'a> ResultTable<'a> {
    pub fn new(page: &'a ResultPage) -> Self {
        Self {
            page,
            first_row: None,
            max_column_width: 32,
            title: None,
        }
    }

    /// Show absolute row numbers starting at `first_row`.
    pub fn with_row_numbers(mut self, first_row: Option<usize>) -> Self {
        self.first_row = first_row;
        self
    }

    pub fn with_max_column_width(mut self, width: u16) -> Self {
        self.max_column_width = width.max(3);
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

impl Widget for ResultTable<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let mut block = Block::default().borders(Borders::ALL);
        if let Some(title) = &self.title {
            block = block.title(Line::from(title.as_str()));
        }

        if self.page.header.is_empty() {
            Paragraph::new("No rows")
                .style(Style::default().fg(Color::DarkGray))
                .centered()
                .block(block)
                .render(area, buf);
            return;
        }

        let widths = column_widths(self.page, self.max_column_width);
        let mut constraints: Vec<Constraint> = Vec::with_capacity(widths.len() + 1);
        let mut header_cells: Vec<TableCell> = Vec::with_capacity(widths.len() + 1);
        if let Some(start) = self.first_row {
            let width = (start + self.page.rows.len()).to_string().len() as u16;
            constraints.push(Constraint::Length(width));
            header_cells.push(TableCell::from(""));
        }
        constraints.extend(widths.iter().map(|w| Constraint::Length(*w)));
        header_cells.extend(self.page.header.iter().map(|h| TableCell::from(h.as_str())));

        let header = Row::new(header_cells).style(
            Style::default()
                .fg(Color::White)
                .bg(Color::Indexed(235))
                .add_modifier(Modifier::BOLD),
        );

        let rows = self.page.rows.iter().enumerate().map(|(i, row)| {
            let mut cells: Vec<TableCell> = Vec::with_capacity(row.len() + 1);
            if let Some(start) = self.first_row {
                cells.push(
                    TableCell::from((start + i).to_string())
                        .style(Style::default().fg(Color::DarkGray)),
                );
            }
            cells.extend(row.iter().zip(&widths).map(|(cell, width)| {
                let style = match cell {
                    Cell::Null => Style::default().fg(Color::DarkGray),
                    Cell::Int(_) | Cell::UInt(_) => Style::default().fg(Color::Cyan),
                    Cell::Float(_) => Style::default().fg(Color::Blue),
                    Cell::Bool(_) => Style::default().fg(Color::Yellow),
                    Cell::Str(_) => Style::default().fg(Color::Green),
                };
                TableCell::from(truncate(&cell.to_string(), *width as usize)).style(style)
            }));
            Row::new(cells)
        });

        Table::new(rows, constraints)
            .header(header)
            .column_spacing(2)
            .block(block)
            .render(area, buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> ResultPage {
        ResultPage {
            header: vec!["id".into(), "name".into()],
            rows: vec![
                vec![Cell::Int(1), Cell::Str("alpha".into())],
                vec![Cell::Int(10), Cell::Null],
            ],
        }
    }

    #[test]
    fn test_column_widths() {
        assert_eq!(column_widths(&page(), 32), vec![2, 5]);
        assert_eq!(column_widths(&page(), 3), vec![2, 3]);
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("alpha", 5), "alpha");
        assert_eq!(truncate("alphabet", 5), "alph…");
    }

    #[test]
    fn test_render_plain() {
        let text = render_plain(&page(), None, 32);
        assert_eq!(text, "id  name\n1   alpha\n10  null\n");
    }

    #[test]
    fn test_render_plain_with_row_numbers() {
        let text = render_plain(&page(), Some(21), 32);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[1], "21  1   alpha");
        assert_eq!(lines[2], "22  10  null");
    }

    #[test]
    fn test_render_plain_empty() {
        assert_eq!(render_plain(&ResultPage::default(), None, 32), "(no rows)\n");
    }

    #[test]
    fn test_widget_renders_header() {
        let area = Rect::new(0, 0, 30, 6);
        let mut buf = Buffer::empty(area);
        ResultTable::new(&page()).render(area, &mut buf);
        let line: String = (0..area.width)
            .map(|x| buf[(x, 1)].symbol().to_string())
            .collect();
        assert!(line.contains("id"));
        assert!(line.contains("name"));
    }
}
