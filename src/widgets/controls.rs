use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style, Stylize},
    widgets::{Paragraph, Widget},
};

const CONTROLS: [(&str, &str); 7] = [
    ("n", "Next"),
    ("p", "Prev"),
    ("g/G", "First/Last"),
    ("+/-", "Page size"),
    ("r", "Reverse"),
    ("c", "Columns"),
    ("q", "Quit"),
];

/// Bottom bar: key hints on the left, paging position (or a status message) on the right.
#[derive(Default)]
pub struct Controls {
    pub page: usize,
    pub page_count: usize,
    pub row_count: usize,
    pub status: Option<String>,
}

impl Controls {
    pub fn new(page: usize, page_count: usize, row_count: usize) -> Self {
        Self {
            page,
            page_count,
            row_count,
            status: None,
        }
    }

    pub fn with_status(mut self, status: Option<String>) -> Self {
        self.status = status;
        self
    }

    pub fn position_text(&self) -> String {
        format!(
            "Page {}/{} · {} rows",
            self.page, self.page_count, self.row_count
        )
    }
}

impl Widget for &Controls {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let mut constraints = CONTROLS.iter().fold(vec![], |mut acc, (key, action)| {
            acc.push(Constraint::Length(key.chars().count() as u16 + 2));
            acc.push(Constraint::Length(action.chars().count() as u16 + 1));
            acc
        });
        constraints.push(Constraint::Fill(1));

        let layout = Layout::new(Direction::Horizontal, constraints).split(area);

        for (i, (key, action)) in CONTROLS.iter().enumerate() {
            let j = i * 2;
            Paragraph::new(*key)
                .style(Style::default().bold())
                .centered()
                .render(layout[j], buf);
            Paragraph::new(*action)
                .style(Style::default().fg(Color::Indexed(252)))
                .render(layout[j + 1], buf);
        }

        let right = layout[layout.len() - 1];
        match &self.status {
            Some(msg) => Paragraph::new(msg.as_str())
                .style(Style::default().fg(Color::Red))
                .right_aligned()
                .render(right, buf),
            None => Paragraph::new(self.position_text())
                .style(Style::default().fg(Color::Cyan))
                .right_aligned()
                .render(right, buf),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_text() {
        assert_eq!(Controls::new(2, 3, 25).position_text(), "Page 2/3 · 25 rows");
    }
}
