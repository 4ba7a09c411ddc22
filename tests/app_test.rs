mod common;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use parqview::{App, AppConfig, AppEvent, QueryOptions, QueryState, SortDirection, Source};
use ratatui::{buffer::Buffer, layout::Rect, widgets::Widget};
use std::sync::mpsc::{channel, Receiver};
use tempfile::TempDir;

fn key(code: KeyCode) -> AppEvent {
    AppEvent::Key(KeyEvent::new(code, KeyModifiers::NONE))
}

fn app_with_rows(rows: usize) -> (App, Receiver<AppEvent>, TempDir) {
    let dir = TempDir::new().unwrap();
    let path = common::write_runs(dir.path(), "runs.parquet", rows);
    let mut query = QueryState::polars(QueryOptions::default()).unwrap();
    query.set_sources(Source::files([path])).unwrap();
    let (tx, rx) = channel();
    let app = App::new(query, tx, &AppConfig::default());
    (app, rx, dir)
}

#[test]
fn test_paging_keys() {
    let (mut app, _rx, _dir) = app_with_rows(25);

    app.event(&key(KeyCode::Char('n')));
    assert_eq!(app.query.page(), 2);
    app.event(&key(KeyCode::Char('G')));
    assert_eq!(app.query.page(), 3);
    app.event(&key(KeyCode::Right));
    assert_eq!(app.query.page(), 3);
    app.event(&key(KeyCode::Left));
    assert_eq!(app.query.page(), 2);
    app.event(&key(KeyCode::Char('g')));
    assert_eq!(app.query.page(), 1);
}

#[test]
fn test_page_size_keys() {
    let (mut app, _rx, _dir) = app_with_rows(25);

    app.event(&key(KeyCode::Char('+')));
    assert_eq!(app.query.limit(), 15);
    assert_eq!(app.query.page_count(), 2);

    for _ in 0..5 {
        app.event(&key(KeyCode::Char('-')));
    }
    assert_eq!(app.query.limit(), 1);
    assert!(app.status.is_none());
}

#[test]
fn test_reverse_key_sorts_then_flips() {
    let (mut app, _rx, _dir) = app_with_rows(12);

    app.event(&key(KeyCode::Char('r')));
    assert_eq!(app.query.order_by()[0].field, "id");
    assert_eq!(app.query.order_by()[0].direction, SortDirection::Desc);
    assert_eq!(app.query.rows()[0][0].to_string(), "11");

    app.event(&key(KeyCode::Char('r')));
    assert_eq!(app.query.order_by()[0].direction, SortDirection::Asc);
}

#[test]
fn test_quit_keys() {
    let (mut app, _rx, _dir) = app_with_rows(3);
    assert!(matches!(
        app.event(&key(KeyCode::Char('q'))),
        Some(AppEvent::Exit)
    ));
    let ctrl_c = AppEvent::Key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL));
    assert!(matches!(app.event(&ctrl_c), Some(AppEvent::Exit)));
}

#[test]
fn test_changes_are_forwarded_to_event_channel() {
    let (mut app, rx, _dir) = app_with_rows(25);

    app.event(&key(KeyCode::Char('n')));
    let event = rx.try_recv().expect("change notification");
    let AppEvent::Changed(generation) = event else {
        panic!("expected Changed, got {event:?}");
    };
    assert_eq!(generation, app.query.generation());

    app.event(&event);
    assert_eq!(app.seen_generation, generation);

    // Already on page 1: nothing changes, nothing is sent.
    app.event(&key(KeyCode::Char('g')));
    let _ = rx.try_recv();
    app.event(&key(KeyCode::Char('p')));
    assert!(rx.try_recv().is_err());
}

#[test]
fn test_failed_query_sets_status() {
    let (mut app, _rx, _dir) = app_with_rows(5);
    app.query
        .set_filter_clauses(vec!["missing_column = 1".into()])
        .unwrap_err();
    app.event(&key(KeyCode::Char('r')));
    assert!(app.status.is_some());
}

#[test]
fn test_render_shows_position() {
    let (mut app, _rx, _dir) = app_with_rows(25);
    let area = Rect::new(0, 0, 100, 16);
    let mut buf = Buffer::empty(area);
    (&mut app).render(area, &mut buf);

    let bottom: String = (0..area.width)
        .map(|x| buf[(x, area.height - 1)].symbol().to_string())
        .collect();
    assert!(bottom.contains("Page 1/3"), "bottom line: {bottom}");
}

#[test]
fn test_column_picker_shows_and_hides_columns() {
    let (mut app, _rx, _dir) = app_with_rows(6);

    app.event(&key(KeyCode::Char('c')));
    assert!(app.picker.active);
    assert_eq!(app.picker.columns, vec!["id", "city", "score", "filename"]);
    assert_eq!(app.picker.selected(), Some("id"));

    // Hiding one column while all are shown selects the rest.
    app.event(&key(KeyCode::Down));
    app.event(&key(KeyCode::Char(' ')));
    assert_eq!(app.query.fields(), ["id", "score", "filename"]);
    assert_eq!(app.query.header(), ["id", "score", "filename"]);

    // Moving a hidden column does nothing.
    app.event(&key(KeyCode::Char('[')));
    assert_eq!(app.query.fields(), ["id", "score", "filename"]);

    app.event(&key(KeyCode::Enter));
    assert_eq!(app.query.fields(), ["id", "score", "filename", "city"]);
    app.event(&key(KeyCode::Char('[')));
    assert_eq!(app.query.fields(), ["id", "score", "city", "filename"]);
    assert_eq!(app.query.header(), ["id", "score", "city", "filename"]);

    // Picker keys do not page or quit.
    assert!(app.event(&key(KeyCode::Char('n'))).is_none());
    assert_eq!(app.query.page(), 1);
    app.event(&key(KeyCode::Esc));
    assert!(!app.picker.active);
}

#[test]
fn test_column_picker_moves_columns_from_full_view() {
    let (mut app, _rx, _dir) = app_with_rows(3);
    app.event(&key(KeyCode::Char('c')));
    app.event(&key(KeyCode::Char(']')));
    assert_eq!(app.query.fields(), ["city", "id", "score", "filename"]);
    // The picker keeps source order: the cursor moves from id to city.
    app.event(&key(KeyCode::Char('j')));
    app.event(&key(KeyCode::Char(' ')));
    assert_eq!(app.query.fields(), ["id", "score", "filename"]);
    app.event(&key(KeyCode::Char('c')));
    assert!(!app.picker.active);
}

#[test]
fn test_column_picker_needs_a_source() {
    let (tx, _rx) = channel();
    let query = QueryState::polars(QueryOptions::default()).unwrap();
    let mut app = App::new(query, tx, &AppConfig::default());
    app.event(&key(KeyCode::Char('c')));
    assert!(!app.picker.active);
    assert!(app.status.is_some());
}

#[test]
fn test_render_column_picker() {
    let (mut app, _rx, _dir) = app_with_rows(3);
    app.event(&key(KeyCode::Char('c')));
    let area = Rect::new(0, 0, 100, 16);
    let mut buf = Buffer::empty(area);
    (&mut app).render(area, &mut buf);

    let screen: String = (0..area.height)
        .flat_map(|y| (0..area.width).map(move |x| (x, y)))
        .map(|(x, y)| buf[(x, y)].symbol().to_string())
        .collect();
    assert!(screen.contains("Columns (space"));
    assert!(screen.contains("[x]"));
}
