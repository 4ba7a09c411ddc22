use clap::Parser;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use parqview::error_display::user_message;
use parqview::widgets::datatable::render_plain;
use parqview::{
    apply_args, App, AppConfig, AppEvent, Args, CacheManager, ConfigManager, PrefsStore,
    QueryState, APP_NAME,
};
use ratatui::DefaultTerminal;
use std::fs::File;
use std::sync::mpsc::channel;
use std::sync::Mutex;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const LOG_FILE: &str = "parqview.log";

/// RUST_LOG wins over the configured level. The viewer logs to a file in the
/// cache directory so output does not corrupt the terminal.
fn init_tracing(config: &AppConfig, to_file: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    if to_file {
        let cache = CacheManager::new(APP_NAME)?;
        cache.ensure_cache_dir()?;
        let file = File::create(cache.cache_file(LOG_FILE))?;
        builder
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .try_init()
            .map_err(|e| eyre!("failed to set up logging: {e}"))?;
    } else {
        builder
            .with_writer(std::io::stderr)
            .try_init()
            .map_err(|e| eyre!("failed to set up logging: {e}"))?;
    }
    Ok(())
}

fn build_query(args: &Args, config: &AppConfig) -> Result<QueryState> {
    let mut options = config.query_options();
    if args.no_cache {
        options.cache_results = false;
    }
    let mut query = QueryState::polars(options)?;

    if args.restore {
        let prefs = PrefsStore::new(ConfigManager::new(APP_NAME)?);
        match prefs.load_session()? {
            Some(session) => {
                info!("restoring previous session");
                query.from_dict(session)?;
            }
            None => warn!("no saved session to restore"),
        }
    }
    apply_args(&mut query, args)?;
    Ok(query)
}

fn save_session(query: &QueryState) {
    let saved = ConfigManager::new(APP_NAME)
        .map(PrefsStore::new)
        .and_then(|prefs| prefs.save_session(&query.to_dict()));
    if let Err(e) = saved {
        warn!(error = %e, "could not save session");
    }
}

fn render(terminal: &mut DefaultTerminal, app: &mut App) -> Result<()> {
    terminal.draw(|frame| frame.render_widget(app, frame.area()))?;
    Ok(())
}

fn run(mut terminal: DefaultTerminal, query: QueryState, config: &AppConfig) -> Result<()> {
    let (tx, rx) = channel::<AppEvent>();
    let mut app = App::new(query, tx.clone(), config);
    render(&mut terminal, &mut app)?;

    loop {
        if crossterm::event::poll(std::time::Duration::from_millis(25))? {
            match crossterm::event::read()? {
                crossterm::event::Event::Key(key) => tx.send(AppEvent::Key(key))?,
                crossterm::event::Event::Resize(cols, rows) => {
                    tx.send(AppEvent::Resize(cols, rows))?
                }
                _ => {}
            }
        }

        let updated = match rx.recv_timeout(std::time::Duration::from_millis(0)) {
            Ok(event) => {
                match event {
                    AppEvent::Exit => break,
                    event => {
                        if let Some(event) = app.event(&event) {
                            tx.send(event)?;
                        }
                    }
                }
                true
            }
            Err(std::sync::mpsc::RecvTimeoutError::Timeout) => false,
            Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => break,
        };

        if updated {
            render(&mut terminal, &mut app)?;
        }
    }

    save_session(&app.query);
    Ok(())
}

fn print_sql(query: &QueryState) {
    match (query.select_query(), query.count_query()) {
        (Some(select), Some(count)) => {
            println!("{select};");
            println!("{count};");
        }
        _ => println!("-- no readable source"),
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    if args.generate_config {
        let config = ConfigManager::new(APP_NAME)?;
        match config.write_default_config(args.force) {
            Ok(path) => {
                println!("Wrote default configuration to {}", path.display());
                return Ok(());
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
    }

    color_eyre::install()?;
    let config = AppConfig::load(APP_NAME)?;
    let interactive = !(args.print || args.sql);
    init_tracing(&config, interactive)?;

    let query = match build_query(&args, &config) {
        Ok(query) => query,
        Err(e) => {
            let message = match e.downcast_ref::<parqview::QueryError>() {
                Some(qe) => user_message(qe),
                None => e.to_string(),
            };
            eprintln!("Error: {}", message);
            std::process::exit(1);
        }
    };

    if args.sql {
        print_sql(&query);
        return Ok(());
    }
    if args.print {
        let first_row = config.display.row_numbers.then(|| query.offset() + 1);
        print!(
            "{}",
            render_plain(query.result(), first_row, config.display.max_column_width)
        );
        println!("{}", page_footer(&query));
        return Ok(());
    }

    let terminal = ratatui::init();
    let result = run(terminal, query, &config);
    ratatui::restore();
    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
    Ok(())
}

fn page_footer(query: &QueryState) -> String {
    format!(
        "-- page {}/{} ({} rows)",
        query.page(),
        query.page_count(),
        query.row_count()
    )
}
