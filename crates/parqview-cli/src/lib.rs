//! Shared CLI definitions for parqview.
//!
//! Used by the main application and by the build script (manpage) and
//! gen_docs binary (command-line-options markdown).

use clap::{CommandFactory, Parser};
use std::path::PathBuf;

/// One `--order-by` argument: a column and its direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderArg {
    pub column: String,
    pub descending: bool,
}

/// Parse `COL`, `COL:asc` or `COL:desc` (direction is case-insensitive).
/// Only the last `:` separates the direction so column names may contain colons.
pub fn parse_order_arg(s: &str) -> Result<OrderArg, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("order-by column must not be empty".to_string());
    }
    if let Some((column, dir)) = s.rsplit_once(':') {
        let descending = match dir.to_lowercase().as_str() {
            "asc" => false,
            "desc" => true,
            _ => {
                return Ok(OrderArg {
                    column: s.to_string(),
                    descending: false,
                })
            }
        };
        if column.is_empty() {
            return Err(format!("missing column name in '{s}'"));
        }
        return Ok(OrderArg {
            column: column.to_string(),
            descending,
        });
    }
    Ok(OrderArg {
        column: s.to_string(),
        descending: false,
    })
}

/// Command-line arguments for parqview
#[derive(Clone, Parser, Debug)]
#[command(
    name = "parqview",
    version,
    about = "Page through Parquet files with column, filter and sort selection",
    long_about = "Page through one or more Parquet files as a single table.\n\n\
                  Files are unioned by column name and each row carries the file it came from in a \
                  `filename` column. Columns, filter clauses and sort keys are turned into SQL and \
                  re-run whenever they change."
)]
pub struct Args {
    /// Parquet file(s) to open. Multiple files are unioned by column name into one table
    #[arg(value_name = "PATH")]
    pub paths: Vec<PathBuf>,

    /// Query a table registered with the backend instead of files
    #[arg(long = "table", value_name = "NAME", conflicts_with = "paths")]
    pub table: Option<String>,

    /// Column to display. Repeat to select several, in order (default: all columns)
    #[arg(long = "field", short = 'f', value_name = "COL")]
    pub fields: Vec<String>,

    /// SQL predicate applied as a WHERE clause. Repeated clauses are combined with AND.
    /// String values must be single-quoted, e.g. --filter "city = 'Oslo'"
    #[arg(long = "filter", short = 'w', value_name = "CLAUSE")]
    pub filters: Vec<String>,

    /// Sort column, optionally suffixed with :asc or :desc. Repeat for secondary keys
    #[arg(long = "order-by", short = 'o', value_name = "COL[:DIR]", value_parser = parse_order_arg)]
    pub order_by: Vec<OrderArg>,

    /// Rows per page (overrides config [query] default_limit)
    #[arg(long = "limit", short = 'n', value_name = "N")]
    pub limit: Option<usize>,

    /// Page to open, 1-indexed. Pages past the end are clamped to the last page
    #[arg(long = "page", value_name = "N")]
    pub page: Option<usize>,

    /// Print the page to stdout and exit instead of opening the viewer
    #[arg(long = "print", action)]
    pub print: bool,

    /// Print the generated selection and count queries and exit
    #[arg(long = "sql", action)]
    pub sql: bool,

    /// Restore the query saved by the previous session (paths on the command line take precedence)
    #[arg(long = "restore", action)]
    pub restore: bool,

    /// Disable the query result cache for this run
    #[arg(long = "no-cache", action)]
    pub no_cache: bool,

    /// Generate default configuration file at ~/.config/parqview/config.toml
    #[arg(long = "generate-config", action)]
    pub generate_config: bool,

    /// Force overwrite existing config file when using --generate-config
    #[arg(long = "force", requires = "generate_config", action)]
    pub force: bool,
}

/// Escape `|` and newlines for use in markdown table cells.
fn escape_table_cell(s: &str) -> String {
    s.replace('|', "\\|").replace(['\n', '\r'], " ")
}

fn value_placeholder(arg: &clap::Arg) -> String {
    arg.get_value_names()
        .map(|names| {
            names
                .iter()
                .map(|n: &clap::builder::Str| format!("<{}>", n.as_ref() as &str))
                .collect::<Vec<_>>()
                .join(" ")
        })
        .unwrap_or_default()
}

/// Render command-line options as markdown.
pub fn render_options_markdown() -> String {
    let mut cmd = Args::command();
    cmd.build();

    let mut out = String::from("# Command Line Options\n\n");

    out.push_str("## Usage\n\n```\n");
    out.push_str(&cmd.render_usage().to_string());
    out.push_str("\n```\n\n");

    out.push_str("## Options\n\n");
    out.push_str("| Option | Description |\n");
    out.push_str("|--------|-------------|\n");

    for arg in cmd.get_arguments() {
        let id = arg.get_id().as_ref().to_string();
        if id == "help" || id == "version" {
            continue;
        }

        let option_str = if arg.is_positional() {
            let placeholder = value_placeholder(arg);
            if arg.is_required_set() {
                placeholder
            } else {
                format!("[{placeholder}]")
            }
        } else {
            let mut parts = Vec::new();
            if let Some(s) = arg.get_short() {
                parts.push(format!("-{s}"));
            }
            if let Some(l) = arg.get_long() {
                parts.push(format!("--{l}"));
            }
            let op = parts.join(", ");
            let placeholder = if arg.get_action().takes_values() {
                value_placeholder(arg)
            } else {
                String::new()
            };
            if placeholder.is_empty() {
                op
            } else {
                format!("{op} {placeholder}")
            }
        };

        let help = arg
            .get_help()
            .map(|h| escape_table_cell(&h.to_string()))
            .unwrap_or_else(|| "-".to_string());

        out.push_str(&format!("| `{option_str}` | {help} |\n"));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_order_arg_plain_column() {
        let arg = parse_order_arg("price").unwrap();
        assert_eq!(arg.column, "price");
        assert!(!arg.descending);
    }

    #[test]
    fn test_parse_order_arg_with_direction() {
        assert!(parse_order_arg("price:desc").unwrap().descending);
        assert!(parse_order_arg("price:DESC").unwrap().descending);
        assert!(!parse_order_arg("price:asc").unwrap().descending);
        assert_eq!(parse_order_arg("a:b:desc").unwrap().column, "a:b");
    }

    #[test]
    fn test_parse_order_arg_unknown_suffix_is_part_of_name() {
        let arg = parse_order_arg("time:12").unwrap();
        assert_eq!(arg.column, "time:12");
        assert!(!arg.descending);
    }

    #[test]
    fn test_parse_order_arg_rejects_empty() {
        assert!(parse_order_arg("").is_err());
        assert!(parse_order_arg(":desc").is_err());
    }

    #[test]
    fn test_args_parse() {
        let args = Args::try_parse_from([
            "parqview",
            "a.parquet",
            "b.parquet",
            "-f",
            "x",
            "--filter",
            "x > 1",
            "--order-by",
            "x:desc",
            "--limit",
            "25",
        ])
        .unwrap();
        assert_eq!(args.paths.len(), 2);
        assert_eq!(args.fields, vec!["x".to_string()]);
        assert_eq!(args.filters, vec!["x > 1".to_string()]);
        assert!(args.order_by[0].descending);
        assert_eq!(args.limit, Some(25));
    }

    #[test]
    fn test_table_conflicts_with_paths() {
        assert!(Args::try_parse_from(["parqview", "a.parquet", "--table", "t"]).is_err());
    }

    #[test]
    fn test_render_options_markdown_lists_options() {
        let md = render_options_markdown();
        assert!(md.contains("--order-by"));
        assert!(md.contains("--generate-config"));
        assert!(!md.contains("`--help`"));
    }
}
