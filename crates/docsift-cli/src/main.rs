#![forbid(unsafe_code)]

mod cmd;
mod output;

use clap::{Parser, Subcommand};
use std::env;
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "dsift: hybrid search over OCR'd document corpora",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    Search(cmd::search::SearchArgs),
    Context(cmd::context::ContextArgs),
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("DOCSIFT_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if env::var("DEBUG").is_ok() {
            "docsift=debug,info"
        } else {
            "docsift=info,warn"
        })
    });

    let format = env::var("DOCSIFT_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    // stdout carries results; logs stay on stderr.
    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    debug!(?cli.command, "parsed command line");

    match cli.command {
        Commands::Search(ref args) => cmd::search::run_search(args),
        Commands::Context(ref args) => cmd::context::run_context(args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docsift_core::{ContentTag, PageRange, SearchMode, UnitKind};

    #[test]
    fn search_flags_parse() {
        let cli = Cli::parse_from([
            "dsift",
            "search",
            "net 30",
            "--db",
            "corpus.db",
            "--mode",
            "lexical",
            "-n",
            "5",
            "--content-type",
            "table",
            "--kind",
            "chunk",
            "--pages",
            "3-7",
            "--group",
        ]);
        let Commands::Search(args) = cli.command else {
            panic!("expected search");
        };
        assert_eq!(args.query.query, "net 30");
        assert_eq!(args.query.mode, SearchMode::Lexical);
        assert_eq!(args.query.limit, 5);
        assert_eq!(args.query.content_types, vec![ContentTag::parse("table")]);
        assert_eq!(args.query.kinds, vec![UnitKind::Chunk]);
        assert_eq!(args.query.pages, Some(PageRange { start: 3, end: 7 }));
        assert!(args.group);
        assert!(!args.rerank);
    }

    #[test]
    fn mode_defaults_to_hybrid() {
        let cli = Cli::parse_from(["dsift", "search", "q", "--db", "x.db"]);
        let Commands::Search(args) = cli.command else {
            panic!("expected search");
        };
        assert_eq!(args.query.mode, SearchMode::Hybrid);
        assert_eq!(args.query.threshold, None);
    }

    #[test]
    fn negative_threshold_is_accepted_as_a_value() {
        let cli = Cli::parse_from(["dsift", "search", "q", "--db", "x.db", "--threshold", "-0.2"]);
        let Commands::Search(args) = cli.command else {
            panic!("expected search");
        };
        assert_eq!(args.query.threshold, Some(-0.2));
    }

    #[test]
    fn window_requires_neighbors() {
        let err = Cli::try_parse_from(["dsift", "search", "q", "--db", "x.db", "--window", "2"])
            .expect_err("window without neighbors");
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn context_requires_budget() {
        assert!(Cli::try_parse_from(["dsift", "context", "q", "--db", "x.db"]).is_err());
        let cli = Cli::parse_from(["dsift", "context", "q", "--db", "x.db", "--max-chars", "500"]);
        let Commands::Context(args) = cli.command else {
            panic!("expected context");
        };
        assert_eq!(args.max_chars, 500);
    }

    #[test]
    fn unknown_mode_is_rejected() {
        assert!(Cli::try_parse_from(["dsift", "search", "q", "--db", "x.db", "--mode", "fuzzy"]).is_err());
    }
}
