//! `dsift context`: a budgeted, overlap-free reading context for a query.

use super::corpus::{Corpus, QueryArgs, report};
use crate::output::{pretty_kv, pretty_rule, pretty_section, render_mode};
use clap::Args;
use docsift_search::ContextResponse;
use std::io::{self, Write};

#[derive(Args, Debug)]
#[command(
    about = "Assemble reading context for a query",
    long_about = "Search, drop passages that overlap a better-ranked passage from the same \
                  document, then keep passages best-first until the character budget is spent.",
    after_help = "EXAMPLES:\n    # 4000 characters of context\n    dsift context 'termination clauses' --db corpus.db --max-chars 4000"
)]
pub struct ContextArgs {
    #[command(flatten)]
    pub query: QueryArgs,

    /// Character budget for the assembled passages.
    #[arg(long, value_name = "N")]
    pub max_chars: usize,
}

/// Execute `dsift context`.
///
/// # Errors
///
/// Returns an error when the corpus cannot be opened, the query or budget is
/// invalid, a collaborator fails, or output cannot be written.
pub fn run_context(args: &ContextArgs) -> anyhow::Result<()> {
    let output = args.query.output_mode();
    let corpus = Corpus::open(&args.query.db, output)?;
    let engine = corpus.engine().or_else(|err| report(output, err))?;
    let request = args.query.request(&corpus.config);

    let response = engine
        .context(&request, args.max_chars)
        .or_else(|err| report(output, err))?;
    let budget = args.max_chars;
    render_mode(output, &response, render_text, |r, w| {
        render_pretty(r, w, budget)
    })
}

fn render_text(response: &ContextResponse, w: &mut dyn Write) -> io::Result<()> {
    if response.context.passages.is_empty() {
        if let Some(guidance) = &response.guidance {
            writeln!(w, "# {guidance}")?;
        }
        return Ok(());
    }
    writeln!(w, "{}", response.context.render())
}

fn render_pretty(response: &ContextResponse, w: &mut dyn Write, budget: usize) -> io::Result<()> {
    let ctx = &response.context;
    pretty_section(w, &format!("Context: {}", response.query))?;
    pretty_kv(
        w,
        "passages",
        format!("{} ({} of {budget} chars)", ctx.passages.len(), ctx.total_chars),
    )?;
    if ctx.dropped_overlaps > 0 {
        pretty_kv(w, "overlaps", format!("{} dropped", ctx.dropped_overlaps))?;
    }
    if ctx.truncated {
        pretty_kv(w, "budget", "exhausted before the last candidate")?;
    }
    pretty_rule(w)?;
    if ctx.passages.is_empty() {
        if let Some(guidance) = &response.guidance {
            writeln!(w, "{guidance}")?;
        }
    } else {
        writeln!(w, "{}", ctx.render())?;
    }
    Ok(())
}
