//! `dsift search`: ranked retrieval over a corpus.

use super::corpus::{Corpus, QueryArgs, report};
use crate::output::{pretty_kv, pretty_rule, pretty_section, render_mode, snippet};
use clap::Args;
use docsift_core::ScoredResult;
use docsift_search::{EnrichOptions, ResultSet, SearchResponse};
use std::io::{self, Write};

#[derive(Args, Debug)]
#[command(
    about = "Search a corpus",
    long_about = "Search a corpus with hybrid ranking: BM25 full-text and embedding similarity \
                  fused with reciprocal rank fusion, then re-scored by OCR quality and layout.",
    after_help = "EXAMPLES:\n    # Hybrid search\n    dsift search 'payment terms net 30' --db corpus.db\n\n\
                  # Lexical only, tables on pages 3-7\n    dsift search revenue --db corpus.db --mode lexical --content-type table --pages 3-7\n\n\
                  # Grouped by document, machine-readable\n    dsift search 'late fees' --db corpus.db --group --format json"
)]
pub struct SearchArgs {
    #[command(flatten)]
    pub query: QueryArgs,

    /// Group results by document.
    #[arg(long)]
    pub group: bool,

    /// Reorder candidates with the configured rerank worker.
    #[arg(long)]
    pub rerank: bool,

    /// Drop results whose text duplicates a better-ranked one.
    #[arg(long)]
    pub dedup: bool,

    /// Attach neighboring chunks as reading context.
    #[arg(long)]
    pub neighbors: bool,

    /// Chunks on each side for --neighbors (defaults to the configured window).
    #[arg(long, value_name = "N", requires = "neighbors")]
    pub window: Option<u32>,

    /// Attach document cluster memberships.
    #[arg(long)]
    pub clusters: bool,

    /// Attach related documents.
    #[arg(long)]
    pub relations: bool,

    /// Attach table and image metadata.
    #[arg(long)]
    pub media: bool,

    /// Show every score multiplier (pretty output).
    #[arg(long)]
    pub explain: bool,
}

/// Execute `dsift search`.
///
/// # Errors
///
/// Returns an error when the corpus cannot be opened, the query is invalid,
/// a collaborator fails, or output cannot be written.
pub fn run_search(args: &SearchArgs) -> anyhow::Result<()> {
    let output = args.query.output_mode();
    let corpus = Corpus::open(&args.query.db, output)?;
    let engine = corpus.engine().or_else(|err| report(output, err))?;

    let mut request = args.query.request(&corpus.config);
    request.group = args.group;
    request.rerank = args.rerank;
    if args.dedup {
        request.dedup = Some(true);
    }
    request.enrich = EnrichOptions {
        context_window: if args.neighbors {
            args.window.unwrap_or(corpus.config.context_window)
        } else {
            0
        },
        clusters: args.clusters,
        relations: args.relations,
        tables: args.media,
        images: args.media,
    };

    let response = engine.search(&request).or_else(|err| report(output, err))?;
    let explain = args.explain;
    render_mode(output, &response, render_text, |r, w| {
        render_pretty(r, w, explain)
    })
}

fn location(result: &ScoredResult) -> String {
    let unit = &result.unit;
    unit.page_number.map_or_else(
        || unit.document.file_name.clone(),
        |page| format!("{} p.{page}", unit.document.file_name),
    )
}

fn render_text(response: &SearchResponse, w: &mut dyn Write) -> io::Result<()> {
    for (i, result) in response.results.iter_results().into_iter().enumerate() {
        writeln!(
            w,
            "{}\t{:.4}\t{}\t{}\t{}\t{}",
            i + 1,
            result.score,
            result.unit.unit_id,
            result.unit.kind(),
            location(result),
            snippet(&result.unit.text, 100)
        )?;
    }
    if let Some(guidance) = &response.guidance {
        writeln!(w, "# {guidance}")?;
    }
    Ok(())
}

fn render_pretty(response: &SearchResponse, w: &mut dyn Write, explain: bool) -> io::Result<()> {
    let d = &response.decisions;
    pretty_section(w, &format!("Search: {}", response.query))?;
    let mode = if d.effective_mode == response.mode {
        response.mode.to_string()
    } else {
        format!("{} (ran as {})", response.mode, d.effective_mode)
    };
    pretty_kv(w, "mode", mode)?;
    if let Some(expanded) = &response.expanded_query {
        pretty_kv(w, "expanded", expanded)?;
    }
    pretty_kv(
        w,
        "weights",
        format!(
            "lexical {:.2} / semantic {:.2} ({}, query {})",
            d.weights.lexical,
            d.weights.semantic,
            d.weight_source.as_str(),
            d.classification.kind.as_str()
        ),
    )?;
    if let Some(t) = &d.threshold {
        let how = if t.adaptive { "adaptive" } else { "fixed" };
        pretty_kv(w, "threshold", format!("{:.3} ({how})", t.value))?;
    }
    let c = &response.counts;
    pretty_kv(
        w,
        "candidates",
        format!(
            "{} lexical, {} semantic, {} fused, {} returned",
            c.lexical, c.semantic, c.fused, c.returned
        ),
    )?;
    if let Some(reason) = &d.degraded {
        pretty_kv(w, "degraded", reason)?;
    }
    if let Some(err) = &d.rerank_error {
        pretty_kv(w, "rerank", format!("skipped: {err}"))?;
    }
    pretty_rule(w)?;

    match &response.results {
        ResultSet::Flat(results) => {
            for (i, result) in results.iter().enumerate() {
                render_result(w, i + 1, result, explain)?;
            }
        }
        ResultSet::Grouped(groups) => {
            let mut rank = 0;
            for group in groups {
                writeln!(w, "{} ({} results)", group.file_name, group.result_count)?;
                for result in &group.results {
                    rank += 1;
                    render_result(w, rank, result, explain)?;
                }
            }
        }
    }

    if let Some(guidance) = &response.guidance {
        writeln!(w, "{guidance}")?;
    }
    Ok(())
}

fn render_result(
    w: &mut dyn Write,
    rank: usize,
    result: &ScoredResult,
    explain: bool,
) -> io::Result<()> {
    writeln!(
        w,
        "{rank:>3}. {} [{} {:.4}] {}",
        location(result),
        result.score_field.as_str(),
        result.score,
        result.unit.unit_id
    )?;
    writeln!(w, "     {}", snippet(&result.unit.text, 160))?;
    if let Some(heading) = &result.unit.structure.heading_context {
        writeln!(w, "     under: {heading}")?;
    }

    let e = &result.enrichment;
    if let Some(Ok(context)) = &e.context {
        for chunk in context {
            writeln!(w, "     ~ #{} {}", chunk.chunk_index, snippet(&chunk.text, 120))?;
        }
    }
    if let Some(Ok(clusters)) = &e.clusters {
        let labels: Vec<&str> = clusters
            .iter()
            .map(|c| c.label.as_deref().unwrap_or(&c.cluster_id))
            .collect();
        if !labels.is_empty() {
            writeln!(w, "     clusters: {}", labels.join(", "))?;
        }
    }
    if let Some(Ok(relations)) = &e.relations {
        for rel in relations {
            writeln!(w, "     {} -> {}", rel.relation_type, rel.target_document_id)?;
        }
    }
    if let Some(Ok(Some(table))) = &e.table {
        writeln!(
            w,
            "     table: {} ({} rows)",
            table.caption.as_deref().unwrap_or("untitled"),
            table.row_count.map_or_else(|| "?".to_string(), |n| n.to_string())
        )?;
    }
    for diagnostic in e.diagnostics() {
        writeln!(w, "     ! {diagnostic}")?;
    }

    if explain {
        if let Some(c) = &result.components {
            writeln!(
                w,
                "     base {:.4} x quality {:.2} x structure {:.3} (raw {:.3}) x length {:.3} x proximity {:.3}",
                c.base_score,
                c.quality,
                c.cumulative,
                c.cumulative_raw,
                c.length_normalization,
                c.proximity
            )?;
            writeln!(
                w,
                "     heading {:.2}, atomic {:.2}, content {:.2}, confidence {:.3}, header/footer {:.2}",
                c.heading, c.atomic, c.content_type, c.block_confidence, c.header_footer
            )?;
        }
    }
    Ok(())
}
