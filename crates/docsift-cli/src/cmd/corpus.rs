//! Query flags and corpus plumbing shared by `search` and `context`.

use crate::output::{CliError, OutputMode, render_error};
use anyhow::Context as _;
use clap::Args;
use docsift_core::{
    ContentTag, DocumentFilter, ErrorCode, FusionWeights, HeadingRange, MetadataFilter,
    PageRange, SearchConfig, SearchError, SearchFilters, SearchMode, UnitKind,
    load_search_config,
};
use docsift_search::{
    Collaborators, CommandEmbedder, CommandReranker, CorpusStore, Embedder, Reranker,
    SearchEngine, SearchRequest, WorkerCommand,
};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Flags that shape a query, common to every subcommand.
#[derive(Args, Debug, Clone)]
pub struct QueryArgs {
    /// Query text.
    pub query: String,

    /// Corpus database written by ingestion.
    #[arg(long, value_name = "PATH")]
    pub db: PathBuf,

    /// Retrieval sources to use.
    #[arg(long, default_value = "hybrid", value_parser = parse_mode)]
    pub mode: SearchMode,

    /// Maximum number of results.
    #[arg(short = 'n', long, default_value_t = SearchRequest::DEFAULT_LIMIT)]
    pub limit: usize,

    /// Restrict to a document id (repeatable).
    #[arg(long = "document", value_name = "ID")]
    pub documents: Vec<String>,

    /// Restrict to a content type such as table or code (repeatable).
    #[arg(long = "content-type", value_name = "TYPE", value_parser = parse_content_tag)]
    pub content_types: Vec<ContentTag>,

    /// Restrict to a content class: chunk, vlm_description, extraction (repeatable).
    #[arg(long = "kind", value_name = "KIND")]
    pub kinds: Vec<UnitKind>,

    /// Page range such as `3-7`, or a single page.
    #[arg(long, value_name = "A-B", value_parser = parse_page_range)]
    pub pages: Option<PageRange>,

    /// Heading-level range such as `1-2`.
    #[arg(long = "heading-levels", value_name = "A-B", value_parser = parse_heading_range)]
    pub heading_levels: Option<HeadingRange>,

    /// Only units that must not be split (tables, figures).
    #[arg(long)]
    pub atomic_only: bool,

    /// Section path prefix (case-sensitive).
    #[arg(long = "section", value_name = "PREFIX")]
    pub section_prefix: Option<String>,

    /// Restrict to documents of a file type (repeatable).
    #[arg(long = "file-type", value_name = "EXT")]
    pub file_types: Vec<String>,

    /// Restrict to documents whose title contains this text.
    #[arg(long, value_name = "TEXT")]
    pub title: Option<String>,

    /// Minimum document OCR quality, 0 to 5.
    #[arg(long, value_name = "Q")]
    pub min_quality: Option<f64>,

    /// Restrict to documents in a cluster.
    #[arg(long, value_name = "ID")]
    pub cluster: Option<String>,

    /// Fixed similarity cutoff instead of the adaptive threshold.
    #[arg(long, value_name = "SIM", allow_hyphen_values = true)]
    pub threshold: Option<f64>,

    /// Lexical fusion weight; overrides routing.
    #[arg(long, value_name = "W")]
    pub lexical_weight: Option<f64>,

    /// Semantic fusion weight; overrides routing.
    #[arg(long, value_name = "W")]
    pub semantic_weight: Option<f64>,

    /// Do not add synonym alternates to the lexical query.
    #[arg(long)]
    pub no_expand: bool,

    /// Do not adapt fusion weights to the query shape.
    #[arg(long)]
    pub no_auto_route: bool,

    /// Output format (defaults to pretty on a terminal, text otherwise).
    #[arg(long, value_enum)]
    pub format: Option<OutputMode>,
}

fn parse_mode(raw: &str) -> Result<SearchMode, String> {
    raw.parse()
}

fn parse_content_tag(raw: &str) -> Result<ContentTag, String> {
    Ok(ContentTag::parse(raw))
}

fn parse_bounds(raw: &str) -> Result<(u32, u32), String> {
    let (start, end) = raw.split_once('-').unwrap_or((raw, raw));
    let parse = |s: &str| {
        s.trim()
            .parse::<u32>()
            .map_err(|e| format!("{s:?} is not a number: {e}"))
    };
    Ok((parse(start)?, parse(end)?))
}

fn parse_page_range(raw: &str) -> Result<PageRange, String> {
    let (start, end) = parse_bounds(raw)?;
    Ok(PageRange { start, end })
}

fn parse_heading_range(raw: &str) -> Result<HeadingRange, String> {
    let (min, max) = parse_bounds(raw)?;
    let narrow = |v: u32| u8::try_from(v).map_err(|_| format!("heading level {v} is too large"));
    Ok(HeadingRange {
        min: narrow(min)?,
        max: narrow(max)?,
    })
}

impl QueryArgs {
    pub fn output_mode(&self) -> OutputMode {
        crate::output::resolve_output_mode(self.format)
    }

    fn filters(&self) -> SearchFilters {
        SearchFilters {
            documents: if self.documents.is_empty() {
                DocumentFilter::Unset
            } else {
                DocumentFilter::resolved(self.documents.iter().cloned())
            },
            content_types: self.content_types.clone(),
            unit_kinds: self.kinds.clone(),
            pages: self.pages,
            heading_levels: self.heading_levels,
            atomic_only: self.atomic_only,
            section_prefix: self.section_prefix.clone(),
        }
    }

    fn metadata(&self) -> MetadataFilter {
        MetadataFilter {
            file_types: self.file_types.clone(),
            title_contains: self.title.clone(),
            min_quality: self.min_quality,
            cluster_id: self.cluster.clone(),
        }
    }

    fn weights(&self, config: &SearchConfig) -> Option<FusionWeights> {
        if self.lexical_weight.is_none() && self.semantic_weight.is_none() {
            return None;
        }
        Some(FusionWeights {
            lexical: self.lexical_weight.unwrap_or(config.lexical_weight),
            semantic: self.semantic_weight.unwrap_or(config.semantic_weight),
        })
    }

    /// Request carrying every query flag; command-specific switches are
    /// left at their defaults.
    pub fn request(&self, config: &SearchConfig) -> SearchRequest {
        let mut request = SearchRequest::new(self.query.clone())
            .with_mode(self.mode)
            .with_limit(self.limit)
            .with_filters(self.filters());
        request.metadata = self.metadata();
        request.weights = self.weights(config);
        request.threshold = self.threshold;
        if self.no_expand {
            request.expand = Some(false);
        }
        if self.no_auto_route {
            request.auto_route = Some(false);
        }
        request
    }
}

/// An opened corpus with its configuration and configured workers.
pub struct Corpus {
    pub store: CorpusStore,
    pub config: SearchConfig,
    embedder: Option<CommandEmbedder>,
    reranker: Option<CommandReranker>,
}

impl Corpus {
    /// Open `db` and load `.docsift/config.toml` from its directory.
    ///
    /// Failures are rendered to stderr with their error code before being
    /// returned.
    pub fn open(db: &Path, output: OutputMode) -> anyhow::Result<Self> {
        if !db.is_file() {
            let code = ErrorCode::CorpusNotFound;
            render_error(
                output,
                &CliError::with_details(
                    format!("{}: {}", code.message(), db.display()),
                    code.hint(),
                    code.code(),
                ),
            )?;
            anyhow::bail!("corpus database not found: {}", db.display());
        }

        let corpus_dir = db.parent().unwrap_or_else(|| Path::new("."));
        let config = load_search_config(corpus_dir).or_else(|err| report(output, err))?;
        let store = CorpusStore::open(db)
            .with_context(|| format!("failed to open corpus {}", db.display()))?;

        let embedder = config
            .workers
            .embedder
            .as_deref()
            .map(|argv| WorkerCommand::from_argv(argv).map(CommandEmbedder::new))
            .transpose()
            .context("invalid [workers] embedder command")?;
        let reranker = config
            .workers
            .reranker
            .as_deref()
            .map(|argv| WorkerCommand::from_argv(argv).map(CommandReranker::new))
            .transpose()
            .context("invalid [workers] reranker command")?;
        info!(
            db = %db.display(),
            vec = store.vec_enabled(),
            embedder = embedder.is_some(),
            reranker = reranker.is_some(),
            "corpus opened"
        );

        Ok(Self {
            store,
            config,
            embedder,
            reranker,
        })
    }

    pub fn engine(&self) -> Result<SearchEngine<'_>, SearchError> {
        let collaborators = Collaborators {
            lexical: &self.store,
            vector: Some(&self.store),
            embedder: self.embedder.as_ref().map(|e| e as &dyn Embedder),
            reranker: self.reranker.as_ref().map(|r| r as &dyn Reranker),
            metadata: Some(&self.store),
            enrichment: Some(&self.store),
        };
        debug!(semantic = collaborators.embedder.is_some(), "engine assembled");
        SearchEngine::new(collaborators, self.config.clone())
    }
}

/// Render a [`SearchError`] with its code, then fail.
pub fn report<T>(output: OutputMode, err: SearchError) -> anyhow::Result<T> {
    render_error(output, &CliError::from(&err))?;
    Err(anyhow::Error::new(err))
}
