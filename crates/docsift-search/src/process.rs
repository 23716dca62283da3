//! Worker-process collaborators.
//!
//! Embedding and reranking run in separate worker programs that speak JSON
//! over stdio. Each call spawns the configured command once.
//!
//! Embedder: `<program> [args] --query <text> --json`, answering
//! `{"success": bool, "embedding": [f32], "elapsed_ms": n, "error": str}`.
//!
//! Reranker: reads `{"query", "passages": [{"index", "text",
//! "original_score"}]}` on stdin and answers with
//! `[{"index", "relevance_score", "original_score"}]` or `{"error": str}`.

use crate::rerank::{RerankCandidate, RerankVerdict, Reranker};
use crate::retrieval::{Embedder, l2_normalize};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::process::{Command, Output, Stdio};
use tracing::debug;

/// Program plus leading arguments of a worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerCommand {
    program: String,
    args: Vec<String>,
}

impl WorkerCommand {
    /// Build from a command line, program first.
    ///
    /// # Errors
    ///
    /// Returns an error for an empty command line.
    pub fn from_argv(argv: &[String]) -> Result<Self> {
        let (program, args) = argv
            .split_first()
            .context("worker command line is empty")?;
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd
    }
}

fn check_status(program: &str, output: &Output) -> Result<()> {
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!("{program} exited with {}: {}", output.status, stderr.trim());
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
struct EmbedReply {
    success: bool,
    #[serde(default)]
    embedding: Vec<f32>,
    #[serde(default)]
    elapsed_ms: Option<f64>,
    #[serde(default)]
    error: Option<String>,
}

/// Embedder backed by a worker program.
#[derive(Debug, Clone)]
pub struct CommandEmbedder {
    worker: WorkerCommand,
}

impl CommandEmbedder {
    #[must_use]
    pub const fn new(worker: WorkerCommand) -> Self {
        Self { worker }
    }
}

impl Embedder for CommandEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let output = self
            .worker
            .command()
            .args(["--query", text, "--json"])
            .stdin(Stdio::null())
            .output()
            .with_context(|| format!("failed to run embedding worker {}", self.worker.program))?;
        check_status(&self.worker.program, &output)?;

        let reply: EmbedReply = serde_json::from_slice(&output.stdout)
            .context("embedding worker returned invalid JSON")?;
        if !reply.success {
            anyhow::bail!(
                "embedding worker reported failure: {}",
                reply.error.as_deref().unwrap_or("no error message")
            );
        }
        if reply.embedding.is_empty() {
            anyhow::bail!("embedding worker returned an empty vector");
        }
        debug!(
            dims = reply.embedding.len(),
            elapsed_ms = reply.elapsed_ms,
            "query embedded"
        );

        let mut vector = reply.embedding;
        l2_normalize(&mut vector);
        Ok(vector)
    }
}

#[derive(Debug, Serialize)]
struct RerankRequest<'a> {
    query: &'a str,
    passages: &'a [RerankCandidate],
}

#[derive(Debug, Deserialize)]
struct RerankScore {
    index: usize,
    relevance_score: f64,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RerankReply {
    Scores(Vec<RerankScore>),
    Failed { error: String },
}

/// Reranker backed by a worker program.
#[derive(Debug, Clone)]
pub struct CommandReranker {
    worker: WorkerCommand,
}

impl CommandReranker {
    #[must_use]
    pub const fn new(worker: WorkerCommand) -> Self {
        Self { worker }
    }
}

impl Reranker for CommandReranker {
    fn rerank(
        &self,
        query: &str,
        candidates: &[RerankCandidate],
        limit: usize,
    ) -> Result<Vec<RerankVerdict>> {
        let payload = serde_json::to_vec(&RerankRequest {
            query,
            passages: candidates,
        })
        .context("failed to encode rerank request")?;

        let mut child = self
            .worker
            .command()
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("failed to run rerank worker {}", self.worker.program))?;
        child
            .stdin
            .take()
            .context("rerank worker stdin unavailable")?
            .write_all(&payload)
            .context("failed to send rerank request")?;
        let output = child
            .wait_with_output()
            .context("rerank worker did not finish")?;
        check_status(&self.worker.program, &output)?;

        let reply: RerankReply = serde_json::from_slice(&output.stdout)
            .context("rerank worker returned invalid JSON")?;
        match reply {
            RerankReply::Failed { error } => anyhow::bail!("rerank worker reported failure: {error}"),
            RerankReply::Scores(scores) => Ok(scores
                .into_iter()
                .take(limit)
                .map(|s| RerankVerdict {
                    original_index: s.index,
                    relevance_score: s.relevance_score,
                    reasoning: None,
                })
                .collect()),
        }
    }
}
