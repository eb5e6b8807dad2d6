//! Article scoring against a fixed rubric, answered as YAML.

use crate::Outcome;
use crate::article::ArticleStore;
use anyhow::{Context, Result, bail};
use futures_util::future::join_all;
use radar_core::Agent;
use radar_types::Turn;
use regex::Regex;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tokio::sync::Semaphore;

pub const EVALUATION_PROMPT: &str = r#"You are a strict reviewer of technical articles. Score the article you are given from 0 to 100 on four dimensions, 25 points each:

1. Specific problem: does the article pose a concrete problem and use case?
2. Scenario detail: is that scenario described and explained in detail?
3. Concrete solution: does it give a concrete solution for that scenario (code, prompts or steps)?
4. Verifiable metrics: does it provide verifiable, measurable metrics or evaluation results?

Rules:
- Reply with YAML only.
- No Markdown fences (such as ```yaml ... ```).
- No preamble, closing remarks or explanations.
- When there is nothing to quote from the article, `quotes` must be an empty list [].

Fill in this template exactly:
score: <integer 0-100>
analysis:
  problem:
    evaluation: "<assessment>"
    quotes:
      - "<quote 1>"
      - "<quote 2>"
  scenario:
    evaluation: "<assessment>"
    quotes: []
  solution:
    evaluation: "<assessment>"
    quotes: []
  metrics:
    evaluation: "<assessment>"
    quotes: []
reasoning_summary: "<why this score>"
overall_summary: "<one-sentence summary>"
"#;

pub const RETRY_PROMPT: &str = "The output format is wrong. Reply with plain YAML only, containing the fields score, analysis, reasoning_summary and overall_summary. Do not add Markdown headings or any other text.";

static YAML_FENCE: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"(?s)```(?:ya?ml)?\s*(.*?)\s*```"));

/// A parsed rubric result.
#[derive(Debug, Deserialize)]
pub struct Evaluation {
    pub score: u32,
    #[serde(default)]
    pub analysis: serde_yaml::Value,
    #[serde(default)]
    pub reasoning_summary: Option<String>,
    #[serde(default)]
    pub overall_summary: Option<String>,
}

/// The YAML inside the first code fence of `reply`, or the whole reply.
pub fn extract_yaml(reply: &str) -> &str {
    if let Ok(fence) = &*YAML_FENCE {
        if let Some(body) = fence.captures(reply).and_then(|c| c.get(1)) {
            return body.as_str();
        }
    }
    reply.trim()
}

/// Parse a model reply into an [`Evaluation`].
pub fn parse_evaluation(reply: &str) -> Result<Evaluation> {
    let evaluation: Evaluation =
        serde_yaml::from_str(extract_yaml(reply)).context("reply is not a scoring YAML document")?;
    if evaluation.score > 100 {
        bail!("score {} is out of range", evaluation.score);
    }
    Ok(evaluation)
}

/// Score one article, re-prompting once when the reply is not valid YAML.
///
/// Returns the YAML text to store along with its parsed form.
pub async fn evaluate(agent: &Agent, content: &str, title: &str) -> Result<(String, Evaluation)> {
    let mut history = vec![Turn::system(EVALUATION_PROMPT), Turn::user(content)];

    let reply = agent.chat(&history).await?;
    match parse_evaluation(&reply) {
        Ok(evaluation) => return Ok((extract_yaml(&reply).to_string(), evaluation)),
        Err(e) => tracing::warn!("[{title}] Badly formatted evaluation ({e:#}); asking again"),
    }

    history.push(Turn::assistant(reply));
    history.push(Turn::user(RETRY_PROMPT));
    let reply = agent.chat(&history).await?;
    let evaluation = parse_evaluation(&reply).context("model did not return a valid evaluation")?;
    Ok((extract_yaml(&reply).to_string(), evaluation))
}

/// Score one saved article into `<date>/eval/<stem>.yaml`.
pub async fn evaluate_file(agent: &Agent, store: &ArticleStore, path: &Path) -> Outcome {
    let output = store.eval_path(path);
    if output.exists() {
        tracing::info!("Evaluation already exists: {}", output.display());
        return Outcome::Skipped;
    }

    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) => return Outcome::Failed(format!("cannot read {}: {e}", path.display())),
    };
    let title = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    tracing::info!("Evaluating {}", path.display());

    let (yaml, evaluation) = match evaluate(agent, &content, &title).await {
        Ok(result) => result,
        Err(e) => {
            tracing::error!("[{title}] Evaluation failed: {e:#}");
            return Outcome::Failed(format!("{e:#}"));
        }
    };
    tracing::info!(
        "[{title}] Score {}: {}",
        evaluation.score,
        evaluation.overall_summary.as_deref().unwrap_or("")
    );

    match store.save_new(&output, &yaml).await {
        Ok(true) => Outcome::Saved(output),
        Ok(false) => Outcome::Skipped,
        Err(e) => Outcome::Failed(format!("cannot write {}: {e}", output.display())),
    }
}

/// Score many files, at most `concurrency` at a time.
pub async fn evaluate_files(
    agent: &Agent,
    store: &ArticleStore,
    files: &[PathBuf],
    concurrency: usize,
) -> Vec<(PathBuf, Outcome)> {
    let semaphore = Semaphore::new(concurrency.max(1));
    let tasks = files.iter().map(|path| {
        let semaphore = &semaphore;
        async move {
            let outcome = match semaphore.acquire().await {
                Ok(_permit) => evaluate_file(agent, store, path).await,
                Err(e) => Outcome::Failed(e.to_string()),
            };
            tracing::info!("Finished {}", path.display());
            (path.clone(), outcome)
        }
    });
    join_all(tasks).await
}
