//! Article extraction through the browser tools.

use crate::Outcome;
use crate::article::{self, ArticleMeta, ArticleStore};
use crate::translate;
use anyhow::{Result, bail};
use chrono::Local;
use futures_util::future::join_all;
use radar_core::Agent;
use radar_types::{Conversation, Turn, preview};
use reqwest::Url;
use tokio::sync::Semaphore;

/// Tool whose result carries the page text.
const EXTRACT_TOOL: &str = "evaluate_script";

/// Injected into the page to turn the main article into rough Markdown.
const EXTRACT_SCRIPT: &str = r#"() => {
  const article = document.querySelector('article') || document.querySelector('main') || document.body;
  const trash = ['script', 'style', 'iframe', 'noscript', 'header', 'footer', 'nav', '.ad', '.advertisement', '[role="complementary"]'];
  trash.forEach(sel => article.querySelectorAll(sel).forEach(el => el.remove()));
  let text = '';
  const walk = (node) => {
    if (node.nodeType === 3) {
      text += node.textContent;
    } else if (node.nodeType === 1) {
      const tag = node.tagName.toLowerCase();
      if (tag === 'h1') text += `\n# ${node.innerText}\n\n`;
      else if (tag === 'h2') text += `\n## ${node.innerText}\n\n`;
      else if (tag === 'h3') text += `\n### ${node.innerText}\n\n`;
      else if (tag === 'p') text += `\n${node.innerText}\n\n`;
      else if (tag === 'li') text += `- ${node.innerText}\n`;
      else if (tag === 'pre' || tag === 'code') text += `\n\`\`\`\n${node.innerText}\n\`\`\`\n\n`;
      else Array.from(node.childNodes).forEach(walk);
    }
  };
  walk(article);
  return text;
}"#;

pub fn extraction_prompt(url: &Url) -> String {
    format!(
        "Extract the raw content of this article with JavaScript: {url}\n\
         \n\
         Follow these steps in order:\n\
         1. Call `navigate_page` to open the link. Set its `timeout` argument to 15000.\n\
         2. Call `evaluate_script` with the following code as the `function` argument, unchanged:\n\
         {EXTRACT_SCRIPT}\n\
         3. Check the value `evaluate_script` returned. Long Markdown text means the extraction worked. \
         Do not call `take_snapshot` unless `evaluate_script` failed or returned an empty string.\n\
         4. If the extraction worked, do NOT repeat the article. Reply with the single word SUCCESS. \
         Otherwise reply with the reason it failed."
    )
}

/// One article to fetch.
#[derive(Debug, Clone)]
pub struct FetchJob {
    pub url: Url,
    pub title: String,
    pub category: String,
}

impl FetchJob {
    /// A job titled after the URL's last path segment.
    pub fn new(url: Url, category: &str) -> Self {
        let title = article::title_from_url(&url);
        Self::titled(url, &title, category)
    }

    pub fn titled(url: Url, title: &str, category: &str) -> Self {
        Self {
            url,
            title: title.to_string(),
            category: category.to_string(),
        }
    }
}

/// The article text from a finished extraction conversation.
///
/// Prefers the last successful `evaluate_script` output over the model's
/// own reply, which is usually just a status word.
pub fn extracted_content(conversation: &Conversation) -> Option<String> {
    let raw = match conversation.latest_tool_output(EXTRACT_TOOL) {
        Some(raw) => {
            tracing::debug!("Using {EXTRACT_TOOL} output ({} chars)", raw.chars().count());
            raw
        }
        None => {
            tracing::warn!("No {EXTRACT_TOOL} result; falling back to the final answer");
            conversation.final_answer()?
        }
    };
    let content = article::clean_extracted(raw);
    if content.trim().is_empty() {
        None
    } else {
        Some(content)
    }
}

/// Run the extraction conversation for one URL.
pub async fn extract(agent: &Agent, url: &Url) -> Result<String> {
    tracing::info!("Fetching {url}");
    let conversation = agent
        .chat_with_tools_full(vec![Turn::user(extraction_prompt(url))])
        .await?;
    match extracted_content(&conversation) {
        Some(content) => {
            tracing::info!("Extracted {} chars: {}", content.chars().count(), preview(&content, 100));
            Ok(content)
        }
        None => bail!("no article content extracted from {url}"),
    }
}

/// Fetch, save and optionally translate one article.
///
/// An existing original is not fetched again; with `translate` its body is
/// read back so a missing translation can still be produced.
pub async fn fetch_one(
    agent: &Agent,
    store: &ArticleStore,
    job: &FetchJob,
    translate: bool,
    chunk_chars: usize,
) -> Outcome {
    let original = store.article_path(&job.category, &job.title, "");
    let meta = ArticleMeta {
        title: job.title.clone(),
        url: job.url.to_string(),
        category: job.category.clone(),
        fetched_at: Local::now(),
    };

    let (content, outcome) = if original.exists() {
        tracing::info!("Already fetched: {}", original.display());
        if !translate {
            return Outcome::Skipped;
        }
        match store.read_body(&original).await {
            Ok(body) => (body, Outcome::Skipped),
            Err(e) => return Outcome::Failed(format!("cannot read {}: {e}", original.display())),
        }
    } else {
        let content = match extract(agent, &job.url).await {
            Ok(content) => content,
            Err(e) => {
                tracing::error!("Fetching {} failed: {e:#}", job.url);
                return Outcome::Failed(format!("{e:#}"));
            }
        };
        let document = format!("{}{content}", meta.header());
        match store.save_new(&original, &document).await {
            Ok(true) => (content, Outcome::Saved(original)),
            Ok(false) => (content, Outcome::Skipped),
            Err(e) => return Outcome::Failed(format!("cannot write {}: {e}", original.display())),
        }
    };

    if translate {
        let target = store.article_path(&job.category, &job.title, "_cn");
        if target.exists() {
            tracing::info!("Translation already exists: {}", target.display());
        } else {
            let translated = translate::translate_text(agent, &content, chunk_chars).await;
            let document = format!("{}{translated}", meta.header());
            if let Err(e) = store.save_new(&target, &document).await {
                return Outcome::Failed(format!("cannot write {}: {e}", target.display()));
            }
        }
    }
    outcome
}

/// Fetch many articles, at most `concurrency` at a time.
///
/// Browser work is still one conversation at a time through the session's
/// lock; translations of finished articles overlap with it.
pub async fn fetch_all(
    agent: &Agent,
    store: &ArticleStore,
    jobs: &[FetchJob],
    translate: bool,
    chunk_chars: usize,
    concurrency: usize,
) -> Vec<(String, Outcome)> {
    let semaphore = Semaphore::new(concurrency.max(1));
    let tasks = jobs.iter().map(|job| {
        let semaphore = &semaphore;
        async move {
            let outcome = match semaphore.acquire().await {
                Ok(_permit) => fetch_one(agent, store, job, translate, chunk_chars).await,
                Err(e) => Outcome::Failed(e.to_string()),
            };
            tracing::info!("Finished {}", job.title);
            (job.url.to_string(), outcome)
        }
    });
    join_all(tasks).await
}
