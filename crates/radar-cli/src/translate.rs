//! Chunked Markdown translation through tool-less chat.

use crate::article::{self, ArticleStore};
use crate::Outcome;
use futures_util::future::join_all;
use radar_core::Agent;
use radar_types::Turn;
use std::path::{Path, PathBuf};
use tokio::sync::Semaphore;

/// The instruction sent with every chunk.
pub fn translation_prompt(content: &str) -> String {
    format!(
        "Translate the following Markdown into professional, fluent Simplified Chinese and tidy its layout.\n\
         \n\
         Content:\n\
         {content}\n\
         \n\
         Requirements:\n\
         1. Remove web UI noise mixed into the text (\"Listen\", \"Share\", \"Follow\", \"Just now\", \"min read\", \"Press enter to view\" and similar). Keep exactly one blank line between paragraphs.\n\
         2. Translate accurately in a style natural for Chinese technical readers. For technical terms or uncertain phrases use the form \"中文翻译 (Original English Phrase)\".\n\
         3. Keep the Markdown structure: headings, code blocks and lists.\n\
         4. Reply with the translated Markdown only, without any explanation."
    )
}

/// Translate `text` chunk by chunk, never failing as a whole.
///
/// A chunk the model cannot translate is replaced by a marked placeholder.
pub async fn translate_text(agent: &Agent, text: &str, chunk_chars: usize) -> String {
    let chunks = article::split_paragraphs(text, chunk_chars);
    if chunks.len() > 1 {
        tracing::info!("Translating in {} chunks", chunks.len());
    }

    let mut translated = Vec::with_capacity(chunks.len());
    for (i, chunk) in chunks.iter().enumerate() {
        let n = i + 1;
        tracing::debug!("Translating chunk {n}/{} ({} chars)", chunks.len(), chunk.chars().count());
        match agent.chat(&[Turn::user(translation_prompt(chunk))]).await {
            Ok(reply) if !reply.trim().is_empty() => translated.push(reply),
            Ok(_) => {
                tracing::warn!("Chunk {n} came back empty");
                translated.push(format!("\n[Translation failed for chunk {n}]\n{chunk}\n"));
            }
            Err(e) => {
                tracing::error!("Chunk {n} failed: {e}");
                translated.push(format!("\n[Translation error for chunk {n}]\n"));
            }
        }
    }
    translated.join("\n\n")
}

/// Translate one saved article into `<date>/translated/<stem>_cn.md`.
///
/// The metadata header is copied untouched; only the body is translated.
pub async fn translate_file(
    agent: &Agent,
    store: &ArticleStore,
    path: &Path,
    chunk_chars: usize,
) -> Outcome {
    if path.to_string_lossy().ends_with("_cn.md") {
        tracing::info!("Skipping already translated file {}", path.display());
        return Outcome::Skipped;
    }
    let output = store.translated_path(path);
    if output.exists() {
        tracing::info!("Translation already exists: {}", output.display());
        return Outcome::Skipped;
    }

    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) => return Outcome::Failed(format!("cannot read {}: {e}", path.display())),
    };
    let (header, body) = article::split_header(&content);
    let body = body.trim_start_matches('\n');
    tracing::info!("Translating {} ({} chars)", path.display(), body.chars().count());

    let translated = translate_text(agent, body, chunk_chars).await;
    let document = if header.is_empty() {
        translated
    } else {
        format!("{header}\n{translated}")
    };
    match store.save_new(&output, &document).await {
        Ok(true) => Outcome::Saved(output),
        Ok(false) => Outcome::Skipped,
        Err(e) => Outcome::Failed(format!("cannot write {}: {e}", output.display())),
    }
}

/// Translate many files, at most `concurrency` at a time.
pub async fn translate_files(
    agent: &Agent,
    store: &ArticleStore,
    files: &[PathBuf],
    chunk_chars: usize,
    concurrency: usize,
) -> Vec<(PathBuf, Outcome)> {
    let semaphore = Semaphore::new(concurrency.max(1));
    let tasks = files.iter().map(|path| {
        let semaphore = &semaphore;
        async move {
            let outcome = match semaphore.acquire().await {
                Ok(_permit) => translate_file(agent, store, path, chunk_chars).await,
                Err(e) => Outcome::Failed(e.to_string()),
            };
            tracing::info!("Finished {}", path.display());
            (path.clone(), outcome)
        }
    });
    join_all(tasks).await
}
