//! Article files on disk: naming, headers, cleanup and chunking.

use chrono::{DateTime, Local, NaiveDate};
use std::path::{Path, PathBuf};

/// Marker the browser server puts in front of a script's return value.
const SCRIPT_PREAMBLE: &str = "Script ran on page and returned:";

/// Separates the metadata header from the article body.
const HEADER_SEPARATOR: &str = "\n---\n";

const MAX_FILENAME_CHARS: usize = 100;

/// Strip characters that are unsafe in file names and join words with `_`.
pub fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| !matches!(c, '\\' | '/' | '*' | '?' | ':' | '"' | '<' | '>' | '|'))
        .collect();
    cleaned
        .trim()
        .replace(' ', "_")
        .chars()
        .take(MAX_FILENAME_CHARS)
        .collect()
}

/// A title guessed from the last path segment of an article URL.
pub fn title_from_url(url: &reqwest::Url) -> String {
    url.path_segments()
        .and_then(|mut segments| segments.rfind(|s| !s.is_empty()))
        .map(|slug| slug.replace('-', "_"))
        .unwrap_or_else(|| "untitled_article".to_string())
}

/// Turn raw `evaluate_script` output into plain Markdown.
///
/// Drops the server's preamble and any code fence, then decodes the text if
/// the script returned it as a JSON string literal.
pub fn clean_extracted(raw: &str) -> String {
    let mut content = match raw.rfind(SCRIPT_PREAMBLE) {
        Some(pos) => raw[pos + SCRIPT_PREAMBLE.len()..].trim(),
        None => raw.trim(),
    };

    if let Some(rest) = content.strip_prefix("```json") {
        content = rest;
    } else if let Some(rest) = content.strip_prefix("```") {
        content = rest;
    }
    if let Some(rest) = content.strip_suffix("```") {
        content = rest;
    }
    let content = content.trim();

    if content.len() >= 2 && content.starts_with('"') && content.ends_with('"') {
        match serde_json::from_str::<String>(content) {
            Ok(decoded) => return decoded,
            Err(e) => {
                tracing::warn!("Extracted text is not a valid JSON string ({e}); unescaping by hand");
                return content[1..content.len() - 1]
                    .replace("\\n", "\n")
                    .replace("\\\"", "\"");
            }
        }
    }
    content.to_string()
}

/// Split a saved article into its header (including the separator) and body.
///
/// Files without a header are all body.
pub fn split_header(content: &str) -> (&str, &str) {
    match content.find(HEADER_SEPARATOR) {
        Some(pos) => {
            let end = pos + HEADER_SEPARATOR.len();
            (&content[..end], &content[end..])
        }
        None => ("", content),
    }
}

/// Group paragraphs into chunks of at most `max_chars` characters.
///
/// A single paragraph longer than the limit becomes its own chunk.
pub fn split_paragraphs(text: &str, max_chars: usize) -> Vec<String> {
    if text.chars().count() <= max_chars {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_len = 0;
    for paragraph in text.split("\n\n") {
        let len = paragraph.chars().count() + 2;
        if current_len + len > max_chars && !current.is_empty() {
            chunks.push(current.join("\n\n"));
            current.clear();
            current_len = 0;
        }
        current.push(paragraph);
        current_len += len;
    }
    if !current.is_empty() {
        chunks.push(current.join("\n\n"));
    }
    chunks
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "untitled".to_string())
}

/// Metadata written at the top of every saved article.
#[derive(Debug, Clone)]
pub struct ArticleMeta {
    pub title: String,
    pub url: String,
    pub category: String,
    pub fetched_at: DateTime<Local>,
}

impl ArticleMeta {
    pub fn header(&self) -> String {
        format!(
            "# {}\n\n**Source**: {}\n**Category**: {}\n**Fetched with**: radar + Chrome DevTools MCP\n**Fetched at**: {}\n\n---\n\n",
            self.title,
            self.url,
            self.category,
            self.fetched_at.format("%Y-%m-%dT%H:%M:%S"),
        )
    }
}

/// Dated article directories under one root.
#[derive(Debug, Clone)]
pub struct ArticleStore {
    root: PathBuf,
    date: NaiveDate,
}

impl ArticleStore {
    /// A store filing articles under today's date.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::for_date(root, Local::now().date_naive())
    }

    pub fn for_date(root: impl Into<PathBuf>, date: NaiveDate) -> Self {
        Self {
            root: root.into(),
            date,
        }
    }

    fn day_dir(&self) -> PathBuf {
        self.root.join(self.date.format("%Y-%m-%d").to_string())
    }

    /// `<root>/<date>/<category>/<title><suffix>.md`
    pub fn article_path(&self, category: &str, title: &str, suffix: &str) -> PathBuf {
        self.day_dir()
            .join(sanitize_filename(category))
            .join(format!("{}{suffix}.md", sanitize_filename(title)))
    }

    /// `<root>/<date>/translated/<stem>_cn.md`
    pub fn translated_path(&self, source: &Path) -> PathBuf {
        self.day_dir()
            .join("translated")
            .join(format!("{}_cn.md", file_stem(source)))
    }

    /// `<root>/<date>/eval/<sanitized stem>.yaml`
    pub fn eval_path(&self, source: &Path) -> PathBuf {
        self.day_dir()
            .join("eval")
            .join(format!("{}.yaml", sanitize_filename(&file_stem(source))))
    }

    /// Write `contents` to `path` unless it already exists.
    ///
    /// Returns `false` when the file was skipped. The write goes through a
    /// temporary file so readers never see a partial article.
    pub async fn save_new(&self, path: &Path, contents: &str) -> std::io::Result<bool> {
        if tokio::fs::try_exists(path).await? {
            tracing::info!("Skipping existing file {}", path.display());
            return Ok(false);
        }
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut tmp_path = path.as_os_str().to_owned();
        tmp_path.push(".tmp");
        let tmp_path = PathBuf::from(tmp_path);
        tokio::fs::write(&tmp_path, contents).await?;
        tokio::fs::rename(&tmp_path, path).await?;
        tracing::info!("Saved {}", path.display());
        Ok(true)
    }

    /// Read the body of a previously saved article, without its header.
    pub async fn read_body(&self, path: &Path) -> std::io::Result<String> {
        let content = tokio::fs::read_to_string(path).await?;
        let (_, body) = split_header(&content);
        Ok(body.trim_start_matches('\n').to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(tmp: &TempDir) -> ArticleStore {
        ArticleStore::for_date(tmp.path(), NaiveDate::from_ymd_opt(2025, 3, 14).unwrap())
    }

    #[test]
    fn sanitize_removes_unsafe_characters() {
        assert_eq!(sanitize_filename(" What? A <Great> Post: Part 1 "), "What_A_Great_Post_Part_1");
        assert_eq!(sanitize_filename("a/b\\c|d*e\"f"), "abcdef");
    }

    #[test]
    fn sanitize_truncates_on_char_boundary() {
        let long = "é".repeat(150);
        assert_eq!(sanitize_filename(&long).chars().count(), 100);
    }

    #[test]
    fn title_comes_from_last_path_segment() {
        let url = reqwest::Url::parse("https://medium.com/@someone/my-first-post-abc123/").unwrap();
        assert_eq!(title_from_url(&url), "my_first_post_abc123");

        let bare = reqwest::Url::parse("https://example.com/").unwrap();
        assert_eq!(title_from_url(&bare), "untitled_article");
    }

    #[test]
    fn clean_strips_preamble_fences_and_quotes() {
        let raw = "# evaluate_script response\nScript ran on page and returned:\n```json\n\"\\n# Title\\n\\nBody with \\\"quotes\\\"\"\n```";
        assert_eq!(clean_extracted(raw), "\n# Title\n\nBody with \"quotes\"");
    }

    #[test]
    fn clean_leaves_plain_markdown_alone() {
        assert_eq!(clean_extracted("  # Title\n\nBody  "), "# Title\n\nBody");
    }

    #[test]
    fn clean_falls_back_on_invalid_json_string() {
        assert_eq!(clean_extracted("\"line\\nnext \\q\""), "line\nnext \\q");
    }

    #[test]
    fn header_splits_after_separator() {
        let meta = ArticleMeta {
            title: "T".into(),
            url: "https://example.com/t".into(),
            category: "tech".into(),
            fetched_at: Local::now(),
        };
        let doc = format!("{}Body text", meta.header());
        let (header, body) = split_header(&doc);
        assert!(header.starts_with("# T\n"));
        assert!(header.ends_with("---\n"));
        assert_eq!(body, "\nBody text");

        assert_eq!(split_header("no header"), ("", "no header"));
    }

    #[test]
    fn paragraphs_group_under_limit() {
        let text = ["aaaa", "bbbb", "cccc", "dddd"].join("\n\n");
        let chunks = split_paragraphs(&text, 12);
        assert_eq!(chunks, vec!["aaaa\n\nbbbb", "cccc\n\ndddd"]);
    }

    #[test]
    fn short_text_is_one_chunk() {
        assert_eq!(split_paragraphs("short", 100), vec!["short"]);
    }

    #[test]
    fn oversized_paragraph_stands_alone() {
        let text = format!("{}\n\nsmall", "x".repeat(50));
        let chunks = split_paragraphs(&text, 20);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1], "small");
    }

    #[test]
    fn paths_follow_date_and_category() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);
        let path = store.article_path("tag/rust", "Hello World", "_cn");
        assert_eq!(
            path,
            tmp.path().join("2025-03-14").join("tagrust").join("Hello_World_cn.md")
        );

        let translated = store.translated_path(Path::new("/x/y/post.md"));
        assert_eq!(
            translated,
            tmp.path().join("2025-03-14").join("translated").join("post_cn.md")
        );

        let eval = store.eval_path(Path::new("/x/y/What? Post.md"));
        assert_eq!(eval, tmp.path().join("2025-03-14").join("eval").join("What_Post.yaml"));
    }

    #[tokio::test]
    async fn save_new_skips_existing_files() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);
        let path = store.article_path("cat", "post", "");

        assert!(store.save_new(&path, "first").await.unwrap());
        assert!(!store.save_new(&path, "second").await.unwrap());
        assert_eq!(tokio::fs::read_to_string(&path).await.unwrap(), "first");
        assert!(!path.with_extension("md.tmp").exists());

        let yaml = store.eval_path(Path::new("post.md"));
        assert!(store.save_new(&yaml, "score: 1").await.unwrap());
        assert!(!yaml.with_extension("yaml.tmp").exists());
    }

    #[tokio::test]
    async fn read_body_drops_header() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);
        let path = store.article_path("cat", "post", "");
        let meta = ArticleMeta {
            title: "post".into(),
            url: "https://example.com/post".into(),
            category: "cat".into(),
            fetched_at: Local::now(),
        };
        store
            .save_new(&path, &format!("{}Paragraph one.", meta.header()))
            .await
            .unwrap();

        assert_eq!(store.read_body(&path).await.unwrap(), "Paragraph one.");
    }
}
