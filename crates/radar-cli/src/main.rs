//! radar: fetch, translate and score blog articles with a browser-driving model.

mod article;
mod eval;
mod feeds;
mod fetch;
mod logging;
#[cfg(test)]
mod testing;
mod translate;

use anyhow::{Context, Result};
use article::ArticleStore;
use clap::{Parser, Subcommand};
use radar_api::OpenAiProvider;
use radar_config::{CliOverrides, RadarConfig};
use radar_core::{Agent, AgentEvent, Session};
use radar_types::{Conversation, Turn, Usage};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "radar", version, about = "Fetch, translate and score blog articles through a browser-driving model")]
struct Cli {
    /// Path to a config file (default: ./radar.toml, then ~/.radar/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Model to use
    #[arg(long, global = true)]
    model: Option<String>,

    /// Maximum model rounds per conversation
    #[arg(long, global = true)]
    max_rounds: Option<usize>,

    /// Enable verbose/debug logging
    #[arg(long, global = true)]
    verbose: bool,

    /// Do not write a log file
    #[arg(long, global = true)]
    no_log_file: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one conversation and print the answer
    Ask {
        prompt: String,
        /// Answer without starting the browser tools
        #[arg(long)]
        no_tools: bool,
    },
    /// Fetch articles and save them as Markdown
    Fetch {
        #[arg(required_unless_present = "rss", conflicts_with = "rss")]
        urls: Vec<String>,
        /// YAML file listing RSS/Atom feeds (`feeds: [...]`) to fetch from
        #[arg(long)]
        rss: Option<PathBuf>,
        /// Maximum articles per feed (0 for all)
        #[arg(long, requires = "rss")]
        limit: Option<usize>,
        /// Directory name to file URL articles under
        #[arg(long, default_value = "single_url_fetch")]
        category: String,
        /// Also write a Chinese translation next to each article
        #[arg(long)]
        translate: bool,
    },
    /// Translate saved articles into Chinese
    Translate {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Score saved articles against the review rubric
    Eval {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// List the tools the browser server exposes
    Tools,
}

/// What happened to one article or file.
#[derive(Debug)]
pub enum Outcome {
    Saved(PathBuf),
    Skipped,
    Failed(String),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = RadarConfig::load(CliOverrides {
        config_path: cli.config,
        model: cli.model,
        max_rounds: cli.max_rounds,
    })
    .context("Failed to load configuration")?;

    let logs_dir = (!cli.no_log_file).then_some(config.output.logs_dir.as_path());
    logging::init(cli.verbose, logs_dir)?;
    if let Some(source) = &config.source {
        tracing::debug!("Loaded config from {}", source.display());
    }

    match cli.command {
        Command::Ask { prompt, no_tools } => ask(&config, &prompt, !no_tools).await,
        Command::Fetch {
            urls,
            rss,
            limit,
            category,
            translate,
        } => {
            let jobs = match rss {
                Some(path) => feed_jobs(&path, limit).await?,
                None => url_jobs(&urls, &category)?,
            };
            fetch(&config, jobs, translate).await
        }
        Command::Translate { files } => translate(&config, &files).await,
        Command::Eval { files } => evaluate(&config, &files).await,
        Command::Tools => list_tools(&config).await,
    }
}

fn create_agent(config: &RadarConfig) -> Result<Agent> {
    let provider = OpenAiProvider::new(&config.model.api_key, &config.model.base_url)
        .context("Failed to create API client")?;
    Ok(Agent::new(Arc::new(provider), &config.model.name)
        .with_temperature(config.model.temperature)
        .with_max_tokens(config.model.max_tokens)
        .with_max_rounds(config.agent.max_rounds)
        .with_parallel_tool_calls(config.agent.parallel_tool_calls))
}

async fn connect_tools(agent: Agent, config: &RadarConfig) -> Result<Agent> {
    agent
        .connect(&config.mcp, config.agent.tool_filter())
        .await
        .with_context(|| format!("Failed to start MCP server '{}'", config.mcp.command))
}

async fn ask(config: &RadarConfig, prompt: &str, use_tools: bool) -> Result<()> {
    let mut agent = create_agent(config)?;
    if use_tools {
        agent = connect_tools(agent, config).await?;
    }

    if agent.has_tools() {
        tracing::info!("Tools: {}", agent.tool_names().join(", "));
    }

    let mut conversation = Conversation::from(vec![Turn::user(prompt)]);
    let result = run_agent(&agent, &mut conversation).await;
    agent.shutdown().await;

    let answer = result?;
    if answer.trim().is_empty() {
        tracing::warn!("The model returned an empty answer");
    }
    println!("{answer}");
    Ok(())
}

/// Run the agent loop, reporting tool activity on stderr.
async fn run_agent(agent: &Agent, conversation: &mut Conversation) -> Result<String> {
    let mut err = io::stderr();
    let mut usage = Usage::default();

    let answer = agent
        .run_locked(conversation, |event| match event {
            AgentEvent::ToolStart { name, input } => {
                let _ = writeln!(err, "  [tool: {name} {input}]");
            }
            AgentEvent::ToolEnd {
                name,
                output,
                is_error,
            } => {
                if is_error {
                    let _ = writeln!(err, "  [tool {name} error: {output}]");
                } else {
                    let _ = writeln!(err, "  [tool {name} done: {output}]");
                }
            }
            AgentEvent::Usage(u) => usage = u,
            AgentEvent::Done { rounds } => {
                tracing::info!("Finished after {rounds} of {} round(s)", agent.max_rounds());
            }
            AgentEvent::Error(e) => {
                let _ = writeln!(err, "Error: {e}");
            }
        })
        .await?;

    print_usage(&usage);
    Ok(answer)
}

fn url_jobs(urls: &[String], category: &str) -> Result<Vec<fetch::FetchJob>> {
    urls.iter()
        .map(|raw| {
            reqwest::Url::parse(raw)
                .map(|url| fetch::FetchJob::new(url, category))
                .with_context(|| format!("Invalid URL: {raw}"))
        })
        .collect()
}

async fn feed_jobs(path: &Path, limit: Option<usize>) -> Result<Vec<fetch::FetchJob>> {
    let feeds = feeds::load_feed_list(path).await?;
    feeds::collect_jobs(&feeds, limit).await
}

async fn fetch(config: &RadarConfig, jobs: Vec<fetch::FetchJob>, translate: bool) -> Result<()> {
    if jobs.is_empty() {
        println!("Nothing to fetch");
        return Ok(());
    }

    let agent = connect_tools(create_agent(config)?, config).await?;
    let store = ArticleStore::new(&config.output.articles_dir);
    tracing::info!(
        "Fetching {} article(s) with {}, concurrency {}",
        jobs.len(),
        agent.model(),
        config.output.concurrency
    );

    let results = fetch::fetch_all(
        &agent,
        &store,
        &jobs,
        translate,
        config.output.chunk_chars,
        config.output.concurrency,
    )
    .await;
    agent.shutdown().await;

    report(results)
}

async fn translate(config: &RadarConfig, files: &[PathBuf]) -> Result<()> {
    let agent = create_agent(config)?;
    let store = ArticleStore::new(&config.output.articles_dir);
    tracing::info!(
        "Translating {} file(s) with {}, concurrency {}",
        files.len(),
        agent.model(),
        config.output.concurrency
    );

    let results = translate::translate_files(
        &agent,
        &store,
        files,
        config.output.chunk_chars,
        config.output.concurrency,
    )
    .await;

    report(by_path(results))
}

async fn evaluate(config: &RadarConfig, files: &[PathBuf]) -> Result<()> {
    let agent = create_agent(config)?;
    let store = ArticleStore::new(&config.output.articles_dir);
    tracing::info!(
        "Evaluating {} file(s) with {}, concurrency {}",
        files.len(),
        agent.model(),
        config.output.concurrency
    );

    let results = eval::evaluate_files(&agent, &store, files, config.output.concurrency).await;
    report(by_path(results))
}

fn by_path(results: Vec<(PathBuf, Outcome)>) -> Vec<(String, Outcome)> {
    results
        .into_iter()
        .map(|(path, outcome)| (path.display().to_string(), outcome))
        .collect()
}

async fn list_tools(config: &RadarConfig) -> Result<()> {
    let session = Session::connect(&config.mcp, config.agent.tool_filter())
        .await
        .with_context(|| format!("Failed to start MCP server '{}'", config.mcp.command))?;
    tracing::debug!(
        "Session {} exposes {} tool(s)",
        session.id(),
        session.registry().tools().len()
    );

    for tool in session.registry().tools() {
        if tool.description.is_empty() {
            println!("{}", tool.name);
        } else {
            println!("{}: {}", tool.name, tool.description);
        }
    }
    session.close().await;
    Ok(())
}

/// Print one line per item and fail if any item failed.
fn report(results: Vec<(String, Outcome)>) -> Result<()> {
    let mut failed = 0;
    for (item, outcome) in &results {
        match outcome {
            Outcome::Saved(path) => println!("saved    {item} -> {}", path.display()),
            Outcome::Skipped => println!("skipped  {item}"),
            Outcome::Failed(reason) => {
                failed += 1;
                println!("failed   {item}: {reason}");
            }
        }
    }
    if failed > 0 {
        anyhow::bail!("{failed} of {} item(s) failed", results.len());
    }
    Ok(())
}

fn print_usage(usage: &Usage) {
    eprintln!(
        "Tokens: prompt {}, completion {}",
        usage.prompt_tokens, usage.completion_tokens
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fetch_with_global_flags() {
        let cli = Cli::try_parse_from([
            "radar",
            "fetch",
            "https://example.com/a",
            "https://example.com/b",
            "--category",
            "tag_rust",
            "--translate",
            "--max-rounds",
            "5",
            "--no-log-file",
        ])
        .unwrap();
        assert_eq!(cli.max_rounds, Some(5));
        assert!(cli.no_log_file);
        match cli.command {
            Command::Fetch {
                urls,
                category,
                translate,
                ..
            } => {
                assert_eq!(urls.len(), 2);
                assert_eq!(category, "tag_rust");
                assert!(translate);
            }
            _ => panic!("Expected fetch"),
        }
    }

    #[test]
    fn fetch_requires_a_url() {
        assert!(Cli::try_parse_from(["radar", "fetch"]).is_err());
    }

    #[test]
    fn fetch_from_feeds_takes_a_limit() {
        let cli = Cli::try_parse_from(["radar", "fetch", "--rss", "feeds.yaml", "--limit", "5"]).unwrap();
        match cli.command {
            Command::Fetch {
                urls, rss, limit, ..
            } => {
                assert!(urls.is_empty());
                assert_eq!(rss, Some(PathBuf::from("feeds.yaml")));
                assert_eq!(limit, Some(5));
            }
            _ => panic!("Expected fetch"),
        }

        // URLs and feeds do not mix, and a limit only makes sense with feeds.
        assert!(Cli::try_parse_from(["radar", "fetch", "https://a.com/x", "--rss", "f.yaml"]).is_err());
        assert!(Cli::try_parse_from(["radar", "fetch", "https://a.com/x", "--limit", "2"]).is_err());
    }

    #[test]
    fn eval_requires_files() {
        assert!(Cli::try_parse_from(["radar", "eval"]).is_err());
        let cli = Cli::try_parse_from(["radar", "eval", "a.md", "b.md"]).unwrap();
        assert!(matches!(cli.command, Command::Eval { ref files } if files.len() == 2));
    }

    #[test]
    fn ask_defaults_to_tools() {
        let cli = Cli::try_parse_from(["radar", "--verbose", "ask", "hello"]).unwrap();
        assert!(cli.verbose);
        assert!(matches!(cli.command, Command::Ask { no_tools: false, .. }));
    }

    #[test]
    fn report_fails_when_anything_failed() {
        assert!(report(vec![("a".into(), Outcome::Skipped)]).is_ok());
        assert!(
            report(vec![
                ("a".into(), Outcome::Saved(PathBuf::from("a.md"))),
                ("b".into(), Outcome::Failed("boom".into())),
            ])
            .is_err()
        );
    }
}
