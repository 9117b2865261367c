//! `construct-rag` command-line front end.
//!
//! ```text
//! construct-rag build --source docs/handbook.pdf
//! construct-rag query "How long does concrete take to cure?" -k 3
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing_subscriber::EnvFilter;

use construct_rag::config::{DEFAULT_EMBEDDING_MODEL, DEFAULT_INDEX_PATH};
use construct_rag::hashing::DEFAULT_HASHING_DIMENSIONS;
use construct_rag::{
    ChunkingScope, EmbeddingProvider, GeminiEmbeddingProvider, HashingEmbeddingProvider,
    IndexBuilder, RagConfig, Retriever, TaskType,
};

const PROMPT: &str = "question> ";

#[derive(Parser)]
#[command(name = "construct-rag", version, about = "Build and query a construction-domain retrieval index")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build an index from a PDF or text document, replacing any existing index.
    Build(BuildArgs),
    /// Print the passages most similar to a question.
    Query(QueryArgs),
}

#[derive(Args)]
struct BuildArgs {
    /// Source document (.pdf, or text with form feeds between pages).
    #[arg(long)]
    source: PathBuf,
    /// Index directory.
    #[arg(long, env = "CONSTRUCT_RAG_INDEX", default_value = DEFAULT_INDEX_PATH)]
    index: PathBuf,
    /// Maximum characters per chunk.
    #[arg(long, default_value_t = 2000)]
    chunk_size: usize,
    /// Minimum characters shared by adjacent chunks.
    #[arg(long, default_value_t = 200)]
    chunk_overlap: usize,
    /// Chunk the whole document as one stream, or each page separately.
    #[arg(long, value_enum, default_value_t = Scope::Document)]
    scope: Scope,
    /// Texts per embedding request.
    #[arg(long, default_value_t = 100)]
    batch_size: usize,
    #[command(flatten)]
    embedding: EmbeddingArgs,
}

#[derive(Args)]
struct QueryArgs {
    /// The question to retrieve passages for.
    question: String,
    /// Index directory.
    #[arg(long, env = "CONSTRUCT_RAG_INDEX", default_value = DEFAULT_INDEX_PATH)]
    index: PathBuf,
    /// Number of passages to return.
    #[arg(short, long, default_value_t = 3)]
    k: usize,
    /// Print similarity scores next to passages.
    #[arg(long)]
    scores: bool,
    /// Keep the process alive and answer one question per line until EOF or Ctrl-C.
    #[arg(long)]
    interactive: bool,
    #[command(flatten)]
    embedding: EmbeddingArgs,
}

#[derive(Args)]
struct EmbeddingArgs {
    /// Embedding backend.
    #[arg(long, value_enum, default_value_t = Provider::Gemini)]
    provider: Provider,
    /// Embedding model (Gemini only).
    #[arg(long, default_value = DEFAULT_EMBEDDING_MODEL)]
    model: String,
    /// Gemini API key.
    #[arg(long, env = "GOOGLE_API_KEY", hide_env_values = true)]
    api_key: Option<String>,
    /// Vector size for the hashing provider.
    #[arg(long, default_value_t = DEFAULT_HASHING_DIMENSIONS)]
    dimensions: usize,
    /// Embedding request timeout in seconds.
    #[arg(long, default_value_t = 30)]
    timeout: u64,
}

#[derive(Clone, Copy, ValueEnum)]
enum Provider {
    Gemini,
    Hashing,
}

#[derive(Clone, Copy, ValueEnum)]
enum Scope {
    Document,
    Page,
}

impl From<Scope> for ChunkingScope {
    fn from(scope: Scope) -> Self {
        match scope {
            Scope::Document => ChunkingScope::Document,
            Scope::Page => ChunkingScope::Page,
        }
    }
}

impl EmbeddingArgs {
    fn provider(
        &self,
        config: &RagConfig,
        task_type: TaskType,
    ) -> anyhow::Result<Arc<dyn EmbeddingProvider>> {
        match self.provider {
            Provider::Gemini => {
                let api_key = self
                    .api_key
                    .clone()
                    .context("a Gemini API key is required (--api-key or GOOGLE_API_KEY)")?;
                let provider =
                    GeminiEmbeddingProvider::from_config(api_key, config)?.with_task_type(task_type);
                Ok(Arc::new(provider))
            }
            Provider::Hashing => Ok(Arc::new(HashingEmbeddingProvider::new(self.dimensions)?)),
        }
    }
}

async fn build(args: BuildArgs) -> anyhow::Result<()> {
    let config = RagConfig::builder()
        .chunk_size(args.chunk_size)
        .chunk_overlap(args.chunk_overlap)
        .chunking_scope(args.scope.into())
        .embedding_batch_size(args.batch_size)
        .embedding_model(&args.embedding.model)
        .request_timeout_secs(args.embedding.timeout)
        .index_path(&args.index)
        .build()?;

    let provider = args.embedding.provider(&config, TaskType::RetrievalDocument)?;
    let report = IndexBuilder::new(config, provider)?
        .build_from_path(&args.source, &args.index)
        .await
        .with_context(|| format!("failed to build index from {}", args.source.display()))?;

    println!(
        "Indexed {} page(s) into {} chunk(s) ({} dims, model {}) at {}",
        report.page_count,
        report.chunk_count,
        report.dimensions,
        report.model_id,
        report.index_path.display()
    );
    Ok(())
}

async fn answer(retriever: &Retriever, args: &QueryArgs, question: &str) -> anyhow::Result<()> {
    let results = retriever
        .search(question, &args.index, args.k)
        .await
        .with_context(|| format!("failed to query index at {}", args.index.display()))?;

    if results.is_empty() {
        println!("(no matching passages)");
    }
    for (i, result) in results.iter().enumerate() {
        if args.scores {
            println!("--- [{}] score={:.4} id={}", i + 1, result.score, result.chunk.id);
        } else {
            println!("--- [{}]", i + 1);
        }
        println!("{}", result.chunk.text);
    }
    Ok(())
}

async fn query(args: QueryArgs) -> anyhow::Result<()> {
    let config = RagConfig::builder()
        .top_k(args.k)
        .index_path(&args.index)
        .embedding_model(&args.embedding.model)
        .request_timeout_secs(args.embedding.timeout)
        .build()?;

    let provider = args.embedding.provider(&config, TaskType::RetrievalQuery)?;
    let retriever = Retriever::new(config, provider)?.with_cache();

    answer(&retriever, &args, &args.question).await?;
    if !args.interactive {
        return Ok(());
    }

    let mut editor = DefaultEditor::new()?;
    loop {
        // The editor blocks on the terminal, so keep it off the async workers.
        let read = tokio::task::block_in_place(|| editor.readline(PROMPT));
        let question = match next_input(read)? {
            Input::Question(question) => question,
            Input::Blank => continue,
            Input::End => return Ok(()),
        };
        editor.add_history_entry(question.as_str())?;
        // A failed question should not end the session.
        if let Err(e) = answer(&retriever, &args, &question).await {
            eprintln!("error: {e:#}");
        }
    }
}

/// One line read from the interactive prompt.
#[derive(Debug, PartialEq)]
enum Input {
    Question(String),
    Blank,
    End,
}

/// EOF (Ctrl-D) and Ctrl-C both end the session; other editor errors are fatal.
fn next_input(read: Result<String, ReadlineError>) -> Result<Input, ReadlineError> {
    match read {
        Ok(line) => {
            let question = line.trim();
            Ok(if question.is_empty() { Input::Blank } else { Input::Question(question.to_string()) })
        }
        Err(ReadlineError::Eof | ReadlineError::Interrupted) => Ok(Input::End),
        Err(e) => Err(e),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    match Cli::parse().command {
        Command::Build(args) => build(args).await,
        Command::Query(args) => query(args).await,
    }
}
