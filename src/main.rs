use anyhow::{Context, Result};
use clap::Parser;
use docqa::config::{Config, EmbedderKind};
use docqa::embedder::{AzureOpenAiEmbedder, EmbeddingModel, HashingEmbedder};
use docqa::minilm::MiniLmEmbedder;
use docqa::llm::{AzureOpenAiSynthesizer, LlmClientConfig};
use docqa::retriever::Session;
use docqa::utils::{extract_text, preview};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;
use tracing_subscriber::EnvFilter;

/// Ask questions about a PDF or text document.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// PDF, or plain UTF-8 text
    file: PathBuf,

    /// Configuration file (defaults to the user config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Words per chunk
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Words shared by consecutive chunks
    #[arg(long)]
    overlap: Option<usize>,

    /// Chunks retrieved per question
    #[arg(long)]
    top_k: Option<usize>,

    /// Embedding backend
    #[arg(long, value_enum)]
    embedder: Option<EmbedderKind>,

    /// Print the chunks after ingesting
    #[arg(long)]
    show_chunks: bool,

    /// Print the extracted document text
    #[arg(long)]
    show_document: bool,
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::load_or_default()?,
    };
    if let Some(chunk_size) = args.chunk_size {
        config.retrieval.chunk_size = chunk_size;
    }
    if let Some(overlap) = args.overlap {
        config.retrieval.overlap = overlap;
    }
    if let Some(top_k) = args.top_k {
        config.retrieval.top_k = top_k;
    }
    if let Some(kind) = args.embedder {
        config.embedder.kind = kind;
    }
    Ok(config)
}

async fn build_model(
    config: &Config,
    credentials: Option<&LlmClientConfig>,
    timeout: Duration,
) -> Result<Arc<dyn EmbeddingModel>> {
    let model: Arc<dyn EmbeddingModel> = match config.embedder.kind {
        EmbedderKind::MiniLm => {
            let model_id = config.embedder.model_id.clone();
            println!("Loading embedding model {} (first run downloads it)...", model_id);
            let model = tokio::task::spawn_blocking(move || MiniLmEmbedder::load(&model_id))
                .await
                .context("Embedding model loader panicked")??;
            Arc::new(model)
        }
        EmbedderKind::Hashing => Arc::new(HashingEmbedder::new(config.embedder.dimension)?),
        EmbedderKind::Azure => {
            let credentials = credentials
                .context("Azure embeddings need AZURE_API_KEY, AZURE_API_BASE and AZURE_API_VERSION")?;
            let deployment = std::env::var("AZURE_EMBEDDING_DEPLOYMENT")
                .unwrap_or_else(|_| config.embedder.deployment.clone());
            Arc::new(AzureOpenAiEmbedder::new(
                credentials.with_model(deployment),
                timeout,
            )?)
        }
    };
    Ok(model)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;
    let timeout = Duration::from_secs(config.llm.request_timeout_secs);

    let credentials = match LlmClientConfig::from_env(&config.llm.model_name) {
        Ok(credentials) => Some(credentials),
        Err(e) => {
            warn!("{:#}", e);
            None
        }
    };

    let model = build_model(&config, credentials.as_ref(), timeout).await?;
    let synthesizer = Arc::new(AzureOpenAiSynthesizer::new(timeout)?);
    let mut session = Session::new(config.retrieval.clone(), model, synthesizer)?;

    let text = extract_text(&args.file)?;
    if args.show_document {
        println!("--- Document content ---\n{}\n------------------------", text);
    }
    println!("Processing {:?}...", args.file);
    let chunks = session.ingest(text).await?;
    println!("Document processed into {} chunks.", chunks.len());
    if args.show_chunks {
        for chunk in chunks {
            println!("[{}] {}", chunk.index, preview(&chunk.text, 120));
        }
    }

    println!("Enter your questions (Ctrl+D to exit)");

    loop {
        let mut question = String::new();
        print!("> ");
        std::io::stdout().flush()?;

        if std::io::stdin().read_line(&mut question)? == 0 {
            break;
        }

        let question = question.trim();
        if question.is_empty() {
            continue;
        }

        let Some(credentials) = credentials.as_ref() else {
            eprintln!("Please set AZURE_API_KEY, AZURE_API_BASE and AZURE_API_VERSION.\n");
            continue;
        };

        print!("\nThinking...");
        std::io::stdout().flush()?;
        match session.answer(question, credentials).await {
            Ok(answer) => println!("\r{}\n", answer),
            Err(e) => eprintln!("\rError: {}\n", e),
        }
    }

    Ok(())
}
