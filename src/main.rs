use ragrank::chunking::{chunk_text, ChunkOptions};
use ragrank::citation::augmented_prompt;
use ragrank::cli::{Cli, Commands, ConfigAction};
use ragrank::config::{expand_path, Config};
use ragrank::documents::DirectoryDocumentStore;
use ragrank::embedding::provider_from_config;
use anyhow::{Context, Result};
use ragrank::pipeline::{QueryRequest, RagPipeline};
use std::path::{Path, PathBuf};
use std::sync::Arc;

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse_args();

    // Initialize logging
    init_logging(cli.verbose);

    // Handle commands
    match cli.command {
        Commands::Chunk {
            file,
            split_by,
            max_chunk_size,
            min_chunk_size,
            overlap_size,
            json,
        } => {
            let config = load_config(cli.config, cli.profile)?;
            let mut options = config.chunk_options();
            if let Some(split_by) = split_by {
                options.split_by = split_by;
            }
            if let Some(max) = max_chunk_size {
                options.max_chunk_size = max;
            }
            if let Some(min) = min_chunk_size {
                options.min_chunk_size = min;
            }
            if let Some(overlap) = overlap_size {
                options.overlap_size = overlap;
            }
            cmd_chunk(&file, &options, json)?;
        }
        Commands::Query {
            query,
            agent,
            docs,
            top_k,
            semantic_weight,
            format,
            diversity_weight,
            recency_weight,
            length,
            json,
            prompt,
        } => {
            let config = load_config(cli.config, cli.profile)?;

            let mut request = QueryRequest::from_config(&config, query, agent);
            if let Some(k) = top_k {
                request.top_k = k;
            }
            if let Some(weight) = semantic_weight {
                request.semantic_weight = weight;
            }
            if let Some(format) = format {
                request.citation_format = format;
            }
            if let Some(weight) = diversity_weight {
                request.rerank_options.diversity_weight = weight;
            }
            if let Some(weight) = recency_weight {
                request.rerank_options.recency_weight = weight;
            }
            if let Some(length) = length {
                request.rerank_options.length_preference = length;
            }

            let docs_dir = docs
                .map(|d| expand_path(&d))
                .unwrap_or_else(|| config.documents_dir());
            cmd_query(&config, docs_dir, &request, json, prompt)?;
        }
        Commands::Config { action } => {
            cmd_config(cli.config, cli.profile, action)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose { "ragrank=debug" } else { "ragrank=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn cmd_chunk(file: &Path, options: &ChunkOptions, json: bool) -> Result<()> {
    let content =
        std::fs::read_to_string(file).with_context(|| format!("Failed to read {:?}", file))?;
    let filename = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| file.display().to_string());

    let chunks = chunk_text(&content, &filename, &filename, options)?;

    if json {
        println!("{}", to_json(&chunks, "Failed to serialize chunks")?);
        return Ok(());
    }

    println!("{} chunks from {}", chunks.len(), filename);
    for chunk in &chunks {
        println!();
        print!(
            "── #{} [{}..{}] {} chars",
            chunk.chunk_index,
            chunk.start_index,
            chunk.end_index,
            chunk.len()
        );
        if let Some(page) = chunk.metadata.page_number {
            print!(", p. {}", page);
        }
        if let Some(section) = &chunk.metadata.section {
            print!(", {}", section);
        }
        println!();
        println!("{}", chunk.text);
    }

    Ok(())
}

fn cmd_query(
    config: &Config,
    docs_dir: PathBuf,
    request: &QueryRequest,
    json: bool,
    prompt: bool,
) -> Result<()> {
    let store = Arc::new(DirectoryDocumentStore::new(docs_dir));
    let provider = provider_from_config(&config.embedding)?;
    let pipeline = RagPipeline::from_config(config, store, provider)?;

    let rt = tokio::runtime::Runtime::new().context("Failed to create tokio runtime")?;
    let response = rt
        .block_on(pipeline.query(request))
        .with_context(|| format!("Query failed for agent '{}'", request.agent_id))?;

    if json {
        println!("{}", to_json(&response, "Failed to serialize response")?);
        return Ok(());
    }

    if prompt {
        println!("{}", augmented_prompt(&request.query, &response.context));
        return Ok(());
    }

    if let Some(message) = &response.message {
        println!("{}", message);
        return Ok(());
    }

    if let Some(warning) = &response.warning {
        eprintln!("⚠ {}", warning);
    }

    println!("{}", response.context);
    println!();
    println!("Citations:");
    for citation in &response.citations {
        println!("  {} (confidence {:.3})", citation.format, citation.confidence);
    }
    println!();
    println!(
        "{} documents, {} chunks, {} candidates, {} returned",
        response.stats.total_documents,
        response.stats.total_chunks,
        response.stats.searched_chunks,
        response.stats.returned_chunks
    );

    Ok(())
}

fn cmd_config(
    config_path: Option<PathBuf>,
    profile: Option<String>,
    action: ConfigAction,
) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = load_config(config_path, profile)?;
            let content = toml::to_string_pretty(&config)?;
            println!("{}", content);
        }
        ConfigAction::Validate { file } => {
            let path = match file.or(config_path) {
                Some(path) => path,
                None => Config::default_path()?,
            };
            let config = match profile {
                Some(profile) => Config::load_with_profile(&path, &profile),
                None => Config::load(&path),
            }
            .with_context(|| format!("Invalid configuration at {}", path.display()))?;
            println!("✓ Configuration is valid");
            println!("  Schema version: {}", config.meta.schema_version);
        }
        ConfigAction::Init { force } => {
            let path = match config_path {
                Some(path) => path,
                None => Config::default_path()?,
            };

            if path.exists() && !force {
                println!("Configuration file already exists at: {}", path.display());
                println!("Use --force to overwrite");
                return Ok(());
            }

            Config::default().save(&path)?;
            println!("✓ Configuration initialized at: {}", path.display());
        }
    }

    Ok(())
}

fn load_config(config_path: Option<PathBuf>, profile: Option<String>) -> Result<Config> {
    let path = match config_path {
        Some(path) => path,
        None => Config::default_path()?,
    };

    if !path.exists() {
        tracing::warn!(
            "Config file not found, using defaults. Run 'ragrank config init' to create one."
        );
        return Ok(Config::load_or_default(&path)?);
    }

    let config = match profile {
        Some(profile) => Config::load_with_profile(&path, &profile)?,
        None => Config::load(&path)?,
    };
    Ok(config)
}

fn to_json<T: serde::Serialize>(value: &T, context: &str) -> Result<String> {
    serde_json::to_string_pretty(value).with_context(|| context.to_string())
}
