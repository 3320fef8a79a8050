use scolia::cli::{Cli, Commands, ConfigAction};
use scolia::config::Config;
use scolia::corpus::{DocType, Filters};
use scolia::error::{Result, ScoliaError};
use scolia::pipeline::{AnswerOutcome, Orchestrator};
use scolia::router::RouteMode;

use std::io::Write;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    init_logging(cli.verbose);

    match cli.command {
        Commands::Ask {
            question,
            chapter,
            kind,
            block,
            doc_type,
            json,
        } => {
            let config = load_config(cli.config, cli.profile)?;
            let engine = scolia::engine::build(&config)?;

            let filters = parse_filters(chapter, kind, block, doc_type);
            let chat_id = engine.sessions().new_session();
            let outcome = engine.answer(&question, &chat_id, filters, None).await?;

            print_outcome(&outcome, json)?;
        }
        Commands::Chat => {
            let config = load_config(cli.config, cli.profile)?;
            let engine = scolia::engine::build(&config)?;
            run_chat(engine).await?;
        }
        Commands::Index { catalog } => {
            let mut config = load_config(cli.config, cli.profile)?;
            if let Some(catalog) = catalog {
                config.corpus.catalog_file = catalog;
            }
            cmd_index(&config)?;
        }
        Commands::Config { action } => {
            cmd_config(cli.config, action)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose { "scolia=debug" } else { "scolia=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    fmt().with_env_filter(filter).with_target(false).init();
}

fn load_config(config_path: Option<std::path::PathBuf>, profile: Option<String>) -> Result<Config> {
    let path = match config_path {
        Some(path) => path,
        None => Config::default_path()?,
    };

    if !path.exists() {
        tracing::warn!(
            "Config file not found, using defaults. Run 'scolia config init' to create one."
        );
        return Ok(Config::default());
    }

    let mut config = match profile {
        Some(profile) => Config::load_with_profile(&path, &profile)?,
        None => Config::load(&path)?,
    };

    config.corpus.catalog_file = expand_path(&config.corpus.catalog_file)?;
    config.corpus.index_dir = expand_path(&config.corpus.index_dir)?;
    Ok(config)
}

fn parse_filters(
    chapter: Option<String>,
    kind: Option<String>,
    block: Option<String>,
    doc_type: Option<String>,
) -> Option<Filters> {
    let doc_type = doc_type.as_deref().and_then(DocType::parse);

    let filters = Filters::new(
        chapter.as_deref(),
        kind.as_deref(),
        block.as_deref(),
        doc_type,
    );

    if filters.is_empty() {
        None
    } else {
        Some(filters)
    }
}

fn print_outcome(outcome: &AnswerOutcome, json: bool) -> Result<()> {
    if json {
        let rendered = serde_json::to_string_pretty(outcome).map_err(|e| ScoliaError::Json {
            source: e,
            context: "Failed to serialize answer outcome".to_string(),
        })?;
        println!("{}", rendered);
        return Ok(());
    }

    if outcome.insufficient_context {
        println!("⚠ Contexte insuffisant : aucun passage pertinent trouvé.\n");
    }

    println!("{}\n", outcome.answer_text);

    if !outcome.sources.is_empty() {
        println!("Sources :");
        for chunk in &outcome.sources {
            let mut label = Vec::new();
            if let Some(chapter) = &chunk.chapter {
                label.push(format!("chapitre {}", chapter));
            }
            if let Some(block_id) = &chunk.block_id {
                label.push(format!("bloc {}", block_id));
            }
            if let Some(page) = chunk.page {
                label.push(format!("p. {}", page));
            }
            println!("  - {} — {}", label.join(", "), chunk.preview(80));
        }
    }

    tracing::debug!(
        "decision: mode={:?} confidence={:.2} ({})",
        outcome.decision.mode,
        outcome.decision.confidence,
        outcome.decision.rationale
    );

    Ok(())
}

async fn run_chat(engine: Orchestrator) -> Result<()> {
    let chat_id = engine.sessions().new_session();
    println!("Session {} — /scope, /pin, /unpin, /route, /new, /quit", chat_id);

    let mut chat_id = chat_id;
    let stdin = std::io::stdin();

    loop {
        print!("> ");
        std::io::stdout().flush().ok();

        let mut line = String::new();
        if stdin.read_line(&mut line).map_err(|e| ScoliaError::Io {
            source: e,
            context: "Failed to read from stdin".to_string(),
        })? == 0
        {
            break;
        }

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(command) = line.strip_prefix('/') {
            if !handle_chat_command(&engine, &mut chat_id, command).await? {
                break;
            }
            continue;
        }

        match engine.answer(line, &chat_id, None, None).await {
            Ok(outcome) => print_outcome(&outcome, false)?,
            Err(e) => eprintln!("Erreur : {}", e),
        }
    }

    Ok(())
}

/// Handle one slash command; returns false to leave the loop.
async fn handle_chat_command(
    engine: &Orchestrator,
    chat_id: &mut String,
    command: &str,
) -> Result<bool> {
    let mut parts = command.split_whitespace();
    let name = parts.next().unwrap_or_default();

    match name {
        "quit" | "exit" => return Ok(false),
        "new" => {
            *chat_id = engine.sessions().new_session();
            println!("Nouvelle session {}", chat_id);
        }
        "scope" => match parts.next() {
            Some("clear") => {
                engine.sessions().clear_scope(chat_id).await;
                println!("Scope effacé");
            }
            Some(chapter) => {
                engine
                    .sessions()
                    .set_scope(chat_id, Filters::chapter(chapter))
                    .await;
                println!("Scope : chapitre {}", chapter);
            }
            None => println!("Usage : /scope <chapitre> | /scope clear"),
        },
        "pin" => match engine.sessions().pin(chat_id).await {
            Ok(anchor) => println!(
                "Épinglé : chapitre {}, bloc {}",
                anchor.filters.chapter.as_deref().unwrap_or("?"),
                anchor.filters.block_id.as_deref().unwrap_or("?"),
            ),
            Err(e) => println!("{}", e),
        },
        "unpin" => {
            engine.sessions().unpin(chat_id).await;
            println!("Épingle retirée");
        }
        "route" => {
            let mode = match parts.next() {
                Some("retrieve") => Some(RouteMode::RetrieveFirst),
                Some("compose") => Some(RouteMode::RetrieveThenCompose),
                Some("answer") => Some(RouteMode::AnswerOnly),
                Some("auto") => None,
                _ => {
                    println!("Usage : /route retrieve|compose|answer|auto");
                    return Ok(true);
                }
            };
            engine.sessions().set_route_override(chat_id, mode).await;
            println!("Route : {:?}", mode);
        }
        _ => println!("Commande inconnue : /{}", name),
    }

    Ok(true)
}

fn cmd_index(config: &Config) -> Result<()> {
    use scolia::corpus::ChunkStore;
    use scolia::index::TantivyLexicalIndex;

    let store = ChunkStore::load(&config.corpus.catalog_file)?;
    if store.is_empty() {
        return Err(ScoliaError::Corpus(format!(
            "Catalog {} contains no chunks",
            config.corpus.catalog_file.display()
        )));
    }

    let mut index = TantivyLexicalIndex::new(config.corpus.index_dir.clone())
        .map_err(|e| ScoliaError::IndexUnavailable(e.to_string()))?;
    if !index.is_empty() {
        index
            .clear()
            .map_err(|e| ScoliaError::IndexUnavailable(e.to_string()))?;
    }
    index
        .insert_batch(store.iter())
        .and_then(|_| index.commit())
        .map_err(|e| ScoliaError::IndexUnavailable(e.to_string()))?;

    println!(
        "✓ Indexed {} chunks into {}",
        store.len(),
        config.corpus.index_dir.display()
    );
    Ok(())
}

fn cmd_config(config_path: Option<std::path::PathBuf>, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = load_config(config_path, None)?;
            let json = serde_json::to_string_pretty(&config).map_err(|e| ScoliaError::Json {
                source: e,
                context: "Failed to serialize config".to_string(),
            })?;
            println!("{}", json);
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

            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| ScoliaError::Io {
                    source: e,
                    context: format!("Failed to create config directory: {:?}", parent),
                })?;
            }

            Config::default().save(&path)?;
            println!("✓ Configuration initialized at: {}", path.display());
        }
        ConfigAction::Validate { file } => {
            let path = match file.or(config_path) {
                Some(path) => path,
                None => Config::default_path()?,
            };
            let config = Config::load(&path)?;
            println!("✓ Configuration is valid");
            println!("  Schema version: {}", config.meta.schema_version);
        }
    }

    Ok(())
}

fn expand_path(path: &std::path::Path) -> Result<std::path::PathBuf> {
    let path_str = path
        .to_str()
        .ok_or_else(|| ScoliaError::Config("Invalid path encoding".to_string()))?;

    if let Some(stripped) = path_str.strip_prefix("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| ScoliaError::Config("Cannot determine home directory".to_string()))?;
        Ok(home.join(stripped))
    } else {
        Ok(path.to_path_buf())
    }
}
