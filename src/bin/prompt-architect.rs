//! CLI for Prompt Architect - style analysis and product image generation.

use anyhow::Context;
use async_trait::async_trait;
use clap::{Args, Parser, Subcommand, ValueEnum};
use prompt_architect::generation::GenerationSession;
use prompt_architect::ingest::load_image;
use prompt_architect::sections::SectionKind;
use prompt_architect::{
    AppController, CredentialSelector, ExtractedSections, GeminiClient, GenerativeProvider,
    HistoryStore, ImageModel, JsonFileRepository, Settings, StyleAnalyzer, SESSION_LIMIT,
};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "prompt-architect")]
#[command(about = "Reverse-engineer a photographic style from reference images and apply it to products (Gemini)")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// History file (defaults to $PROMPT_ARCHITECT_HISTORY or the user data dir)
    #[arg(long, global = true)]
    history: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze reference images and save the style to history
    Analyze(AnalyzeArgs),

    /// Split a saved analysis text file into its sections
    Sections {
        /// File containing the raw analysis text
        file: PathBuf,
    },

    /// Apply a style to a product image
    Generate(GenerateArgs),

    /// Inspect or edit saved styles
    #[command(subcommand)]
    History(HistoryCommand),
}

#[derive(Args)]
struct AnalyzeArgs {
    /// Reference images (1-10)
    #[arg(required = true)]
    images: Vec<PathBuf>,

    /// Analysis model override
    #[arg(long)]
    model: Option<String>,
}

#[derive(Args)]
struct GenerateArgs {
    /// Saved style to apply (history id)
    #[arg(long, conflicts_with = "prompt", required_unless_present = "prompt")]
    style: Option<String>,

    /// Positive style prompt to apply directly
    #[arg(long)]
    prompt: Option<String>,

    /// Product image
    #[arg(long)]
    product: PathBuf,

    /// Image model
    #[arg(short, long, value_enum, default_value = "flash")]
    model: ImageModelArg,

    /// Number of variations (session limit applies)
    #[arg(short = 'n', long, default_value_t = 1)]
    count: usize,

    /// Output directory
    #[arg(short, long, default_value = ".")]
    output: PathBuf,

    /// Assume a paid API key is already configured for the Pro model
    #[arg(long)]
    paid: bool,
}

#[derive(Subcommand)]
enum HistoryCommand {
    /// List saved styles, newest first
    List,
    /// Print a saved style
    Show {
        /// History id
        id: String,
    },
    /// Delete a saved style
    Delete {
        /// History id
        id: String,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ImageModelArg {
    Flash,
    Pro,
}

impl From<ImageModelArg> for ImageModel {
    fn from(arg: ImageModelArg) -> Self {
        match arg {
            ImageModelArg::Flash => ImageModel::Flash,
            ImageModelArg::Pro => ImageModel::Pro,
        }
    }
}

/// Asks on the terminal whether a paid key is configured.
struct TerminalCredentials {
    confirmed: AtomicBool,
}

impl TerminalCredentials {
    fn new(confirmed: bool) -> Self {
        Self {
            confirmed: AtomicBool::new(confirmed),
        }
    }
}

#[async_trait]
impl CredentialSelector for TerminalCredentials {
    async fn has_selected_credential(&self) -> bool {
        self.confirmed.load(Ordering::SeqCst)
    }

    async fn open_selector(&self) {
        eprint!(
            "{} needs a paid Gemini API key (see https://ai.google.dev/gemini-api/docs/billing).\n\
             Set GEMINI_API_KEY to a billing-enabled key, then confirm [y/N]: ",
            ImageModel::Pro.display_name()
        );
        let answer = tokio::task::spawn_blocking(|| {
            let mut line = String::new();
            std::io::stdin().read_line(&mut line).map(|_| line)
        })
        .await;

        let confirmed = matches!(
            answer,
            Ok(Ok(ref line)) if matches!(line.trim().to_lowercase().as_str(), "y" | "yes")
        );
        self.confirmed.store(confirmed, Ordering::SeqCst);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut settings = Settings::from_env();
    if let Some(ref path) = cli.history {
        settings = settings.with_history_path(path);
    }

    match cli.command {
        Commands::Analyze(args) => analyze(args, settings, cli.json).await?,
        Commands::Sections { file } => {
            let raw = std::fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            print_sections(&ExtractedSections::parse(&raw), cli.json)?;
        }
        Commands::Generate(args) => generate(args, settings, cli.json).await?,
        Commands::History(cmd) => history(cmd, settings, cli.json)?,
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "prompt_architect=debug"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn client() -> anyhow::Result<Arc<dyn GenerativeProvider>> {
    Ok(Arc::new(GeminiClient::builder().build()?))
}

async fn analyze(args: AnalyzeArgs, mut settings: Settings, json_output: bool) -> anyhow::Result<()> {
    if let Some(model) = args.model {
        settings.analysis = settings.analysis.with_model(model);
    }

    let analyzer = StyleAnalyzer::with_config(client()?, settings.analysis.clone());
    let repository = JsonFileRepository::new(&settings.history_path);
    let mut app = AppController::new(analyzer, repository);

    let report = app.add_images(&args.images).await?;
    for failure in &report.failures {
        eprintln!("Skipped {}: {}", failure.path.display(), failure.error);
    }
    if app.images().is_empty() {
        anyhow::bail!("none of the given files could be read as images");
    }

    let mut progress = app.subscribe_progress();
    let printer = tokio::spawn(async move {
        while progress.changed().await.is_ok() {
            let label = progress.borrow_and_update().clone();
            eprintln!("  {}", label);
        }
    });

    eprintln!(
        "Analyzing {} reference image(s) with {}...",
        app.images().len(),
        settings.analysis.model
    );
    let outcome = app.start_analysis().await.map(|_| ());
    printer.abort();
    outcome?;

    let sections = app.sections().unwrap_or_default();
    let saved_id = app
        .history()
        .entries()
        .first()
        .map(|e| e.id.clone())
        .unwrap_or_default();

    if json_output {
        let result = serde_json::json!({
            "type": "analysis",
            "success": true,
            "id": saved_id,
            "images": app.images().len(),
            "sections": sections,
            "raw": app.result(),
            "history": settings.history_path.display().to_string(),
        });
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_sections(&sections, false)?;
        println!("\nSaved as {} in {}", saved_id, settings.history_path.display());
    }

    Ok(())
}

async fn generate(args: GenerateArgs, settings: Settings, json_output: bool) -> anyhow::Result<()> {
    if args.count == 0 || args.count > SESSION_LIMIT {
        anyhow::bail!("--count must be between 1 and {}", SESSION_LIMIT);
    }

    let provider = client()?;
    let credentials: Arc<dyn CredentialSelector> = Arc::new(TerminalCredentials::new(args.paid));

    let mut session = match (&args.style, &args.prompt) {
        (Some(id), _) => {
            let analyzer = StyleAnalyzer::new(Arc::clone(&provider));
            let mut app =
                AppController::new(analyzer, JsonFileRepository::new(&settings.history_path));
            app.restore_from_history(id)?;
            app.open_lab(credentials)?
        }
        (None, Some(prompt)) => GenerationSession::new(provider, credentials, prompt.clone()),
        (None, None) => anyhow::bail!("either --style or --prompt is required"),
    };

    session.set_model(args.model.into());
    session.set_product_image(
        load_image(&args.product)
            .await
            .with_context(|| format!("reading {}", args.product.display()))?,
    );

    std::fs::create_dir_all(&args.output)?;
    let mut saved = Vec::with_capacity(args.count);
    for n in 1..=args.count {
        eprintln!(
            "Generating variation {}/{} with {}...",
            n,
            args.count,
            session.model().display_name()
        );
        let image = session.generate().await?;
        let ext = image.format().map(|f| f.extension()).unwrap_or("png");
        let path = args.output.join(format!("variation-{}.{}", n, ext));
        image.save(&path)?;
        saved.push(path);
    }

    if json_output {
        let result = serde_json::json!({
            "type": "generation",
            "success": true,
            "model": session.model().as_str(),
            "outputs": saved.iter().map(|p| p.display().to_string()).collect::<Vec<_>>(),
            "remaining": session.remaining(),
        });
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        for path in &saved {
            println!("Generated image: {}", path.display());
        }
        println!("{} generation(s) left this session", session.remaining());
    }

    Ok(())
}

fn history(cmd: HistoryCommand, settings: Settings, json_output: bool) -> anyhow::Result<()> {
    let mut store = HistoryStore::open(JsonFileRepository::new(&settings.history_path));

    match cmd {
        HistoryCommand::List => {
            if json_output {
                #[derive(serde::Serialize)]
                struct Entry<'a> {
                    id: &'a str,
                    timestamp: i64,
                    reference_images: usize,
                }
                let entries: Vec<_> = store
                    .entries()
                    .iter()
                    .map(|e| Entry {
                        id: &e.id,
                        timestamp: e.timestamp,
                        reference_images: e.reference_images.len(),
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else if store.is_empty() {
                println!("No saved styles in {}", settings.history_path.display());
            } else {
                println!("Recent style architectures:\n");
                for e in store.entries() {
                    println!(
                        "  {}  {}  ({} reference images)",
                        e.id,
                        e.label(),
                        e.reference_images.len()
                    );
                }
            }
        }
        HistoryCommand::Show { id } => {
            let entry = store
                .get(&id)
                .with_context(|| format!("no saved style {}", id))?;
            if json_output {
                println!("{}", serde_json::to_string_pretty(entry)?);
            } else {
                println!("{}\n", entry.label());
                println!("{}", entry.content);
            }
        }
        HistoryCommand::Delete { id } => {
            if !store.delete(&id)? {
                anyhow::bail!("no saved style {}", id);
            }
            if !json_output {
                println!("Deleted {}", id);
            } else {
                println!("{}", serde_json::json!({ "deleted": id }));
            }
        }
    }

    Ok(())
}

fn print_sections(sections: &ExtractedSections, json_output: bool) -> anyhow::Result<()> {
    if json_output {
        println!("{}", serde_json::to_string_pretty(sections)?);
        return Ok(());
    }

    for kind in SectionKind::ALL {
        println!("== {} ==", kind.title());
        println!("{}\n", sections.display(kind));
    }
    if !sections.is_generation_ready() {
        eprintln!("No positive prompt found; generation is unavailable for this result.");
    }
    Ok(())
}
