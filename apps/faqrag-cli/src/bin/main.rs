use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::EnvFilter;

use faqrag_core::config::{Config, Settings};
use faqrag_core::data_processor::DataProcessor;
use faqrag_core::types::Answer;
use faqrag_engine::api::{self, ChatResponse};
use faqrag_engine::Engine;

/// Demo knowledge used by `seed` when no FAQ source has been ingested.
const SAMPLE_FAQ: &[&str] = &[
    "Novio offers FD-backed RuPay credit cards. You need a minimum Fixed Deposit of Rs. 10,000 to get started with Novio card.",
    "To create a Novio account, download the Novio app from Play Store or App Store, enter your mobile number, verify with OTP, and complete KYC verification with your PAN and Aadhaar.",
    "Novio cards can be used for UPI payments, online shopping, EMI transactions, and at any merchant that accepts RuPay cards across India.",
    "The credit limit on your Novio card is up to 100% of your Fixed Deposit amount. Higher FD means higher credit limit.",
    "Novio FD earns competitive interest rates. Your FD continues to earn interest while you use your credit card.",
    "You can pay your Novio credit card bill through UPI, net banking, debit card, or auto-debit from your bank account.",
    "Novio provides instant virtual card after KYC approval. Physical card is delivered within 7-10 business days.",
    "For any issues with your Novio card, contact customer support at support@novio.in or call the helpline number in the app.",
    "Novio card has no annual fee for the first year. Renewal charges may apply based on your usage and FD amount.",
    "You can track your Novio card spending, FD balance, and payment due dates all within the Novio mobile app.",
];

#[derive(Parser)]
#[command(name = "faqrag")]
#[command(about = "Answer support questions from an indexed FAQ, falling back to general knowledge")]
#[command(version)]
struct Cli {
    #[arg(long, global = true, help = "Config file to use instead of config.toml / config.<env>.toml")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Chunk a text file or directory and add it to the index")]
    Ingest {
        #[arg(help = "File or directory of .txt/.md files")]
        path: PathBuf,

        #[arg(long, help = "Do nothing if the index already has documents")]
        if_empty: bool,
    },

    #[command(about = "Index the built-in sample FAQ if the index is empty")]
    Seed,

    #[command(about = "Answer a single question")]
    Ask {
        #[arg(help = "The question")]
        question: String,

        #[arg(long, help = "Print the chat response JSON")]
        json: bool,
    },

    #[command(about = "Interactive question loop on stdin")]
    Chat,

    #[command(about = "Print index and model statistics as JSON")]
    Stats,

    #[command(about = "Print readiness as JSON")]
    Health,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_settings(path: Option<&PathBuf>) -> anyhow::Result<Settings> {
    let config = match path {
        Some(p) => Config::load_file(p),
        None => Config::load(),
    }
    .context("loading configuration")?;
    Ok(config.settings()?)
}

async fn ingest(engine: &Engine, settings: &Settings, path: &Path, if_empty: bool) -> anyhow::Result<()> {
    let existing = engine.stats().document_count;
    if if_empty && existing > 0 {
        println!("Index already holds {} documents, skipping ingest", existing);
        return Ok(());
    }

    let chunks = DataProcessor::new()
        .process_path(path)
        .with_context(|| format!("reading {}", path.display()))?;
    println!("📄 {} chunks from {}", chunks.len(), path.display());

    let pb = ProgressBar::new(chunks.len() as u64);
    pb.set_style(
        ProgressStyle::with_template("{spinner} [{elapsed_precise}] {bar:40} {pos}/{len} chunks")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    let mut added = 0;
    for batch in chunks.chunks(settings.embedding.batch_size) {
        added += engine.ingest(batch).await?;
        pb.inc(batch.len() as u64);
    }
    pb.finish_and_clear();

    println!("✅ Indexed {} chunks ({} total)", added, engine.stats().document_count);
    Ok(())
}

fn print_answer(answer: Answer, json: bool) -> anyhow::Result<()> {
    let response = ChatResponse::from(answer);
    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        println!("{}", response.answer);
        println!(
            "\n[source: {}  confidence: {:.3}  context: {}]",
            response.source.as_str(),
            response.confidence,
            response.context_used
        );
    }
    Ok(())
}

async fn chat_loop(engine: &Engine, settings: &Settings) -> anyhow::Result<()> {
    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("{} assistant. Type a question, or 'exit' to quit.", settings.persona.company_name);
    loop {
        stdout.write_all(b"\n> ").await?;
        stdout.flush().await?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit") {
            break;
        }
        print_answer(engine.answer(line).await?, false)?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let settings = load_settings(cli.config.as_ref())?;
    let engine = Engine::from_settings(&settings).context("starting engine")?;

    match cli.command {
        Commands::Ingest { path, if_empty } => ingest(&engine, &settings, &path, if_empty).await?,
        Commands::Seed => {
            let docs: Vec<String> = SAMPLE_FAQ.iter().map(|s| s.to_string()).collect();
            let added = engine.seed_if_empty(&docs).await?;
            println!("🌱 Seeded {} sample documents ({} total)", added, engine.stats().document_count);
        }
        Commands::Ask { question, json } => print_answer(engine.answer(&question).await?, json)?,
        Commands::Chat => chat_loop(&engine, &settings).await?,
        Commands::Stats => println!("{}", serde_json::to_string_pretty(&api::stats(&engine))?),
        Commands::Health => println!("{}", serde_json::to_string_pretty(&engine.health().await)?),
    }
    Ok(())
}
