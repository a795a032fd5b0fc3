use anyhow::Result;
use clap::{Parser, Subcommand};
use console::style;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tabq_core::tools::render_table;
use tabq_core::{LogTraceSink, TableStore, Workbench, config, create_provider};

#[derive(Parser)]
#[command(name = "tabq")]
#[command(about = "tabq - ask questions about your spreadsheets", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config file to ~/.tabq/config.toml
    Init,
    /// Ingest spreadsheets and answer one question about them
    Ask {
        #[arg(short, long)]
        question: String,
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Ingest spreadsheets and run SQL directly against them
    Sql {
        #[arg(short, long)]
        query: String,
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Ingest spreadsheets and print the derived table schemas
    Schema {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Interactive question session over the ingested spreadsheets
    Chat {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init => {
            if config::config_exists() {
                println!(
                    "Config already exists at {}",
                    config::get_config_path().display()
                );
                return Ok(());
            }
            config::save_config(&config::Config::default())?;
            println!(
                "{} Wrote default config to {}",
                style("✓").green(),
                config::get_config_path().display()
            );
            println!("Set your API key there or via OPENAI_API_KEY / MISTRAL_API_KEY.");
        }
        Commands::Ask { question, files } => {
            let workbench = build_workbench()?;
            ingest_files(&workbench, &files)?;

            println!("\n{} {}\n", style("?").yellow().bold(), question);
            match workbench.answer_question(&question).await {
                Ok(outcome) => print_outcome(&outcome),
                Err(e) => {
                    eprintln!("{} {}", style("✗").red(), e);
                    anyhow::bail!("question failed: {}", e);
                }
            }
        }
        Commands::Sql { query, files } => {
            let workbench = build_workbench_offline()?;
            ingest_files(&workbench, &files)?;

            match workbench.run_sql(&query) {
                Ok(result) => {
                    if result.rows.is_empty() {
                        println!("Query returned no results.");
                    } else {
                        println!("{}", render_table(&result, result.rows.len()));
                        println!("\n{} rows", result.rows.len());
                    }
                }
                Err(e) => {
                    eprintln!("{} {}", style("✗").red(), e);
                    anyhow::bail!("{}", e);
                }
            }
        }
        Commands::Schema { files } => {
            let workbench = build_workbench_offline()?;
            ingest_files(&workbench, &files)?;

            for (name, info) in workbench.store().schema() {
                println!("{} ({} rows)", style(&name).cyan().bold(), info.row_count);
                for column in &info.columns {
                    println!("  - {} ({})", column.name, column.decl_type);
                }
            }
        }
        Commands::Chat { files } => {
            let workbench = build_workbench()?;
            ingest_files(&workbench, &files)?;

            println!("\nAsk questions about your data ('reset' to clear, Ctrl+D to exit):\n");
            use std::io::{self, BufRead};
            let stdin = io::stdin();
            let stdout = io::stdout();
            let mut stdout_lock = stdout.lock();

            loop {
                print!("> ");
                let _ = stdout_lock.flush();

                let mut input = String::new();
                let mut reader = stdin.lock();

                match reader.read_line(&mut input) {
                    Ok(0) | Err(_) => {
                        println!("\nGoodbye!");
                        break;
                    }
                    Ok(_) => {
                        let input = input.trim();
                        if input.is_empty() {
                            continue;
                        }
                        if input == "reset" {
                            workbench.reset();
                            println!("{} Session reset.\n", style("✓").green());
                            continue;
                        }

                        match workbench.answer_question(input).await {
                            Ok(outcome) => print_outcome(&outcome),
                            Err(e) => eprintln!("{} {}", style("✗").red(), e),
                        }
                        println!();
                    }
                }
            }
        }
    }

    Ok(())
}

fn build_workbench() -> Result<Workbench> {
    let config = config::load_config()?;
    let provider = create_provider(&config)?;
    let store = Arc::new(TableStore::new()?);

    Ok(Workbench::new(store, provider)
        .with_sink(Arc::new(LogTraceSink))
        .with_max_iterations(config.max_iterations)
        .with_oracle_timeout(std::time::Duration::from_secs(config.oracle_timeout_secs)))
}

/// `sql` and `schema` never call the oracle; don't require an API key
/// for them.
fn build_workbench_offline() -> Result<Workbench> {
    let config = config::Config::load_or_init()?;
    let provider = Arc::new(tabq_core::OpenAiProvider::new("unused").with_model(config.model));
    let store = Arc::new(TableStore::new()?);
    Ok(Workbench::new(store, provider))
}

fn ingest_files(workbench: &Workbench, files: &[PathBuf]) -> Result<()> {
    for file in files {
        let tables = workbench.ingest_spreadsheet(file)?;
        println!(
            "{} Loaded {} ({} table{})",
            style("✓").green(),
            display_name(file),
            tables.len(),
            if tables.len() == 1 { "" } else { "s" }
        );
        for table in &tables {
            println!("    → {}", table);
        }
    }
    Ok(())
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn print_outcome(outcome: &tabq_core::RunOutcome) {
    println!("{}", outcome.answer);
    if !outcome.sql_queries.is_empty() {
        println!("\n{}", style("SQL queries:").dim());
        for query in &outcome.sql_queries {
            println!("  {}", style(query).dim());
        }
    }
    println!("\n{}", style(format!("model: {}", outcome.model)).dim());
}
