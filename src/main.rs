use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use empower_ai::clarification::{CandidateMatch, ClarificationOutcome};
use empower_ai::mock_data::DEFAULT_SUGGESTIONS;
use empower_ai::results::{paginate, Row};
use empower_ai::{AppConfig, QueryService};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "empower")]
#[command(about = "Natural-language queries over employee data and documents")]
struct Args {
    /// OpenAI API key (or set OPENAI_API_KEY env var)
    #[arg(long, global = true)]
    api_key: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Route a query and print its results
    Query {
        query: String,
        /// Result page to show (1-based)
        #[arg(short, long, default_value_t = 1)]
        page: usize,
    },
    /// Resolve an ambiguous query against candidate matches
    Clarify {
        query: String,
        /// Candidate as `id:name:context`; repeat for each candidate
        #[arg(short, long = "candidate", value_parser = parse_candidate, required = true)]
        candidates: Vec<CandidateMatch>,
    },
    /// Map query terms to schema columns
    Map {
        query: String,
        /// Schema description; defaults to the discovered schema
        #[arg(short, long)]
        schema: Option<String>,
    },
    /// Suggest queries for a schema
    Suggest {
        /// Schema description; defaults to the discovered schema
        #[arg(short, long)]
        schema: Option<String>,
    },
    /// Print the discovered schema
    Schema,
    /// Test a database connection string
    Connect { connection_string: String },
}

fn parse_candidate(raw: &str) -> std::result::Result<CandidateMatch, String> {
    let mut parts = raw.splitn(3, ':').map(str::trim);
    match (parts.next(), parts.next(), parts.next()) {
        (Some(id), Some(name), Some(context)) if !id.is_empty() && !name.is_empty() => {
            Ok(CandidateMatch::new(id, name, context))
        }
        _ => Err(format!("expected id:name:context, got '{}'", raw)),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut config = AppConfig::from_env()?;
    if let Some(key) = args.api_key {
        config.api_key = Some(key);
    }
    let service = QueryService::from_config(&config)?;

    match args.command {
        Command::Query { query, page } => {
            info!("Query: {}", query);
            let routed = service.route(&query)?;
            let result = &routed.result;
            println!("Category: {}", result.category());

            let rows = result.rows();
            if !rows.is_empty() {
                let current = paginate(rows, page);
                print_table(&result.headers(), current.items);
                if current.needs_controls() {
                    println!("Page {} of {}", current.page, current.total_pages);
                }
            }
            for hit in result.hits() {
                println!("\n[{}]\n  {}", hit.source, hit.snippet.to_marked_text("**", "**"));
            }
            if result.is_empty() {
                println!("No results found.");
            }
            println!("\n{}", routed.metrics.summary());
        }
        Command::Clarify { query, candidates } => match service.clarify(&query, &candidates).await? {
            ClarificationOutcome::ClarifiedQuery(clarified) => println!("Clarified query: {}", clarified),
            ClarificationOutcome::FollowUpQuestions(questions) => {
                println!("Please clarify:");
                for question in questions {
                    println!("  - {}", question);
                }
            }
            ClarificationOutcome::Candidates(candidates) => {
                println!("Did you mean:");
                for c in candidates {
                    println!("  [{}] {} ({})", c.id, c.name, c.context);
                }
            }
        },
        Command::Map { query, schema } => {
            let mapping = service.map_to_schema(&query, schema.as_deref()).await?;
            println!("{}", mapping.highlight(&query).to_marked_text("[", "]"));
            for (term, path) in mapping.iter() {
                println!("  {:<24} -> {}", term, path.as_deref().unwrap_or("(no column)"));
            }
        }
        Command::Suggest { schema } => {
            let suggestions = match service.suggest_queries(schema.as_deref()).await {
                Ok(suggestions) => suggestions,
                Err(e) if schema.is_none() => {
                    eprintln!("Could not generate suggestions ({}); showing defaults", e);
                    DEFAULT_SUGGESTIONS.iter().map(|s| s.to_string()).collect()
                }
                Err(e) => return Err(e.into()),
            };
            for suggestion in suggestions {
                println!("- {}", suggestion);
            }
        }
        Command::Schema => {
            let schema = service.schema();
            println!("{}", schema.describe());
            println!(
                "\n{} tables, {} columns, {} relationships",
                schema.info.tables, schema.info.columns, schema.info.relationships
            );
        }
        Command::Connect { connection_string } => {
            let info = service
                .connect(&connection_string)
                .await
                .map_err(|e| anyhow!("Connection failed: {}", e))?;
            println!(
                "Connected. Discovered {} tables, {} columns, {} relationships.",
                info.tables, info.columns, info.relationships
            );
        }
    }

    Ok(())
}

fn print_table(headers: &[&str], rows: &[Row]) {
    let widths: Vec<usize> = headers
        .iter()
        .map(|h| {
            rows.iter()
                .filter_map(|r| r.get(h).map(|v| v.to_string().len()))
                .chain(std::iter::once(h.len()))
                .max()
                .unwrap_or(h.len())
        })
        .collect();

    let line = |cells: Vec<String>| {
        cells
            .iter()
            .zip(&widths)
            .map(|(c, w)| format!("{:<width$}", c, width = *w))
            .collect::<Vec<_>>()
            .join(" | ")
    };

    println!("{}", line(headers.iter().map(|h| h.to_string()).collect()));
    println!("{}", widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>().join("-+-"));
    for row in rows {
        println!(
            "{}",
            line(headers.iter().map(|h| row.get(h).map(|v| v.to_string()).unwrap_or_default()).collect())
        );
    }
}
