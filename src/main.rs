use clap::Parser;
use console::{style, Term};
use tracing_subscriber::EnvFilter;

use felon_entrepreneur::client::DaemonClient;
use felon_entrepreneur::config::Config;
use felon_entrepreneur::daemon;
use felon_entrepreneur::error::{FelonEntrepreneurError, Result};
use felon_entrepreneur::generation::poller::{watch_generation, PollOutcome, PollSettings};

#[derive(Parser, Debug)]
#[command(name = "felon-entrepreneur")]
#[command(about = "Felon Entrepreneur CLI")]
struct Cli {
    #[arg(long, default_value = "http://127.0.0.1:8787")]
    server: String,

    #[arg(long, env = "FE_SESSION_TOKEN")]
    token: Option<String>,

    #[arg(long, default_value = "./data/felon-entrepreneur.db")]
    db: String,

    #[arg(long, env = "FE_CONFIG")]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Run the HTTP daemon in the foreground.
    Serve {
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        #[arg(long, default_value_t = 8787)]
        port: u16,
    },
    /// Check daemon health.
    Status,
    /// Kick off life-plan generation and poll it to completion.
    Plan,
    /// Search job postings.
    Jobs {
        #[arg(long)]
        query: String,

        #[arg(long)]
        zip: Option<String>,
    },
    /// Show the onboarding recap list.
    Recap,
    /// Show the employment profile snapshot.
    Employment,
}

fn rule(width: usize) -> String {
    "─".repeat(width.clamp(36, 96))
}

fn print_banner(server: &str) {
    let term = Term::stdout();
    let width = term.size().1 as usize;
    let line = rule(width);

    println!("{}", style(&line).color256(208));
    println!(
        "{}",
        style("FELON ENTREPRENEUR").color256(208).bold()
    );
    println!(
        "{}",
        style(format!("Second chances, first-year plans • Server: {server}")).color256(250)
    );
    println!("{}", style(&line).color256(208));
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,felon_entrepreneur=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();

    if let Commands::Serve { host, port } = &cli.command {
        let config = Config::load(cli.config.as_deref())?;
        return daemon::run(host, *port, &cli.db, config).await;
    }

    print_banner(&cli.server);
    let token = cli.token.clone().unwrap_or_default();
    if token.trim().is_empty() {
        println!(
            "{}",
            style("No session token set (FE_SESSION_TOKEN); protected commands will fail.")
                .color256(245)
        );
    }
    let client = DaemonClient::new(&cli.server, &token)?;

    match &cli.command {
        Commands::Serve { .. } => unreachable!("handled above"),
        Commands::Status => {
            let status = client.health().await?;
            println!("{status}");
        }
        Commands::Plan => {
            println!("{}", style("Generating your life plan…").color256(81));
            let outcome = watch_generation(
                &client,
                PollSettings::default(),
                futures::future::pending::<()>(),
            )
            .await?;
            match outcome {
                PollOutcome::Complete => {
                    let summary = client.life_plan_summary().await?;
                    let title = summary
                        .get("title")
                        .and_then(|v| v.as_str())
                        .unwrap_or("Your plan is ready");
                    let text = summary
                        .get("summary")
                        .and_then(|v| v.as_str())
                        .unwrap_or("");
                    println!("{}", style(title).color256(214).bold());
                    if !text.is_empty() {
                        println!("{text}");
                    }
                }
                PollOutcome::Failed(message) => {
                    return Err(FelonEntrepreneurError::Runtime(message));
                }
                PollOutcome::Cancelled => {
                    println!("{}", style("Cancelled.").color256(245));
                }
                PollOutcome::TimedOut => {
                    return Err(FelonEntrepreneurError::Runtime(
                        "generation did not finish in time".to_string(),
                    ));
                }
            }
        }
        Commands::Jobs { query, zip } => {
            let results = client.search_jobs(query, zip.as_deref()).await?;
            let jobs = results
                .get("jobs")
                .and_then(|v| v.as_array())
                .cloned()
                .unwrap_or_default();
            if jobs.is_empty() {
                println!("{}", style("No matches.").color256(245));
            }
            for job in jobs {
                let title = job.get("title").and_then(|v| v.as_str()).unwrap_or("?");
                let employer = job.get("employer").and_then(|v| v.as_str()).unwrap_or("?");
                let location = job
                    .get("location")
                    .and_then(|v| v.as_str())
                    .unwrap_or("remote/unlisted");
                let detail = format!("{employer} ({location})");
                println!(
                    "{} {} {}",
                    style("•").color256(214),
                    style(title).bold(),
                    style(detail).color256(250)
                );
            }
        }
        Commands::Recap => {
            let recap = client.recap().await?;
            let entries = recap
                .get("entries")
                .and_then(|v| v.as_array())
                .cloned()
                .unwrap_or_default();
            if entries.is_empty() {
                println!("{}", style("No answers recorded yet.").color256(245));
            }
            for entry in entries {
                let question = entry.get("question").and_then(|v| v.as_str()).unwrap_or("?");
                let value = entry.get("value").cloned().unwrap_or_default();
                println!("{} {question}: {value}", style("•").color256(81));
            }
        }
        Commands::Employment => {
            let snapshot = client.employment().await?;
            println!(
                "{}",
                serde_json::to_string_pretty(&snapshot)
                    .map_err(|e| FelonEntrepreneurError::Serialization(e.to_string()))?
            );
        }
    }

    Ok(())
}
