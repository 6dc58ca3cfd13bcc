use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use datamind::charts::render::{ChartRenderer, TextRenderer};
use datamind::ingest::IngestOptions;
use datamind::{create_router, AnalysisEngine, AppState, Config, Session};

/// Conversational dashboards for CSV files.
#[derive(Parser, Debug)]
#[command(name = "datamind", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API (the default).
    Serve {
        /// Overrides PORT.
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Analyze a CSV file once and print the dashboard.
    Analyze {
        /// CSV file to load.
        path: Option<PathBuf>,
        /// Use the built-in twelve-month business dataset instead of a file.
        #[arg(long, conflicts_with = "path")]
        sample: bool,
        /// Follow-up question; repeat for several turns.
        #[arg(short, long = "ask")]
        questions: Vec<String>,
        /// Print the final dashboard as JSON instead of text charts.
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so `analyze` output stays clean on stdout
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "datamind=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    info!("Configuration loaded: {:?}", config.server);

    match cli.command.unwrap_or(Command::Serve { port: None }) {
        Command::Serve { port } => serve(config, port).await,
        Command::Analyze {
            path,
            sample,
            questions,
            json,
        } => analyze(config, path, sample, questions, json).await,
    }
}

async fn serve(mut config: Config, port: Option<u16>) -> anyhow::Result<()> {
    if let Some(port) = port {
        config.server.port = port;
    }

    let engine = Arc::new(AnalysisEngine::from_config(&config)?);
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("HOST/PORT do not form a valid socket address")?;
    let app = create_router(AppState::new(config, engine));

    info!("Server listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    Ok(())
}

async fn analyze(
    config: Config,
    path: Option<PathBuf>,
    sample: bool,
    questions: Vec<String>,
    json: bool,
) -> anyhow::Result<()> {
    let engine = AnalysisEngine::from_config(&config)?;
    let mut session = Session::new(IngestOptions {
        splitter: config.analysis.splitter,
    });

    match (path, sample) {
        (Some(path), _) => {
            let raw = tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            session.load(&engine, &raw).await?;
        }
        (None, true) => {
            session.load_sample(&engine, &mut rand::thread_rng()).await?;
        }
        (None, false) => bail!("pass a CSV path or --sample"),
    }

    let renderer = TextRenderer::default();
    let Some(dataset) = session.dataset().cloned() else {
        bail!("no dataset loaded");
    };

    if let Some(analysis) = session.analysis() {
        if !json {
            println!("# {}\n\n{}\n", analysis.dataset_title, analysis.summary);
            for chart in &analysis.charts {
                println!("{}", renderer.render(chart, &dataset));
            }
        }
    }
    for warning in session.warnings() {
        eprintln!("warning: {}", warning);
    }

    for question in &questions {
        let reply = session.submit_user_message(&engine, question).await?;
        if json {
            continue;
        }
        println!("> {}\n{}\n", question, reply.content);
        if let Some(chart) = &reply.related_chart {
            println!("{}", renderer.render(chart, &dataset));
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&session.analysis())?);
    }

    Ok(())
}
