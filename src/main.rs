use clap::{Parser, Subcommand};
use relay_translate::{
    config::config_search_paths, image_request_to_provider, image_response_from_provider,
    request_to_provider, response_from_provider, stream_from_provider, Provider,
    TranslatorConfig,
};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "relay-translate",
    about = "Translate OpenAI-shaped payloads to and from Anthropic and Vertex",
    version
)]
struct Cli {
    /// Path to config file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Read the payload from this file instead of stdin
    #[arg(short, long, global = true)]
    input: Option<PathBuf>,

    /// Provider name (overrides config)
    #[arg(long, global = true)]
    provider: Option<String>,

    /// Target model id (defaults to the one in the payload)
    #[arg(short, long, global = true, default_value = "")]
    model: String,

    /// Print config search paths and exit
    #[arg(long)]
    show_config_paths: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Clone, Copy)]
enum Command {
    /// Canonical chat request -> provider request
    Request,
    /// Provider response -> canonical chat completion
    Response,
    /// Provider SSE stream (stdin) -> canonical SSE stream (stdout)
    Stream,
    /// Canonical image request -> provider request
    ImageRequest,
    /// Provider image reply -> canonical images response
    ImageResponse,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries the translated payload.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "relay_translate=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if cli.show_config_paths {
        println!("Config search paths:");
        for (i, path) in config_search_paths().iter().enumerate() {
            println!("  {}. {}", i + 1, path.display());
        }
        return Ok(());
    }

    let Some(command) = cli.command else {
        anyhow::bail!("no subcommand given; see --help");
    };

    let config = TranslatorConfig::find_and_load(cli.config.as_deref())?;
    let provider = match cli.provider.as_deref() {
        Some(name) => name.parse::<Provider>()?,
        None => config
            .default_provider()?
            .ok_or_else(|| anyhow::anyhow!("no provider given; pass --provider or set one in config"))?,
    };
    let model = config.resolve_model(&cli.model).to_string();

    info!(%provider, model = %model, "relay-translate v{}", env!("CARGO_PKG_VERSION"));

    let out = match command {
        Command::Stream => {
            let written = run_stream(provider, cli.input.as_deref(), &model, &config).await?;
            info!(chunks = written, "done");
            return Ok(());
        }
        Command::Request => request_to_provider(provider, &read_input(cli.input.as_deref())?, &model)?,
        Command::Response => {
            response_from_provider(provider, &read_input(cli.input.as_deref())?, &model)?
        }
        Command::ImageRequest => {
            image_request_to_provider(provider, &read_input(cli.input.as_deref())?, &model)?
        }
        Command::ImageResponse => {
            image_response_from_provider(provider, &read_input(cli.input.as_deref())?, &model)?
        }
    };

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(&out)?;
    stdout.write_all(b"\n")?;
    Ok(())
}

async fn run_stream(
    provider: Provider,
    input: Option<&Path>,
    model: &str,
    config: &TranslatorConfig,
) -> anyhow::Result<usize> {
    let mut stdout = tokio::io::stdout();
    let written = match input {
        Some(path) => {
            let file = tokio::fs::File::open(path).await?;
            let reader = tokio::io::BufReader::new(file);
            stream_from_provider(provider, reader, &mut stdout, model, &config.stream).await?
        }
        None => {
            let reader = tokio::io::BufReader::new(tokio::io::stdin());
            stream_from_provider(provider, reader, &mut stdout, model, &config.stream).await?
        }
    };
    Ok(written)
}

fn read_input(path: Option<&Path>) -> anyhow::Result<Vec<u8>> {
    if let Some(path) = path {
        return Ok(std::fs::read(path)?);
    }
    let mut body = Vec::new();
    std::io::stdin().read_to_end(&mut body)?;
    Ok(body)
}
