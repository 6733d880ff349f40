use anyhow::Context;
use civitai_api::Credential;
use clap::Parser;
use tracing::metadata::LevelFilter;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

mod cli;
mod config;
mod presets;

use cli::Args;
use config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_log::LogTracer::init().context("Failed to forward log records")?;

    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env()
        .context("Failed to parse filter from env")?;

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("setting default subscriber failed")?;

    let args = Args::parse();

    if args.list_models {
        for preset in presets::PRESETS {
            println!("{}\t{}", preset.name, preset.urn);
        }
        return Ok(());
    }

    let config = Config::load(args.config.as_deref())?;

    let settings = config
        .defaults
        .clone()
        .unwrap_or_default()
        .merge(args.overrides());
    let request = settings.build_request(&args.networks)?;

    if args.show_input {
        println!(
            "{}",
            serde_json::to_string_pretty(&request).context("Failed to serialize request")?
        );
    }
    if args.dry_run {
        return Ok(());
    }

    let credential = args
        .token
        .clone()
        .or_else(|| config.api_token.clone())
        .map(Credential::new)
        .or_else(Credential::from_env)
        .context("No API token: use --token, api_token in the config or CIVITAI_API_TOKEN")?;

    let generator = config.generator()?;
    eprintln!("Generating...");
    let result = generator.submit(&credential, &request).await?;

    if let Some(url) = result.blob_url() {
        println!("{}", url);
    }

    Ok(())
}
