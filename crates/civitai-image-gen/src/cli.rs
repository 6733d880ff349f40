use std::{path::PathBuf, str::FromStr};

use anyhow::Context;
use civitai_api::Scheduler;
use clap::Parser;

use crate::config::Defaults;

/// Generate images with the Civitai orchestration API.
#[derive(Parser, Debug, Default)]
#[command(version, about)]
pub struct Args {
    /// Model preset name (see --list-models) or model URN.
    #[arg(short, long)]
    pub model: Option<String>,
    /// Text prompt for generating the image.
    #[arg(short, long)]
    pub prompt: Option<String>,
    /// Negative text prompt.
    #[arg(short, long)]
    pub negative_prompt: Option<String>,
    /// One of EulerA, DPM2MKarras, DPMSDEKarras, Heun.
    #[arg(long)]
    pub scheduler: Option<Scheduler>,
    /// Number of sampling steps (1-100).
    #[arg(long)]
    pub steps: Option<u32>,
    /// CFG scale (1-15).
    #[arg(long)]
    pub cfg_scale: Option<u32>,
    /// Image width (1-1024).
    #[arg(long)]
    pub width: Option<u32>,
    /// Image height (1-1024).
    #[arg(long)]
    pub height: Option<u32>,
    /// Seed, -1 for a random seed.
    #[arg(long, allow_negative_numbers = true)]
    pub seed: Option<i64>,
    /// Additional network to apply, optionally with its strength (0-1).
    #[arg(long = "network", value_name = "URN[=STRENGTH]")]
    pub networks: Vec<NetworkArg>,
    /// API token. Defaults to `api_token` from the config, then CIVITAI_API_TOKEN.
    #[arg(long)]
    pub token: Option<String>,
    /// Configuration file to use instead of ./config.toml.
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Print the request payload.
    #[arg(long)]
    pub show_input: bool,
    /// Assemble the request without submitting it.
    #[arg(long)]
    pub dry_run: bool,
    /// List the model presets and exit.
    #[arg(long)]
    pub list_models: bool,
}

impl Args {
    /// Request fields given on the command line.
    pub fn overrides(&self) -> Defaults {
        Defaults {
            model: self.model.clone(),
            prompt: self.prompt.clone(),
            negative_prompt: self.negative_prompt.clone(),
            scheduler: self.scheduler,
            steps: self.steps,
            cfg_scale: self.cfg_scale,
            width: self.width,
            height: self.height,
            seed: self.seed,
            network_strength: None,
        }
    }
}

/// An additional network given as `URN` or `URN=STRENGTH`.
#[derive(Clone, Debug, PartialEq)]
pub struct NetworkArg {
    pub urn: String,
    pub strength: Option<f64>,
}

impl FromStr for NetworkArg {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.rsplit_once('=') {
            Some((urn, strength)) => Ok(Self {
                urn: urn.to_owned(),
                strength: Some(
                    strength
                        .parse()
                        .with_context(|| format!("invalid network strength '{}'", strength))?,
                ),
            }),
            None => Ok(Self {
                urn: s.to_owned(),
                strength: None,
            }),
        }
    }
}
