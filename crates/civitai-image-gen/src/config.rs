use std::{path::Path, time::Duration};

use anyhow::Context;
use civitai_api::{Api, GenerationRequest, Generator, JobsApi, Scheduler, RANDOM_SEED};
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

use crate::{cli::NetworkArg, presets};

const DEFAULT_NETWORK_STRENGTH: f64 = 0.6;

#[derive(Serialize, Deserialize, Default, Debug)]
pub struct Config {
    pub api_url: Option<String>,
    pub api_token: Option<String>,
    pub poll_interval_secs: Option<u64>,
    pub request_timeout_secs: Option<u64>,
    pub defaults: Option<Defaults>,
}

impl Config {
    /// Loads the configuration from the system file, the local (or given) file and the
    /// `CIVITAI_GEN_` environment, later sources overriding earlier ones.
    ///
    /// # Errors
    ///
    /// Fails if `path` is given but does not point to a file, or if a source is invalid.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let local = match path {
            Some(path) => {
                anyhow::ensure!(
                    path.is_file(),
                    "Configuration file not found: {}",
                    path.display()
                );
                path
            }
            None => Path::new("config.toml"),
        };
        Figment::new()
            .merge(Toml::file("/etc/civitai-image-gen/config.toml"))
            .merge(Toml::file(local))
            .merge(Env::prefixed("CIVITAI_GEN_").split("__"))
            .extract()
            .context("Invalid configuration")
    }

    /// Builds a `Generator` for the configured service.
    pub fn generator(&self) -> anyhow::Result<Generator<JobsApi>> {
        let mut client = reqwest::Client::builder();
        if let Some(secs) = self.request_timeout_secs {
            client = client.timeout(Duration::from_secs(secs));
        }
        let client = client.build().context("Failed to build http client")?;

        let api = match &self.api_url {
            Some(url) => Api::new_with_client_and_url(client, url),
            None => Api::new_with_client_and_url(client, civitai_api::DEFAULT_API_URL),
        }
        .context("Failed to initialize civitai api")?;

        let mut jobs = api.jobs()?;
        if let Some(secs) = self.poll_interval_secs {
            jobs = jobs.with_poll_interval(Duration::from_secs(secs));
        }
        Ok(Generator::new(jobs))
    }
}

/// Request fields that may be left unset and filled in from another source.
#[skip_serializing_none]
#[derive(Default, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Defaults {
    /// Model preset name or URN.
    pub model: Option<String>,
    pub prompt: Option<String>,
    pub negative_prompt: Option<String>,
    pub scheduler: Option<Scheduler>,
    pub steps: Option<u32>,
    pub cfg_scale: Option<u32>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub seed: Option<i64>,
    /// Strength of additional networks given without one.
    pub network_strength: Option<f64>,
}

impl Defaults {
    /// Merges the given settings with these, the given ones taking precedence.
    pub fn merge(&self, defaults: Self) -> Self {
        Self {
            model: defaults.model.or(self.model.clone()),
            prompt: defaults.prompt.or(self.prompt.clone()),
            negative_prompt: defaults.negative_prompt.or(self.negative_prompt.clone()),
            scheduler: defaults.scheduler.or(self.scheduler),
            steps: defaults.steps.or(self.steps),
            cfg_scale: defaults.cfg_scale.or(self.cfg_scale),
            width: defaults.width.or(self.width),
            height: defaults.height.or(self.height),
            seed: defaults.seed.or(self.seed),
            network_strength: defaults.network_strength.or(self.network_strength),
        }
    }

    /// Assembles a request from these settings and the given additional networks.
    ///
    /// Unset fields fall back to the built-in defaults.
    pub fn build_request(&self, networks: &[NetworkArg]) -> anyhow::Result<GenerationRequest> {
        let settings = default_settings(self.clone());
        let mut request = GenerationRequest::build(
            presets::resolve_model(settings.model.as_deref().unwrap_or_default()),
            settings.prompt.unwrap_or_default(),
            settings.negative_prompt.unwrap_or_default(),
            settings.scheduler.unwrap_or_default(),
            settings.steps.unwrap_or_default(),
            settings.cfg_scale.unwrap_or_default(),
            settings.width.unwrap_or_default(),
            settings.height.unwrap_or_default(),
            settings.seed.unwrap_or(RANDOM_SEED),
        )?;
        for network in networks {
            request.add_network(
                network.urn.clone(),
                network
                    .strength
                    .or(settings.network_strength)
                    .unwrap_or(DEFAULT_NETWORK_STRENGTH),
            )?;
        }
        Ok(request)
    }
}

/// Fills unset fields with the built-in defaults.
pub fn default_settings(defaults: Defaults) -> Defaults {
    Defaults {
        model: presets::PRESETS.first().map(|preset| preset.name.to_owned()),
        prompt: None,
        negative_prompt: Some(String::new()),
        scheduler: Some(Scheduler::EulerA),
        steps: Some(20),
        cfg_scale: Some(7),
        width: Some(512),
        height: Some(768),
        seed: Some(RANDOM_SEED),
        network_strength: Some(DEFAULT_NETWORK_STRENGTH),
    }
    .merge(defaults)
}
