use std::{collections::BTreeMap, fmt, ops::RangeInclusive, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// Number of CLIP layers skipped, fixed for every request.
pub const CLIP_SKIP: u32 = 2;
/// Accepted sampling step counts.
pub const STEPS_RANGE: RangeInclusive<u32> = 1..=100;
/// Accepted CFG scale values.
pub const CFG_SCALE_RANGE: RangeInclusive<u32> = 1..=15;
/// Accepted image widths.
pub const WIDTH_RANGE: RangeInclusive<u32> = 1..=1024;
/// Accepted image heights.
pub const HEIGHT_RANGE: RangeInclusive<u32> = 1..=1024;
/// Seed value asking the service to pick a random seed.
pub const RANDOM_SEED: i64 = -1;

/// Sampling schedulers accepted by the service.
///
/// Parsed case-insensitively, from strings and from serialized data alike.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub enum Scheduler {
    #[default]
    EulerA,
    DPM2MKarras,
    DPMSDEKarras,
    Heun,
}

impl Scheduler {
    /// All schedulers, in the order they are offered to users.
    pub const ALL: [Scheduler; 4] = [
        Scheduler::EulerA,
        Scheduler::DPM2MKarras,
        Scheduler::DPMSDEKarras,
        Scheduler::Heun,
    ];

    /// Returns the name used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheduler::EulerA => "EulerA",
            Scheduler::DPM2MKarras => "DPM2MKarras",
            Scheduler::DPMSDEKarras => "DPMSDEKarras",
            Scheduler::Heun => "Heun",
        }
    }
}

impl fmt::Display for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scheduler {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|scheduler| scheduler.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "unknown scheduler '{}', expected one of: {}",
                    s,
                    Self::ALL.map(|s| s.as_str()).join(", ")
                )
            })
    }
}

impl TryFrom<String> for Scheduler {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Parameters for a single additional network (e.g. a LoRA) applied to the model.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct NetworkParams {
    /// How strongly the network is applied, between 0 and 1.
    pub strength: f64,
}

/// Generation parameters of a text to image request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Params {
    /// Text prompt for generating the image.
    pub prompt: String,
    /// Negative text prompt. Sent even when empty.
    pub negative_prompt: String,
    /// Sampling scheduler.
    pub scheduler: Scheduler,
    /// Number of sampling steps.
    pub steps: u32,
    /// CFG scale factor.
    pub cfg_scale: u32,
    /// Width of the generated image.
    pub width: u32,
    /// Height of the generated image.
    pub height: u32,
    /// Seed for generating the image, `-1` to randomize.
    pub seed: i64,
    /// Number of CLIP layers to skip.
    pub clip_skip: u32,
}

/// Struct representing a text to image request to the Civitai orchestration API.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    /// URN of the checkpoint to generate with.
    pub model: String,
    /// Generation parameters.
    pub params: Params,
    /// Additional networks indexed by their URN.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub additional_networks: BTreeMap<String, NetworkParams>,
}

impl GenerationRequest {
    /// Assembles a request from discrete field values.
    ///
    /// # Errors
    ///
    /// Returns a `ValidationError` if `model` or `prompt` is empty, or if a numeric field is
    /// outside of its accepted range.
    ///
    /// # Example
    ///
    /// ```
    /// # use civitai_api::{GenerationRequest, Scheduler};
    /// let req = GenerationRequest::build(
    ///     "urn:air:sd1:checkpoint:civitai:4384@128713",
    ///     "A cat",
    ///     "",
    ///     Scheduler::EulerA,
    ///     20,
    ///     7,
    ///     512,
    ///     768,
    ///     -1,
    /// )
    /// .unwrap();
    /// assert_eq!(req.params.clip_skip, 2);
    /// ```
    #[allow(clippy::too_many_arguments)]
    pub fn build<M, P, N>(
        model: M,
        prompt: P,
        negative_prompt: N,
        scheduler: Scheduler,
        steps: u32,
        cfg_scale: u32,
        width: u32,
        height: u32,
        seed: i64,
    ) -> Result<Self, ValidationError>
    where
        M: Into<String>,
        P: Into<String>,
        N: Into<String>,
    {
        let request = Self {
            model: model.into(),
            params: Params {
                prompt: prompt.into(),
                negative_prompt: negative_prompt.into(),
                scheduler,
                steps,
                cfg_scale,
                width,
                height,
                seed,
                clip_skip: CLIP_SKIP,
            },
            additional_networks: BTreeMap::new(),
        };
        request.validate()?;
        Ok(request)
    }

    /// Adds an additional network to the request, replacing any previous entry for the same
    /// network.
    ///
    /// # Arguments
    ///
    /// * `network` - The URN of the network. Its compatibility with the model is not checked.
    /// * `strength` - How strongly the network is applied, between 0 and 1.
    ///
    /// # Errors
    ///
    /// Returns a `ValidationError` if `network` is empty or `strength` is out of range. The
    /// request is left untouched in that case.
    pub fn add_network<S>(&mut self, network: S, strength: f64) -> Result<&mut Self, ValidationError>
    where
        S: Into<String>,
    {
        let network = network.into();
        if network.is_empty() {
            return Err(ValidationError::MissingField("additional network"));
        }
        check_strength(strength)?;
        self.additional_networks
            .insert(network, NetworkParams { strength });
        Ok(self)
    }

    /// Checks every field against its constraints.
    ///
    /// Requests can be deserialized or modified directly, so this is run again before
    /// submission.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.model.is_empty() {
            return Err(ValidationError::MissingField("model"));
        }
        if self.params.prompt.is_empty() {
            return Err(ValidationError::MissingField("prompt"));
        }
        check_range("steps", &STEPS_RANGE, self.params.steps)?;
        check_range("cfgScale", &CFG_SCALE_RANGE, self.params.cfg_scale)?;
        check_range("width", &WIDTH_RANGE, self.params.width)?;
        check_range("height", &HEIGHT_RANGE, self.params.height)?;
        for (network, params) in &self.additional_networks {
            if network.is_empty() {
                return Err(ValidationError::MissingField("additional network"));
            }
            check_strength(params.strength)?;
        }
        Ok(())
    }
}

fn check_range(
    field: &'static str,
    range: &RangeInclusive<u32>,
    value: u32,
) -> Result<(), ValidationError> {
    if range.contains(&value) {
        Ok(())
    } else {
        Err(ValidationError::OutOfRange {
            field,
            min: *range.start(),
            max: *range.end(),
            value,
        })
    }
}

fn check_strength(strength: f64) -> Result<(), ValidationError> {
    if (0.0..=1.0).contains(&strength) {
        Ok(())
    } else {
        Err(ValidationError::InvalidStrength(strength))
    }
}
