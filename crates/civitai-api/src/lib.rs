use anyhow::Context;
use reqwest::Url;

mod credential;
pub use credential::*;

mod error;
pub use error::*;

mod request;
pub use request::*;

mod response;
pub use response::*;

mod jobs;
pub use jobs::*;

mod generator;
pub use generator::*;

/// Base URL of the hosted Civitai orchestration service.
pub const DEFAULT_API_URL: &str = "https://orchestration.civitai.com";

/// Struct representing a connection to the Civitai orchestration API.
#[derive(Clone, Debug)]
pub struct Api {
    client: reqwest::Client,
    url: Url,
}

impl Default for Api {
    fn default() -> Self {
        Self {
            client: reqwest::Client::new(),
            url: Url::parse(DEFAULT_API_URL).expect("Failed to parse default URL"),
        }
    }
}

impl Api {
    /// Returns a new `Api` instance with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a new `Api` instance with the given URL as a string value.
    ///
    /// # Arguments
    ///
    /// * `url` - A string that specifies the orchestration API base URL.
    ///
    /// # Errors
    ///
    /// If the URL fails to parse, an error will be returned.
    pub fn new_with_url<S>(url: S) -> anyhow::Result<Self>
    where
        S: AsRef<str>,
    {
        Ok(Self {
            url: Url::parse(url.as_ref()).context("Failed to parse URL")?,
            ..Default::default()
        })
    }

    /// Returns a new `Api` instance with the given `reqwest::Client` and URL as a string value.
    ///
    /// # Arguments
    ///
    /// * `client` - An instance of `reqwest::Client`.
    /// * `url` - A string that specifies the orchestration API base URL.
    ///
    /// # Errors
    ///
    /// If the URL fails to parse, an error will be returned.
    pub fn new_with_client_and_url<S>(client: reqwest::Client, url: S) -> anyhow::Result<Self>
    where
        S: AsRef<str>,
    {
        Ok(Self {
            client,
            url: Url::parse(url.as_ref()).context("Failed to parse URL")?,
        })
    }

    /// Returns a new instance of `JobsApi` with the API's cloned `reqwest::Client` and the URL
    /// for the consumer `jobs` endpoint.
    ///
    /// # Errors
    ///
    /// If the URL fails to parse, an error will be returned.
    pub fn jobs(&self) -> anyhow::Result<JobsApi> {
        Ok(JobsApi::new_with_url(
            self.client.clone(),
            self.url
                .join("v1/consumer/jobs")
                .context("Failed to parse jobs endpoint")?,
        ))
    }

    /// Returns a `Generator` that submits through the `jobs` endpoint and shares the
    /// process-wide generation gate.
    ///
    /// # Errors
    ///
    /// If the URL fails to parse, an error will be returned.
    pub fn generator(&self) -> anyhow::Result<Generator<JobsApi>> {
        Ok(Generator::new(self.jobs()?))
    }
}
