use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

/// A struct that represents the response from the orchestration API `jobs` endpoint.
#[skip_serializing_none]
#[derive(Default, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct GenerationResult {
    /// Token identifying the batch of jobs, used to poll their status.
    pub token: Option<String>,
    /// The jobs created for the request.
    #[serde(default)]
    pub jobs: Vec<Job>,
}

impl GenerationResult {
    /// Returns the image URL of the first job, if it has been generated.
    pub fn blob_url(&self) -> Option<&str> {
        self.jobs.first().and_then(Job::blob_url)
    }

    /// Whether no job is still waiting on the service.
    pub fn is_terminal(&self) -> bool {
        self.jobs.iter().all(Job::is_terminal)
    }
}

/// A single unit of work on the service.
#[skip_serializing_none]
#[derive(Default, Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    /// The job identifier.
    pub job_id: Option<String>,
    /// The cost charged for the job.
    pub cost: Option<f64>,
    /// Whether the job is still scheduled on the service.
    pub scheduled: Option<bool>,
    /// The job output, once there is one.
    pub result: Option<JobResult>,
}

impl Job {
    /// Returns the image URL if the result is available.
    pub fn blob_url(&self) -> Option<&str> {
        self.result
            .as_ref()
            .filter(|result| result.available != Some(false))
            .and_then(|result| result.blob_url.as_deref())
            .filter(|url| !url.is_empty())
    }

    /// A job is terminal once it has an image or the service stopped scheduling it.
    pub fn is_terminal(&self) -> bool {
        self.blob_url().is_some() || self.scheduled == Some(false)
    }
}

/// Output of a job.
#[skip_serializing_none]
#[derive(Default, Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JobResult {
    /// Storage key of the generated image.
    pub blob_key: Option<String>,
    /// Whether the image has been uploaded.
    pub available: Option<bool>,
    /// URL of the generated image.
    pub blob_url: Option<String>,
}
