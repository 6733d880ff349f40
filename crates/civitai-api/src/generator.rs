use std::sync::Arc;

use async_trait::async_trait;
use lazy_static::lazy_static;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::{Credential, GenerationError, GenerationRequest, GenerationResult};

lazy_static! {
    /// Gate shared by every `Generator` built with `Generator::new`: one generation at a time
    /// per process.
    static ref GENERATION_GATE: Arc<Semaphore> = Arc::new(Semaphore::new(1));
}

/// The remote service turning a `GenerationRequest` into generated images.
#[async_trait]
pub trait ImageService: std::fmt::Debug + Send + Sync {
    /// Submits the request and waits until its jobs are no longer pending.
    async fn generate(
        &self,
        credential: &Credential,
        request: &GenerationRequest,
    ) -> anyhow::Result<GenerationResult>;
}

/// Submits generation requests, one at a time.
#[derive(Clone, Debug)]
pub struct Generator<S> {
    service: S,
    gate: Arc<Semaphore>,
}

impl<S> Generator<S>
where
    S: ImageService,
{
    /// Returns a `Generator` sharing the process-wide generation gate.
    pub fn new(service: S) -> Self {
        Self {
            service,
            gate: GENERATION_GATE.clone(),
        }
    }

    /// Returns a `Generator` guarded by the given gate instead of the process-wide one.
    #[cfg(test)]
    pub(crate) fn with_gate(service: S, gate: Arc<Semaphore>) -> Self {
        Self { service, gate }
    }

    /// Returns the underlying service.
    pub fn service(&self) -> &S {
        &self.service
    }

    /// Submits a request and waits for the generated image.
    ///
    /// Waits for any other submission sharing the same gate to finish first. Every call
    /// reaches the service; results are not cached.
    ///
    /// # Arguments
    ///
    /// * `credential` - The API token authorizing this request only.
    /// * `request` - The `GenerationRequest` to submit.
    ///
    /// # Errors
    ///
    /// * `GenerationError::Validation` if the request is invalid. Nothing is sent.
    /// * `GenerationError::Request` if the service call failed.
    /// * `GenerationError::MissingResult` if the first job carries no image.
    pub async fn submit(
        &self,
        credential: &Credential,
        request: &GenerationRequest,
    ) -> Result<GenerationResult, GenerationError> {
        request.validate()?;

        let _permit = self
            .gate
            .acquire()
            .await
            .map_err(|e| GenerationError::Request(e.into()))?;
        debug!(model = %request.model, "submitting generation request");

        let result = self
            .service
            .generate(credential, request)
            .await
            .map_err(GenerationError::Request)?;

        if result.blob_url().is_none() {
            warn!(jobs = result.jobs.len(), "generation finished without an image");
            return Err(GenerationError::MissingResult);
        }
        Ok(result)
    }
}
