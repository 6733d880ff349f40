use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Url;
use tracing::{debug, info};

use crate::{Credential, GenerationRequest, GenerationResult, ImageService};

/// Default delay between two status polls of a pending job.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Struct representing a connection to the orchestration API consumer `jobs` endpoint.
#[derive(Clone, Debug)]
pub struct JobsApi {
    client: reqwest::Client,
    endpoint: Url,
    poll_interval: Duration,
}

impl JobsApi {
    /// Constructs a new `JobsApi` client with a given `reqwest::Client` and orchestration API
    /// endpoint `String`.
    ///
    /// # Arguments
    ///
    /// * `client` - A `reqwest::Client` used to send requests.
    /// * `endpoint` - A `String` representation of the endpoint url.
    ///
    /// # Returns
    ///
    /// A `Result` containing a new `JobsApi` instance on success, or an error if url parsing failed.
    pub fn new(client: reqwest::Client, endpoint: String) -> anyhow::Result<Self> {
        Ok(Self::new_with_url(
            client,
            Url::parse(&endpoint).context("failed to parse endpoint url")?,
        ))
    }

    /// Constructs a new `JobsApi` client with a given `reqwest::Client` and endpoint `Url`.
    ///
    /// # Arguments
    ///
    /// * `client` - A `reqwest::Client` used to send requests.
    /// * `endpoint` - A `Url` representing the endpoint url.
    ///
    /// # Returns
    ///
    /// A new `JobsApi` instance.
    pub fn new_with_url(client: reqwest::Client, endpoint: Url) -> Self {
        Self {
            client,
            endpoint,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Sets the delay between two status polls while waiting for a job.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Returns the endpoint url.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Creates the jobs for a generation request without waiting for them.
    ///
    /// # Arguments
    ///
    /// * `credential` - The API token authorizing the request.
    /// * `request` - The `GenerationRequest` to submit.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `GenerationResult` as first reported by the service, or an
    /// error if the request failed.
    pub async fn create(
        &self,
        credential: &Credential,
        request: &GenerationRequest,
    ) -> anyhow::Result<GenerationResult> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(credential.as_str())
            .json(request)
            .send()
            .await
            .context("failed to send request")?;
        parse_response(response).await
    }

    /// Fetches the current status of the jobs created under `token`.
    ///
    /// # Arguments
    ///
    /// * `credential` - The API token authorizing the request.
    /// * `token` - The batch token returned when the jobs were created.
    pub async fn get(&self, credential: &Credential, token: &str) -> anyhow::Result<GenerationResult> {
        let response = self
            .client
            .get(self.endpoint.clone())
            .bearer_auth(credential.as_str())
            .query(&[("token", token)])
            .send()
            .await
            .context("failed to send request")?;
        parse_response(response).await
    }

    /// Creates the jobs for a generation request and polls until none of them is pending.
    ///
    /// There is no timeout besides the one configured on the `reqwest::Client`.
    pub async fn create_and_wait(
        &self,
        credential: &Credential,
        request: &GenerationRequest,
    ) -> anyhow::Result<GenerationResult> {
        let mut result = self.create(credential, request).await?;
        let token = match result.token.clone() {
            Some(token) => token,
            None if result.is_terminal() => return Ok(result),
            None => anyhow::bail!("service did not return a job token"),
        };
        info!(%token, jobs = result.jobs.len(), "created generation jobs");
        while !result.is_terminal() {
            tokio::time::sleep(self.poll_interval).await;
            debug!(%token, "polling job status");
            result = self.get(credential, &token).await?;
        }
        Ok(result)
    }
}

async fn parse_response(response: reqwest::Response) -> anyhow::Result<GenerationResult> {
    if response.status().is_success() {
        return response.json().await.context("failed to parse json");
    }
    let status = response.status();
    let text = response
        .text()
        .await
        .context("failed to get response text")?;
    Err(anyhow::anyhow!(
        "got error code: {}, message text: {}",
        status,
        text
    ))
}

#[async_trait]
impl ImageService for JobsApi {
    async fn generate(
        &self,
        credential: &Credential,
        request: &GenerationRequest,
    ) -> anyhow::Result<GenerationResult> {
        self.create_and_wait(credential, request).await
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc, Mutex,
        },
    };

    use axum::{
        extract::{Query, State},
        http::{HeaderMap, StatusCode},
        routing::post,
        Json, Router,
    };

    use super::*;
    use crate::{Api, Scheduler};

    #[derive(Default)]
    struct FakeService {
        polls_until_done: usize,
        polls: AtomicUsize,
        bodies: Mutex<Vec<serde_json::Value>>,
        auth: Mutex<Vec<String>>,
    }

    fn record_auth(state: &FakeService, headers: &HeaderMap) {
        let auth = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_owned();
        state.auth.lock().unwrap().push(auth);
    }

    async fn create_jobs(
        State(state): State<Arc<FakeService>>,
        headers: HeaderMap,
        Json(body): Json<serde_json::Value>,
    ) -> Json<serde_json::Value> {
        record_auth(&state, &headers);
        state.bodies.lock().unwrap().push(body);
        if state.polls_until_done == 0 {
            Json(serde_json::json!({
                "token": "batch-1",
                "jobs": [{ "jobId": "job-1", "scheduled": false, "result": { "blobUrl": "http://x/img.png" } }]
            }))
        } else {
            Json(serde_json::json!({
                "token": "batch-1",
                "jobs": [{ "jobId": "job-1", "scheduled": true }]
            }))
        }
    }

    async fn get_jobs(
        State(state): State<Arc<FakeService>>,
        headers: HeaderMap,
        Query(query): Query<HashMap<String, String>>,
    ) -> Result<Json<serde_json::Value>, StatusCode> {
        record_auth(&state, &headers);
        if query.get("token").map(String::as_str) != Some("batch-1") {
            return Err(StatusCode::NOT_FOUND);
        }
        let polls = state.polls.fetch_add(1, Ordering::SeqCst) + 1;
        if polls < state.polls_until_done {
            Ok(Json(serde_json::json!({
                "token": "batch-1",
                "jobs": [{ "jobId": "job-1", "scheduled": true, "result": { "available": false } }]
            })))
        } else {
            Ok(Json(serde_json::json!({
                "token": "batch-1",
                "jobs": [{
                    "jobId": "job-1",
                    "scheduled": false,
                    "result": { "blobKey": "img.png", "available": true, "blobUrl": "http://x/img.png" }
                }]
            })))
        }
    }

    async fn spawn_server(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    async fn spawn_fake(polls_until_done: usize) -> (Arc<FakeService>, JobsApi) {
        let state = Arc::new(FakeService {
            polls_until_done,
            ..Default::default()
        });
        let router = Router::new()
            .route("/v1/consumer/jobs", post(create_jobs).get(get_jobs))
            .with_state(state.clone());
        let url = spawn_server(router).await;
        let jobs = Api::new_with_url(url)
            .unwrap()
            .jobs()
            .unwrap()
            .with_poll_interval(Duration::from_millis(10));
        (state, jobs)
    }

    fn cat_request() -> GenerationRequest {
        GenerationRequest::build(
            "urn:air:sd1:checkpoint:civitai:4384@128713",
            "A cat",
            "",
            Scheduler::EulerA,
            20,
            7,
            512,
            768,
            -1,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_create_sends_credential_and_payload() {
        let (state, jobs) = spawn_fake(0).await;
        let request = cat_request();

        let result = jobs
            .create(&Credential::new("tok123"), &request)
            .await
            .unwrap();

        assert_eq!(result.blob_url(), Some("http://x/img.png"));
        assert_eq!(state.auth.lock().unwrap().as_slice(), ["Bearer tok123"]);
        let bodies = state.bodies.lock().unwrap();
        assert_eq!(bodies.len(), 1);
        assert_eq!(bodies[0], serde_json::to_value(&request).unwrap());
        assert_eq!(bodies[0]["params"]["clipSkip"], 2);
    }

    #[tokio::test]
    async fn test_create_and_wait_polls_until_terminal() {
        let (state, jobs) = spawn_fake(3).await;

        let result = jobs
            .create_and_wait(&Credential::new("tok123"), &cat_request())
            .await
            .unwrap();

        assert_eq!(result.blob_url(), Some("http://x/img.png"));
        assert_eq!(state.polls.load(Ordering::SeqCst), 3);
        assert!(state
            .auth
            .lock()
            .unwrap()
            .iter()
            .all(|auth| auth == "Bearer tok123"));
    }

    #[tokio::test]
    async fn test_create_and_wait_returns_immediately_when_done() {
        let (state, jobs) = spawn_fake(0).await;

        let result = jobs
            .create_and_wait(&Credential::new("tok123"), &cat_request())
            .await
            .unwrap();

        assert_eq!(result.blob_url(), Some("http://x/img.png"));
        assert_eq!(state.polls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_error_status_surfaces_message() {
        let router = Router::new().route(
            "/v1/consumer/jobs",
            post(|| async { (StatusCode::UNAUTHORIZED, "invalid token") }),
        );
        let url = spawn_server(router).await;
        let jobs = Api::new_with_url(url).unwrap().jobs().unwrap();

        let err = jobs
            .create(&Credential::new("bad"), &cat_request())
            .await
            .unwrap_err();

        let message = err.to_string();
        assert!(message.contains("401"), "{}", message);
        assert!(message.contains("invalid token"), "{}", message);
    }

    #[tokio::test]
    async fn test_missing_token_on_pending_job() {
        let router = Router::new().route(
            "/v1/consumer/jobs",
            post(|| async { Json(serde_json::json!({ "jobs": [{ "scheduled": true }] })) }),
        );
        let url = spawn_server(router).await;
        let jobs = Api::new_with_url(url).unwrap().jobs().unwrap();

        let err = jobs
            .create_and_wait(&Credential::new("tok123"), &cat_request())
            .await
            .unwrap_err();

        assert!(err.to_string().contains("token"));
    }

    #[tokio::test]
    async fn test_generator_submits_over_http() {
        let state = Arc::new(FakeService::default());
        let router = Router::new()
            .route(
                "/v1/consumer/jobs",
                post(
                    |State(state): State<Arc<FakeService>>,
                     headers: HeaderMap,
                     Json(body): Json<serde_json::Value>| async move {
                        record_auth(&state, &headers);
                        state.bodies.lock().unwrap().push(body);
                        Json(serde_json::json!({
                            "jobs": [{ "result": { "blobUrl": "http://x/img.png" } }]
                        }))
                    },
                ),
            )
            .with_state(state.clone());
        let url = spawn_server(router).await;
        let generator = Api::new_with_url(url).unwrap().generator().unwrap();

        let result = generator
            .submit(&Credential::new("tok123"), &cat_request())
            .await
            .unwrap();

        assert_eq!(result.blob_url(), Some("http://x/img.png"));
        assert_eq!(state.auth.lock().unwrap().as_slice(), ["Bearer tok123"]);
        assert_eq!(state.bodies.lock().unwrap()[0]["params"]["clipSkip"], 2);
    }

    #[tokio::test]
    async fn test_generator_reports_missing_image_over_http() {
        let router = Router::new().route(
            "/v1/consumer/jobs",
            post(|| async { Json(serde_json::json!({ "jobs": [] })) }),
        );
        let url = spawn_server(router).await;
        let generator = Api::new_with_url(url).unwrap().generator().unwrap();

        let err = generator
            .submit(&Credential::new("tok123"), &cat_request())
            .await
            .unwrap_err();

        assert!(matches!(err, crate::GenerationError::MissingResult));
    }
}
