//! Link to the coordinator's dispatch endpoint

use async_trait::async_trait;
use fanout_shared::codec::{self, CodecError};
use fanout_shared::{Command, Snapshot};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use thiserror::Error;

/// Errors talking to the coordinator
#[derive(Error, Debug)]
pub enum ClientError {
    /// Transient: the coordinator could not be reached
    #[error("Coordinator unreachable: {0}")]
    Unreachable(#[from] reqwest::Error),

    /// The coordinator answered with a body we cannot read
    #[error("Malformed answer: {0}")]
    Decode(#[from] CodecError),
}

/// Answer to a poll
#[derive(Debug, Clone, PartialEq)]
pub enum PollResponse {
    /// Nothing to run yet
    NoWork,
    /// A command to run; only `id` and `text` are meaningful
    Assigned(Command),
    /// Any other status
    Unexpected { status: u16, body: String },
}

/// Answer to a report
#[derive(Debug, Clone, PartialEq)]
pub enum ReportResponse {
    Accepted,
    Rejected { status: u16, body: String },
}

impl std::fmt::Display for ReportResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReportResponse::Accepted => write!(f, "accepted"),
            ReportResponse::Rejected { status, body } if body.is_empty() => {
                write!(f, "rejected with status {}", status)
            }
            ReportResponse::Rejected { status, body } => {
                write!(f, "rejected with status {}: {}", status, body)
            }
        }
    }
}

/// The two requests a worker makes
#[async_trait]
pub trait CoordinatorLink: Send + Sync {
    /// Ask for the next command to run
    async fn poll(&self) -> Result<PollResponse, ClientError>;

    /// Send a partial or final snapshot of a command
    async fn report(&self, snapshot: &Snapshot) -> Result<ReportResponse, ClientError>;

    /// Human-readable address of the coordinator
    fn url(&self) -> &str;
}

/// HTTP implementation of [`CoordinatorLink`]
pub struct HttpCoordinator {
    http: Client,
    url: String,
}

impl HttpCoordinator {
    pub fn new(url: impl Into<String>) -> Result<Self, ClientError> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            url: url.into(),
        })
    }
}

#[async_trait]
impl CoordinatorLink for HttpCoordinator {
    async fn poll(&self) -> Result<PollResponse, ClientError> {
        let response = self.http.get(&self.url).send().await?;
        let status = response.status();

        match status {
            StatusCode::NO_CONTENT => Ok(PollResponse::NoWork),
            StatusCode::OK => {
                let body = response.bytes().await?;
                let assignment = codec::decode(&body)?;
                Ok(PollResponse::Assigned(Command::new(
                    assignment.id,
                    assignment.text,
                )))
            }
            _ => Ok(PollResponse::Unexpected {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            }),
        }
    }

    async fn report(&self, snapshot: &Snapshot) -> Result<ReportResponse, ClientError> {
        let body = codec::encode(snapshot)?;
        let response = self
            .http
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NO_CONTENT {
            return Ok(ReportResponse::Accepted);
        }
        Ok(ReportResponse::Rejected {
            status: status.as_u16(),
            body: response.text().await.unwrap_or_default(),
        })
    }

    fn url(&self) -> &str {
        &self.url
    }
}
