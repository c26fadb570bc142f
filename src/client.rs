use std::cell::RefCell;
use std::collections::VecDeque;
use std::time::Duration;

use thiserror::Error;

use crate::problem::{AnswerPayload, ProblemData, ProblemFetch, Verdict};

pub const GET_PROBLEM: &str = "/api/a-set/get-problem";
pub const GET_PRACTICE_PROBLEM: &str = "/api/a-set/get-practice-problem";
pub const SUBMIT_ANSWER: &str = "/api/a-set/submit-answer";
pub const SUBMIT_PRACTICE_ANSWER: &str = "/api/a-set/submit-practice-answer";

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("server returned {status} for {endpoint}")]
    Status {
        endpoint: &'static str,
        status: reqwest::StatusCode,
    },
    #[error("malformed response from {endpoint}: {source}")]
    Malformed {
        endpoint: &'static str,
        source: serde_json::Error,
    },
}

/// The grading server as seen by the interaction controller. Production uses
/// HTTP; tests swap in fakes.
pub trait ProblemServer {
    fn fetch_problem(&self) -> Result<ProblemFetch, ClientError>;
    fn fetch_practice_problem(&self) -> Result<ProblemData, ClientError>;
    /// Test-mode submission; the response body is unused by the client.
    fn submit_answer(&self, answer: &[u32]) -> Result<(), ClientError>;
    fn submit_practice_answer(&self, answer: &[u32]) -> Result<Verdict, ClientError>;
}

/// Blocking HTTP client. The whole app is one cooperative thread; a request
/// suspends the logical flow, never the terminal.
#[derive(Debug, Clone)]
pub struct HttpProblemServer {
    base_url: String,
    http: reqwest::blocking::Client,
}

impl HttpProblemServer {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn endpoint_url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &'static str,
    ) -> Result<T, ClientError> {
        let response = self.http.get(self.endpoint_url(endpoint)).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Status { endpoint, status });
        }
        let body = response.text()?;
        serde_json::from_str(&body).map_err(|source| ClientError::Malformed { endpoint, source })
    }

    fn post_answer(
        &self,
        endpoint: &'static str,
        answer: &[u32],
    ) -> Result<reqwest::blocking::Response, ClientError> {
        let payload = AnswerPayload {
            answer: answer.to_vec(),
        };
        let response = self
            .http
            .post(self.endpoint_url(endpoint))
            .json(&payload)
            .send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Status { endpoint, status });
        }
        Ok(response)
    }
}

impl ProblemServer for HttpProblemServer {
    fn fetch_problem(&self) -> Result<ProblemFetch, ClientError> {
        self.get_json(GET_PROBLEM)
    }

    fn fetch_practice_problem(&self) -> Result<ProblemData, ClientError> {
        self.get_json(GET_PRACTICE_PROBLEM)
    }

    fn submit_answer(&self, answer: &[u32]) -> Result<(), ClientError> {
        self.post_answer(SUBMIT_ANSWER, answer).map(|_| ())
    }

    fn submit_practice_answer(&self, answer: &[u32]) -> Result<Verdict, ClientError> {
        let response = self.post_answer(SUBMIT_PRACTICE_ANSWER, answer)?;
        let body = response.text()?;
        serde_json::from_str(&body).map_err(|source| ClientError::Malformed {
            endpoint: SUBMIT_PRACTICE_ANSWER,
            source,
        })
    }
}

/// Scripted fake for unit and integration tests: queued responses are
/// consumed in order, submissions are recorded. An empty queue answers 503.
#[derive(Default)]
pub struct ScriptedServer {
    fetches: RefCell<VecDeque<Result<ProblemFetch, ClientError>>>,
    practice_fetches: RefCell<VecDeque<Result<ProblemData, ClientError>>>,
    submits: RefCell<VecDeque<Result<(), ClientError>>>,
    verdicts: RefCell<VecDeque<Result<Verdict, ClientError>>>,
    submitted: RefCell<Vec<Vec<u32>>>,
}

impl ScriptedServer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue_fetch(&self, response: Result<ProblemFetch, ClientError>) {
        self.fetches.borrow_mut().push_back(response);
    }

    pub fn enqueue_practice_fetch(&self, response: Result<ProblemData, ClientError>) {
        self.practice_fetches.borrow_mut().push_back(response);
    }

    pub fn enqueue_submit(&self, response: Result<(), ClientError>) {
        self.submits.borrow_mut().push_back(response);
    }

    pub fn enqueue_verdict(&self, response: Result<Verdict, ClientError>) {
        self.verdicts.borrow_mut().push_back(response);
    }

    /// Every answer POSTed so far, in submission order.
    pub fn submitted(&self) -> Vec<Vec<u32>> {
        self.submitted.borrow().clone()
    }

    fn exhausted(endpoint: &'static str) -> ClientError {
        ClientError::Status {
            endpoint,
            status: reqwest::StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl ProblemServer for ScriptedServer {
    fn fetch_problem(&self) -> Result<ProblemFetch, ClientError> {
        self.fetches
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Err(Self::exhausted(GET_PROBLEM)))
    }

    fn fetch_practice_problem(&self) -> Result<ProblemData, ClientError> {
        self.practice_fetches
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Err(Self::exhausted(GET_PRACTICE_PROBLEM)))
    }

    fn submit_answer(&self, answer: &[u32]) -> Result<(), ClientError> {
        self.submitted.borrow_mut().push(answer.to_vec());
        self.submits
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Err(Self::exhausted(SUBMIT_ANSWER)))
    }

    fn submit_practice_answer(&self, answer: &[u32]) -> Result<Verdict, ClientError> {
        self.submitted.borrow_mut().push(answer.to_vec());
        self.verdicts
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Err(Self::exhausted(SUBMIT_PRACTICE_ANSWER)))
    }
}
