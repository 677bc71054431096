//! Mock backend for testing without a live provider.
//!
//! [`MockBackend`] returns pre-configured responses in order and counts how
//! often it was called, so tests can assert that no oracle call happened.
//!
//! # Example
//!
//! ```
//! use agri_gateway::backend::MockBackend;
//!
//! let mock = MockBackend::fixed(r#"{"price": 2100}"#);
//! assert_eq!(mock.calls(), 0);
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use reqwest::Client;

use super::{OracleBackend, OracleRequest, OracleResponse};
use crate::error::Result;
use crate::GatewayError;

/// A test backend that returns canned responses in order.
///
/// Cycles back to the beginning when all responses have been consumed.
#[derive(Debug)]
pub struct MockBackend {
    responses: Vec<String>,
    failure: Option<String>,
    index: AtomicUsize,
}

impl MockBackend {
    /// Create a mock backend with the given canned responses.
    pub fn new(responses: Vec<String>) -> Self {
        assert!(!responses.is_empty(), "MockBackend requires at least one response");
        Self {
            responses,
            failure: None,
            index: AtomicUsize::new(0),
        }
    }

    /// Create a mock that always returns the same response.
    pub fn fixed(response: impl Into<String>) -> Self {
        Self::new(vec![response.into()])
    }

    /// Create a mock whose every call fails as if the provider were unreachable.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            responses: Vec::new(),
            failure: Some(message.into()),
            index: AtomicUsize::new(0),
        }
    }

    /// Number of completions requested so far.
    pub fn calls(&self) -> usize {
        self.index.load(Ordering::Relaxed)
    }

    fn next_response(&self) -> Result<String> {
        let idx = self.index.fetch_add(1, Ordering::Relaxed);
        match &self.failure {
            Some(message) => Err(GatewayError::Other(message.clone())),
            None => Ok(self.responses[idx % self.responses.len()].clone()),
        }
    }
}

#[async_trait]
impl OracleBackend for MockBackend {
    async fn complete(
        &self,
        _client: &Client,
        _base_url: &str,
        _request: &OracleRequest,
    ) -> Result<OracleResponse> {
        let text = self.next_response()?;
        Ok(OracleResponse {
            text,
            status: 200,
            metadata: None,
        })
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
