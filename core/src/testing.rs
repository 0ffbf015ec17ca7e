//! In-memory transport for tests.
//!
//! `ScriptedTransport` replays a queue of canned responses and records every
//! request it sees. Clones share the same script, so a test can hand one
//! clone to a `RequestHandler` and inspect the other afterwards.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use crate::http::{HttpRequest, HttpResponse, Transport, TransportError};

#[derive(Debug, Clone, Default)]
pub struct ScriptedTransport {
    inner: Arc<Mutex<Script>>,
}

#[derive(Debug, Default)]
struct Script {
    replies: VecDeque<Result<HttpResponse, String>>,
    requests: Vec<HttpRequest>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transport that answers every listed response once, in order.
    pub fn with_responses(responses: impl IntoIterator<Item = HttpResponse>) -> Self {
        let transport = Self::new();
        for response in responses {
            transport.push(response);
        }
        transport
    }

    pub fn push(&self, response: HttpResponse) -> &Self {
        self.lock().replies.push_back(Ok(response));
        self
    }

    /// Queue a transport failure.
    pub fn push_failure(&self, message: &str) -> &Self {
        self.lock().replies.push_back(Err(message.to_string()));
        self
    }

    /// Requests received so far.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.lock().requests.clone()
    }

    pub fn calls(&self) -> usize {
        self.lock().requests.len()
    }

    /// Responses not yet consumed.
    pub fn remaining(&self) -> usize {
        self.lock().replies.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Script> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Transport for ScriptedTransport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut script = self.lock();
        script.requests.push(request.clone());
        match script.replies.pop_front() {
            Some(Ok(response)) => Ok(response),
            Some(Err(message)) => Err(message.into()),
            None => Err(format!("no scripted response left for {}", request.api_method).into()),
        }
    }
}
