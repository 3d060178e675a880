//! Shared fixtures for runtime integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use radar_config::{EngineConfig, FlowDef};
use radar_host_http::{HttpClient, HttpError, HttpRequest, HttpResponse};
use radar_runtime::services::{AiClient, AiError, AiRequest, AiResponse, LogPublishSink};
use radar_runtime::{FlowExecution, NodeLogEntry, NodeStatus, Services};
use radar_workflow::FlowGraph;
use serde_json::Value;

/// AI client that replays canned completions and records prompts.
#[derive(Default)]
pub struct MockAi {
  responses: Mutex<VecDeque<Result<String, AiError>>>,
  pub requests: Mutex<Vec<AiRequest>>,
}

impl MockAi {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn respond(self, text: impl Into<String>) -> Self {
    self.responses.lock().unwrap().push_back(Ok(text.into()));
    self
  }

  pub fn fail(self, status: u16) -> Self {
    self.responses.lock().unwrap().push_back(Err(AiError::Status {
      status,
      body: "unavailable".to_string(),
    }));
    self
  }

  pub fn prompts(&self) -> Vec<String> {
    self
      .requests
      .lock()
      .unwrap()
      .iter()
      .map(|r| r.prompt.clone())
      .collect()
  }
}

#[async_trait]
impl AiClient for MockAi {
  async fn complete(&self, request: AiRequest) -> Result<AiResponse, AiError> {
    self.requests.lock().unwrap().push(request);
    let next = self.responses.lock().unwrap().pop_front();
    match next {
      Some(Ok(text)) => Ok(AiResponse { text }),
      Some(Err(e)) => Err(e),
      None => Err(AiError::InvalidResponse {
        message: "no canned response".to_string(),
      }),
    }
  }
}

/// HTTP client that answers every request with the same response.
pub struct MockHttp {
  pub status: u16,
  pub body: String,
  pub requests: Mutex<Vec<HttpRequest>>,
}

impl MockHttp {
  pub fn new(status: u16, body: impl Into<String>) -> Self {
    Self {
      status,
      body: body.into(),
      requests: Mutex::new(Vec::new()),
    }
  }
}

#[async_trait]
impl HttpClient for MockHttp {
  async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
    self.requests.lock().unwrap().push(request);
    Ok(HttpResponse {
      status: self.status,
      headers: vec![("Content-Type".to_string(), "application/json".to_string())],
      body: self.body.clone(),
    })
  }
}

pub fn services() -> Services {
  Services::from_config(EngineConfig::default())
}

pub fn services_with(config: EngineConfig) -> Services {
  Services::from_config(config)
}

/// Services with a mock AI client and a capturing publish sink.
pub fn mocked(ai: MockAi) -> (Services, Arc<MockAi>, Arc<LogPublishSink>) {
  let ai = Arc::new(ai);
  let sink = Arc::new(LogPublishSink::new());
  let services = services()
    .with_ai(ai.clone())
    .with_publisher(sink.clone());
  (services, ai, sink)
}

pub fn flow(def: Value) -> Arc<FlowGraph> {
  let def: FlowDef = serde_json::from_value(def).unwrap();
  Arc::new(FlowGraph::from_def(def).unwrap())
}

/// The latest terminal entry of a node outside any loop pass.
pub fn terminal<'a>(execution: &'a FlowExecution, node_id: &str) -> Option<&'a NodeLogEntry> {
  execution
    .execution_log
    .iter()
    .rev()
    .find(|e| e.node_id == node_id && e.loop_tag.is_none() && e.status != NodeStatus::Running)
}

pub fn output<'a>(execution: &'a FlowExecution, node_id: &str) -> &'a Value {
  terminal(execution, node_id)
    .and_then(|e| e.output.as_ref())
    .unwrap_or_else(|| panic!("no output for {}", node_id))
}

pub fn ran(execution: &FlowExecution, node_id: &str) -> bool {
  execution.execution_log.iter().any(|e| e.node_id == node_id)
}
