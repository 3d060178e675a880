use radar_config::HttpConfig;
use radar_host_http::{HttpError, HttpRequest};
use radar_resolver::stringify;
use serde_json::{Map, Value, json};
use tracing::debug;

use super::{NodeEnv, NodeOutput, Resolution};
use crate::error::NodeError;

/// Send the configured request. A non-2xx status is reported in the output,
/// not as a failure.
pub(super) async fn execute(config: &HttpConfig, env: &NodeEnv<'_>) -> Result<NodeOutput, NodeError> {
  let mut resolution = Resolution::default();

  let url = resolution.text(&config.url, env.variables)?;
  let url = url.trim();
  if url.is_empty() {
    return Err(NodeError::config("http url resolved to an empty string"));
  }

  let mut request = HttpRequest::new(config.method.as_str(), url).with_timeout(env.timeout);

  let headers = match &config.headers {
    Some(headers) => header_pairs(resolution.json(headers, env.variables)?)?,
    None => Vec::new(),
  };
  let has_content_type = headers
    .iter()
    .any(|(name, _)| name.eq_ignore_ascii_case("content-type"));
  for (name, value) in headers {
    request = request.with_header(name, value);
  }

  if let Some(body) = &config.body {
    let (body, is_json) = match resolution.json(body, env.variables)? {
      Value::String(raw) => match serde_json::from_str::<Value>(&raw) {
        Ok(_) => (raw, true),
        Err(_) => (raw, false),
      },
      other => (other.to_string(), true),
    };
    if is_json && !has_content_type {
      request = request.with_header("Content-Type", "application/json");
    }
    request = request.with_body(body);
  }

  let response = env.services.http.send(request).await.map_err(http_error)?;

  debug!(
    execution_id = %env.execution_id,
    node_id = %env.node.id,
    status = response.status,
    "http_response"
  );

  let body = serde_json::from_str::<Value>(&response.body)
    .unwrap_or_else(|_| Value::String(response.body.clone()));
  let headers: Map<String, Value> = response
    .headers
    .iter()
    .map(|(name, value)| (name.to_lowercase(), Value::String(value.clone())))
    .collect();

  Ok(
    NodeOutput::new(json!({
      "status": response.status,
      "ok": response.is_success(),
      "body": body,
      "headers": headers,
    }))
    .with_warnings(resolution.into_warnings()),
  )
}

/// Headers arrive as an object, or as a string holding a JSON object.
fn header_pairs(headers: Value) -> Result<Vec<(String, String)>, NodeError> {
  let headers = match headers {
    Value::String(raw) if raw.trim().is_empty() => return Ok(Vec::new()),
    Value::String(raw) => serde_json::from_str(&raw)
      .map_err(|e| NodeError::config(format!("http headers are not a JSON object: {}", e)))?,
    other => other,
  };

  match headers {
    Value::Object(map) => Ok(
      map
        .into_iter()
        .map(|(name, value)| (name, stringify(&value)))
        .collect(),
    ),
    Value::Null => Ok(Vec::new()),
    _ => Err(NodeError::config("http headers must be a JSON object")),
  }
}

fn http_error(e: HttpError) -> NodeError {
  match e {
    HttpError::InvalidUrl { .. }
    | HttpError::SchemeNotAllowed { .. }
    | HttpError::HostNotAllowed { .. }
    | HttpError::InvalidMethod { .. } => NodeError::config(e.to_string()),
    HttpError::Timeout => NodeError::integration("http", "request timed out"),
    HttpError::Transport { message } => NodeError::integration("http", message),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_header_pairs_from_object_and_string() {
    let pairs = header_pairs(json!({ "X-Api-Key": "k", "X-Retry": 3 })).unwrap();
    assert!(pairs.contains(&("X-Api-Key".to_string(), "k".to_string())));
    assert!(pairs.contains(&("X-Retry".to_string(), "3".to_string())));

    let pairs = header_pairs(json!("{\"Accept\": \"text/plain\"}")).unwrap();
    assert_eq!(pairs, vec![("Accept".to_string(), "text/plain".to_string())]);

    assert!(header_pairs(json!("")).unwrap().is_empty());
    assert!(header_pairs(json!([1])).is_err());
  }

  #[test]
  fn test_policy_errors_are_config_errors() {
    let err = http_error(HttpError::HostNotAllowed {
      host: "evil.test".to_string(),
    });
    assert!(matches!(err, NodeError::Config { .. }));

    let err = http_error(HttpError::Transport {
      message: "connection refused".to_string(),
    });
    assert_eq!(err.to_string(), "http error: connection refused");
  }
}
