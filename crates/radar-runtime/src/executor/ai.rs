use radar_config::{AiConfig, OutputFormat};
use radar_resolver::stringify;
use serde_json::{Value, json};
use tracing::warn;

use super::{NodeEnv, NodeOutput, Resolution};
use crate::error::NodeError;
use crate::services::{AiError, AiRequest};

/// Build the prompt, call the AI service (retrying with linear backoff),
/// and shape the completion per the output format.
pub(super) async fn execute(config: &AiConfig, env: &NodeEnv<'_>) -> Result<NodeOutput, NodeError> {
  let mut resolution = Resolution::default();
  let pre_prompt = resolution.text(&config.pre_prompt, env.variables)?;
  let prompt = resolution.text(&config.prompt, env.variables)?;
  if prompt.trim().is_empty() {
    return Err(NodeError::config("ai prompt resolved to an empty string"));
  }

  let activation = if config.include_activation {
    env.variables.activation().and_then(activation_block)
  } else {
    None
  };

  let request = AiRequest {
    model: config.model.clone(),
    prompt: build_prompt(&pre_prompt, activation.as_deref(), &prompt),
    json: config.output_format == OutputFormat::Json,
  };

  let backoff = env.services.config.ai.retry_backoff();
  let mut attempt = 0;
  let response = loop {
    match env.services.ai.complete(request.clone()).await {
      Ok(response) => break response,
      Err(e) if attempt < config.max_retries => {
        attempt += 1;
        warn!(
          execution_id = %env.execution_id,
          node_id = %env.node.id,
          attempt,
          error = %e,
          "ai_retry"
        );
        tokio::time::sleep(backoff * attempt).await;
      }
      Err(e) => return Err(ai_error(e)),
    }
  };

  let output = match config.output_format {
    OutputFormat::Text => json!({ "response": response.text }),
    OutputFormat::Json => parse_json_response(&response.text)?,
  };

  Ok(NodeOutput::new(output).with_warnings(resolution.into_warnings()))
}

fn ai_error(e: AiError) -> NodeError {
  NodeError::integration("ai", e.to_string())
}

/// Pre-prompt, activation block, and prompt, blank-line separated.
fn build_prompt(pre_prompt: &str, activation: Option<&str>, prompt: &str) -> String {
  [pre_prompt.trim(), activation.unwrap_or_default(), prompt.trim()]
    .into_iter()
    .filter(|part| !part.is_empty())
    .collect::<Vec<_>>()
    .join("\n\n")
}

fn activation_block(activation: &Value) -> Option<String> {
  let list = |key: &str| match &activation[key] {
    Value::Array(items) => items
      .iter()
      .map(stringify)
      .filter(|s| !s.is_empty())
      .collect::<Vec<_>>()
      .join(", "),
    other => stringify(other),
  };

  let lines: Vec<String> = [
    ("Briefing", stringify(&activation["briefing"])),
    ("Keywords", list("keywords")),
    ("People of interest", list("people_of_interest")),
    ("Category", stringify(&activation["category"])),
  ]
  .into_iter()
  .filter(|(_, value)| !value.trim().is_empty())
  .map(|(label, value)| format!("{}: {}", label, value))
  .collect();

  if lines.is_empty() {
    return None;
  }
  Some(format!("Activation context:\n{}", lines.join("\n")))
}

/// Parse a JSON completion. Code fences are stripped; non-object values
/// are wrapped as `{ "result": ... }`.
fn parse_json_response(text: &str) -> Result<Value, NodeError> {
  let body = strip_fences(text);
  let parsed: Value = serde_json::from_str(body)
    .map_err(|e| NodeError::integration("ai", format!("response is not valid JSON: {}", e)))?;
  Ok(match parsed {
    Value::Object(_) => parsed,
    other => json!({ "result": other }),
  })
}

fn strip_fences(text: &str) -> &str {
  let trimmed = text.trim();
  let Some(rest) = trimmed.strip_prefix("```") else {
    return trimmed;
  };
  // Drop the info string (`json`) on the opening fence line.
  let rest = rest.split_once('\n').map_or("", |(_, body)| body);
  rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_build_prompt_joins_parts() {
    let prompt = build_prompt("You are an analyst.", Some("Activation context:\nBriefing: b"), "Rate it");
    assert_eq!(
      prompt,
      "You are an analyst.\n\nActivation context:\nBriefing: b\n\nRate it"
    );
    assert_eq!(build_prompt("  ", None, "Rate it"), "Rate it");
  }

  #[test]
  fn test_activation_block() {
    let block = activation_block(&json!({
      "briefing": "Monitor port strikes",
      "keywords": ["port", "strike"],
      "people_of_interest": [],
      "category": "labor"
    }))
    .unwrap();
    assert_eq!(
      block,
      "Activation context:\nBriefing: Monitor port strikes\nKeywords: port, strike\nCategory: labor"
    );
    assert!(activation_block(&json!({})).is_none());
  }

  #[test]
  fn test_parse_json_response() {
    let fenced = "```json\n{\"risk_score\": 85}\n```";
    assert_eq!(parse_json_response(fenced).unwrap(), json!({ "risk_score": 85 }));
    assert_eq!(parse_json_response("[1, 2]").unwrap(), json!({ "result": [1, 2] }));
    assert_eq!(parse_json_response(" 42 ").unwrap(), json!({ "result": 42 }));

    let err = parse_json_response("not json").unwrap_err();
    assert!(matches!(err, NodeError::Integration { ref service, .. } if service == "ai"));
  }
}
