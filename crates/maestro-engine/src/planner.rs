//! Plan and summary generation
//!
//! The planner asks the reasoning model for a structured step list and
//! degrades deterministically: an unparseable response falls back to a
//! fixed three-step plan, a failed gateway call falls back to a single
//! catch-all step carrying the task description. Planning therefore never
//! fails - `plan` always returns at least one step.

use crate::task::{StepSpec, Task};
use maestro_foundation::{ChatMessage, Error, GenerationOptions};
use maestro_gateway::Gateway;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

const PLANNER_SYSTEM_PROMPT: &str = "You are a task planner. Break the given task into a short \
ordered list of concrete steps. A step that needs an external tool must name the tool id and \
method; all other steps are reasoning steps. Respond with JSON only, in the form \
{\"steps\": [{\"name\": \"...\", \"description\": \"...\", \"tool_id\": null, \
\"tool_method\": null, \"tool_params\": null}]}.";

/// Expected shape of a planning response
#[derive(Debug, Deserialize)]
struct PlanResponse {
    steps: Vec<PlannedStep>,
}

#[derive(Debug, Deserialize)]
struct PlannedStep {
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    tool_id: Option<String>,
    #[serde(default)]
    tool_method: Option<String>,
    #[serde(default)]
    tool_params: Option<HashMap<String, Value>>,
}

/// Generates step plans and closing summaries via the gateway
pub struct Planner {
    gateway: Arc<dyn Gateway>,
    /// "id: description" lines describing the available tools
    capability_summary: String,
}

impl Planner {
    pub fn new(gateway: Arc<dyn Gateway>, capability_summary: String) -> Self {
        Self {
            gateway,
            capability_summary,
        }
    }

    /// Produce a step list for a task. Never fails.
    pub async fn plan(&self, task: &Task) -> Vec<StepSpec> {
        let messages = vec![
            ChatMessage::system(PLANNER_SYSTEM_PROMPT),
            ChatMessage::user(format!(
                "Task: {}\n\nDetails: {}\n\nAvailable tools:\n{}",
                task.title, task.description, self.capability_summary
            )),
        ];

        match self
            .gateway
            .complete(messages, GenerationOptions::default())
            .await
        {
            Ok(completion) => match parse_plan(&completion.content) {
                Some(steps) => {
                    debug!(task_id = %task.id, count = steps.len(), "Planned steps from model");
                    steps
                }
                None => {
                    warn!(task_id = %task.id, "Unparseable plan, using generic fallback");
                    generic_fallback_plan()
                }
            },
            Err(e) => {
                // Recovered here, never surfaced as a task failure
                let error = Error::Planning(e.to_string());
                warn!(task_id = %task.id, error = %error, "Planning failed, using catch-all step");
                catch_all_plan(&task.description)
            }
        }
    }

    /// Synthesize a closing summary from completed step results. Never fails:
    /// a gateway error substitutes a generic placeholder.
    pub async fn summarize(&self, task: &Task) -> String {
        let step_results: Vec<String> = task
            .steps
            .iter()
            .map(|s| {
                let result = s
                    .result
                    .as_ref()
                    .map(|r| r.to_string())
                    .unwrap_or_else(|| "(no result)".to_string());
                format!("{}: {}", s.name, result)
            })
            .collect();

        let messages = vec![
            ChatMessage::system(
                "Summarize the outcome of the finished task in a few sentences, \
                 based on its step results.",
            ),
            ChatMessage::user(format!(
                "Task: {}\n\nStep results:\n{}",
                task.title,
                step_results.join("\n")
            )),
        ];

        match self
            .gateway
            .complete(messages, GenerationOptions::default())
            .await
        {
            Ok(completion) => completion.content,
            Err(e) => {
                warn!(task_id = %task.id, error = %e, "Summary call failed, using placeholder");
                format!("Task '{}' completed successfully.", task.title)
            }
        }
    }
}

/// Extract and decode a `{"steps": [...]}` object from model output.
///
/// Models wrap JSON in prose or code fences often enough that we cut from
/// the first `{` to the last `}` before parsing.
fn parse_plan(content: &str) -> Option<Vec<StepSpec>> {
    let start = content.find('{')?;
    let end = content.rfind('}')?;
    if end < start {
        return None;
    }

    let parsed: PlanResponse = serde_json::from_str(&content[start..=end]).ok()?;
    if parsed.steps.is_empty() {
        return None;
    }

    Some(
        parsed
            .steps
            .into_iter()
            .map(|s| StepSpec {
                name: s.name,
                description: s.description,
                tool_id: s.tool_id,
                tool_method: s.tool_method,
                tool_params: s.tool_params,
            })
            .collect(),
    )
}

/// Fixed three-step plan used when the model's answer cannot be parsed
fn generic_fallback_plan() -> Vec<StepSpec> {
    vec![
        StepSpec::model("analyze", "Analyze the task requirements"),
        StepSpec::model("execute", "Carry out the main work of the task"),
        StepSpec::model("finalize", "Finalize and check the results"),
    ]
}

/// Single catch-all step used when the planning call itself fails
fn catch_all_plan(description: &str) -> Vec<StepSpec> {
    vec![StepSpec::model("execute_task", description)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plan_plain_json() {
        let content = r#"{"steps": [{"name": "fetch", "description": "Fetch the file",
            "tool_id": "filesystem", "tool_method": "read_file",
            "tool_params": {"path": "/tmp/a.txt"}}]}"#;

        let steps = parse_plan(content).unwrap();
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].tool_id.as_deref(), Some("filesystem"));
        assert_eq!(steps[0].tool_method.as_deref(), Some("read_file"));
    }

    #[test]
    fn test_parse_plan_surrounded_by_prose() {
        let content = "Here is the plan:\n```json\n{\"steps\": [{\"name\": \"a\", \
                       \"description\": \"first\"}]}\n```\nGood luck!";
        let steps = parse_plan(content).unwrap();
        assert_eq!(steps[0].name, "a");
        assert!(steps[0].tool_id.is_none());
    }

    #[test]
    fn test_parse_plan_rejects_garbage_and_empty() {
        assert!(parse_plan("I cannot help with that.").is_none());
        assert!(parse_plan("{\"steps\": []}").is_none());
        assert!(parse_plan("{\"steps\": \"not a list\"}").is_none());
    }

    #[test]
    fn test_generic_fallback_shape() {
        let steps = generic_fallback_plan();
        assert_eq!(steps.len(), 3);
        assert!(steps.iter().all(|s| s.tool_id.is_none()));
        assert_eq!(steps[0].name, "analyze");
        assert_eq!(steps[2].name, "finalize");
    }

    #[test]
    fn test_catch_all_carries_description() {
        let steps = catch_all_plan("Count the lines in /tmp/a.txt");
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].description, "Count the lines in /tmp/a.txt");
    }
}
