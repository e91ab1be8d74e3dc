//! Execution step: runs a batch of action requests in order

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::message::{ActionRequest, Message, Suspension, SuspensionRequest};
use crate::tools::registry::ToolRegistry;
use crate::tools::{ToolContext, ToolKind, ToolOutcome, ToolResult};

/// Result of executing one batch
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionOutcome {
    /// One tool message per request, in request order
    Completed(Vec<Message>),
    /// A human-input tool stopped the batch. `messages` holds the results of
    /// the requests that ran before it; later requests were not run.
    Suspended {
        messages: Vec<Message>,
        suspension: Suspension,
    },
}

/// Result of dispatching a single request
#[derive(Debug)]
enum Dispatch {
    Completed(ToolResult),
    Suspend(SuspensionRequest),
    NotFound,
    Fault(String),
}

/// Runs action requests against the tool registry
pub struct ExecutionStep {
    registry: Arc<ToolRegistry>,
    max_output_len: usize,
}

impl ExecutionStep {
    pub fn new(registry: Arc<ToolRegistry>, max_output_len: usize) -> Self {
        Self {
            registry,
            max_output_len,
        }
    }

    /// Execute `requests` sequentially. Tool faults become error-marked tool
    /// messages; only a human-input tool can cut the batch short.
    #[instrument(skip(self, requests), fields(requests = requests.len()))]
    pub async fn execute(&self, conversation_id: &str, requests: &[ActionRequest]) -> ExecutionOutcome {
        let mut messages = Vec::with_capacity(requests.len());

        for request in requests {
            let ctx = ToolContext::new(conversation_id, request.id.clone());
            let message = match self.dispatch(request, &ctx).await {
                Dispatch::Completed(result) => {
                    let content = truncate_output(result.to_content(), self.max_output_len);
                    if result.success {
                        Message::tool_result(&request.id, content)
                    } else {
                        Message::tool_error(&request.id, content)
                    }
                }
                Dispatch::Suspend(suspension) => {
                    info!(
                        tool = %request.tool,
                        request_id = %request.id,
                        completed = messages.len(),
                        skipped = requests.len() - messages.len() - 1,
                        "Tool requested human input, suspending"
                    );
                    return ExecutionOutcome::Suspended {
                        messages,
                        suspension: Suspension {
                            request_id: request.id.clone(),
                            tool: request.tool.clone(),
                            request: suspension,
                        },
                    };
                }
                Dispatch::NotFound => {
                    Message::tool_error(&request.id, format!("Tool not found: {}", request.tool))
                }
                Dispatch::Fault(error) => {
                    Message::tool_error(&request.id, format!("Tool error: {}", error))
                }
            };
            messages.push(message);
        }

        ExecutionOutcome::Completed(messages)
    }

    #[instrument(skip(self, ctx), fields(tool = %request.tool, request_id = %request.id))]
    async fn dispatch(&self, request: &ActionRequest, ctx: &ToolContext) -> Dispatch {
        let tool = match self.registry.get(&request.tool) {
            Some(t) => t,
            None => {
                warn!(tool = %request.tool, "Tool not found");
                return Dispatch::NotFound;
            }
        };

        let missing = tool.parameters_schema().missing_required(&request.arguments).join(", ");
        if !missing.is_empty() {
            warn!(missing = %missing, "Missing required parameters");
            return Dispatch::Fault(format!("Missing required parameter: {}", missing));
        }

        debug!(kind = %tool.kind(), "Executing tool");
        match tool.invoke(&request.arguments, ctx).await {
            Ok(ToolOutcome::Completed(result)) => {
                if result.success {
                    info!(output_len = result.output.len(), "Tool executed successfully");
                } else {
                    warn!(error = ?result.error, "Tool reported failure");
                }
                Dispatch::Completed(result)
            }
            Ok(ToolOutcome::Suspend(suspension)) if tool.kind() == ToolKind::HumanInput => {
                Dispatch::Suspend(suspension)
            }
            Ok(ToolOutcome::Suspend(_)) => {
                warn!("Standard tool attempted to suspend the run");
                Dispatch::Fault(format!(
                    "tool '{}' is not allowed to request human input",
                    request.tool
                ))
            }
            Err(e) => {
                warn!(error = %e, "Tool execution error");
                Dispatch::Fault(e.to_string())
            }
        }
    }
}

/// Cut `output` to at most `max_len` bytes on a char boundary
fn truncate_output(output: String, max_len: usize) -> String {
    if output.len() <= max_len {
        return output;
    }

    let mut end = max_len;
    while !output.is_char_boundary(end) {
        end -= 1;
    }
    format!(
        "{}\n\n[Output truncated: {} of {} bytes shown]",
        &output[..end],
        end,
        output.len()
    )
}
