use std::sync::Arc;

use parley_traits::{ToolError, ToolOutput, ToolRegistry, ToolSchema};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::AiError;
use crate::guardrails::GuardrailPolicy;
use crate::llm::{CompletionResponse, Message, TokenUsage, ToolCall};
use crate::resilience::ResilienceError;

use super::TurnExecutor;

/// Per-turn parameters of the tool loop.
pub(super) struct ToolLoop<'a> {
    pub policy: Option<&'a GuardrailPolicy>,
    pub agent_id: &'a str,
    pub tool_schemas: &'a [ToolSchema],
    pub temperature: Option<f32>,
    pub max_iterations: usize,
    pub cancel: &'a CancellationToken,
}

pub(super) struct ToolLoopOutcome {
    pub response: CompletionResponse,
    pub iterations: usize,
}

impl TurnExecutor {
    /// Execute requested tools and re-call the backend until it stops asking
    /// for tools or `max_iterations` extra calls have been made.
    ///
    /// Tool calls run one at a time in the order the backend listed them.
    /// Denied, unknown and failing tools are reported back as system messages.
    /// Hitting the iteration bound is not an error; the last response is final.
    pub(super) async fn run_tool_loop(
        &self,
        tool_loop: &ToolLoop<'_>,
        messages: &mut Vec<Message>,
        mut response: CompletionResponse,
        usage: &mut TokenUsage,
    ) -> Result<ToolLoopOutcome, ResilienceError<AiError>> {
        let mut iterations = 0;

        while response.has_tool_calls() && iterations < tool_loop.max_iterations {
            iterations += 1;
            debug!(
                iteration = iterations,
                tool_calls = response.tool_calls.len(),
                "Processing tool calls"
            );

            for call in &response.tool_calls {
                self.process_tool_call(tool_loop, call, messages).await?;
            }

            let request =
                self.completion_request(messages, tool_loop.tool_schemas, tool_loop.temperature);
            let next = self.call_backend(request, tool_loop.cancel).await?;
            if let Some(call_usage) = &next.usage {
                usage.accumulate(call_usage);
            }
            response = next;
        }

        if response.has_tool_calls() {
            warn!(
                max_iterations = tool_loop.max_iterations,
                "Tool iteration limit reached, returning last response"
            );
        }

        Ok(ToolLoopOutcome {
            response,
            iterations,
        })
    }

    async fn process_tool_call(
        &self,
        tool_loop: &ToolLoop<'_>,
        call: &ToolCall,
        messages: &mut Vec<Message>,
    ) -> Result<(), ResilienceError<AiError>> {
        let name = call.name.as_str();

        if let Some(policy) = tool_loop.policy
            && !policy.validate_tool_usage(tool_loop.agent_id, name)
        {
            warn!(agent_id = %tool_loop.agent_id, tool = %name, "Tool call denied by policy");
            messages.push(Message::system(format!(
                "Tool {name} is not allowed for agent {}",
                tool_loop.agent_id
            )));
            return Ok(());
        }

        // Each tool runs in its own task so a panicking tool only fails its own call.
        let tools = Arc::clone(&self.tools);
        let tool_name = name.to_string();
        let arguments = call.arguments.clone();
        let mut handle =
            tokio::spawn(async move { invoke_tool(&tools, &tool_name, arguments).await });

        let outcome = tokio::select! {
            biased;
            _ = tool_loop.cancel.cancelled() => {
                handle.abort();
                return Err(ResilienceError::Cancelled);
            }
            joined = &mut handle => match joined {
                Ok(outcome) => outcome,
                Err(e) if e.is_panic() => {
                    Err(ToolError::Execution(format!("Tool task panicked: {e}")))
                }
                Err(e) => Err(ToolError::Execution(format!("Tool task failed: {e}"))),
            },
        };

        match outcome {
            Ok(output) => {
                messages.push(Message::assistant(format!(
                    "Called tool {name} with {}",
                    call.arguments
                )));
                messages.push(Message::system(format!(
                    "Tool {name} returned: {}",
                    output.render()
                )));
            }
            Err(e) => {
                warn!(tool = %name, error = %e, "Tool execution failed");
                messages.push(Message::system(format!("Error executing tool {name}: {e}")));
            }
        }
        Ok(())
    }
}

async fn invoke_tool(
    tools: &ToolRegistry,
    name: &str,
    arguments: Value,
) -> Result<ToolOutput, ToolError> {
    let tool = tools.get(name)?;
    let output = tool.execute(arguments).await?;
    if output.success {
        Ok(output)
    } else {
        Err(ToolError::Execution(output.render()))
    }
}
