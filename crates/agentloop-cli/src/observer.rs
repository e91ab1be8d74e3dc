//! Terminal progress output for runs

use std::collections::HashMap;
use std::sync::Mutex;

use agentloop_core::{Message, RunObserver, RunState, SuspensionRequest};

// ANSI color codes
pub const GREEN: &str = "\x1b[92m";
pub const YELLOW: &str = "\x1b[93m";
pub const BLUE: &str = "\x1b[94m";
pub const CYAN: &str = "\x1b[96m";
pub const BOLD: &str = "\x1b[1m";
pub const DIM: &str = "\x1b[2m";
pub const RESET: &str = "\x1b[0m";

/// Prints plans and tool results to stderr as they are committed
#[derive(Default)]
pub struct TerminalObserver {
    /// Also print every state transition
    verbose: bool,
    /// Request id to tool name, for labelling results
    pending: Mutex<HashMap<String, String>>,
}

impl TerminalObserver {
    pub fn new(verbose: bool) -> Self {
        Self {
            verbose,
            pending: Mutex::new(HashMap::new()),
        }
    }

    fn tool_name(&self, request_id: &str) -> String {
        self.pending
            .lock()
            .ok()
            .and_then(|mut pending| pending.remove(request_id))
            .unwrap_or_else(|| "tool".to_string())
    }
}

impl RunObserver for TerminalObserver {
    fn on_transition(&self, conversation_id: &str, from: RunState, to: RunState) {
        if self.verbose {
            eprintln!("{}[{}] {} -> {}{}", DIM, conversation_id, from, to, RESET);
        }
    }

    fn on_decision(&self, _conversation_id: &str, message: &Message) {
        if !message.has_action_requests() {
            return;
        }
        if let Ok(mut pending) = self.pending.lock() {
            for request in &message.action_requests {
                pending.insert(request.id.clone(), request.tool.clone());
            }
        }
        for request in &message.action_requests {
            eprintln!("{}[Plan]{} {}({})", CYAN, RESET, request.tool, request.arguments);
        }
    }

    fn on_tool_message(&self, _conversation_id: &str, message: &Message) {
        let tool = self.tool_name(message.correlation_id.as_deref().unwrap_or_default());
        let (color, label) = if message.is_error {
            (YELLOW, "Error")
        } else {
            (GREEN, "OK")
        };
        eprintln!(
            "{}[Tool: {}]{} {}{}{} {}",
            CYAN, tool, RESET, color, label, RESET, message.content
        );
    }

    fn on_suspended(&self, _conversation_id: &str, request: &SuspensionRequest) {
        let question = request
            .question_text()
            .map(str::to_string)
            .unwrap_or_else(|| request.payload.to_string());
        eprintln!("{}[Paused]{} waiting for an answer to: {}", YELLOW, RESET, question);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentloop_core::ActionRequest;
    use serde_json::json;

    #[test]
    fn test_tool_names_resolved_once() {
        let observer = TerminalObserver::new(false);
        observer.on_decision(
            "c1",
            &Message::agent("", vec![ActionRequest::new("r1", "get_weather", json!({}))]),
        );

        assert_eq!(observer.tool_name("r1"), "get_weather");
        assert_eq!(observer.tool_name("r1"), "tool");
    }
}
