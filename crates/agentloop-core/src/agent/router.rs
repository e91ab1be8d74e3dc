//! Router between the decision step and the execution step

use crate::message::Message;

/// Where the run goes after a decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Execute,
    Terminal,
}

/// Pick the next step from the last message in the log.
///
/// The controller only calls this right after a decision, so `last` is an
/// agent message; anything without action requests terminates.
pub fn route(last: &Message) -> Route {
    if last.has_action_requests() {
        Route::Execute
    } else {
        Route::Terminal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{ActionRequest, ConversationState};
    use serde_json::json;

    fn plan(n: usize) -> Message {
        let requests = (0..n)
            .map(|i| ActionRequest::new(format!("call_{}", i), "get_weather", json!({})))
            .collect();
        Message::agent("", requests)
    }

    #[test]
    fn test_agent_with_requests_routes_to_execute() {
        for n in 1..5 {
            assert_eq!(route(&plan(n)), Route::Execute);
        }
    }

    #[test]
    fn test_agent_without_requests_terminates() {
        assert_eq!(route(&Message::agent("done", vec![])), Route::Terminal);
        assert_eq!(route(&Message::agent("", vec![])), Route::Terminal);
    }

    #[test]
    fn test_route_ignores_history() {
        // Only the last message matters, however long the log is
        for history in [0usize, 1, 7, 40] {
            let mut state = ConversationState::new("c1");
            for i in 0..history {
                state.push(Message::user(format!("message {}", i))).unwrap();
            }
            state.push(plan(2)).unwrap();
            assert_eq!(route(state.last_message().unwrap()), Route::Execute);

            state.push(Message::tool_result("call_0", "ok")).unwrap();
            state.push(Message::tool_result("call_1", "ok")).unwrap();
            state.push(Message::agent("answer", vec![])).unwrap();
            assert_eq!(route(state.last_message().unwrap()), Route::Terminal);
        }
    }
}
