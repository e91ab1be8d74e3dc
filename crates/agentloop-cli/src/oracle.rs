//! Offline reasoning oracle for the demo tools
//!
//! Plans from the log alone, so it works the same after a restart:
//! the latest user message decides the batch, tool results in the current
//! turn decide the follow-up.

use std::collections::HashMap;

use agentloop_core::{ActionRequest, Decision, Message, ReasoningOracle, Role, ToolDescriptor};
use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

const KNOWN_CITIES: [&str; 3] = ["san francisco", "new york", "london"];
const CONFIRM_WORDS: [&str; 3] = ["confirm", "ask me", "check with me"];
const YES_WORDS: [&str; 6] = ["yes", "y", "ok", "okay", "sure", "go ahead"];

/// Keyword planner over `get_weather`, `send_email` and `ask_human`
#[derive(Debug, Default, Clone, Copy)]
pub struct RuleOracle;

/// What the latest user message asks for
#[derive(Debug, Default, PartialEq)]
struct Intent {
    cities: Vec<String>,
    recipient: Option<String>,
    confirm: bool,
    mentions_weather: bool,
}

impl Intent {
    fn parse(text: &str) -> Self {
        let lower = text.to_lowercase();

        let mut cities: Vec<String> = KNOWN_CITIES
            .iter()
            .filter(|c| lower.contains(*c))
            .map(|c| title_case(c))
            .collect();
        if cities.is_empty() {
            if let Some(city) = city_after_in(text) {
                cities.push(city);
            }
        }

        let recipient = text
            .split_whitespace()
            .map(|w| w.trim_matches(|c: char| !is_address_char(c)).trim_end_matches('.'))
            .find(|w| w.contains('@'))
            .map(str::to_string);

        Self {
            cities,
            recipient,
            confirm: CONFIRM_WORDS.iter().any(|w| lower.contains(w)),
            mentions_weather: lower.contains("weather") || lower.contains("forecast"),
        }
    }
}

fn is_address_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '@' | '.' | '_' | '-' | '+')
}

/// "weather in Paris today" -> "Paris"
fn city_after_in(text: &str) -> Option<String> {
    let lower = text.to_lowercase();
    let start = lower.find(" in ")? + 4;
    let rest = text.get(start..)?;
    let city: Vec<&str> = rest
        .split_whitespace()
        .take_while(|w| w.chars().next().is_some_and(char::is_uppercase))
        .map(|w| w.trim_end_matches(|c: char| !c.is_alphanumeric()))
        .collect();
    (!city.is_empty()).then(|| city.join(" "))
}

fn title_case(s: &str) -> String {
    s.split(' ')
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

fn weather_request(city: &str) -> ActionRequest {
    ActionRequest::new("", "get_weather", json!({ "city": city }))
}

fn email_request(recipient: &str, cities: &[String]) -> ActionRequest {
    let subject = if cities.is_empty() {
        "Message from agentloop".to_string()
    } else {
        format!("Weather report: {}", cities.join(", "))
    };
    ActionRequest::new(
        "",
        "send_email",
        json!({ "recipient": recipient, "subject": subject }),
    )
}

fn is_affirmative(answer: &str) -> bool {
    let answer = answer.trim().to_lowercase();
    YES_WORDS.iter().any(|w| {
        answer == *w
            || answer.starts_with(&format!("{} ", w))
            || answer.starts_with(&format!("{},", w))
    })
}

impl RuleOracle {
    pub fn new() -> Self {
        Self
    }

    fn plan(&self, messages: &[Message]) -> Decision {
        let Some(user_idx) = messages.iter().rposition(|m| m.role == Role::User) else {
            return Decision::answer("Hello! Ask me about the weather or to send an email.");
        };
        let intent = Intent::parse(&messages[user_idx].content);
        let turn = &messages[user_idx + 1..];

        if turn.is_empty() {
            self.first_step(&intent, &messages[..user_idx])
        } else {
            self.follow_up(&intent, turn)
        }
    }

    fn first_step(&self, intent: &Intent, history: &[Message]) -> Decision {
        let mut requests: Vec<ActionRequest> =
            intent.cities.iter().map(|c| weather_request(c)).collect();

        if let Some(ref recipient) = intent.recipient {
            if intent.confirm {
                requests.push(ActionRequest::new(
                    "",
                    "ask_human",
                    json!({ "question": format!("Send the email to {}?", recipient) }),
                ));
            } else {
                requests.push(email_request(recipient, &intent.cities));
            }
        }

        if !requests.is_empty() {
            let names: Vec<&str> = requests.iter().map(|r| r.tool.as_str()).collect();
            return Decision::act(format!("Calling {}.", names.join(", ")), requests);
        }

        if intent.mentions_weather {
            return match last_weather(history) {
                Some((city, report)) => {
                    Decision::answer(format!("Earlier the weather in {} was {}.", city, report))
                }
                None => Decision::answer("Which city would you like the weather for?"),
            };
        }

        Decision::answer("I can check the weather for a city or send an email for you.")
    }

    fn follow_up(&self, intent: &Intent, turn: &[Message]) -> Decision {
        let requests = requests_by_id(turn);
        let results: Vec<(&ActionRequest, &Message)> = turn
            .iter()
            .filter(|m| m.role == Role::Tool)
            .filter_map(|m| {
                let id = m.correlation_id.as_deref()?;
                requests.get(id).map(|r| (*r, m))
            })
            .collect();

        let emailed = results.iter().any(|(r, _)| r.tool == "send_email");
        let confirmation = results.iter().rev().find(|(r, _)| r.tool == "ask_human");

        if let (Some((_, answer)), false, Some(recipient)) =
            (confirmation, emailed, intent.recipient.as_ref())
        {
            if is_affirmative(&answer.content) {
                return Decision::act("Sending it now.", vec![email_request(recipient, &intent.cities)]);
            }
            return Decision::answer(format!("Okay, I did not send anything to {}.", recipient));
        }

        let sentences: Vec<String> = results
            .iter()
            .filter(|(r, _)| r.tool != "ask_human")
            .map(|(request, result)| describe(request, result))
            .collect();
        if sentences.is_empty() {
            return Decision::answer("Done.");
        }
        Decision::answer(sentences.join(" "))
    }
}

fn requests_by_id(messages: &[Message]) -> HashMap<&str, &ActionRequest> {
    messages
        .iter()
        .flat_map(|m| m.action_requests.iter())
        .map(|r| (r.id.as_str(), r))
        .collect()
}

fn describe(request: &ActionRequest, result: &Message) -> String {
    if result.is_error {
        return format!("{} failed: {}", request.tool, result.content);
    }
    match request.tool.as_str() {
        "get_weather" => format!(
            "The weather in {} is {}.",
            request.arguments["city"].as_str().unwrap_or("that city"),
            result.content
        ),
        _ => format!("{}.", result.content.trim_end_matches('.')),
    }
}

/// Most recent successful weather lookup in `history`
fn last_weather(history: &[Message]) -> Option<(String, String)> {
    let requests = requests_by_id(history);
    history.iter().rev().find_map(|m| {
        if m.role != Role::Tool || m.is_error {
            return None;
        }
        let request = requests.get(m.correlation_id.as_deref()?)?;
        if request.tool != "get_weather" {
            return None;
        }
        let city = request.arguments["city"].as_str()?.to_string();
        Some((city, m.content.clone()))
    })
}

#[async_trait]
impl ReasoningOracle for RuleOracle {
    async fn decide(&self, messages: &[Message], tools: &[ToolDescriptor]) -> Result<Decision> {
        let decision = self.plan(messages);
        // Only plan calls to tools that are actually registered
        if let Some(missing) = decision
            .action_requests
            .iter()
            .find(|r| !tools.iter().any(|t| t.name == r.tool))
        {
            anyhow::bail!("rule oracle needs tool '{}' which is not registered", missing.tool);
        }
        debug!(requests = decision.action_requests.len(), "Rule oracle planned");
        Ok(decision)
    }
}
