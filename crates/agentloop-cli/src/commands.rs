//! CLI commands implementation

use std::path::Path;
use std::sync::Arc;

use agentloop_core::{
    CheckpointStore, FileCheckpointStore, InMemoryCheckpointStore, Message, Role,
    RunController, RunError, RunOutcome, StoreError,
};
use anyhow::{Context, Result};
use tracing::info;

use crate::config::UserConfig;
use crate::observer::{TerminalObserver, BLUE, BOLD, CYAN, DIM, GREEN, RESET, YELLOW};
use crate::oracle::RuleOracle;
use crate::tools::demo_registry;

/// Open the configured checkpoint directory
pub async fn open_store(config: &UserConfig, store_dir: Option<&Path>) -> Result<Arc<dyn CheckpointStore>> {
    let dir = config.store_dir(store_dir)?;
    let store = FileCheckpointStore::open(&dir)
        .await
        .with_context(|| format!("Failed to open checkpoint store at {}", dir.display()))?;
    info!(dir = %dir.display(), "Opened checkpoint store");
    Ok(Arc::new(store))
}

/// Controller wired to the demo tools and the offline oracle
pub fn build_controller(
    config: &UserConfig,
    store: Arc<dyn CheckpointStore>,
    verbose: bool,
) -> RunController {
    RunController::new(Arc::new(RuleOracle::new()), demo_registry(), store)
        .with_config(config.run.to_run_config())
        .with_observer(Arc::new(TerminalObserver::new(verbose)))
}

fn print_outcome(outcome: &RunOutcome) {
    match outcome {
        RunOutcome::Completed(answer) => {
            println!("{}", answer.content);
        }
        RunOutcome::Suspended {
            conversation_id,
            suspension,
        } => {
            let question = suspension
                .request
                .question_text()
                .map(str::to_string)
                .unwrap_or_else(|| suspension.request.payload.to_string());
            println!("{}?{} {}", YELLOW, RESET, question);
            println!(
                "\n  Answer with: {}agentloop resume -c {} \"<answer>\"{}",
                BLUE, conversation_id, RESET
            );
        }
    }
}

/// What the user can do next after a failed invocation, if anything
fn retry_hint(err: &RunError, conversation_id: &str) -> Option<String> {
    match err {
        RunError::PendingActions(_) => Some(format!(
            "finish the pending plan first: agentloop recover -c {}",
            conversation_id
        )),
        RunError::Busy(_) => Some("another invocation owns this conversation; try again shortly".to_string()),
        e if e.is_retryable() => {
            Some("nothing was committed, so the same command can be retried".to_string())
        }
        _ => None,
    }
}

fn failure(err: RunError, action: &str, conversation_id: &str) -> anyhow::Error {
    if let Some(hint) = retry_hint(&err, conversation_id) {
        eprintln!("{}hint:{} {}", YELLOW, RESET, hint);
    }
    anyhow::Error::new(err).context(format!("{} failed for conversation '{}'", action, conversation_id))
}

/// Send a user message to a conversation
pub async fn run(controller: &RunController, conversation_id: &str, message: &str) -> Result<()> {
    let outcome = controller
        .run(conversation_id, message)
        .await
        .map_err(|e| failure(e, "Run", conversation_id))?;
    print_outcome(&outcome);
    Ok(())
}

/// Deliver a human answer to a paused conversation
pub async fn resume(controller: &RunController, conversation_id: &str, answer: &str) -> Result<()> {
    let outcome = controller
        .resume(conversation_id, answer)
        .await
        .map_err(|e| failure(e, "Resume", conversation_id))?;
    print_outcome(&outcome);
    Ok(())
}

/// Continue a conversation whose last invocation failed
pub async fn recover(controller: &RunController, conversation_id: &str) -> Result<()> {
    let outcome = controller
        .recover(conversation_id)
        .await
        .map_err(|e| failure(e, "Recovery", conversation_id))?;
    print_outcome(&outcome);
    Ok(())
}

fn print_message(message: &Message) {
    match message.role {
        Role::User => println!("{}You:{} {}", BOLD, RESET, message.content),
        Role::Agent => {
            if !message.content.is_empty() {
                println!("{}Agent:{} {}", GREEN, RESET, message.content);
            }
            for request in &message.action_requests {
                println!(
                    "  {}→ {}({}){} {}[{}]{}",
                    CYAN, request.tool, request.arguments, RESET, DIM, request.id, RESET
                );
            }
        }
        Role::Tool => {
            let marker = if message.is_error {
                format!("{}error{} ", YELLOW, RESET)
            } else {
                String::new()
            };
            println!(
                "  {}← [{}]{} {}{}",
                DIM,
                message.correlation_id.as_deref().unwrap_or("?"),
                RESET,
                marker,
                message.content
            );
        }
    }
}

/// Print a stored conversation
pub async fn show(store: &dyn CheckpointStore, conversation_id: &str, json: bool) -> Result<()> {
    let checkpoint = match store.load(conversation_id).await {
        Ok(checkpoint) => checkpoint,
        Err(StoreError::NotFound(_)) => anyhow::bail!("No conversation named '{}'", conversation_id),
        Err(e) => return Err(e).context("Failed to load conversation"),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&checkpoint)?);
        return Ok(());
    }

    println!(
        "{}Conversation {}{} {}(checkpoint #{}, {}){}",
        BOLD,
        conversation_id,
        RESET,
        DIM,
        checkpoint.sequence,
        checkpoint.updated_at.format("%Y-%m-%d %H:%M:%S UTC"),
        RESET
    );
    println!();
    for message in checkpoint.state.messages() {
        print_message(message);
    }

    if let Some(suspension) = checkpoint.state.suspension() {
        println!(
            "\n{}Waiting for input:{} {}",
            YELLOW,
            RESET,
            suspension.request.question_text().unwrap_or("(no question)")
        );
    }
    Ok(())
}

/// List stored conversations, most recent first
pub async fn list(store: &dyn CheckpointStore) -> Result<()> {
    let summaries = store.list().await.context("Failed to list conversations")?;

    if summaries.is_empty() {
        println!("{}No conversations yet{}", DIM, RESET);
        println!("  Start one with: {}agentloop run -c <id> \"<message>\"{}", BLUE, RESET);
        return Ok(());
    }

    println!("{}Conversations ({}){}", BOLD, summaries.len(), RESET);
    for summary in summaries {
        let status = if summary.suspended {
            format!(" {}(waiting for input){}", YELLOW, RESET)
        } else {
            String::new()
        };
        println!(
            "  - {} {}[{} messages, #{}, {}]{}{}",
            summary.conversation_id,
            DIM,
            summary.message_count,
            summary.sequence,
            summary.updated_at.format("%Y-%m-%d %H:%M"),
            RESET,
            status
        );
    }
    Ok(())
}

/// Delete a stored conversation
pub async fn forget(store: &dyn CheckpointStore, conversation_id: &str) -> Result<()> {
    match store.delete(conversation_id).await {
        Ok(()) => {
            println!("{}✓{} Forgot conversation '{}'", GREEN, RESET, conversation_id);
            Ok(())
        }
        Err(StoreError::NotFound(_)) => anyhow::bail!("No conversation named '{}'", conversation_id),
        Err(e) => Err(e).context("Failed to delete conversation"),
    }
}

fn banner(title: &str, user: &str) {
    println!("\n{}{}{}", BOLD, "=".repeat(70), RESET);
    println!("{}{}{}", BOLD, title, RESET);
    println!("{}{}{}", BOLD, "=".repeat(70), RESET);
    println!("{}User:{} {}", BOLD, RESET, user);
}

/// Walk through the built-in examples against an in-memory store
pub async fn demo(config: &UserConfig, verbose: bool) -> Result<()> {
    let controller = build_controller(config, Arc::new(InMemoryCheckpointStore::new()), verbose);

    banner("Example 1: Single tool call", "What's the weather in London?");
    let outcome = controller.run("demo_123", "What's the weather in London?").await?;
    print_demo_outcome(&outcome);

    let request = "Check weather in New York and email the result to boss@company.com";
    banner("Example 2: Multi-step task", request);
    let outcome = controller.run("demo_456", request).await?;
    print_demo_outcome(&outcome);

    banner("Example 3: Memory (same conversation)", "What was the weather there?");
    let outcome = controller.run("demo_456", "What was the weather there?").await?;
    print_demo_outcome(&outcome);

    let request =
        "Check weather in San Francisco and email it to team@company.com, but confirm with me first";
    banner("Example 4: Human in the loop", request);
    let outcome = controller.run("demo_789", request).await?;
    print_demo_outcome(&outcome);
    if outcome.is_suspended() {
        println!("{}Human:{} yes", BOLD, RESET);
        let outcome = controller.resume("demo_789", "yes").await?;
        print_demo_outcome(&outcome);
    }

    Ok(())
}

fn print_demo_outcome(outcome: &RunOutcome) {
    match outcome {
        RunOutcome::Completed(answer) => {
            println!("{}✓ Final response:{} {}", GREEN, RESET, answer.content)
        }
        RunOutcome::Suspended { .. } => {
            println!("{}⏸ Paused:{} {}", YELLOW, RESET, outcome.question().unwrap_or("(no question)"))
        }
    }
}

/// Write a commented default config file
pub fn config_init() -> Result<()> {
    let path = UserConfig::create_default()?;
    println!("{}✓{} Created {}", GREEN, RESET, path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_store_and_forget() {
        let dir = TempDir::new().unwrap();
        let config = UserConfig::default();
        let store = open_store(&config, Some(dir.path())).await.unwrap();
        let controller = build_controller(&config, Arc::clone(&store), false);

        run(&controller, "c1", "What's the weather in London?").await.unwrap();
        assert_eq!(store.list().await.unwrap().len(), 1);
        show(store.as_ref(), "c1", true).await.unwrap();

        forget(store.as_ref(), "c1").await.unwrap();
        assert!(forget(store.as_ref(), "c1").await.is_err());
        assert!(show(store.as_ref(), "c1", false).await.is_err());
    }

    #[tokio::test]
    async fn test_resume_requires_pause() {
        let dir = TempDir::new().unwrap();
        let config = UserConfig::default();
        let store = open_store(&config, Some(dir.path())).await.unwrap();
        let controller = build_controller(&config, store, false);

        run(&controller, "c1", "hello").await.unwrap();
        let err = resume(&controller, "c1", "yes").await.unwrap_err();
        assert!(format!("{:#}", err).contains("not waiting for human input"));
    }

    #[test]
    fn test_retry_hints() {
        let hint = retry_hint(&RunError::PendingActions("c1".into()), "c1").unwrap();
        assert!(hint.contains("agentloop recover -c c1"));

        let io = StoreError::Io {
            path: "/tmp/c1.json".into(),
            source: std::io::Error::other("disk full"),
        };
        assert!(retry_hint(&RunError::Persistence(io), "c1").unwrap().contains("retried"));
        assert!(retry_hint(&RunError::Busy("c1".into()), "c1").is_some());
        assert!(retry_hint(&RunError::NotSuspended("c1".into()), "c1").is_none());
    }

    #[tokio::test]
    async fn test_demo_runs_offline() {
        demo(&UserConfig::default(), false).await.unwrap();
    }
}
