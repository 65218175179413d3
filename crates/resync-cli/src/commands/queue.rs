//! Queue command - inspect and edit pending actions.

use anyhow::{Result, bail};
use resync_core::{ActionQueue, sort_for_drain};
use resync_types::{ActionDraft, QueuedAction};

use crate::cli::QueueAction;
use crate::util::{Env, format_timestamp, parse_json, print_json};

/// Execute the queue command.
pub fn cmd_queue(action: QueueAction, env: &Env) -> Result<()> {
    let queue = ActionQueue::new(env.open_storage()?);

    match action {
        QueueAction::List { json } => list_actions(&queue, json),
        QueueAction::Add {
            action_type,
            data,
            priority,
            max_retries,
            requires_auth,
        } => {
            let draft = ActionDraft::new(action_type, parse_json(&data)?)
                .priority(priority)
                .max_retries(max_retries.unwrap_or(env.config.queue.default_max_retries))
                .requires_auth(requires_auth);
            let id = queue.enqueue(draft);
            println!("{}", id);
            Ok(())
        }
        QueueAction::Drop { id } => {
            if !queue.dequeue(&id) {
                bail!("No pending action with id {}", id);
            }
            println!("Dropped {}", id);
            Ok(())
        }
        QueueAction::Clear => {
            let count = queue.len();
            queue.clear();
            println!("Cleared {} pending action(s)", count);
            Ok(())
        }
    }
}

fn list_actions(queue: &ActionQueue, json: bool) -> Result<()> {
    let mut actions = queue.queue();
    sort_for_drain(&mut actions);

    if json {
        return print_json(&actions);
    }

    if actions.is_empty() {
        println!("Queue is empty.");
        return Ok(());
    }

    println!(
        "{:<36}  {:<8}  {:<20}  {:>7}  QUEUED AT",
        "ID", "PRIORITY", "TYPE", "RETRIES"
    );
    for action in &actions {
        println!("{}", format_row(action)?);
    }
    Ok(())
}

fn format_row(action: &QueuedAction) -> Result<String> {
    Ok(format!(
        "{:<36}  {:<8}  {:<20}  {:>7}  {}",
        action.id,
        action.priority.to_string(),
        action.action_type,
        format!("{}/{}", action.retry_count, action.max_retries),
        format_timestamp(action.timestamp)?
    ))
}
