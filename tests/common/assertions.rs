//! Event helpers for integration tests

use ncmdump_sync::Event;
use std::time::Duration;
use tokio::sync::broadcast::Receiver;

/// Collect events until `stop` matches one (inclusive) or the timeout passes
pub async fn collect_events_until<F>(
    events: &mut Receiver<Event>,
    timeout: Duration,
    stop: F,
) -> Vec<Event>
where
    F: Fn(&Event) -> bool,
{
    let mut collected = Vec::new();
    let _ = tokio::time::timeout(timeout, async {
        while let Ok(event) = events.recv().await {
            let done = stop(&event);
            collected.push(event);
            if done {
                break;
            }
        }
    })
    .await;
    collected
}

/// Log lines among `events`, in order
pub fn log_lines(events: &[Event]) -> Vec<String> {
    events
        .iter()
        .filter_map(|event| match event {
            Event::Log { line } => Some(line.clone()),
            _ => None,
        })
        .collect()
}
