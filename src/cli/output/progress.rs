//! Progress display for Reflexion runs using indicatif.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::domain::models::Decision;
use crate::services::LoopEvent;

const PROGRESS_TEMPLATE: &str = "[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}";
const PROGRESS_CHARS: &str = "█▓▒░ ";

/// Progress bar over `total` iterations, starting at `position`.
pub fn create_progress_bar(total: u64, position: u64) -> ProgressBar {
    let style = ProgressStyle::with_template(PROGRESS_TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars(PROGRESS_CHARS);
    let pb = ProgressBar::new(total).with_style(style).with_position(position);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Short status line for a finished iteration.
pub fn describe(decision: &Decision, candidate: Option<&str>) -> String {
    match (decision, candidate) {
        (Decision::Accepted, Some(name)) => format!("accepted {name}"),
        (Decision::Rejected, Some(name)) => format!("rejected {name}"),
        (Decision::Skipped { .. }, _) => "skipped".to_string(),
        (other, None) => other.as_str().to_string(),
    }
}

/// Drive `pb` from loop events until the run finishes or the sender is dropped.
pub fn track_progress(pb: ProgressBar, mut events: mpsc::Receiver<LoopEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                LoopEvent::IterationStarted { iteration, .. } => {
                    pb.set_message(format!("iteration {}", iteration + 1));
                }
                LoopEvent::IterationFinished { record } => {
                    let candidate = record.candidate_feature.as_ref().map(|f| f.name.as_str());
                    pb.println(format!(
                        "  #{:<3} {}",
                        record.iteration + 1,
                        describe(&record.decision, candidate)
                    ));
                    pb.inc(1);
                }
                LoopEvent::RunFinished { stopped, .. } => {
                    if stopped {
                        pb.abandon_with_message("stopped");
                    } else {
                        pb.finish_with_message("done");
                    }
                    break;
                }
            }
        }
    })
}
