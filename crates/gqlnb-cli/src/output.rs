//! Terminal rendering of execution events.

use gqlnb_core::{CellOutcome, CellSummary, ExecutionEvent, OutputRecord, TaskState};

use crate::colors;

/// Print one execution event.
pub fn print_event(event: &ExecutionEvent) {
    match event {
        ExecutionEvent::Started { cell, .. } => {
            println!("\n{}Cell {}{}", colors::BOLD, cell, colors::RESET);
        }
        ExecutionEvent::TaskState { task } => match task.state() {
            TaskState::Pending => {}
            TaskState::Running => {
                println!("{}  ▶ Running{} {}", colors::CYAN, colors::RESET, task.label);
            }
            TaskState::Streaming => {
                println!(
                    "{}  ⇢ Streaming{} {} {}(Ctrl-C to stop){}",
                    colors::BLUE,
                    colors::RESET,
                    task.label,
                    colors::DIM,
                    colors::RESET
                );
            }
            TaskState::Succeeded => {
                println!("{}  ✓{} {}", colors::GREEN, colors::RESET, task.label);
            }
            TaskState::Failed => {
                println!("{}  ✗{} {}", colors::RED, colors::RESET, task.label);
            }
            TaskState::Cancelled => {
                println!("{}  ■ Cancelled{} {}", colors::YELLOW, colors::RESET, task.label);
            }
        },
        ExecutionEvent::Output { output, .. } => print_record(&output.record),
        ExecutionEvent::Finished(summary) => print_summary(summary),
    }
}

fn print_record(record: &OutputRecord) {
    match record {
        OutputRecord::Data { text, .. } => println!("{}", indent(text)),
        OutputRecord::Error(error) => {
            eprintln!("{}{}{}", colors::RED, indent(&error.text()), colors::RESET);
        }
    }
}

fn print_summary(summary: &CellSummary) {
    let (color, word) = match summary.outcome {
        CellOutcome::Succeeded => (colors::GREEN, "succeeded"),
        CellOutcome::Failed => (colors::RED, "failed"),
        CellOutcome::Cancelled => (colors::YELLOW, "cancelled"),
    };
    println!(
        "{}  Cell {} {}{} {}({} operations, {} ms){}",
        color,
        summary.cell,
        word,
        colors::RESET,
        colors::DIM,
        summary.tasks.len(),
        summary.duration_ms,
        colors::RESET
    );
}

fn indent(text: &str) -> String {
    text.lines()
        .map(|line| format!("    {}", line))
        .collect::<Vec<_>>()
        .join("\n")
}
