//! Human-readable cycle reports

use owo_colors::OwoColorize;
use rollcache_core::PatchOp;
use rollcache_node::CycleOutcome;

/// One-line summary of a cycle
pub fn summary(outcome: &CycleOutcome) -> String {
    match outcome {
        CycleOutcome::Skipped => "input unchanged, nothing to do".to_string(),
        CycleOutcome::Built { changes } => match changes.iter().filter(|op| op.is_file_op()).count() {
            0 => "built, output unchanged".to_string(),
            1 => "built, 1 file changed".to_string(),
            n => format!("built, {n} files changed"),
        },
    }
}

/// Colored line for one output operation
pub fn format_op(op: &PatchOp) -> String {
    let path = op.path().display().to_string();
    match op {
        PatchOp::Create(_) => format!("  {} {}", "create".green(), path),
        PatchOp::Change(_) => format!("  {} {}", "change".yellow(), path),
        PatchOp::Unlink(_) => format!("  {} {}", "unlink".red(), path),
        PatchOp::Mkdir(_) | PatchOp::Rmdir(_) => format!("  {}", format!("{} {}", op.name(), path).dimmed()),
    }
}

pub fn print(outcome: &CycleOutcome) {
    println!("{}", summary(outcome).bold());
    for op in outcome.changes() {
        println!("{}", format_op(op));
    }
}
