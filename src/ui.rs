use colored::Colorize;
use stackkit::OperationResult;

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print a warning message
pub fn warn(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print a dim/muted message
pub fn dim(msg: &str) {
    println!("  {}", msg.dimmed());
}

/// Print a header/title
pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(title.chars().count()).dimmed());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

/// Print the outcome of one stack, with its event trail when `events` is set
pub fn stack_result(name: &str, result: &OperationResult, events: bool) {
    let line = format!("{}: {}", name.bold(), result.output);
    if result.failed {
        error(&line);
    } else if result.changed {
        success(&line);
    } else {
        info(&line);
    }

    for (key, value) in &result.outputs {
        kv(key, value);
    }
    if events {
        for event in &result.events {
            dim(event);
        }
    }
}

/// One-line tally of a run
pub fn summary(changed: usize, unchanged: usize, failed: usize) -> String {
    let mut parts = vec![
        format!("{changed} changed").green().to_string(),
        format!("{unchanged} unchanged"),
    ];
    if failed > 0 {
        parts.push(format!("{failed} failed").red().to_string());
    }
    parts.join(", ")
}
