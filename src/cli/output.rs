//! Output formatting module for lazyinit
//!
//! Provides colored human output and line-delimited JSON.

use colored::Colorize;
use serde::Serialize;

use lazyinit::dispatch::DispatchResult;
use lazyinit::policy::Classification;

/// Output formatter for different output modes
pub struct OutputFormatter {
    /// Use colored output
    use_color: bool,
    /// JSON output mode
    json_mode: bool,
    /// Verbosity level
    verbosity: u8,
}

impl OutputFormatter {
    /// Create a new output formatter
    pub fn new(use_color: bool, json_mode: bool, verbosity: u8) -> Self {
        // Respect NO_COLOR environment variable
        let use_color = use_color && std::env::var("NO_COLOR").is_err();

        Self {
            use_color,
            json_mode,
            verbosity,
        }
    }

    /// Whether JSON output was requested
    pub fn is_json(&self) -> bool {
        self.json_mode
    }

    /// Print a section header
    pub fn section(&self, title: &str) {
        if self.json_mode {
            return;
        }

        if self.use_color {
            println!("\n{}", title.cyan().bold());
            println!("{}", "-".repeat(title.len()).cyan());
        } else {
            println!("\n{}", title);
            println!("{}", "-".repeat(title.len()));
        }
    }

    /// Print the outcome of one load request
    pub fn dispatch_result(&self, name: &str, result: &DispatchResult) {
        if self.json_mode {
            self.json(&serde_json::json!({
                "name": name,
                "result": result.to_string(),
            }));
            return;
        }

        let label = match result {
            DispatchResult::Success => "ok",
            DispatchResult::AlreadyCompleted => "done",
            DispatchResult::UnknownComponent => "unknown",
            DispatchResult::ConfigurationError(_) => "config",
            DispatchResult::InitializerFailed(_) => "failed",
        };

        let label = if !self.use_color {
            label.to_string()
        } else {
            match result {
                DispatchResult::Success => label.green().to_string(),
                DispatchResult::AlreadyCompleted => label.cyan().to_string(),
                DispatchResult::InitializerFailed(_) => label.yellow().to_string(),
                _ => label.red().bold().to_string(),
            }
        };

        match result {
            DispatchResult::Success | DispatchResult::AlreadyCompleted => {
                println!("{}: [{}]", label, name);
            }
            other => println!("{}: [{}] => {}", label, name, other),
        }
    }

    /// Print the classification of one name
    pub fn classification(&self, name: &str, class: Classification, builtin: bool) {
        if self.json_mode {
            self.json(&serde_json::json!({
                "name": name,
                "classification": class,
                "builtin": builtin,
            }));
            return;
        }

        let class_str = class.to_string();
        let class_str = if self.use_color {
            match class {
                Classification::Eligible => class_str.green().to_string(),
                Classification::DeferredToEnd => class_str.blue().to_string(),
                Classification::Ignored => class_str.yellow().to_string(),
                Classification::Unrecognized => class_str.bright_black().to_string(),
            }
        } else {
            class_str
        };

        if builtin && class == Classification::Unrecognized {
            println!("{}: {} (built in)", name, class_str);
        } else {
            println!("{}: {}", name, class_str);
        }
    }

    /// Print whether the barrier fired
    pub fn completion(&self, completed: bool, pending: &[String]) {
        if self.json_mode {
            self.json(&serde_json::json!({
                "completed": completed,
                "pending": pending,
            }));
            return;
        }

        if completed {
            let msg = "all components loaded";
            if self.use_color {
                println!("\n{}", msg.green().bold());
            } else {
                println!("\n{}", msg);
            }
            return;
        }

        let msg = format!("{} component(s) not loaded yet", pending.len());
        if self.use_color {
            println!("\n{}", msg.yellow().bold());
        } else {
            println!("\n{}", msg);
        }
        for name in pending {
            println!("  - {}", name);
        }
    }

    /// Print an info message
    pub fn info(&self, message: &str) {
        if self.json_mode {
            return;
        }
        if self.use_color {
            println!("{} {}", "[INFO]".blue(), message);
        } else {
            println!("[INFO] {}", message);
        }
    }

    /// Print an error message
    pub fn error(&self, message: &str) {
        if self.use_color {
            eprintln!("{} {}", "[ERROR]".red().bold(), message);
        } else {
            eprintln!("[ERROR] {}", message);
        }
    }

    /// Print a debug message (only at -vv and above)
    pub fn debug(&self, message: &str) {
        if self.verbosity < 2 || self.json_mode {
            return;
        }
        if self.use_color {
            println!("{} {}", "[DEBUG]".bright_black(), message);
        } else {
            println!("[DEBUG] {}", message);
        }
    }

    fn json<T: Serialize>(&self, value: &T) {
        match serde_json::to_string(value) {
            Ok(line) => println!("{}", line),
            Err(e) => self.error(&format!("failed to encode output: {}", e)),
        }
    }
}
