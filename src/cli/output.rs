//! Colored output helpers for CLI
//!
//! Status lines go to stdout, errors to stderr. With colors disabled every
//! line carries a bracketed tag instead, so output stays greppable.

use crate::research::ResearchReport;
use owo_colors::OwoColorize;

/// Output style configuration
pub struct Output {
    /// Whether to use colored output
    pub colored: bool,
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}

impl Output {
    pub fn new() -> Self {
        Self { colored: true }
    }

    pub fn no_color() -> Self {
        Self { colored: false }
    }

    /// One-line program banner
    pub fn banner(&self) {
        let version = format!("v{}", env!("CARGO_PKG_VERSION"));
        if self.colored {
            println!("\n  {} {}\n", "dossier".bright_cyan().bold(), version.dimmed());
        } else {
            println!("\n  dossier {}\n", version);
        }
    }

    pub fn success(&self, message: &str) {
        if self.colored {
            println!("  {} {}", "✓".green().bold(), message.green());
        } else {
            println!("  [OK] {}", message);
        }
    }

    pub fn warning(&self, message: &str) {
        if self.colored {
            println!("  {} {}", "⚠".yellow().bold(), message.yellow());
        } else {
            println!("  [WARN] {}", message);
        }
    }

    pub fn error(&self, message: &str) {
        if self.colored {
            eprintln!("  {} {}", "✗".red().bold(), message.red());
        } else {
            eprintln!("  [ERROR] {}", message);
        }
    }

    /// Print a step message (for multi-step operations)
    pub fn step(&self, step_num: u32, total: u32, message: &str) {
        if self.colored {
            println!(
                "  {} {}",
                format!("[{}/{}]", step_num, total).dimmed(),
                message.bright_white()
            );
        } else {
            println!("  [{}/{}] {}", step_num, total, message);
        }
    }

    pub fn header(&self, title: &str) {
        if self.colored {
            println!("\n  {}", title.bright_white().bold().underline());
        } else {
            println!("\n  === {} ===", title);
        }
    }

    pub fn kv(&self, key: &str, value: &str) {
        if self.colored {
            println!("    {}: {}", key.dimmed(), value.bright_white());
        } else {
            println!("    {}: {}", key, value);
        }
    }

    pub fn hint(&self, message: &str) {
        if self.colored {
            println!("\n  {}", message.dimmed().italic());
        } else {
            println!("\n  [TIP] {}", message);
        }
    }

    /// Print a finished report: title, then each section and its paragraphs
    pub fn report(&self, report: &ResearchReport) {
        if self.colored {
            println!("\n{}\n", report.title.bright_white().bold().underline());
        } else {
            println!("\n# {}\n", report.title);
        }

        for section in &report.sections {
            if self.colored {
                println!("{}\n", section.title.cyan().bold());
            } else {
                println!("## {}\n", section.title);
            }

            if section.paragraphs.is_empty() {
                self.warning("no content was gathered for this section");
                println!();
            }

            for paragraph in &section.paragraphs {
                println!("{}\n", paragraph);
            }
        }
    }

    pub fn newline(&self) {
        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::research::Section;

    #[test]
    fn test_output_no_color() {
        assert!(Output::new().colored);
        assert!(!Output::no_color().colored);
        assert!(Output::default().colored);
    }

    #[test]
    fn test_output_methods_no_panic() {
        let report = ResearchReport {
            title: "Forth".to_string(),
            sections: vec![
                Section::new("Origins", vec!["Created in 1970.".to_string()]),
                Section::new("Empty", vec![]),
            ],
        };

        for output in [Output::no_color(), Output::new()] {
            output.banner();
            output.success("test success");
            output.warning("test warning");
            output.error("test error");
            output.step(1, 3, "step message");
            output.header("Test Header");
            output.kv("key", "value");
            output.hint("hint message");
            output.report(&report);
            output.newline();
        }
    }
}
