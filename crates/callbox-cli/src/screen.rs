//! Drawing the call screen on a terminal

use callbox_core::view::{CALL_LABEL, INITIALIZE_LABEL, NUMBER_FIELD_LABEL};
use callbox_core::CallScreenView;
use colored::Colorize;

/// Lines that make up `view`, followed by the input hint
pub fn lines(view: &CallScreenView) -> Vec<String> {
    match view {
        CallScreenView::Initialize => vec![
            format!("[ {} ]", INITIALIZE_LABEL.bold()),
            hint("press enter to initialize, 'back' to leave"),
        ],
        CallScreenView::Loading => vec![format!("{}", "... initializing voice device".dimmed())],
        CallScreenView::Failed { reason } => vec![
            format!("{} {}", "initialization failed:".red().bold(), reason),
            format!("[ {} ]", INITIALIZE_LABEL.bold()),
            hint("press enter to try again, 'back' to leave"),
        ],
        CallScreenView::Dial {
            number,
            call_enabled,
        } => {
            let field = if number.is_empty() {
                "_".dimmed().to_string()
            } else {
                number.clone()
            };
            let call = if *call_enabled {
                format!("[ {} ]", CALL_LABEL).white().on_blue().to_string()
            } else {
                format!("[ {} ]", CALL_LABEL).dimmed().to_string()
            };
            vec![
                NUMBER_FIELD_LABEL.to_string(),
                format!("  > {field}"),
                call,
                hint("type a number, 'call' to dial, 'back' to leave"),
            ]
        }
    }
}

/// Print `view` to stdout
pub fn draw(view: &CallScreenView) {
    println!();
    for line in lines(view) {
        println!("{line}");
    }
}

fn hint(text: &str) -> String {
    text.italic().dimmed().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dial_view_shows_number() {
        colored::control::set_override(false);
        let lines = lines(&CallScreenView::Dial {
            number: "5550100".into(),
            call_enabled: true,
        });
        assert_eq!(lines[0], NUMBER_FIELD_LABEL);
        assert_eq!(lines[1], "  > 5550100");
        assert_eq!(lines[2], "[ Make the call! ]");
    }

    #[test]
    fn test_failed_view_shows_reason() {
        colored::control::set_override(false);
        let lines = lines(&CallScreenView::Failed {
            reason: "Token fetch failed: connection refused".into(),
        });
        assert!(lines[0].contains("connection refused"));
    }
}
