//! Output formatting for the command line: markdown and JSON.

use crate::app::AppView;
use crate::types::{Priority, Task};
use chrono::{DateTime, Local, Utc};
use serde_json::Value;

/// Output format for listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    Json,
    #[default]
    Markdown,
}

impl OutputFormat {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "json" => Some(OutputFormat::Json),
            "markdown" | "md" => Some(OutputFormat::Markdown),
            _ => None,
        }
    }
}

fn local_time(ts: DateTime<Utc>) -> String {
    ts.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

fn priority_marker(priority: Priority) -> &'static str {
    match priority {
        Priority::High => " **(high)**",
        Priority::Normal => "",
        Priority::Low => " _(low)_",
    }
}

/// One checklist line for a task.
pub fn format_task_line(task: &Task, highlighted: bool) -> String {
    let mut line = String::new();
    line.push_str(if task.done { "- [x] " } else { "- [ ] " });
    if highlighted {
        line.push_str("\u{23f0} ");
    }
    line.push_str(&task.text);
    line.push_str(priority_marker(task.priority));

    if !task.tags.is_empty() {
        let tags: Vec<String> = task.tags.iter().map(|t| format!("#{}", t)).collect();
        line.push(' ');
        line.push_str(&tags.join(" "));
    }
    if let Some(due) = task.due {
        line.push_str(&format!(" (due {})", local_time(due)));
    }
    line.push_str(&format!(" `{}`", task.id));
    line
}

/// Render a view as a markdown checklist with counts.
pub fn format_view_markdown(view: &AppView) -> String {
    let projection = &view.projection;
    let mut md = format!(
        "# Tasks ({} shown, {} total, {} completed)\n\n",
        projection.tasks.len(),
        projection.total,
        projection.completed
    );

    if projection.tasks.is_empty() {
        md.push_str("_No tasks._\n");
    }
    for task in &projection.tasks {
        let highlighted = view.highlighted.iter().any(|id| *id == task.id);
        md.push_str(&format_task_line(task, highlighted));
        md.push('\n');
    }

    if !view.tags.is_empty() {
        md.push_str(&format!("\nTags: {}\n", view.tags.join(", ")));
    }
    if let Some(ref handle) = view.pending_undo {
        md.push_str(&format!(
            "\nDeleted `{}` (undo still possible).\n",
            handle.task_id
        ));
    }
    md
}

/// Render a view as pretty JSON.
pub fn format_view_json(view: &AppView) -> String {
    let value: Value = serde_json::to_value(view).unwrap_or(Value::Null);
    serde_json::to_string_pretty(&value).unwrap_or_else(|_| "null".to_string())
}

pub fn format_view(view: &AppView, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => format_view_json(view),
        OutputFormat::Markdown => format_view_markdown(view),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::Projection;

    fn task(text: &str, done: bool) -> Task {
        Task {
            id: format!("id-{}", text),
            text: text.to_string(),
            tags: vec!["home".to_string()],
            due: None,
            priority: Priority::High,
            done,
            created_at: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
            notified: false,
        }
    }

    fn sample_view() -> AppView {
        AppView {
            projection: Projection {
                tasks: vec![task("water plants", false), task("pay rent", true)],
                total: 3,
                completed: 1,
            },
            highlighted: vec!["id-water plants".to_string()],
            tags: vec!["home".to_string()],
            pending_undo: None,
        }
    }

    #[test]
    fn test_parse_format() {
        assert_eq!(OutputFormat::parse("JSON"), Some(OutputFormat::Json));
        assert_eq!(OutputFormat::parse("md"), Some(OutputFormat::Markdown));
        assert_eq!(OutputFormat::parse("yaml"), None);
    }

    #[test]
    fn test_markdown_checklist() {
        let md = format_view_markdown(&sample_view());
        assert!(md.starts_with("# Tasks (2 shown, 3 total, 1 completed)"));
        assert!(md.contains("- [ ] \u{23f0} water plants **(high)** #home"));
        assert!(md.contains("- [x] pay rent"));
        assert!(md.contains("Tags: home"));
    }

    #[test]
    fn test_json_flattens_projection() {
        let json: Value = serde_json::from_str(&format_view_json(&sample_view())).unwrap();
        assert_eq!(json["total"], 3);
        assert_eq!(json["tasks"][0]["text"], "water plants");
        assert_eq!(json["tasks"][0]["createdAt"], "2023-11-14T22:13:20Z");
    }
}
