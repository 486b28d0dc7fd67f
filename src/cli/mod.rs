//! CLI command definitions for taskdeck
//!
//! This module defines the CLI structure using clap's derive macros.
//! The main entry point is the `Cli` struct which contains subcommands.

use crate::format::OutputFormat;
use crate::types::{Priority, Theme, parse_timestamp, split_tags};
use crate::view::{Filter, SortKey, ViewParams};
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};

/// Local-first to-do list with due reminders and an offline-capable web server
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Path to database file (overrides config)
    #[arg(short, long, global = true)]
    pub database: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename
    #[arg(short, long, default_value = "2", global = true)]
    pub log: String,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Add a task at the top of the list
    Add(AddArgs),

    /// List tasks (default if no subcommand given)
    List(ListArgs),

    /// Change a task's text, tags, due time or priority
    Edit(EditArgs),

    /// Toggle a task between done and not done
    Done {
        /// Task id
        id: String,
    },

    /// Delete a task
    Delete {
        /// Task id
        id: String,
    },

    /// Move a task before another one, or to the end
    Move {
        /// Task to move
        id: String,

        /// Place it immediately before this task (default: end of list)
        #[arg(long, value_name = "ID")]
        before: Option<String>,
    },

    /// Set or clear a task's reminder
    Remind {
        /// Task id
        id: String,

        /// Due time: RFC 3339 or local `YYYY-MM-DDTHH:MM`
        #[arg(value_parser = parse_due, required_unless_present = "clear")]
        due: Option<DateTime<Utc>>,

        /// Remove the due time instead
        #[arg(long, conflicts_with = "due")]
        clear: bool,
    },

    /// Remove all completed tasks
    ClearCompleted,

    /// Remove every task (irreversible)
    ClearAll {
        /// Confirm that all tasks should be deleted
        #[arg(long)]
        yes: bool,
    },

    /// Show or change the colour theme
    Theme {
        #[arg(value_enum)]
        action: Option<ThemeAction>,
    },

    /// Show or change whether due reminders are shown
    Notifications {
        #[arg(value_enum)]
        state: Option<Switch>,
    },

    /// Stay in the foreground and print reminders as they come due
    Watch,

    /// Serve the JSON API and the offline-cached web app
    Serve(ServeArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ThemeAction {
    Light,
    Dark,
    Toggle,
}

impl ThemeAction {
    /// Explicit theme, or `None` for toggle.
    pub fn theme(self) -> Option<Theme> {
        match self {
            ThemeAction::Light => Some(Theme::Light),
            ThemeAction::Dark => Some(Theme::Dark),
            ThemeAction::Toggle => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Switch {
    On,
    Off,
}

/// Parse a due time from the command line.
pub fn parse_due(raw: &str) -> Result<DateTime<Utc>, String> {
    parse_timestamp(raw).ok_or_else(|| {
        format!(
            "invalid due time '{}': expected RFC 3339 or YYYY-MM-DDTHH:MM",
            raw
        )
    })
}

fn parse_priority(raw: &str) -> Result<Priority, String> {
    raw.parse()
}

/// Arguments for the add subcommand
#[derive(Args, Debug)]
pub struct AddArgs {
    /// Task text
    #[arg(required = true, num_args = 1..)]
    pub text: Vec<String>,

    /// Comma-separated tags
    #[arg(short, long, value_name = "LIST")]
    pub tags: Option<String>,

    /// Due time: RFC 3339 or local `YYYY-MM-DDTHH:MM`
    #[arg(long, value_parser = parse_due)]
    pub due: Option<DateTime<Utc>>,

    /// high, normal or low
    #[arg(short, long, value_parser = parse_priority, default_value = "normal")]
    pub priority: Priority,
}

impl AddArgs {
    pub fn text(&self) -> String {
        self.text.join(" ")
    }

    pub fn tags(&self) -> Vec<String> {
        self.tags.as_deref().map(split_tags).unwrap_or_default()
    }
}

/// Arguments for the list subcommand
#[derive(Args, Debug, Default)]
pub struct ListArgs {
    /// all, active or completed
    #[arg(short, long)]
    pub filter: Option<Filter>,

    /// newest, oldest, duedate, priority or manual
    #[arg(short, long)]
    pub sort: Option<SortKey>,

    /// Case-insensitive text or tag search
    #[arg(long, default_value = "")]
    pub search: String,

    /// Only tasks carrying this tag
    #[arg(short, long)]
    pub tag: Option<String>,

    /// Output format: markdown (default) or json
    #[arg(long, value_parser = parse_format, default_value = "markdown")]
    pub format: OutputFormat,
}

fn parse_format(raw: &str) -> Result<OutputFormat, String> {
    OutputFormat::parse(raw).ok_or_else(|| format!("invalid format '{}': use markdown or json", raw))
}

impl ListArgs {
    /// Merge the flags over configured defaults.
    pub fn params(&self, defaults: ViewParams) -> ViewParams {
        let mut params = defaults.with_search(self.search.clone());
        if let Some(filter) = self.filter {
            params = params.with_filter(filter);
        }
        if let Some(sort) = self.sort {
            params = params.with_sort(sort);
        }
        if let Some(ref tag) = self.tag {
            params = params.with_tag(tag.clone());
        }
        params
    }
}

/// Arguments for the edit subcommand
#[derive(Args, Debug)]
pub struct EditArgs {
    /// Task id
    pub id: String,

    /// New text
    #[arg(long)]
    pub text: Option<String>,

    /// Replace tags (comma-separated; empty string clears)
    #[arg(short, long, value_name = "LIST")]
    pub tags: Option<String>,

    /// New due time
    #[arg(long, value_parser = parse_due, conflicts_with = "clear_due")]
    pub due: Option<DateTime<Utc>>,

    /// Remove the due time
    #[arg(long)]
    pub clear_due: bool,

    /// high, normal or low
    #[arg(short, long, value_parser = parse_priority)]
    pub priority: Option<Priority>,
}

/// Arguments for the serve subcommand
#[derive(Args, Debug, Default)]
pub struct ServeArgs {
    /// Port to listen on (overrides config)
    #[arg(long)]
    pub port: Option<u16>,

    /// Host address to bind (overrides config)
    #[arg(long)]
    pub host: Option<String>,

    /// Directory holding the web app assets (overrides config)
    #[arg(long, value_name = "DIR")]
    pub assets: Option<String>,

    /// Proxy assets from this HTTP origin instead of a local directory
    #[arg(long, value_name = "URL")]
    pub upstream: Option<String>,
}
