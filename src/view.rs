//! View projection: filtering, searching and sorting the task collection.
//!
//! [`project`] is pure. It never mutates its input and returns the same
//! output for the same arguments. Sorting is stable, so tasks with equal
//! keys keep their relative input order.

use crate::types::Task;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Completion filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Filter {
    #[default]
    All,
    Active,
    Completed,
}

impl Filter {
    fn admits(self, task: &Task) -> bool {
        match self {
            Filter::All => true,
            Filter::Active => !task.done,
            Filter::Completed => task.done,
        }
    }
}

impl FromStr for Filter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "all" => Ok(Filter::All),
            "active" => Ok(Filter::Active),
            "completed" => Ok(Filter::Completed),
            other => Err(format!(
                "invalid filter '{}': must be all, active, or completed",
                other
            )),
        }
    }
}

/// Sort key for the projected list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    /// Most recently created first.
    #[default]
    Newest,
    Oldest,
    /// Earliest due first; tasks without a due time go last.
    #[serde(rename = "duedate")]
    DueDate,
    /// High, then normal, then low.
    Priority,
    /// Stored order, as arranged by drag-and-drop.
    Manual,
}

impl SortKey {
    fn compare(self, a: &Task, b: &Task) -> Ordering {
        match self {
            SortKey::Newest => b.created_at.cmp(&a.created_at),
            SortKey::Oldest => a.created_at.cmp(&b.created_at),
            SortKey::DueDate => match (a.due, b.due) {
                (Some(x), Some(y)) => x.cmp(&y),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            },
            SortKey::Priority => a.priority.rank().cmp(&b.priority.rank()),
            SortKey::Manual => Ordering::Equal,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SortKey::Newest => "newest",
            SortKey::Oldest => "oldest",
            SortKey::DueDate => "duedate",
            SortKey::Priority => "priority",
            SortKey::Manual => "manual",
        }
    }
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "newest" => Ok(SortKey::Newest),
            "oldest" => Ok(SortKey::Oldest),
            "duedate" | "due" => Ok(SortKey::DueDate),
            "priority" => Ok(SortKey::Priority),
            "manual" => Ok(SortKey::Manual),
            other => Err(format!(
                "invalid sort '{}': must be newest, oldest, duedate, priority, or manual",
                other
            )),
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tag selector. `All` disables tag filtering.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TagFilter {
    #[default]
    All,
    Tag(String),
}

impl TagFilter {
    /// "all" (or empty) selects everything; anything else is an exact tag.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "" | "all" => TagFilter::All,
            tag => TagFilter::Tag(tag.to_string()),
        }
    }

    fn admits(&self, task: &Task) -> bool {
        match self {
            TagFilter::All => true,
            TagFilter::Tag(tag) => task.has_tag(tag),
        }
    }
}

impl Serialize for TagFilter {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            TagFilter::All => serializer.serialize_str("all"),
            TagFilter::Tag(tag) => serializer.serialize_str(tag),
        }
    }
}

impl<'de> Deserialize<'de> for TagFilter {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(TagFilter::parse(&raw))
    }
}

/// UI-selected parameters for a projection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewParams {
    pub filter: Filter,
    pub sort: SortKey,
    pub search: String,
    pub tag: TagFilter,
}

impl ViewParams {
    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_sort(mut self, sort: SortKey) -> Self {
        self.sort = sort;
        self
    }

    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = search.into();
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = TagFilter::parse(&tag.into());
        self
    }
}

/// Projected list plus counts over the unfiltered collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Projection {
    pub tasks: Vec<Task>,
    pub total: usize,
    pub completed: usize,
}

/// Case-insensitive search over the task text and its joined tags.
fn matches_search(task: &Task, query: &str) -> bool {
    if query.is_empty() {
        return true;
    }
    task.text.to_lowercase().contains(query) || task.tags.join(" ").to_lowercase().contains(query)
}

/// Derive the ordered subsequence to display.
pub fn project(tasks: &[Task], params: &ViewParams) -> Projection {
    let query = params.search.trim().to_lowercase();

    let mut visible: Vec<Task> = tasks
        .iter()
        .filter(|t| params.filter.admits(t))
        .filter(|t| params.tag.admits(t))
        .filter(|t| matches_search(t, &query))
        .cloned()
        .collect();

    // sort_by is stable
    visible.sort_by(|a, b| params.sort.compare(a, b));

    Projection {
        tasks: visible,
        total: tasks.len(),
        completed: tasks.iter().filter(|t| t.done).count(),
    }
}

/// Sorted, de-duplicated tags across the whole collection.
pub fn tag_options(tasks: &[Task]) -> Vec<String> {
    tasks
        .iter()
        .flat_map(|t| t.tags.iter().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_parse() {
        assert_eq!("Active".parse::<Filter>().unwrap(), Filter::Active);
        assert!("pending".parse::<Filter>().is_err());
    }

    #[test]
    fn test_sort_parse_and_display() {
        assert_eq!("duedate".parse::<SortKey>().unwrap(), SortKey::DueDate);
        assert_eq!(SortKey::DueDate.to_string(), "duedate");
        assert!("alphabetical".parse::<SortKey>().is_err());
    }

    #[test]
    fn test_tag_filter_parse() {
        assert_eq!(TagFilter::parse("all"), TagFilter::All);
        assert_eq!(TagFilter::parse(""), TagFilter::All);
        assert_eq!(TagFilter::parse("Work"), TagFilter::Tag("Work".to_string()));
    }

    #[test]
    fn test_view_params_from_query_json() {
        let params: ViewParams =
            serde_json::from_str(r#"{"filter": "active", "sort": "duedate", "tag": "home"}"#)
                .unwrap();
        assert_eq!(params.filter, Filter::Active);
        assert_eq!(params.sort, SortKey::DueDate);
        assert_eq!(params.tag, TagFilter::Tag("home".to_string()));
        assert!(params.search.is_empty());
    }
}
