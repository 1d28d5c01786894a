//! Cursor pagination and connections

use crate::core::error::{QueryRunnerError, QueryRunnerResult};
use crate::core::record::Record;
use serde::{Deserialize, Serialize};

/// Cursor pagination arguments (`first`/`after` forward, `last`/`before` backward)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PaginationArgs {
    pub first: Option<usize>,
    pub last: Option<usize>,
    pub before: Option<String>,
    pub after: Option<String>,
}

impl PaginationArgs {
    /// Reject contradictory combinations
    pub fn validate(&self) -> QueryRunnerResult<()> {
        if self.first.is_some() && self.last.is_some() {
            return Err(QueryRunnerError::invalid_input(
                "Cannot provide both 'first' and 'last'",
            ));
        }
        if self.first == Some(0) || self.last == Some(0) {
            return Err(QueryRunnerError::invalid_input(
                "'first' and 'last' must be greater than 0",
            ));
        }
        if self.before.is_some() && self.after.is_some() {
            return Err(QueryRunnerError::invalid_input(
                "Cannot provide both 'before' and 'after'",
            ));
        }
        Ok(())
    }

    /// Page size, defaulted and capped
    pub fn limit(&self, default: usize, max: usize) -> usize {
        self.first
            .or(self.last)
            .unwrap_or(default)
            .clamp(1, max.max(1))
    }
}

/// One record of a connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub node: Record,
    pub cursor: String,
}

/// Pagination metadata of a connection
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub has_next_page: bool,
    pub has_previous_page: bool,
    pub start_cursor: Option<String>,
    pub end_cursor: Option<String>,
}

/// Cursor-paginated result wrapper
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub edges: Vec<Edge>,
    pub page_info: PageInfo,
    pub total_count: usize,
}

impl Connection {
    pub fn nodes(&self) -> impl Iterator<Item = &Record> {
        self.edges.iter().map(|edge| &edge.node)
    }

    pub fn into_nodes(self) -> Vec<Record> {
        self.edges.into_iter().map(|edge| edge.node).collect()
    }
}

/// Cursor of a record: its identifier
pub fn encode_cursor(record: &Record) -> String {
    record
        .id()
        .map(|id| id.to_string())
        .unwrap_or_default()
}

/// Slice an ordered, filtered record list into one page
///
/// `total_count` is the size of the list before slicing; cursors that do not
/// match any record are ignored.
pub fn paginate(ordered: Vec<Record>, args: &PaginationArgs, limit: usize) -> Connection {
    let total_count = ordered.len();
    let position = |cursor: &str| ordered.iter().position(|r| encode_cursor(r) == cursor);

    let mut start = 0;
    let mut end = ordered.len();
    if let Some(index) = args.after.as_deref().and_then(position) {
        start = index + 1;
    }
    if let Some(index) = args.before.as_deref().and_then(position) {
        end = index;
    }
    let (start, end) = (start.min(end), end);

    let (page_start, page_end) = if args.last.is_some() {
        (end.saturating_sub(limit).max(start), end)
    } else {
        (start, (start + limit).min(end))
    };

    let edges: Vec<Edge> = ordered[page_start..page_end]
        .iter()
        .map(|record| Edge {
            cursor: encode_cursor(record),
            node: record.clone(),
        })
        .collect();

    let page_info = PageInfo {
        has_next_page: page_end < end || (args.before.is_some() && end < total_count),
        has_previous_page: page_start > start || (args.after.is_some() && start > 0),
        start_cursor: edges.first().map(|e| e.cursor.clone()),
        end_cursor: edges.last().map(|e| e.cursor.clone()),
    };

    Connection {
        edges,
        page_info,
        total_count,
    }
}

/// Wrap already-fetched records as a single-page connection
pub fn single_page(records: Vec<Record>) -> Connection {
    let limit = records.len().max(1);
    paginate(records, &PaginationArgs::default(), limit)
}
