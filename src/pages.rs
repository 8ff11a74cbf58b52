//! Page definitions: which collection each page shows and how.

use crate::grid::{BadgeVariant, Cell, Column, PLACEHOLDER, UNPAGED};
use crate::loader::Collection;
use crate::record::Record;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    Overview,
    Incidents,
    Recommendations,
    ReviewQueue,
}

impl PageKind {
    pub const ALL: [PageKind; 4] = [
        PageKind::Overview,
        PageKind::Incidents,
        PageKind::Recommendations,
        PageKind::ReviewQueue,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            PageKind::Overview => "Dashboard",
            PageKind::Incidents => "Incidents",
            PageKind::Recommendations => "Recommendations",
            PageKind::ReviewQueue => "Review Queue",
        }
    }

    pub fn collection(&self) -> Option<Collection> {
        match self {
            PageKind::Overview => None,
            PageKind::Incidents => Some(Collection::Incidents),
            PageKind::Recommendations => Some(Collection::Insights),
            PageKind::ReviewQueue => Some(Collection::ReviewQueue),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    Table,
    Cards,
}

/// Static description of a data-bearing page.
#[derive(Debug, Clone)]
pub struct PageSpec {
    pub kind: PageKind,
    pub subtitle: &'static str,
    pub layout: Layout,
    pub columns: Vec<Column>,
    pub filter_keys: Vec<String>,
    pub empty_text: &'static str,
    pub no_match_text: &'static str,
}

impl PageSpec {
    pub fn title(&self) -> &'static str {
        self.kind.title()
    }

    /// Page size used for this page: card lists are never paginated.
    pub fn page_size(&self, configured: usize) -> usize {
        match self.layout {
            Layout::Table => configured,
            Layout::Cards => UNPAGED,
        }
    }

    pub fn for_kind(kind: PageKind) -> Option<PageSpec> {
        match kind {
            PageKind::Overview => None,
            PageKind::Incidents => Some(incidents()),
            PageKind::Recommendations => Some(recommendations()),
            PageKind::ReviewQueue => Some(review_queue()),
        }
    }
}

fn keys(k: &[&str]) -> Vec<String> {
    k.iter().map(|s| s.to_string()).collect()
}

/// Maps a severity or priority string to a badge colour.
pub fn severity_variant(value: Option<&str>) -> BadgeVariant {
    let Some(value) = value.filter(|v| !v.is_empty()) else {
        return BadgeVariant::Neutral;
    };
    match value.to_lowercase().as_str() {
        "critical" | "high" => BadgeVariant::Error,
        "medium" | "med" => BadgeVariant::Warning,
        "low" => BadgeVariant::Success,
        _ => BadgeVariant::Info,
    }
}

fn severity_badge(value: Option<String>) -> Cell {
    match value.filter(|v| !v.is_empty()) {
        Some(v) => {
            let variant = severity_variant(Some(&v));
            Cell::Badge(v, variant)
        }
        None => Cell::placeholder(),
    }
}

fn first_or_placeholder(record: &Record, keys: &[&str]) -> Cell {
    Cell::Text(
        record
            .first_text(keys)
            .unwrap_or_else(|| PLACEHOLDER.to_string()),
    )
}

pub fn incidents() -> PageSpec {
    PageSpec {
        kind: PageKind::Incidents,
        subtitle: "Active and resolved incidents.",
        layout: Layout::Table,
        columns: vec![
            Column::new("id", "ID"),
            Column::new("summary", "Summary")
                .render(|r| first_or_placeholder(r, &["summary", "title", "message"])),
            Column::new("severity", "Severity").render(|r| severity_badge(r.text("severity"))),
            Column::new("status", "Status"),
        ],
        filter_keys: keys(&["id", "summary", "title", "message", "severity", "status"]),
        empty_text: "No incidents found. The system is quiet.",
        no_match_text: "No incidents match your filter.",
    }
}

pub fn review_queue() -> PageSpec {
    PageSpec {
        kind: PageKind::ReviewQueue,
        subtitle: "Items awaiting human review before action is taken.",
        layout: Layout::Table,
        columns: vec![
            Column::new("id", "ID"),
            Column::new("description", "Description").render(|r| {
                first_or_placeholder(r, &["description", "summary", "title", "message"])
            }),
            Column::new("priority", "Priority")
                .render(|r| severity_badge(r.first_text(&["priority", "severity"]))),
            Column::new("state", "State").render(|r| first_or_placeholder(r, &["state", "status"])),
        ],
        filter_keys: keys(&[
            "id",
            "description",
            "summary",
            "title",
            "message",
            "priority",
            "severity",
            "state",
            "status",
        ]),
        empty_text: "Review queue is empty. Nothing awaiting action.",
        no_match_text: "No items match your filter.",
    }
}

pub fn recommendations() -> PageSpec {
    PageSpec {
        kind: PageKind::Recommendations,
        subtitle: "AI-generated insights and remediation recommendations.",
        layout: Layout::Cards,
        columns: vec![
            Column::new("type", "Type").with_sortable(false),
            Column::new("title", "Title").with_sortable(false),
            Column::new("detail", "Detail").with_sortable(false),
            Column::new("description", "Description").with_sortable(false),
        ],
        filter_keys: keys(&[
            "id",
            "title",
            "summary",
            "recommendation",
            "type",
            "detail",
            "description",
        ]),
        empty_text: "No recommendations available yet.",
        no_match_text: "No recommendations match your filter.",
    }
}

/// Content of one recommendation card.
#[derive(Debug, Clone, PartialEq)]
pub struct InsightCard {
    pub kind: Option<String>,
    pub heading: String,
    pub lines: Vec<String>,
}

impl InsightCard {
    pub fn from_record(record: &Record) -> Self {
        let heading = record
            .first_text(&["title", "summary", "recommendation", "id"])
            .unwrap_or_else(|| "Untitled Insight".to_string());
        let lines = ["detail", "description"]
            .iter()
            .filter_map(|k| record.text(k))
            .filter(|s| !s.is_empty())
            .collect();
        InsightCard {
            kind: record.text("type").filter(|s| !s.is_empty()),
            heading,
            lines,
        }
    }
}
