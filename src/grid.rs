//! Tabular view engine.
//!
//! A [`Grid`] owns one page's records, column descriptors and filter keys plus
//! a private [`ViewState`]. Every render calls [`derive`], which filters, sorts
//! and paginates into a [`GridView`] of row indices. The record slice itself is
//! never copied or reordered.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use derive_setters::Setters;
use tracing::{debug, trace};

use crate::collation::natural_cmp;
use crate::record::Record;

/// Shown for a cell whose value is absent or null.
pub const PLACEHOLDER: &str = "—";

/// Page size that keeps every row on a single page.
pub const UNPAGED: usize = usize::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BadgeVariant {
    #[default]
    Neutral,
    Success,
    Warning,
    Error,
    Info,
}

/// A displayable cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Badge(String, BadgeVariant),
}

impl Cell {
    pub fn placeholder() -> Self {
        Cell::Text(PLACEHOLDER.to_string())
    }

    pub fn text(&self) -> &str {
        match self {
            Cell::Text(s) | Cell::Badge(s, _) => s,
        }
    }
}

pub type CellRenderer = Arc<dyn Fn(&Record) -> Cell + Send + Sync>;

#[derive(Clone, Setters)]
#[setters(prefix = "with_")]
pub struct Column {
    #[setters(skip)]
    pub key: String,
    #[setters(skip)]
    pub label: String,
    pub sortable: bool,
    #[setters(skip)]
    pub render: Option<CellRenderer>,
}

impl Column {
    pub fn new(key: impl Into<String>, label: impl Into<String>) -> Self {
        Column {
            key: key.into(),
            label: label.into(),
            sortable: true,
            render: None,
        }
    }

    pub fn render<F>(mut self, render: F) -> Self
    where
        F: Fn(&Record) -> Cell + Send + Sync + 'static,
    {
        self.render = Some(Arc::new(render));
        self
    }
}

impl fmt::Debug for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Column")
            .field("key", &self.key)
            .field("label", &self.label)
            .field("sortable", &self.sortable)
            .field("render", &self.render.is_some())
            .finish()
    }
}

/// Custom renderer if present, else the raw value with the placeholder
/// standing in for missing data.
pub fn render_cell(column: &Column, record: &Record) -> Cell {
    match &column.render {
        Some(render) => render(record),
        None => record
            .text(&column.key)
            .map(Cell::Text)
            .unwrap_or_else(Cell::placeholder),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn flip(self) -> Self {
        match self {
            SortDirection::Ascending => SortDirection::Descending,
            SortDirection::Descending => SortDirection::Ascending,
        }
    }

    pub fn arrow(self) -> &'static str {
        match self {
            SortDirection::Ascending => "▲",
            SortDirection::Descending => "▼",
        }
    }
}

/// Exact match on one column's displayed text.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueFilter {
    pub key: String,
    pub value: String,
}

/// Per-instance user state: filter text, sort column and page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewState {
    query: String,
    value_filter: Option<ValueFilter>,
    sort_key: Option<String>,
    sort_direction: SortDirection,
    page: usize,
}

impl ViewState {
    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn value_filter(&self) -> Option<&ValueFilter> {
        self.value_filter.as_ref()
    }

    pub fn sort_key(&self) -> Option<&str> {
        self.sort_key.as_deref()
    }

    pub fn sort_direction(&self) -> SortDirection {
        self.sort_direction
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn set_query(&mut self, text: impl Into<String>) {
        self.query = text.into();
        self.page = 0;
    }

    /// Narrows the rows to those whose `key` cell shows exactly `value`.
    /// Applies on top of the query; `None` lifts it.
    pub fn set_value_filter(&mut self, filter: Option<ValueFilter>) {
        self.value_filter = filter;
        self.page = 0;
    }

    /// Toggles direction on the active key, otherwise starts ascending on the
    /// new key. Returns false, leaving the state untouched, for a column that
    /// is declared non-sortable. Keys no column declares are accepted.
    pub fn set_sort(&mut self, columns: &[Column], key: &str) -> bool {
        if columns.iter().any(|c| c.key == key && !c.sortable) {
            return false;
        }
        if self.sort_key.as_deref() == Some(key) {
            self.sort_direction = self.sort_direction.flip();
        } else {
            self.sort_key = Some(key.to_string());
            self.sort_direction = SortDirection::Ascending;
        }
        self.page = 0;
        true
    }

    pub fn set_page(&mut self, n: i64, total_pages: usize) {
        let last = total_pages.max(1) - 1;
        self.page = usize::try_from(n.max(0)).unwrap_or(usize::MAX).min(last);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyState {
    /// The page has no records at all.
    NoRecords,
    /// Records exist but the filter matches none of them.
    NoMatches,
}

/// Result of one derivation over a record slice.
#[derive(Debug, Clone)]
pub struct GridView<'a> {
    records: &'a [Record],
    /// Indices of matching records, in display order.
    pub filtered: Vec<usize>,
    /// Indices of the records on the current page.
    pub rows: Vec<usize>,
    pub total_pages: usize,
    pub page: usize,
    pub page_size: usize,
}

impl<'a> GridView<'a> {
    pub fn total_records(&self) -> usize {
        self.records.len()
    }

    pub fn filtered_records(&self) -> impl Iterator<Item = &'a Record> + '_ {
        self.filtered.iter().map(|&i| &self.records[i])
    }

    pub fn visible_records(&self) -> impl Iterator<Item = &'a Record> + '_ {
        self.rows.iter().map(|&i| &self.records[i])
    }

    pub fn empty_state(&self) -> Option<EmptyState> {
        if self.records.is_empty() {
            Some(EmptyState::NoRecords)
        } else if self.filtered.is_empty() {
            Some(EmptyState::NoMatches)
        } else {
            None
        }
    }

    /// One-based `(first, last, of)` of the visible window, `None` when empty.
    pub fn showing(&self) -> Option<(usize, usize, usize)> {
        if self.rows.is_empty() {
            return None;
        }
        let first = self.page.saturating_mul(self.page_size) + 1;
        Some((first, first + self.rows.len() - 1, self.filtered.len()))
    }
}

fn matches_query(record: &Record, filter_keys: &[String], needle: &str) -> bool {
    filter_keys.iter().any(|k| {
        record
            .text(k)
            .is_some_and(|v| v.to_lowercase().contains(needle))
    })
}

pub fn filter_indices(records: &[Record], filter_keys: &[String], query: &str) -> Vec<usize> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return (0..records.len()).collect();
    }
    records
        .iter()
        .enumerate()
        .filter(|(_, r)| matches_query(r, filter_keys, &needle))
        .map(|(i, _)| i)
        .collect()
}

/// Displayed text of the `key` column, or the raw value when no column
/// declares that key.
pub fn column_text(columns: &[Column], key: &str, record: &Record) -> String {
    match columns.iter().find(|c| c.key == key) {
        Some(column) => render_cell(column, record).text().to_string(),
        None => record.text(key).unwrap_or_else(|| PLACEHOLDER.to_string()),
    }
}

/// Stable sort of `indices` by the string form of `key`. Missing and null
/// values sort as the empty string.
pub fn sort_indices(records: &[Record], indices: &mut Vec<usize>, key: &str, direction: SortDirection) {
    let mut keyed: Vec<(usize, String)> = indices
        .iter()
        .map(|&i| (i, records[i].text(key).unwrap_or_default()))
        .collect();
    keyed.sort_by(|(_, a), (_, b)| {
        let ord = natural_cmp(a, b);
        match direction {
            SortDirection::Ascending => ord,
            SortDirection::Descending => ord.reverse(),
        }
    });
    *indices = keyed.into_iter().map(|(i, _)| i).collect();
}

/// Filters, sorts and paginates `records` for the given state. Pure.
pub fn derive<'a>(
    state: &ViewState,
    records: &'a [Record],
    columns: &[Column],
    filter_keys: &[String],
    page_size: usize,
) -> GridView<'a> {
    let page_size = page_size.max(1);
    let mut filtered = filter_indices(records, filter_keys, &state.query);
    if let Some(ValueFilter { key, value }) = &state.value_filter {
        filtered.retain(|&i| column_text(columns, key, &records[i]) == *value);
    }
    if let Some(key) = &state.sort_key {
        sort_indices(records, &mut filtered, key, state.sort_direction);
    }

    let total_pages = filtered.len().div_ceil(page_size).max(1);
    let page = state.page.min(total_pages - 1);
    let start = page.saturating_mul(page_size).min(filtered.len());
    let end = start.saturating_add(page_size).min(filtered.len());
    let rows = filtered[start..end].to_vec();

    trace!(
        "Derived {} of {} records, page {}/{}",
        filtered.len(),
        records.len(),
        page + 1,
        total_pages
    );

    GridView {
        records,
        filtered,
        rows,
        total_pages,
        page,
        page_size,
    }
}

/// Counts of the displayed `key` text over `indices`, most frequent first,
/// ties in natural order. The placeholder bucket always comes last.
pub fn breakdown(
    records: &[Record],
    indices: &[usize],
    columns: &[Column],
    key: &str,
) -> Vec<(String, usize)> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for &i in indices {
        *counts.entry(column_text(columns, key, &records[i])).or_insert(0) += 1;
    }
    let mut sorted: Vec<(String, usize)> = counts.into_iter().collect();
    sorted.sort_by(|(va, ca), (vb, cb)| {
        (va == PLACEHOLDER)
            .cmp(&(vb == PLACEHOLDER))
            .then_with(|| cb.cmp(ca))
            .then_with(|| natural_cmp(va, vb))
            .then_with(|| va.cmp(vb))
    });
    sorted
}

/// One engine instance: immutable inputs plus the mutable view state.
#[derive(Debug, Clone)]
pub struct Grid {
    records: Arc<[Record]>,
    columns: Arc<[Column]>,
    filter_keys: Arc<[String]>,
    page_size: usize,
    state: ViewState,
}

impl Grid {
    pub fn new(
        records: impl Into<Arc<[Record]>>,
        columns: impl Into<Arc<[Column]>>,
        filter_keys: impl Into<Arc<[String]>>,
        page_size: usize,
    ) -> Self {
        Grid {
            records: records.into(),
            columns: columns.into(),
            filter_keys: filter_keys.into(),
            page_size: page_size.max(1),
            state: ViewState::default(),
        }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn view(&self) -> GridView<'_> {
        derive(
            &self.state,
            &self.records,
            &self.columns,
            &self.filter_keys,
            self.page_size,
        )
    }

    pub fn set_query(&mut self, text: impl Into<String>) {
        self.state.set_query(text);
        debug!("Query set to {:?}", self.state.query);
    }

    pub fn set_value_filter(&mut self, key: &str, value: impl Into<String>) {
        let filter = ValueFilter {
            key: key.to_string(),
            value: value.into(),
        };
        debug!("Value filter set to {:?}", filter);
        self.state.set_value_filter(Some(filter));
    }

    /// Drops both the query and the value filter.
    pub fn clear_filters(&mut self) {
        self.state.set_query("");
        self.state.set_value_filter(None);
        debug!("Filters cleared");
    }

    pub fn set_sort(&mut self, key: &str) -> bool {
        let accepted = self.state.set_sort(&self.columns, key);
        debug!(
            "Sort on {key}: accepted {accepted}, now {:?} {:?}",
            self.state.sort_key, self.state.sort_direction
        );
        accepted
    }

    pub fn set_page(&mut self, n: i64) {
        let total_pages = self.view().total_pages;
        self.state.set_page(n, total_pages);
    }

    pub fn next_page(&mut self) {
        self.set_page(self.state.page as i64 + 1);
    }

    pub fn prev_page(&mut self) {
        self.set_page(self.state.page as i64 - 1);
    }

    pub fn last_page(&mut self) {
        self.set_page(i64::MAX);
    }

    pub fn cells(&self, record: &Record) -> Vec<Cell> {
        self.columns.iter().map(|c| render_cell(c, record)).collect()
    }

    /// Arrow for the column that is currently sorted on.
    pub fn sort_indicator(&self, column: &Column) -> Option<&'static str> {
        (column.sortable && self.state.sort_key() == Some(column.key.as_str()))
            .then(|| self.state.sort_direction.arrow())
    }

    pub fn breakdown(&self, key: &str) -> Vec<(String, usize)> {
        let view = self.view();
        breakdown(&self.records, &view.filtered, &self.columns, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Value;
    use proptest::prelude::*;
    use std::cmp::Ordering;

    fn rec(id: i64, severity: &str) -> Record {
        Record::from_pairs([("id", Value::from(id)), ("severity", Value::from(severity))])
    }

    fn keys(k: &[&str]) -> Vec<String> {
        k.iter().map(|s| s.to_string()).collect()
    }

    fn sample() -> Vec<Record> {
        vec![rec(1, "high"), rec(2, "low"), rec(3, "medium")]
    }

    fn ids(view: &GridView<'_>) -> Vec<String> {
        view.visible_records().filter_map(Record::id).collect()
    }

    #[test]
    fn end_to_end_example() {
        let mut grid = Grid::new(
            sample(),
            vec![Column::new("id", "ID"), Column::new("severity", "Severity")],
            keys(&["severity"]),
            2,
        );

        grid.set_query("h");
        let view = grid.view();
        assert_eq!(view.filtered, vec![0]);

        grid.set_query("");
        assert!(grid.set_sort("severity"));
        let view = grid.view();
        assert_eq!(view.total_pages, 2);
        let page0: Vec<_> = view.visible_records().filter_map(|r| r.text("severity")).collect();
        assert_eq!(page0, vec!["high", "low"]);

        grid.set_page(1);
        let view = grid.view();
        let page1: Vec<_> = view.visible_records().filter_map(|r| r.text("severity")).collect();
        assert_eq!(page1, vec!["medium"]);
    }

    #[test]
    fn query_is_trimmed_and_case_insensitive() {
        let records = sample();
        let fk = keys(&["severity"]);
        let mut state = ViewState::default();
        state.set_query("  LOW ");
        let view = derive(&state, &records, &[], &fk, 10);
        assert_eq!(view.filtered, vec![1]);
    }

    #[test]
    fn filter_ignores_fields_outside_filter_keys() {
        let records = sample();
        let mut state = ViewState::default();
        state.set_query("2");
        let view = derive(&state, &records, &[], &keys(&["severity"]), 10);
        assert!(view.filtered.is_empty());
        let view = derive(&state, &records, &[], &keys(&["id", "severity"]), 10);
        assert_eq!(view.filtered, vec![1]);
    }

    #[test]
    fn numeric_aware_sort() {
        let records = vec![
            Record::from_pairs([("n", "10")]),
            Record::from_pairs([("n", "2")]),
        ];
        let mut state = ViewState::default();
        state.set_sort(&[], "n");
        let view = derive(&state, &records, &[], &[], 10);
        assert_eq!(view.filtered, vec![1, 0]);
    }

    #[test]
    fn sort_toggle_reverses_and_keeps_membership() {
        let mut grid = Grid::new(sample(), vec![Column::new("severity", "Severity")], keys(&["severity"]), 10);
        grid.set_sort("severity");
        let asc = ids(&grid.view());
        grid.set_sort("severity");
        assert_eq!(grid.state().sort_direction(), SortDirection::Descending);
        let mut desc = ids(&grid.view());
        desc.reverse();
        assert_eq!(asc, desc);
    }

    #[test]
    fn descending_sort_keeps_ties_in_input_order() {
        let records = vec![rec(1, "low"), rec(2, "high"), rec(3, "LOW"), rec(4, "low")];
        let mut state = ViewState::default();
        state.set_sort(&[], "severity");
        state.set_sort(&[], "severity");
        let view = derive(&state, &records, &[], &[], 10);
        assert_eq!(view.filtered, vec![0, 2, 3, 1]);
    }

    #[test]
    fn missing_sort_values_sort_as_empty() {
        let records = vec![rec(1, "low"), Record::from_pairs([("id", 2i64)]), rec(3, "high")];
        let mut state = ViewState::default();
        state.set_sort(&[], "severity");
        let view = derive(&state, &records, &[], &[], 10);
        assert_eq!(view.filtered, vec![1, 2, 0]);
    }

    #[test]
    fn unknown_sort_key_is_inert() {
        let records = sample();
        let mut state = ViewState::default();
        assert!(state.set_sort(&[], "does-not-exist"));
        let view = derive(&state, &records, &[], &[], 10);
        assert_eq!(view.filtered, vec![0, 1, 2]);
    }

    #[test]
    fn non_sortable_column_is_rejected() {
        let columns = vec![Column::new("severity", "Severity").with_sortable(false)];
        let mut grid = Grid::new(sample(), columns, keys(&["severity"]), 1);
        grid.set_page(2);
        assert!(!grid.set_sort("severity"));
        assert_eq!(grid.state().sort_key(), None);
        assert_eq!(grid.state().page(), 2);
    }

    #[test]
    fn page_is_clamped() {
        let mut grid = Grid::new(sample(), vec![Column::new("id", "ID")], keys(&["id"]), 2);
        grid.set_page(-4);
        assert_eq!(grid.state().page(), 0);
        grid.set_page(99);
        assert_eq!(grid.state().page(), 1);
        grid.next_page();
        assert_eq!(grid.state().page(), 1);
        grid.prev_page();
        grid.prev_page();
        assert_eq!(grid.state().page(), 0);
    }

    #[test]
    fn stale_page_is_clamped_at_derive_time() {
        let records = sample();
        let state = ViewState {
            page: 7,
            ..ViewState::default()
        };
        let view = derive(&state, &records, &[], &[], 2);
        assert_eq!(view.page, 1);
        assert_eq!(view.rows, vec![2]);
    }

    #[test]
    fn query_and_sort_changes_reset_page() {
        let mut grid = Grid::new(sample(), vec![Column::new("severity", "Severity")], keys(&["severity"]), 1);
        grid.set_page(2);
        grid.set_query("i");
        assert_eq!(grid.state().page(), 0);
        grid.set_page(1);
        grid.set_sort("severity");
        assert_eq!(grid.state().page(), 0);
    }

    #[test]
    fn missing_field_renders_placeholder() {
        let column = Column::new("status", "Status");
        assert_eq!(render_cell(&column, &rec(1, "low")), Cell::Text(PLACEHOLDER.into()));
        let null = Record::from_pairs([("status", Value::Null)]);
        assert_eq!(render_cell(&column, &null).text(), "—");
    }

    #[test]
    fn custom_renderer_receives_the_whole_record() {
        let column = Column::new("summary", "Summary")
            .render(|r| Cell::Text(r.first_text(&["summary", "severity"]).unwrap_or_default()));
        assert_eq!(render_cell(&column, &rec(1, "low")).text(), "low");
    }

    #[test]
    fn empty_states_are_distinguished() {
        let none: Vec<Record> = Vec::new();
        let view = derive(&ViewState::default(), &none, &[], &[], 10);
        assert_eq!(view.empty_state(), Some(EmptyState::NoRecords));
        assert_eq!(view.total_pages, 1);

        let one = vec![rec(1, "high")];
        let mut state = ViewState::default();
        state.set_query("zzz");
        let view = derive(&state, &one, &[], &keys(&["severity"]), 10);
        assert_eq!(view.empty_state(), Some(EmptyState::NoMatches));

        let view = derive(&ViewState::default(), &one, &[], &[], 10);
        assert_eq!(view.empty_state(), None);
    }

    #[test]
    fn showing_range_is_one_based() {
        let records: Vec<Record> = (0..25).map(|i| rec(i, "low")).collect();
        let mut grid = Grid::new(records, vec![Column::new("id", "ID")], keys(&["id"]), 10);
        assert_eq!(grid.view().showing(), Some((1, 10, 25)));
        grid.last_page();
        assert_eq!(grid.view().showing(), Some((21, 25, 25)));
    }

    #[test]
    fn unpaged_grid_has_one_page() {
        let records: Vec<Record> = (0..25).map(|i| rec(i, "low")).collect();
        let grid = Grid::new(records, Vec::<Column>::new(), Vec::<String>::new(), UNPAGED);
        let view = grid.view();
        assert_eq!(view.total_pages, 1);
        assert_eq!(view.rows.len(), 25);
    }

    #[test]
    fn sort_indicator_follows_state() {
        let columns = vec![Column::new("id", "ID"), Column::new("severity", "Severity")];
        let mut grid = Grid::new(sample(), columns.clone(), keys(&["id"]), 10);
        assert_eq!(grid.sort_indicator(&columns[1]), None);
        grid.set_sort("severity");
        assert_eq!(grid.sort_indicator(&columns[1]), Some("▲"));
        assert_eq!(grid.sort_indicator(&columns[0]), None);
        grid.set_sort("severity");
        assert_eq!(grid.sort_indicator(&columns[1]), Some("▼"));
    }

    #[test]
    fn breakdown_counts_filtered_rows() {
        let records = vec![rec(1, "low"), rec(2, "high"), rec(3, "low"), Record::from_pairs([("id", 4i64)])];
        let counts = breakdown(&records, &[0, 1, 2, 3], &[], "severity");
        assert_eq!(
            counts,
            vec![("low".to_string(), 2), ("high".to_string(), 1), ("—".to_string(), 1)]
        );
        let counts = breakdown(&records, &[1, 3], &[], "severity");
        assert_eq!(counts, vec![("high".to_string(), 1), ("—".to_string(), 1)]);
    }

    #[test]
    fn placeholder_bucket_is_last_even_when_largest() {
        let records = vec![
            Record::from_pairs([("id", 1i64)]),
            Record::from_pairs([("id", 2i64)]),
            rec(3, "low"),
        ];
        let counts = breakdown(&records, &[0, 1, 2], &[], "severity");
        assert_eq!(counts, vec![("low".to_string(), 1), ("—".to_string(), 2)]);
    }

    #[test]
    fn breakdown_uses_rendered_cells() {
        let priority = Column::new("priority", "Priority")
            .render(|r| Cell::Text(r.first_text(&["priority", "severity"]).unwrap_or_default()));
        let records = vec![rec(1, "high"), rec(2, "low")];
        let counts = breakdown(&records, &[0, 1], &[priority], "priority");
        assert_eq!(counts, vec![("high".to_string(), 1), ("low".to_string(), 1)]);
    }

    #[test]
    fn value_filter_matches_whole_cell_of_one_column() {
        let records = vec![
            Record::from_pairs([("id", "1"), ("status", "open"), ("summary", "disk full")]),
            Record::from_pairs([("id", "2"), ("status", "reopened"), ("summary", "login burst")]),
            Record::from_pairs([("id", "10"), ("status", "closed"), ("summary", "port open on host")]),
        ];
        let columns = vec![
            Column::new("id", "ID"),
            Column::new("status", "Status"),
            Column::new("summary", "Summary"),
        ];
        let mut grid = Grid::new(records, columns, keys(&["id", "status", "summary"]), 10);

        let open = grid
            .breakdown("status")
            .into_iter()
            .find(|(v, _)| v == "open")
            .map(|(_, n)| n);
        grid.set_value_filter("status", "open");
        assert_eq!(Some(grid.view().filtered.len()), open);
        assert_eq!(grid.view().filtered, vec![0]);

        grid.clear_filters();
        grid.set_value_filter("id", "1");
        assert_eq!(grid.view().filtered, vec![0]);
    }

    #[test]
    fn value_filter_combines_with_query_and_resets_page() {
        let records: Vec<Record> = (0..6).map(|i| rec(i, if i % 2 == 0 { "high" } else { "low" })).collect();
        let mut grid = Grid::new(records, vec![Column::new("severity", "Severity")], keys(&["id"]), 1);
        grid.set_page(4);
        grid.set_value_filter("severity", "high");
        assert_eq!(grid.state().page(), 0);
        assert_eq!(grid.view().filtered, vec![0, 2, 4]);
        grid.set_query("4");
        assert_eq!(grid.view().filtered, vec![4]);
        grid.clear_filters();
        assert_eq!(grid.view().filtered.len(), 6);
        assert!(grid.state().value_filter().is_none());
    }

    #[test]
    fn placeholder_value_filter_selects_missing_cells() {
        let records = vec![rec(1, "low"), Record::from_pairs([("id", 2i64)])];
        let mut grid = Grid::new(records, vec![Column::new("severity", "Severity")], keys(&["id"]), 10);
        grid.set_value_filter("severity", PLACEHOLDER);
        assert_eq!(grid.view().filtered, vec![1]);
    }

    fn arb_records() -> impl Strategy<Value = Vec<Record>> {
        prop::collection::vec(
            (prop::option::of("[a-cA-C0-9 ]{0,4}"), prop::option::of("[a-c0-9]{0,3}")),
            0..40,
        )
        .prop_map(|rows| {
            rows.into_iter()
                .map(|(a, b)| {
                    let mut r = Record::default();
                    if let Some(a) = a {
                        r.insert("a", a);
                    }
                    if let Some(b) = b {
                        r.insert("b", b);
                    }
                    r
                })
                .collect()
        })
    }

    proptest! {
        #[test]
        fn filter_is_exact(records in arb_records(), query in "[a-cA-C0-9 ]{0,3}") {
            let fk = keys(&["a"]);
            let mut state = ViewState::default();
            state.set_query(query.clone());
            let view = derive(&state, &records, &[], &fk, 10);
            let needle = query.trim().to_lowercase();
            for (i, r) in records.iter().enumerate() {
                let hit = needle.is_empty()
                    || r.text("a").is_some_and(|v| v.to_lowercase().contains(&needle));
                prop_assert_eq!(view.filtered.contains(&i), hit);
            }
        }

        #[test]
        fn blank_query_is_identity(records in arb_records(), blanks in " {0,3}") {
            let mut state = ViewState::default();
            state.set_query(blanks);
            let view = derive(&state, &records, &[], &keys(&["a", "b"]), 10);
            prop_assert_eq!(view.filtered, (0..records.len()).collect::<Vec<_>>());
        }

        #[test]
        fn sort_is_stable_and_repeatable(records in arb_records(), descending in any::<bool>()) {
            let mut state = ViewState::default();
            state.set_sort(&[], "b");
            if descending {
                state.set_sort(&[], "b");
            }
            let first = derive(&state, &records, &[], &[], UNPAGED).filtered;
            let second = derive(&state, &records, &[], &[], UNPAGED).filtered;
            prop_assert_eq!(&first, &second);
            for pair in first.windows(2) {
                let a = records[pair[0]].text("b").unwrap_or_default();
                let b = records[pair[1]].text("b").unwrap_or_default();
                if natural_cmp(&a, &b) == Ordering::Equal {
                    prop_assert!(pair[0] < pair[1]);
                }
            }
        }

        #[test]
        fn pages_stay_in_bounds(records in arb_records(), page_size in 1usize..8, requested in -10i64..20) {
            let mut grid = Grid::new(records, Vec::<Column>::new(), Vec::<String>::new(), page_size);
            grid.set_page(requested);
            let view = grid.view();
            prop_assert!(view.page < view.total_pages);
            prop_assert!(view.rows.len() <= page_size);
            if view.page + 1 < view.total_pages {
                prop_assert_eq!(view.rows.len(), page_size);
            }
        }

        #[test]
        fn changes_reset_to_first_page(records in arb_records(), requested in 0i64..20, query in "[a-c]{0,2}") {
            let mut grid = Grid::new(records, vec![Column::new("a", "A")], keys(&["a"]), 2);
            grid.set_page(requested);
            grid.set_query(query);
            prop_assert_eq!(grid.view().page, 0);
            grid.set_page(requested);
            grid.set_sort("a");
            prop_assert_eq!(grid.view().page, 0);
        }
    }
}
