use std::collections::HashMap;
use std::time::{Duration, Instant};

use arboard::Clipboard;
use ratatui::crossterm::event::KeyEvent;
use tracing::{debug, info, trace, warn};

use crate::domain::{CMDMode, HELP_TEXT, Message, PanicConfig, PanicError};
use crate::grid::{Cell, EmptyState, Grid, PLACEHOLDER, breakdown};
use crate::inputter::{InputResult, Inputter};
use crate::loader::{Collection, Collections, RecordSource, load_all};
use crate::pages::{InsightCard, Layout, PageKind, PageSpec};
use crate::record::Record;

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum Status {
    LOADING,
    READY,
    QUITTING,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Modus {
    TABLE,
    RECORD,
    BREAKDOWN,
    POPUP,
    CMDINPUT,
}

/// One data-bearing tab: its configuration, its engine and the selection.
pub struct PageState {
    spec: PageSpec,
    grid: Grid,
    curser_row: usize,
    curser_column: usize,
}

impl PageState {
    fn new(spec: PageSpec, records: Vec<Record>, page_size: usize) -> Self {
        let grid = Grid::new(
            records,
            spec.columns.clone(),
            spec.filter_keys.clone(),
            spec.page_size(page_size),
        );
        PageState {
            spec,
            grid,
            curser_row: 0,
            curser_column: 0,
        }
    }

    #[cfg(test)]
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    fn visible_rows(&self) -> usize {
        self.grid.view().rows.len()
    }

    /// Position of the selected row within the filtered order.
    fn selected_position(&self) -> Option<usize> {
        let view = self.grid.view();
        (self.curser_row < view.rows.len())
            .then(|| view.page.saturating_mul(view.page_size) + self.curser_row)
    }
}

struct RecordView {
    position: usize, // Index into the filtered order of the current page
    curser_row: usize,
}

struct BreakdownView {
    column_key: String,
    column_label: String,
    values: Vec<(String, usize)>,
    total: usize,
    curser_row: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatCard {
    pub label: &'static str,
    pub value: usize,
    pub shortcut: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PageHeader {
    pub title: &'static str,
    pub subtitle: &'static str,
    pub filtered: usize,
    pub total: usize,
    pub query: String,
    /// Column label and value of an exact-match filter.
    pub value_filter: Option<(String, String)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HeaderCell {
    pub label: String,
    pub arrow: Option<&'static str>,
    pub sortable: bool,
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Pagination {
    pub page: usize,
    pub total_pages: usize,
    pub first: usize,
    pub last: usize,
    pub of: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Loading,
    Overview {
        cards: Vec<StatCard>,
        severity: Vec<(String, usize)>,
    },
    Table {
        header: PageHeader,
        columns: Vec<HeaderCell>,
        rows: Vec<Vec<Cell>>,
        selected_row: usize,
        empty_message: Option<&'static str>,
        pagination: Option<Pagination>,
    },
    Cards {
        header: PageHeader,
        cards: Vec<InsightCard>,
        selected: usize,
        empty_message: Option<&'static str>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Popup {
    Help(&'static str),
    Record {
        title: String,
        fields: Vec<(String, String)>,
        selected: usize,
    },
    Breakdown {
        title: String,
        values: Vec<(String, usize)>,
        total: usize,
        selected: usize,
    },
}

/// Everything the UI needs to draw one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct UIData {
    pub tabs: Vec<String>,
    pub selected_tab: usize,
    pub body: Body,
    pub popup: Option<Popup>,
    pub cmdinput: Option<(CMDMode, InputResult)>,
    pub status_message: String,
}

pub struct Model {
    config: PanicConfig,
    pub status: Status,
    modus: Modus,
    previous_modus: Modus,
    source: Box<dyn RecordSource>,
    counts: HashMap<Collection, usize>,
    severity: Vec<(String, usize)>,
    pages: Vec<PageState>,
    current: PageKind,
    record_view: RecordView,
    breakdown_view: BreakdownView,
    clipboard: Option<Clipboard>,
    input: Inputter,
    cmd_mode: Option<CMDMode>,
    last_input: InputResult,
    status_message: String,
    last_status_message_update: Instant,
}

/// Non-object display key: the record id, else its one-based position.
pub fn row_key(record: &Record, position: usize) -> String {
    record.id().unwrap_or_else(|| format!("#{}", position + 1))
}

impl Model {
    pub fn init(config: &PanicConfig, source: Box<dyn RecordSource>) -> Result<Self, PanicError> {
        let clipboard = match Clipboard::new() {
            Ok(c) => Some(c),
            Err(e) => {
                warn!("Clipboard unavailable: {e:?}");
                None
            }
        };
        let mut model = Self {
            config: config.clone(),
            status: Status::LOADING,
            modus: Modus::TABLE,
            previous_modus: Modus::TABLE,
            source,
            counts: HashMap::new(),
            severity: Vec::new(),
            pages: Vec::new(),
            current: PageKind::Overview,
            record_view: RecordView {
                position: 0,
                curser_row: 0,
            },
            breakdown_view: BreakdownView {
                column_key: String::new(),
                column_label: String::new(),
                values: Vec::new(),
                total: 0,
                curser_row: 0,
            },
            clipboard,
            input: Inputter::default(),
            cmd_mode: None,
            last_input: InputResult::default(),
            status_message: String::new(),
            last_status_message_update: Instant::now(),
        };
        model.set_status_message(format!("Loading from {} ...", model.source.describe()));
        Ok(model)
    }

    /// Fetches every collection and rebuilds all pages with fresh view state.
    pub fn load(&mut self) {
        self.status = Status::LOADING;
        let collections = load_all(self.source.as_ref());
        self.apply(collections);
    }

    fn apply(&mut self, collections: Collections) {
        let incidents_all: Vec<usize> = (0..collections.incidents.len()).collect();
        self.severity = breakdown(&collections.incidents, &incidents_all, &[], "severity");
        self.counts = Collection::ALL
            .iter()
            .map(|&c| (c, collections.count(c)))
            .collect();

        let load_time = collections.load_time;
        let total: usize = self.counts.values().sum();
        self.pages = PageKind::ALL
            .iter()
            .filter_map(|&kind| {
                let spec = PageSpec::for_kind(kind)?;
                let records = kind
                    .collection()
                    .map(|c| collections.get(c).to_vec())
                    .unwrap_or_default();
                Some(PageState::new(spec, records, self.config.page_size))
            })
            .collect();

        self.modus = Modus::TABLE;
        self.previous_modus = Modus::TABLE;
        self.cmd_mode = None;
        self.status = Status::READY;
        self.set_status_message(format!(
            "Loaded {total} records in {}ms ...",
            load_time.as_millis()
        ));
        info!("Pages rebuilt with {total} records");
    }

    pub fn raw_keyevents(&self) -> bool {
        self.modus == Modus::CMDINPUT
    }

    pub fn quit(&mut self) {
        self.status = Status::QUITTING;
    }

    pub fn count(&self, collection: Collection) -> usize {
        self.counts.get(&collection).copied().unwrap_or(0)
    }

    #[cfg(test)]
    pub fn current_kind(&self) -> PageKind {
        self.current
    }

    pub fn page(&self, kind: PageKind) -> Option<&PageState> {
        self.pages.iter().find(|p| p.spec.kind == kind)
    }

    fn current_page(&self) -> Option<&PageState> {
        self.page(self.current)
    }

    fn current_page_mut(&mut self) -> Option<&mut PageState> {
        let kind = self.current;
        self.pages.iter_mut().find(|p| p.spec.kind == kind)
    }

    fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
        self.last_status_message_update = Instant::now();
    }

    #[cfg(test)]
    pub fn status_message(&self) -> &str {
        &self.status_message
    }

    /// Status line text; messages fade after a few seconds.
    fn visible_status_message(&self) -> String {
        if self.status == Status::LOADING
            || self.last_status_message_update.elapsed() < Duration::from_secs(5)
        {
            self.status_message.clone()
        } else {
            String::new()
        }
    }

    fn ui_resize(&self, width: usize, height: usize) {
        trace!("UI was resized! w:{width}, h:{height}");
    }

    pub fn update(&mut self, message: Option<Message>) -> Result<(), PanicError> {
        let Some(msg) = message else {
            return Ok(());
        };
        trace!("Update: Modus {:?}, Message {:?}", self.modus, msg);

        match msg {
            Message::Quit if self.modus != Modus::CMDINPUT => {
                self.quit();
                return Ok(());
            }
            Message::Resize(width, height) => {
                self.ui_resize(width, height);
                return Ok(());
            }
            _ => {}
        }

        match self.modus {
            Modus::TABLE => match msg {
                Message::NextTab => self.select_tab_offset(1),
                Message::PrevTab => self.select_tab_offset(-1),
                Message::SelectTab(idx) => self.select_tab(idx),
                Message::MoveUp => self.move_table_selection_up(),
                Message::MoveDown => self.move_table_selection_down(),
                Message::MoveLeft => self.move_column_selection(-1),
                Message::MoveRight => self.move_column_selection(1),
                Message::Sort => self.sort_selected_column(),
                Message::NextPage => self.change_page(|g| g.next_page()),
                Message::PrevPage => self.change_page(|g| g.prev_page()),
                Message::FirstPage => self.change_page(|g| g.set_page(0)),
                Message::LastPage => self.change_page(|g| g.last_page()),
                Message::GotoPage => self.enter_cmd_mode(CMDMode::GotoPage),
                Message::Filter => self.enter_cmd_mode(CMDMode::Filter),
                Message::ClearFilter | Message::Exit => self.clear_filter(),
                Message::Enter => self.build_record_view(),
                Message::Breakdown => self.build_breakdown_view(),
                Message::CopyRow => self.copy_selected_record(),
                Message::Reload => self.load(),
                Message::Help => self.show_help(),
                _ => (),
            },
            Modus::RECORD => match msg {
                Message::MoveUp => {
                    self.record_view.curser_row = self.record_view.curser_row.saturating_sub(1)
                }
                Message::MoveDown => self.move_record_selection_down(),
                Message::MoveLeft => self.previous_record(),
                Message::MoveRight => self.next_record(),
                Message::CopyRow => self.copy_selected_record(),
                Message::Help => self.show_help(),
                Message::Enter | Message::Exit => self.exit(),
                _ => (),
            },
            Modus::BREAKDOWN => match msg {
                Message::MoveUp => {
                    self.breakdown_view.curser_row =
                        self.breakdown_view.curser_row.saturating_sub(1)
                }
                Message::MoveDown => {
                    let last = self.breakdown_view.values.len().saturating_sub(1);
                    self.breakdown_view.curser_row =
                        (self.breakdown_view.curser_row + 1).min(last);
                }
                Message::Enter => self.filter_by_breakdown_value(),
                Message::Help => self.show_help(),
                Message::Exit => self.exit(),
                _ => (),
            },
            Modus::POPUP => match msg {
                Message::Exit | Message::Enter | Message::Help => self.exit(),
                _ => (),
            },
            Modus::CMDINPUT => {
                if let Message::RawKey(key) = msg {
                    self.raw_input(key)
                }
            }
        }
        Ok(())
    }

    // -------------------- Control handling functions ---------------------- //

    fn select_tab(&mut self, idx: usize) {
        if let Some(&kind) = PageKind::ALL.get(idx) {
            debug!("Switching to {:?}", kind);
            self.current = kind;
        }
    }

    fn select_tab_offset(&mut self, step: isize) {
        let n = PageKind::ALL.len() as isize;
        let idx = PageKind::ALL
            .iter()
            .position(|&k| k == self.current)
            .unwrap_or(0) as isize;
        self.select_tab((idx + step).rem_euclid(n) as usize);
    }

    fn move_table_selection_up(&mut self) {
        if let Some(page) = self.current_page_mut() {
            page.curser_row = page.curser_row.saturating_sub(1);
        }
    }

    fn move_table_selection_down(&mut self) {
        if let Some(page) = self.current_page_mut() {
            let last = page.visible_rows().saturating_sub(1);
            page.curser_row = (page.curser_row + 1).min(last);
        }
    }

    fn move_column_selection(&mut self, step: isize) {
        if let Some(page) = self.current_page_mut() {
            if page.spec.layout == Layout::Cards || page.spec.columns.is_empty() {
                return;
            }
            let last = page.spec.columns.len() as isize - 1;
            page.curser_column = (page.curser_column as isize + step).clamp(0, last) as usize;
        }
    }

    fn sort_selected_column(&mut self) {
        let Some(page) = self.current_page_mut() else {
            return;
        };
        if page.spec.layout == Layout::Cards {
            return;
        }
        let Some(column) = page.spec.columns.get(page.curser_column).cloned() else {
            return;
        };
        let message = if page.grid.set_sort(&column.key) {
            page.curser_row = 0;
            let direction = page.grid.state().sort_direction();
            format!("Sorted by {} {}", column.label, direction.arrow())
        } else {
            format!("{} is not sortable", column.label)
        };
        self.set_status_message(message);
    }

    fn change_page(&mut self, change: impl FnOnce(&mut Grid)) {
        if let Some(page) = self.current_page_mut() {
            let before = page.grid.state().page();
            change(&mut page.grid);
            if page.grid.state().page() != before {
                page.curser_row = 0;
            }
        }
    }

    fn clear_filter(&mut self) {
        if let Some(page) = self.current_page_mut() {
            let state = page.grid.state();
            if !state.query().is_empty() || state.value_filter().is_some() {
                page.grid.clear_filters();
                page.curser_row = 0;
            }
        }
    }

    fn show_help(&mut self) {
        self.previous_modus = self.modus;
        self.modus = Modus::POPUP;
    }

    fn exit(&mut self) {
        match self.modus {
            Modus::POPUP => {
                trace!("Close popup ...");
                self.modus = match self.previous_modus {
                    Modus::POPUP | Modus::CMDINPUT => Modus::TABLE,
                    other => other,
                };
            }
            Modus::RECORD | Modus::BREAKDOWN => self.modus = Modus::TABLE,
            Modus::TABLE | Modus::CMDINPUT => {}
        }
        self.previous_modus = Modus::TABLE;
    }

    fn build_record_view(&mut self) {
        let Some(position) = self.current_page().and_then(PageState::selected_position) else {
            return;
        };
        trace!("Building record view for {position} ...");
        self.record_view = RecordView {
            position,
            curser_row: 0,
        };
        self.previous_modus = self.modus;
        self.modus = Modus::RECORD;
    }

    fn filtered_len(&self) -> usize {
        self.current_page()
            .map(|p| p.grid.view().filtered.len())
            .unwrap_or(0)
    }

    fn previous_record(&mut self) {
        self.record_view.position = self.record_view.position.saturating_sub(1);
        self.record_view.curser_row = 0;
    }

    fn next_record(&mut self) {
        if self.record_view.position + 1 < self.filtered_len() {
            self.record_view.position += 1;
            self.record_view.curser_row = 0;
        }
    }

    fn move_record_selection_down(&mut self) {
        let fields = self
            .selected_record()
            .map(|(_, r)| r.len())
            .unwrap_or(0);
        self.record_view.curser_row =
            (self.record_view.curser_row + 1).min(fields.saturating_sub(1));
    }

    /// The record under the cursor (table mode) or shown in the record view.
    fn selected_record(&self) -> Option<(usize, &Record)> {
        let page = self.current_page()?;
        let position = match self.modus {
            Modus::RECORD => self.record_view.position,
            _ => page.selected_position()?,
        };
        let record = page.grid.view().filtered_records().nth(position)?;
        Some((position, record))
    }

    fn copy_selected_record(&mut self) {
        let Some(json) = self.selected_record().map(|(_, r)| r.to_json()) else {
            return;
        };
        trace!("Record content: {}", json);
        let message = match self.clipboard.as_mut().map(|c| c.set_text(json)) {
            Some(Ok(_)) => "Copied record to clipboard.".to_string(),
            Some(Err(e)) => {
                warn!("Error copying to clipboard: {:?}", e);
                "Copying to clipboard failed!".to_string()
            }
            None => "No clipboard available!".to_string(),
        };
        self.set_status_message(message);
    }

    fn build_breakdown_view(&mut self) {
        let Some(page) = self.current_page() else {
            return;
        };
        let Some(column) = page.spec.columns.get(page.curser_column) else {
            return;
        };
        let values = page.grid.breakdown(&column.key);
        let total = values.iter().map(|(_, c)| c).sum();
        self.breakdown_view = BreakdownView {
            column_key: column.key.clone(),
            column_label: column.label.clone(),
            values,
            total,
            curser_row: 0,
        };
        self.previous_modus = self.modus;
        self.modus = Modus::BREAKDOWN;
    }

    fn filter_by_breakdown_value(&mut self) {
        let hist = &self.breakdown_view;
        let Some((value, _)) = hist.values.get(hist.curser_row).cloned() else {
            return;
        };
        let key = hist.column_key.clone();
        let label = hist.column_label.clone();
        self.modus = Modus::TABLE;
        if let Some(page) = self.current_page_mut() {
            page.grid.set_value_filter(&key, value.clone());
            page.curser_row = 0;
        }
        self.set_status_message(format!("Filtered by {label} = {value}"));
    }

    fn enter_cmd_mode(&mut self, mode: CMDMode) {
        let Some(query) = self
            .current_page()
            .map(|p| p.grid.state().query().to_string())
        else {
            return;
        };
        trace!("Entering command mode {:?} ...", mode);
        self.previous_modus = self.modus;
        self.modus = Modus::CMDINPUT;
        self.cmd_mode = Some(mode);
        match mode {
            CMDMode::Filter => self.input.set(&query),
            CMDMode::GotoPage => self.input.clear(),
        }
        self.last_input = self.input.get();
    }

    fn raw_input(&mut self, key: KeyEvent) {
        self.last_input = self.input.read(key);
        if self.cmd_mode == Some(CMDMode::Filter) && !self.last_input.finished {
            // Filtering is live, every keystroke updates the page.
            let text = self.last_input.input.clone();
            if let Some(page) = self.current_page_mut() {
                if page.grid.state().query() != text {
                    page.grid.set_query(text);
                    page.curser_row = 0;
                }
            }
        }
        if self.last_input.finished {
            self.handle_cmd_input();
        }
    }

    fn handle_cmd_input(&mut self) {
        trace!("Handle cmd input {:?}", self.last_input);
        self.modus = Modus::TABLE;
        self.previous_modus = Modus::CMDINPUT;

        let input = self.last_input.clone();
        match self.cmd_mode.take() {
            Some(CMDMode::Filter) => {
                let query = if input.canceled {
                    String::new()
                } else {
                    input.input
                };
                if let Some(page) = self.current_page_mut() {
                    page.grid.set_query(query);
                    page.curser_row = 0;
                }
                let matches = self.filtered_len();
                self.set_status_message(format!("{matches} matching"));
            }
            Some(CMDMode::GotoPage) if !input.canceled => {
                match input.input.trim().parse::<i64>() {
                    Ok(n) => self.change_page(|g| g.set_page(n - 1)),
                    Err(_) => self.set_status_message(format!("Not a page number: {}", input.input)),
                }
            }
            Some(CMDMode::GotoPage) => {}
            None => info!("Cmd mode is none!"),
        }
        self.input.clear();
    }

    // -------------------- UI data ---------------------- //

    pub fn get_uidata(&self) -> UIData {
        let tabs = PageKind::ALL
            .iter()
            .map(|&kind| match kind.collection() {
                Some(c) => format!("{} ({})", kind.title(), self.count(c)),
                None => kind.title().to_string(),
            })
            .collect();
        let selected_tab = PageKind::ALL
            .iter()
            .position(|&k| k == self.current)
            .unwrap_or(0);

        let cmdinput = match (self.modus, self.cmd_mode) {
            (Modus::CMDINPUT, Some(mode)) => Some((mode, self.last_input.clone())),
            _ => None,
        };

        UIData {
            tabs,
            selected_tab,
            body: self.build_body(),
            popup: self.build_popup(),
            cmdinput,
            status_message: self.visible_status_message(),
        }
    }

    fn build_body(&self) -> Body {
        if self.status == Status::LOADING && self.pages.is_empty() {
            return Body::Loading;
        }
        let Some(page) = self.current_page() else {
            return Body::Overview {
                cards: vec![
                    StatCard {
                        label: "Incidents",
                        value: self.count(Collection::Incidents),
                        shortcut: Some(2),
                    },
                    StatCard {
                        label: "Recommendations",
                        value: self.count(Collection::Insights),
                        shortcut: Some(3),
                    },
                    StatCard {
                        label: "Review Queue",
                        value: self.count(Collection::ReviewQueue),
                        shortcut: Some(4),
                    },
                    StatCard {
                        label: "Findings",
                        value: self.count(Collection::Findings),
                        shortcut: None,
                    },
                ],
                severity: self.severity.clone(),
            };
        };

        let grid = &page.grid;
        let view = grid.view();
        let header = PageHeader {
            title: page.spec.title(),
            subtitle: page.spec.subtitle,
            filtered: view.filtered.len(),
            total: view.total_records(),
            query: grid.state().query().to_string(),
            value_filter: grid.state().value_filter().map(|f| {
                let label = grid
                    .columns()
                    .iter()
                    .find(|c| c.key == f.key)
                    .map_or_else(|| f.key.clone(), |c| c.label.clone());
                (label, f.value.clone())
            }),
        };
        let empty_message = view.empty_state().map(|state| match state {
            EmptyState::NoRecords => page.spec.empty_text,
            EmptyState::NoMatches => page.spec.no_match_text,
        });

        match page.spec.layout {
            Layout::Cards => Body::Cards {
                header,
                cards: view.visible_records().map(InsightCard::from_record).collect(),
                selected: page.curser_row,
                empty_message,
            },
            Layout::Table => {
                let columns = grid
                    .columns()
                    .iter()
                    .enumerate()
                    .map(|(i, c)| HeaderCell {
                        label: c.label.clone(),
                        arrow: grid.sort_indicator(c),
                        sortable: c.sortable,
                        selected: i == page.curser_column,
                    })
                    .collect();
                let rows = view.visible_records().map(|r| grid.cells(r)).collect();
                let pagination = view
                    .showing()
                    .filter(|_| view.total_pages > 1)
                    .map(|(first, last, of)| Pagination {
                        page: view.page + 1,
                        total_pages: view.total_pages,
                        first,
                        last,
                        of,
                    });
                Body::Table {
                    header,
                    columns,
                    rows,
                    selected_row: page.curser_row,
                    empty_message,
                    pagination,
                }
            }
        }
    }

    fn build_popup(&self) -> Option<Popup> {
        match self.modus {
            Modus::POPUP => Some(Popup::Help(HELP_TEXT)),
            Modus::RECORD => {
                let (position, record) = self.selected_record()?;
                let title = format!(
                    "{} {} ({}/{})",
                    self.current.title(),
                    row_key(record, position),
                    position + 1,
                    self.filtered_len()
                );
                if record.is_empty() {
                    return Some(Popup::Record {
                        title,
                        fields: vec![(PLACEHOLDER.to_string(), "empty record".to_string())],
                        selected: 0,
                    });
                }
                let fields = record
                    .fields()
                    .map(|(k, v)| {
                        let value = v.as_text().unwrap_or_else(|| PLACEHOLDER.to_string());
                        (k.clone(), value.replace("\r\n", " ↵ ").replace('\n', " ↵ "))
                    })
                    .collect();
                Some(Popup::Record {
                    title,
                    fields,
                    selected: self.record_view.curser_row,
                })
            }
            Modus::BREAKDOWN => {
                let hist = &self.breakdown_view;
                Some(Popup::Breakdown {
                    title: format!("{} by {}", self.current.title(), hist.column_label),
                    values: hist.values.clone(),
                    total: hist.total,
                    selected: hist.curser_row,
                })
            }
            Modus::TABLE | Modus::CMDINPUT => None,
        }
    }
}
