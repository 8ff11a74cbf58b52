use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Flex, Layout, Rect},
    style::{Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{
        Bar, BarChart, BarGroup, Block, BorderType, Borders, Cell as TableCell, Clear, List,
        ListItem, ListState, Paragraph, Row, Table, TableState, Tabs, Wrap,
    },
};

use crate::domain::CMDMode;
use crate::grid::{BadgeVariant, Cell};
use crate::model::{Body, HeaderCell, PageHeader, Pagination, Popup, StatCard, UIData};
use crate::pages::{InsightCard, severity_variant};

const APP_TITLE: &str = " Panic! At The Syslog ";
const MAX_COLUMN_WIDTH: usize = 48;

mod colors {
    use ratatui::style::Color;

    pub const RED: Color = Color::Rgb(220, 50, 47);
    pub const WHITE: Color = Color::Rgb(253, 246, 227);
    pub const SILVER: Color = Color::Rgb(147, 161, 161);
    pub const GOLD: Color = Color::Rgb(255, 193, 37);
    pub const SUCCESS: Color = Color::Rgb(133, 153, 0);
    pub const INFO: Color = Color::Rgb(38, 139, 210);
    pub const SELECTED: Color = Color::Rgb(7, 54, 66);
}

fn badge_style(variant: BadgeVariant) -> Style {
    let color = match variant {
        BadgeVariant::Neutral => colors::SILVER,
        BadgeVariant::Success => colors::SUCCESS,
        BadgeVariant::Warning => colors::GOLD,
        BadgeVariant::Error => colors::RED,
        BadgeVariant::Info => colors::INFO,
    };
    Style::default().fg(color).bold()
}

fn popup_area(area: Rect, percent_x: u16, percent_y: u16) -> Rect {
    let [area] = Layout::vertical([Constraint::Percentage(percent_y)])
        .flex(Flex::Center)
        .areas(area);
    let [area] = Layout::horizontal([Constraint::Percentage(percent_x)])
        .flex(Flex::Center)
        .areas(area);
    area
}

#[derive(Default)]
pub struct DashboardUI {
    table_state: TableState,
    list_state: ListState,
    popup_state: TableState,
}

impl DashboardUI {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn draw(&mut self, data: &UIData, frame: &mut Frame) {
        let [tabs_area, body_area, status_area] = Layout::vertical([
            Constraint::Length(3),
            Constraint::Min(3),
            Constraint::Length(1),
        ])
        .areas(frame.area());

        self.draw_tabs(data, frame, tabs_area);
        match &data.body {
            Body::Loading => {
                let p = Paragraph::new("Loading ...")
                    .alignment(Alignment::Center)
                    .fg(colors::SILVER);
                frame.render_widget(p, body_area);
            }
            Body::Overview { cards, severity } => {
                Self::draw_overview(cards, severity, frame, body_area)
            }
            Body::Table {
                header,
                columns,
                rows,
                selected_row,
                empty_message,
                pagination,
            } => {
                let area = Self::draw_page_header(header, frame, body_area);
                self.draw_table(
                    columns,
                    rows,
                    *selected_row,
                    *empty_message,
                    pagination.as_ref(),
                    frame,
                    area,
                );
            }
            Body::Cards {
                header,
                cards,
                selected,
                empty_message,
            } => {
                let area = Self::draw_page_header(header, frame, body_area);
                self.draw_cards(cards, *selected, *empty_message, frame, area);
            }
        }

        if let Some(popup) = &data.popup {
            self.draw_popup(popup, frame, body_area);
        }
        Self::draw_status_line(data, frame, status_area);
    }

    fn draw_tabs(&self, data: &UIData, frame: &mut Frame, area: Rect) {
        let tabs = Tabs::new(data.tabs.clone())
            .select(data.selected_tab)
            .style(Style::default().fg(colors::SILVER))
            .highlight_style(Style::default().fg(colors::GOLD).bold())
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_type(BorderType::Rounded)
                    .border_style(Style::default().fg(colors::RED))
                    .title(Line::from(APP_TITLE.fg(colors::WHITE).bold())),
            );
        frame.render_widget(tabs, area);
    }

    fn draw_overview(cards: &[StatCard], severity: &[(String, usize)], frame: &mut Frame, area: Rect) {
        let [cards_area, chart_area] =
            Layout::vertical([Constraint::Length(5), Constraint::Min(3)]).areas(area);

        let boxes = Layout::horizontal(vec![Constraint::Ratio(1, cards.len().max(1) as u32); cards.len()])
            .split(cards_area);
        for (card, rect) in cards.iter().zip(boxes.iter()) {
            Self::draw_stat_box(card, frame, *rect);
        }

        let block = Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(colors::SILVER))
            .title(" Incidents by severity ");
        if severity.is_empty() {
            let p = Paragraph::new("No incidents found. The system is quiet.")
                .alignment(Alignment::Center)
                .fg(colors::SILVER)
                .block(block);
            frame.render_widget(p, chart_area);
            return;
        }
        let bars: Vec<Bar> = severity
            .iter()
            .map(|(value, count)| {
                Bar::default()
                    .value(*count as u64)
                    .label(Line::from(value.clone()))
                    .style(badge_style(severity_variant(Some(value))))
            })
            .collect();
        let chart = BarChart::default()
            .block(block)
            .bar_width(9)
            .bar_gap(2)
            .data(BarGroup::default().bars(&bars));
        frame.render_widget(chart, chart_area);
    }

    fn draw_stat_box(card: &StatCard, frame: &mut Frame, area: Rect) {
        let mut block = Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(colors::SILVER));
        if let Some(key) = card.shortcut {
            block = block.title_bottom(Line::from(format!(" [{key}] ")).right_aligned());
        }
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let text = vec![
            Line::from(Span::styled(
                card.label,
                Style::default().fg(colors::SILVER).add_modifier(Modifier::DIM),
            )),
            Line::from(Span::styled(
                card.value.to_string(),
                Style::default().fg(colors::GOLD).bold(),
            )),
        ];
        frame.render_widget(Paragraph::new(text).alignment(Alignment::Center), inner);
    }

    /// Title, subtitle and active filter; returns the remaining area.
    fn draw_page_header(header: &PageHeader, frame: &mut Frame, area: Rect) -> Rect {
        let filtering = !header.query.is_empty() || header.value_filter.is_some();
        let filter_height = if filtering { 1 } else { 0 };
        let [title_area, filter_area, rest] = Layout::vertical([
            Constraint::Length(2),
            Constraint::Length(filter_height),
            Constraint::Min(1),
        ])
        .areas(area);

        let title = Text::from(vec![
            Line::from(vec![
                Span::styled(header.title, Style::default().fg(colors::WHITE).bold()),
                Span::styled(
                    format!("  {} of {} shown", header.filtered, header.total),
                    Style::default().fg(colors::SILVER),
                ),
            ]),
            Line::from(Span::styled(
                header.subtitle,
                Style::default().fg(colors::SILVER).add_modifier(Modifier::ITALIC),
            )),
        ]);
        frame.render_widget(Paragraph::new(title), title_area);

        if filtering {
            let mut spans = Vec::new();
            if !header.query.is_empty() {
                spans.push(Span::styled("Filter: ", Style::default().fg(colors::SILVER)));
                spans.push(Span::styled(header.query.clone(), Style::default().fg(colors::GOLD)));
                spans.push(Span::raw("  "));
            }
            if let Some((label, value)) = &header.value_filter {
                spans.push(Span::styled(format!("Where {label} = "), Style::default().fg(colors::SILVER)));
                spans.push(Span::styled(value.clone(), Style::default().fg(colors::GOLD)));
                spans.push(Span::raw("  "));
            }
            spans.push(Span::styled("(x to clear)", Style::default().fg(colors::SILVER).dim()));
            frame.render_widget(Paragraph::new(Line::from(spans)), filter_area);
        }
        rest
    }

    fn draw_empty(message: &str, frame: &mut Frame, area: Rect) {
        let p = Paragraph::new(message)
            .alignment(Alignment::Center)
            .fg(colors::SILVER)
            .block(Block::default().borders(Borders::TOP));
        frame.render_widget(p, area);
    }

    fn column_widths(columns: &[HeaderCell], rows: &[Vec<Cell>]) -> Vec<Constraint> {
        let widths: Vec<usize> = columns
            .iter()
            .enumerate()
            .map(|(i, c)| {
                let content = rows
                    .iter()
                    .filter_map(|r| r.get(i))
                    .map(|cell| cell.text().chars().count())
                    .max()
                    .unwrap_or(0);
                (c.label.chars().count() + 2).max(content).min(MAX_COLUMN_WIDTH)
            })
            .collect();
        let widest = widths
            .iter()
            .enumerate()
            .max_by_key(|(_, w)| **w)
            .map(|(i, _)| i);
        widths
            .iter()
            .enumerate()
            .map(|(i, w)| match Some(i) == widest {
                true => Constraint::Fill(1),
                false => Constraint::Length(*w as u16),
            })
            .collect()
    }

    #[allow(clippy::too_many_arguments)]
    fn draw_table(
        &mut self,
        columns: &[HeaderCell],
        rows: &[Vec<Cell>],
        selected_row: usize,
        empty_message: Option<&str>,
        pagination: Option<&Pagination>,
        frame: &mut Frame,
        area: Rect,
    ) {
        let footer_height = if pagination.is_some() { 1 } else { 0 };
        let [table_area, footer_area] =
            Layout::vertical([Constraint::Min(1), Constraint::Length(footer_height)]).areas(area);

        let header = Row::new(columns.iter().map(|c| {
            let mut label = c.label.clone();
            if let Some(arrow) = c.arrow {
                label = format!("{label} {arrow}");
            }
            let mut style = Style::default().fg(colors::WHITE).bold();
            if !c.sortable {
                style = style.fg(colors::SILVER);
            }
            if c.selected {
                style = style.add_modifier(Modifier::UNDERLINED);
            }
            TableCell::from(label).style(style)
        }))
        .height(1);

        if let Some(message) = empty_message {
            let [header_area, message_area] =
                Layout::vertical([Constraint::Length(1), Constraint::Min(1)]).areas(table_area);
            let table = Table::new(Vec::<Row>::new(), Self::column_widths(columns, rows))
                .header(header);
            frame.render_widget(table, header_area);
            Self::draw_empty(message, frame, message_area);
            return;
        }

        let table_rows = rows.iter().map(|cells| {
            Row::new(cells.iter().map(|cell| match cell {
                Cell::Text(s) => TableCell::from(s.clone()),
                Cell::Badge(s, variant) => TableCell::from(s.clone()).style(badge_style(*variant)),
            }))
        });
        let table = Table::new(table_rows, Self::column_widths(columns, rows))
            .header(header)
            .column_spacing(2)
            .row_highlight_style(Style::default().bg(colors::SELECTED).bold());
        self.table_state.select(Some(selected_row));
        frame.render_stateful_widget(table, table_area, &mut self.table_state);

        if let Some(p) = pagination {
            let footer = Line::from(vec![
                Span::styled(
                    format!("Showing {}–{} of {}", p.first, p.last, p.of),
                    Style::default().fg(colors::SILVER),
                ),
                Span::raw("  ·  "),
                Span::styled(
                    format!("Page {}/{}", p.page, p.total_pages),
                    Style::default().fg(colors::GOLD),
                ),
                Span::styled("  n/p to page", Style::default().fg(colors::SILVER).dim()),
            ]);
            frame.render_widget(Paragraph::new(footer), footer_area);
        }
    }

    fn draw_cards(
        &mut self,
        cards: &[InsightCard],
        selected: usize,
        empty_message: Option<&str>,
        frame: &mut Frame,
        area: Rect,
    ) {
        if let Some(message) = empty_message {
            Self::draw_empty(message, frame, area);
            return;
        }
        let items: Vec<ListItem> = cards
            .iter()
            .map(|card| {
                let mut heading = vec![Span::styled(
                    card.heading.clone(),
                    Style::default().fg(colors::WHITE).bold(),
                )];
                if let Some(kind) = &card.kind {
                    heading.push(Span::raw("  "));
                    heading.push(Span::styled(kind.clone(), badge_style(BadgeVariant::Info)));
                }
                let mut lines = vec![Line::from(heading)];
                lines.extend(card.lines.iter().map(|l| {
                    Line::from(Span::styled(format!("  {l}"), Style::default().fg(colors::SILVER)))
                }));
                lines.push(Line::from(""));
                ListItem::new(lines)
            })
            .collect();
        let list = List::new(items)
            .block(Block::default().borders(Borders::TOP))
            .highlight_symbol("▌ ")
            .highlight_style(Style::default().bg(colors::SELECTED));
        self.list_state.select(Some(selected));
        frame.render_stateful_widget(list, area, &mut self.list_state);
    }

    fn draw_popup(&mut self, popup: &Popup, frame: &mut Frame, area: Rect) {
        let block = Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(colors::GOLD));
        match popup {
            Popup::Help(text) => {
                let area = popup_area(area, 60, 90);
                frame.render_widget(Clear, area);
                let p = Paragraph::new(*text)
                    .wrap(Wrap { trim: false })
                    .block(block.title(" Help (Esc to close) "));
                frame.render_widget(p, area);
            }
            Popup::Record {
                title,
                fields,
                selected,
            } => {
                let area = popup_area(area, 80, 80);
                frame.render_widget(Clear, area);
                let key_width = fields
                    .iter()
                    .map(|(k, _)| k.chars().count())
                    .max()
                    .unwrap_or(0) as u16;
                let rows = fields.iter().map(|(k, v)| {
                    Row::new(vec![
                        TableCell::from(k.clone()).style(Style::default().fg(colors::SILVER)),
                        TableCell::from(v.clone()),
                    ])
                });
                let table = Table::new(rows, [Constraint::Length(key_width), Constraint::Fill(1)])
                    .column_spacing(2)
                    .row_highlight_style(Style::default().bg(colors::SELECTED))
                    .block(
                        block
                            .title(format!(" {title} "))
                            .title_bottom(Line::from(" ←/→ record  y copy  Esc close ").right_aligned()),
                    );
                self.popup_state.select(Some(*selected));
                frame.render_stateful_widget(table, area, &mut self.popup_state);
            }
            Popup::Breakdown {
                title,
                values,
                total,
                selected,
            } => {
                let area = popup_area(area, 60, 80);
                frame.render_widget(Clear, area);
                let rows = values.iter().map(|(value, count)| {
                    let share = match *total {
                        0 => 0.0,
                        t => *count as f64 * 100.0 / t as f64,
                    };
                    Row::new(vec![
                        TableCell::from(value.clone()),
                        TableCell::from(count.to_string()).style(Style::default().fg(colors::GOLD)),
                        TableCell::from(format!("{share:.1}%")),
                    ])
                });
                let table = Table::new(
                    rows,
                    [Constraint::Fill(1), Constraint::Length(8), Constraint::Length(7)],
                )
                .header(Row::new(vec!["Value", "Count", "Share"]).bold())
                .row_highlight_style(Style::default().bg(colors::SELECTED))
                .block(
                    block
                        .title(format!(" {title} "))
                        .title_bottom(Line::from(" Enter filter  Esc close ").right_aligned()),
                );
                self.popup_state.select(Some(*selected));
                frame.render_stateful_widget(table, area, &mut self.popup_state);
            }
        }
    }

    fn draw_status_line(data: &UIData, frame: &mut Frame, area: Rect) {
        match &data.cmdinput {
            Some((mode, input)) => {
                let prompt = match mode {
                    CMDMode::Filter => "/",
                    CMDMode::GotoPage => "Page: ",
                };
                let line = Line::from(vec![
                    Span::styled(prompt, Style::default().fg(colors::GOLD)),
                    Span::raw(input.input.clone()),
                ]);
                frame.render_widget(Paragraph::new(line), area);
                let x = area.x + (prompt.chars().count() + input.curser_pos) as u16;
                frame.set_cursor_position((x.min(area.right().saturating_sub(1)), area.y));
            }
            None => {
                let line = Line::from(vec![
                    Span::styled(data.status_message.clone(), Style::default().fg(colors::SILVER)),
                ]);
                let help = Line::from(Span::styled("? help  q quit", Style::default().fg(colors::SILVER).dim()))
                    .right_aligned();
                let [message_area, help_area] =
                    Layout::horizontal([Constraint::Fill(1), Constraint::Length(16)]).areas(area);
                frame.render_widget(Paragraph::new(line), message_area);
                frame.render_widget(Paragraph::new(help), help_area);
            }
        }
    }
}
