use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::fetch::normalize::parse_contract_date;
use crate::fetch::{Column, TradeKind, TradeRecord};

const RENTAL_KEYWORDS: &[&str] = &["전세", "월세", "임대", "rent", "lease", "jeonse"];

/// Which transaction category the table shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Category {
    #[default]
    All,
    Sale,
    Rent,
}

impl Category {
    pub fn next(self) -> Self {
        match self {
            Category::All => Category::Sale,
            Category::Sale => Category::Rent,
            Category::Rent => Category::All,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Category::All => "전체",
            Category::Sale => "매매",
            Category::Rent => "전월세",
        }
    }

    fn admits(self, deal_type: &str) -> bool {
        if deal_type.trim().is_empty() {
            return true;
        }
        match self {
            Category::All => true,
            Category::Sale => !is_rental(deal_type),
            Category::Rent => is_rental(deal_type),
        }
    }
}

pub fn is_rental(deal_type: &str) -> bool {
    let lowered = deal_type.to_lowercase();
    RENTAL_KEYWORDS.iter().any(|keyword| lowered.contains(keyword))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl SortOrder {
    pub fn arrow(self) -> &'static str {
        match self {
            SortOrder::Ascending => "▲",
            SortOrder::Descending => "▼",
        }
    }
}

/// Master rows plus the derived, filtered and sorted view of them.
#[derive(Debug, Clone, Default)]
pub struct TradeTable {
    rows: Vec<TradeRecord>,
    columns: Vec<Column>,
    filters: BTreeMap<Column, String>,
    category: Category,
    sort: Option<(Column, SortOrder)>,
    visible: Vec<usize>,
}

impl TradeTable {
    /// Order rows by contract date; equal or unparseable dates keep fetch order.
    pub fn new(mut rows: Vec<TradeRecord>) -> Self {
        rows.sort_by_key(|row| {
            let date = parse_contract_date(row.cell(Column::ContractDate));
            (date.is_none(), date)
        });
        let columns = if rows.iter().any(|row| row.kind() == TradeKind::Rent) {
            Column::ALL.to_vec()
        } else {
            Column::SALE.to_vec()
        };

        let mut table = Self {
            rows,
            columns,
            ..Self::default()
        };
        table.refresh();
        table
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn headers(&self) -> Vec<&'static str> {
        self.columns.iter().map(|c| c.header()).collect()
    }

    pub fn total_len(&self) -> usize {
        self.rows.len()
    }

    pub fn visible_len(&self) -> usize {
        self.visible.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn master(&self) -> &[TradeRecord] {
        &self.rows
    }

    pub fn visible(&self) -> impl Iterator<Item = &TradeRecord> + '_ {
        self.visible.iter().map(move |&index| &self.rows[index])
    }

    pub fn visible_row(&self, position: usize) -> Option<&TradeRecord> {
        self.visible.get(position).map(|&index| &self.rows[index])
    }

    /// The displayed rows projected onto the table's columns.
    pub fn display_rows(&self) -> Vec<Vec<String>> {
        self.visible().map(|row| row.to_row(&self.columns)).collect()
    }

    pub fn filters(&self) -> &BTreeMap<Column, String> {
        &self.filters
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn sort(&self) -> Option<(Column, SortOrder)> {
        self.sort
    }

    /// Set or replace the filter on `column`; blank text clears it.
    pub fn set_filter(&mut self, column: Column, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            self.filters.remove(&column);
        } else {
            self.filters.insert(column, text.to_string());
        }
        self.refresh();
    }

    /// Clear an active filter on `column`, otherwise apply `text`.
    pub fn toggle_filter(&mut self, column: Column, text: &str) {
        if self.filters.remove(&column).is_some() {
            self.refresh();
        } else {
            self.set_filter(column, text);
        }
    }

    pub fn clear_filters(&mut self) {
        self.filters.clear();
        self.refresh();
    }

    pub fn set_category(&mut self, category: Category) {
        self.category = category;
        self.refresh();
    }

    pub fn cycle_category(&mut self) {
        self.set_category(self.category.next());
    }

    /// Sort by `column`; repeating the same column flips the order.
    pub fn sort_by(&mut self, column: Column) {
        let order = match self.sort {
            Some((current, SortOrder::Ascending)) if current == column => SortOrder::Descending,
            _ => SortOrder::Ascending,
        };
        self.sort = Some((column, order));
        self.refresh();
    }

    pub fn clear_sort(&mut self) {
        self.sort = None;
        self.refresh();
    }

    fn refresh(&mut self) {
        let filters: Vec<(Column, String)> = self
            .filters
            .iter()
            .map(|(column, text)| (*column, text.to_lowercase()))
            .collect();
        let category = self.category;

        let mut visible: Vec<usize> = self
            .rows
            .iter()
            .enumerate()
            .filter(|(_, row)| category.admits(row.cell(Column::DealType)))
            .filter(|(_, row)| {
                filters
                    .iter()
                    .all(|(column, text)| row.cell(*column).to_lowercase().contains(text.as_str()))
            })
            .map(|(index, _)| index)
            .collect();

        if let Some((column, order)) = self.sort {
            let rows = &self.rows;
            visible.sort_by(|a, b| {
                compare_cells(column, order, rows[*a].cell(column), rows[*b].cell(column))
            });
        }
        self.visible = visible;
    }
}

fn parse_number(cell: &str) -> Option<f64> {
    let cleaned: String = cell.trim().chars().filter(|c| *c != ',').collect();
    cleaned.parse::<f64>().ok()
}

/// Numeric columns compare parsed numbers with unparseable cells last in
/// either direction; other columns compare text.
fn compare_cells(column: Column, order: SortOrder, a: &str, b: &str) -> Ordering {
    let directed = |ordering: Ordering| match order {
        SortOrder::Ascending => ordering,
        SortOrder::Descending => ordering.reverse(),
    };

    if !column.is_numeric() {
        return directed(a.cmp(b));
    }
    match (parse_number(a), parse_number(b)) {
        (Some(x), Some(y)) => directed(x.partial_cmp(&y).unwrap_or(Ordering::Equal)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => directed(a.cmp(b)),
    }
}
