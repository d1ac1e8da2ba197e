use serde::{Deserialize, Serialize};

use crate::{
    db::ExpenseId,
    expenses::repo_types::{DailyTotal, Expense, MonthlyTotal, Period, SortOrder, Summary},
};

/// Body of `POST /expenses`. Dates are `YYYY-MM-DD`.
#[derive(Debug, Clone, Deserialize)]
pub struct ExpenseInput {
    pub date: String,
    pub category: String,
    pub amount: f64,
    #[serde(default)]
    pub description: Option<String>,
}

/// Body of `PATCH /expenses/:id`. Absent fields stay as they are.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExpensePatch {
    pub date: Option<String>,
    pub category: Option<String>,
    pub amount: Option<f64>,
    /// An empty string clears the description.
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListFilter {
    pub category: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    /// Only the last `days` days, today included.
    pub days: Option<u32>,
    #[serde(default)]
    pub sort: SortOrder,
}

/// `from`/`to`, or a calendar month via `year` + `month`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PeriodQuery {
    pub from: Option<String>,
    pub to: Option<String>,
    pub year: Option<i32>,
    pub month: Option<u8>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TopQuery {
    #[serde(default = "default_top")]
    pub n: u32,
    pub from: Option<String>,
    pub to: Option<String>,
}

fn default_top() -> u32 {
    5
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReportQuery {
    pub year: i32,
    pub month: u8,
}

#[derive(Debug, Serialize)]
pub struct CreatedExpenseResponse {
    pub id: ExpenseId,
}

#[derive(Debug, Serialize)]
pub struct Dashboard {
    pub summary: Summary,
    pub last_30_days_total: f64,
    pub daily: Vec<DailyTotal>,
    pub monthly: Vec<MonthlyTotal>,
}

/// Everything an export needs for one calendar month.
#[derive(Debug, Serialize)]
pub struct MonthlyReport {
    pub year: i32,
    pub month: u8,
    pub period: Period,
    pub expenses: Vec<Expense>,
    pub summary: Summary,
    pub top: Vec<Expense>,
}

#[derive(Debug, Serialize)]
pub struct CategoriesResponse {
    pub mode: crate::config::CategoryMode,
    pub categories: Vec<String>,
}
