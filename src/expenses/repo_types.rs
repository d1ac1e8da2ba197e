use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::{Date, Month, OffsetDateTime};

use crate::{
    db::{ExpenseId, UserId},
    error::AppError,
};

/// Expense record in the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Expense {
    pub id: ExpenseId,
    #[serde(skip_serializing)]
    pub user_id: UserId,
    pub date: Date,
    pub category: String,
    pub amount: f64,
    pub description: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Validated values for a new row.
#[derive(Debug, Clone)]
pub struct NewExpense {
    pub date: Date,
    pub category: String,
    pub amount: f64,
    pub description: Option<String>,
}

/// Validated partial update; `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct ExpenseChanges {
    pub date: Option<Date>,
    pub category: Option<String>,
    pub amount: Option<f64>,
    /// `Some(None)` clears the description.
    pub description: Option<Option<String>>,
}

/// Inclusive date bounds; both open by default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Period {
    pub from: Option<Date>,
    pub to: Option<Date>,
}

impl Period {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn between(from: Option<Date>, to: Option<Date>) -> Self {
        Self { from, to }
    }

    /// First through last day of a calendar month.
    pub fn month(year: i32, month: u8) -> Result<Self, AppError> {
        let invalid = || AppError::InvalidDate(format!("{year}-{month:02}"));
        let m = Month::try_from(month).map_err(|_| invalid())?;
        let first = Date::from_calendar_date(year, m, 1).map_err(|_| invalid())?;
        let last = Date::from_calendar_date(year, m, m.length(year)).map_err(|_| invalid())?;
        Ok(Self {
            from: Some(first),
            to: Some(last),
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    DateDesc,
    DateAsc,
    AmountDesc,
    AmountAsc,
}

impl SortOrder {
    pub(crate) fn order_by(self) -> &'static str {
        match self {
            SortOrder::DateDesc => "date DESC, id DESC",
            SortOrder::DateAsc => "date ASC, id ASC",
            SortOrder::AmountDesc => "amount DESC, date DESC, id ASC",
            SortOrder::AmountAsc => "amount ASC, date DESC, id ASC",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ExpenseQuery {
    pub category: Option<String>,
    pub period: Period,
    pub sort: SortOrder,
}

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct CategoryTotalRow {
    pub category: String,
    pub total: f64,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryShare {
    pub total: f64,
    pub count: i64,
    /// Share of the grand total, in percent with two decimals.
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub total: f64,
    pub count: i64,
    pub average: f64,
    pub by_category: BTreeMap<String, CategoryShare>,
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct MonthlyTotal {
    pub month: String, // YYYY-MM
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct DailyTotal {
    pub date: Date,
    pub total: f64,
}
