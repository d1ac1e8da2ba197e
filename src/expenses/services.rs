//! Session-gated access to a user's expenses.
//!
//! Every operation resolves the caller through [`SessionContext::require`]
//! before the repository is touched, then scopes the call to that user.

use std::sync::Arc;

use time::{macros::format_description, Date, Duration};
use tracing::{debug, info, instrument, warn};

use crate::{
    auth::session::SessionContext,
    config::CategoryConfig,
    db::ExpenseId,
    error::AppError,
    expenses::{
        dto::{Dashboard, ExpenseInput, ExpensePatch, ListFilter, MonthlyReport, PeriodQuery},
        repo::ExpenseRepository,
        repo_types::{
            CategoryShare, CategoryTotalRow, Expense, ExpenseChanges, ExpenseQuery, MonthlyTotal,
            NewExpense, Period, Summary,
        },
    },
};

const REPORT_TOP_N: u32 = 5;
const DASHBOARD_DAYS: u32 = 30;

#[derive(Clone)]
pub struct ExpenseService {
    repo: Arc<dyn ExpenseRepository>,
    categories: CategoryConfig,
}

impl ExpenseService {
    pub fn new(repo: Arc<dyn ExpenseRepository>, categories: CategoryConfig) -> Self {
        Self { repo, categories }
    }

    pub fn categories(&self) -> &CategoryConfig {
        &self.categories
    }

    #[instrument(skip(self, ctx, input))]
    pub async fn add(
        &self,
        ctx: &SessionContext,
        input: ExpenseInput,
    ) -> Result<ExpenseId, AppError> {
        let owner = ctx.require()?;
        let expense = NewExpense {
            amount: validate_amount(input.amount)?,
            date: parse_date(&input.date)?,
            category: self.resolve_category(&input.category)?,
            description: normalize_description(input.description),
        };
        let id = self.repo.insert(owner, &expense).await?;
        info!(user_id = %owner, expense_id = %id, "expense added");
        Ok(id)
    }

    /// Rows owned by the caller. No match is an empty vector.
    #[instrument(skip(self, ctx))]
    pub async fn list(
        &self,
        ctx: &SessionContext,
        filter: &ListFilter,
        today: Date,
    ) -> Result<Vec<Expense>, AppError> {
        let owner = ctx.require()?;
        let query = ExpenseQuery {
            category: self.category_filter(filter.category.as_deref()),
            period: list_period(filter, today)?,
            sort: filter.sort,
        };
        let rows = self.repo.list(owner, &query).await?;
        debug!(user_id = %owner, rows = rows.len(), "expenses listed");
        Ok(rows)
    }

    /// Missing rows and rows of other users both report `NotFound`.
    #[instrument(skip(self, ctx))]
    pub async fn delete(&self, ctx: &SessionContext, id: ExpenseId) -> Result<(), AppError> {
        let owner = ctx.require()?;
        if !self.repo.delete(owner, id).await? {
            warn!(user_id = %owner, expense_id = %id, "delete of unknown expense");
            return Err(AppError::NotFound);
        }
        info!(user_id = %owner, expense_id = %id, "expense deleted");
        Ok(())
    }

    #[instrument(skip(self, ctx, patch))]
    pub async fn update(
        &self,
        ctx: &SessionContext,
        id: ExpenseId,
        patch: ExpensePatch,
    ) -> Result<(), AppError> {
        let owner = ctx.require()?;
        let changes = ExpenseChanges {
            amount: patch.amount.map(validate_amount).transpose()?,
            date: patch.date.as_deref().map(parse_date).transpose()?,
            category: patch
                .category
                .as_deref()
                .map(|c| self.resolve_category(c))
                .transpose()?,
            description: patch.description.map(|d| normalize_description(Some(d))),
        };
        if !self.repo.update(owner, id, &changes).await? {
            warn!(user_id = %owner, expense_id = %id, "update of unknown expense");
            return Err(AppError::NotFound);
        }
        info!(user_id = %owner, expense_id = %id, "expense updated");
        Ok(())
    }

    #[instrument(skip(self, ctx))]
    pub async fn summary(&self, ctx: &SessionContext, period: Period) -> Result<Summary, AppError> {
        let owner = ctx.require()?;
        let rows = self.repo.category_totals(owner, period).await?;
        Ok(summarize(rows))
    }

    /// Largest first; ties go to the later date, then the earlier insert.
    #[instrument(skip(self, ctx))]
    pub async fn top_n(
        &self,
        ctx: &SessionContext,
        n: u32,
        period: Period,
    ) -> Result<Vec<Expense>, AppError> {
        let owner = ctx.require()?;
        if n == 0 {
            return Ok(Vec::new());
        }
        Ok(self.repo.top_n(owner, n, period).await?)
    }

    #[instrument(skip(self, ctx))]
    pub async fn monthly_totals(
        &self,
        ctx: &SessionContext,
        period: Period,
    ) -> Result<Vec<MonthlyTotal>, AppError> {
        let owner = ctx.require()?;
        Ok(self.repo.monthly_totals(owner, period).await?)
    }

    #[instrument(skip(self, ctx))]
    pub async fn dashboard(&self, ctx: &SessionContext, today: Date) -> Result<Dashboard, AppError> {
        let owner = ctx.require()?;
        let recent = Period::between(Some(days_back(today, DASHBOARD_DAYS)), None);

        let summary = summarize(self.repo.category_totals(owner, Period::all()).await?);
        let daily = self.repo.daily_totals(owner, recent).await?;
        let monthly = self.repo.monthly_totals(owner, Period::all()).await?;
        let last_30_days_total = daily.iter().map(|d| d.total).sum();

        Ok(Dashboard {
            summary,
            last_30_days_total,
            daily,
            monthly,
        })
    }

    #[instrument(skip(self, ctx))]
    pub async fn monthly_report(
        &self,
        ctx: &SessionContext,
        year: i32,
        month: u8,
    ) -> Result<MonthlyReport, AppError> {
        let owner = ctx.require()?;
        let period = Period::month(year, month)?;
        let query = ExpenseQuery {
            period,
            ..ExpenseQuery::default()
        };

        let expenses = self.repo.list(owner, &query).await?;
        let summary = summarize(self.repo.category_totals(owner, period).await?);
        let top = self.repo.top_n(owner, REPORT_TOP_N, period).await?;

        Ok(MonthlyReport {
            year,
            month,
            period,
            expenses,
            summary,
            top,
        })
    }

    fn resolve_category(&self, category: &str) -> Result<String, AppError> {
        self.categories
            .resolve(category)
            .ok_or_else(|| AppError::InvalidCategory(category.trim().to_string()))
    }

    /// Unknown categories still filter, they just match nothing.
    fn category_filter(&self, category: Option<&str>) -> Option<String> {
        let category = category.map(str::trim).filter(|c| !c.is_empty())?;
        if category.eq_ignore_ascii_case("all") {
            return None;
        }
        Some(
            self.categories
                .resolve(category)
                .unwrap_or_else(|| category.to_string()),
        )
    }
}

pub fn parse_date(raw: &str) -> Result<Date, AppError> {
    Date::parse(raw.trim(), format_description!("[year]-[month]-[day]"))
        .map_err(|_| AppError::InvalidDate(raw.to_string()))
}

/// Resolves `from`/`to` or `year`/`month` into a [`Period`].
pub fn period_from_query(q: &PeriodQuery) -> Result<Period, AppError> {
    match (q.year, q.month) {
        (Some(year), Some(month)) => Period::month(year, month),
        (None, None) => Ok(Period::between(
            q.from.as_deref().map(parse_date).transpose()?,
            q.to.as_deref().map(parse_date).transpose()?,
        )),
        _ => Err(AppError::Validation(
            "year and month must be given together".into(),
        )),
    }
}

fn list_period(filter: &ListFilter, today: Date) -> Result<Period, AppError> {
    let mut from = filter.from.as_deref().map(parse_date).transpose()?;
    let to = filter.to.as_deref().map(parse_date).transpose()?;
    if let Some(days) = filter.days {
        if days == 0 {
            return Err(AppError::Validation("days must be at least 1".into()));
        }
        let cutoff = days_back(today, days);
        from = Some(from.map_or(cutoff, |f| f.max(cutoff)));
    }
    Ok(Period::between(from, to))
}

/// First day of a window of `days` days ending today.
fn days_back(today: Date, days: u32) -> Date {
    today
        .checked_sub(Duration::days(i64::from(days.saturating_sub(1))))
        .unwrap_or(Date::MIN)
}

fn validate_amount(amount: f64) -> Result<f64, AppError> {
    if amount.is_finite() && amount > 0.0 {
        Ok(amount)
    } else {
        Err(AppError::InvalidAmount)
    }
}

fn normalize_description(description: Option<String>) -> Option<String> {
    description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub(crate) fn summarize(rows: Vec<CategoryTotalRow>) -> Summary {
    let total: f64 = rows.iter().map(|r| r.total).sum();
    let count: i64 = rows.iter().map(|r| r.count).sum();
    let average = if count > 0 { total / count as f64 } else { 0.0 };
    let by_category = rows
        .into_iter()
        .map(|r| {
            let percentage = if total > 0.0 {
                round2(r.total / total * 100.0)
            } else {
                0.0
            };
            (
                r.category,
                CategoryShare {
                    total: r.total,
                    count: r.count,
                    percentage,
                },
            )
        })
        .collect();

    Summary {
        total,
        count,
        average,
        by_category,
    }
}
