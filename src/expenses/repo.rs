//! Storage for expenses. Every statement filters on the owning user.

use anyhow::Context;
use axum::async_trait;
use sqlx::SqlitePool;
use time::OffsetDateTime;

use crate::{
    db::{ExpenseId, UserId},
    expenses::repo_types::{
        CategoryTotalRow, DailyTotal, Expense, ExpenseChanges, ExpenseQuery, MonthlyTotal,
        NewExpense, Period,
    },
};

#[async_trait]
pub trait ExpenseRepository: Send + Sync {
    async fn insert(&self, owner: UserId, expense: &NewExpense) -> anyhow::Result<ExpenseId>;
    async fn list(&self, owner: UserId, query: &ExpenseQuery) -> anyhow::Result<Vec<Expense>>;
    /// Returns `false` when no row with that id belongs to `owner`.
    async fn delete(&self, owner: UserId, id: ExpenseId) -> anyhow::Result<bool>;
    /// Returns `false` when no row with that id belongs to `owner`.
    async fn update(
        &self,
        owner: UserId,
        id: ExpenseId,
        changes: &ExpenseChanges,
    ) -> anyhow::Result<bool>;
    async fn category_totals(
        &self,
        owner: UserId,
        period: Period,
    ) -> anyhow::Result<Vec<CategoryTotalRow>>;
    async fn top_n(&self, owner: UserId, n: u32, period: Period) -> anyhow::Result<Vec<Expense>>;
    async fn monthly_totals(&self, owner: UserId, period: Period)
        -> anyhow::Result<Vec<MonthlyTotal>>;
    async fn daily_totals(&self, owner: UserId, period: Period) -> anyhow::Result<Vec<DailyTotal>>;
}

#[derive(Clone)]
pub struct SqlExpenseRepository {
    db: SqlitePool,
}

impl SqlExpenseRepository {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ExpenseRepository for SqlExpenseRepository {
    async fn insert(&self, owner: UserId, expense: &NewExpense) -> anyhow::Result<ExpenseId> {
        let result = sqlx::query(
            r#"
            INSERT INTO expenses (user_id, date, category, amount, description, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(owner)
        .bind(expense.date)
        .bind(&expense.category)
        .bind(expense.amount)
        .bind(&expense.description)
        .bind(OffsetDateTime::now_utc())
        .execute(&self.db)
        .await
        .context("insert expense")?;
        Ok(ExpenseId(result.last_insert_rowid()))
    }

    async fn list(&self, owner: UserId, query: &ExpenseQuery) -> anyhow::Result<Vec<Expense>> {
        let sql = format!(
            r#"
            SELECT id, user_id, date, category, amount, description, created_at
            FROM expenses
            WHERE user_id = ?
              AND (? IS NULL OR category = ?)
              AND (? IS NULL OR date >= ?)
              AND (? IS NULL OR date <= ?)
            ORDER BY {}
            "#,
            query.sort.order_by()
        );
        let rows = sqlx::query_as::<_, Expense>(&sql)
            .bind(owner)
            .bind(query.category.as_deref())
            .bind(query.category.as_deref())
            .bind(query.period.from)
            .bind(query.period.from)
            .bind(query.period.to)
            .bind(query.period.to)
            .fetch_all(&self.db)
            .await
            .context("list expenses")?;
        Ok(rows)
    }

    async fn delete(&self, owner: UserId, id: ExpenseId) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM expenses WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(owner)
            .execute(&self.db)
            .await
            .context("delete expense")?;
        Ok(result.rows_affected() > 0)
    }

    async fn update(
        &self,
        owner: UserId,
        id: ExpenseId,
        changes: &ExpenseChanges,
    ) -> anyhow::Result<bool> {
        let description = changes.description.clone().flatten();
        let result = sqlx::query(
            r#"
            UPDATE expenses
               SET date        = COALESCE(?, date),
                   category    = COALESCE(?, category),
                   amount      = COALESCE(?, amount),
                   description = CASE WHEN ? THEN ? ELSE description END
             WHERE id = ? AND user_id = ?
            "#,
        )
        .bind(changes.date)
        .bind(changes.category.as_deref())
        .bind(changes.amount)
        .bind(changes.description.is_some())
        .bind(description)
        .bind(id)
        .bind(owner)
        .execute(&self.db)
        .await
        .context("update expense")?;
        Ok(result.rows_affected() > 0)
    }

    async fn category_totals(
        &self,
        owner: UserId,
        period: Period,
    ) -> anyhow::Result<Vec<CategoryTotalRow>> {
        let rows = sqlx::query_as::<_, CategoryTotalRow>(
            r#"
            SELECT category, SUM(amount) AS total, COUNT(*) AS count
            FROM expenses
            WHERE user_id = ?
              AND (? IS NULL OR date >= ?)
              AND (? IS NULL OR date <= ?)
            GROUP BY category
            ORDER BY total DESC, category ASC
            "#,
        )
        .bind(owner)
        .bind(period.from)
        .bind(period.from)
        .bind(period.to)
        .bind(period.to)
        .fetch_all(&self.db)
        .await
        .context("aggregate expenses by category")?;
        Ok(rows)
    }

    async fn top_n(&self, owner: UserId, n: u32, period: Period) -> anyhow::Result<Vec<Expense>> {
        let rows = sqlx::query_as::<_, Expense>(
            r#"
            SELECT id, user_id, date, category, amount, description, created_at
            FROM expenses
            WHERE user_id = ?
              AND (? IS NULL OR date >= ?)
              AND (? IS NULL OR date <= ?)
            ORDER BY amount DESC, date DESC, id ASC
            LIMIT ?
            "#,
        )
        .bind(owner)
        .bind(period.from)
        .bind(period.from)
        .bind(period.to)
        .bind(period.to)
        .bind(i64::from(n))
        .fetch_all(&self.db)
        .await
        .context("top expenses")?;
        Ok(rows)
    }

    async fn monthly_totals(
        &self,
        owner: UserId,
        period: Period,
    ) -> anyhow::Result<Vec<MonthlyTotal>> {
        let rows = sqlx::query_as::<_, MonthlyTotal>(
            r#"
            SELECT substr(date, 1, 7) AS month, SUM(amount) AS total
            FROM expenses
            WHERE user_id = ?
              AND (? IS NULL OR date >= ?)
              AND (? IS NULL OR date <= ?)
            GROUP BY month
            ORDER BY month ASC
            "#,
        )
        .bind(owner)
        .bind(period.from)
        .bind(period.from)
        .bind(period.to)
        .bind(period.to)
        .fetch_all(&self.db)
        .await
        .context("monthly totals")?;
        Ok(rows)
    }

    async fn daily_totals(&self, owner: UserId, period: Period) -> anyhow::Result<Vec<DailyTotal>> {
        let rows = sqlx::query_as::<_, DailyTotal>(
            r#"
            SELECT date, SUM(amount) AS total
            FROM expenses
            WHERE user_id = ?
              AND (? IS NULL OR date >= ?)
              AND (? IS NULL OR date <= ?)
            GROUP BY date
            ORDER BY date ASC
            "#,
        )
        .bind(owner)
        .bind(period.from)
        .bind(period.from)
        .bind(period.to)
        .bind(period.to)
        .fetch_all(&self.db)
        .await
        .context("daily totals")?;
        Ok(rows)
    }
}
