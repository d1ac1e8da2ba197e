use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    routing::{get, patch},
    Json, Router,
};
use time::{Date, OffsetDateTime};
use tracing::instrument;

use crate::{
    auth::extractors::CurrentSession,
    db::ExpenseId,
    error::AppError,
    expenses::{
        dto::{
            CategoriesResponse, CreatedExpenseResponse, Dashboard, ExpenseInput, ExpensePatch,
            ListFilter, MonthlyReport, PeriodQuery, ReportQuery, TopQuery,
        },
        repo_types::{Expense, MonthlyTotal, Period, Summary},
        services::{parse_date, period_from_query},
    },
    state::AppState,
};

// --- public routers ---

pub fn expense_routes() -> Router<AppState> {
    Router::new()
        .route("/expenses", get(list_expenses).post(add_expense))
        .route("/expenses/summary", get(summary))
        .route("/expenses/top", get(top_expenses))
        .route("/expenses/monthly", get(monthly_totals))
        .route("/expenses/:id", patch(update_expense).delete(delete_expense))
}

pub fn report_routes() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(dashboard))
        .route("/reports/monthly", get(monthly_report))
        .route("/categories", get(categories))
}

// --- handlers ---
//
// Each handler checks the session before it reads the query or body.

#[instrument(skip_all)]
pub async fn add_expense(
    State(state): State<AppState>,
    session: CurrentSession,
    input: Result<Json<ExpenseInput>, JsonRejection>,
) -> Result<(StatusCode, Json<CreatedExpenseResponse>), AppError> {
    session.context.require()?;
    let Json(input) = input?;
    let id = state.expenses.add(&session.context, input).await?;
    Ok((StatusCode::CREATED, Json(CreatedExpenseResponse { id })))
}

#[instrument(skip_all)]
pub async fn list_expenses(
    State(state): State<AppState>,
    session: CurrentSession,
    filter: Result<Query<ListFilter>, QueryRejection>,
) -> Result<Json<Vec<Expense>>, AppError> {
    session.context.require()?;
    let Query(filter) = filter?;
    let rows = state
        .expenses
        .list(&session.context, &filter, today())
        .await?;
    Ok(Json(rows))
}

#[instrument(skip_all)]
pub async fn update_expense(
    State(state): State<AppState>,
    session: CurrentSession,
    id: Result<Path<i64>, PathRejection>,
    body: Result<Json<ExpensePatch>, JsonRejection>,
) -> Result<StatusCode, AppError> {
    session.context.require()?;
    let Path(id) = id?;
    let Json(body) = body?;
    state
        .expenses
        .update(&session.context, ExpenseId(id), body)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip_all)]
pub async fn delete_expense(
    State(state): State<AppState>,
    session: CurrentSession,
    id: Result<Path<i64>, PathRejection>,
) -> Result<StatusCode, AppError> {
    session.context.require()?;
    let Path(id) = id?;
    state.expenses.delete(&session.context, ExpenseId(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip_all)]
pub async fn summary(
    State(state): State<AppState>,
    session: CurrentSession,
    q: Result<Query<PeriodQuery>, QueryRejection>,
) -> Result<Json<Summary>, AppError> {
    session.context.require()?;
    let Query(q) = q?;
    let period = period_from_query(&q)?;
    Ok(Json(state.expenses.summary(&session.context, period).await?))
}

#[instrument(skip_all)]
pub async fn top_expenses(
    State(state): State<AppState>,
    session: CurrentSession,
    q: Result<Query<TopQuery>, QueryRejection>,
) -> Result<Json<Vec<Expense>>, AppError> {
    session.context.require()?;
    let Query(q) = q?;
    let period = Period::between(
        q.from.as_deref().map(parse_date).transpose()?,
        q.to.as_deref().map(parse_date).transpose()?,
    );
    Ok(Json(state.expenses.top_n(&session.context, q.n, period).await?))
}

#[instrument(skip_all)]
pub async fn monthly_totals(
    State(state): State<AppState>,
    session: CurrentSession,
    q: Result<Query<PeriodQuery>, QueryRejection>,
) -> Result<Json<Vec<MonthlyTotal>>, AppError> {
    session.context.require()?;
    let Query(q) = q?;
    let period = period_from_query(&q)?;
    Ok(Json(
        state.expenses.monthly_totals(&session.context, period).await?,
    ))
}

#[instrument(skip_all)]
pub async fn dashboard(
    State(state): State<AppState>,
    session: CurrentSession,
) -> Result<Json<Dashboard>, AppError> {
    Ok(Json(state.expenses.dashboard(&session.context, today()).await?))
}

#[instrument(skip_all)]
pub async fn monthly_report(
    State(state): State<AppState>,
    session: CurrentSession,
    q: Result<Query<ReportQuery>, QueryRejection>,
) -> Result<Json<MonthlyReport>, AppError> {
    session.context.require()?;
    let Query(q) = q?;
    let report = state
        .expenses
        .monthly_report(&session.context, q.year, q.month)
        .await?;
    Ok(Json(report))
}

/// Public: the signup and add-expense forms need the list before login.
pub async fn categories(State(state): State<AppState>) -> Json<CategoriesResponse> {
    let cfg = state.expenses.categories();
    Json(CategoriesResponse {
        mode: cfg.mode,
        categories: cfg.allowed.clone(),
    })
}

fn today() -> Date {
    OffsetDateTime::now_utc().date()
}
