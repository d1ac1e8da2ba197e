use serde::Serialize;

pub const DEFAULT_CATEGORIES: &[&str] = &[
    "Food",
    "Transport",
    "Entertainment",
    "Shopping",
    "Bills",
    "Healthcare",
    "Education",
    "Other",
];

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
}

/// Whether expense categories are checked against a fixed list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryMode {
    Fixed,
    Free,
}

#[derive(Debug, Clone)]
pub struct CategoryConfig {
    pub mode: CategoryMode,
    pub allowed: Vec<String>,
}

impl CategoryConfig {
    /// Normalizes a user supplied category, or `None` if it is not accepted.
    pub fn resolve(&self, category: &str) -> Option<String> {
        let category = category.trim();
        if category.is_empty() {
            return None;
        }
        match self.mode {
            CategoryMode::Free => Some(category.to_string()),
            CategoryMode::Fixed => self
                .allowed
                .iter()
                .find(|c| c.eq_ignore_ascii_case(category))
                .cloned(),
        }
    }
}

impl Default for CategoryConfig {
    fn default() -> Self {
        Self {
            mode: CategoryMode::Fixed,
            allowed: DEFAULT_CATEGORIES.iter().map(|c| c.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub database_max_connections: u32,
    pub jwt: JwtConfig,
    pub categories: CategoryConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://expense_tracker.db?mode=rwc".into());
        let database_max_connections = std::env::var("DATABASE_MAX_CONNECTIONS")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(5);
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")
                .map_err(|_| anyhow::anyhow!("JWT_SECRET must be set"))?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "expense-tracker".into()),
            audience: std::env::var("JWT_AUDIENCE")
                .unwrap_or_else(|_| "expense-tracker-users".into()),
            ttl_minutes: std::env::var("JWT_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(60),
            refresh_ttl_minutes: std::env::var("JWT_REFRESH_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(60 * 24 * 14),
        };
        let categories = categories_from(
            std::env::var("EXPENSE_CATEGORIES").ok().as_deref(),
            std::env::var("CATEGORY_MODE").ok().as_deref(),
        )?;
        Ok(Self {
            database_url,
            database_max_connections,
            jwt,
            categories,
        })
    }
}

fn categories_from(list: Option<&str>, mode: Option<&str>) -> anyhow::Result<CategoryConfig> {
    let mode = match mode.map(|m| m.trim().to_ascii_lowercase()).as_deref() {
        None | Some("") | Some("fixed") => CategoryMode::Fixed,
        Some("free") => CategoryMode::Free,
        Some(other) => anyhow::bail!("unknown CATEGORY_MODE `{other}`"),
    };
    let allowed: Vec<String> = match list {
        Some(raw) => raw
            .split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect(),
        None => DEFAULT_CATEGORIES.iter().map(|c| c.to_string()).collect(),
    };
    if mode == CategoryMode::Fixed && allowed.is_empty() {
        anyhow::bail!("EXPENSE_CATEGORIES is empty while CATEGORY_MODE is fixed");
    }
    Ok(CategoryConfig { mode, allowed })
}
