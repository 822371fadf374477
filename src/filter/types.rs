use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::error::FilterError;
use super::filter_order::FilterOrder;

/// Paging and ordering accepted from list endpoints.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterData {
    pub order: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Normalised paging: validated order, capped limit.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub order: Vec<FilterOrderInfo>,
    pub limit: i64,
    pub offset: i64,
}

impl FilterData {
    pub fn page(&self) -> Result<Page, FilterError> {
        let filter_config = &crate::config::config().filter;

        let limit = self.limit.unwrap_or(filter_config.default_limit);
        if limit < 0 {
            return Err(FilterError::NegativePaging { field: "limit", value: limit });
        }
        let offset = self.offset.unwrap_or(0);
        if offset < 0 {
            return Err(FilterError::NegativePaging { field: "offset", value: offset });
        }

        let max_limit = filter_config.max_limit.unwrap_or(i64::MAX);
        let limit = if limit > max_limit {
            tracing::debug!("Limit {} exceeds max {}, capping to max", limit, max_limit);
            max_limit
        } else {
            limit
        };

        let order = match self.order.as_deref() {
            Some(terms) if !terms.trim().is_empty() => FilterOrder::parse(terms)?,
            _ => FilterOrder::default_order(),
        };

        Ok(Page { order, limit, offset })
    }
}

/// Typed bind parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Uuid(Uuid),
    Bool(bool),
    Int(i64),
    Text(String),
    Json(Value),
}

/// `column = data`, ANDed after the isolation predicate.
#[derive(Debug, Clone)]
pub struct FilterWhereInfo {
    pub column: String,
    pub data: SqlParam,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn to_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterOrderInfo {
    pub column: String,
    pub sort: SortDirection,
}

#[derive(Debug, Clone)]
pub struct SqlResult {
    pub query: String,
    pub params: Vec<SqlParam>,
}
