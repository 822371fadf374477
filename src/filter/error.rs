use thiserror::Error;

/// Rejected list parameters or identifiers. Surfaces to clients as 400.
#[derive(Error, Debug)]
pub enum FilterError {
    #[error("Invalid table name: {0}")]
    InvalidTableName(String),

    #[error("Invalid column name: {0}")]
    InvalidColumn(String),

    #[error("Invalid order term '{0}', expected '<column> [asc|desc]'")]
    InvalidOrder(String),

    #[error("{entity} has no column '{column}' to order by")]
    UnknownOrderColumn { entity: &'static str, column: String },

    #[error("{field} must be non-negative, got {value}")]
    NegativePaging { field: &'static str, value: i64 },
}
