use super::error::FilterError;
use super::filter_order::FilterOrder;
use super::filter_where::FilterWhere;
use super::types::{FilterData, FilterOrderInfo, FilterWhereInfo, SqlParam, SqlResult};
use crate::database::IsolationPredicate;

/// SQL generator for one scoped table. Every statement it produces carries the
/// isolation predicate in its WHERE clause.
pub struct Filter {
    table_name: String,
    predicate: IsolationPredicate,
    conditions: Vec<FilterWhereInfo>,
    order_data: Vec<FilterOrderInfo>,
    limit: Option<i64>,
    offset: Option<i64>,
}

impl Filter {
    pub fn new(table_name: impl Into<String>, predicate: IsolationPredicate) -> Result<Self, FilterError> {
        let table_name = table_name.into();
        Self::validate_identifier(&table_name)
            .map_err(|_| FilterError::InvalidTableName(format!("Invalid table name format: {}", table_name)))?;
        Ok(Self {
            table_name,
            predicate,
            conditions: vec![],
            order_data: vec![],
            limit: None,
            offset: None,
        })
    }

    pub fn assign(&mut self, data: &FilterData) -> Result<&mut Self, FilterError> {
        let page = data.page()?;
        self.order_data = page.order;
        self.limit = Some(page.limit);
        self.offset = Some(page.offset);
        Ok(self)
    }

    pub fn where_eq(&mut self, column: &str, data: SqlParam) -> Result<&mut Self, FilterError> {
        Self::validate_identifier(column)?;
        self.conditions.push(FilterWhereInfo {
            column: column.to_string(),
            data,
        });
        Ok(self)
    }

    /// `SELECT to_jsonb(t) AS row ...` with ordering and paging.
    pub fn to_sql(&self) -> SqlResult {
        let (where_clause, params) = FilterWhere::generate(&self.predicate, &self.conditions, 0);
        let order_clause = FilterOrder::generate(&self.order_data);
        let limit_clause = self.build_limit_clause();

        let query = [
            "SELECT to_jsonb(t) AS row".to_string(),
            format!("FROM \"{}\" AS t", self.table_name),
            format!("WHERE {}", where_clause),
            order_clause,
            limit_clause,
        ]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

        SqlResult { query, params }
    }

    /// Flag matching rows deleted instead of removing them.
    pub fn to_soft_delete_sql(&self) -> SqlResult {
        let (where_clause, params) = FilterWhere::generate(&self.predicate, &self.conditions, 0);
        let query = format!(
            "UPDATE \"{}\" SET \"is_deleted\" = true, \"updated_at\" = now() WHERE {}",
            self.table_name, where_clause
        );
        SqlResult { query, params }
    }

    /// Overwrite `columns` of matching rows from the JSON document bound as `$1`.
    pub fn to_replace_sql(&self, columns: &[String]) -> Result<SqlResult, FilterError> {
        if columns.is_empty() {
            return Err(FilterError::InvalidColumn("No columns to update".to_string()));
        }
        for column in columns {
            Self::validate_identifier(column)?;
        }

        let column_list = columns
            .iter()
            .map(|c| format!("\"{}\"", c))
            .collect::<Vec<_>>()
            .join(", ");
        let (where_clause, where_params) = FilterWhere::generate(&self.predicate, &self.conditions, 1);

        let query = format!(
            "UPDATE \"{table}\" AS t SET ({cols}) = (SELECT {cols} FROM jsonb_populate_record(NULL::\"{table}\", $1)) WHERE {where_clause} RETURNING to_jsonb(t) AS row",
            table = self.table_name,
            cols = column_list,
            where_clause = where_clause,
        );

        // $1 is filled in by the caller
        let mut params = vec![SqlParam::Json(serde_json::Value::Null)];
        params.extend(where_params);
        Ok(SqlResult { query, params })
    }

    /// Insert one row from the JSON document bound as `$1`.
    pub fn insert_sql(table_name: &str) -> Result<String, FilterError> {
        Self::validate_identifier(table_name)
            .map_err(|_| FilterError::InvalidTableName(format!("Invalid table name format: {}", table_name)))?;
        Ok(format!(
            "INSERT INTO \"{table}\" AS t SELECT * FROM jsonb_populate_record(NULL::\"{table}\", $1) RETURNING to_jsonb(t) AS row",
            table = table_name
        ))
    }

    /// Plain lowercase SQL identifiers only: `[a-z_][a-z0-9_]*`.
    pub fn validate_identifier(name: &str) -> Result<(), FilterError> {
        let mut chars = name.chars();
        let valid_start = matches!(chars.next(), Some(c) if c.is_ascii_lowercase() || c == '_');
        if !valid_start || !chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_') {
            return Err(FilterError::InvalidColumn(format!("Invalid column name format: {}", name)));
        }
        Ok(())
    }

    fn build_limit_clause(&self) -> String {
        match (self.limit, self.offset) {
            (Some(l), Some(o)) if o > 0 => format!("LIMIT {} OFFSET {}", l, o),
            (Some(l), _) => format!("LIMIT {}", l),
            _ => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn select_is_always_isolated() {
        let tenant = Uuid::new_v4();
        let filter = Filter::new("patients", IsolationPredicate::for_tenant(tenant)).unwrap();
        let sql = filter.to_sql();

        assert_eq!(
            sql.query,
            "SELECT to_jsonb(t) AS row FROM \"patients\" AS t WHERE \"is_deleted\" = false AND \"tenant_id\" = $1"
        );
        assert_eq!(sql.params, vec![SqlParam::Uuid(tenant)]);
    }

    #[test]
    fn select_with_paging_and_id() {
        let tenant = Uuid::new_v4();
        let id = Uuid::new_v4();
        let mut filter = Filter::new("appointments", IsolationPredicate::for_tenant(tenant)).unwrap();
        filter.where_eq("id", SqlParam::Uuid(id)).unwrap();
        filter
            .assign(&FilterData {
                order: Some("scheduled_at desc".to_string()),
                limit: Some(10),
                offset: Some(20),
            })
            .unwrap();

        let sql = filter.to_sql();
        assert!(sql.query.contains("\"tenant_id\" = $1 AND \"id\" = $2"));
        assert!(sql.query.ends_with("ORDER BY \"scheduled_at\" DESC LIMIT 10 OFFSET 20"));
        assert_eq!(sql.params.len(), 2);
    }

    #[test]
    fn soft_delete_is_an_update_not_a_delete() {
        let mut filter = Filter::new("patients", IsolationPredicate::for_tenant(Uuid::new_v4())).unwrap();
        filter.where_eq("id", SqlParam::Uuid(Uuid::new_v4())).unwrap();
        let sql = filter.to_soft_delete_sql();

        assert!(sql.query.starts_with("UPDATE \"patients\" SET \"is_deleted\" = true"));
        assert!(!sql.query.contains("DELETE"));
        assert!(sql.query.contains("\"is_deleted\" = false AND \"tenant_id\" = $1 AND \"id\" = $2"));
    }

    #[test]
    fn replace_reserves_first_parameter_for_document() {
        let mut filter = Filter::new("patients", IsolationPredicate::for_tenant(Uuid::new_v4())).unwrap();
        filter.where_eq("id", SqlParam::Uuid(Uuid::new_v4())).unwrap();
        let sql = filter
            .to_replace_sql(&["first_name".to_string(), "updated_at".to_string()])
            .unwrap();

        assert!(sql.query.contains("SET (\"first_name\", \"updated_at\") = (SELECT \"first_name\", \"updated_at\" FROM jsonb_populate_record(NULL::\"patients\", $1))"));
        assert!(sql.query.contains("\"tenant_id\" = $2 AND \"id\" = $3"));
        assert_eq!(sql.params.len(), 3);
    }

    #[test]
    fn rejects_bad_identifiers() {
        assert!(Filter::new("patients; drop", IsolationPredicate::privileged()).is_err());
        assert!(Filter::new("", IsolationPredicate::privileged()).is_err());
        let mut filter = Filter::new("patients", IsolationPredicate::privileged()).unwrap();
        assert!(filter.where_eq("id\" OR 1=1 --", SqlParam::Bool(true)).is_err());
    }
}
