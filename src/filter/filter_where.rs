use super::types::{FilterWhereInfo, SqlParam};
use crate::database::IsolationPredicate;

/// Builds a WHERE clause. The isolation predicate always comes first and
/// cannot be left out.
pub struct FilterWhere {
    param_values: Vec<SqlParam>,
    param_index: usize,
}

impl FilterWhere {
    pub fn new(starting_param_index: usize) -> Self {
        Self {
            param_values: vec![],
            param_index: starting_param_index,
        }
    }

    pub fn generate(
        predicate: &IsolationPredicate,
        conditions: &[FilterWhereInfo],
        starting_param_index: usize,
    ) -> (String, Vec<SqlParam>) {
        let mut filter_where = Self::new(starting_param_index);
        filter_where.build(predicate, conditions)
    }

    fn build(&mut self, predicate: &IsolationPredicate, conditions: &[FilterWhereInfo]) -> (String, Vec<SqlParam>) {
        let mut sql_conditions = vec!["\"is_deleted\" = false".to_string()];
        if let Some(tenant_id) = predicate.tenant_id() {
            let placeholder = self.param(SqlParam::Uuid(tenant_id));
            sql_conditions.push(format!("\"tenant_id\" = {}", placeholder));
        }

        for condition in conditions {
            let sql = self.build_sql_condition(condition);
            sql_conditions.push(sql);
        }

        (sql_conditions.join(" AND "), std::mem::take(&mut self.param_values))
    }

    fn build_sql_condition(&mut self, condition: &FilterWhereInfo) -> String {
        let quoted_column = format!("\"{}\"", condition.column);
        let placeholder = self.param(condition.data.clone());
        format!("{} = {}", quoted_column, placeholder)
    }

    fn param(&mut self, value: SqlParam) -> String {
        self.param_values.push(value);
        self.param_index += 1;
        format!("${}", self.param_index)
    }
}
