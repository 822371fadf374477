use super::error::FilterError;
use super::filter::Filter;
use super::types::{FilterOrderInfo, SortDirection};

pub struct FilterOrder;

impl FilterOrder {
    /// Parse `"created_at desc, last_name"` into order terms.
    pub fn parse(s: &str) -> Result<Vec<FilterOrderInfo>, FilterError> {
        let mut out = Vec::new();
        for part in s.split(',') {
            let trimmed = part.trim();
            if trimmed.is_empty() {
                continue;
            }
            let mut it = trimmed.split_whitespace();
            if let Some(col) = it.next() {
                Filter::validate_identifier(col).map_err(|_| FilterError::InvalidOrder(trimmed.to_string()))?;
                let sort = match it.next() {
                    None => SortDirection::Asc,
                    Some(dir) if dir.eq_ignore_ascii_case("asc") => SortDirection::Asc,
                    Some(dir) if dir.eq_ignore_ascii_case("desc") => SortDirection::Desc,
                    Some(_) => return Err(FilterError::InvalidOrder(trimmed.to_string())),
                };
                if it.next().is_some() {
                    return Err(FilterError::InvalidOrder(trimmed.to_string()));
                }
                out.push(FilterOrderInfo { column: col.to_string(), sort });
            }
        }
        Ok(out)
    }

    /// Oldest first, so paging is stable.
    pub fn default_order() -> Vec<FilterOrderInfo> {
        vec![FilterOrderInfo {
            column: "created_at".to_string(),
            sort: SortDirection::Asc,
        }]
    }

    pub fn generate(infos: &[FilterOrderInfo]) -> String {
        if infos.is_empty() {
            return String::new();
        }
        let parts: Vec<String> = infos
            .iter()
            .map(|i| format!("\"{}\" {}", i.column, i.sort.to_sql()))
            .collect();
        format!("ORDER BY {}", parts.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_mixed_directions() {
        let order = FilterOrder::parse("created_at desc, last_name").unwrap();
        assert_eq!(order.len(), 2);
        assert_eq!(order[0].sort, SortDirection::Desc);
        assert_eq!(order[1].column, "last_name");
        assert_eq!(order[1].sort, SortDirection::Asc);
        assert_eq!(
            FilterOrder::generate(&order),
            "ORDER BY \"created_at\" DESC, \"last_name\" ASC"
        );
    }

    #[test]
    fn rejects_injection_attempts() {
        assert!(FilterOrder::parse("name; DROP TABLE patients").is_err());
        assert!(FilterOrder::parse("name sideways").is_err());
        assert!(FilterOrder::parse("\"name\"").is_err());
    }
}
