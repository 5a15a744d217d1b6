/// A SELECT assembled clause by clause. Callers hand in finished fragments; nothing here
/// interpolates values.
#[derive(Debug, Clone, Default)]
pub(crate) struct SelectStatement {
    select: Vec<String>,
    from: String,
    conditions: Vec<String>,
    group_by: Vec<String>,
    order_by: Vec<String>,
    limit: Option<u64>,
    offset: Option<u64>,
}

impl SelectStatement {
    pub(crate) fn from(table: impl Into<String>) -> Self {
        Self {
            from: table.into(),
            ..Default::default()
        }
    }

    pub(crate) fn select(mut self, expr: impl Into<String>) -> Self {
        self.select.push(expr.into());
        self
    }

    pub(crate) fn select_all(mut self, exprs: impl IntoIterator<Item = String>) -> Self {
        self.select.extend(exprs);
        self
    }

    pub(crate) fn filter(mut self, condition: impl Into<String>) -> Self {
        self.conditions.push(condition.into());
        self
    }

    pub(crate) fn filter_all(mut self, conditions: impl IntoIterator<Item = String>) -> Self {
        self.conditions.extend(conditions);
        self
    }

    pub(crate) fn group_by(mut self, exprs: impl IntoIterator<Item = String>) -> Self {
        self.group_by.extend(exprs);
        self
    }

    pub(crate) fn order_by(mut self, expr: impl Into<String>) -> Self {
        self.order_by.push(expr.into());
        self
    }

    pub(crate) fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub(crate) fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub(crate) fn build(&self) -> String {
        let mut clauses = vec![
            format!("SELECT {}", self.select.join(", ")),
            format!("FROM {}", self.from),
        ];
        if !self.conditions.is_empty() {
            clauses.push(format!("WHERE {}", self.conditions.join(" AND ")));
        }
        if !self.group_by.is_empty() {
            clauses.push(format!("GROUP BY {}", self.group_by.join(", ")));
        }
        if !self.order_by.is_empty() {
            clauses.push(format!("ORDER BY {}", self.order_by.join(", ")));
        }
        if let Some(limit) = self.limit {
            clauses.push(format!("LIMIT {limit}"));
        }
        if let Some(offset) = self.offset {
            clauses.push(format!("OFFSET {offset}"));
        }
        clauses.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_statement() {
        let sql = SelectStatement::from("t").select("count() AS total").build();
        assert_eq!(sql, "SELECT count() AS total\nFROM t");
    }

    #[test]
    fn test_all_clauses_in_order() {
        let sql = SelectStatement::from("t")
            .select("a")
            .select_all(vec!["count() AS c".to_string()])
            .filter("x = 1")
            .filter_all(vec!["y IN (2,3)".to_string()])
            .group_by(vec!["a".to_string()])
            .order_by("c DESC")
            .limit(10)
            .offset(20)
            .build();
        assert_eq!(
            sql,
            "SELECT a, count() AS c\nFROM t\nWHERE x = 1 AND y IN (2,3)\nGROUP BY a\nORDER BY c DESC\nLIMIT 10\nOFFSET 20"
        );
    }
}
