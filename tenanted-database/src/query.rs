//! Tenant query filters and scopes.

use serde_json::Value;
use tenanted_core::{Row, TenantKey};

#[cfg(feature = "sea-query")]
use sea_query::{Alias, Condition, Expr, SimpleExpr};

/// Whether a stored value references the given tenant key
///
/// Stores commonly hand integer keys back as strings, so both forms match.
pub fn key_matches(value: &Value, key: &TenantKey) -> bool {
    TenantKey::from_value(value)
        .is_some_and(|found| found == *key || found.to_string() == key.to_string())
}

/// Equality filter restricting a query to one tenant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantFilter {
    pub column: String,
    pub key: TenantKey,
}

impl TenantFilter {
    pub fn new(column: impl Into<String>, key: impl Into<TenantKey>) -> Self {
        Self {
            column: column.into(),
            key: key.into(),
        }
    }

    /// Check a row against the filter
    pub fn matches(&self, row: &Row) -> bool {
        row.get(&self.column)
            .is_some_and(|value| key_matches(value, &self.key))
    }

    /// Convert to a sea-query condition
    #[cfg(feature = "sea-query")]
    pub fn to_condition(&self) -> Condition {
        Condition::all().add(equals(&self.column, &self.key.to_value()))
    }
}

/// A query against a tenant-owned table.
///
/// Carries plain equality conditions plus the tenant filter added by the
/// scope. [`TenantQuery::without_tenant`] opts the query out of scoping.
#[derive(Debug, Clone, PartialEq)]
pub struct TenantQuery {
    table: String,
    conditions: Vec<(String, Value)>,
    tenant: Option<TenantFilter>,
    without_tenant: bool,
}

impl TenantQuery {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            conditions: Vec::new(),
            tenant: None,
            without_tenant: false,
        }
    }

    /// Add a where clause for equality.
    pub fn where_eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push((column.into(), value.into()));
        self
    }

    /// Query across all tenants.
    pub fn without_tenant(mut self) -> Self {
        self.without_tenant = true;
        self.tenant = None;
        self
    }

    /// Restrict to a tenant
    ///
    /// Ignored when the query was opted out with [`TenantQuery::without_tenant`].
    pub fn scoped_to(mut self, filter: TenantFilter) -> Self {
        if !self.without_tenant {
            self.tenant = Some(filter);
        }
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn conditions(&self) -> &[(String, Value)] {
        &self.conditions
    }

    pub fn tenant_filter(&self) -> Option<&TenantFilter> {
        self.tenant.as_ref()
    }

    /// False once [`TenantQuery::without_tenant`] has been called
    pub fn is_tenant_scoped(&self) -> bool {
        !self.without_tenant
    }

    /// Check a row against every condition and the tenant filter
    pub fn matches(&self, row: &Row) -> bool {
        let conditions = self
            .conditions
            .iter()
            .all(|(column, value)| row.get(column).unwrap_or(&Value::Null) == value);

        conditions && self.tenant.as_ref().is_none_or(|filter| filter.matches(row))
    }

    /// Rows matching the query
    pub fn filter<'a>(&self, rows: impl IntoIterator<Item = &'a Row>) -> Vec<&'a Row> {
        rows.into_iter().filter(|row| self.matches(row)).collect()
    }

    /// Convert to a sea-query condition
    #[cfg(feature = "sea-query")]
    pub fn to_condition(&self) -> Condition {
        let mut condition = Condition::all();
        for (column, value) in &self.conditions {
            condition = condition.add(equals(column, value));
        }
        if let Some(filter) = &self.tenant {
            condition = condition.add(equals(&filter.column, &filter.key.to_value()));
        }
        condition
    }
}

#[cfg(feature = "sea-query")]
fn equals(column: &str, value: &Value) -> SimpleExpr {
    let column = Expr::col(Alias::new(column));
    match value {
        Value::Null => column.is_null(),
        Value::Bool(b) => column.eq(*b),
        Value::Number(number) => match number.as_i64() {
            Some(int) => column.eq(int),
            None => column.eq(number.as_f64().unwrap_or_default()),
        },
        Value::String(string) => column.eq(string.as_str()),
        other => column.eq(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_key_matches() {
        let key = TenantKey::Int(7);
        assert!(key_matches(&json!(7), &key));
        assert!(key_matches(&json!("7"), &key));
        assert!(!key_matches(&json!(9), &key));
        assert!(!key_matches(&Value::Null, &key));
    }

    #[test]
    fn test_filter_matches() {
        let filter = TenantFilter::new("organisation_id", 7);
        assert!(filter.matches(&row(json!({"organisation_id": 7}))));
        assert!(!filter.matches(&row(json!({"organisation_id": 9}))));
        assert!(!filter.matches(&row(json!({"name": "Launch"}))));
    }

    #[test]
    fn test_query_filter_rows() {
        let rows = vec![
            row(json!({"id": 1, "organisation_id": 7, "status": "open"})),
            row(json!({"id": 2, "organisation_id": 9, "status": "open"})),
            row(json!({"id": 3, "organisation_id": 7, "status": "closed"})),
        ];

        let query = TenantQuery::new("projects")
            .where_eq("status", "open")
            .scoped_to(TenantFilter::new("organisation_id", 7));

        let found = query.filter(&rows);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].get("id"), Some(&json!(1)));
    }

    #[test]
    fn test_without_tenant() {
        let rows = vec![
            row(json!({"organisation_id": 7})),
            row(json!({"organisation_id": 9})),
        ];

        let query = TenantQuery::new("projects")
            .without_tenant()
            .scoped_to(TenantFilter::new("organisation_id", 7));

        assert!(!query.is_tenant_scoped());
        assert_eq!(query.tenant_filter(), None);
        assert_eq!(query.filter(&rows).len(), 2);
    }

    #[cfg(feature = "sea-query")]
    #[test]
    fn test_sea_query_condition() {
        use sea_query::{Asterisk, PostgresQueryBuilder, Query};

        let query = TenantQuery::new("projects").scoped_to(TenantFilter::new("organisation_id", 7));
        let sql = Query::select()
            .column(Asterisk)
            .from(Alias::new("projects"))
            .cond_where(query.to_condition())
            .to_string(PostgresQueryBuilder);

        assert_eq!(sql, r#"SELECT * FROM "projects" WHERE "organisation_id" = 7"#);
    }
}
