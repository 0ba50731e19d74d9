//! SQL compilation of collection queries.
//!
//! Identifiers (table and column names) are validated and quoted; every
//! value is emitted as a `$n` placeholder and returned alongside the
//! SQL so the caller binds them in order.

use pagewise_core::error::{StorageError, StorageResult};
use pagewise_core::models::{Value, is_key_field};
use pagewise_core::order::OrderSpec;
use pagewise_core::ports::{CollectionQuery, Filter, OrderDirection};
use pagewise_core::predicate::Predicate;

/// Alias of the scanned table in generated SQL.
const TABLE_ALIAS: &str = "t";

/// SQL text and its positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlFragment {
    pub sql: String,
    pub params: Vec<Value>,
}

/// Where a record type lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableMapping {
    pub table: String,
    /// Column holding the record key (`pk` and `id` map to it).
    pub pk_column: String,
}

impl TableMapping {
    pub fn new(table: impl Into<String>, pk_column: impl Into<String>) -> StorageResult<Self> {
        let mapping = Self {
            table: table.into(),
            pk_column: pk_column.into(),
        };
        validate_identifier(&mapping.table)?;
        validate_identifier(&mapping.pk_column)?;
        Ok(mapping)
    }

    /// Qualified, quoted column for a record field.
    fn column(&self, field: &str) -> StorageResult<String> {
        let name = if is_key_field(field) {
            self.pk_column.as_str()
        } else {
            field
        };
        validate_identifier(name)?;
        Ok(format!("{}.\"{}\"", TABLE_ALIAS, name))
    }
}

/// Accept `[A-Za-z_][A-Za-z0-9_]*`, at most 63 bytes.
pub fn validate_identifier(name: &str) -> StorageResult<()> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    let valid_rest = chars.all(|c| c.is_ascii_alphanumeric() || c == '_');

    if valid_start && valid_rest && name.len() <= 63 {
        Ok(())
    } else {
        Err(StorageError::InvalidIdentifier(name.to_string()))
    }
}

// =============================================================================
// Compiler
// =============================================================================

/// Builds SQL with sequential `$n` placeholders.
struct Compiler<'a> {
    mapping: &'a TableMapping,
    params: Vec<Value>,
}

impl<'a> Compiler<'a> {
    fn new(mapping: &'a TableMapping) -> Self {
        Self {
            mapping,
            params: Vec::new(),
        }
    }

    fn bind(&mut self, value: Value) -> String {
        self.params.push(value);
        format!("${}", self.params.len())
    }

    /// `(a AND b) OR (c)`; an empty predicate is `FALSE`.
    fn predicate(&mut self, predicate: &Predicate) -> StorageResult<String> {
        if predicate.is_empty() {
            return Ok("FALSE".to_string());
        }

        let mut branches = Vec::with_capacity(predicate.branches.len());
        for branch in &predicate.branches {
            let mut conditions = Vec::with_capacity(branch.len());
            for condition in branch {
                let column = self.mapping.column(&condition.field)?;
                let placeholder = self.bind(condition.value.clone());
                conditions.push(format!("{} {} {}", column, condition.op.as_sql(), placeholder));
            }
            branches.push(format!("({})", conditions.join(" AND ")));
        }
        Ok(branches.join(" OR "))
    }

    /// Null comparisons are false, so an excluded predicate keeps them.
    fn filter(&mut self, filter: &Filter) -> StorageResult<String> {
        match filter {
            Filter::Include(p) => Ok(format!("({})", self.predicate(p)?)),
            Filter::Exclude(p) => Ok(format!("NOT COALESCE(({}), FALSE)", self.predicate(p)?)),
        }
    }

    fn where_clause(&mut self, query: &CollectionQuery) -> StorageResult<String> {
        if query.filters.is_empty() {
            return Ok(String::new());
        }
        let clauses = query
            .filters
            .iter()
            .map(|f| self.filter(f))
            .collect::<StorageResult<Vec<_>>>()?;
        Ok(format!(" WHERE {}", clauses.join(" AND ")))
    }

    fn order_clause(&self, order: &OrderSpec) -> StorageResult<String> {
        let terms = order
            .fields()
            .iter()
            .map(|f| {
                let column = self.mapping.column(&f.field)?;
                Ok(match f.direction {
                    OrderDirection::Asc => format!("{} ASC NULLS LAST", column),
                    OrderDirection::Desc => format!("{} DESC NULLS FIRST", column),
                })
            })
            .collect::<StorageResult<Vec<_>>>()?;
        Ok(format!(" ORDER BY {}", terms.join(", ")))
    }

    fn window_clause(query: &CollectionQuery) -> String {
        let mut clause = String::new();
        if let Some(limit) = query.limit {
            clause.push_str(&format!(" LIMIT {}", limit));
        }
        if query.offset > 0 {
            clause.push_str(&format!(" OFFSET {}", query.offset));
        }
        clause
    }

    fn from_clause(&self) -> StorageResult<String> {
        validate_identifier(&self.mapping.table)?;
        Ok(format!("FROM \"{}\" AS {}", self.mapping.table, TABLE_ALIAS))
    }

    fn finish(self, sql: String) -> SqlFragment {
        SqlFragment {
            sql,
            params: self.params,
        }
    }
}

/// `SELECT` of the query window, rows as `(pk, fields)`.
///
/// `order` is the effective ordering (explicit or natural).
pub fn select(mapping: &TableMapping, query: &CollectionQuery, order: &OrderSpec) -> StorageResult<SqlFragment> {
    let mut compiler = Compiler::new(mapping);
    let sql = format!(
        "SELECT {} AS pk, to_jsonb({}) AS fields {}{}{}{}",
        mapping.column("pk")?,
        TABLE_ALIAS,
        compiler.from_clause()?,
        compiler.where_clause(query)?,
        compiler.order_clause(order)?,
        Compiler::window_clause(query),
    );
    Ok(compiler.finish(sql))
}

/// `COUNT(*)` of the query window.
///
/// Ordering does not change the size of a window, so it is omitted.
pub fn count(mapping: &TableMapping, query: &CollectionQuery) -> StorageResult<SqlFragment> {
    let mut compiler = Compiler::new(mapping);
    let inner = format!(
        "SELECT 1 {}{}{}",
        compiler.from_clause()?,
        compiler.where_clause(query)?,
        Compiler::window_clause(query),
    );
    let sql = format!("SELECT COUNT(*) FROM ({}) AS w", inner);
    Ok(compiler.finish(sql))
}

/// Single record by key, ignoring filters.
pub fn get(mapping: &TableMapping, pk: u64) -> StorageResult<SqlFragment> {
    let mut compiler = Compiler::new(mapping);
    let key = compiler.bind(Value::Int(pk_to_i64(pk)?));
    let sql = format!(
        "SELECT {col} AS pk, to_jsonb({alias}) AS fields {from} WHERE {col} = {key}",
        col = mapping.column("pk")?,
        alias = TABLE_ALIAS,
        from = compiler.from_clause()?,
        key = key,
    );
    Ok(compiler.finish(sql))
}

fn pk_to_i64(pk: u64) -> StorageResult<i64> {
    i64::try_from(pk).map_err(|_| StorageError::QueryError(format!("key {} exceeds bigint range", pk)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pagewise_core::models::Record;

    fn pets() -> TableMapping {
        TableMapping::new("pets", "pet_id").unwrap()
    }

    #[test]
    fn test_select_with_keyset_predicate() {
        let order = OrderSpec::parse("-age", &[]);
        let anchor = Record::new(7).with("age", 3i64);
        let mut query = CollectionQuery::new("pet");
        query.filters.push(Filter::Include(Predicate::after(&order, &anchor)));
        query.limit = Some(3);
        query.offset = 2;

        let fragment = select(&pets(), &query, &order).unwrap();
        assert_eq!(
            fragment.sql,
            "SELECT t.\"pet_id\" AS pk, to_jsonb(t) AS fields FROM \"pets\" AS t \
             WHERE ((t.\"age\" < $1) OR (t.\"age\" = $2 AND t.\"pet_id\" > $3)) \
             ORDER BY t.\"age\" DESC NULLS FIRST, t.\"pet_id\" ASC NULLS LAST LIMIT 3 OFFSET 2"
        );
        assert_eq!(fragment.params, vec![Value::Int(3), Value::Int(3), Value::Int(7)]);
    }

    // Test critique: NOT garde les lignes NULL comme le backend mémoire
    #[test]
    fn test_exclude_is_null_safe_and_count_skips_order() {
        let order = OrderSpec::by_key();
        let anchor = Record::new(4);
        let mut query = CollectionQuery::new("pet");
        query.filters.push(Filter::Exclude(Predicate::before(&order, &anchor)));
        query.limit = Some(1);

        let fragment = count(&pets(), &query).unwrap();
        assert_eq!(
            fragment.sql,
            "SELECT COUNT(*) FROM (SELECT 1 FROM \"pets\" AS t \
             WHERE NOT COALESCE(((t.\"pet_id\" < $1)), FALSE) LIMIT 1) AS w"
        );
        assert_eq!(fragment.params, vec![Value::Int(4)]);
    }

    #[test]
    fn test_empty_predicate_matches_nothing() {
        let mut query = CollectionQuery::new("pet");
        query.filters.push(Filter::Include(Predicate::default()));
        let fragment = count(&pets(), &query).unwrap();
        assert!(fragment.sql.contains("WHERE (FALSE)"));
    }

    // Test critique: les identifiants hostiles sont refusés avant toute requête
    #[test]
    fn test_identifier_validation_rejects_injection() {
        for bad in ["", "1abc", "age; DROP TABLE pets", "a\"b", "name--", "é"] {
            assert!(validate_identifier(bad).is_err(), "{:?}", bad);
        }
        assert!(validate_identifier("_private_2").is_ok());
        assert!(TableMapping::new("pets", "id; --").is_err());

        let order = OrderSpec::parse("age\" DESC", &[]);
        let err = select(&pets(), &CollectionQuery::new("pet"), &order).unwrap_err();
        assert!(matches!(err, StorageError::InvalidIdentifier(_)));
    }

    #[test]
    fn test_get_by_key() {
        let fragment = get(&pets(), 31).unwrap();
        assert!(fragment.sql.ends_with("WHERE t.\"pet_id\" = $1"));
        assert_eq!(fragment.params, vec![Value::Int(31)]);
        assert!(get(&pets(), u64::MAX).is_err());
    }
}
