//! Query condition fragments
//!
//! The engine never executes SQL. It produces [`Condition`] values (a WHERE
//! fragment with `?` placeholders, the values to bind, and the associations to
//! join) and ORDER BY terms, which the data-access layer plugs into its own
//! queries.

use crate::core::column::ResolvedColumns;
use crate::core::sort::SortColumn;
use serde::Serialize;

/// A composable WHERE fragment
///
/// # Example
/// ```rust,ignore
/// let condition = Condition::new("orders.status = ?")
///     .bind("open")
///     .and(Condition::new("orders.total > ?").bind("100"));
///
/// assert_eq!(condition.sql, "(orders.status = ?) AND (orders.total > ?)");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Condition {
    /// SQL with `?` placeholders
    pub sql: String,

    /// Values for the placeholders, in order
    pub binds: Vec<String>,

    /// Associations that have to be joined for the fragment to be valid
    pub joins: Vec<String>,
}

impl Condition {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            binds: Vec::new(),
            joins: Vec::new(),
        }
    }

    /// The no-op condition
    pub fn none() -> Self {
        Self::default()
    }

    pub fn bind(mut self, value: impl Into<String>) -> Self {
        self.binds.push(value.into());
        self
    }

    pub fn join(mut self, association: impl Into<String>) -> Self {
        let association = association.into();
        if !self.joins.contains(&association) {
            self.joins.push(association);
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.sql.trim().is_empty()
    }

    /// Combine with AND; empty sides are dropped
    pub fn and(mut self, other: Condition) -> Condition {
        if other.is_empty() {
            return self.merge_joins(other.joins);
        }
        if self.is_empty() {
            return other.merge_joins(self.joins);
        }

        self.sql = format!("{} AND {}", grouped(&self.sql), grouped(&other.sql));
        self.binds.extend(other.binds);
        self.merge_joins(other.joins)
    }

    /// AND together all conditions
    pub fn all(conditions: impl IntoIterator<Item = Condition>) -> Condition {
        conditions
            .into_iter()
            .fold(Condition::none(), |acc, c| acc.and(c))
    }

    fn merge_joins(mut self, joins: Vec<String>) -> Self {
        for join in joins {
            if !self.joins.contains(&join) {
                self.joins.push(join);
            }
        }
        self
    }

    /// Render with the bind values inlined as quoted literals
    ///
    /// Meant for logs and assertions, not for execution.
    pub fn to_inline_sql(&self) -> String {
        let mut out = String::with_capacity(self.sql.len());
        let mut binds = self.binds.iter();
        let mut in_literal = false;

        for c in self.sql.chars() {
            match c {
                '\'' => {
                    in_literal = !in_literal;
                    out.push(c);
                }
                '?' if !in_literal => match binds.next() {
                    Some(value) => out.push_str(&quote(value)),
                    None => out.push(c),
                },
                _ => out.push(c),
            }
        }
        out
    }
}

/// Wrap `sql` in parentheses unless one pair already encloses all of it
fn grouped(sql: &str) -> String {
    if is_grouped(sql) {
        sql.to_string()
    } else {
        format!("({})", sql)
    }
}

fn is_grouped(sql: &str) -> bool {
    if !sql.starts_with('(') {
        return false;
    }

    let mut depth = 0usize;
    let mut in_literal = false;
    for (i, c) in sql.char_indices() {
        match c {
            '\'' => in_literal = !in_literal,
            '(' if !in_literal => depth += 1,
            ')' if !in_literal => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return i == sql.len() - 1;
                }
            }
            _ => {}
        }
    }
    false
}

fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// One `<expression> LIKE <pattern>` predicate of a search
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LikePredicate {
    pub expression: String,
    pub pattern: String,
}

impl LikePredicate {
    pub fn to_sql(&self) -> String {
        format!("{} LIKE ?", self.expression)
    }

    pub fn to_inline_sql(&self) -> String {
        format!("{} LIKE {}", self.expression, quote(&self.pattern))
    }
}

/// OR-chain of LIKE predicates over several columns
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SearchCondition {
    pub predicates: Vec<LikePredicate>,
    pub joins: Vec<String>,
}

impl SearchCondition {
    /// A blank search does not take part in the query at all
    pub fn is_noop(&self) -> bool {
        self.predicates.is_empty()
    }

    /// The OR-chain is parenthesized so it composes with outer `AND`s
    pub fn into_condition(self) -> Condition {
        if self.is_noop() {
            return Condition::none();
        }

        let mut sql = self
            .predicates
            .iter()
            .map(LikePredicate::to_sql)
            .collect::<Vec<_>>()
            .join(" OR ");
        if self.predicates.len() > 1 {
            sql = format!("({})", sql);
        }
        let binds = self.predicates.into_iter().map(|p| p.pattern).collect();

        Condition {
            sql,
            binds,
            joins: self.joins,
        }
    }
}

/// Build the search condition for `search_text` over already resolved columns
///
/// With `case_insensitive`, both the column expression and the search text are
/// lowercased.
pub fn build_search_condition(
    columns: &ResolvedColumns,
    search_text: &str,
    case_insensitive: bool,
) -> SearchCondition {
    if search_text.trim().is_empty() {
        return SearchCondition::default();
    }

    let mut pattern = format!("%{}%", search_text);
    if case_insensitive {
        pattern = pattern.to_lowercase();
    }

    let predicates = columns
        .expressions
        .iter()
        .map(|expression| LikePredicate {
            expression: if case_insensitive {
                format!("LOWER({})", expression)
            } else {
                expression.clone()
            },
            pattern: pattern.clone(),
        })
        .collect();

    SearchCondition {
        predicates,
        joins: columns.joins.clone(),
    }
}

/// ORDER BY term for the sort list, `None` when there is nothing to sort by
pub fn build_order_by(columns: &[SortColumn]) -> Option<String> {
    if columns.is_empty() {
        return None;
    }

    Some(
        columns
            .iter()
            .map(|c| format!("{} {}", c.column(), c.direction()))
            .collect::<Vec<_>>()
            .join(", "),
    )
}

/// A registered multi-column search
#[derive(Debug, Clone)]
pub struct SearchScope {
    columns: ResolvedColumns,
    case_insensitive: bool,
}

impl SearchScope {
    pub fn new(columns: ResolvedColumns, case_insensitive: bool) -> Self {
        Self {
            columns,
            case_insensitive,
        }
    }

    pub fn columns(&self) -> &ResolvedColumns {
        &self.columns
    }

    pub fn condition(&self, search_text: &str) -> Condition {
        build_search_condition(&self.columns, search_text, self.case_insensitive).into_condition()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::sort::SortDirection;

    fn columns(expressions: &[&str]) -> ResolvedColumns {
        ResolvedColumns {
            expressions: expressions.iter().map(|e| e.to_string()).collect(),
            joins: Vec::new(),
        }
    }

    #[test]
    fn test_blank_search_is_noop() {
        let search = build_search_condition(&columns(&["colA", "colB"]), "", true);
        assert!(search.is_noop());
        assert!(search.into_condition().is_empty());

        let search = build_search_condition(&columns(&["colA"]), "   ", true);
        assert!(search.is_noop());
    }

    #[test]
    fn test_case_insensitive_single_column() {
        let search = build_search_condition(&columns(&["colA"]), "Foo", true);

        assert_eq!(search.predicates.len(), 1);
        assert_eq!(search.predicates[0].expression, "LOWER(colA)");
        assert_eq!(search.predicates[0].pattern, "%foo%");
        assert_eq!(search.predicates[0].to_inline_sql(), "LOWER(colA) LIKE '%foo%'");
    }

    #[test]
    fn test_case_sensitive_keeps_text() {
        let search = build_search_condition(&columns(&["colA", "colB"]), "Foo", false);
        let condition = search.into_condition();

        assert_eq!(condition.sql, "(colA LIKE ? OR colB LIKE ?)");
        assert_eq!(condition.binds, vec!["%Foo%", "%Foo%"]);
    }

    #[test]
    fn test_joins_are_carried() {
        let resolved = ResolvedColumns {
            expressions: vec!["titles.name".to_string()],
            joins: vec!["title".to_string()],
        };
        let condition = build_search_condition(&resolved, "x", true).into_condition();
        assert_eq!(condition.joins, vec!["title"]);
    }

    #[test]
    fn test_order_by() {
        let sort = vec![
            SortColumn::new("orders.created_at", SortDirection::Asc),
            SortColumn::new("orders.total", SortDirection::Desc),
        ];
        assert_eq!(
            build_order_by(&sort).as_deref(),
            Some("orders.created_at ASC, orders.total DESC")
        );
        assert_eq!(build_order_by(&[]), None);
    }

    #[test]
    fn test_condition_and() {
        let condition = Condition::new("a = ?")
            .bind("1")
            .join("customer")
            .and(Condition::none())
            .and(Condition::new("b = ?").bind("2").join("customer"));

        assert_eq!(condition.sql, "(a = ?) AND (b = ?)");
        assert_eq!(condition.binds, vec!["1", "2"]);
        assert_eq!(condition.joins, vec!["customer"]);
    }

    #[test]
    fn test_search_keeps_precedence_under_and() {
        let search = build_search_condition(&columns(&["colA", "colB"]), "x", false).into_condition();

        let alone = Condition::all([search.clone()]);
        assert_eq!(alone.sql, "(colA LIKE ? OR colB LIKE ?)");

        let scoped = Condition::new("tenant_id = ?").bind("3").and(search);
        assert_eq!(scoped.sql, "(tenant_id = ?) AND (colA LIKE ? OR colB LIKE ?)");
        assert_eq!(scoped.binds, vec!["3", "%x%", "%x%"]);
    }

    #[test]
    fn test_grouping_detection() {
        assert!(is_grouped("(a = ? OR b = ?)"));
        assert!(is_grouped("((a) AND (b))"));
        assert!(!is_grouped("(a) AND (b)"));
        assert!(!is_grouped("a = '(' OR b = ?"));
        assert!(is_grouped("(a = ')')"));
    }

    #[test]
    fn test_condition_all_of_nothing_is_empty() {
        assert!(Condition::all(Vec::new()).is_empty());
    }

    #[test]
    fn test_inline_sql_skips_literals() {
        let condition = Condition::new("CONCAT(a, '?') = ? AND b = ?")
            .bind("it's")
            .bind("x");
        assert_eq!(
            condition.to_inline_sql(),
            "CONCAT(a, '?') = 'it''s' AND b = 'x'"
        );
    }
}
