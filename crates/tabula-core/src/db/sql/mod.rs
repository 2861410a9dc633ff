//! Module: db::sql
//! Responsibility: the restricted SELECT/UPDATE/DELETE text surface.
//! Does not own: evaluation; statements compile into builder state and
//! run through the table's own terminal operations.
//!
//! One statement per call. The table named in the statement is ignored;
//! the statement always runs against the table it is invoked on.

mod parse;


use crate::{
    db::{
        predicate::{Combinator, Condition},
        query::OrderDirection,
        table::Table,
    },
    error::InternalError,
    obs::{ExecKind, MetricsEvent},
    record::Record,
};
use thiserror::Error as ThisError;

///
/// SqlError
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum SqlError {
    #[error("unsupported SQL command '{keyword}': only SELECT, UPDATE and DELETE are accepted")]
    UnsupportedCommand { keyword: String },

    #[error("UPDATE requires a SET clause")]
    MissingSet,

    #[error("parenthesized groups are not supported in WHERE: {clause}")]
    NestedGroup { clause: String },
}

///
/// SqlOutcome
///

#[derive(Clone, Debug, PartialEq)]
pub enum SqlOutcome {
    /// Rows produced by a SELECT.
    Rows(Vec<Record>),
    /// An UPDATE or DELETE ran; carries the number of records targeted.
    Applied(usize),
}

impl SqlOutcome {
    #[must_use]
    pub fn into_rows(self) -> Option<Vec<Record>> {
        match self {
            Self::Rows(rows) => Some(rows),
            Self::Applied(_) => None,
        }
    }
}

impl Table {
    /// Run one SQL-subset statement against this table.
    ///
    /// Conditions parsed from WHERE are appended to any conditions already
    /// chained on the builder. Every statement is terminal: the builder's
    /// query state is reset once it succeeds.
    pub async fn sql(&mut self, command: &str) -> Result<SqlOutcome, InternalError> {
        let sql = parse::normalize(command);
        let keyword = parse::leading_keyword(&sql);

        let kind = match keyword.as_str() {
            "SELECT" => ExecKind::Load,
            "UPDATE" => ExecKind::Update,
            "DELETE" => ExecKind::Delete,
            _ => return Err(SqlError::UnsupportedCommand { keyword }.into()),
        };

        self.emit(MetricsEvent::SqlStatement {
            table: self.name(),
            kind,
        });

        match kind {
            ExecKind::Update => {
                let set =
                    parse::clause(&sql, " SET ", &[" WHERE "]).ok_or(SqlError::MissingSet)?;
                let patch: Record = parse::parse_assignments(set).into_iter().collect();

                self.apply_where(parse::clause(&sql, " WHERE ", &[]))?;
                let written = self.update_where(&patch).await?;
                self.reset();

                Ok(SqlOutcome::Applied(written))
            }
            ExecKind::Delete => {
                self.apply_where(parse::clause(&sql, " WHERE ", &[]))?;
                let removed = self.delete_where().await?;
                self.reset();

                Ok(SqlOutcome::Applied(removed))
            }
            _ => {
                self.apply_where(parse::clause(&sql, " WHERE ", &[" ORDER BY ", " LIMIT "]))?;

                if let Some((field, direction)) =
                    parse::clause(&sql, " ORDER BY ", &[" LIMIT "]).and_then(parse::parse_order)
                {
                    self.order_by(field, OrderDirection::parse(&direction));
                }
                if let Some(n) = parse::clause(&sql, " LIMIT ", &[]).and_then(parse::parse_limit) {
                    self.limit(n);
                }

                Ok(SqlOutcome::Rows(self.get().await?))
            }
        }
    }

    // Groups are validated before any condition is pushed so a rejected
    // statement leaves the builder untouched.
    fn apply_where(&mut self, where_clause: Option<&str>) -> Result<(), SqlError> {
        let Some(where_clause) = where_clause else {
            return Ok(());
        };
        parse::check_groups(where_clause)?;

        for (segment_idx, segment) in parse::split_where(where_clause).iter().enumerate() {
            let combinator = if segment_idx == 0 {
                Combinator::And
            } else {
                Combinator::Or
            };

            for cond in segment {
                match parse::parse_condition(cond) {
                    Some(parsed) => self.state_mut().filters.push(Condition::new(
                        combinator,
                        parsed.field,
                        parsed.op,
                        parsed.value,
                    )),
                    None => {
                        tracing::warn!(
                            table = %self.name(),
                            condition = %cond,
                            "SQL condition skipped"
                        );
                    }
                }
            }
        }

        Ok(())
    }
}
