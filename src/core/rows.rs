//! Query and exec results shared by all backends

use super::error::{DatabaseError, Result};
use super::value::{DatabaseRow, DatabaseValue, FromValue};
use std::collections::VecDeque;
use std::sync::Arc;

/// Outcome of a non-returning statement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExecResult {
    rows_affected: u64,
    last_insert_id: u64,
}

impl ExecResult {
    pub fn new(rows_affected: u64, last_insert_id: u64) -> Self {
        Self {
            rows_affected,
            last_insert_id,
        }
    }

    /// Rows changed by the statement
    pub fn rows_affected(&self) -> u64 {
        self.rows_affected
    }

    /// Id generated by the last insert; always 0 on PostgreSQL, use `RETURNING` there
    pub fn last_insert_id(&self) -> u64 {
        self.last_insert_id
    }
}

/// Decoding of a whole row into a destination type
///
/// Implemented for tuples of [`FromValue`] types (up to eight columns) and for
/// [`DatabaseRow`] itself. Tuple arity must match the column count.
pub trait FromRow: Sized {
    fn from_row(row: &DatabaseRow) -> Result<Self>;
}

impl FromRow for DatabaseRow {
    fn from_row(row: &DatabaseRow) -> Result<Self> {
        Ok(row.clone())
    }
}

macro_rules! impl_from_row_tuple {
    ($len:expr => $($idx:tt $ty:ident),+) => {
        impl<$($ty: FromValue),+> FromRow for ($($ty,)+) {
            fn from_row(row: &DatabaseRow) -> Result<Self> {
                if row.len() != $len {
                    return Err(DatabaseError::ColumnCount {
                        expected: $len,
                        actual: row.len(),
                    });
                }
                let values = row.values();
                Ok(($($ty::from_value(&values[$idx])?,)+))
            }
        }
    };
}

impl_from_row_tuple!(1 => 0 A);
impl_from_row_tuple!(2 => 0 A, 1 B);
impl_from_row_tuple!(3 => 0 A, 1 B, 2 C);
impl_from_row_tuple!(4 => 0 A, 1 B, 2 C, 3 D);
impl_from_row_tuple!(5 => 0 A, 1 B, 2 C, 3 D, 4 E);
impl_from_row_tuple!(6 => 0 A, 1 B, 2 C, 3 D, 4 E, 5 F);
impl_from_row_tuple!(7 => 0 A, 1 B, 2 C, 3 D, 4 E, 5 F, 6 G);
impl_from_row_tuple!(8 => 0 A, 1 B, 2 C, 3 D, 4 E, 5 F, 6 G, 7 H);

/// Forward-only cursor over a query result
///
/// Rows are fetched before the query call returns, so no driver resource is
/// held by the cursor itself. `close` drops whatever is left.
///
/// ```
/// use gobit_db::{DatabaseValue, Rows};
/// use std::sync::Arc;
///
/// let columns: Arc<[String]> = Arc::from(vec!["id".to_string(), "name".to_string()]);
/// let mut rows = Rows::from_values(
///     columns,
///     vec![vec![DatabaseValue::Long(1), DatabaseValue::from("alice")]],
/// );
/// while rows.advance() {
///     let (id, name): (i64, String) = rows.scan()?;
///     assert_eq!((id, name.as_str()), (1, "alice"));
/// }
/// rows.close();
/// # Ok::<(), gobit_db::DatabaseError>(())
/// ```
#[derive(Debug, Clone)]
pub struct Rows {
    columns: Arc<[String]>,
    pending: VecDeque<DatabaseRow>,
    current: Option<DatabaseRow>,
    closed: bool,
}

impl Rows {
    /// Build a cursor from decoded rows
    pub fn new(columns: Arc<[String]>, rows: Vec<DatabaseRow>) -> Self {
        Self {
            columns,
            pending: rows.into(),
            current: None,
            closed: false,
        }
    }

    /// Build a cursor from raw values sharing `columns`
    pub fn from_values(columns: Arc<[String]>, rows: Vec<Vec<DatabaseValue>>) -> Self {
        let rows = rows
            .into_iter()
            .map(|values| DatabaseRow::new(Arc::clone(&columns), values))
            .collect();
        Self::new(columns, rows)
    }

    /// Column names of the result
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Move to the next row; `false` once exhausted or closed
    pub fn advance(&mut self) -> bool {
        if self.closed {
            return false;
        }
        self.current = self.pending.pop_front();
        self.current.is_some()
    }

    /// The row the cursor is on
    pub fn current(&self) -> Option<&DatabaseRow> {
        self.current.as_ref()
    }

    /// Decode the current row into `T`
    pub fn scan<T: FromRow>(&self) -> Result<T> {
        let row = self.current.as_ref().ok_or(DatabaseError::NoCurrentRow)?;
        T::from_row(row)
    }

    /// Decode one column of the current row
    pub fn get<T: FromValue>(&self, column: &str) -> Result<T> {
        self.current
            .as_ref()
            .ok_or(DatabaseError::NoCurrentRow)?
            .try_get(column)
    }

    /// Rows not yet visited
    pub fn remaining(&self) -> usize {
        if self.closed {
            0
        } else {
            self.pending.len()
        }
    }

    /// Release the cursor; idempotent
    pub fn close(&mut self) {
        self.closed = true;
        self.current = None;
        self.pending.clear();
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Take the rows not yet visited
    pub fn into_rows(self) -> Vec<DatabaseRow> {
        self.pending.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows() -> Rows {
        let columns: Arc<[String]> = Arc::from(vec!["id".to_string(), "name".to_string()]);
        Rows::from_values(
            columns,
            vec![
                vec![DatabaseValue::Long(1), "alice".into()],
                vec![DatabaseValue::Long(2), DatabaseValue::Null],
            ],
        )
    }

    #[test]
    fn test_advance_and_scan() {
        let mut rows = rows();
        assert!(matches!(
            rows.scan::<(i64, String)>(),
            Err(DatabaseError::NoCurrentRow)
        ));

        assert!(rows.advance());
        let (id, name): (i64, String) = rows.scan().unwrap();
        assert_eq!((id, name.as_str()), (1, "alice"));

        assert!(rows.advance());
        let (id, name): (i64, Option<String>) = rows.scan().unwrap();
        assert_eq!((id, name), (2, None));
        assert_eq!(rows.get::<i64>("id").unwrap(), 2);

        assert!(!rows.advance());
        assert!(rows.current().is_none());
    }

    #[test]
    fn test_scan_arity_mismatch() {
        let mut rows = rows();
        rows.advance();
        assert!(matches!(
            rows.scan::<(i64,)>(),
            Err(DatabaseError::ColumnCount {
                expected: 1,
                actual: 2
            })
        ));
    }

    #[test]
    fn test_close_discards_rows() {
        let mut rows = rows();
        assert_eq!(rows.remaining(), 2);
        rows.advance();
        rows.close();
        assert!(rows.is_closed());
        assert_eq!(rows.remaining(), 0);
        assert!(!rows.advance());
        rows.close();
    }

    #[test]
    fn test_into_rows() {
        let mut rows = rows();
        rows.advance();
        let rest = rows.into_rows();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].columns(), &["id".to_string(), "name".to_string()]);
    }

    #[test]
    fn test_exec_result() {
        let res = ExecResult::new(3, 0);
        assert_eq!(res.rows_affected(), 3);
        assert_eq!(res.last_insert_id(), 0);
    }
}
