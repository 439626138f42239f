//! L4 Result pipeline: queues of rows/chunks behind a backend-neutral `ResultSet`.

pub mod download_manager;
pub mod queue;

use std::sync::Arc;

use crate::error::Error;
use crate::model::ColumnDescription;
use queue::Queue;

/// Logical view owned by a Cursor. Created on successful `execute`,
/// consumed in order by fetch calls, released on cursor close or next execute.
pub struct ResultSet {
    columns: Arc<Vec<ColumnDescription>>,
    queue: Box<dyn Queue>,
    rows_fetched: u64,
    has_more_rows: bool,
}

impl ResultSet {
    #[must_use]
    pub fn new(columns: Vec<ColumnDescription>, queue: Box<dyn Queue>) -> Self {
        Self {
            columns: Arc::new(columns),
            queue,
            rows_fetched: 0,
            has_more_rows: true,
        }
    }

    #[must_use]
    pub fn columns(&self) -> &[ColumnDescription] {
        &self.columns
    }

    #[must_use]
    pub const fn rows_fetched(&self) -> u64 {
        self.rows_fetched
    }

    #[must_use]
    pub const fn has_more_rows(&self) -> bool {
        self.has_more_rows
    }

    /// `fetchone`: `None` at end-of-stream.
    pub async fn fetch_one(&mut self) -> Result<Option<crate::model::Row>, Error> {
        let mut rows = self.queue.next_n(1).await?;
        if rows.is_empty() {
            self.has_more_rows = false;
            return Ok(None);
        }
        self.rows_fetched += 1;
        Ok(Some(rows.remove(0)))
    }

    /// `fetchmany(n)`: `[]` once exhausted.
    pub async fn fetch_many(&mut self, n: usize) -> Result<Vec<crate::model::Row>, Error> {
        let rows = self.queue.next_n(n).await?;
        if rows.len() < n {
            self.has_more_rows = false;
        }
        self.rows_fetched += rows.len() as u64;
        Ok(rows)
    }

    /// `fetchall`: drains the rest of the result set.
    pub async fn fetch_all(&mut self) -> Result<Vec<crate::model::Row>, Error> {
        let rows = self.queue.remaining().await?;
        self.has_more_rows = false;
        self.rows_fetched += rows.len() as u64;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Row, Value};
    use queue::InlineRowQueue;

    fn columns() -> Vec<ColumnDescription> {
        vec![ColumnDescription {
            name: "n".into(),
            type_name: "int".into(),
            precision: None,
            scale: None,
            nullable: false,
        }]
    }

    #[tokio::test]
    async fn fetchmany_concatenation_yields_all_rows_in_order() {
        let cols = Arc::new(columns());
        let rows: Vec<Row> = (0..7).map(|i| Row::new(vec![Value::Int(i)], Arc::clone(&cols))).collect();
        let mut result_set = ResultSet::new(columns(), Box::new(InlineRowQueue::new(rows)));

        let mut collected = Vec::new();
        loop {
            let batch = result_set.fetch_many(3).await.unwrap();
            if batch.is_empty() {
                break;
            }
            collected.extend(batch);
        }

        assert_eq!(collected.len(), 7);
        for (i, row) in collected.iter().enumerate() {
            assert_eq!(row.get(0), Some(&Value::Int(i as i32)));
        }
        assert!(!result_set.has_more_rows());
    }

    #[tokio::test]
    async fn fetchone_returns_none_at_end_of_stream() {
        let cols = Arc::new(columns());
        let rows = vec![Row::new(vec![Value::Int(1)], cols)];
        let mut result_set = ResultSet::new(columns(), Box::new(InlineRowQueue::new(rows)));
        assert!(result_set.fetch_one().await.unwrap().is_some());
        assert!(result_set.fetch_one().await.unwrap().is_none());
    }
}
