//! Result queue variants: three concrete types behind one `next_n`/`remaining`
//! capability.

use std::sync::Arc;

use arrow::array::{Array, ArrayRef};
use arrow::datatypes::DataType;
use arrow::ipc::reader::StreamReader;

use crate::error::Error;
use crate::model::{ColumnDescription, Row, Value};
use crate::result::download_manager::DownloadManager;

/// Common capability over the three queue variants.
#[async_trait::async_trait]
pub trait Queue: Send {
    /// Returns up to `n` rows, fewer at end-of-stream, `[]` once exhausted.
    async fn next_n(&mut self, n: usize) -> Result<Vec<Row>, Error>;

    /// Drains and returns every remaining row.
    async fn remaining(&mut self) -> Result<Vec<Row>, Error> {
        self.next_n(usize::MAX).await
    }
}

/// Simple list of already-materialized rows; advances a cursor.
pub struct InlineRowQueue {
    rows: Vec<Row>,
    position: usize,
}

impl InlineRowQueue {
    #[must_use]
    pub const fn new(rows: Vec<Row>) -> Self {
        Self { rows, position: 0 }
    }
}

#[async_trait::async_trait]
impl Queue for InlineRowQueue {
    async fn next_n(&mut self, n: usize) -> Result<Vec<Row>, Error> {
        let end = (self.position + n).min(self.rows.len());
        let slice = self.rows[self.position..end].to_vec();
        self.position = end;
        Ok(slice)
    }
}

/// Wraps a columnar Arrow table and slices it on demand; rows are converted to native values
/// on read.
pub struct ArrowQueue {
    batches: Vec<arrow::record_batch::RecordBatch>,
    columns: Arc<Vec<ColumnDescription>>,
    batch_index: usize,
    row_in_batch: usize,
}

impl ArrowQueue {
    #[must_use]
    pub fn new(batches: Vec<arrow::record_batch::RecordBatch>, columns: Arc<Vec<ColumnDescription>>) -> Self {
        Self {
            batches,
            columns,
            batch_index: 0,
            row_in_batch: 0,
        }
    }

    /// Decodes a single Arrow IPC stream buffer into an `ArrowQueue`.
    pub fn from_ipc_stream(bytes: &[u8], columns: Arc<Vec<ColumnDescription>>) -> Result<Self, Error> {
        let reader = StreamReader::try_new(std::io::Cursor::new(bytes), None)
            .map_err(|e| Error::data(format!("invalid arrow ipc stream: {e}")))?;
        let mut batches = Vec::new();
        for batch in reader {
            batches.push(batch.map_err(|e| Error::data(format!("arrow batch decode failed: {e}")))?);
        }
        Ok(Self::new(batches, columns))
    }
}

#[async_trait::async_trait]
impl Queue for ArrowQueue {
    async fn next_n(&mut self, n: usize) -> Result<Vec<Row>, Error> {
        let mut out = Vec::with_capacity(n.min(1024));
        while out.len() < n {
            let Some(batch) = self.batches.get(self.batch_index) else {
                break;
            };
            if self.row_in_batch >= batch.num_rows() {
                self.batch_index += 1;
                self.row_in_batch = 0;
                continue;
            }
            out.push(arrow_row_to_native(batch, self.row_in_batch, &self.columns)?);
            self.row_in_batch += 1;
        }
        Ok(out)
    }
}

fn arrow_row_to_native(
    batch: &arrow::record_batch::RecordBatch,
    row: usize,
    columns: &Arc<Vec<ColumnDescription>>,
) -> Result<Row, Error> {
    let mut values = Vec::with_capacity(batch.num_columns());
    for column in batch.columns() {
        values.push(arrow_value_at(column, row)?);
    }
    Ok(Row::new(values, Arc::clone(columns)))
}

/// Default native Arrow-to-value conversion. Callers needing to bypass this for a
/// specific column type supply an override map at the `ResultSet` level; this is the fallback
/// used when no override applies.
fn arrow_value_at(column: &ArrayRef, row: usize) -> Result<Value, Error> {
    use arrow::array::*;

    if column.is_null(row) {
        return Ok(Value::Null);
    }

    Ok(match column.data_type() {
        DataType::Boolean => Value::Boolean(column.as_any().downcast_ref::<BooleanArray>().unwrap().value(row)),
        DataType::Int8 => Value::TinyInt(column.as_any().downcast_ref::<Int8Array>().unwrap().value(row)),
        DataType::Int16 => Value::SmallInt(column.as_any().downcast_ref::<Int16Array>().unwrap().value(row)),
        DataType::Int32 => Value::Int(column.as_any().downcast_ref::<Int32Array>().unwrap().value(row)),
        DataType::Int64 => Value::BigInt(column.as_any().downcast_ref::<Int64Array>().unwrap().value(row)),
        DataType::Float32 => Value::Float(column.as_any().downcast_ref::<Float32Array>().unwrap().value(row)),
        DataType::Float64 => Value::Double(column.as_any().downcast_ref::<Float64Array>().unwrap().value(row)),
        DataType::Utf8 => Value::String(column.as_any().downcast_ref::<StringArray>().unwrap().value(row).to_string()),
        DataType::LargeUtf8 => {
            Value::String(column.as_any().downcast_ref::<LargeStringArray>().unwrap().value(row).to_string())
        }
        DataType::Binary => Value::Binary(column.as_any().downcast_ref::<BinaryArray>().unwrap().value(row).to_vec()),
        DataType::Date32 => {
            let days = column.as_any().downcast_ref::<Date32Array>().unwrap().value(row);
            Value::Date(
                chrono::DateTime::from_timestamp(i64::from(days) * 86_400, 0)
                    .map(|dt| dt.date_naive())
                    .ok_or_else(|| Error::data("date32 out of range"))?,
            )
        }
        DataType::Timestamp(unit, tz) => {
            let micros = timestamp_micros(column, row, unit)?;
            let dt = chrono::DateTime::from_timestamp_micros(micros)
                .ok_or_else(|| Error::data("timestamp out of range"))?;
            if tz.is_some() {
                Value::TimestampAware(dt)
            } else {
                Value::TimestampNaive(dt.naive_utc())
            }
        }
        DataType::Decimal128(precision, scale) => {
            let array = column.as_any().downcast_ref::<Decimal128Array>().unwrap();
            let scale = u32::try_from(*scale).unwrap_or(0);
            Value::Decimal {
                unscaled: format_decimal(array.value(row), scale),
                precision: u32::from(*precision),
                scale,
            }
        }
        other => return Err(Error::not_supported(format!("unsupported arrow type in row conversion: {other:?}"))),
    })
}

/// Renders Arrow's raw unscaled `i128` into the same decimal-point-inserted text the SEA/JSON
/// path produces (`Value::Decimal.unscaled` carries a formatted literal, not raw digits,
/// regardless of origin backend).
fn format_decimal(raw: i128, scale: u32) -> String {
    if scale == 0 {
        return raw.to_string();
    }
    let scale = scale as usize;
    let negative = raw < 0;
    let mut digits = raw.unsigned_abs().to_string();
    if digits.len() <= scale {
        digits = format!("{:0>width$}", digits, width = scale + 1);
    }
    let split_at = digits.len() - scale;
    let (int_part, frac_part) = digits.split_at(split_at);
    format!("{}{int_part}.{frac_part}", if negative { "-" } else { "" })
}

fn timestamp_micros(column: &ArrayRef, row: usize, unit: &arrow::datatypes::TimeUnit) -> Result<i64, Error> {
    use arrow::array::*;
    use arrow::datatypes::TimeUnit;

    Ok(match unit {
        TimeUnit::Second => column.as_any().downcast_ref::<TimestampSecondArray>().unwrap().value(row) * 1_000_000,
        TimeUnit::Millisecond => {
            column.as_any().downcast_ref::<TimestampMillisecondArray>().unwrap().value(row) * 1_000
        }
        TimeUnit::Microsecond => column.as_any().downcast_ref::<TimestampMicrosecondArray>().unwrap().value(row),
        TimeUnit::Nanosecond => {
            column.as_any().downcast_ref::<TimestampNanosecondArray>().unwrap().value(row) / 1_000
        }
    })
}

/// Pulls chunks from a [`DownloadManager`]; each dequeued chunk flows through `ArrowQueue`
/// semantics until exhausted, then the next chunk is pulled.
pub struct CloudFetchQueue {
    manager: Arc<DownloadManager>,
    columns: Arc<Vec<ColumnDescription>>,
    current: Option<ArrowQueue>,
    next_row_offset: u64,
}

impl CloudFetchQueue {
    #[must_use]
    pub const fn new(manager: Arc<DownloadManager>, columns: Arc<Vec<ColumnDescription>>) -> Self {
        Self {
            manager,
            columns,
            current: None,
            next_row_offset: 0,
        }
    }

    async fn ensure_current(&mut self) -> Result<bool, Error> {
        loop {
            if let Some(queue) = &mut self.current {
                if !queue.batches.is_empty() && queue.batch_index < queue.batches.len() {
                    return Ok(true);
                }
            }
            let chunk = match self.manager.next(self.next_row_offset).await {
                Ok(chunk) => chunk,
                Err(e) if matches!(e, Error::Operational(ref m) if m.contains("shut down")) => return Ok(false),
                Err(e) => return Err(e),
            };
            self.next_row_offset = chunk.start_row_offset + chunk.row_count;
            self.current = Some(ArrowQueue::from_ipc_stream(&chunk.data, Arc::clone(&self.columns))?);
        }
    }
}

#[async_trait::async_trait]
impl Queue for CloudFetchQueue {
    async fn next_n(&mut self, n: usize) -> Result<Vec<Row>, Error> {
        let mut out = Vec::new();
        while out.len() < n {
            if !self.ensure_current().await? {
                break;
            }
            let queue = self.current.as_mut().expect("ensure_current guarantees Some");
            let remaining_needed = n - out.len();
            let mut batch = queue.next_n(remaining_needed).await?;
            if batch.is_empty() {
                // current chunk exhausted; force re-pull on next loop iteration
                queue.batch_index = queue.batches.len();
                continue;
            }
            out.append(&mut batch);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_row(v: i32) -> Row {
        Row::new(vec![Value::Int(v)], Arc::new(Vec::new()))
    }

    #[test]
    fn format_decimal_inserts_point_per_scale() {
        assert_eq!(format_decimal(12345, 2), "123.45");
        assert_eq!(format_decimal(-12345, 2), "-123.45");
        assert_eq!(format_decimal(5, 2), "0.05");
        assert_eq!(format_decimal(12345, 0), "12345");
    }

    #[tokio::test]
    async fn inline_queue_advances_cursor() {
        let mut queue = InlineRowQueue::new(vec![make_row(1), make_row(2), make_row(3)]);
        let first = queue.next_n(2).await.unwrap();
        assert_eq!(first.len(), 2);
        let second = queue.next_n(2).await.unwrap();
        assert_eq!(second.len(), 1);
        let third = queue.next_n(2).await.unwrap();
        assert!(third.is_empty());
    }

    #[tokio::test]
    async fn inline_queue_remaining_drains_fully() {
        let mut queue = InlineRowQueue::new(vec![make_row(1), make_row(2)]);
        let all = queue.remaining().await.unwrap();
        assert_eq!(all.len(), 2);
    }
}
