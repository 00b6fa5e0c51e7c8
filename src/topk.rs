//! Top-K ranking over columnar views
//!
//! **Problem**: the dashboard's "top items by value" card only needs K rows,
//! and a full sort of the inventory is O(N log N).
//!
//! **Solution**: bounded-heap selection, O(N log K), with deterministic
//! tie-breaking (earlier rows rank first among equal keys) so the same
//! upload always renders the same ranking.
//!
//! Toyota Way Principles:
//! - **Muda elimination**: never sort rows that are not displayed
//! - **Poka-Yoke**: nulls never outrank a real value; they are appended last
//!   only when K exceeds the number of non-null rows

use crate::Error;
use arrow::array::{
    Array, ArrayRef, Date32Array, Float64Array, Int64Array, StringArray, UInt32Array, UInt64Array,
};
use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Sort order for Top-K selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    /// Ascending order (smallest K values)
    Ascending,
    /// Descending order (largest K values)
    Descending,
}

/// Trait for Top-K selection on record batches
pub trait TopKSelection {
    /// Select top K rows by a specific column
    ///
    /// # Arguments
    /// * `column_index` - Index of the column to rank by
    /// * `k` - Number of rows to select
    /// * `order` - Sort order (Ascending or Descending)
    ///
    /// # Errors
    /// Returns error if:
    /// - Column index is out of bounds
    /// - Column data type is not rankable
    /// - K is zero
    ///
    /// # Examples
    ///
    /// ```rust
    /// use chainsight::topk::{TopKSelection, SortOrder};
    /// use arrow::array::{Float64Array, RecordBatch};
    /// use arrow::datatypes::{DataType, Field, Schema};
    /// use std::sync::Arc;
    ///
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let schema = Arc::new(Schema::new(vec![
    ///     Field::new("total_value", DataType::Float64, false),
    /// ]));
    /// let batch = RecordBatch::try_new(
    ///     schema,
    ///     vec![Arc::new(Float64Array::from(vec![20.0, 0.0, 35.5, 12.0]))],
    /// )?;
    ///
    /// let top2 = batch.top_k(0, 2, SortOrder::Descending)?;
    /// assert_eq!(top2.num_rows(), 2);
    /// # Ok(())
    /// # }
    /// ```
    fn top_k(&self, column_index: usize, k: usize, order: SortOrder) -> crate::Result<RecordBatch>;

    /// Select top K rows by column name
    ///
    /// # Errors
    /// Returns [`Error::InvalidInput`] if no column has that name, otherwise
    /// as [`top_k`](Self::top_k)
    fn top_k_by_name(&self, column: &str, k: usize, order: SortOrder) -> crate::Result<RecordBatch>;
}

impl TopKSelection for RecordBatch {
    fn top_k(&self, column_index: usize, k: usize, order: SortOrder) -> crate::Result<RecordBatch> {
        if k == 0 {
            return Err(Error::InvalidInput("k must be greater than 0".to_string()));
        }

        if column_index >= self.num_columns() {
            return Err(Error::InvalidInput(format!(
                "Column index {} out of bounds (batch has {} columns)",
                column_index,
                self.num_columns()
            )));
        }

        let indices = select_top_k_indices(self.column(column_index), k, order)?;
        build_batch_from_indices(self, &indices)
    }

    fn top_k_by_name(&self, column: &str, k: usize, order: SortOrder) -> crate::Result<RecordBatch> {
        let index = self
            .schema()
            .index_of(column)
            .map_err(|_| Error::InvalidInput(format!("No column named '{column}' to rank by")))?;
        self.top_k(index, k, order)
    }
}

/// Dispatch on the column type and select row indices in rank order
fn select_top_k_indices(column: &ArrayRef, k: usize, order: SortOrder) -> crate::Result<Vec<usize>> {
    match column.data_type() {
        DataType::Int64 => {
            let array = downcast::<Int64Array>(column, "Int64")?;
            Ok(select_ranked(array.iter(), k, order))
        }
        DataType::UInt64 => {
            let array = downcast::<UInt64Array>(column, "UInt64")?;
            Ok(select_ranked(array.iter(), k, order))
        }
        DataType::Float64 => {
            let array = downcast::<Float64Array>(column, "Float64")?;
            // NaN has no rank; treat it like a null
            Ok(select_ranked(
                array.iter().map(|v| v.filter(|x| !x.is_nan())),
                k,
                order,
            ))
        }
        DataType::Date32 => {
            let array = downcast::<Date32Array>(column, "Date32")?;
            Ok(select_ranked(array.iter(), k, order))
        }
        DataType::Utf8 => {
            let array = downcast::<StringArray>(column, "Utf8")?;
            Ok(select_ranked(array.iter(), k, order))
        }
        dt => Err(Error::InvalidInput(format!(
            "Top-K not supported for data type: {dt:?}"
        ))),
    }
}

fn downcast<'a, A: Array + 'static>(column: &'a ArrayRef, name: &str) -> crate::Result<&'a A> {
    column
        .as_any()
        .downcast_ref::<A>()
        .ok_or_else(|| Error::Other(format!("Failed to downcast {name} column")))
}

/// Heap entry; `Ord` puts the worst-ranked entry on top of the max-heap
#[derive(Debug)]
struct Ranked<V> {
    value: V,
    index: usize,
    order: SortOrder,
}

impl<V: PartialOrd> Ranked<V> {
    /// `Less` when `self` ranks ahead of `other`
    fn rank_cmp(&self, other: &Self) -> Ordering {
        let by_value = match self.order {
            SortOrder::Descending => other.value.partial_cmp(&self.value),
            SortOrder::Ascending => self.value.partial_cmp(&other.value),
        }
        .unwrap_or(Ordering::Equal);
        by_value.then_with(|| self.index.cmp(&other.index))
    }
}

impl<V: PartialOrd> PartialEq for Ranked<V> {
    fn eq(&self, other: &Self) -> bool {
        self.rank_cmp(other) == Ordering::Equal
    }
}

impl<V: PartialOrd> Eq for Ranked<V> {}

impl<V: PartialOrd> Ord for Ranked<V> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank_cmp(other)
    }
}

impl<V: PartialOrd> PartialOrd for Ranked<V> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Bounded-heap selection over nullable values
///
/// Time complexity: O(N log K), space O(K)
fn select_ranked<V, I>(values: I, k: usize, order: SortOrder) -> Vec<usize>
where
    V: PartialOrd,
    I: Iterator<Item = Option<V>>,
{
    let mut heap: BinaryHeap<Ranked<V>> = BinaryHeap::with_capacity(k + 1);
    let mut nulls = Vec::new();

    for (index, value) in values.enumerate() {
        let Some(value) = value else {
            if nulls.len() < k {
                nulls.push(index);
            }
            continue;
        };
        let item = Ranked { value, index, order };
        if heap.len() < k {
            heap.push(item);
        } else if heap
            .peek()
            .is_some_and(|worst| item.rank_cmp(worst) == Ordering::Less)
        {
            heap.pop();
            heap.push(item);
        }
    }

    let mut selected: Vec<usize> = heap.into_sorted_vec().into_iter().map(|r| r.index).collect();
    let room = k.saturating_sub(selected.len());
    selected.extend(nulls.into_iter().take(room));
    selected
}

/// Build a new record batch from selected row indices
fn build_batch_from_indices(batch: &RecordBatch, indices: &[usize]) -> crate::Result<RecordBatch> {
    let indices = indices
        .iter()
        .map(|&i| u32::try_from(i))
        .collect::<std::result::Result<Vec<u32>, _>>()
        .map_err(|_| Error::InvalidInput("batch too large for Top-K selection".to_string()))?;
    let indices = UInt32Array::from(indices);
    Ok(arrow::compute::take_record_batch(batch, &indices)?)
}
