//! Integer coordinate vectors and row-major coordinate batches.
//!
//! A coordinate is a fixed-width slice of signed integers. Batches store `N`
//! coordinates back to back (`N * width` values), which is also the layout the
//! index keeps internally and the layout handed to numeric consumers.

use std::fmt::{Debug, Display};
use std::hash::Hash;

use crate::error::{CoordinateError, Result};

/// Integer type usable as a coordinate component.
///
/// Candidate coordinates are computed in `i64` and narrowed back with
/// [`CoordinateInt::from_i64`]; a value that does not fit is treated as absent.
pub trait CoordinateInt:
    Copy + Ord + Hash + Default + Debug + Display + Send + Sync + 'static
{
    /// Zero value.
    const ZERO: Self;

    /// Widen to `i64`.
    fn to_i64(self) -> i64;

    /// Narrow from `i64`, `None` when out of range.
    fn from_i64(value: i64) -> Option<Self>;

    /// Floor division (rounds towards negative infinity).
    fn floor_div(self, divisor: Self) -> Self;
}

macro_rules! impl_coordinate_int {
    ($($ty:ty),*) => {
        $(
            impl CoordinateInt for $ty {
                const ZERO: Self = 0;

                #[inline]
                fn to_i64(self) -> i64 {
                    self as i64
                }

                #[inline]
                fn from_i64(value: i64) -> Option<Self> {
                    <$ty>::try_from(value).ok()
                }

                #[inline]
                fn floor_div(self, divisor: Self) -> Self {
                    let q = self / divisor;
                    if (self % divisor != 0) && ((self < 0) != (divisor < 0)) {
                        q - 1
                    } else {
                        q
                    }
                }
            }
        )*
    };
}

impl_coordinate_int!(i32, i64);

/// Row-major `N x width` coordinate batch.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CoordinateBatch<T> {
    data: Vec<T>,
    width: usize,
}

impl<T: CoordinateInt> CoordinateBatch<T> {
    /// Empty batch of the given width.
    pub fn empty(width: usize) -> Self {
        Self {
            data: Vec::new(),
            width,
        }
    }

    /// Decode a flat buffer into rows of `width` values.
    pub fn from_flat(data: Vec<T>, width: usize) -> Result<Self> {
        if width == 0 || data.len() % width != 0 {
            return Err(CoordinateError::InvalidCoordinateSize {
                len: data.len(),
                width,
            });
        }
        Ok(Self { data, width })
    }

    /// Build a batch from individual rows; all rows must share one width.
    pub fn from_rows<R: AsRef<[T]>>(rows: &[R]) -> Result<Self> {
        let width = rows.first().map_or(0, |r| r.as_ref().len());
        let mut data = Vec::with_capacity(rows.len() * width);
        for row in rows {
            let row = row.as_ref();
            if row.len() != width {
                return Err(CoordinateError::InvalidCoordinateSize {
                    len: row.len(),
                    width,
                });
            }
            data.extend_from_slice(row);
        }
        if width == 0 {
            return Err(CoordinateError::InvalidCoordinateSize { len: 0, width: 0 });
        }
        Ok(Self { data, width })
    }

    /// Check that the batch can be decoded for an index of width `width`.
    pub fn expect_width(&self, width: usize) -> Result<()> {
        if self.width != width {
            return Err(CoordinateError::InvalidCoordinateSize {
                len: self.data.len(),
                width,
            });
        }
        Ok(())
    }

    /// Number of components per row.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        if self.width == 0 {
            0
        } else {
            self.data.len() / self.width
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Coordinate at `row`.
    ///
    /// Panics if `row >= len()`.
    pub fn row(&self, row: usize) -> &[T] {
        &self.data[row * self.width..(row + 1) * self.width]
    }

    /// Iterate over rows in order.
    pub fn rows(&self) -> impl ExactSizeIterator<Item = &[T]> + '_ {
        self.data.chunks_exact(self.width.max(1))
    }

    /// Append one row. The caller guarantees the width.
    pub(crate) fn push(&mut self, row: &[T]) {
        debug_assert_eq!(row.len(), self.width);
        self.data.extend_from_slice(row);
    }

    pub fn as_flat(&self) -> &[T] {
        &self.data
    }

    pub fn into_flat(self) -> Vec<T> {
        self.data
    }

    /// Rows sorted lexicographically; used to compare coordinate sets.
    pub fn sorted_rows(&self) -> Vec<Vec<T>> {
        let mut rows: Vec<Vec<T>> = self.rows().map(<[T]>::to_vec).collect();
        rows.sort_unstable();
        rows
    }
}
