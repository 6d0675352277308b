//! Deduplicating coordinate index.
//!
//! Maps each unique coordinate to a dense row in `[0, N)`. Rows are assigned
//! in order of first appearance and never change afterwards; new coordinates
//! only ever append.
//!
//! # Insertion
//!
//! Insertion is split in two phases:
//! 1. Dedup (backend, parallel): decide which input rows carry coordinates
//!    unknown to the index and order them by first occurrence.
//! 2. Numbering (here, sequential): append those coordinates in that order.
//!
//! Because phase 2 only consumes the ordered result of phase 1, the final
//! row-to-coordinate association does not depend on thread scheduling.

use std::collections::HashMap;

use rayon::prelude::*;

use crate::backend::{Claim, CoordinateBackend};
use crate::coordinate::{CoordinateBatch, CoordinateInt};
use crate::error::{CoordinateError, Result};

/// Result of [`CoordinateIndex::insert_batch`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InsertOutcome {
    /// Row of every input coordinate, existing or new (the inverse map).
    pub rows: Vec<u32>,
    /// For each row appended by this call, the first input row that produced it.
    pub mapping: Vec<u32>,
}

impl InsertOutcome {
    /// Number of rows appended by the insertion.
    pub fn num_new(&self) -> usize {
        self.mapping.len()
    }
}

/// Hash index from coordinates to dense rows.
#[derive(Debug, Clone)]
pub struct CoordinateIndex<T> {
    coordinates: CoordinateBatch<T>,
    rows: HashMap<Box<[T]>, u32>,
}

impl<T: CoordinateInt> CoordinateIndex<T> {
    /// Create an empty index whose coordinates have `width` components.
    pub fn new(width: usize) -> Self {
        Self {
            coordinates: CoordinateBatch::empty(width),
            rows: HashMap::new(),
        }
    }

    /// Build an index from a batch in one step.
    pub fn from_batch<B: CoordinateBackend<T>>(
        batch: &CoordinateBatch<T>,
        backend: &B,
    ) -> Result<(Self, InsertOutcome)> {
        let mut index = Self::new(batch.width());
        let outcome = index.insert_batch(batch, backend)?;
        Ok((index, outcome))
    }

    /// Number of components per coordinate.
    pub fn width(&self) -> usize {
        self.coordinates.width()
    }

    /// Number of unique coordinates.
    pub fn len(&self) -> usize {
        self.coordinates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coordinates.is_empty()
    }

    /// Row of `coordinate`, if present.
    #[inline]
    pub fn lookup(&self, coordinate: &[T]) -> Option<u32> {
        self.rows.get(coordinate).copied()
    }

    pub fn contains(&self, coordinate: &[T]) -> bool {
        self.rows.contains_key(coordinate)
    }

    /// Coordinate stored at `row`.
    ///
    /// Panics if `row >= len()`.
    pub fn coordinate(&self, row: u32) -> &[T] {
        self.coordinates.row(row as usize)
    }

    /// All coordinates in row order.
    pub fn coordinates(&self) -> &CoordinateBatch<T> {
        &self.coordinates
    }

    /// Iterate over `(row, coordinate)` in row order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &[T])> + '_ {
        self.coordinates
            .rows()
            .enumerate()
            .map(|(row, coordinate)| (row as u32, coordinate))
    }

    /// Component-wise minimum and maximum over all coordinates.
    pub fn bounds(&self) -> Option<(Vec<T>, Vec<T>)> {
        let mut rows = self.coordinates.rows();
        let first = rows.next()?;
        let mut min = first.to_vec();
        let mut max = first.to_vec();
        for coordinate in rows {
            for (axis, &value) in coordinate.iter().enumerate() {
                min[axis] = min[axis].min(value);
                max[axis] = max[axis].max(value);
            }
        }
        Some((min, max))
    }

    /// Insert a batch, deduplicating against the batch itself and the index.
    ///
    /// Fails with [`CoordinateError::ArityMismatch`] before mutating anything if
    /// the batch width differs from the index width.
    pub fn insert_batch<B: CoordinateBackend<T>>(
        &mut self,
        batch: &CoordinateBatch<T>,
        backend: &B,
    ) -> Result<InsertOutcome> {
        if batch.width() != self.width() {
            return Err(CoordinateError::ArityMismatch {
                expected: self.width(),
                actual: batch.width(),
            });
        }
        if batch.is_empty() {
            return Ok(InsertOutcome::default());
        }

        let plan = backend.dedup(self, batch)?;

        let base = self.len() as u32;
        self.rows.reserve(plan.new_rows.len());
        for &input_row in &plan.new_rows {
            self.append_unique(batch.row(input_row as usize));
        }

        let rows = plan
            .claims
            .par_iter()
            .map(|claim| match *claim {
                Claim::Existing(row) => row,
                Claim::New(rank) => base + rank,
            })
            .collect();

        Ok(InsertOutcome {
            rows,
            mapping: plan.new_rows,
        })
    }

    fn append_unique(&mut self, coordinate: &[T]) -> u32 {
        let row = self.len() as u32;
        debug_assert!(!self.rows.contains_key(coordinate));
        self.coordinates.push(coordinate);
        self.rows.insert(coordinate.into(), row);
        row
    }
}
