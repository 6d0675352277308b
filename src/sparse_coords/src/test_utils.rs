//! Synthetic coordinate generators for tests.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::coordinate::{CoordinateBatch, CoordinateInt};

fn narrow<T: CoordinateInt>(value: i64) -> T {
    T::from_i64(value).expect("test coordinate out of range")
}

/// `n` coordinates of `width` components drawn uniformly from `[0, range)`.
///
/// Duplicates are expected once `n` approaches `range^width`.
pub fn make_random_coordinates<T: CoordinateInt>(
    n: usize,
    width: usize,
    range: i64,
    seed: u64,
) -> CoordinateBatch<T> {
    let mut rng = StdRng::seed_from_u64(seed);
    let data = (0..n * width)
        .map(|_| narrow(rng.gen_range(0..range)))
        .collect();
    CoordinateBatch::from_flat(data, width).expect("width must be positive")
}

/// Every point of the box `[0, extent[0]) x ... x [0, extent[d])`, scaled by
/// `spacing`, first axis varying slowest.
pub fn make_grid_coordinates<T: CoordinateInt>(extent: &[i64], spacing: i64) -> CoordinateBatch<T> {
    let total: i64 = extent.iter().product();
    let mut data = Vec::with_capacity(total as usize * extent.len());
    for flat in 0..total {
        let mut rest = flat;
        let mut coordinate = vec![0i64; extent.len()];
        for axis in (0..extent.len()).rev() {
            coordinate[axis] = (rest % extent[axis]) * spacing;
            rest /= extent[axis];
        }
        data.extend(coordinate.into_iter().map(narrow::<T>));
    }
    CoordinateBatch::from_flat(data, extent.len()).expect("extent must be non-empty")
}

/// Three orthogonal integer planes (XY, YZ, ZX) forming a half cube.
///
/// Points on the shared edges appear more than once, so the batch exercises
/// dedup as well as neighbor search. Each plane has `(length / interval + 1)^2`
/// points.
pub fn make_half_cubic_coordinates<T: CoordinateInt>(
    length: i64,
    interval: i64,
) -> CoordinateBatch<T> {
    let per_line = length / interval + 1;
    let mut data = Vec::with_capacity((3 * per_line * per_line * 3) as usize);
    for i in 0..per_line {
        for j in 0..per_line {
            let u = interval * j;
            let v = interval * i;
            for point in [[u, v, 0], [0, u, v], [u, 0, v]] {
                data.extend(point.into_iter().map(narrow::<T>));
            }
        }
    }
    CoordinateBatch::from_flat(data, 3).expect("width is 3")
}

/// Prefix every coordinate of `batch` with `batch_index`.
pub fn with_batch_index<T: CoordinateInt>(
    batch: &CoordinateBatch<T>,
    batch_index: i64,
) -> CoordinateBatch<T> {
    let width = batch.width() + 1;
    let mut data = Vec::with_capacity(batch.len() * width);
    for row in batch.rows() {
        data.push(narrow(batch_index));
        data.extend_from_slice(row);
    }
    CoordinateBatch::from_flat(data, width).expect("width is positive")
}

/// Concatenate batches of equal width.
pub fn concat<T: CoordinateInt>(batches: &[CoordinateBatch<T>]) -> CoordinateBatch<T> {
    let width = batches.first().map_or(1, CoordinateBatch::width);
    let data = batches
        .iter()
        .flat_map(|b| b.as_flat().iter().copied())
        .collect();
    CoordinateBatch::from_flat(data, width).expect("batches share a width")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_half_cubic_size() {
        let batch = make_half_cubic_coordinates::<i32>(10, 2);
        assert_eq!(batch.len(), 3 * 6 * 6);
        assert_eq!(batch.row(0), &[0, 0, 0]);
    }

    #[test]
    fn test_grid_order() {
        let batch = make_grid_coordinates::<i64>(&[2, 3], 2);
        assert_eq!(
            batch.sorted_rows(),
            batch.rows().map(<[i64]>::to_vec).collect::<Vec<_>>()
        );
        assert_eq!(batch.row(1), &[0, 2]);
        assert_eq!(batch.row(3), &[2, 0]);
    }

    #[test]
    fn test_random_is_seeded() {
        let a = make_random_coordinates::<i32>(50, 4, 10, 5);
        let b = make_random_coordinates::<i32>(50, 4, 10, 5);
        assert_eq!(a, b);
        assert!(a.as_flat().iter().all(|&v| (0..10).contains(&v)));
    }

    #[test]
    fn test_with_batch_index() {
        let batch = with_batch_index(&make_grid_coordinates::<i32>(&[2], 1), 3);
        assert_eq!(batch.as_flat(), &[3, 0, 3, 1]);
    }
}
