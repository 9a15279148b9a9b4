use alloc::format;
use alloc::vec;
use alloc::vec::Vec;

use super::{with_value_pair, ArrayValues, DataType, Element};
use crate::error::{Error, Result};

/// Row-major N-dimensional array of a single element type.
///
/// A rank-0 array has an empty shape and holds exactly one value.
#[derive(Debug, Clone, PartialEq)]
pub struct Array {
    shape: Vec<usize>,
    values: ArrayValues,
}

impl Array {
    /// Creates an array from a shape and row-major values.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the number of values does not
    /// match the product of the shape.
    pub fn new<T: Element>(shape: Vec<usize>, values: Vec<T>) -> Result<Self> {
        Self::from_values(shape, T::wrap(values))
    }

    /// Creates an array from already tagged values.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] on a length/shape mismatch or a
    /// shape whose element count does not fit in memory.
    pub fn from_values(shape: Vec<usize>, values: ArrayValues) -> Result<Self> {
        let expected = checked_element_count(&shape).ok_or_else(|| {
            Error::InvalidArgument(format!("shape {shape:?} has too many elements"))
        })?;
        if values.len() != expected {
            return Err(Error::InvalidArgument(format!(
                "shape {shape:?} needs {expected} values, got {}",
                values.len()
            )));
        }
        Ok(Self { shape, values })
    }

    /// One-dimensional array over `values`.
    #[must_use]
    pub fn from_vec<T: Element>(values: Vec<T>) -> Self {
        Self {
            shape: vec![values.len()],
            values: T::wrap(values),
        }
    }

    /// Rank-0 array holding a single value.
    #[must_use]
    pub fn scalar<T: Element>(value: T) -> Self {
        Self {
            shape: Vec::new(),
            values: T::wrap(vec![value]),
        }
    }

    /// Array of default values.
    #[must_use]
    pub fn empty(data_type: DataType, shape: Vec<usize>) -> Self {
        let len = element_count(&shape);
        Self {
            shape,
            values: ArrayValues::filled(data_type, len),
        }
    }

    #[must_use]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    #[must_use]
    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    #[must_use]
    pub const fn data_type(&self) -> DataType {
        self.values.data_type()
    }

    #[must_use]
    pub const fn values(&self) -> &ArrayValues {
        &self.values
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Typed view over the row-major values.
    #[must_use]
    pub fn as_slice<T: Element>(&self) -> Option<&[T]> {
        T::view(&self.values)
    }

    /// Typed copy of the row-major values.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] if `T` is not the element type.
    pub fn to_vec<T: Element>(&self) -> Result<Vec<T>> {
        self.as_slice::<T>()
            .map(<[T]>::to_vec)
            .ok_or(Error::TypeMismatch {
                expected: T::DATA_TYPE,
                actual: self.data_type(),
            })
    }

    /// Copies the region `[origin, origin + shape)` into a new array.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the region has the wrong rank or
    /// leaves the bounds of this array.
    pub fn slice(&self, origin: &[usize], shape: &[usize]) -> Result<Self> {
        check_rank(self.rank(), origin.len(), "origin")?;
        check_rank(self.rank(), shape.len(), "shape")?;
        for (i, ((o, s), bound)) in origin.iter().zip(shape).zip(&self.shape).enumerate() {
            if !o.checked_add(*s).is_some_and(|end| end <= *bound) {
                return Err(Error::InvalidArgument(format!(
                    "region {origin:?}+{shape:?} exceeds array shape {:?} along dimension {i}",
                    self.shape
                )));
            }
        }
        let mut out = Self::empty(self.data_type(), shape.to_vec());
        let zero = vec![0; shape.len()];
        with_value_pair!(
            (&mut out.values, &self.values),
            (dst, src) => copy_region(src, &self.shape, origin, dst, shape, &zero, shape),
            _ => unreachable!("slice output shares the source element type")
        );
        Ok(out)
    }

    /// Writes `data` at `origin`, growing this array with default values when
    /// the written region reaches past the current shape.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] for a different element type and
    /// [`Error::InvalidArgument`] for a rank mismatch or a region past the
    /// addressable range.
    pub fn write(&mut self, origin: &[usize], data: &Self) -> Result<()> {
        if data.data_type() != self.data_type() {
            return Err(Error::TypeMismatch {
                expected: self.data_type(),
                actual: data.data_type(),
            });
        }
        check_rank(self.rank(), origin.len(), "origin")?;
        check_rank(self.rank(), data.rank(), "data")?;

        let needed = self
            .shape
            .iter()
            .zip(origin.iter().zip(&data.shape))
            .map(|(current, (o, s))| match (*s, o.checked_add(*s)) {
                (0, _) => Some(*current),
                (_, end) => end.map(|end| (*current).max(end)),
            })
            .collect::<Option<Vec<usize>>>()
            .filter(|needed| checked_element_count(needed).is_some())
            .ok_or_else(|| {
                Error::InvalidArgument(format!(
                    "write of {:?} at {origin:?} is out of range",
                    data.shape
                ))
            })?;
        if needed != self.shape {
            self.resize(&needed);
        }

        let zero = vec![0; data.rank()];
        let shape = self.shape.clone();
        with_value_pair!(
            (&mut self.values, &data.values),
            (dst, src) => copy_region(src, &data.shape, &zero, dst, &shape, origin, &data.shape),
            _ => unreachable!("element types checked above")
        );
        Ok(())
    }

    /// Grows the array to `new_shape`, keeping existing values at their indices.
    ///
    /// Dimensions never shrink; `new_shape` components smaller than the
    /// current ones are ignored.
    pub fn resize(&mut self, new_shape: &[usize]) {
        let target: Vec<usize> = self
            .shape
            .iter()
            .zip(new_shape)
            .map(|(a, b)| (*a).max(*b))
            .collect();
        if target == self.shape {
            return;
        }
        let mut grown = Self::empty(self.data_type(), target);
        let zero = vec![0; self.rank()];
        let grown_shape = grown.shape.clone();
        with_value_pair!(
            (&mut grown.values, &self.values),
            (dst, src) => copy_region(src, &self.shape, &zero, dst, &grown_shape, &zero, &self.shape),
            _ => unreachable!("resized array shares the element type")
        );
        *self = grown;
    }

    /// Applies `f` to the values, keeping the shape.
    pub(crate) fn map_values(&self, f: impl FnOnce(&ArrayValues) -> ArrayValues) -> Result<Self> {
        Self::from_values(self.shape.clone(), f(&self.values))
    }
}

/// Number of elements of an array with the given shape.
#[must_use]
pub fn element_count(shape: &[usize]) -> usize {
    shape.iter().product()
}

/// Element count of `shape`, or `None` if it exceeds what a `Vec` can index.
#[must_use]
pub fn checked_element_count(shape: &[usize]) -> Option<usize> {
    shape
        .iter()
        .try_fold(1usize, |count, extent| count.checked_mul(*extent))
        .filter(|count| isize::try_from(*count).is_ok())
}

fn check_rank(expected: usize, actual: usize, what: &str) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(Error::InvalidArgument(format!(
            "{what} has rank {actual}, expected {expected}"
        )))
    }
}

fn row_major_offset(shape: &[usize], index: &[usize]) -> usize {
    shape
        .iter()
        .zip(index)
        .fold(0, |offset, (extent, i)| offset * extent + i)
}

/// Copies a `region`-shaped block from `src` (read at `src_origin`) into
/// `dst` (written at `dst_origin`). Bounds are the caller's responsibility.
fn copy_region<T: Clone>(
    src: &[T],
    src_shape: &[usize],
    src_origin: &[usize],
    dst: &mut [T],
    dst_shape: &[usize],
    dst_origin: &[usize],
    region: &[usize],
) {
    if region.iter().any(|extent| *extent == 0) {
        return;
    }
    let rank = region.len();
    let mut index = vec![0; rank];
    let mut src_index = vec![0; rank];
    let mut dst_index = vec![0; rank];
    loop {
        for d in 0..rank {
            src_index[d] = src_origin[d] + index[d];
            dst_index[d] = dst_origin[d] + index[d];
        }
        dst[row_major_offset(dst_shape, &dst_index)] =
            src[row_major_offset(src_shape, &src_index)].clone();

        // odometer increment, last dimension fastest
        let mut d = rank;
        loop {
            if d == 0 {
                return;
            }
            d -= 1;
            index[d] += 1;
            if index[d] < region[d] {
                break;
            }
            index[d] = 0;
        }
    }
}
