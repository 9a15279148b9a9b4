//! Pending changes of a single variable.
//!
//! Writes are buffered as [`DataPiece`]s. A piece either carries an absolute
//! origin (`put`) or asks to be placed after the current end of one dimension
//! (`append`). Appends stay symbolic until precommit, when
//! [`DataChanges::transform_append_to_put`] replays every piece in order
//! against the committed shape and rewrites appends into absolute puts.
//!
//! While folding pieces the changes maintain one cumulative affected
//! rectangle. Storage formats can only express growth as "extend the tail of
//! one dimension" or "rewrite everything", so the rectangle follows this rule
//! for every piece:
//!
//! ```text
//!   no dimension grew        -> rect = rect ∪ piece
//!   exactly one grew (d)     -> rect = rect ∪ piece, then along d only:
//!                               [min(rect.origin[d], old[d]), new[d])
//!   several dimensions grew  -> rect = whole new shape
//! ```

use alloc::collections::BTreeMap;
use alloc::format;
use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

use crate::data::array::checked_element_count;
use crate::data::Array;
use crate::dimension::DimensionList;
use crate::error::{Error, Result};
use crate::metadata::MetadataValue;
use crate::rectangle::Rectangle;
use crate::schema::VariableSchema;

/// Where a buffered piece is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PieceOrigin {
    /// Absolute index of the first element.
    At(Vec<usize>),
    /// After the current end of the given dimension, at zero elsewhere.
    Append(usize),
}

/// A buffered write.
#[derive(Debug, Clone, PartialEq)]
pub struct DataPiece {
    pub origin: PieceOrigin,
    pub data: Array,
}

impl DataPiece {
    #[must_use]
    pub const fn put(origin: Vec<usize>, data: Array) -> Self {
        Self {
            origin: PieceOrigin::At(origin),
            data,
        }
    }

    #[must_use]
    pub const fn append(dimension: usize, data: Array) -> Self {
        Self {
            origin: PieceOrigin::Append(dimension),
            data,
        }
    }

    /// Absolute origin, if the piece is not an append.
    #[must_use]
    pub fn absolute_origin(&self) -> Option<&[usize]> {
        match &self.origin {
            PieceOrigin::At(origin) => Some(origin),
            PieceOrigin::Append(_) => None,
        }
    }

    /// Footprint of the piece. Only meaningful for absolute pieces.
    #[must_use]
    pub fn footprint(&self) -> Option<Rectangle> {
        self.absolute_origin()
            .map(|origin| Rectangle::new(origin.to_vec(), self.data.shape().to_vec()))
    }
}

/// Resolves the absolute origin of a piece written against `shape`.
#[must_use]
pub fn resolve_origin(origin: &PieceOrigin, shape: &[usize]) -> Vec<usize> {
    match origin {
        PieceOrigin::At(origin) => origin.clone(),
        PieceOrigin::Append(dimension) => {
            let mut origin = vec![0; shape.len()];
            origin[*dimension] = shape[*dimension];
            origin
        }
    }
}

/// Folds one absolute write into a shape and its affected rectangle.
///
/// `shape` grows to cover the piece; `affected` follows the collapse rule
/// described in the module documentation.
pub fn fold_piece(
    shape: &mut [usize],
    affected: &mut Rectangle,
    origin: &[usize],
    piece_shape: &[usize],
) {
    if piece_shape.iter().any(|extent| *extent == 0) {
        return;
    }
    let previous = shape.to_vec();
    for ((extent, o), s) in shape.iter_mut().zip(origin).zip(piece_shape) {
        *extent = (*extent).max(o.saturating_add(*s));
    }
    *affected = affected.union(&Rectangle::new(origin.to_vec(), piece_shape.to_vec()));

    let grown: Vec<usize> = (0..shape.len())
        .filter(|d| shape[*d] > previous[*d])
        .collect();
    match grown.as_slice() {
        [] => {}
        [d] => {
            let d = *d;
            let start = affected.origin[d].min(previous[d]);
            affected.origin[d] = start;
            affected.shape[d] = shape[d] - start;
        }
        _ => *affected = Rectangle::whole(shape),
    }
}

/// Buffered data writes of one variable.
#[derive(Debug, Clone, PartialEq)]
pub struct DataChanges {
    base_shape: Vec<usize>,
    shape: Vec<usize>,
    affected: Rectangle,
    pieces: Vec<DataPiece>,
}

impl DataChanges {
    /// Empty changes over a variable whose committed shape is `base_shape`.
    #[must_use]
    pub fn new(base_shape: Vec<usize>) -> Self {
        Self {
            shape: base_shape.clone(),
            affected: Rectangle::empty(),
            pieces: Vec::new(),
            base_shape,
        }
    }

    /// Committed shape the pieces are applied to.
    #[must_use]
    pub fn base_shape(&self) -> &[usize] {
        &self.base_shape
    }

    #[must_use]
    pub fn pieces(&self) -> &[DataPiece] {
        &self.pieces
    }

    #[must_use]
    pub fn has_appends(&self) -> bool {
        self.pieces
            .iter()
            .any(|p| matches!(p.origin, PieceOrigin::Append(_)))
    }

    /// Shape implied by the absolute pieces folded so far. Appends are only
    /// accounted for after [`transform_append_to_put`](Self::transform_append_to_put).
    #[must_use]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Cumulative affected region of the folded pieces.
    #[must_use]
    pub const fn affected_rectangle(&self) -> &Rectangle {
        &self.affected
    }

    /// Shape after every pending piece, appends included.
    #[must_use]
    pub fn proposed_shape(&self) -> Vec<usize> {
        if self.has_appends() {
            let mut replay = self.clone();
            replay.replay();
            replay.shape
        } else {
            self.shape().to_vec()
        }
    }

    /// Buffers a write.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the piece rank, origin rank or
    /// append dimension does not fit the variable, or if the write would grow
    /// the variable beyond an indexable shape.
    pub fn push(&mut self, piece: DataPiece) -> Result<()> {
        let rank = self.base_shape.len();
        if piece.data.rank() != rank {
            return Err(Error::InvalidArgument(format!(
                "data has rank {}, variable has rank {rank}",
                piece.data.rank()
            )));
        }
        match &piece.origin {
            PieceOrigin::At(origin) => {
                if origin.len() != rank {
                    return Err(Error::InvalidArgument(format!(
                        "origin has rank {}, variable has rank {rank}",
                        origin.len()
                    )));
                }
            }
            PieceOrigin::Append(dimension) => {
                if *dimension >= rank {
                    return Err(Error::InvalidArgument(format!(
                        "cannot append along dimension {dimension} of a rank {rank} variable"
                    )));
                }
            }
        }
        self.check_extent(&piece)?;
        if let PieceOrigin::At(origin) = &piece.origin {
            fold_piece(&mut self.shape, &mut self.affected, origin, piece.data.shape());
        }
        self.pieces.push(piece);
        Ok(())
    }

    /// Rejects a piece whose end, or the shape it grows the variable to,
    /// cannot be represented.
    fn check_extent(&self, piece: &DataPiece) -> Result<()> {
        let piece_shape = piece.data.shape();
        if piece_shape.iter().any(|extent| *extent == 0) {
            return Ok(());
        }
        let current = self.proposed_shape();
        let origin = resolve_origin(&piece.origin, &current);
        let mut grown = Vec::with_capacity(current.len());
        for ((extent, o), s) in current.iter().zip(&origin).zip(piece_shape) {
            let end = o.checked_add(*s).ok_or_else(|| {
                Error::InvalidArgument(format!(
                    "origin {origin:?} plus shape {piece_shape:?} is out of range"
                ))
            })?;
            grown.push((*extent).max(end));
        }
        if checked_element_count(&grown).is_none() {
            return Err(Error::InvalidArgument(format!(
                "write would grow the variable to shape {grown:?}"
            )));
        }
        Ok(())
    }

    /// Rewrites every append piece into an absolute put and recomputes the
    /// proposed shape and affected rectangle from the committed shape.
    pub fn transform_append_to_put(&mut self) {
        self.replay();
    }

    fn replay(&mut self) {
        let mut shape = self.base_shape.clone();
        let mut affected = Rectangle::empty();
        for piece in &mut self.pieces {
            let origin = resolve_origin(&piece.origin, &shape);
            fold_piece(&mut shape, &mut affected, &origin, piece.data.shape());
            piece.origin = PieceOrigin::At(origin);
        }
        self.shape = shape;
        self.affected = affected;
    }
}

/// Transient state of one variable inside a transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableChanges {
    /// Dataset version this transaction proposes to become.
    pub changeset: u64,
    /// Committed schema of the variable when the transaction started.
    pub initial_schema: VariableSchema,
    /// Proposed dimensions. Lengths may differ from committed ones.
    pub dimensions: DimensionList,
    /// Proposed metadata entries.
    pub metadata: BTreeMap<String, MetadataValue>,
    /// Buffered writes, for variables that own their data.
    pub data: Option<DataChanges>,
}

impl VariableChanges {
    #[must_use]
    pub fn new(changeset: u64, initial_schema: VariableSchema) -> Self {
        Self {
            changeset,
            dimensions: initial_schema.dimensions.clone(),
            metadata: BTreeMap::new(),
            data: None,
            initial_schema,
        }
    }

    /// Buffers a write and refreshes the proposed dimensions.
    ///
    /// # Errors
    ///
    /// See [`DataChanges::push`].
    pub fn push_piece(&mut self, piece: DataPiece) -> Result<()> {
        let base = self.initial_schema.dimensions.shape();
        let data = self.data.get_or_insert_with(|| DataChanges::new(base));
        data.push(piece)?;
        let shape = data.proposed_shape();
        self.dimensions = self.dimensions.with_shape(&shape);
        Ok(())
    }

    /// See [`DataChanges::transform_append_to_put`].
    pub fn transform_append_to_put(&mut self) {
        if let Some(data) = &mut self.data {
            data.transform_append_to_put();
            let shape = data.shape().to_vec();
            self.dimensions = self.dimensions.with_shape(&shape);
        }
    }

    /// Affected rectangle of the buffered writes, empty without data changes.
    #[must_use]
    pub fn affected_rectangle(&self) -> Rectangle {
        self.data
            .as_ref()
            .map(|d| d.affected_rectangle().clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ints(shape: Vec<usize>, values: Vec<i32>) -> Array {
        Array::new(shape, values).unwrap()
    }

    #[test]
    fn append_becomes_put_after_committed_end() {
        let mut changes = DataChanges::new(vec![3]);
        changes
            .push(DataPiece::append(0, Array::from_vec(vec![4i32, 5])))
            .unwrap();
        assert!(changes.has_appends());
        assert_eq!(changes.proposed_shape(), vec![5]);

        changes.transform_append_to_put();
        assert!(!changes.has_appends());
        assert_eq!(changes.pieces()[0].absolute_origin(), Some(&[3][..]));
        assert_eq!(changes.shape(), &[5]);
        assert_eq!(changes.affected_rectangle(), &Rectangle::new(vec![3], vec![2]));
    }

    #[test]
    fn successive_appends_stack() {
        let mut changes = DataChanges::new(vec![0]);
        changes
            .push(DataPiece::put(vec![0], Array::from_vec(vec![1i32, 2, 3])))
            .unwrap();
        changes
            .push(DataPiece::append(0, Array::from_vec(vec![4i32])))
            .unwrap();
        changes
            .push(DataPiece::append(0, Array::from_vec(vec![5i32])))
            .unwrap();
        changes.transform_append_to_put();
        let origins: Vec<_> = changes
            .pieces()
            .iter()
            .map(|p| p.absolute_origin().unwrap().to_vec())
            .collect();
        assert_eq!(origins, vec![vec![0], vec![3], vec![4]]);
        assert_eq!(changes.shape(), &[5]);
        assert_eq!(changes.affected_rectangle(), &Rectangle::whole(&[5]));
    }

    #[test]
    fn growth_along_one_dimension_extends_from_old_boundary() {
        // 2x4 grid; write a single cell in row 3 -> rows 2..4 affected
        let mut shape = vec![2, 4];
        let mut affected = Rectangle::empty();
        fold_piece(&mut shape, &mut affected, &[3, 1], &[1, 2]);
        assert_eq!(shape, vec![4, 4]);
        assert_eq!(affected, Rectangle::new(vec![2, 1], vec![2, 2]));
    }

    #[test]
    fn growth_along_several_dimensions_collapses_to_whole_shape() {
        let mut shape = vec![2, 2];
        let mut affected = Rectangle::new(vec![0, 0], vec![1, 1]);
        fold_piece(&mut shape, &mut affected, &[2, 2], &[1, 1]);
        assert_eq!(shape, vec![3, 3]);
        assert_eq!(affected, Rectangle::whole(&[3, 3]));
    }

    #[test]
    fn write_inside_bounds_unions_footprints() {
        let mut shape = vec![4, 4];
        let mut affected = Rectangle::new(vec![0, 0], vec![1, 1]);
        fold_piece(&mut shape, &mut affected, &[2, 2], &[1, 1]);
        assert_eq!(shape, vec![4, 4]);
        assert_eq!(affected, Rectangle::new(vec![0, 0], vec![3, 3]));
    }

    #[test]
    fn affected_rectangle_never_shrinks() {
        let mut changes = DataChanges::new(vec![2, 2]);
        changes
            .push(DataPiece::put(vec![0, 0], ints(vec![2, 2], vec![1, 2, 3, 4])))
            .unwrap();
        let before = changes.affected_rectangle().clone();
        changes
            .push(DataPiece::put(vec![1, 1], ints(vec![1, 1], vec![9])))
            .unwrap();
        assert!(changes.affected_rectangle().contains(&before));
    }

    #[test]
    fn malformed_pieces_are_rejected() {
        let mut changes = DataChanges::new(vec![2, 2]);
        assert!(changes
            .push(DataPiece::put(vec![0], ints(vec![2, 2], vec![1, 2, 3, 4])))
            .is_err());
        assert!(changes
            .push(DataPiece::append(2, ints(vec![1, 2], vec![1, 2])))
            .is_err());
        assert!(changes
            .push(DataPiece::append(0, Array::from_vec(vec![1i32])))
            .is_err());
        assert!(changes.pieces().is_empty());
    }
}
