//! perturb::layout — the global moment-index table.
//!
//! Purpose
//! -------
//! Hold the single ordered list of named moments that fixes the meaning of
//! every position in a moment vector. Nodes resolve the names they read
//! through a shared [`MomentLayout`] once, at construction, and work on
//! plain indices afterwards.
//!
//! Key behaviors
//! -------------
//! - [`MomentLayout::new`] rejects duplicate names.
//! - [`MomentLayout::index_of`] fails with [`PerturbError::UnknownMode`]
//!   for names absent from the table.
//! - [`MomentLayout::select_columns`] reorders an in-memory named table
//!   into layout order; this is the in-memory half of a catalog adapter.
//!
//! Invariants & assumptions
//! ------------------------
//! - Layouts are immutable after construction and shared through `Arc`.
//! - Two layouts are interchangeable iff their name lists are equal.
use crate::perturb::errors::{PerturbError, PerturbResult};
use ndarray::{Array2, ArrayView2};
use std::collections::HashMap;

/// Ordered, named moment-vector layout.
#[derive(Debug, Clone)]
pub struct MomentLayout {
    names: Vec<String>,
    index: HashMap<String, usize>,
}

impl PartialEq for MomentLayout {
    fn eq(&self, other: &Self) -> bool {
        self.names == other.names
    }
}

impl MomentLayout {
    /// Build a layout from an ordered list of column names.
    ///
    /// # Errors
    /// [`PerturbError::DuplicateMode`] if a name is listed twice.
    pub fn new<I, S>(names: I) -> PerturbResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        let mut index = HashMap::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            if index.insert(name.clone(), i).is_some() {
                return Err(PerturbError::DuplicateMode { name: name.clone() });
            }
        }
        Ok(Self { names, index })
    }

    /// Number of columns in a moment vector.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Index of `name`, or [`PerturbError::UnknownMode`].
    pub fn index_of(&self, name: &str) -> PerturbResult<usize> {
        self.get(name).ok_or_else(|| PerturbError::UnknownMode { name: name.to_string() })
    }

    /// Index of `name`, if present.
    pub fn get(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Resolve several names at once, failing on the first unknown one.
    pub fn indices_of<S: AsRef<str>>(&self, names: &[S]) -> PerturbResult<Vec<usize>> {
        names.iter().map(|n| self.index_of(n.as_ref())).collect()
    }

    /// select_columns — reorder a named table into this layout.
    ///
    /// Parameters
    /// ----------
    /// - `header`: column names of `table`, in table order.
    /// - `table`: `rows × header.len()` numeric table; extra columns are
    ///   dropped.
    ///
    /// Returns
    /// -------
    /// `rows × self.len()` matrix whose column `i` is the table column named
    /// `self.names()[i]`.
    ///
    /// Errors
    /// ------
    /// - [`PerturbError::ColumnMismatch`] if `header.len() != table.ncols()`.
    /// - [`PerturbError::UnknownMode`] naming the first layout column missing
    ///   from `header`.
    pub fn select_columns<S: AsRef<str>>(
        &self, header: &[S], table: ArrayView2<f64>,
    ) -> PerturbResult<Array2<f64>> {
        if header.len() != table.ncols() {
            return Err(PerturbError::ColumnMismatch {
                header: header.len(),
                columns: table.ncols(),
            });
        }
        let positions: HashMap<&str, usize> =
            header.iter().enumerate().map(|(i, n)| (n.as_ref(), i)).collect();
        let mut out = Array2::<f64>::zeros((table.nrows(), self.len()));
        for (dst, name) in self.names.iter().enumerate() {
            let src = positions
                .get(name.as_str())
                .copied()
                .ok_or_else(|| PerturbError::UnknownMode { name: name.clone() })?;
            out.column_mut(dst).assign(&table.column(src));
        }
        Ok(out)
    }
}
