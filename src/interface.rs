//! Interfaces (faces) of bigraphs.
//!
//! A face is a pair of a width (number of roots or sites) and a finite set of
//! names. The outer face of a bigraph is `(roots, outer names)` and the inner
//! face is `(sites, inner names)`. Two bigraphs compose only when the inner
//! face of the outer one equals the outer face of the inner one.
//!
//! # Citations
//! - Milner, "The Space and Motion of Communicating Agents" (2009), Definition 2.3 (interfaces)

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

/// An interface `⟨width, names⟩`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Face {
    /// Number of roots (outer face) or sites (inner face).
    pub width: usize,
    /// Outer or inner names.
    pub names: BTreeSet<String>,
}

/// Reason two faces do not line up.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FaceMismatch {
    /// Widths differ.
    #[error("width {found} does not match expected width {expected}")]
    Width { expected: usize, found: usize },
    /// Name sets differ.
    #[error("names {found:?} do not match expected names {expected:?}")]
    Names {
        expected: BTreeSet<String>,
        found: BTreeSet<String>,
    },
}

impl Face {
    /// Creates a face from a width and names.
    pub fn new<S: Into<String>>(width: usize, names: impl IntoIterator<Item = S>) -> Self {
        Self {
            width,
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// The origin `ε = ⟨0, ∅⟩`.
    pub fn origin() -> Self {
        Self::default()
    }

    /// A face with the given width and no names.
    pub fn width(width: usize) -> Self {
        Self {
            width,
            names: BTreeSet::new(),
        }
    }

    /// Returns `true` for the origin.
    pub fn is_origin(&self) -> bool {
        self.width == 0 && self.names.is_empty()
    }

    /// Checks that `other` is the same interface as `self`.
    ///
    /// Returns the first mismatch found; width is checked before names.
    pub fn compatible_with(&self, other: &Face) -> Result<(), FaceMismatch> {
        if self.width != other.width {
            return Err(FaceMismatch::Width {
                expected: self.width,
                found: other.width,
            });
        }
        if self.names != other.names {
            return Err(FaceMismatch::Names {
                expected: self.names.clone(),
                found: other.names.clone(),
            });
        }
        Ok(())
    }

    /// Returns `true` if the two name sets share no name.
    pub fn names_disjoint(&self, other: &Face) -> bool {
        self.names.is_disjoint(&other.names)
    }

    /// Tensor of two faces: widths add, names are united.
    pub fn tensor(&self, other: &Face) -> Face {
        Face {
            width: self.width + other.width,
            names: self.names.union(&other.names).cloned().collect(),
        }
    }
}

impl fmt::Display for Face {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}, {{", self.width)?;
        for (i, name) in self.names.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", name)?;
        }
        write!(f, "}}>")
    }
}
