//! Signatures: the alphabet of node controls.
//!
//! A signature is an immutable set of controls, each carrying a name, an arity
//! (number of ports) and an activity kind. Control names are unique within a
//! signature.
//!
//! # Citations
//! - Milner, "The Space and Motion of Communicating Agents" (2009), Definition 1.1 (basic signature)
//! - Jensen & Milner, "Bigraphs and mobile processes (revised)" (2004), Section 2

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Activity of a control.
///
/// Reactions may only occur inside active nodes. Atomic nodes cannot contain
/// anything at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ControlKind {
    /// No children permitted.
    Atomic,
    /// Children permitted, reactions inside are not.
    Passive,
    /// Children permitted and reactions may occur inside.
    Active,
}

impl ControlKind {
    /// Returns `true` for `Active`.
    #[inline]
    pub fn is_active(self) -> bool {
        matches!(self, ControlKind::Active)
    }

    /// Returns `true` for `Atomic`.
    #[inline]
    pub fn is_atomic(self) -> bool {
        matches!(self, ControlKind::Atomic)
    }
}

impl fmt::Display for ControlKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlKind::Atomic => write!(f, "atomic"),
            ControlKind::Passive => write!(f, "passive"),
            ControlKind::Active => write!(f, "active"),
        }
    }
}

/// A typed node label.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Control {
    /// Unique name within its signature.
    pub name: String,
    /// Number of ports of every node carrying this control.
    pub arity: usize,
    /// Activity kind.
    pub kind: ControlKind,
}

impl Control {
    /// Creates a new control.
    pub fn new(name: impl Into<String>, arity: usize, kind: ControlKind) -> Self {
        Self {
            name: name.into(),
            arity,
            kind,
        }
    }

    /// Shorthand for an active control.
    pub fn active(name: impl Into<String>, arity: usize) -> Self {
        Self::new(name, arity, ControlKind::Active)
    }

    /// Shorthand for a passive control.
    pub fn passive(name: impl Into<String>, arity: usize) -> Self {
        Self::new(name, arity, ControlKind::Passive)
    }

    /// Shorthand for an atomic control.
    pub fn atomic(name: impl Into<String>, arity: usize) -> Self {
        Self::new(name, arity, ControlKind::Atomic)
    }

    /// Returns `true` if both controls agree on arity and kind.
    pub fn agrees_with(&self, other: &Control) -> bool {
        self.arity == other.arity && self.kind == other.kind
    }
}

impl fmt::Display for Control {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} ({})", self.name, self.arity, self.kind)
    }
}

/// Error type for signature construction and combination.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    /// A control name was declared twice.
    #[error("control `{0}` is declared more than once")]
    DuplicateControl(String),
    /// Composition requires disjoint control names.
    #[error("signatures are not composable, shared controls: {shared:?}")]
    SignatureNotComposable { shared: Vec<String> },
    /// A shared control is declared with a different arity or kind.
    #[error("signatures are not consistent on control `{control}`")]
    SignatureNotConsistent { control: String },
}

/// Precedence rule used by [`Signature::merge`] for shared control names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergePolicy {
    /// Shared controls must agree; otherwise the merge fails.
    #[default]
    Strict,
    /// The receiver's definition wins.
    PreferLeft,
    /// The argument's definition wins.
    PreferRight,
}

/// An immutable set of controls keyed by name.
///
/// # Invariants
/// - Control names are unique.
/// - Iteration is in ascending name order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Signature {
    controls: BTreeMap<String, Control>,
}

impl Signature {
    /// Builds a signature from a list of controls.
    ///
    /// Fails with `DuplicateControl` if a name occurs twice.
    pub fn new(controls: impl IntoIterator<Item = Control>) -> Result<Self, SignatureError> {
        let mut map = BTreeMap::new();
        for control in controls {
            if map.contains_key(&control.name) {
                return Err(SignatureError::DuplicateControl(control.name));
            }
            map.insert(control.name.clone(), control);
        }
        Ok(Self { controls: map })
    }

    /// The empty signature.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Looks up a control by name.
    pub fn control(&self, name: &str) -> Option<&Control> {
        self.controls.get(name)
    }

    /// Returns `true` if a control with this name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.controls.contains_key(name)
    }

    /// Controls in ascending name order.
    pub fn controls(&self) -> impl Iterator<Item = &Control> {
        self.controls.values()
    }

    /// Number of controls.
    pub fn len(&self) -> usize {
        self.controls.len()
    }

    /// Returns `true` if there are no controls.
    pub fn is_empty(&self) -> bool {
        self.controls.is_empty()
    }

    fn shared_names(&self, other: &Signature) -> Vec<String> {
        self.controls
            .keys()
            .filter(|name| other.controls.contains_key(*name))
            .cloned()
            .collect()
    }

    /// Two signatures are consistent if every shared name agrees on arity and kind.
    pub fn is_consistent_with(&self, other: &Signature) -> bool {
        self.controls.iter().all(|(name, control)| {
            other
                .controls
                .get(name)
                .map_or(true, |theirs| control.agrees_with(theirs))
        })
    }

    /// Two signatures are composable if they share no control names.
    pub fn is_composable_with(&self, other: &Signature) -> bool {
        self.shared_names(other).is_empty()
    }

    /// Disjoint union of two name-disjoint signatures.
    pub fn compose(&self, other: &Signature) -> Result<Signature, SignatureError> {
        let shared = self.shared_names(other);
        if !shared.is_empty() {
            return Err(SignatureError::SignatureNotComposable { shared });
        }
        let mut controls = self.controls.clone();
        controls.extend(other.controls.iter().map(|(k, v)| (k.clone(), v.clone())));
        Ok(Signature { controls })
    }

    /// Union of two signatures that may share names.
    ///
    /// Under `MergePolicy::Strict` any shared control must agree on arity and
    /// kind, otherwise `SignatureNotConsistent` is returned. The other
    /// policies pick the winning definition.
    pub fn merge(&self, other: &Signature, policy: MergePolicy) -> Result<Signature, SignatureError> {
        let mut controls = self.controls.clone();
        for (name, theirs) in &other.controls {
            match controls.get(name) {
                None => {
                    controls.insert(name.clone(), theirs.clone());
                }
                Some(ours) if ours.agrees_with(theirs) => {}
                Some(_) => match policy {
                    MergePolicy::Strict => {
                        return Err(SignatureError::SignatureNotConsistent {
                            control: name.clone(),
                        })
                    }
                    MergePolicy::PreferLeft => {}
                    MergePolicy::PreferRight => {
                        controls.insert(name.clone(), theirs.clone());
                    }
                },
            }
        }
        Ok(Signature { controls })
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, control) in self.controls.values().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}/{}", control.name, control.arity)?;
        }
        write!(f, "}}")
    }
}
