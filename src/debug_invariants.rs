//! Structural self-checks for the mesh model.
//!
//! Implementors provide [`DebugInvariants::validate_invariants`]. Mutating
//! operations call [`DebugInvariants::debug_assert_invariants`], which runs the
//! validation in debug builds, or in any build with the `check-invariants`
//! feature, and compiles to nothing otherwise.

use crate::mesh_error::MeshError;

/// Trait for validating data structure invariants.
pub trait DebugInvariants {
    /// Validate invariants and return the first violation found.
    fn validate_invariants(&self) -> Result<(), MeshError>;

    /// Panic on a violated invariant when checks are enabled.
    #[inline]
    #[track_caller]
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants());
    }

    /// Whether this build runs invariant checks after mutation.
    #[inline]
    fn invariants_enabled() -> bool
    where
        Self: Sized,
    {
        cfg!(any(debug_assertions, feature = "check-invariants"))
    }
}

/// Run a fallible check and panic with the given context on error, when
/// invariant checking is enabled.
///
/// ```ignore
/// debug_invariants!(mesh.validate_invariants(), "after removing {}", id);
/// ```
#[macro_export]
macro_rules! debug_invariants {
    ($expr:expr) => {
        $crate::debug_invariants!($expr, "invariant violated")
    };
    ($expr:expr, $($ctx:tt)+) => {
        #[cfg(any(debug_assertions, feature = "check-invariants"))]
        if let Err(e) = $expr {
            panic!("[invariants] {}: {}", format_args!($($ctx)+), e);
        }
    };
}
