//! Structural comparison of Tessera functions.
//!
//! [`FunctionsComparator`] is the configurable comparator used by pass
//! tests; [`compare_functions`] is the fixed-entry boundary form that also
//! checks attributes and constant payloads.

pub mod comparator;

pub use comparator::{CmpValues, ComparisonResult, FunctionsComparator};

use tessera_core::Function;

/// Aspects checked by [`compare_functions`] beyond structure and element
/// types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompareOptions {
    pub attributes: bool,
    pub const_values: bool,
    pub names: bool,
    pub consumers_count: bool,
}

impl CompareOptions {
    /// Structure and element types only.
    pub fn structural() -> Self {
        Self {
            attributes: false,
            const_values: false,
            names: false,
            consumers_count: false,
        }
    }

    pub fn comparator(&self) -> FunctionsComparator {
        let toggles = [
            (CmpValues::Attributes, self.attributes),
            (CmpValues::ConstValues, self.const_values),
            (CmpValues::Names, self.names),
            (CmpValues::ConsumersCount, self.consumers_count),
        ];
        toggles
            .into_iter()
            .fold(FunctionsComparator::with_default(), |cmp, (value, on)| {
                if on { cmp.enable(value) } else { cmp }
            })
    }
}

impl Default for CompareOptions {
    fn default() -> Self {
        Self {
            attributes: true,
            const_values: true,
            ..Self::structural()
        }
    }
}

/// Compare two functions, returning `(valid, message)`.
///
/// `message` is empty when `valid` is true and otherwise names the first
/// discrepancy.
pub fn compare_functions(lhs: &Function, rhs: &Function, options: &CompareOptions) -> (bool, String) {
    let result = options.comparator().compare(lhs, rhs);
    (result.valid, result.message)
}
