//! Root validation for the producer.

use crate::error::{SpineError, SpineResult};
use crate::Value;

/// Reject roots the producer cannot draft.
///
/// `Null` and `Undefined` pass as valid no-op roots, as do the four container
/// kinds. Other scalars, dates and opaque values fail with
/// [`SpineError::InvalidRootType`].
pub fn assert_valid_root(value: &Value) -> SpineResult<()> {
    if value.is_nullish() || value.kind().is_container() {
        return Ok(());
    }
    Err(SpineError::invalid_root_type(value.type_name()))
}
