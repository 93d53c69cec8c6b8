//! Fixed-pattern extraction over portal HTML. No I/O, no HTML tree.

pub mod ids;
pub mod stable;

use std::borrow::Cow;

/// Portal pages are UTF-8; anything else is replaced rather than rejected.
fn as_text(page: &[u8]) -> Cow<'_, str> {
    String::from_utf8_lossy(page)
}
