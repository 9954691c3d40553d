use std::fmt;

/// Renders a byte string as an escaped, quoted literal.
pub(crate) struct Bytes<'a>(pub(crate) &'a [u8]);

impl fmt::Debug for Bytes<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "b\"")?;

        for byte in self.0.iter().copied() {
            write!(f, "{}", std::ascii::escape_default(byte))?;
        }

        write!(f, "\"")
    }
}
