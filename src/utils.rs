use std::borrow::Cow;

use memchr::memchr;

/// Bytes considered as whitespace when trimming the start of the window,
/// i.e. what C's `isspace` accepts.
#[inline(always)]
pub(crate) fn is_space(byte: u8) -> bool {
    matches!(byte, b' ' | b'\t' | b'\n' | b'\r' | 0x0b | 0x0c)
}

/// Whether `byte` is whitespace that may be stripped around a field given the
/// active separator: a space is never stripped when it is the separator, and
/// the same goes for a tab.
#[inline(always)]
pub(crate) fn is_strippable_white(byte: u8, separator: u8) -> bool {
    match byte {
        b' ' => separator != b' ',
        b'\t' => separator != b'\t',
        _ => false,
    }
}

#[inline]
pub(crate) fn trim_trailing_white(slice: &[u8], separator: u8) -> &[u8] {
    let mut len = slice.len();

    while len > 0 && is_strippable_white(slice[len - 1], separator) {
        len -= 1;
    }

    &slice[..len]
}

/// Unescape a field read with the doubled quote rule, i.e. replace each pair
/// of quotes by a single one.
pub fn unescape_doubled(cell: &[u8], quote: u8) -> Cow<'_, [u8]> {
    let first = match memchr(quote, cell) {
        None => return Cow::Borrowed(cell),
        Some(offset) => offset,
    };

    let mut output = Vec::with_capacity(cell.len());
    output.extend_from_slice(&cell[..first]);

    let mut pos = first;

    while pos < cell.len() {
        let byte = cell[pos];
        output.push(byte);

        if byte == quote && pos + 1 < cell.len() && cell[pos + 1] == quote {
            pos += 2;
        } else {
            pos += 1;
        }
    }

    Cow::Owned(output)
}

/// Unescape a field read with the escaped quote rule, i.e. drop every
/// backslash and keep the byte following it verbatim.
pub fn unescape_backslashes(cell: &[u8]) -> Cow<'_, [u8]> {
    let first = match memchr(b'\\', cell) {
        None => return Cow::Borrowed(cell),
        Some(offset) => offset,
    };

    let mut output = Vec::with_capacity(cell.len());
    output.extend_from_slice(&cell[..first]);

    let mut pos = first;

    while pos < cell.len() {
        let byte = cell[pos];

        if byte == b'\\' && pos + 1 < cell.len() {
            output.push(cell[pos + 1]);
            pos += 2;
        } else {
            output.push(byte);
            pos += 1;
        }
    }

    Cow::Owned(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unescape_doubled() {
        assert_eq!(
            unescape_doubled(b"he said \"\"hi\"\"", b'"'),
            Cow::<[u8]>::Owned(b"he said \"hi\"".to_vec())
        );
        assert!(matches!(
            unescape_doubled(b"nothing here", b'"'),
            Cow::Borrowed(_)
        ));
        assert_eq!(unescape_doubled(b"\"\"\"\"", b'"').as_ref(), b"\"\"");
    }

    #[test]
    fn test_unescape_backslashes() {
        assert_eq!(
            unescape_backslashes(b"hello \\\"world\\\"").as_ref(),
            b"hello \"world\""
        );
        assert_eq!(unescape_backslashes(b"a\\\\b").as_ref(), b"a\\b");
        assert_eq!(unescape_backslashes(b"dangling\\").as_ref(), b"dangling\\");
        assert!(matches!(unescape_backslashes(b"plain"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_white() {
        assert_eq!(trim_trailing_white(b"john \t ", b','), b"john");
        assert_eq!(trim_trailing_white(b"john \t", b'\t'), b"john ");
        assert_eq!(trim_trailing_white(b"john\t ", b' '), b"john\t ");
        assert!(is_space(0x0b));
        assert!(!is_strippable_white(b'\n', b','));
    }
}
