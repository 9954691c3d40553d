use std::borrow::Cow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Index;

use crate::core::FieldSpan;
use crate::debug;
use crate::dialect::QuoteRule;
use crate::utils::{unescape_backslashes, unescape_doubled};

/// A view of a single field into a [`Reader`](crate::Reader) buffer.
///
/// The view never contains the field's outer quotes, but it is not unescaped,
/// i.e. doubled quotes or backslashes are still there. Use [`Field::unescape`]
/// to get the actual content of the field.
#[derive(Clone, Copy)]
pub struct Field<'a> {
    bytes: &'a [u8],
    offset: usize,
    quoted: bool,
    quote: u8,
    quote_rule: QuoteRule,
}

impl<'a> Field<'a> {
    #[inline]
    pub(crate) fn new(buffer: &'a [u8], span: FieldSpan, quote: u8, quote_rule: QuoteRule) -> Self {
        Self {
            bytes: &buffer[span.start..span.end],
            offset: span.start,
            quoted: span.quoted,
            quote,
            quote_rule,
        }
    }

    /// Returns the raw bytes of the field, outer quotes excluded.
    #[inline(always)]
    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// Byte offset of the field's content in the buffer.
    #[inline(always)]
    pub fn offset(&self) -> usize {
        self.offset
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Returns whether the field was enclosed in quotes.
    #[inline(always)]
    pub fn is_quoted(&self) -> bool {
        self.quoted
    }

    /// Returns the content of the field, unescaped according to the quote
    /// rule.
    ///
    /// A [`Cow::Owned`] will be returned if the field actually needed
    /// unescaping, else a [`Cow::Borrowed`] will be returned.
    #[inline]
    pub fn unescape(&self) -> Cow<'a, [u8]> {
        if !self.quoted {
            return Cow::Borrowed(self.bytes);
        }

        match self.quote_rule {
            QuoteRule::Doubled => unescape_doubled(self.bytes, self.quote),
            QuoteRule::Escaped => unescape_backslashes(self.bytes),
            QuoteRule::Verbatim | QuoteRule::None => Cow::Borrowed(self.bytes),
        }
    }
}

impl AsRef<[u8]> for Field<'_> {
    #[inline(always)]
    fn as_ref(&self) -> &[u8] {
        self.bytes
    }
}

impl fmt::Debug for Field<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Field({:?} @ {})", debug::Bytes(self.bytes), self.offset)
    }
}

/// A view of a CSV record into a [`Reader`](crate::Reader) buffer.
///
/// Records padded in fill mode have trailing empty fields.
pub struct Record<'a> {
    buffer: &'a [u8],
    spans: &'a [FieldSpan],
    quote: u8,
    quote_rule: QuoteRule,
}

impl<'a> Record<'a> {
    #[inline]
    pub(crate) fn new(
        buffer: &'a [u8],
        spans: &'a [FieldSpan],
        quote: u8,
        quote_rule: QuoteRule,
    ) -> Self {
        Self {
            buffer,
            spans,
            quote,
            quote_rule,
        }
    }

    /// Number of fields of the record, i.e. the detected field count.
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.spans.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// Returns the nth field's raw bytes, if it is not out-of-bounds.
    #[inline]
    pub fn get(&self, index: usize) -> Option<&'a [u8]> {
        self.spans
            .get(index)
            .map(|span| &self.buffer[span.start..span.end])
    }

    /// Returns the nth field, if it is not out-of-bounds.
    #[inline]
    pub fn field(&self, index: usize) -> Option<Field<'a>> {
        self.spans
            .get(index)
            .map(|span| Field::new(self.buffer, *span, self.quote, self.quote_rule))
    }

    /// Returns the nth field, unescaped, if it is not out-of-bounds.
    ///
    /// See [`Field::unescape`] for more detail.
    #[inline]
    pub fn unescape(&self, index: usize) -> Option<Cow<'a, [u8]>> {
        self.field(index).map(|field| field.unescape())
    }

    /// Returns an iterator over the record's raw fields.
    #[inline]
    pub fn iter(&self) -> RecordIter<'_> {
        RecordIter {
            record: self,
            current_forward: 0,
            current_backward: self.len(),
        }
    }

    /// Returns an iterator over the record's [`Field`] views.
    #[inline]
    pub fn fields(&self) -> RecordFieldIter<'_> {
        RecordFieldIter {
            record: self,
            current_forward: 0,
            current_backward: self.len(),
        }
    }

    /// Returns an iterator over the record's fields, unescaped.
    #[inline]
    pub fn unescaped_iter(&self) -> RecordUnescapedIter<'_> {
        RecordUnescapedIter {
            record: self,
            current_forward: 0,
            current_backward: self.len(),
        }
    }

    pub(crate) fn read_byte_record(&self, record: &mut ByteRecord) {
        record.clear();

        for cell in self.unescaped_iter() {
            record.push_field(&cell);
        }
    }

    /// Converts the record into a proper, owned and unescaped [`ByteRecord`].
    #[inline]
    pub fn to_byte_record(&self) -> ByteRecord {
        let mut record = ByteRecord::new();
        self.read_byte_record(&mut record);
        record
    }
}

impl fmt::Debug for Record<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Record(")?;
        f.debug_list()
            .entries(self.iter().map(debug::Bytes))
            .finish()?;
        write!(f, ")")?;
        Ok(())
    }
}

macro_rules! make_record_iterator {
    ($name:ident, $method: ident, $out_type: ty) => {
        pub struct $name<'a> {
            record: &'a Record<'a>,
            current_forward: usize,
            current_backward: usize,
        }

        impl ExactSizeIterator for $name<'_> {}

        impl<'a> Iterator for $name<'a> {
            type Item = $out_type;

            #[inline]
            fn next(&mut self) -> Option<Self::Item> {
                if self.current_forward == self.current_backward {
                    None
                } else {
                    let cell = self.record.$method(self.current_forward);

                    self.current_forward += 1;

                    cell
                }
            }

            #[inline]
            fn size_hint(&self) -> (usize, Option<usize>) {
                let size = self.current_backward - self.current_forward;

                (size, Some(size))
            }

            #[inline]
            fn count(self) -> usize
            where
                Self: Sized,
            {
                self.len()
            }
        }

        impl DoubleEndedIterator for $name<'_> {
            #[inline]
            fn next_back(&mut self) -> Option<Self::Item> {
                if self.current_forward == self.current_backward {
                    None
                } else {
                    self.current_backward -= 1;

                    self.record.$method(self.current_backward)
                }
            }
        }
    };
}

make_record_iterator!(RecordIter, get, &'a [u8]);
make_record_iterator!(RecordFieldIter, field, Field<'a>);
make_record_iterator!(RecordUnescapedIter, unescape, Cow<'a, [u8]>);

impl Index<usize> for Record<'_> {
    type Output = [u8];

    #[inline]
    fn index(&self, i: usize) -> &[u8] {
        let span = self.spans[i];
        &self.buffer[span.start..span.end]
    }
}

/// An owned, unescaped representation of a CSV record.
#[derive(Default, Clone, Eq)]
pub struct ByteRecord {
    data: Vec<u8>,
    bounds: Vec<(usize, usize)>,
}

impl ByteRecord {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bounds.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn clear(&mut self) {
        self.data.clear();
        self.bounds.clear();
    }

    #[inline]
    pub fn iter(&self) -> ByteRecordIter<'_> {
        ByteRecordIter {
            record: self,
            current_forward: 0,
            current_backward: self.len(),
        }
    }

    #[inline(always)]
    pub fn push_field(&mut self, bytes: &[u8]) {
        let start = self.data.len();
        self.data.extend_from_slice(bytes);
        self.bounds.push((start, self.data.len()));
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&[u8]> {
        self.bounds
            .get(index)
            .copied()
            .map(|(start, end)| &self.data[start..end])
    }
}

impl PartialEq for ByteRecord {
    fn eq(&self, other: &Self) -> bool {
        if self.bounds.len() != other.bounds.len() {
            return false;
        }

        self.iter()
            .zip(other.iter())
            .all(|(self_cell, other_cell)| self_cell == other_cell)
    }
}

impl Hash for ByteRecord {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_usize(self.len());

        for cell in self.iter() {
            state.write(cell);
        }
    }
}

impl Index<usize> for ByteRecord {
    type Output = [u8];

    #[inline]
    fn index(&self, i: usize) -> &[u8] {
        let (start, end) = self.bounds[i];
        &self.data[start..end]
    }
}

impl<T: AsRef<[u8]>> Extend<T> for ByteRecord {
    #[inline]
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for x in iter {
            self.push_field(x.as_ref());
        }
    }
}

impl<T: AsRef<[u8]>> FromIterator<T> for ByteRecord {
    #[inline]
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut record = Self::new();
        record.extend(iter);
        record
    }
}

impl<'r> IntoIterator for &'r ByteRecord {
    type IntoIter = ByteRecordIter<'r>;
    type Item = &'r [u8];

    #[inline]
    fn into_iter(self) -> ByteRecordIter<'r> {
        self.iter()
    }
}

impl fmt::Debug for ByteRecord {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "ByteRecord(")?;
        f.debug_list()
            .entries(self.iter().map(debug::Bytes))
            .finish()?;
        write!(f, ")")?;
        Ok(())
    }
}

pub struct ByteRecordIter<'a> {
    record: &'a ByteRecord,
    current_forward: usize,
    current_backward: usize,
}

impl ExactSizeIterator for ByteRecordIter<'_> {}

impl<'a> Iterator for ByteRecordIter<'a> {
    type Item = &'a [u8];

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        if self.current_forward == self.current_backward {
            None
        } else {
            let (start, end) = self.record.bounds[self.current_forward];

            self.current_forward += 1;

            Some(&self.record.data[start..end])
        }
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        let size = self.current_backward - self.current_forward;

        (size, Some(size))
    }

    #[inline]
    fn count(self) -> usize
    where
        Self: Sized,
    {
        self.len()
    }
}

impl DoubleEndedIterator for ByteRecordIter<'_> {
    #[inline]
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.current_forward == self.current_backward {
            None
        } else {
            self.current_backward -= 1;

            let (start, end) = self.record.bounds[self.current_backward];

            Some(&self.record.data[start..end])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(start: usize, end: usize, quoted: bool) -> FieldSpan {
        FieldSpan { start, end, quoted }
    }

    #[test]
    fn test_record() {
        let buffer = b"john,\"he said \"\"hi\"\"\",";
        let spans = [span(0, 4, false), span(6, 20, true), span(22, 22, false)];
        let record = Record::new(buffer, &spans, b'"', QuoteRule::Doubled);

        assert_eq!(record.len(), 3);
        assert_eq!(record.get(0), Some::<&[u8]>(b"john"));
        assert_eq!(record.get(1), Some::<&[u8]>(b"he said \"\"hi\"\""));
        assert_eq!(record.get(2), Some::<&[u8]>(b""));
        assert_eq!(record.get(3), None);
        assert_eq!(&record[0], b"john");

        let unescaped: Vec<Cow<[u8]>> = record.unescaped_iter().collect();
        assert_eq!(
            unescaped,
            vec![
                Cow::Borrowed(&b"john"[..]),
                Cow::Borrowed(&b"he said \"hi\""[..]),
                Cow::Borrowed(&b""[..])
            ]
        );

        let field = record.field(1).unwrap();
        assert!(field.is_quoted());
        assert_eq!(field.offset(), 6);
        assert_eq!(field.len(), 14);

        assert_eq!(record.to_byte_record(), brec!["john", "he said \"hi\"", ""]);
        assert_eq!(record.iter().rev().next(), Some::<&[u8]>(b""));
        assert_eq!(record.fields().count(), 3);
    }

    #[test]
    fn test_field_unescape() {
        let buffer = b"a \\\"b\\\" c";
        let escaped = Field::new(buffer, span(0, buffer.len(), true), b'"', QuoteRule::Escaped);
        assert_eq!(escaped.unescape().as_ref(), b"a \"b\" c");

        // Unquoted fields are never unescaped
        let unquoted = Field::new(buffer, span(0, buffer.len(), false), b'"', QuoteRule::Escaped);
        assert_eq!(unquoted.unescape().as_ref(), &buffer[..]);

        let verbatim = Field::new(b"a \"b\" c", span(0, 7, true), b'"', QuoteRule::Verbatim);
        assert!(matches!(verbatim.unescape(), Cow::Borrowed(_)));
    }

    #[test]
    fn test_byte_record() {
        let mut record = ByteRecord::new();

        assert_eq!(record.len(), 0);
        assert_eq!(record.is_empty(), true);
        assert_eq!(record.get(0), None);

        record.push_field(b"name");
        record.push_field(b"surname");
        record.push_field(b"age");

        let expected: Vec<&[u8]> = vec![b"name", b"surname", b"age"];
        assert_eq!(record.iter().collect::<Vec<_>>(), expected);

        assert_eq!(record.get(0), Some::<&[u8]>(b"name"));
        assert_eq!(record.get(1), Some::<&[u8]>(b"surname"));
        assert_eq!(record.get(2), Some::<&[u8]>(b"age"));
        assert_eq!(record.get(3), None);

        assert_eq!(record, brec!["name", "surname", "age"]);
        assert_eq!(record.iter().rev().collect::<ByteRecord>(), brec!["age", "surname", "name"]);

        record.clear();
        assert!(record.is_empty());
    }
}
