use std::fs::File;
use std::path::Path;

use memmap2::Mmap;

use crate::core::{FieldSpan, Settings, Tokenizer};
use crate::dialect::{self, DetectOptions, Dialect, Eol, QuoteRule};
use crate::error::{self, Error, ErrorKind, FormatErrorKind};
use crate::records::{ByteRecord, Field, Record};

/// Builds a [`Reader`] with given configuration.
///
/// Everything left unset is detected from the data when opening it.
#[derive(Debug, Clone)]
pub struct ReaderBuilder {
    separator: Option<u8>,
    quote_rule: Option<QuoteRule>,
    eol: Option<Eol>,
    quote: u8,
    fill: bool,
    strip_white: bool,
    skip_blank_lines: bool,
    verbose: bool,
    begin_offset: Option<usize>,
    end_offset: Option<usize>,
}

impl Default for ReaderBuilder {
    fn default() -> Self {
        Self {
            separator: None,
            quote_rule: None,
            eol: None,
            quote: b'"',
            fill: true,
            strip_white: true,
            skip_blank_lines: true,
            verbose: false,
            begin_offset: None,
            end_offset: None,
        }
    }
}

impl ReaderBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the separator instead of detecting it.
    pub fn separator(&mut self, separator: u8) -> &mut Self {
        self.separator = Some(separator);
        self
    }

    /// Set the quote rule instead of detecting it.
    pub fn quote_rule(&mut self, quote_rule: QuoteRule) -> &mut Self {
        self.quote_rule = Some(quote_rule);
        self
    }

    /// Set the line ending instead of detecting it.
    pub fn eol(&mut self, eol: Eol) -> &mut Self {
        self.eol = Some(eol);
        self
    }

    pub fn quote(&mut self, quote: u8) -> &mut Self {
        self.quote = quote;
        self
    }

    /// Whether to pad records having less fields than expected with empty
    /// fields. When disabled, such records are errors.
    pub fn fill(&mut self, yes: bool) -> &mut Self {
        self.fill = yes;
        self
    }

    /// Whether to strip spaces and tabs around fields. A space (resp. a tab)
    /// is never stripped when it is the separator.
    pub fn strip_white(&mut self, yes: bool) -> &mut Self {
        self.strip_white = yes;
        self
    }

    pub fn skip_blank_lines(&mut self, yes: bool) -> &mut Self {
        self.skip_blank_lines = yes;
        self
    }

    /// Log detection steps at the `info` level instead of the `debug` one.
    pub fn verbose(&mut self, yes: bool) -> &mut Self {
        self.verbose = yes;
        self
    }

    /// Start reading at given byte offset instead of the detected one.
    pub fn begin_offset(&mut self, offset: usize) -> &mut Self {
        self.begin_offset = Some(offset);
        self
    }

    /// Stop reading at given byte offset instead of the end of the data.
    pub fn end_offset(&mut self, offset: usize) -> &mut Self {
        self.end_offset = Some(offset);
        self
    }

    fn settings(&self) -> Settings {
        Settings {
            fill: self.fill,
            strip_white: self.strip_white,
            skip_blank_lines: self.skip_blank_lines,
        }
    }

    pub fn from_bytes<B: AsRef<[u8]>>(&self, buffer: B) -> error::Result<Reader<B>> {
        let settings = self.settings();

        let options = DetectOptions {
            separator: self.separator,
            quote_rule: self.quote_rule,
            eol: self.eol,
            quote: self.quote,
            settings,
            verbose: self.verbose,
        };

        let bytes = buffer.as_ref();
        let detected = dialect::detect(bytes, &options)?;

        let begin = self.begin_offset.unwrap_or(detected.begin);
        let end = self.end_offset.unwrap_or(detected.end);

        if end > bytes.len() {
            return Err(Error::new(ErrorKind::OutOfBounds {
                pos: end,
                start: begin,
                end: bytes.len(),
            }));
        }

        if begin > end {
            return Err(Error::new(ErrorKind::OutOfBounds {
                pos: begin,
                start: 0,
                end,
            }));
        }

        log::debug!(
            "reading window [{}, {}) of {} bytes",
            begin,
            end,
            bytes.len()
        );

        Ok(Reader {
            buffer,
            dialect: detected.dialect,
            settings,
            begin,
            end,
            pos: begin,
            spans: Vec::new(),
        })
    }

    /// Memory map the file found at `path` and open it.
    pub fn from_path<P: AsRef<Path>>(&self, path: P) -> error::Result<Reader<Mmap>> {
        let file = File::open(path)?;

        // SAFETY: the map is read-only and the file is expected not to be
        // modified while being read.
        let map = unsafe { Mmap::map(&file)? };

        self.from_bytes(map)
    }
}

/// A cursor over CSV data entirely held in memory, or memory mapped.
///
/// The dialect of the data is detected when opening it. The reader then
/// exposes a set of predicates and skip/read operations moving its cursor
/// forward over the window `[begin_offset, end_offset)`.
pub struct Reader<B> {
    buffer: B,
    dialect: Dialect,
    settings: Settings,
    begin: usize,
    end: usize,
    pos: usize,
    spans: Vec<FieldSpan>,
}

impl<B: AsRef<[u8]>> Reader<B> {
    pub fn from_bytes(buffer: B) -> error::Result<Self> {
        ReaderBuilder::new().from_bytes(buffer)
    }

    #[inline]
    pub(crate) fn tokenizer(&self) -> Tokenizer<'_> {
        Tokenizer::new(
            self.buffer.as_ref(),
            self.begin,
            self.end,
            self.dialect.syntax(),
            self.settings,
        )
    }

    #[inline(always)]
    pub(crate) fn fill(&self) -> bool {
        self.settings.fill
    }

    #[inline(always)]
    pub(crate) fn set_position(&mut self, pos: usize) {
        debug_assert!(self.begin <= pos && pos <= self.end);
        self.pos = pos;
    }

    #[inline(always)]
    pub fn dialect(&self) -> &Dialect {
        &self.dialect
    }

    #[inline(always)]
    pub fn separator(&self) -> u8 {
        self.dialect.separator()
    }

    #[inline(always)]
    pub fn quote_rule(&self) -> QuoteRule {
        self.dialect.quote_rule()
    }

    #[inline(always)]
    pub fn eol(&self) -> Eol {
        self.dialect.eol()
    }

    #[inline(always)]
    pub fn field_count(&self) -> usize {
        self.dialect.field_count()
    }

    #[inline(always)]
    pub fn begin_offset(&self) -> usize {
        self.begin
    }

    #[inline(always)]
    pub fn end_offset(&self) -> usize {
        self.end
    }

    /// Byte offset of the cursor.
    #[inline(always)]
    pub fn position(&self) -> usize {
        self.pos
    }

    #[inline(always)]
    pub fn buffer_len(&self) -> usize {
        self.buffer.as_ref().len()
    }

    #[inline(always)]
    pub fn get_ref(&self) -> &B {
        &self.buffer
    }

    pub fn into_inner(self) -> B {
        self.buffer
    }

    /// Returns whether the cursor has not reached the end of the window yet.
    #[inline(always)]
    pub fn has_remaining(&self) -> bool {
        self.pos < self.end
    }

    /// Move the cursor back to the start of the window.
    #[inline]
    pub fn rewind(&mut self) {
        self.pos = self.begin;
    }

    #[inline]
    pub fn is_sep(&self) -> bool {
        self.tokenizer().is_sep(self.pos)
    }

    #[inline]
    pub fn is_eol(&self) -> bool {
        self.tokenizer().is_eol(self.pos)
    }

    #[inline]
    pub fn is_end(&self) -> bool {
        self.pos >= self.end
    }

    #[inline]
    pub fn is_eol_or_end(&self) -> bool {
        self.tokenizer().is_eol_or_end(self.pos)
    }

    /// Returns whether the cursor sits at the very start of the buffer.
    #[inline]
    pub fn is_begin(&self) -> bool {
        self.pos == 0
    }

    /// Skip spaces and tabs that are not the separator.
    pub fn skip_if_white(&mut self) -> &mut Self {
        self.pos = self.tokenizer().skip_white(self.pos);
        self
    }

    pub fn skip_sep(&mut self) -> error::Result<&mut Self> {
        if !self.is_sep() {
            return Err(Error::format(FormatErrorKind::ExpectedSeparator, self.pos));
        }

        self.pos = self.tokenizer().skip_sep(self.pos);
        Ok(self)
    }

    pub fn skip_if_sep(&mut self) -> &mut Self {
        if self.is_sep() {
            self.pos = self.tokenizer().skip_sep(self.pos);
        }

        self
    }

    pub fn skip_eol(&mut self) -> error::Result<&mut Self> {
        if !self.is_eol() {
            return Err(Error::format(FormatErrorKind::ExpectedEol, self.pos));
        }

        self.pos = self.tokenizer().skip_eol(self.pos);
        Ok(self)
    }

    pub fn skip_if_eol(&mut self) -> &mut Self {
        if self.is_eol() {
            self.pos = self.tokenizer().skip_eol(self.pos);
        }

        self
    }

    /// Skip the field under the cursor, and the separator following it if any.
    pub fn skip_field(&mut self) -> error::Result<&mut Self> {
        let (_, next) = self.tokenizer().scan_field(self.pos)?;
        self.pos = next;
        Ok(self.skip_if_sep())
    }

    /// Skip the record under the cursor, returning its number of fields.
    pub fn skip_record(&mut self) -> error::Result<usize> {
        let (count, next) = self.tokenizer().skip_record(self.pos)?;
        self.pos = next;
        Ok(count)
    }

    /// Read the field under the cursor, and skip the separator following it if
    /// any.
    pub fn read_field(&mut self) -> error::Result<Field<'_>> {
        let tokenizer = self.tokenizer();
        let (span, mut next) = tokenizer.scan_field(self.pos)?;

        if tokenizer.is_sep(next) {
            next = tokenizer.skip_sep(next);
        }

        self.pos = next;

        Ok(Field::new(
            self.buffer.as_ref(),
            span,
            self.dialect.quote(),
            self.dialect.quote_rule(),
        ))
    }

    /// Read the record under the cursor.
    ///
    /// Returns `None` when the end of the window is reached. A record always
    /// has [`Reader::field_count`] fields: shorter records are padded with
    /// empty fields in fill mode, and are errors otherwise. When an error is
    /// returned, the cursor is not moved.
    pub fn read_record(&mut self) -> error::Result<Option<Record<'_>>> {
        let tokenizer = Tokenizer::new(
            self.buffer.as_ref(),
            self.begin,
            self.end,
            self.dialect.syntax(),
            self.settings,
        );

        let start = tokenizer.skip_blank_lines_if_enabled(self.pos);

        if tokenizer.is_end(start) {
            self.pos = self.end;
            return Ok(None);
        }

        let spans = &mut self.spans;
        spans.clear();

        let (count, next) = tokenizer.walk_record(start, |span| spans.push(span))?;
        let field_count = self.dialect.field_count();

        if count > field_count || (count < field_count && !self.settings.fill) {
            return Err(Error::format(
                FormatErrorKind::UnequalLengths {
                    expected_len: field_count,
                    len: count,
                },
                start,
            ));
        }

        let padding = spans.last().map(|span| span.end).unwrap_or(start);
        spans.resize(field_count, FieldSpan::empty(padding));

        self.pos = next;

        Ok(Some(Record::new(
            self.buffer.as_ref(),
            &self.spans,
            self.dialect.quote(),
            self.dialect.quote_rule(),
        )))
    }

    /// Read the record under the cursor into an owned and unescaped
    /// [`ByteRecord`]. Returns `false` when the end of the window is reached.
    pub fn read_byte_record(&mut self, record: &mut ByteRecord) -> error::Result<bool> {
        match self.read_record()? {
            None => Ok(false),
            Some(view) => {
                view.read_byte_record(record);
                Ok(true)
            }
        }
    }

    /// Count the records from the cursor to the end of the window, consuming
    /// them.
    pub fn count_records(&mut self) -> error::Result<u64> {
        let mut count: u64 = 0;

        while self.read_record()?.is_some() {
            count += 1;
        }

        Ok(count)
    }
}

impl Reader<Mmap> {
    pub fn from_path<P: AsRef<Path>>(path: P) -> error::Result<Self> {
        ReaderBuilder::new().from_path(path)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use bstr::ByteSlice;

    use super::*;

    fn collect<B: AsRef<[u8]>>(reader: &mut Reader<B>) -> error::Result<Vec<ByteRecord>> {
        let mut records = Vec::new();
        let mut record = ByteRecord::new();

        while reader.read_byte_record(&mut record)? {
            records.push(record.clone());
        }

        Ok(records)
    }

    #[test]
    fn test_read_record() -> error::Result<()> {
        let data = "name,surname,age\n\"john\",\"landy, the \"\"third\"\"\",45\nlucy,rose,67\n";
        let mut reader = Reader::from_bytes(data)?;

        assert_eq!(reader.separator(), b',');
        assert_eq!(reader.quote_rule(), QuoteRule::Doubled);
        assert_eq!(reader.eol(), Eol::Lf);
        assert_eq!(reader.field_count(), 3);
        assert!(reader.is_begin());

        {
            let record = reader.read_record()?.unwrap();
            assert_eq!(record.get(1), Some::<&[u8]>(b"surname"));
        }

        {
            let record = reader.read_record()?.unwrap();
            assert_eq!(record.get(0), Some::<&[u8]>(b"john"));
            assert_eq!(record.get(1), Some::<&[u8]>(b"landy, the \"\"third\"\""));
            assert_eq!(record.unescape(1).unwrap().as_ref(), b"landy, the \"third\"");
        }

        assert_eq!(
            collect(&mut reader)?,
            vec![brec!["lucy", "rose", "67"]]
        );
        assert!(!reader.has_remaining());
        assert!(reader.read_record()?.is_none());

        reader.rewind();
        assert_eq!(reader.count_records()?, 3);

        Ok(())
    }

    #[test]
    fn test_fill() -> error::Result<()> {
        let data = "a,b,c\n1,2,3\n4,5\n6,7,8\n";

        let mut reader = Reader::from_bytes(data)?;
        let records = collect(&mut reader)?;
        assert_eq!(records[2], brec!["4", "5", ""]);
        assert_eq!(records.len(), 4);

        let mut reader = ReaderBuilder::new().fill(false).from_bytes(data)?;
        assert_eq!(reader.field_count(), 3);
        reader.skip_record()?;
        reader.skip_record()?;

        let err = reader.read_record().unwrap_err();
        assert!(err.is_format_error());
        assert!(matches!(
            err.kind(),
            ErrorKind::Format {
                kind: FormatErrorKind::UnequalLengths {
                    expected_len: 3,
                    len: 2
                },
                pos: 12
            }
        ));
        assert_eq!(reader.position(), 12);

        // Recovery is up to the caller
        assert_eq!(reader.skip_record()?, 2);
        assert_eq!(collect(&mut reader)?, vec![brec!["6", "7", "8"]]);

        Ok(())
    }

    #[test]
    fn test_blank_lines() -> error::Result<()> {
        let sparse = "a,b\n\n1,2\n  \n\n3,4\n\n";
        let dense = "a,b\n1,2\n3,4\n";

        let sparse_records = collect(&mut Reader::from_bytes(sparse)?)?;
        let dense_records = collect(&mut Reader::from_bytes(dense)?)?;

        assert_eq!(sparse_records, dense_records);
        assert_eq!(sparse_records.len(), 3);

        Ok(())
    }

    #[test]
    fn test_space_separated_blank_lines() -> error::Result<()> {
        let data = "001 307 0930\n   \n002 307 0940\n  \n";
        let mut reader = Reader::from_bytes(data)?;

        assert_eq!(reader.separator(), b' ');
        assert_eq!(
            collect(&mut reader)?,
            vec![brec!["001", "307", "0930"], brec!["002", "307", "0940"]]
        );

        Ok(())
    }

    #[test]
    fn test_cr_with_blank_line() -> error::Result<()> {
        let mut reader = Reader::from_bytes(b"a,b\r\r1,2\r3,4\r")?;

        assert_eq!(reader.eol(), Eol::Cr);
        assert_eq!(
            collect(&mut reader)?,
            vec![brec!["a", "b"], brec!["1", "2"], brec!["3", "4"]]
        );

        Ok(())
    }

    #[test]
    fn test_crlf_and_bom() -> error::Result<()> {
        let data = b"\xef\xbb\xbfa;b\r\n1;2\r\n";
        let mut reader = Reader::from_bytes(data)?;

        assert_eq!(reader.eol(), Eol::CrLf);
        assert_eq!(reader.separator(), b';');
        assert_eq!(reader.begin_offset(), 3);
        assert_eq!(
            collect(&mut reader)?,
            vec![brec!["a", "b"], brec!["1", "2"]]
        );

        Ok(())
    }

    #[test]
    fn test_skip_if_idempotence() -> error::Result<()> {
        let mut reader = Reader::from_bytes("ab,cd\nef,gh\n")?;

        reader.skip_if_sep().skip_if_eol().skip_if_white();
        assert_eq!(reader.position(), 0);

        assert!(reader.skip_sep().is_err());
        assert!(reader.skip_eol().is_err());
        assert_eq!(reader.position(), 0);

        reader.skip_field()?;
        assert_eq!(reader.position(), 3);

        assert_eq!(reader.read_field()?.as_bytes(), b"cd");
        assert!(reader.is_eol());
        assert!(reader.is_eol_or_end());

        reader.skip_if_sep();
        assert_eq!(reader.position(), 5);

        reader.skip_eol()?;
        assert_eq!(reader.position(), 6);

        reader.skip_if_eol();
        assert_eq!(reader.position(), 6);

        Ok(())
    }

    #[test]
    fn test_verbatim_and_escaped() -> error::Result<()> {
        let mut reader = Reader::from_bytes("\"a \"b\" c\",next\n\"d\",e\n")?;
        assert_eq!(reader.quote_rule(), QuoteRule::Verbatim);

        let record = reader.read_record()?.unwrap();
        assert_eq!(record.get(0), Some::<&[u8]>(b"a \"b\" c"));
        assert_eq!(record.get(1), Some::<&[u8]>(b"next"));

        let mut reader = ReaderBuilder::new()
            .quote_rule(QuoteRule::Escaped)
            .from_bytes("\"hello \\\"you\\\"\",1\n")?;

        assert_eq!(collect(&mut reader)?, vec![brec!["hello \"you\"", "1"]]);

        Ok(())
    }

    #[test]
    fn test_offsets() -> error::Result<()> {
        let data = "a,b\n1,2\n3,4\n";

        let mut reader = ReaderBuilder::new()
            .begin_offset(4)
            .end_offset(8)
            .from_bytes(data)?;

        assert_eq!(collect(&mut reader)?, vec![brec!["1", "2"]]);

        let err = ReaderBuilder::new().end_offset(100).from_bytes(data).err().unwrap();
        assert!(matches!(err.kind(), ErrorKind::OutOfBounds { pos: 100, .. }));

        let err = ReaderBuilder::new()
            .begin_offset(8)
            .end_offset(4)
            .from_bytes(data)
            .err()
            .unwrap();
        assert!(matches!(err.kind(), ErrorKind::OutOfBounds { pos: 8, .. }));

        Ok(())
    }

    #[test]
    fn test_csv_crate_oracle() -> error::Result<()> {
        let rows: Vec<Vec<&str>> = vec![
            vec!["name", "quote", "count"],
            vec!["john", "he said \"hi\"", "1"],
            vec!["lucy", "comma, inside", "2"],
            vec!["mary", "multi\nline", "3"],
            vec!["bob", "", "4"],
        ];

        let mut writer = csv::Writer::from_writer(Vec::new());

        for row in rows.iter() {
            writer.write_record(row).unwrap();
        }

        let data = writer.into_inner().unwrap();
        let mut reader = Reader::from_bytes(&data)?;
        let records = collect(&mut reader)?;

        assert_eq!(records.len(), rows.len());

        for (record, row) in records.iter().zip(rows.iter()) {
            assert_eq!(
                record,
                &row.iter().collect::<ByteRecord>(),
                "{:?}",
                record.iter().map(|cell| cell.as_bstr()).collect::<Vec<_>>()
            );
        }

        Ok(())
    }

    #[test]
    fn test_from_path() -> error::Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        file.write_all(b"a|b|c\n1|2|3\n")?;
        file.flush()?;

        let mut reader = Reader::from_path(file.path())?;
        assert_eq!(reader.separator(), b'|');
        assert_eq!(reader.buffer_len(), 12);
        assert_eq!(collect(&mut reader)?.len(), 2);

        let err = Reader::from_path("/this/file/does/not/exist.csv").err().unwrap();
        assert!(err.is_io_error());

        Ok(())
    }
}
