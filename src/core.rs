use memchr::{memchr, memchr2, memchr3};

use crate::dialect::{Eol, QuoteRule};
use crate::error::{self, Error, FormatErrorKind};
use crate::utils::{is_strippable_white, trim_trailing_white};

/// Number of line endings a quoted field may span before being considered
/// unterminated.
const MAX_QUOTED_EOLS: usize = 100;

/// Bounds of a field's content inside the buffer, quotes excluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FieldSpan {
    pub(crate) start: usize,
    pub(crate) end: usize,
    pub(crate) quoted: bool,
}

impl FieldSpan {
    #[inline(always)]
    pub(crate) fn empty(pos: usize) -> Self {
        Self {
            start: pos,
            end: pos,
            quoted: false,
        }
    }
}

/// Everything the tokenizer needs to know about the data's syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Syntax {
    pub(crate) separator: u8,
    pub(crate) quote: u8,
    pub(crate) quote_rule: QuoteRule,
    pub(crate) eol: Eol,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Settings {
    pub(crate) fill: bool,
    pub(crate) strip_white: bool,
    pub(crate) skip_blank_lines: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            fill: true,
            strip_white: true,
            skip_blank_lines: true,
        }
    }
}

enum Closing {
    Quote(usize),
    Bare(usize),
}

// NOTE: the tokenizer holds no position. Every operation takes the position it
// starts from and returns the one it stopped at, so that trial parses can be
// run from any offset without touching the state of a live reader.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Tokenizer<'b> {
    bytes: &'b [u8],
    begin: usize,
    end: usize,
    syntax: Syntax,
    settings: Settings,
}

impl<'b> Tokenizer<'b> {
    pub(crate) fn new(
        bytes: &'b [u8],
        begin: usize,
        end: usize,
        syntax: Syntax,
        settings: Settings,
    ) -> Self {
        debug_assert!(begin <= end && end <= bytes.len());

        Self {
            bytes,
            begin,
            end,
            syntax,
            settings,
        }
    }

    #[inline(always)]
    pub(crate) fn begin(&self) -> usize {
        self.begin
    }

    #[inline(always)]
    pub(crate) fn end(&self) -> usize {
        self.end
    }

    /// Skip blank lines found at `pos`, if the settings say so.
    #[inline]
    pub(crate) fn skip_blank_lines_if_enabled(&self, pos: usize) -> usize {
        if self.settings.skip_blank_lines {
            self.skip_blank_lines(pos)
        } else {
            pos
        }
    }

    #[inline(always)]
    fn trigger(&self) -> u8 {
        self.syntax.eol.trigger()
    }

    #[inline(always)]
    fn is_terminator(&self, byte: u8) -> bool {
        byte == self.syntax.separator || byte == self.trigger()
    }

    #[inline(always)]
    pub(crate) fn is_sep(&self, pos: usize) -> bool {
        pos < self.end && self.bytes[pos] == self.syntax.separator
    }

    #[inline(always)]
    pub(crate) fn is_eol(&self, pos: usize) -> bool {
        pos < self.end && self.bytes[pos] == self.trigger()
    }

    #[inline(always)]
    pub(crate) fn is_end(&self, pos: usize) -> bool {
        pos >= self.end
    }

    #[inline(always)]
    pub(crate) fn is_eol_or_end(&self, pos: usize) -> bool {
        pos >= self.end || self.bytes[pos] == self.trigger()
    }

    #[inline(always)]
    pub(crate) fn is_white(&self, pos: usize) -> bool {
        pos < self.end && is_strippable_white(self.bytes[pos], self.syntax.separator)
    }

    /// Whether `pos` is somewhere a field may start: the window start, the
    /// buffer start, or right after a separator or a line ending.
    #[inline]
    pub(crate) fn is_field_begin(&self, pos: usize) -> bool {
        if pos == self.begin || pos == 0 {
            return true;
        }

        let previous = self.bytes[pos - 1];

        previous == self.syntax.separator || previous == self.syntax.eol.last()
    }

    /// Whether `pos` is somewhere a record may start: the window start, or
    /// right after a line ending.
    #[inline]
    pub(crate) fn is_record_begin(&self, pos: usize) -> bool {
        pos == self.begin || pos == 0 || self.bytes[pos - 1] == self.syntax.eol.last()
    }

    #[inline]
    pub(crate) fn skip_white(&self, mut pos: usize) -> usize {
        while self.is_white(pos) {
            pos += 1;
        }

        pos
    }

    /// Skip a separator known to be at `pos`. Consecutive spaces count as a
    /// single separator when the separator is a space.
    #[inline]
    pub(crate) fn skip_sep(&self, mut pos: usize) -> usize {
        pos += 1;

        if self.syntax.separator == b' ' {
            while pos < self.end && self.bytes[pos] == b' ' {
                pos += 1;
            }
        }

        pos
    }

    #[inline]
    pub(crate) fn skip_eol(&self, pos: usize) -> usize {
        (pos + self.syntax.eol.len()).min(self.end)
    }

    /// Position right after the next line ending found from `pos`, disregarding
    /// quoting entirely, or the end of the window.
    #[inline]
    pub(crate) fn next_line(&self, pos: usize) -> usize {
        if pos >= self.end {
            return self.end;
        }

        match memchr(self.trigger(), &self.bytes[pos..self.end]) {
            Some(offset) => self.skip_eol(pos + offset),
            None => self.end,
        }
    }

    /// Skip blank lines (and whitespace-only lines when stripping white) found
    /// at `pos`. Lines made of spaces only are blank when the separator is a
    /// space.
    pub(crate) fn skip_blank_lines(&self, mut pos: usize) -> usize {
        let space_separated = self.syntax.separator == b' ';

        loop {
            if pos >= self.end {
                return pos;
            }

            let mut probe = pos;

            while probe < self.end
                && ((self.settings.strip_white && self.is_white(probe))
                    || (space_separated && self.bytes[probe] == b' '))
            {
                probe += 1;
            }

            if probe >= self.end {
                return self.end;
            }

            if self.bytes[probe] != self.trigger() {
                return pos;
            }

            pos = self.skip_eol(probe);
        }
    }

    #[inline]
    fn unquoted_span(&self, start: usize, stop: usize) -> FieldSpan {
        let end = if self.settings.strip_white {
            start + trim_trailing_white(&self.bytes[start..stop], self.syntax.separator).len()
        } else {
            stop
        };

        FieldSpan {
            start,
            end,
            quoted: false,
        }
    }

    #[inline]
    fn scan_unquoted(&self, start: usize) -> (FieldSpan, usize) {
        let stop = match memchr2(
            self.syntax.separator,
            self.trigger(),
            &self.bytes[start..self.end],
        ) {
            Some(offset) => start + offset,
            None => self.end,
        };

        (self.unquoted_span(start, stop), stop)
    }

    #[inline]
    fn is_closing_quote(&self, pos: usize) -> bool {
        pos + 1 >= self.end || self.is_terminator(self.bytes[pos + 1])
    }

    fn find_doubled_closing(&self, open: usize) -> error::Result<usize> {
        let quote = self.syntax.quote;
        let mut pos = open + 1;
        let mut eols: usize = 0;

        while pos < self.end {
            pos += match memchr2(quote, self.trigger(), &self.bytes[pos..self.end]) {
                Some(offset) => offset,
                None => break,
            };

            if self.bytes[pos] == quote {
                if pos + 1 < self.end && self.bytes[pos + 1] == quote {
                    pos += 2;
                    continue;
                }

                return Ok(pos);
            }

            eols += 1;

            if eols >= MAX_QUOTED_EOLS {
                break;
            }

            pos += 1;
        }

        Err(Error::format(FormatErrorKind::UnterminatedQuote, open))
    }

    fn find_escaped_closing(&self, open: usize) -> error::Result<usize> {
        let quote = self.syntax.quote;
        let mut pos = open + 1;
        let mut eols: usize = 0;

        while pos < self.end {
            pos += match memchr3(quote, b'\\', self.trigger(), &self.bytes[pos..self.end]) {
                Some(offset) => offset,
                None => break,
            };

            let byte = self.bytes[pos];

            if byte == quote {
                return Ok(pos);
            }

            if byte == b'\\' {
                // The escaped byte is skipped whatever it is
                pos += 2;
                continue;
            }

            eols += 1;

            if eols >= MAX_QUOTED_EOLS {
                break;
            }

            pos += 1;
        }

        Err(Error::format(FormatErrorKind::UnterminatedQuote, open))
    }

    /// Look for a quote directly followed by a separator, a line ending or the
    /// end of the window, without leaving the current line.
    fn find_closing_quote_on_line(&self, mut pos: usize) -> Option<usize> {
        while pos < self.end {
            pos += memchr2(self.syntax.quote, self.trigger(), &self.bytes[pos..self.end])?;

            if self.bytes[pos] != self.syntax.quote {
                return None;
            }

            if self.is_closing_quote(pos) {
                return Some(pos);
            }

            pos += 1;
        }

        None
    }

    // Quotes are literal inside verbatim fields. A quote only closes the field
    // when followed by a separator, a line ending or the end of the window.
    // When the first bare separator comes before such a quote, the rest of the
    // line decides: a closing quote found later on the line wins, else the
    // field ends on that separator and its quotes are ordinary content.
    fn find_verbatim_closing(&self, open: usize) -> Closing {
        let quote = self.syntax.quote;
        let separator = self.syntax.separator;
        let mut pos = open + 1;

        while pos < self.end {
            pos += match memchr3(quote, separator, self.trigger(), &self.bytes[pos..self.end]) {
                Some(offset) => offset,
                None => break,
            };

            let byte = self.bytes[pos];

            if byte == self.trigger() {
                return Closing::Bare(pos);
            }

            if byte == quote {
                if self.is_closing_quote(pos) {
                    return Closing::Quote(pos);
                }

                pos += 1;
                continue;
            }

            return match self.find_closing_quote_on_line(pos + 1) {
                Some(closing) => Closing::Quote(closing),
                None => Closing::Bare(pos),
            };
        }

        Closing::Bare(self.end)
    }

    /// Scan the field starting at `pos`, returning its content bounds and the
    /// position where it stopped, i.e. a separator, a line ending or the end
    /// of the window. Neither the separator nor the line ending are consumed.
    pub(crate) fn scan_field(&self, pos: usize) -> error::Result<(FieldSpan, usize)> {
        if !self.is_field_begin(pos) {
            return Err(Error::format(FormatErrorKind::WrongFieldBegin, pos));
        }

        let start = if self.settings.strip_white {
            self.skip_white(pos)
        } else {
            pos
        };

        if start >= self.end || self.bytes[start] != self.syntax.quote {
            return Ok(self.scan_unquoted(start));
        }

        let closing = match self.syntax.quote_rule {
            QuoteRule::None => return Ok(self.scan_unquoted(start)),
            QuoteRule::Doubled => Closing::Quote(self.find_doubled_closing(start)?),
            QuoteRule::Escaped => Closing::Quote(self.find_escaped_closing(start)?),
            QuoteRule::Verbatim => self.find_verbatim_closing(start),
        };

        match closing {
            Closing::Bare(stop) => Ok((self.unquoted_span(start, stop), stop)),
            Closing::Quote(closing) => {
                let mut next = closing + 1;

                if self.settings.strip_white {
                    next = self.skip_white(next);
                }

                if next < self.end && !self.is_terminator(self.bytes[next]) {
                    return Err(Error::format(FormatErrorKind::MalformedField, next));
                }

                let span = FieldSpan {
                    start: start + 1,
                    end: closing,
                    quoted: true,
                };

                Ok((span, next))
            }
        }
    }

    /// Walk the record starting at `pos`, calling `on_field` for each of its
    /// fields. Returns the number of fields and the position of the next
    /// record, line ending (and blank lines if required) skipped.
    pub(crate) fn walk_record<F>(&self, mut pos: usize, mut on_field: F) -> error::Result<(usize, usize)>
    where
        F: FnMut(FieldSpan),
    {
        let space_separated = self.syntax.separator == b' ';
        let mut count: usize = 0;

        // Leading spaces only pad space separated columns
        if space_separated && self.is_sep(pos) && self.is_record_begin(pos) {
            pos = self.skip_sep(pos);
        }

        while !self.is_eol_or_end(pos) {
            let (span, next) = self.scan_field(pos)?;

            on_field(span);
            count += 1;
            pos = next;

            if self.is_sep(pos) {
                pos = self.skip_sep(pos);

                // A trailing separator opens a last, empty, field
                if !space_separated && self.is_eol_or_end(pos) {
                    on_field(FieldSpan::empty(pos));
                    count += 1;
                }
            }
        }

        if self.is_eol(pos) {
            pos = self.skip_eol(pos);
        }

        Ok((count, self.skip_blank_lines_if_enabled(pos)))
    }

    #[inline]
    pub(crate) fn skip_record(&self, pos: usize) -> error::Result<(usize, usize)> {
        self.walk_record(pos, |_| {})
    }
}
