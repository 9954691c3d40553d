use std::fmt;
use std::str::FromStr;

use log::Level;
use memchr::{memchr, memchr3};

use crate::core::{Settings, Syntax, Tokenizer};
use crate::debug;
use crate::error::{self, Error, ErrorKind, FormatErrorKind};
use crate::utils::is_space;

/// Maximum number of records parsed when testing a candidate dialect.
const JUMP_LINES: usize = 100;

const CANDIDATE_SEPARATORS: [u8; 5] = [b',', b'|', b';', b'\t', b' '];

const UTF8_BOM: &[u8] = b"\xef\xbb\xbf";
const GB18030_BOM: &[u8] = b"\x84\x31\x95\x33";
const SUBSTITUTE: u8 = 0x1a;

/// Convention used to embed quotes, separators and line endings inside a
/// field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuoteRule {
    /// A quote inside a quoted field is written as two quotes, e.g. `"a ""b"""`.
    Doubled,
    /// A backslash escapes the following byte, e.g. `"a \"b\""`.
    Escaped,
    /// Quotes inside a quoted field are left as is, e.g. `"a "b""`. A quote
    /// only closes the field when followed by a separator or a line ending.
    Verbatim,
    /// Quotes are ordinary content.
    None,
}

impl QuoteRule {
    /// All the rules, in the order they are tried during detection.
    pub const ALL: [QuoteRule; 4] = [Self::Doubled, Self::Escaped, Self::Verbatim, Self::None];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Doubled => "doubled",
            Self::Escaped => "escaped",
            Self::Verbatim => "verbatim",
            Self::None => "none",
        }
    }
}

impl fmt::Display for QuoteRule {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuoteRule {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "doubled" => Self::Doubled,
            "escaped" => Self::Escaped,
            "verbatim" => Self::Verbatim,
            "none" => Self::None,
            _ => {
                return Err(Error::new(ErrorKind::UnknownOption {
                    name: "quote_rule",
                    value: s.to_string(),
                }))
            }
        })
    }
}

/// Line ending terminating records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Eol {
    /// `\n`
    Lf,
    /// `\r\n`
    CrLf,
    /// `\r`
    Cr,
    /// `\n\r`
    LfCr,
}

impl Eol {
    #[inline]
    pub fn as_bytes(&self) -> &'static [u8] {
        match self {
            Self::Lf => b"\n",
            Self::CrLf => b"\r\n",
            Self::Cr => b"\r",
            Self::LfCr => b"\n\r",
        }
    }

    #[inline(always)]
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    /// First byte of the line ending, i.e. the byte searched for when looking
    /// for the end of a record.
    #[inline(always)]
    pub fn trigger(&self) -> u8 {
        self.as_bytes()[0]
    }

    #[inline(always)]
    pub(crate) fn last(&self) -> u8 {
        let bytes = self.as_bytes();
        bytes[bytes.len() - 1]
    }
}

impl fmt::Display for Eol {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Self::Lf => "\\n",
            Self::CrLf => "\\r\\n",
            Self::Cr => "\\r",
            Self::LfCr => "\\n\\r",
        })
    }
}

impl FromStr for Eol {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "lf" | "\n" => Self::Lf,
            "crlf" | "\r\n" => Self::CrLf,
            "cr" | "\r" => Self::Cr,
            "lfcr" | "\n\r" => Self::LfCr,
            _ => {
                return Err(Error::new(ErrorKind::UnknownOption {
                    name: "eol",
                    value: s.to_string(),
                }))
            }
        })
    }
}

/// The resolved convention of some CSV data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dialect {
    separator: u8,
    quote: u8,
    quote_rule: QuoteRule,
    eol: Eol,
    field_count: usize,
}

impl Dialect {
    #[inline(always)]
    pub fn separator(&self) -> u8 {
        self.separator
    }

    #[inline(always)]
    pub fn quote(&self) -> u8 {
        self.quote
    }

    #[inline(always)]
    pub fn quote_rule(&self) -> QuoteRule {
        self.quote_rule
    }

    #[inline(always)]
    pub fn eol(&self) -> Eol {
        self.eol
    }

    /// Number of fields of a record.
    #[inline(always)]
    pub fn field_count(&self) -> usize {
        self.field_count
    }

    pub(crate) fn syntax(&self) -> Syntax {
        Syntax {
            separator: self.separator,
            quote: self.quote,
            quote_rule: self.quote_rule,
            eol: self.eol,
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "separator={:?} quote={:?} quote_rule={} eol={} fields={}",
            debug::Bytes(&[self.separator]),
            debug::Bytes(&[self.quote]),
            self.quote_rule,
            self.eol,
            self.field_count
        )
    }
}

/// What the caller already knows about the data.
#[derive(Debug, Clone, Copy)]
pub(crate) struct DetectOptions {
    pub(crate) separator: Option<u8>,
    pub(crate) quote_rule: Option<QuoteRule>,
    pub(crate) eol: Option<Eol>,
    pub(crate) quote: u8,
    pub(crate) settings: Settings,
    pub(crate) verbose: bool,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Detected {
    pub(crate) begin: usize,
    pub(crate) end: usize,
    pub(crate) dialect: Dialect,
}

#[derive(Debug, Clone, Copy)]
struct Run {
    fields: usize,
    lines: usize,
}

struct Detector<'b> {
    bytes: &'b [u8],
    options: &'b DetectOptions,
    level: Level,
}

impl<'b> Detector<'b> {
    fn strip_edges(&self) -> error::Result<(usize, usize)> {
        let bytes = self.bytes;
        let mut begin = 0;
        let mut end = bytes.len();

        if bytes.starts_with(UTF8_BOM) {
            log::log!(self.level, "UTF-8 byte order mark found and skipped");
            begin = UTF8_BOM.len();
        } else if bytes.starts_with(GB18030_BOM) {
            log::log!(self.level, "GB-18030 byte order mark found and skipped");
            begin = GB18030_BOM.len();
        } else if bytes.starts_with(b"\xfe\xff") || bytes.starts_with(b"\xff\xfe") {
            return Err(Error::new(ErrorKind::EncodingUnsupported {
                bom: [bytes[0], bytes[1]],
            }));
        }

        if end > begin && bytes[end - 1] == SUBSTITUTE {
            log::log!(self.level, "trailing 0x1A byte trimmed");
            end -= 1;
        }

        while begin < end && is_space(bytes[begin]) {
            begin += 1;
        }

        Ok((begin, end))
    }

    fn detect_eol(&self, begin: usize, end: usize) -> error::Result<Eol> {
        let bytes = &self.bytes[..end];
        let quote = self.options.quote;
        let mut pos = begin;

        while let Some(offset) = memchr3(quote, b'\n', b'\r', &bytes[pos..]) {
            pos += offset;

            // Line endings inside quotes do not count
            if bytes[pos] == quote {
                match memchr(quote, &bytes[pos + 1..]) {
                    Some(closing) => {
                        pos += closing + 2;
                        continue;
                    }
                    None => break,
                }
            }

            let eol = match (bytes[pos], bytes.get(pos + 1).copied()) {
                (b'\r', Some(b'\n')) => Eol::CrLf,
                (b'\r', Some(b'\r')) if bytes.get(pos + 2) == Some(&b'\n') => {
                    return Err(Error::new(ErrorKind::MalformedLineEnding { pos }))
                }
                (b'\r', _) => Eol::Cr,
                (_, Some(b'\r')) => Eol::LfCr,
                _ => Eol::Lf,
            };

            log::log!(self.level, "detected eol as {}", eol);

            return Ok(eol);
        }

        log::log!(
            self.level,
            "data ends before any \\r or \\n, it will be read as a single record"
        );

        Ok(Eol::Lf)
    }

    fn tokenizer(&self, begin: usize, end: usize, syntax: Syntax) -> Tokenizer<'b> {
        Tokenizer::new(self.bytes, begin, end, syntax, self.options.settings)
    }

    /// Parse up to [`JUMP_LINES`] records and group them in runs of records
    /// having the same number of fields. Any parse error discards the
    /// candidate.
    fn runs(&self, tokenizer: &Tokenizer, begin: usize) -> Option<Vec<Run>> {
        let mut runs: Vec<Run> = Vec::new();
        let mut pos = begin;
        let mut lines = 0;

        while !tokenizer.is_end(pos) && lines < JUMP_LINES {
            let (fields, next) = tokenizer.skip_record(pos).ok()?;

            match runs.last_mut() {
                Some(run) if run.fields == fields => run.lines += 1,
                _ => runs.push(Run { fields, lines: 1 }),
            }

            lines += 1;
            pos = next;
        }

        Some(runs)
    }

    fn detect(&self) -> error::Result<Detected> {
        let (mut begin, end) = self.strip_edges()?;

        let eol = match self.options.eol {
            Some(eol) => eol,
            None => self.detect_eol(begin, end)?,
        };

        let separators: &[u8] = match &self.options.separator {
            Some(separator) => std::slice::from_ref(separator),
            None => &CANDIDATE_SEPARATORS,
        };

        let quote_rules: &[QuoteRule] = match &self.options.quote_rule {
            Some(quote_rule) => std::slice::from_ref(quote_rule),
            None => &QuoteRule::ALL,
        };

        let mut top_lines: usize = 0;
        let mut top_fields: usize = 1;
        let mut top_max_fields: usize = 1;
        let mut winner: Option<Syntax> = None;

        for &separator in separators {
            for &quote_rule in quote_rules {
                let syntax = Syntax {
                    separator,
                    quote: self.options.quote,
                    quote_rule,
                    eol,
                };

                let tokenizer = self.tokenizer(begin, end, syntax);

                let runs = match self.runs(&tokenizer, begin) {
                    Some(runs) if !runs.is_empty() => runs,
                    _ => continue,
                };

                let mut updated = false;
                let mut max_fields = 0;

                for run in runs.iter() {
                    max_fields = max_fields.max(run.fields);

                    if run.fields > 1
                        && (run.lines > top_lines
                            || (run.lines == top_lines
                                && run.fields > top_fields
                                && separator != b' '))
                    {
                        top_lines = run.lines;
                        top_fields = run.fields;
                        winner = Some(syntax);
                        updated = true;
                    }
                }

                if updated {
                    top_max_fields = max_fields;

                    log::log!(
                        self.level,
                        "candidate separator={:?} quote_rule={}: {} lines of {} fields",
                        debug::Bytes(&[separator]),
                        quote_rule,
                        top_lines,
                        top_fields
                    );
                }
            }
        }

        let syntax = winner.ok_or_else(|| Error::new(ErrorKind::DetectionFailed))?;
        let tokenizer = self.tokenizer(begin, end, syntax);

        let field_count = if self.options.settings.fill {
            top_max_fields
        } else {
            // Irregular lines may precede the first regular record
            let mut pos = begin;
            let mut lines = 0;

            while !tokenizer.is_end(pos) && lines < JUMP_LINES {
                let (fields, next) = tokenizer.skip_record(pos)?;

                if fields == top_fields {
                    if pos != begin {
                        log::log!(self.level, "skipped irregular lines up to byte {}", pos);
                    }

                    begin = pos;
                    break;
                }

                lines += 1;
                pos = next;
            }

            top_fields
        };

        let tokenizer = self.tokenizer(begin, end, syntax);
        let (fields, _) = tokenizer.skip_record(begin)?;

        if !self.options.settings.fill && fields != field_count {
            return Err(Error::format(FormatErrorKind::InconsistentDetection, begin));
        }

        let dialect = Dialect {
            separator: syntax.separator,
            quote: syntax.quote,
            quote_rule: syntax.quote_rule,
            eol: syntax.eol,
            field_count,
        };

        log::log!(self.level, "detected {}", dialect);

        Ok(Detected {
            begin,
            end,
            dialect,
        })
    }
}

/// Strip the edges of the data, then detect its line ending, separator, quote
/// rule and number of fields. Options set by the caller are not detected.
pub(crate) fn detect(bytes: &[u8], options: &DetectOptions) -> error::Result<Detected> {
    let detector = Detector {
        bytes,
        options,
        level: if options.verbose {
            Level::Info
        } else {
            Level::Debug
        },
    };

    detector.detect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> DetectOptions {
        DetectOptions {
            separator: None,
            quote_rule: None,
            eol: None,
            quote: b'"',
            settings: Settings::default(),
            verbose: false,
        }
    }

    fn dialect(data: &[u8]) -> error::Result<Dialect> {
        detect(data, &options()).map(|detected| detected.dialect)
    }

    #[test]
    fn test_detect_eol() -> error::Result<()> {
        assert_eq!(dialect(b"a,b\r\nc,d\r\n")?.eol(), Eol::CrLf);
        assert_eq!(dialect(b"a,b\nc,d\n")?.eol(), Eol::Lf);
        assert_eq!(dialect(b"a,b\rc,d\r")?.eol(), Eol::Cr);
        assert_eq!(dialect(b"a,b\n\rc,d\n\r")?.eol(), Eol::LfCr);
        assert_eq!(dialect(b"a,b,c")?.eol(), Eol::Lf);

        // Line endings inside quotes are skipped
        assert_eq!(dialect(b"\"x\ny\",b\r\nc,d\r\n")?.eol(), Eol::CrLf);

        let err = dialect(b"a,b\r\r\nc,d\r\r\n").unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::MalformedLineEnding { pos: 3 }));

        // A blank line between classic mac line endings
        assert_eq!(dialect(b"a,b\r\r1,2\r3,4\r")?.eol(), Eol::Cr);

        Ok(())
    }

    #[test]
    fn test_edges() -> error::Result<()> {
        let detected = detect(b"\xef\xbb\xbfa,b\nc,d\n", &options())?;
        assert_eq!(detected.begin, 3);

        let detected = detect(b"\x84\x31\x95\x33a,b\nc,d\n", &options())?;
        assert_eq!(detected.begin, 4);

        let detected = detect(b"\n\n  a,b\nc,d\n\x1a", &options())?;
        assert_eq!(detected.begin, 4);
        assert_eq!(detected.end, 12);

        for data in [&b"\xff\xfea\x00,\x00"[..], &b"\xfe\xff\x00a\x00,"[..]] {
            let err = dialect(data).unwrap_err();
            assert!(matches!(err.kind(), ErrorKind::EncodingUnsupported { .. }));
        }

        Ok(())
    }

    #[test]
    fn test_separator() -> error::Result<()> {
        let dialect_of = |data: &[u8]| dialect(data);

        let comma = dialect_of(b"name,surname,age\njohn,landy,45\nlucy,rose,67\n")?;
        assert_eq!(comma.separator(), b',');
        assert_eq!(comma.field_count(), 3);
        assert_eq!(comma.quote_rule(), QuoteRule::Doubled);

        let pipe = dialect_of(b"name|surname\njohn|landy\nlucy|rose\n")?;
        assert_eq!(pipe.separator(), b'|');
        assert_eq!(pipe.field_count(), 2);

        let semicolon = dialect_of(b"a;b;c;d\n1;2;3;4\n")?;
        assert_eq!(semicolon.separator(), b';');
        assert_eq!(semicolon.field_count(), 4);

        let tab = dialect_of(b"a\tb\n1\t2\n")?;
        assert_eq!(tab.separator(), b'\t');

        let space = dialect_of(b"001 307 0930\n002 307 0940\n003 310 1020\n")?;
        assert_eq!(space.separator(), b' ');
        assert_eq!(space.field_count(), 3);

        // More lines beat more fields
        let ambiguous = dialect_of(b"a,b|c\nd,e|f\ng,h\n")?;
        assert_eq!(ambiguous.separator(), b',');

        // On a tie, more fields win, unless separated by spaces
        let tie = dialect_of(b"a,b;c;d\ne,f;g;h\n")?;
        assert_eq!(tie.separator(), b';');
        assert_eq!(tie.field_count(), 3);

        let tie = dialect_of(b"a b c,d\ne f g,h\n")?;
        assert_eq!(tie.separator(), b',');
        assert_eq!(tie.field_count(), 2);

        Ok(())
    }

    #[test]
    fn test_detection_window() -> error::Result<()> {
        // Only the first 100 records are looked at
        let mut data = "a|b\n".repeat(60);
        data.push_str(&"1,2,3\n".repeat(200));

        let pipe = dialect(data.as_bytes())?;
        assert_eq!(pipe.separator(), b'|');
        assert_eq!(pipe.field_count(), 2);

        Ok(())
    }

    #[test]
    fn test_quote_rule() -> error::Result<()> {
        let escaped = dialect(b"\"a \\\"b\\\" c\",d\n\"e\",f\n")?;
        assert_eq!(escaped.quote_rule(), QuoteRule::Escaped);

        let verbatim = dialect(b"\"a \"b\" c\",d\n\"e\",f\n")?;
        assert_eq!(verbatim.quote_rule(), QuoteRule::Verbatim);
        assert_eq!(verbatim.field_count(), 2);

        Ok(())
    }

    #[test]
    fn test_field_count() -> error::Result<()> {
        let data = b"title\nmore title\na,b,c\n1,2,3\n4,5,6\n7,8\n";

        let detected = detect(data, &options())?;
        assert_eq!(detected.dialect.field_count(), 3);
        assert_eq!(detected.begin, 0);

        let mut strict = options();
        strict.settings.fill = false;

        let detected = detect(data, &strict)?;
        assert_eq!(detected.dialect.field_count(), 3);
        assert_eq!(detected.begin, 17);

        Ok(())
    }

    #[test]
    fn test_overrides() -> error::Result<()> {
        let mut opts = options();
        opts.separator = Some(b';');
        opts.quote_rule = Some(QuoteRule::None);

        let dialect = detect(b"\"a\";b\n\"c\";d\n", &opts)?.dialect;
        assert_eq!(dialect.separator(), b';');
        assert_eq!(dialect.quote_rule(), QuoteRule::None);

        let err = detect(b"single\ncolumn\n", &options()).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::DetectionFailed));

        Ok(())
    }

    #[test]
    fn test_from_str() {
        assert_eq!("Doubled".parse::<QuoteRule>().ok(), Some(QuoteRule::Doubled));
        assert_eq!("crlf".parse::<Eol>().ok(), Some(Eol::CrLf));
        assert!("auto".parse::<QuoteRule>().is_err());
        assert_eq!(Eol::LfCr.trigger(), b'\n');
        assert_eq!(Eol::LfCr.last(), b'\r');
    }
}
