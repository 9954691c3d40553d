/*!
The `sniff-csv` crate reads delimited text data whose dialect is unknown.

Opening some data detects its separator, its quoting convention, its line
ending and its number of fields from the content alone, then exposes a cursor
reading fields and records straight from the underlying bytes (in memory, or
memory mapped), without copying them.

It also knows how to find a record start from any byte offset, and how to
split some data into record-aligned chunks holding roughly the same number of
records, so that each of them can be read independently and in parallel.

# Examples

*Reading a file whose dialect is unknown*

```
use sniff_csv::Reader;

let mut reader = Reader::from_path("data.csv")?;

println!("{}", reader.dialect());

while let Some(record) = reader.read_record()? {
    for field in record.unescaped_iter() {
        dbg!(field);
    }
}
```

*Using a builder to configure your reader*

```
use sniff_csv::{QuoteRule, ReaderBuilder};

let mut reader = ReaderBuilder::new()
    .separator(b';')
    .quote_rule(QuoteRule::Escaped)
    .fill(false)
    .from_path("data.csv")?;
```

*Splitting a file in chunks to be read in parallel*

```
use sniff_csv::{Reader, ReaderBuilder};

let scout = Reader::from_path("data.csv")?;
let offsets = scout.chunks(4)?;

for window in offsets.windows(2) {
    let mut reader = ReaderBuilder::new()
        .separator(scout.separator())
        .quote_rule(scout.quote_rule())
        .begin_offset(window[0])
        .end_offset(window[1])
        .from_bytes(scout.get_ref())?;

    println!("{}", reader.count_records()?);
}
```

# Dialects

The following separators are tried, in this order: `,`, `|`, `;`, `\t` and
` `. Each of them is tried with every [`QuoteRule`], by parsing the first
records of the data. The pair yielding the longest run of records having the
same number of fields (more than one) wins. On a tie, the pair yielding more
fields wins, unless its separator is a space.

Line endings can be `\n`, `\r\n`, `\r` or `\n\r`. A UTF-8 or GB-18030 byte
order mark is skipped. UTF-16 data is rejected and must be recoded first.

# Caveats

## Fields are raw views

Fields returned by [`Record::get`] or [`Record::iter`] exclude their outer
quotes, but are not unescaped: doubled quotes and backslashes are still
there. Use [`Field::unescape`], [`Record::unescape`] or
[`Record::unescaped_iter`] to get their actual content.

## Verbatim quotes

With [`QuoteRule::Verbatim`], a quote only closes a field when directly
followed by a separator, a line ending or the end of the data. When the
first separator met inside such a field comes before any closing quote, the
rest of the line decides: a closing quote found later on the line closes
the field, else the field ends on that separator and its opening quote is
kept as content.

## Trailing separators

A separator directly followed by a line ending opens a last, empty, field:
`a,b,` has three fields. Tools counting this line as two fields will
disagree with this crate on such data. With the space separator however,
trailing spaces are only padding.

## Whitespace

When `strip_white` is enabled, which is the default, spaces and tabs around
unquoted fields and after closing quotes are stripped. A space is never
stripped when it is the separator, and the same goes for a tab. With the
space separator, consecutive spaces count as one separator, and lines made
of spaces only are blank.
*/
#[allow(unused_macros)]
macro_rules! brec {
    () => {{
        $crate::records::ByteRecord::new()
    }};

    ($($x: expr),*) => {{
        let mut r = $crate::records::ByteRecord::new();

        $(
            r.push_field($x.as_bytes());
        )*

        r
    }};
}

mod chunks;
mod core;
mod debug;
mod dialect;
mod error;
mod reader;
mod records;
mod seeker;
mod utils;
mod writer;

pub use chunks::ChunkPlanner;
pub use dialect::{Dialect, Eol, QuoteRule};
pub use error::{Error, ErrorKind, FormatErrorKind, Result};
pub use reader::{Reader, ReaderBuilder};
pub use records::{
    ByteRecord, ByteRecordIter, Field, Record, RecordFieldIter, RecordIter, RecordUnescapedIter,
};
pub use utils::{unescape_backslashes, unescape_doubled};
pub use writer::Writer;
