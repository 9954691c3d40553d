use std::io::{self, BufWriter, IntoInnerError, Write};

use crate::dialect::Eol;
use crate::records::{ByteRecord, Record};

/// A writer of CSV records.
///
/// Fields are written as is: they are never quoted nor escaped, so they must
/// not contain the separator or the line ending.
pub struct Writer<W: Write> {
    separator: u8,
    eol: Eol,
    buffer: BufWriter<W>,
}

impl<W: Write> Writer<W> {
    pub fn new(writer: W, separator: u8, eol: Eol) -> Self {
        Self {
            buffer: BufWriter::new(writer),
            separator,
            eol,
        }
    }

    pub fn with_capacity(writer: W, capacity: usize, separator: u8, eol: Eol) -> Self {
        Self {
            buffer: BufWriter::with_capacity(capacity, writer),
            separator,
            eol,
        }
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.buffer.flush()
    }

    /// Write the given fields, separated, then terminated by the line ending.
    pub fn write_record<I, T>(&mut self, record: I) -> io::Result<()>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        for (i, cell) in record.into_iter().enumerate() {
            if i != 0 {
                self.buffer.write_all(&[self.separator])?;
            }

            self.buffer.write_all(cell.as_ref())?;
        }

        self.buffer.write_all(self.eol.as_bytes())?;

        Ok(())
    }

    #[inline]
    pub fn write_byte_record(&mut self, record: &ByteRecord) -> io::Result<()> {
        self.write_record(record.iter())
    }

    /// Write the raw fields of a record read by a [`Reader`](crate::Reader).
    #[inline]
    pub fn write_raw_record(&mut self, record: &Record) -> io::Result<()> {
        self.write_record(record.iter())
    }

    pub fn into_inner(self) -> Result<W, IntoInnerError<BufWriter<W>>> {
        self.buffer.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::error;
    use crate::reader::ReaderBuilder;

    #[test]
    fn test_write_record() -> io::Result<()> {
        let output = Cursor::new(Vec::<u8>::new());
        let mut writer = Writer::with_capacity(output, 32, b';', Eol::CrLf);

        writer.write_byte_record(&brec!["name", "surname", "age"])?;
        writer.write_record(["john", "", "45"])?;
        writer.write_record(vec![b"lucy".to_vec(), b"rose".to_vec(), b"67".to_vec()])?;

        assert_eq!(
            std::str::from_utf8(writer.into_inner()?.get_ref()).unwrap(),
            "name;surname;age\r\njohn;;45\r\nlucy;rose;67\r\n",
        );

        Ok(())
    }

    #[test]
    fn test_round_trip() -> error::Result<()> {
        let records: Vec<ByteRecord> = (0..50)
            .map(|i| brec![format!("row{}", i), "some text", format!("{}", i * 7)])
            .collect();

        let mut writer = Writer::new(Vec::new(), b'|', Eol::Lf);

        for record in records.iter() {
            writer.write_byte_record(record)?;
        }

        let data = writer.into_inner().map_err(|err| err.into_error())?;

        let mut reader = ReaderBuilder::new().separator(b'|').from_bytes(&data)?;
        let mut read = Vec::new();

        while let Some(record) = reader.read_record()? {
            read.push(record.to_byte_record());
        }

        assert_eq!(read, records);

        // Passing raw records through does not alter them
        reader.rewind();

        let mut writer = Writer::new(Vec::new(), b'|', Eol::Lf);

        while let Some(record) = reader.read_record()? {
            writer.write_raw_record(&record)?;
        }

        assert_eq!(writer.into_inner().map_err(|err| err.into_error())?, data);

        Ok(())
    }
}
