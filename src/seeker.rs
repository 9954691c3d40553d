use crate::core::Tokenizer;
use crate::error::{self, Error, ErrorKind};
use crate::reader::Reader;

/// Number of candidate positions tried before giving up.
pub(crate) const RESYNC_ATTEMPTS: usize = 30;

/// Number of records that must parse from a candidate for it to be trusted.
const RESYNC_RECORDS: usize = 5;

// Parse up to RESYNC_RECORDS records from `start`, returning the start of the
// first record that failed. The first record must have exactly `field_count`
// fields, the next ones may be shorter when filling.
fn check_records(
    tokenizer: &Tokenizer,
    start: usize,
    field_count: usize,
    fill: bool,
) -> Result<(), usize> {
    let mut pos = start;

    for i in 0..RESYNC_RECORDS {
        if tokenizer.is_end(pos) {
            return Ok(());
        }

        let failure = match tokenizer.skip_record(pos) {
            Ok((count, next)) => {
                let record_start = pos;
                pos = next;

                if count == field_count || (fill && i > 0 && count < field_count) {
                    continue;
                }

                record_start
            }
            Err(_) => pos,
        };

        return Err(failure);
    }

    Ok(())
}

/// Find the first reliable record start from `from`.
///
/// Returns the last candidate as an error when no candidate could be trusted
/// within [`RESYNC_ATTEMPTS`] attempts.
pub(crate) fn find_record_start(
    tokenizer: &Tokenizer,
    from: usize,
    field_count: usize,
    fill: bool,
) -> Result<usize, usize> {
    let mut candidate = if tokenizer.is_record_begin(from) {
        from
    } else {
        tokenizer.next_line(from)
    };

    let mut last = candidate;

    for _ in 0..RESYNC_ATTEMPTS {
        candidate = tokenizer.skip_blank_lines_if_enabled(candidate);

        if tokenizer.is_end(candidate) {
            return Ok(tokenizer.end());
        }

        last = candidate;

        match check_records(tokenizer, candidate, field_count, fill) {
            Ok(()) => return Ok(candidate),
            Err(failure) => {
                candidate = tokenizer.next_line(failure);
            }
        }
    }

    Err(last)
}

impl<B: AsRef<[u8]>> Reader<B> {
    /// Move the cursor to given byte offset, which must lie within the
    /// window. The cursor is not required to land on a record start: use
    /// [`Reader::resync`] afterwards to find one.
    pub fn seek(&mut self, pos: usize) -> error::Result<()> {
        if pos < self.begin_offset() || pos > self.end_offset() {
            return Err(Error::new(ErrorKind::OutOfBounds {
                pos,
                start: self.begin_offset(),
                end: self.end_offset(),
            }));
        }

        self.set_position(pos);

        Ok(())
    }

    /// Move the cursor, from wherever it is, to the start of the next record
    /// that can be trusted, i.e. the next line start from which a handful of
    /// records parse with the expected number of fields.
    ///
    /// When no such position is found, the cursor is left at the last
    /// candidate and [`ErrorKind::ResyncUnresolved`] is returned.
    pub fn resync(&mut self) -> error::Result<()> {
        let result = find_record_start(
            &self.tokenizer(),
            self.position(),
            self.field_count(),
            self.fill(),
        );

        match result {
            Ok(pos) => {
                self.set_position(pos);
                Ok(())
            }
            Err(pos) => {
                log::debug!("could not resync, giving up at byte {}", pos);

                self.set_position(pos);

                Err(Error::new(ErrorKind::ResyncUnresolved {
                    pos,
                    attempts: RESYNC_ATTEMPTS,
                }))
            }
        }
    }
}
