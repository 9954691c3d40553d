use crate::core::Tokenizer;
use crate::error::{self, Error, ErrorKind};
use crate::reader::Reader;
use crate::seeker::{find_record_start, RESYNC_ATTEMPTS};

// Boundaries only land on sampled positions, about 1% of the window apart
// with this default: two chunks of uniform data may differ by up to 2%.
const MIN_SAMPLES: usize = 101;
const SAMPLES_PER_CHUNK: usize = 10;
const DEFAULT_RECORDS_PER_SAMPLE: usize = 10;

/// Estimates the boundaries of `n` chunks of CSV data holding roughly the same
/// number of records, without reading the whole data.
///
/// Records are sampled at evenly spaced positions to estimate their local
/// density. Boundaries are then placed on sampled record starts, where the
/// estimated cumulative number of records is the closest to the target
/// quantiles.
#[derive(Debug, Clone)]
pub struct ChunkPlanner {
    samples: Option<usize>,
    records_per_sample: usize,
}

impl Default for ChunkPlanner {
    fn default() -> Self {
        Self {
            samples: None,
            records_per_sample: DEFAULT_RECORDS_PER_SAMPLE,
        }
    }
}

impl ChunkPlanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of sampled positions. Defaults to `max(101, 10 * n)`.
    pub fn samples(&mut self, samples: usize) -> &mut Self {
        self.samples = Some(samples.max(1));
        self
    }

    /// Maximum number of records parsed at each sampled position.
    pub fn records_per_sample(&mut self, records: usize) -> &mut Self {
        self.records_per_sample = records.max(1);
        self
    }

    // Records per byte from `pos`.
    fn density(&self, tokenizer: &Tokenizer, start: usize) -> error::Result<f64> {
        let mut pos = start;
        let mut count: usize = 0;

        while count < self.records_per_sample && !tokenizer.is_end(pos) {
            let (_, next) = tokenizer.skip_record(pos)?;
            pos = next;
            count += 1;
        }

        Ok(count as f64 / (pos - start).max(1) as f64)
    }

    fn sample(
        &self,
        tokenizer: &Tokenizer,
        n: usize,
        field_count: usize,
        fill: bool,
    ) -> error::Result<(Vec<usize>, Vec<f64>)> {
        let begin = tokenizer.begin();
        let end = tokenizer.end();
        let width = (end - begin) as u128;
        let count = self
            .samples
            .unwrap_or_else(|| MIN_SAMPLES.max(SAMPLES_PER_CHUNK * n));

        let mut positions: Vec<usize> = Vec::with_capacity(count + 1);
        let mut densities: Vec<f64> = Vec::with_capacity(count + 1);

        for i in 0..count {
            let pos = if i == 0 {
                tokenizer.skip_blank_lines_if_enabled(begin)
            } else {
                let raw = begin + (width * i as u128 / count as u128) as usize;

                find_record_start(tokenizer, raw, field_count, fill).map_err(|pos| {
                    Error::new(ErrorKind::ResyncUnresolved {
                        pos,
                        attempts: RESYNC_ATTEMPTS,
                    })
                })?
            };

            if pos >= end {
                continue;
            }

            if let Some(&previous) = positions.last() {
                if pos <= previous {
                    continue;
                }
            }

            let density = match self.density(tokenizer, pos) {
                Ok(density) => density,
                Err(err) if i == 0 => return Err(err),
                Err(_) => continue,
            };

            positions.push(pos);
            densities.push(density);
        }

        Ok((positions, densities))
    }

    /// Returns `n + 1` increasing offsets delimiting `n` chunks of the reader's
    /// window, the first one being the window start and the last one its end.
    /// Every offset is a record start.
    ///
    /// When the window is too small to be sampled enough, fewer offsets might
    /// be returned: the sampled record starts, then the window end.
    ///
    /// The cursor of the reader is not moved.
    pub fn plan<B: AsRef<[u8]>>(&self, reader: &Reader<B>, n: usize) -> error::Result<Vec<usize>> {
        let n = n.max(1);
        let tokenizer = reader.tokenizer();
        let begin = reader.begin_offset();
        let end = reader.end_offset();

        if begin >= end {
            return Ok(vec![begin, end]);
        }

        let (mut positions, mut densities) =
            self.sample(&tokenizer, n, reader.field_count(), reader.fill())?;

        // NOTE: the end of the window has no records after it, so it borrows
        // the density of the last sample.
        let last_density = densities.last().copied().unwrap_or(0.0);
        positions.push(end);
        densities.push(last_density);

        if positions.len() < n + 1 {
            log::debug!(
                "only {} positions could be sampled for {} chunks",
                positions.len(),
                n
            );

            return Ok(positions);
        }

        // Estimated number of records before each sample (trapezoidal rule)
        let mut cumulative: Vec<f64> = Vec::with_capacity(positions.len());
        cumulative.push(0.0);

        for k in 1..positions.len() {
            let area = (densities[k - 1] + densities[k]) / 2.0
                * (positions[k] - positions[k - 1]) as f64;

            cumulative.push(cumulative[k - 1] + area);
        }

        let last = positions.len() - 1;
        let total = cumulative[last];

        log::debug!(
            "estimated {:.0} records from {} samples",
            total,
            positions.len()
        );

        let mut boundaries = Vec::with_capacity(n + 1);
        boundaries.push(positions[0]);

        let mut lower = 1;

        for k in 1..n {
            let target = total * k as f64 / n as f64;
            let upper = last - (n - k);

            let mut index = lower;
            let mut best = (cumulative[index] - target).abs();

            while index < upper {
                let distance = (cumulative[index + 1] - target).abs();

                if distance > best {
                    break;
                }

                best = distance;
                index += 1;
            }

            boundaries.push(positions[index]);
            lower = index + 1;
        }

        boundaries.push(end);

        Ok(boundaries)
    }
}

impl<B: AsRef<[u8]>> Reader<B> {
    /// Returns `n + 1` offsets delimiting `n` record-aligned chunks holding
    /// roughly the same number of records, using a default [`ChunkPlanner`].
    ///
    /// Each chunk can then be read independently by a reader opened with
    /// the matching [`begin_offset`](crate::ReaderBuilder::begin_offset) and
    /// [`end_offset`](crate::ReaderBuilder::end_offset).
    pub fn chunks(&self, n: usize) -> error::Result<Vec<usize>> {
        ChunkPlanner::new().plan(self, n)
    }
}
