//! Efficient tab-delimited output.
//!
//! Uses itoa for integer formatting and ryu for float formatting
//! to avoid allocation in the hot path.

use crate::error::{Result, RodError};
use crate::feature::{Feature, Payload};
use crate::location::GenomeLocation;
use std::io::{BufWriter, Write};

/// Buffered record writer.
pub struct RecordWriter<W: Write> {
    writer: BufWriter<W>,
    itoa_buf: itoa::Buffer,
    ryu_buf: ryu::Buffer,
}

impl<W: Write> RecordWriter<W> {
    /// Create a new RecordWriter with the default output buffer.
    pub fn new(output: W) -> Self {
        Self::with_capacity(crate::config::DEFAULT_OUTPUT_BUFFER, output)
    }

    /// Create a new RecordWriter with specified buffer size.
    pub fn with_capacity(capacity: usize, output: W) -> Self {
        Self {
            writer: BufWriter::with_capacity(capacity, output),
            itoa_buf: itoa::Buffer::new(),
            ryu_buf: ryu::Buffer::new(),
        }
    }

    /// Write a location as `chr:start-stop` (`chr:pos` for one base).
    #[inline]
    pub fn write_location(&mut self, loc: &GenomeLocation) -> Result<()> {
        self.writer.write_all(loc.contig().as_bytes())?;
        self.writer.write_all(b":")?;
        self.writer
            .write_all(self.itoa_buf.format(loc.start()).as_bytes())?;
        if loc.stop() != loc.start() {
            self.writer.write_all(b"-")?;
            self.writer
                .write_all(self.itoa_buf.format(loc.stop()).as_bytes())?;
        }
        Ok(())
    }

    /// Write a BED3 record (chrom, start, end) from a closed 1-based location.
    #[inline]
    pub fn write_bed3(&mut self, loc: &GenomeLocation) -> Result<()> {
        let (start0, end0) = loc.to_zero_based();
        self.writer.write_all(loc.contig().as_bytes())?;
        self.writer.write_all(b"\t")?;
        self.writer.write_all(self.itoa_buf.format(start0).as_bytes())?;
        self.writer.write_all(b"\t")?;
        self.writer.write_all(self.itoa_buf.format(end0).as_bytes())?;
        Ok(())
    }

    /// Write a feature as BED6 (`.` for missing name, score or strand).
    pub fn write_feature_bed(&mut self, feature: &Feature<Payload>) -> Result<()> {
        self.write_bed3(feature.location())?;
        match feature.payload() {
            Payload::Bed(bed) => {
                self.write_tab()?;
                self.write_opt_str(bed.name.as_deref())?;
                self.write_tab()?;
                match bed.score {
                    Some(score) => self.write_float(score)?,
                    None => self.write_bytes(b".")?,
                }
                self.write_tab()?;
                match bed.strand {
                    Some(strand) => write!(self.writer, "{}", strand)?,
                    None => self.write_bytes(b".")?,
                }
            }
            Payload::Interval => self.write_bytes(b"\t.\t.\t.")?,
        }
        Ok(())
    }

    #[inline]
    fn write_opt_str(&mut self, value: Option<&str>) -> Result<()> {
        self.write_bytes(value.unwrap_or(".").as_bytes())
    }

    /// Write raw bytes.
    #[inline]
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.writer.write_all(bytes)?;
        Ok(())
    }

    /// Write a tab character.
    #[inline]
    pub fn write_tab(&mut self) -> Result<()> {
        self.writer.write_all(b"\t")?;
        Ok(())
    }

    /// Write a newline character.
    #[inline]
    pub fn write_newline(&mut self) -> Result<()> {
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    /// Write an integer using itoa.
    #[inline]
    pub fn write_int<I: itoa::Integer>(&mut self, n: I) -> Result<()> {
        self.writer.write_all(self.itoa_buf.format(n).as_bytes())?;
        Ok(())
    }

    /// Write a float using ryu. Whole numbers print without a fraction.
    #[inline]
    pub fn write_float(&mut self, f: f64) -> Result<()> {
        if f.fract() == 0.0 && f.abs() < 1e15 {
            self.writer
                .write_all(self.itoa_buf.format(f as i64).as_bytes())?;
        } else {
            self.writer.write_all(self.ryu_buf.format(f).as_bytes())?;
        }
        Ok(())
    }

    /// Flush the output buffer.
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    /// Flush and return the underlying writer.
    pub fn into_inner(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|e| RodError::Io(e.into_error()))
    }
}
