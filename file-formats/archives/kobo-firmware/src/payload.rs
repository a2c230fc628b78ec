//! Output payload writer
//!
//! The patched payload is built entirely in memory as a gzip-compressed tar
//! stream. Nothing reaches the disk until [`PayloadWriter::finish`] has
//! closed both layers.

use std::io::{self, Read};

use flate2::Compression;
use flate2::write::GzEncoder;
use tar::{Builder, Header};

use crate::entry::PaxRecords;
use crate::{Error, Result};

/// Writer for a new `.tgz` payload
pub struct PayloadWriter {
    builder: Builder<GzEncoder<Vec<u8>>>,
}

impl std::fmt::Debug for PayloadWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PayloadWriter").finish_non_exhaustive()
    }
}

impl Default for PayloadWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl PayloadWriter {
    /// Create an empty payload
    pub fn new() -> Self {
        let encoder = GzEncoder::new(Vec::new(), Compression::default());
        Self {
            builder: Builder::new(encoder),
        }
    }

    /// Append an entry
    ///
    /// `header` must already carry the size of `data`. `name` is the full
    /// entry name; it is only written separately when it does not fit the
    /// header and no PAX `path` record carries it.
    pub fn append(
        &mut self,
        name: &str,
        header: &Header,
        pax: &PaxRecords,
        data: &[u8],
    ) -> Result<()> {
        let write_err = |source| Error::WriteEntry {
            entry: name.to_string(),
            source,
        };

        if !pax.is_empty() {
            log::trace!("{name}: writing {} PAX record(s)", pax.iter().count());
            self.builder
                .append_pax_extensions(pax.iter())
                .map_err(write_err)?;
        }

        let mut reader = CountingReader::new(data);
        if pax.has_path() || header.path_bytes().as_ref() == name.as_bytes() {
            self.builder.append(header, &mut reader).map_err(write_err)?;
        } else {
            // Long names need a GNU long name record in front of the header
            let mut header = header.clone();
            self.builder
                .append_data(&mut header, name, &mut reader)
                .map_err(write_err)?;
        }

        let expected = data.len() as u64;
        if reader.count != expected {
            return Err(Error::ShortWrite {
                entry: name.to_string(),
                written: reader.count,
                expected,
            });
        }
        Ok(())
    }

    /// Close the tar stream, then the gzip stream, and return the payload
    pub fn finish(self) -> Result<Vec<u8>> {
        log::debug!("flushing output tar writer to buffer");
        let encoder = self
            .builder
            .into_inner()
            .map_err(|source| Error::Finalize { source })?;

        log::debug!("flushing output gzip writer to buffer");
        encoder.finish().map_err(|source| Error::Finalize { source })
    }
}

/// Reader that counts the bytes handed to the tar builder
struct CountingReader<R> {
    inner: R,
    count: u64,
}

impl<R> CountingReader<R> {
    fn new(inner: R) -> Self {
        Self { inner, count: 0 }
    }
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.count += n as u64;
        Ok(n)
    }
}
