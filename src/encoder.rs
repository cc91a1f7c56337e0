//! Bundle encoder

use crate::archive::{
    is_safe_relative_path, Archive, Separator, CHECKSUM_PREFIX, DESCRIPTION_PREFIX, FILENAME_PREFIX,
    SHA256_ALGORITHM,
};
use crate::checksum::sha256_hex;
use crate::error::{Error, FormatError, Result};
use std::io::Write;
use std::path::Path;
use tracing::{debug, info};

/// Encodes entries into the bundle format
#[derive(Debug, Clone, Default)]
pub struct Encoder {
    separator: Separator,
    description: String,
}

impl Encoder {
    /// Create an encoder with a custom separator.
    ///
    /// Fails with a configuration error if the separator is empty or spans
    /// more than one line.
    pub fn new(separator: impl Into<String>) -> Result<Self> {
        Ok(Self {
            separator: Separator::new(separator)?,
            description: String::new(),
        })
    }

    /// Set the header description used by [`Self::encode_entries`] and as a
    /// fallback for archives without one
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn separator(&self) -> &Separator {
        &self.separator
    }

    /// Encode an archive to a string
    pub fn encode(&self, archive: &Archive) -> Result<String> {
        let mut output = Vec::new();
        self.encode_to_writer(archive, &mut output)?;
        // Every piece written is validated UTF-8
        String::from_utf8(output).map_err(|e| Error::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))
    }

    /// Encode an archive directly to a writer
    pub fn encode_to_writer<W: Write>(&self, archive: &Archive, writer: W) -> Result<usize> {
        let description = if archive.description.is_empty() {
            &self.description
        } else {
            &archive.description
        };
        self.write_bundle(
            description,
            archive.entries.iter().map(|e| Ok((e.name.as_str(), e.data.as_slice()))),
            writer,
        )
    }

    /// Encode an archive to a file. The file only appears once the whole
    /// bundle has been written.
    pub fn encode_to_file(&self, archive: &Archive, path: &Path) -> Result<usize> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        let count = self.encode_to_writer(archive, tmp.as_file_mut())?;
        tmp.persist(path).map_err(|e| e.error)?;
        Ok(count)
    }

    /// Stream `(name, content)` pairs into a bundle, using this encoder's
    /// description. Returns the number of entries written.
    pub fn encode_entries<I, N, C, W>(&self, entries: I, writer: W) -> Result<usize>
    where
        I: IntoIterator<Item = (N, C)>,
        N: AsRef<str>,
        C: AsRef<[u8]>,
        W: Write,
    {
        self.write_bundle(&self.description, entries.into_iter().map(Ok), writer)
    }

    /// Read each `(path on disk, entry name)` pair and stream it into a
    /// bundle. Files are read one at a time, as they are written.
    pub fn encode_paths<P, N, W>(&self, files: &[(P, N)], writer: W) -> Result<usize>
    where
        P: AsRef<Path>,
        N: AsRef<str>,
        W: Write,
    {
        let entries = files.iter().map(|(path, name)| -> Result<(String, Vec<u8>)> {
            let data = std::fs::read(path.as_ref())?;
            Ok((name.as_ref().to_string(), data))
        });
        self.write_bundle(&self.description, entries, writer)
    }

    fn write_bundle<I, N, C, W>(&self, description: &str, entries: I, writer: W) -> Result<usize>
    where
        I: Iterator<Item = Result<(N, C)>>,
        N: AsRef<str>,
        C: AsRef<[u8]>,
        W: Write,
    {
        let mut writer = std::io::BufWriter::new(writer);
        let sep = self.separator.as_str();

        if description.lines().any(|line| self.separator.matches(line)) {
            return Err(Error::config("description contains the separator line"));
        }

        writeln!(writer, "{}", sep)?;
        if !description.is_empty() {
            let text = description.lines().collect::<Vec<_>>().join("\n");
            writeln!(writer, "{}{}", DESCRIPTION_PREFIX, text)?;
            writeln!(writer, "{}", sep)?;
        }

        let mut count = 0;
        for entry in entries {
            let (name, content) = entry?;
            self.write_entry(&mut writer, name.as_ref(), content.as_ref())?;
            count += 1;
        }

        // Closing separator
        writeln!(writer, "{}", sep)?;
        writer.flush()?;

        info!(entries = count, separator = sep, "bundle written");
        Ok(count)
    }

    /// Write one entry block: filename, checksum, content, separator
    fn write_entry<W: Write>(&self, writer: &mut W, name: &str, data: &[u8]) -> Result<()> {
        // The decoder trims names, so padding would not survive a round trip
        if !is_safe_relative_path(name) || name.trim() != name {
            return Err(Error::format(
                0,
                FormatError::UnsafeFilename {
                    name: name.to_string(),
                },
            ));
        }

        let content = normalize_content(name, data, &self.separator)?;
        let checksum = sha256_hex(content.as_bytes());

        writeln!(writer, "{}{}", FILENAME_PREFIX, name)?;
        writeln!(writer, "{}{}:{}", CHECKSUM_PREFIX, SHA256_ALGORITHM, checksum)?;
        writer.write_all(content.as_bytes())?;
        writeln!(writer, "{}", self.separator)?;

        debug!(name, bytes = content.len(), %checksum, "encoded entry");
        Ok(())
    }
}

/// Validate file content and rewrite it as newline-terminated lines.
///
/// A final line without a newline gets one, and `\r\n` endings become
/// `\n`. Fails if the content isn't UTF-8 or has a line equal to the
/// separator.
pub fn normalize_content(name: &str, data: &[u8], separator: &Separator) -> Result<String> {
    let text = std::str::from_utf8(data).map_err(|_| {
        Error::format(
            0,
            FormatError::InvalidUtf8 {
                name: name.to_string(),
            },
        )
    })?;

    let mut content = String::with_capacity(text.len() + 1);
    for (idx, line) in text.lines().enumerate() {
        if separator.matches(line) {
            return Err(Error::format(
                idx + 1,
                FormatError::SeparatorInContent {
                    name: name.to_string(),
                },
            ));
        }
        content.push_str(line);
        content.push('\n');
    }
    Ok(content)
}
