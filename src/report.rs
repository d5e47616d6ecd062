use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::models::GenerationResult;

/// Literal block separator. The output is human-readable text, not a
/// machine-parseable format.
pub const SEPARATOR: &str = "\n\n---\n\n";

/// Written in place of the generated text when the provider yielded nothing.
pub const FAILURE_NOTE: &str = "No blog post could be generated for this item.";

/// Appends one block per processed item to a single output file. The file is
/// truncated at creation, so each run overwrites the previous one.
pub struct ReportWriter {
    out: BufWriter<File>,
    path: PathBuf,
    blocks: usize,
}

impl ReportWriter {
    pub fn create(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path)?;
        Ok(Self {
            out: BufWriter::new(file),
            path,
            blocks: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn blocks(&self) -> usize {
        self.blocks
    }

    /// Header line, then the generated text or the fixed failure sentence,
    /// then the separator.
    pub fn write_result(&mut self, result: &GenerationResult) -> io::Result<()> {
        writeln!(self.out, "Blog post for {}:", result.subject)?;
        match &result.text {
            Some(text) => self.out.write_all(text.as_bytes())?,
            None => self.out.write_all(FAILURE_NOTE.as_bytes())?,
        }
        self.out.write_all(SEPARATOR.as_bytes())?;
        self.blocks += 1;
        Ok(())
    }

    /// Checked flush. The buffered writer also flushes on drop, so an early
    /// return higher up never strands a completed block.
    pub fn finish(mut self) -> io::Result<()> {
        self.out.flush()
    }
}

/// Lowercase, hyphen-separated transformation of a human-readable string,
/// safe for filenames.
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_hyphen = false;
    for ch in input.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_hyphen = true;
        }
    }
    slug
}
