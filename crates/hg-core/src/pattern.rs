//! Segment filename patterns.
//!
//! A pattern is a file name template with exactly one numeric placeholder in
//! the engine's own syntax: `%d` or `%0Nd` (`%Nd` is accepted and padded the
//! same way), with `%%` standing for a literal percent sign. The same parsed
//! form is used both to build the engine invocation and to recognise the
//! engine's "opening segment" status lines, so detection never relies on a
//! loose digit search.

use std::fmt;
use std::path::Path;

use crate::{Error, Result};

/// Minimum placeholder width used when deriving a pattern from a file name.
pub const DERIVED_WIDTH: usize = 3;

/// A validated segment filename pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentPattern {
    raw: String,
    prefix: String,
    suffix: String,
    width: usize,
}

impl SegmentPattern {
    /// Parse and validate an explicit pattern such as `stream_%03d.mp4`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the pattern contains directory
    /// separators, an unsupported `%` directive, or not exactly one numeric
    /// placeholder.
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.is_empty() {
            return Err(Error::config("segment format is empty"));
        }
        if raw.chars().any(std::path::is_separator) {
            return Err(Error::config(format!(
                "segment format '{raw}' must be a file name, not a path"
            )));
        }

        let mut prefix = String::new();
        let mut suffix = String::new();
        let mut width: Option<usize> = None;
        let mut chars = raw.chars().peekable();

        while let Some(c) = chars.next() {
            let out = if width.is_some() { &mut suffix } else { &mut prefix };
            if c != '%' {
                out.push(c);
                continue;
            }
            if chars.peek() == Some(&'%') {
                chars.next();
                out.push('%');
                continue;
            }

            let mut digits = String::new();
            while let Some(d) = chars.peek().copied().filter(char::is_ascii_digit) {
                digits.push(d);
                chars.next();
            }
            if chars.next() != Some('d') {
                return Err(Error::config(format!(
                    "segment format '{raw}' has an unsupported '%' directive; use %d or %0Nd"
                )));
            }
            if width.is_some() {
                return Err(Error::config(format!(
                    "segment format '{raw}' must contain exactly one numeric placeholder"
                )));
            }
            width = Some(digits.parse().unwrap_or(0));
        }

        let width = width.ok_or_else(|| {
            Error::config(format!(
                "segment format '{raw}' must contain a numeric placeholder such as %03d"
            ))
        })?;

        Ok(Self {
            raw: raw.to_string(),
            prefix,
            suffix,
            width,
        })
    }

    /// Derive a numbered pattern from an output file name by inserting
    /// `_%03d` before the extension (`game.mp4` -> `game_%03d.mp4`).
    ///
    /// A file name without an extension gets `.mp4`.
    pub fn derive(file_name: &str) -> Self {
        let path = Path::new(file_name);
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| file_name.to_string());
        let ext = path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_else(|| ".mp4".to_string());

        let prefix = format!("{stem}_");
        let raw = format!(
            "{}%0{}d{}",
            prefix.replace('%', "%%"),
            DERIVED_WIDTH,
            ext.replace('%', "%%")
        );

        Self {
            raw,
            prefix,
            suffix: ext,
            width: DERIVED_WIDTH,
        }
    }

    /// The pattern in engine syntax.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Zero-padding width of the placeholder (0 means unpadded).
    pub fn width(&self) -> usize {
        self.width
    }

    /// The file extension of produced segments, if any (without the dot).
    pub fn extension(&self) -> Option<&str> {
        let (_, ext) = self.suffix.rsplit_once('.')?;
        (!ext.is_empty()).then_some(ext)
    }

    /// Render the file name for a given segment index.
    pub fn file_name(&self, index: u32) -> String {
        format!(
            "{}{:0width$}{}",
            self.prefix,
            index,
            self.suffix,
            width = self.width
        )
    }

    /// Recover the segment index from a file name produced by this pattern.
    ///
    /// Returns `None` for names that do not match exactly.
    pub fn match_index(&self, file_name: &str) -> Option<u32> {
        let digits = file_name
            .strip_prefix(self.prefix.as_str())?
            .strip_suffix(self.suffix.as_str())?;
        if digits.is_empty()
            || digits.len() < self.width
            || !digits.bytes().all(|b| b.is_ascii_digit())
        {
            return None;
        }
        digits.parse().ok()
    }
}

impl fmt::Display for SegmentPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
