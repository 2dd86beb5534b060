//! Program image files.
//!
//! A program image is a single line of hexadecimal text beginning
//! with the magic header `1f1f1f1f`. The header is a basic sanity
//! check that a file actually holds an executable image; everything
//! after it is the program body, loaded into memory at address 0.

use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;
use thiserror::Error;

/// Magic header every program image starts with.
pub const MAGIC_HEADER: &str = "1f1f1f1f";

/// A parsed program image: the hex body with the header stripped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramImage {
    body: String,
}

impl ProgramImage {
    /// Parse image text, stripping the magic header.
    pub fn parse(text: &str) -> Result<Self, ImageError> {
        let Some(body) = text.strip_prefix(MAGIC_HEADER) else {
            return Err(ImageError::WrongFormat);
        };
        Ok(Self {
            body: body.to_string(),
        })
    }

    /// The program body, without the header.
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Length of the body in hexadecimal digits.
    pub fn len(&self) -> usize {
        self.body.len()
    }

    /// Whether the body is empty.
    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }
}

impl fmt::Display for ProgramImage {
    /// The full image text, header included.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", MAGIC_HEADER, self.body)
    }
}

/// Load a program image from the first line of a file.
pub fn load_image<P: AsRef<Path>>(path: P) -> Result<ProgramImage, ImageError> {
    let path = path.as_ref();
    let name = path.display().to_string();

    let file = File::open(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => ImageError::NotFound(name.clone()),
        _ => ImageError::Unreadable(name.clone()),
    })?;

    let mut line = String::new();
    BufReader::new(file)
        .read_line(&mut line)
        .map_err(|_| ImageError::Unreadable(name.clone()))?;

    let line = line.trim_end();
    if line.is_empty() {
        return Err(ImageError::Unreadable(name));
    }
    ProgramImage::parse(line)
}

/// Save a program image, header included, as a one-line file.
pub fn save_image<P: AsRef<Path>>(path: P, image: &ProgramImage) -> Result<(), ImageError> {
    let path = path.as_ref();
    let name = path.display().to_string();

    let mut file = File::create(path).map_err(|_| ImageError::Unwritable(name.clone()))?;
    writeln!(file, "{}", image).map_err(|_| ImageError::Unwritable(name))
}

/// Errors that can occur around program image files.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImageError {
    #[error("program image does not start with the magic header {MAGIC_HEADER:?}")]
    WrongFormat,

    #[error("cannot find {0}")]
    NotFound(String),

    #[error("cannot read {0}")]
    Unreadable(String),

    #[error("cannot write {0}")]
    Unwritable(String),
}
