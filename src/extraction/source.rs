//! Source document images

/// One document page image as handed to the extraction pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct SourceImage {
    /// File name or page label, used in logs
    pub name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl SourceImage {
    pub fn new(name: impl Into<String>, mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime: mime.into(),
            bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl std::fmt::Display for SourceImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}, {} KB)", self.name, self.mime, self.bytes.len() / 1024)
    }
}
