//! Styled text fragments supplied by the document reader.

use serde::{Deserialize, Serialize};

/// Style tag attached to one extracted text run.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChunkKind {
    /// Section heading, rendered enlarged and bold on its own line.
    Header,
    /// Body text without decoration.
    Normal,
    /// Emphasised run.
    Italic,
    /// Strong run.
    Bold,
    /// Any style the reader could not classify; carries the reader's tag.
    ///
    /// These runs produce no markup and are dropped by the paginator.
    Other(String),
}

impl ChunkKind {
    /// Whether the formatter has a decoration for this kind.
    pub fn is_recognized(&self) -> bool {
        !matches!(self, Self::Other(_))
    }
}

/// One styled run of plain text, in reading order within a chapter.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyledChunk {
    /// Style tag.
    pub kind: ChunkKind,
    /// Plain text payload; markup metacharacters are escaped by the formatter.
    pub text: String,
}

impl StyledChunk {
    /// Build a chunk of the given kind.
    pub fn new(kind: ChunkKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }

    /// Chapter or section heading.
    pub fn header(text: impl Into<String>) -> Self {
        Self::new(ChunkKind::Header, text)
    }

    /// Plain body text.
    pub fn normal(text: impl Into<String>) -> Self {
        Self::new(ChunkKind::Normal, text)
    }

    /// Emphasised text.
    pub fn italic(text: impl Into<String>) -> Self {
        Self::new(ChunkKind::Italic, text)
    }

    /// Strong text.
    pub fn bold(text: impl Into<String>) -> Self {
        Self::new(ChunkKind::Bold, text)
    }

    /// Chunk with an unclassified style tag.
    pub fn other(tag: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(ChunkKind::Other(tag.into()), text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_other_kind_is_unrecognized() {
        assert!(StyledChunk::header("h").kind.is_recognized());
        assert!(StyledChunk::normal("n").kind.is_recognized());
        assert!(StyledChunk::italic("i").kind.is_recognized());
        assert!(StyledChunk::bold("b").kind.is_recognized());
        assert!(!StyledChunk::other("sup", "x").kind.is_recognized());
    }

    #[test]
    fn chunk_json_shape_is_stable() {
        let chunk = StyledChunk::other("sup", "2");
        let json = serde_json::to_string(&chunk).expect("chunk should serialize");
        assert_eq!(json, r#"{"kind":{"Other":"sup"},"text":"2"}"#);
        let back: StyledChunk = serde_json::from_str(&json).expect("chunk should parse");
        assert_eq!(back, chunk);
    }
}
