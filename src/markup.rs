//! Chunk → markup formatting and the candidate-page accumulator.
//!
//! The markup dialect is the Pango-style subset understood by the layout
//! measurer: `<b>`, `<i>` and `<span size=.. font-weight=..>`.

use quick_xml::escape::partial_escape;

use crate::chunk::{ChunkKind, StyledChunk};

/// Opening decoration for header chunks.
pub const HEADER_OPEN: &str = "\n<span size=\"x-large\" font-weight=\"bold\">";
/// Closing decoration for header chunks.
pub const HEADER_CLOSE: &str = "</span>\n";

/// Format one chunk as markup.
///
/// Returns `None` for [`ChunkKind::Other`]; every recognized kind yields a
/// fragment. Markup metacharacters in the text are escaped.
pub fn format_chunk(chunk: &StyledChunk) -> Option<String> {
    let text = partial_escape(chunk.text.as_str());
    let text = text.as_ref();
    let fragment = match &chunk.kind {
        ChunkKind::Header => {
            let mut out = String::with_capacity(HEADER_OPEN.len() + text.len() + HEADER_CLOSE.len());
            out.push_str(HEADER_OPEN);
            out.push_str(text);
            out.push_str(HEADER_CLOSE);
            out
        }
        ChunkKind::Normal => text.to_string(),
        ChunkKind::Italic => wrap("i", text),
        ChunkKind::Bold => wrap("b", text),
        ChunkKind::Other(_) => return None,
    };
    Some(fragment)
}

fn wrap(tag: &str, text: &str) -> String {
    let mut out = String::with_capacity(text.len() + tag.len() * 2 + 5);
    out.push('<');
    out.push_str(tag);
    out.push('>');
    out.push_str(text);
    out.push_str("</");
    out.push_str(tag);
    out.push('>');
    out
}

/// Markup committed to the page currently being built.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MarkupBuffer {
    content: String,
}

impl MarkupBuffer {
    /// Empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Committed markup.
    pub fn as_str(&self) -> &str {
        &self.content
    }

    /// `true` until a fragment is committed or seeded.
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// Candidate content with `fragment` appended; the buffer is unchanged.
    pub fn trial(&self, fragment: &str) -> String {
        let mut out = String::with_capacity(self.content.len() + fragment.len());
        out.push_str(&self.content);
        out.push_str(fragment);
        out
    }

    /// Accept a trial produced by [`trial`](Self::trial).
    pub fn commit(&mut self, trial: String) {
        self.content = trial;
    }

    /// Replace the content with a single fragment, returning the old content.
    pub fn reseed(&mut self, fragment: String) -> String {
        core::mem::replace(&mut self.content, fragment)
    }

    /// Take the content, leaving the buffer empty.
    pub fn seal(&mut self) -> String {
        core::mem::take(&mut self.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_each_recognized_kind() {
        assert_eq!(
            format_chunk(&StyledChunk::header("Chapter 1")).as_deref(),
            Some("\n<span size=\"x-large\" font-weight=\"bold\">Chapter 1</span>\n")
        );
        assert_eq!(
            format_chunk(&StyledChunk::normal("plain")).as_deref(),
            Some("plain")
        );
        assert_eq!(
            format_chunk(&StyledChunk::italic("slanted")).as_deref(),
            Some("<i>slanted</i>")
        );
        assert_eq!(
            format_chunk(&StyledChunk::bold("heavy")).as_deref(),
            Some("<b>heavy</b>")
        );
    }

    #[test]
    fn other_kind_has_no_fragment() {
        assert_eq!(format_chunk(&StyledChunk::other("sup", "2")), None);
    }

    #[test]
    fn markup_metacharacters_are_escaped() {
        assert_eq!(
            format_chunk(&StyledChunk::bold("a < b & c > d")).as_deref(),
            Some("<b>a &lt; b &amp; c &gt; d</b>")
        );
        assert_eq!(
            format_chunk(&StyledChunk::normal("it's \"quoted\"")).as_deref(),
            Some("it's \"quoted\"")
        );
    }

    #[test]
    fn empty_text_still_yields_decoration() {
        assert_eq!(format_chunk(&StyledChunk::italic("")).as_deref(), Some("<i></i>"));
        assert_eq!(format_chunk(&StyledChunk::normal("")).as_deref(), Some(""));
    }

    #[test]
    fn buffer_trial_does_not_mutate_until_commit() {
        let mut buf = MarkupBuffer::new();
        let trial = buf.trial("Hello ");
        assert!(buf.is_empty());
        buf.commit(trial);
        assert_eq!(buf.trial("<b>world</b>"), "Hello <b>world</b>");
        assert_eq!(buf.as_str(), "Hello ");

        let old = buf.reseed("next".to_string());
        assert_eq!(old, "Hello ");
        assert_eq!(buf.seal(), "next");
        assert!(buf.is_empty());
    }
}
