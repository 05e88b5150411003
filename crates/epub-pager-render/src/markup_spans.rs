//! Markup → styled text spans.
//!
//! Accepts the Pango-style subset produced by `epub_pager::format_chunk`
//! plus the common convenience tags. Unknown tags and malformed markup are
//! measurement failures.

use epub_pager::MeasureError;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use smallvec::SmallVec;

const ROOT_OPEN: &str = "<markup>";
const ROOT_CLOSE: &str = "</markup>";
const SIZE_STEP: f32 = 1.2;

/// Resolved style of a text span.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SpanStyle {
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub strikethrough: bool,
    pub monospace: bool,
    /// Font size relative to the base size.
    pub scale: f32,
}

impl Default for SpanStyle {
    fn default() -> Self {
        Self {
            bold: false,
            italic: false,
            underline: false,
            strikethrough: false,
            monospace: false,
            scale: 1.0,
        }
    }
}

/// Run of text sharing one style.
#[derive(Clone, Debug, PartialEq)]
pub struct StyledSpan {
    pub text: String,
    pub style: SpanStyle,
}

/// Parse markup into spans in document order. Adjacent text with the same
/// style is merged.
pub fn parse_markup(markup: &str) -> Result<Vec<StyledSpan>, MeasureError> {
    let mut wrapped = String::with_capacity(markup.len() + ROOT_OPEN.len() + ROOT_CLOSE.len());
    wrapped.push_str(ROOT_OPEN);
    wrapped.push_str(markup);
    wrapped.push_str(ROOT_CLOSE);

    let mut reader = Reader::from_reader(wrapped.as_bytes());
    reader.config_mut().trim_text(false);
    let mut buf = Vec::with_capacity(64);
    let mut stack: SmallVec<[(String, SpanStyle); 8]> = SmallVec::new();
    let mut spans: Vec<StyledSpan> = Vec::new();
    let mut entity_buf = String::with_capacity(16);

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let tag = decode_tag_name(&reader, e.name().as_ref())?;
                let parent = stack.last().map(|(_, style)| *style).unwrap_or_default();
                let style = if tag == "markup" && stack.is_empty() {
                    parent
                } else {
                    apply_tag(&reader, &tag, &e, parent)?
                };
                stack.push((tag, style));
            }
            Ok(Event::Empty(e)) => {
                let tag = decode_tag_name(&reader, e.name().as_ref())?;
                let parent = stack.last().map(|(_, style)| *style).unwrap_or_default();
                apply_tag(&reader, &tag, &e, parent)?;
            }
            Ok(Event::End(_)) => {
                stack.pop();
            }
            Ok(Event::Text(e)) => {
                let text = e.decode().map_err(|err| {
                    MeasureError::new(format!("text decode error: {:?}", err))
                        .with_offset(markup_offset(&reader))
                })?;
                push_text(&mut spans, &stack, text.as_ref());
            }
            Ok(Event::CData(e)) => {
                let text = reader.decoder().decode(&e).map_err(|err| {
                    MeasureError::new(format!("cdata decode error: {:?}", err))
                        .with_offset(markup_offset(&reader))
                })?;
                push_text(&mut spans, &stack, text.as_ref());
            }
            Ok(Event::GeneralRef(e)) => {
                let entity_name = e.decode().map_err(|err| {
                    MeasureError::new(format!("entity decode error: {:?}", err))
                        .with_offset(markup_offset(&reader))
                })?;
                entity_buf.clear();
                entity_buf.push('&');
                entity_buf.push_str(entity_name.as_ref());
                entity_buf.push(';');
                let resolved = quick_xml::escape::unescape(&entity_buf).map_err(|err| {
                    MeasureError::new(format!("unknown entity {}: {:?}", entity_buf, err))
                        .with_offset(markup_offset(&reader))
                })?;
                push_text(&mut spans, &stack, resolved.as_ref());
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(err) => {
                return Err(MeasureError::new(format!("malformed markup: {:?}", err))
                    .with_offset(markup_offset(&reader)));
            }
        }
        buf.clear();
    }

    if !stack.is_empty() {
        return Err(MeasureError::new("unclosed markup element").with_offset(markup.len()));
    }
    Ok(spans)
}

fn push_text(spans: &mut Vec<StyledSpan>, stack: &[(String, SpanStyle)], text: &str) {
    if text.is_empty() {
        return;
    }
    let style = stack.last().map(|(_, style)| *style).unwrap_or_default();
    if let Some(last) = spans.last_mut() {
        if last.style == style {
            last.text.push_str(text);
            return;
        }
    }
    spans.push(StyledSpan {
        text: text.to_string(),
        style,
    });
}

fn markup_offset(reader: &Reader<&[u8]>) -> usize {
    usize::try_from(reader.buffer_position())
        .unwrap_or(usize::MAX)
        .saturating_sub(ROOT_OPEN.len())
}

fn decode_tag_name(reader: &Reader<&[u8]>, raw: &[u8]) -> Result<String, MeasureError> {
    let decoded = reader.decoder().decode(raw).map_err(|err| {
        MeasureError::new(format!("tag name decode error: {:?}", err))
            .with_offset(markup_offset(reader))
    })?;
    Ok(decoded.to_ascii_lowercase())
}

fn apply_tag(
    reader: &Reader<&[u8]>,
    tag: &str,
    start: &BytesStart<'_>,
    parent: SpanStyle,
) -> Result<SpanStyle, MeasureError> {
    let mut style = parent;
    match tag {
        "b" => style.bold = true,
        "i" => style.italic = true,
        "u" => style.underline = true,
        "s" => style.strikethrough = true,
        "tt" => style.monospace = true,
        "big" => style.scale *= SIZE_STEP,
        "small" => style.scale /= SIZE_STEP,
        "sub" | "sup" => style.scale /= SIZE_STEP,
        "span" => apply_span_attributes(reader, start, &mut style)?,
        other => {
            return Err(MeasureError::new(format!("unknown markup tag <{}>", other))
                .with_offset(markup_offset(reader)));
        }
    }
    Ok(style)
}

fn apply_span_attributes(
    reader: &Reader<&[u8]>,
    start: &BytesStart<'_>,
    style: &mut SpanStyle,
) -> Result<(), MeasureError> {
    for attr in start.attributes() {
        let attr = attr.map_err(|err| {
            MeasureError::new(format!("malformed span attribute: {:?}", err))
                .with_offset(markup_offset(reader))
        })?;
        let key = match reader.decoder().decode(attr.key.as_ref()) {
            Ok(v) => v.to_ascii_lowercase(),
            Err(_) => continue,
        };
        let value = match reader.decoder().decode(&attr.value) {
            Ok(v) => v.trim().to_ascii_lowercase(),
            Err(_) => continue,
        };
        match key.as_str() {
            "size" | "font_size" | "font-size" => {
                style.scale = resolve_size(&value, style.scale).ok_or_else(|| {
                    MeasureError::new(format!("unsupported span size {:?}", value))
                        .with_offset(markup_offset(reader))
                })?;
            }
            "weight" | "font_weight" | "font-weight" => {
                style.bold = resolve_bold(&value).ok_or_else(|| {
                    MeasureError::new(format!("unsupported span weight {:?}", value))
                        .with_offset(markup_offset(reader))
                })?;
            }
            "style" | "font_style" | "font-style" => {
                style.italic = match value.as_str() {
                    "italic" | "oblique" => true,
                    "normal" => false,
                    _ => {
                        return Err(MeasureError::new(format!(
                            "unsupported span style {:?}",
                            value
                        ))
                        .with_offset(markup_offset(reader)));
                    }
                };
            }
            "underline" => style.underline = value != "none",
            "strikethrough" => style.strikethrough = value == "true",
            _ => log::trace!("ignoring span attribute {}", key),
        }
    }
    Ok(())
}

fn resolve_size(value: &str, current: f32) -> Option<f32> {
    let keyword = match value {
        "xx-small" => Some(SIZE_STEP.powi(-3)),
        "x-small" => Some(SIZE_STEP.powi(-2)),
        "small" => Some(SIZE_STEP.powi(-1)),
        "medium" => Some(1.0),
        "large" => Some(SIZE_STEP),
        "x-large" => Some(SIZE_STEP.powi(2)),
        "xx-large" => Some(SIZE_STEP.powi(3)),
        "larger" => Some(current * SIZE_STEP),
        "smaller" => Some(current / SIZE_STEP),
        _ => None,
    };
    if keyword.is_some() {
        return keyword;
    }
    let percent = value.strip_suffix('%')?;
    let percent: f32 = percent.trim().parse().ok()?;
    (percent.is_finite() && percent > 0.0).then_some(percent / 100.0)
}

fn resolve_bold(value: &str) -> Option<bool> {
    match value {
        "bold" | "ultrabold" | "heavy" | "semibold" | "ultraheavy" => Some(true),
        "normal" | "light" | "ultralight" | "thin" | "book" | "medium" => Some(false),
        numeric => numeric.parse::<u16>().ok().map(|w| w >= 600),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_markup_resolves_enlarged_bold_span() {
        let spans = parse_markup(
            "\n<span size=\"x-large\" font-weight=\"bold\">Title</span>\nbody",
        )
        .expect("header markup parses");
        assert_eq!(spans.len(), 3);
        assert_eq!(spans[0].text, "\n");
        assert_eq!(spans[1].text, "Title");
        assert!(spans[1].style.bold);
        assert!((spans[1].style.scale - 1.44).abs() < 1e-4);
        assert_eq!(spans[2].text, "\nbody");
        assert_eq!(spans[2].style, SpanStyle::default());
    }

    #[test]
    fn nested_tags_compose_styles() {
        let spans = parse_markup("a<b>b<i>c</i></b>").expect("parses");
        assert_eq!(spans.len(), 3);
        assert!(spans[1].style.bold && !spans[1].style.italic);
        assert!(spans[2].style.bold && spans[2].style.italic);
    }

    #[test]
    fn entities_are_unescaped_and_merged() {
        let spans = parse_markup("a &lt; b &amp; c").expect("parses");
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].text, "a < b & c");
    }

    #[test]
    fn empty_markup_has_no_spans() {
        assert!(parse_markup("").expect("parses").is_empty());
    }

    #[test]
    fn unknown_tag_is_an_error() {
        let err = parse_markup("x<blink>y</blink>").expect_err("blink is not markup");
        assert!(err.message().contains("blink"));
    }

    #[test]
    fn unbalanced_markup_is_an_error() {
        assert!(parse_markup("<b>open").is_err());
        assert!(parse_markup("close</i>").is_err());
        assert!(parse_markup("a < b").is_err());
    }

    #[test]
    fn span_size_keywords_and_percentages() {
        assert_eq!(resolve_size("medium", 2.0), Some(1.0));
        assert_eq!(resolve_size("150%", 1.0), Some(1.5));
        assert_eq!(resolve_size("-5%", 1.0), None);
        assert_eq!(resolve_size("huge", 1.0), None);
        assert_eq!(resolve_bold("700"), Some(true));
        assert_eq!(resolve_bold("400"), Some(false));
    }
}
