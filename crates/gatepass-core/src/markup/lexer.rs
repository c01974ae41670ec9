//! Forgiving tag lexer for server-rendered form pages.
//!
//! Only the structure needed for field extraction is recognised: start and end
//! tags with attributes, text runs, comments, and raw-text elements whose
//! contents must not be scanned for tags (`script`, `style`, `textarea`,
//! `title`). All split points fall on ASCII bytes, so every slice is valid UTF-8.

use super::MarkupError;

/// Elements whose body is opaque text up to the matching end tag.
const RAW_TEXT_ELEMENTS: [&str; 4] = ["script", "style", "textarea", "title"];

/// Lexical unit produced by [`Lexer`].
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Token<'a> {
    /// `<name attr=value ...>`
    Start(Tag<'a>),
    /// `</name>`
    End(String),
    /// Character data between tags (entities still encoded).
    Text(&'a str),
}

/// Parsed start tag.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct Tag<'a> {
    pub(crate) name: String,
    pub(crate) attrs: Vec<Attribute<'a>>,
    pub(crate) self_closing: bool,
}

impl Tag<'_> {
    /// Raw (undecoded) value of the first attribute called `name`.
    pub(crate) fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|attr| attr.name == name)
            .map(|attr| attr.value.unwrap_or(""))
    }

    /// Whether a boolean attribute such as `disabled` is present.
    pub(crate) fn has_attr(&self, name: &str) -> bool {
        self.attrs.iter().any(|attr| attr.name == name)
    }
}

/// Attribute with a lowercased name and its raw value, if any.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct Attribute<'a> {
    pub(crate) name: String,
    pub(crate) value: Option<&'a str>,
}

pub(crate) struct Lexer<'a> {
    src: &'a str,
    pos: usize,
    raw_text_end: Option<&'static str>,
}

impl<'a> Lexer<'a> {
    pub(crate) const fn new(src: &'a str) -> Self {
        Self {
            src,
            pos: 0,
            raw_text_end: None,
        }
    }

    /// Produce the next token, `Ok(None)` at end of input.
    pub(crate) fn next_token(&mut self) -> Result<Option<Token<'a>>, MarkupError> {
        loop {
            if let Some(element) = self.raw_text_end.take() {
                let end = find_end_tag(self.src, self.pos, element).unwrap_or(self.src.len());
                let text = &self.src[self.pos..end];
                self.pos = end;
                if !text.is_empty() {
                    return Ok(Some(Token::Text(text)));
                }
            }

            let bytes = self.src.as_bytes();
            if self.pos >= bytes.len() {
                return Ok(None);
            }

            if bytes[self.pos] != b'<' {
                let end = self.src[self.pos..]
                    .find('<')
                    .map_or(self.src.len(), |offset| self.pos + offset);
                let text = &self.src[self.pos..end];
                self.pos = end;
                return Ok(Some(Token::Text(text)));
            }

            let rest = &self.src[self.pos..];
            if rest.starts_with("<!--") {
                let close = rest[4..]
                    .find("-->")
                    .ok_or(MarkupError::UnterminatedComment { offset: self.pos })?;
                self.pos += 4 + close + 3;
                continue;
            }
            if rest.starts_with("<!") || rest.starts_with("<?") {
                let close = rest
                    .find('>')
                    .ok_or(MarkupError::UnterminatedTag { offset: self.pos })?;
                self.pos += close + 1;
                continue;
            }
            if rest.starts_with("</") {
                return self.end_tag().map(Some);
            }
            if bytes.get(self.pos + 1).is_some_and(u8::is_ascii_alphabetic) {
                return self.start_tag().map(Some);
            }

            // A lone '<' is character data.
            self.pos += 1;
            return Ok(Some(Token::Text(&rest[..1])));
        }
    }

    fn end_tag(&mut self) -> Result<Token<'a>, MarkupError> {
        let start = self.pos;
        let rest = &self.src[start..];
        let close = rest
            .find('>')
            .ok_or(MarkupError::UnterminatedTag { offset: start })?;
        let name = rest[2..close]
            .trim()
            .split(|c: char| c.is_ascii_whitespace())
            .next()
            .unwrap_or("")
            .to_ascii_lowercase();
        self.pos = start + close + 1;
        Ok(Token::End(name))
    }

    fn start_tag(&mut self) -> Result<Token<'a>, MarkupError> {
        let start = self.pos;
        let bytes = self.src.as_bytes();
        let unterminated = MarkupError::UnterminatedTag { offset: start };

        let mut cursor = start + 1;
        while cursor < bytes.len() && is_name_byte(bytes[cursor]) {
            cursor += 1;
        }
        let name = self.src[start + 1..cursor].to_ascii_lowercase();

        let mut attrs = Vec::new();
        let self_closing = loop {
            cursor = skip_whitespace(bytes, cursor);
            match bytes.get(cursor) {
                None => return Err(unterminated),
                Some(b'>') => {
                    cursor += 1;
                    break false;
                }
                Some(b'/') if bytes.get(cursor + 1) == Some(&b'>') => {
                    cursor += 2;
                    break true;
                }
                Some(b'/') => {
                    cursor += 1;
                    continue;
                }
                Some(_) => {}
            }

            let name_start = cursor;
            while cursor < bytes.len() && !is_attr_name_terminator(bytes[cursor]) {
                cursor += 1;
            }
            if cursor == name_start {
                // Stray '=' or quote: step over one character and keep going.
                cursor += self.src[cursor..].chars().next().map_or(1, char::len_utf8);
                continue;
            }
            let attr_name = self.src[name_start..cursor].to_ascii_lowercase();

            let after_name = skip_whitespace(bytes, cursor);
            let value = if bytes.get(after_name) == Some(&b'=') {
                let value_start = skip_whitespace(bytes, after_name + 1);
                match bytes.get(value_start) {
                    None => return Err(unterminated),
                    Some(&quote @ (b'"' | b'\'')) => {
                        let close = self.src[value_start + 1..]
                            .find(char::from(quote))
                            .ok_or(MarkupError::UnterminatedTag { offset: start })?;
                        let value_end = value_start + 1 + close;
                        cursor = value_end + 1;
                        Some(&self.src[value_start + 1..value_end])
                    }
                    Some(_) => {
                        let mut value_end = value_start;
                        while value_end < bytes.len()
                            && !bytes[value_end].is_ascii_whitespace()
                            && bytes[value_end] != b'>'
                        {
                            value_end += 1;
                        }
                        cursor = value_end;
                        Some(&self.src[value_start..value_end])
                    }
                }
            } else {
                cursor = after_name;
                None
            };

            attrs.push(Attribute {
                name: attr_name,
                value,
            });
        };

        self.pos = cursor;
        if !self_closing && RAW_TEXT_ELEMENTS.contains(&name.as_str()) {
            self.raw_text_end = RAW_TEXT_ELEMENTS
                .iter()
                .copied()
                .find(|element| *element == name);
        }

        Ok(Token::Start(Tag {
            name,
            attrs,
            self_closing,
        }))
    }
}

const fn is_name_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'-' || byte == b':' || byte == b'_'
}

const fn is_attr_name_terminator(byte: u8) -> bool {
    byte.is_ascii_whitespace() || matches!(byte, b'=' | b'>' | b'/' | b'"' | b'\'')
}

fn skip_whitespace(bytes: &[u8], mut cursor: usize) -> usize {
    while cursor < bytes.len() && bytes[cursor].is_ascii_whitespace() {
        cursor += 1;
    }
    cursor
}

/// Locate `</element` (ASCII case-insensitive) at or after `from`.
fn find_end_tag(src: &str, from: usize, element: &str) -> Option<usize> {
    let needle_len = element.len() + 2;
    let bytes = src.as_bytes();
    let mut cursor = from;
    while let Some(offset) = src.get(cursor..)?.find("</") {
        let candidate = cursor + offset;
        let end = candidate + needle_len;
        if end <= bytes.len()
            && bytes[candidate + 2..end].eq_ignore_ascii_case(element.as_bytes())
            && bytes
                .get(end)
                .is_none_or(|byte| byte.is_ascii_whitespace() || *byte == b'>' || *byte == b'/')
        {
            return Some(candidate);
        }
        cursor = candidate + 2;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(src: &str) -> Result<Vec<Token<'_>>, MarkupError> {
        let mut lexer = Lexer::new(src);
        let mut out = Vec::new();
        while let Some(token) = lexer.next_token()? {
            out.push(token);
        }
        Ok(out)
    }

    #[test]
    fn lexes_attributes_in_all_quoting_styles() -> Result<(), MarkupError> {
        let out = tokens(r#"<INPUT Type=hidden name='tok' value="a b" checked>"#)?;
        let [Token::Start(tag)] = out.as_slice() else {
            panic!("expected a single start tag, got {out:?}");
        };
        assert_eq!(tag.name, "input");
        assert_eq!(tag.attr("type"), Some("hidden"));
        assert_eq!(tag.attr("name"), Some("tok"));
        assert_eq!(tag.attr("value"), Some("a b"));
        assert!(tag.has_attr("checked"));
        assert_eq!(tag.attr("checked"), Some(""));
        Ok(())
    }

    #[test]
    fn first_duplicate_attribute_wins() -> Result<(), MarkupError> {
        let out = tokens(r#"<input name="first" name="second">"#)?;
        let [Token::Start(tag)] = out.as_slice() else {
            panic!("expected a single start tag");
        };
        assert_eq!(tag.attr("name"), Some("first"));
        Ok(())
    }

    #[test]
    fn skips_comments_and_doctype() -> Result<(), MarkupError> {
        let out = tokens("<!DOCTYPE html><!-- <input name=x> --><p>hi</p>")?;
        assert_eq!(out.len(), 3);
        assert!(matches!(&out[0], Token::Start(tag) if tag.name == "p"));
        assert_eq!(out[1], Token::Text("hi"));
        assert_eq!(out[2], Token::End("p".into()));
        Ok(())
    }

    #[test]
    fn script_bodies_are_opaque() -> Result<(), MarkupError> {
        let out = tokens(r#"<script>if (a<b) { x = "<input name=z>"; }</SCRIPT><b>"#)?;
        assert_eq!(out.len(), 4);
        assert!(matches!(&out[1], Token::Text(text) if text.contains("<input")));
        assert_eq!(out[2], Token::End("script".into()));
        Ok(())
    }

    #[test]
    fn self_closing_tags_are_flagged() -> Result<(), MarkupError> {
        let out = tokens(r#"<input name="a"/><br />"#)?;
        assert!(matches!(
            &out[0],
            Token::Start(tag) if tag.self_closing && tag.attr("name") == Some("a")
        ));
        assert!(matches!(&out[1], Token::Start(tag) if tag.self_closing && tag.name == "br"));
        Ok(())
    }

    #[test]
    fn lone_angle_bracket_is_text() -> Result<(), MarkupError> {
        let out = tokens("1 < 2")?;
        assert_eq!(out, vec![Token::Text("1 "), Token::Text("<"), Token::Text(" 2")]);
        Ok(())
    }

    #[test]
    fn unterminated_constructs_are_errors() {
        assert_eq!(
            tokens(r#"<p>ok</p><input name="x"#),
            Err(MarkupError::UnterminatedTag { offset: 9 })
        );
        assert_eq!(
            tokens("<p><!-- never closed"),
            Err(MarkupError::UnterminatedComment { offset: 3 })
        );
    }

    #[test]
    fn non_ascii_text_and_values_survive() -> Result<(), MarkupError> {
        let out = tokens("<option value=\"ಬಿಟಿಪಿಎಸ್\">ಬಿಟಿಪಿಎಸ್ – BTPS</option>")?;
        assert!(matches!(&out[0], Token::Start(tag) if tag.attr("value") == Some("ಬಿಟಿಪಿಎಸ್")));
        assert_eq!(out[1], Token::Text("ಬಿಟಿಪಿಎಸ್ – BTPS"));
        Ok(())
    }
}
