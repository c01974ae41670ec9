//! Pure markup → field mapping extraction.
//!
//! # Design
//! - Operates on an already-retrieved page body; no I/O, so it is testable
//!   against fixed fixtures.
//! - Mirrors what a browser would submit for the form: named, enabled
//!   controls only, checked radios/checkboxes, the selected option of each
//!   select, and textarea bodies. Buttons and file pickers are never included.
//! - When a form locator is given, only controls inside the matching
//!   `<form>` are extracted; otherwise every control in the document is.

mod entities;
mod lexer;

use thiserror::Error;

use self::entities::{collapse_whitespace, decode};
use self::lexer::{Lexer, Tag, Token};
use crate::model::FieldMap;

/// Input types that are never part of a submitted field set.
const IGNORED_INPUT_TYPES: [&str; 5] = ["submit", "button", "reset", "image", "file"];

/// Failures raised when a page body is not usable markup.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum MarkupError {
    /// The body was empty or whitespace only.
    #[error("markup document is empty")]
    Empty,
    /// The body contained no elements at all (e.g. JSON or plain text).
    #[error("markup document contains no elements")]
    NoElements,
    /// A tag was still open at end of input.
    #[error("unterminated tag in markup")]
    UnterminatedTag {
        /// Byte offset of the opening `<`.
        offset: usize,
    },
    /// A comment was still open at end of input.
    #[error("unterminated comment in markup")]
    UnterminatedComment {
        /// Byte offset of the opening `<!--`.
        offset: usize,
    },
}

/// Result of scanning a page for its form fields.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExtractedForm {
    /// Field-name → current value mapping.
    pub fields: FieldMap,
    /// Whether the expected form container was present.
    pub form_found: bool,
}

/// Extract the submittable field set from `markup`.
///
/// `form_action` restricts extraction to controls inside a `<form>` whose
/// `action` attribute contains the given text (ASCII case-insensitive); when
/// `None`, any `<form>` counts as the container and the whole document is scanned.
///
/// # Errors
///
/// Returns [`MarkupError`] when the body is empty, has no elements, or ends
/// inside an unterminated tag or comment.
pub fn extract_fields(
    markup: &str,
    form_action: Option<&str>,
) -> Result<ExtractedForm, MarkupError> {
    if markup.trim().is_empty() {
        return Err(MarkupError::Empty);
    }

    let mut walker = FieldWalker::new(form_action);
    let mut lexer = Lexer::new(markup);
    let mut saw_element = false;
    while let Some(token) = lexer.next_token()? {
        if matches!(token, Token::Start(_)) {
            saw_element = true;
        }
        walker.consume(token);
    }

    if !saw_element {
        return Err(MarkupError::NoElements);
    }
    Ok(walker.finish())
}

#[derive(Default)]
struct OptionState {
    value: Option<String>,
    text: String,
    selected: bool,
    disabled: bool,
}

impl OptionState {
    fn resolved_value(&self) -> String {
        self.value
            .clone()
            .unwrap_or_else(|| collapse_whitespace(&decode(&self.text)))
    }
}

struct SelectState {
    name: Option<String>,
    disabled: bool,
    multiple: bool,
    options: Vec<OptionState>,
    current: Option<OptionState>,
}

impl SelectState {
    fn close_option(&mut self) {
        if let Some(option) = self.current.take() {
            self.options.push(option);
        }
    }

    /// Value a browser would submit, or `None` when nothing is submitted.
    fn resolve(mut self) -> Option<(String, String)> {
        self.close_option();
        let name = self.name.filter(|name| !name.is_empty())?;
        if self.disabled {
            return None;
        }
        let enabled = || self.options.iter().filter(|option| !option.disabled);
        if let Some(selected) = enabled().find(|option| option.selected) {
            return Some((name, selected.resolved_value()));
        }
        if self.multiple {
            return None;
        }
        let fallback = enabled()
            .map(OptionState::resolved_value)
            .find(|value| !value.trim().is_empty())
            .unwrap_or_default();
        Some((name, fallback))
    }
}

struct TextareaState {
    name: Option<String>,
    disabled: bool,
    text: String,
}

struct FieldWalker<'l> {
    form_action: Option<&'l str>,
    inside_form: bool,
    form_found: bool,
    fields: FieldMap,
    select: Option<SelectState>,
    textarea: Option<TextareaState>,
}

impl<'l> FieldWalker<'l> {
    fn new(form_action: Option<&'l str>) -> Self {
        Self {
            form_action,
            inside_form: false,
            form_found: false,
            fields: FieldMap::new(),
            select: None,
            textarea: None,
        }
    }

    const fn in_scope(&self) -> bool {
        self.form_action.is_none() || self.inside_form
    }

    fn consume(&mut self, token: Token<'_>) {
        match token {
            Token::Start(tag) => self.start(&tag),
            Token::End(name) => self.end(&name),
            Token::Text(text) => self.text(text),
        }
    }

    fn start(&mut self, tag: &Tag<'_>) {
        if tag.name == "form" {
            self.open_form(tag);
            return;
        }
        if !self.in_scope() {
            return;
        }
        match tag.name.as_str() {
            "input" => self.input(tag),
            "select" => {
                self.close_select();
                self.select = Some(SelectState {
                    name: attr_decoded(tag, "name"),
                    disabled: tag.has_attr("disabled"),
                    multiple: tag.has_attr("multiple"),
                    options: Vec::new(),
                    current: None,
                });
            }
            "option" => {
                if let Some(select) = self.select.as_mut() {
                    select.close_option();
                    select.current = Some(OptionState {
                        value: attr_decoded(tag, "value"),
                        text: String::new(),
                        selected: tag.has_attr("selected"),
                        disabled: tag.has_attr("disabled"),
                    });
                }
            }
            "optgroup" => {
                if let Some(select) = self.select.as_mut() {
                    select.close_option();
                }
            }
            "textarea" => {
                self.textarea = Some(TextareaState {
                    name: attr_decoded(tag, "name"),
                    disabled: tag.has_attr("disabled"),
                    text: String::new(),
                });
                if tag.self_closing {
                    self.close_textarea();
                }
            }
            _ => {}
        }
    }

    fn end(&mut self, name: &str) {
        match name {
            "form" => {
                if self.inside_form {
                    self.close_select();
                }
                self.inside_form = false;
            }
            "select" => self.close_select(),
            "option" | "optgroup" => {
                if let Some(select) = self.select.as_mut() {
                    select.close_option();
                }
            }
            "textarea" => self.close_textarea(),
            _ => {}
        }
    }

    fn text(&mut self, text: &str) {
        if let Some(textarea) = self.textarea.as_mut() {
            textarea.text.push_str(text);
        } else if let Some(option) = self.select.as_mut().and_then(|s| s.current.as_mut()) {
            option.text.push_str(text);
        }
    }

    fn open_form(&mut self, tag: &Tag<'_>) {
        match self.form_action {
            None => self.form_found = true,
            Some(needle) => {
                if self.inside_form {
                    return;
                }
                let action = tag.attr("action").map(decode).unwrap_or_default();
                if contains_ignore_ascii_case(&action, needle) {
                    self.form_found = true;
                    self.inside_form = true;
                }
            }
        }
    }

    fn input(&mut self, tag: &Tag<'_>) {
        let Some(name) = attr_decoded(tag, "name").filter(|name| !name.is_empty()) else {
            return;
        };
        if tag.has_attr("disabled") {
            return;
        }
        let kind = tag.attr("type").unwrap_or("text").trim().to_ascii_lowercase();
        if IGNORED_INPUT_TYPES.contains(&kind.as_str()) {
            return;
        }
        let value = match kind.as_str() {
            "radio" | "checkbox" => {
                if !tag.has_attr("checked") {
                    return;
                }
                attr_decoded(tag, "value").unwrap_or_else(|| "on".to_string())
            }
            _ => attr_decoded(tag, "value").unwrap_or_default(),
        };
        self.fields.insert(name, value);
    }

    fn close_select(&mut self) {
        if let Some((name, value)) = self.select.take().and_then(SelectState::resolve) {
            self.fields.insert(name, value);
        }
    }

    fn close_textarea(&mut self) {
        let Some(textarea) = self.textarea.take() else {
            return;
        };
        let Some(name) = textarea.name.filter(|name| !name.is_empty()) else {
            return;
        };
        if textarea.disabled {
            return;
        }
        let decoded = decode(&textarea.text);
        let body = decoded
            .strip_prefix("\r\n")
            .or_else(|| decoded.strip_prefix('\n'))
            .unwrap_or(decoded.as_ref());
        self.fields.insert(name, body.to_string());
    }

    fn finish(mut self) -> ExtractedForm {
        self.close_select();
        self.close_textarea();
        ExtractedForm {
            fields: self.fields,
            form_found: self.form_found,
        }
    }
}

fn attr_decoded(tag: &Tag<'_>, name: &str) -> Option<String> {
    tag.attr(name).map(|raw| decode(raw).into_owned())
}

fn contains_ignore_ascii_case(haystack: &str, needle: &str) -> bool {
    haystack
        .to_ascii_lowercase()
        .contains(&needle.to_ascii_lowercase())
}
