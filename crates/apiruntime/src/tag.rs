//! A reusable parser for the `name,key1,key2=value2,key3='quoted, with \' escapes'`
//! grammar used by `#[schema(...)]`, `#[validate(...)]`, and `#[default(...)]`
//! attribute strings (SPEC_FULL.md §4.1).
//!
//! This is hand-rolled rather than built on an existing attribute-parsing
//! crate because the grammar's escaping rules (different in bare vs. quoted
//! form) and its "return the best-effort parse even on error" contract don't
//! map onto `syn::Meta` or any off-the-shelf parser.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagItem {
	pub key: String,
	pub value: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagParse {
	/// The leading name, i.e. the first item with an empty key and no `=`.
	pub name: Option<String>,
	pub items: Vec<TagItem>,
	pub errors: Vec<TagError>,
}

impl TagParse {
	pub fn get(&self, key: &str) -> Option<&str> {
		self
			.items
			.iter()
			.find(|i| i.key == key)
			.and_then(|i| i.value.as_deref())
	}

	pub fn has(&self, key: &str) -> bool {
		self.items.iter().any(|i| i.key == key)
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagError {
	pub tag: String,
	pub position: usize,
	pub message: String,
	pub cause: Option<Box<TagError>>,
}

impl fmt::Display for TagError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "tag {:?} at byte {}: {}", self.tag, self.position, self.message)
	}
}

impl std::error::Error for TagError {
	fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
		self.cause.as_deref().map(|c| c as &(dyn std::error::Error + 'static))
	}
}

impl TagError {
	fn new(tag: &str, position: usize, message: impl Into<String>) -> Self {
		Self { tag: tag.to_string(), position, message: message.into(), cause: None }
	}

	pub const DUPLICATE_KEY: &'static str = "duplicate key";
	/// A quote must enclose the entire token (SPEC_FULL.md §4.1); raised for
	/// an unescaped `'` mid-token, or for characters trailing a closing quote
	/// that aren't the next stop delimiter.
	pub const MID_TOKEN_QUOTE: &'static str = "quote must enclose the entire token";
	pub const UNCLOSED_QUOTE: &'static str = "unterminated quoted token";
}

/// Parses one tag string per the grammar in SPEC_FULL.md §4.1. Always
/// returns a `TagParse`; parse errors are collected in `errors`, not raised,
/// so callers may ignore them and use the best-effort result.
pub fn parse(tag: &str) -> TagParse {
	let mut out = TagParse::default();
	let bytes = tag.as_bytes();
	let mut pos = 0usize;
	let mut first_item = true;

	while pos < bytes.len() {
		let item_start = pos;
		let (key, key_end, key_err) = read_token(tag, pos, &['=', ',']);
		pos = key_end;
		if let Some((epos, message)) = key_err {
			out.errors.push(TagError::new(tag, epos, message));
		}

		let mut value = None;
		if pos < bytes.len() && bytes[pos] == b'=' {
			pos += 1; // consume '='
			let (v, v_end, v_err) = read_token(tag, pos, &[',']);
			value = Some(v);
			pos = v_end;
			if let Some((epos, message)) = v_err {
				out.errors.push(TagError::new(tag, epos, message));
			}
		}

		if pos < bytes.len() && bytes[pos] == b',' {
			pos += 1;
		}

		if first_item && value.is_none() && !key.is_empty() {
			// The first bare item (no '=') is the tag's name.
			out.name = Some(key);
			first_item = false;
			continue;
		}
		first_item = false;

		if key.is_empty() && value.is_none() {
			// Empty leading segment (e.g. a tag starting with ',').
			continue;
		}

		if out.items.iter().any(|i| i.key == key) {
			out.errors.push(TagError::new(tag, item_start, TagError::DUPLICATE_KEY));
		}
		out.items.push(TagItem { key, value });
	}

	out
}

/// Reads one bare-or-quoted token starting at `start`, stopping at the first
/// unescaped byte in `stop_at` (or end of string). Returns the unescaped
/// token text and the index just past it (the stop byte itself is *not*
/// consumed), plus an `(error_position, message)` if the token violated the
/// "a quote, if used, must enclose the entire token" rule (SPEC_FULL.md
/// §4.1). On error the returned index still makes forward progress, so
/// `parse` can keep going and return a best-effort result.
fn read_token(tag: &str, start: usize, stop_at: &[char]) -> (String, usize, Option<(usize, &'static str)>) {
	let bytes = tag.as_bytes();
	let mut i = start;

	// Skip leading unescaped whitespace.
	while i < bytes.len() && bytes[i] == b' ' {
		i += 1;
	}

	if i < bytes.len() && bytes[i] == b'\'' {
		let (mut value, mut end, closed) = read_quoted(tag, i);
		if !closed {
			return (value, end, Some((i, TagError::UNCLOSED_QUOTE)));
		}
		if end < bytes.len() && !stop_at.contains(&(bytes[end] as char)) {
			// Trailing characters glued onto a closing quote, e.g. 'a'b — the
			// quote didn't enclose the whole token. Keep consuming up to the
			// next stop delimiter for a best-effort value.
			let trail_start = end;
			while end < bytes.len() && !stop_at.contains(&(bytes[end] as char)) {
				value.push(bytes[end] as char);
				end += 1;
			}
			return (value, end, Some((trail_start, TagError::MID_TOKEN_QUOTE)));
		}
		return (value, end, None);
	}

	let mut out = String::new();
	while i < bytes.len() {
		let c = bytes[i] as char;
		if c == '\\' && i + 1 < bytes.len() {
			let escaped = bytes[i + 1] as char;
			if matches!(escaped, ',' | '=' | '\'' | ' ') {
				out.push(escaped);
				i += 2;
				continue;
			}
		}
		if c == '\'' {
			// An unescaped quote mid-token: a quote must enclose the entire
			// token, not start partway through it.
			return (out, i + 1, Some((i, TagError::MID_TOKEN_QUOTE)));
		}
		if stop_at.contains(&c) {
			break;
		}
		out.push(c);
		i += 1;
	}
	// Trim trailing unescaped whitespace.
	while out.ends_with(' ') {
		out.pop();
	}
	(out, i, None)
}

/// Returns the unescaped text, the index just past the token, and whether a
/// closing quote was actually found (`false` means the string ran out first).
fn read_quoted(tag: &str, quote_start: usize) -> (String, usize, bool) {
	let bytes = tag.as_bytes();
	let mut i = quote_start + 1;
	let mut out = String::new();
	while i < bytes.len() {
		let c = bytes[i] as char;
		if c == '\\' && i + 1 < bytes.len() {
			let escaped = bytes[i + 1] as char;
			if escaped == '\'' || escaped == '\\' {
				out.push(escaped);
				i += 2;
				continue;
			}
		}
		if c == '\'' {
			i += 1;
			return (out, i, true);
		}
		out.push(c);
		i += 1;
	}
	(out, i, false)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn name_only() {
		let p = parse("ids");
		assert_eq!(p.name.as_deref(), Some("ids"));
		assert!(p.items.is_empty());
	}

	#[test]
	fn name_and_keys() {
		let p = parse("ids,location=query,explode=true");
		assert_eq!(p.name.as_deref(), Some("ids"));
		assert_eq!(p.get("location"), Some("query"));
		assert_eq!(p.get("explode"), Some("true"));
	}

	#[test]
	fn leading_empty_key_item_is_name() {
		let p = parse(",location=query");
		assert!(p.name.is_none());
		assert_eq!(p.get("location"), Some("query"));
	}

	#[test]
	fn quoted_value_with_comma_and_escape() {
		let p = parse(r#"name,k3='quoted, with \' escapes'"#);
		assert_eq!(p.get("k3").unwrap(), "quoted, with ' escapes");
	}

	#[test]
	fn bare_escapes() {
		let p = parse(r#"name,k=a\,b\=c\'d\ e"#);
		assert_eq!(p.get("k").unwrap(), "a,b=c'd e");
	}

	#[test]
	fn duplicate_key_reports_error_but_still_parses() {
		let p = parse("name,k=a,k=b");
		assert_eq!(p.errors.len(), 1);
		assert_eq!(p.errors[0].message, TagError::DUPLICATE_KEY);
		// Best-effort parse still contains both occurrences.
		assert_eq!(p.items.iter().filter(|i| i.key == "k").count(), 2);
	}

	#[test]
	fn mid_token_quote_in_bare_value_is_an_error() {
		let p = parse("name,k=a'b");
		assert_eq!(p.errors.len(), 1);
		assert_eq!(p.errors[0].message, TagError::MID_TOKEN_QUOTE);
	}

	#[test]
	fn trailing_chars_after_closing_quote_is_an_error() {
		let p = parse("name,k='a'b");
		assert_eq!(p.errors.len(), 1);
		assert_eq!(p.errors[0].message, TagError::MID_TOKEN_QUOTE);
		// Best-effort parse still recovers a value.
		assert_eq!(p.get("k"), Some("ab"));
	}

	#[test]
	fn unclosed_quote_is_an_error() {
		let p = parse("name,k='unterminated");
		assert_eq!(p.errors.len(), 1);
		assert_eq!(p.errors[0].message, TagError::UNCLOSED_QUOTE);
	}

	#[test]
	fn bare_key_no_value() {
		let p = parse("name,required");
		assert!(p.has("required"));
		assert_eq!(p.get("required"), None);
	}

	#[test]
	fn round_trip_like_emitter() {
		// A canonical emitter would join name + "key=value" items with commas,
		// quoting values containing a comma. Property 2 in SPEC_FULL.md §8.
		let emitted = "ids,location=query,style=form,explode=true";
		let p = parse(emitted);
		let mut reemit = String::new();
		if let Some(n) = &p.name {
			reemit.push_str(n);
		}
		for item in &p.items {
			reemit.push(',');
			reemit.push_str(&item.key);
			if let Some(v) = &item.value {
				reemit.push('=');
				reemit.push_str(v);
			}
		}
		assert_eq!(reemit, emitted);
	}
}
