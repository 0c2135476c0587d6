//! One parsed `Accept*` entry or server offering (SPEC_FULL.md §3 "Header
//! (negotiation)").

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderKind {
	MediaType,
	Language,
}

#[derive(Debug, Clone)]
pub struct Header {
	pub value: String,
	pub normalized_value: String,
	pub kind: HeaderKind,
	pub base_part: String,
	pub sub_part: Option<String>,
	pub suffix: Option<String>,
	pub quality: f32,
	pub parameters: Vec<(String, String)>,
	pub original_index: usize,
}

impl Header {
	/// Parses one `type/sub+suffix;param=value;q=0.8` (or `lang-sub;q=0.8`)
	/// entry. Returns `None` only for a totally empty entry.
	pub fn parse(raw: &str, original_index: usize) -> Option<Header> {
		let raw = raw.trim();
		if raw.is_empty() {
			return None;
		}

		let mut parts = raw.split(';').map(str::trim);
		let essence = parts.next()?;
		let kind = if essence.contains('/') { HeaderKind::MediaType } else { HeaderKind::Language };

		let (base_part, sub_part, suffix) = match kind {
			HeaderKind::MediaType => {
				let (base, sub) = essence.split_once('/').unwrap_or((essence, "*"));
				// "the *last* '+'" per SPEC_FULL.md §4.4.
				let (sub_clean, suffix) = match sub.rfind('+') {
					Some(i) => (&sub[..i], Some(sub[i + 1..].to_ascii_lowercase())),
					None => (sub, None),
				};
				(base.to_ascii_lowercase(), Some(sub_clean.to_ascii_lowercase()), suffix)
			},
			HeaderKind::Language => {
				let (base, sub) = essence.split_once('-').map(|(b, s)| (b, Some(s))).unwrap_or((essence, None));
				(base.to_ascii_lowercase(), sub.map(|s| s.to_ascii_lowercase()), None)
			},
		};

		let mut quality = 1.0f32;
		let mut parameters = Vec::new();
		for param in parts {
			let Some((k, v)) = param.split_once('=') else { continue };
			let k = k.trim();
			let v = v.trim().trim_matches('"');
			if k.eq_ignore_ascii_case("q") {
				quality = v.parse::<f32>().unwrap_or(1.0).clamp(0.0, 1.0);
			} else {
				parameters.push((k.to_ascii_lowercase(), v.to_string()));
			}
		}

		Some(Header {
			value: raw.to_string(),
			normalized_value: essence.to_ascii_lowercase(),
			kind,
			base_part,
			sub_part,
			suffix,
			quality,
			parameters,
			original_index,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_media_type_with_suffix_and_quality() {
		let h = Header::parse("application/vnd.api+json;q=0.8", 0).unwrap();
		assert_eq!(h.base_part, "application");
		assert_eq!(h.sub_part.as_deref(), Some("vnd.api"));
		assert_eq!(h.suffix.as_deref(), Some("json"));
		assert_eq!(h.quality, 0.8);
	}

	#[test]
	fn quality_clamped_to_unit_interval() {
		let h = Header::parse("application/json;q=2.5", 0).unwrap();
		assert_eq!(h.quality, 1.0);
	}

	#[test]
	fn last_plus_wins_for_suffix() {
		let h = Header::parse("application/a+b+json", 0).unwrap();
		assert_eq!(h.sub_part.as_deref(), Some("a+b"));
		assert_eq!(h.suffix.as_deref(), Some("json"));
	}

	#[test]
	fn parses_language_with_subtag() {
		let h = Header::parse("en-US;q=0.9", 0).unwrap();
		assert_eq!(h.base_part, "en");
		assert_eq!(h.sub_part.as_deref(), Some("us"));
	}

	#[test]
	fn wildcard_star_star() {
		let h = Header::parse("*/*", 0).unwrap();
		assert_eq!(h.base_part, "*");
		assert_eq!(h.sub_part.as_deref(), Some("*"));
	}
}
