//! Content negotiation over `Accept`/`Accept-Language`/`Accept-Charset`/
//! `Accept-Encoding` headers (SPEC_FULL.md §4.4).
//!
//! No teacher file covers this — `agentgateway` proxies opaque bytes and
//! never negotiates a response representation — so this module is grounded
//! on the `mime` crate's type/subtype model (already a dependency, used here
//! purely for its `essence_str`/case-folding conventions rather than as a
//! parser, since `mime::Mime` can't represent a bare wildcard `Accept` entry)
//! and on the RFC 7231 quality-value algorithm described in the spec.
use std::cmp::Ordering;

mod header;

pub use header::{Header, HeaderKind};

#[derive(Debug, Clone, thiserror::Error)]
#[error("no acceptable representation for offerings {offerings:?}")]
pub struct NoAcceptableMatch {
	pub offerings: Vec<String>,
}

/// One server-side offering, in declaration order. `index` is recorded
/// because ties are broken by "the order the server advertised" (SPEC_FULL.md
/// §4.4 step 5), not by offering content.
#[derive(Debug, Clone)]
struct Scored {
	index: usize,
	quality: f32,
}

/// Parses an `Accept`-family header value into `Header`s, ordered as given
/// (their `original_index` is assigned during parsing).
pub fn parse_accept(raw: &str) -> Vec<Header> {
	raw.split(',').enumerate().filter_map(|(i, part)| Header::parse(part.trim(), i)).collect()
}

/// Runs the full algorithm in SPEC_FULL.md §4.4 for media types (`Accept`).
/// `offerings` are the server's supported content types, in preference
/// order; the first element with the winning score is the tie-break winner.
pub fn negotiate_media_type<'a>(accept_raw: &str, offerings: &'a [&str]) -> Result<&'a str, NoAcceptableMatch> {
	let accepted = parse_accept(accept_raw);
	negotiate(&accepted, offerings, score_media_type)
}

/// Same algorithm for `Accept-Language`, whose scoring weights differ (base
/// 10 + sub 1, per §4.4 step 3) from media types (base 100 + sub 10 + suffix
/// 1).
pub fn negotiate_language<'a>(accept_raw: &str, offerings: &'a [&str]) -> Result<&'a str, NoAcceptableMatch> {
	let accepted = parse_accept(accept_raw);
	negotiate(&accepted, offerings, score_language)
}

fn negotiate<'a>(
	accepted: &[Header],
	offerings: &'a [&str],
	scorer: impl Fn(&Header, &Header) -> Option<f32>,
) -> Result<&'a str, NoAcceptableMatch> {
	if offerings.is_empty() || accepted.is_empty() {
		return Err(NoAcceptableMatch { offerings: offerings.iter().map(|s| s.to_string()).collect() });
	}

	let parsed_offerings: Vec<Header> =
		offerings.iter().enumerate().filter_map(|(i, o)| Header::parse(o, i)).collect();

	// `total` (quality blended with specificity) only picks the best accept
	// entry *within* one offering; the cross-offering sort below must tie-
	// break on declaration order for true quality ties (Testable Property #3,
	// SPEC_FULL.md §8), so only the pure `quality` survives into `Scored`.
	let mut best: Vec<Option<(f32, f32)>> = vec![None; offerings.len()];
	for offering in &parsed_offerings {
		for accept in accepted {
			let Some(score) = scorer(accept, offering) else { continue };
			let quality = accept.quality * offering.quality;
			if quality <= 0.0 {
				continue;
			}
			let total = quality + score / 1000.0;
			let slot = &mut best[offering.original_index];
			let better = match slot {
				None => true,
				Some((_, existing_total)) => total > *existing_total,
			};
			if better {
				*slot = Some((quality, total));
			}
		}
	}

	let mut candidates: Vec<Scored> = best
		.into_iter()
		.enumerate()
		.filter_map(|(index, slot)| slot.map(|(quality, _)| Scored { index, quality }))
		.collect();
	candidates.sort_by(|a, b| match b.quality.partial_cmp(&a.quality).unwrap_or(Ordering::Equal) {
		Ordering::Equal => a.index.cmp(&b.index),
		other => other,
	});

	candidates
		.first()
		.map(|c| offerings[c.index])
		.ok_or_else(|| NoAcceptableMatch { offerings: offerings.iter().map(|s| s.to_string()).collect() })
}

/// Media-type specificity score: base-part equality 100, explicit subtype
/// match 10, explicit suffix match 1. Wildcards match but contribute no
/// specificity. Accept-side parameters must all be satisfied by the
/// offering (case-insensitive subset test).
fn score_media_type(accept: &Header, offering: &Header) -> Option<f32> {
	let mut score = 0.0;

	if accept.base_part == "*" {
		// `*/*`: matches anything, no specificity.
	} else if accept.base_part.eq_ignore_ascii_case(&offering.base_part) {
		score += 100.0;
	} else {
		return None;
	}

	match (&accept.sub_part, &offering.sub_part) {
		(Some(a), _) if a == "*" => {},
		(Some(a), Some(o)) if a.eq_ignore_ascii_case(o) => score += 10.0,
		(Some(_), _) => return None,
		(None, _) => {},
	}

	match (&accept.suffix, &offering.suffix) {
		(Some(a), Some(o)) if a.eq_ignore_ascii_case(o) => score += 1.0,
		(Some(_), Some(_)) => {},
		_ => {},
	}

	for (k, v) in &accept.parameters {
		let satisfied = offering.parameters.iter().any(|(ok, ov)| ok.eq_ignore_ascii_case(k) && ov.eq_ignore_ascii_case(v));
		if !satisfied {
			return None;
		}
	}

	Some(score)
}

/// Language specificity: base-equality 10 + sub-equality 1; a wildcard
/// accept (`*`) matches any offering.
fn score_language(accept: &Header, offering: &Header) -> Option<f32> {
	if accept.base_part == "*" {
		return Some(0.0);
	}
	if !accept.base_part.eq_ignore_ascii_case(&offering.base_part) {
		return None;
	}
	let mut score = 10.0;
	match (&accept.sub_part, &offering.sub_part) {
		(Some(a), Some(o)) if a.eq_ignore_ascii_case(o) => score += 1.0,
		(None, None) => {},
		(None, Some(_)) => {},
		_ => return None,
	}
	Some(score)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn json_preferred_over_xml_by_quality() {
		// S4 in SPEC_FULL.md §8.
		let offerings = ["application/json", "application/xml"];
		let got = negotiate_media_type("application/xml;q=0.9, application/json", &offerings).unwrap();
		assert_eq!(got, "application/json");
	}

	#[test]
	fn tie_breaks_on_offering_order() {
		let offerings = ["application/json", "application/vnd.api+json"];
		let got = negotiate_media_type("application/json", &offerings).unwrap();
		assert_eq!(got, "application/json");
	}

	#[test]
	fn equal_quality_ties_on_declaration_order_despite_differing_specificity() {
		// Both offerings match their own accept entry at quality 0.5, but the
		// second scores higher specificity (an extra suffix match). The true
		// quality tie must still resolve to the first-declared offering, not
		// whichever has the higher blended score.
		let offerings = ["application/xml", "application/problem+json"];
		let got = negotiate_media_type("application/xml;q=0.5, application/problem+json;q=0.5", &offerings).unwrap();
		assert_eq!(got, "application/xml");
	}

	#[test]
	fn wildcard_accept_matches_first_offering() {
		let offerings = ["application/json", "application/xml"];
		let got = negotiate_media_type("*/*", &offerings).unwrap();
		assert_eq!(got, "application/json");
	}

	#[test]
	fn suffix_match_scores_higher() {
		let offerings = ["application/problem+json", "application/json"];
		let got = negotiate_media_type("application/problem+json", &offerings).unwrap();
		assert_eq!(got, "application/problem+json");
	}

	#[test]
	fn no_match_is_an_error() {
		let offerings = ["application/json"];
		assert!(negotiate_media_type("text/plain", &offerings).is_err());
	}

	#[test]
	fn empty_offerings_is_an_error() {
		let offerings: [&str; 0] = [];
		assert!(negotiate_media_type("application/json", &offerings).is_err());
	}

	#[test]
	fn language_wildcard_and_subtag() {
		let offerings = ["en-US", "fr"];
		assert_eq!(negotiate_language("en-US,fr;q=0.5", &offerings).unwrap(), "en-US");
		assert_eq!(negotiate_language("*", &offerings).unwrap(), "en-US");
	}

	#[test]
	fn accept_parameter_subset_required() {
		let offerings = ["text/html;level=1"];
		assert!(negotiate_media_type("text/html;level=2", &offerings).is_err());
		assert!(negotiate_media_type("text/html;level=1", &offerings).is_ok());
	}
}
