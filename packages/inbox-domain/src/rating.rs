//! Detection of 1-5 satisfaction ratings in free-text replies.

use std::sync::LazyLock;

use regex::Regex;
use time::{Duration, OffsetDateTime};

/// How long after finalization a reply still counts as a rating.
pub const RATING_WINDOW: Duration = Duration::hours(24);

pub const DEFAULT_RATING_REQUEST: &str =
	"Olá! Como foi seu atendimento? De 1 a 5 estrelas, como você avalia?";

static NUMERAL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b([1-5])\b").expect("valid regex"));
static STAR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[⭐*★]").expect("valid regex"));
static NUMERAL_OR_STARS: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"\b([1-5])\b|[⭐*★]{1,5}").expect("valid regex"));
/// Whole words only: "uma", "algum" and "phone" are not ratings.
static NUMBER_WORD: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"(?i)\b(um|dois|três|quatro|cinco|one|two|three|four|five)\b").expect("valid regex")
});

const NUMBER_WORDS: [(&str, u8); 10] = [
	("um", 1),
	("dois", 2),
	("três", 3),
	("quatro", 4),
	("cinco", 5),
	("one", 1),
	("two", 2),
	("three", 3),
	("four", 4),
	("five", 5),
];

/// Keywords that mark an outbound text as a rating request already sent.
const REQUEST_KEYWORDS: [&str; 3] = ["avali", "estrela", "nota"];

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ParsedRating {
	pub rating: u8,
	pub comment: Option<String>,
}

/// Parses a rating reply.
///
/// A standalone numeral wins, then a run of one to five star glyphs, then a spelled-out number.
/// The comment is whatever follows the numeral or stars.
pub fn parse_rating(text: &str) -> Option<ParsedRating> {
	let trimmed = text.trim();
	let rating = numeral_rating(trimmed)
		.or_else(|| star_rating(trimmed))
		.or_else(|| word_rating(trimmed))?;
	let comment = NUMERAL_OR_STARS
		.find(trimmed)
		.map(|found| trimmed[found.end()..].trim())
		.filter(|rest| !rest.is_empty())
		.map(str::to_string);

	Some(ParsedRating { rating, comment })
}

pub fn within_rating_window(finalized_at: OffsetDateTime, now: OffsetDateTime) -> bool {
	now - finalized_at <= RATING_WINDOW
}

pub fn looks_like_rating_request(text: &str) -> bool {
	let lowered = text.to_lowercase();

	REQUEST_KEYWORDS.iter().any(|keyword| lowered.contains(keyword))
}

fn numeral_rating(text: &str) -> Option<u8> {
	NUMERAL.captures(text).and_then(|captures| captures.get(1)).and_then(|m| m.as_str().parse().ok())
}

fn star_rating(text: &str) -> Option<u8> {
	let count = STAR.find_iter(text).count();

	(1..=5).contains(&count).then_some(count as u8)
}

fn word_rating(text: &str) -> Option<u8> {
	let word = NUMBER_WORD.captures(text)?.get(1)?.as_str().to_lowercase();

	NUMBER_WORDS.iter().find(|(known, _)| *known == word).map(|(_, rating)| *rating)
}
