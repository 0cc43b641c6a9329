//! Author name matching across formatting conventions.
//!
//! Sources disagree on how they write names: PubMed records read
//! "Evan E. Eichler" while preprint servers send "Eichler, E. E.". Both are
//! parsed into a canonical [`PersonName`] (given tokens plus family name) and
//! compared with one rule.

use tracing::warn;
use unicode_normalization::UnicodeNormalization;

/// Generational and degree suffixes that are neither given nor family names.
const NAME_SUFFIXES: &[&str] = &["jr", "sr", "ii", "iii", "iv", "md", "phd"];

/// Raw layout of a name string, detected by the presence of a comma.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NameLayout<'a> {
    /// "Firstname [Middle] Lastname"
    GivenFirst(&'a str),

    /// "Lastname, Firstname [Middle]"
    FamilyFirst { family: &'a str, given: &'a str },
}

impl<'a> NameLayout<'a> {
    fn detect(folded: &'a str) -> Self {
        match folded.split_once(',') {
            Some((family, given)) => NameLayout::FamilyFirst { family, given },
            None => NameLayout::GivenFirst(folded),
        }
    }
}

/// Canonical form of a person's name.
///
/// All tokens are lowercase ASCII-folded, without punctuation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonName {
    given: Vec<String>,
    family: String,
}

impl PersonName {
    /// Parse a raw name in either "Firstname Lastname" or "Lastname, Firstname"
    /// layout.
    ///
    /// Returns `None` when no family name can be recovered (empty input,
    /// punctuation only, or nothing before the comma).
    pub fn parse(raw: &str) -> Option<Self> {
        let folded = fold(raw);

        match NameLayout::detect(&folded) {
            NameLayout::GivenFirst(text) => {
                let mut tokens = tokenize(text);
                while tokens.len() > 1 && tokens.last().is_some_and(|t| is_suffix(t)) {
                    tokens.pop();
                }
                let family = tokens.pop()?;
                let given = tokens.into_iter().filter(|t| !is_suffix(t)).collect();
                Some(Self { given, family })
            }
            NameLayout::FamilyFirst { family, given } => {
                let family = tokenize(family).join(" ");
                if family.is_empty() {
                    return None;
                }
                let given = tokenize(given).into_iter().filter(|t| !is_suffix(t)).collect();
                Some(Self { given, family })
            }
        }
    }

    pub fn given(&self) -> &[String] {
        &self.given
    }

    pub fn family(&self) -> &str {
        &self.family
    }

    /// Whether `self` (a name seen on a paper) denotes the `tracked` person.
    ///
    /// Family names must be equal. Every tracked given token must be satisfied
    /// by some given token of `self`, either identically or as an initial of
    /// it (in either direction). Extra given tokens on `self` are ignored, and
    /// a tracked name without given tokens matches on family name alone.
    pub fn matches(&self, tracked: &PersonName) -> bool {
        if self.family != tracked.family {
            return false;
        }

        tracked.given.iter().all(|wanted| {
            self.given
                .iter()
                .any(|candidate| given_token_matches(wanted, candidate))
        })
    }
}

/// Decide whether a raw author string names the tracked person.
///
/// Unparseable input on either side never matches.
pub fn names_match(raw_name: &str, tracked_name: &str) -> bool {
    match (PersonName::parse(raw_name), PersonName::parse(tracked_name)) {
        (Some(raw), Some(tracked)) => raw.matches(&tracked),
        _ => false,
    }
}

/// Tracked-author list with names parsed once up front.
#[derive(Debug, Clone, Default)]
pub struct NameMatcher {
    tracked: Vec<(String, PersonName)>,
}

impl NameMatcher {
    /// Parse the tracked author names, skipping (with a warning) any that
    /// cannot be parsed.
    pub fn new<S: AsRef<str>>(tracked_authors: &[S]) -> Self {
        let tracked = tracked_authors
            .iter()
            .filter_map(|name| {
                let name = name.as_ref();
                match PersonName::parse(name) {
                    Some(parsed) => Some((name.to_string(), parsed)),
                    None => {
                        warn!("Ignoring unparseable tracked author '{}'", name);
                        None
                    }
                }
            })
            .collect();
        Self { tracked }
    }

    pub fn is_empty(&self) -> bool {
        self.tracked.is_empty()
    }

    /// Tracked authors (as configured) that appear among `raw_authors`.
    ///
    /// The result follows configured order and lists each tracked author once;
    /// the order of `raw_authors` does not matter.
    pub fn matched_authors<S: AsRef<str>>(&self, raw_authors: &[S]) -> Vec<String> {
        if self.tracked.is_empty() {
            return Vec::new();
        }

        let parsed: Vec<PersonName> = raw_authors
            .iter()
            .filter_map(|raw| PersonName::parse(raw.as_ref()))
            .collect();

        self.tracked
            .iter()
            .filter(|(_, tracked)| parsed.iter().any(|candidate| candidate.matches(tracked)))
            .map(|(name, _)| name.clone())
            .collect()
    }
}

fn given_token_matches(wanted: &str, candidate: &str) -> bool {
    if wanted == candidate {
        return true;
    }
    let is_initial = |t: &str| t.chars().count() == 1;
    (is_initial(wanted) || is_initial(candidate)) && wanted.chars().next() == candidate.chars().next()
}

/// Lowercase and strip diacritics ("Müller" -> "muller").
///
/// Typographic apostrophes become `'`, so "O’Brien" and "O'Brien" agree.
fn fold(raw: &str) -> String {
    raw.chars()
        .map(|c| match c {
            '\u{2019}' | '\u{2018}' | '\u{02BC}' => '\'',
            c => c,
        })
        .nfd()
        .filter(|c| !unicode_normalization::char::is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase()
}

/// Split on anything that is not a letter, digit, hyphen or apostrophe.
///
/// Periods are separators, so "g.a." becomes `["g", "a"]`.
fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '-' || c == '\''))
        .map(|t| t.trim_matches(|c| c == '-' || c == '\''))
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn is_suffix(token: &str) -> bool {
    NAME_SUFFIXES.contains(&token)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parsed(raw: &str) -> (Vec<String>, String) {
        let name = PersonName::parse(raw).unwrap();
        (name.given().to_vec(), name.family().to_string())
    }

    #[test]
    fn test_parse_given_first() {
        assert_eq!(parsed("Glennis A. Logsdon"), (vec!["glennis".into(), "a".into()], "logsdon".into()));
        assert_eq!(parsed("  Evan   Eichler "), (vec!["evan".into()], "eichler".into()));
    }

    #[test]
    fn test_parse_family_first() {
        assert_eq!(parsed("Eichler, Evan E."), (vec!["evan".into(), "e".into()], "eichler".into()));
        assert_eq!(parsed("Logsdon, G.A."), (vec!["g".into(), "a".into()], "logsdon".into()));
        assert_eq!(parsed("van der Berg, Jan"), (vec!["jan".into()], "van der berg".into()));
    }

    #[test]
    fn test_parse_ignores_suffixes() {
        assert_eq!(parsed("John B. Smith Jr."), (vec!["john".into(), "b".into()], "smith".into()));
        assert_eq!(parsed("Smith, John, Jr."), (vec!["john".into()], "smith".into()));
        assert_eq!(parsed("Jane Doe PhD"), (vec!["jane".into()], "doe".into()));
    }

    #[test]
    fn test_parse_folds_diacritics() {
        assert_eq!(parsed("José García"), (vec!["jose".into()], "garcia".into()));
        assert!(names_match("Müller, H.", "Hans Muller"));
    }

    #[test]
    fn test_typographic_apostrophe_stays_in_family_name() {
        assert_eq!(parsed("O’Brien, S."), (vec!["s".into()], "o'brien".into()));
        assert!(names_match("O’Brien, S.", "Sean O'Brien"));
        assert!(names_match("Sean O'Brien", "Sean O’Brien"));
        assert!(!names_match("S. Brien", "Sean O’Brien"));
    }

    #[test]
    fn test_parse_unparseable() {
        assert!(PersonName::parse("").is_none());
        assert!(PersonName::parse("  .,  ").is_none());
        assert!(PersonName::parse(", Evan").is_none());
    }

    #[test]
    fn test_initial_matches_full_name() {
        assert!(names_match("E. Eichler", "Evan Eichler"));
        assert!(names_match("Evan Eichler", "E Eichler"));
        assert!(names_match("Eichler, E. E.", "Evan Eichler"));
    }

    #[test]
    fn test_family_name_must_match_exactly() {
        assert!(!names_match("Evan Eichle", "Evan Eichler"));
        assert!(!names_match("Evan Eichler", "Evan Eichlerr"));
    }

    #[test]
    fn test_given_names_must_agree() {
        assert!(!names_match("Eric Eichler", "Evan Eichler"));
        assert!(!names_match("J. Eichler", "Evan Eichler"));
        // Two different full names never match through a shared first letter
        assert!(!names_match("Evans Eichler", "Evan Eichler"));
    }

    #[test]
    fn test_every_tracked_given_token_needs_a_counterpart() {
        assert!(names_match("Evan J. Eichler", "Evan J Eichler"));
        assert!(!names_match("Evan Eichler", "Evan J Eichler"));
        // Extra raw tokens are ignored
        assert!(names_match("Evan J. Eichler", "Evan Eichler"));
    }

    #[test]
    fn test_one_raw_given_token_can_cover_several_tracked_tokens() {
        // "evan" satisfies both "evan" and the initial "e"
        assert!(names_match("Evan X. Eichler", "Evan E. Eichler"));
        assert!(names_match("Evan Eichler", "Evan E. Eichler"));
        assert!(!names_match("Xavier Eichler", "Evan E. Eichler"));
    }

    #[test]
    fn test_given_token_order_is_irrelevant() {
        let tracked = ["Evan Eichler", "Evan J Eichler", "J Evan Eichler", "Evan Q Eichler"];
        let a: Vec<bool> = tracked.iter().map(|t| names_match("Eichler, Evan J", t)).collect();
        let b: Vec<bool> = tracked.iter().map(|t| names_match("Evan J. Eichler", t)).collect();
        assert_eq!(a, b);
        assert_eq!(a, vec![true, true, true, false]);
    }

    #[test]
    fn test_family_only_tracked_name() {
        assert!(names_match("Evan E. Eichler", "Eichler"));
        assert!(names_match("Eichler, E.", "Eichler"));
        assert!(!names_match("Evan Logsdon", "Eichler"));
    }

    #[test]
    fn test_raw_without_given_tokens_needs_family_only_tracked() {
        assert!(!names_match("Eichler", "Evan Eichler"));
        assert!(names_match("Eichler", "Eichler"));
    }

    #[test]
    fn test_unparseable_never_matches() {
        assert!(!names_match("", "Evan Eichler"));
        assert!(!names_match("Evan Eichler", ""));
        assert!(!names_match("---", "Evan Eichler"));
    }

    #[test]
    fn test_name_matcher_collects_in_configured_order() {
        let matcher = NameMatcher::new(&["Glennis Logsdon", "Evan Eichler", "Karen Miga"]);
        let authors = vec!["Eichler, E. E.", "Someone Else", "G. A. Logsdon"];

        assert_eq!(
            matcher.matched_authors(&authors),
            vec!["Glennis Logsdon".to_string(), "Evan Eichler".to_string()]
        );
    }

    #[test]
    fn test_name_matcher_is_order_independent_over_authors() {
        let matcher = NameMatcher::new(&["Evan Eichler", "Glennis Logsdon"]);
        let forward = vec!["Glennis Logsdon", "Evan Eichler"];
        let reverse = vec!["Evan Eichler", "Glennis Logsdon"];

        assert_eq!(matcher.matched_authors(&forward), matcher.matched_authors(&reverse));
    }

    #[test]
    fn test_name_matcher_lists_each_tracked_author_once() {
        let matcher = NameMatcher::new(&["Evan Eichler"]);
        let authors = vec!["Evan Eichler", "E. Eichler"];
        assert_eq!(matcher.matched_authors(&authors), vec!["Evan Eichler".to_string()]);
    }

    #[test]
    fn test_name_matcher_skips_unparseable_tracked_names() {
        let matcher = NameMatcher::new(&["", "Evan Eichler"]);
        assert!(!matcher.is_empty());
        let empty = NameMatcher::new::<&str>(&[]);
        assert!(empty.is_empty());
        assert!(empty.matched_authors(&["Evan Eichler"]).is_empty());
    }
}
