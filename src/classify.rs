/// Phrases that indicate the client accepted the post as-is.
const APPROVAL_VOCAB: &[&str] = &[
    "yes",
    "approved",
    "approve",
    "love it",
    "love this",
    "great",
    "perfect",
    "excellent",
    "amazing",
    "fantastic",
    "wonderful",
    "outstanding",
    "publish",
    "post it",
    "go ahead",
    "sounds good",
    "looks good",
    "good to go",
    "ready to post",
    "that works",
];

/// Phrases that ask for a fresh attempt without giving a concrete steer.
const REGENERATE_VOCAB: &[&str] = &[
    "regenerate",
    "rewrite",
    "redo",
    "try again",
    "start over",
    "no",
];

/// What a piece of client feedback asks the pipeline to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Approve,
    Regenerate,
    /// Non-empty feedback that is neither approval nor a bare regenerate
    /// request. The text itself becomes the revision instructions.
    Reject,
    /// Absent or empty feedback — wait for something clearer.
    Unclear,
}

/// Classify raw feedback text. Pure and total: deterministic, no side
/// effects, never fails on any input.
pub fn classify(feedback: Option<&str>) -> Classification {
    let Some(text) = feedback else {
        return Classification::Unclear;
    };
    let text = text.trim();
    if text.is_empty() {
        return Classification::Unclear;
    }
    let lower = text.to_lowercase();

    // Purely numeric feedback is a rating: "8" or "8/10". Seven and up
    // counts as approval, anything lower as a regenerate request.
    if let Some(rating) = parse_rating(&lower) {
        return if rating >= 7 {
            Classification::Approve
        } else {
            Classification::Regenerate
        };
    }

    if APPROVAL_VOCAB.iter().any(|p| contains_phrase(&lower, p)) {
        return Classification::Approve;
    }
    if REGENERATE_VOCAB.iter().any(|p| contains_phrase(&lower, p)) {
        return Classification::Regenerate;
    }

    Classification::Reject
}

/// Parse feedback that consists only of a 1-10 rating, optionally "/10".
fn parse_rating(text: &str) -> Option<u8> {
    let t = text.trim();
    let t = t.strip_suffix("/10").unwrap_or(t).trim();
    t.parse::<u8>().ok().filter(|n| (1..=10).contains(n))
}

/// Substring match with word boundaries, so "no" matches "No, too long"
/// but not "know" or "notable".
fn contains_phrase(text: &str, phrase: &str) -> bool {
    let mut from = 0;
    while let Some(pos) = text[from..].find(phrase) {
        let start = from + pos;
        let end = start + phrase.len();
        let boundary_before = text[..start]
            .chars()
            .next_back()
            .map_or(true, |c| !c.is_alphanumeric());
        let boundary_after = text[end..]
            .chars()
            .next()
            .map_or(true, |c| !c.is_alphanumeric());
        if boundary_before && boundary_after {
            return true;
        }
        from = end;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_approval_vocab_case_insensitive() {
        for fb in ["Yes", "APPROVED", "Love it", "great", "Perfect!"] {
            assert_eq!(classify(Some(fb)), Classification::Approve, "{}", fb);
        }
    }

    #[test]
    fn test_regenerate_vocab() {
        for fb in ["regenerate", "Rewrite this", "try again", "No"] {
            assert_eq!(classify(Some(fb)), Classification::Regenerate, "{}", fb);
        }
    }

    #[test]
    fn test_empty_and_absent_are_unclear() {
        assert_eq!(classify(None), Classification::Unclear);
        assert_eq!(classify(Some("")), Classification::Unclear);
        assert_eq!(classify(Some("   \n")), Classification::Unclear);
    }

    #[test]
    fn test_other_text_is_reject() {
        assert_eq!(
            classify(Some("make the hook stronger")),
            Classification::Reject
        );
        assert_eq!(
            classify(Some("too formal, loosen up the second paragraph")),
            Classification::Reject
        );
    }

    #[test]
    fn test_word_boundaries() {
        // "no" inside "know"/"notable" must not trigger a regenerate
        assert_eq!(
            classify(Some("I know my audience better, mention that")),
            Classification::Reject
        );
        assert_eq!(classify(Some("No, make it more personal")), Classification::Regenerate);
    }

    #[test]
    fn test_numeric_ratings() {
        assert_eq!(classify(Some("8")), Classification::Approve);
        assert_eq!(classify(Some("9/10")), Classification::Approve);
        assert_eq!(classify(Some("4/10")), Classification::Regenerate);
        // Numbers embedded in prose are not ratings
        assert_eq!(
            classify(Some("cut it down to 3 paragraphs")),
            Classification::Reject
        );
    }
}
