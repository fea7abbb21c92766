/// Transcript state for streaming recognition: the append-only confirmed
/// text plus the still-revisable pending tail.
///
/// The local-agreement rule lives here: a word only becomes confirmed once
/// two consecutive recognition passes agree on it. This module is pure
/// string/word bookkeeping so it can be tested without any recognizer.

/// One word of a recognition hypothesis, with the audio span (in samples
/// relative to the submitted window) it was transcribed from.
#[derive(Debug, Clone, PartialEq)]
pub struct HypothesisWord {
    pub text: String,
    pub start_sample: usize,
    pub end_sample: usize,
}

/// One full pass result from the recognition capability.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Hypothesis {
    pub words: Vec<HypothesisWord>,
}

impl Hypothesis {
    pub fn from_words<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = (S, usize, usize)>,
        S: Into<String>,
    {
        Hypothesis {
            words: words
                .into_iter()
                .map(|(text, start_sample, end_sample)| HypothesisWord {
                    text: text.into(),
                    start_sample,
                    end_sample,
                })
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn text(&self) -> String {
        self.words
            .iter()
            .map(|w| w.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Number of leading words on which two consecutive hypotheses agree.
///
/// Comparison is word-by-word on the text only; offsets are allowed to
/// shift between passes (the recognizer re-times words as context grows).
pub fn agreement_prefix(prev: &Hypothesis, next: &Hypothesis) -> usize {
    prev.words
        .iter()
        .zip(next.words.iter())
        .take_while(|(a, b)| a.text == b.text)
        .count()
}

/// Finalized transcript segments. Append-only within a session: segments
/// are never edited or removed once pushed, only extended.
#[derive(Debug, Default)]
pub struct ConfirmedTranscript {
    segments: Vec<String>,
}

impl ConfirmedTranscript {
    pub fn new() -> Self {
        ConfirmedTranscript::default()
    }

    pub fn append(&mut self, segment: String) {
        if !segment.is_empty() {
            self.segments.push(segment);
        }
    }

    pub fn text(&self) -> String {
        self.segments.join(" ")
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }
}

/// The suffix of the latest hypothesis not yet confirmed. Replaced
/// wholesale on every pass; promotion moves its leading words into the
/// confirmed transcript.
#[derive(Debug, Default)]
pub struct PendingTail {
    hypothesis: Hypothesis,
}

/// Outcome of applying one new hypothesis under local agreement.
#[derive(Debug, PartialEq)]
pub struct Promotion {
    /// Words promoted to confirmed this pass (joined text), empty if none.
    pub confirmed: String,
    /// Audio offset (samples, relative to the submitted window) up to which
    /// audio is now confirmed: the end of the last promoted word. The
    /// coordinator advances its window here; audio past it stays
    /// unconfirmed even when every word was promoted.
    pub confirmed_end_sample: Option<usize>,
}

impl PendingTail {
    pub fn new() -> Self {
        PendingTail::default()
    }

    pub fn text(&self) -> String {
        self.hypothesis.text()
    }

    pub fn is_empty(&self) -> bool {
        self.hypothesis.is_empty()
    }

    /// Apply a new pass result. Words in the agreement prefix between the
    /// previous and new hypothesis, minus `margin_words` at the end, are
    /// promoted; everything else becomes the new pending tail.
    ///
    /// No common prefix is not an error: the recognizer revised everything,
    /// the tail is replaced and nothing is promoted this pass.
    pub fn apply(&mut self, next: Hypothesis, margin_words: usize) -> Promotion {
        let agreed = agreement_prefix(&self.hypothesis, &next);
        let promote = agreed.saturating_sub(margin_words);

        self.promote_first(next, promote)
    }

    /// Final pass at session end: promote the entire hypothesis with no
    /// safety margin, leaving the tail empty.
    pub fn finalize(&mut self, last: Hypothesis) -> Promotion {
        let count = last.words.len();
        self.promote_first(last, count)
    }

    fn promote_first(&mut self, next: Hypothesis, count: usize) -> Promotion {
        let confirmed: Vec<&str> = next.words[..count].iter().map(|w| w.text.as_str()).collect();
        let confirmed = confirmed.join(" ");

        // Confirmed audio extends only to the end of the last promoted
        // word. Trailing window audio past that span has not been heard
        // twice and must be resubmitted on the next pass.
        let confirmed_end_sample = if count == 0 {
            None
        } else {
            Some(next.words[count - 1].end_sample)
        };

        let remaining = Hypothesis {
            words: next.words[count..].to_vec(),
        };
        self.hypothesis = remaining;

        Promotion {
            confirmed,
            confirmed_end_sample,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hyp(words: &[&str]) -> Hypothesis {
        Hypothesis::from_words(
            words
                .iter()
                .enumerate()
                .map(|(i, w)| (*w, i * 1000, (i + 1) * 1000)),
        )
    }

    #[test]
    fn test_agreement_prefix_growing_hypothesis() {
        let prev = hyp(&["the", "quick", "brown"]);
        let next = hyp(&["the", "quick", "brown", "fox"]);
        assert_eq!(agreement_prefix(&prev, &next), 3);
    }

    #[test]
    fn test_agreement_prefix_revision() {
        let prev = hyp(&["the", "quick", "crown"]);
        let next = hyp(&["the", "quick", "brown", "fox"]);
        assert_eq!(agreement_prefix(&prev, &next), 2);
    }

    #[test]
    fn test_agreement_prefix_total_revision() {
        let prev = hyp(&["hello", "world"]);
        let next = hyp(&["goodbye", "moon"]);
        assert_eq!(agreement_prefix(&prev, &next), 0);
    }

    #[test]
    fn test_agreement_prefix_ignores_offsets() {
        let prev = Hypothesis::from_words([("the", 0, 800), ("quick", 900, 1700)]);
        let next = Hypothesis::from_words([("the", 100, 900), ("quick", 1100, 1900)]);
        assert_eq!(agreement_prefix(&prev, &next), 2);
    }

    #[test]
    fn test_first_pass_promotes_nothing() {
        // The previous hypothesis is empty, so nothing has been seen twice.
        let mut tail = PendingTail::new();
        let promotion = tail.apply(hyp(&["the", "quick"]), 0);
        assert_eq!(promotion.confirmed, "");
        assert_eq!(tail.text(), "the quick");
    }

    #[test]
    fn test_local_agreement_promotes_agreed_prefix() {
        let mut tail = PendingTail::new();
        tail.apply(hyp(&["the", "quick", "brown"]), 0);

        let promotion = tail.apply(hyp(&["the", "quick", "brown", "fox"]), 0);
        assert_eq!(promotion.confirmed, "the quick brown");
        assert_eq!(tail.text(), "fox");
    }

    #[test]
    fn test_safety_margin_holds_back_trailing_words() {
        let mut tail = PendingTail::new();
        tail.apply(hyp(&["the", "quick", "brown"]), 2);

        let promotion = tail.apply(hyp(&["the", "quick", "brown", "fox"]), 2);
        // Agreement is 3 words, margin 2 holds back "quick brown".
        assert_eq!(promotion.confirmed, "the");
        assert_eq!(tail.text(), "quick brown fox");
    }

    #[test]
    fn test_total_revision_replaces_tail_without_promoting() {
        let mut tail = PendingTail::new();
        tail.apply(hyp(&["hello", "world"]), 0);

        let promotion = tail.apply(hyp(&["goodbye", "moon"]), 0);
        assert_eq!(promotion.confirmed, "");
        assert_eq!(promotion.confirmed_end_sample, None);
        assert_eq!(tail.text(), "goodbye moon");
    }

    #[test]
    fn test_promotion_reports_audio_boundary() {
        let mut tail = PendingTail::new();
        tail.apply(
            Hypothesis::from_words([("the", 0, 3000), ("quick", 4000, 8000), ("brown", 9000, 13000)]),
            0,
        );

        let promotion = tail.apply(
            Hypothesis::from_words([
                ("the", 0, 3000),
                ("quick", 4000, 8000),
                ("brown", 9000, 13000),
                ("fox", 14000, 16000),
            ]),
            0,
        );
        // Confirmed through "brown"; audio is confirmed up to where
        // "brown" ends, not where "fox" starts.
        assert_eq!(promotion.confirmed_end_sample, Some(13000));
    }

    #[test]
    fn test_full_promotion_stops_at_last_word_end() {
        let mut tail = PendingTail::new();
        tail.apply(Hypothesis::from_words([("the", 0, 1000), ("quick", 1000, 2000)]), 0);

        // Every word promoted; the boundary is still the last word's end,
        // never "everything submitted".
        let promotion = tail.apply(
            Hypothesis::from_words([("the", 0, 1000), ("quick", 1000, 2000)]),
            0,
        );
        assert_eq!(promotion.confirmed, "the quick");
        assert_eq!(promotion.confirmed_end_sample, Some(2000));
        assert!(tail.is_empty());
    }

    #[test]
    fn test_finalize_promotes_everything_without_margin() {
        let mut tail = PendingTail::new();
        tail.apply(hyp(&["the", "quick"]), 2);

        let promotion = tail.finalize(hyp(&["the", "quick", "brown", "fox"]));
        assert_eq!(promotion.confirmed, "the quick brown fox");
        assert!(tail.is_empty());
    }

    #[test]
    fn test_confirmed_transcript_is_append_only() {
        let mut transcript = ConfirmedTranscript::new();
        transcript.append("the quick".to_string());
        let before = transcript.text();

        transcript.append("brown fox".to_string());
        assert!(transcript.text().starts_with(&before));
        assert_eq!(transcript.text(), "the quick brown fox");
    }

    #[test]
    fn test_confirmed_transcript_skips_empty_segments() {
        let mut transcript = ConfirmedTranscript::new();
        transcript.append(String::new());
        assert!(transcript.is_empty());
        assert_eq!(transcript.segment_count(), 0);
    }
}
