//! Platform-neutral review card model.
//!
//! The chat client decides how a card is drawn; this module decides what it says.

use super::{
    fingerprint::display_prefix,
    types::{Submission, SubmissionId, SubmissionStatus},
};

/// The state shown on a review card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CardState {
    /// Awaiting a decision; the card carries the accept/deny buttons.
    Pending,
    Accepted { by: String },
    Denied { by: String },
}

/// A rendered review card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewCard {
    pub submission_id: SubmissionId,
    pub fingerprint_prefix: String,
    pub text: String,
    pub state: CardState,
}

impl ReviewCard {
    /// A pending card for a freshly created submission.
    pub fn pending(submission: &Submission, prefix_len: usize) -> Self {
        Self {
            submission_id: submission.id,
            fingerprint_prefix: display_prefix(&submission.fingerprint, prefix_len).to_string(),
            text: submission.text.clone(),
            state: CardState::Pending,
        }
    }

    /// The card after `actor_id` moved the submission to `status`.
    ///
    /// A pending status yields a pending card.
    pub fn decided(submission: &Submission, prefix_len: usize, status: SubmissionStatus, actor_id: &str) -> Self {
        let state = match status {
            SubmissionStatus::Pending => CardState::Pending,
            SubmissionStatus::Accepted => CardState::Accepted { by: actor_id.to_string() },
            SubmissionStatus::Denied => CardState::Denied { by: actor_id.to_string() },
        };

        Self { state, ..Self::pending(submission, prefix_len) }
    }

    /// Whether the card should still offer the accept/deny actions.
    pub fn has_actions(&self) -> bool {
        matches!(self.state, CardState::Pending)
    }

    /// The submission text in chat markdown; struck through once denied.
    pub fn body(&self) -> String {
        self.body_sections(usize::MAX).join("\n")
    }

    /// The body split into chunks of at most `limit` characters.
    ///
    /// The text is escaped first, so a submission can never mention anyone.
    /// Lines longer than `limit` are split, and each piece of a denied card is
    /// struck through on its own.
    pub fn body_sections(&self, limit: usize) -> Vec<String> {
        let struck = matches!(self.state, CardState::Denied { .. });
        let piece_limit = if struck { limit.saturating_sub(2).max(1) } else { limit.max(1) };

        let pieces = self.text.lines().flat_map(|line| split_escaped(line, piece_limit)).map(|piece| {
            if struck && !piece.trim().is_empty() { format!("~{piece}~") } else { piece }
        });

        let mut sections: Vec<String> = Vec::new();
        let mut len = 0;

        for piece in pieces {
            let n = piece.chars().count();

            match sections.last_mut() {
                Some(current) if len + 1 + n <= limit => {
                    current.push('\n');
                    current.push_str(&piece);
                    len += 1 + n;
                }
                _ => {
                    sections.push(piece);
                    len = n;
                }
            }
        }

        sections
    }

    /// One-line status footer, mentioning the deciding reviewer.
    pub fn footer(&self) -> String {
        match &self.state {
            CardState::Pending => format!("Submission #{} from `{}` is awaiting review.", self.submission_id, self.fingerprint_prefix),
            CardState::Accepted { by } => format!("Accepted by <@{by}>"),
            CardState::Denied { by } => format!("Denied by <@{by}>"),
        }
    }

    /// Plain-text fallback for notifications.
    pub fn fallback_text(&self) -> String {
        format!("New impression #{} for review", self.submission_id)
    }
}

/// Escapes the characters chat markdown treats as control sequences.
pub fn escape_markup(text: &str) -> String {
    text.chars().map(escape_char).collect()
}

fn escape_char(c: char) -> std::borrow::Cow<'static, str> {
    match c {
        '&' => "&amp;".into(),
        '<' => "&lt;".into(),
        '>' => "&gt;".into(),
        c => c.to_string().into(),
    }
}

/// Escapes `line` and splits it into pieces of at most `limit` characters each.
fn split_escaped(line: &str, limit: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut len = 0;

    for c in line.chars() {
        let escaped = escape_char(c);
        let n = escaped.chars().count();

        if len + n > limit && !current.is_empty() {
            pieces.push(std::mem::take(&mut current));
            len = 0;
        }

        current.push_str(&escaped);
        len += n;
    }

    if !current.is_empty() || pieces.is_empty() {
        pieces.push(current);
    }

    pieces
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::base::{fingerprint::fingerprint, types::MessageRef};

    fn submission(text: &str) -> Submission {
        Submission {
            id: SubmissionId(12),
            fingerprint: fingerprint("pepper", "U1").unwrap(),
            text: text.into(),
            status: SubmissionStatus::Pending,
            created_at: Utc::now(),
            reviewed_at: None,
            review_ref: None,
            origin: MessageRef::new("C1", "1.0"),
            review_channel_id: "CREVIEW".into(),
        }
    }

    #[test]
    fn pending_card_truncates_fingerprint_and_keeps_text() {
        let sub = submission("nice job");
        let card = ReviewCard::pending(&sub, 8);

        assert_eq!(card.fingerprint_prefix, &sub.fingerprint[..8]);
        assert_eq!(card.body(), "nice job");
        assert!(card.has_actions());
        assert!(card.footer().contains("#12"));
    }

    #[test]
    fn accepted_card_names_the_reviewer() {
        let card = ReviewCard::decided(&submission("nice job"), 8, SubmissionStatus::Accepted, "R1");

        assert!(!card.has_actions());
        assert_eq!(card.footer(), "Accepted by <@R1>");
        assert_eq!(card.body(), "nice job");
    }

    #[test]
    fn denied_card_strikes_through_each_line() {
        let card = ReviewCard::decided(&submission("one\n\ntwo"), 8, SubmissionStatus::Denied, "R1");

        assert_eq!(card.footer(), "Denied by <@R1>");
        assert_eq!(card.body(), "~one~\n\n~two~");
    }

    #[test]
    fn mentions_in_the_text_are_escaped() {
        let card = ReviewCard::pending(&submission("hey <!channel> & <@U1>"), 8);

        assert_eq!(card.body(), "hey &lt;!channel&gt; &amp; &lt;@U1&gt;");
        assert_eq!(escape_markup("a<b>c&d"), "a&lt;b&gt;c&amp;d");
    }

    #[test]
    fn denied_text_at_the_length_limit_fits_in_sections() {
        let card = ReviewCard::decided(&submission(&"a".repeat(3000)), 8, SubmissionStatus::Denied, "R1");
        let sections = card.body_sections(3000);

        assert!(sections.len() > 1);
        assert!(sections.iter().all(|s| s.chars().count() <= 3000));
        assert!(sections.iter().all(|s| s.starts_with('~') && s.ends_with('~')));
        assert_eq!(sections.iter().map(|s| s.matches('a').count()).sum::<usize>(), 3000);
    }

    #[test]
    fn escaped_text_is_split_without_breaking_entities() {
        let card = ReviewCard::pending(&submission(&"&".repeat(3000)), 8);
        let sections = card.body_sections(3000);

        assert!(sections.iter().all(|s| s.chars().count() <= 3000));
        assert_eq!(sections.iter().map(|s| s.matches("&amp;").count()).sum::<usize>(), 3000);
        assert_eq!(sections.concat().len(), 3000 * "&amp;".len());
    }

    #[test]
    fn short_lines_share_a_section() {
        let card = ReviewCard::decided(&submission("one\ntwo"), 8, SubmissionStatus::Denied, "R1");

        assert_eq!(card.body_sections(3000), vec!["~one~\n~two~".to_string()]);
    }
}
