//! Keyword-driven assistant replies.

use regex::{Regex, RegexBuilder};

use crate::error::{Error, Result};

const DEFAULT_REPLY: &str = "Thank you for your message! I'm here to help you with any questions about Tata Motors vehicles, test drives, pricing, or offers. How can I assist you today?";

const DEFAULT_RULES: &[(&str, &str)] = &[
    (
        "test drive",
        "I can help you book a test drive! What model are you interested in? We have the latest Tata Safari, Harrier, and Nexon available.",
    ),
    (
        "price",
        "I can provide you with current pricing and offers. Which Tata model are you looking for?",
    ),
    (
        "offer",
        "Great! We have several exciting offers running. Would you like to know about our financing options or cash discounts?",
    ),
    (
        "help",
        "I'm here to help! I can assist with booking test drives, checking prices, viewing offers, or connecting you with our sales team.",
    ),
    (
        "curvv",
        "The Tata Curvv is our latest SUV with cutting-edge design and advanced features. Would you like to know more about its specifications?",
    ),
    (
        "safari",
        "The Tata Safari is our flagship SUV with premium features and unmatched comfort. Shall I show you the available variants?",
    ),
    (
        "harrier",
        "The Tata Harrier offers the perfect blend of style and performance. Would you like to explore its features?",
    ),
    (
        "nexon",
        "The Tata Nexon EV is India's safest electric car with 5-star safety rating. Interested in its range and charging options?",
    ),
    (
        "tiago",
        "The Tata Tiago is our popular hatchback with great fuel efficiency. Would you like to know about its variants?",
    ),
    (
        "altroz",
        "The Tata Altroz is our premium hatchback with 5-star safety rating. Shall I show you its features?",
    ),
];

#[derive(Debug, Clone)]
struct ChatRule {
    pattern: Regex,
    reply: String,
}

/// Ordered reply table. The first rule whose keyword occurs anywhere in the
/// message, ignoring case, answers it.
#[derive(Debug, Clone)]
pub struct ChatRules {
    rules: Vec<ChatRule>,
    default_reply: String,
}

impl ChatRules {
    /// Creates an empty table that always answers with `default_reply`.
    #[must_use]
    pub fn new(default_reply: impl Into<String>) -> Self {
        Self {
            rules: Vec::new(),
            default_reply: default_reply.into(),
        }
    }

    /// Appends a rule matching `keyword` literally.
    #[must_use]
    pub fn with_keyword(mut self, keyword: &str, reply: impl Into<String>) -> Self {
        self.rules.push(ChatRule {
            pattern: literal(keyword),
            reply: reply.into(),
        });
        self
    }

    /// Appends a rule matching a regular expression.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `pattern` is not a valid expression.
    pub fn with_pattern(mut self, pattern: &str, reply: impl Into<String>) -> Result<Self> {
        let pattern = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| Error::Config(format!("chat pattern {pattern:?}: {e}")))?;
        self.rules.push(ChatRule {
            pattern,
            reply: reply.into(),
        });
        Ok(self)
    }

    /// Returns the reply for `message`, or `None` for a blank message.
    #[must_use]
    pub fn reply(&self, message: &str) -> Option<&str> {
        let message = message.trim();
        if message.is_empty() {
            return None;
        }
        let reply = self
            .rules
            .iter()
            .find(|rule| rule.pattern.is_match(message))
            .map_or(self.default_reply.as_str(), |rule| rule.reply.as_str());
        Some(reply)
    }

    /// Number of rules, not counting the default reply.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl Default for ChatRules {
    fn default() -> Self {
        DEFAULT_RULES
            .iter()
            .fold(Self::new(DEFAULT_REPLY), |rules, (keyword, reply)| {
                rules.with_keyword(keyword, *reply)
            })
    }
}

fn literal(keyword: &str) -> Regex {
    RegexBuilder::new(&regex::escape(keyword))
        .case_insensitive(true)
        .build()
        .expect("escaped literal is a valid regex")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keywords_match_case_insensitively() {
        let rules = ChatRules::default();
        assert!(rules.reply("Tell me about the SAFARI").unwrap().contains("flagship"));
        assert!(rules.reply("nexon range?").unwrap().contains("Nexon EV"));
    }

    #[test]
    fn first_match_wins() {
        let rules = ChatRules::default();
        // "price" comes before "harrier" in the table.
        let reply = rules.reply("What is the Harrier price").unwrap();
        assert!(reply.starts_with("I can provide you with current pricing"));

        // "test drive" before "help" and the model names.
        let reply = rules.reply("help me book a test drive of the Tiago").unwrap();
        assert!(reply.starts_with("I can help you book a test drive"));
    }

    #[test]
    fn substring_matches() {
        // "offers" contains "offer".
        let rules = ChatRules::default();
        let reply = rules.reply("any offers?").unwrap();
        assert!(reply.starts_with("Great!"));
    }

    #[test]
    fn unknown_message_gets_default() {
        let rules = ChatRules::default();
        assert_eq!(rules.reply("good morning"), Some(DEFAULT_REPLY));
    }

    #[test]
    fn blank_message_gets_no_reply() {
        let rules = ChatRules::default();
        assert_eq!(rules.reply(""), None);
        assert_eq!(rules.reply("   \t"), None);
    }

    #[test]
    fn default_table_has_every_keyword() {
        assert_eq!(ChatRules::default().len(), DEFAULT_RULES.len());
        assert!(ChatRules::new("x").is_empty());
    }

    #[test]
    fn keyword_is_literal() {
        let rules = ChatRules::new("no").with_keyword("c++", "yes");
        assert_eq!(rules.reply("I like C++"), Some("yes"));
        assert_eq!(rules.reply("I like cc"), Some("no"));
    }

    #[test]
    fn custom_patterns() {
        let rules = ChatRules::new("no")
            .with_pattern(r"\bev\b", "electric")
            .unwrap();
        assert_eq!(rules.reply("Is there an EV?"), Some("electric"));
        assert_eq!(rules.reply("every day"), Some("no"));
        assert!(ChatRules::new("no").with_pattern("(", "x").is_err());
    }
}
