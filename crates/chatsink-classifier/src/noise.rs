//! Structural noise: UI chrome the capture scripts pick up as if it were
//! message content.

use std::fmt;

use chatsink_model::Event;
use regex::Regex;

const MIN_CONTENT_CHARS: usize = 3;
const SIDEBAR_TITLE_MAX_WORDS: usize = 6;
const TEST_MARKER_PREFIX: &str = "testmessage";

/// Case-sensitive fragments of CSS declarations.
const CSS_MARKERS: &[&str] = &[
    "@keyframes",
    "position: fixed",
    "z-index:",
    "rgba(",
    "transform:",
    "animation:",
    "box-shadow:",
    "border-radius:",
    "opacity:",
    "background:",
    ".intercom-",
    "px;",
    "rem;",
    "vh;",
    "vw;",
    "%;",
];

const GREETINGS: &[&str] = &[
    "hi, i'm claude",
    "hello, i'm claude",
    "i'm claude",
    "how can i help you today",
    "what can i help you with today",
    "how may i assist you today",
    "hi there! how can i help",
];

const UI_CHROME_EXACT: &[&str] = &[
    "all chats",
    "new chat",
    "retry",
    "share",
    "delete",
    "claude can make mistakes",
    "please double-check responses",
    "pending context request",
    "artifacts",
    "projects",
    "claude code",
    "starred",
    "chats projects artifacts",
    "recents",
    "test message confirmation share",
    "test message confirmation",
    "confirmation",
    "message confirmation",
];

const UI_CHROME_FRAGMENTS: &[&str] = &[
    "chats projects artifacts",
    "claude can make mistakes",
    "retry",
    "confirmation share",
    "message confirmation",
];

/// Sidebar conversation titles that keep reappearing as captures.
const CHAT_TITLE_FRAGMENTS: &[&str] = &["research sonnet 4", "j james", "j test"];

const CHAT_LISTING_URL_MARKERS: &[&str] = &["claude.ai/chat/"];

const TOPIC_LABELS: &[&str] = &[
    "research", "sonnet", "writing", "method", "analysis", "review", "request",
];

/// Content ending in a standalone button caption.
const TRAILING_BUTTON_PATTERNS: &[&str] = &[
    r"(?s)^.*\s+retry$",
    r"(?s)^.*\s+share$",
    r"(?s)^test\s+message\s+confirmation",
];

/// Why content was judged to be UI chrome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoiseKind {
    TooShort,
    Css,
    Greeting,
    UiChrome,
    ChatTitle,
    SidebarTitle,
    TopicLabel,
    TrailingButton,
}

impl fmt::Display for NoiseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::TooShort => "too_short",
            Self::Css => "css",
            Self::Greeting => "greeting",
            Self::UiChrome => "ui_chrome",
            Self::ChatTitle => "chat_title",
            Self::SidebarTitle => "sidebar_title",
            Self::TopicLabel => "topic_label",
            Self::TrailingButton => "trailing_button",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone)]
pub struct NoiseFilter {
    okay_reply: Regex,
    trailing_buttons: Vec<Regex>,
}

impl NoiseFilter {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            okay_reply: Regex::new(r"^okay\d+$")?,
            trailing_buttons: TRAILING_BUTTON_PATTERNS
                .iter()
                .map(|pattern| Regex::new(pattern))
                .collect::<Result<_, _>>()?,
        })
    }

    /// Returns the first structural-noise rule the event trips, if any.
    pub fn check(&self, event: &Event) -> Option<NoiseKind> {
        let content = event.content.as_str();
        let lower = content.trim().to_lowercase();

        // Test-harness replies are always genuine content.
        if self.okay_reply.is_match(&lower) || lower.starts_with(TEST_MARKER_PREFIX) {
            return None;
        }

        if event.char_len() < MIN_CONTENT_CHARS {
            return Some(NoiseKind::TooShort);
        }

        if CSS_MARKERS.iter().any(|marker| content.contains(marker)) {
            return Some(NoiseKind::Css);
        }

        if GREETINGS.iter().any(|greeting| lower.contains(greeting))
            && !event
                .urls
                .iter()
                .any(|url| url.to_lowercase().contains("sonnet"))
        {
            return Some(NoiseKind::Greeting);
        }

        if UI_CHROME_EXACT.contains(&lower.as_str())
            || UI_CHROME_FRAGMENTS.iter().any(|fragment| lower.contains(fragment))
        {
            return Some(NoiseKind::UiChrome);
        }

        let words = content.split_whitespace().count();
        let has_listing_url = event
            .urls
            .iter()
            .any(|url| CHAT_LISTING_URL_MARKERS.iter().any(|marker| url.contains(marker)));
        if has_listing_url && words <= SIDEBAR_TITLE_MAX_WORDS {
            return Some(NoiseKind::SidebarTitle);
        }

        if words == 1 && TOPIC_LABELS.contains(&lower.as_str()) {
            return Some(NoiseKind::TopicLabel);
        }

        if CHAT_TITLE_FRAGMENTS.iter().any(|fragment| lower.contains(fragment)) {
            return Some(NoiseKind::ChatTitle);
        }

        if self.trailing_buttons.iter().any(|pattern| pattern.is_match(&lower)) {
            return Some(NoiseKind::TrailingButton);
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use chatsink_model::{Event, Role};

    use super::*;

    fn check(content: &str) -> Option<NoiseKind> {
        let filter = NoiseFilter::new().unwrap();
        filter.check(&Event::new("claude", Role::Assistant, content))
    }

    fn check_with_urls(content: &str, urls: &[&str]) -> Option<NoiseKind> {
        let filter = NoiseFilter::new().unwrap();
        let event = Event::new("claude", Role::Assistant, content)
            .with_urls(urls.iter().map(|url| (*url).to_owned()).collect());
        filter.check(&event)
    }

    #[test]
    fn short_content_is_noise() {
        assert_eq!(check(""), Some(NoiseKind::TooShort));
        assert_eq!(check("ok"), Some(NoiseKind::TooShort));
        assert_eq!(check("yes"), None);
    }

    #[test]
    fn css_fragments_are_noise() {
        assert_eq!(check("@keyframes spin { from {} }"), Some(NoiseKind::Css));
        assert_eq!(check(".intercom-launcher { z-index: 9 }"), Some(NoiseKind::Css));
        assert_eq!(check("margin: 4px; padding: 2rem;"), Some(NoiseKind::Css));
    }

    #[test]
    fn ui_chrome_matches_exactly_or_by_fragment() {
        assert_eq!(check("All Chats"), Some(NoiseKind::UiChrome));
        assert_eq!(check("  New chat "), Some(NoiseKind::UiChrome));
        assert_eq!(
            check("Claude can make mistakes. Please double-check responses."),
            Some(NoiseKind::UiChrome)
        );
        assert_eq!(check("Chats Projects Artifacts Starred"), Some(NoiseKind::UiChrome));
    }

    #[test]
    fn greetings_are_noise_unless_sonnet_url_present() {
        assert_eq!(check("Hi there! How can I help you today?"), Some(NoiseKind::Greeting));
        assert_eq!(
            check_with_urls(
                "Hello, I'm Claude. How can I help you today?",
                &["https://claude.ai/new?model=sonnet-4"]
            ),
            None
        );
    }

    #[test]
    fn short_text_next_to_chat_link_is_a_sidebar_title() {
        assert_eq!(
            check_with_urls("Rust borrow checker question", &["https://claude.ai/chat/abc-123"]),
            Some(NoiseKind::SidebarTitle)
        );
        assert_eq!(
            check_with_urls(
                "Here is a much longer answer that mentions a link to an earlier chat",
                &["https://claude.ai/chat/abc-123"]
            ),
            None
        );
    }

    #[test]
    fn single_topic_label_is_noise() {
        assert_eq!(check("Research"), Some(NoiseKind::TopicLabel));
        assert_eq!(check("Research this topic"), None);
    }

    #[test]
    fn recurring_chat_titles_are_noise() {
        assert_eq!(check("Research Sonnet 4 capabilities"), Some(NoiseKind::ChatTitle));
        assert_eq!(check("J James"), Some(NoiseKind::ChatTitle));
    }

    #[test]
    fn trailing_button_words_are_noise() {
        assert_eq!(check("Here is the summary Share"), Some(NoiseKind::TrailingButton));
        assert_eq!(
            check("test   message   confirmation pending"),
            Some(NoiseKind::TrailingButton)
        );
    }

    #[test]
    fn test_marker_and_okay_replies_are_never_noise() {
        assert_eq!(check("okay27"), None);
        assert_eq!(check("OKAY3"), None);
        assert_eq!(check("testmessage42 Share"), None);
        assert_eq!(check("testmessage retry"), None);
    }

    #[test]
    fn ordinary_dialogue_is_not_noise() {
        assert_eq!(check("The answer is 42."), None);
        assert_eq!(check("Jtestmessage42"), None);
        assert_eq!(check("Can you explain how lifetimes work?"), None);
    }
}
