use super::rate_limiter::RateLimiter;
use crate::protocol::Command;
use tokio::time::Duration;
use tracing::{debug, warn};

/// Phrases offered when the configuration names none
pub const DEFAULT_PHRASES: &[&str] = &[
    "exterminate",
    "gun",
    "exterminate-exterminate-exterminate",
    "doctor",
    "the-doctor",
    "it-is-the-doctor",
    "the-doctor-must-die",
    "identify-yourself",
    "report",
    "explain",
    "cease-talking",
    "social-interaction-will-cease",
    "daleks-are-supreme",
    "you-would-make-a-good-dalek",
    "you-will-follow",
    "you-will-identify",
    "daleks-do-not-question-orders",
    "why",
    "that-is-incorrect",
    "bring-him-to-me",
    "which-of-you-is-least-important",
    "would-you-care-for-some-tea",
    "i-bring-you-the-human",
    "your-loyalty-will-be-rewarded",
    "you-will-be-necessary",
    "daleks-have-no-concept-of-worry",
    "this-human-is-our-best-option",
    "can-i-be-of-assistance",
    "please-excuse-me",
    "i-have-duties-to-perform",
    "then-hear-me-talk-now",
];

/// Phrase picker with play/stop buttons.
#[derive(Debug, Clone)]
pub struct VoiceMenu {
    limiter: RateLimiter,
    phrases: Vec<String>,
    selected: usize,
}

impl VoiceMenu {
    pub fn new(interval: Duration, phrases: Vec<String>) -> Self {
        Self {
            limiter: RateLimiter::new(interval),
            phrases,
            selected: 0,
        }
    }

    pub fn phrases(&self) -> &[String] {
        &self.phrases
    }

    pub fn selected(&self) -> Option<&str> {
        self.phrases.get(self.selected).map(String::as_str)
    }

    pub fn selected_index(&self) -> usize {
        self.selected
    }

    pub fn select(&mut self, index: usize) {
        if index < self.phrases.len() {
            self.selected = index;
        } else {
            warn!("No phrase at index {}", index);
        }
    }

    /// Plays the selected phrase, at most once per interval.
    pub fn play(&mut self) -> Option<Command> {
        let phrase = self.selected()?.to_string();
        let command = self.limiter.call(|| Command::PlaySound(phrase));
        if command.is_none() {
            debug!("Sound request throttled");
        }
        command
    }

    pub fn stop(&mut self) -> Command {
        Command::StopSound
    }

    pub fn disconnected(&mut self) {
        self.limiter.reset();
    }
}

impl Default for VoiceMenu {
    fn default() -> Self {
        Self::new(
            Duration::from_millis(super::DEFAULT_MEDIA_INTERVAL_MS),
            DEFAULT_PHRASES.iter().map(|p| p.to_string()).collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::advance;

    #[tokio::test(start_paused = true)]
    async fn plays_selected_phrase_throttled() {
        let mut menu = VoiceMenu::default();
        menu.select(8);

        assert_eq!(menu.play(), Some(Command::PlaySound("report".into())));
        advance(Duration::from_millis(1500)).await;
        assert_eq!(menu.play(), None);
        advance(Duration::from_millis(500)).await;
        assert_eq!(menu.play(), Some(Command::PlaySound("report".into())));
        assert_eq!(menu.stop(), Command::StopSound);
    }

    #[tokio::test(start_paused = true)]
    async fn out_of_range_selection_is_ignored() {
        let mut menu = VoiceMenu::new(Duration::from_millis(2000), vec!["why".into()]);

        menu.select(4);
        assert_eq!(menu.selected(), Some("why"));
    }

    #[tokio::test(start_paused = true)]
    async fn empty_menu_plays_nothing() {
        let mut menu = VoiceMenu::new(Duration::from_millis(2000), Vec::new());

        assert_eq!(menu.play(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_rearms() {
        let mut menu = VoiceMenu::default();

        assert!(menu.play().is_some());
        menu.disconnected();
        assert!(menu.play().is_some());
    }
}
