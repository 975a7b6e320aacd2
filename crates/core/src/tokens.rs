/// Estimates how many tokens a piece of text costs.
pub trait TokenCounter: Send + Sync {
    fn count(&self, text: &str) -> u32;
}

/// Cheap approximation: one token per CJK or full-width character, and one
/// token per four characters of every other word.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApproxTokenCounter;

fn is_wide(c: char) -> bool {
    matches!(
        c as u32,
        0x1100..=0x11FF
            | 0x2E80..=0x9FFF
            | 0xA960..=0xA97F
            | 0xAC00..=0xD7AF
            | 0xF900..=0xFAFF
            | 0xFE30..=0xFE4F
            | 0xFF00..=0xFFEF
            | 0x20000..=0x2FA1F
    )
}

impl TokenCounter for ApproxTokenCounter {
    fn count(&self, text: &str) -> u32 {
        let mut tokens: u32 = 0;
        let mut run: u32 = 0;
        for c in text.chars() {
            if c.is_whitespace() || is_wide(c) {
                tokens = tokens.saturating_add(run.div_ceil(4));
                run = 0;
                if !c.is_whitespace() {
                    tokens = tokens.saturating_add(1);
                }
            } else {
                run += 1;
            }
        }
        tokens.saturating_add(run.div_ceil(4))
    }
}
