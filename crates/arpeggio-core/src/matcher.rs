//! Key-sequence input matcher.
//!
//! Accumulates presses against the current code map. Idle with an empty
//! buffer, buffering while the buffer is a valid proper prefix; an exact
//! match or a dead-end prefix empties the buffer again. There is no timeout:
//! a buffer only leaves `Buffering` through a match or a rejection.

use crate::huffman::CodeMap;

#[derive(Debug, Clone, PartialEq)]
pub enum MatchStep {
    /// Symbol outside the alphabet; the buffer is left untouched.
    UnknownKey(char),
    /// Buffer is a proper prefix of at least one code.
    Buffering,
    /// Buffer exactly matched this operation's code; buffer cleared.
    Matched(String),
    /// Buffer (returned here) matches no code, not even as a prefix; cleared.
    InvalidPrefix(String),
}

#[derive(Debug, Default)]
pub struct InputMatcher {
    buffer: String,
}

impl InputMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    pub fn is_idle(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn reset(&mut self) {
        self.buffer.clear();
    }

    /// Feed one pressed symbol against the code map in force.
    pub fn press(&mut self, symbol: char, alphabet: &[char], map: &CodeMap) -> MatchStep {
        if !alphabet.contains(&symbol) {
            return MatchStep::UnknownKey(symbol);
        }

        self.buffer.push(symbol);

        if let Some(entry) = map.get(&self.buffer) {
            let operation = entry.operation.clone();
            self.buffer.clear();
            return MatchStep::Matched(operation);
        }

        if map.has_prefix(&self.buffer) {
            return MatchStep::Buffering;
        }

        MatchStep::InvalidPrefix(std::mem::take(&mut self.buffer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::huffman::build_code_map;

    const ALPHABET: [char; 6] = ['j', 'f', 'k', 'd', 'l', 's'];

    fn sample_map() -> CodeMap {
        let weights = [
            ("dup", 55),
            ("sub", 54),
            ("add", 53),
            ("pred", 53),
            ("pop", 52),
            ("div", 52),
            ("succ", 46),
            ("zero", 46),
            ("mul", 45),
            ("swap", 44),
        ]
        .iter()
        .map(|(n, w)| (n.to_string(), *w as u64))
        .collect();
        build_code_map(&weights, &ALPHABET).expect("build")
    }

    #[test]
    fn single_symbol_match() {
        let map = sample_map();
        let mut matcher = InputMatcher::new();
        assert_eq!(
            matcher.press('f', &ALPHABET, &map),
            MatchStep::Matched("dup".to_string())
        );
        assert!(matcher.is_idle());
    }

    #[test]
    fn multi_symbol_match_buffers_then_fires() {
        let map = sample_map();
        let mut matcher = InputMatcher::new();
        assert_eq!(matcher.press('j', &ALPHABET, &map), MatchStep::Buffering);
        assert_eq!(matcher.buffer(), "j");
        assert_eq!(
            matcher.press('k', &ALPHABET, &map),
            MatchStep::Matched("succ".to_string())
        );
        assert!(matcher.is_idle());
    }

    #[test]
    fn unknown_key_leaves_the_buffer_alone() {
        let map = sample_map();
        let mut matcher = InputMatcher::new();
        matcher.press('j', &ALPHABET, &map);
        assert_eq!(matcher.press('q', &ALPHABET, &map), MatchStep::UnknownKey('q'));
        assert_eq!(matcher.buffer(), "j");
        // Still buffering: the pending prefix survives the stray key.
        assert_eq!(
            matcher.press('j', &ALPHABET, &map),
            MatchStep::Matched("div".to_string())
        );
    }

    #[test]
    fn dead_end_clears_the_buffer() {
        let map = sample_map();
        let mut matcher = InputMatcher::new();
        matcher.press('j', &ALPHABET, &map);
        assert_eq!(
            matcher.press('s', &ALPHABET, &map),
            MatchStep::InvalidPrefix("js".to_string())
        );
        assert!(matcher.is_idle());
    }

    #[test]
    fn every_code_round_trips_to_exactly_one_match() {
        let map = sample_map();
        let rows: Vec<(String, String)> = map
            .iter()
            .map(|(k, e)| (k.to_string(), e.operation.clone()))
            .collect();
        for (code, operation) in rows {
            let mut matcher = InputMatcher::new();
            let mut matched = Vec::new();
            for symbol in code.chars() {
                match matcher.press(symbol, &ALPHABET, &map) {
                    MatchStep::Matched(op) => matched.push(op),
                    MatchStep::Buffering => {}
                    other => panic!("unexpected step {other:?} for code {code}"),
                }
            }
            assert_eq!(matched, vec![operation], "code {code}");
            assert!(matcher.is_idle(), "code {code}");
        }
    }
}
