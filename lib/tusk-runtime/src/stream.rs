use crate::token::{SyntaxError, Token, TokenSource, DEFAULT_CHANNEL};

/// A buffered stream of tokens pulled lazily from a token source.
///
/// Lookahead only sees tokens on the default channel. Tokens on other channels stay in the buffer, so text spanning a
/// range of tokens still includes them.
pub struct CommonTokenStream {
    source: Box<dyn TokenSource>,
    tokens: Vec<Token>,
    fetched_eof: bool,
}

impl CommonTokenStream {
    pub fn new(source: Box<dyn TokenSource>) -> Self {
        Self {
            source,
            tokens: Vec::new(),
            fetched_eof: false,
        }
    }

    /// Makes sure the buffer holds the token at `index`, if the source has one.
    fn sync(&mut self, index: usize) {
        while self.tokens.len() <= index && !self.fetched_eof {
            let mut token = self.source.next_token();
            token.index = self.tokens.len();
            self.fetched_eof = token.is_eof();
            self.tokens.push(token);
        }
    }

    /// Returns the index of the first default-channel token at or after `index`.
    ///
    /// The end-of-file token counts as visible, so this always lands on a buffered token.
    pub fn next_visible(&mut self, index: usize) -> usize {
        let mut index = index;
        loop {
            self.sync(index);
            if index >= self.tokens.len() {
                // The source is exhausted: clamp to the end-of-file token.
                return self.tokens.len().saturating_sub(1);
            }

            let token = &self.tokens[index];
            if token.channel == DEFAULT_CHANNEL || token.is_eof() {
                return index;
            }
            index += 1;
        }
    }

    /// Returns the buffered token at `index`.
    ///
    /// `index` must come from [`next_visible`][Self::next_visible].
    pub fn get(&self, index: usize) -> &Token {
        &self.tokens[index]
    }

    /// Concatenates the text of every buffered token from `start` through `stop`, skipping the end-of-file token.
    pub fn text(&mut self, start: usize, stop: usize) -> String {
        self.sync(stop);
        self.tokens
            .iter()
            .skip(start)
            .take(stop.saturating_sub(start) + 1)
            .filter(|token| !token.is_eof())
            .map(|token| token.text.as_str())
            .collect()
    }

    /// Buffers every remaining token.
    pub fn fill(&mut self) {
        while !self.fetched_eof {
            let next = self.tokens.len();
            self.sync(next);
        }
    }

    /// Returns every token buffered so far.
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// Drains the errors the token source reported so far.
    pub fn take_errors(&mut self) -> Vec<SyntaxError> {
        self.source.take_errors()
    }
}
