// SPDX-License-Identifier: Apache-2.0

//! Bracket/string-aware multi-line continuation detector.

/// Outcome of feeding one chunk of input into a [`LineBuffer`].
#[derive(Debug, PartialEq, Eq)]
pub enum Feed {
    /// The buffer is fully balanced; here is the accumulated text. The
    /// buffer has been reset.
    Completed(String),
    /// Still waiting on a closing bracket or string terminator.
    Continued,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("unbalanced bracket: expected '{expected}'")]
pub struct UnbalancedBracket {
    pub expected: char,
}

/// Accumulates input text across calls to [`feed`](LineBuffer::feed)
/// until brackets and strings are balanced.
#[derive(Debug, Default)]
pub struct LineBuffer {
    buf: String,
    in_string: bool,
    closers: Vec<char>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn reset(&mut self) {
        self.buf.clear();
        self.in_string = false;
        self.closers.clear();
    }

    /// Feeds one chunk (typically one line) into the buffer and rescans
    /// from scratch. Rescanning is simpler than incremental state and the
    /// inputs here are interactive lines, not large files.
    pub fn feed(&mut self, chunk: &str) -> Result<Feed, UnbalancedBracket> {
        self.buf.push_str(chunk);
        self.in_string = false;
        self.closers.clear();

        let mut chars = self.buf.chars().peekable();
        while let Some(c) = chars.next() {
            if self.in_string {
                match c {
                    '\\' => {
                        chars.next();
                    }
                    '"' => self.in_string = false,
                    _ => {}
                }
                continue;
            }
            match c {
                '\\' => {
                    chars.next();
                }
                '"' => self.in_string = true,
                '(' => self.closers.push(')'),
                '[' => self.closers.push(']'),
                '{' => self.closers.push('}'),
                ')' | ']' | '}' => match self.closers.pop() {
                    Some(expected) if expected == c => {}
                    Some(expected) => return Err(UnbalancedBracket { expected }),
                    None => {
                        return Err(UnbalancedBracket {
                            expected: matching_opener(c),
                        })
                    }
                },
                _ => {}
            }
        }

        if self.in_string || !self.closers.is_empty() {
            Ok(Feed::Continued)
        } else {
            let completed = std::mem::take(&mut self.buf);
            Ok(Feed::Completed(completed))
        }
    }
}

fn matching_opener(closer: char) -> char {
    match closer {
        ')' => '(',
        ']' => '[',
        '}' => '{',
        _ => unreachable!("matching_opener only called with a closing bracket"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completes_a_balanced_expression_in_one_feed() {
        let mut lb = LineBuffer::new();
        assert_eq!(
            lb.feed("(+ 1 2)").unwrap(),
            Feed::Completed("(+ 1 2)".to_string())
        );
    }

    #[test]
    fn continues_across_feeds_until_balanced() {
        let mut lb = LineBuffer::new();
        assert_eq!(lb.feed("(+ 1").unwrap(), Feed::Continued);
        assert_eq!(lb.feed(" 2)").unwrap(), Feed::Completed("(+ 1 2)".to_string()));
    }

    #[test]
    fn one_char_at_a_time_stays_continued_until_the_last_feed() {
        let mut lb = LineBuffer::new();
        let src = "(+ 1 2)";
        for (i, c) in src.chars().enumerate() {
            let result = lb.feed(&c.to_string()).unwrap();
            if i + 1 == src.len() {
                assert_eq!(result, Feed::Completed(src.to_string()));
            } else {
                assert_eq!(result, Feed::Continued);
            }
        }
    }

    #[test]
    fn brackets_inside_strings_do_not_count() {
        let mut lb = LineBuffer::new();
        assert_eq!(
            lb.feed(r#"":-(""#).unwrap(),
            Feed::Completed(r#"":-(""#.to_string())
        );
    }

    #[test]
    fn escaped_brackets_are_balanced() {
        let mut lb = LineBuffer::new();
        assert_eq!(
            lb.feed(r"[\( \)]").unwrap(),
            Feed::Completed(r"[\( \)]".to_string())
        );
    }

    #[test]
    fn mismatched_closer_is_an_error() {
        let mut lb = LineBuffer::new();
        assert_eq!(lb.feed("(]"), Err(UnbalancedBracket { expected: ')' }));
    }

    #[test]
    fn reset_discards_pending_buffer() {
        let mut lb = LineBuffer::new();
        lb.feed("(+ 1").unwrap();
        assert!(!lb.is_empty());
        lb.reset();
        assert!(lb.is_empty());
    }
}
