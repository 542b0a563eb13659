//! Line-oriented operator interaction. Blocks until an acceptable answer
//! arrives; there is no default and no timeout.

use crate::Result;
use starloc_core::StarlocError;
use std::io::{BufRead, Write};

pub trait Operator {
    fn say(&mut self, line: &str) -> Result<()>;

    /// Ask until the trimmed answer is one of `accepted`.
    fn choose(&mut self, accepted: &[&str]) -> Result<String>;

    /// Ask until the answer is at least `min_len` characters long.
    fn enter_text(&mut self, min_len: usize) -> Result<String>;
}

pub struct LinePrompt<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> LinePrompt<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    fn read_line(&mut self) -> Result<String> {
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Err(StarlocError::InputClosed.into());
        }
        Ok(line.trim().to_string())
    }
}

impl LinePrompt<std::io::StdinLock<'static>, std::io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(std::io::stdin().lock(), std::io::stdout())
    }
}

impl<R: BufRead, W: Write> Operator for LinePrompt<R, W> {
    fn say(&mut self, line: &str) -> Result<()> {
        writeln!(self.output, "{line}")?;
        Ok(())
    }

    fn choose(&mut self, accepted: &[&str]) -> Result<String> {
        loop {
            write!(self.output, "[{}] > ", accepted.join("/"))?;
            self.output.flush()?;
            let answer = self.read_line()?;
            if accepted.contains(&answer.as_str()) {
                return Ok(answer);
            }
            writeln!(self.output, "Please answer one of: {}", accepted.join(", "))?;
        }
    }

    fn enter_text(&mut self, min_len: usize) -> Result<String> {
        loop {
            write!(self.output, "> ")?;
            self.output.flush()?;
            let answer = self.read_line()?;
            if answer.chars().count() >= min_len {
                return Ok(answer);
            }
            writeln!(self.output, "At least {min_len} characters, please")?;
        }
    }
}

#[cfg(test)]
pub(crate) mod scripted {
    use super::*;
    use std::collections::VecDeque;

    /// Replays canned answers and records everything said.
    #[derive(Default)]
    pub struct ScriptedOperator {
        pub answers: VecDeque<String>,
        pub transcript: Vec<String>,
    }

    impl ScriptedOperator {
        pub fn with_answers(answers: &[&str]) -> Self {
            Self {
                answers: answers.iter().map(|a| a.to_string()).collect(),
                transcript: Vec::new(),
            }
        }

        fn next(&mut self) -> Result<String> {
            self.answers
                .pop_front()
                .ok_or_else(|| StarlocError::InputClosed.into())
        }
    }

    impl Operator for ScriptedOperator {
        fn say(&mut self, line: &str) -> Result<()> {
            self.transcript.push(line.to_string());
            Ok(())
        }

        fn choose(&mut self, accepted: &[&str]) -> Result<String> {
            loop {
                let answer = self.next()?;
                if accepted.contains(&answer.as_str()) {
                    return Ok(answer);
                }
            }
        }

        fn enter_text(&mut self, min_len: usize) -> Result<String> {
            loop {
                let answer = self.next()?;
                if answer.chars().count() >= min_len {
                    return Ok(answer);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn choose_repeats_until_accepted() -> Result<()> {
        let input = b"maybe\n  y \n".as_slice();
        let mut out = Vec::new();
        let mut prompt = LinePrompt::new(input, &mut out);
        assert_eq!(prompt.choose(&["y", "n"])?, "y");
        let shown = String::from_utf8(out)?;
        assert!(shown.contains("Please answer one of: y, n"));
        Ok(())
    }

    #[test]
    fn enter_text_enforces_min_length() -> Result<()> {
        let input = "ok\nМеч\n".as_bytes();
        let mut prompt = LinePrompt::new(input, Vec::new());
        assert_eq!(prompt.enter_text(3)?, "Меч");
        Ok(())
    }

    #[test]
    fn end_of_input_is_input_closed() {
        let mut prompt = LinePrompt::new(b"".as_slice(), Vec::new());
        let err = prompt.choose(&["y", "n"]).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StarlocError>(),
            Some(StarlocError::InputClosed)
        ));
    }
}
