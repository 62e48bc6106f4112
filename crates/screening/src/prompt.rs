// In crates/screening/src/prompt.rs

use std::collections::VecDeque;
use std::io::{self, BufRead, ErrorKind, Write};

use crate::{Error, Result};

/// Where answers to interactive questions come from.
///
/// `ConsolePrompt` asks a human on the terminal. `ScriptedAnswers` replays
/// canned replies so batch runs and tests need no operator.
pub trait AnswerSource: Send {
    /// Shows `prompt` and returns one line of input, without the line ending.
    fn ask(&mut self, prompt: &str) -> Result<String>;

    /// Shows informational text (menus, retry hints).
    fn show(&mut self, text: &str);
}

#[derive(Debug, Default)]
pub struct ConsolePrompt;

impl AnswerSource for ConsolePrompt {
    fn ask(&mut self, prompt: &str) -> Result<String> {
        read_reply(&mut io::stdin().lock(), &mut io::stdout().lock(), prompt)
    }

    fn show(&mut self, text: &str) {
        println!("{}", text);
    }
}

/// Writes `prompt` and reads one line. A line that is not valid UTF-8 is
/// rejected and the prompt repeated.
fn read_reply(input: &mut impl BufRead, output: &mut impl Write, prompt: &str) -> Result<String> {
    loop {
        write!(output, "{}", prompt)
            .and_then(|_| output.flush())
            .map_err(Error::Console)?;

        let mut line = String::new();
        match input.read_line(&mut line) {
            Ok(0) => return Err(Error::InputClosed),
            Ok(_) => return Ok(line.trim_end_matches(['\r', '\n']).to_string()),
            Err(e) if e.kind() == ErrorKind::InvalidData => {
                writeln!(output, "\n*** input is not valid text, try again ***")
                    .map_err(Error::Console)?;
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(Error::Console(e)),
        }
    }
}

/// Replays a fixed list of replies in order.
#[derive(Debug, Default)]
pub struct ScriptedAnswers {
    replies: VecDeque<String>,
    prompts: Vec<String>,
}

impl ScriptedAnswers {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: replies.into_iter().map(Into::into).collect(),
            prompts: Vec::new(),
        }
    }

    /// Every prompt asked so far.
    pub fn prompts(&self) -> &[String] {
        &self.prompts
    }

    pub fn remaining(&self) -> usize {
        self.replies.len()
    }
}

impl AnswerSource for ScriptedAnswers {
    fn ask(&mut self, prompt: &str) -> Result<String> {
        self.prompts.push(prompt.to_string());
        self.replies.pop_front().ok_or(Error::InputClosed)
    }

    fn show(&mut self, _text: &str) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripted_answers_replay_then_close() {
        let mut answers = ScriptedAnswers::new(["y", "2024-01-02"]);
        assert_eq!(answers.ask("first? ").unwrap(), "y");
        assert_eq!(answers.ask("second? ").unwrap(), "2024-01-02");
        assert!(matches!(answers.ask("third? "), Err(Error::InputClosed)));
        assert_eq!(answers.prompts().len(), 3);
        assert_eq!(answers.remaining(), 0);
    }

    #[test]
    fn console_reply_strips_the_line_ending() {
        let mut input = io::Cursor::new(b"yes\r\nno\n".to_vec());
        let mut output = Vec::new();
        assert_eq!(read_reply(&mut input, &mut output, "ok? ").unwrap(), "yes");
        assert_eq!(read_reply(&mut input, &mut output, "ok? ").unwrap(), "no");
        assert!(matches!(
            read_reply(&mut input, &mut output, "ok? "),
            Err(Error::InputClosed)
        ));
        assert_eq!(output, b"ok? ok? ok? ");
    }

    #[test]
    fn invalid_utf8_reprompts() {
        let mut input = io::Cursor::new(b"\xff\xfe\nEnergy\n".to_vec());
        let mut output = Vec::new();

        assert_eq!(read_reply(&mut input, &mut output, "sector? ").unwrap(), "Energy");
        let shown = String::from_utf8(output).unwrap();
        assert_eq!(shown.matches("sector? ").count(), 2);
        assert!(shown.contains("not valid text"));
    }

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::from(ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn failed_prompt_write_is_an_error() {
        let mut input = io::Cursor::new(b"y\n".to_vec());
        assert!(matches!(
            read_reply(&mut input, &mut BrokenPipe, "ok? "),
            Err(Error::Console(_))
        ));
    }
}
