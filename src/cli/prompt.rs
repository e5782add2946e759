//! Interactive prompts
//!
//! Line-based questions on stderr, answered on stdin. Only used when stdin is
//! a terminal.

use std::io::{self, BufRead, IsTerminal, Write};

/// Prompt shown when asking for the framework version
pub const VERSION_PROMPT: &str = "FFmpeg version [latest stable]: ";

/// Whether stdin is attached to a terminal
pub fn is_interactive() -> bool {
    io::stdin().is_terminal()
}

/// Ask `prompt` and read one line from `input`
///
/// Returns `None` at end of input. The answer is trimmed.
pub fn ask_from<R: BufRead, W: Write>(
    prompt: &str,
    input: &mut R,
    output: &mut W,
) -> io::Result<Option<String>> {
    write!(output, "{prompt}")?;
    output.flush()?;

    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

/// Ask `prompt` on the terminal
pub fn ask(prompt: &str) -> io::Result<Option<String>> {
    ask_from(prompt, &mut io::stdin().lock(), &mut io::stderr())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_answer_is_trimmed() {
        let mut input = Cursor::new("  n7.0.2  \n");
        let mut output = Vec::new();

        let answer = ask_from(VERSION_PROMPT, &mut input, &mut output).unwrap();

        assert_eq!(answer.as_deref(), Some("n7.0.2"));
        assert_eq!(String::from_utf8(output).unwrap(), VERSION_PROMPT);
    }

    #[test]
    fn test_empty_line_is_empty_answer() {
        let mut input = Cursor::new("\n");
        let answer = ask_from(VERSION_PROMPT, &mut input, &mut Vec::new()).unwrap();
        assert_eq!(answer.as_deref(), Some(""));
    }

    #[test]
    fn test_end_of_input_is_none() {
        let mut input = Cursor::new("");
        let answer = ask_from(VERSION_PROMPT, &mut input, &mut Vec::new()).unwrap();
        assert!(answer.is_none());
    }
}
