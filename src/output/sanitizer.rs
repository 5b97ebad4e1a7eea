//! Control sequence stripping for backend text.
//!
//! Raw debugger and shell output is stored verbatim; terminal views run it
//! through [`OutputSanitizer`] before printing so remote escape sequences
//! cannot move the local cursor or retitle the window.

use vte::{Params, Parser, Perform};

/// Output sanitizer using the VTE parser.
pub struct OutputSanitizer;

impl OutputSanitizer {
    /// Strip escape sequences and control characters from `input`.
    ///
    /// Newlines and tabs are kept; everything else non-printable is dropped.
    pub fn clean(input: &str) -> String {
        let mut extractor = PlainTextExtractor::default();
        let mut parser = Parser::new();

        parser.advance(&mut extractor, input.as_bytes());

        extractor.into_string()
    }

    /// Check whether `input` contains anything [`OutputSanitizer::clean`] would remove.
    pub fn needs_cleaning(input: &str) -> bool {
        input
            .chars()
            .any(|c| c.is_control() && c != '\n' && c != '\t')
    }
}

#[derive(Default)]
struct PlainTextExtractor {
    output: String,
}

impl PlainTextExtractor {
    fn into_string(self) -> String {
        self.output
    }
}

impl Perform for PlainTextExtractor {
    fn print(&mut self, c: char) {
        self.output.push(c);
    }

    fn execute(&mut self, byte: u8) {
        if byte == b'\n' || byte == b'\t' {
            self.output.push(byte as char);
        }
    }

    fn hook(&mut self, _params: &Params, _intermediates: &[u8], _ignore: bool, _action: char) {}

    fn put(&mut self, _byte: u8) {}

    fn unhook(&mut self) {}

    fn osc_dispatch(&mut self, _params: &[&[u8]], _bell_terminated: bool) {}

    fn csi_dispatch(
        &mut self,
        _params: &Params,
        _intermediates: &[u8],
        _ignore: bool,
        _action: char,
    ) {
    }

    fn esc_dispatch(&mut self, _intermediates: &[u8], _ignore: bool, _byte: u8) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_unchanged() {
        assert_eq!(OutputSanitizer::clean("~\"Breakpoint 1\"\n"), "~\"Breakpoint 1\"\n");
    }

    #[test]
    fn test_strip_colors() {
        assert_eq!(OutputSanitizer::clean("\x1b[31mred\x1b[0m"), "red");
    }

    #[test]
    fn test_drop_carriage_return() {
        assert_eq!(OutputSanitizer::clean("a\r\nb"), "a\nb");
    }

    #[test]
    fn test_osc_title() {
        let input = "\x1b]0;pwned\x07/home/user";
        assert_eq!(OutputSanitizer::clean(input), "/home/user");
    }

    #[test]
    fn test_needs_cleaning() {
        assert!(!OutputSanitizer::needs_cleaning("plain\ttext\n"));
        assert!(OutputSanitizer::needs_cleaning("\x1b[2J"));
    }
}
