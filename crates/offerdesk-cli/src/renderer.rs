//! Terminal rendering of markdown answers.
//!
//! Answers, reports and tables arrive as markdown. With color enabled they
//! go through a termimad skin, which also lays out the tables; otherwise the
//! markdown is printed as is so it can be piped.

use std::io::{self, Write};

use anyhow::Result;
use termimad::{crossterm::style::Color, MadSkin};

/// Writes markdown to the terminal, styled or verbatim.
pub struct TerminalRenderer {
    rich_enabled: bool,
    skin: MadSkin,
}

impl TerminalRenderer {
    pub fn new(rich_enabled: bool) -> Self {
        let mut skin = MadSkin::default();
        skin.set_headers_fg(Color::Cyan);
        // Counts and labels are bold in answers and reports.
        skin.bold.set_fg(Color::Green);
        skin.italic.set_fg(Color::DarkGrey);
        skin.code_block.set_bg(Color::AnsiValue(236));
        skin.inline_code.set_fg(Color::Yellow);

        Self { rich_enabled, skin }
    }

    /// Text as it will appear on the terminal.
    pub fn format(&self, markdown: &str) -> String {
        if self.rich_enabled {
            self.skin.term_text(markdown).to_string()
        } else {
            markdown.to_string()
        }
    }

    /// Writes [`format`](Self::format)ted markdown to stdout.
    pub fn render(&self, markdown: &str) -> Result<()> {
        let mut stdout = io::stdout().lock();
        stdout.write_all(self.format(markdown).as_bytes())?;
        stdout.flush()?;
        Ok(())
    }
}

impl Default for TerminalRenderer {
    fn default() -> Self {
        Self::new(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_renderer_passes_markdown_through() {
        let renderer = TerminalRenderer::new(false);
        let markdown = "| month | count |\n|---|---|\n| July | 2 |\n";
        assert_eq!(renderer.format(markdown), markdown);
    }

    #[test]
    fn test_rich_renderer_keeps_content() {
        let renderer = TerminalRenderer::new(true);
        let output = renderer.format("**Offers**: 12\n");
        assert!(output.contains("12"));
        assert!(!output.contains("**"));
    }

    #[test]
    fn test_default_is_rich() {
        assert!(TerminalRenderer::default().rich_enabled);
    }
}
