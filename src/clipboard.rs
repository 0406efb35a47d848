// System clipboard access

use base64::Engine;
use std::io::{self, Write};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClipboardError {
    #[error("clipboard write failed: {0}")]
    Io(#[from] io::Error),
}

#[cfg_attr(test, mockall::automock)]
pub trait Clipboard: Send {
    fn set_text(&mut self, text: &str) -> Result<(), ClipboardError>;
}

/// Writes through the terminal with an OSC 52 escape sequence, so copying
/// also works over SSH. Terminals that do not support OSC 52 ignore it.
#[derive(Debug, Default)]
pub struct Osc52Clipboard;

impl Clipboard for Osc52Clipboard {
    fn set_text(&mut self, text: &str) -> Result<(), ClipboardError> {
        write_osc52(&mut io::stdout(), text)?;
        Ok(())
    }
}

/// `ESC ] 52 ; c ; <base64> BEL` targets the system clipboard.
fn write_osc52<W: Write>(out: &mut W, text: &str) -> io::Result<()> {
    let encoded = base64::engine::general_purpose::STANDARD.encode(text);
    write!(out, "\x1b]52;c;{encoded}\x07")?;
    out.flush()
}
