use std::fmt::Display;
use std::io::{self, Write};

/// Command output sink: plain lines, or one pretty JSON document.
pub struct Output<W: Write> {
    json: bool,
    out: W,
}

impl<W: Write> Output<W> {
    pub fn new(json: bool, out: W) -> Self {
        Self { json, out }
    }

    pub fn is_json(&self) -> bool {
        self.json
    }

    pub fn line(&mut self, text: impl Display) -> io::Result<()> {
        writeln!(self.out, "{text}")
    }

    pub fn json(&mut self, value: &serde_json::Value) -> io::Result<()> {
        let text = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        writeln!(self.out, "{text}")
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl Output<io::Stdout> {
    pub fn stdout(json: bool) -> Self {
        Self::new(json, io::stdout())
    }
}

#[cfg(test)]
impl Output<Vec<u8>> {
    pub fn buffer(json: bool) -> Self {
        Self::new(json, Vec::new())
    }

    pub fn text(self) -> String {
        String::from_utf8(self.out).unwrap()
    }
}
