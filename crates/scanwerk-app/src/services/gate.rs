// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Blank-page gate: the one point where the operator may overrule the
// classifier and keep a page that looks blank.

use std::io::{BufRead, Write};

use tracing::{info, warn};

/// Decides whether a page classified as blank is kept anyway.
pub trait BlankGate {
    fn keep_blank(&mut self, page: usize, whiteness: f64) -> bool;
}

/// Never keeps blank pages.
pub struct AutoDiscard;

impl BlankGate for AutoDiscard {
    fn keep_blank(&mut self, page: usize, whiteness: f64) -> bool {
        info!(page, whiteness, "Blank page discarded");
        false
    }
}

/// Asks on `output` and reads `y`/`yes` from `input`. Anything else discards.
pub struct Interactive<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Interactive<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

impl Interactive<std::io::StdinLock<'static>, std::io::Stdout> {
    pub fn terminal() -> Self {
        Self::new(std::io::stdin().lock(), std::io::stdout())
    }
}

impl<R: BufRead, W: Write> BlankGate for Interactive<R, W> {
    fn keep_blank(&mut self, page: usize, whiteness: f64) -> bool {
        let prompt = write!(
            self.output,
            "Page {} looks blank ({:.1}% white). Keep it? [y/N] ",
            page + 1,
            whiteness * 100.0
        )
        .and_then(|()| self.output.flush());
        if let Err(err) = prompt {
            warn!(%err, "Cannot prompt; discarding blank page");
            return false;
        }

        let mut answer = String::new();
        if let Err(err) = self.input.read_line(&mut answer) {
            warn!(%err, "Cannot read answer; discarding blank page");
            return false;
        }
        let keep = matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes");
        info!(page, whiteness, keep, "Operator decided on blank page");
        keep
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn auto_discard_never_keeps() {
        assert!(!AutoDiscard.keep_blank(0, 1.0));
    }

    #[test]
    fn interactive_accepts_yes() {
        let mut out = Vec::new();
        let mut gate = Interactive::new(Cursor::new("yes\n"), &mut out);
        assert!(gate.keep_blank(2, 0.995));
        let prompt = String::from_utf8(out).expect("utf8");
        assert!(prompt.starts_with("Page 3 looks blank (99.5% white)"));
    }

    #[test]
    fn interactive_defaults_to_discard() {
        let mut gate = Interactive::new(Cursor::new("\n"), Vec::new());
        assert!(!gate.keep_blank(0, 1.0));
        let mut eof = Interactive::new(Cursor::new(""), Vec::new());
        assert!(!eof.keep_blank(0, 1.0));
    }
}
