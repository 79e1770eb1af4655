/*
 * aurboost - AUR helper for Arch Linux built around pacman.
 * Copyright (C) 2025  compiledkernel-idk and pacboost contributors
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */

//! Interactive selection over numbered candidate lists.

use console::style;
use std::io::{self, BufRead, Write};

use crate::error::{AurError, Result};

/// Collects a choice from a list of candidates
pub trait Selector {
    /// Pick exactly one candidate
    fn choose_one(&mut self, title: &str, candidates: &[String]) -> Result<usize>;

    /// Pick any number of candidates; `*` selects all when `allow_all` is set
    fn choose_many(&mut self, title: &str, candidates: &[String], allow_all: bool) -> Result<Vec<usize>>;
}

/// Selector reading answers line by line.
///
/// End of input aborts with [`AurError::UserAbort`].
pub struct PromptSelector<R, W> {
    input: R,
    output: W,
}

impl PromptSelector<io::StdinLock<'static>, io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> PromptSelector<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    fn show(&mut self, title: &str, candidates: &[String]) -> Result<()> {
        writeln!(self.output, "{} {}", style("::").cyan().bold(), title)?;
        for (i, candidate) in candidates.iter().enumerate() {
            writeln!(self.output, "   {} {}", style(format!("[{}]", i)).magenta(), candidate)?;
        }
        Ok(())
    }

    fn read_answer(&mut self, prompt: &str) -> Result<String> {
        write!(self.output, "{} {} ", style("==>").green().bold(), prompt)?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            writeln!(self.output)?;
            return Err(AurError::UserAbort);
        }
        Ok(line.trim().to_string())
    }

    fn warn(&mut self, msg: &str) -> Result<()> {
        writeln!(self.output, "{} {}", style("warning:").yellow().bold(), msg)?;
        Ok(())
    }
}

impl<R: BufRead, W: Write> Selector for PromptSelector<R, W> {
    fn choose_one(&mut self, title: &str, candidates: &[String]) -> Result<usize> {
        if candidates.is_empty() {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "nothing to choose from").into());
        }
        self.show(title, candidates)?;

        loop {
            let answer = self.read_answer(&format!("Enter a number (0-{}):", candidates.len() - 1))?;
            match answer.parse::<usize>() {
                Ok(i) if i < candidates.len() => return Ok(i),
                _ => self.warn(&format!("'{}' is not a valid choice", answer))?,
            }
        }
    }

    fn choose_many(&mut self, title: &str, candidates: &[String], allow_all: bool) -> Result<Vec<usize>> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }
        self.show(title, candidates)?;

        let prompt = if allow_all {
            "Enter numbers separated by spaces, or * for all:"
        } else {
            "Enter numbers separated by spaces:"
        };

        loop {
            let answer = self.read_answer(prompt)?;
            match parse_selection(&answer, candidates.len(), allow_all) {
                Some(selection) => return Ok(selection),
                None => self.warn(&format!("'{}' is not a valid selection", answer))?,
            }
        }
    }
}

/// Parse a multi-selection answer.
///
/// `None` means re-prompt. Out-of-range numbers are dropped, duplicates collapse.
pub fn parse_selection(answer: &str, count: usize, allow_all: bool) -> Option<Vec<usize>> {
    let answer = answer.trim();
    if answer == "*" {
        return allow_all.then(|| (0..count).collect());
    }

    let mut selection = Vec::new();
    for token in answer.split_whitespace() {
        let index: usize = token.parse().ok()?;
        if index < count && !selection.contains(&index) {
            selection.push(index);
        }
    }
    Some(selection)
}

/// Selector for no-confirm mode: first candidate, or all of them
pub struct AcceptAll;

impl Selector for AcceptAll {
    fn choose_one(&mut self, _title: &str, candidates: &[String]) -> Result<usize> {
        if candidates.is_empty() {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "nothing to choose from").into());
        }
        Ok(0)
    }

    fn choose_many(&mut self, _title: &str, candidates: &[String], _allow_all: bool) -> Result<Vec<usize>> {
        Ok((0..candidates.len()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn candidates() -> Vec<String> {
        vec!["a".to_string(), "b".to_string(), "c".to_string()]
    }

    fn selector(input: &str) -> PromptSelector<Cursor<Vec<u8>>, Vec<u8>> {
        PromptSelector::new(Cursor::new(input.as_bytes().to_vec()), Vec::new())
    }

    #[test]
    fn test_wildcard_selects_all_in_order() {
        let mut sel = selector("*\n");
        assert_eq!(sel.choose_many("Pick", &candidates(), true).unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn test_wildcard_rejected_when_not_allowed() {
        let mut sel = selector("*\n1\n");
        assert_eq!(sel.choose_many("Pick", &candidates(), false).unwrap(), vec![1]);
    }

    #[test]
    fn test_out_of_range_dropped() {
        let mut sel = selector("2 7 0 2\n");
        assert_eq!(sel.choose_many("Pick", &candidates(), true).unwrap(), vec![2, 0]);
    }

    #[test]
    fn test_non_numeric_reprompts() {
        let mut sel = selector("x y\n1\n");
        assert_eq!(sel.choose_many("Pick", &candidates(), true).unwrap(), vec![1]);
        let shown = String::from_utf8_lossy(&sel.output).into_owned();
        assert!(shown.contains("not a valid selection"));
    }

    #[test]
    fn test_choose_one_reprompts_until_valid() {
        let mut sel = selector("9\nfoo\n1\n");
        assert_eq!(sel.choose_one("Pick", &candidates()).unwrap(), 1);
    }

    #[test]
    fn test_end_of_input_aborts() {
        let mut sel = selector("9\n");
        assert!(matches!(sel.choose_one("Pick", &candidates()), Err(AurError::UserAbort)));

        let mut sel = selector("");
        assert!(matches!(sel.choose_many("Pick", &candidates(), true), Err(AurError::UserAbort)));
    }

    #[test]
    fn test_empty_answer_selects_nothing() {
        assert_eq!(parse_selection("", 3, true), Some(vec![]));
    }

    #[test]
    fn test_accept_all() {
        let mut sel = AcceptAll;
        assert_eq!(sel.choose_one("Pick", &candidates()).unwrap(), 0);
        assert_eq!(sel.choose_many("Pick", &candidates(), false).unwrap(), vec![0, 1, 2]);
    }
}
