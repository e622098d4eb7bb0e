use std::borrow::Cow;
use std::collections::BTreeSet;
use std::marker::PhantomData;

use anstyle::Style;
use clap::{Command, CommandFactory};
use lc3b_emulator::isa::Reg;
use rustyline::completion::Completer;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::{ValidationContext, ValidationResult, Validator};
use rustyline::Context;
use rustyline_derive::Helper;

/// Rustyline helper, that handles interactive completion, highlighting and hinting.
#[derive(Helper, Debug)]
pub(crate) struct RunHelper<T: CommandFactory> {
    app: PhantomData<T>,

    /// Suggestions for location arguments: registers and program labels
    locations: Vec<String>,
}

impl<T: CommandFactory> RunHelper<T> {
    pub fn new<'a>(labels: impl IntoIterator<Item = &'a String>) -> Self {
        let locations = Reg::ALL
            .iter()
            .map(ToString::to_string)
            .chain(labels.into_iter().cloned())
            .collect();

        RunHelper {
            app: PhantomData,
            locations,
        }
    }

    /// Split the line up to the cursor, with an empty word at the end if the
    /// cursor is after a space
    fn words(line: &str, pos: usize) -> Option<Vec<String>> {
        let line = &line[..pos];
        let mut words = shell_words::split(line).ok()?;
        if line.ends_with([' ', '\t']) {
            words.push(String::new());
        }
        Some(words)
    }
}

fn suggest(command: &Command, input: &[String], locations: &[String]) -> (usize, BTreeSet<String>) {
    // The suggestions are built even if we're not on the first word, which is
    // wasted work for the second pattern of the match below
    let mut suggestions: BTreeSet<_> = command
        .get_subcommands()
        .flat_map(|cmd| {
            std::iter::once(cmd.get_name().to_string())
                .chain(cmd.get_visible_aliases().map(ToString::to_string))
        })
        .collect();

    // If the app has subcommands, it has a `help` command
    if command.has_subcommands() {
        suggestions.insert("help".to_string());
    }

    let index = input.len().saturating_sub(1);

    // Find the corresponding positional arg if it exists and add suggestions for it
    if let Some(arg) = command.get_positionals().nth(index) {
        if arg.get_id().as_str() == "location" {
            suggestions.extend(locations.iter().cloned());
        }
    }

    match input {
        [last] => (
            last.len(),
            suggestions
                .into_iter()
                .filter(|alias| alias.starts_with(last.as_str()))
                .collect(),
        ),

        [head, tail @ ..] => command
            .find_subcommand(head)
            .map(|sub: &Command| suggest(sub, tail, locations))
            .unwrap_or_default(),

        [] => (0, suggestions),
    }
}

impl<T: CommandFactory> Completer for RunHelper<T> {
    type Candidate = String;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Self::Candidate>)> {
        let Some(words) = Self::words(line, pos) else {
            return Ok((0, Vec::new()));
        };

        let app = T::command();
        let (offset, candidates) = suggest(&app, &words, &self.locations);
        Ok((pos - offset, candidates.into_iter().collect()))
    }
}

impl<T: CommandFactory> Highlighter for RunHelper<T> {
    fn highlight_hint<'h>(&self, hint: &'h str) -> Cow<'h, str> {
        let style = Style::new().dimmed();
        Cow::Owned(format!("{}{hint}{}", style.render(), style.render_reset()))
    }

    fn highlight_prompt<'b, 's: 'b, 'p: 'b>(
        &'s self,
        prompt: &'p str,
        _default: bool,
    ) -> Cow<'b, str> {
        let style = Style::new().bold();
        Cow::Owned(format!("{}{prompt}{}", style.render(), style.render_reset()))
    }
}

impl<T: CommandFactory> Hinter for RunHelper<T> {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &Context<'_>) -> Option<String> {
        let words = Self::words(line, pos)?;
        let app = T::command();
        let (offset, candidates) = suggest(&app, &words, &self.locations);

        match candidates.into_iter().collect::<Vec<_>>().as_slice() {
            [candidate] => candidate.get(offset..).map(ToOwned::to_owned),
            _ => None,
        }
    }
}

impl<T: CommandFactory> Validator for RunHelper<T> {
    fn validate(&self, ctx: &mut ValidationContext) -> rustyline::Result<ValidationResult> {
        if shell_words::split(ctx.input()).is_err() {
            Ok(ValidationResult::Incomplete)
        } else {
            Ok(ValidationResult::Valid(None))
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use pretty_assertions::assert_eq;

    use super::*;

    #[derive(Parser)]
    #[command(no_binary_name = true)]
    enum Test {
        Step,
        Status,
        Memory {
            #[arg(value_parser)]
            location: String,
        },
    }

    fn words(line: &str) -> Vec<String> {
        RunHelper::<Test>::words(line, line.len()).unwrap()
    }

    #[test]
    fn suggest_test() {
        let command = Test::command();
        let locations = vec!["R0".to_owned(), "LOOP".to_owned()];

        let (offset, candidates) = suggest(&command, &words("st"), &locations);
        assert_eq!(offset, 2);
        assert_eq!(
            candidates.into_iter().collect::<Vec<_>>(),
            vec!["status", "step"]
        );

        let (offset, candidates) = suggest(&command, &words("memory L"), &locations);
        assert_eq!(offset, 1);
        assert_eq!(candidates.into_iter().collect::<Vec<_>>(), vec!["LOOP"]);

        let (_, candidates) = suggest(&command, &words("memory "), &locations);
        assert!(candidates.contains("R0"));
    }
}
