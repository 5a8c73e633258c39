//! Interactive prompts.
//!
//! A [`Prompter`] reads answers from any [`BufRead`] and writes questions
//! to any [`Write`], so scripts use stdin/stdout while tests use buffers.
//! Leading spaces in a question set the indent of the messages printed
//! when an answer is rejected.

use std::io::{self, BufRead, Write};

use regex::Regex;

use crate::Result;

/// Converts a raw answer, or explains why it cannot.
pub type Converter<'a, T> = &'a dyn Fn(&str) -> std::result::Result<T, String>;

/// A check run on the converted answer, with the message shown on failure.
pub enum Check<'a, T> {
    /// The answer must match this pattern from its start.
    Pattern(Regex, String),
    /// The predicate must return true.
    Predicate(Box<dyn Fn(&T) -> bool + 'a>, String),
}

impl<'a, T> Check<'a, T> {
    /// Check against a regular expression.
    pub fn pattern(regex: Regex, message: impl Into<String>) -> Self {
        Self::Pattern(regex, message.into())
    }

    /// Check with a predicate.
    pub fn predicate(f: impl Fn(&T) -> bool + 'a, message: impl Into<String>) -> Self {
        Self::Predicate(Box::new(f), message.into())
    }
}

/// Question/answer loop over a reader and a writer.
pub struct Prompter<R, W> {
    input: R,
    output: W,
}

impl Prompter<io::StdinLock<'static>, io::Stdout> {
    /// Prompt on the process's stdin and stdout.
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> Prompter<R, W> {
    /// Create a prompter over the given streams.
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Give back the streams.
    pub fn into_inner(self) -> (R, W) {
        (self.input, self.output)
    }

    /// Ask for a free-text answer.
    ///
    /// An empty answer takes `default`, or asks again if there is none.
    pub fn ask(&mut self, question: &str, default: &str) -> Result<String> {
        self.ask_with(question, default, &|a: &str| Ok(a.to_string()), &[])
    }

    /// Ask, convert the answer and run `checks` on it, asking again until
    /// everything passes.
    ///
    /// ```
    /// use sy::prompt::Prompter;
    ///
    /// let mut prompter = Prompter::new(&b"x\n42\n"[..], Vec::new());
    /// let n: i64 = prompter
    ///     .ask_with("Number: ", "", &|a: &str| a.parse().map_err(|_| "Answer must be a integer".to_string()), &[])
    ///     .unwrap();
    /// assert_eq!(n, 42);
    /// ```
    pub fn ask_with<T>(
        &mut self,
        question: &str,
        default: &str,
        convert: Converter<'_, T>,
        checks: &[Check<'_, T>],
    ) -> Result<T> {
        loop {
            write!(self.output, "{question}")?;
            self.output.flush()?;

            let mut answer = self.read_answer()?;
            if answer.is_empty() {
                if default.is_empty() {
                    continue;
                }
                answer = default.to_string();
            }

            let converted = match convert(&answer) {
                Ok(value) => value,
                Err(message) => {
                    self.say(question, &message)?;
                    continue;
                }
            };

            if let Some(message) = failed_check(&answer, &converted, checks) {
                self.say(question, message)?;
                continue;
            }
            return Ok(converted);
        }
    }

    /// Ask a yes/no question.
    ///
    /// Answers starting with `y`, `Y`, `t` or `j` mean yes; `n`, `N` or `f`
    /// mean no.
    pub fn confirm(&mut self, question: &str, default: Option<bool>) -> Result<bool> {
        let default = match default {
            Some(true) => "y",
            Some(false) => "n",
            None => "",
        };
        self.ask_with(question, default, &parse_bool, &[])
    }

    /// Present numbered `choices` and return the selected index, or several
    /// indexes when `multichoice` is set. `default` is written the way the
    /// user would type it, e.g. `"1,2"`.
    pub fn choose<D: std::fmt::Display>(
        &mut self,
        question: &str,
        choices: &[D],
        multichoice: bool,
        default: &str,
    ) -> Result<Vec<usize>> {
        let indent = indent_of(question);
        writeln!(self.output, "{question}")?;
        for (i, choice) in choices.iter().enumerate() {
            writeln!(self.output, "{indent}{}) {choice}", i + 1)?;
        }
        writeln!(self.output)?;

        let choice_q = if multichoice {
            format!("{indent}Choices: ")
        } else {
            format!("{indent}Choice: ")
        };
        let to_indexes = |answer: &str| parse_indexes(answer, choices.len());

        loop {
            let selected = self.ask_with(&choice_q, default, &to_indexes, &[])?;
            if !multichoice && selected.len() > 1 {
                writeln!(self.output, "{indent}Select one value")?;
                continue;
            }
            return Ok(selected);
        }
    }

    fn read_answer(&mut self) -> Result<String> {
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "no answer on input").into());
        }
        Ok(line.trim().to_string())
    }

    fn say(&mut self, question: &str, message: &str) -> Result<()> {
        writeln!(self.output, "{}{message}", indent_of(question))?;
        Ok(())
    }
}

fn failed_check<'c, T>(answer: &str, value: &T, checks: &'c [Check<'_, T>]) -> Option<&'c str> {
    checks.iter().find_map(|check| match check {
        Check::Pattern(regex, message) => {
            let anchored = regex.find(answer).is_some_and(|m| m.start() == 0);
            (!anchored).then_some(message.as_str())
        }
        Check::Predicate(f, message) => (!f(value)).then_some(message.as_str()),
    })
}

fn indent_of(question: &str) -> String {
    " ".repeat(question.len() - question.trim_start_matches(' ').len())
}

/// Interpret a yes/no answer.
pub fn parse_bool(answer: &str) -> std::result::Result<bool, String> {
    match answer.chars().next() {
        Some('y' | 'Y' | 't' | 'j') => Ok(true),
        Some('n' | 'N' | 'f') => Ok(false),
        _ => Err("Answer yes or no".to_string()),
    }
}

/// Parse a 1-based, comma or space separated list into 0-based indexes.
pub fn parse_indexes(answer: &str, len: usize) -> std::result::Result<Vec<usize>, String> {
    answer
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(|s| {
            let n: usize = s.parse().map_err(|_| "You must use numbers".to_string())?;
            if n == 0 || n > len {
                return Err(format!("{n} is not a valid option"));
            }
            Ok(n - 1)
        })
        .collect()
}
