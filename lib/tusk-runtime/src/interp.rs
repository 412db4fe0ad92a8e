//! Interpreter data.
//!
//! The grammar compiler writes an `.interp` file next to the generated sources of every grammar. It carries the token
//! vocabulary, the rule names, and the serialized ATN, which is everything an interpreter needs to recognize input
//! without the generated code.

use std::{fmt, str::FromStr};

use snafu::{OptionExt as _, Snafu};

/// An error encountered while reading interpreter data.
#[derive(Debug, Snafu)]
#[snafu(context(suffix(false)))]
pub enum InterpDataError {
    #[snafu(display("Interpreter data has no '{}' section.", section))]
    MissingSection { section: &'static str },

    #[snafu(display("Invalid value '{}' in serialized ATN.", value))]
    InvalidAtnValue { value: String },
}

/// The parsed contents of an `.interp` file.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InterpreterData {
    pub literal_names: Vec<Option<String>>,
    pub symbolic_names: Vec<Option<String>>,
    pub rule_names: Vec<String>,

    /// Lexers only.
    pub channel_names: Vec<String>,

    /// Lexers only.
    pub mode_names: Vec<String>,

    pub serialized_atn: Vec<i32>,
}

fn optional_name(line: &str) -> Option<String> {
    (line != "null").then(|| line.to_string())
}

impl FromStr for InterpreterData {
    type Err = InterpDataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut data = InterpreterData::default();
        let mut lines = s.lines().map(str::trim_end);
        let mut saw_rules = false;
        let mut atn = None;

        while let Some(header) = lines.next() {
            let section = match header {
                "token literal names:" | "token symbolic names:" | "rule names:" | "channel names:"
                | "mode names:" => header,
                "atn:" => {
                    atn = lines.next();
                    break;
                }
                _ => continue,
            };

            for line in lines.by_ref() {
                if line.is_empty() {
                    break;
                }
                match section {
                    "token literal names:" => data.literal_names.push(optional_name(line)),
                    "token symbolic names:" => data.symbolic_names.push(optional_name(line)),
                    "rule names:" => data.rule_names.push(line.to_string()),
                    "channel names:" => data.channel_names.push(line.to_string()),
                    _ => data.mode_names.push(line.to_string()),
                }
            }
            saw_rules |= section == "rule names:";
        }

        if !saw_rules {
            return MissingSection { section: "rule names" }.fail();
        }

        let atn = atn.context(MissingSection { section: "atn" })?;
        data.serialized_atn = atn
            .trim()
            .trim_start_matches('[')
            .trim_end_matches(']')
            .split(',')
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(|value| value.parse::<i32>().ok().context(InvalidAtnValue { value }))
            .collect::<Result<_, _>>()?;

        Ok(data)
    }
}

impl fmt::Display for InterpreterData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn names<'a>(
            f: &mut fmt::Formatter<'_>, header: &str, entries: impl Iterator<Item = Option<&'a str>>,
        ) -> fmt::Result {
            writeln!(f, "{}", header)?;
            for name in entries {
                writeln!(f, "{}", name.unwrap_or("null"))?;
            }
            writeln!(f)
        }

        names(f, "token literal names:", self.literal_names.iter().map(Option::as_deref))?;
        names(f, "token symbolic names:", self.symbolic_names.iter().map(Option::as_deref))?;
        names(f, "rule names:", self.rule_names.iter().map(|n| Some(n.as_str())))?;
        if !self.channel_names.is_empty() {
            names(f, "channel names:", self.channel_names.iter().map(|n| Some(n.as_str())))?;
        }
        if !self.mode_names.is_empty() {
            names(f, "mode names:", self.mode_names.iter().map(|n| Some(n.as_str())))?;
        }

        let atn = self.serialized_atn.iter().map(ToString::to_string).collect::<Vec<_>>();
        writeln!(f, "atn:")?;
        writeln!(f, "[{}]", atn.join(", "))
    }
}
