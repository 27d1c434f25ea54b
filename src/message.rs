//! Chat-message front end around the engine.
//!
//! Pulls a program and its input out of a message, runs it, and lays the
//! result out as one or more transport-sized messages.

use tracing::info;

use crate::machine::{Machine, MachineConfig};

/// Settings for the chat front end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageConfig {
    /// Language tag that marks a code block as a program, e.g. ```` ```bf ````.
    pub language_tag: String,
    /// Maximum characters per outgoing message.
    pub message_limit: usize,
}

impl Default for MessageConfig {
    fn default() -> Self {
        Self {
            language_tag: "bf".to_string(),
            message_limit: 2000,
        }
    }
}

/// A program and the input text that followed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub code: String,
    pub input: String,
}

/// Find the first code block tagged with `tag` and split the message into
/// program text and input text.
///
/// The code runs from just after `` `<tag> `` up to the next backtick and must
/// be non-empty. The input is whatever follows the closing fence, minus one
/// leading whitespace character if present.
pub fn extract(text: &str, tag: &str) -> Option<Submission> {
    let marker = format!("`{tag}");
    for (start, _) in text.match_indices(&marker) {
        let body = &text[start + marker.len()..];
        let Some(close) = body.find('`') else {
            continue;
        };
        if close == 0 {
            continue;
        }
        // Skip the closing backtick, then the rest of a triple fence.
        let rest = &body[close + 1..];
        let rest = rest.strip_prefix("``").unwrap_or(rest);
        let mut chars = rest.chars();
        let input = match chars.next() {
            Some(c) if c.is_whitespace() => chars.as_str(),
            _ => rest,
        };
        return Some(Submission {
            code: body[..close].to_string(),
            input: input.to_string(),
        });
    }
    None
}

/// Escape backticks so the input can be echoed inside an inline code span.
pub fn escape_input(input: &str) -> String {
    input.replace('`', "\\`")
}

/// Wrap the character at byte offset `position` in `»»»` / `«««`.
///
/// A position at or past the end (or not on a char boundary) appends an empty
/// marker instead.
pub fn highlight(code: &str, position: usize) -> String {
    let target = code
        .get(position..)
        .and_then(|tail| tail.chars().next())
        .map(|c| position + c.len_utf8());
    match target {
        Some(end) => format!(
            "{}»»»{}«««{}",
            &code[..position],
            &code[position..end],
            &code[end..]
        ),
        None => format!("{code}»»»«««"),
    }
}

/// Decode engine output for display, one char per byte (Latin-1).
pub fn decode_output(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

/// Lazy, restartable split of a message into pieces of at most `limit` chars.
#[derive(Debug, Clone)]
pub struct Chunks<'a> {
    rest: &'a str,
    limit: usize,
}

impl<'a> Iterator for Chunks<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        if self.rest.is_empty() {
            return None;
        }
        let split = self
            .rest
            .char_indices()
            .nth(self.limit)
            .map_or(self.rest.len(), |(i, _)| i);
        let (head, tail) = self.rest.split_at(split);
        self.rest = tail;
        Some(head)
    }
}

/// Split `msg` into chunks of at most `limit` characters. An empty message
/// yields nothing; a zero limit is treated as 1.
pub fn chunks(msg: &str, limit: usize) -> Chunks<'_> {
    Chunks {
        rest: msg,
        limit: limit.max(1),
    }
}

/// The rendered reply to one submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Code section, with the offending character highlighted on failure.
    pub code: String,
    /// Error and tape dump section; empty on success.
    pub error: String,
    pub input: String,
    pub output: String,
    limit: usize,
}

impl Response {
    /// The whole reply as a single string.
    pub fn full(&self) -> String {
        format!("{}\n{}\n{}\n{}", self.code, self.error, self.input, self.output)
    }

    /// Messages to send, in order.
    ///
    /// A reply that fits the limit goes out whole. Otherwise each section is
    /// chunked on its own so that a long output does not split the code block.
    pub fn messages(&self) -> Vec<String> {
        let full = self.full();
        if full.chars().count() <= self.limit {
            return vec![full];
        }
        [&self.code, &self.error, &self.input, &self.output]
            .into_iter()
            .filter(|section| !section.is_empty())
            .flat_map(|section| chunks(section, self.limit))
            .map(str::to_string)
            .collect()
    }
}

/// Run the program found in `text`, if any, and build the reply.
pub fn respond(
    text: &str,
    machine_config: &MachineConfig,
    config: &MessageConfig,
) -> Option<Response> {
    let submission = extract(text, &config.language_tag)?;
    let mut machine =
        Machine::with_config(&submission.code, &submission.input, machine_config.clone());

    let (code, error, output) = match machine.run() {
        Ok(output) => (submission.code.clone(), String::new(), output),
        Err(failure) => {
            let position = failure.fault.diagnostic().position;
            (
                highlight(&submission.code, position),
                format!("ERROR: `{}`\n DUMP: ```{}```", failure.fault, failure.dump),
                failure.output,
            )
        }
    };

    info!(
        code_len = submission.code.len(),
        input_len = submission.input.len(),
        output_len = output.len(),
        steps = machine.steps(),
        failed = !error.is_empty(),
        "processed submission"
    );

    let input = if submission.input.is_empty() {
        "Input: ".to_string()
    } else {
        format!("Input: `{}`", escape_input(&submission.input))
    };

    Some(Response {
        code: format!("Code: ```{}\n{code}```", config.language_tag),
        error,
        input,
        output: format!("Output: {}", decode_output(&output)),
        limit: config.message_limit,
    })
}
