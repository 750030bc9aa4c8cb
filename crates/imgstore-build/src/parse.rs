//! Reads Dockerfile text back into a [`Descriptor`].
//!
//! Only what the descriptor emits is modelled; other instructions are kept
//! as [`Instruction::Other`]. Shell-form `CMD` is split on whitespace.

use crate::descriptor::{Descriptor, Instruction, Stage};

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("line {line}: {keyword} before the first FROM")]
    InstructionBeforeFrom { line: usize, keyword: String },

    #[error("line {line}: malformed {keyword} instruction")]
    Malformed { line: usize, keyword: String },

    #[error("line {line}: invalid port {value:?}")]
    InvalidPort { line: usize, value: String },

    #[error("line {line}: CMD is not a valid JSON array")]
    InvalidCmd {
        line: usize,
        source: serde_json::Error,
    },
}

impl Descriptor {
    /// Parse Dockerfile text.
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        let mut stages: Vec<Stage> = Vec::new();

        for (line, content) in logical_lines(text) {
            let (keyword, rest) = match content.split_once(char::is_whitespace) {
                Some((k, r)) => (k.to_ascii_uppercase(), r.trim().to_owned()),
                None => (content.to_ascii_uppercase(), String::new()),
            };

            if keyword == "FROM" {
                stages.push(parse_from(line, &rest)?);
                continue;
            }

            let Some(stage) = stages.last_mut() else {
                if keyword == "ARG" {
                    tracing::debug!(line, "skipping global ARG");
                    continue;
                }
                return Err(ParseError::InstructionBeforeFrom { line, keyword });
            };

            match keyword.as_str() {
                "WORKDIR" => stage.instructions.push(Instruction::Workdir(rest)),
                "RUN" => stage.instructions.push(Instruction::Run(rest)),
                "COPY" => stage.instructions.push(parse_copy(line, &rest)?),
                "ENV" => stage.instructions.extend(parse_env(line, &rest)?),
                "EXPOSE" => {
                    for value in rest.split_whitespace() {
                        let port = value
                            .split('/')
                            .next()
                            // arch-lint: allow(no-silent-result-drop) reason="the offending value is reported as InvalidPort below"
                            .and_then(|p| p.parse::<u16>().ok())
                            .ok_or_else(|| ParseError::InvalidPort {
                                line,
                                value: value.to_owned(),
                            })?;
                        stage.instructions.push(Instruction::Expose(port));
                    }
                }
                "CMD" => {
                    let args = if rest.starts_with('[') {
                        serde_json::from_str::<Vec<String>>(&rest)
                            .map_err(|e| ParseError::InvalidCmd { line, source: e })?
                    } else {
                        rest.split_whitespace().map(str::to_owned).collect()
                    };
                    stage.instructions.push(Instruction::Cmd(args));
                }
                _ => stage.instructions.push(Instruction::Other {
                    keyword: keyword.clone(),
                    args: rest,
                }),
            }
        }

        Ok(Self { stages })
    }
}

/// Joins `\` continuations and drops comments and blank lines.
/// Yields the 1-based number of the line each instruction starts on.
fn logical_lines(text: &str) -> Vec<(usize, String)> {
    let mut out = Vec::new();
    let mut pending: Option<(usize, String)> = None;

    for (idx, raw) in text.lines().enumerate() {
        let trimmed = raw.trim();
        if pending.is_none() && (trimmed.is_empty() || trimmed.starts_with('#')) {
            continue;
        }

        let (start, mut acc) = pending.take().unwrap_or((idx + 1, String::new()));
        if trimmed.starts_with('#') {
            // comment inside a continuation
            pending = Some((start, acc));
            continue;
        }

        if let Some(body) = trimmed.strip_suffix('\\') {
            acc.push_str(body.trim_end());
            acc.push(' ');
            pending = Some((start, acc));
        } else {
            acc.push_str(trimmed);
            out.push((start, acc.trim().to_owned()));
        }
    }

    if let Some((start, acc)) = pending {
        let acc = acc.trim().to_owned();
        if !acc.is_empty() {
            out.push((start, acc));
        }
    }

    out
}

fn parse_from(line: usize, rest: &str) -> Result<Stage, ParseError> {
    let words: Vec<&str> = rest
        .split_whitespace()
        .filter(|w| !w.starts_with("--"))
        .collect();

    let (image, alias) = match words.as_slice() {
        [image] => (*image, None),
        [image, as_kw, alias] if as_kw.eq_ignore_ascii_case("as") => (*image, Some(*alias)),
        _ => {
            return Err(ParseError::Malformed {
                line,
                keyword: "FROM".to_owned(),
            });
        }
    };

    Ok(Stage {
        title: None,
        image: image.to_owned(),
        alias: alias.map(str::to_owned),
        instructions: Vec::new(),
    })
}

fn parse_copy(line: usize, rest: &str) -> Result<Instruction, ParseError> {
    let mut from = None;
    let mut paths = Vec::new();
    for word in rest.split_whitespace() {
        if let Some(stage) = word.strip_prefix("--from=") {
            from = Some(stage.to_owned());
        } else if !word.starts_with("--") {
            paths.push(word.to_owned());
        }
    }

    let Some(dest) = paths.pop() else {
        return Err(malformed_copy(line));
    };
    if paths.is_empty() {
        return Err(malformed_copy(line));
    }

    Ok(Instruction::Copy {
        from,
        sources: paths,
        dest,
    })
}

fn malformed_copy(line: usize) -> ParseError {
    ParseError::Malformed {
        line,
        keyword: "COPY".to_owned(),
    }
}

fn parse_env(line: usize, rest: &str) -> Result<Vec<Instruction>, ParseError> {
    let words = split_words(rest);
    let malformed = || ParseError::Malformed {
        line,
        keyword: "ENV".to_owned(),
    };

    let Some(first) = words.first() else {
        return Err(malformed());
    };

    // Legacy form: `ENV KEY value with spaces`
    if !first.contains('=') {
        let value = rest
            .split_once(char::is_whitespace)
            .map(|(_, v)| v.trim().to_owned())
            .ok_or_else(malformed)?;
        return Ok(vec![Instruction::Env {
            key: first.clone(),
            value,
        }]);
    }

    words
        .into_iter()
        .map(|word| {
            word.split_once('=')
                .map(|(k, v)| Instruction::Env {
                    key: k.to_owned(),
                    value: v.to_owned(),
                })
                .ok_or_else(malformed)
        })
        .collect()
}

/// Splits on whitespace, honoring double quotes and backslash escapes inside them.
fn split_words(input: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut started = false;
    let mut chars = input.chars();

    while let Some(c) = chars.next() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                started = true;
            }
            '\\' if in_quotes => {
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            c if c.is_whitespace() && !in_quotes => {
                if started {
                    words.push(std::mem::take(&mut current));
                    started = false;
                }
            }
            c => {
                current.push(c);
                started = true;
            }
        }
    }
    if started {
        words.push(current);
    }
    words
}
