//! Route path templates such as `/file/{name}.zip`.
//!
//! A template is split on `/` into segments, and each segment into literal
//! runs and `{name}` parameters. Matching is strictly segment-for-segment: a
//! parameter never spans a `/`.

use compact_str::CompactString;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Literal(CompactString),
    Param(CompactString),
}

/// Parameters captured while matching a path, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams(Vec<(CompactString, CompactString)>);

impl PathParams {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Keys are unique: a repeated name overwrites the earlier capture.
    pub fn insert(&mut self, name: &str, value: &str) {
        match self.0.iter_mut().find(|(key, _)| key == name) {
            Some((_, existing)) => *existing = value.into(),
            None => self.0.push((name.into(), value.into())),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct PathTemplate {
    raw: CompactString,
    segments: Vec<Vec<Token>>,
    malformed: bool,
}

fn split_segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|segment| !segment.is_empty())
}

impl PathTemplate {
    /// Never fails. An unterminated `{` turns the rest of its segment into a
    /// literal, which makes the route unreachable for well-formed paths.
    pub fn parse(pattern: &str) -> Self {
        let mut malformed = false;
        let segments = split_segments(pattern)
            .map(|segment| {
                let (tokens, unterminated) = parse_segment(segment);
                malformed |= unterminated;
                tokens
            })
            .collect();

        Self {
            raw: pattern.into(),
            segments,
            malformed,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn is_malformed(&self) -> bool {
        self.malformed
    }

    pub fn segments(&self) -> &[Vec<Token>] {
        &self.segments
    }

    pub fn matches(&self, path: &str) -> Option<PathParams> {
        let components = split_segments(path).collect::<Vec<_>>();
        if components.len() != self.segments.len() {
            return None;
        }

        let mut params = PathParams::default();
        for (tokens, segment) in self.segments.iter().zip(components) {
            if !match_segment(tokens, segment, &mut params) {
                return None;
            }
        }

        Some(params)
    }
}

fn parse_segment(segment: &str) -> (Vec<Token>, bool) {
    let mut tokens = Vec::new();
    let mut rest = segment;

    while !rest.is_empty() {
        if let Some(after_brace) = rest.strip_prefix('{') {
            let Some(end) = after_brace.find('}') else {
                tokens.push(Token::Literal(rest.into()));
                return (tokens, true);
            };
            tokens.push(Token::Param(after_brace[..end].into()));
            rest = &after_brace[end + 1..];
        } else {
            let next = rest.find('{').unwrap_or(rest.len());
            tokens.push(Token::Literal(rest[..next].into()));
            rest = &rest[next..];
        }
    }

    (tokens, false)
}

fn match_segment(tokens: &[Token], segment: &str, params: &mut PathParams) -> bool {
    let mut rest = segment;

    for (idx, token) in tokens.iter().enumerate() {
        match token {
            Token::Literal(literal) => match rest.strip_prefix(literal.as_str()) {
                Some(remaining) => rest = remaining,
                None => return false,
            },
            Token::Param(name) => {
                let next_literal = match tokens.get(idx + 1) {
                    Some(Token::Literal(literal)) if !literal.is_empty() => Some(literal),
                    _ => None,
                };

                match next_literal {
                    Some(literal) => {
                        let Some(end) = rest.find(literal.as_str()) else {
                            return false;
                        };
                        params.insert(name, &rest[..end]);
                        rest = &rest[end..];
                    }
                    None => {
                        params.insert(name, rest);
                        rest = "";
                    }
                }
            }
        }
    }

    rest.is_empty()
}
