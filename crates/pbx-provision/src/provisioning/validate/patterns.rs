//! Dial-pattern compilation shared by the validator and the renderer.
//!
//! Prefix patterns use the numbering wildcards `X` (0-9), `N` (2-9), `Z`
//! (1-9) and a trailing `.` (one or more further digits) over the literals
//! `0-9 * #`. Extension ranges compile to anchored digit regexes through
//! decimal span decomposition so the dial plan can match "number in range"
//! without arithmetic at call time.

use std::fmt::Write as _;

use regex::Regex;

use crate::provisioning::model::{DialPattern, ExtensionRange};

#[derive(Debug, thiserror::Error)]
pub enum PatternError {
    #[error("pattern is empty")]
    Empty,
    #[error("'{0}' is not a valid dial-pattern character")]
    InvalidCharacter(char),
    #[error("'.' may only appear as the final pattern character")]
    MisplacedDot,
    #[error("pattern does not compile: {0}")]
    Regex(#[from] regex::Error),
    #[error("rewrite references capture group {index} but the pattern defines {available}")]
    RewriteGroupOutOfRange { index: usize, available: usize },
    #[error("rewrite contains '$' without a capture group number")]
    DanglingRewriteMarker,
}

/// Compile a dial pattern into an anchored regex.
///
/// Prefix patterns are wrapped in a single capture group so `$1` always
/// names the full dialed number; regex patterns keep their own groups and
/// are anchored only if the author left the anchors off.
pub fn compile_pattern(pattern: &DialPattern) -> Result<Regex, PatternError> {
    let expression = pattern_expression(pattern)?;
    Ok(Regex::new(&expression)?)
}

/// The anchored regex source for a pattern, as embedded in rendered rules.
pub fn pattern_expression(pattern: &DialPattern) -> Result<String, PatternError> {
    match pattern {
        DialPattern::Prefix(raw) => expand_prefix(raw),
        DialPattern::Regex(raw) => {
            if raw.is_empty() {
                return Err(PatternError::Empty);
            }
            let mut expression = String::with_capacity(raw.len() + 2);
            if !raw.starts_with('^') {
                expression.push('^');
            }
            expression.push_str(raw);
            if !raw.ends_with('$') {
                expression.push('$');
            }
            // Validate eagerly so the caller gets the regex error, not the
            // renderer.
            Regex::new(&expression)?;
            Ok(expression)
        }
    }
}

fn expand_prefix(raw: &str) -> Result<String, PatternError> {
    if raw.is_empty() {
        return Err(PatternError::Empty);
    }

    let mut expanded = String::with_capacity(raw.len() * 4 + 4);
    expanded.push_str("^(");
    let last = raw.chars().count() - 1;
    for (position, ch) in raw.chars().enumerate() {
        match ch {
            '0'..='9' | '#' => expanded.push(ch),
            '*' => expanded.push_str("\\*"),
            'X' | 'x' => expanded.push_str("[0-9]"),
            'N' | 'n' => expanded.push_str("[2-9]"),
            'Z' | 'z' => expanded.push_str("[1-9]"),
            '.' if position == last => expanded.push_str("[0-9]+"),
            '.' => return Err(PatternError::MisplacedDot),
            other => return Err(PatternError::InvalidCharacter(other)),
        }
    }
    expanded.push_str(")$");
    Ok(expanded)
}

/// Check a `$n` rewrite template against the groups a pattern defines.
pub fn check_rewrite(pattern: &DialPattern, template: &str) -> Result<(), PatternError> {
    let regex = compile_pattern(pattern)?;
    let available = regex.captures_len() - 1;

    let mut chars = template.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch != '$' {
            continue;
        }
        let mut index = String::new();
        while let Some(digit) = chars.peek().filter(|c| c.is_ascii_digit()) {
            index.push(*digit);
            chars.next();
        }
        if index.is_empty() {
            return Err(PatternError::DanglingRewriteMarker);
        }
        let index: usize = index.parse().unwrap_or(usize::MAX);
        if index > available {
            return Err(PatternError::RewriteGroupOutOfRange { index, available });
        }
    }
    Ok(())
}

/// Anchored regex matching exactly the numbers inside an extension range,
/// with the whole number in capture group one.
pub fn range_expression(range: &ExtensionRange) -> String {
    let mut alternatives = Vec::new();
    let mut width = digits(range.start);
    while width <= digits(range.end) {
        let floor = if width == 1 { 0 } else { 10u32.pow(width - 1) };
        let ceiling = 10u32
            .checked_pow(width)
            .map(|bound| bound - 1)
            .unwrap_or(u32::MAX);
        let lo = range.start.max(floor);
        let hi = range.end.min(ceiling);
        if lo <= hi {
            span_alternatives(
                &lo.to_string().into_bytes(),
                &hi.to_string().into_bytes(),
                &mut alternatives,
            );
        }
        width += 1;
    }

    format!("^({})$", alternatives.join("|"))
}

fn digits(value: u32) -> u32 {
    value.to_string().len() as u32
}

/// Decompose an equal-width decimal span into regex alternatives.
fn span_alternatives(lo: &[u8], hi: &[u8], out: &mut Vec<String>) {
    debug_assert_eq!(lo.len(), hi.len());
    if lo == hi {
        out.push(String::from_utf8_lossy(lo).into_owned());
        return;
    }

    if lo[0] == hi[0] {
        let mut nested = Vec::new();
        span_alternatives(&lo[1..], &hi[1..], &mut nested);
        for alternative in nested {
            out.push(format!("{}{}", lo[0] as char, alternative));
        }
        return;
    }

    // Low branch: numbers sharing lo's leading digit, at or above lo.
    for alternative in at_least(&lo[1..]) {
        out.push(format!("{}{}", lo[0] as char, alternative));
    }
    // Middle branch: leading digits strictly between, rest free.
    if hi[0] - lo[0] >= 2 {
        out.push(format!(
            "{}{}",
            digit_class(lo[0] + 1, hi[0] - 1),
            free_digits(lo.len() - 1)
        ));
    }
    // High branch: numbers sharing hi's leading digit, at or below hi.
    for alternative in at_most(&hi[1..]) {
        out.push(format!("{}{}", hi[0] as char, alternative));
    }
}

/// Alternatives matching all equal-width numbers >= `bound`.
fn at_least(bound: &[u8]) -> Vec<String> {
    if bound.is_empty() {
        return vec![String::new()];
    }
    let mut out = Vec::new();
    for alternative in at_least(&bound[1..]) {
        out.push(format!("{}{}", bound[0] as char, alternative));
    }
    if bound[0] < b'9' {
        out.push(format!(
            "{}{}",
            digit_class(bound[0] + 1, b'9'),
            free_digits(bound.len() - 1)
        ));
    }
    out
}

/// Alternatives matching all equal-width numbers <= `bound`.
fn at_most(bound: &[u8]) -> Vec<String> {
    if bound.is_empty() {
        return vec![String::new()];
    }
    let mut out = Vec::new();
    if bound[0] > b'0' {
        out.push(format!(
            "{}{}",
            digit_class(b'0', bound[0] - 1),
            free_digits(bound.len() - 1)
        ));
    }
    for alternative in at_most(&bound[1..]) {
        out.push(format!("{}{}", bound[0] as char, alternative));
    }
    out
}

fn digit_class(low: u8, high: u8) -> String {
    if low == high {
        (low as char).to_string()
    } else if low == b'0' && high == b'9' {
        "[0-9]".to_string()
    } else {
        format!("[{}-{}]", low as char, high as char)
    }
}

fn free_digits(count: usize) -> String {
    match count {
        0 => String::new(),
        1 => "[0-9]".to_string(),
        n => {
            let mut spec = String::new();
            write!(spec, "[0-9]{{{n}}}").expect("write digit span");
            spec
        }
    }
}
