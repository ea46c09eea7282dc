//! Defensive checks run on every registered helper script.

use super::RuntimeMode;
use crate::core::error::AppError;
use regex::Regex;
use std::sync::LazyLock;

static EXEC_SYNC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bexecSync\b").expect("execSync regex is valid"));

static ACTIONS_GLOBAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|[^\w$.])(core|exec|github)\.").expect("actions global regex is valid"));

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ScriptGuardError {
    #[error("script '{script}' uses execSync on line {line}; GitHub Script helpers must use exec.exec instead")]
    ExecSync { script: String, line: usize },
    #[error("script '{script}' references the GitHub Actions global '{global}' on line {line}; Node.js helpers run outside actions/github-script")]
    ActionsGlobal {
        script: String,
        global: String,
        line: usize,
    },
}

impl From<ScriptGuardError> for AppError {
    fn from(error: ScriptGuardError) -> Self {
        let script = match &error {
            ScriptGuardError::ExecSync { script, .. } | ScriptGuardError::ActionsGlobal { script, .. } => script.clone(),
        };
        AppError::compiler_bug(error.to_string())
            .with_code("AW-BUG-030")
            .with_context("script", script)
    }
}

/// Reject `execSync` in scripts that run inside `actions/github-script`.
pub fn validate_no_exec_sync(name: &str, body: &str, mode: RuntimeMode) -> Result<(), ScriptGuardError> {
    if mode != RuntimeMode::GitHubScript {
        return Ok(());
    }
    let code = strip_comments_and_strings(body);
    match EXEC_SYNC_RE.find(&code) {
        Some(found) => Err(ScriptGuardError::ExecSync {
            script: name.to_string(),
            line: line_of(&code, found.start()),
        }),
        None => Ok(()),
    }
}

/// Reject unqualified `core.`, `exec.` and `github.` in plain Node.js scripts.
pub fn validate_no_github_script_globals(name: &str, body: &str, mode: RuntimeMode) -> Result<(), ScriptGuardError> {
    if mode != RuntimeMode::NodeJs {
        return Ok(());
    }
    let code = strip_comments_and_strings(body);
    match ACTIONS_GLOBAL_RE.captures(&code).and_then(|caps| caps.get(1)) {
        Some(global) => Err(ScriptGuardError::ActionsGlobal {
            script: name.to_string(),
            global: global.as_str().to_string(),
            line: line_of(&code, global.start()),
        }),
        None => Ok(()),
    }
}

fn line_of(code: &str, offset: usize) -> usize {
    code[..offset].matches('\n').count() + 1
}

/// Blank out comments, string/template literals and regex literals, keeping
/// newlines so offsets still map to source lines.
pub fn strip_comments_and_strings(source: &str) -> String {
    let chars: Vec<char> = source.chars().collect();
    let mut out = String::with_capacity(source.len());
    let mut i = 0;
    // last significant code character, used to tell a regex from a division
    let mut last_code: Option<char> = None;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();
        match c {
            '/' if next == Some('/') => {
                while i < chars.len() && chars[i] != '\n' {
                    out.push(' ');
                    i += 1;
                }
            }
            '/' if next == Some('*') => {
                out.push_str("  ");
                i += 2;
                while i < chars.len() && !(chars[i] == '*' && chars.get(i + 1) == Some(&'/')) {
                    out.push(blank(chars[i]));
                    i += 1;
                }
                if i < chars.len() {
                    out.push_str("  ");
                    i += 2;
                }
            }
            '\'' | '"' | '`' => {
                out.push(' ');
                i = skip_quoted(&chars, i + 1, c, &mut out);
                last_code = Some(c);
            }
            '/' if starts_regex(last_code) => {
                out.push(' ');
                i = skip_regex(&chars, i + 1, &mut out);
                last_code = Some('/');
            }
            _ => {
                out.push(c);
                if !c.is_whitespace() {
                    last_code = Some(c);
                }
                i += 1;
            }
        }
    }
    out
}

fn blank(c: char) -> char {
    if c == '\n' {
        '\n'
    } else {
        ' '
    }
}

fn skip_quoted(chars: &[char], mut i: usize, quote: char, out: &mut String) -> usize {
    while i < chars.len() {
        let c = chars[i];
        if c == '\\' {
            out.push(' ');
            if let Some(escaped) = chars.get(i + 1) {
                out.push(blank(*escaped));
            }
            i += 2;
            continue;
        }
        if c == quote {
            out.push(' ');
            return i + 1;
        }
        // unterminated single-line string
        if c == '\n' && quote != '`' {
            out.push('\n');
            return i + 1;
        }
        out.push(blank(c));
        i += 1;
    }
    i
}

fn starts_regex(last_code: Option<char>) -> bool {
    match last_code {
        None => true,
        Some(c) => "(,=:[!&|?{};+-*%<>~^".contains(c),
    }
}

fn skip_regex(chars: &[char], mut i: usize, out: &mut String) -> usize {
    let mut in_class = false;
    while i < chars.len() {
        let c = chars[i];
        match c {
            '\\' => {
                out.push_str("  ");
                i += 2;
                continue;
            }
            '[' => in_class = true,
            ']' => in_class = false,
            '/' if !in_class => {
                out.push(' ');
                return i + 1;
            }
            '\n' => {
                out.push('\n');
                return i + 1;
            }
            _ => {}
        }
        out.push(' ');
        i += 1;
    }
    i
}
