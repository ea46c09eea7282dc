//! Maps a JSON pointer back to a line and column in block-style YAML text.
//!
//! Only block mappings and sequences are followed; when a segment lives in a
//! flow collection the position of the deepest located ancestor is returned.

/// 1-based `(line, column)` of the node at `pointer`, relative to `text`.
pub fn locate(text: &str, pointer: &str) -> Option<(usize, usize)> {
    let lines: Vec<&str> = text.lines().collect();
    let segments: Vec<String> = pointer
        .split('/')
        .skip(1)
        .filter(|segment| !segment.is_empty())
        .map(|segment| segment.replace("~1", "/").replace("~0", "~"))
        .collect();

    let mut found: Option<(usize, usize)> = None;
    // (first candidate line, indent of the parent node)
    let mut start = 0usize;
    let mut parent_indent: isize = -1;

    for segment in &segments {
        let located = match segment.parse::<usize>() {
            Ok(index) => find_item(&lines, start, parent_indent, index),
            Err(_) => find_key(&lines, start, parent_indent, segment),
        };
        match located {
            Some((line, indent)) => {
                found = Some((line + 1, indent + 1));
                parent_indent = indent as isize;
                // Keys of a `- key: value` item start on the item line itself.
                let item_line = segment.parse::<usize>().is_ok() && lines[line].trim_start().starts_with("- ");
                start = if item_line { line } else { line + 1 };
            }
            None => break,
        }
    }
    found.or(Some((1, 1)))
}

fn indent_of(line: &str) -> usize {
    line.len() - line.trim_start().len()
}

fn is_content(line: &str) -> bool {
    let trimmed = line.trim_start();
    !trimmed.is_empty() && !trimmed.starts_with('#')
}

fn find_key(lines: &[&str], start: usize, parent_indent: isize, key: &str) -> Option<(usize, usize)> {
    for (offset, line) in lines.iter().enumerate().skip(start) {
        if !is_content(line) {
            continue;
        }
        let mut indent = indent_of(line);
        let mut rest = line.trim_start();
        let item_head = offset == start && rest.starts_with("- ");
        if (indent as isize) <= parent_indent && !item_head {
            return None;
        }
        if let Some(stripped) = rest.strip_prefix("- ") {
            indent += 2;
            rest = stripped;
        }
        if (indent as isize) <= parent_indent {
            continue;
        }
        let unquoted = rest
            .strip_prefix('"')
            .and_then(|r| r.strip_prefix(key).and_then(|r| r.strip_prefix('"')))
            .or_else(|| {
                rest.strip_prefix('\'')
                    .and_then(|r| r.strip_prefix(key).and_then(|r| r.strip_prefix('\'')))
            })
            .or_else(|| rest.strip_prefix(key));
        if let Some(after) = unquoted {
            if after.trim_start().starts_with(':') {
                return Some((offset, indent));
            }
        }
    }
    None
}

fn find_item(lines: &[&str], start: usize, parent_indent: isize, index: usize) -> Option<(usize, usize)> {
    let mut item_indent: Option<usize> = None;
    let mut seen = 0usize;
    for (offset, line) in lines.iter().enumerate().skip(start) {
        if !is_content(line) {
            continue;
        }
        let indent = indent_of(line);
        if (indent as isize) < parent_indent || ((indent as isize) == parent_indent && !line.trim_start().starts_with("- ")) {
            return None;
        }
        if !line.trim_start().starts_with('-') {
            continue;
        }
        let expected = *item_indent.get_or_insert(indent);
        if indent != expected {
            continue;
        }
        if seen == index {
            return Some((offset, indent));
        }
        seen += 1;
    }
    None
}
