use crate::prompts::{EditArgs, EDITOR_PERSONA};
use crate::research::context::ResearchContext;
use crate::research::models::Section;
use crate::types::Result;

impl ResearchContext {
    /// Rewrite a section as neutral plain prose
    ///
    /// One assistant call, then [`strip_markup`] over the answer. A section
    /// without paragraphs is returned as is. If the answer is empty after
    /// cleanup, the original paragraphs are kept, cleaned.
    pub async fn edit_section(&self, section: Section) -> Result<Section> {
        if section.paragraphs.is_empty() {
            tracing::debug!(section = %section.title, "edit_skipped_empty_section");
            return Ok(section);
        }

        tracing::info!(
            section = %section.title,
            paragraphs = section.paragraphs.len(),
            "editing_section"
        );

        let request = self.prompts().render(&EditArgs {
            title: &section.title,
            paragraphs: &section.paragraphs,
        })?;
        let edited = self.assistant().ask(EDITOR_PERSONA, &request).await?;

        let mut paragraphs = split_paragraphs(&strip_markup(&edited));
        if paragraphs.is_empty() {
            tracing::warn!(section = %section.title, "edit_returned_nothing");
            paragraphs = section
                .paragraphs
                .iter()
                .flat_map(|p| split_paragraphs(&strip_markup(p)))
                .collect();
        }

        Ok(Section::new(section.title, paragraphs))
    }
}

/// Split text on blank lines into trimmed, non-empty paragraphs
///
/// Lines inside one paragraph are joined with a single space.
pub fn split_paragraphs(text: &str) -> Vec<String> {
    let mut paragraphs = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            if !current.is_empty() {
                paragraphs.push(current.join(" "));
                current.clear();
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        paragraphs.push(current.join(" "));
    }

    paragraphs
}

/// Remove markdown, HTML and LaTeX markup, keeping the words
///
/// Heading lines (`#` to `######` followed by a space), code fences and
/// horizontal rules are dropped; list and quote markers are removed from line
/// starts. Inline, only paired emphasis delimiters, `$...$` math delimiters,
/// backslashes escaping markdown punctuation, backticks and tags are removed;
/// links keep their text. A lone `*`, `$` or `\` is ordinary text. Applying it
/// twice gives the same result as applying it once.
pub fn strip_markup(text: &str) -> String {
    let mut current = strip_once(text);
    loop {
        let next = strip_once(&current);
        // every pass only removes characters, so this terminates
        if next == current {
            return current;
        }
        current = next;
    }
}

fn strip_once(text: &str) -> String {
    let mut lines = Vec::new();

    for line in text.lines() {
        let inline = strip_inline(line);
        match strip_line(inline.trim()) {
            Some(line) => lines.push(line),
            None => continue,
        }
    }

    lines.join("\n")
}

/// Line-level markup; `None` drops the line
fn strip_line(line: &str) -> Option<String> {
    let mut line = line;

    loop {
        if is_heading(line) {
            return None;
        }
        if is_rule(line) {
            return None;
        }

        let stripped = strip_list_marker(line)
            .or_else(|| line.strip_prefix('>'))
            .map(str::trim_start);

        match stripped {
            Some(rest) => line = rest,
            None => return Some(line.to_string()),
        }
    }
}

/// `#` to `######`, then whitespace or the end of the line
fn is_heading(line: &str) -> bool {
    let hashes = line.chars().take_while(|&c| c == '#').count();
    (1..=6).contains(&hashes)
        && line[hashes..].chars().next().map_or(true, char::is_whitespace)
}

fn is_rule(line: &str) -> bool {
    let compact: String = line.chars().filter(|c| !c.is_whitespace()).collect();
    compact.len() >= 3
        && ['-', '_', '=', '*']
            .iter()
            .any(|&rule| compact.chars().all(|c| c == rule))
}

fn strip_list_marker(line: &str) -> Option<&str> {
    for marker in ["- ", "+ ", "* "] {
        if let Some(rest) = line.strip_prefix(marker) {
            return Some(rest);
        }
    }

    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 && digits <= 3 {
        let rest = &line[digits..];
        for marker in [". ", ") "] {
            if let Some(rest) = rest.strip_prefix(marker) {
                return Some(rest);
            }
        }
    }

    None
}

fn strip_inline(line: &str) -> String {
    let chars: Vec<char> = line.chars().collect();
    strip_chars(&chars)
}

fn strip_chars(chars: &[char]) -> String {
    let mut out = String::with_capacity(chars.len());
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '`' => i += 1,
            '\\' => match chars.get(i + 1) {
                Some(&next) if is_escapable(next) => {
                    out.push(next);
                    i += 2;
                }
                _ => {
                    out.push('\\');
                    i += 1;
                }
            },
            '*' | '_' => {
                let run = delimiter_run(chars, i);
                match closing_delimiter(chars, i, run) {
                    Some(close) => {
                        out.push_str(&strip_chars(&chars[i + run..close]));
                        i = close + run;
                    }
                    None => {
                        out.extend(&chars[i..i + run]);
                        i += run;
                    }
                }
            }
            '$' => match math_end(chars, i) {
                Some(end) => {
                    out.extend(&chars[i + 1..end]);
                    i = end + 1;
                }
                None => {
                    out.push('$');
                    i += 1;
                }
            },
            '<' if is_tag_start(chars.get(i + 1)) => {
                match chars[i..].iter().position(|&c| c == '>') {
                    Some(end) => i += end + 1,
                    None => {
                        out.push('<');
                        i += 1;
                    }
                }
            }
            '[' => match link_text(&chars[i..]) {
                Some((text, consumed)) => {
                    out.push_str(&text);
                    i += consumed;
                }
                None => {
                    out.push('[');
                    i += 1;
                }
            },
            c => {
                out.push(c);
                i += 1;
            }
        }
    }

    out
}

/// ASCII punctuation markdown lets a backslash escape
fn is_escapable(c: char) -> bool {
    "\\`*_{}[]()#+-.!|<>~$".contains(c)
}

/// Length of the run of identical delimiter chars starting at `at`
fn delimiter_run(chars: &[char], at: usize) -> usize {
    chars[at..].iter().take_while(|&&c| c == chars[at]).count()
}

/// Index of the run closing the emphasis opened at `open`
///
/// An opener is followed by a non-space, a closer is preceded by one and has
/// the same length. Underscores must also sit on word boundaries, so
/// `data_stack` is left alone.
fn closing_delimiter(chars: &[char], open: usize, run: usize) -> Option<usize> {
    let delimiter = chars[open];
    if run > 3 {
        return None;
    }

    let first = *chars.get(open + run)?;
    if first.is_whitespace() {
        return None;
    }
    if delimiter == '_' && open > 0 && chars[open - 1].is_alphanumeric() {
        return None;
    }

    let mut j = open + run + 1;
    while j < chars.len() {
        if chars[j] != delimiter {
            j += 1;
            continue;
        }

        let length = delimiter_run(chars, j);
        let closes = length == run
            && !chars[j - 1].is_whitespace()
            && (delimiter == '*' || chars.get(j + run).map_or(true, |c| !c.is_alphanumeric()));
        if closes {
            return Some(j);
        }
        j += length;
    }

    None
}

/// Index of the `$` closing inline math opened at `open`
///
/// The math must be non-empty and contain no whitespace, so prices such as
/// `$5 and $10` are kept.
fn math_end(chars: &[char], open: usize) -> Option<usize> {
    let close = chars[open + 1..].iter().position(|&c| c == '$')? + open + 1;
    let inner = &chars[open + 1..close];
    if inner.is_empty() || inner.iter().any(|c| c.is_whitespace()) {
        return None;
    }
    Some(close)
}

fn is_tag_start(next: Option<&char>) -> bool {
    matches!(next, Some(c) if c.is_ascii_alphabetic() || *c == '/' || *c == '!')
}

/// `[text](target)` -> `text`, with the number of chars consumed
fn link_text(chars: &[char]) -> Option<(String, usize)> {
    let close = chars.iter().position(|&c| c == ']')?;
    if chars.get(close + 1) != Some(&'(') {
        return None;
    }
    let end = chars[close + 1..].iter().position(|&c| c == ')')? + close + 1;
    let text: String = chars[1..close].iter().collect();
    Some((text, end + 1))
}
