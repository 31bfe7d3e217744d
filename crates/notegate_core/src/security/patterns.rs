//! Pattern library: stateless threat detectors.
//!
//! # Responsibility
//! - Provide one pure detector per threat category.
//! - Report the matched signature name on a hit.
//!
//! # Invariants
//! - Detectors never panic and never return errors; only the validator rejects.
//! - Every detector runs in time linear in input length. Matching uses
//!   substring search, single-pass byte scanners, or the `regex` crate, whose
//!   automaton engine has no backtracking (no backreferences, no look-around).
//! - Text detectors compare against an ASCII-lowercased view of the input.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::borrow::Cow;

/// Name of the matched signature, recorded as audit detail.
pub type Signature = &'static str;

static SQL_TAUTOLOGY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\b(?:or|and)\s+['"]?([a-z0-9_]+)['"]?\s*(?:=|like\s)\s*['"]?([a-z0-9_]+)"#)
        .expect("valid sql tautology regex")
});
static SQL_STATEMENT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#";\s*(?:drop\s+(?:table|database|schema|index|view|user)\b|insert\s+into\b|delete\s+from\b|update\s+[a-z0-9_."`\[\]]+\s+set\b|select\s[^;]*?\bfrom\b|truncate\s+(?:table\s+)?[a-z0-9_]|alter\s+(?:table|database|user)\b|create\s+(?:table|database|user|procedure|function|trigger)\b|exec(?:ute)?\s|shutdown\b|grant\s|revoke\s)"#,
    )
    .expect("valid sql statement regex")
});
// A comment marker counts when glued to the quote, or when it ends the line.
static SQL_COMMENT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?m)['";][ \t]*/\*|['";]--|['";][ \t]*(?:--|#)[ \t\r]*$"#)
        .expect("valid sql comment regex")
});
static SQL_UNION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\bunion\s+(?:all\s+)?select\b").expect("valid sql union regex")
});

const SQL_MARKERS: &[(&str, Signature)] = &[
    ("xp_cmdshell", "sql_xp_cmdshell"),
    ("waitfor delay", "sql_waitfor_delay"),
    ("pg_sleep(", "sql_pg_sleep"),
    ("benchmark(", "sql_benchmark"),
    ("into outfile", "sql_into_outfile"),
    ("into dumpfile", "sql_into_dumpfile"),
    ("information_schema", "sql_information_schema"),
    ("load_file(", "sql_load_file"),
];

static SCRIPT_SCHEME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"j\s*a\s*v\s*a\s*s\s*c\s*r\s*i\s*p\s*t\s*:").expect("valid javascript uri regex")
});
static TAG_EVENT_HANDLER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<[a-z!/][^>]*[\s/"'`]on[a-z]+\s*="#).expect("valid tag handler regex")
});
static KNOWN_EVENT_HANDLER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\bon(?:error|load|click|dblclick|mouse(?:over|out|down|up|move|enter|leave)|focus|focusin|blur|change|submit|reset|select|key(?:down|up|press)|input|abort|animation(?:start|end|iteration)|transition(?:start|end)|toggle|begin|pageshow|resize|scroll|unload|beforeunload|hashchange|message|wheel|drag|drop|copy|cut|paste|contextmenu|pointer(?:over|down|up|enter))\s*=",
    )
    .expect("valid event handler regex")
});
static DANGEROUS_TAG_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<(?:iframe|object|embed|applet|frameset|frame|meta|base)(?:[\s/>]|$)")
        .expect("valid dangerous tag regex")
});

const SHELL_COMMANDS: &[(&str, Signature)] = &[
    ("rm -rf", "shell_rm_rf"),
    ("rm -fr", "shell_rm_rf"),
    ("del /s", "shell_del_recursive"),
    ("del /f", "shell_del_force"),
    ("rd /s", "shell_rd_recursive"),
    ("format c:", "shell_format_drive"),
    ("cat /etc/passwd", "shell_read_passwd"),
    ("cat /etc/shadow", "shell_read_shadow"),
    ("type c:\\", "shell_type_system_file"),
    ("whoami", "shell_whoami"),
    ("netstat", "shell_netstat"),
    ("ps aux", "shell_ps_aux"),
    ("ipconfig", "shell_ipconfig"),
    ("ifconfig", "shell_ifconfig"),
    ("net user", "shell_net_user"),
    ("uname -a", "shell_uname"),
    ("wget http", "shell_wget"),
    ("wget -", "shell_wget"),
    ("curl http", "shell_curl"),
    ("curl -", "shell_curl"),
    ("nc -e", "shell_netcat_exec"),
    ("powershell -", "shell_powershell"),
    ("powershell.exe", "shell_powershell"),
    ("cmd /c", "shell_cmd_exec"),
    ("cmd.exe /c", "shell_cmd_exec"),
    ("chmod 777", "shell_chmod_world"),
    ("shutdown -", "shell_shutdown"),
    ("shutdown /", "shell_shutdown"),
    ("shutdown now", "shell_shutdown"),
    ("mkfifo /", "shell_mkfifo"),
];

const TRAVERSAL_SEQUENCES: &[(&str, Signature)] = &[
    ("../", "dot_dot_slash"),
    ("..\\", "dot_dot_backslash"),
    ("%2e%2e%2f", "encoded_dot_dot_slash"),
    ("%2e%2e%5c", "encoded_dot_dot_backslash"),
    ("%2e%2e/", "encoded_dot_dot_slash"),
    ("%2e%2e\\", "encoded_dot_dot_backslash"),
    ("..%2f", "encoded_dot_dot_slash"),
    ("..%5c", "encoded_dot_dot_backslash"),
    ("%c0%ae%c0%ae", "overlong_utf8_dot_dot"),
    ("file://", "file_uri"),
];

const SENSITIVE_ROOTS: &[&str] = &[
    "/etc/", "/proc/", "/sys/", "/boot/", "/root/", "/dev/", "/var/", "/usr/", "/bin/",
];

const MAX_SCANNED_GROUP_DEPTH: usize = 256;
const MAX_LITERAL_GROUP_BYTES: usize = 64;
/// Max distance in bytes between a nested-quantifier shape and the run it
/// would be fed.
pub const REDOS_PROXIMITY_WINDOW: usize = 256;

/// Detects SQL injection signatures.
pub fn detect_sql_injection(text: &str) -> Option<Signature> {
    let lowered = ascii_lowercase(text);
    let text = lowered.as_ref();

    for caps in SQL_TAUTOLOGY_RE.captures_iter(text) {
        if let (Some(lhs), Some(rhs)) = (caps.get(1), caps.get(2)) {
            if lhs.as_str() == rhs.as_str() {
                return Some("sql_tautology");
            }
        }
    }
    if SQL_STATEMENT_RE.is_match(text) {
        return Some("sql_stacked_statement");
    }
    if SQL_COMMENT_RE.is_match(text) {
        return Some("sql_comment_terminator");
    }
    if SQL_UNION_RE.is_match(text) {
        return Some("sql_union_select");
    }
    SQL_MARKERS
        .iter()
        .find(|(marker, _)| text.contains(marker))
        .map(|(_, signature)| *signature)
}

/// Detects script payloads, script URIs, inline handlers and dangerous tags.
pub fn detect_xss(text: &str) -> Option<Signature> {
    let lowered = ascii_lowercase(text);
    let text = lowered.as_ref();

    if text.contains("<script") || text.contains("</script") {
        return Some("script_tag");
    }
    if SCRIPT_SCHEME_RE.is_match(text) {
        return Some("javascript_uri");
    }
    if text.contains("vbscript:") {
        return Some("vbscript_uri");
    }
    if text.contains("data:text/html") {
        return Some("data_html_uri");
    }
    if TAG_EVENT_HANDLER_RE.is_match(text) || KNOWN_EVENT_HANDLER_RE.is_match(text) {
        return Some("event_handler_attribute");
    }
    if DANGEROUS_TAG_RE.is_match(text) {
        return Some("dangerous_tag");
    }
    None
}

/// Detects shell metacharacters chained into destructive or recon commands.
///
/// Recognized chain operators: `;`, `|`, `||`, `&&` and `$(`. Pipes on a line
/// whose first non-blank byte is `|` are markdown table borders and do not
/// count.
pub fn detect_command_injection(text: &str) -> Option<Signature> {
    let lowered = ascii_lowercase(text);
    let bytes = lowered.as_bytes();
    let mut table_row = false;
    let mut line_has_content = false;

    for (index, &byte) in bytes.iter().enumerate() {
        if byte == b'\n' {
            table_row = false;
            line_has_content = false;
            continue;
        }
        if !line_has_content && !matches!(byte, b' ' | b'\t' | b'\r') {
            line_has_content = true;
            table_row = byte == b'|';
        }

        let command_start = match byte {
            b';' => index + 1,
            b'|' if !table_row => index + 1,
            b'&' if bytes.get(index + 1) == Some(&b'&') => index + 2,
            b'$' if bytes.get(index + 1) == Some(&b'(') => index + 2,
            _ => continue,
        };
        let rest = skip_inline_whitespace(&bytes[command_start..]);
        if let Some((_, signature)) = SHELL_COMMANDS
            .iter()
            .find(|(command, _)| rest.starts_with(command.as_bytes()))
        {
            return Some(*signature);
        }
    }
    None
}

/// Detects relative traversal, encoded traversal and absolute system paths.
pub fn detect_path_traversal(text: &str) -> Option<Signature> {
    let lowered = ascii_lowercase(text);
    let text = lowered.as_ref();

    if let Some((_, signature)) = TRAVERSAL_SEQUENCES
        .iter()
        .find(|(sequence, _)| text.contains(sequence))
    {
        return Some(*signature);
    }

    let bytes = text.as_bytes();
    for index in 0..bytes.len() {
        if !is_token_start(bytes, index) {
            continue;
        }
        let rest = &bytes[index..];
        if rest[0] == b'/'
            && SENSITIVE_ROOTS
                .iter()
                .any(|root| rest.starts_with(root.as_bytes()))
        {
            return Some("absolute_unix_root");
        }
        if rest.len() >= 3
            && rest[0].is_ascii_lowercase()
            && rest[1] == b':'
            && (rest[2] == b'\\' || rest[2] == b'/')
        {
            return Some("windows_drive_root");
        }
        if rest.len() >= 3 && rest[0] == b'\\' && rest[1] == b'\\' && rest[2].is_ascii_alphanumeric()
        {
            return Some("unc_path");
        }
    }
    None
}

/// Detects identifiers that encode a filesystem location.
///
/// Stricter than `detect_path_traversal`: ids may not contain path separators
/// at all, and may not be a bare `.` or `..`.
pub fn detect_path_in_id(id: &str) -> Option<Signature> {
    if let Some(signature) = detect_path_traversal(id) {
        return Some(signature);
    }
    let trimmed = id.trim();
    if trimmed == "." || trimmed == ".." {
        return Some("dot_segment_id");
    }
    if id.contains('/') || id.contains('\\') {
        return Some("path_separator_in_id");
    }
    None
}

/// Detects C0 control characters (U+0000 to U+001F).
///
/// With `allow_line_breaks`, TAB, LF and CR are permitted.
pub fn detect_control_character(text: &str, allow_line_breaks: bool) -> Option<Signature> {
    // C0 code points are single bytes in UTF-8 and never appear inside a
    // multi-byte sequence, so a byte scan is exact.
    text.bytes()
        .find(|&byte| {
            byte < 0x20 && !(allow_line_breaks && matches!(byte, b'\t' | b'\n' | b'\r'))
        })
        .map(|byte| if byte == 0 { "null_byte" } else { "c0_control" })
}

/// Detects combining diacritical marks (U+0300 to U+036F) used for spoofing.
///
/// Flags a mark that stands alone (start of text, after whitespace or ASCII
/// punctuation), is stacked on another mark, or is appended to a plain ASCII
/// letter or digit.
pub fn detect_unicode_spoofing(text: &str) -> Option<Signature> {
    let mut previous: Option<char> = None;
    for current in text.chars() {
        if is_combining_mark(current) {
            match previous {
                None => return Some("standalone_combining_mark"),
                Some(prev) if is_combining_mark(prev) => return Some("stacked_combining_marks"),
                Some(prev) if prev.is_ascii_alphanumeric() => {
                    return Some("combining_mark_on_ascii")
                }
                Some(prev) if prev.is_whitespace() || prev.is_ascii_punctuation() => {
                    return Some("standalone_combining_mark")
                }
                Some(_) => {}
            }
        }
        previous = Some(current);
    }
    None
}

/// Detects ReDoS payloads.
///
/// A body is risky when a repetitive run of at least `min_run` bytes sits
/// within `REDOS_PROXIMITY_WINDOW` bytes of a nested-quantifier shape and is
/// built from bytes that shape could match, or when any repetitive run
/// reaches `max_run` bytes regardless of shape.
pub fn detect_redos_risk(text: &str, min_run: usize, max_run: usize) -> Option<Signature> {
    if longest_repetitive_run(text, max_run) >= max_run {
        return Some("repetitive_run_ceiling");
    }

    let shapes = nested_quantifier_shapes(text);
    if shapes.is_empty() {
        return None;
    }
    let bytes = text.as_bytes();
    repetitive_runs(bytes, min_run)
        .into_iter()
        .any(|run| {
            let unit = &bytes[run.start..run.start + run.period];
            let first = shapes.partition_point(|shape| {
                shape.end + REDOS_PROXIMITY_WINDOW < run.start
            });
            shapes[first..]
                .iter()
                .take_while(|shape| shape.end <= run.end + REDOS_PROXIMITY_WINDOW)
                .any(|shape| shape.could_match(bytes, unit))
        })
        .then_some("nested_quantifier_with_repetition")
}

/// Returns whether `text` contains a quantified group that itself contains a
/// quantifier, e.g. `(a+)+`, `(\w*)*` or `((ab)+){2,}`.
pub fn has_nested_quantifier(text: &str) -> bool {
    !nested_quantifier_shapes(text).is_empty()
}

/// A quantified group holding a quantifier. `group_start` and `group_end`
/// index its parentheses; `end` is the byte after the outer quantifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct QuantifiedShape {
    group_start: usize,
    group_end: usize,
    end: usize,
}

impl QuantifiedShape {
    /// Whether every byte of `unit` can be matched by the group. Classes,
    /// escapes, wildcards and long groups match anything.
    fn could_match(&self, bytes: &[u8], unit: &[u8]) -> bool {
        let body = &bytes[self.group_start + 1..self.group_end];
        if body.len() > MAX_LITERAL_GROUP_BYTES
            || body.iter().any(|byte| matches!(byte, b'\\' | b'.' | b'['))
        {
            return true;
        }
        unit.iter().all(|byte| body.contains(byte))
    }
}

/// Single pass with a bounded group stack; shapes come out ordered by `end`.
fn nested_quantifier_shapes(text: &str) -> Vec<QuantifiedShape> {
    let bytes = text.as_bytes();
    // (open paren index, contains a quantifier)
    let mut groups: Vec<(usize, bool)> = Vec::new();
    let mut untracked_depth = 0usize;
    let mut shapes = Vec::new();
    let mut index = 0;

    while index < bytes.len() {
        match bytes[index] {
            b'\\' => {
                index += 2;
                continue;
            }
            b'(' => {
                if groups.len() < MAX_SCANNED_GROUP_DEPTH {
                    groups.push((index, false));
                } else {
                    untracked_depth += 1;
                }
            }
            b'+' | b'*' | b'{' => {
                if let Some((_, quantified)) = groups.last_mut() {
                    *quantified = true;
                }
            }
            b')' => {
                if untracked_depth > 0 {
                    untracked_depth -= 1;
                } else if let Some((group_start, inner_quantified)) = groups.pop() {
                    if inner_quantified {
                        if matches!(bytes.get(index + 1), Some(b'+' | b'*' | b'{')) {
                            shapes.push(QuantifiedShape {
                                group_start,
                                group_end: index,
                                end: index + 2,
                            });
                        }
                        if let Some((_, parent)) = groups.last_mut() {
                            *parent = true;
                        }
                    }
                }
            }
            _ => {}
        }
        index += 1;
    }
    shapes
}

/// Length in bytes of the longest periodic run (period 1 to 4).
///
/// `aaaa` and `abababab` both count as runs. Stops early once `cap` is
/// reached.
pub fn longest_repetitive_run(text: &str, cap: usize) -> usize {
    let bytes = text.as_bytes();
    let mut longest = usize::from(!bytes.is_empty());

    for period in 1..=4usize {
        if bytes.len() <= period {
            break;
        }
        let mut matched = 0usize;
        for index in period..bytes.len() {
            if bytes[index] == bytes[index - period] {
                matched += 1;
                longest = longest.max(matched + period);
                if longest >= cap {
                    return longest;
                }
            } else {
                matched = 0;
            }
        }
    }
    longest
}

#[derive(Debug, Clone, Copy)]
struct RepetitiveRun {
    start: usize,
    end: usize,
    period: usize,
}

/// Maximal periodic runs (period 1 to 4) of at least `min_len` bytes.
fn repetitive_runs(bytes: &[u8], min_len: usize) -> Vec<RepetitiveRun> {
    let mut runs = Vec::new();
    for period in 1..=4usize {
        let mut matched = 0usize;
        for index in period..=bytes.len() {
            if index < bytes.len() && bytes[index] == bytes[index - period] {
                matched += 1;
                continue;
            }
            let len = matched + period;
            if matched > 0 && len >= min_len {
                runs.push(RepetitiveRun {
                    start: index - len,
                    end: index,
                    period,
                });
            }
            matched = 0;
        }
    }
    runs
}

/// Returns whether `text` holds more than `max_chars` characters.
pub fn exceeds_char_limit(text: &str, max_chars: usize) -> bool {
    // Byte length bounds char count from above; only count when needed.
    text.len() > max_chars && text.chars().count() > max_chars
}

/// Detects metadata that is nested too deeply or holds too many nodes.
///
/// Iterative walk; never recurses on attacker-controlled depth.
pub fn detect_metadata_shape(
    value: &Value,
    max_depth: usize,
    max_nodes: usize,
) -> Option<Signature> {
    let mut pending: Vec<(&Value, usize)> = vec![(value, 1)];
    let mut visited = 0usize;

    while let Some((node, depth)) = pending.pop() {
        visited += 1;
        if visited + pending.len() > max_nodes {
            return Some("metadata_node_count");
        }
        if depth > max_depth {
            return Some("metadata_depth");
        }
        match node {
            Value::Array(items) => pending.extend(items.iter().map(|item| (item, depth + 1))),
            Value::Object(map) => pending.extend(map.values().map(|item| (item, depth + 1))),
            _ => {}
        }
    }
    None
}

fn ascii_lowercase(text: &str) -> Cow<'_, str> {
    if text.bytes().any(|byte| byte.is_ascii_uppercase()) {
        Cow::Owned(text.to_ascii_lowercase())
    } else {
        Cow::Borrowed(text)
    }
}

fn skip_inline_whitespace(bytes: &[u8]) -> &[u8] {
    let skipped = bytes
        .iter()
        .take_while(|byte| matches!(byte, b' ' | b'\t'))
        .count();
    &bytes[skipped..]
}

fn is_token_start(bytes: &[u8], index: usize) -> bool {
    if index == 0 {
        return true;
    }
    matches!(
        bytes[index - 1],
        b' ' | b'\t' | b'\n' | b'\r' | b'"' | b'\'' | b'=' | b'(' | b'[' | b',' | b';' | b'>' | b'`'
    )
}

fn is_combining_mark(value: char) -> bool {
    ('\u{0300}'..='\u{036f}').contains(&value)
}
