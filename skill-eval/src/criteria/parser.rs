use super::{AcceptanceCriteria, CodePattern, Language, ValidationRule};
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;

const SECTION_DEFAULT_CORRECT: &[&str] = &["✅", "Correct", "DO:", "Good"];
const SECTION_DEFAULT_INCORRECT: &[&str] = &["❌", "Incorrect", "DON'T:", "Bad", "Anti-pattern"];

const BLOCK_CORRECT: &[&str] = &["✅", "Correct"];
const BLOCK_INCORRECT: &[&str] = &["❌", "Incorrect", "DON'T"];

/// Characters of prose before a fence inspected for correctness markers.
const MARKER_WINDOW: usize = 200;

const SKIPPED_RULE_TITLES: &[&str] = &["overview", "introduction", "quick reference"];

// Shell transcripts and config snippets are not usage exemplars.
const NON_CODE_TAGS: &[&str] = &[
    "bash", "sh", "shell", "console", "powershell", "ps1", "text", "txt", "json", "yaml", "yml",
    "toml", "ini", "env",
];

fn import_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"from\s+([\w.]+)\s+import\s+([\w, ]+)").expect("static regex is valid")
    })
}

struct Section<'a> {
    title: String,
    body: &'a str,
}

struct CodeBlock<'a> {
    tag: String,
    code: String,
    /// Prose between the previous fence (or section start) and this fence
    preceding: &'a str,
}

struct SectionScan<'a> {
    blocks: Vec<CodeBlock<'a>>,
    prose: Vec<&'a str>,
}

/// Parse acceptance-criteria markdown into structured criteria.
pub fn parse_criteria(skill_name: &str, source_path: &Path, content: &str) -> AcceptanceCriteria {
    let normalized = content.replace("\r\n", "\n");
    let mut criteria = AcceptanceCriteria::new(skill_name);
    criteria.source_path = Some(source_path.to_path_buf());

    for section in split_sections(&normalized) {
        let scan = scan_section(section.body);
        let patterns = section_patterns(&section, &scan, &criteria.language);

        if !is_skipped_rule(&section.title) && !patterns.is_empty() {
            let mut rule =
                ValidationRule::new(&section.title, &first_paragraph(section.body));
            rule.required_imports = required_imports(&scan.prose);
            for pattern in &patterns {
                rule = rule.with_pattern(pattern.clone());
            }
            criteria.rules.push(rule);
        }

        for pattern in patterns {
            criteria = criteria.with_pattern(pattern);
        }
    }

    criteria
}

fn split_sections(content: &str) -> Vec<Section<'_>> {
    let mut sections = Vec::new();
    let mut title: Option<String> = None;
    let mut body_start = 0;
    let mut offset = 0;

    for line in content.split_inclusive('\n') {
        if let Some(heading) = line.strip_prefix("## ") {
            push_section(&mut sections, title.take(), &content[body_start..offset]);
            title = Some(heading.trim().to_string());
            body_start = offset + line.len();
        }
        offset += line.len();
    }
    push_section(&mut sections, title, &content[body_start..]);

    sections
}

fn push_section<'a>(sections: &mut Vec<Section<'a>>, title: Option<String>, body: &'a str) {
    match title {
        Some(title) => sections.push(Section { title, body }),
        // Preamble before the first `## ` heading, titled by its own first line.
        None if !body.trim().is_empty() => {
            let title = body
                .lines()
                .map(|l| l.trim().trim_start_matches('#').trim())
                .find(|l| !l.is_empty())
                .unwrap_or_default()
                .to_string();
            sections.push(Section { title, body });
        }
        None => {}
    }
}

fn scan_section(body: &str) -> SectionScan<'_> {
    let mut blocks = Vec::new();
    let mut prose = Vec::new();
    let mut prose_start = 0;
    let mut offset = 0;
    let mut open: Option<(String, usize, Vec<&str>)> = None;

    for line in body.split_inclusive('\n') {
        let trimmed = line.trim();
        match open.take() {
            None if trimmed.starts_with("```") => {
                let tag = trimmed.trim_start_matches('`').split_whitespace().next().unwrap_or("");
                open = Some((tag.to_string(), offset, Vec::new()));
            }
            None => prose.push(line.trim_end_matches('\n')),
            Some((tag, fence_at, lines)) if trimmed.starts_with("```") => {
                blocks.push(CodeBlock {
                    tag,
                    code: lines.concat().trim().to_string(),
                    preceding: &body[prose_start..fence_at],
                });
                prose_start = offset + line.len();
            }
            Some((tag, fence_at, mut lines)) => {
                lines.push(line);
                open = Some((tag, fence_at, lines));
            }
        }
        offset += line.len();
    }

    // An unterminated fence is dropped rather than guessed at.
    SectionScan { blocks, prose }
}

fn section_patterns(
    section: &Section<'_>,
    scan: &SectionScan<'_>,
    default: &Language,
) -> Vec<CodePattern> {
    let section_default = section_default(section.body);

    scan.blocks
        .iter()
        .filter(|block| !block.code.is_empty())
        .filter(|block| !NON_CODE_TAGS.contains(&block.tag.to_lowercase().as_str()))
        .map(|block| {
            let language = if block.tag.is_empty() {
                default.clone()
            } else {
                Language::from_fence_tag(&block.tag)
            };
            let is_correct =
                block_correctness(tail_chars(block.preceding, MARKER_WINDOW), section_default);
            CodePattern {
                code: block.code.clone(),
                language,
                is_correct,
                section: section.title.clone(),
                description: block_description(block.preceding),
            }
        })
        .collect()
}

fn section_default(body: &str) -> Option<bool> {
    let count = |markers: &[&str]| markers.iter().map(|m| body.matches(m).count()).sum::<usize>();
    let correct = count(SECTION_DEFAULT_CORRECT);
    let incorrect = count(SECTION_DEFAULT_INCORRECT);

    match correct.cmp(&incorrect) {
        std::cmp::Ordering::Greater => Some(true),
        std::cmp::Ordering::Less => Some(false),
        std::cmp::Ordering::Equal => None,
    }
}

/// An incorrect marker in the window wins over a correct one; without either the
/// section default applies.
fn block_correctness(preceding: &str, section_default: Option<bool>) -> bool {
    let has = |markers: &[&str]| markers.iter().any(|m| preceding.contains(m));

    if has(BLOCK_INCORRECT) {
        false
    } else if has(BLOCK_CORRECT) {
        true
    } else {
        section_default.unwrap_or(true)
    }
}

fn block_description(preceding: &str) -> Option<String> {
    preceding
        .lines()
        .rev()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .find(|l| !is_marker_only(l))
        .map(|l| l.trim_start_matches(['-', '*', ' ']).trim_end_matches('*').trim().to_string())
        .filter(|l| !l.is_empty())
}

fn is_marker_only(line: &str) -> bool {
    let mut rest = line.to_string();
    let markers =
        SECTION_DEFAULT_CORRECT.iter().chain(SECTION_DEFAULT_INCORRECT).chain(BLOCK_INCORRECT);
    for marker in markers {
        rest = rest.replace(marker, "");
    }
    rest.chars().filter(|c| c.is_alphanumeric()).count() < 3
}

fn first_paragraph(body: &str) -> String {
    let mut lines = Vec::new();
    for line in body.lines() {
        if line.starts_with('#') || line.trim_start().starts_with("```") {
            break;
        }
        let trimmed = line.trim();
        if !trimmed.is_empty() {
            lines.push(trimmed);
        } else if !lines.is_empty() {
            break;
        }
    }
    lines.join(" ")
}

fn required_imports(prose: &[&str]) -> Vec<String> {
    let mut imports: Vec<String> = Vec::new();
    for line in prose {
        for caps in import_regex().captures_iter(line) {
            let module = &caps[1];
            for name in caps[2].split(',').filter_map(|n| n.split_whitespace().next()) {
                let statement = format!("from {} import {}", module, name);
                if !imports.contains(&statement) {
                    imports.push(statement);
                }
            }
        }
    }
    imports
}

fn is_skipped_rule(title: &str) -> bool {
    let lower = title.to_lowercase();
    SKIPPED_RULE_TITLES.iter().any(|skip| lower.contains(skip))
}

fn tail_chars(text: &str, n: usize) -> &str {
    match text.char_indices().rev().nth(n.saturating_sub(1)) {
        Some((idx, _)) => &text[idx..],
        None => text,
    }
}
