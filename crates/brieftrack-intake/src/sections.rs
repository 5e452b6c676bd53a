// SPDX-FileCopyrightText: 2026 Brieftrack Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Verbatim extraction of labelled sections from a brief.
//!
//! A section starts at a line whose label (after any emoji or punctuation
//! prefix) is one of the known headers, optionally followed by an inline
//! value. It runs until the next known label of any kind.

use std::sync::LazyLock;

use brieftrack_storage::OriginalSections;
use regex::Regex;

static LABEL_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^0-9A-Za-zА-Яа-яЁё]+").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Description,
    Outfit,
    Notes,
}

const SECTION_LABELS: &[(Section, &[&str])] = &[
    (Section::Description, &["описание задания", "task description"]),
    (Section::Outfit, &["одежда", "наряд", "outfit"]),
    (Section::Notes, &["заметки", "notes"]),
];

/// Labels that end a section without starting one we keep.
const STOP_LABELS: &[&str] = &[
    "описание заказа",
    "order description",
    "дата",
    "date",
    "покупатель",
    "buyer",
    "фан",
    "fan",
    "ссылка",
    "link",
    "оплата",
    "payment",
    "сумма",
    "amount",
    "длительность",
    "duration",
    "срочность",
    "urgency",
    "priority",
    "дедлайн",
    "deadline",
    "сроки",
];

enum LineKind {
    Start(Section, Option<String>),
    Stop,
    Body,
}

fn label_matches(lowered: &str, label: &str) -> bool {
    match lowered.strip_prefix(label) {
        Some("") => true,
        Some(rest) => [":", " -", " —", " "].iter().any(|sep| rest.starts_with(sep)),
        None => false,
    }
}

/// Text following the label and its separator, if any.
fn inline_value(cleaned: &str, label: &str) -> Option<String> {
    let rest: String = cleaned.chars().skip(label.chars().count()).collect();
    let rest = rest.trim_start();
    let rest = rest
        .strip_prefix(':')
        .or_else(|| rest.strip_prefix('-'))
        .or_else(|| rest.strip_prefix('—'))
        .unwrap_or(rest);
    let rest = rest.trim();
    (!rest.is_empty()).then(|| rest.to_string())
}

fn classify_line(line: &str) -> LineKind {
    let cleaned = LABEL_PREFIX.replace(line.trim(), "");
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return LineKind::Body;
    }
    let lowered = cleaned.to_lowercase();

    for (section, labels) in SECTION_LABELS {
        if let Some(label) = labels.iter().find(|l| label_matches(&lowered, l)) {
            return LineKind::Start(*section, inline_value(cleaned, label));
        }
    }
    if STOP_LABELS.iter().any(|l| label_matches(&lowered, l)) {
        return LineKind::Stop;
    }
    LineKind::Body
}

#[derive(Default)]
struct Collector {
    description: Vec<String>,
    outfit: Vec<String>,
    notes: Vec<String>,
}

impl Collector {
    fn blocks(&mut self, section: Section) -> &mut Vec<String> {
        match section {
            Section::Description => &mut self.description,
            Section::Outfit => &mut self.outfit,
            Section::Notes => &mut self.notes,
        }
    }
}

fn finish_block(lines: Vec<String>) -> Option<String> {
    let text = lines.join("\n").trim().to_string();
    (!text.is_empty()).then_some(text)
}

fn join_blocks(blocks: Vec<String>) -> Option<String> {
    (!blocks.is_empty()).then(|| blocks.join("\n\n"))
}

/// Extract description, outfit, and notes sections. Repeated sections are
/// joined with a blank line.
pub fn extract(raw_text: &str) -> OriginalSections {
    let mut collected = Collector::default();
    let mut current: Option<(Section, Vec<String>)> = None;

    for line in raw_text.lines() {
        match classify_line(line) {
            LineKind::Start(section, inline) => {
                if let Some((prev, lines)) = current.take()
                    && let Some(block) = finish_block(lines)
                {
                    collected.blocks(prev).push(block);
                }
                current = Some((section, inline.into_iter().collect()));
            }
            LineKind::Stop => {
                if let Some((prev, lines)) = current.take()
                    && let Some(block) = finish_block(lines)
                {
                    collected.blocks(prev).push(block);
                }
            }
            LineKind::Body => {
                if let Some((_, lines)) = current.as_mut() {
                    lines.push(line.trim_end().to_string());
                }
            }
        }
    }
    if let Some((prev, lines)) = current
        && let Some(block) = finish_block(lines)
    {
        collected.blocks(prev).push(block);
    }

    OriginalSections {
        description: join_blocks(collected.description),
        outfit: join_blocks(collected.outfit),
        notes: join_blocks(collected.notes),
    }
}
