// SPDX-FileCopyrightText: 2026 Brieftrack Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cheap heuristics that decide whether a message is worth classifying.

use std::sync::LazyLock;

use brieftrack_config::model::IntakeConfig;
use regex::Regex;
use strum::{Display, IntoStaticStr};

/// Links to the supported sales platforms.
static PLATFORM_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(fansly\.com|onlyfans\.com)").unwrap());

/// Why the pre-filter accepted or rejected a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum PrefilterReason {
    NoText,
    Forwarded,
    TeamleadSender,
    TooShort,
    DirectMarker,
    HeuristicScore,
    HeuristicScoreLow,
}

/// The five independent signals, kept for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Signals {
    pub long_text: bool,
    pub marker_emoji: bool,
    pub keyword: bool,
    pub platform_link: bool,
    pub payment_marker: bool,
}

impl Signals {
    pub fn score(&self) -> u32 {
        [
            self.long_text,
            self.marker_emoji,
            self.keyword,
            self.platform_link,
            self.payment_marker,
        ]
        .into_iter()
        .map(u32::from)
        .sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefilterDecision {
    pub accept: bool,
    pub reason: PrefilterReason,
    /// Characters in the trimmed text, 0 without text.
    pub text_len: usize,
    /// `None` when a rule decided before scoring.
    pub signals: Option<Signals>,
    /// Signal score, present whenever `signals` is.
    pub score: Option<u32>,
    /// The configured direct marker found in the text, if any.
    pub direct_marker: Option<String>,
}

impl PrefilterDecision {
    fn early(accept: bool, reason: PrefilterReason, text_len: usize) -> Self {
        Self {
            accept,
            reason,
            text_len,
            signals: None,
            score: None,
            direct_marker: None,
        }
    }
}

/// What the pre-filter looks at.
#[derive(Debug, Clone, Copy)]
pub struct PrefilterInput<'a> {
    pub text: Option<&'a str>,
    pub is_forwarded: bool,
    pub is_teamlead: bool,
}

/// Rules apply in order: no text, forwarded, trusted sender, minimum length,
/// then the direct marker or the score threshold.
pub fn evaluate(input: PrefilterInput<'_>, config: &IntakeConfig) -> PrefilterDecision {
    let Some(text) = input.text.map(str::trim).filter(|t| !t.is_empty()) else {
        return PrefilterDecision::early(false, PrefilterReason::NoText, 0);
    };
    let length = text.chars().count();
    if input.is_forwarded {
        return PrefilterDecision::early(false, PrefilterReason::Forwarded, length);
    }
    if input.is_teamlead {
        return PrefilterDecision::early(true, PrefilterReason::TeamleadSender, length);
    }
    if length < config.min_text_length {
        return PrefilterDecision::early(false, PrefilterReason::TooShort, length);
    }

    let lowered = text.to_lowercase();
    let signals = Signals {
        long_text: length > config.long_text_threshold,
        marker_emoji: config.marker_emojis.iter().any(|e| text.contains(e.as_str())),
        keyword: config
            .keywords
            .iter()
            .any(|k| lowered.contains(&k.to_lowercase())),
        platform_link: PLATFORM_LINK.is_match(text),
        payment_marker: config
            .payment_markers
            .iter()
            .any(|m| lowered.contains(&m.to_lowercase())),
    };

    let direct_marker = config
        .direct_markers
        .iter()
        .find(|m| lowered.contains(&m.to_lowercase()))
        .cloned();
    let score = signals.score();
    let (accept, reason) = if direct_marker.is_some() {
        (true, PrefilterReason::DirectMarker)
    } else if score >= config.min_heuristic_score {
        (true, PrefilterReason::HeuristicScore)
    } else {
        (false, PrefilterReason::HeuristicScoreLow)
    };

    PrefilterDecision {
        accept,
        reason,
        text_len: length,
        signals: Some(signals),
        score: Some(score),
        direct_marker,
    }
}
