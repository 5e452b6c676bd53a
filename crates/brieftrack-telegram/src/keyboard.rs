// SPDX-FileCopyrightText: 2026 Brieftrack Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inline keyboard rendering for order buttons.

use brieftrack_core::ActionButton;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

/// One keyboard row per inner vector. Button data is `order:{id}:{action}`.
pub fn inline_keyboard(rows: &[Vec<ActionButton>]) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(rows.iter().map(|row| {
        row.iter()
            .map(|b| InlineKeyboardButton::callback(b.label.clone(), b.callback_data()))
            .collect::<Vec<_>>()
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use brieftrack_core::OrderAction;
    use teloxide::types::InlineKeyboardButtonKind;

    #[test]
    fn rows_and_callback_data_are_preserved() {
        let rows = vec![
            vec![
                ActionButton::new(7, OrderAction::Postpone1d, "+1 d"),
                ActionButton::new(7, OrderAction::Postpone3d, "+3 d"),
            ],
            vec![ActionButton::new(7, OrderAction::CancelPostpone, "❎ Cancel")],
        ];
        let markup = inline_keyboard(&rows);

        assert_eq!(markup.inline_keyboard.len(), 2);
        assert_eq!(markup.inline_keyboard[0].len(), 2);
        let button = &markup.inline_keyboard[1][0];
        assert_eq!(button.text, "❎ Cancel");
        match &button.kind {
            InlineKeyboardButtonKind::CallbackData(data) => {
                assert_eq!(data, "order:7:cancel_postpone");
            }
            other => panic!("expected callback button, got {other:?}"),
        }
    }

    #[test]
    fn no_rows_clears_keyboard() {
        assert!(inline_keyboard(&[]).inline_keyboard.is_empty());
    }
}
