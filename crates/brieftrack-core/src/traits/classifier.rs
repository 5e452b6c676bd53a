// SPDX-FileCopyrightText: 2026 Brieftrack Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Classification adapter trait.

use async_trait::async_trait;

use crate::error::ClassifyError;
use crate::traits::adapter::PluginAdapter;
use crate::types::Classification;

/// Decides whether a message is a brief and extracts its fields.
///
/// Implementations own their inline retry budget and timeout. Once that
/// budget is spent they return [`ClassifyError::Transient`]; anything that
/// retrying cannot fix is [`ClassifyError::Permanent`].
#[async_trait]
pub trait Classifier: PluginAdapter {
    async fn classify(&self, text: &str, has_photo: bool)
    -> Result<Classification, ClassifyError>;
}
