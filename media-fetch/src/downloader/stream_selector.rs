//! Format selector for choosing the video and audio variants of a download.
//!
//! Both selections are a single left-to-right scan that only replaces the
//! current pick on a strictly better candidate, so among equals the first
//! variant in catalog order wins.

use media_catalog::VariantDescriptor;
use tracing::debug;

use crate::{Error, Result};

/// Picks the best video (bounded by a height ceiling) and best audio variant.
#[derive(Debug, Clone, Copy)]
pub struct FormatSelector {
    max_height: u32,
}

impl FormatSelector {
    pub fn new(max_height: u32) -> Self {
        Self { max_height }
    }

    /// Tallest video variant not exceeding the height ceiling.
    pub fn select_video<'a>(&self, variants: &'a [VariantDescriptor]) -> Option<&'a VariantDescriptor> {
        let mut best: Option<(&VariantDescriptor, u32)> = None;

        for variant in variants.iter().filter(|v| v.is_video()) {
            let height = variant.height.unwrap_or_default();
            if height > self.max_height {
                continue;
            }
            if best.is_none_or(|(_, best_height)| height > best_height) {
                best = Some((variant, height));
            }
        }

        best.map(|(variant, _)| variant)
    }

    /// Highest-bitrate audio variant. A variant without a declared bitrate
    /// ranks as zero.
    pub fn select_audio<'a>(&self, variants: &'a [VariantDescriptor]) -> Option<&'a VariantDescriptor> {
        let mut best: Option<(&VariantDescriptor, u64)> = None;

        for variant in variants.iter().filter(|v| v.is_audio()) {
            let bitrate = variant.bitrate.unwrap_or_default();
            if best.is_none_or(|(_, best_bitrate)| bitrate > best_bitrate) {
                best = Some((variant, bitrate));
            }
        }

        best.map(|(variant, _)| variant)
    }

    /// Select both halves, failing with [`Error::NoEligibleFormat`] when either is missing.
    pub fn select_pair(
        &self,
        variants: &[VariantDescriptor],
    ) -> Result<(VariantDescriptor, VariantDescriptor)> {
        let video = self.select_video(variants).ok_or_else(|| {
            Error::no_eligible_format(format!(
                "no video variant at or below {}p among {} variants",
                self.max_height,
                variants.len()
            ))
        })?;
        let audio = self
            .select_audio(variants)
            .ok_or_else(|| Error::no_eligible_format("no audio variant available"))?;

        debug!(video = %video, audio = %audio, "Selected variants");
        Ok((video.clone(), audio.clone()))
    }
}
