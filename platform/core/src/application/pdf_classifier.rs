// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! PDF type classification.
//!
//! A reproducible heuristic over cheap signals — producer/creator
//! metadata, first-page text length, image count, font presence, and a
//! text-quality score — that selects the processing mode for a PDF before
//! any expensive extraction runs.

use serde::{Deserialize, Serialize};

/// Signatures of OCR software in producer/creator metadata.
const OCR_INDICATORS: &[&str] = &["ocr", "scan", "abbyy", "tesseract", "finereader"];

/// Glyphs that rarely occur in clean native text but often in OCR output.
const SUSPICIOUS_GLYPHS: &[char] = &[
    '«', '»', '°', '±', '²', '³', '¹', '¼', '½', '¾', '¿', '×', '÷',
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PdfClass {
    NativeDigital,
    ScannedImage,
    OcrCandidate,
    Empty,
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PdfClassification {
    pub class: PdfClass,
    pub confidence: f64,
    pub reason: String,
    pub text_quality: f64,
}

/// Cheap signals extracted from the PDF before classification.
#[derive(Debug, Clone, Default)]
pub struct PdfSignals {
    pub producer: String,
    pub creator: String,
    pub page_count: usize,
    /// First-page extracted text.
    pub first_page_text: String,
    pub first_page_image_count: usize,
    pub has_fonts: bool,
}

pub fn classify_pdf(signals: &PdfSignals) -> PdfClassification {
    if signals.page_count == 0 {
        return PdfClassification {
            class: PdfClass::Empty,
            confidence: 1.0,
            reason: "No pages found".to_string(),
            text_quality: 0.0,
        };
    }

    let metadata = format!(
        "{}{}",
        signals.producer.to_lowercase(),
        signals.creator.to_lowercase()
    );
    let has_ocr_metadata = OCR_INDICATORS.iter().any(|i| metadata.contains(i));

    let text = signals.first_page_text.trim();
    let text_length = text.len();
    let image_count = signals.first_page_image_count;
    let quality = text_quality_score(&signals.first_page_text);

    let (class, confidence, reason) = if has_ocr_metadata {
        (
            PdfClass::OcrCandidate,
            0.9,
            "OCR software detected in metadata".to_string(),
        )
    } else if text_length == 0 && image_count > 0 {
        (
            PdfClass::ScannedImage,
            0.95,
            "No text layer, images present".to_string(),
        )
    } else if text_length > 50 && quality < 0.3 {
        (
            PdfClass::OcrCandidate,
            0.85,
            format!("Poor text quality detected (score: {quality:.2})"),
        )
    } else if text_length > 100 && image_count == 0 && signals.has_fonts && quality > 0.7 {
        (
            PdfClass::NativeDigital,
            0.9,
            format!("Clean text, no images, proper fonts (quality: {quality:.2})"),
        )
    } else if text_length > 100 && image_count > 3 {
        (
            PdfClass::OcrCandidate,
            0.7,
            "Text plus many images suggests OCR".to_string(),
        )
    } else if quality > 0.6 {
        (
            PdfClass::NativeDigital,
            0.7,
            format!("Good text quality suggests native digital (score: {quality:.2})"),
        )
    } else {
        (
            PdfClass::OcrCandidate,
            0.6,
            format!("Uncertain, defaulting to OCR processing (quality: {quality:.2})"),
        )
    };

    PdfClassification {
        class,
        confidence,
        reason,
        text_quality: quality,
    }
}

/// Text-quality score in [0, 1]: 0 is unusable OCR soup, 1 is clean
/// native text. Samples the first 1000 characters.
pub fn text_quality_score(text: &str) -> f64 {
    let trimmed = text.trim();
    if trimmed.len() < 10 {
        return 0.0;
    }

    let sample: String = text.chars().take(1000).collect();
    let total_chars = sample.chars().count();
    if total_chars == 0 {
        return 0.0;
    }

    let alphabetic = sample.chars().filter(|c| c.is_alphabetic()).count();
    let punctuation = sample
        .chars()
        .filter(|c| ".,!?;:()[]{}\"-".contains(*c))
        .count();
    let suspicious = sample
        .chars()
        .filter(|c| SUSPICIOUS_GLYPHS.contains(c))
        .count();

    let words: Vec<&str> = sample.split_whitespace().collect();
    let isolated = words
        .iter()
        .filter(|w| w.chars().count() == 1 && w.chars().all(|c| c.is_alphabetic()))
        .count();

    // Runs of 3+ consecutive non-alphabetic, non-space characters.
    let mut garbled_sequences = 0usize;
    let mut run = 0usize;
    for c in sample.chars() {
        if !c.is_alphabetic() && !c.is_whitespace() {
            run += 1;
        } else {
            if run >= 3 {
                garbled_sequences += 1;
            }
            run = 0;
        }
    }
    if run >= 3 {
        garbled_sequences += 1;
    }

    // Runs of 3+ whitespace characters.
    let mut excessive_spaces = 0usize;
    let mut space_run = 0usize;
    for c in sample.chars() {
        if c.is_whitespace() {
            space_run += 1;
        } else {
            if space_run >= 3 {
                excessive_spaces += 1;
            }
            space_run = 0;
        }
    }
    if space_run >= 3 {
        excessive_spaces += 1;
    }

    let mut score = 1.0f64;
    score -= (suspicious as f64 / total_chars as f64) * 2.0;
    if !words.is_empty() {
        score -= (isolated as f64 / words.len() as f64) * 1.5;
    }
    score -= garbled_sequences as f64 * 0.1;
    score -= excessive_spaces as f64 * 0.05;

    let alphabetic_ratio = alphabetic as f64 / total_chars as f64;
    if alphabetic_ratio > 0.7 {
        score += 0.2;
    }
    let punct_ratio = punctuation as f64 / total_chars as f64;
    if (0.02..=0.15).contains(&punct_ratio) {
        score += 0.1;
    }

    score.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signals() -> PdfSignals {
        PdfSignals {
            page_count: 1,
            ..Default::default()
        }
    }

    #[test]
    fn empty_pdf() {
        let classification = classify_pdf(&PdfSignals::default());
        assert_eq!(classification.class, PdfClass::Empty);
    }

    #[test]
    fn ocr_metadata_wins_even_with_little_text() {
        // Boundary case: under 100 chars of text but OCR software in the
        // metadata still classifies as OCR candidate.
        let mut s = signals();
        s.producer = "ABBYY FineReader 15".to_string();
        s.first_page_text = "Short extracted text".to_string();
        let classification = classify_pdf(&s);
        assert_eq!(classification.class, PdfClass::OcrCandidate);
        assert!(classification.confidence >= 0.9);
    }

    #[test]
    fn textless_pdf_with_images_is_scanned() {
        let mut s = signals();
        s.first_page_image_count = 2;
        let classification = classify_pdf(&s);
        assert_eq!(classification.class, PdfClass::ScannedImage);
    }

    #[test]
    fn clean_text_with_fonts_is_native() {
        let mut s = signals();
        s.has_fonts = true;
        s.first_page_text = "This is a perfectly ordinary paragraph of digital text. \
                             It has sentences, punctuation, and reasonable structure. \
                             Nothing about it suggests optical character recognition."
            .to_string();
        let classification = classify_pdf(&s);
        assert_eq!(classification.class, PdfClass::NativeDigital);
    }

    #[test]
    fn garbled_text_is_ocr_candidate() {
        let mut s = signals();
        s.first_page_text =
            "t h e  ###@@ qu1ck ß®° b r o w n  ///--- f o x «» j u m p s ±±± o v e r".to_string();
        let classification = classify_pdf(&s);
        assert_eq!(classification.class, PdfClass::OcrCandidate);
    }

    #[test]
    fn quality_score_ordering() {
        let clean = text_quality_score(
            "A clean paragraph of text, with punctuation and normal words throughout.",
        );
        let garbled = text_quality_score("x ##@ ¼½¾ t ö ° ±² a $$$ b ((( c ))) d «» e");
        assert!(clean > garbled);
        assert!(text_quality_score("short") == 0.0);
    }
}
