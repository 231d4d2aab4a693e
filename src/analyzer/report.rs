//! Human-readable report lines in English or Russian.

use super::dsi::{DsiRange, DsiResult, ParameterStatus};
use crate::config::ReportLanguage;
use crate::features::{Feature, FeatureVector};
use crate::symptoms::{ClinicalThresholds, RiskAssessment, RiskLevel, Severity, Symptom, SymptomAnalysis};

/// Everything the report is written from.
pub struct ReportInput<'a> {
    pub features: &'a FeatureVector,
    pub symptoms: &'a SymptomAnalysis,
    pub dsi: &'a DsiResult,
    pub thresholds: &'a ClinicalThresholds,
    pub insufficient_signal: bool,
}

fn severity_word(severity: Severity, language: ReportLanguage, masculine: bool) -> &'static str {
    match (language, severity) {
        (ReportLanguage::En, Severity::Mild) => "mild",
        (ReportLanguage::En, Severity::Moderate) => "moderate",
        (ReportLanguage::En, Severity::Severe) => "severe",
        (ReportLanguage::Ru, Severity::Mild) if masculine => "легкий",
        (ReportLanguage::Ru, Severity::Moderate) if masculine => "умеренный",
        (ReportLanguage::Ru, Severity::Severe) if masculine => "тяжелый",
        (ReportLanguage::Ru, Severity::Mild) => "легкая",
        (ReportLanguage::Ru, Severity::Moderate) => "умеренная",
        (ReportLanguage::Ru, Severity::Severe) => "тяжелая",
        (_, Severity::None) => "",
    }
}

pub fn dsi_range_label(range: DsiRange, language: ReportLanguage) -> &'static str {
    match (language, range) {
        (ReportLanguage::En, DsiRange::Normal) => "Normal voice",
        (ReportLanguage::En, DsiRange::MildDysphonia) => "Mild dysphonia",
        (ReportLanguage::En, DsiRange::ModerateDysphonia) => "Moderate dysphonia (high PD risk)",
        (ReportLanguage::En, DsiRange::SevereDysphonia) => "Severe dysphonia (very high PD risk)",
        (ReportLanguage::Ru, DsiRange::Normal) => "Нормальный голос",
        (ReportLanguage::Ru, DsiRange::MildDysphonia) => "Легкая дисфония",
        (ReportLanguage::Ru, DsiRange::ModerateDysphonia) => "Умеренная дисфония (PD риск высокий)",
        (ReportLanguage::Ru, DsiRange::SevereDysphonia) => "Тяжелая дисфония (PD риск очень высокий)",
    }
}

/// Qualitative risk annotation carried by each DSI band.
pub fn dsi_risk_note(range: DsiRange, language: ReportLanguage) -> &'static str {
    match (language, range) {
        (ReportLanguage::En, DsiRange::Normal) => "Low PD risk",
        (ReportLanguage::En, DsiRange::MildDysphonia) => "Moderate PD risk",
        (ReportLanguage::En, DsiRange::ModerateDysphonia) => "High PD risk (stage 1-2)",
        (ReportLanguage::En, DsiRange::SevereDysphonia) => "Very high PD risk (stage 3-5)",
        (ReportLanguage::Ru, DsiRange::Normal) => "Низкий риск ПД",
        (ReportLanguage::Ru, DsiRange::MildDysphonia) => "Умеренный риск ПД",
        (ReportLanguage::Ru, DsiRange::ModerateDysphonia) => "Высокий риск ПД (стадия 1-2)",
        (ReportLanguage::Ru, DsiRange::SevereDysphonia) => "Очень высокий риск ПД (стадия 3-5)",
    }
}

fn status_word(status: ParameterStatus, language: ReportLanguage) -> &'static str {
    match (language, status) {
        (ReportLanguage::En, ParameterStatus::Low) => "low",
        (ReportLanguage::En, ParameterStatus::Reduced) => "reduced",
        (ReportLanguage::En, ParameterStatus::Normal) => "normal",
        (ReportLanguage::En, ParameterStatus::Elevated) => "elevated",
        (ReportLanguage::En, ParameterStatus::High) => "high",
        (ReportLanguage::Ru, ParameterStatus::Low) => "Низкий",
        (ReportLanguage::Ru, ParameterStatus::Reduced) => "Снижен",
        (ReportLanguage::Ru, ParameterStatus::Normal) => "Нормальный",
        (ReportLanguage::Ru, ParameterStatus::Elevated) => "Повышен",
        (ReportLanguage::Ru, ParameterStatus::High) => "Высокий",
    }
}

/// One-line risk summary, e.g. `Low (20%, per Little 2004 + Daoudi 2022)`.
pub fn risk_text(risk: &RiskAssessment, language: ReportLanguage) -> String {
    let percent = (risk.probability * 100.0) as i64;
    match language {
        ReportLanguage::En => {
            let level = match risk.level {
                RiskLevel::Low => "Low",
                RiskLevel::Medium => "Medium",
                RiskLevel::High => "High",
            };
            format!("{} ({}%, per Little 2004 + Daoudi 2022)", level, percent)
        }
        ReportLanguage::Ru => {
            let level = match risk.level {
                RiskLevel::Low => "Низкий",
                RiskLevel::Medium => "Умеренный",
                RiskLevel::High => "Высокий",
            };
            format!("{} ({}%, согласно Little 2004 + Daoudi 2022)", level, percent)
        }
    }
}

fn symptom_lines(input: &ReportInput<'_>, language: ReportLanguage) -> Vec<String> {
    let f = input.features;
    let scores = &input.symptoms.scores;
    let en = language == ReportLanguage::En;
    let mut lines = Vec::new();

    let severity = scores.get(Symptom::Hypophonia);
    if severity != Severity::None {
        let word = severity_word(severity, language, false);
        let rms = f.get(Feature::RmsMean);
        lines.push(if en {
            format!("- Hypophonia ({}): low RMS ({:.3}), typical of PD [Little 2004].", word, rms)
        } else {
            format!("- Гипофония ({}): низкий RMS ({:.3}), типично для ПД [Little 2004].", word, rms)
        });
    }

    let severity = scores.get(Symptom::Monopitch);
    if severity != Severity::None {
        let word = severity_word(severity, language, true);
        let sd = f.get(Feature::F0SdHz);
        lines.push(if en {
            format!(
                "- Monopitch ({}): low F0 variation (SD={:.1}Hz), absent prosody is characteristic of PD [Daoudi 2022].",
                word, sd
            )
        } else {
            format!(
                "- Monopitch ({}): низкая вариация F0 (SD={:.1}Hz), отсутствие просодии характерно для ПД [Daoudi 2022].",
                word, sd
            )
        });
    }

    let severity = scores.get(Symptom::Monoloudness);
    if severity != Severity::None {
        let word = severity_word(severity, language, false);
        let variation = f.get(Feature::AmplitudeDbVariation);
        lines.push(if en {
            format!(
                "- Monoloudness ({}): amplitude variation {:.1}dB, monotonous loudness [Little 2004].",
                word, variation
            )
        } else {
            format!(
                "- Monoloudness ({}): вариация амплитуды {:.1}dB, монотонная громкость [Little 2004].",
                word, variation
            )
        });
    }

    let severity = scores.get(Symptom::Hoarseness);
    if severity != Severity::None {
        let word = severity_word(severity, language, false);
        let t = input.thresholds;
        let jitter = f.get(Feature::JitterPercent);
        let shimmer = f.get(Feature::ShimmerPercent);
        let hnr = f.get(Feature::HnrDb);
        let mut details = Vec::new();
        if jitter > t.jitter_percent {
            details.push(format!("jitter={:.2}%", jitter));
        }
        if shimmer > t.shimmer_percent {
            details.push(format!("shimmer={:.2}%", shimmer));
        }
        if hnr < t.hnr_db {
            details.push(format!("HNR={:.1}dB", hnr));
        }
        let details = details.join(", ");
        lines.push(if en {
            format!(
                "- Hoarseness ({}): vocal fold instability ({}) [Little 2004, Daoudi 2022].",
                word, details
            )
        } else {
            format!(
                "- Охриплость ({}): нестабильность голосовых связок ({}) [Little 2004, Daoudi 2022].",
                word, details
            )
        });
    }

    let severity = scores.get(Symptom::ImpreciseArticulation);
    if severity != Severity::None {
        let word = severity_word(severity, language, false);
        let rate = f.get(Feature::RateSylSec);
        let pauses = f.get(Feature::PauseRatio) * 100.0;
        lines.push(if en {
            format!(
                "- Imprecise articulation ({}): speech rate {:.1} syl/s, pauses {:.1}% [NIH 2025].",
                word, rate, pauses
            )
        } else {
            format!(
                "- Неточная артикуляция ({}): скорость речи {:.1} сл/сек, паузы {:.1}% [NIH 2025].",
                word, rate, pauses
            )
        });
    }

    lines
}

fn dsi_lines(dsi: &DsiResult, language: ReportLanguage) -> Vec<String> {
    let en = language == ReportLanguage::En;
    let (Some(score), Some(range), Some(interpretation)) = (dsi.score, dsi.range, dsi.interpretation) else {
        return vec![if en {
            "DSI: required parameters missing, score not computed".to_string()
        } else {
            "DSI: Отсутствуют необходимые параметры для расчета DSI".to_string()
        }];
    };

    let b = &dsi.breakdown;
    let status = |s| status_word(s, language);
    if en {
        vec![
            "=== DSI (Dysphonia Severity Index) ===".to_string(),
            format!("DSI Score: {} ({})", score, dsi_range_label(range, language)),
            "Parameters:".to_string(),
            format!("  - MPT: {:.2}s ({})", b.mpt_sec, status(interpretation.mpt_status)),
            format!("  - F0-High: {:.1} Hz ({})", b.f0_high_hz, status(interpretation.f0_high_status)),
            format!("  - I-Low: {:.1} dB ({})", b.i_low_db, status(interpretation.i_low_status)),
            format!("  - Jitter: {:.2}% ({})", b.jitter_percent, status(interpretation.jitter_status)),
            format!("Interpretation: {}", dsi_risk_note(range, language)),
            "DSI correlates with the Voice Handicap Index and suits therapy monitoring (LSVT LOUD).".to_string(),
        ]
    } else {
        vec![
            "=== DSI (Dysphonia Severity Index) ===".to_string(),
            format!("DSI Score: {} ({})", score, dsi_range_label(range, language)),
            "Параметры:".to_string(),
            format!("  - MPT: {:.2}с ({})", b.mpt_sec, status(interpretation.mpt_status)),
            format!("  - F0-High: {:.1} Гц ({})", b.f0_high_hz, status(interpretation.f0_high_status)),
            format!("  - I-Low: {:.1} дБ ({})", b.i_low_db, status(interpretation.i_low_status)),
            format!("  - Jitter: {:.2}% ({})", b.jitter_percent, status(interpretation.jitter_status)),
            format!("Интерпретация: {}", dsi_risk_note(range, language)),
            "DSI коррелирует с Voice Handicap Index и идеален для мониторинга терапии (LSVT LOUD).".to_string(),
        ]
    }
}

/// Symptom lines, recommendation, DSI section and risk summary.
pub fn build(input: &ReportInput<'_>, language: ReportLanguage) -> Vec<String> {
    let en = language == ReportLanguage::En;
    let mut report = Vec::new();

    if input.insufficient_signal {
        report.push(if en {
            "- Warning: the recording is silent or too short; acoustic values are defaults.".to_string()
        } else {
            "- Внимание: запись беззвучна или слишком коротка; акустические параметры не измерены.".to_string()
        });
    }

    let symptoms = symptom_lines(input, language);
    let has_symptoms = !symptoms.is_empty();
    report.extend(symptoms);

    let exceeded = input.symptoms.risk.exceeded_count;
    if exceeded >= 3 {
        report.push(if en {
            "- Recommendation: neurologist consultation, LSVT speech therapy, AI-assisted screening.".to_string()
        } else {
            "- Рекомендация: консультация невролога, LSVT логопедия, скрининг в РФ с использованием ИИ-инструментов (2023-2025)."
                .to_string()
        });
    } else if exceeded >= 1 {
        report.push(if en {
            "- Recommendation: monitor symptoms, speech-language assessment.".to_string()
        } else {
            "- Рекомендация: мониторинг симптомов, логопедическая оценка.".to_string()
        });
    }

    if !has_symptoms && exceeded == 0 {
        report.push(if en {
            "- Acoustic parameters within normal limits. No PD voice symptoms detected.".to_string()
        } else {
            "- Акустические параметры в пределах нормы. Симптомы ПД не выявлены.".to_string()
        });
    }

    report.extend(dsi_lines(input.dsi, language));

    let risk = risk_text(&input.symptoms.risk, language);
    report.push(if en {
        format!("PD risk: {}", risk)
    } else {
        format!("Риск ПД: {}", risk)
    });

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::dsi::{self, DsiCoefficients};
    use crate::symptoms::SymptomModel;

    fn healthy() -> FeatureVector {
        let mut f = FeatureVector::neutral();
        f.set(Feature::F0MeanHz, 180.0);
        f.set(Feature::F0SdHz, 60.0);
        f.set(Feature::JitterPercent, 0.4);
        f.set(Feature::ShimmerPercent, 3.0);
        f.set(Feature::HnrDb, 22.0);
        f.set(Feature::RmsMean, 0.08);
        f.set(Feature::AmplitudeDbVariation, 8.0);
        f.set(Feature::AmplitudeDbRange, 25.0);
        f.set(Feature::RateSylSec, 5.0);
        f.set(Feature::PauseRatio, 0.15);
        f.set(Feature::MptSec, 20.0);
        f.set(Feature::F0HighHz, 450.0);
        f.set(Feature::ILowDb, 35.0);
        f
    }

    fn report_for(features: &FeatureVector, language: ReportLanguage) -> Vec<String> {
        let model = SymptomModel::default();
        let symptoms = model.analyze(features);
        let dsi = dsi::compute(features, &DsiCoefficients::default());
        build(
            &ReportInput {
                features,
                symptoms: &symptoms,
                dsi: &dsi,
                thresholds: model.thresholds(),
                insufficient_signal: false,
            },
            language,
        )
    }

    #[test]
    fn test_healthy_report() {
        let report = report_for(&healthy(), ReportLanguage::En);
        assert!(report[0].contains("within normal limits"));
        assert!(report.iter().any(|l| l.contains("Normal voice")));
        assert!(report.last().unwrap().starts_with("PD risk: Low (20%"));
    }

    #[test]
    fn test_russian_report() {
        let report = report_for(&healthy(), ReportLanguage::Ru);
        assert!(report[0].contains("Симптомы ПД не выявлены"));
        assert!(report.iter().any(|l| l.contains("Нормальный голос")));
        assert!(report.last().unwrap().starts_with("Риск ПД: Низкий"));
    }

    #[test]
    fn test_hoarse_voice_lists_details() {
        let mut f = healthy();
        f.set(Feature::JitterPercent, 2.8);
        f.set(Feature::HnrDb, 14.0);
        let report = report_for(&f, ReportLanguage::En);
        let line = report.iter().find(|l| l.starts_with("- Hoarseness")).unwrap();
        assert!(line.contains("severe"));
        assert!(line.contains("jitter=2.80%"));
        assert!(line.contains("HNR=14.0dB"));
        assert!(!line.contains("shimmer"));
        assert!(report.iter().any(|l| l.contains("Recommendation: monitor")));
    }

    #[test]
    fn test_masculine_severity_for_monopitch() {
        let mut f = healthy();
        f.set(Feature::F0SdHz, 40.0);
        let report = report_for(&f, ReportLanguage::Ru);
        assert!(report.iter().any(|l| l.contains("Monopitch (легкий)")));
    }

    #[test]
    fn test_missing_dsi_is_reported() {
        let mut f = healthy();
        f.set(Feature::F0HighHz, 0.0);
        let report = report_for(&f, ReportLanguage::En);
        assert!(report.iter().any(|l| l.contains("score not computed")));
    }
}
