use crate::model::{RespondentRecord, SiteCode};
use crate::nps::{ScoreScale, Standing, classify};
use crate::quarters::Period;
use crate::taxonomy::{self, CategoryLevel};

const NO_OPINION_PLACEHOLDERS: &[&str] = &[
    "no opina",
    "sin opinion",
    "ns/nc",
    "nao opina",
    "sem opiniao",
];

/// A detractor or neutral respondent with its resolved complaint categories.
#[derive(Debug, Clone)]
pub struct CategorizedRespondent {
    pub period: Period,
    pub standing: Standing,
    pub categoria_detalle: String,
    pub categoria: String,
    pub comment: Option<String>,
    pub balance_holder: bool,
}

pub fn is_no_opinion(category: &str) -> bool {
    let key = taxonomy::normalize(category);
    NO_OPINION_PLACEHOLDERS.contains(&key.as_str())
}

/// Resolves a category for every detractor and neutral respondent: the
/// previously-computed classification wins when present, otherwise the
/// declared reason is used. Promoters carry no complaint and are skipped.
pub fn categorize_all(
    records: &[RespondentRecord],
    scale: ScoreScale,
    site: SiteCode,
) -> Vec<CategorizedRespondent> {
    let mut categorized = Vec::new();

    for record in records {
        let standing = classify(record.score, scale);
        if standing == Standing::Promoter {
            continue;
        }

        let detailed = record
            .precomputed_category
            .as_deref()
            .filter(|value| !value.trim().is_empty())
            .or(record.declared_reason.as_deref())
            .unwrap_or("")
            .trim()
            .to_string();

        let categoria = taxonomy::map_to_aggregate(&detailed, site);

        categorized.push(CategorizedRespondent {
            period: record.period,
            standing,
            categoria_detalle: detailed,
            categoria,
            comment: record.declared_reason.clone(),
            balance_holder: record.balance_holder,
        });
    }

    categorized
}

/// Replaces the "no opinion" placeholder with the respondent's declared
/// reason whenever that reason maps to a known taxonomy entry. Running the
/// pass again is a no-op: a corrected row no longer carries the placeholder.
pub fn apply_no_opinion_correction(
    categorized: &mut [CategorizedRespondent],
    site: SiteCode,
) -> usize {
    let mut corrected = 0usize;

    for respondent in categorized.iter_mut() {
        if !is_no_opinion(&respondent.categoria_detalle) {
            continue;
        }

        let Some(declared) = respondent.comment.as_deref() else {
            continue;
        };

        if taxonomy::validate(declared, site, CategoryLevel::Detailed) {
            respondent.categoria_detalle = declared.trim().to_string();
            respondent.categoria = taxonomy::map_to_aggregate(declared, site);
            corrected += 1;
        }
    }

    corrected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quarters::parse_period;
    use crate::taxonomy::OTHER_ES;

    fn record(
        score: i8,
        declared: Option<&str>,
        precomputed: Option<&str>,
    ) -> RespondentRecord {
        RespondentRecord {
            site: SiteCode::Ar,
            player: "FinPago".to_string(),
            period: parse_period("25Q2").unwrap(),
            score,
            declared_reason: declared.map(ToOwned::to_owned),
            precomputed_category: precomputed.map(ToOwned::to_owned),
            product: None,
            balance_holder: false,
        }
    }

    #[test]
    fn precomputed_classification_wins_over_declared_reason() {
        let records = vec![record(2, Some("comisiones altas"), Some("fraude"))];
        let categorized = categorize_all(&records, ScoreScale::RawZeroToTen, SiteCode::Ar);
        assert_eq!(categorized.len(), 1);
        assert_eq!(categorized[0].categoria_detalle, "fraude");
        assert_eq!(categorized[0].categoria, "Seguridad");
    }

    #[test]
    fn declared_reason_is_the_fallback() {
        let records = vec![record(3, Some("comisiones altas"), None)];
        let categorized = categorize_all(&records, ScoreScale::RawZeroToTen, SiteCode::Ar);
        assert_eq!(categorized[0].categoria, "Comisiones y costos");
    }

    #[test]
    fn promoters_are_skipped_and_unmapped_reasons_fall_back_to_other() {
        let records = vec![
            record(10, Some("todo excelente"), None),
            record(1, Some("queja inclasificable"), None),
        ];
        let categorized = categorize_all(&records, ScoreScale::RawZeroToTen, SiteCode::Ar);
        assert_eq!(categorized.len(), 1);
        assert_eq!(categorized[0].categoria, OTHER_ES);
    }

    #[test]
    fn no_opinion_correction_is_idempotent() {
        let records = vec![
            record(2, Some("fraude"), Some("No opina")),
            record(4, Some("texto libre sin mapeo"), Some("No opina")),
        ];
        let mut categorized = categorize_all(&records, ScoreScale::RawZeroToTen, SiteCode::Ar);

        let first = apply_no_opinion_correction(&mut categorized, SiteCode::Ar);
        assert_eq!(first, 1);
        assert_eq!(categorized[0].categoria, "Seguridad");
        // Unmappable declared reason keeps the placeholder.
        assert!(is_no_opinion(&categorized[1].categoria_detalle));

        let snapshot: Vec<(String, String)> = categorized
            .iter()
            .map(|r| (r.categoria_detalle.clone(), r.categoria.clone()))
            .collect();

        let second = apply_no_opinion_correction(&mut categorized, SiteCode::Ar);
        assert_eq!(second, 0);
        let after: Vec<(String, String)> = categorized
            .iter()
            .map(|r| (r.categoria_detalle.clone(), r.categoria.clone()))
            .collect();
        assert_eq!(snapshot, after);
    }
}
