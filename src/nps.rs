use serde::Serialize;
use thiserror::Error;

use crate::model::RespondentRecord;
use crate::quarters::Period;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NpsError {
    #[error("no respondents for {player} in period {period}")]
    EmptyDataset { player: String, period: String },
}

/// How the raw score column is encoded. Survey exports carry either the
/// 0-10 recommendation scale or a pre-coded {-1, 0, 1} classification; both
/// occur in the wild and neither is a data error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreScale {
    RawZeroToTen,
    Precoded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Standing {
    Promoter,
    Neutral,
    Detractor,
}

/// Infers the encoding from the whole score column: any negative value can
/// only come from the pre-coded scale.
pub fn infer_scale<'a, I>(scores: I) -> ScoreScale
where
    I: IntoIterator<Item = &'a i8>,
{
    if scores.into_iter().any(|score| *score < 0) {
        ScoreScale::Precoded
    } else {
        ScoreScale::RawZeroToTen
    }
}

pub fn classify(score: i8, scale: ScoreScale) -> Standing {
    match scale {
        ScoreScale::Precoded => match score {
            1.. => Standing::Promoter,
            0 => Standing::Neutral,
            _ => Standing::Detractor,
        },
        ScoreScale::RawZeroToTen => match score {
            9.. => Standing::Promoter,
            7 | 8 => Standing::Neutral,
            _ => Standing::Detractor,
        },
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NpsSnapshot {
    pub periodo: String,
    pub promotores: usize,
    pub neutrales: usize,
    pub detractores: usize,
    pub total: usize,
    pub nps: f64,
}

/// Computes the NPS snapshot for one (player, period) from its respondent
/// slice. `nps = 100 * (promoter_share - detractor_share)`, in [-100, 100].
pub fn snapshot(
    records: &[RespondentRecord],
    scale: ScoreScale,
    player: &str,
    period: Period,
) -> Result<NpsSnapshot, NpsError> {
    let mut promoters = 0usize;
    let mut neutrals = 0usize;
    let mut detractors = 0usize;

    for record in records.iter().filter(|record| record.period == period) {
        match classify(record.score, scale) {
            Standing::Promoter => promoters += 1,
            Standing::Neutral => neutrals += 1,
            Standing::Detractor => detractors += 1,
        }
    }

    let total = promoters + neutrals + detractors;
    if total == 0 {
        return Err(NpsError::EmptyDataset {
            player: player.to_string(),
            period: period.label(),
        });
    }

    let promoter_share = promoters as f64 / total as f64;
    let detractor_share = detractors as f64 / total as f64;

    Ok(NpsSnapshot {
        periodo: period.label(),
        promotores: promoters,
        neutrales: neutrals,
        detractores: detractors,
        total,
        nps: 100.0 * (promoter_share - detractor_share),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SiteCode;

    fn record(score: i8, period: Period) -> RespondentRecord {
        RespondentRecord {
            site: SiteCode::Ar,
            player: "FinPago".to_string(),
            period,
            score,
            declared_reason: None,
            precomputed_category: None,
            product: None,
            balance_holder: false,
        }
    }

    fn period(label: &str) -> Period {
        crate::quarters::parse_period(label).unwrap()
    }

    #[test]
    fn classify_handles_the_raw_scale() {
        assert_eq!(classify(10, ScoreScale::RawZeroToTen), Standing::Promoter);
        assert_eq!(classify(9, ScoreScale::RawZeroToTen), Standing::Promoter);
        assert_eq!(classify(8, ScoreScale::RawZeroToTen), Standing::Neutral);
        assert_eq!(classify(7, ScoreScale::RawZeroToTen), Standing::Neutral);
        assert_eq!(classify(6, ScoreScale::RawZeroToTen), Standing::Detractor);
        assert_eq!(classify(0, ScoreScale::RawZeroToTen), Standing::Detractor);
    }

    #[test]
    fn classify_handles_the_precoded_scale() {
        assert_eq!(classify(1, ScoreScale::Precoded), Standing::Promoter);
        assert_eq!(classify(0, ScoreScale::Precoded), Standing::Neutral);
        assert_eq!(classify(-1, ScoreScale::Precoded), Standing::Detractor);
    }

    #[test]
    fn infer_scale_flags_precoded_on_any_negative() {
        assert_eq!(infer_scale(&[9, 7, 0, 10]), ScoreScale::RawZeroToTen);
        assert_eq!(infer_scale(&[1, 0, -1, 1]), ScoreScale::Precoded);
    }

    #[test]
    fn snapshot_computes_the_score_from_shares() {
        let p = period("25Q2");
        let mut records: Vec<RespondentRecord> =
            (0..6).map(|_| record(10, p)).collect();
        records.extend((0..2).map(|_| record(8, p)));
        records.extend((0..2).map(|_| record(3, p)));

        let snap = snapshot(&records, ScoreScale::RawZeroToTen, "FinPago", p).unwrap();
        assert_eq!(snap.promotores, 6);
        assert_eq!(snap.neutrales, 2);
        assert_eq!(snap.detractores, 2);
        assert_eq!(snap.total, 10);
        assert!((snap.nps - 40.0).abs() < 1e-9);
    }

    #[test]
    fn snapshot_fails_on_an_empty_period() {
        let records = vec![record(10, period("25Q1"))];
        let err = snapshot(&records, ScoreScale::RawZeroToTen, "FinPago", period("25Q2"))
            .unwrap_err();
        assert_eq!(
            err,
            NpsError::EmptyDataset {
                player: "FinPago".to_string(),
                period: "25Q2".to_string()
            }
        );
    }
}
