use std::collections::BTreeMap;

use anyhow::{Result, bail};
use serde::Serialize;
use tracing::debug;

use crate::categorize::CategorizedRespondent;
use crate::nps::{NpsSnapshot, Standing};
use crate::quarters::Period;

/// Maximum admissible discrepancy between the summed category deltas and the
/// detractor component of the NPS delta. Anything larger signals a
/// categorization or filtering bug.
pub const RECONCILIATION_TOLERANCE_PP: f64 = 0.1;

pub const DEFAULT_SIGNIFICANCE_THRESHOLD_PP: f64 = 0.5;
pub const DEFAULT_MIN_CATEGORY_SAMPLE: usize = 10;

#[derive(Debug, Clone, Copy)]
pub struct WaterfallConfig {
    pub significance_threshold_pp: f64,
    pub min_category_sample: usize,
    pub tolerance_pp: f64,
}

impl Default for WaterfallConfig {
    fn default() -> Self {
        Self {
            significance_threshold_pp: DEFAULT_SIGNIFICANCE_THRESHOLD_PP,
            min_category_sample: DEFAULT_MIN_CATEGORY_SAMPLE,
            tolerance_pp: RECONCILIATION_TOLERANCE_PP,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WaterfallRow {
    pub categoria: String,
    pub share_p1_pct: f64,
    pub share_p2_pct: f64,
    pub delta_pp: f64,
    pub rank: usize,
    pub significativo: bool,
    pub comentarios_analizados: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct Waterfall {
    pub periodo1: String,
    pub periodo2: String,
    pub nps_delta: f64,
    pub detractor_delta_pp: f64,
    pub rows: Vec<WaterfallRow>,
}

/// Decomposes the NPS movement between two periods into additive per-category
/// detractor-share deltas. Every detractor lands in exactly one category (the
/// taxonomy guarantees an "Other" fallback), so the summed deltas reconcile
/// with the detractor component of the NPS delta by construction; the check
/// is kept anyway to surface upstream filtering bugs.
pub fn decompose(
    categorized: &[CategorizedRespondent],
    snapshot1: &NpsSnapshot,
    snapshot2: &NpsSnapshot,
    p1: Period,
    p2: Period,
    config: &WaterfallConfig,
) -> Result<Waterfall> {
    let nps_delta = snapshot2.nps - snapshot1.nps;

    if snapshot1.detractores == 0 && snapshot2.detractores == 0 {
        debug!(periodo1 = %p1, periodo2 = %p2, "no detractors in either period, all-zero waterfall");
        return Ok(Waterfall {
            periodo1: p1.label(),
            periodo2: p2.label(),
            nps_delta,
            detractor_delta_pp: 0.0,
            rows: Vec::new(),
        });
    }

    let mut counts: BTreeMap<String, (usize, usize, usize)> = BTreeMap::new();
    for respondent in categorized {
        if respondent.standing != Standing::Detractor {
            continue;
        }

        if respondent.period != p1 && respondent.period != p2 {
            continue;
        }

        let entry = counts.entry(respondent.categoria.clone()).or_default();
        if respondent.period == p1 {
            entry.0 += 1;
        } else {
            entry.1 += 1;
        }
        if respondent
            .comment
            .as_deref()
            .is_some_and(|comment| !comment.trim().is_empty())
        {
            entry.2 += 1;
        }
    }

    let total1 = snapshot1.total as f64;
    let total2 = snapshot2.total as f64;

    let mut rows = Vec::with_capacity(counts.len());
    for (categoria, (count1, count2, comments)) in counts {
        let share_p1_pct = 100.0 * count1 as f64 / total1;
        let share_p2_pct = 100.0 * count2 as f64 / total2;
        let delta_pp = share_p2_pct - share_p1_pct;
        let significativo = delta_pp.abs() >= config.significance_threshold_pp
            && comments >= config.min_category_sample;

        rows.push(WaterfallRow {
            categoria,
            share_p1_pct,
            share_p2_pct,
            delta_pp,
            rank: 0,
            significativo,
            comentarios_analizados: comments,
        });
    }

    rows.sort_by(|a, b| {
        b.delta_pp
            .abs()
            .partial_cmp(&a.delta_pp.abs())
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.categoria.cmp(&b.categoria))
    });
    for (index, row) in rows.iter_mut().enumerate() {
        row.rank = index + 1;
    }

    let detractor_share1 = 100.0 * snapshot1.detractores as f64 / total1;
    let detractor_share2 = 100.0 * snapshot2.detractores as f64 / total2;
    let detractor_delta_pp = detractor_share2 - detractor_share1;

    let summed: f64 = rows.iter().map(|row| row.delta_pp).sum();
    if (summed - detractor_delta_pp).abs() > config.tolerance_pp {
        bail!(
            "waterfall does not reconcile: category deltas sum to {summed:.3}pp but the detractor share moved {detractor_delta_pp:.3}pp ({} -> {})",
            p1.label(),
            p2.label()
        );
    }

    Ok(Waterfall {
        periodo1: p1.label(),
        periodo2: p2.label(),
        nps_delta,
        detractor_delta_pp,
        rows,
    })
}

/// Rows eligible for driver-gap analysis and the checkpoint gate.
pub fn significant_rows(waterfall: &Waterfall) -> Vec<&WaterfallRow> {
    waterfall
        .rows
        .iter()
        .filter(|row| row.significativo)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{RespondentRecord, SiteCode};
    use crate::nps::{ScoreScale, snapshot};
    use crate::quarters::parse_period;

    fn respondent(score: i8, reason: Option<&str>, period: Period) -> RespondentRecord {
        RespondentRecord {
            site: SiteCode::Ar,
            player: "FinPago".to_string(),
            period,
            score,
            declared_reason: reason.map(ToOwned::to_owned),
            precomputed_category: None,
            product: None,
            balance_holder: false,
        }
    }

    /// 100 respondents per period; the "Comisiones y costos" detractor share
    /// rises from 5% to 12% with everything else held constant.
    fn synthetic_shift() -> Vec<RespondentRecord> {
        let p1 = parse_period("25Q1").unwrap();
        let p2 = parse_period("25Q2").unwrap();
        let mut records = Vec::new();

        for (period, fees) in [(p1, 5usize), (p2, 12usize)] {
            for _ in 0..fees {
                records.push(respondent(2, Some("comisiones altas"), period));
            }
            for _ in 0..10 {
                records.push(respondent(3, Some("fraude"), period));
            }
            for _ in 0..15 {
                records.push(respondent(8, Some("podria mejorar"), period));
            }
            for _ in 0..(100 - fees - 10 - 15) {
                records.push(respondent(10, None, period));
            }
            let in_period = records.iter().filter(|r| r.period == period).count();
            assert_eq!(in_period, 100);
        }

        records
    }

    fn build(records: &[RespondentRecord]) -> Waterfall {
        let p1 = parse_period("25Q1").unwrap();
        let p2 = parse_period("25Q2").unwrap();
        let scale = ScoreScale::RawZeroToTen;
        let categorized =
            crate::categorize::categorize_all(records, scale, SiteCode::Ar);
        let snap1 = snapshot(records, scale, "FinPago", p1).unwrap();
        let snap2 = snapshot(records, scale, "FinPago", p2).unwrap();
        decompose(
            &categorized,
            &snap1,
            &snap2,
            p1,
            p2,
            &WaterfallConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn known_category_shift_is_the_top_ranked_driver() {
        let waterfall = build(&synthetic_shift());
        let top = &waterfall.rows[0];
        assert_eq!(top.categoria, "Comisiones y costos");
        assert_eq!(top.rank, 1);
        assert!((top.delta_pp - 7.0).abs() < 1e-9, "delta {}", top.delta_pp);
        assert!(top.significativo);
    }

    #[test]
    fn category_deltas_reconcile_with_the_detractor_component() {
        let waterfall = build(&synthetic_shift());
        let summed: f64 = waterfall.rows.iter().map(|row| row.delta_pp).sum();
        assert!(
            (summed - waterfall.detractor_delta_pp).abs() <= RECONCILIATION_TOLERANCE_PP,
            "summed {summed} vs detractor delta {}",
            waterfall.detractor_delta_pp
        );
    }

    #[test]
    fn unchanged_categories_are_ranked_below_and_not_significant() {
        let waterfall = build(&synthetic_shift());
        let fraud = waterfall
            .rows
            .iter()
            .find(|row| row.categoria == "Seguridad")
            .unwrap();
        assert!(fraud.delta_pp.abs() < 1e-9);
        assert!(!fraud.significativo);
        assert!(fraud.rank > 1);
    }

    #[test]
    fn below_sample_categories_stay_in_the_table_but_are_not_significant() {
        let p1 = parse_period("25Q1").unwrap();
        let p2 = parse_period("25Q2").unwrap();
        let mut records = Vec::new();
        // Three fee detractors in p2 only: a large delta on a tiny sample.
        for _ in 0..3 {
            records.push(respondent(1, Some("comisiones altas"), p2));
        }
        for _ in 0..20 {
            records.push(respondent(10, None, p1));
            records.push(respondent(10, None, p2));
        }
        records.push(respondent(2, Some("fraude"), p1));

        let waterfall = build(&records);
        let fees = waterfall
            .rows
            .iter()
            .find(|row| row.categoria == "Comisiones y costos")
            .unwrap();
        assert!(fees.delta_pp.abs() >= DEFAULT_SIGNIFICANCE_THRESHOLD_PP);
        assert!(!fees.significativo);
    }

    #[test]
    fn zero_detractors_in_both_periods_yields_an_all_zero_waterfall() {
        let p1 = parse_period("25Q1").unwrap();
        let p2 = parse_period("25Q2").unwrap();
        let mut records = Vec::new();
        for _ in 0..10 {
            records.push(respondent(10, None, p1));
            records.push(respondent(8, Some("podria mejorar"), p2));
        }

        let waterfall = build(&records);
        assert!(waterfall.rows.is_empty());
        assert_eq!(waterfall.detractor_delta_pp, 0.0);
    }

    #[test]
    fn equal_deltas_tie_break_by_category_name() {
        let p1 = parse_period("25Q1").unwrap();
        let p2 = parse_period("25Q2").unwrap();
        let mut records = Vec::new();
        for _ in 0..5 {
            records.push(respondent(2, Some("fraude"), p2));
            records.push(respondent(2, Some("comisiones altas"), p2));
        }
        for _ in 0..90 {
            records.push(respondent(10, None, p2));
        }
        for _ in 0..100 {
            records.push(respondent(10, None, p1));
        }

        let waterfall = build(&records);
        assert_eq!(waterfall.rows[0].categoria, "Comisiones y costos");
        assert_eq!(waterfall.rows[1].categoria, "Seguridad");
        assert_eq!(waterfall.rows[0].delta_pp, waterfall.rows[1].delta_pp);
    }
}
