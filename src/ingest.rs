use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use tracing::{info, warn};

use crate::model::{AnalysisConfig, RespondentRecord, SiteCode};
use crate::nps::{ScoreScale, infer_scale};
use crate::quarters;
use crate::taxonomy;

// UTF-8 bytes decoded as Latin-1 once upstream; repaired only at this
// boundary, never inside the pipeline.
const MOJIBAKE_REPAIRS: &[(&str, &str)] = &[
    ("Ã¡", "á"),
    ("Ã©", "é"),
    ("Ã­", "í"),
    ("Ã³", "ó"),
    ("Ãº", "ú"),
    ("Ã±", "ñ"),
    ("Ã§", "ç"),
    ("Ãª", "ê"),
    ("Ã£", "ã"),
    ("Ãµ", "õ"),
    ("Ã‰", "É"),
    ("Ã\u{8d}", "Í"),
];

const HIGH_NULL_WARN_SHARE: f64 = 0.5;

#[derive(Debug, Deserialize)]
struct RawRow {
    site: String,
    player: String,
    quarter: String,
    nps: String,
    #[serde(default)]
    motivo_declarado: Option<String>,
    #[serde(default)]
    categoria_nps: Option<String>,
    #[serde(default)]
    producto: Option<String>,
    #[serde(default)]
    tiene_saldo: Option<String>,
}

#[derive(Debug, Clone)]
pub struct IngestSummary {
    pub rows_total: usize,
    pub rows_kept: usize,
    pub rows_in_window: usize,
    pub rows_site_mismatch: usize,
    pub rows_unknown_player: usize,
    pub rows_bad_quarter: usize,
    pub rows_bad_score: usize,
    pub scale: ScoreScale,
}

/// Repairs brand names whose UTF-8 was decoded as Latin-1 somewhere upstream.
/// Pure and total: text without mojibake sequences passes through unchanged.
pub fn fix_encoding(name: &str) -> String {
    let mut repaired = name.to_string();
    for (broken, fixed) in MOJIBAKE_REPAIRS {
        if repaired.contains(broken) {
            repaired = repaired.replace(broken, fixed);
        }
    }
    repaired
}

fn parse_balance_flag(value: Option<&str>) -> bool {
    matches!(
        value.map(str::trim).map(str::to_ascii_lowercase).as_deref(),
        Some("1") | Some("true") | Some("si") | Some("sí") | Some("sim") | Some("yes")
    )
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}

/// Loads the respondent set for one (player, site) from a survey CSV export.
/// Rows from quarters outside the analyzed pair are kept for the NPS trend.
/// Row-level noise (wrong site, unknown player, malformed quarter or score)
/// is counted and logged, never fatal; an export that yields zero rows inside
/// the period pair is.
pub fn load_respondents(
    path: &Path,
    config: &AnalysisConfig,
) -> Result<(Vec<RespondentRecord>, IngestSummary)> {
    let file =
        File::open(path).with_context(|| format!("failed to open dataset {}", path.display()))?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(file);

    let wanted_player = taxonomy::normalize(&config.player);

    let mut records = Vec::new();
    let mut summary = IngestSummary {
        rows_total: 0,
        rows_kept: 0,
        rows_in_window: 0,
        rows_site_mismatch: 0,
        rows_unknown_player: 0,
        rows_bad_quarter: 0,
        rows_bad_score: 0,
        scale: ScoreScale::RawZeroToTen,
    };
    let mut null_reasons = 0usize;

    for row in reader.deserialize::<RawRow>() {
        let row = row.with_context(|| format!("malformed CSV row in {}", path.display()))?;
        summary.rows_total += 1;

        let Some(site) = SiteCode::parse_code(&row.site) else {
            summary.rows_site_mismatch += 1;
            continue;
        };
        if site != config.site {
            summary.rows_site_mismatch += 1;
            continue;
        }

        let player = fix_encoding(&row.player);
        if taxonomy::normalize(&player) != wanted_player {
            summary.rows_unknown_player += 1;
            continue;
        }

        let period = match quarters::parse_period(&row.quarter) {
            Ok(period) => period,
            Err(_) => {
                summary.rows_bad_quarter += 1;
                continue;
            }
        };
        let score = match row.nps.trim().parse::<i8>() {
            Ok(score) if (-1..=10).contains(&score) => score,
            _ => {
                summary.rows_bad_score += 1;
                continue;
            }
        };

        if period == config.p1 || period == config.p2 {
            summary.rows_in_window += 1;
        }

        let declared_reason = non_empty(row.motivo_declarado);
        if declared_reason.is_none() {
            null_reasons += 1;
        }

        records.push(RespondentRecord {
            site,
            player: player.clone(),
            period,
            score,
            declared_reason,
            precomputed_category: non_empty(row.categoria_nps),
            product: non_empty(row.producto),
            balance_holder: parse_balance_flag(row.tiene_saldo.as_deref()),
        });
    }

    summary.rows_kept = records.len();
    if summary.rows_in_window == 0 {
        bail!(
            "dataset {} has no usable rows for player {} on site {} in {}..{}",
            path.display(),
            config.player,
            config.site,
            config.period1,
            config.period2
        );
    }

    summary.scale = infer_scale(records.iter().map(|record| &record.score));

    if summary.rows_unknown_player > 0 {
        warn!(
            rows = summary.rows_unknown_player,
            player = %config.player,
            "rows with a different player name were skipped"
        );
    }
    if summary.rows_bad_quarter > 0 || summary.rows_bad_score > 0 {
        warn!(
            bad_quarter = summary.rows_bad_quarter,
            bad_score = summary.rows_bad_score,
            "malformed rows were skipped"
        );
    }
    let null_share = null_reasons as f64 / summary.rows_kept as f64;
    if null_share > HIGH_NULL_WARN_SHARE {
        warn!(
            null_share = format!("{:.0}%", 100.0 * null_share),
            "declared-reason column is mostly empty"
        );
    }

    info!(
        rows_total = summary.rows_total,
        rows_kept = summary.rows_kept,
        rows_in_window = summary.rows_in_window,
        other_sites = summary.rows_site_mismatch,
        scale = ?summary.scale,
        "dataset loaded"
    );

    Ok((records, summary))
}
