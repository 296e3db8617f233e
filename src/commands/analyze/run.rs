use anyhow::{Context, Result, bail};
use chrono::Utc;
use serde_json::json;
use tracing::info;

use crate::artifacts;
use crate::categorize;
use crate::cli::AnalyzeArgs;
use crate::enrichment;
use crate::ingest;
use crate::model::{AnalysisConfig, PipelineOutcome, RespondentRecord, RunProvenance, SiteCode};
use crate::nps::{self, NpsError, ScoreScale};
use crate::quarters;
use crate::suggest;
use crate::taxonomy::{self, Locale};
use crate::triangulation;
use crate::util::{now_utc_string, sha256_file, utc_compact_string, write_json_pretty, write_text};
use crate::waterfall::{self, WaterfallConfig};

use super::prompts::build_root_cause_prompt;
use super::summary::{build_result_bundle, write_report};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Loading,
    Scoring,
    Categorizing,
    Waterfall,
    AwaitingRootCauses,
    Triangulating,
    AwaitingNews,
    Summarizing,
    Done,
}

impl Stage {
    fn as_str(self) -> &'static str {
        match self {
            Self::Loading => "LOADING",
            Self::Scoring => "SCORING",
            Self::Categorizing => "CATEGORIZING",
            Self::Waterfall => "WATERFALL",
            Self::AwaitingRootCauses => "AWAITING_ROOT_CAUSES",
            Self::Triangulating => "TRIANGULATING",
            Self::AwaitingNews => "AWAITING_NEWS",
            Self::Summarizing => "SUMMARIZING",
            Self::Done => "DONE",
        }
    }
}

fn enter(stage: Stage) {
    info!(stage = stage.as_str(), "entering stage");
}

pub fn validate_config(args: &AnalyzeArgs) -> Result<AnalysisConfig> {
    let p1 = quarters::parse_period(&args.period1)
        .with_context(|| format!("invalid --period1 {}", args.period1))?;
    let p2 = quarters::parse_period(&args.period2)
        .with_context(|| format!("invalid --period2 {}", args.period2))?;

    if p1 >= p2 {
        bail!(
            "--period1 {} must precede --period2 {}",
            args.period1,
            args.period2
        );
    }

    if args.player.trim().is_empty() {
        bail!("--player must not be empty");
    }

    Ok(AnalysisConfig {
        player: args.player.trim().to_string(),
        site: args.site,
        period1: p1.label(),
        period2: p2.label(),
        significance_threshold_pp: args.significance_threshold_pp,
        min_category_sample: args.min_category_sample,
        reconciliation_tolerance_pp: args.reconciliation_tolerance_pp,
        p1,
        p2,
    })
}

/// Runs the pipeline from LOADING through whichever checkpoint halts it.
/// Every halt is a pure read of external state, so re-invoking after the
/// external artifact appears walks the same stages and passes the gate.
pub fn run(args: AnalyzeArgs) -> Result<PipelineOutcome> {
    let config = validate_config(&args)?;
    let started_ts = Utc::now();
    let run_id = format!("analisis-{}", utc_compact_string(started_ts));

    info!(
        run_id = %run_id,
        player = %config.player,
        site = %config.site,
        periodo1 = %config.period1,
        periodo2 = %config.period2,
        "starting analysis"
    );

    enter(Stage::Loading);
    let dataset_sha256 = sha256_file(&args.data_path)?;
    let (records, ingest_summary) = ingest::load_respondents(&args.data_path, &config)?;

    enter(Stage::Scoring);
    let scale = ingest_summary.scale;
    let snapshot1 = nps::snapshot(&records, scale, &config.player, config.p1)?;
    let snapshot2 = nps::snapshot(&records, scale, &config.player, config.p2)?;
    let trend = nps_trend(&records, scale, &config)?;
    info!(
        nps_p1 = format!("{:.1}", snapshot1.nps),
        nps_p2 = format!("{:.1}", snapshot2.nps),
        delta = format!("{:+.1}", snapshot2.nps - snapshot1.nps),
        trimestres_tendencia = trend.len(),
        "scored both periods"
    );

    enter(Stage::Categorizing);
    let mut categorized = categorize::categorize_all(&records, scale, config.site);
    let corrected = categorize::apply_no_opinion_correction(&mut categorized, config.site);
    info!(
        categorized = categorized.len(),
        no_opinion_corrected = corrected,
        "complaints categorized"
    );

    enter(Stage::Waterfall);
    let waterfall_config = WaterfallConfig {
        significance_threshold_pp: config.significance_threshold_pp,
        min_category_sample: config.min_category_sample,
        tolerance_pp: config.reconciliation_tolerance_pp,
    };
    let waterfall = waterfall::decompose(
        &categorized,
        &snapshot1,
        &snapshot2,
        config.p1,
        config.p2,
        &waterfall_config,
    )?;
    info!(
        categorias = waterfall.rows.len(),
        significativas = waterfall::significant_rows(&waterfall).len(),
        detractor_delta_pp = format!("{:+.1}", waterfall.detractor_delta_pp),
        "waterfall decomposed"
    );

    enter(Stage::AwaitingRootCauses);
    let bundle_path = artifacts::semantic_bundle_path(&args.cache_root, &config.player, config.p2);
    let comments = enrichment::comments_by_category(&categorized, config.p1, config.p2);
    let Some(bundle) = artifacts::load_semantic_bundle(&bundle_path, &config.player, config.p2)?
    else {
        let prompt_path = artifacts::prompt_path(&args.cache_root, &config.player, config.p2);
        let prompt = build_root_cause_prompt(&config, &waterfall, &comments, &bundle_path);
        write_text(&prompt_path, &prompt)?;

        info!(
            prompt_path = %prompt_path.display(),
            bundle_path = %bundle_path.display(),
            "semantic bundle missing, halting for external root-cause analysis"
        );
        println!(
            "{}",
            json!({
                "status": "needs_root_causes",
                "prompt_path": prompt_path.display().to_string(),
                "bundle_path": bundle_path.display().to_string(),
            })
        );
        return Ok(PipelineOutcome::NeedsRootCauses {
            prompt_path,
            bundle_path,
        });
    };

    enter(Stage::Triangulating);
    let products = triangulation::product_usage(&records, config.p1, config.p2);
    let cache_path = artifacts::news_cache_path(&args.cache_root, config.site, &config.player);
    let all_news = artifacts::load_news_cache(&cache_path, config.site, &config.player)?;
    let news_in_window = triangulation::filter_by_period(&all_news, config.p1, config.p2);
    let triangulations =
        triangulation::triangulate(&products, &waterfall, &news_in_window, config.site);
    let enriched = enrichment::enrich(
        &waterfall,
        &comments,
        Some(&bundle),
        &triangulations,
        config.site,
    )?;
    let gaps = triangulation::driver_gaps(&waterfall, &triangulations);
    info!(
        noticias_en_ventana = news_in_window.len(),
        driver_gaps = gaps.len(),
        "triangulation complete"
    );

    if !gaps.is_empty() {
        enter(Stage::AwaitingNews);
        let security_delta = security_delta(&waterfall, config.site);
        let loyalty_delta = loyalty_delta(&records, scale, &config);
        let suggestions = suggest::suggest(
            &config.player,
            config.site,
            gaps,
            security_delta,
            loyalty_delta,
            &news_in_window,
            config.p1,
            config.p2,
        );

        let suggestions_path =
            artifacts::suggestions_path(&args.cache_root, &config.player, config.p2);
        write_json_pretty(&suggestions_path, &suggestions)?;

        let gap_count = suggestions.driver_gaps.len();
        info!(
            suggestions_path = %suggestions_path.display(),
            cache_path = %cache_path.display(),
            gaps = gap_count,
            "significant drivers lack news evidence, halting for external search"
        );
        println!(
            "{}",
            json!({
                "status": "needs_news",
                "suggestions_path": suggestions_path.display().to_string(),
                "cache_path": cache_path.display().to_string(),
                "gap_count": gap_count,
            })
        );
        return Ok(PipelineOutcome::NeedsNews {
            suggestions_path,
            cache_path,
            gap_count,
        });
    }

    enter(Stage::Summarizing);
    let provenance = RunProvenance {
        run_id,
        started_at: utc_rfc3339(started_ts),
        generated_at: now_utc_string(),
        dataset_sha256,
    };
    let bundle_out = build_result_bundle(
        &config,
        provenance,
        &snapshot1,
        &snapshot2,
        trend,
        waterfall,
        enriched,
        triangulations,
        products,
        bundle,
        news_in_window,
    );

    let report_path = args.report_path.clone().unwrap_or_else(|| {
        artifacts::report_path(&args.cache_root, &config.player, config.p1, config.p2)
    });
    write_report(&report_path, &bundle_out)?;

    enter(Stage::Done);
    info!(report_path = %report_path.display(), "analysis complete");
    println!(
        "{}",
        json!({
            "status": "completed",
            "report_path": report_path.display().to_string(),
        })
    );

    Ok(PipelineOutcome::Completed { report_path })
}

fn utc_rfc3339(ts: chrono::DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

const TREND_QUARTERS: usize = 5;

/// NPS per observed quarter over the trailing window ending at period 2.
/// Quarters after period 2 in the export are left out.
fn nps_trend(
    records: &[RespondentRecord],
    scale: ScoreScale,
    config: &AnalysisConfig,
) -> Result<Vec<nps::NpsSnapshot>> {
    let labels: Vec<String> = records
        .iter()
        .map(|record| record.period.label())
        .collect();
    let window = quarters::last_n_until(&labels, &config.period2, TREND_QUARTERS)?;

    let mut trend = Vec::with_capacity(window.len());
    for label in &window {
        let period = quarters::parse_period(label)?;
        trend.push(nps::snapshot(records, scale, &config.player, period)?);
    }
    Ok(trend)
}

/// Waterfall delta of the locale's security category, 0 when absent.
fn security_delta(waterfall: &crate::waterfall::Waterfall, site: SiteCode) -> f64 {
    let security = match taxonomy::locale_for_site(site) {
        Locale::Es => "Seguridad",
        Locale::Pt => "Segurança",
    };
    waterfall
        .rows
        .iter()
        .find(|row| row.categoria == security)
        .map(|row| row.delta_pp)
        .unwrap_or(0.0)
}

/// NPS movement among balance-holding respondents. A period with no balance
/// holders contributes no signal.
fn loyalty_delta(records: &[RespondentRecord], scale: ScoreScale, config: &AnalysisConfig) -> f64 {
    let holders: Vec<RespondentRecord> = records
        .iter()
        .filter(|record| record.balance_holder)
        .cloned()
        .collect();

    let snap1 = nps::snapshot(&holders, scale, &config.player, config.p1);
    let snap2 = nps::snapshot(&holders, scale, &config.player, config.p2);
    match (snap1, snap2) {
        (Ok(first), Ok(second)) => second.nps - first.nps,
        (Err(NpsError::EmptyDataset { .. }), _) | (_, Err(NpsError::EmptyDataset { .. })) => 0.0,
    }
}
