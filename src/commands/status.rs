use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::artifacts;
use crate::cli::StatusArgs;
use crate::quarters;

/// Reports presence and shape of the external artifacts a run depends on,
/// without running the pipeline.
pub fn run(args: StatusArgs) -> Result<()> {
    let p1 = quarters::parse_period(&args.period1)
        .with_context(|| format!("invalid --period1 {}", args.period1))?;
    let p2 = quarters::parse_period(&args.period2)
        .with_context(|| format!("invalid --period2 {}", args.period2))?;

    let ventana = quarters::quarters_between(&args.period1, &args.period2, true)?;
    info!(
        cache_root = %args.cache_root.display(),
        player = %args.player,
        site = %args.site,
        trimestres = ventana.len(),
        ventana = format!("{}..{}", args.period1, args.period2),
        "status requested"
    );

    let bundle_path = artifacts::semantic_bundle_path(&args.cache_root, &args.player, p2);
    if bundle_path.exists() {
        match artifacts::load_semantic_bundle(&bundle_path, &args.player, p2) {
            Ok(Some(bundle)) => info!(
                path = %bundle_path.display(),
                categorias = bundle.causas_por_motivo.len(),
                "semantic bundle ready"
            ),
            Ok(None) => {}
            Err(err) => warn!(path = %bundle_path.display(), error = %err, "semantic bundle unusable"),
        }
    } else {
        warn!(path = %bundle_path.display(), "semantic bundle missing, analyze will halt at AWAITING_ROOT_CAUSES");
    }

    let cache_path = artifacts::news_cache_path(&args.cache_root, args.site, &args.player);
    if cache_path.exists() {
        match artifacts::load_news_cache(&cache_path, args.site, &args.player) {
            Ok(noticias) => info!(
                path = %cache_path.display(),
                noticias = noticias.len(),
                "news cache present"
            ),
            Err(err) => warn!(path = %cache_path.display(), error = %err, "news cache unreadable"),
        }
    } else {
        warn!(path = %cache_path.display(), "news cache absent");
    }

    let prompt_path = artifacts::prompt_path(&args.cache_root, &args.player, p2);
    if prompt_path.exists() {
        info!(path = %prompt_path.display(), "root-cause prompt artifact present");
    }

    let suggestions_path = artifacts::suggestions_path(&args.cache_root, &args.player, p2);
    if suggestions_path.exists() {
        info!(path = %suggestions_path.display(), "search-suggestions artifact present");
    }

    let report_path = artifacts::report_path(&args.cache_root, &args.player, p1, p2);
    if report_path.exists() {
        info!(path = %report_path.display(), "report bundle present");
    } else {
        info!(path = %report_path.display(), "report bundle not yet written");
    }

    Ok(())
}
