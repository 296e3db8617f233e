use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tracing::{info, warn};

use crate::model::{NewsCache, NewsItem, SemanticBundle, SiteCode};
use crate::quarters::Period;
use crate::taxonomy;

/// Filesystem-safe identifier for a brand: normalized, spaces to underscores.
pub fn player_slug(player: &str) -> String {
    taxonomy::normalize(player)
        .split_whitespace()
        .collect::<Vec<&str>>()
        .join("_")
}

pub fn semantic_bundle_path(cache_root: &Path, player: &str, period: Period) -> PathBuf {
    cache_root.join(format!(
        "causas_raiz_semantico_{}_{}.json",
        player_slug(player),
        period.label()
    ))
}

pub fn news_cache_path(cache_root: &Path, site: SiteCode, player: &str) -> PathBuf {
    cache_root.join(format!(
        "noticias_cache_{}_{}.json",
        site.as_str().to_lowercase(),
        player_slug(player)
    ))
}

pub fn prompt_path(cache_root: &Path, player: &str, period: Period) -> PathBuf {
    cache_root.join("prompts").join(format!(
        "prompt_causas_{}_{}.md",
        player_slug(player),
        period.label()
    ))
}

pub fn suggestions_path(cache_root: &Path, player: &str, period: Period) -> PathBuf {
    cache_root.join(format!(
        "sugerencias_busqueda_{}_{}.json",
        player_slug(player),
        period.label()
    ))
}

pub fn report_path(cache_root: &Path, player: &str, p1: Period, p2: Period) -> PathBuf {
    cache_root.join(format!(
        "informe_{}_{}_{}.json",
        player_slug(player),
        p1.label(),
        p2.label()
    ))
}

/// Reads the semantic root-cause bundle if it exists. Absence is a pause
/// condition, not an error; a bundle that exists but cannot be parsed, or
/// that carries no causes at all, indicates a broken external handoff and is
/// fatal.
pub fn load_semantic_bundle(
    path: &Path,
    player: &str,
    period: Period,
) -> Result<Option<SemanticBundle>> {
    if !path.exists() {
        return Ok(None);
    }

    let raw = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let bundle: SemanticBundle = serde_json::from_slice(&raw)
        .with_context(|| format!("failed to parse semantic bundle {}", path.display()))?;

    if bundle.causas_por_motivo.is_empty() {
        bail!(
            "semantic bundle {} is present but empty; the external analysis must cover at least one category",
            path.display()
        );
    }

    if player_slug(&bundle.metadata.player) != player_slug(player)
        || bundle.metadata.quarter != period.label()
    {
        bail!(
            "semantic bundle {} is keyed to ({}, {}) but this run analyzes ({}, {})",
            path.display(),
            bundle.metadata.player,
            bundle.metadata.quarter,
            player,
            period.label()
        );
    }

    info!(
        path = %path.display(),
        categorias = bundle.causas_por_motivo.len(),
        "loaded semantic root-cause bundle"
    );
    Ok(Some(bundle))
}

/// Reads the news cache for (site, player). A missing or empty cache is a
/// normal state: the external injector may simply not have run yet. The cache
/// is re-read on every invocation, never held across runs.
pub fn load_news_cache(path: &Path, site: SiteCode, player: &str) -> Result<Vec<NewsItem>> {
    if !path.exists() {
        warn!(path = %path.display(), "news cache absent, continuing with no news");
        return Ok(Vec::new());
    }

    let raw = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let cache: NewsCache = serde_json::from_slice(&raw)
        .with_context(|| format!("failed to parse news cache {}", path.display()))?;

    if SiteCode::parse_code(&cache.site) != Some(site)
        || player_slug(&cache.player) != player_slug(player)
    {
        warn!(
            path = %path.display(),
            cache_site = %cache.site,
            cache_player = %cache.player,
            "news cache keyed to a different (site, player), ignoring its entries"
        );
        return Ok(Vec::new());
    }

    info!(path = %path.display(), noticias = cache.noticias.len(), "loaded news cache");
    Ok(cache.noticias)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CategoryCauses, SemanticBundleMetadata};
    use crate::quarters::parse_period;
    use crate::util::write_json_pretty;
    use std::collections::BTreeMap;

    fn period2() -> Period {
        parse_period("25Q2").unwrap()
    }

    fn bundle(player: &str, quarter: &str, empty: bool) -> SemanticBundle {
        let mut causas = BTreeMap::new();
        if !empty {
            causas.insert(
                "Seguridad".to_string(),
                CategoryCauses {
                    total_comentarios_analizados: 40,
                    delta_pp: 2.0,
                    causas_raiz: Vec::new(),
                },
            );
        }
        SemanticBundle {
            metadata: SemanticBundleMetadata {
                player: player.to_string(),
                site: "AR".to_string(),
                quarter: quarter.to_string(),
            },
            causas_por_motivo: causas,
        }
    }

    #[test]
    fn artifact_paths_follow_the_naming_convention() {
        let root = Path::new("/tmp/cache");
        assert_eq!(
            semantic_bundle_path(root, "Fin Pago", period2()),
            root.join("causas_raiz_semantico_fin_pago_25Q2.json")
        );
        assert_eq!(
            news_cache_path(root, SiteCode::Ar, "FinPago"),
            root.join("noticias_cache_ar_finpago.json")
        );
        assert_eq!(
            prompt_path(root, "FinPago", period2()),
            root.join("prompts").join("prompt_causas_finpago_25Q2.md")
        );
    }

    #[test]
    fn absent_bundle_is_a_pause_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = semantic_bundle_path(dir.path(), "FinPago", period2());
        let loaded = load_semantic_bundle(&path, "FinPago", period2()).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn empty_bundle_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = semantic_bundle_path(dir.path(), "FinPago", period2());
        write_json_pretty(&path, &bundle("FinPago", "25Q2", true)).unwrap();

        let err = load_semantic_bundle(&path, "FinPago", period2()).unwrap_err();
        assert!(err.to_string().contains("present but empty"));
    }

    #[test]
    fn mismatched_bundle_metadata_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = semantic_bundle_path(dir.path(), "FinPago", period2());
        write_json_pretty(&path, &bundle("OtroPlayer", "25Q2", false)).unwrap();

        let err = load_semantic_bundle(&path, "FinPago", period2()).unwrap_err();
        assert!(err.to_string().contains("keyed to"));
    }

    #[test]
    fn missing_or_mismatched_news_cache_yields_no_news() {
        let dir = tempfile::tempdir().unwrap();
        let path = news_cache_path(dir.path(), SiteCode::Ar, "FinPago");
        assert!(load_news_cache(&path, SiteCode::Ar, "FinPago")
            .unwrap()
            .is_empty());

        let cache = NewsCache {
            site: "BR".to_string(),
            player: "FinPago".to_string(),
            noticias: Vec::new(),
        };
        write_json_pretty(&path, &cache).unwrap();
        assert!(load_news_cache(&path, SiteCode::Ar, "FinPago")
            .unwrap()
            .is_empty());
    }
}
