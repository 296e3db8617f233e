use std::path::Path;

use anyhow::Result;
use tracing::info;

use crate::enrichment::EnrichedRow;
use crate::model::{
    AnalysisConfig, ExecutiveSummary, NewsItem, NpsSection, ResultBundle, RunProvenance,
    SemanticBundle,
};
use crate::nps::NpsSnapshot;
use crate::triangulation::{ProductUsage, Triangulation};
use crate::util::write_json_pretty;
use crate::waterfall::Waterfall;

#[allow(clippy::too_many_arguments)]
pub fn build_result_bundle(
    config: &AnalysisConfig,
    provenance: RunProvenance,
    snapshot1: &NpsSnapshot,
    snapshot2: &NpsSnapshot,
    tendencia: Vec<NpsSnapshot>,
    waterfall: Waterfall,
    causas_waterfall: Vec<EnrichedRow>,
    triangulaciones: Vec<Triangulation>,
    uso_productos: Vec<ProductUsage>,
    causas_semanticas: SemanticBundle,
    noticias: Vec<NewsItem>,
) -> ResultBundle {
    let nps = NpsSection {
        periodo1: snapshot1.clone(),
        periodo2: snapshot2.clone(),
        delta: snapshot2.nps - snapshot1.nps,
        tendencia,
    };
    let resumen_ejecutivo =
        build_executive_summary(config, &nps, &waterfall, &causas_waterfall, &triangulaciones);

    ResultBundle {
        config: config.clone(),
        provenance,
        nps,
        waterfall,
        causas_waterfall,
        triangulaciones,
        uso_productos,
        causas_semanticas,
        noticias,
        sugerencias: None,
        resumen_ejecutivo,
        needs_root_causes: false,
        needs_news: false,
    }
}

pub fn write_report(path: &Path, bundle: &ResultBundle) -> Result<()> {
    write_json_pretty(path, bundle)?;
    info!(path = %path.display(), "wrote report bundle");
    Ok(())
}

fn build_executive_summary(
    config: &AnalysisConfig,
    nps: &NpsSection,
    waterfall: &Waterfall,
    enriched: &[EnrichedRow],
    triangulations: &[Triangulation],
) -> ExecutiveSummary {
    let mut parrafos = Vec::new();

    let direction = if nps.delta < 0.0 { "cayó" } else { "subió" };
    parrafos.push(format!(
        "El NPS de {} en {} {} de {:.1} a {:.1} ({:+.1} puntos) entre {} y {}.",
        config.player,
        config.site.country_name(),
        direction,
        nps.periodo1.nps,
        nps.periodo2.nps,
        nps.delta,
        config.period1,
        config.period2
    ));

    let significant: Vec<&EnrichedRow> = enriched.iter().filter(|row| row.significativo).collect();
    if let Some(top) = significant.first() {
        let mut sentence = format!(
            "El principal driver fue {} con un movimiento de {:+.1}pp en el share de detractores",
            top.categoria, top.delta_pp
        );
        if let Some(cause) = top.causas_raiz.first() {
            sentence.push_str(&format!(
                "; la causa raíz más frecuente es \"{}\" ({:.0}% de los comentarios analizados)",
                cause.titulo, cause.frecuencia_pct
            ));
        }
        sentence.push('.');
        parrafos.push(sentence);
    } else {
        parrafos.push(
            "Ninguna categoría superó el umbral de significancia en este par de períodos."
                .to_string(),
        );
    }

    let corroborated = triangulations
        .iter()
        .filter(|t| t.corroborada && significant.iter().any(|row| row.categoria == t.categoria))
        .count();
    if !significant.is_empty() {
        parrafos.push(format!(
            "{} de {} drivers significativos cuentan con evidencia de prensa dentro de la ventana {}..{}.",
            corroborated,
            significant.len(),
            config.period1,
            config.period2
        ));
    }

    ExecutiveSummary {
        titulo: format!(
            "Variación de NPS {} — {} vs {}",
            config.player, config.period2, config.period1
        ),
        parrafos,
        drivers_destacados: significant
            .iter()
            .map(|row| row.categoria.clone())
            .collect(),
    }
}
