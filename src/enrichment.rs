use std::collections::BTreeMap;

use anyhow::{Context, Result};
use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::categorize::CategorizedRespondent;
use crate::model::{RootCause, SemanticBundle, SiteCode};
use crate::nps::Standing;
use crate::quarters::Period;
use crate::taxonomy::{self, Locale};
use crate::triangulation::Triangulation;
use crate::waterfall::Waterfall;

/// Bounded sample sizes for representative comments: the small cap feeds the
/// quick keyword pass, the large one the external semantic prompt.
pub const QUICK_SAMPLE_CAP: usize = 30;
pub const DEEP_SAMPLE_CAP: usize = 100;

const TOP_KEYWORDS: usize = 10;
const TOP_SUBCAUSES: usize = 5;
const MIN_TOKEN_LEN: usize = 3;

// Diacritics-stripped to match the normalized token stream.
const STOPWORDS_ES: &[&str] = &[
    "los", "las", "del", "por", "para", "con", "una", "uno", "unos", "unas", "que", "porque",
    "cuando", "muy", "sin", "sobre", "tambien", "hasta", "hay", "donde", "desde", "todo",
    "todos", "nos", "durante", "les", "contra", "otros", "otro", "otra", "otras", "ese", "esa",
    "eso", "este", "esta", "esto", "ante", "ellos", "ellas", "antes", "algunos", "pero", "mas",
    "sus", "como", "era", "son", "estan", "fue", "ser", "tiene", "tienen", "tengo",
    "hace", "hacen", "siempre", "nunca", "ahora", "solo", "cada", "entre",
];

const STOPWORDS_PT: &[&str] = &[
    "que", "nao", "uma", "para", "com", "dos", "das", "como", "mas", "foi", "tem", "seu",
    "sua", "quando", "muito", "nos", "esta", "estao", "tambem", "pelo", "pela", "ate", "isso",
    "ela", "ele", "entre", "era", "depois", "sem", "mesmo", "aos", "ter", "quem", "nas",
    "esse", "essa", "este", "voce", "tinha", "foram", "num", "nem", "suas", "meu", "minha",
    "numa", "pelos", "pelas", "elas", "eles", "seja", "ser", "sempre", "nunca", "agora",
    "todo", "toda", "todos", "todas", "cada", "fazem", "fazer",
];

#[derive(Debug, Clone, Serialize)]
pub struct KeywordCount {
    pub palabra: String,
    pub menciones: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubCause {
    pub titulo: String,
    pub menciones: usize,
}

/// A waterfall row enriched with comment samples, keyword-derived sub-causes,
/// the externally supplied root causes, and corroborating news titles.
#[derive(Debug, Clone, Serialize)]
pub struct EnrichedRow {
    pub categoria: String,
    pub delta_pp: f64,
    pub rank: usize,
    pub significativo: bool,
    pub total_comentarios_analizados: usize,
    pub comentarios_muestra: Vec<String>,
    pub palabras_clave: Vec<KeywordCount>,
    pub subcausas: Vec<SubCause>,
    pub causas_raiz: Vec<RootCause>,
    pub evidencia_noticias: Vec<String>,
}

/// Groups detractor comments by aggregated category, period-2 comments first
/// so samples favor the most recent quarter. Order is deterministic: input
/// order within each period is preserved.
pub fn comments_by_category(
    categorized: &[CategorizedRespondent],
    p1: Period,
    p2: Period,
) -> BTreeMap<String, Vec<String>> {
    let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();

    for period in [p2, p1] {
        for respondent in categorized {
            if respondent.period != period || respondent.standing != Standing::Detractor {
                continue;
            }
            let Some(comment) = respondent.comment.as_deref() else {
                continue;
            };
            let trimmed = comment.trim();
            if trimmed.is_empty() {
                continue;
            }
            grouped
                .entry(respondent.categoria.clone())
                .or_default()
                .push(trimmed.to_string());
        }
    }

    grouped
}

/// Enriches every waterfall row. Externally computed cause frequencies are
/// merged verbatim, never recomputed; rows without a bundle entry carry only
/// the keyword-derived sub-causes.
pub fn enrich(
    waterfall: &Waterfall,
    comments: &BTreeMap<String, Vec<String>>,
    bundle: Option<&SemanticBundle>,
    triangulations: &[Triangulation],
    site: SiteCode,
) -> Result<Vec<EnrichedRow>> {
    let token_pattern =
        Regex::new(r"[\p{L}\p{N}]+").context("failed to compile comment token pattern")?;
    let stopwords = stopwords_for(site);
    let empty = Vec::new();

    let mut enriched = Vec::with_capacity(waterfall.rows.len());
    for row in &waterfall.rows {
        let category_comments = comments.get(&row.categoria).unwrap_or(&empty);
        let sample: Vec<String> = category_comments
            .iter()
            .take(QUICK_SAMPLE_CAP)
            .cloned()
            .collect();

        let palabras_clave =
            extract_keywords(category_comments, &token_pattern, stopwords, DEEP_SAMPLE_CAP);
        let subcausas = palabras_clave
            .iter()
            .take(TOP_SUBCAUSES)
            .map(|keyword| SubCause {
                titulo: keyword.palabra.clone(),
                menciones: keyword.menciones,
            })
            .collect();

        let bundle_entry = bundle.and_then(|value| {
            let key = taxonomy::normalize(&row.categoria);
            value
                .causas_por_motivo
                .iter()
                .find(|(categoria, _)| taxonomy::normalize(categoria) == key)
                .map(|(_, causes)| causes)
        });

        let (causas_raiz, total_analizados) = match bundle_entry {
            Some(causes) => (
                causes.causas_raiz.clone(),
                causes.total_comentarios_analizados,
            ),
            None => {
                debug!(categoria = %row.categoria, "no semantic causes for category");
                (Vec::new(), category_comments.len().min(DEEP_SAMPLE_CAP))
            }
        };

        let evidencia_noticias = triangulations
            .iter()
            .filter(|triangulation| triangulation.categoria == row.categoria)
            .flat_map(|triangulation| triangulation.noticias.iter())
            .map(|news| news.titulo.clone())
            .collect();

        enriched.push(EnrichedRow {
            categoria: row.categoria.clone(),
            delta_pp: row.delta_pp,
            rank: row.rank,
            significativo: row.significativo,
            total_comentarios_analizados: total_analizados,
            comentarios_muestra: sample,
            palabras_clave,
            subcausas,
            causas_raiz,
            evidencia_noticias,
        });
    }

    Ok(enriched)
}

fn stopwords_for(site: SiteCode) -> &'static [&'static str] {
    match taxonomy::locale_for_site(site) {
        Locale::Es => STOPWORDS_ES,
        Locale::Pt => STOPWORDS_PT,
    }
}

/// Simple frequency count over normalized tokens. Not a statistical model:
/// tokenize, drop stopwords and short tokens, count, order by count then
/// token for a stable result.
fn extract_keywords(
    comments: &[String],
    token_pattern: &Regex,
    stopwords: &'static [&'static str],
    cap: usize,
) -> Vec<KeywordCount> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();

    for comment in comments.iter().take(cap) {
        let normalized = taxonomy::normalize(comment);
        for token in token_pattern.find_iter(&normalized) {
            let word = token.as_str();
            if word.len() < MIN_TOKEN_LEN || stopwords.contains(&word) {
                continue;
            }
            *counts.entry(word.to_string()).or_default() += 1;
        }
    }

    let mut keywords: Vec<KeywordCount> = counts
        .into_iter()
        .map(|(palabra, menciones)| KeywordCount { palabra, menciones })
        .collect();
    keywords.sort_by(|a, b| {
        b.menciones
            .cmp(&a.menciones)
            .then_with(|| a.palabra.cmp(&b.palabra))
    });
    keywords.truncate(TOP_KEYWORDS);
    keywords
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CategoryCauses, SemanticBundleMetadata};
    use crate::quarters::parse_period;
    use crate::waterfall::WaterfallRow;

    fn waterfall_with_row(categoria: &str) -> Waterfall {
        Waterfall {
            periodo1: "25Q1".to_string(),
            periodo2: "25Q2".to_string(),
            nps_delta: -10.0,
            detractor_delta_pp: 7.0,
            rows: vec![WaterfallRow {
                categoria: categoria.to_string(),
                share_p1_pct: 5.0,
                share_p2_pct: 12.0,
                delta_pp: 7.0,
                rank: 1,
                significativo: true,
                comentarios_analizados: 12,
            }],
        }
    }

    fn bundle_for(categoria: &str) -> SemanticBundle {
        let causes = CategoryCauses {
            total_comentarios_analizados: 87,
            delta_pp: 7.0,
            causas_raiz: vec![RootCause {
                titulo: "Suba del costo de mantenimiento".to_string(),
                descripcion: "Clientes mencionan el nuevo cargo mensual".to_string(),
                frecuencia_pct: 43.7,
                frecuencia_abs: 38,
                ejemplos: vec!["me cobraron mantenimiento sin avisar".to_string()],
            }],
        };
        SemanticBundle {
            metadata: SemanticBundleMetadata {
                player: "FinPago".to_string(),
                site: "AR".to_string(),
                quarter: "25Q2".to_string(),
            },
            causas_por_motivo: [(categoria.to_string(), causes)].into_iter().collect(),
        }
    }

    #[test]
    fn keyword_extraction_drops_stopwords_and_counts_mentions() {
        let comments = vec![
            "me cobraron comisiones muy altas".to_string(),
            "las comisiones subieron sin aviso".to_string(),
            "comisiones y cargos por todo".to_string(),
        ];
        let pattern = Regex::new(r"[\p{L}\p{N}]+").unwrap();
        let keywords = extract_keywords(&comments, &pattern, STOPWORDS_ES, DEEP_SAMPLE_CAP);

        assert_eq!(keywords[0].palabra, "comisiones");
        assert_eq!(keywords[0].menciones, 3);
        assert!(keywords.iter().all(|k| k.palabra != "muy"));
        assert!(keywords.iter().all(|k| k.palabra != "por"));
    }

    #[test]
    fn comment_samples_are_capped_and_favor_period2() {
        let p1 = parse_period("25Q1").unwrap();
        let p2 = parse_period("25Q2").unwrap();
        let mut categorized = Vec::new();
        for index in 0..40 {
            categorized.push(CategorizedRespondent {
                period: if index < 20 { p1 } else { p2 },
                standing: Standing::Detractor,
                categoria_detalle: "comisiones altas".to_string(),
                categoria: "Comisiones y costos".to_string(),
                comment: Some(format!("comentario {index}")),
                balance_holder: false,
            });
        }

        let grouped = comments_by_category(&categorized, p1, p2);
        let comments = &grouped["Comisiones y costos"];
        assert_eq!(comments.len(), 40);
        // Period-2 comments (indexes 20..40) come first.
        assert_eq!(comments[0], "comentario 20");

        let waterfall = waterfall_with_row("Comisiones y costos");
        let enriched = enrich(&waterfall, &grouped, None, &[], SiteCode::Ar).unwrap();
        assert_eq!(enriched[0].comentarios_muestra.len(), QUICK_SAMPLE_CAP);
    }

    #[test]
    fn bundle_causes_are_merged_verbatim() {
        let waterfall = waterfall_with_row("Comisiones y costos");
        let bundle = bundle_for("Comisiones y costos");
        let grouped = BTreeMap::new();

        let enriched = enrich(&waterfall, &grouped, Some(&bundle), &[], SiteCode::Ar).unwrap();
        let row = &enriched[0];
        assert_eq!(row.total_comentarios_analizados, 87);
        assert_eq!(row.causas_raiz.len(), 1);
        assert!((row.causas_raiz[0].frecuencia_pct - 43.7).abs() < 1e-9);
        assert_eq!(row.causas_raiz[0].frecuencia_abs, 38);
    }

    #[test]
    fn bundle_category_match_ignores_accents_and_case() {
        let waterfall = waterfall_with_row("Atención al cliente");
        let bundle = bundle_for("atencion al cliente");
        let grouped = BTreeMap::new();

        let enriched = enrich(&waterfall, &grouped, Some(&bundle), &[], SiteCode::Ar).unwrap();
        assert_eq!(enriched[0].causas_raiz.len(), 1);
    }

    #[test]
    fn rows_without_bundle_entry_carry_keyword_subcauses_only() {
        let waterfall = waterfall_with_row("Seguridad");
        let mut grouped = BTreeMap::new();
        grouped.insert(
            "Seguridad".to_string(),
            vec!["fraude en mi cuenta".to_string(), "fraude otra vez".to_string()],
        );

        let enriched = enrich(&waterfall, &grouped, None, &[], SiteCode::Ar).unwrap();
        let row = &enriched[0];
        assert!(row.causas_raiz.is_empty());
        assert_eq!(row.total_comentarios_analizados, 2);
        assert_eq!(row.subcausas[0].titulo, "fraude");
        assert_eq!(row.subcausas[0].menciones, 2);
    }
}
