use serde::Serialize;

use crate::model::{NewsItem, SiteCode};
use crate::quarters::Period;
use crate::taxonomy;
use crate::triangulation::DriverGap;

// Dedicated queries fire when the security driver worsens or loyalty among
// balance holders drops materially.
const SECURITY_QUERY_THRESHOLD_PP: f64 = 0.5;
const LOYALTY_QUERY_THRESHOLD: f64 = -5.0;

#[derive(Debug, Clone, Serialize)]
pub struct SuggestedQuery {
    pub categoria: String,
    pub consulta: String,
    pub ventana: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchSuggestions {
    pub driver_gaps: Vec<DriverGap>,
    pub suggested_queries: Vec<SuggestedQuery>,
}

/// Builds deterministic search queries for every driver gap, templated from
/// the driver name, brand, site, and period labels. Same inputs, same output:
/// repeated halted runs hand the external agent identical instructions.
#[allow(clippy::too_many_arguments)]
pub fn suggest(
    player: &str,
    site: SiteCode,
    driver_gaps: Vec<DriverGap>,
    security_delta: f64,
    loyalty_delta: f64,
    existing_news: &[NewsItem],
    period1: Period,
    period2: Period,
) -> SearchSuggestions {
    let country = site.country_name();
    let ventana = format!("{period1}..{period2}");
    let year = period2.year;

    let mut suggested_queries = Vec::new();
    for gap in &driver_gaps {
        if has_news_for_category(existing_news, &gap.categoria) {
            continue;
        }

        let driver = gap.categoria.to_lowercase();
        suggested_queries.push(SuggestedQuery {
            categoria: gap.categoria.clone(),
            consulta: format!("\"{player}\" {driver} noticias {country} {year}"),
            ventana: ventana.clone(),
        });
        suggested_queries.push(SuggestedQuery {
            categoria: gap.categoria.clone(),
            consulta: format!("\"{player}\" quejas {driver} {country}"),
            ventana: ventana.clone(),
        });
    }

    if security_delta >= SECURITY_QUERY_THRESHOLD_PP {
        suggested_queries.push(SuggestedQuery {
            categoria: "seguridad".to_string(),
            consulta: format!("\"{player}\" fraude seguridad incidentes {country} {year}"),
            ventana: ventana.clone(),
        });
    }

    if loyalty_delta <= LOYALTY_QUERY_THRESHOLD {
        suggested_queries.push(SuggestedQuery {
            categoria: "lealtad".to_string(),
            consulta: format!("\"{player}\" clientes retiran saldo competencia {country} {year}"),
            ventana,
        });
    }

    SearchSuggestions {
        driver_gaps,
        suggested_queries,
    }
}

fn has_news_for_category(news: &[NewsItem], categoria: &str) -> bool {
    let key = taxonomy::normalize(categoria);
    news.iter()
        .any(|item| taxonomy::normalize(&item.categoria_relacionada) == key)
}
