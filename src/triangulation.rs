use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::warn;

use crate::model::{NewsItem, RespondentRecord, SiteCode};
use crate::quarters::Period;
use crate::taxonomy::{self, Locale};
use crate::waterfall::{Waterfall, WaterfallRow};

// Product names are matched after normalization; each product folds into one
// complaint category.
const PRODUCT_TO_CATEGORY_ES: &[(&str, &str)] = &[
    ("cuenta remunerada", "Rendimientos e inversiones"),
    ("fondo comun de inversion", "Rendimientos e inversiones"),
    ("prestamos personales", "Créditos y financiación"),
    ("tarjeta de credito", "Créditos y financiación"),
    ("tarjeta prepaga", "Comisiones y costos"),
    ("transferencias", "Retiros y transferencias"),
    ("extracciones", "Retiros y transferencias"),
    ("billetera", "Fallas técnicas"),
];

const PRODUCT_TO_CATEGORY_PT: &[(&str, &str)] = &[
    ("conta remunerada", "Rendimentos e investimentos"),
    ("fundo de investimento", "Rendimentos e investimentos"),
    ("emprestimos pessoais", "Crédito e financiamento"),
    ("cartao de credito", "Crédito e financiamento"),
    ("cartao pre-pago", "Tarifas e custos"),
    ("transferencias", "Saques e transferências"),
    ("saques", "Saques e transferências"),
    ("carteira", "Falhas técnicas"),
];

#[derive(Debug, Clone, Serialize)]
pub struct ProductUsage {
    pub producto: String,
    pub share_p1_pct: f64,
    pub share_p2_pct: f64,
    pub delta_pp: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Triangulation {
    pub categoria: String,
    pub delta_pp: f64,
    pub producto_asociado: Option<String>,
    pub uso_producto_delta_pp: Option<f64>,
    pub noticias: Vec<NewsItem>,
    pub corroborada: bool,
}

/// A significant driver with no corroborating news in the period window; the
/// checkpoint controller halts on any of these.
#[derive(Debug, Clone, Serialize)]
pub struct DriverGap {
    pub categoria: String,
    pub delta_pp: f64,
    pub comentarios_analizados: usize,
}

/// Per-product usage share per period and its movement, from the optional
/// product column. Categories missing the column contribute nothing.
pub fn product_usage(records: &[RespondentRecord], p1: Period, p2: Period) -> Vec<ProductUsage> {
    let mut totals = (0usize, 0usize);
    let mut counts: BTreeMap<String, (usize, usize)> = BTreeMap::new();

    for record in records {
        let bucket = if record.period == p1 {
            0
        } else if record.period == p2 {
            1
        } else {
            continue;
        };

        if bucket == 0 {
            totals.0 += 1;
        } else {
            totals.1 += 1;
        }

        let Some(product) = record.product.as_deref() else {
            continue;
        };
        let trimmed = product.trim();
        if trimmed.is_empty() {
            continue;
        }

        let entry = counts.entry(trimmed.to_string()).or_default();
        if bucket == 0 {
            entry.0 += 1;
        } else {
            entry.1 += 1;
        }
    }

    let mut usage = Vec::with_capacity(counts.len());
    for (producto, (count1, count2)) in counts {
        let share_p1_pct = if totals.0 == 0 {
            0.0
        } else {
            100.0 * count1 as f64 / totals.0 as f64
        };
        let share_p2_pct = if totals.1 == 0 {
            0.0
        } else {
            100.0 * count2 as f64 / totals.1 as f64
        };
        usage.push(ProductUsage {
            producto,
            share_p1_pct,
            share_p2_pct,
            delta_pp: share_p2_pct - share_p1_pct,
        });
    }

    usage
}

/// Pure inclusive date-window predicate over the news `fecha`; not a
/// relevance score. Unparseable dates are excluded with a warning.
pub fn filter_by_period(news: &[NewsItem], p1: Period, p2: Period) -> Vec<NewsItem> {
    let window_start = p1.start_date();
    let window_end = p2.end_date();

    news.iter()
        .filter(|item| {
            match NaiveDate::parse_from_str(&item.fecha, "%Y-%m-%d") {
                Ok(date) => date >= window_start && date <= window_end,
                Err(_) => {
                    warn!(fecha = %item.fecha, titulo = %item.titulo, "unparseable news date, excluded");
                    false
                }
            }
        })
        .cloned()
        .collect()
}

fn product_table(site: SiteCode) -> &'static [(&'static str, &'static str)] {
    match taxonomy::locale_for_site(site) {
        Locale::Es => PRODUCT_TO_CATEGORY_ES,
        Locale::Pt => PRODUCT_TO_CATEGORY_PT,
    }
}

fn product_for_category(
    categoria: &str,
    products: &[ProductUsage],
    site: SiteCode,
) -> Option<(String, f64)> {
    let category_key = taxonomy::normalize(categoria);

    for usage in products {
        let product_key = taxonomy::normalize(&usage.producto);
        let mapped = product_table(site)
            .iter()
            .find(|(product, _)| *product == product_key)
            .map(|(_, category)| taxonomy::normalize(category));
        if mapped.as_deref() == Some(category_key.as_str()) {
            return Some((usage.producto.clone(), usage.delta_pp));
        }
    }

    None
}

/// Cross-references waterfall categories with product-usage findings (static
/// many-to-one product map) and with news items already filtered to the
/// period window. News match is by normalized category name.
pub fn triangulate(
    products: &[ProductUsage],
    waterfall: &Waterfall,
    news_in_window: &[NewsItem],
    site: SiteCode,
) -> Vec<Triangulation> {
    let mut triangulations = Vec::with_capacity(waterfall.rows.len());

    for row in &waterfall.rows {
        let category_key = taxonomy::normalize(&row.categoria);
        let noticias: Vec<NewsItem> = news_in_window
            .iter()
            .filter(|item| taxonomy::normalize(&item.categoria_relacionada) == category_key)
            .cloned()
            .collect();

        let (producto_asociado, uso_producto_delta_pp) =
            match product_for_category(&row.categoria, products, site) {
                Some((producto, delta)) => (Some(producto), Some(delta)),
                None => (None, None),
            };

        triangulations.push(Triangulation {
            categoria: row.categoria.clone(),
            delta_pp: row.delta_pp,
            producto_asociado,
            uso_producto_delta_pp,
            corroborada: !noticias.is_empty(),
            noticias,
        });
    }

    triangulations
}

/// Significant waterfall rows with zero corroborating news items.
pub fn driver_gaps(waterfall: &Waterfall, triangulations: &[Triangulation]) -> Vec<DriverGap> {
    waterfall
        .rows
        .iter()
        .filter(|row| row.significativo)
        .filter(|row| {
            triangulations
                .iter()
                .find(|t| t.categoria == row.categoria)
                .is_none_or(|t| !t.corroborada)
        })
        .map(|row| DriverGap {
            categoria: row.categoria.clone(),
            delta_pp: row.delta_pp,
            comentarios_analizados: row.comentarios_analizados,
        })
        .collect()
}
