use unicode_normalization::UnicodeNormalization;

use crate::model::SiteCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Locale {
    Es,
    Pt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryLevel {
    Detailed,
    Aggregated,
}

pub const OTHER_ES: &str = "Otros";
pub const OTHER_PT: &str = "Outros";

pub const AGGREGATED_ES: &[&str] = &[
    "Comisiones y costos",
    "Atención al cliente",
    "Seguridad",
    "Fallas técnicas",
    "Retiros y transferencias",
    "Créditos y financiación",
    "Rendimientos e inversiones",
    OTHER_ES,
];

pub const AGGREGATED_PT: &[&str] = &[
    "Tarifas e custos",
    "Atendimento ao cliente",
    "Segurança",
    "Falhas técnicas",
    "Saques e transferências",
    "Crédito e financiamento",
    "Rendimentos e investimentos",
    OTHER_PT,
];

// Keys are pre-normalized (lowercase, diacritics stripped).
const DETAILED_TO_AGGREGATE_ES: &[(&str, &str)] = &[
    ("comisiones altas", "Comisiones y costos"),
    ("cobros inesperados", "Comisiones y costos"),
    ("costo de mantenimiento", "Comisiones y costos"),
    ("cargos ocultos", "Comisiones y costos"),
    ("mala atencion", "Atención al cliente"),
    ("demoras en atencion", "Atención al cliente"),
    ("no resuelven problemas", "Atención al cliente"),
    ("atencion telefonica deficiente", "Atención al cliente"),
    ("fraude", "Seguridad"),
    ("robo de cuenta", "Seguridad"),
    ("phishing", "Seguridad"),
    ("desconfianza", "Seguridad"),
    ("app se cae", "Fallas técnicas"),
    ("errores en la app", "Fallas técnicas"),
    ("lentitud de la app", "Fallas técnicas"),
    ("caidas del sistema", "Fallas técnicas"),
    ("demora en transferencias", "Retiros y transferencias"),
    ("limites de extraccion", "Retiros y transferencias"),
    ("problemas para retirar dinero", "Retiros y transferencias"),
    ("tasas de prestamos", "Créditos y financiación"),
    ("rechazo de credito", "Créditos y financiación"),
    ("limite de credito bajo", "Créditos y financiación"),
    ("bajo rendimiento", "Rendimientos e inversiones"),
    ("cambios en rendimientos", "Rendimientos e inversiones"),
    ("perdidas en inversiones", "Rendimientos e inversiones"),
    ("otro", OTHER_ES),
];

const DETAILED_TO_AGGREGATE_PT: &[(&str, &str)] = &[
    ("tarifas altas", "Tarifas e custos"),
    ("cobrancas inesperadas", "Tarifas e custos"),
    ("custo de manutencao", "Tarifas e custos"),
    ("mau atendimento", "Atendimento ao cliente"),
    ("demora no atendimento", "Atendimento ao cliente"),
    ("nao resolvem problemas", "Atendimento ao cliente"),
    ("fraude", "Segurança"),
    ("roubo de conta", "Segurança"),
    ("phishing", "Segurança"),
    ("desconfianca", "Segurança"),
    ("app trava", "Falhas técnicas"),
    ("erros no app", "Falhas técnicas"),
    ("lentidao do app", "Falhas técnicas"),
    ("demora nas transferencias", "Saques e transferências"),
    ("limites de saque", "Saques e transferências"),
    ("problemas para sacar dinheiro", "Saques e transferências"),
    ("juros de emprestimos", "Crédito e financiamento"),
    ("recusa de credito", "Crédito e financiamento"),
    ("baixo rendimento", "Rendimentos e investimentos"),
    ("mudancas no rendimento", "Rendimentos e investimentos"),
    ("perdas em investimentos", "Rendimentos e investimentos"),
    ("outro", OTHER_PT),
];

pub fn locale_for_site(site: SiteCode) -> Locale {
    match site {
        SiteCode::Br => Locale::Pt,
        _ => Locale::Es,
    }
}

pub fn other_category(site: SiteCode) -> &'static str {
    match locale_for_site(site) {
        Locale::Es => OTHER_ES,
        Locale::Pt => OTHER_PT,
    }
}

pub fn aggregated_categories(site: SiteCode) -> &'static [&'static str] {
    match locale_for_site(site) {
        Locale::Es => AGGREGATED_ES,
        Locale::Pt => AGGREGATED_PT,
    }
}

fn detailed_table(site: SiteCode) -> &'static [(&'static str, &'static str)] {
    match locale_for_site(site) {
        Locale::Es => DETAILED_TO_AGGREGATE_ES,
        Locale::Pt => DETAILED_TO_AGGREGATE_PT,
    }
}

/// Lowercases, strips diacritics, and collapses whitespace so lookups survive
/// accent and casing variance in survey exports.
pub fn normalize(text: &str) -> String {
    let stripped: String = text
        .nfd()
        .filter(|character| !unicode_normalization::char::is_combining_mark(*character))
        .collect();

    stripped
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<&str>>()
        .join(" ")
}

/// Maps a detailed complaint reason to its aggregated category. Unmapped
/// reasons fall back to the locale's "Other" sentinel so the waterfall never
/// drops a comment.
pub fn map_to_aggregate(detailed: &str, site: SiteCode) -> String {
    let key = normalize(detailed);
    detailed_table(site)
        .iter()
        .find(|(entry, _)| *entry == key)
        .map(|(_, aggregate)| (*aggregate).to_string())
        .unwrap_or_else(|| other_category(site).to_string())
}

pub fn validate(category: &str, site: SiteCode, level: CategoryLevel) -> bool {
    let key = normalize(category);
    match level {
        CategoryLevel::Detailed => detailed_table(site).iter().any(|(entry, _)| *entry == key),
        CategoryLevel::Aggregated => aggregated_categories(site)
            .iter()
            .any(|entry| normalize(entry) == key),
    }
}
