use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::enrichment::EnrichedRow;
use crate::nps::NpsSnapshot;
use crate::quarters::Period;
use crate::suggest::SearchSuggestions;
use crate::triangulation::{ProductUsage, Triangulation};
use crate::waterfall::Waterfall;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SiteCode {
    Ar,
    Br,
    Mx,
    Cl,
    Uy,
}

impl SiteCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ar => "AR",
            Self::Br => "BR",
            Self::Mx => "MX",
            Self::Cl => "CL",
            Self::Uy => "UY",
        }
    }

    pub fn country_name(self) -> &'static str {
        match self {
            Self::Ar => "Argentina",
            Self::Br => "Brasil",
            Self::Mx => "México",
            Self::Cl => "Chile",
            Self::Uy => "Uruguay",
        }
    }

    pub fn parse_code(code: &str) -> Option<Self> {
        match code.trim().to_ascii_uppercase().as_str() {
            "AR" => Some(Self::Ar),
            "BR" => Some(Self::Br),
            "MX" => Some(Self::Mx),
            "CL" => Some(Self::Cl),
            "UY" => Some(Self::Uy),
            _ => None,
        }
    }
}

impl std::fmt::Display for SiteCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One survey response, immutable once loaded.
#[derive(Debug, Clone)]
pub struct RespondentRecord {
    pub site: SiteCode,
    pub player: String,
    pub period: Period,
    pub score: i8,
    pub declared_reason: Option<String>,
    pub precomputed_category: Option<String>,
    pub product: Option<String>,
    pub balance_holder: bool,
}

/// Validated run configuration for one analysis.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisConfig {
    pub player: String,
    pub site: SiteCode,
    pub period1: String,
    pub period2: String,
    pub significance_threshold_pp: f64,
    pub min_category_sample: usize,
    pub reconciliation_tolerance_pp: f64,
    #[serde(skip)]
    pub p1: Period,
    #[serde(skip)]
    pub p2: Period,
}

/// External semantic root-cause artifact, consumed read-only. Field names are
/// the wire contract shared with the external agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemanticBundle {
    pub metadata: SemanticBundleMetadata,
    pub causas_por_motivo: BTreeMap<String, CategoryCauses>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemanticBundleMetadata {
    pub player: String,
    pub site: String,
    pub quarter: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryCauses {
    pub total_comentarios_analizados: usize,
    pub delta_pp: f64,
    pub causas_raiz: Vec<RootCause>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RootCause {
    pub titulo: String,
    pub descripcion: String,
    pub frecuencia_pct: f64,
    pub frecuencia_abs: usize,
    pub ejemplos: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpectedImpact {
    Positivo,
    Negativo,
    Neutro,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsItem {
    pub titulo: String,
    pub fuente: String,
    pub url: String,
    pub resumen: String,
    pub categoria_relacionada: String,
    pub impacto_esperado: ExpectedImpact,
    pub fecha: String,
}

/// On-disk news cache, appended to by the external injector and only ever
/// read here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsCache {
    pub site: String,
    pub player: String,
    pub noticias: Vec<NewsItem>,
}

/// Executive summary section of the report bundle.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutiveSummary {
    pub titulo: String,
    pub parrafos: Vec<String>,
    pub drivers_destacados: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NpsSection {
    pub periodo1: NpsSnapshot,
    pub periodo2: NpsSnapshot,
    pub delta: f64,
    /// Per-quarter snapshots for the trailing window ending at period 2.
    pub tendencia: Vec<NpsSnapshot>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunProvenance {
    pub run_id: String,
    pub started_at: String,
    pub generated_at: String,
    pub dataset_sha256: String,
}

/// The accumulating output contract handed to the report renderer. Key names
/// must stay stable; the rendering layer depends on them.
#[derive(Debug, Clone, Serialize)]
pub struct ResultBundle {
    pub config: AnalysisConfig,
    pub provenance: RunProvenance,
    pub nps: NpsSection,
    pub waterfall: Waterfall,
    pub causas_waterfall: Vec<EnrichedRow>,
    pub triangulaciones: Vec<Triangulation>,
    pub uso_productos: Vec<ProductUsage>,
    pub causas_semanticas: SemanticBundle,
    pub noticias: Vec<NewsItem>,
    pub sugerencias: Option<SearchSuggestions>,
    pub resumen_ejecutivo: ExecutiveSummary,
    pub needs_root_causes: bool,
    pub needs_news: bool,
}

/// Typed pipeline result. Exit-code mapping happens only at the process
/// boundary in `main`.
#[derive(Debug, Clone)]
pub enum PipelineOutcome {
    Completed {
        report_path: PathBuf,
    },
    NeedsRootCauses {
        prompt_path: PathBuf,
        bundle_path: PathBuf,
    },
    NeedsNews {
        suggestions_path: PathBuf,
        cache_path: PathBuf,
        gap_count: usize,
    },
}

pub const EXIT_NEEDS_ROOT_CAUSES: i32 = 3;
pub const EXIT_NEEDS_NEWS: i32 = 4;

impl PipelineOutcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Completed { .. } => 0,
            Self::NeedsRootCauses { .. } => EXIT_NEEDS_ROOT_CAUSES,
            Self::NeedsNews { .. } => EXIT_NEEDS_NEWS,
        }
    }
}
