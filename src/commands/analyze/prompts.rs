use std::collections::BTreeMap;
use std::fmt::Write;
use std::path::Path;

use crate::enrichment::DEEP_SAMPLE_CAP;
use crate::model::AnalysisConfig;
use crate::waterfall::Waterfall;

/// Renders the instruction artifact for the external semantic agent. The
/// content is a pure function of the run inputs (no timestamps), so repeated
/// halted runs regenerate the same prompt at the same path.
pub fn build_root_cause_prompt(
    config: &AnalysisConfig,
    waterfall: &Waterfall,
    comments: &BTreeMap<String, Vec<String>>,
    bundle_path: &Path,
) -> String {
    let mut prompt = String::new();

    let _ = writeln!(
        prompt,
        "# Análisis semántico de causas raíz — {} ({}) {}",
        config.player, config.site, config.period2
    );
    let _ = writeln!(prompt);
    let _ = writeln!(
        prompt,
        "El NPS de {} se movió {:+.1} puntos entre {} y {}. El share de \
         detractores se movió {:+.1}pp. Analizá los comentarios de cada \
         categoría y derivá las causas raíz.",
        config.player, waterfall.nps_delta, config.period1, config.period2,
        waterfall.detractor_delta_pp
    );
    let _ = writeln!(prompt);

    for row in &waterfall.rows {
        let _ = writeln!(
            prompt,
            "## {} (delta {:+.1}pp, rank {})",
            row.categoria, row.delta_pp, row.rank
        );
        match comments.get(&row.categoria) {
            Some(category_comments) if !category_comments.is_empty() => {
                for comment in category_comments.iter().take(DEEP_SAMPLE_CAP) {
                    let _ = writeln!(prompt, "- {comment}");
                }
            }
            _ => {
                let _ = writeln!(prompt, "(sin comentarios de detractores)");
            }
        }
        let _ = writeln!(prompt);
    }

    let _ = writeln!(prompt, "## Formato de salida");
    let _ = writeln!(
        prompt,
        "Escribí un JSON en `{}` con esta estructura:",
        bundle_path.display()
    );
    let _ = writeln!(prompt, "```json");
    let _ = writeln!(
        prompt,
        r#"{{
  "metadata": {{ "player": "{}", "site": "{}", "quarter": "{}" }},
  "causas_por_motivo": {{
    "<categoria>": {{
      "total_comentarios_analizados": 0,
      "delta_pp": 0.0,
      "causas_raiz": [
        {{
          "titulo": "...",
          "descripcion": "...",
          "frecuencia_pct": 0.0,
          "frecuencia_abs": 0,
          "ejemplos": ["..."]
        }}
      ]
    }}
  }}
}}"#,
        config.player, config.site, config.period2
    );
    let _ = writeln!(prompt, "```");

    prompt
}
