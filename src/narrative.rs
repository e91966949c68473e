//! Narrative summary generation.
//!
//! Builds the Catalan prompt from the retrieved segments, calls the
//! generation service and strips the boilerplate the model tends to echo
//! back. Failures never propagate: they become a [`Narrative`] variant
//! carrying a fixed placeholder text, so the report can still be written.

use crate::generation::GenerationService;

/// Header the prompt ends with. The model output is cut after it.
pub const SECTION_HEADER: &str = "Resum clínic estructurat:";

pub const NO_CONTEXT_PLACEHOLDER: &str = "Summary not available (no relevant texts retrieved).";
pub const GENERATION_FAILED_PLACEHOLDER: &str = "Error durant la generació del resum.";

const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

/// Result of the Generate stage.
#[derive(Debug, Clone, PartialEq)]
pub enum Narrative {
    /// Cleaned model output.
    Generated(String),
    /// Retrieval returned nothing; the service was not called.
    NoContext,
    /// The service call failed with the given message.
    Failed(String),
}

impl Narrative {
    /// Text that goes into the report.
    pub fn text(&self) -> &str {
        match self {
            Narrative::Generated(text) => text,
            Narrative::NoContext => NO_CONTEXT_PLACEHOLDER,
            Narrative::Failed(_) => GENERATION_FAILED_PLACEHOLDER,
        }
    }

    pub fn is_generated(&self) -> bool {
        matches!(self, Narrative::Generated(_))
    }
}

pub async fn generate_narrative(service: &dyn GenerationService, chunks: &[String]) -> Narrative {
    if chunks.is_empty() {
        return Narrative::NoContext;
    }

    match service.generate(&build_prompt(chunks)).await {
        Ok(raw) => Narrative::Generated(clean_output(&raw, SECTION_HEADER)),
        Err(e) => {
            tracing::warn!(error = %format!("{:#}", e), "narrative generation failed");
            Narrative::Failed(format!("{:#}", e))
        }
    }
}

/// Text after `header` if present, else after the first colon, else the
/// whole output. Always trimmed.
pub fn clean_output(raw: &str, header: &str) -> String {
    if let Some((_, rest)) = raw.split_once(header) {
        rest.trim().to_string()
    } else if let Some((_, rest)) = raw.split_once(':') {
        rest.trim().to_string()
    } else {
        raw.trim().to_string()
    }
}

pub fn build_prompt(chunks: &[String]) -> String {
    let context = chunks.join(CONTEXT_SEPARATOR);
    format!(
        r#"Ets un expert en medicina clínica. Basant-te EXCLUSIVAMENT en les següents notes clíniques recuperades, genera un resum estructurat i clar en català per incloure en un historial clínic.

### Instruccions generals:
- No inventis informació ni afegeixis cap dada que no es trobi explícitament a les notes.
- Escriu amb un estil mèdic professional però entenedor.
- Utilitza frases concises i informatives. Evita repeticions.
- El resum complet ha de tenir un màxim de 350 paraules.
- Si alguna secció no es pot completar amb la informació disponible, indica-ho explícitament amb una frase clara.

### Seccions obligatòries del resum:

1. **RESUM GENERAL DEL CURS CLÍNIC:**
Breu explicació del motiu de consulta, les actuacions clíniques més destacades i la situació actual o final del pacient. Destaca la línia temporal si és rellevant.

2. **ANTECEDENTS MÈDICS RELLEVANTS:**
Resumeix els diagnòstics o condicions prèvies (amb data de finalització si està disponible) extrets dels episodis tancats. No especulis.

3. **ANTECEDENTS FAMILIARS:**
Informa sobre malalties familiars mencionades (al·lèrgies, malalties hereditàries, etc.). Si no n'hi ha, escriu: "No hi ha informació sobre antecedents familiars a les notes proporcionades."

4. **PROBLEMES MÈDICS ACTIUS:**
Enumera i explica breument cadascun dels problemes mèdics actuals del pacient. Per a cada problema, descriu-ne els símptomes, l'evolució recent o el tractament actiu, segons aparegui a les notes.

5. **RECOMANACIONS:**
Proposa un pla clínic basat en la informació disponible. Utilitza el teu coneixement mèdic per suggerir els següents passos més raonables, encara que no estiguin explicitats a les notes.
---

Notes clíniques recuperades:
---
{context}
---

{header}
"#,
        context = context,
        header = SECTION_HEADER,
    )
}
