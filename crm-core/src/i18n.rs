//! Static UI string catalog
//!
//! Keys are dotted paths. Lookups fall back to English, then to the key
//! itself. `{name}` placeholders are substituted by [`translate_with`].

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Supported UI locales.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    En,
    De,
    Es,
}

impl Locale {
    pub const ALL: &'static [Locale] = &[Locale::En, Locale::De, Locale::Es];

    pub fn as_db_str(&self) -> &'static str {
        match self {
            Locale::En => "en",
            Locale::De => "de",
            Locale::Es => "es",
        }
    }

    /// Parse a language tag such as `de`, `de-AT` or `ES_mx`.
    pub fn from_tag(tag: &str) -> Option<Self> {
        let primary = tag.trim().split(['-', '_']).next()?.to_ascii_lowercase();
        match primary.as_str() {
            "en" => Some(Locale::En),
            "de" => Some(Locale::De),
            "es" => Some(Locale::Es),
            _ => None,
        }
    }

    /// Pick the first supported language from an `Accept-Language` header.
    /// Quality weights are honoured; ties keep header order.
    pub fn from_accept_language(header: &str) -> Option<Self> {
        let mut candidates: Vec<(f32, usize, Locale)> = header
            .split(',')
            .enumerate()
            .filter_map(|(idx, part)| {
                let mut pieces = part.split(';');
                let locale = Locale::from_tag(pieces.next()?)?;
                let quality = pieces
                    .find_map(|p| p.trim().strip_prefix("q="))
                    .and_then(|q| q.parse::<f32>().ok())
                    .unwrap_or(1.0);
                Some((quality, idx, locale))
            })
            .filter(|(q, _, _)| *q > 0.0)
            .collect();
        candidates.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));
        candidates.first().map(|(_, _, locale)| *locale)
    }

    fn column(&self) -> usize {
        match self {
            Locale::En => 0,
            Locale::De => 1,
            Locale::Es => 2,
        }
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_db_str())
    }
}

// key, [en, de, es]. An empty translation means "fall back to English".
const CATALOG: &[(&str, [&str; 3])] = &[
    ("entity.lead", ["Lead", "Interessent", "Prospecto"]),
    ("entity.account", ["Account", "Firma", "Cuenta"]),
    ("entity.contact", ["Contact", "Kontakt", "Contacto"]),
    ("entity.opportunity", ["Opportunity", "Verkaufschance", "Oportunidad"]),
    ("entity.activity", ["Activity", "Aktivität", "Actividad"]),
    ("entity.document", ["Document", "Dokument", "Documento"]),
    ("entity.note", ["Note", "Notiz", "Nota"]),
    ("entity.service_contract", ["Service contract", "Wartungsvertrag", "Contrato de servicio"]),
    ("field.first_name", ["First name", "Vorname", "Nombre"]),
    ("field.last_name", ["Last name", "Nachname", "Apellido"]),
    ("field.email", ["Email", "E-Mail", "Correo electrónico"]),
    ("field.phone", ["Phone", "Telefon", "Teléfono"]),
    ("field.company", ["Company", "Firma", "Empresa"]),
    ("field.title", ["Title", "Position", "Cargo"]),
    ("field.source", ["Source", "Quelle", "Origen"]),
    ("lead.status.new", ["New", "Neu", "Nuevo"]),
    ("lead.status.contacted", ["Contacted", "Kontaktiert", "Contactado"]),
    ("lead.status.qualified", ["Qualified", "Qualifiziert", "Calificado"]),
    ("lead.status.unqualified", ["Unqualified", "Nicht qualifiziert", "No calificado"]),
    ("lead.status.converted", ["Converted", "Konvertiert", "Convertido"]),
    ("opportunity.stage.prospecting", ["Prospecting", "Akquise", "Prospección"]),
    ("opportunity.stage.qualification", ["Qualification", "Qualifizierung", "Calificación"]),
    ("opportunity.stage.needs_analysis", ["Needs analysis", "Bedarfsanalyse", "Análisis de necesidades"]),
    ("opportunity.stage.proposal", ["Proposal", "Angebot", "Propuesta"]),
    ("opportunity.stage.negotiation", ["Negotiation", "Verhandlung", "Negociación"]),
    ("opportunity.stage.closed_won", ["Closed won", "Gewonnen", "Ganada"]),
    ("opportunity.stage.closed_lost", ["Closed lost", "Verloren", "Perdida"]),
    ("contract.status.active", ["Active", "Aktiv", "Activo"]),
    ("contract.status.paused", ["Paused", "Pausiert", "En pausa"]),
    ("contract.status.expired", ["Expired", "Abgelaufen", "Vencido"]),
    ("contract.status.cancelled", ["Cancelled", "Gekündigt", "Cancelado"]),
    ("contract.next_due", ["Next service due", "Nächste Wartung fällig", "Próximo servicio"]),
    ("import.error.required", ["{field} is required", "{field} ist erforderlich", "{field} es obligatorio"]),
    ("import.error.invalid_email", ["Invalid email address: {value}", "Ungültige E-Mail-Adresse: {value}", "Correo electrónico no válido: {value}"]),
    ("import.error.too_long", ["{field} exceeds {max} characters", "{field} überschreitet {max} Zeichen", "{field} supera {max} caracteres"]),
    ("import.error.duplicate_existing", ["A lead with email {value} already exists", "Ein Interessent mit der E-Mail {value} existiert bereits", ""]),
    ("import.error.duplicate_in_file", ["Email {value} already appears on row {row}", "E-Mail {value} steht bereits in Zeile {row}", ""]),
    ("import.summary", ["{valid} valid, {invalid} invalid, {duplicate} duplicates", "{valid} gültig, {invalid} ungültig, {duplicate} Duplikate", "{valid} válidos, {invalid} no válidos, {duplicate} duplicados"]),
    ("action.save", ["Save", "Speichern", "Guardar"]),
    ("action.cancel", ["Cancel", "Abbrechen", "Cancelar"]),
    ("action.confirm_import", ["Confirm import", "Import bestätigen", "Confirmar importación"]),
];

static INDEX: Lazy<HashMap<&'static str, &'static [&'static str; 3]>> =
    Lazy::new(|| CATALOG.iter().map(|(key, values)| (*key, values)).collect());

/// Look up `key` for `locale`.
pub fn translate(locale: Locale, key: &str) -> &str {
    match INDEX.get(key) {
        Some(values) => {
            let localized = values[locale.column()];
            if localized.is_empty() {
                values[Locale::En.column()]
            } else {
                localized
            }
        }
        None => key,
    }
}

/// Look up `key` and substitute `{name}` placeholders.
pub fn translate_with(locale: Locale, key: &str, args: &[(&str, &str)]) -> String {
    args.iter()
        .fold(translate(locale, key).to_string(), |text, (name, value)| {
            text.replace(&format!("{{{}}}", name), value)
        })
}

/// The full catalog for `locale`, with English filled in for gaps.
pub fn catalog(locale: Locale) -> BTreeMap<&'static str, &'static str> {
    CATALOG
        .iter()
        .map(|(key, _)| (*key, translate(locale, *key)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_translate_uses_locale() {
        assert_eq!(translate(Locale::De, "entity.lead"), "Interessent");
        assert_eq!(translate(Locale::Es, "action.save"), "Guardar");
    }

    #[test]
    fn test_missing_translation_falls_back_to_english() {
        assert_eq!(
            translate(Locale::Es, "import.error.duplicate_in_file"),
            "Email {value} already appears on row {row}"
        );
    }

    #[test]
    fn test_unknown_key_falls_back_to_key() {
        assert_eq!(translate(Locale::De, "no.such.key"), "no.such.key");
    }

    #[test]
    fn test_placeholders_are_substituted() {
        let text = translate_with(
            Locale::En,
            "import.error.duplicate_in_file",
            &[("value", "a@b.co"), ("row", "3")],
        );
        assert_eq!(text, "Email a@b.co already appears on row 3");
    }

    #[test]
    fn test_catalog_is_complete_for_every_locale() {
        for locale in Locale::ALL {
            let entries = catalog(*locale);
            assert_eq!(entries.len(), CATALOG.len());
            assert!(entries.values().all(|v| !v.is_empty()));
        }
    }

    #[test]
    fn test_accept_language_respects_quality() {
        assert_eq!(Locale::from_accept_language("fr-FR, de;q=0.8, es;q=0.9"), Some(Locale::Es));
        assert_eq!(Locale::from_accept_language("de-AT"), Some(Locale::De));
        assert_eq!(Locale::from_accept_language("fr, it"), None);
        assert_eq!(Locale::from_accept_language("es;q=0, en"), Some(Locale::En));
    }
}
