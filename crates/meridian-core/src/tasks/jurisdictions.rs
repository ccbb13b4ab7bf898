//! Fixed jurisdiction risk lists.

/// Offshore secrecy jurisdictions and why each is flagged.
pub const HIGH_RISK_JURISDICTIONS: &[(&str, &str)] = &[
    ("BVI", "British Virgin Islands, major offshore secrecy jurisdiction"),
    ("Cayman Islands", "Tax haven with limited transparency"),
    ("Panama", "High financial secrecy, history of fraud cases"),
    ("Marshall Islands", "Ship registry haven, low transparency"),
    ("Seychelles", "Common for shell companies"),
    ("Belize", "Low-regulation offshore center"),
    ("Vanuatu", "Pacific offshore secrecy jurisdiction"),
    ("Mauritius", "Used for treaty shopping"),
    ("Samoa", "Offshore financial center"),
    ("Anguilla", "British offshore territory"),
    ("Nevis", "Strong asset protection laws"),
    ("Labuan", "Malaysian offshore center"),
];

/// Countries under broad sanctions programs.
pub const SANCTIONED_COUNTRIES: &[&str] = &[
    "Iran",
    "North Korea",
    "Syria",
    "Cuba",
    "Russia",
    "Belarus",
    "Myanmar",
    "Venezuela",
    "Zimbabwe",
];

pub fn is_high_risk(jurisdiction: &str) -> bool {
    high_risk_reason(jurisdiction).is_some()
}

pub fn high_risk_reason(jurisdiction: &str) -> Option<&'static str> {
    HIGH_RISK_JURISDICTIONS
        .iter()
        .find(|(name, _)| *name == jurisdiction)
        .map(|(_, reason)| *reason)
}

pub fn is_sanctioned(country: &str) -> bool {
    SANCTIONED_COUNTRIES.contains(&country)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookups() {
        assert!(is_high_risk("BVI"));
        assert!(is_high_risk("Labuan"));
        assert!(!is_high_risk("Delaware"));
        assert_eq!(high_risk_reason("Mauritius"), Some("Used for treaty shopping"));
        assert!(is_sanctioned("North Korea"));
        assert!(!is_sanctioned("Canada"));
    }
}
