/// Bucket for members without a parliamentary group, including generic placeholders.
pub const NON_ALIGNED_FACTION: &str = "Fraktionslos";

const MAX_FACTION_LABEL_CHARS: usize = 20;
const PLACEHOLDER_MARKER: &str = "Abgeordneter";

const FACTION_ALIASES: &[(&str, &str)] = &[
    ("CDUCSU", "CDU/CSU"),
    ("CDU", "CDU/CSU"),
    ("CSU", "CDU/CSU"),
    ("BUNDNIS90DIEGRUNEN", "BÜNDNIS 90/DIE GRÜNEN"),
    ("BUNDNIS90DIEGRUENEN", "BÜNDNIS 90/DIE GRÜNEN"),
    ("BUENDNIS90DIEGRUENEN", "BÜNDNIS 90/DIE GRÜNEN"),
    ("GRUNEN", "BÜNDNIS 90/DIE GRÜNEN"),
    ("GRUENEN", "BÜNDNIS 90/DIE GRÜNEN"),
    ("SPD", "SPD"),
    ("FDP", "FDP"),
    ("AFD", "AfD"),
    ("DIELINKE", "DIE LINKE"),
    ("LINKE", "DIE LINKE"),
    ("FRAKTIONSLOS", NON_ALIGNED_FACTION),
    ("UBRIGE", NON_ALIGNED_FACTION),
    ("UEBRIGE", NON_ALIGNED_FACTION),
    ("UNABHANGIG", NON_ALIGNED_FACTION),
    ("UNABHAENGIG", NON_ALIGNED_FACTION),
    ("ABG", NON_ALIGNED_FACTION),
    ("PRASIDENT", "Sitzungsleitung"),
    ("PRAESIDENT", "Sitzungsleitung"),
    ("GASTE", "Sitzungsleitung"),
    ("GAESTE", "Sitzungsleitung"),
    ("SITZUNGSLEITUNG", "Sitzungsleitung"),
];

const SURNAME_PARTY_MARKERS: &[(&str, &str)] = &[
    ("(SPD)", "SPD"),
    ("(CDU/CSU)", "CDU/CSU"),
    ("(GRÜNEN)", "BÜNDNIS 90/DIE GRÜNEN"),
    ("(FDP)", "FDP"),
    ("(LINKE)", "DIE LINKE"),
    ("(AFD)", "AfD"),
];

/// Maps a free-text faction label onto its canonical faction id.
///
/// Known spellings resolve through the alias table. Unknown labels longer than
/// twenty characters, or mentioning a generic "Abgeordneter", fall into
/// [`NON_ALIGNED_FACTION`]; anything else is returned uppercased. Empty input
/// yields an empty string.
pub fn normalize_faction(label: &str) -> String {
    if label.is_empty() {
        return String::new();
    }

    let upper = label.to_uppercase();
    let key = alias_key(&upper);

    if let Some((_, canonical)) = FACTION_ALIASES.iter().find(|(alias, _)| *alias == key) {
        return (*canonical).to_string();
    }

    if label.chars().count() > MAX_FACTION_LABEL_CHARS || label.contains(PLACEHOLDER_MARKER) {
        return NON_ALIGNED_FACTION.to_string();
    }

    upper
}

/// Recovers a faction from a party abbreviation embedded in a surname, e.g. `"Müller (SPD)"`.
pub fn faction_from_surname(surname: &str) -> Option<&'static str> {
    let upper = surname.to_uppercase();
    SURNAME_PARTY_MARKERS
        .iter()
        .find(|(marker, _)| upper.contains(marker))
        .map(|(_, faction)| *faction)
}

fn alias_key(upper: &str) -> String {
    upper
        .replace('Ä', "AE")
        .replace('Ö', "OE")
        .replace('Ü', "UE")
        .replace('ß', "SS")
        .chars()
        .filter(|ch| ch.is_ascii_alphanumeric())
        .collect()
}
