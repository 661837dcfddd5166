// src/utils/address.rs

//! Address splitting helpers.

use std::sync::LazyLock;

use regex::Regex;

/// Argentine provinces, as written on the portal.
const PROVINCES: &[&str] = &[
    "Buenos Aires",
    "CABA",
    "Ciudad Autónoma de Buenos Aires",
    "Catamarca",
    "Chaco",
    "Chubut",
    "Córdoba",
    "Corrientes",
    "Entre Ríos",
    "Formosa",
    "Jujuy",
    "La Pampa",
    "La Rioja",
    "Mendoza",
    "Misiones",
    "Neuquén",
    "Río Negro",
    "Salta",
    "San Juan",
    "San Luis",
    "Santa Cruz",
    "Santa Fe",
    "Santiago del Estero",
    "Tierra del Fuego",
    "Tierra del Fuego, Antártida e Islas del Atlántico Sur",
    "Tucumán",
];

/// Trailing province; longer names are tried first so "Ciudad Autónoma de
/// Buenos Aires" wins over "Buenos Aires".
static PROVINCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    let mut names: Vec<&str> = PROVINCES.to_vec();
    names.sort_by_key(|name| std::cmp::Reverse(name.chars().count()));
    let alternatives: Vec<String> = names.iter().map(|n| regex::escape(n)).collect();
    Regex::new(&format!(r"(?i)({})\s*$", alternatives.join("|"))).expect("province regex")
});

static HOUSE_NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+[A-Za-z]?$").expect("house number regex"));

static STREET_HINT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d+|Av\.?|Avenida|Calle|Ruta|RN|RP)\b").expect("street hint regex")
});

/// Split a multi-line address block into (street, locality, province) by
/// line position. Missing lines yield empty strings.
pub fn split_domicilio(block: &str) -> (String, String, String) {
    let normalized = block.replace('\r', "\n");
    let mut lines = normalized
        .split('\n')
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string);

    let street = lines.next().unwrap_or_default();
    let locality = lines.next().unwrap_or_default();
    let province = lines.next().unwrap_or_default();
    (street, locality, province)
}

/// Split a one-line legal address into (street, locality, province).
///
/// Without a recognizable trailing province the whole line is returned as
/// the street and the other parts are empty.
pub fn parse_domicilio_fiscal(line: &str) -> (String, String, String) {
    let text = collapse(line);
    let Some(found) = PROVINCE_RE.captures(&text).and_then(|c| c.get(1)) else {
        return (text, String::new(), String::new());
    };

    let province = collapse(found.as_str());
    let rest = collapse(&text[..found.start()]);
    let (street, locality) = split_street_locality(&rest);
    (street, locality, province)
}

fn split_street_locality(rest: &str) -> (String, String) {
    if let Some((left, right)) = rest.rsplit_once(',') {
        return (collapse(left), collapse(right));
    }

    let tokens: Vec<&str> = rest.split(' ').filter(|t| !t.is_empty()).collect();
    if tokens.len() <= 2 {
        return (String::new(), rest.to_string());
    }

    // Everything after the last house number is the locality.
    let last_number = tokens.iter().rposition(|t| HOUSE_NUMBER_RE.is_match(t));
    if let Some(idx) = last_number {
        if idx < tokens.len() - 1 {
            return (tokens[..=idx].join(" "), tokens[idx + 1..].join(" "));
        }
    }

    for k in [3, 2] {
        if tokens.len() > k {
            let street = tokens[..tokens.len() - k].join(" ");
            if STREET_HINT_RE.is_match(&street) {
                return (street, tokens[tokens.len() - k..].join(" "));
            }
        }
    }

    match tokens.split_last() {
        Some((last, head)) => (head.join(" "), last.to_string()),
        None => (String::new(), String::new()),
    }
}

fn collapse(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
