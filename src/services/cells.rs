// src/services/cells.rs

//! Label-indexed table cell reader.
//!
//! Portal pages are layout tables where a value sits in the cell right after
//! the cell holding its label:
//!
//! ```text
//! <tr><td>Empresa Solicitante</td><td>Acopio Norte SA</td></tr>
//! ```
//!
//! Lookups never fail. A missing label or a missing sibling cell reads as an
//! empty string and is logged.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use ego_tree::NodeId;
use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};

use crate::models::FieldLabels;

static TD: LazyLock<Selector> = LazyLock::new(|| Selector::parse("td").expect("td selector"));

/// Elements rendered on their own line.
const BLOCK_ELEMENTS: &[&str] = &[
    "address", "blockquote", "div", "dl", "dt", "dd", "fieldset", "form", "h1", "h2", "h3", "h4",
    "h5", "h6", "hr", "li", "ol", "p", "pre", "section", "table", "tbody", "thead", "tfoot", "tr",
    "ul",
];

/// How a label is compared against a cell's text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Match {
    Contains,
    Exact,
}

/// Reads values out of one parsed page by label.
pub struct CellReader<'a> {
    document: &'a Html,
    order: HashMap<NodeId, usize>,
}

impl<'a> CellReader<'a> {
    pub fn new(document: &'a Html) -> Self {
        let order = document
            .tree
            .root()
            .descendants()
            .enumerate()
            .map(|(i, node)| (node.id(), i))
            .collect();
        Self { document, order }
    }

    pub fn document(&self) -> &'a Html {
        self.document
    }

    /// Value next to the `occurrence`-th cell containing `label`.
    pub fn read_cell(&self, label: &str, keep_newlines: bool, occurrence: usize) -> String {
        let cells = self.value_cells(label, Match::Contains);
        match cells.get(occurrence) {
            Some(cell) => cell_text(*cell, keep_newlines),
            None => {
                log::warn!("Label not found: '{}' (occurrence {})", label, occurrence);
                String::new()
            }
        }
    }

    /// Value next to the first cell whose whole text is `label`.
    pub fn read_cell_exact(&self, label: &str) -> String {
        match self.value_cells(label, Match::Exact).first() {
            Some(cell) => cell_text(*cell, false),
            None => {
                log::warn!("Label not found (exact): '{}'", label);
                String::new()
            }
        }
    }

    /// First non-empty value over the synonym list, in list order.
    pub fn read_cell_any(&self, labels: &FieldLabels, keep_newlines: bool) -> String {
        let mode = mode_of(labels);
        let mut any_label_found = false;

        for label in &labels.labels {
            let cells = self.value_cells(label, mode);
            let Some(cell) = cells.first() else {
                log::debug!("Label '{}' not on page", label);
                continue;
            };
            any_label_found = true;
            let value = cell_text(*cell, keep_newlines);
            if !value.is_empty() {
                return value;
            }
            log::debug!("Label '{}' found with an empty value", label);
        }

        if !any_label_found {
            log::warn!("Label not found: {}", labels.describe());
        }
        String::new()
    }

    /// Every value next to a cell containing `label`, in document order.
    pub fn read_all_cells(&self, label: &str, keep_newlines: bool) -> Vec<String> {
        self.value_cells(label, Match::Contains)
            .into_iter()
            .map(|cell| cell_text(cell, keep_newlines))
            .collect()
    }

    /// Values for the first synonym that matches at all.
    pub fn read_all_cells_any(&self, labels: &FieldLabels, keep_newlines: bool) -> Vec<String> {
        self.located_values(labels, keep_newlines)
            .into_iter()
            .map(|(_, value)| value)
            .collect()
    }

    /// Like [`read_all_cells_any`](Self::read_all_cells_any), with each
    /// value's document position.
    pub fn located_values(&self, labels: &FieldLabels, keep_newlines: bool) -> Vec<(usize, String)> {
        let mode = mode_of(labels);
        for label in &labels.labels {
            let cells = self.value_cells(label, mode);
            if !cells.is_empty() {
                return cells
                    .into_iter()
                    .map(|cell| (self.position(cell), cell_text(cell, keep_newlines)))
                    .collect();
            }
        }
        log::warn!("Label not found: {}", labels.describe());
        Vec::new()
    }

    /// Document positions of the innermost elements containing any of the
    /// labels. Used to locate section headings.
    pub fn heading_positions(&self, labels: &FieldLabels) -> Vec<usize> {
        let mut positions = Vec::new();
        for element in self.document.root_element().descendants().filter_map(ElementRef::wrap) {
            if !contains_any(&normalized_text(element), labels) {
                continue;
            }
            let child_matches = element
                .children()
                .filter_map(ElementRef::wrap)
                .any(|child| contains_any(&normalized_text(child), labels));
            if !child_matches {
                positions.push(self.position(element));
            }
        }
        positions
    }

    /// `href`s of links containing `marker`, as written in the page, with
    /// positions. Callers resolve them against the page URL.
    pub fn links_containing(&self, marker: &str) -> Vec<(usize, String)> {
        static A: LazyLock<Selector> =
            LazyLock::new(|| Selector::parse("a[href]").expect("link selector"));
        self.document
            .select(&A)
            .filter_map(|a| {
                let href = a.value().attr("href")?;
                href.contains(marker)
                    .then(|| (self.position(a), href.to_string()))
            })
            .collect()
    }

    /// Position of an element in document order.
    pub fn position(&self, element: ElementRef<'_>) -> usize {
        self.order.get(&element.id()).copied().unwrap_or(usize::MAX)
    }

    /// Sibling value cells of every label cell, de-duplicated, in order.
    fn value_cells(&self, label: &str, mode: Match) -> Vec<ElementRef<'a>> {
        let wanted = normalize(label);
        if wanted.is_empty() {
            return Vec::new();
        }

        let mut seen = HashSet::new();
        let mut cells = Vec::new();
        for td in self.document.select(&TD) {
            let text = normalized_text(td);
            let hit = match mode {
                Match::Contains => text.contains(&wanted),
                Match::Exact => strip_colon(&text) == strip_colon(&wanted),
            };
            if !hit {
                continue;
            }
            if let Some(value) = next_td(td) {
                if seen.insert(value.id()) {
                    cells.push(value);
                }
            }
        }
        cells.sort_by_key(|cell| self.position(*cell));
        cells
    }
}

fn mode_of(labels: &FieldLabels) -> Match {
    if labels.exact {
        Match::Exact
    } else {
        Match::Contains
    }
}

fn contains_any(text: &str, labels: &FieldLabels) -> bool {
    labels
        .labels
        .iter()
        .map(|l| normalize(l))
        .any(|l| !l.is_empty() && text.contains(&l))
}

fn strip_colon(text: &str) -> &str {
    text.trim_end_matches(':').trim_end()
}

/// First following sibling `td` of a cell.
fn next_td(td: ElementRef<'_>) -> Option<ElementRef<'_>> {
    td.next_siblings()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "td")
}

/// Collapse whitespace runs (NBSP included) to one space and trim.
pub fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn normalized_text(element: ElementRef<'_>) -> String {
    normalize(&rendered_text(element))
}

/// Text of a cell as a browser would render it.
pub fn cell_text(element: ElementRef<'_>, keep_newlines: bool) -> String {
    let rendered = rendered_text(element);
    if keep_newlines {
        rendered
            .replace('\r', "\n")
            .split('\n')
            .map(normalize)
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    } else {
        normalize(&rendered)
    }
}

/// Render text with `<br>` and block elements as line breaks. Source
/// newlines inside text are plain whitespace.
fn rendered_text(element: ElementRef<'_>) -> String {
    let mut out = String::new();
    render_into(*element, &mut out);
    out
}

fn render_into(node: ego_tree::NodeRef<'_, Node>, out: &mut String) {
    for child in node.children() {
        match child.value() {
            Node::Text(text) => {
                for (i, piece) in text.split(['\n', '\r']).enumerate() {
                    if i > 0 {
                        out.push(' ');
                    }
                    out.push_str(piece);
                }
            }
            Node::Element(element) => {
                let name = element.name();
                if name == "br" {
                    out.push('\n');
                } else if matches!(name, "script" | "style") {
                    continue;
                } else if BLOCK_ELEMENTS.contains(&name) {
                    out.push('\n');
                    render_into(child, out);
                    out.push('\n');
                } else {
                    if matches!(name, "td" | "th") {
                        out.push(' ');
                    }
                    render_into(child, out);
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(body: &str) -> Html {
        Html::parse_document(&format!("<html><body>{}</body></html>", body))
    }

    const SUMMARY: &str = r#"
        <table>
          <tr><td>Nro OT</td><td> 307-62136 </td></tr>
          <tr><td>Empresa&nbsp;Solicitante:</td><td>Acopio   Norte
              SA</td></tr>
          <tr><td>Nombre del Usuario</td><td>Usuario genérico</td></tr>
          <tr><td>Nombre del Usuario del Instrumento</td><td>Transportes del Sur SRL</td></tr>
          <tr><td>Domicilio</td><td>Ruta 7 km 500<br/> Villa Mercedes <br>San Luis</td></tr>
          <tr><td>e</td><td>10 kg</td></tr>
          <tr><td>Clase de exactitud</td><td>III</td></tr>
          <tr><td>Sin valor</td></tr>
        </table>
        <table>
          <tr><td>Nro de serie</td><td>R-001</td></tr>
          <tr><td>Nro de serie</td><td>I-002</td></tr>
        </table>
    "#;

    #[test]
    fn read_cell_returns_adjacent_cell_normalized() {
        let doc = page(SUMMARY);
        let reader = CellReader::new(&doc);
        assert_eq!(reader.read_cell("Nro OT", false, 0), "307-62136");
        assert_eq!(reader.read_cell("Empresa Solicitante", false, 0), "Acopio Norte SA");
    }

    #[test]
    fn read_cell_misses_are_empty() {
        let doc = page(SUMMARY);
        let reader = CellReader::new(&doc);
        assert_eq!(reader.read_cell("Etiqueta inexistente", false, 0), "");
        assert_eq!(reader.read_cell("Sin valor", false, 0), "");
        assert_eq!(reader.read_cell("Nro de serie", false, 5), "");
    }

    #[test]
    fn read_cell_keeps_lines_when_asked() {
        let doc = page(SUMMARY);
        let reader = CellReader::new(&doc);
        assert_eq!(
            reader.read_cell("Domicilio", true, 0),
            "Ruta 7 km 500\nVilla Mercedes\nSan Luis"
        );
        assert_eq!(
            reader.read_cell("Domicilio", false, 0),
            "Ruta 7 km 500 Villa Mercedes San Luis"
        );
    }

    #[test]
    fn occurrence_selects_later_matches() {
        let doc = page(SUMMARY);
        let reader = CellReader::new(&doc);
        assert_eq!(reader.read_cell("Nro de serie", false, 1), "I-002");
        assert_eq!(reader.read_all_cells("Nro de serie", false), vec!["R-001", "I-002"]);
    }

    #[test]
    fn exact_match_ignores_substring_hits() {
        let doc = page(SUMMARY);
        let reader = CellReader::new(&doc);
        // "e" is a substring of many labels; only the bare "e" cell counts.
        assert_eq!(reader.read_cell_exact("e"), "10 kg");
        assert_eq!(reader.read_cell_exact("Clase"), "");
        assert_eq!(reader.read_cell_exact("Empresa Solicitante"), "Acopio Norte SA");
    }

    #[test]
    fn read_cell_any_returns_first_label_in_list_order() {
        let doc = page(SUMMARY);
        let reader = CellReader::new(&doc);

        // Both labels match; the first one in the list wins even though the
        // second one appears earlier on the page.
        let labels = FieldLabels::contains(&["Nombre del Usuario del Instrumento", "Nombre del Usuario"]);
        assert_eq!(reader.read_cell_any(&labels, false), "Transportes del Sur SRL");

        let labels = FieldLabels::contains(&["Nombre del Usuario", "Nombre del Usuario del Instrumento"]);
        assert_eq!(reader.read_cell_any(&labels, false), "Usuario genérico");
    }

    #[test]
    fn read_cell_any_skips_empty_and_missing_labels() {
        let doc = page(SUMMARY);
        let reader = CellReader::new(&doc);
        let labels = FieldLabels::contains(&["No existe", "Sin valor", "Nro OT"]);
        assert_eq!(reader.read_cell_any(&labels, false), "307-62136");
        assert_eq!(reader.read_cell_any(&FieldLabels::contains(&["Nada"]), false), "");
    }

    #[test]
    fn headings_resolve_to_innermost_element() {
        let doc = page(
            r#"<div><h3>Parte base del Instrumento</h3><table><tr><td>x</td></tr></table>
               <table><tr><td colspan="2"><b>Indicador Electrónico</b></td></tr></table></div>"#,
        );
        let reader = CellReader::new(&doc);
        let receptor = reader.heading_positions(&FieldLabels::contains(&["Parte base del Instrumento"]));
        let indicador = reader.heading_positions(&FieldLabels::contains(&["Indicador Electrónico"]));
        assert_eq!(receptor.len(), 1);
        assert_eq!(indicador.len(), 1);
        assert!(receptor[0] < indicador[0]);
    }

    #[test]
    fn links_are_filtered_by_marker() {
        let doc = page(
            r#"<a href="/MetroWeb/modeloDetalle.do?id=1">A</a><a href="/otro">B</a>
               <a href="/MetroWeb/modeloDetalle.do?id=2">C</a>"#,
        );
        let reader = CellReader::new(&doc);
        let links: Vec<String> = reader
            .links_containing("modeloDetalle.do")
            .into_iter()
            .map(|(_, href)| href)
            .collect();
        assert_eq!(
            links,
            vec!["/MetroWeb/modeloDetalle.do?id=1", "/MetroWeb/modeloDetalle.do?id=2"]
        );
    }
}
