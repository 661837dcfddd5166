// src/export/template.rs

//! Template fill: write values into a pre-formatted worksheet in place.
//!
//! Only the target worksheet part is rewritten. Every other part of the
//! template package is raw-copied and checked afterwards by digest, so
//! headers, footers and images survive untouched.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};

use crate::error::Result;
use crate::export::SpreadsheetWriter;
use crate::export::package::{
    XlsxPackage, attribute, cell_ref, parse_cell_ref, parse_range, rewrite_xml, verify_untouched,
    write_inline_cell,
};
use crate::models::{COLUMNS, CellTarget, OutputRow, TemplateConfig, col};
use crate::services::cells::normalize;
use crate::utils::sanitize_file_name;

/// Planned cell values, by zero-based row then column.
type Writes = BTreeMap<u32, BTreeMap<u32, String>>;

/// What the target worksheet holds before filling.
#[derive(Debug, Default)]
struct SheetScan {
    cells: HashMap<(u32, u32), String>,
    merges: Vec<((u32, u32), (u32, u32))>,
}

impl SheetScan {
    fn read(xml: &[u8], shared: &[String]) -> Result<Self> {
        let mut reader = Reader::from_reader(xml);
        let mut buf = Vec::new();
        let mut scan = Self::default();

        let mut cell: Option<((u32, u32), bool)> = None;
        let mut text = String::new();
        let mut in_value = false;
        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(e) => match e.local_name().as_ref() {
                    b"c" => {
                        let position = attribute(&e, b"r")?.as_deref().and_then(parse_cell_ref);
                        let shared_ref = attribute(&e, b"t")?.as_deref() == Some("s");
                        cell = position.map(|p| (p, shared_ref));
                        text.clear();
                    }
                    b"v" | b"t" => in_value = cell.is_some(),
                    _ => {}
                },
                Event::Empty(e) if e.local_name().as_ref() == b"mergeCell" => {
                    if let Some(range) = attribute(&e, b"ref")?.as_deref().and_then(parse_range) {
                        scan.merges.push(range);
                    }
                }
                Event::Text(t) if in_value => text.push_str(&t.unescape()?),
                Event::End(e) => match e.local_name().as_ref() {
                    b"v" | b"t" => in_value = false,
                    b"c" => {
                        if let Some((position, shared_ref)) = cell.take() {
                            let value = if shared_ref {
                                text.trim()
                                    .parse::<usize>()
                                    .ok()
                                    .and_then(|i| shared.get(i).cloned())
                                    .unwrap_or_default()
                            } else {
                                text.clone()
                            };
                            scan.cells.insert(position, value);
                        }
                    }
                    _ => {}
                },
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }
        Ok(scan)
    }

    fn text(&self, position: (u32, u32)) -> &str {
        self.cells.get(&position).map(|s| s.trim()).unwrap_or("")
    }

    /// Cell to the right of a label, past any merged range it starts.
    fn value_cell_for(&self, label: (u32, u32)) -> (u32, u32) {
        let (row, col) = label;
        let last_col = self
            .merges
            .iter()
            .find(|((r1, c1), (r2, c2))| (*r1..=*r2).contains(&row) && (*c1..=*c2).contains(&col))
            .map(|(_, (_, c2))| *c2)
            .unwrap_or(col);
        (row, last_col + 1)
    }
}

fn label_key(text: &str) -> String {
    normalize(text).trim_end_matches(':').trim_end().to_lowercase()
}

/// Decide which cells get which values.
fn plan_writes(scan: &SheetScan, row: &OutputRow, overrides: &BTreeMap<String, CellTarget>) -> Writes {
    let columns: HashMap<String, &str> = COLUMNS.iter().map(|c| (label_key(c), *c)).collect();
    let mut writes = Writes::new();

    let mut labels: Vec<(&(u32, u32), &String)> = scan.cells.iter().collect();
    labels.sort_by_key(|(position, _)| **position);
    for (position, text) in labels {
        let Some(column) = columns.get(&label_key(text)) else {
            continue;
        };
        let value = row.get(column);
        if value.is_empty() {
            continue;
        }
        let (r, c) = scan.value_cell_for(*position);
        log::debug!("Label '{}' at {} fills {}", column, cell_ref(position.0, position.1), cell_ref(r, c));
        writes.entry(r).or_default().insert(c, value.to_string());
    }

    for (field, target) in overrides {
        let value = row.get(field);
        if value.is_empty() {
            continue;
        }
        let Some((r, c)) = parse_cell_ref(target.cell()) else {
            log::warn!("Ignoring invalid cell '{}' for {}", target.cell(), field);
            continue;
        };
        if target.keep_existing() && !scan.text((r, c)).is_empty() {
            log::debug!("Keeping existing value of {} for {}", target.cell(), field);
            continue;
        }
        writes.entry(r).or_default().insert(c, value.to_string());
    }
    writes
}

fn write_row(w: &mut Writer<Vec<u8>>, row: u32, cells: BTreeMap<u32, String>) -> Result<()> {
    let number = (row + 1).to_string();
    let mut start = BytesStart::new("row");
    start.push_attribute(("r", number.as_str()));
    w.write_event(Event::Start(start))?;
    for (col, value) in cells {
        write_inline_cell(w, row, col, None, &value)?;
    }
    w.write_event(Event::End(BytesEnd::new("row")))?;
    Ok(())
}

/// Insert rows that sort before `row` and are not in the sheet.
fn flush_rows_before(w: &mut Writer<Vec<u8>>, pending: &mut Writes, row: Option<u32>) -> Result<()> {
    let Some(row) = row else {
        return Ok(());
    };
    let later = pending.split_off(&row);
    for (r, cells) in std::mem::replace(pending, later) {
        write_row(w, r, cells)?;
    }
    Ok(())
}

fn flush_all(w: &mut Writer<Vec<u8>>, pending: &mut Writes) -> Result<()> {
    for (r, cells) in std::mem::take(pending) {
        write_row(w, r, cells)?;
    }
    Ok(())
}

/// Row element without its `spans` hint, which may no longer hold.
fn without_spans(row: &BytesStart<'_>) -> Result<BytesStart<'static>> {
    let mut copy = BytesStart::new("row");
    for attr in row.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        if attr.key.as_ref() != b"spans" {
            copy.push_attribute(attr);
        }
    }
    Ok(copy)
}

fn row_index(row: &BytesStart<'_>) -> Result<Option<u32>> {
    Ok(attribute(row, b"r")?
        .and_then(|r| r.parse::<u32>().ok())
        .and_then(|r| r.checked_sub(1)))
}

/// Emit pending cells left of `cell`; replace `cell` itself if planned.
/// Returns whether the original cell was replaced.
fn place_cell(
    w: &mut Writer<Vec<u8>>,
    row: u32,
    cells: &mut BTreeMap<u32, String>,
    cell: &BytesStart<'_>,
) -> Result<bool> {
    let Some((_, col)) = attribute(cell, b"r")?.as_deref().and_then(parse_cell_ref) else {
        return Ok(false);
    };
    while cells.first_key_value().is_some_and(|(c, _)| *c < col) {
        if let Some((c, value)) = cells.pop_first() {
            write_inline_cell(w, row, c, None, &value)?;
        }
    }
    match cells.remove(&col) {
        Some(value) => {
            let style = attribute(cell, b"s")?;
            write_inline_cell(w, row, col, style.as_deref(), &value)?;
            Ok(true)
        }
        None => Ok(false),
    }
}

/// Rewrite the worksheet XML with the planned values.
fn apply_writes(xml: &[u8], mut pending: Writes) -> Result<Vec<u8>> {
    let mut editing: Option<(u32, BTreeMap<u32, String>)> = None;
    let mut skip = 0usize;

    rewrite_xml(xml, |w, event| {
        if skip > 0 {
            match event {
                Event::Start(_) => skip += 1,
                Event::End(_) => skip -= 1,
                _ => {}
            }
            return Ok(());
        }

        match event {
            Event::Start(e) if e.local_name().as_ref() == b"row" => {
                let row = row_index(&e)?;
                flush_rows_before(w, &mut pending, row)?;
                match row.and_then(|r| pending.remove(&r).map(|cells| (r, cells))) {
                    Some(edit) => {
                        w.write_event(Event::Start(without_spans(&e)?))?;
                        editing = Some(edit);
                    }
                    None => w.write_event(Event::Start(e))?,
                }
            }
            Event::Empty(e) if e.local_name().as_ref() == b"row" => {
                let row = row_index(&e)?;
                flush_rows_before(w, &mut pending, row)?;
                match row.and_then(|r| pending.remove(&r).map(|cells| (r, cells))) {
                    Some((r, cells)) => {
                        w.write_event(Event::Start(without_spans(&e)?))?;
                        for (c, value) in cells {
                            write_inline_cell(w, r, c, None, &value)?;
                        }
                        w.write_event(Event::End(BytesEnd::new("row")))?;
                    }
                    None => w.write_event(Event::Empty(e))?,
                }
            }
            Event::End(e) if e.local_name().as_ref() == b"row" => {
                if let Some((r, cells)) = editing.take() {
                    for (c, value) in cells {
                        write_inline_cell(w, r, c, None, &value)?;
                    }
                }
                w.write_event(Event::End(e))?;
            }
            Event::Start(e) if e.local_name().as_ref() == b"c" => {
                let replaced = match editing.as_mut() {
                    Some((r, cells)) => place_cell(w, *r, cells, &e)?,
                    None => false,
                };
                if replaced {
                    skip = 1;
                } else {
                    w.write_event(Event::Start(e))?;
                }
            }
            Event::Empty(e) if e.local_name().as_ref() == b"c" => {
                let replaced = match editing.as_mut() {
                    Some((r, cells)) => place_cell(w, *r, cells, &e)?,
                    None => false,
                };
                if !replaced {
                    w.write_event(Event::Empty(e))?;
                }
            }
            Event::End(e) if e.local_name().as_ref() == b"sheetData" => {
                flush_all(w, &mut pending)?;
                w.write_event(Event::End(e))?;
            }
            Event::Empty(e) if e.local_name().as_ref() == b"sheetData" => {
                w.write_event(Event::Start(e))?;
                flush_all(w, &mut pending)?;
                w.write_event(Event::End(BytesEnd::new("sheetData")))?;
            }
            event => w.write_event(event)?,
        }
        Ok(())
    })
}

/// Fills the configured worksheet of a template workbook.
pub struct TemplateWriter {
    template: PathBuf,
    sheet: String,
    one_file_per_instrument: bool,
    cells: BTreeMap<String, CellTarget>,
}

impl TemplateWriter {
    pub fn new(template: impl Into<PathBuf>, config: &TemplateConfig) -> Self {
        Self {
            template: template.into(),
            sheet: config.sheet.clone(),
            one_file_per_instrument: config.one_file_per_instrument,
            cells: config.cells.clone(),
        }
    }

    /// Fill one copy of the template with `row`.
    fn fill(&self, package: &XlsxPackage, row: &OutputRow, out: &Path) -> Result<()> {
        let part = package.sheet_part(&self.sheet)?;
        let xml = package.read_part(&part)?;
        let scan = SheetScan::read(&xml, &package.shared_strings()?)?;

        let writes = plan_writes(&scan, row, &self.cells);
        let count: usize = writes.values().map(BTreeMap::len).sum();
        let filled = apply_writes(&xml, writes)?;

        let mut replaced = HashMap::new();
        replaced.insert(part.clone(), filled);
        package.write_with(out, &replaced, &[])?;

        let written = XlsxPackage::open(out)?;
        verify_untouched(package, &written, &[part.as_str()])?;
        log::info!("Filled {} cells of '{}' in {}", count, self.sheet, out.display());
        Ok(())
    }
}

/// `OT_1.xlsx` + `_REC-1` -> `OT_1_REC-1.xlsx`.
fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let stem = path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_else(|| "xlsx".to_string());
    path.with_file_name(format!("{}_{}.{}", stem, suffix, extension))
}

impl SpreadsheetWriter for TemplateWriter {
    fn write(&self, rows: &[OutputRow], path: &Path) -> Result<Vec<PathBuf>> {
        let package = XlsxPackage::open(&self.template)?;

        if rows.len() > 1 && self.one_file_per_instrument {
            let mut written = Vec::with_capacity(rows.len());
            for (i, row) in rows.iter().enumerate() {
                let serial = sanitize_file_name(row.get(col::REC_SERIAL));
                let suffix = if serial.is_empty() { (i + 1).to_string() } else { serial };
                let out = with_suffix(path, &suffix);
                self.fill(&package, row, &out)?;
                written.push(out);
            }
            return Ok(written);
        }

        if rows.len() > 1 {
            log::warn!("Template holds one instrument; filling only the first of {}", rows.len());
        }
        let empty = OutputRow::new();
        self.fill(&package, rows.first().unwrap_or(&empty), path)?;
        Ok(vec![path.to_path_buf()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHEET: &[u8] = br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData><row r="1" spans="1:3"><c r="A1" t="s"><v>0</v></c><c r="C1" s="4"><v>7</v></c></row><row r="3"><c r="A3" t="inlineStr"><is><t>Marca Receptor:</t></is></c></row></sheetData><mergeCells count="1"><mergeCell ref="A1:B1"/></mergeCells></worksheet>"#;

    fn row() -> OutputRow {
        OutputRow::from_pairs([
            (col::WORK_ORDER, "307-62136"),
            (col::REC_BRAND, "Systel"),
            (col::REC_SERIAL, "REC-1"),
        ])
    }

    #[test]
    fn labels_fill_cell_after_merge() {
        let shared = vec![col::WORK_ORDER.to_string()];
        let scan = SheetScan::read(SHEET, &shared).unwrap();
        assert_eq!(scan.text((0, 0)), col::WORK_ORDER);

        let writes = plan_writes(&scan, &row(), &BTreeMap::new());
        assert_eq!(writes[&0][&2], "307-62136");
        assert_eq!(writes[&2][&1], "Systel");
    }

    #[test]
    fn overrides_respect_keep_existing() {
        let scan = SheetScan::read(SHEET, &[]).unwrap();
        let mut overrides = BTreeMap::new();
        overrides.insert(
            col::REC_SERIAL.to_string(),
            CellTarget::Detailed {
                cell: "C1".into(),
                keep_existing: true,
            },
        );
        overrides.insert(col::VPE.to_string(), CellTarget::Cell("D9".into()));
        overrides.insert(col::WORK_ORDER.to_string(), CellTarget::Cell("E5".into()));

        let writes = plan_writes(&scan, &row(), &overrides);
        assert_eq!(writes[&0][&2], "307-62136");
        assert!(!writes.contains_key(&8));
        assert_eq!(writes[&4][&4], "307-62136");
    }

    #[test]
    fn rewrite_replaces_keeps_style_and_inserts() {
        let mut writes = Writes::new();
        writes.entry(0).or_default().insert(2, "A & B".to_string());
        writes.entry(1).or_default().insert(0, "nueva".to_string());
        writes.entry(2).or_default().insert(1, "Systel".to_string());
        writes.entry(5).or_default().insert(3, "fin".to_string());

        let out = String::from_utf8(apply_writes(SHEET, writes).unwrap()).unwrap();

        assert!(out.contains(r#"<c r="C1" s="4" t="inlineStr"><is><t xml:space="preserve">A &amp; B</t></is></c>"#));
        assert!(!out.contains("<v>7</v>"));
        assert!(out.contains(r#"<row r="1">"#));
        assert!(out.contains(r#"<row r="2"><c r="A2" t="inlineStr">"#));
        assert!(out.contains(r#"<t>Marca Receptor:</t></is></c><c r="B3" t="inlineStr">"#));
        assert!(out.contains(r#"<row r="6"><c r="D6" t="inlineStr">"#));
        assert!(out.contains(r#"<mergeCell ref="A1:B1"/>"#));

        let second_row = out.find(r#"<row r="2">"#).unwrap();
        assert!(out.find(r#"<row r="1">"#).unwrap() < second_row);
        assert!(second_row < out.find(r#"<row r="3">"#).unwrap());
    }

    #[test]
    fn suffix_goes_before_extension() {
        assert_eq!(with_suffix(Path::new("/tmp/OT_1.xlsx"), "REC-1"), PathBuf::from("/tmp/OT_1_REC-1.xlsx"));
    }
}
