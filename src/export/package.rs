// src/export/package.rs

//! Low-level access to an xlsx package.
//!
//! An xlsx file is a zip of XML parts. Editing one part and raw-copying
//! every other entry keeps the rest of the workbook exactly as it was,
//! including parts no spreadsheet library round-trips (header/footer
//! images, printer settings).

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::{Cursor, Read, Write};
use std::path::Path;
use std::sync::LazyLock;

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use regex::Regex;
use sha2::{Digest, Sha256};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::{AppError, Result};

pub const WORKBOOK_PART: &str = "xl/workbook.xml";
pub const WORKBOOK_RELS_PART: &str = "xl/_rels/workbook.xml.rels";
pub const CONTENT_TYPES_PART: &str = "[Content_Types].xml";
pub const SHARED_STRINGS_PART: &str = "xl/sharedStrings.xml";

static CELL_REF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\$?([A-Z]{1,3})\$?([1-9][0-9]*)$").expect("cell ref regex"));

/// A sheet entry of `xl/workbook.xml`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetEntry {
    pub name: String,
    pub sheet_id: u32,
    pub rel_id: String,
    /// Package path of the worksheet part, e.g. `xl/worksheets/sheet1.xml`
    pub part: String,
}

/// An xlsx file held in memory.
pub struct XlsxPackage {
    bytes: Vec<u8>,
    names: Vec<String>,
}

impl XlsxPackage {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path)?;
        Self::from_bytes(bytes).map_err(|e| match e {
            AppError::Zip(e) => AppError::spreadsheet(format!("{}: {}", path.display(), e)),
            other => other,
        })
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        let names = {
            let archive = ZipArchive::new(Cursor::new(bytes.as_slice()))?;
            archive.file_names().map(str::to_string).collect()
        };
        Ok(Self { bytes, names })
    }

    fn archive(&self) -> Result<ZipArchive<Cursor<&[u8]>>> {
        Ok(ZipArchive::new(Cursor::new(self.bytes.as_slice()))?)
    }

    /// Part names in archive order.
    pub fn part_names(&self) -> &[String] {
        &self.names
    }

    pub fn has_part(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    /// Uncompressed content of a part.
    pub fn read_part(&self, name: &str) -> Result<Vec<u8>> {
        let mut archive = self.archive()?;
        let mut file = archive
            .by_name(name)
            .map_err(|_| AppError::spreadsheet(format!("package part {} not found", name)))?;
        let mut content = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut content)?;
        Ok(content)
    }

    /// Sheets in workbook order with their worksheet parts.
    pub fn sheets(&self) -> Result<Vec<SheetEntry>> {
        let targets = relationship_targets(&self.read_part(WORKBOOK_RELS_PART)?)?;

        let workbook = self.read_part(WORKBOOK_PART)?;
        let mut reader = Reader::from_reader(workbook.as_slice());
        let mut buf = Vec::new();
        let mut sheets = Vec::new();
        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"sheet" => {
                    let name = attribute(&e, b"name")?.unwrap_or_default();
                    let sheet_id = attribute(&e, b"sheetId")?
                        .and_then(|id| id.parse().ok())
                        .unwrap_or_default();
                    let rel_id = attribute_local(&e, b"id")?.unwrap_or_default();
                    let part = targets
                        .get(&rel_id)
                        .map(|target| resolve_part("xl", target))
                        .unwrap_or_default();
                    sheets.push(SheetEntry {
                        name,
                        sheet_id,
                        rel_id,
                        part,
                    });
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }
        Ok(sheets)
    }

    /// Worksheet part of the sheet called `name`.
    pub fn sheet_part(&self, name: &str) -> Result<String> {
        let sheets = self.sheets()?;
        sheets
            .iter()
            .find(|s| s.name == name)
            .map(|s| s.part.clone())
            .filter(|part| !part.is_empty())
            .ok_or_else(|| {
                let names: Vec<&str> = sheets.iter().map(|s| s.name.as_str()).collect();
                AppError::template(format!(
                    "sheet '{}' not found; available sheets: {}",
                    name,
                    names.join(", ")
                ))
            })
    }

    /// The shared string table, empty when the package has none.
    pub fn shared_strings(&self) -> Result<Vec<String>> {
        if !self.has_part(SHARED_STRINGS_PART) {
            return Ok(Vec::new());
        }
        let xml = self.read_part(SHARED_STRINGS_PART)?;
        let mut reader = Reader::from_reader(xml.as_slice());
        let mut buf = Vec::new();
        let mut strings = Vec::new();
        let mut current = String::new();
        let mut in_text = false;
        let mut phonetic_depth = 0usize;
        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(e) => match e.local_name().as_ref() {
                    b"si" => current.clear(),
                    b"rPh" => phonetic_depth += 1,
                    b"t" => in_text = phonetic_depth == 0,
                    _ => {}
                },
                Event::Empty(e) if e.local_name().as_ref() == b"si" => strings.push(String::new()),
                Event::Text(t) if in_text => current.push_str(&t.unescape()?),
                Event::End(e) => match e.local_name().as_ref() {
                    b"si" => strings.push(std::mem::take(&mut current)),
                    b"rPh" => phonetic_depth = phonetic_depth.saturating_sub(1),
                    b"t" => in_text = false,
                    _ => {}
                },
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }
        Ok(strings)
    }

    /// SHA-256 of every part's content, hex encoded.
    pub fn digests(&self) -> Result<BTreeMap<String, String>> {
        let mut digests = BTreeMap::new();
        for name in &self.names {
            let content = self.read_part(name)?;
            digests.insert(name.clone(), hex::encode(Sha256::digest(&content)));
        }
        Ok(digests)
    }

    /// Write a copy with some parts replaced and new parts appended.
    ///
    /// Parts not replaced are raw-copied, compressed bytes and all.
    pub fn write_with(
        &self,
        out: &Path,
        replaced: &HashMap<String, Vec<u8>>,
        added: &[(String, Vec<u8>)],
    ) -> Result<()> {
        let mut archive = self.archive()?;
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        for i in 0..archive.len() {
            let file = archive.by_index_raw(i)?;
            let name = file.name().to_string();
            match replaced.get(&name) {
                Some(content) => {
                    drop(file);
                    writer.start_file(name.as_str(), options)?;
                    writer.write_all(content)?;
                }
                None => writer.raw_copy_file(file)?,
            }
        }
        for (name, content) in added {
            writer.start_file(name.as_str(), options)?;
            writer.write_all(content)?;
        }

        let bytes = writer.finish()?.into_inner();
        if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(out, bytes)?;
        Ok(())
    }
}

/// Confirm every part outside `changed` has the same content in both
/// packages.
pub fn verify_untouched(original: &XlsxPackage, written: &XlsxPackage, changed: &[&str]) -> Result<()> {
    let before = original.digests()?;
    let after = written.digests()?;
    for (name, digest) in &before {
        if changed.contains(&name.as_str()) {
            continue;
        }
        match after.get(name) {
            Some(d) if d == digest => {}
            Some(_) => return Err(AppError::template(format!("part {} changed unexpectedly", name))),
            None => return Err(AppError::template(format!("part {} missing from output", name))),
        }
    }
    log::debug!("{} untouched parts verified", before.len().saturating_sub(changed.len()));
    Ok(())
}

/// `Id -> Target` of a relationships part.
pub fn relationship_targets(xml: &[u8]) -> Result<HashMap<String, String>> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut targets = HashMap::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"Relationship" => {
                if let (Some(id), Some(target)) = (attribute(&e, b"Id")?, attribute(&e, b"Target")?) {
                    targets.insert(id, target);
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(targets)
}

/// Package path of a relationship target relative to `base_dir`.
pub fn resolve_part(base_dir: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }
    let mut parts: Vec<&str> = base_dir.split('/').filter(|p| !p.is_empty()).collect();
    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            s => parts.push(s),
        }
    }
    parts.join("/")
}

/// Attribute value by exact qualified name.
pub fn attribute(element: &BytesStart<'_>, name: &[u8]) -> Result<Option<String>> {
    for attr in element.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        if attr.key.as_ref() == name {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

/// Attribute value by local name, ignoring any namespace prefix.
pub fn attribute_local(element: &BytesStart<'_>, local: &[u8]) -> Result<Option<String>> {
    for attr in element.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        if attr.key.local_name().as_ref() == local {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

/// Stream `xml` through `edit`, which writes whatever each event becomes.
pub fn rewrite_xml<F>(xml: &[u8], mut edit: F) -> Result<Vec<u8>>
where
    F: FnMut(&mut Writer<Vec<u8>>, Event<'_>) -> Result<()>,
{
    let mut reader = Reader::from_reader(xml);
    let mut writer = Writer::new(Vec::with_capacity(xml.len() + 256));
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Eof => break,
            event => edit(&mut writer, event)?,
        }
        buf.clear();
    }
    Ok(writer.into_inner())
}

/// Write an inline string cell, optionally keeping a style index.
pub fn write_inline_cell(
    w: &mut Writer<Vec<u8>>,
    row: u32,
    col: u32,
    style: Option<&str>,
    value: &str,
) -> Result<()> {
    let reference = cell_ref(row, col);
    let mut cell = BytesStart::new("c");
    cell.push_attribute(("r", reference.as_str()));
    if let Some(style) = style {
        cell.push_attribute(("s", style));
    }
    cell.push_attribute(("t", "inlineStr"));
    let mut text = BytesStart::new("t");
    text.push_attribute(("xml:space", "preserve"));

    w.write_event(Event::Start(cell))?;
    w.write_event(Event::Start(BytesStart::new("is")))?;
    w.write_event(Event::Start(text))?;
    w.write_event(Event::Text(BytesText::new(value)))?;
    w.write_event(Event::End(BytesEnd::new("t")))?;
    w.write_event(Event::End(BytesEnd::new("is")))?;
    w.write_event(Event::End(BytesEnd::new("c")))?;
    Ok(())
}

/// Parse `B12` into zero-based (row, column).
pub fn parse_cell_ref(reference: &str) -> Option<(u32, u32)> {
    let caps = CELL_REF_RE.captures(reference.trim())?;
    let col = caps[1]
        .bytes()
        .fold(0u32, |acc, b| acc * 26 + u32::from(b - b'A' + 1));
    let row: u32 = caps[2].parse().ok()?;
    Some((row - 1, col - 1))
}

/// Zero-based (row, column) to `B12`.
pub fn cell_ref(row: u32, col: u32) -> String {
    let mut letters = Vec::new();
    let mut n = col + 1;
    while n > 0 {
        let rem = ((n - 1) % 26) as u8;
        letters.push(b'A' + rem);
        n = (n - 1) / 26;
    }
    letters.reverse();
    format!("{}{}", String::from_utf8_lossy(&letters), row + 1)
}

/// Parse a range like `A3:B4` (or a single cell) into its corners.
pub fn parse_range(range: &str) -> Option<((u32, u32), (u32, u32))> {
    match range.split_once(':') {
        Some((first, last)) => Some((parse_cell_ref(first)?, parse_cell_ref(last)?)),
        None => {
            let cell = parse_cell_ref(range)?;
            Some((cell, cell))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_refs_convert_both_ways() {
        assert_eq!(parse_cell_ref("A1"), Some((0, 0)));
        assert_eq!(parse_cell_ref("B12"), Some((11, 1)));
        assert_eq!(parse_cell_ref("$AA$3"), Some((2, 26)));
        assert_eq!(parse_cell_ref("A0"), None);
        assert_eq!(parse_cell_ref("a1"), None);
        assert_eq!(cell_ref(0, 0), "A1");
        assert_eq!(cell_ref(11, 1), "B12");
        assert_eq!(cell_ref(2, 26), "AA3");
        assert_eq!(cell_ref(0, 701), "ZZ1");
        assert_eq!(cell_ref(0, 702), "AAA1");
    }

    #[test]
    fn ranges_parse() {
        assert_eq!(parse_range("A3:C3"), Some(((2, 0), (2, 2))));
        assert_eq!(parse_range("D7"), Some(((6, 3), (6, 3))));
    }

    #[test]
    fn relationship_targets_resolve() {
        assert_eq!(resolve_part("xl", "worksheets/sheet2.xml"), "xl/worksheets/sheet2.xml");
        assert_eq!(resolve_part("xl", "/xl/worksheets/sheet2.xml"), "xl/worksheets/sheet2.xml");
        assert_eq!(resolve_part("xl/worksheets", "../drawings/drawing1.xml"), "xl/drawings/drawing1.xml");

        let rels = br#"<?xml version="1.0"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="t" Target="worksheets/sheet1.xml"/></Relationships>"#;
        let targets = relationship_targets(rels).unwrap();
        assert_eq!(targets.get("rId1").map(String::as_str), Some("worksheets/sheet1.xml"));
    }

    #[test]
    fn package_round_trip_keeps_untouched_parts() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("book.xlsx");
        let mut workbook = rust_xlsxwriter::Workbook::new();
        workbook.add_worksheet().set_name("Uno").unwrap().write_string(0, 0, "hola").unwrap();
        workbook.add_worksheet().set_name("Dos").unwrap().write_string(0, 0, "chau").unwrap();
        workbook.save(&source).unwrap();

        let package = XlsxPackage::open(&source).unwrap();
        let sheets = package.sheets().unwrap();
        assert_eq!(sheets.len(), 2);
        assert_eq!(package.sheet_part("Dos").unwrap(), "xl/worksheets/sheet2.xml");
        assert!(package.sheet_part("Tres").is_err());
        let strings = package.shared_strings().unwrap();
        assert!(strings.contains(&"hola".to_string()) && strings.contains(&"chau".to_string()));

        let out = dir.path().join("copy.xlsx");
        let mut replaced = HashMap::new();
        replaced.insert("xl/worksheets/sheet1.xml".to_string(), b"<worksheet/>".to_vec());
        package.write_with(&out, &replaced, &[]).unwrap();

        let copy = XlsxPackage::open(&out).unwrap();
        verify_untouched(&package, &copy, &["xl/worksheets/sheet1.xml"]).unwrap();
        assert!(verify_untouched(&package, &copy, &[]).is_err());
        assert_eq!(copy.read_part("xl/worksheets/sheet1.xml").unwrap(), b"<worksheet/>");
    }
}
