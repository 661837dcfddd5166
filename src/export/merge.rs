// src/export/merge.rs

//! Insert the extracted data as the first sheet of a copy of an existing
//! workbook. The original file is never modified.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use regex::Regex;

use crate::error::{AppError, Result};
use crate::export::package::{
    CONTENT_TYPES_PART, WORKBOOK_PART, WORKBOOK_RELS_PART, XlsxPackage,
    relationship_targets, rewrite_xml, write_inline_cell,
};
use crate::models::{MergeConfig, OutputRow};

const MAIN_NS: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const REL_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const WORKSHEET_REL_TYPE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet";
const WORKSHEET_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml";

pub const MERGE_HEADERS: [&str; 3] = ["Campo", "Valor", "Instrumento N"];
const COLUMN_WIDTHS: [f64; 3] = [40.0, 50.0, 18.0];

static SHEET_PART_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^xl/worksheets/sheet(\d+)\.xml$").expect("sheet part regex"));
static REL_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^rId(\d+)$").expect("relationship id regex"));

/// `base` (n) variants until one is free, compared case-insensitively.
pub fn next_sheet_name(existing: &[String], base: &str) -> String {
    let taken = |name: &str| existing.iter().any(|e| e.to_lowercase() == name.to_lowercase());
    if !taken(base) {
        return base.to_string();
    }
    (2..)
        .map(|i| format!("{} ({})", base, i))
        .find(|name| !taken(name))
        .unwrap_or_else(|| base.to_string())
}

/// `<stem><suffix>.xlsx`, or `<stem><suffix> (n).xlsx` when taken.
pub fn copy_path(base: &Path, suffix: &str) -> PathBuf {
    let stem = base.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
    let extension = base
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_else(|| "xlsx".to_string());
    let candidate = base.with_file_name(format!("{}{}.{}", stem, suffix, extension));
    if !candidate.exists() {
        return candidate;
    }
    (2..)
        .map(|i| base.with_file_name(format!("{}{} ({}).{}", stem, suffix, i, extension)))
        .find(|path| !path.exists())
        .unwrap_or(candidate)
}

/// Worksheet XML holding `Campo | Valor | Instrumento N` rows.
fn data_sheet_xml(rows: &[OutputRow]) -> Result<Vec<u8>> {
    let mut w = Writer::new(Vec::new());
    w.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))?;

    let mut root = BytesStart::new("worksheet");
    root.push_attribute(("xmlns", MAIN_NS));
    w.write_event(Event::Start(root))?;

    w.write_event(Event::Start(BytesStart::new("cols")))?;
    for (i, width) in COLUMN_WIDTHS.iter().enumerate() {
        let index = (i + 1).to_string();
        let width = width.to_string();
        let mut col = BytesStart::new("col");
        col.push_attribute(("min", index.as_str()));
        col.push_attribute(("max", index.as_str()));
        col.push_attribute(("width", width.as_str()));
        col.push_attribute(("customWidth", "1"));
        w.write_event(Event::Empty(col))?;
    }
    w.write_event(Event::End(BytesEnd::new("cols")))?;

    w.write_event(Event::Start(BytesStart::new("sheetData")))?;
    let mut r: u32 = 0;
    start_row(&mut w, r)?;
    for (c, header) in MERGE_HEADERS.iter().enumerate() {
        write_inline_cell(&mut w, r, c as u32, None, header)?;
    }
    w.write_event(Event::End(BytesEnd::new("row")))?;

    for (i, row) in rows.iter().enumerate() {
        let number = (i + 1).to_string();
        for (field, value) in row.fields() {
            r += 1;
            start_row(&mut w, r)?;
            write_inline_cell(&mut w, r, 0, None, field)?;
            if !value.is_empty() {
                write_inline_cell(&mut w, r, 1, None, value)?;
            }
            write_inline_cell(&mut w, r, 2, None, &number)?;
            w.write_event(Event::End(BytesEnd::new("row")))?;
        }
    }
    w.write_event(Event::End(BytesEnd::new("sheetData")))?;
    w.write_event(Event::End(BytesEnd::new("worksheet")))?;
    Ok(w.into_inner())
}

fn start_row(w: &mut Writer<Vec<u8>>, row: u32) -> Result<()> {
    let number = (row + 1).to_string();
    let mut start = BytesStart::new("row");
    start.push_attribute(("r", number.as_str()));
    w.write_event(Event::Start(start))?;
    Ok(())
}

/// Windows error codes for a file held open by another program.
const SHARING_VIOLATION: i32 = 32;
const LOCK_VIOLATION: i32 = 33;

fn is_locked(error: &io::Error) -> bool {
    error.kind() == io::ErrorKind::PermissionDenied
        || (cfg!(windows) && matches!(error.raw_os_error(), Some(SHARING_VIOLATION | LOCK_VIOLATION)))
}

/// Name the workbook when the failure is a lock held by another program.
fn explain_locked(path: &Path, error: AppError) -> AppError {
    match error {
        AppError::Io(e) if is_locked(&e) => AppError::Io(io::Error::new(
            e.kind(),
            format!("{} is open in another program (close it and try again)", path.display()),
        )),
        error => error,
    }
}

/// Copy of `element` with the named numeric attributes incremented.
fn bump_indices(element: &BytesStart<'_>, names: &[&[u8]]) -> Result<BytesStart<'static>> {
    let name = String::from_utf8_lossy(element.name().as_ref()).into_owned();
    let mut copy = BytesStart::new(name);
    for attr in element.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        let key = attr.key.as_ref();
        let bumped = names
            .contains(&key)
            .then(|| attr.unescape_value().ok()?.parse::<u32>().ok())
            .flatten();
        match bumped {
            Some(index) => {
                let key = String::from_utf8_lossy(key).into_owned();
                let value = (index + 1).to_string();
                copy.push_attribute((key.as_str(), value.as_str()));
            }
            None => copy.push_attribute(attr),
        }
    }
    Ok(copy)
}

/// Workbook XML with the new sheet listed first.
fn insert_sheet_entry(xml: &[u8], name: &str, sheet_id: u32, rel_id: &str) -> Result<Vec<u8>> {
    let mut rel_prefix: Option<String> = None;
    let sheet_id = sheet_id.to_string();

    rewrite_xml(xml, |w, event| {
        match event {
            Event::Start(e) if e.local_name().as_ref() == b"workbook" => {
                for attr in e.attributes() {
                    let attr = attr.map_err(quick_xml::Error::from)?;
                    if attr.value.as_ref() == REL_NS.as_bytes() {
                        if let Some(prefix) = attr.key.as_ref().strip_prefix(b"xmlns:") {
                            rel_prefix = Some(String::from_utf8_lossy(prefix).into_owned());
                        }
                    }
                }
                w.write_event(Event::Start(e))?;
            }
            Event::Start(e) if e.local_name().as_ref() == b"sheets" => {
                w.write_event(Event::Start(e))?;
                let mut sheet = BytesStart::new("sheet");
                sheet.push_attribute(("name", name));
                sheet.push_attribute(("sheetId", sheet_id.as_str()));
                match &rel_prefix {
                    Some(prefix) => {
                        let key = format!("{}:id", prefix);
                        sheet.push_attribute((key.as_str(), rel_id));
                    }
                    None => {
                        sheet.push_attribute(("xmlns:r", REL_NS));
                        sheet.push_attribute(("r:id", rel_id));
                    }
                }
                w.write_event(Event::Empty(sheet))?;
            }
            Event::Start(e) if e.local_name().as_ref() == b"definedName" => {
                w.write_event(Event::Start(bump_indices(&e, &[b"localSheetId"])?))?;
            }
            Event::Empty(e) if e.local_name().as_ref() == b"workbookView" => {
                w.write_event(Event::Empty(bump_indices(&e, &[b"activeTab", b"firstSheet"])?))?;
            }
            Event::Start(e) if e.local_name().as_ref() == b"workbookView" => {
                w.write_event(Event::Start(bump_indices(&e, &[b"activeTab", b"firstSheet"])?))?;
            }
            event => w.write_event(event)?,
        }
        Ok(())
    })
}

/// Append an element just before the closing tag of `parent`.
fn append_child(xml: &[u8], parent: &[u8], child: BytesStart<'_>) -> Result<Vec<u8>> {
    let mut child = Some(child);
    rewrite_xml(xml, |w, event| {
        match event {
            Event::End(e) if e.local_name().as_ref() == parent => {
                if let Some(child) = child.take() {
                    w.write_event(Event::Empty(child))?;
                }
                w.write_event(Event::End(e))?;
            }
            event => w.write_event(event)?,
        }
        Ok(())
    })
}

fn max_number<'a>(values: impl Iterator<Item = &'a str>, pattern: &Regex) -> u32 {
    values
        .filter_map(|v| pattern.captures(v).and_then(|c| c[1].parse::<u32>().ok()))
        .max()
        .unwrap_or(0)
}

/// Write a copy of `base` with the rows as a new first sheet.
///
/// Returns the copy's path.
pub fn merge_into(base: &Path, rows: &[OutputRow], config: &MergeConfig) -> Result<PathBuf> {
    if !base.exists() {
        return Err(AppError::spreadsheet(format!("base workbook not found: {}", base.display())));
    }
    let package = XlsxPackage::open(base).map_err(|e| explain_locked(base, e))?;
    let sheets = package.sheets()?;

    let names: Vec<String> = sheets.iter().map(|s| s.name.clone()).collect();
    let sheet_name = next_sheet_name(&names, &config.sheet_name);
    let sheet_id = sheets.iter().map(|s| s.sheet_id).max().unwrap_or(0) + 1;
    let part_number = max_number(package.part_names().iter().map(String::as_str), &SHEET_PART_RE) + 1;
    let part = format!("xl/worksheets/sheet{}.xml", part_number);

    let rels = package.read_part(WORKBOOK_RELS_PART)?;
    let targets = relationship_targets(&rels)?;
    let rel_id = format!("rId{}", max_number(targets.keys().map(String::as_str), &REL_ID_RE) + 1);

    let workbook = insert_sheet_entry(&package.read_part(WORKBOOK_PART)?, &sheet_name, sheet_id, &rel_id)?;

    let target = format!("worksheets/sheet{}.xml", part_number);
    let mut relationship = BytesStart::new("Relationship");
    relationship.push_attribute(("Id", rel_id.as_str()));
    relationship.push_attribute(("Type", WORKSHEET_REL_TYPE));
    relationship.push_attribute(("Target", target.as_str()));
    let rels = append_child(&rels, b"Relationships", relationship)?;

    let part_name = format!("/{}", part);
    let mut content_type = BytesStart::new("Override");
    content_type.push_attribute(("PartName", part_name.as_str()));
    content_type.push_attribute(("ContentType", WORKSHEET_CONTENT_TYPE));
    let content_types = append_child(&package.read_part(CONTENT_TYPES_PART)?, b"Types", content_type)?;

    let mut replaced = HashMap::new();
    replaced.insert(WORKBOOK_PART.to_string(), workbook);
    replaced.insert(WORKBOOK_RELS_PART.to_string(), rels);
    replaced.insert(CONTENT_TYPES_PART.to_string(), content_types);
    let added = vec![(part, data_sheet_xml(rows)?)];

    let out = copy_path(base, &config.copy_suffix);
    package
        .write_with(&out, &replaced, &added)
        .map_err(|e| explain_locked(&out, e))?;
    log::info!("Inserted sheet '{}' into {}", sheet_name, out.display());
    Ok(out)
}
