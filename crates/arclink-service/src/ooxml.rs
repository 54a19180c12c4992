//! OOXML (DOCX/XLSX/PPTX) text extraction and append.
//!
//! All three formats are ZIP containers of XML parts. Extraction streams
//! the relevant part through `quick-xml` and collects character data from
//! the text elements (`w:t`, `t`, `a:t`). Append works at part level:
//! the addition's content fragments are spliced into the base package and
//! the untouched parts are copied through byte for byte.
//!
//! Only the standard part layout is supported (`word/document.xml`,
//! `xl/worksheets/sheetN.xml` with `xl/sharedStrings.xml`,
//! `ppt/slides/slideN.xml`); a package without it is reported as
//! malformed.

use std::io::{Cursor, Read, Write};

use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

use arclink_core::{ArchiveError, ArchiveResult};

type Package = ZipArchive<Cursor<Vec<u8>>>;

fn open_package(data: &[u8]) -> ArchiveResult<Package> {
    ZipArchive::new(Cursor::new(data.to_vec()))
        .map_err(|err| ArchiveError::validation(format!("Malformed OOXML container: {err}")))
}

fn read_part(package: &mut Package, name: &str) -> ArchiveResult<Vec<u8>> {
    let mut file = package.by_name(name).map_err(|_| {
        ArchiveError::validation(format!("OOXML container is missing part {name}"))
    })?;
    let mut bytes = Vec::with_capacity(usize::try_from(file.size()).unwrap_or(0));
    file.read_to_end(&mut bytes)?;
    Ok(bytes)
}

fn read_part_opt(package: &mut Package, name: &str) -> ArchiveResult<Option<Vec<u8>>> {
    if package.by_name(name).is_err() {
        return Ok(None);
    }
    read_part(package, name).map(Some)
}

fn part_names(package: &Package) -> Vec<String> {
    package.file_names().map(str::to_string).collect()
}

/// Rebuilds a package: parts named in `replace` get new bytes, everything
/// else is copied through, and `add` parts are appended.
fn rebuild_package(
    base: &[u8],
    replace: &[(String, Vec<u8>)],
    add: &[(String, Vec<u8>)],
) -> ArchiveResult<Vec<u8>> {
    let mut package = open_package(base)?;
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();

    for name in part_names(&package) {
        let bytes = match replace.iter().find(|(n, _)| *n == name) {
            Some((_, replacement)) => replacement.clone(),
            None => read_part(&mut package, &name)?,
        };
        writer
            .start_file(&name, options)
            .map_err(|err| ArchiveError::internal(format!("OOXML rebuild failed: {err}")))?;
        writer.write_all(&bytes)?;
    }
    for (name, bytes) in add {
        writer
            .start_file(name, options)
            .map_err(|err| ArchiveError::internal(format!("OOXML rebuild failed: {err}")))?;
        writer.write_all(bytes)?;
    }

    let cursor = writer
        .finish()
        .map_err(|err| ArchiveError::internal(format!("OOXML rebuild failed: {err}")))?;
    Ok(cursor.into_inner())
}

/// Collects character data from `text_local` elements, inserting a newline
/// at the end of each `break_local` element. Element names are matched on
/// the local part, ignoring the namespace prefix.
fn xml_text(xml: &[u8], text_local: &[u8], break_local: &[u8]) -> ArchiveResult<String> {
    use quick_xml::events::Event;

    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut out = String::new();
    let mut in_text = 0usize;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.local_name().as_ref() == text_local => in_text += 1,
            Ok(Event::End(e)) => {
                if e.local_name().as_ref() == text_local {
                    in_text = in_text.saturating_sub(1);
                } else if e.local_name().as_ref() == break_local && !out.ends_with('\n') {
                    out.push('\n');
                }
            }
            Ok(Event::Text(t)) if in_text > 0 => {
                let text = t
                    .unescape()
                    .map_err(|err| ArchiveError::validation(format!("Malformed XML: {err}")))?;
                out.push_str(&text);
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(err) => {
                return Err(ArchiveError::validation(format!("Malformed XML: {err}")));
            }
        }
        buf.clear();
    }
    Ok(out)
}

/// Extracts the document text of a DOCX, one line per paragraph.
pub fn docx_text(data: &[u8]) -> ArchiveResult<String> {
    let mut package = open_package(data)?;
    let document = read_part(&mut package, "word/document.xml")?;
    xml_text(&document, b"t", b"p")
}

/// Extracts the shared-string text of an XLSX, one line per string entry.
/// Workbooks without a shared-string table fall back to the worksheet
/// parts, one line per row.
pub fn xlsx_text(data: &[u8]) -> ArchiveResult<String> {
    let mut package = open_package(data)?;
    if let Some(shared) = read_part_opt(&mut package, "xl/sharedStrings.xml")? {
        return xml_text(&shared, b"t", b"si");
    }
    let mut out = String::new();
    for name in part_names(&package) {
        if name.starts_with("xl/worksheets/") && name.ends_with(".xml") {
            let sheet = read_part(&mut package, &name)?;
            out.push_str(&xml_text(&sheet, b"t", b"row")?);
        }
    }
    Ok(out)
}

/// Extracts the slide text of a PPTX, slides in part order, one line per
/// paragraph.
pub fn pptx_text(data: &[u8]) -> ArchiveResult<String> {
    let mut package = open_package(data)?;
    let mut slides: Vec<String> = part_names(&package)
        .into_iter()
        .filter(|name| name.starts_with("ppt/slides/slide") && name.ends_with(".xml"))
        .collect();
    slides.sort_by_key(|name| slide_number(name));

    let mut out = String::new();
    for name in slides {
        let slide = read_part(&mut package, &name)?;
        out.push_str(&xml_text(&slide, b"t", b"p")?);
    }
    Ok(out)
}

fn slide_number(name: &str) -> u32 {
    name.trim_start_matches("ppt/slides/slide")
        .trim_end_matches(".xml")
        .parse()
        .unwrap_or(0)
}

/// Returns the content of `xml` between the opening tag of `element` and
/// its closing tag.
fn inner_fragment<'a>(xml: &'a str, element: &str) -> ArchiveResult<&'a str> {
    let open = format!("<{element}");
    let close = format!("</{element}>");
    let start_tag = xml
        .find(&open)
        .ok_or_else(|| ArchiveError::validation(format!("Missing element {element}")))?;
    let start = xml[start_tag..]
        .find('>')
        .map(|i| start_tag + i + 1)
        .ok_or_else(|| ArchiveError::validation(format!("Missing element {element}")))?;
    let end = xml
        .rfind(&close)
        .ok_or_else(|| ArchiveError::validation(format!("Missing element {element}")))?;
    if end < start {
        // Self-closing element: no inner content.
        return Ok("");
    }
    Ok(&xml[start..end])
}

fn part_string(package: &mut Package, name: &str) -> ArchiveResult<String> {
    String::from_utf8(read_part(package, name)?)
        .map_err(|_| ArchiveError::validation(format!("Part {name} is not valid UTF-8")))
}

/// Appends the addition's body content to the base DOCX.
///
/// The addition's `w:body` children (minus its section properties) are
/// spliced into the base document before its section properties.
pub fn docx_append(base: &[u8], addition: &[u8]) -> ArchiveResult<Vec<u8>> {
    let mut base_pkg = open_package(base)?;
    let mut add_pkg = open_package(addition)?;
    let base_doc = part_string(&mut base_pkg, "word/document.xml")?;
    let add_doc = part_string(&mut add_pkg, "word/document.xml")?;

    let mut fragment = inner_fragment(&add_doc, "w:body")?.to_string();
    if let Some(sect) = fragment.find("<w:sectPr") {
        fragment.truncate(sect);
    }

    let insert_at = base_doc
        .find("<w:sectPr")
        .or_else(|| base_doc.find("</w:body>"))
        .ok_or_else(|| ArchiveError::validation("Missing element w:body"))?;
    let mut merged = String::with_capacity(base_doc.len() + fragment.len());
    merged.push_str(&base_doc[..insert_at]);
    merged.push_str(&fragment);
    merged.push_str(&base_doc[insert_at..]);

    rebuild_package(
        base,
        &[("word/document.xml".to_string(), merged.into_bytes())],
        &[],
    )
}

const SHEET_PART: &str = "xl/worksheets/sheet1.xml";
const SHARED_PART: &str = "xl/sharedStrings.xml";

fn si_count(shared: &str) -> u64 {
    shared.matches("<si>").count() as u64 + shared.matches("<si ").count() as u64
}

fn max_row(sheet: &str) -> u64 {
    let mut max = 0;
    let mut rest = sheet;
    while let Some(at) = rest.find("<row") {
        rest = &rest[at + 4..];
        if let Some(r) = rest.find("r=\"") {
            let tail = &rest[r + 3..];
            if let Some(end) = tail.find('"') {
                if let Ok(n) = tail[..end].parse::<u64>() {
                    max = max.max(n);
                }
            }
        }
    }
    max
}

/// Shifts the numeric part of a cell reference (`B7` → `B{7+offset}`).
fn shift_cell_ref(value: &str, row_offset: u64) -> String {
    let split = value.find(|c: char| c.is_ascii_digit()).unwrap_or(value.len());
    let (column, row) = value.split_at(split);
    match row.parse::<u64>() {
        Ok(n) => format!("{column}{}", n + row_offset),
        Err(_) => value.to_string(),
    }
}

/// Rewrites one `r="..."` attribute value found after `from` in `xml`.
fn shift_r_attribute(xml: &mut String, from: usize, row_offset: u64) -> usize {
    let Some(at) = xml[from..].find("r=\"").map(|i| from + i + 3) else {
        return xml.len();
    };
    let Some(end) = xml[at..].find('"').map(|i| at + i) else {
        return xml.len();
    };
    let shifted = shift_cell_ref(&xml[at..end], row_offset);
    xml.replace_range(at..end, &shifted);
    at + shifted.len() + 1
}

/// Shifts the row numbers and shared-string indices of a `sheetData`
/// fragment.
fn shift_rows(fragment: &str, row_offset: u64, string_offset: u64) -> String {
    let mut out = String::with_capacity(fragment.len());
    let mut rest = fragment;

    while let Some(at) = rest.find("<row") {
        out.push_str(&rest[..at]);
        rest = &rest[at..];
        let end = rest.find("</row>").map_or(rest.len(), |i| i + "</row>".len());
        let mut row = rest[..end].to_string();
        rest = &rest[end..];

        // The row's own r attribute, then each cell's.
        let mut cursor = 0;
        while cursor < row.len() && row[cursor..].contains("r=\"") {
            cursor = shift_r_attribute(&mut row, cursor, row_offset);
        }

        // Shared-string cells: shift the <v> index.
        let mut cell_out = String::with_capacity(row.len());
        let mut cells = row.as_str();
        while let Some(c_at) = cells.find("<c ") {
            let c_end = cells[c_at..]
                .find("</c>")
                .map_or(cells.len(), |i| c_at + i + "</c>".len());
            cell_out.push_str(&cells[..c_at]);
            let cell = &cells[c_at..c_end];
            if cell.contains("t=\"s\"") {
                cell_out.push_str(&shift_value(cell, string_offset));
            } else {
                cell_out.push_str(cell);
            }
            cells = &cells[c_end..];
        }
        cell_out.push_str(cells);
        out.push_str(&cell_out);
    }
    out.push_str(rest);
    out
}

fn shift_value(cell: &str, string_offset: u64) -> String {
    let Some(v_at) = cell.find("<v>") else {
        return cell.to_string();
    };
    let start = v_at + "<v>".len();
    let Some(v_end) = cell[start..].find("</v>").map(|i| start + i) else {
        return cell.to_string();
    };
    match cell[start..v_end].parse::<u64>() {
        Ok(index) => format!(
            "{}{}{}",
            &cell[..start],
            index + string_offset,
            &cell[v_end..]
        ),
        Err(_) => cell.to_string(),
    }
}

/// Appends the addition's first worksheet rows to the base XLSX.
///
/// Rows are renumbered past the base sheet's last row; shared strings are
/// merged and the appended cells' indices shifted accordingly.
pub fn xlsx_append(base: &[u8], addition: &[u8]) -> ArchiveResult<Vec<u8>> {
    let mut base_pkg = open_package(base)?;
    let mut add_pkg = open_package(addition)?;

    let base_sheet = part_string(&mut base_pkg, SHEET_PART)?;
    let add_sheet = part_string(&mut add_pkg, SHEET_PART)?;
    let base_shared = read_part_opt(&mut base_pkg, SHARED_PART)?
        .map(|bytes| {
            String::from_utf8(bytes).map_err(|_| {
                ArchiveError::validation(format!("Part {SHARED_PART} is not valid UTF-8"))
            })
        })
        .transpose()?;
    let add_shared = read_part_opt(&mut add_pkg, SHARED_PART)?
        .map(|bytes| {
            String::from_utf8(bytes).map_err(|_| {
                ArchiveError::validation(format!("Part {SHARED_PART} is not valid UTF-8"))
            })
        })
        .transpose()?;

    let string_offset = base_shared.as_deref().map_or(0, si_count);
    let row_offset = max_row(&base_sheet);

    let add_rows = inner_fragment(&add_sheet, "sheetData")?;
    let shifted = shift_rows(add_rows, row_offset, string_offset);
    let insert_at = base_sheet
        .find("</sheetData>")
        .ok_or_else(|| ArchiveError::validation("Missing element sheetData"))?;
    let mut merged_sheet = String::with_capacity(base_sheet.len() + shifted.len());
    merged_sheet.push_str(&base_sheet[..insert_at]);
    merged_sheet.push_str(&shifted);
    merged_sheet.push_str(&base_sheet[insert_at..]);

    let mut replace = vec![(SHEET_PART.to_string(), merged_sheet.into_bytes())];
    let mut add_parts = Vec::new();
    match (base_shared, add_shared) {
        (Some(base_sst), Some(add_sst)) => {
            let entries = inner_fragment(&add_sst, "sst")?;
            let close = base_sst
                .rfind("</sst>")
                .ok_or_else(|| ArchiveError::validation("Missing element sst"))?;
            let mut merged = String::with_capacity(base_sst.len() + entries.len());
            merged.push_str(&base_sst[..close]);
            merged.push_str(entries);
            merged.push_str(&base_sst[close..]);
            replace.push((SHARED_PART.to_string(), merged.into_bytes()));
        }
        (None, Some(add_sst)) => {
            add_parts.push((SHARED_PART.to_string(), add_sst.into_bytes()));
        }
        _ => {}
    }

    rebuild_package(base, &replace, &add_parts)
}

const SLIDE_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.presentationml.slide+xml";
const REL_TYPE_SLIDE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide";
const REL_TYPE_LAYOUT: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideLayout";

/// Appends the addition's slides to the base PPTX.
///
/// Copied slides are renumbered past the base deck and bound to the base
/// deck's first slide layout; the presentation part, its relationships and
/// the content-type map are patched to list them.
pub fn pptx_append(base: &[u8], addition: &[u8]) -> ArchiveResult<Vec<u8>> {
    let mut base_pkg = open_package(base)?;
    let mut add_pkg = open_package(addition)?;

    let base_slide_count = part_names(&base_pkg)
        .iter()
        .filter(|n| n.starts_with("ppt/slides/slide") && n.ends_with(".xml"))
        .count();
    let mut add_slides: Vec<String> = part_names(&add_pkg)
        .into_iter()
        .filter(|n| n.starts_with("ppt/slides/slide") && n.ends_with(".xml"))
        .collect();
    add_slides.sort_by_key(|name| slide_number(name));
    if add_slides.is_empty() {
        return Err(ArchiveError::validation("Presentation has no slides"));
    }

    let mut content_types = part_string(&mut base_pkg, "[Content_Types].xml")?;
    let mut pres_rels = part_string(&mut base_pkg, "ppt/_rels/presentation.xml.rels")?;
    let mut presentation = part_string(&mut base_pkg, "ppt/presentation.xml")?;
    let mut new_parts: Vec<(String, Vec<u8>)> = Vec::new();

    let mut slide_id = max_slide_id(&presentation);
    let mut sld_entries = String::new();
    for (i, name) in add_slides.iter().enumerate() {
        let number = base_slide_count + i + 1;
        let part = format!("ppt/slides/slide{number}.xml");
        let rel_id = format!("rIdArc{number}");
        slide_id += 1;

        new_parts.push((part.clone(), read_part(&mut add_pkg, name)?));
        new_parts.push((
            format!("ppt/slides/_rels/slide{number}.xml.rels"),
            slide_rels().into_bytes(),
        ));

        let override_entry = format!(
            "<Override PartName=\"/{part}\" ContentType=\"{SLIDE_CONTENT_TYPE}\"/>"
        );
        insert_before(&mut content_types, "</Types>", &override_entry)?;

        let rel_entry = format!(
            "<Relationship Id=\"{rel_id}\" Type=\"{REL_TYPE_SLIDE}\" Target=\"slides/slide{number}.xml\"/>"
        );
        insert_before(&mut pres_rels, "</Relationships>", &rel_entry)?;

        sld_entries.push_str(&format!("<p:sldId id=\"{slide_id}\" r:id=\"{rel_id}\"/>"));
    }
    insert_before(&mut presentation, "</p:sldIdLst>", &sld_entries)?;

    let replace = vec![
        ("[Content_Types].xml".to_string(), content_types.into_bytes()),
        (
            "ppt/_rels/presentation.xml.rels".to_string(),
            pres_rels.into_bytes(),
        ),
        ("ppt/presentation.xml".to_string(), presentation.into_bytes()),
    ];
    rebuild_package(base, &replace, &new_parts)
}

fn insert_before(xml: &mut String, marker: &str, fragment: &str) -> ArchiveResult<()> {
    let at = xml
        .rfind(marker)
        .ok_or_else(|| ArchiveError::validation(format!("Missing element {marker}")))?;
    xml.insert_str(at, fragment);
    Ok(())
}

fn max_slide_id(presentation: &str) -> u64 {
    let mut max = 255; // sldId values start at 256 by convention
    let mut rest = presentation;
    while let Some(at) = rest.find("<p:sldId ") {
        rest = &rest[at + 9..];
        if let Some(id_at) = rest.find("id=\"") {
            let tail = &rest[id_at + 4..];
            if let Some(end) = tail.find('"') {
                if let Ok(n) = tail[..end].parse::<u64>() {
                    max = max.max(n);
                }
            }
        }
    }
    max
}

fn slide_rels() -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
         <Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\">\
         <Relationship Id=\"rId1\" Type=\"{REL_TYPE_LAYOUT}\" Target=\"../slideLayouts/slideLayout1.xml\"/>\
         </Relationships>"
    )
}
