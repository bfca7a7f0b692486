//! Reads xref sections — classic tables or cross-reference streams — and
//! the trailer dictionary that follows/wraps them (spec §3 C1).

use crate::enc;
use crate::error::{self, Result};
use crate::object::{Dictionary, GenNr, NoResolve, ObjNr, Resolve};
use crate::parser::lexer::Lexer;
use crate::parser::{parse_indirect_object, parse_with_lexer};
use crate::xref::{XRef, XRefSection};

fn read_u64_from_stream(width: usize, data: &mut &[u8]) -> u64 {
    let mut result: u64 = 0;
    for _ in 0..width {
        let byte = data.first().copied().unwrap_or(0);
        *data = &data[1.min(data.len())..];
        result = (result << 8) | byte as u64;
    }
    result
}

fn parse_xref_section_from_stream(
    first_id: ObjNr,
    num_entries: u32,
    width: &[usize; 3],
    data: &mut &[u8],
) -> Result<XRefSection> {
    let mut section = XRefSection::new(first_id);
    for _ in 0..num_entries {
        // a zero-width field 1 defaults to type 1 per ISO 32000-1 Table 18
        let ty = if width[0] == 0 { 1 } else { read_u64_from_stream(width[0], data) };
        let field1 = read_u64_from_stream(width[1], data);
        let field2 = read_u64_from_stream(width[2], data);
        let entry = match ty {
            0 => XRef::Free {
                next_obj_nr: field1 as ObjNr,
                gen_nr: field2 as GenNr,
            },
            1 => XRef::Raw {
                pos: field1 as usize,
                gen_nr: field2 as GenNr,
            },
            2 => XRef::Stream {
                stream_id: field1 as ObjNr,
                index: field2 as usize,
            },
            other => {
                return error::ParseSnafu {
                    pos: 0usize,
                    reason: format!("unknown xref stream entry type {other}"),
                }
                .fail()
            }
        };
        section.entries.push(entry);
    }
    Ok(section)
}

pub fn parse_xref_stream_and_trailer(lexer: &mut Lexer, resolve: &dyn Resolve) -> Result<(Vec<XRefSection>, Dictionary)> {
    let (_id, _gen, obj) = parse_indirect_object(lexer, resolve)?;
    let stream = obj.into_stream()?;
    let trailer = stream.info.clone();

    let chain = enc::filter_chain(trailer.get("Filter"), trailer.get("DecodeParms"), &NoResolve)?;
    let decoded = enc::decode_stream(&stream.data, &chain, enc::DEFAULT_MAX_DECOMPRESSED_SIZE)?;

    let w: Vec<i64> = trailer
        .get("W")
        .ok_or_else(|| error::MissingEntrySnafu { typ: "XRefStream", field: "W" }.build())?
        .clone()
        .into_array()?
        .into_iter()
        .map(|p| p.as_integer())
        .collect::<Result<_>>()?;
    if w.len() != 3 {
        return error::ParseSnafu {
            pos: 0usize,
            reason: "xref stream /W must have exactly 3 entries".to_string(),
        }
        .fail();
    }
    let width = [w[0] as usize, w[1] as usize, w[2] as usize];

    let size = trailer
        .get("Size")
        .ok_or_else(|| error::MissingEntrySnafu { typ: "XRefStream", field: "Size" }.build())?
        .clone()
        .as_integer()?;
    let index: Vec<i64> = match trailer.get("Index") {
        Some(p) => p.clone().into_array()?.into_iter().map(|p| p.as_integer()).collect::<Result<_>>()?,
        None => vec![0, size],
    };

    let mut data_left = decoded.as_slice();
    let mut sections = Vec::new();
    for pair in index.chunks(2) {
        let (first_id, count) = (pair[0] as ObjNr, pair[1] as u32);
        sections.push(parse_xref_section_from_stream(first_id, count, &width, &mut data_left)?);
    }
    Ok((sections, trailer))
}

pub fn parse_xref_table_and_trailer(lexer: &mut Lexer, resolve: &dyn Resolve) -> Result<(Vec<XRefSection>, Dictionary)> {
    let mut sections = Vec::new();

    while !lexer.peek()?.equals(b"trailer") {
        let start_id = lexer.next_as::<ObjNr>()?;
        let num_ids = lexer.next_as::<u32>()?;
        let mut section = XRefSection::new(start_id);

        for _ in 0..num_ids {
            let w1 = lexer.next()?;
            let w2 = lexer.next()?;
            let w3 = lexer.next()?;
            if w3.equals(b"f") {
                section.add_free_entry(w1.to::<ObjNr>()?, w2.to::<GenNr>()?);
            } else if w3.equals(b"n") {
                section.add_inuse_entry(w1.to::<usize>()?, w2.to::<GenNr>()?);
            } else {
                return error::UnexpectedLexemeSnafu {
                    pos: lexer.get_pos(),
                    lexeme: w3.to_string(),
                    expected: "f or n",
                }
                .fail();
            }
        }
        sections.push(section);
    }

    lexer.next_expect("trailer")?;
    let trailer = parse_with_lexer(lexer, resolve)?.into_dictionary()?;
    Ok((sections, trailer))
}

/// Dispatches on whether the xref at the lexer's current position is a
/// classic table (`xref` keyword) or a cross-reference stream (bare
/// `N G obj`).
pub fn read_xref_and_trailer_at(lexer: &mut Lexer, resolve: &dyn Resolve) -> Result<(Vec<XRefSection>, Dictionary)> {
    let checkpoint = lexer.get_pos();
    let next_word = lexer.next()?;
    if next_word.equals(b"xref") {
        parse_xref_table_and_trailer(lexer, resolve)
    } else {
        lexer.set_pos(checkpoint);
        parse_xref_stream_and_trailer(lexer, resolve)
    }
}

/// Finds the `startxref` offset at the tail of a file (spec §3, locating
/// the initial xref section).
pub fn locate_xref_offset(data: &[u8]) -> Result<usize> {
    let mut lexer = Lexer::new(data);
    lexer.set_pos_from_end(0);
    lexer.seek_substr_back(b"startxref")?;
    lexer.next()?.to::<usize>()
}

/// Walks the full `Prev` chain starting at `startxref`, merging every
/// section found (most recent first) into one [`crate::xref::XRefTable`].
pub fn read_full_xref_chain(data: &[u8]) -> Result<(crate::xref::XRefTable, Dictionary)> {
    let start = locate_xref_offset(data)?;
    let mut lexer = Lexer::new(&data[start..]);
    let (sections, trailer) = read_xref_and_trailer_at(&mut lexer, &NoResolve)?;

    let size = trailer
        .get("Size")
        .ok_or_else(|| error::MissingEntrySnafu { typ: "XRefTable", field: "Size" }.build())?
        .clone()
        .as_integer()?;

    let mut table = crate::xref::XRefTable::new(size as ObjNr);
    for section in sections {
        table.add_entries_from(section);
    }

    let mut prev = match trailer.get("Prev") {
        Some(p) => Some(p.clone().as_integer()?),
        None => None,
    };
    while let Some(offset) = prev {
        let mut lexer = Lexer::new(&data[offset as usize..]);
        let (sections, prev_trailer) = read_xref_and_trailer_at(&mut lexer, &NoResolve)?;
        for section in sections {
            table.add_entries_from(section);
        }
        prev = match prev_trailer.get("Prev") {
            Some(p) => Some(p.clone().as_integer()?),
            None => None,
        };
    }

    Ok((table, trailer))
}
