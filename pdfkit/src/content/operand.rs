//! Content-stream operands (spec §4.3): everything an operator can take,
//! plus the inline-image opaque blob (spec §4.3 "Inline images").
//!
//! Kept distinct from [`crate::object::Primitive`] even though the grammar
//! overlaps: content-stream operands never carry indirect references, and
//! an inline image's `BI … ID … EI` body has no equivalent at the raw
//! object-model layer.

use crate::error::{self, Result};
use crate::parser::lexer::{HexStringLexer, Lexer, StringLexer};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct OperandDict(pub Vec<(String, Operand)>);

impl OperandDict {
    pub fn get(&self, key: &str) -> Option<&Operand> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct InlineImage {
    pub dict: OperandDict,
    pub data: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Operand {
    Number(f64),
    Name(String),
    String(Vec<u8>),
    Array(Vec<Operand>),
    Dict(OperandDict),
    InlineImage(Box<InlineImage>),
}

impl Operand {
    pub fn as_number(&self) -> Result<f64> {
        match self {
            Operand::Number(n) => Ok(*n),
            other => error::UnexpectedPrimitiveSnafu { expected: "Number", found: other.kind_name() }.fail(),
        }
    }

    pub fn as_name(&self) -> Result<&str> {
        match self {
            Operand::Name(n) => Ok(n.as_str()),
            other => error::UnexpectedPrimitiveSnafu { expected: "Name", found: other.kind_name() }.fail(),
        }
    }

    pub fn as_string(&self) -> Result<&[u8]> {
        match self {
            Operand::String(s) => Ok(s.as_slice()),
            other => error::UnexpectedPrimitiveSnafu { expected: "String", found: other.kind_name() }.fail(),
        }
    }

    pub fn as_array(&self) -> Result<&[Operand]> {
        match self {
            Operand::Array(a) => Ok(a.as_slice()),
            other => error::UnexpectedPrimitiveSnafu { expected: "Array", found: other.kind_name() }.fail(),
        }
    }

    fn kind_name(&self) -> &'static str {
        match self {
            Operand::Number(_) => "Number",
            Operand::Name(_) => "Name",
            Operand::String(_) => "String",
            Operand::Array(_) => "Array",
            Operand::Dict(_) => "Dict",
            Operand::InlineImage(_) => "InlineImage",
        }
    }
}

/// One `operator operand*` unit of a tokenized content stream (spec §4.3).
/// An inline image is represented as a synthetic `"BI"` operation whose
/// sole operand is the [`Operand::InlineImage`] blob.
#[derive(Clone, Debug, PartialEq)]
pub struct Operation {
    pub operator: String,
    pub operands: Vec<Operand>,
}

fn parse_one(lexer: &mut Lexer) -> Result<Operand> {
    let word = lexer.next()?;
    parse_operand_from(word, lexer)
}

fn parse_operand_from<'a>(word: crate::parser::lexer::Substr<'a>, lexer: &mut Lexer<'a>) -> Result<Operand> {
    if word.equals(b"<<") {
        Ok(Operand::Dict(parse_dict_body(lexer)?))
    } else if word.equals(b"[") {
        Ok(Operand::Array(parse_array_body(lexer)?))
    } else if word.equals(b"/") {
        Ok(Operand::Name(lexer.next()?.to_string()))
    } else if word.equals(b"(") {
        let mut string_lexer = StringLexer::new(lexer.get_remaining_slice());
        let bytes: Result<Vec<u8>> = string_lexer.iter().collect();
        let bytes = bytes?;
        let consumed = string_lexer.get_offset();
        lexer.offset_pos(consumed);
        Ok(Operand::String(bytes))
    } else if word.equals(b"<") {
        let mut hex_lexer = HexStringLexer::new(lexer.get_remaining_slice());
        let bytes: Result<Vec<u8>> = hex_lexer.iter().collect();
        let bytes = bytes?;
        let consumed = hex_lexer.get_offset();
        lexer.offset_pos(consumed);
        Ok(Operand::String(bytes))
    } else if word.is_integer() || word.is_real_number() {
        Ok(Operand::Number(word.to::<f64>()?))
    } else {
        error::UnexpectedLexemeSnafu {
            pos: lexer.get_pos(),
            lexeme: word.to_string(),
            expected: "operand",
        }
        .fail()
    }
}

fn parse_dict_body(lexer: &mut Lexer) -> Result<OperandDict> {
    let mut entries = Vec::new();
    loop {
        let word = lexer.next()?;
        if word.equals(b">>") {
            break;
        }
        if !word.equals(b"/") {
            return error::UnexpectedLexemeSnafu {
                pos: lexer.get_pos(),
                lexeme: word.to_string(),
                expected: "/ or >>",
            }
            .fail();
        }
        let key = lexer.next()?.to_string();
        let value = parse_one(lexer)?;
        entries.push((key, value));
    }
    Ok(OperandDict(entries))
}

fn parse_array_body(lexer: &mut Lexer) -> Result<Vec<Operand>> {
    let mut items = Vec::new();
    loop {
        if lexer.peek()?.equals(b"]") {
            lexer.next()?;
            break;
        }
        items.push(parse_one(lexer)?);
    }
    Ok(items)
}

fn is_ws(b: u8) -> bool {
    matches!(b, b' ' | b'\r' | b'\n' | b'\t' | 0)
}

/// Parses a `BI … ID … EI` inline image (spec §4.3), having already
/// consumed the `BI` token. The search for the terminating `EI` accepts the
/// first whitespace-delimited occurrence, which is what every real-world
/// writer produces (a raw `EI` inside sample data is vanishingly rare and
/// out of scope per §1 — image pixel decoding is an external concern here).
fn parse_inline_image(lexer: &mut Lexer) -> Result<InlineImage> {
    let mut entries = Vec::new();
    loop {
        let word = lexer.next()?;
        if word.equals(b"ID") {
            break;
        }
        if !word.equals(b"/") {
            return error::UnexpectedLexemeSnafu {
                pos: lexer.get_pos(),
                lexeme: word.to_string(),
                expected: "/ or ID",
            }
            .fail();
        }
        let key = lexer.next()?.to_string();
        let value = parse_one(lexer)?;
        entries.push((key, value));
    }

    let remaining = lexer.get_remaining_slice();
    let mut i = 0usize;
    while i + 1 < remaining.len() {
        let preceded_by_ws = i == 0 || is_ws(remaining[i - 1]);
        let followed_by_delim = remaining.get(i + 2).map(|&b| is_ws(b)).unwrap_or(true);
        if preceded_by_ws && remaining[i] == b'E' && remaining[i + 1] == b'I' && followed_by_delim {
            let data_end = if i > 0 { i - 1 } else { 0 };
            let data = remaining[..data_end].to_vec();
            lexer.offset_pos(i + 2);
            return Ok(InlineImage { dict: OperandDict(entries), data });
        }
        i += 1;
    }
    error::ParseSnafu { pos: lexer.get_pos(), reason: "inline image missing EI terminator".to_string() }.fail()
}

/// Tokenizes a whole content stream into operations (spec §4.3): numbers,
/// names, strings, arrays and dicts accumulate as operands until a bare
/// keyword flushes them as one [`Operation`].
pub fn parse_content_stream(data: &[u8]) -> Result<Vec<Operation>> {
    let mut lexer = Lexer::new(data);
    let mut operations = Vec::new();
    let mut operands: Vec<Operand> = Vec::new();

    loop {
        let word = match lexer.next() {
            Ok(w) => w,
            Err(crate::error::PdfError::Eof) => break,
            Err(e) => return Err(e),
        };
        if word.as_slice().is_empty() {
            break;
        }
        if word.equals(b"BI") {
            let inline = parse_inline_image(&mut lexer)?;
            operations.push(Operation {
                operator: "BI".to_string(),
                operands: vec![Operand::InlineImage(Box::new(inline))],
            });
            operands.clear();
            continue;
        }
        match parse_operand_from(word, &mut lexer) {
            Ok(operand) => operands.push(operand),
            Err(_) => {
                // not an operand: it's an operator keyword, flush what we have
                operations.push(Operation {
                    operator: word.to_string(),
                    operands: std::mem::take(&mut operands),
                });
            }
        }
    }
    Ok(operations)
}

fn write_operand(out: &mut Vec<u8>, operand: &Operand) {
    match operand {
        Operand::Number(n) => {
            if n.fract() == 0.0 && n.abs() < 1e15 {
                out.extend_from_slice(format!("{}", *n as i64).as_bytes());
            } else {
                out.extend_from_slice(format!("{n}").as_bytes());
            }
        }
        Operand::Name(n) => {
            out.push(b'/');
            out.extend_from_slice(n.as_bytes());
        }
        Operand::String(s) => {
            out.push(b'(');
            for &b in s {
                if b == b'(' || b == b')' || b == b'\\' {
                    out.push(b'\\');
                }
                out.push(b);
            }
            out.push(b')');
        }
        Operand::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b' ');
                }
                write_operand(out, item);
            }
            out.push(b']');
        }
        Operand::Dict(dict) => {
            out.extend_from_slice(b"<<");
            for (k, v) in &dict.0 {
                out.push(b'/');
                out.extend_from_slice(k.as_bytes());
                out.push(b' ');
                write_operand(out, v);
                out.push(b' ');
            }
            out.extend_from_slice(b">>");
        }
        Operand::InlineImage(_) => {
            // re-serialized by its own BI/ID/EI branch below, never inline
        }
    }
}

/// Writes operations back to content-stream bytes (spec §3 "ContentStream"),
/// the inverse of [`parse_content_stream`]. Used by the editor (C9) after it
/// mutates a page's operation list.
pub fn serialize_operations(ops: &[Operation]) -> Vec<u8> {
    let mut out = Vec::new();
    for op in ops {
        if op.operator == "BI" {
            if let Some(Operand::InlineImage(img)) = op.operands.first() {
                out.extend_from_slice(b"BI ");
                for (k, v) in &img.dict.0 {
                    out.push(b'/');
                    out.extend_from_slice(k.as_bytes());
                    out.push(b' ');
                    write_operand(&mut out, v);
                    out.push(b' ');
                }
                out.extend_from_slice(b"ID ");
                out.extend_from_slice(&img.data);
                out.extend_from_slice(b" EI\n");
            }
            continue;
        }
        for operand in &op.operands {
            write_operand(&mut out, operand);
            out.push(b' ');
        }
        out.extend_from_slice(op.operator.as_bytes());
        out.push(b'\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizes_simple_graphics_ops() {
        let ops = parse_content_stream(b"q 1 0 0 1 10 20 cm 0 0 100 100 re f Q").unwrap();
        assert_eq!(ops.len(), 4);
        assert_eq!(ops[0].operator, "q");
        assert_eq!(ops[1].operator, "cm");
        assert_eq!(ops[1].operands, vec![Operand::Number(1.0), Operand::Number(0.0), Operand::Number(0.0), Operand::Number(1.0), Operand::Number(10.0), Operand::Number(20.0)]);
        assert_eq!(ops[2].operator, "re");
        assert_eq!(ops[3].operator, "Q");
    }

    #[test]
    fn tokenizes_text_show_with_string_and_name_operands() {
        let ops = parse_content_stream(b"BT /F1 12 Tf (Hello) Tj ET").unwrap();
        assert_eq!(ops.len(), 4);
        assert_eq!(ops[1].operator, "Tf");
        assert_eq!(ops[1].operands[0], Operand::Name("F1".to_string()));
        assert_eq!(ops[2].operator, "Tj");
        assert_eq!(ops[2].operands[0], Operand::String(b"Hello".to_vec()));
    }

    #[test]
    fn tokenizes_tj_array_with_kerning_numbers() {
        let ops = parse_content_stream(b"[(A)-120(B)]TJ").unwrap();
        assert_eq!(ops[0].operator, "TJ");
        let arr = ops[0].operands[0].as_array().unwrap();
        assert_eq!(arr, &[Operand::String(b"A".to_vec()), Operand::Number(-120.0), Operand::String(b"B".to_vec())]);
    }

    #[test]
    fn tokenizes_marked_content_with_inline_dict_properties() {
        let ops = parse_content_stream(b"/P <</MCID 3>> BDC (hi) Tj EMC").unwrap();
        assert_eq!(ops[0].operator, "BDC");
        assert_eq!(ops[0].operands[0], Operand::Name("P".to_string()));
        let props = match &ops[0].operands[1] {
            Operand::Dict(d) => d,
            _ => panic!("expected dict"),
        };
        assert_eq!(props.get("MCID"), Some(&Operand::Number(3.0)));
    }

    #[test]
    fn parses_inline_image_as_opaque_blob() {
        let data = b"BI /W 1 /H 1 /BPC 8 /CS /G ID \x7fEI q";
        let ops = parse_content_stream(data).unwrap();
        assert_eq!(ops[0].operator, "BI");
        match &ops[0].operands[0] {
            Operand::InlineImage(img) => {
                assert_eq!(img.data, vec![0x7f]);
                assert_eq!(img.dict.get("W"), Some(&Operand::Number(1.0)));
            }
            other => panic!("expected inline image, got {other:?}"),
        }
        assert_eq!(ops[1].operator, "q");
    }

    #[test]
    fn serialize_then_reparse_round_trips_operations() {
        let ops = parse_content_stream(b"q 1 0 0 1 10 20 cm BT /F1 12 Tf (Hi) Tj ET Q").unwrap();
        let bytes = serialize_operations(&ops);
        let reparsed = parse_content_stream(&bytes).unwrap();
        assert_eq!(ops, reparsed);
    }
}
