//! Recursive-descent parsing of [`Primitive`] values out of a [`Lexer`]
//! token stream (spec §4, raw IR). Adapted from the teacher's
//! `parser/mod.rs`; the indirect-object/stream header handling that used to
//! live here moves to [`crate::xref`] and [`crate::file`], which know about
//! the surrounding `N G obj ... endobj` wrapper.

pub mod lexer;
pub mod parse_xref;

pub use lexer::Lexer;

use crate::error::{self, Result};
use crate::object::{Dictionary, GenNr, ObjNr, PdfStream, PlainRef, Primitive, Resolve};
use lexer::{HexStringLexer, StringLexer};

/// Parses one `Primitive` from `data`. Can parse a stream only if its
/// `/Length` is a direct integer — see [`parse_indirect_object`] for the
/// general case where `/Length` is itself an indirect reference.
pub fn parse(data: &[u8], resolve: &dyn Resolve) -> Result<Primitive> {
    parse_with_lexer(&mut Lexer::new(data), resolve)
}

pub fn parse_with_lexer(lexer: &mut Lexer, resolve: &dyn Resolve) -> Result<Primitive> {
    let first_lexeme = lexer.next()?;

    let obj = if first_lexeme.equals(b"<<") {
        let dict = parse_dict_body(lexer, resolve)?;
        if lexer.peek()?.equals(b"stream") {
            lexer.next()?;
            Primitive::Stream(parse_stream_body(lexer, resolve, dict)?)
        } else {
            Primitive::Dictionary(dict)
        }
    } else if first_lexeme.is_integer() {
        let pos_bk = lexer.get_pos();
        let second = lexer.next()?;
        if second.is_integer() {
            let third = lexer.next()?;
            if third.equals(b"R") {
                Primitive::Reference(PlainRef {
                    id: first_lexeme.to::<ObjNr>()?,
                    gen: second.to::<GenNr>()?,
                })
            } else {
                lexer.set_pos(pos_bk);
                Primitive::Integer(first_lexeme.to::<i64>()?)
            }
        } else {
            lexer.set_pos(pos_bk);
            Primitive::Integer(first_lexeme.to::<i64>()?)
        }
    } else if first_lexeme.is_real_number() {
        Primitive::Number(first_lexeme.to::<f64>()?)
    } else if first_lexeme.equals(b"/") {
        Primitive::Name(lexer.next()?.to_string())
    } else if first_lexeme.equals(b"[") {
        let mut array = Vec::new();
        loop {
            if lexer.peek()?.equals(b"]") {
                lexer.next()?;
                break;
            }
            array.push(parse_with_lexer(lexer, resolve)?);
        }
        Primitive::Array(array)
    } else if first_lexeme.equals(b"(") {
        let mut string_lexer = StringLexer::new(lexer.get_remaining_slice());
        let string: Result<Vec<u8>> = string_lexer.iter().collect();
        let string = string?;
        let consumed = string_lexer.get_offset();
        lexer.offset_pos(consumed);
        Primitive::String(string)
    } else if first_lexeme.equals(b"<") {
        let mut hex_lexer = HexStringLexer::new(lexer.get_remaining_slice());
        let string: Result<Vec<u8>> = hex_lexer.iter().collect();
        let string = string?;
        let consumed = hex_lexer.get_offset();
        lexer.offset_pos(consumed);
        Primitive::String(string)
    } else if first_lexeme.equals(b"true") {
        Primitive::Bool(true)
    } else if first_lexeme.equals(b"false") {
        Primitive::Bool(false)
    } else if first_lexeme.equals(b"null") {
        Primitive::Null
    } else {
        return error::UnknownTypeSnafu {
            pos: lexer.get_pos(),
            first_lexeme: first_lexeme.to_string(),
        }
        .fail();
    };

    Ok(obj)
}

fn parse_dict_body(lexer: &mut Lexer, resolve: &dyn Resolve) -> Result<Dictionary> {
    let mut dict = Dictionary::new();
    loop {
        let delimiter = lexer.next()?;
        if delimiter.equals(b"/") {
            let key = lexer.next()?.to_string();
            let value = parse_with_lexer(lexer, resolve)?;
            dict.insert(key, value);
        } else if delimiter.equals(b">>") {
            break;
        } else {
            return error::UnexpectedLexemeSnafu {
                pos: lexer.get_pos(),
                lexeme: delimiter.to_string(),
                expected: "/ or >>",
            }
            .fail();
        }
    }
    Ok(dict)
}

fn stream_length(dict: &Dictionary, resolve: &dyn Resolve) -> Result<usize> {
    match dict.get("Length") {
        Some(Primitive::Integer(n)) => Ok(*n as usize),
        Some(Primitive::Reference(r)) => Ok(resolve.resolve(*r)?.as_integer()? as usize),
        Some(_) | None => error::MissingEntrySnafu {
            typ: "<Stream>",
            field: "Length",
        }
        .fail(),
    }
}

fn parse_stream_body(lexer: &mut Lexer, resolve: &dyn Resolve, dict: Dictionary) -> Result<PdfStream> {
    let length = stream_length(&dict, resolve)?;
    let data = lexer.offset_pos(length).to_vec();
    lexer.next_expect("endstream")?;
    Ok(PdfStream { info: dict, data })
}

/// Parses a stream directly, requiring the input to start with `<<`.
pub fn parse_stream(data: &[u8], resolve: &dyn Resolve) -> Result<PdfStream> {
    let mut lexer = Lexer::new(data);
    lexer.next_expect("<<")?;
    let dict = parse_dict_body(&mut lexer, resolve)?;
    lexer.next_expect("stream")?;
    parse_stream_body(&mut lexer, resolve, dict)
}

/// Parses one `N G obj ... endobj` wrapper, returning the object's id,
/// generation and body.
pub fn parse_indirect_object(lexer: &mut Lexer, resolve: &dyn Resolve) -> Result<(ObjNr, GenNr, Primitive)> {
    let id = lexer.next_as::<ObjNr>()?;
    let gen = lexer.next_as::<GenNr>()?;
    lexer.next_expect("obj")?;
    let obj = parse_with_lexer(lexer, resolve)?;
    // `endobj` is tolerated-but-not-required: some writers omit it when the
    // object's length already unambiguously ends the body (see spec §4,
    // Non-goals — this parser favors recovering a malformed-but-common file
    // over rejecting it).
    let checkpoint = lexer.get_pos();
    match lexer.next() {
        Ok(word) if word.equals(b"endobj") => {}
        _ => lexer.set_pos(checkpoint),
    }
    Ok((id, gen, obj))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::NoResolve;

    #[test]
    fn parses_flat_dictionary() {
        let data = b"<< /Type /Catalog /Pages 2 0 R >>";
        let obj = parse(data, &NoResolve).unwrap();
        let dict = obj.into_dictionary().unwrap();
        assert_eq!(dict.get("Type").unwrap().as_name().unwrap(), "Catalog");
        assert!(matches!(dict.get("Pages").unwrap(), Primitive::Reference(_)));
    }

    #[test]
    fn parses_nested_array_and_numbers() {
        let data = b"[1 2.5 -3 /Foo (bar) ]";
        let obj = parse(data, &NoResolve).unwrap();
        let array = obj.into_array().unwrap();
        assert_eq!(array.len(), 5);
        assert_eq!(array[0], Primitive::Integer(1));
        assert_eq!(array[1], Primitive::Number(2.5));
        assert_eq!(array[2], Primitive::Integer(-3));
    }

    #[test]
    fn parses_stream_with_direct_length() {
        let data = b"<< /Length 5 >>\nstream\nhello\nendstream";
        let obj = parse(data, &NoResolve).unwrap();
        let stream = obj.into_stream().unwrap();
        assert_eq!(stream.data, b"hello");
    }

    #[test]
    fn integer_followed_by_non_reference_rolls_back() {
        let data = b"[1 2 3]";
        let obj = parse(data, &NoResolve).unwrap();
        let array = obj.into_array().unwrap();
        assert_eq!(array, vec![Primitive::Integer(1), Primitive::Integer(2), Primitive::Integer(3)]);
    }
}
