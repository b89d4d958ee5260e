/*!
  The textual forms of a program. Programs arrive as comma separated signed decimal integers, and
  can be rendered as a human readable listing for inspection.
*/

use nom::{
  branch::alt,
  character::complete::{char as one_char, digit1, multispace0},
  combinator::{all_consuming, map_res, opt, recognize},
  sequence::{delimited, pair},
  IResult
};

use super::{decode, Mode};
use crate::address::Address;
use crate::error::ParseError;
use crate::Word;

/// A signed decimal integer, e.g. `-12` or `+7`.
fn word_p(input: &str) -> IResult<&str, Word> {
  map_res(
    recognize(pair(opt(alt((one_char('-'), one_char('+')))), digit1)),
    |text: &str| text.parse::<Word>()
  )(input)
}

/// A single comma separated field, with surrounding whitespace allowed.
fn field_p(input: &str) -> IResult<&str, Word> {
  all_consuming(delimited(multispace0, word_p, multispace0))(input)
}

/**
  Parses program text into the words of a program image. Whitespace (spaces, tabs, carriage
  returns and newlines) around the text and around each field is ignored.
*/
pub fn parse_program(text: &str) -> Result<Vec<Word>, ParseError> {
  let text = text.trim();
  if text.is_empty() {
    return Err(ParseError::Empty);
  }

  text
    .split(',')
    .enumerate()
    .map(|(index, field)| {
      field_p(field)
        .map(|(_rest, word)| word)
        .map_err(|_| ParseError::InvalidToken { index: index + 1, text: field.trim().to_string() })
    })
    .collect()
}

fn format_parameter(mode: Mode, value: Word) -> String {
  match mode {
    Mode::Position  => format!("[{}]", value),
    Mode::Immediate => format!("{}", value),
    Mode::Relative  => format!("[rb{:+}]", value)
  }
}

/**
  Renders a linear sweep listing of the program, one line per instruction. Words that do not decode,
  or whose parameters run past the end of the image, are listed as `DATA`. Code and data are
  interleaved freely in Intcode, so the listing is only a guide.
*/
pub fn disassemble(words: &[Word]) -> Vec<String> {
  let mut lines = Vec::new();
  let mut pc: usize = 0;

  while pc < words.len() {
    let address = Address::from(pc);
    match decode(words[pc]) {

      Ok(instruction) if pc + instruction.arity() < words.len() => {
        let parameters: Vec<String> =
          (0..instruction.arity())
            .map(|i| format_parameter(instruction.mode(i), words[pc + 1 + i]))
            .collect();
        match parameters.is_empty() {
          true  => lines.push(format!("{}: {}", address, instruction.opcode)),
          false => lines.push(
            format!("{}: {} {}", address, instruction.opcode, parameters.join(", "))
          )
        }
        pc += instruction.width();
      }

      _ => {
        lines.push(format!("{}: DATA {}", address, words[pc]));
        pc += 1;
      }

    }
  }

  lines
}
