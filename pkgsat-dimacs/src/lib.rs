//! DIMACS CNF writer and external solver model parser for the pkgsat solver.
//!
//! The writer exports a problem in the conventional `p cnf` format so that an
//! external SAT solver can decide it. The [`ModelParser`] reads such a
//! solver's output back: either competition style (a line starting with `SAT`
//! followed by whitespace separated signed integers terminated by `0`) or
//! value lines prefixed with `v`.

use std::{borrow::Borrow, io};

use pkgsat_formula::{CnfFormula, Lit, Var};

use anyhow::Error;
use thiserror::Error;

/// Possible errors while parsing the model output of an external SAT solver.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("solver reported the problem as unsatisfiable")]
    Unsat,
    #[error("line {}: invalid literal in solver output: '{}'", line, token)]
    InvalidLiteral { line: usize, token: String },
    #[error("line {}: literal index is too large: {}", line, index)]
    LiteralTooLarge { line: usize, index: usize },
    #[error("solver output ended before the model was terminated")]
    IncompleteModel,
}

/// Variable and clause count of a DIMACS CNF header.
#[derive(Copy, Clone, Debug)]
pub struct DimacsHeader {
    pub var_count: usize,
    pub clause_count: usize,
}

/// Write a DIMACS CNF header.
///
/// Can be combined with [`write_dimacs_clauses`] for incremental writing.
pub fn write_dimacs_header(target: &mut impl io::Write, header: DimacsHeader) -> io::Result<()> {
    writeln!(
        target,
        "p cnf {var_count} {clause_count}",
        var_count = header.var_count,
        clause_count = header.clause_count
    )
}

/// Write an iterator of clauses as headerless DIMACS CNF.
///
/// Each clause is written as the signed 1-based indices of its literals,
/// terminated by `0`.
pub fn write_dimacs_clauses(
    target: &mut impl io::Write,
    clauses: impl IntoIterator<Item = impl IntoIterator<Item = impl Borrow<Lit>>>,
) -> io::Result<()> {
    for clause in clauses.into_iter() {
        for lit in clause.into_iter() {
            itoa::write(&mut *target, lit.borrow().to_dimacs())?;
            target.write_all(b" ")?;
        }
        target.write_all(b"0\n")?;
    }
    Ok(())
}

/// Write a formula as DIMACS CNF.
pub fn write_dimacs(target: &mut impl io::Write, formula: &CnfFormula) -> io::Result<()> {
    write_dimacs_header(
        &mut *target,
        DimacsHeader {
            var_count: formula.var_count(),
            clause_count: formula.len(),
        },
    )?;
    write_dimacs_clauses(&mut *target, formula.iter())
}

/// Parser for the model output of an external SAT solver.
///
/// Collects the valued literals of the model until the terminating `0` is
/// seen. Lines that are neither part of the model nor recognised markers are
/// skipped, as are tokens that do not start a signed integer; solvers prefix
/// comments and timing output freely.
#[derive(Default)]
pub struct ModelParser {
    lits: Vec<Lit>,
    in_values: bool,
    done: bool,
    line_number: usize,
}

impl ModelParser {
    /// Create a new model parser.
    pub fn new() -> ModelParser {
        ModelParser::default()
    }

    /// Parse the complete output of an external solver.
    ///
    /// Returns the model as a list of valued literals, using the signed
    /// 1-based DIMACS convention.
    pub fn parse(input: impl io::Read) -> Result<Vec<Lit>, Error> {
        use io::BufRead;

        let mut parser = ModelParser::new();
        for line in io::BufReader::new(input).lines() {
            parser.parse_line(&line?)?;
        }
        parser.finish().map_err(Error::from)
    }

    /// Parse a single line of solver output.
    pub fn parse_line(&mut self, line: &str) -> Result<(), ModelError> {
        self.line_number += 1;
        if self.done {
            return Ok(());
        }

        let line = line.trim_start();

        if line.starts_with("UNSAT") || line.starts_with("s UNSATISFIABLE") {
            return Err(ModelError::Unsat);
        }

        if let Some(rest) = strip_value_prefix(line) {
            self.parse_values(rest)
        } else if line.starts_with("SAT") {
            // Competition style: everything after the marker is model values.
            self.in_values = true;
            self.parse_values(&line[3..])
        } else if self.in_values {
            self.parse_values(line)
        } else {
            // Comments, status lines and other solver chatter.
            Ok(())
        }
    }

    /// Finish parsing and return the collected model.
    pub fn finish(self) -> Result<Vec<Lit>, ModelError> {
        if self.done {
            Ok(self.lits)
        } else {
            Err(ModelError::IncompleteModel)
        }
    }

    fn parse_values(&mut self, input: &str) -> Result<(), ModelError> {
        for token in input.split_whitespace() {
            if self.done {
                break;
            }
            if !token.starts_with('-') && !token.starts_with(|c: char| c.is_ascii_digit()) {
                // Unexpected token, skip it like any other solver chatter.
                continue;
            }
            let number: isize = match token.parse() {
                Ok(number) => number,
                Err(_) => {
                    return Err(ModelError::InvalidLiteral {
                        line: self.line_number,
                        token: token.to_owned(),
                    });
                }
            };
            if number == 0 {
                self.done = true;
            } else {
                let index = number.unsigned_abs();
                if index > Var::max_count() {
                    return Err(ModelError::LiteralTooLarge {
                        line: self.line_number,
                        index,
                    });
                }
                self.lits.push(Lit::from_dimacs(number));
            }
        }
        Ok(())
    }
}

fn strip_value_prefix(line: &str) -> Option<&str> {
    let rest = line.strip_prefix('v')?;
    if rest.is_empty() || rest.starts_with(' ') || rest.starts_with('\t') {
        Some(rest)
    } else {
        None
    }
}
