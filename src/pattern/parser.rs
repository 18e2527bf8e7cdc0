//! Pattern language parser
//!
//! A pattern is one or more lines of the form `NAMES(INPUTS, OUTPUTS)`:
//!
//! ```text
//! Conv(?, c0)
//! Sigmoid(c0, s0)
//! Mul([s0, c0], ?)
//! ```
//!
//! - `NAMES` is `?` or one or more op types separated by `/` (`Relu/Clip`).
//! - `INPUTS` and `OUTPUTS` are one slot each: an identifier, `?`, or a
//!   bracketed list of those.
//! - Output identifiers bind variables positionally to the node's outputs.
//!   Input identifiers must name variables bound by an earlier line and match
//!   when the bound tensor appears anywhere among the node's inputs.
//!
//! Whitespace is ignored.

use std::fmt;
use std::str::FromStr;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::error::{OnnxResult, TransformError};

/// Index of a pattern variable in [`Pattern::variables`]
pub type VarId = usize;

/// One entry of an argument slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindSpec {
    /// `?`: matches anything, binds nothing
    Any,
    /// Named variable
    Var(VarId),
}

/// Argument slot: the specs of one `INPUTS` or `OUTPUTS` section
pub type Slot = SmallVec<[BindSpec; 2]>;

/// Operator types accepted by a step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpTypes {
    /// `?`: any operator
    Any,
    /// One of the listed op types
    OneOf(SmallVec<[String; 2]>),
}

impl OpTypes {
    /// Check if `op_type` is accepted
    pub fn accepts(&self, op_type: &str) -> bool {
        match self {
            OpTypes::Any => true,
            OpTypes::OneOf(names) => names.iter().any(|n| n == op_type),
        }
    }
}

/// One parsed pattern line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternStep {
    /// Accepted operator types
    pub op_types: OpTypes,
    /// Input bind specs (containment match)
    pub inputs: Slot,
    /// Output bind specs (positional binding)
    pub outputs: Slot,
    /// Source line with whitespace stripped
    pub line: String,
}

/// A compiled pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    steps: Vec<PatternStep>,
    variables: Vec<String>,
}

impl Pattern {
    /// Parse pattern text
    pub fn parse(text: &str) -> OnnxResult<Self> {
        let mut parser = Parser::default();
        for raw in text.lines() {
            let line: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
            if !line.is_empty() {
                parser.parse_line(line)?;
            }
        }

        if parser.steps.is_empty() {
            return Err(TransformError::EmptyPattern);
        }

        Ok(Self {
            steps: parser.steps,
            variables: parser.variables,
        })
    }

    /// Parsed steps in order
    pub fn steps(&self) -> &[PatternStep] {
        &self.steps
    }

    /// Number of steps (= length of every matched chain)
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Always false for a parsed pattern
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Variable names, indexed by [`VarId`]
    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    /// Whitespace-stripped source lines
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.steps.iter().map(|s| s.line.as_str())
    }
}

impl FromStr for Pattern {
    type Err = TransformError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, line) in self.lines().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{line}")?;
        }
        Ok(())
    }
}

// ============================================================================
// Lexer
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token<'a> {
    Ident(&'a str),
    LBracket,
    RBracket,
    Comma,
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '?'
}

fn tokenize<'a>(line: &str, args: &'a str) -> OnnxResult<Vec<Token<'a>>> {
    let mut tokens = Vec::new();
    let mut chars = args.char_indices().peekable();

    while let Some((start, c)) = chars.next() {
        let token = match c {
            '[' => Token::LBracket,
            ']' => Token::RBracket,
            ',' => Token::Comma,
            c if is_ident_char(c) => {
                let mut end = start + c.len_utf8();
                while let Some(&(i, next)) = chars.peek() {
                    if !is_ident_char(next) {
                        break;
                    }
                    end = i + next.len_utf8();
                    chars.next();
                }
                let ident = &args[start..end];
                if ident.contains('?') && ident != "?" {
                    return Err(TransformError::syntax(
                        line,
                        format!("invalid identifier '{ident}'"),
                    ));
                }
                Token::Ident(ident)
            }
            other => {
                return Err(TransformError::syntax(
                    line,
                    format!("unexpected character '{other}'"),
                ))
            }
        };
        tokens.push(token);
    }

    Ok(tokens)
}

// ============================================================================
// Parser
// ============================================================================

#[derive(Default)]
struct Parser {
    steps: Vec<PatternStep>,
    variables: Vec<String>,
    var_ids: FxHashMap<String, VarId>,
}

impl Parser {
    fn parse_line(&mut self, line: String) -> OnnxResult<()> {
        let (names, args) = split_line(&line)?;
        let op_types = parse_op_types(&line, names)?;

        let tokens = tokenize(&line, args)?;
        let slots = parse_slots(&line, &tokens)?;
        let [inputs, outputs]: [Vec<&str>; 2] = slots.try_into().map_err(|slots: Vec<_>| {
            TransformError::syntax(
                &line,
                format!("expected 2 argument slots, found {}", slots.len()),
            )
        })?;

        // Inputs may only reference variables bound by earlier lines
        let inputs = inputs
            .into_iter()
            .map(|name| match name {
                "?" => Ok(BindSpec::Any),
                name => self
                    .var_ids
                    .get(name)
                    .map(|&id| BindSpec::Var(id))
                    .ok_or_else(|| TransformError::UnboundVariable {
                        variable: name.to_string(),
                        line: line.clone(),
                    }),
            })
            .collect::<OnnxResult<Slot>>()?;

        let outputs = outputs
            .into_iter()
            .map(|name| match name {
                "?" => BindSpec::Any,
                name => BindSpec::Var(self.intern(name)),
            })
            .collect();

        self.steps.push(PatternStep {
            op_types,
            inputs,
            outputs,
            line,
        });
        Ok(())
    }

    fn intern(&mut self, name: &str) -> VarId {
        if let Some(&id) = self.var_ids.get(name) {
            return id;
        }
        let id = self.variables.len();
        self.variables.push(name.to_string());
        self.var_ids.insert(name.to_string(), id);
        id
    }
}

/// Split `NAMES(ARGS)` into its two parts
fn split_line(line: &str) -> OnnxResult<(&str, &str)> {
    let shape_error = || TransformError::syntax(line, "expected NAME(INPUTS, OUTPUTS)");

    let open = line.find('(').ok_or_else(shape_error)?;
    let args = line[open + 1..].strip_suffix(')').ok_or_else(shape_error)?;
    let names = &line[..open];
    if names.is_empty() || args.is_empty() {
        return Err(shape_error());
    }
    Ok((names, args))
}

fn parse_op_types(line: &str, names: &str) -> OnnxResult<OpTypes> {
    let mut accepted: SmallVec<[String; 2]> = SmallVec::new();
    let mut any = false;

    for name in names.split('/') {
        if name.is_empty() {
            return Err(TransformError::syntax(line, "empty operator name"));
        }
        if let Some(bad) = name.chars().find(|c| "()[],".contains(*c)) {
            return Err(TransformError::syntax(
                line,
                format!("unexpected character '{bad}' in operator name"),
            ));
        }
        if name == "?" {
            any = true;
        } else {
            accepted.push(name.to_string());
        }
    }

    Ok(if any {
        OpTypes::Any
    } else {
        OpTypes::OneOf(accepted)
    })
}

fn parse_slots<'a>(line: &str, tokens: &[Token<'a>]) -> OnnxResult<Vec<Vec<&'a str>>> {
    let mut slots = Vec::new();
    let mut iter = tokens.iter().copied();

    loop {
        let slot = match iter.next() {
            Some(Token::Ident(name)) => vec![name],
            Some(Token::LBracket) => parse_list(line, &mut iter)?,
            Some(Token::Comma) | Some(Token::RBracket) | None => {
                return Err(TransformError::syntax(line, "empty argument slot"))
            }
        };
        slots.push(slot);

        match iter.next() {
            None => return Ok(slots),
            Some(Token::Comma) => continue,
            Some(token) => {
                return Err(TransformError::syntax(
                    line,
                    format!("unexpected token {token:?} after argument"),
                ))
            }
        }
    }
}

fn parse_list<'a, I>(line: &str, iter: &mut I) -> OnnxResult<Vec<&'a str>>
where
    I: Iterator<Item = Token<'a>>,
{
    let mut items = Vec::new();

    loop {
        match iter.next() {
            Some(Token::Ident(name)) => items.push(name),
            None => return Err(TransformError::syntax(line, "unterminated list")),
            Some(_) => return Err(TransformError::syntax(line, "empty list entry")),
        }

        match iter.next() {
            Some(Token::Comma) => continue,
            Some(Token::RBracket) => return Ok(items),
            None => return Err(TransformError::syntax(line, "unterminated list")),
            Some(token) => {
                return Err(TransformError::syntax(
                    line,
                    format!("unexpected token {token:?} in list"),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn syntax_reason(text: &str) -> String {
        match Pattern::parse(text) {
            Err(TransformError::PatternSyntax { reason, .. }) => reason,
            other => panic!("expected syntax error, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_simple_chain() {
        let pattern = Pattern::parse(
            "
            Conv(?, c0)
            Sigmoid(c0, s0)
            Mul([s0, c0], ?)
            ",
        )
        .unwrap();

        assert_eq!(pattern.len(), 3);
        assert_eq!(pattern.variables(), &["c0", "s0"]);

        let steps = pattern.steps();
        assert!(steps[0].op_types.accepts("Conv"));
        assert!(!steps[0].op_types.accepts("Relu"));
        assert_eq!(steps[0].inputs.as_slice(), &[BindSpec::Any]);
        assert_eq!(steps[0].outputs.as_slice(), &[BindSpec::Var(0)]);
        assert_eq!(steps[1].inputs.as_slice(), &[BindSpec::Var(0)]);
        assert_eq!(
            steps[2].inputs.as_slice(),
            &[BindSpec::Var(1), BindSpec::Var(0)]
        );
        assert_eq!(steps[2].outputs.as_slice(), &[BindSpec::Any]);
    }

    #[test]
    fn test_alternation_and_wildcard_types() {
        let pattern = Pattern::parse("Relu/Clip(?, a)\n?(a, ?)").unwrap();

        let first = &pattern.steps()[0].op_types;
        assert!(first.accepts("Relu"));
        assert!(first.accepts("Clip"));
        assert!(!first.accepts("Sigmoid"));
        assert_eq!(pattern.steps()[1].op_types, OpTypes::Any);
        assert!(pattern.steps()[1].op_types.accepts("Anything"));
    }

    #[test]
    fn test_whitespace_is_insignificant() {
        let spaced = Pattern::parse("  Conv ( ? , [ a , b ] )\n\n\t").unwrap();
        let packed = Pattern::parse("Conv(?,[a,b])").unwrap();
        assert_eq!(spaced, packed);
        assert_eq!(spaced.to_string(), "Conv(?,[a,b])");
    }

    #[test]
    fn test_display_lists_lines() {
        let pattern = Pattern::parse("Sigmoid(?, x0)\nMul(x0, ?)").unwrap();
        assert_eq!(pattern.to_string(), "Sigmoid(?,x0)\nMul(x0,?)");
        let parsed: Pattern = "Sigmoid(?,x0)\nMul(x0,?)".parse().unwrap();
        assert_eq!(parsed, pattern);
    }

    #[test]
    fn test_empty_pattern() {
        assert!(matches!(
            Pattern::parse("  \n \n"),
            Err(TransformError::EmptyPattern)
        ));
    }

    #[test]
    fn test_malformed_line() {
        assert_eq!(syntax_reason("Conv ?, ?"), "expected NAME(INPUTS, OUTPUTS)");
        assert_eq!(syntax_reason("(?, ?)"), "expected NAME(INPUTS, OUTPUTS)");
        assert_eq!(syntax_reason("Conv()"), "expected NAME(INPUTS, OUTPUTS)");
        assert_eq!(syntax_reason("Conv(?, ?)x"), "expected NAME(INPUTS, OUTPUTS)");
    }

    #[test]
    fn test_wrong_slot_count() {
        assert_eq!(syntax_reason("Conv(?)"), "expected 2 argument slots, found 1");
        assert_eq!(
            syntax_reason("Conv(?, ?, ?)"),
            "expected 2 argument slots, found 3"
        );
    }

    #[test]
    fn test_unterminated_list() {
        assert_eq!(syntax_reason("Mul([a, b, ?)"), "unterminated list");
        assert_eq!(syntax_reason("Mul([a, ?)"), "unterminated list");
    }

    #[test]
    fn test_bad_tokens() {
        assert_eq!(syntax_reason("Mul(a-b, ?)"), "unexpected character '-'");
        assert_eq!(syntax_reason("Mul(?, a?)"), "invalid identifier 'a?'");
        assert_eq!(syntax_reason("Mul(, ?)"), "empty argument slot");
        assert_eq!(syntax_reason("Mul([], ?)"), "empty list entry");
        assert_eq!(syntax_reason("Relu//Clip(?, ?)"), "empty operator name");
    }

    #[test]
    fn test_error_reports_offending_line() {
        let err = Pattern::parse("Conv(?, a)\nRelu(a)").unwrap_err();
        match err {
            TransformError::PatternSyntax { line, .. } => assert_eq!(line, "Relu(a)"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_unbound_variable_rejected_at_parse_time() {
        let err = Pattern::parse("Conv(?, a)\nMul([a, b], ?)").unwrap_err();
        match err {
            TransformError::UnboundVariable { variable, line } => {
                assert_eq!(variable, "b");
                assert_eq!(line, "Mul([a,b],?)");
            }
            other => panic!("unexpected error {other:?}"),
        }

        // A line cannot consume its own outputs
        assert!(matches!(
            Pattern::parse("Relu(x, x)"),
            Err(TransformError::UnboundVariable { .. })
        ));
    }

    #[test]
    fn test_rebinding_reuses_variable() {
        let pattern = Pattern::parse("Split(?, [a, b])\nAdd([a, b], a)").unwrap();
        assert_eq!(pattern.variables(), &["a", "b"]);
        assert_eq!(pattern.steps()[1].outputs.as_slice(), &[BindSpec::Var(0)]);
    }
}
