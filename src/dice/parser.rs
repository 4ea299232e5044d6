//! Recursive-descent parser from dice notation text to an [Expr] tree.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::{DiceError, MAX_DICE_PER_TERM};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    Eq,
    Gt,
    Ge,
    Lt,
    Le,
}

/// A face test such as `=20` or `>=19`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparePoint {
    pub op: CompareOp,
    pub value: i64,
}

impl ComparePoint {
    pub const fn equals(value: i64) -> Self {
        Self {
            op: CompareOp::Eq,
            value,
        }
    }

    pub fn matches(&self, face: i64) -> bool {
        match self.op {
            CompareOp::Eq => face == self.value,
            CompareOp::Gt => face > self.value,
            CompareOp::Ge => face >= self.value,
            CompareOp::Lt => face < self.value,
            CompareOp::Le => face <= self.value,
        }
    }
}

/// Which faces of a die term count as critical successes or failures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CriticalRange {
    pub success: Option<ComparePoint>,
    pub failure: Option<ComparePoint>,
}

impl CriticalRange {
    /// Natural 20 / natural 1 on a d20, nothing on other dice.
    pub fn default_for(sides: u32) -> Self {
        if sides == 20 {
            Self {
                success: Some(ComparePoint::equals(20)),
                failure: Some(ComparePoint::equals(1)),
            }
        } else {
            Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Keep {
    Highest(u32),
    Lowest(u32),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceTerm {
    pub count: u32,
    pub sides: u32,
    pub keep: Option<Keep>,
    pub critical: CriticalRange,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Expr {
    Number(i64),
    Var(String),
    Dice(DiceTerm),
    Group(Box<Expr>),
    Neg(Box<Expr>),
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
}

impl Expr {
    /// Names of every variable referenced anywhere in the tree.
    pub fn variables(&self) -> BTreeSet<&str> {
        let mut names = BTreeSet::new();
        self.collect_variables(&mut names);
        names
    }

    fn collect_variables<'a>(&'a self, names: &mut BTreeSet<&'a str>) {
        match self {
            Expr::Number(_) | Expr::Dice(_) => {}
            Expr::Var(name) => {
                names.insert(name.as_str());
            }
            Expr::Group(inner) | Expr::Neg(inner) => inner.collect_variables(names),
            Expr::Binary { lhs, rhs, .. } => {
                lhs.collect_variables(names);
                rhs.collect_variables(names);
            }
        }
    }
}

/// Parse dice notation into an expression tree.
pub fn parse(expression: &str) -> Result<Expr, DiceError> {
    let mut parser = Parser {
        source: expression,
        bytes: expression.as_bytes(),
        pos: 0,
    };
    parser.skip_ws();
    if parser.at_end() {
        return Err(DiceError::Empty);
    }
    let expr = parser.expr()?;
    parser.skip_ws();
    if !parser.at_end() {
        return Err(parser.unexpected());
    }
    Ok(expr)
}

/// True when `name` is usable as a variable: an identifier that does not read as a die.
pub fn is_valid_identifier(name: &str) -> bool {
    let bytes = name.as_bytes();
    let Some(first) = bytes.first() else {
        return false;
    };
    if !(first.is_ascii_alphabetic() || *first == b'_') {
        return false;
    }
    if !bytes.iter().all(|b| b.is_ascii_alphanumeric() || *b == b'_') {
        return false;
    }
    !starts_die(bytes, 0)
}

fn starts_die(bytes: &[u8], pos: usize) -> bool {
    matches!(bytes.get(pos), Some(b'd' | b'D'))
        && matches!(bytes.get(pos + 1), Some(b) if b.is_ascii_digit() || *b == b'%')
}

struct Parser<'a> {
    source: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl Parser<'_> {
    fn expr(&mut self) -> Result<Expr, DiceError> {
        let mut lhs = self.term()?;
        loop {
            self.skip_ws();
            let op = match self.peek() {
                Some(b'+') => BinaryOp::Add,
                Some(b'-') => BinaryOp::Sub,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.term()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
    }

    fn term(&mut self) -> Result<Expr, DiceError> {
        let mut lhs = self.unary()?;
        loop {
            self.skip_ws();
            let op = match self.peek() {
                Some(b'*') => BinaryOp::Mul,
                Some(b'/') => BinaryOp::Div,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.unary()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
    }

    fn unary(&mut self) -> Result<Expr, DiceError> {
        self.skip_ws();
        if self.peek() == Some(b'-') {
            self.pos += 1;
            return Ok(Expr::Neg(Box::new(self.unary()?)));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Expr, DiceError> {
        self.skip_ws();
        match self.peek() {
            None => Err(DiceError::UnexpectedEnd(self.source.to_string())),
            Some(b'(') => {
                self.pos += 1;
                let inner = self.expr()?;
                self.skip_ws();
                match self.peek() {
                    Some(b')') => {
                        self.pos += 1;
                        Ok(Expr::Group(Box::new(inner)))
                    }
                    None => Err(DiceError::UnexpectedEnd(self.source.to_string())),
                    Some(_) => Err(self.unexpected()),
                }
            }
            Some(b) if b.is_ascii_digit() => {
                let start = self.pos;
                let value = self.number()?;
                if starts_die(self.bytes, self.pos) {
                    let count = u32::try_from(value)
                        .ok()
                        .filter(|count| (1..=MAX_DICE_PER_TERM).contains(count))
                        .ok_or_else(|| DiceError::InvalidDiceCount {
                            expression: self.source[start..].to_string(),
                        })?;
                    self.dice(count)
                } else {
                    Ok(Expr::Number(value))
                }
            }
            Some(_) if starts_die(self.bytes, self.pos) => self.dice(1),
            Some(b) if b.is_ascii_alphabetic() || b == b'_' => {
                let start = self.pos;
                while matches!(self.peek(), Some(b) if b.is_ascii_alphanumeric() || b == b'_') {
                    self.pos += 1;
                }
                Ok(Expr::Var(self.source[start..self.pos].to_string()))
            }
            Some(_) => Err(self.unexpected()),
        }
    }

    /// Parses from the `d` of a die term; `count` has already been consumed.
    fn dice(&mut self, count: u32) -> Result<Expr, DiceError> {
        self.pos += 1;
        let sides = if self.peek() == Some(b'%') {
            self.pos += 1;
            100
        } else {
            let raw = self.number()?;
            u32::try_from(raw).map_err(|_| DiceError::NumberOutOfRange {
                offset: self.pos,
                expression: self.source.to_string(),
            })?
        };
        if sides == 0 {
            return Err(DiceError::ZeroSides(self.source.to_string()));
        }

        let mut keep = None;
        let mut critical = CriticalRange::default_for(sides);
        loop {
            match (self.peek_lower(), self.peek_lower_at(1)) {
                (Some(b'k'), Some(b'h')) => {
                    self.pos += 2;
                    keep = Some(Keep::Highest(self.keep_count()?));
                }
                (Some(b'k'), Some(b'l')) => {
                    self.pos += 2;
                    keep = Some(Keep::Lowest(self.keep_count()?));
                }
                (Some(b'k'), Some(b)) if b.is_ascii_digit() => {
                    self.pos += 1;
                    keep = Some(Keep::Highest(self.keep_count()?));
                }
                (Some(b'c'), Some(b's')) => {
                    self.pos += 2;
                    critical.success = Some(self.compare_point()?);
                }
                (Some(b'c'), Some(b'f')) => {
                    self.pos += 2;
                    critical.failure = Some(self.compare_point()?);
                }
                _ => break,
            }
        }

        if let Some(Keep::Highest(kept) | Keep::Lowest(kept)) = keep {
            if kept > count {
                return Err(DiceError::InvalidKeepCount {
                    keep: kept,
                    count,
                    expression: self.source.to_string(),
                });
            }
        }

        Ok(Expr::Dice(DiceTerm {
            count,
            sides,
            keep,
            critical,
        }))
    }

    fn keep_count(&mut self) -> Result<u32, DiceError> {
        let offset = self.pos;
        let raw = self.number()?;
        u32::try_from(raw).map_err(|_| DiceError::NumberOutOfRange {
            offset,
            expression: self.source.to_string(),
        })
    }

    fn compare_point(&mut self) -> Result<ComparePoint, DiceError> {
        let op = match (self.peek(), self.peek_at(1)) {
            (Some(b'>'), Some(b'=')) => {
                self.pos += 2;
                CompareOp::Ge
            }
            (Some(b'<'), Some(b'=')) => {
                self.pos += 2;
                CompareOp::Le
            }
            (Some(b'>'), _) => {
                self.pos += 1;
                CompareOp::Gt
            }
            (Some(b'<'), _) => {
                self.pos += 1;
                CompareOp::Lt
            }
            (Some(b'='), _) => {
                self.pos += 1;
                CompareOp::Eq
            }
            _ => CompareOp::Eq,
        };
        let value = self.number()?;
        Ok(ComparePoint { op, value })
    }

    fn number(&mut self) -> Result<i64, DiceError> {
        let start = self.pos;
        while matches!(self.peek(), Some(b) if b.is_ascii_digit()) {
            self.pos += 1;
        }
        if start == self.pos {
            return Err(match self.peek() {
                None => DiceError::UnexpectedEnd(self.source.to_string()),
                Some(_) => self.unexpected(),
            });
        }
        self.source[start..self.pos]
            .parse::<i64>()
            .map_err(|_| DiceError::NumberOutOfRange {
                offset: start,
                expression: self.source.to_string(),
            })
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(b) if b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek_at(&self, ahead: usize) -> Option<u8> {
        self.bytes.get(self.pos + ahead).copied()
    }

    fn peek_lower(&self) -> Option<u8> {
        self.peek().map(|b| b.to_ascii_lowercase())
    }

    fn peek_lower_at(&self, ahead: usize) -> Option<u8> {
        self.peek_at(ahead).map(|b| b.to_ascii_lowercase())
    }

    fn unexpected(&self) -> DiceError {
        let found = self.source[self.pos..].chars().next().unwrap_or('?');
        DiceError::UnexpectedChar {
            found,
            offset: self.pos,
            expression: self.source.to_string(),
        }
    }
}
