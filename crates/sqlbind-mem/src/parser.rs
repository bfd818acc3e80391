//! Parser for the SQL subset the engine executes.
//!
//! Covers what the default generator emits plus the plain SELECTs used
//! through freeform queries: single-table SELECT (with `COUNT(*)`, WHERE,
//! ORDER BY, LIMIT/OFFSET), INSERT, UPDATE (including `col = col + n`
//! assignments) and DELETE. Parameters are `?` (positional) or `$n`.

use sqlbind_core::{Error, Result, Value};

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Number(String),
    Str(String),
    /// `?` (None) or `$n` (Some(n), 1-based)
    Param(Option<usize>),
    Symbol(char),
    Op(&'static str),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Operand {
    /// Zero-based index into the bind values
    Param(usize),
    Literal(Value),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Pred {
    Cmp {
        column: String,
        op: CmpOp,
        operand: Operand,
    },
    Like {
        column: String,
        operand: Operand,
    },
    IsNull {
        column: String,
        negated: bool,
    },
    And(Vec<Pred>),
    Or(Vec<Pred>),
    Not(Box<Pred>),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Projection {
    All,
    Count,
    Columns(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Select {
    pub projection: Projection,
    pub table: String,
    pub predicate: Option<Pred>,
    /// (column, ascending)
    pub order_by: Vec<(String, bool)>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Insert {
    pub table: String,
    pub columns: Vec<String>,
    pub values: Vec<Operand>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Assignment {
    Set { column: String, operand: Operand },
    /// `col = col + n`
    Increment { column: String, amount: i64 },
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Update {
    pub table: String,
    pub assignments: Vec<Assignment>,
    pub predicate: Option<Pred>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Delete {
    pub table: String,
    pub predicate: Option<Pred>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Command {
    Select(Select),
    Insert(Insert),
    Update(Update),
    Delete(Delete),
}

impl Command {
    pub(crate) fn is_write(&self) -> bool {
        !matches!(self, Command::Select(_))
    }
}

fn unexpected(what: impl std::fmt::Display, sql: &str) -> Error {
    Error::query_with_sql(format!("unexpected {what}"), sql)
}

fn tokenize(sql: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = sql.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
        } else if c == '\'' {
            let mut s = String::new();
            i += 1;
            loop {
                match chars.get(i) {
                    Some('\'') if chars.get(i + 1) == Some(&'\'') => {
                        s.push('\'');
                        i += 2;
                    }
                    Some('\'') => {
                        i += 1;
                        break;
                    }
                    Some(&ch) => {
                        s.push(ch);
                        i += 1;
                    }
                    None => return Err(unexpected("end of string literal", sql)),
                }
            }
            tokens.push(Token::Str(s));
        } else if c == '"' {
            let mut s = String::new();
            i += 1;
            loop {
                match chars.get(i) {
                    Some('"') if chars.get(i + 1) == Some(&'"') => {
                        s.push('"');
                        i += 2;
                    }
                    Some('"') => {
                        i += 1;
                        break;
                    }
                    Some(&ch) => {
                        s.push(ch);
                        i += 1;
                    }
                    None => return Err(unexpected("end of quoted identifier", sql)),
                }
            }
            tokens.push(Token::Ident(s));
        } else if c.is_ascii_digit()
            || (c == '-' && chars.get(i + 1).is_some_and(char::is_ascii_digit))
        {
            let mut s = String::new();
            s.push(c);
            i += 1;
            while chars
                .get(i)
                .is_some_and(|ch| ch.is_ascii_digit() || *ch == '.')
            {
                s.push(chars[i]);
                i += 1;
            }
            tokens.push(Token::Number(s));
        } else if c.is_alphabetic() || c == '_' {
            let mut s = String::new();
            while chars
                .get(i)
                .is_some_and(|ch| ch.is_alphanumeric() || *ch == '_')
            {
                s.push(chars[i]);
                i += 1;
            }
            tokens.push(Token::Ident(s));
        } else if c == '?' {
            tokens.push(Token::Param(None));
            i += 1;
        } else if c == '$' {
            let mut n = String::new();
            i += 1;
            while chars.get(i).is_some_and(char::is_ascii_digit) {
                n.push(chars[i]);
                i += 1;
            }
            let index: usize = n
                .parse()
                .map_err(|_| unexpected("parameter marker", sql))?;
            tokens.push(Token::Param(Some(index)));
        } else if c == '<' {
            if chars.get(i + 1) == Some(&'=') {
                tokens.push(Token::Op("<="));
                i += 2;
            } else if chars.get(i + 1) == Some(&'>') {
                tokens.push(Token::Op("<>"));
                i += 2;
            } else {
                tokens.push(Token::Op("<"));
                i += 1;
            }
        } else if c == '>' {
            if chars.get(i + 1) == Some(&'=') {
                tokens.push(Token::Op(">="));
                i += 2;
            } else {
                tokens.push(Token::Op(">"));
                i += 1;
            }
        } else if c == '!' && chars.get(i + 1) == Some(&'=') {
            tokens.push(Token::Op("<>"));
            i += 2;
        } else if c == '=' {
            tokens.push(Token::Op("="));
            i += 1;
        } else if "(),*+.;".contains(c) {
            if c != ';' {
                tokens.push(Token::Symbol(c));
            }
            i += 1;
        } else {
            return Err(unexpected(format!("character '{c}'"), sql));
        }
    }
    Ok(tokens)
}

struct Parser<'a> {
    sql: &'a str,
    tokens: Vec<Token>,
    pos: usize,
    next_positional: usize,
}

impl<'a> Parser<'a> {
    fn new(sql: &'a str) -> Result<Self> {
        Ok(Self {
            sql,
            tokens: tokenize(sql)?,
            pos: 0,
            next_positional: 0,
        })
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn at_keyword(&self, kw: &str) -> bool {
        matches!(self.peek(), Some(Token::Ident(s)) if s.eq_ignore_ascii_case(kw))
    }

    fn eat_keyword(&mut self, kw: &str) -> bool {
        if self.at_keyword(kw) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, kw: &str) -> Result<()> {
        if self.eat_keyword(kw) {
            Ok(())
        } else {
            Err(unexpected(format!("token (expected {kw})"), self.sql))
        }
    }

    fn eat_symbol(&mut self, symbol: char) -> bool {
        if matches!(self.peek(), Some(Token::Symbol(c)) if *c == symbol) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_symbol(&mut self, symbol: char) -> Result<()> {
        if self.eat_symbol(symbol) {
            Ok(())
        } else {
            Err(unexpected(format!("token (expected '{symbol}')"), self.sql))
        }
    }

    fn ident(&mut self) -> Result<String> {
        match self.bump() {
            Some(Token::Ident(s)) => Ok(s),
            _ => Err(unexpected("token (expected identifier)", self.sql)),
        }
    }

    /// A possibly dotted table name, joined back with dots.
    fn table_name(&mut self) -> Result<String> {
        let mut name = self.ident()?;
        while self.eat_symbol('.') {
            name.push('.');
            name.push_str(&self.ident()?);
        }
        Ok(name)
    }

    fn number_usize(&mut self) -> Result<usize> {
        match self.bump() {
            Some(Token::Number(n)) => n
                .parse()
                .map_err(|_| unexpected("number", self.sql)),
            _ => Err(unexpected("token (expected number)", self.sql)),
        }
    }

    fn operand(&mut self) -> Result<Operand> {
        match self.bump() {
            Some(Token::Param(None)) => {
                let index = self.next_positional;
                self.next_positional += 1;
                Ok(Operand::Param(index))
            }
            Some(Token::Param(Some(n))) => {
                if n == 0 {
                    return Err(unexpected("parameter index 0", self.sql));
                }
                Ok(Operand::Param(n - 1))
            }
            Some(Token::Number(n)) => Ok(Operand::Literal(parse_number(&n, self.sql)?)),
            Some(Token::Str(s)) => Ok(Operand::Literal(Value::Text(s))),
            Some(Token::Ident(s)) if s.eq_ignore_ascii_case("null") => {
                Ok(Operand::Literal(Value::Null))
            }
            Some(Token::Ident(s)) if s.eq_ignore_ascii_case("true") => {
                Ok(Operand::Literal(Value::Bool(true)))
            }
            Some(Token::Ident(s)) if s.eq_ignore_ascii_case("false") => {
                Ok(Operand::Literal(Value::Bool(false)))
            }
            _ => Err(unexpected("token (expected operand)", self.sql)),
        }
    }

    fn predicate(&mut self) -> Result<Pred> {
        let mut parts = vec![self.and_chain()?];
        while self.eat_keyword("or") {
            parts.push(self.and_chain()?);
        }
        Ok(if parts.len() == 1 {
            parts.remove(0)
        } else {
            Pred::Or(parts)
        })
    }

    fn and_chain(&mut self) -> Result<Pred> {
        let mut parts = vec![self.unary()?];
        while self.eat_keyword("and") {
            parts.push(self.unary()?);
        }
        Ok(if parts.len() == 1 {
            parts.remove(0)
        } else {
            Pred::And(parts)
        })
    }

    fn unary(&mut self) -> Result<Pred> {
        if self.eat_keyword("not") {
            return Ok(Pred::Not(Box::new(self.unary()?)));
        }
        if self.eat_symbol('(') {
            let inner = self.predicate()?;
            self.expect_symbol(')')?;
            return Ok(inner);
        }
        let column = self.ident()?;
        if self.eat_keyword("is") {
            let negated = self.eat_keyword("not");
            self.expect_keyword("null")?;
            return Ok(Pred::IsNull { column, negated });
        }
        if self.eat_keyword("like") {
            let operand = self.operand()?;
            return Ok(Pred::Like { column, operand });
        }
        let op = match self.bump() {
            Some(Token::Op("=")) => CmpOp::Eq,
            Some(Token::Op("<>")) => CmpOp::Ne,
            Some(Token::Op("<")) => CmpOp::Lt,
            Some(Token::Op("<=")) => CmpOp::Le,
            Some(Token::Op(">")) => CmpOp::Gt,
            Some(Token::Op(">=")) => CmpOp::Ge,
            _ => return Err(unexpected("token (expected comparison)", self.sql)),
        };
        Ok(Pred::Cmp {
            column,
            op,
            operand: self.operand()?,
        })
    }

    fn select(&mut self) -> Result<Select> {
        let projection = if self.eat_symbol('*') {
            Projection::All
        } else if self.at_keyword("count") {
            self.pos += 1;
            self.expect_symbol('(')?;
            self.expect_symbol('*')?;
            self.expect_symbol(')')?;
            Projection::Count
        } else {
            let mut columns = vec![self.ident()?];
            while self.eat_symbol(',') {
                columns.push(self.ident()?);
            }
            Projection::Columns(columns)
        };
        self.expect_keyword("from")?;
        let table = self.table_name()?;
        let predicate = if self.eat_keyword("where") {
            Some(self.predicate()?)
        } else {
            None
        };
        let mut order_by = Vec::new();
        if self.eat_keyword("order") {
            self.expect_keyword("by")?;
            loop {
                let column = self.ident()?;
                let ascending = if self.eat_keyword("desc") {
                    false
                } else {
                    self.eat_keyword("asc");
                    true
                };
                order_by.push((column, ascending));
                if !self.eat_symbol(',') {
                    break;
                }
            }
        }
        let mut limit = None;
        let mut offset = None;
        if self.eat_keyword("limit") {
            limit = Some(self.number_usize()?);
            if self.eat_keyword("offset") {
                offset = Some(self.number_usize()?);
            }
        }
        Ok(Select {
            projection,
            table,
            predicate,
            order_by,
            limit,
            offset,
        })
    }

    fn insert(&mut self) -> Result<Insert> {
        self.expect_keyword("into")?;
        let table = self.table_name()?;
        self.expect_symbol('(')?;
        let mut columns = vec![self.ident()?];
        while self.eat_symbol(',') {
            columns.push(self.ident()?);
        }
        self.expect_symbol(')')?;
        self.expect_keyword("values")?;
        self.expect_symbol('(')?;
        let mut values = vec![self.operand()?];
        while self.eat_symbol(',') {
            values.push(self.operand()?);
        }
        self.expect_symbol(')')?;
        if columns.len() != values.len() {
            return Err(Error::query_with_sql(
                format!(
                    "insert lists {} column(s) but {} value(s)",
                    columns.len(),
                    values.len()
                ),
                self.sql,
            ));
        }
        Ok(Insert {
            table,
            columns,
            values,
        })
    }

    fn assignment(&mut self) -> Result<Assignment> {
        let column = self.ident()?;
        match self.bump() {
            Some(Token::Op("=")) => {}
            _ => return Err(unexpected("token (expected '=')", self.sql)),
        }
        // `col = col + n` self-increments (version columns)
        if matches!(self.peek(), Some(Token::Ident(s)) if *s == column)
            && matches!(self.tokens.get(self.pos + 1), Some(Token::Symbol('+')))
        {
            self.pos += 2;
            let amount = match self.bump() {
                Some(Token::Number(n)) => n
                    .parse()
                    .map_err(|_| unexpected("increment amount", self.sql))?,
                _ => return Err(unexpected("token (expected number)", self.sql)),
            };
            return Ok(Assignment::Increment { column, amount });
        }
        Ok(Assignment::Set {
            column,
            operand: self.operand()?,
        })
    }

    fn update(&mut self) -> Result<Update> {
        let table = self.table_name()?;
        self.expect_keyword("set")?;
        let mut assignments = vec![self.assignment()?];
        while self.eat_symbol(',') {
            assignments.push(self.assignment()?);
        }
        let predicate = if self.eat_keyword("where") {
            Some(self.predicate()?)
        } else {
            None
        };
        Ok(Update {
            table,
            assignments,
            predicate,
        })
    }

    fn delete(&mut self) -> Result<Delete> {
        self.expect_keyword("from")?;
        let table = self.table_name()?;
        let predicate = if self.eat_keyword("where") {
            Some(self.predicate()?)
        } else {
            None
        };
        Ok(Delete { table, predicate })
    }

    fn command(&mut self) -> Result<Command> {
        let command = if self.eat_keyword("select") {
            Command::Select(self.select()?)
        } else if self.eat_keyword("insert") {
            Command::Insert(self.insert()?)
        } else if self.eat_keyword("update") {
            Command::Update(self.update()?)
        } else if self.eat_keyword("delete") {
            Command::Delete(self.delete()?)
        } else {
            return Err(unexpected("statement", self.sql));
        };
        if self.peek().is_some() {
            return Err(unexpected("trailing tokens", self.sql));
        }
        Ok(command)
    }
}

fn parse_number(text: &str, sql: &str) -> Result<Value> {
    if text.contains('.') {
        text.parse::<f64>()
            .map(Value::Double)
            .map_err(|_| unexpected("number", sql))
    } else {
        text.parse::<i64>()
            .map(Value::BigInt)
            .map_err(|_| unexpected("number", sql))
    }
}

/// Parse one statement.
pub(crate) fn parse(sql: &str) -> Result<Command> {
    Parser::new(sql)?.command()
}
