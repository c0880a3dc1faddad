/// Store-side expression engine used by `MemoryStore`
///
/// Parses and evaluates the expression strings the store receives:
/// - **Condition and filter expressions**: =, <>, <, <=, >, >=, BETWEEN, IN,
///   AND, OR, NOT, attribute_exists, attribute_not_exists, attribute_type,
///   begins_with, contains
/// - **Update expressions**: SET (with `+`, `-` and list_append), REMOVE,
///   ADD, DELETE
///
/// ```ignore
/// let expr = ExpressionParser::parse("#n0 > :v0 AND attribute_exists(#n1)")?;
/// let context = ExpressionContext::new()
///     .with_name("#n0", "total")
///     .with_name("#n1", "coupon")
///     .with_value(":v0", AttributeValue::number(100));
/// let matched = ExpressionEvaluator::new(&item, &context).evaluate(&expr)?;
/// ```

use dynaq_core::{AttributeValue, Error, Item, Number, Result};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

/// Expression AST node
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    // Comparison operators
    Equal(Box<Expr>, Box<Expr>),
    NotEqual(Box<Expr>, Box<Expr>),
    LessThan(Box<Expr>, Box<Expr>),
    LessThanOrEqual(Box<Expr>, Box<Expr>),
    GreaterThan(Box<Expr>, Box<Expr>),
    GreaterThanOrEqual(Box<Expr>, Box<Expr>),
    Between(Box<Expr>, Box<Expr>, Box<Expr>),
    In(Box<Expr>, Vec<Expr>),

    // Logical operators
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),

    // Functions
    AttributeExists(String),
    AttributeNotExists(String),
    AttributeType(String, Box<Expr>),
    BeginsWith(Box<Expr>, Box<Expr>),
    Contains(Box<Expr>, Box<Expr>),

    // Operands
    AttributePath(String),
    ValuePlaceholder(String),
}

/// Expression attribute names and values of one request
#[derive(Debug, Clone, Default)]
pub struct ExpressionContext {
    /// Expression attribute values (:value1 -> value)
    pub values: HashMap<String, AttributeValue>,
    /// Expression attribute names (#name -> actual_name)
    pub names: HashMap<String, String>,
}

impl ExpressionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_maps(
        names: &BTreeMap<String, String>,
        values: &BTreeMap<String, AttributeValue>,
    ) -> Self {
        Self {
            names: names.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            values: values.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        }
    }

    pub fn with_value(mut self, placeholder: impl Into<String>, value: AttributeValue) -> Self {
        self.values.insert(placeholder.into(), value);
        self
    }

    pub fn with_name(mut self, placeholder: impl Into<String>, name: impl Into<String>) -> Self {
        self.names.insert(placeholder.into(), name.into());
        self
    }

    /// Resolve attribute name (handle #placeholder)
    pub fn attribute_name(&self, path: &str) -> Result<String> {
        if path.starts_with('#') {
            self.names
                .get(path)
                .cloned()
                .ok_or_else(|| Error::InvalidExpression(format!("Name placeholder '{}' not found", path)))
        } else {
            Ok(path.to_string())
        }
    }

    pub fn value(&self, placeholder: &str) -> Result<&AttributeValue> {
        self.values
            .get(placeholder)
            .ok_or_else(|| Error::InvalidExpression(format!("Value placeholder '{}' not found", placeholder)))
    }
}

/// Order of two comparable scalars, `None` when they cannot be compared
pub fn compare_values(left: &AttributeValue, right: &AttributeValue) -> Option<Ordering> {
    match (left, right) {
        (AttributeValue::N(l), AttributeValue::N(r)) => Some(l.cmp_numeric(r)),
        (AttributeValue::S(l), AttributeValue::S(r)) => Some(l.cmp(r)),
        (AttributeValue::B(l), AttributeValue::B(r)) => Some(l.cmp(r)),
        _ => None,
    }
}

/// Equality as the store sees it: numbers by value, sets ignoring order
fn values_equal(left: &AttributeValue, right: &AttributeValue) -> bool {
    match (left, right) {
        (AttributeValue::N(l), AttributeValue::N(r)) => l.cmp_numeric(r) == Ordering::Equal,
        (AttributeValue::Ss(l), AttributeValue::Ss(r)) => same_elements(l, r, |a, b| a == b),
        (AttributeValue::Ns(l), AttributeValue::Ns(r)) => {
            same_elements(l, r, |a, b| a.cmp_numeric(b) == Ordering::Equal)
        }
        (AttributeValue::Bs(l), AttributeValue::Bs(r)) => same_elements(l, r, |a, b| a == b),
        _ => left == right,
    }
}

fn same_elements<T>(l: &[T], r: &[T], eq: impl Fn(&T, &T) -> bool) -> bool {
    l.len() == r.len() && l.iter().all(|a| r.iter().any(|b| eq(a, b)))
}

/// Expression evaluator
pub struct ExpressionEvaluator<'a> {
    item: &'a Item,
    context: &'a ExpressionContext,
}

impl<'a> ExpressionEvaluator<'a> {
    pub fn new(item: &'a Item, context: &'a ExpressionContext) -> Self {
        Self { item, context }
    }

    /// Evaluate expression against item. Comparisons involving a missing
    /// attribute or mismatched types are false.
    pub fn evaluate(&self, expr: &Expr) -> Result<bool> {
        match expr {
            Expr::Equal(left, right) => {
                let l = self.resolve_value(left)?;
                let r = self.resolve_value(right)?;
                Ok(matches!((l, r), (Some(l), Some(r)) if values_equal(l, r)))
            }
            Expr::NotEqual(left, right) => {
                let l = self.resolve_value(left)?;
                let r = self.resolve_value(right)?;
                Ok(match (l, r) {
                    (Some(l), Some(r)) => !values_equal(l, r),
                    _ => true,
                })
            }
            Expr::LessThan(left, right) => self.compare(left, right, |o| o == Ordering::Less),
            Expr::LessThanOrEqual(left, right) => self.compare(left, right, |o| o != Ordering::Greater),
            Expr::GreaterThan(left, right) => self.compare(left, right, |o| o == Ordering::Greater),
            Expr::GreaterThanOrEqual(left, right) => self.compare(left, right, |o| o != Ordering::Less),
            Expr::Between(value, low, high) => {
                Ok(self.compare(value, low, |o| o != Ordering::Less)?
                    && self.compare(value, high, |o| o != Ordering::Greater)?)
            }
            Expr::In(value, candidates) => {
                let Some(v) = self.resolve_value(value)? else {
                    return Ok(false);
                };
                for candidate in candidates {
                    if let Some(c) = self.resolve_value(candidate)? {
                        if values_equal(v, c) {
                            return Ok(true);
                        }
                    }
                }
                Ok(false)
            }
            Expr::And(left, right) => Ok(self.evaluate(left)? && self.evaluate(right)?),
            Expr::Or(left, right) => Ok(self.evaluate(left)? || self.evaluate(right)?),
            Expr::Not(expr) => Ok(!self.evaluate(expr)?),
            Expr::AttributeExists(path) => {
                let attr_name = self.context.attribute_name(path)?;
                Ok(self.item.contains_key(&attr_name))
            }
            Expr::AttributeNotExists(path) => {
                let attr_name = self.context.attribute_name(path)?;
                Ok(!self.item.contains_key(&attr_name))
            }
            Expr::AttributeType(path, type_expr) => {
                let attr_name = self.context.attribute_name(path)?;
                let expected = match self.resolve_value(type_expr)? {
                    Some(AttributeValue::S(tag)) => tag.clone(),
                    _ => return Err(Error::InvalidExpression("attribute_type needs a type string".into())),
                };
                Ok(self
                    .item
                    .get(&attr_name)
                    .map(|v| v.wire_type().tag() == expected)
                    .unwrap_or(false))
            }
            Expr::BeginsWith(path_expr, value_expr) => {
                let path_value = self.resolve_value(path_expr)?;
                let prefix_value = self.resolve_value(value_expr)?;

                Ok(match (path_value, prefix_value) {
                    (Some(AttributeValue::S(s)), Some(AttributeValue::S(prefix))) => s.starts_with(prefix.as_str()),
                    (Some(AttributeValue::B(b)), Some(AttributeValue::B(prefix))) => b.starts_with(&prefix[..]),
                    _ => false,
                })
            }
            Expr::Contains(path_expr, value_expr) => {
                let haystack = self.resolve_value(path_expr)?;
                let needle = self.resolve_value(value_expr)?;

                Ok(match (haystack, needle) {
                    (Some(AttributeValue::S(s)), Some(AttributeValue::S(sub))) => s.contains(sub.as_str()),
                    (Some(AttributeValue::Ss(set)), Some(AttributeValue::S(e))) => set.contains(e),
                    (Some(AttributeValue::Ns(set)), Some(AttributeValue::N(e))) => {
                        set.iter().any(|n| n.cmp_numeric(e) == Ordering::Equal)
                    }
                    (Some(AttributeValue::Bs(set)), Some(AttributeValue::B(e))) => set.contains(e),
                    (Some(AttributeValue::L(list)), Some(e)) => list.iter().any(|v| values_equal(v, e)),
                    _ => false,
                })
            }
            Expr::AttributePath(_) | Expr::ValuePlaceholder(_) => {
                Err(Error::InvalidExpression("Cannot evaluate operand as boolean expression".into()))
            }
        }
    }

    fn compare(&self, left: &Expr, right: &Expr, test: impl Fn(Ordering) -> bool) -> Result<bool> {
        let l = self.resolve_value(left)?;
        let r = self.resolve_value(right)?;
        Ok(match (l, r) {
            (Some(l), Some(r)) => compare_values(l, r).map(test).unwrap_or(false),
            _ => false,
        })
    }

    /// Resolve an operand. A path naming a missing attribute resolves to `None`.
    fn resolve_value(&self, expr: &Expr) -> Result<Option<&'a AttributeValue>> {
        match expr {
            Expr::AttributePath(path) => {
                let attr_name = self.context.attribute_name(path)?;
                Ok(self.item.get(&attr_name))
            }
            Expr::ValuePlaceholder(placeholder) => self.context.value(placeholder).map(Some),
            _ => Err(Error::InvalidExpression("Cannot resolve non-value expression to value".into())),
        }
    }
}

/// Update expression actions
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateAction {
    /// SET path = value
    Set(String, UpdateValue),
    /// REMOVE path
    Remove(String),
    /// ADD path value (for numbers or sets)
    Add(String, UpdateValue),
    /// DELETE path value (for sets)
    Delete(String, UpdateValue),
}

impl UpdateAction {
    pub fn path(&self) -> &str {
        match self {
            UpdateAction::Set(path, _)
            | UpdateAction::Remove(path)
            | UpdateAction::Add(path, _)
            | UpdateAction::Delete(path, _) => path,
        }
    }
}

/// Value in update expression
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateValue {
    /// Placeholder to be resolved
    Placeholder(String),
    /// Attribute path reference
    Path(String),
    /// Arithmetic: operand + operand or operand - operand
    Add(Box<UpdateValue>, Box<UpdateValue>),
    Sub(Box<UpdateValue>, Box<UpdateValue>),
    /// list_append(operand, operand)
    ListAppend(Box<UpdateValue>, Box<UpdateValue>),
}

fn add_numbers(left: &Number, right: &Number, negate: bool) -> Result<Number> {
    if let (Ok(l), Ok(r)) = (left.to_integer::<i128>(), right.to_integer::<i128>()) {
        let sum = if negate { l.checked_sub(r) } else { l.checked_add(r) };
        if let Some(sum) = sum {
            return Ok(Number::from(sum));
        }
    }
    let l: f64 = left
        .as_str()
        .parse()
        .map_err(|_| Error::InvalidExpression("Invalid number".into()))?;
    let r: f64 = right
        .as_str()
        .parse()
        .map_err(|_| Error::InvalidExpression("Invalid number".into()))?;
    let result = if negate { l - r } else { l + r };
    Number::parse(result.to_string())
}

/// Update executor
pub struct UpdateExecutor<'a> {
    context: &'a ExpressionContext,
}

impl<'a> UpdateExecutor<'a> {
    pub fn new(context: &'a ExpressionContext) -> Self {
        Self { context }
    }

    /// Execute update actions on an item
    pub fn execute(&self, item: &Item, actions: &[UpdateAction]) -> Result<Item> {
        let mut result = item.clone();

        for action in actions {
            let attr_name = self.context.attribute_name(action.path())?;
            match action {
                UpdateAction::Set(_, value) => {
                    // Operands read the item as it was before this update
                    let resolved = self.resolve_update_value(value, item)?;
                    result.insert(attr_name, resolved);
                }
                UpdateAction::Remove(_) => {
                    result.remove(&attr_name);
                }
                UpdateAction::Add(_, value) => {
                    let add_value = self.resolve_update_value(value, item)?;
                    let merged = match (result.get(&attr_name), add_value) {
                        (None, v) => v,
                        (Some(AttributeValue::N(n1)), AttributeValue::N(n2)) => {
                            AttributeValue::N(add_numbers(n1, &n2, false)?)
                        }
                        (Some(AttributeValue::Ss(s1)), AttributeValue::Ss(s2)) => {
                            AttributeValue::Ss(union(s1, s2, |a, b| a == b))
                        }
                        (Some(AttributeValue::Ns(s1)), AttributeValue::Ns(s2)) => AttributeValue::Ns(union(
                            s1,
                            s2,
                            |a, b| a.cmp_numeric(b) == Ordering::Equal,
                        )),
                        (Some(AttributeValue::Bs(s1)), AttributeValue::Bs(s2)) => {
                            AttributeValue::Bs(union(s1, s2, |a, b| a == b))
                        }
                        _ => return Err(Error::InvalidExpression("ADD requires a number or a matching set".into())),
                    };
                    result.insert(attr_name, merged);
                }
                UpdateAction::Delete(_, value) => {
                    let remove = self.resolve_update_value(value, item)?;
                    let remaining = match (result.get(&attr_name), &remove) {
                        (None, _) => continue,
                        (Some(AttributeValue::Ss(s)), AttributeValue::Ss(r)) => {
                            let left: Vec<_> = s.iter().filter(|e| !r.contains(e)).cloned().collect();
                            (!left.is_empty()).then_some(AttributeValue::Ss(left))
                        }
                        (Some(AttributeValue::Ns(s)), AttributeValue::Ns(r)) => {
                            let left: Vec<_> = s
                                .iter()
                                .filter(|e| !r.iter().any(|x| x.cmp_numeric(e) == Ordering::Equal))
                                .cloned()
                                .collect();
                            (!left.is_empty()).then_some(AttributeValue::Ns(left))
                        }
                        (Some(AttributeValue::Bs(s)), AttributeValue::Bs(r)) => {
                            let left: Vec<_> = s.iter().filter(|e| !r.contains(e)).cloned().collect();
                            (!left.is_empty()).then_some(AttributeValue::Bs(left))
                        }
                        _ => return Err(Error::InvalidExpression("DELETE requires a matching set".into())),
                    };
                    // An empty set cannot be stored
                    match remaining {
                        Some(v) => {
                            result.insert(attr_name, v);
                        }
                        None => {
                            result.remove(&attr_name);
                        }
                    }
                }
            }
        }

        Ok(result)
    }

    fn resolve_update_value(&self, value: &UpdateValue, item: &Item) -> Result<AttributeValue> {
        match value {
            UpdateValue::Placeholder(placeholder) => self.context.value(placeholder).cloned(),
            UpdateValue::Path(path) => {
                let attr_name = self.context.attribute_name(path)?;
                item.get(&attr_name)
                    .cloned()
                    .ok_or_else(|| Error::InvalidExpression(format!("Attribute {} not found", attr_name)))
            }
            UpdateValue::Add(left, right) | UpdateValue::Sub(left, right) => {
                let negate = matches!(value, UpdateValue::Sub(..));
                match (self.resolve_update_value(left, item)?, self.resolve_update_value(right, item)?) {
                    (AttributeValue::N(n1), AttributeValue::N(n2)) => Ok(AttributeValue::N(add_numbers(&n1, &n2, negate)?)),
                    _ => Err(Error::InvalidExpression("Arithmetic requires numbers".into())),
                }
            }
            UpdateValue::ListAppend(left, right) => {
                match (self.resolve_update_value(left, item)?, self.resolve_update_value(right, item)?) {
                    (AttributeValue::L(mut l1), AttributeValue::L(l2)) => {
                        l1.extend(l2);
                        Ok(AttributeValue::L(l1))
                    }
                    _ => Err(Error::InvalidExpression("list_append requires lists".into())),
                }
            }
        }
    }
}

fn union<T: Clone>(existing: &[T], added: Vec<T>, eq: impl Fn(&T, &T) -> bool) -> Vec<T> {
    let mut out = existing.to_vec();
    for element in added {
        if !out.iter().any(|e| eq(e, &element)) {
            out.push(element);
        }
    }
    out
}

/// Token for lexer
#[derive(Debug, Clone, PartialEq)]
enum Token {
    // Operators
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,

    // Keywords
    And,
    Or,
    Not,
    Between,
    In,

    // Update keywords
    Set,
    Remove,
    Add,
    Delete,

    // Arithmetic
    Plus,
    Minus,

    // Functions
    AttributeExists,
    AttributeNotExists,
    AttributeType,
    BeginsWith,
    Contains,
    ListAppend,

    // Identifiers and placeholders
    Identifier(String),
    NamePlaceholder(String),  // #name
    ValuePlaceholder(String), // :value

    // Delimiters
    LeftParen,
    RightParen,
    Comma,

    Eof,
}

/// Simple lexer
struct Lexer {
    input: Vec<char>,
    pos: usize,
}

impl Lexer {
    fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            pos: 0,
        }
    }

    fn tokenize(input: &str) -> Result<Vec<Token>> {
        let mut lexer = Lexer::new(input);
        let mut tokens = Vec::new();
        loop {
            let token = lexer.next_token()?;
            let is_eof = token == Token::Eof;
            tokens.push(token);
            if is_eof {
                return Ok(tokens);
            }
        }
    }

    fn current(&self) -> Option<char> {
        self.input.get(self.pos).copied()
    }

    fn advance(&mut self) {
        self.pos += 1;
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.current() {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn read_identifier(&mut self) -> String {
        let start = self.pos;
        while let Some(ch) = self.current() {
            if ch.is_alphanumeric() || ch == '_' {
                self.advance();
            } else {
                break;
            }
        }
        self.input[start..self.pos].iter().collect()
    }

    fn next_token(&mut self) -> Result<Token> {
        self.skip_whitespace();

        let token = match self.current() {
            None => return Ok(Token::Eof),
            Some('(') => Token::LeftParen,
            Some(')') => Token::RightParen,
            Some(',') => Token::Comma,
            Some('+') => Token::Plus,
            Some('-') => Token::Minus,
            Some('=') => Token::Equal,
            Some('<') => {
                self.advance();
                return Ok(match self.current() {
                    Some('>') => {
                        self.advance();
                        Token::NotEqual
                    }
                    Some('=') => {
                        self.advance();
                        Token::LessThanOrEqual
                    }
                    _ => Token::LessThan,
                });
            }
            Some('>') => {
                self.advance();
                return Ok(if self.current() == Some('=') {
                    self.advance();
                    Token::GreaterThanOrEqual
                } else {
                    Token::GreaterThan
                });
            }
            Some('#') => {
                self.advance();
                let name = self.read_identifier();
                return Ok(Token::NamePlaceholder(format!("#{}", name)));
            }
            Some(':') => {
                self.advance();
                let name = self.read_identifier();
                return Ok(Token::ValuePlaceholder(format!(":{}", name)));
            }
            Some(ch) if ch.is_alphabetic() => {
                let ident = self.read_identifier();
                return Ok(match ident.to_uppercase().as_str() {
                    "AND" => Token::And,
                    "OR" => Token::Or,
                    "NOT" => Token::Not,
                    "BETWEEN" => Token::Between,
                    "IN" => Token::In,
                    "SET" => Token::Set,
                    "REMOVE" => Token::Remove,
                    "ADD" => Token::Add,
                    "DELETE" => Token::Delete,
                    "ATTRIBUTE_EXISTS" => Token::AttributeExists,
                    "ATTRIBUTE_NOT_EXISTS" => Token::AttributeNotExists,
                    "ATTRIBUTE_TYPE" => Token::AttributeType,
                    "BEGINS_WITH" => Token::BeginsWith,
                    "CONTAINS" => Token::Contains,
                    "LIST_APPEND" => Token::ListAppend,
                    _ => Token::Identifier(ident),
                });
            }
            Some(ch) => return Err(Error::InvalidExpression(format!("Unexpected character: {}", ch))),
        };
        self.advance();
        Ok(token)
    }
}

/// Shared token cursor for both parsers
struct Tokens {
    tokens: Vec<Token>,
    pos: usize,
}

impl Tokens {
    fn new(input: &str) -> Result<Self> {
        Ok(Self {
            tokens: Lexer::tokenize(input)?,
            pos: 0,
        })
    }

    fn current(&self) -> &Token {
        self.tokens.get(self.pos).unwrap_or(&Token::Eof)
    }

    fn advance(&mut self) {
        self.pos += 1;
    }

    fn expect(&mut self, expected: Token) -> Result<()> {
        if self.current() == &expected {
            self.advance();
            Ok(())
        } else {
            Err(Error::InvalidExpression(format!("Expected {:?}, got {:?}", expected, self.current())))
        }
    }

    fn path(&mut self, context: &str) -> Result<String> {
        let path = match self.current() {
            Token::Identifier(p) | Token::NamePlaceholder(p) => p.clone(),
            _ => return Err(Error::InvalidExpression(format!("Expected attribute path in {}", context))),
        };
        self.advance();
        Ok(path)
    }
}

/// Condition/filter/key-condition expression parser
pub struct ExpressionParser {
    tokens: Tokens,
}

impl ExpressionParser {
    /// Parse a condition expression string into AST
    pub fn parse(input: &str) -> Result<Expr> {
        let mut parser = Self {
            tokens: Tokens::new(input)?,
        };
        let expr = parser.parse_or()?;
        parser.tokens.expect(Token::Eof)?;
        Ok(expr)
    }

    fn parse_or(&mut self) -> Result<Expr> {
        let mut left = self.parse_and()?;

        while self.tokens.current() == &Token::Or {
            self.tokens.advance();
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }

        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr> {
        let mut left = self.parse_not()?;

        while self.tokens.current() == &Token::And {
            self.tokens.advance();
            let right = self.parse_not()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }

        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expr> {
        if self.tokens.current() == &Token::Not {
            self.tokens.advance();
            let expr = self.parse_not()?;
            Ok(Expr::Not(Box::new(expr)))
        } else {
            self.parse_comparison()
        }
    }

    fn parse_comparison(&mut self) -> Result<Expr> {
        let left = self.parse_operand()?;

        let op = self.tokens.current().clone();
        let make: fn(Box<Expr>, Box<Expr>) -> Expr = match op {
            Token::Equal => Expr::Equal,
            Token::NotEqual => Expr::NotEqual,
            Token::LessThan => Expr::LessThan,
            Token::LessThanOrEqual => Expr::LessThanOrEqual,
            Token::GreaterThan => Expr::GreaterThan,
            Token::GreaterThanOrEqual => Expr::GreaterThanOrEqual,
            Token::Between => {
                self.tokens.advance();
                let low = self.parse_operand()?;
                self.tokens.expect(Token::And)?;
                let high = self.parse_operand()?;
                return Ok(Expr::Between(Box::new(left), Box::new(low), Box::new(high)));
            }
            Token::In => {
                self.tokens.advance();
                self.tokens.expect(Token::LeftParen)?;
                let mut candidates = vec![self.parse_operand()?];
                while self.tokens.current() == &Token::Comma {
                    self.tokens.advance();
                    candidates.push(self.parse_operand()?);
                }
                self.tokens.expect(Token::RightParen)?;
                return Ok(Expr::In(Box::new(left), candidates));
            }
            _ => return Ok(left), // Could be a function call that returns bool
        };
        self.tokens.advance();
        let right = self.parse_operand()?;
        Ok(make(Box::new(left), Box::new(right)))
    }

    fn parse_operand(&mut self) -> Result<Expr> {
        match self.tokens.current().clone() {
            Token::LeftParen => {
                self.tokens.advance();
                let expr = self.parse_or()?;
                self.tokens.expect(Token::RightParen)?;
                Ok(expr)
            }
            Token::Identifier(name) | Token::NamePlaceholder(name) => {
                self.tokens.advance();
                Ok(Expr::AttributePath(name))
            }
            Token::ValuePlaceholder(name) => {
                self.tokens.advance();
                Ok(Expr::ValuePlaceholder(name))
            }
            Token::AttributeExists | Token::AttributeNotExists => {
                let exists = self.tokens.current() == &Token::AttributeExists;
                self.tokens.advance();
                self.tokens.expect(Token::LeftParen)?;
                let path = self.tokens.path("attribute_exists")?;
                self.tokens.expect(Token::RightParen)?;
                Ok(if exists {
                    Expr::AttributeExists(path)
                } else {
                    Expr::AttributeNotExists(path)
                })
            }
            Token::AttributeType => {
                self.tokens.advance();
                self.tokens.expect(Token::LeftParen)?;
                let path = self.tokens.path("attribute_type")?;
                self.tokens.expect(Token::Comma)?;
                let type_expr = self.parse_operand()?;
                self.tokens.expect(Token::RightParen)?;
                Ok(Expr::AttributeType(path, Box::new(type_expr)))
            }
            Token::BeginsWith | Token::Contains => {
                let begins = self.tokens.current() == &Token::BeginsWith;
                self.tokens.advance();
                self.tokens.expect(Token::LeftParen)?;
                let path = self.parse_operand()?;
                self.tokens.expect(Token::Comma)?;
                let operand = self.parse_operand()?;
                self.tokens.expect(Token::RightParen)?;
                Ok(if begins {
                    Expr::BeginsWith(Box::new(path), Box::new(operand))
                } else {
                    Expr::Contains(Box::new(path), Box::new(operand))
                })
            }
            other => Err(Error::InvalidExpression(format!("Unexpected token: {:?}", other))),
        }
    }
}

/// Update expression parser
pub struct UpdateExpressionParser {
    tokens: Tokens,
}

impl UpdateExpressionParser {
    /// Parse an update expression string into actions
    /// Example: "SET #n0 = #n0 + :v0, #n1 = :v1 REMOVE #n2 ADD #n3 :v2"
    pub fn parse(input: &str) -> Result<Vec<UpdateAction>> {
        let mut parser = Self {
            tokens: Tokens::new(input)?,
        };
        parser.parse_update_expr()
    }

    fn parse_update_expr(&mut self) -> Result<Vec<UpdateAction>> {
        let mut actions = Vec::new();

        while self.tokens.current() != &Token::Eof {
            let clause = self.tokens.current().clone();
            self.tokens.advance();
            loop {
                let action = match clause {
                    Token::Set => {
                        let path = self.tokens.path("SET")?;
                        self.tokens.expect(Token::Equal)?;
                        UpdateAction::Set(path, self.parse_update_value()?)
                    }
                    Token::Remove => UpdateAction::Remove(self.tokens.path("REMOVE")?),
                    Token::Add => {
                        let path = self.tokens.path("ADD")?;
                        UpdateAction::Add(path, self.parse_operand()?)
                    }
                    Token::Delete => {
                        let path = self.tokens.path("DELETE")?;
                        UpdateAction::Delete(path, self.parse_operand()?)
                    }
                    other => {
                        return Err(Error::InvalidExpression(format!(
                            "Unexpected token in update expression: {:?}",
                            other
                        )))
                    }
                };
                actions.push(action);

                if self.tokens.current() == &Token::Comma {
                    self.tokens.advance();
                } else {
                    break;
                }
            }
        }

        if actions.is_empty() {
            return Err(Error::InvalidExpression("Empty update expression".into()));
        }
        Ok(actions)
    }

    fn parse_update_value(&mut self) -> Result<UpdateValue> {
        let base = self.parse_operand()?;

        match self.tokens.current() {
            Token::Plus => {
                self.tokens.advance();
                let operand = self.parse_operand()?;
                Ok(UpdateValue::Add(Box::new(base), Box::new(operand)))
            }
            Token::Minus => {
                self.tokens.advance();
                let operand = self.parse_operand()?;
                Ok(UpdateValue::Sub(Box::new(base), Box::new(operand)))
            }
            _ => Ok(base),
        }
    }

    fn parse_operand(&mut self) -> Result<UpdateValue> {
        match self.tokens.current().clone() {
            Token::Identifier(p) | Token::NamePlaceholder(p) => {
                self.tokens.advance();
                Ok(UpdateValue::Path(p))
            }
            Token::ValuePlaceholder(p) => {
                self.tokens.advance();
                Ok(UpdateValue::Placeholder(p))
            }
            Token::ListAppend => {
                self.tokens.advance();
                self.tokens.expect(Token::LeftParen)?;
                let left = self.parse_operand()?;
                self.tokens.expect(Token::Comma)?;
                let right = self.parse_operand()?;
                self.tokens.expect(Token::RightParen)?;
                Ok(UpdateValue::ListAppend(Box::new(left), Box::new(right)))
            }
            other => Err(Error::InvalidExpression(format!("Expected value, got {:?}", other))),
        }
    }
}
