//! Recursive-descent parser with precedence climbing for binary operators.
//!
//! The parser owns a single token of lookahead for the whole session and
//! refills it from the lexer one token at a time.

use crate::ast::{Construct, Expr, Function, Prototype};
use crate::config::PrecedenceTable;
use crate::error::{LexError, ParseError};
use crate::lexer::{Lexer, Token};

/// Parse a single expression with the default operator table, rejecting
/// anything left over after it.
pub fn parse_expr(source: &str) -> Result<Expr, ParseError> {
    let mut parser = Parser::new(Lexer::new(source.chars()), PrecedenceTable::default());
    let expr = parser.parse_expression()?;
    match parser.current()? {
        Token::EndOfInput => Ok(expr),
        _ => Err(ParseError::TrailingInput),
    }
}

/// Limit on nested expressions (parentheses, call arguments) so deeply
/// nested input is rejected instead of exhausting the stack.
pub const MAX_NESTING_DEPTH: usize = 256;

pub struct Parser<I: Iterator<Item = char>> {
    lexer: Lexer<I>,
    cur_tok: Result<Token, LexError>,
    precedence: PrecedenceTable,
    /// Expressions currently open through parentheses and call arguments.
    depth: usize,
}

impl<I: Iterator<Item = char>> Parser<I> {
    /// Create a parser and prime its lookahead with the first token.
    pub fn new(mut lexer: Lexer<I>, precedence: PrecedenceTable) -> Self {
        let cur_tok = lexer.next_token();
        Parser {
            lexer,
            cur_tok,
            precedence,
            depth: 0,
        }
    }

    /// The current lookahead token. A lex error is reported here, when the
    /// parser first looks at the token, not when it is read.
    pub fn current(&self) -> Result<&Token, ParseError> {
        self.cur_tok.as_ref().map_err(|err| ParseError::Lex(err.clone()))
    }

    fn advance(&mut self) {
        self.cur_tok = self.lexer.next_token();
    }

    /// Discard the current lookahead token. Used for error recovery.
    pub fn skip_token(&mut self) {
        self.advance();
    }

    fn at_symbol(&self, ch: char) -> Result<bool, ParseError> {
        Ok(self.current()?.is_symbol(ch))
    }

    fn current_binop(&self) -> Option<(char, i32)> {
        match self.cur_tok {
            Ok(Token::Symbol(op)) => self.precedence.get(op).map(|prec| (op, prec)),
            _ => None,
        }
    }

    pub fn parse_next_construct(&mut self) -> Result<Construct, ParseError> {
        match self.current()? {
            Token::EndOfInput => Ok(Construct::EndOfInput),
            Token::Symbol(';') => {
                self.advance();
                Ok(Construct::Separator)
            }
            Token::Def => self.parse_definition().map(Construct::Definition),
            Token::Extern => self.parse_extern().map(Construct::Extern),
            _ => self.parse_top_level_expr().map(Construct::TopLevelExpr),
        }
    }

    /// numberexpr ::= number
    fn parse_number_expr(&mut self, value: f64) -> Expr {
        self.advance();
        Expr::Number(value)
    }

    /// parenexpr ::= '(' expression ')'
    fn parse_paren_expr(&mut self) -> Result<Expr, ParseError> {
        self.advance();
        let expr = self.parse_expression()?;
        if !self.at_symbol(')')? {
            return Err(ParseError::ExpectedClosingParen);
        }
        self.advance();
        Ok(expr)
    }

    /// identifierexpr
    ///   ::= identifier
    ///   ::= identifier '(' (expression (',' expression)*)? ')'
    fn parse_identifier_expr(&mut self, name: String) -> Result<Expr, ParseError> {
        self.advance();
        if !self.at_symbol('(')? {
            return Ok(Expr::Variable(name));
        }

        self.advance();
        let mut args = Vec::new();
        if !self.at_symbol(')')? {
            loop {
                args.push(self.parse_expression()?);
                if self.at_symbol(')')? {
                    break;
                }
                if !self.at_symbol(',')? {
                    return Err(ParseError::ExpectedArgumentSeparator);
                }
                self.advance();
            }
        }
        self.advance();

        Ok(Expr::Call { callee: name, args })
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        match self.current()? {
            Token::Identifier(name) => {
                let name = name.clone();
                self.parse_identifier_expr(name)
            }
            Token::Number(value) => {
                let value = *value;
                Ok(self.parse_number_expr(value))
            }
            Token::Symbol('(') => self.parse_paren_expr(),
            _ => Err(ParseError::ExpectedExpression),
        }
    }

    /// Fold `(op primary)*` onto `lhs` for every operator binding at least
    /// as tightly as `min_prec`.
    fn parse_binop_rhs(&mut self, min_prec: i32, mut lhs: Expr) -> Result<Expr, ParseError> {
        loop {
            let Some((op, prec)) = self.current_binop().filter(|(_, prec)| *prec >= min_prec)
            else {
                return Ok(lhs);
            };
            self.advance();

            let mut rhs = self.parse_primary()?;

            // If the next operator binds tighter, it takes `rhs` as its lhs.
            if self.current_binop().is_some_and(|(_, next)| next > prec) {
                rhs = self.parse_binop_rhs(prec + 1, rhs)?;
            }

            lhs = Expr::binary(op, lhs, rhs);
        }
    }

    /// expression ::= primary binoprhs
    pub fn parse_expression(&mut self) -> Result<Expr, ParseError> {
        if self.depth == MAX_NESTING_DEPTH {
            return Err(ParseError::NestingTooDeep(MAX_NESTING_DEPTH));
        }
        self.depth += 1;
        let result = self
            .parse_primary()
            .and_then(|lhs| self.parse_binop_rhs(0, lhs));
        self.depth -= 1;
        result
    }

    /// prototype ::= identifier '(' identifier* ')'
    fn parse_prototype(&mut self) -> Result<Prototype, ParseError> {
        let Token::Identifier(name) = self.current()? else {
            return Err(ParseError::ExpectedFunctionName);
        };
        let name = name.clone();
        self.advance();

        if !self.at_symbol('(')? {
            return Err(ParseError::ExpectedParamListOpen);
        }

        let mut params = Vec::new();
        loop {
            self.advance();
            match self.current()? {
                Token::Identifier(param) => params.push(param.clone()),
                _ => break,
            }
        }

        if !self.at_symbol(')')? {
            return Err(ParseError::ExpectedParamListClose);
        }
        self.advance();

        Ok(Prototype::new(name, params))
    }

    /// definition ::= 'def' prototype expression
    fn parse_definition(&mut self) -> Result<Function, ParseError> {
        self.advance();
        let proto = self.parse_prototype()?;
        let body = self.parse_expression()?;
        Ok(Function { proto, body })
    }

    /// external ::= 'extern' prototype
    fn parse_extern(&mut self) -> Result<Prototype, ParseError> {
        self.advance();
        self.parse_prototype()
    }

    /// toplevelexpr ::= expression
    fn parse_top_level_expr(&mut self) -> Result<Function, ParseError> {
        let body = self.parse_expression()?;
        Ok(Function {
            proto: Prototype::anonymous(),
            body,
        })
    }
}
