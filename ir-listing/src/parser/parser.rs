use log::trace;

use super::lexer::{Lexer, Token, TokenKind};
use crate::error::ListingError;
use crate::ir::{
    ArrayElementKind, BinaryBranchCondition, BlockId, BinaryOperation, BranchCondition, FieldRef,
    Incoming, Instruction, IntegerKind, InvocationKind, MethodRef, NumericKind, Phi, Program,
    ProgramBuilder, SwitchCase, TryCatch, ValueType, VariableId,
};

pub fn parse_tokens(lexer: Lexer<'_>) -> Result<Program, ListingError> {
    let mut parser = Parser::new(lexer)?;
    parser.parse_program()?;
    let end = parser.peek().offset();
    parser.builder.build(end)
}

enum Comparison {
    Unary(BranchCondition),
    Binary(BinaryBranchCondition, VariableId),
}

struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Token,
    builder: ProgramBuilder,
}

impl<'a> Parser<'a> {
    fn new(mut lexer: Lexer<'a>) -> Result<Self, ListingError> {
        let current = lexer.next_token()?;
        Ok(Self { lexer, current, builder: ProgramBuilder::new() })
    }

    fn parse_program(&mut self) -> Result<(), ListingError> {
        while self.peek().is_identifier("var") {
            self.parse_variable_declaration()?;
        }

        while !self.is_at_end() {
            self.parse_statement()?;
        }

        Ok(())
    }

    /// var @this, @x
    fn parse_variable_declaration(&mut self) -> Result<(), ListingError> {
        self.advance()?; // consume 'var'
        loop {
            let (name, offset) = self.expect_variable()?;
            self.builder.define_variable(&name, offset);
            if !self.eat(&TokenKind::Comma)? {
                return Ok(());
            }
        }
    }

    fn parse_statement(&mut self) -> Result<(), ListingError> {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::Label(name) => {
                self.advance()?; // consume label
                self.expect(TokenKind::Colon, "':' after block label")?;
                self.builder.begin_block(&name, token.span.start)?;
                Ok(())
            }
            TokenKind::Variable(name) => self.parse_assignment_or_store(name, token.span.start),
            TokenKind::Identifier(keyword) => {
                self.parse_keyword_statement(&keyword, token.span.start)
            }
            _ => Err(self.error_here("expected instruction or block label")),
        }
    }

    fn parse_keyword_statement(&mut self, keyword: &str, offset: usize) -> Result<(), ListingError> {
        self.advance()?; // consume keyword

        let instruction = match keyword {
            "nop" => Instruction::Nop,
            "invoke" => self.parse_invoke(None)?,
            "field" => self.parse_put_field()?,
            "initClass" => Instruction::InitClass { class_name: self.parse_class_name()? },
            "monitorEnter" => Instruction::MonitorEnter { object: self.parse_variable()? },
            "monitorExit" => Instruction::MonitorExit { object: self.parse_variable()? },
            "goto" => Instruction::Jump { target: self.parse_label()? },
            "if" => self.parse_branch()?,
            "switch" => self.parse_switch()?,
            "return" => {
                // `@x :=` и `@x[` начинают уже следующий оператор
                let starts_statement =
                    matches!(self.peek_second(), Some(TokenKind::Assign | TokenKind::LBracket));
                let value = match self.peek().kind {
                    TokenKind::Variable(_) if !starts_statement => Some(self.parse_variable()?),
                    _ => None,
                };
                Instruction::Return { value }
            }
            "throw" => Instruction::Throw { exception: self.parse_variable()? },
            "catch" => return self.parse_catch(offset),
            _ => {
                return Err(ListingError::syntax(
                    offset,
                    format!("unknown instruction '{}'", keyword),
                ));
            }
        };

        self.emit(instruction, offset)
    }

    fn parse_assignment_or_store(&mut self, name: String, offset: usize) -> Result<(), ListingError> {
        self.advance()?; // consume variable

        match self.peek().kind {
            TokenKind::Assign => {
                self.advance()?; // consume ':='
                let receiver = self.builder.define_variable(&name, offset);
                self.parse_assignment(receiver, offset)
            }
            TokenKind::LBracket => {
                let array = self.builder.variable(&name, offset);
                let index = self.parse_subscript()?;
                self.expect(TokenKind::Assign, "':='")?;
                let value = self.parse_variable()?;
                let element_kind = self.parse_element_kind()?;
                self.emit(Instruction::PutElement { array, index, value, element_kind }, offset)
            }
            _ => Err(self.error_here(format!("expected ':=' or '[' after @{}", name))),
        }
    }

    fn parse_assignment(&mut self, receiver: VariableId, offset: usize) -> Result<(), ListingError> {
        let token = self.advance()?;

        let instruction = match token.kind {
            TokenKind::Int(value) => Instruction::IntConstant { receiver, value },
            TokenKind::Long(value) => Instruction::LongConstant { receiver, value },
            TokenKind::Float(value) => Instruction::FloatConstant { receiver, value },
            TokenKind::Double(value) => Instruction::DoubleConstant { receiver, value },
            TokenKind::StringLiteral(value) => Instruction::StringConstant { receiver, value },
            TokenKind::Minus => {
                let operand = self.parse_variable()?;
                let operand_type = self.parse_numeric_suffix()?;
                Instruction::Negate { receiver, operand_type, operand }
            }
            TokenKind::Variable(name) => {
                let first = self.builder.variable(&name, token.span.start);
                self.parse_variable_expression(receiver, first)?
            }
            TokenKind::Identifier(keyword) => match keyword.as_str() {
                "phi" => return self.parse_phi(receiver, offset),
                "exception" => return self.builder.set_exception_variable(receiver, offset),
                "null" => Instruction::NullConstant { receiver },
                "classOf" => Instruction::ClassConstant { receiver, value: self.parse_type()? },
                "cast" => self.parse_cast(receiver)?,
                "new" => self.parse_new(receiver)?,
                "invoke" => self.parse_invoke(Some(receiver))?,
                "field" => self.parse_get_field(receiver)?,
                "lengthOf" => Instruction::ArrayLength { receiver, array: self.parse_variable()? },
                "nullCheck" => Instruction::NullCheck { receiver, value: self.parse_variable()? },
                _ => {
                    return Err(ListingError::syntax(
                        token.span.start,
                        format!("unknown instruction '{}'", keyword),
                    ));
                }
            },
            _ => {
                return Err(ListingError::syntax(
                    token.span.start,
                    "expected value, variable or instruction after ':='",
                ));
            }
        };

        self.emit(instruction, offset)
    }

    /// Всё, что начинается с `@a := @b`.
    fn parse_variable_expression(
        &mut self,
        receiver: VariableId,
        first: VariableId,
    ) -> Result<Instruction, ListingError> {
        if let Some(operation) = self.binary_operation() {
            self.advance()?; // consume operator
            let second = self.parse_variable()?;
            let operand_type = self.parse_numeric_suffix()?;
            return Ok(Instruction::Binary { receiver, operation, operand_type, first, second });
        }

        match self.peek().kind {
            TokenKind::LBracket => {
                let index = self.parse_subscript()?;
                let element_kind = self.parse_element_kind()?;
                Ok(Instruction::GetElement { receiver, array: first, index, element_kind })
            }
            _ if self.peek().is_identifier("instanceOf") => {
                self.advance()?;
                let ty = self.parse_type()?;
                Ok(Instruction::IsInstance { receiver, value: first, ty })
            }
            _ => Ok(Instruction::Assign { receiver, assignee: first }),
        }
    }

    fn binary_operation(&self) -> Option<BinaryOperation> {
        let operation = match &self.peek().kind {
            TokenKind::Plus => BinaryOperation::Add,
            TokenKind::Minus => BinaryOperation::Subtract,
            TokenKind::Star => BinaryOperation::Multiply,
            TokenKind::Slash => BinaryOperation::Divide,
            TokenKind::Percent => BinaryOperation::Modulo,
            TokenKind::Ampersand => BinaryOperation::And,
            TokenKind::Pipe => BinaryOperation::Or,
            TokenKind::Caret => BinaryOperation::Xor,
            TokenKind::ShiftLeft => BinaryOperation::ShiftLeft,
            TokenKind::ShiftRight => BinaryOperation::ShiftRight,
            TokenKind::ShiftRightUnsigned => BinaryOperation::ShiftRightUnsigned,
            TokenKind::Identifier(word) if word == "compareTo" => BinaryOperation::Compare,
            _ => return None,
        };
        Some(operation)
    }

    /// @c := phi @a from $left, @b from $right
    fn parse_phi(&mut self, receiver: VariableId, offset: usize) -> Result<(), ListingError> {
        let mut incomings: Vec<Incoming> = Vec::new();

        loop {
            let value = self.parse_variable()?;
            self.expect_keyword("from")?;
            let (label, label_offset) = self.expect_label()?;
            let source = self.builder.block(&label, label_offset);

            if incomings.iter().any(|incoming| incoming.source == source) {
                return Err(ListingError::syntax(
                    label_offset,
                    format!("duplicate incoming block ${} in phi", label),
                ));
            }
            incomings.push(Incoming { value, source });

            if !self.eat(&TokenKind::Comma)? {
                break;
            }
        }

        trace!("phi with {} incomings at {}", incomings.len(), offset);
        self.builder.add_phi(Phi { receiver, incomings }, offset)
    }

    /// cast @b to T | cast @b from K1 to K2
    fn parse_cast(&mut self, receiver: VariableId) -> Result<Instruction, ListingError> {
        let value = self.parse_variable()?;

        if self.peek().is_identifier("to") {
            self.advance()?;
            let target_type = self.parse_type()?;
            return Ok(Instruction::Cast { receiver, value, target_type });
        }

        self.expect_keyword("from")?;
        let (source_name, source_offset) = self.expect_identifier("source type")?;
        self.expect_keyword("to")?;
        let (target_name, _) = self.expect_identifier("target type")?;

        let integers = IntegerKind::from_name(&source_name).zip(IntegerKind::from_name(&target_name));
        if let Some((source, target)) = integers {
            if source.is_subtype() != target.is_subtype() {
                return Ok(Instruction::CastInteger { receiver, value, source, target });
            }
        }

        let numbers = NumericKind::from_name(&source_name).zip(NumericKind::from_name(&target_name));
        match numbers {
            Some((source, target)) => Ok(Instruction::CastNumber { receiver, value, source, target }),
            None => Err(ListingError::syntax(
                source_offset,
                format!("unsupported cast from {} to {}", source_name, target_name),
            )),
        }
    }

    /// new T | new T[@n] | new T[@x][@y]
    fn parse_new(&mut self, receiver: VariableId) -> Result<Instruction, ListingError> {
        let mut item_type = self.parse_base_type()?;
        let mut dimensions = Vec::new();

        while self.peek().kind == TokenKind::LBracket {
            let bracket = self.advance()?;
            if self.eat(&TokenKind::RBracket)? {
                item_type = ValueType::array_of(item_type);
                continue;
            }
            if matches!(item_type, ValueType::Array(_)) {
                return Err(ListingError::syntax(
                    bracket.span.start,
                    "array size must precede empty dimensions",
                ));
            }
            dimensions.push(self.parse_variable()?);
            self.expect(TokenKind::RBracket, "']'")?;
        }

        let instruction = match dimensions.len() {
            0 if matches!(item_type, ValueType::Array(_)) => {
                return Err(self.error_here("expected array size"));
            }
            0 => Instruction::Construct { receiver, ty: item_type },
            1 => Instruction::ConstructArray { receiver, item_type, size: dimensions[0] },
            _ => Instruction::ConstructMultiArray { receiver, item_type, dimensions },
        };
        Ok(instruction)
    }

    /// invoke virtual `Owner.name(desc)` @instance(@args...)
    fn parse_invoke(&mut self, receiver: Option<VariableId>) -> Result<Instruction, ListingError> {
        let (kind_name, kind_offset) = self.expect_identifier("invocation kind")?;
        let kind = InvocationKind::from_name(&kind_name).ok_or_else(|| {
            ListingError::syntax(kind_offset, format!("unknown invocation kind '{}'", kind_name))
        })?;

        let (reference, reference_offset) = self.expect_quoted("method reference")?;
        let method = split_method_reference(&reference).ok_or_else(|| {
            ListingError::syntax(reference_offset, format!("malformed method reference `{}`", reference))
        })?;

        let instance = match self.peek().kind {
            TokenKind::Variable(_) => Some(self.parse_variable()?),
            _ => None,
        };

        match (kind, instance) {
            (InvocationKind::Static, Some(_)) => {
                return Err(ListingError::syntax(
                    kind_offset,
                    "static invocation must not have an instance",
                ));
            }
            (InvocationKind::Virtual | InvocationKind::Interface, None) => {
                return Err(ListingError::syntax(
                    kind_offset,
                    format!("{} invocation requires an instance", kind_name),
                ));
            }
            _ => {}
        }

        let arguments = self.parse_arguments()?;
        Ok(Instruction::Invoke { kind, method, instance, arguments, receiver })
    }

    fn parse_arguments(&mut self) -> Result<Vec<VariableId>, ListingError> {
        self.expect(TokenKind::LParen, "'('")?;
        let mut arguments = Vec::new();

        if self.eat(&TokenKind::RParen)? {
            return Ok(arguments);
        }
        loop {
            arguments.push(self.parse_variable()?);
            if !self.eat(&TokenKind::Comma)? {
                break;
            }
        }
        self.expect(TokenKind::RParen, "')'")?;
        Ok(arguments)
    }

    /// @v := field @obj `Owner.name` as T
    fn parse_get_field(&mut self, receiver: VariableId) -> Result<Instruction, ListingError> {
        let (instance, field) = self.parse_field_target()?;
        self.expect_keyword("as")?;
        let field_type = self.parse_type()?;
        Ok(Instruction::GetField { field, field_type, instance, receiver })
    }

    /// field @obj `Owner.name` := @v as T
    fn parse_put_field(&mut self) -> Result<Instruction, ListingError> {
        let (instance, field) = self.parse_field_target()?;
        self.expect(TokenKind::Assign, "':='")?;
        let value = self.parse_variable()?;
        self.expect_keyword("as")?;
        let field_type = self.parse_type()?;
        Ok(Instruction::PutField { field, field_type, instance, value })
    }

    fn parse_field_target(&mut self) -> Result<(Option<VariableId>, FieldRef), ListingError> {
        let instance = match self.peek().kind {
            TokenKind::Variable(_) => Some(self.parse_variable()?),
            _ => None,
        };

        let (reference, offset) = self.expect_quoted("field reference")?;
        let field = split_field_reference(&reference).ok_or_else(|| {
            ListingError::syntax(offset, format!("malformed field reference `{}`", reference))
        })?;
        Ok((instance, field))
    }

    /// if @a == 0 then goto $t else goto $f
    fn parse_branch(&mut self) -> Result<Instruction, ListingError> {
        let first = self.parse_variable()?;
        let operator = self.advance()?;
        let operand = self.advance()?;

        let comparison = match (&operator.kind, &operand.kind) {
            (TokenKind::Equal, TokenKind::Int(0)) => Comparison::Unary(BranchCondition::Equal),
            (TokenKind::NotEqual, TokenKind::Int(0)) => Comparison::Unary(BranchCondition::NotEqual),
            (TokenKind::Less, TokenKind::Int(0)) => Comparison::Unary(BranchCondition::Less),
            (TokenKind::LessOrEqual, TokenKind::Int(0)) => {
                Comparison::Unary(BranchCondition::LessOrEqual)
            }
            (TokenKind::Greater, TokenKind::Int(0)) => Comparison::Unary(BranchCondition::Greater),
            (TokenKind::GreaterOrEqual, TokenKind::Int(0)) => {
                Comparison::Unary(BranchCondition::GreaterOrEqual)
            }
            (TokenKind::Equal, TokenKind::Identifier(word)) if word == "null" => {
                Comparison::Unary(BranchCondition::Null)
            }
            (TokenKind::NotEqual, TokenKind::Identifier(word)) if word == "null" => {
                Comparison::Unary(BranchCondition::NotNull)
            }
            (operator_kind, TokenKind::Variable(name)) => {
                let condition = match operator_kind {
                    TokenKind::Equal => BinaryBranchCondition::Equal,
                    TokenKind::NotEqual => BinaryBranchCondition::NotEqual,
                    TokenKind::ReferenceEqual => BinaryBranchCondition::ReferenceEqual,
                    TokenKind::ReferenceNotEqual => BinaryBranchCondition::ReferenceNotEqual,
                    _ => {
                        return Err(ListingError::syntax(
                            operator.span.start,
                            "expected ==, !=, === or !== between variables",
                        ));
                    }
                };
                let second = self.builder.variable(name, operand.span.start);
                Comparison::Binary(condition, second)
            }
            _ => {
                return Err(ListingError::syntax(
                    operator.span.start,
                    "expected comparison with 0, null or a variable",
                ));
            }
        };

        self.expect_keyword("then")?;
        self.expect_keyword("goto")?;
        let consequent = self.parse_label()?;
        self.expect_keyword("else")?;
        self.expect_keyword("goto")?;
        let alternative = self.parse_label()?;

        let instruction = match comparison {
            Comparison::Unary(condition) => Instruction::Branch {
                condition,
                operand: first,
                consequent,
                alternative,
            },
            Comparison::Binary(condition, second) => Instruction::BinaryBranch {
                condition,
                first,
                second,
                consequent,
                alternative,
            },
        };
        Ok(instruction)
    }

    /// switch @a case 1 goto $one case 2 goto $two else goto $other
    fn parse_switch(&mut self) -> Result<Instruction, ListingError> {
        let condition = self.parse_variable()?;
        let mut cases: Vec<SwitchCase> = Vec::new();

        while self.peek().is_identifier("case") {
            self.advance()?;
            let token = self.advance()?;
            let TokenKind::Int(value) = token.kind else {
                return Err(ListingError::syntax(token.span.start, "expected integer case value"));
            };
            if cases.iter().any(|case| case.value == value) {
                return Err(ListingError::syntax(
                    token.span.start,
                    format!("duplicate case value {}", value),
                ));
            }
            self.expect_keyword("goto")?;
            let target = self.parse_label()?;
            cases.push(SwitchCase { value, target });
        }

        self.expect_keyword("else")?;
        self.expect_keyword("goto")?;
        let default_target = self.parse_label()?;
        Ok(Instruction::Switch { condition, cases, default_target })
    }

    /// catch java.lang.Exception goto $handler
    fn parse_catch(&mut self, offset: usize) -> Result<(), ListingError> {
        let exception_type = if self.peek().is_identifier("goto") {
            None
        } else {
            Some(self.parse_class_name()?)
        };
        self.expect_keyword("goto")?;
        let handler = self.parse_label()?;
        self.builder.add_try_catch(TryCatch { exception_type, handler }, offset)
    }

    fn parse_type(&mut self) -> Result<ValueType, ListingError> {
        let mut ty = self.parse_base_type()?;
        while self.eat(&TokenKind::LBracket)? {
            self.expect(TokenKind::RBracket, "']'")?;
            ty = ValueType::array_of(ty);
        }
        Ok(ty)
    }

    fn parse_base_type(&mut self) -> Result<ValueType, ListingError> {
        if let TokenKind::Identifier(name) = &self.peek().kind {
            if let Some(ty) = ValueType::primitive(name) {
                self.advance()?;
                return Ok(ty);
            }
        }
        Ok(ValueType::Object(self.parse_class_name()?))
    }

    /// java.lang.String или `java.lang.String`
    fn parse_class_name(&mut self) -> Result<String, ListingError> {
        let token = self.advance()?;
        let mut name = match token.kind {
            TokenKind::Quoted(name) => return Ok(name),
            TokenKind::Identifier(name) => name,
            _ => return Err(ListingError::syntax(token.span.start, "expected type name")),
        };

        while self.eat(&TokenKind::Dot)? {
            let (segment, _) = self.expect_identifier("type name segment")?;
            name.push('.');
            name.push_str(&segment);
        }
        Ok(name)
    }

    fn parse_numeric_suffix(&mut self) -> Result<NumericKind, ListingError> {
        self.expect_keyword("as")?;
        let (name, offset) = self.expect_identifier("numeric type")?;
        NumericKind::from_name(&name).ok_or_else(|| {
            ListingError::syntax(offset, format!("expected int, long, float or double, found {}", name))
        })
    }

    fn parse_element_kind(&mut self) -> Result<ArrayElementKind, ListingError> {
        self.expect_keyword("as")?;
        let (name, offset) = self.expect_identifier("array element type")?;
        ArrayElementKind::from_name(&name).ok_or_else(|| {
            ListingError::syntax(offset, format!("unknown array element type {}", name))
        })
    }

    /// [@i]
    fn parse_subscript(&mut self) -> Result<VariableId, ListingError> {
        self.expect(TokenKind::LBracket, "'['")?;
        let index = self.parse_variable()?;
        self.expect(TokenKind::RBracket, "']'")?;
        Ok(index)
    }

    fn parse_variable(&mut self) -> Result<VariableId, ListingError> {
        let (name, offset) = self.expect_variable()?;
        Ok(self.builder.variable(&name, offset))
    }

    fn parse_label(&mut self) -> Result<BlockId, ListingError> {
        let (label, offset) = self.expect_label()?;
        Ok(self.builder.block(&label, offset))
    }

    fn emit(&mut self, instruction: Instruction, offset: usize) -> Result<(), ListingError> {
        trace!("{} at {}", instruction.kind_name(), offset);
        self.builder.add_instruction(instruction, offset)
    }

    // Вспомогательные методы
    fn peek(&self) -> &Token {
        &self.current
    }

    /// Token after the current one. Lexes from a copy of the lexer, so a bad
    /// token there is still reported when the parser actually reaches it.
    fn peek_second(&self) -> Option<TokenKind> {
        self.lexer.clone().next_token().ok().map(|token| token.kind)
    }

    fn advance(&mut self) -> Result<Token, ListingError> {
        let next = self.lexer.next_token()?;
        Ok(std::mem::replace(&mut self.current, next))
    }

    fn eat(&mut self, kind: &TokenKind) -> Result<bool, ListingError> {
        if self.peek().kind == *kind {
            self.advance()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<Token, ListingError> {
        if self.peek().kind == kind {
            self.advance()
        } else {
            Err(self.error_here(format!("expected {}", what)))
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<(), ListingError> {
        if self.peek().is_identifier(keyword) {
            self.advance()?;
            Ok(())
        } else {
            Err(self.error_here(format!("expected '{}'", keyword)))
        }
    }

    fn expect_identifier(&mut self, what: &str) -> Result<(String, usize), ListingError> {
        match &self.peek().kind {
            TokenKind::Identifier(name) => {
                let result = (name.clone(), self.peek().offset());
                self.advance()?;
                Ok(result)
            }
            _ => Err(self.error_here(format!("expected {}", what))),
        }
    }

    fn expect_variable(&mut self) -> Result<(String, usize), ListingError> {
        match &self.peek().kind {
            TokenKind::Variable(name) => {
                let result = (name.clone(), self.peek().offset());
                self.advance()?;
                Ok(result)
            }
            _ => Err(self.error_here("expected variable")),
        }
    }

    fn expect_label(&mut self) -> Result<(String, usize), ListingError> {
        match &self.peek().kind {
            TokenKind::Label(label) => {
                let result = (label.clone(), self.peek().offset());
                self.advance()?;
                Ok(result)
            }
            _ => Err(self.error_here("expected block label")),
        }
    }

    fn expect_quoted(&mut self, what: &str) -> Result<(String, usize), ListingError> {
        match &self.peek().kind {
            TokenKind::Quoted(text) => {
                let result = (text.clone(), self.peek().offset());
                self.advance()?;
                Ok(result)
            }
            _ => Err(self.error_here(format!("expected {} in backquotes", what))),
        }
    }

    fn error_here(&self, message: impl Into<String>) -> ListingError {
        ListingError::syntax(self.peek().offset(), message)
    }

    fn is_at_end(&self) -> bool {
        self.peek().kind == TokenKind::End
    }
}

/// `Owner.name(desc)`: имя отделяется последней точкой перед скобкой.
fn split_method_reference(reference: &str) -> Option<MethodRef> {
    let paren = reference.find('(')?;
    let (qualified, descriptor) = reference.split_at(paren);
    let field = split_field_reference(qualified)?;
    Some(MethodRef { owner: field.owner, name: field.name, descriptor: descriptor.to_string() })
}

fn split_field_reference(reference: &str) -> Option<FieldRef> {
    let dot = reference.rfind('.')?;
    let (owner, name) = (&reference[..dot], &reference[dot + 1..]);
    if owner.is_empty() || name.is_empty() {
        return None;
    }
    Some(FieldRef { owner: owner.to_string(), name: name.to_string() })
}

#[cfg(test)]
mod tests {
    use crate::error::ListingError;
    use crate::ir::*;
    use crate::parser::parse;

    fn single_block(source: &str) -> Vec<Instruction> {
        let program = parse(source).unwrap();
        assert_eq!(1, program.basic_block_count());
        program.basic_block_at(0).instructions.clone()
    }

    fn var(n: u32) -> VariableId {
        VariableId::new(n)
    }

    fn block(n: u32) -> BlockId {
        BlockId::new(n)
    }

    #[test]
    fn constants() {
        let insns = single_block(
            "$b:\n @a := 1\n @b := -2L\n @c := 0.5F\n @d := 1e2\n @e := \"x\"\n @f := classOf int[]\n @g := null\n return",
        );
        assert_eq!(Instruction::IntConstant { receiver: var(0), value: 1 }, insns[0]);
        assert_eq!(Instruction::LongConstant { receiver: var(1), value: -2 }, insns[1]);
        assert_eq!(Instruction::FloatConstant { receiver: var(2), value: 0.5 }, insns[2]);
        assert_eq!(Instruction::DoubleConstant { receiver: var(3), value: 100.0 }, insns[3]);
        assert_eq!(Instruction::StringConstant { receiver: var(4), value: "x".into() }, insns[4]);
        assert_eq!(
            Instruction::ClassConstant { receiver: var(5), value: ValueType::array_of(ValueType::Int) },
            insns[5]
        );
        assert_eq!(Instruction::NullConstant { receiver: var(6) }, insns[6]);
        assert_eq!(Instruction::Return { value: None }, insns[7]);
    }

    #[test]
    fn arithmetic() {
        let insns = single_block(
            "var @x, @y\n$b:\n @s := @x + @y as int\n @c := @x compareTo @y as long\n @n := -@s as double\n @z := @x >>> @y as int\n return @s",
        );
        assert_eq!(
            Instruction::Binary {
                receiver: var(2),
                operation: BinaryOperation::Add,
                operand_type: NumericKind::Int,
                first: var(0),
                second: var(1),
            },
            insns[0]
        );
        assert!(matches!(insns[1], Instruction::Binary { operation: BinaryOperation::Compare, operand_type: NumericKind::Long, .. }));
        assert_eq!(
            Instruction::Negate { receiver: var(4), operand_type: NumericKind::Double, operand: var(2) },
            insns[2]
        );
        assert!(matches!(insns[3], Instruction::Binary { operation: BinaryOperation::ShiftRightUnsigned, .. }));
        assert_eq!(Instruction::Return { value: Some(var(2)) }, insns[4]);
    }

    #[test]
    fn casts() {
        let insns = single_block(
            "var @o, @i\n$b:\n @s := cast @o to java.lang.String\n @c := cast @i from int to char\n @w := cast @c from char to int\n @l := cast @i from int to long\n return",
        );
        assert_eq!(
            Instruction::Cast {
                receiver: var(2),
                value: var(0),
                target_type: ValueType::Object("java.lang.String".into()),
            },
            insns[0]
        );
        assert_eq!(
            Instruction::CastInteger {
                receiver: var(3),
                value: var(1),
                source: IntegerKind::Int,
                target: IntegerKind::Char,
            },
            insns[1]
        );
        assert!(matches!(insns[2], Instruction::CastInteger { source: IntegerKind::Char, target: IntegerKind::Int, .. }));
        assert!(matches!(insns[3], Instruction::CastNumber { source: NumericKind::Int, target: NumericKind::Long, .. }));
    }

    #[test]
    fn unsupported_cast() {
        let source = "var @i\n$b:\n @c := cast @i from byte to short\n return";
        let error = parse(source).unwrap_err();
        assert_eq!(source.find("byte").unwrap(), error.offset());
    }

    #[test]
    fn construction() {
        let insns = single_block(
            "var @n, @m\n$b:\n @o := new java.lang.Object\n @a := new int[@n]\n @g := new java.lang.String[@n][@m]\n @j := new int[@n][]\n return",
        );
        assert_eq!(
            Instruction::Construct { receiver: var(2), ty: ValueType::Object("java.lang.Object".into()) },
            insns[0]
        );
        assert_eq!(
            Instruction::ConstructArray { receiver: var(3), item_type: ValueType::Int, size: var(0) },
            insns[1]
        );
        assert_eq!(
            Instruction::ConstructMultiArray {
                receiver: var(4),
                item_type: ValueType::Object("java.lang.String".into()),
                dimensions: vec![var(0), var(1)],
            },
            insns[2]
        );
        assert_eq!(
            Instruction::ConstructArray {
                receiver: var(5),
                item_type: ValueType::array_of(ValueType::Int),
                size: var(0),
            },
            insns[3]
        );
    }

    #[test]
    fn array_without_size() {
        let source = "var @n\n$b:\n @a := new int[]\n return";
        let error = parse(source).unwrap_err();
        assert_eq!(ListingError::syntax(source.find("return").unwrap(), "expected array size"), error);
    }

    #[test]
    fn invocations() {
        let insns = single_block(
            "var @this, @x\n$b:\n @r := invoke virtual `java.lang.Object.hashCode()I` @this()\n invoke static `Foo.run(II)V` (@x, @r)\n invoke special `Foo.<init>(I)V` @this(@x)\n return",
        );
        assert_eq!(
            Instruction::Invoke {
                kind: InvocationKind::Virtual,
                method: MethodRef {
                    owner: "java.lang.Object".into(),
                    name: "hashCode".into(),
                    descriptor: "()I".into(),
                },
                instance: Some(var(0)),
                arguments: vec![],
                receiver: Some(var(2)),
            },
            insns[0]
        );
        assert!(matches!(
            &insns[1],
            Instruction::Invoke { kind: InvocationKind::Static, instance: None, arguments, receiver: None, .. }
                if arguments == &vec![var(1), var(2)]
        ));
        assert!(matches!(
            &insns[2],
            Instruction::Invoke { kind: InvocationKind::Special, instance: Some(_), method, .. }
                if method.name == "<init>"
        ));
    }

    #[test]
    fn invocation_instance_rules() {
        let source = "var @o\n$b:\n invoke static `A.f()V` @o()\n return";
        let error = parse(source).unwrap_err();
        assert_eq!(source.find("static").unwrap(), error.offset());

        let source = "$b:\n invoke interface `A.f()V` ()\n return";
        let error = parse(source).unwrap_err();
        assert_eq!(source.find("interface").unwrap(), error.offset());

        let source = "$b:\n invoke dynamic `A.f()V` ()\n return";
        assert_eq!(source.find("dynamic").unwrap(), parse(source).unwrap_err().offset());

        let source = "$b:\n invoke static `f()V` ()\n return";
        assert_eq!(source.find('`').unwrap(), parse(source).unwrap_err().offset());
    }

    #[test]
    fn fields_and_arrays() {
        let insns = single_block(
            "var @o, @v, @a, @i\n$b:\n @x := field @o `Foo.bar` as int\n field `Foo.count` := @v as long\n @l := lengthOf @a\n @e := @a[@i] as object\n @a[@i] := @e as object\n @k := @o instanceOf Foo\n @c := nullCheck @o\n return",
        );
        assert_eq!(
            Instruction::GetField {
                field: FieldRef { owner: "Foo".into(), name: "bar".into() },
                field_type: ValueType::Int,
                instance: Some(var(0)),
                receiver: var(4),
            },
            insns[0]
        );
        assert_eq!(
            Instruction::PutField {
                field: FieldRef { owner: "Foo".into(), name: "count".into() },
                field_type: ValueType::Long,
                instance: None,
                value: var(1),
            },
            insns[1]
        );
        assert_eq!(Instruction::ArrayLength { receiver: var(5), array: var(2) }, insns[2]);
        assert_eq!(
            Instruction::GetElement {
                receiver: var(6),
                array: var(2),
                index: var(3),
                element_kind: ArrayElementKind::Object,
            },
            insns[3]
        );
        assert_eq!(
            Instruction::PutElement {
                array: var(2),
                index: var(3),
                value: var(6),
                element_kind: ArrayElementKind::Object,
            },
            insns[4]
        );
        assert!(matches!(insns[5], Instruction::IsInstance { .. }));
        assert_eq!(Instruction::NullCheck { receiver: var(8), value: var(0) }, insns[6]);
    }

    #[test]
    fn misc_statements() {
        let insns = single_block("var @o\n$b:\n nop\n initClass java.lang.Math\n monitorEnter @o\n monitorExit @o\n throw @o");
        assert_eq!(Instruction::Nop, insns[0]);
        assert_eq!(Instruction::InitClass { class_name: "java.lang.Math".into() }, insns[1]);
        assert_eq!(Instruction::MonitorEnter { object: var(0) }, insns[2]);
        assert_eq!(Instruction::MonitorExit { object: var(0) }, insns[3]);
        assert_eq!(Instruction::Throw { exception: var(0) }, insns[4]);
    }

    #[test]
    fn branches() {
        let program = parse(
            "var @a, @b\n$s:\n if @a < 0 then goto $t else goto $f\n$t:\n if @a === @b then goto $f else goto $s\n$f:\n if @a != null then goto $s else goto $t",
        )
        .unwrap();
        assert_eq!(
            Instruction::Branch {
                condition: BranchCondition::Less,
                operand: var(0),
                consequent: block(1),
                alternative: block(2),
            },
            program.basic_block_at(0).instructions[0]
        );
        assert_eq!(
            Instruction::BinaryBranch {
                condition: BinaryBranchCondition::ReferenceEqual,
                first: var(0),
                second: var(1),
                consequent: block(2),
                alternative: block(0),
            },
            program.basic_block_at(1).instructions[0]
        );
        assert!(matches!(
            program.basic_block_at(2).instructions[0],
            Instruction::Branch { condition: BranchCondition::NotNull, .. }
        ));
    }

    #[test]
    fn bad_branch_comparison() {
        let source = "var @a\n$s:\n if @a == 5 then goto $s else goto $s";
        assert_eq!(source.find("==").unwrap(), parse(source).unwrap_err().offset());

        let source = "var @a, @b\n$s:\n if @a < @b then goto $s else goto $s";
        assert_eq!(source.find('<').unwrap(), parse(source).unwrap_err().offset());
    }

    #[test]
    fn switch_cases() {
        let program = parse(
            "var @a\n$s:\n switch @a case 1 goto $one case -3 goto $two else goto $s\n$one:\n return\n$two:\n return",
        )
        .unwrap();
        assert_eq!(
            Instruction::Switch {
                condition: var(0),
                cases: vec![
                    SwitchCase { value: 1, target: block(1) },
                    SwitchCase { value: -3, target: block(2) },
                ],
                default_target: block(0),
            },
            program.basic_block_at(0).instructions[0]
        );
    }

    #[test]
    fn duplicate_switch_case() {
        let source = "var @a\n$s:\n switch @a case 1 goto $s case 1 goto $s else goto $s";
        assert_eq!(source.rfind("1 goto").unwrap(), parse(source).unwrap_err().offset());
    }

    #[test]
    fn phis() {
        let program = parse(
            "var @c\n$s:\n if @c == 0 then goto $l else goto $r\n$l:\n @x := 1\n goto $j\n$r:\n @y := 2\n goto $j\n$j:\n @z := phi @x from $l, @y from $r\n return @z",
        )
        .unwrap();
        let join = program.basic_block_at(3);
        assert_eq!(
            vec![Phi {
                receiver: var(3),
                incomings: vec![
                    Incoming { value: var(1), source: block(1) },
                    Incoming { value: var(2), source: block(2) },
                ],
            }],
            join.phis
        );
        assert_eq!(1, join.instructions.len());
    }

    #[test]
    fn duplicate_phi_source() {
        let source = "var @a\n$s:\n goto $j\n$j:\n @z := phi @a from $s, @a from $s\n return";
        let error = parse(source).unwrap_err();
        assert_eq!(ListingError::syntax(source.rfind("$s").unwrap(), "duplicate incoming block $s in phi"), error);
    }

    #[test]
    fn phi_after_instruction() {
        let source = "var @a\n$s:\n nop\n @z := phi @a from $s\n return";
        assert_eq!(source.find("@z").unwrap(), parse(source).unwrap_err().offset());
    }

    #[test]
    fn phi_operand_ahead_of_definition() {
        let program = parse(
            "$s:\n @z := 0\n goto $l\n$l:\n @i := phi @z from $s, @n from $l\n @n := @i + @z as int\n goto $l",
        )
        .unwrap();
        let names: Vec<_> = program.variables().iter().map(|v| v.name.as_deref().unwrap_or_default()).collect();
        assert_eq!(vec!["z", "i", "n"], names);
        assert_eq!(Incoming { value: var(2), source: block(1) }, program.basic_block_at(1).phis[0].incomings[1]);
    }

    #[test]
    fn duplicate_exception_variable() {
        let source = "$h:\n @e := exception\n @f := exception\n return";
        let error = parse(source).unwrap_err();
        assert_eq!(
            ListingError::syntax(source.find("@f").unwrap(), "block $h already has an exception variable"),
            error
        );
    }

    #[test]
    fn exception_variable_after_throw() {
        let source = "$h:\n throw @e\n @e := exception";
        let error = parse(source).unwrap_err();
        assert_eq!(
            ListingError::syntax(source.rfind("@e").unwrap(), "exception variable after the end of block $h"),
            error
        );
    }

    #[test]
    fn return_does_not_swallow_next_statement() {
        let source = "$a:\n return\n @x := 1\n";
        let error = parse(source).unwrap_err();
        assert_eq!(
            ListingError::syntax(source.find("@x").unwrap(), "instruction after the end of block $a"),
            error
        );

        let source = "var @arr, @i\n$a:\n return\n @arr[@i] := @i as int";
        assert_eq!(source.rfind("@arr").unwrap(), parse(source).unwrap_err().offset());

        let program = parse("var @v\n$a:\n return @v\n$b:\n return").unwrap();
        assert_eq!(
            Instruction::Return { value: Some(var(0)) },
            program.basic_block_at(0).instructions[0]
        );
    }

    #[test]
    fn exception_handlers() {
        let program = parse(
            "$s:\n invoke static `A.f()V` ()\n goto $e\n catch java.lang.RuntimeException goto $h\n catch goto $h\n$h:\n @x := exception\n throw @x\n$e:\n return",
        )
        .unwrap();
        let start = program.basic_block_at(0);
        assert_eq!(
            vec![
                TryCatch { exception_type: Some("java.lang.RuntimeException".into()), handler: block(2) },
                TryCatch { exception_type: None, handler: block(2) },
            ],
            start.try_catches
        );
        assert_eq!(vec![block(1), block(2)], start.successors());
        assert_eq!(Some(var(0)), program.basic_block_at(2).exception_variable);
        assert_eq!("h", program.basic_block(block(2)).label);
    }

    #[test]
    fn first_occurrence_ordering() {
        let program = parse("$a:\n goto $c\n$b:\n goto $a\n$c:\n goto $b").unwrap();
        let labels: Vec<_> = program.basic_blocks().iter().map(|b| b.label.as_str()).collect();
        assert_eq!(vec!["a", "c", "b"], labels);
        assert_eq!(Instruction::Jump { target: block(2) }, program.basic_block_at(1).instructions[0]);
    }

    #[test]
    fn unknown_instruction() {
        let source = "$s:\n  frobnicate @a\n  return";
        let error = parse(source).unwrap_err();
        assert_eq!(ListingError::syntax(6, "unknown instruction 'frobnicate'"), error);

        let source = "$s:\n  @a := frobnicate\n  return";
        assert_eq!(source.find("frob").unwrap(), parse(source).unwrap_err().offset());
    }

    #[test]
    fn structural_errors() {
        assert_eq!(ListingError::syntax(0, "expected block label"), parse("return").unwrap_err());
        assert_eq!(3, parse("$a return").unwrap_err().offset());
        assert_eq!(
            ListingError::syntax(4, "block $a has no instructions"),
            parse("$a:\n$b:\n return").unwrap_err()
        );
        let source = "$a:\n return\n nop";
        assert_eq!(source.find("nop").unwrap(), parse(source).unwrap_err().offset());
        let source = "$a:\n return\n$a:\n return";
        assert_eq!(source.rfind("$a").unwrap(), parse(source).unwrap_err().offset());
        assert_eq!(4, parse("$a:\n := 1").unwrap_err().offset());
    }

    #[test]
    fn unresolved_references() {
        let source = "$a:\n goto $nowhere";
        assert_eq!(
            ListingError::unresolved(10, "block $nowhere is never defined"),
            parse(source).unwrap_err()
        );

        let source = "$a:\n return @ghost";
        assert!(matches!(
            parse(source).unwrap_err(),
            ListingError::UnresolvedReference { offset: 12, .. }
        ));
    }

    #[test]
    fn lexical_error_propagates() {
        let error = parse("$a:\n @s := \"open\n return").unwrap_err();
        assert_eq!(ListingError::lexical(11, "unterminated string literal"), error);
    }

    #[test]
    fn empty_input() {
        let program = parse("  // nothing here\n").unwrap();
        assert_eq!(0, program.basic_block_count());
    }
}
