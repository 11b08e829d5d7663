use std::collections::HashMap;

use log::{debug, trace};

use crate::error::ListingError;

use super::ids::{BlockId, VariableId};
use super::program::{BasicBlock, Instruction, Phi, Program, TryCatch, Variable};

/// Первое появление имени в тексте и было ли оно определено.
#[derive(Debug, Clone, Copy)]
struct Symbol {
    first_offset: usize,
    defined: bool,
}

/// Интернирует имена в индексы и собирает блоки в порядке появления.
///
/// Индекс имени назначается при первом появлении, будь то объявление или
/// ссылка вперёд, и больше не меняется. Существование всех имён проверяется
/// один раз, в [`ProgramBuilder::build`].
#[derive(Debug, Default)]
pub struct ProgramBuilder {
    variables: Vec<Variable>,
    variable_symbols: Vec<Symbol>,
    variable_names: HashMap<String, VariableId>,

    blocks: Vec<BasicBlock>,
    block_symbols: Vec<Symbol>,
    block_names: HashMap<String, BlockId>,

    current: Option<BlockId>,
    // в текущем блоке уже были не-phi операторы
    body_started: bool,
}

impl ProgramBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reference to a variable in operand position.
    pub fn variable(&mut self, name: &str, offset: usize) -> VariableId {
        if let Some(&id) = self.variable_names.get(name) {
            return id;
        }

        let id = VariableId::new(self.variables.len() as u32);
        trace!("variable @{} -> {}", name, id.index());
        self.variables.push(Variable { index: id, name: Some(name.to_string()) });
        self.variable_symbols.push(Symbol { first_offset: offset, defined: false });
        self.variable_names.insert(name.to_string(), id);
        id
    }

    /// `var @x`, assignment destination, phi receiver or exception variable.
    pub fn define_variable(&mut self, name: &str, offset: usize) -> VariableId {
        let id = self.variable(name, offset);
        self.variable_symbols[id.index()].defined = true;
        id
    }

    /// Reference to a block label, possibly ahead of its declaration.
    pub fn block(&mut self, label: &str, offset: usize) -> BlockId {
        if let Some(&id) = self.block_names.get(label) {
            return id;
        }

        let id = BlockId::new(self.blocks.len() as u32);
        trace!("block ${} -> {}", label, id.index());
        self.blocks.push(BasicBlock::empty(id, label.to_string()));
        self.block_symbols.push(Symbol { first_offset: offset, defined: false });
        self.block_names.insert(label.to_string(), id);
        id
    }

    /// Starts the block headed by `label`. The previous block must have at
    /// least one instruction by now.
    pub fn begin_block(&mut self, label: &str, offset: usize) -> Result<BlockId, ListingError> {
        self.finish_block(offset)?;

        let id = self.block(label, offset);
        let symbol = &mut self.block_symbols[id.index()];
        if symbol.defined {
            return Err(ListingError::syntax(
                offset,
                format!("block ${} is already defined", label),
            ));
        }
        symbol.defined = true;

        debug!("begin block ${} ({})", label, id.index());
        self.current = Some(id);
        self.body_started = false;
        Ok(id)
    }

    pub fn add_phi(&mut self, phi: Phi, offset: usize) -> Result<(), ListingError> {
        if self.body_started {
            return Err(ListingError::syntax(
                offset,
                "phi must precede all other statements of a block",
            ));
        }
        self.current_mut(offset)?.phis.push(phi);
        Ok(())
    }

    pub fn add_instruction(
        &mut self,
        instruction: Instruction,
        offset: usize,
    ) -> Result<(), ListingError> {
        let block = self.current_mut(offset)?;
        if block.last_instruction().is_some_and(Instruction::is_terminator) {
            return Err(ListingError::syntax(
                offset,
                format!("instruction after the end of block ${}", block.label),
            ));
        }
        block.instructions.push(instruction);
        self.body_started = true;
        Ok(())
    }

    pub fn add_try_catch(&mut self, try_catch: TryCatch, offset: usize) -> Result<(), ListingError> {
        self.current_mut(offset)?.try_catches.push(try_catch);
        self.body_started = true;
        Ok(())
    }

    pub fn set_exception_variable(
        &mut self,
        variable: VariableId,
        offset: usize,
    ) -> Result<(), ListingError> {
        let block = self.current_mut(offset)?;
        if block.last_instruction().is_some_and(Instruction::is_terminator) {
            return Err(ListingError::syntax(
                offset,
                format!("exception variable after the end of block ${}", block.label),
            ));
        }
        if block.exception_variable.is_some() {
            return Err(ListingError::syntax(
                offset,
                format!("block ${} already has an exception variable", block.label),
            ));
        }
        block.exception_variable = Some(variable);
        self.body_started = true;
        Ok(())
    }

    /// Finishes the last block and checks that every referenced name was
    /// defined. `end_offset` is where the input ended.
    pub fn build(mut self, end_offset: usize) -> Result<Program, ListingError> {
        self.finish_block(end_offset)?;

        let unresolved_variable = self
            .variable_symbols
            .iter()
            .zip(&self.variables)
            .filter(|(symbol, _)| !symbol.defined)
            .map(|(symbol, variable)| {
                let name = variable.name.as_deref().unwrap_or_default();
                (symbol.first_offset, format!("variable @{} is never defined", name))
            })
            .min_by_key(|(offset, _)| *offset);

        let unresolved_block = self
            .block_symbols
            .iter()
            .zip(&self.blocks)
            .filter(|(symbol, _)| !symbol.defined)
            .map(|(symbol, block)| {
                (symbol.first_offset, format!("block ${} is never defined", block.label))
            })
            .min_by_key(|(offset, _)| *offset);

        let unresolved = match (unresolved_variable, unresolved_block) {
            (Some(v), Some(b)) => Some(if v.0 <= b.0 { v } else { b }),
            (v, b) => v.or(b),
        };
        if let Some((offset, message)) = unresolved {
            return Err(ListingError::unresolved(offset, message));
        }

        debug!(
            "built program: {} blocks, {} variables",
            self.blocks.len(),
            self.variables.len()
        );
        Ok(Program::new(self.variables, self.blocks))
    }

    fn finish_block(&mut self, offset: usize) -> Result<(), ListingError> {
        if let Some(id) = self.current {
            let block = &self.blocks[id.index()];
            if block.instructions.is_empty() {
                return Err(ListingError::syntax(
                    offset,
                    format!("block ${} has no instructions", block.label),
                ));
            }
        }
        Ok(())
    }

    fn current_mut(&mut self, offset: usize) -> Result<&mut BasicBlock, ListingError> {
        match self.current {
            Some(id) => Ok(&mut self.blocks[id.index()]),
            None => Err(ListingError::syntax(offset, "expected block label")),
        }
    }
}
