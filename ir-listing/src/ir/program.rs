use super::ids::{BlockId, VariableId};

/// Граф потока управления, прочитанный из листинга.
/// Блок с индексом 0 всегда входной.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Program {
    variables: Vec<Variable>,
    blocks: Vec<BasicBlock>,
}

impl Program {
    pub(crate) fn new(variables: Vec<Variable>, blocks: Vec<BasicBlock>) -> Self {
        Self { variables, blocks }
    }

    pub fn variable_count(&self) -> usize {
        self.variables.len()
    }

    pub fn variable_at(&self, index: usize) -> &Variable {
        &self.variables[index]
    }

    pub fn variable(&self, id: VariableId) -> &Variable {
        &self.variables[id.index()]
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn basic_block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn basic_block_at(&self, index: usize) -> &BasicBlock {
        &self.blocks[index]
    }

    pub fn basic_block(&self, id: BlockId) -> &BasicBlock {
        &self.blocks[id.index()]
    }

    pub fn basic_blocks(&self) -> &[BasicBlock] {
        &self.blocks
    }

    /// Looks a block up by the label it had in the listing.
    pub fn block_by_label(&self, label: &str) -> Option<&BasicBlock> {
        self.blocks.iter().find(|block| block.label == label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    pub index: VariableId,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BasicBlock {
    pub index: BlockId,
    pub label: String,
    pub phis: Vec<Phi>,
    pub instructions: Vec<Instruction>,
    /// Обработчики исключений, защищающие этот блок.
    pub try_catches: Vec<TryCatch>,
    /// `@e := exception` в блоке-обработчике.
    pub exception_variable: Option<VariableId>,
}

impl BasicBlock {
    pub(crate) fn empty(index: BlockId, label: String) -> Self {
        Self {
            index,
            label,
            phis: Vec::new(),
            instructions: Vec::new(),
            try_catches: Vec::new(),
            exception_variable: None,
        }
    }

    pub fn phis(&self) -> &[Phi] {
        &self.phis
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn last_instruction(&self) -> Option<&Instruction> {
        self.instructions.last()
    }

    /// Normal successors followed by exception handlers, without duplicates.
    pub fn successors(&self) -> Vec<BlockId> {
        let mut result = Vec::new();
        let handlers = self.try_catches.iter().map(|try_catch| try_catch.handler);
        let targets = self
            .instructions
            .iter()
            .flat_map(Instruction::successors)
            .chain(handlers);

        for target in targets {
            if !result.contains(&target) {
                result.push(target);
            }
        }

        result
    }
}

/// `@c := phi @a from $left, @b from $right`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Phi {
    pub receiver: VariableId,
    pub incomings: Vec<Incoming>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Incoming {
    pub value: VariableId,
    pub source: BlockId,
}

/// `catch java.lang.Exception goto $handler`; без типа ловит всё.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TryCatch {
    pub exception_type: Option<String>,
    pub handler: BlockId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueType {
    Boolean,
    Byte,
    Short,
    Char,
    Int,
    Long,
    Float,
    Double,
    Void,
    /// java.lang.String
    Object(String),
    /// int[]
    Array(Box<ValueType>),
}

impl ValueType {
    pub fn primitive(name: &str) -> Option<Self> {
        let ty = match name {
            "boolean" => Self::Boolean,
            "byte" => Self::Byte,
            "short" => Self::Short,
            "char" => Self::Char,
            "int" => Self::Int,
            "long" => Self::Long,
            "float" => Self::Float,
            "double" => Self::Double,
            "void" => Self::Void,
            _ => return None,
        };
        Some(ty)
    }

    pub fn array_of(item: ValueType) -> Self {
        Self::Array(Box::new(item))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericKind {
    Int,
    Long,
    Float,
    Double,
}

impl NumericKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "int" => Some(Self::Int),
            "long" => Some(Self::Long),
            "float" => Some(Self::Float),
            "double" => Some(Self::Double),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegerKind {
    Byte,
    Short,
    Char,
    Int,
}

impl IntegerKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "byte" => Some(Self::Byte),
            "short" => Some(Self::Short),
            "char" => Some(Self::Char),
            "int" => Some(Self::Int),
            _ => None,
        }
    }

    /// byte, short и char; int сюда не входит.
    pub fn is_subtype(self) -> bool {
        self != Self::Int
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayElementKind {
    Byte,
    Short,
    Char,
    Int,
    Long,
    Float,
    Double,
    Object,
}

impl ArrayElementKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "byte" => Some(Self::Byte),
            "short" => Some(Self::Short),
            "char" => Some(Self::Char),
            "int" => Some(Self::Int),
            "long" => Some(Self::Long),
            "float" => Some(Self::Float),
            "double" => Some(Self::Double),
            "object" => Some(Self::Object),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperation {
    Add,                // +
    Subtract,           // -
    Multiply,           // *
    Divide,             // /
    Modulo,             // %
    And,                // &
    Or,                 // |
    Xor,                // ^
    ShiftLeft,          // <<
    ShiftRight,         // >>
    ShiftRightUnsigned, // >>>
    Compare,            // compareTo
}

/// Сравнение одного операнда с нулём или null.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchCondition {
    Equal,
    NotEqual,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
    Null,
    NotNull,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryBranchCondition {
    Equal,
    NotEqual,
    ReferenceEqual,
    ReferenceNotEqual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationKind {
    Virtual,
    Special,
    Static,
    Interface,
}

impl InvocationKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "virtual" => Some(Self::Virtual),
            "special" => Some(Self::Special),
            "static" => Some(Self::Static),
            "interface" => Some(Self::Interface),
            _ => None,
        }
    }
}

/// `java.lang.Object.equals(Ljava/lang/Object;)Z`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodRef {
    pub owner: String,
    pub name: String,
    pub descriptor: String,
}

/// `java.lang.System.out`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRef {
    pub owner: String,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwitchCase {
    pub value: i32,
    pub target: BlockId,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    /// nop
    Nop,
    /// @a := 1
    IntConstant { receiver: VariableId, value: i32 },
    /// @a := 1L
    LongConstant { receiver: VariableId, value: i64 },
    /// @a := 1.5F
    FloatConstant { receiver: VariableId, value: f32 },
    /// @a := 1.5
    DoubleConstant { receiver: VariableId, value: f64 },
    /// @a := "text"
    StringConstant { receiver: VariableId, value: String },
    /// @a := classOf java.lang.String
    ClassConstant { receiver: VariableId, value: ValueType },
    /// @a := null
    NullConstant { receiver: VariableId },
    /// @a := @b
    Assign { receiver: VariableId, assignee: VariableId },
    /// @a := @b + @c as int
    Binary {
        receiver: VariableId,
        operation: BinaryOperation,
        operand_type: NumericKind,
        first: VariableId,
        second: VariableId,
    },
    /// @a := -@b as int
    Negate {
        receiver: VariableId,
        operand_type: NumericKind,
        operand: VariableId,
    },
    /// @a := cast @b to java.lang.String
    Cast {
        receiver: VariableId,
        value: VariableId,
        target_type: ValueType,
    },
    /// @a := cast @b from int to byte
    CastInteger {
        receiver: VariableId,
        value: VariableId,
        source: IntegerKind,
        target: IntegerKind,
    },
    /// @a := cast @b from int to long
    CastNumber {
        receiver: VariableId,
        value: VariableId,
        source: NumericKind,
        target: NumericKind,
    },
    /// @a := new java.lang.Object
    Construct { receiver: VariableId, ty: ValueType },
    /// @a := new int[@n]
    ConstructArray {
        receiver: VariableId,
        item_type: ValueType,
        size: VariableId,
    },
    /// @a := new int[@x][@y]
    ConstructMultiArray {
        receiver: VariableId,
        item_type: ValueType,
        dimensions: Vec<VariableId>,
    },
    /// @r := invoke virtual `Foo.bar(I)V` @obj(@x)
    Invoke {
        kind: InvocationKind,
        method: MethodRef,
        instance: Option<VariableId>,
        arguments: Vec<VariableId>,
        receiver: Option<VariableId>,
    },
    /// @v := field @obj `Foo.bar` as int
    GetField {
        field: FieldRef,
        field_type: ValueType,
        instance: Option<VariableId>,
        receiver: VariableId,
    },
    /// field @obj `Foo.bar` := @v as int
    PutField {
        field: FieldRef,
        field_type: ValueType,
        instance: Option<VariableId>,
        value: VariableId,
    },
    /// @a := lengthOf @arr
    ArrayLength { receiver: VariableId, array: VariableId },
    /// @a := @arr[@i] as int
    GetElement {
        receiver: VariableId,
        array: VariableId,
        index: VariableId,
        element_kind: ArrayElementKind,
    },
    /// @arr[@i] := @v as int
    PutElement {
        array: VariableId,
        index: VariableId,
        value: VariableId,
        element_kind: ArrayElementKind,
    },
    /// @a := @b instanceOf java.lang.String
    IsInstance {
        receiver: VariableId,
        value: VariableId,
        ty: ValueType,
    },
    /// @a := nullCheck @b
    NullCheck { receiver: VariableId, value: VariableId },
    /// initClass java.lang.Math
    InitClass { class_name: String },
    /// monitorEnter @a
    MonitorEnter { object: VariableId },
    /// monitorExit @a
    MonitorExit { object: VariableId },
    /// goto $next
    Jump { target: BlockId },
    /// if @a == 0 then goto $t else goto $f
    Branch {
        condition: BranchCondition,
        operand: VariableId,
        consequent: BlockId,
        alternative: BlockId,
    },
    /// if @a === @b then goto $t else goto $f
    BinaryBranch {
        condition: BinaryBranchCondition,
        first: VariableId,
        second: VariableId,
        consequent: BlockId,
        alternative: BlockId,
    },
    /// switch @a case 1 goto $one else goto $other
    Switch {
        condition: VariableId,
        cases: Vec<SwitchCase>,
        default_target: BlockId,
    },
    /// return / return @a
    Return { value: Option<VariableId> },
    /// throw @e
    Throw { exception: VariableId },
}

impl Instruction {
    /// Instructions after which nothing else may follow in a block.
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            Instruction::Jump { .. }
                | Instruction::Branch { .. }
                | Instruction::BinaryBranch { .. }
                | Instruction::Switch { .. }
                | Instruction::Return { .. }
                | Instruction::Throw { .. }
        )
    }

    pub fn successors(&self) -> Vec<BlockId> {
        match self {
            Instruction::Jump { target } => vec![*target],
            Instruction::Branch { consequent, alternative, .. }
            | Instruction::BinaryBranch { consequent, alternative, .. } => {
                vec![*consequent, *alternative]
            }
            Instruction::Switch { cases, default_target, .. } => cases
                .iter()
                .map(|case| case.target)
                .chain(std::iter::once(*default_target))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Short kind name, as printed by the `listing` tool.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Instruction::Nop => "nop",
            Instruction::IntConstant { .. } => "int-constant",
            Instruction::LongConstant { .. } => "long-constant",
            Instruction::FloatConstant { .. } => "float-constant",
            Instruction::DoubleConstant { .. } => "double-constant",
            Instruction::StringConstant { .. } => "string-constant",
            Instruction::ClassConstant { .. } => "class-constant",
            Instruction::NullConstant { .. } => "null-constant",
            Instruction::Assign { .. } => "assign",
            Instruction::Binary { .. } => "binary",
            Instruction::Negate { .. } => "negate",
            Instruction::Cast { .. } => "cast",
            Instruction::CastInteger { .. } => "cast-integer",
            Instruction::CastNumber { .. } => "cast-number",
            Instruction::Construct { .. } => "construct",
            Instruction::ConstructArray { .. } => "construct-array",
            Instruction::ConstructMultiArray { .. } => "construct-multi-array",
            Instruction::Invoke { .. } => "invoke",
            Instruction::GetField { .. } => "get-field",
            Instruction::PutField { .. } => "put-field",
            Instruction::ArrayLength { .. } => "array-length",
            Instruction::GetElement { .. } => "get-element",
            Instruction::PutElement { .. } => "put-element",
            Instruction::IsInstance { .. } => "is-instance",
            Instruction::NullCheck { .. } => "null-check",
            Instruction::InitClass { .. } => "init-class",
            Instruction::MonitorEnter { .. } => "monitor-enter",
            Instruction::MonitorExit { .. } => "monitor-exit",
            Instruction::Jump { .. } => "jump",
            Instruction::Branch { .. } => "branch",
            Instruction::BinaryBranch { .. } => "binary-branch",
            Instruction::Switch { .. } => "switch",
            Instruction::Return { .. } => "return",
            Instruction::Throw { .. } => "throw",
        }
    }
}
