//! Opcode definitions for the actor behavior instruction set.
//!
//! Every instruction is an opcode word followed by a fixed number of operand
//! words, described by [`Opcode::operands`]. `switch` is the only opcode
//! whose length depends on its own operands (the case count).

use crate::error::DecodeError;

/// What an operand word means.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operand {
    /// Inline integer literal.
    Literal,
    /// Variable identifier (index into the program's variable declarations).
    Var,
    /// Absolute offset of an instruction in the same stream.
    Target,
    /// Absolute offset of a data record in the same stream (0 = none).
    Record(RecordKind),
    /// Variable identifier holding a handle, or [`SELF_HANDLE`].
    Handle,
    /// Host-defined field identifier.
    Field,
}

/// Data record layouts embedded in the instruction stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    /// `[start_frame, frame_count, view_count, increment, delay]`
    Action,
    /// `[action_record, move_record, move_flags]`
    Ai,
    /// `[horizontal_velocity, vertical_velocity]`
    Move,
}

impl RecordKind {
    /// Number of words in a record of this kind.
    pub fn len(self) -> usize {
        match self {
            RecordKind::Action => 5,
            RecordKind::Ai => 3,
            RecordKind::Move => 2,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            RecordKind::Action => "action",
            RecordKind::Ai => "ai",
            RecordKind::Move => "move",
        }
    }
}

/// Handle operand value meaning "the frame's own entity / player / sector".
pub const SELF_HANDLE: i32 = -1;

/// Number of fixed operands in front of a `switch` case table:
/// variable, end offset, case count, default offset.
pub const SWITCH_HEADER: usize = 4;

/// Identifies the operation to perform.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    // Control
    /// Run a nested block until a terminal opcode.
    LeftBrace = 0x01,
    /// Close the innermost block. Terminal.
    RightBrace = 0x02,
    /// Else marker. Reached by fall-through, jumps past the else body.
    Else = 0x03,
    /// Call the subroutine at the target offset.
    State = 0x04,
    /// Multi-way branch over a variable.
    Switch = 0x05,
    /// End of a switch case body. Terminal.
    EndSwitch = 0x06,
    /// End of an actor script. Terminal.
    EndActor = 0x07,
    /// End of a state subroutine. Terminal.
    EndState = 0x08,
    /// End of an event handler. Terminal.
    EndEvent = 0x09,
    /// Explicit break. Terminal.
    Break = 0x0A,
    /// No operation.
    NullOp = 0x0B,
    /// Request deletion of the frame's entity.
    KillIt = 0x0C,

    // Conditionals: operands are followed by a false-branch target.
    IfRnd = 0x10,
    IfCount = 0x11,
    IfActionCount = 0x12,
    IfAction = 0x13,
    IfAi = 0x14,
    IfMove = 0x15,
    IfPDistL = 0x16,
    IfPDistG = 0x17,
    IfVarE = 0x18,
    IfVarN = 0x19,
    IfVarG = 0x1A,
    IfVarL = 0x1B,
    IfVarAnd = 0x1C,
    IfVarVarE = 0x1D,
    IfVarVarN = 0x1E,
    IfVarVarG = 0x1F,
    IfVarVarL = 0x20,
    IfVarVarAnd = 0x21,
    IfCanSee = 0x22,
    IfCanSeeTarget = 0x23,
    IfCanShootTarget = 0x24,
    IfHitWeapon = 0x25,
    IfSquished = 0x26,
    IfDead = 0x27,
    IfProbe = 0x28,

    // Actor state
    Ai = 0x30,
    Action = 0x31,
    Move = 0x32,
    Count = 0x33,
    ResetCount = 0x34,
    ResetActionCount = 0x35,
    SleepTime = 0x36,

    // Variables
    SetVar = 0x40,
    SetVarVar = 0x41,
    AddVar = 0x42,
    AddVarVar = 0x43,
    SubVar = 0x44,
    SubVarVar = 0x45,
    MulVar = 0x46,
    MulVarVar = 0x47,
    DivVar = 0x48,
    DivVarVar = 0x49,
    ModVar = 0x4A,
    ModVarVar = 0x4B,
    AndVar = 0x4C,
    AndVarVar = 0x4D,
    OrVar = 0x4E,
    OrVarVar = 0x4F,
    XorVar = 0x50,
    XorVarVar = 0x51,
    RandVar = 0x52,
    RandVarVar = 0x53,
    DisplayRand = 0x54,

    // Cross-entity variables
    GetActorVar = 0x58,
    SetActorVar = 0x59,

    // Field accessors
    GetActor = 0x60,
    SetActor = 0x61,
    GetPlayer = 0x62,
    SetPlayer = 0x63,
    GetSector = 0x64,
    SetSector = 0x65,
    GetWall = 0x66,
    SetWall = 0x67,
    GetUserDef = 0x68,
    SetUserDef = 0x69,

    // Host effects
    Spawn = 0x70,
    ESpawn = 0x71,
    Shoot = 0x72,
    Sound = 0x73,
    GlobalSound = 0x74,
    StopSound = 0x75,
    Damage = 0x76,
    HitRadius = 0x77,
    MoveEntity = 0x78,
    ChangeStat = 0x79,
    GiveItem = 0x7A,
    Debug = 0x7B,
}

/// All valid opcodes, in definition order.
pub const ALL_OPCODES: [Opcode; 89] = [
    Opcode::LeftBrace,
    Opcode::RightBrace,
    Opcode::Else,
    Opcode::State,
    Opcode::Switch,
    Opcode::EndSwitch,
    Opcode::EndActor,
    Opcode::EndState,
    Opcode::EndEvent,
    Opcode::Break,
    Opcode::NullOp,
    Opcode::KillIt,
    Opcode::IfRnd,
    Opcode::IfCount,
    Opcode::IfActionCount,
    Opcode::IfAction,
    Opcode::IfAi,
    Opcode::IfMove,
    Opcode::IfPDistL,
    Opcode::IfPDistG,
    Opcode::IfVarE,
    Opcode::IfVarN,
    Opcode::IfVarG,
    Opcode::IfVarL,
    Opcode::IfVarAnd,
    Opcode::IfVarVarE,
    Opcode::IfVarVarN,
    Opcode::IfVarVarG,
    Opcode::IfVarVarL,
    Opcode::IfVarVarAnd,
    Opcode::IfCanSee,
    Opcode::IfCanSeeTarget,
    Opcode::IfCanShootTarget,
    Opcode::IfHitWeapon,
    Opcode::IfSquished,
    Opcode::IfDead,
    Opcode::IfProbe,
    Opcode::Ai,
    Opcode::Action,
    Opcode::Move,
    Opcode::Count,
    Opcode::ResetCount,
    Opcode::ResetActionCount,
    Opcode::SleepTime,
    Opcode::SetVar,
    Opcode::SetVarVar,
    Opcode::AddVar,
    Opcode::AddVarVar,
    Opcode::SubVar,
    Opcode::SubVarVar,
    Opcode::MulVar,
    Opcode::MulVarVar,
    Opcode::DivVar,
    Opcode::DivVarVar,
    Opcode::ModVar,
    Opcode::ModVarVar,
    Opcode::AndVar,
    Opcode::AndVarVar,
    Opcode::OrVar,
    Opcode::OrVarVar,
    Opcode::XorVar,
    Opcode::XorVarVar,
    Opcode::RandVar,
    Opcode::RandVarVar,
    Opcode::DisplayRand,
    Opcode::GetActorVar,
    Opcode::SetActorVar,
    Opcode::GetActor,
    Opcode::SetActor,
    Opcode::GetPlayer,
    Opcode::SetPlayer,
    Opcode::GetSector,
    Opcode::SetSector,
    Opcode::GetWall,
    Opcode::SetWall,
    Opcode::GetUserDef,
    Opcode::SetUserDef,
    Opcode::Spawn,
    Opcode::ESpawn,
    Opcode::Shoot,
    Opcode::Sound,
    Opcode::GlobalSound,
    Opcode::StopSound,
    Opcode::Damage,
    Opcode::HitRadius,
    Opcode::MoveEntity,
    Opcode::ChangeStat,
    Opcode::GiveItem,
    Opcode::Debug,
];

impl TryFrom<i32> for Opcode {
    type Error = DecodeError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        let opcode = match value {
            0x01 => Opcode::LeftBrace,
            0x02 => Opcode::RightBrace,
            0x03 => Opcode::Else,
            0x04 => Opcode::State,
            0x05 => Opcode::Switch,
            0x06 => Opcode::EndSwitch,
            0x07 => Opcode::EndActor,
            0x08 => Opcode::EndState,
            0x09 => Opcode::EndEvent,
            0x0A => Opcode::Break,
            0x0B => Opcode::NullOp,
            0x0C => Opcode::KillIt,

            0x10 => Opcode::IfRnd,
            0x11 => Opcode::IfCount,
            0x12 => Opcode::IfActionCount,
            0x13 => Opcode::IfAction,
            0x14 => Opcode::IfAi,
            0x15 => Opcode::IfMove,
            0x16 => Opcode::IfPDistL,
            0x17 => Opcode::IfPDistG,
            0x18 => Opcode::IfVarE,
            0x19 => Opcode::IfVarN,
            0x1A => Opcode::IfVarG,
            0x1B => Opcode::IfVarL,
            0x1C => Opcode::IfVarAnd,
            0x1D => Opcode::IfVarVarE,
            0x1E => Opcode::IfVarVarN,
            0x1F => Opcode::IfVarVarG,
            0x20 => Opcode::IfVarVarL,
            0x21 => Opcode::IfVarVarAnd,
            0x22 => Opcode::IfCanSee,
            0x23 => Opcode::IfCanSeeTarget,
            0x24 => Opcode::IfCanShootTarget,
            0x25 => Opcode::IfHitWeapon,
            0x26 => Opcode::IfSquished,
            0x27 => Opcode::IfDead,
            0x28 => Opcode::IfProbe,

            0x30 => Opcode::Ai,
            0x31 => Opcode::Action,
            0x32 => Opcode::Move,
            0x33 => Opcode::Count,
            0x34 => Opcode::ResetCount,
            0x35 => Opcode::ResetActionCount,
            0x36 => Opcode::SleepTime,

            0x40 => Opcode::SetVar,
            0x41 => Opcode::SetVarVar,
            0x42 => Opcode::AddVar,
            0x43 => Opcode::AddVarVar,
            0x44 => Opcode::SubVar,
            0x45 => Opcode::SubVarVar,
            0x46 => Opcode::MulVar,
            0x47 => Opcode::MulVarVar,
            0x48 => Opcode::DivVar,
            0x49 => Opcode::DivVarVar,
            0x4A => Opcode::ModVar,
            0x4B => Opcode::ModVarVar,
            0x4C => Opcode::AndVar,
            0x4D => Opcode::AndVarVar,
            0x4E => Opcode::OrVar,
            0x4F => Opcode::OrVarVar,
            0x50 => Opcode::XorVar,
            0x51 => Opcode::XorVarVar,
            0x52 => Opcode::RandVar,
            0x53 => Opcode::RandVarVar,
            0x54 => Opcode::DisplayRand,

            0x58 => Opcode::GetActorVar,
            0x59 => Opcode::SetActorVar,

            0x60 => Opcode::GetActor,
            0x61 => Opcode::SetActor,
            0x62 => Opcode::GetPlayer,
            0x63 => Opcode::SetPlayer,
            0x64 => Opcode::GetSector,
            0x65 => Opcode::SetSector,
            0x66 => Opcode::GetWall,
            0x67 => Opcode::SetWall,
            0x68 => Opcode::GetUserDef,
            0x69 => Opcode::SetUserDef,

            0x70 => Opcode::Spawn,
            0x71 => Opcode::ESpawn,
            0x72 => Opcode::Shoot,
            0x73 => Opcode::Sound,
            0x74 => Opcode::GlobalSound,
            0x75 => Opcode::StopSound,
            0x76 => Opcode::Damage,
            0x77 => Opcode::HitRadius,
            0x78 => Opcode::MoveEntity,
            0x79 => Opcode::ChangeStat,
            0x7A => Opcode::GiveItem,
            0x7B => Opcode::Debug,

            _ => return Err(DecodeError::InvalidOpcode(value)),
        };
        Ok(opcode)
    }
}

use Operand::{Field, Handle, Literal, Target, Var};


const NONE: &[Operand] = &[];
const LIT: &[Operand] = &[Literal];
const TGT: &[Operand] = &[Target];
const IF: &[Operand] = &[Target];
const IF_LIT: &[Operand] = &[Literal, Target];
const IF_VAR_LIT: &[Operand] = &[Var, Literal, Target];
const IF_VAR_VAR: &[Operand] = &[Var, Var, Target];
const VAR: &[Operand] = &[Var];
const VAR_LIT: &[Operand] = &[Var, Literal];
const VAR_VAR: &[Operand] = &[Var, Var];
const ACCESSOR: &[Operand] = &[Handle, Field, Literal, Var];

impl Opcode {
    /// Operand layout, excluding the opcode word itself.
    ///
    /// For [`Opcode::Switch`] this is only the fixed header; the case table of
    /// `2 * count` words follows it.
    pub fn operands(self) -> &'static [Operand] {
        match self {
            Opcode::LeftBrace
            | Opcode::RightBrace
            | Opcode::EndSwitch
            | Opcode::EndActor
            | Opcode::EndState
            | Opcode::EndEvent
            | Opcode::Break
            | Opcode::NullOp
            | Opcode::KillIt
            | Opcode::ResetCount
            | Opcode::ResetActionCount => NONE,

            Opcode::Else | Opcode::State => TGT,
            Opcode::Switch => &[Var, Target, Literal, Target],

            Opcode::IfRnd
            | Opcode::IfCount
            | Opcode::IfActionCount
            | Opcode::IfPDistL
            | Opcode::IfPDistG => IF_LIT,
            Opcode::IfAction => &[Operand::Record(RecordKind::Action), Target],
            Opcode::IfAi => &[Operand::Record(RecordKind::Ai), Target],
            Opcode::IfMove => &[Operand::Record(RecordKind::Move), Target],
            Opcode::IfVarE
            | Opcode::IfVarN
            | Opcode::IfVarG
            | Opcode::IfVarL
            | Opcode::IfVarAnd => IF_VAR_LIT,
            Opcode::IfVarVarE
            | Opcode::IfVarVarN
            | Opcode::IfVarVarG
            | Opcode::IfVarVarL
            | Opcode::IfVarVarAnd => IF_VAR_VAR,
            Opcode::IfCanSee
            | Opcode::IfCanSeeTarget
            | Opcode::IfCanShootTarget
            | Opcode::IfHitWeapon
            | Opcode::IfSquished
            | Opcode::IfDead => IF,
            Opcode::IfProbe => &[Literal, Literal, Target],

            Opcode::Ai => &[Operand::Record(RecordKind::Ai)],
            Opcode::Action => &[Operand::Record(RecordKind::Action)],
            Opcode::Move => &[Operand::Record(RecordKind::Move), Literal],
            Opcode::Count | Opcode::SleepTime => LIT,

            Opcode::SetVar
            | Opcode::AddVar
            | Opcode::SubVar
            | Opcode::MulVar
            | Opcode::DivVar
            | Opcode::ModVar
            | Opcode::AndVar
            | Opcode::OrVar
            | Opcode::XorVar
            | Opcode::RandVar => VAR_LIT,
            Opcode::SetVarVar
            | Opcode::AddVarVar
            | Opcode::SubVarVar
            | Opcode::MulVarVar
            | Opcode::DivVarVar
            | Opcode::ModVarVar
            | Opcode::AndVarVar
            | Opcode::OrVarVar
            | Opcode::XorVarVar
            | Opcode::RandVarVar => VAR_VAR,
            Opcode::DisplayRand => VAR,

            Opcode::GetActorVar | Opcode::SetActorVar => &[Var, Var, Var],

            Opcode::GetActor
            | Opcode::SetActor
            | Opcode::GetPlayer
            | Opcode::SetPlayer
            | Opcode::GetSector
            | Opcode::SetSector
            | Opcode::GetWall
            | Opcode::SetWall
            | Opcode::GetUserDef
            | Opcode::SetUserDef => ACCESSOR,

            Opcode::Spawn
            | Opcode::Shoot
            | Opcode::Sound
            | Opcode::GlobalSound
            | Opcode::StopSound
            | Opcode::ChangeStat
            | Opcode::Debug => LIT,
            Opcode::ESpawn => &[Literal, Var],
            Opcode::Damage => &[Handle, Literal],
            Opcode::HitRadius => &[Literal, Literal, Literal, Literal, Literal],
            Opcode::MoveEntity => &[Handle, Var, Var, Var],
            Opcode::GiveItem => &[Literal, Literal],
        }
    }

    /// True for opcodes that end the current (possibly nested) run.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Opcode::RightBrace
                | Opcode::EndSwitch
                | Opcode::EndActor
                | Opcode::EndState
                | Opcode::EndEvent
                | Opcode::Break
        )
    }

    /// True for terminals that leave the cursor on themselves, so every
    /// enclosing brace block re-reads them and ends as well.
    pub fn is_sticky_terminal(self) -> bool {
        matches!(
            self,
            Opcode::EndActor | Opcode::EndState | Opcode::EndEvent | Opcode::Break
        )
    }

    /// True for opcodes whose last operand is a false-branch target.
    pub fn is_conditional(self) -> bool {
        (self as i32) >= 0x10 && (self as i32) <= 0x28
    }

    /// Returns the assembly mnemonic for this opcode.
    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::LeftBrace => "{",
            Opcode::RightBrace => "}",
            Opcode::Else => "else",
            Opcode::State => "state",
            Opcode::Switch => "switch",
            Opcode::EndSwitch => "endswitch",
            Opcode::EndActor => "enda",
            Opcode::EndState => "ends",
            Opcode::EndEvent => "endevent",
            Opcode::Break => "break",
            Opcode::NullOp => "nullop",
            Opcode::KillIt => "killit",
            Opcode::IfRnd => "ifrnd",
            Opcode::IfCount => "ifcount",
            Opcode::IfActionCount => "ifactioncount",
            Opcode::IfAction => "ifaction",
            Opcode::IfAi => "ifai",
            Opcode::IfMove => "ifmove",
            Opcode::IfPDistL => "ifpdistl",
            Opcode::IfPDistG => "ifpdistg",
            Opcode::IfVarE => "ifvare",
            Opcode::IfVarN => "ifvarn",
            Opcode::IfVarG => "ifvarg",
            Opcode::IfVarL => "ifvarl",
            Opcode::IfVarAnd => "ifvarand",
            Opcode::IfVarVarE => "ifvarvare",
            Opcode::IfVarVarN => "ifvarvarn",
            Opcode::IfVarVarG => "ifvarvarg",
            Opcode::IfVarVarL => "ifvarvarl",
            Opcode::IfVarVarAnd => "ifvarvarand",
            Opcode::IfCanSee => "ifcansee",
            Opcode::IfCanSeeTarget => "ifcanseetarget",
            Opcode::IfCanShootTarget => "ifcanshoottarget",
            Opcode::IfHitWeapon => "ifhitweapon",
            Opcode::IfSquished => "ifsquished",
            Opcode::IfDead => "ifdead",
            Opcode::IfProbe => "ifprobe",
            Opcode::Ai => "ai",
            Opcode::Action => "action",
            Opcode::Move => "move",
            Opcode::Count => "count",
            Opcode::ResetCount => "resetcount",
            Opcode::ResetActionCount => "resetactioncount",
            Opcode::SleepTime => "sleeptime",
            Opcode::SetVar => "setvar",
            Opcode::SetVarVar => "setvarvar",
            Opcode::AddVar => "addvar",
            Opcode::AddVarVar => "addvarvar",
            Opcode::SubVar => "subvar",
            Opcode::SubVarVar => "subvarvar",
            Opcode::MulVar => "mulvar",
            Opcode::MulVarVar => "mulvarvar",
            Opcode::DivVar => "divvar",
            Opcode::DivVarVar => "divvarvar",
            Opcode::ModVar => "modvar",
            Opcode::ModVarVar => "modvarvar",
            Opcode::AndVar => "andvar",
            Opcode::AndVarVar => "andvarvar",
            Opcode::OrVar => "orvar",
            Opcode::OrVarVar => "orvarvar",
            Opcode::XorVar => "xorvar",
            Opcode::XorVarVar => "xorvarvar",
            Opcode::RandVar => "randvar",
            Opcode::RandVarVar => "randvarvar",
            Opcode::DisplayRand => "displayrand",
            Opcode::GetActorVar => "getactorvar",
            Opcode::SetActorVar => "setactorvar",
            Opcode::GetActor => "getactor",
            Opcode::SetActor => "setactor",
            Opcode::GetPlayer => "getplayer",
            Opcode::SetPlayer => "setplayer",
            Opcode::GetSector => "getsector",
            Opcode::SetSector => "setsector",
            Opcode::GetWall => "getwall",
            Opcode::SetWall => "setwall",
            Opcode::GetUserDef => "getuserdef",
            Opcode::SetUserDef => "setuserdef",
            Opcode::Spawn => "spawn",
            Opcode::ESpawn => "espawn",
            Opcode::Shoot => "shoot",
            Opcode::Sound => "sound",
            Opcode::GlobalSound => "globalsound",
            Opcode::StopSound => "stopsound",
            Opcode::Damage => "damage",
            Opcode::HitRadius => "hitradius",
            Opcode::MoveEntity => "moveentity",
            Opcode::ChangeStat => "changestat",
            Opcode::GiveItem => "giveitem",
            Opcode::Debug => "debug",
        }
    }

    /// Look up an opcode by mnemonic, ignoring ASCII case.
    pub fn from_mnemonic(name: &str) -> Option<Opcode> {
        ALL_OPCODES
            .iter()
            .find(|op| op.mnemonic().eq_ignore_ascii_case(name))
            .copied()
    }
}
