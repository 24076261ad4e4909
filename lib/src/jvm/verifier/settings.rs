use crate::jvm::code::opcodes::*;
use std::fmt;

/// Set of opcodes, used to restrict which instructions an analysis accepts
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct OpcodeSet([u64; 4]);

impl OpcodeSet {
    /// Every opcode from `nop` up to `jsr_w`
    pub fn all() -> OpcodeSet {
        let mut set = OpcodeSet::empty();
        for opcode in NOP..=JSR_W {
            set = set.with(opcode);
        }
        set
    }

    pub const fn empty() -> OpcodeSet {
        OpcodeSet([0; 4])
    }

    /// Every opcode except the subroutine instructions (`jsr`, `jsr_w`, `ret`)
    ///
    /// This is what a single straight-line pass can follow: subroutines need one frame per
    /// return address, which only the full analysis can track.
    pub fn linear() -> OpcodeSet {
        OpcodeSet::all().without(JSR).without(JSR_W).without(RET)
    }

    /// Opcodes valid in a constructor before the superclass (or `this`) constructor call completes
    ///
    /// On top of the restrictions of [`OpcodeSet::linear`], the method cannot return or throw
    /// while `this` is still uninitialized.
    pub fn constructor_prologue() -> OpcodeSet {
        let mut set = OpcodeSet::linear();
        for opcode in [IRETURN, LRETURN, FRETURN, DRETURN, ARETURN, RETURN, ATHROW] {
            set = set.without(opcode);
        }
        set
    }

    #[must_use]
    pub const fn with(mut self, opcode: u8) -> OpcodeSet {
        self.0[(opcode >> 6) as usize] |= 1u64 << (opcode & 63);
        self
    }

    #[must_use]
    pub const fn without(mut self, opcode: u8) -> OpcodeSet {
        self.0[(opcode >> 6) as usize] &= !(1u64 << (opcode & 63));
        self
    }

    pub const fn contains(&self, opcode: u8) -> bool {
        self.0[(opcode >> 6) as usize] & (1u64 << (opcode & 63)) != 0
    }

    pub fn iter(&self) -> impl Iterator<Item = u8> + '_ {
        (0..=u8::MAX).filter(move |opcode| self.contains(*opcode))
    }
}

impl Default for OpcodeSet {
    fn default() -> OpcodeSet {
        OpcodeSet::all()
    }
}

impl fmt::Debug for OpcodeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set()
            .entries(self.iter().map(|opcode| mnemonic(opcode).unwrap_or("???")))
            .finish()
    }
}

/// How return instructions are checked when a frame executes them
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ReturnCheck {
    /// The returned value must match the return type of the method descriptor, and `return` is
    /// only valid in `void` methods
    Descriptor,

    /// The returned value only needs to match the opcode (`ireturn` pops an `int`, `areturn` a
    /// reference, etc.)
    Category,
}

/// Configuration for [`super::Analyzer`]
#[derive(Clone, Debug)]
pub struct AnalyzerSettings {
    /// Follow `jsr`/`ret` subroutines
    ///
    /// Subroutines are tracked by keeping one frame per set of live return addresses. When this
    /// is disabled, the subroutine opcodes are rejected outright.
    pub subroutines: bool,

    /// Opcodes the analysis accepts
    ///
    /// Anything else makes the analysis fail with [`crate::jvm::Error::InvalidOpcode`].
    pub accepted_opcodes: OpcodeSet,
}

impl AnalyzerSettings {
    pub fn new() -> AnalyzerSettings {
        AnalyzerSettings {
            subroutines: true,
            accepted_opcodes: OpcodeSet::all(),
        }
    }

    /// Settings that reject `jsr`/`ret`
    pub fn without_subroutines() -> AnalyzerSettings {
        AnalyzerSettings {
            subroutines: false,
            accepted_opcodes: OpcodeSet::linear(),
        }
    }

    /// Is the opcode accepted under these settings?
    pub fn accepts(&self, opcode: u8) -> bool {
        let is_subroutine = matches!(opcode, JSR | JSR_W | RET);
        self.accepted_opcodes.contains(opcode) && (self.subroutines || !is_subroutine)
    }
}

impl Default for AnalyzerSettings {
    fn default() -> AnalyzerSettings {
        AnalyzerSettings::new()
    }
}

/// Configuration for [`super::FrameTracker`]
#[derive(Clone, Debug)]
pub struct TrackerSettings {
    /// Opcodes the tracker accepts
    ///
    /// Defaults to [`OpcodeSet::linear`]. Use [`OpcodeSet::constructor_prologue`] when tracking
    /// the start of a constructor.
    pub accepted_opcodes: OpcodeSet,

    /// Checking done on return instructions
    ///
    /// Defaults to [`ReturnCheck::Category`]: the live frame may come from an explicit frame
    /// marker that says nothing about the enclosing method.
    pub return_check: ReturnCheck,
}

impl TrackerSettings {
    pub fn new() -> TrackerSettings {
        TrackerSettings {
            accepted_opcodes: OpcodeSet::linear(),
            return_check: ReturnCheck::Category,
        }
    }

    pub fn constructor_prologue() -> TrackerSettings {
        TrackerSettings {
            accepted_opcodes: OpcodeSet::constructor_prologue(),
            return_check: ReturnCheck::Category,
        }
    }
}

impl Default for TrackerSettings {
    fn default() -> TrackerSettings {
        TrackerSettings::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn opcode_sets() {
        let all = OpcodeSet::all();
        assert!(all.contains(NOP));
        assert!(all.contains(JSR_W));
        assert!(!all.contains(0xca));
        assert_eq!(all.iter().count(), JSR_W as usize + 1);

        let linear = OpcodeSet::linear();
        assert!(!linear.contains(JSR));
        assert!(!linear.contains(RET));
        assert!(linear.contains(GOTO));
        assert!(linear.contains(ARETURN));

        let prologue = OpcodeSet::constructor_prologue();
        assert!(!prologue.contains(RETURN));
        assert!(!prologue.contains(ATHROW));
        assert!(prologue.contains(INVOKESPECIAL));
        assert!(prologue.contains(ALOAD));
    }

    #[test]
    fn subroutines_switch() {
        let mut settings = AnalyzerSettings::new();
        assert!(settings.accepts(JSR));
        settings.subroutines = false;
        assert!(!settings.accepts(JSR));
        assert!(!settings.accepts(RET));
        assert!(settings.accepts(IADD));
    }
}
