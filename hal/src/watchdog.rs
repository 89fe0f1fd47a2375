//! Watchdog guard
//!
//! Watchdogs configured as hardware watchdogs in the option bytes run from
//! reset and cannot be stopped. Their timeout is stretched so a mass erase
//! does not reset the device.

use crate::regs::{Reg, RegisterFile, optr};

/// Enable the IWDG register access (`KR`).
const IWDG_KEY_ACCESS: u32 = 0x5555;
/// Reload the IWDG counter (`KR`).
const IWDG_KEY_RELOAD: u32 = 0xAAAA;
/// Prescaler divider /256.
const IWDG_PR_DIV256: u32 = 6;
/// Largest reload value, about 32 s at 32 kHz.
const IWDG_RLR_MAX: u32 = 0xFFF;

/// Window covering the whole counter range.
const WWDG_CFR_MAX: u32 = 0x1FF;
/// Largest counter value.
const WWDG_CR_MAX: u32 = 0x7F;

/// Watchdogs that were reconfigured.
#[derive(Debug, Default, PartialEq, Eq, Clone, Copy, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Stretched {
    /// The independent watchdog runs in hardware mode.
    pub iwdg: bool,
    /// The window watchdog runs in hardware mode.
    pub wwdg: bool,
}

/// Set the longest timeout on every watchdog started by hardware.
pub fn stretch<R: RegisterFile>(regs: &mut R) -> Stretched {
    let opt: u32 = regs.read(Reg::Optr);
    let mut ret: Stretched = Stretched::default();

    if opt & optr::IWDG_SW == 0 {
        regs.write(Reg::IwdgKr, IWDG_KEY_RELOAD);
        regs.write(Reg::IwdgKr, IWDG_KEY_ACCESS);
        regs.write(Reg::IwdgPr, IWDG_PR_DIV256);
        regs.write(Reg::IwdgRlr, IWDG_RLR_MAX);
        ret.iwdg = true;
    }

    if opt & optr::WWDG_SW == 0 {
        regs.write(Reg::WwdgCfr, WWDG_CFR_MAX);
        regs.write(Reg::WwdgCr, WWDG_CR_MAX);
        ret.wwdg = true;
    }

    ret
}
